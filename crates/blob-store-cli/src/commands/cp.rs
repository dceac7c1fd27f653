use anyhow::Result;
use blob_store_core::{OpContext, Store};

pub async fn run(store: &dyn Store, ctx: &OpContext, source: &str, dest: &str) -> Result<()> {
    store.copy(ctx, source, dest).await?;
    println!("{} -> {}", source, dest);
    Ok(())
}
