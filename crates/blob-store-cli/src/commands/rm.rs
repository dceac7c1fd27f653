use anyhow::{bail, Result};
use blob_store_core::{OpContext, Store};
use tracing::info;

pub async fn run(store: &dyn Store, ctx: &OpContext, keys: &[String]) -> Result<()> {
    if let [key] = keys {
        store.delete(ctx, key).await?;
        println!("deleted {}", key);
        return Ok(());
    }

    info!("Deleting {} objects", keys.len());
    let output = store.delete_multiple(ctx, keys).await;

    for key in keys.iter().filter(|k| !output.failed_keys.contains(k)) {
        println!("deleted {}", key);
    }
    for key in &output.failed_keys {
        eprintln!("failed {}", key);
    }

    if let Some(e) = output.error {
        bail!("{} of {} deletes failed: {}", output.failed_keys.len(), keys.len(), e);
    }
    Ok(())
}
