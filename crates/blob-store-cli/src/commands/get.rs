use anyhow::{Context, Result};
use blob_store_core::{OpContext, Store};
use tracing::info;

use super::format_bytes;

pub async fn run(store: &dyn Store, ctx: &OpContext, key: &str, output: &str) -> Result<()> {
    let mut file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("Failed to create {}", output))?;

    info!("Downloading {} to {}", key, output);
    let result = store.download(ctx, key, &mut file).await;

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            drop(file);
            // Don't leave a truncated file behind
            let _ = tokio::fs::remove_file(output).await;
            return Err(e.into());
        }
    };

    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", output))?;

    println!("{} -> {} ({})", key, output, format_bytes(bytes));
    Ok(())
}
