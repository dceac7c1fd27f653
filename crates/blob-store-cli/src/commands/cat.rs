use anyhow::Result;
use blob_store_core::{Error, OpContext, Store};
use tokio::io::AsyncWriteExt;

pub async fn run(store: &dyn Store, ctx: &OpContext, key: &str) -> Result<()> {
    let mut reader = store.get_object(ctx, key).await?;
    let mut stdout = tokio::io::stdout();

    ctx.run(async {
        tokio::io::copy(&mut reader, &mut stdout)
            .await
            .map_err(|e| Error::DownloadFailed {
                key: key.to_string(),
                source: Box::new(e),
            })
    })
    .await?;

    stdout.flush().await?;
    Ok(())
}
