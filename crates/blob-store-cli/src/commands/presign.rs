use anyhow::{anyhow, Result};
use blob_store_core::{OpContext, Store};
use std::time::Duration;

pub async fn run(
    store: &dyn Store,
    ctx: &OpContext,
    key: &str,
    upload: bool,
    content_type: Option<&str>,
    expires: Duration,
) -> Result<()> {
    let presigner = store
        .presigner()
        .ok_or_else(|| anyhow!("The {} backend cannot generate presigned URLs", store.name()))?;

    let url = if upload {
        presigner
            .generate_presigned_upload_url(ctx, key, content_type, expires)
            .await?
    } else {
        presigner.generate_presigned_url(ctx, key, expires).await?
    };

    println!("{}", url);
    Ok(())
}
