use anyhow::{Context, Result};
use blob_store_core::{OpContext, Store, UploadInput};
use tracing::info;

/// Parse a `key=value` metadata argument.
pub fn parse_metadata(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

pub async fn run(
    store: &dyn Store,
    ctx: &OpContext,
    key: &str,
    file: &str,
    content_type: Option<&str>,
    metadata: Vec<(String, String)>,
) -> Result<()> {
    let body = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file))?;

    let mut input = UploadInput::new(key, body);
    if let Some(ct) = content_type {
        input = input.with_content_type(ct);
    }
    for (k, v) in metadata {
        input = input.with_metadata(k, v);
    }

    info!("Uploading {} to {}", file, key);
    let output = store.upload(ctx, input).await?;

    println!("{}", output.location);
    println!("etag: {}", output.etag);
    if let Some(version) = output.version_id {
        println!("version: {}", version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert_eq!(
            parse_metadata("owner=media").unwrap(),
            ("owner".to_string(), "media".to_string())
        );
        assert_eq!(
            parse_metadata("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_metadata("novalue").is_err());
        assert!(parse_metadata("=x").is_err());
    }
}
