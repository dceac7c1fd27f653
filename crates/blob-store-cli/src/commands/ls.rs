use anyhow::Result;
use blob_store_core::{ListInput, ObjectInfo, OpContext, Store};
use tracing::debug;

use super::{format_bytes, OutputFormat};

pub async fn run(
    store: &dyn Store,
    ctx: &OpContext,
    prefix: &str,
    max_keys: i32,
    start_after: &str,
    all: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut input = ListInput::with_prefix(prefix)
        .max_keys(max_keys)
        .start_after(start_after);
    let mut objects: Vec<ObjectInfo> = Vec::new();

    let next_marker = loop {
        let page = store.list(ctx, &input).await?;
        debug!(
            "Listed {} objects (truncated: {})",
            page.objects.len(),
            page.is_truncated
        );
        let truncated = page.is_truncated;
        objects.extend(page.objects);

        match page.next_marker {
            Some(marker) if truncated && all => input = input.start_after(marker),
            marker if truncated => break marker,
            _ => break None,
        }
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "objects": objects,
                "next_marker": next_marker,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for obj in &objects {
                let modified = obj
                    .last_modified
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:19}  {:>12}  {}", modified, format_bytes(obj.size), obj.key);
            }
            if let Some(marker) = &next_marker {
                println!();
                println!("More results available, continue with --start-after {}", marker);
            }
        }
    }

    Ok(())
}
