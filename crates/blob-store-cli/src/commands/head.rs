use anyhow::Result;
use blob_store_core::{ObjectInfo, OpContext, Store};

use super::OutputFormat;

pub async fn run(store: &dyn Store, ctx: &OpContext, key: &str, format: OutputFormat) -> Result<()> {
    let info = store.head_object(ctx, key).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        OutputFormat::Text => print_info_text(&info),
    }

    Ok(())
}

fn print_info_text(info: &ObjectInfo) {
    println!("Key:           {}", info.key);
    println!("Size:          {} ({} bytes)", super::format_bytes(info.size), info.size);
    println!("Content-Type:  {}", info.content_type);
    if let Some(etag) = &info.etag {
        println!("ETag:          {}", etag);
    }
    if let Some(modified) = &info.last_modified {
        println!("Last-Modified: {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if !info.metadata.is_empty() {
        println!("Metadata:");
        let mut entries: Vec<_> = info.metadata.iter().collect();
        entries.sort();
        for (k, v) in entries {
            println!("  {}: {}", k, v);
        }
    }
}
