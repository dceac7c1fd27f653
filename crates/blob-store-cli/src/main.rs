use anyhow::{Context, Result};
use blob_store_core::storage::{create_store, StorageBackendConfig};
use blob_store_core::{Config, OpContext, Store};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(name = "blob-store")]
#[command(about = "Upload, download and manage objects in blob storage", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML configuration file with a `storage` section
    #[arg(short, long, global = true, conflicts_with = "storage")]
    config: Option<String>,

    /// Storage URL (s3://bucket/prefix, file:///path, memory://)
    #[arg(short, long, global = true, env = "BLOB_STORE_URL")]
    storage: Option<String>,

    /// Abort the command after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Put {
        /// Destination key
        key: String,

        /// Local file to upload
        file: String,

        /// Content type (resolved from the key extension when omitted)
        #[arg(long)]
        content_type: Option<String>,

        /// User metadata as key=value, repeatable
        #[arg(long = "meta", value_parser = commands::put::parse_metadata)]
        metadata: Vec<(String, String)>,
    },

    /// Download an object to a local file
    Get {
        /// Object key
        key: String,

        /// Output file path
        output: String,
    },

    /// Stream an object to stdout
    Cat {
        /// Object key
        key: String,
    },

    /// Show object metadata
    Head {
        /// Object key
        key: String,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List objects
    Ls {
        /// Only list keys under this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Maximum keys per page
        #[arg(long, default_value = "1000")]
        max_keys: i32,

        /// Start listing after this key
        #[arg(long, default_value = "")]
        start_after: String,

        /// Follow pagination until every matching key is listed
        #[arg(long, default_value = "false")]
        all: bool,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete one or more objects
    Rm {
        /// Object keys
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Copy an object to another key
    Cp {
        /// Source key
        source: String,

        /// Destination key
        dest: String,
    },

    /// Generate a presigned URL
    Presign {
        /// Object key
        key: String,

        /// Generate an upload (PUT) URL instead of a download URL
        #[arg(long, default_value = "false")]
        upload: bool,

        /// Content type the uploader must send
        #[arg(long, requires = "upload")]
        content_type: Option<String>,

        /// URL lifetime in seconds
        #[arg(long, default_value = "900")]
        expires: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let store = open_store(cli.config.as_deref(), cli.storage.as_deref())?;
    debug!("Using {} storage backend", store.name());

    let mut ctx = OpContext::background();
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling operation");
            signal_ctx.cancel();
        }
    });

    match cli.command {
        Commands::Put {
            key,
            file,
            content_type,
            metadata,
        } => {
            commands::put::run(
                store.as_ref(),
                &ctx,
                &key,
                &file,
                content_type.as_deref(),
                metadata,
            )
            .await?;
        }
        Commands::Get { key, output } => {
            commands::get::run(store.as_ref(), &ctx, &key, &output).await?;
        }
        Commands::Cat { key } => {
            commands::cat::run(store.as_ref(), &ctx, &key).await?;
        }
        Commands::Head { key, format } => {
            commands::head::run(store.as_ref(), &ctx, &key, OutputFormat::from(format.as_str()))
                .await?;
        }
        Commands::Ls {
            prefix,
            max_keys,
            start_after,
            all,
            format,
        } => {
            commands::ls::run(
                store.as_ref(),
                &ctx,
                &prefix,
                max_keys,
                &start_after,
                all,
                OutputFormat::from(format.as_str()),
            )
            .await?;
        }
        Commands::Rm { keys } => {
            commands::rm::run(store.as_ref(), &ctx, &keys).await?;
        }
        Commands::Cp { source, dest } => {
            commands::cp::run(store.as_ref(), &ctx, &source, &dest).await?;
        }
        Commands::Presign {
            key,
            upload,
            content_type,
            expires,
        } => {
            commands::presign::run(
                store.as_ref(),
                &ctx,
                &key,
                upload,
                content_type.as_deref(),
                Duration::from_secs(expires),
            )
            .await?;
        }
    }

    Ok(())
}

/// Build the store from `--config`, `--storage`, or the current directory.
fn open_store(config: Option<&str>, storage: Option<&str>) -> Result<Arc<dyn Store>> {
    let backend = match (config, storage) {
        (Some(path), _) => {
            Config::from_file(path)
                .with_context(|| format!("Failed to load config {}", path))?
                .storage
        }
        (None, Some(url)) => StorageBackendConfig::from_url(url)?,
        (None, None) => {
            let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
            StorageBackendConfig::filesystem(cwd)
        }
    };

    Ok(create_store(&backend)?)
}
