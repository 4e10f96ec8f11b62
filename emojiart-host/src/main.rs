//! # EmojiArt
//!
//! Command-line host for EmojiArt documents.

use clap::Parser;
use emojiart_host::{commands, CliArgs, HostConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing on stderr with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: `emojiart_host=info,emojiart_core=info`).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("emojiart_host=info,emojiart_core=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = HostConfig::from(&args);
    tracing::debug!(
        "Data directory {} with canvas {}x{}",
        config.data_dir.display(),
        config.canvas_size.width,
        config.canvas_size.height
    );

    let output = commands::run(&config, args.command).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
