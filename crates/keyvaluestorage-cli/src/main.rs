//! kvstore - run one key-value operation against any storage backend.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Backend, Command, StorageArgs};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "kvstore")]
#[command(about = "Inspect and edit keyvaluestorage backends")]
struct Args {
    #[command(flatten)]
    storage: StorageArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output.
    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!(
        "Opening {:?} backend at {}",
        args.storage.backend,
        args.storage.path.display()
    );
    if args.storage.backend == Backend::Namespaced {
        debug!(
            "Namespace '{}' (separator '{}', snapshot key '{}')",
            args.storage.prefix, args.storage.separator, args.storage.snapshot_key
        );
    }

    let storage = commands::open_backend(&args.storage)?;
    storage.init().await?;
    let output = commands::run(storage.as_ref(), args.command).await?;
    storage.close().await?;

    if let Some(output) = output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}
