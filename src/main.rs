use clap::Parser;
use tracing_subscriber::EnvFilter;

use job_collector::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // -v forces debug; otherwise RUST_LOG, defaulting to info.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::dispatch(&cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
