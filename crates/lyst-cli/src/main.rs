//! lyst - package repositories for the OpenLyst catalogue

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lyst_cli::cmd;
use lyst_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Build(args) => cmd::build::build(args, config, cli.verbose).await,
        Commands::Verify {
            dirs,
            online,
            concurrency,
        } => cmd::verify::verify(&dirs, online, concurrency, config).await,
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
