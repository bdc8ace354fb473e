mod app;
mod repl;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rag_desk::config::Config;

#[derive(Debug, Parser)]
#[command(name = "rag-desk", version, about = "Ask questions about your documents")]
struct Cli {
    /// Chat from the terminal instead of opening a window
    #[arg(long)]
    repl: bool,

    /// Config file to use instead of ~/.config/rag-desk/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answering service base URL, overrides the config file
    #[arg(long)]
    backend_url: Option<String>,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rag_desk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref());
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
    }
    tracing::info!(backend = %config.backend.base_url, "starting");

    if cli.repl {
        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(repl::run(config));
    }

    app::run(config)?;
    Ok(())
}
