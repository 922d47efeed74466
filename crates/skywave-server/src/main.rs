mod app;
mod banner;
mod build_info;
mod logging;
mod orchestrator;
mod shutdown;
mod state;
mod ws;

use clap::Parser;
use skywave_core::config::Config;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(version, about = "Skywave SDR backend")]
struct Cli {
    /// Path to a JSON config file; defaults are used for anything missing.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Directory to serve static assets from.
    #[arg(long, default_value = "public")]
    html_root: String,
    #[arg(long)]
    debug: bool,
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging_cfg = logging::LoggingConfig {
        debug: cli.debug,
        log_dir: cli.log_dir.or_else(|| Some(logging::default_log_dir())),
        ..Default::default()
    };
    let _guards = logging::init(&logging_cfg)?;
    banner::log_startup_banner();

    let cfg = if cli.config.exists() {
        Config::load_from_file(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
        Config::default()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cfg, cli.html_root))
}

async fn run(cfg: Config, html_root: String) -> anyhow::Result<()> {
    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
    let state = Arc::new(state::AppState::new(cfg, html_root, command_tx));

    orchestrator::spawn(Arc::clone(&state), command_rx)?;

    app::serve(state).await
}
