// daemon: chat server routing commands and group traffic over named pipes
use anyhow::{Context, Result};
use clap::Parser;
use im_broker::transport::FifoTransport;
use im_broker::{BrokerConfig, Dispatcher};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "im-daemon")]
#[command(about = "Named-pipe chat server", long_about = None)]
#[command(version)]
struct Args {
    /// Directory holding the channels (overrides IM_RUNTIME_DIR)
    #[arg(long, value_name = "DIR")]
    runtime_dir: Option<PathBuf>,

    /// Upper bound of one readiness wait in milliseconds (overrides IM_POLL_TIMEOUT_MS)
    #[arg(long, value_name = "MS")]
    poll_timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let args = Args::parse();
    let mut config = BrokerConfig::from_env();
    if let Some(dir) = args.runtime_dir {
        config.runtime_dir = dir;
    }
    if let Some(ms) = args.poll_timeout_ms {
        config.poll_timeout = Duration::from_millis(ms);
    }

    // SIGPIPE is already ignored by the Rust runtime; a vanished client
    // surfaces as EPIPE on write and is handled by the router.
    let stop = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&stop))?;
    flag::register(SIGTERM, Arc::clone(&stop))?;

    log::info!("Server start...");
    let mut dispatcher = Dispatcher::start(FifoTransport::new(), &config)
        .with_context(|| format!("cannot start in {}", config.runtime_dir.display()))?;

    dispatcher.run(&stop);
    log::info!("Server stopped");
    Ok(())
}
