// im-receive: holds a chat session open and prints everything sent to it
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use im_client::ImClient;
use im_core::ChannelNames;
use im_transport::FifoTransport;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "im-receive")]
#[command(about = "Connect a login and print incoming chat lines", long_about = None)]
#[command(version)]
struct Args {
    /// Login to connect as
    login: String,

    /// Directory holding the chat channels
    #[arg(long, env = "IM_RUNTIME_DIR", default_value = im_core::DEFAULT_RUNTIME_DIR)]
    runtime_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .init();

    let args = Args::parse();

    let stop = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&stop))?;
    flag::register(SIGTERM, Arc::clone(&stop))?;

    let names = ChannelNames::new(&args.runtime_dir);
    let mut client = ImClient::connect(FifoTransport::new(), &names, &args.login)
        .with_context(|| format!("cannot connect as '{}'", args.login))?;

    println!("Connected as '{}'. Receiving messages...\n", args.login);

    while !stop.load(Ordering::Relaxed) {
        if !client.wait_readable(Duration::from_millis(250))? {
            continue;
        }
        for line in client.receive_lines()? {
            println!("{} {}", Local::now().format("%Y/%m/%d %H:%M:%S"), line);
        }
    }

    client.disconnect()?;
    println!("Bye");
    Ok(())
}
