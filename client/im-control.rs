// im-control: one-shot tool sending a single chat command as some login
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use im_client::{post_to_group, ControlLink};
use im_core::{ChannelNames, Command};
use im_transport::FifoTransport;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "im-control")]
#[command(about = "Send one command to the chat server", long_about = None)]
#[command(version)]
struct Cli {
    /// Login the command is sent on behalf of
    #[arg(long = "as", value_name = "LOGIN")]
    login: String,

    /// Directory holding the chat channels
    #[arg(long, env = "IM_RUNTIME_DIR", default_value = im_core::DEFAULT_RUNTIME_DIR)]
    runtime_dir: PathBuf,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Send a private message
    Send {
        to: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Create a group, joining it as first member
    CreateGroup { name: String },

    /// Delete a group
    DeleteGroup { name: String },

    /// Join a group
    Join { name: String },

    /// Leave a group
    Leave { name: String },

    /// Post a message into a group channel
    Post {
        group: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// End the login's session
    Disconnect,
}

impl Action {
    fn into_command(self, login: &str) -> Option<Command> {
        let from = login.to_string();
        Some(match self {
            Action::Send { to, text } => Command::Send { from, to, text: text.join(" ") },
            Action::CreateGroup { name } => Command::CreateGroup { from, group: name },
            Action::DeleteGroup { name } => Command::DeleteGroup { from, group: name },
            Action::Join { name } => Command::JoinGroup { from, group: name },
            Action::Leave { name } => Command::LeaveGroup { from, group: name },
            Action::Disconnect => Command::Disconnect { login: from },
            Action::Post { .. } => return None,
        })
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let names = ChannelNames::new(&cli.runtime_dir);
    let transport = FifoTransport::new();

    if let Action::Post { group, text } = &cli.command {
        post_to_group(&transport, &names, &cli.login, group, &text.join(" "))
            .with_context(|| format!("cannot post to '{}'", group))?;
        return Ok(());
    }

    if let Some(command) = cli.command.into_command(&cli.login) {
        let mut link = ControlLink::open(transport, &names)?;
        link.send(&command)?;
        log::debug!("sent {}", command);
    }
    Ok(())
}
