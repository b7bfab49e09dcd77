// Core types shared by the broker and its clients
use std::fmt;
use std::path::{Path, PathBuf};

/// Directory holding every channel unless configured otherwise.
pub const DEFAULT_RUNTIME_DIR: &str = "/tmp";

// Peers derive channel names independently, so these must stay bit-exact.
pub const CONTROL_CHANNEL_NAME: &str = "im_server_cmd.fifo";
pub const CLIENT_CHANNEL_PREFIX: &str = "im_client_";
pub const GROUP_CHANNEL_PREFIX: &str = "im_group_";
pub const CHANNEL_SUFFIX: &str = ".fifo";

/// Derives the filesystem path of every named channel from a runtime directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    runtime_dir: PathBuf,
}

impl ChannelNames {
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        ChannelNames {
            runtime_dir: runtime_dir.into(),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// The single well-known channel every client writes commands into.
    pub fn control(&self) -> PathBuf {
        self.runtime_dir.join(CONTROL_CHANNEL_NAME)
    }

    /// Per-login inbox the server writes notifications and deliveries into.
    pub fn client(&self, login: &str) -> PathBuf {
        self.runtime_dir
            .join(format!("{}{}{}", CLIENT_CHANNEL_PREFIX, login, CHANNEL_SUFFIX))
    }

    /// Per-group channel clients write `MSG` records into.
    pub fn group(&self, name: &str) -> PathBuf {
        self.runtime_dir
            .join(format!("{}{}{}", GROUP_CHANNEL_PREFIX, name, CHANNEL_SUFFIX))
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        ChannelNames::new(DEFAULT_RUNTIME_DIR)
    }
}

/// Whether a login or group name can be spliced into a channel path.
pub fn is_channel_safe(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\0')
}

/// Human-readable lines the server pushes into client inboxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice<'a> {
    Connected { login: &'a str },
    AlreadyConnected,
    NotConnected { to: &'a str },
    Delivered { to: &'a str },
    SendUsage,
    GroupExists,
    GroupCreateFailed,
    GroupOpenFailed,
    GroupNotFound,
    GroupCreated { group: &'a str },
    GroupDeleted { group: &'a str },
    Joined { group: &'a str },
    Left { group: &'a str },
    Private { from: &'a str, text: &'a str },
    Group { group: &'a str, from: &'a str, text: &'a str },
}

impl fmt::Display for Notice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Notice::Connected { login } => write!(f, "SERVER: connected as '{}'", login),
            Notice::AlreadyConnected => write!(f, "SERVER: already connected"),
            Notice::NotConnected { to } => write!(f, "SERVER: user '{}' not connected", to),
            Notice::Delivered { to } => write!(f, "SERVER: delivered to '{}'", to),
            Notice::SendUsage => write!(f, "SERVER: usage: SEND <from> <to> <text>"),
            Notice::GroupExists => write!(f, "SERVER: group already exists"),
            Notice::GroupCreateFailed => write!(f, "SERVER: cannot create group fifo"),
            Notice::GroupOpenFailed => write!(f, "SERVER: cannot open group fifo for read"),
            Notice::GroupNotFound => write!(f, "SERVER: group not found"),
            Notice::GroupCreated { group } => write!(f, "SERVER: group created '{}'", group),
            Notice::GroupDeleted { group } => write!(f, "SERVER: group deleted '{}'", group),
            Notice::Joined { group } => write!(f, "SERVER: joined group '{}'", group),
            Notice::Left { group } => write!(f, "SERVER: left group '{}'", group),
            Notice::Private { from, text } => write!(f, "[pm] {}: {}", from, text),
            Notice::Group { group, from, text } => {
                write!(f, "[group:{}] {}: {}", group, from, text)
            }
        }
    }
}
