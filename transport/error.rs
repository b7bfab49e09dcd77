use std::io;
use std::path::PathBuf;

/// Failure of a single channel operation. Never fatal on its own: callers
/// log it and retry on the next use of the channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("cannot create channel {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot delete channel {}: {source}", .path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open channel {} for {mode}: {source}", .path.display())]
    Open {
        path: PathBuf,
        mode: OpenMode,
        #[source]
        source: io::Error,
    },

    #[error("channel write failed after {written} of {len} bytes: {source}")]
    Write {
        written: usize,
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("channel read failed: {0}")]
    Read(#[source] io::Error),

    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),
}

impl ChannelError {
    /// True when the peer side simply is not there yet (no reader on a
    /// write-open, missing channel), as opposed to an unexpected OS failure.
    pub fn is_peer_absent(&self) -> bool {
        match self {
            ChannelError::Open { source, .. } => matches!(
                source.raw_os_error(),
                Some(libc::ENXIO) | Some(libc::ENOENT)
            ),
            ChannelError::Write { source, .. } => {
                source.kind() == io::ErrorKind::BrokenPipe
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            OpenMode::Read => write!(f, "read"),
            OpenMode::Write => write!(f, "write"),
        }
    }
}
