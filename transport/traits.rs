// Transport abstraction - isolates the broker from the concrete IPC primitive
use crate::error::ChannelError;
use std::path::Path;
use std::time::Duration;

/// A family of named byte-stream channels.
///
/// Handles are closed by dropping them. Every open is non-blocking: a write
/// open fails until some reader exists, and reads return whatever is
/// available right now.
pub trait ChannelTransport {
    type Reader;
    type Writer;

    /// Create the channel. Succeeds if it already exists.
    fn create(&self, path: &Path) -> Result<(), ChannelError>;

    /// Remove the channel name. Succeeds if it is already gone.
    fn delete(&self, path: &Path) -> Result<(), ChannelError>;

    fn open_read(&self, path: &Path) -> Result<Self::Reader, ChannelError>;

    fn open_write(&self, path: &Path) -> Result<Self::Writer, ChannelError>;

    /// Push every byte or fail. A channel that stops accepting bytes midway
    /// is an error, never a silent partial success; the writer should then
    /// be dropped and reopened on next use.
    fn write_all(&self, writer: &mut Self::Writer, bytes: &[u8]) -> Result<(), ChannelError>;

    /// Drain everything currently readable. Empty when nothing is pending.
    fn read_available(&self, reader: &mut Self::Reader) -> Result<Vec<u8>, ChannelError>;

    /// Block until at least one reader has data or `timeout` elapses.
    /// Returns one readiness flag per reader, in order.
    fn wait_readable(
        &self,
        readers: &[&Self::Reader],
        timeout: Duration,
    ) -> Result<Vec<bool>, ChannelError>;
}
