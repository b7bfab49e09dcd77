// In-process channel transport emulating named pipe semantics
use crate::error::{ChannelError, OpenMode};
use crate::traits::ChannelTransport;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Bytes a pipe accepts before writes would block (Linux default pipe size).
pub const MEMORY_PIPE_CAPACITY: usize = 65536;

#[derive(Debug, Default)]
struct Pipe {
    buffer: Vec<u8>,
    readers: usize,
    writers: usize,
}

impl Pipe {
    // Unread bytes die with the last open end, as with a kernel pipe.
    fn release(&mut self) {
        if self.readers == 0 && self.writers == 0 {
            self.buffer.clear();
        }
    }
}

type SharedPipe = Arc<Mutex<Pipe>>;

fn lock(pipe: &SharedPipe) -> MutexGuard<'_, Pipe> {
    // A poisoned pipe still holds consistent byte counts.
    pipe.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Channels living in process memory. Clones share the same namespace.
///
/// Mirrors FIFO behaviour: write-open fails without a reader, writes fail
/// once every reader is gone, unread bytes are discarded when both ends are
/// closed, and deleting a name leaves open handles usable.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    names: Arc<Mutex<HashMap<PathBuf, SharedPipe>>>,
    // Bumped on every successful write, wakes `wait_readable`
    written: Arc<(Mutex<u64>, Condvar)>,
}

#[derive(Debug)]
pub struct MemoryReader {
    pipe: SharedPipe,
}

#[derive(Debug)]
pub struct MemoryWriter {
    pipe: SharedPipe,
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        let mut state = lock(&self.pipe);
        state.readers -= 1;
        state.release();
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let mut state = lock(&self.pipe);
        state.writers -= 1;
        state.release();
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn names(&self) -> MutexGuard<'_, HashMap<PathBuf, SharedPipe>> {
        self.names.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn signal_written(&self) {
        let (count, cond) = &*self.written;
        *count.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        cond.notify_all();
    }

    fn lookup(&self, path: &Path, mode: OpenMode) -> Result<SharedPipe, ChannelError> {
        self.names()
            .get(path)
            .cloned()
            .ok_or_else(|| ChannelError::Open {
                path: path.to_path_buf(),
                mode,
                source: io::Error::from_raw_os_error(libc::ENOENT),
            })
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.names().contains_key(path)
    }

    /// Number of channel names currently present.
    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open readers on the named channel, zero when it does not exist.
    pub fn reader_count(&self, path: &Path) -> usize {
        self.names().get(path).map_or(0, |pipe| lock(pipe).readers)
    }

    /// Open writers on the named channel, zero when it does not exist.
    pub fn writer_count(&self, path: &Path) -> usize {
        self.names().get(path).map_or(0, |pipe| lock(pipe).writers)
    }
}

impl ChannelTransport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn create(&self, path: &Path) -> Result<(), ChannelError> {
        self.names().entry(path.to_path_buf()).or_default();
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), ChannelError> {
        self.names().remove(path);
        Ok(())
    }

    fn open_read(&self, path: &Path) -> Result<MemoryReader, ChannelError> {
        let pipe = self.lookup(path, OpenMode::Read)?;
        lock(&pipe).readers += 1;
        Ok(MemoryReader { pipe })
    }

    fn open_write(&self, path: &Path) -> Result<MemoryWriter, ChannelError> {
        let pipe = self.lookup(path, OpenMode::Write)?;
        {
            let mut state = lock(&pipe);
            if state.readers == 0 {
                return Err(ChannelError::Open {
                    path: path.to_path_buf(),
                    mode: OpenMode::Write,
                    source: io::Error::from_raw_os_error(libc::ENXIO),
                });
            }
            state.writers += 1;
        }
        Ok(MemoryWriter { pipe })
    }

    fn write_all(&self, writer: &mut MemoryWriter, bytes: &[u8]) -> Result<(), ChannelError> {
        let accepted = {
            let mut state = lock(&writer.pipe);
            if state.readers == 0 {
                return Err(ChannelError::Write {
                    written: 0,
                    len: bytes.len(),
                    source: io::Error::from(io::ErrorKind::BrokenPipe),
                });
            }
            let room = MEMORY_PIPE_CAPACITY.saturating_sub(state.buffer.len());
            let accepted = room.min(bytes.len());
            state.buffer.extend_from_slice(&bytes[..accepted]);
            accepted
        };
        if accepted > 0 {
            self.signal_written();
        }
        if accepted < bytes.len() {
            return Err(ChannelError::Write {
                written: accepted,
                len: bytes.len(),
                source: io::Error::from(io::ErrorKind::WouldBlock),
            });
        }
        Ok(())
    }

    fn read_available(&self, reader: &mut MemoryReader) -> Result<Vec<u8>, ChannelError> {
        Ok(std::mem::take(&mut lock(&reader.pipe).buffer))
    }

    // Only writes through this transport (or a clone of it) wake the wait.
    fn wait_readable(
        &self,
        readers: &[&MemoryReader],
        timeout: Duration,
    ) -> Result<Vec<bool>, ChannelError> {
        let deadline = Instant::now() + timeout;
        let (count, cond) = &*self.written;
        let mut guard = count.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            let ready: Vec<bool> = readers
                .iter()
                .map(|r| !lock(&r.pipe).buffer.is_empty())
                .collect();
            let now = Instant::now();
            if ready.iter().any(|&r| r) || now >= deadline {
                return Ok(ready);
            }
            guard = cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }
}
