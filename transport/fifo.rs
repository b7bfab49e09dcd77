// POSIX named pipe transport with non-blocking I/O and poll(2) readiness
use crate::error::{ChannelError, OpenMode};
use crate::traits::ChannelTransport;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::Mode;
use nix::unistd::{mkfifo, unlink};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

const READ_CHUNK: usize = 4096;

/// Named pipes on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoTransport;

/// Read end of a FIFO, opened with `O_NONBLOCK`.
#[derive(Debug)]
pub struct FifoReader {
    file: File,
}

/// Write end of a FIFO, opened with `O_NONBLOCK`.
#[derive(Debug)]
pub struct FifoWriter {
    file: File,
}

impl FifoTransport {
    pub fn new() -> Self {
        FifoTransport
    }

    fn open(path: &Path, mode: OpenMode) -> Result<File, ChannelError> {
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true),
        };
        options
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| ChannelError::Open {
                path: path.to_path_buf(),
                mode,
                source,
            })
    }
}

impl ChannelTransport for FifoTransport {
    type Reader = FifoReader;
    type Writer = FifoWriter;

    fn create(&self, path: &Path) -> Result<(), ChannelError> {
        // rw-rw-rw- before umask, so clients of other users can reach the server
        match mkfifo(path, Mode::from_bits_truncate(0o666)) {
            Ok(()) | Err(Errno::EEXIST) => Ok(()),
            Err(errno) => Err(ChannelError::Create {
                path: path.to_path_buf(),
                source: io::Error::from(errno),
            }),
        }
    }

    fn delete(&self, path: &Path) -> Result<(), ChannelError> {
        match unlink(path) {
            Ok(()) | Err(Errno::ENOENT) => Ok(()),
            Err(errno) => Err(ChannelError::Delete {
                path: path.to_path_buf(),
                source: io::Error::from(errno),
            }),
        }
    }

    fn open_read(&self, path: &Path) -> Result<FifoReader, ChannelError> {
        Self::open(path, OpenMode::Read).map(|file| FifoReader { file })
    }

    // Fails with ENXIO while nobody holds the read end.
    fn open_write(&self, path: &Path) -> Result<FifoWriter, ChannelError> {
        Self::open(path, OpenMode::Write).map(|file| FifoWriter { file })
    }

    fn write_all(&self, writer: &mut FifoWriter, bytes: &[u8]) -> Result<(), ChannelError> {
        let mut written = 0;
        while written < bytes.len() {
            match writer.file.write(&bytes[written..]) {
                Ok(0) => {
                    return Err(ChannelError::Write {
                        written,
                        len: bytes.len(),
                        source: io::Error::from(io::ErrorKind::WriteZero),
                    })
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(ChannelError::Write {
                        written,
                        len: bytes.len(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    fn read_available(&self, reader: &mut FifoReader) -> Result<Vec<u8>, ChannelError> {
        let mut data = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.file.read(&mut buf) {
                // No writers left: nothing more until one reopens
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if data.is_empty() => return Err(ChannelError::Read(e)),
                Err(e) => {
                    log::error!("read failed after {} bytes: {}", data.len(), e);
                    break;
                }
            }
        }
        Ok(data)
    }

    fn wait_readable(
        &self,
        readers: &[&FifoReader],
        timeout: Duration,
    ) -> Result<Vec<bool>, ChannelError> {
        let mut fds: Vec<PollFd> = readers
            .iter()
            .map(|r| PollFd::new(r.file.as_fd(), PollFlags::POLLIN))
            .collect();

        let millis = timeout.as_millis().min(u16::MAX as u128) as u16;
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(vec![false; readers.len()]),
            Err(errno) => return Err(ChannelError::Poll(io::Error::from(errno))),
        }

        Ok(fds
            .iter()
            .map(|fd| {
                fd.revents()
                    .map_or(false, |ev| ev.contains(PollFlags::POLLIN))
            })
            .collect())
    }
}
