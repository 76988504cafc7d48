//! Channel endpoints
//!
//! Both ends open the pipe non-blocking. A writer with no reader fails to open (`ENXIO`) and
//! the message is dropped; a reader never blocks longer than the wait it asks for.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, warn};

use crate::protocol::Message;

/// Bytes pulled per read call
const READ_CHUNK: usize = 4096;

/// Write end of a channel
///
/// Each send opens the pipe, writes one newline-terminated record and closes it again, so a
/// reader that restarts never sees a stale writer. Sends from several threads of the same
/// process are serialized.
#[derive(Debug)]
pub struct ChannelWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ChannelWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send raw bytes, appending a newline if missing
    ///
    /// Returns whether the bytes reached an attached reader. Failure is never an error:
    /// a missing pipe, no reader, or a full pipe all drop the record.
    pub fn send(&self, bytes: &[u8]) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = match OpenOptions::new()
            .write(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) => {
                debug!(path = ?self.path, error = %e, "ChannelWriter::send: no reader, dropping");
                return false;
            }
        };

        let mut record = Vec::with_capacity(bytes.len() + 1);
        record.extend_from_slice(bytes.strip_suffix(b"\n").unwrap_or(bytes));
        record.push(b'\n');

        match file.write_all(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = ?self.path, error = %e, len = record.len(), "ChannelWriter::send: write failed, dropping");
                false
            }
        }
    }

    /// Encode and send a message
    pub fn send_message(&self, message: &Message) -> bool {
        debug!(path = ?self.path, kind = %message.kind, "ChannelWriter::send_message: called");
        self.send(message.encode().as_bytes())
    }
}

/// Result of a single read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were appended
    Data(usize),
    /// No data available right now
    Empty,
    /// Every writer has closed its end
    Eof,
}

/// Read end of a channel
#[derive(Debug)]
pub struct ChannelReader {
    path: PathBuf,
    file: File,
}

impl ChannelReader {
    /// Open the pipe for reading without waiting for a writer
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(path)?;
        debug!(?path, "ChannelReader::open: attached");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait up to `timeout` for data or a hang-up
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let millis = timeout.as_millis().min(u16::MAX as u128) as u16;
        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => Ok(false),
            Ok(_) => {
                let ready = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
                Ok(fds[0].revents().is_some_and(|r| r.intersects(ready)))
            }
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    /// Append whatever is available to `buf`
    pub fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<ReadOutcome> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.file.read(&mut chunk) {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                Ok(ReadOutcome::Data(n))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(ReadOutcome::Empty)
            }
            Err(e) => Err(e),
        }
    }
}
