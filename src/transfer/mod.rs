//! Secure delivery of encoded screenshots to the remote host.
//!
//! [`TransferSession`] owns the retry, reconnect and write-then-rename logic.
//! It talks to the remote side only through [`Connector`] and [`RemoteFs`], so
//! the same logic runs over SFTP ([`ssh::SshConnector`]) and over in-memory
//! fakes in tests.

pub mod known_hosts;
pub mod retry;
pub mod session;
pub mod ssh;

#[cfg(test)]
pub(crate) mod fake;

use std::io;

use crate::error::{ConnectionError, TransferError};

pub use retry::RetryPolicy;
pub use session::TransferSession;
pub use ssh::{Credentials, SshConnector};

/// Filesystem operations on an established channel. Errors use `io::ErrorKind`
/// to tell channel loss (`ConnectionReset`, `BrokenPipe`, ...) apart from
/// per-file failures.
pub trait RemoteFs: Send {
    fn write(&mut self, path: &str, bytes: &[u8]) -> io::Result<()>;
    fn rename(&mut self, from: &str, to: &str) -> io::Result<()>;
    fn remove(&mut self, path: &str) -> io::Result<()>;
    /// Cheap round trip used as a liveness check.
    fn probe(&mut self, dir: &str) -> io::Result<()>;
    /// Creates `dir` and any missing parents.
    fn ensure_dir(&mut self, dir: &str) -> io::Result<()>;
}

/// Opens authenticated channels. Called once at startup and again on every
/// reconnect, so implementations keep whatever key context they need.
pub trait Connector: Send {
    type Channel: RemoteFs;

    fn open(&mut self) -> Result<Self::Channel, ConnectionError>;

    /// Human-readable target for logs, e.g. `user@host:22`.
    fn describe(&self) -> String;
}

/// What the monitor needs from a transfer session.
pub trait Uploader: Send {
    fn put_atomic(&mut self, bytes: &[u8], filename: &str) -> Result<String, TransferError>;
}

impl<C: Connector> Uploader for TransferSession<C> {
    fn put_atomic(&mut self, bytes: &[u8], filename: &str) -> Result<String, TransferError> {
        TransferSession::put_atomic(self, bytes, filename)
    }
}

/// Joins the configured directory and a filename with exactly one separator.
pub fn remote_join(dir: &str, filename: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{filename}")
    } else {
        format!("{dir}/{filename}")
    }
}
