//! Error types for the capture-to-upload pipeline.
//!
//! Each component reports its own enum; the monitor decides at the cycle
//! boundary whether an error is absorbed (notify and keep polling) or fatal
//! (pause monitoring). Messages never carry credential material.

use std::io;

use thiserror::Error;

/// Failures while establishing the authenticated SSH channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// TCP, handshake or channel setup failed; worth retrying.
    #[error("network error talking to {host}: {reason}")]
    Network { host: String, reason: String },

    #[error("authentication as {user} was rejected: {reason}")]
    Authentication { user: String, reason: String },

    /// The host presented a key different from the one recorded in known_hosts.
    #[error("host key for {host} does not match the recorded key; refusing to connect")]
    HostKeyMismatch { host: String },

    #[error("host key for {host} could not be verified: {reason}")]
    HostKeyUnverifiable { host: String, reason: String },

    #[error("private key could not be loaded: {0}")]
    KeyMaterial(String),

    /// The key was only usable with a passphrase that has already been discarded.
    #[error("private key is no longer unlocked; restart to re-enter the passphrase")]
    KeyUnavailable,

    #[error("remote directory {path} is not usable: {reason}")]
    RemoteDirectory { path: String, reason: String },
}

impl ConnectionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectionError::Network { .. })
    }
}

/// Failures of a single atomic put.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid remote filename '{0}'")]
    InvalidFilename(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },

    #[error("permission denied on {path}")]
    PermissionDenied { path: String },

    #[error("connection lost after {attempts} reconnect attempts: {reason}")]
    ConnectionLost { attempts: u32, reason: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl TransferError {
    /// Connection-layer failures that leave the session unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransferError::ConnectionLost { .. } | TransferError::Connection(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard is not accessible: {0}")]
    Access(String),

    #[error("failed to write to the clipboard: {0}")]
    Write(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("malformed bitmap: {0}")]
    Malformed(String),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("failed to decode stored payload: {0}")]
    Decode(#[source] image::ImageError),
}

/// Failures of user-issued commands against history and clipboard.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The id was valid once but the record has since been deleted.
    #[error("screenshot #{0} is no longer in the history")]
    NotFound(u64),

    #[error("no screenshots in the history")]
    Empty,

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        let network = ConnectionError::Network {
            host: "example.org".into(),
            reason: "timed out".into(),
        };
        assert!(network.is_retryable());
        assert!(!ConnectionError::HostKeyMismatch {
            host: "example.org".into()
        }
        .is_retryable());
        assert!(!ConnectionError::KeyUnavailable.is_retryable());
    }

    #[test]
    fn connection_layer_transfer_errors_are_fatal() {
        let lost = TransferError::ConnectionLost {
            attempts: 3,
            reason: "reset".into(),
        };
        assert!(lost.is_fatal());
        assert!(TransferError::from(ConnectionError::KeyUnavailable).is_fatal());
        assert!(!TransferError::PermissionDenied {
            path: "/srv/shots/a.jpg".into()
        }
        .is_fatal());
    }
}
