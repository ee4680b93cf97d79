use std::io;

use crate::error::{ConnectionError, TransferError};
use crate::{log_debug, log_info, log_warn};

use super::{remote_join, Connector, RemoteFs, RetryPolicy};

// Set to true to log connection and transfer activity from this module
const ENABLE_LOGS: bool = true;

/// Suffix of the in-flight file; the final name only ever appears via rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// One authenticated channel to the remote directory, with bounded reconnects.
pub struct TransferSession<C: Connector> {
    connector: C,
    channel: Option<C::Channel>,
    remote_dir: String,
    policy: RetryPolicy,
}

impl<C: Connector> TransferSession<C> {
    /// Opens the first channel. Retryable failures are retried under `policy`;
    /// authentication and host key failures return immediately.
    pub fn connect_with(
        connector: C,
        remote_dir: impl Into<String>,
        policy: RetryPolicy,
    ) -> Result<Self, ConnectionError> {
        let mut session = Self {
            connector,
            channel: None,
            remote_dir: remote_dir.into(),
            policy,
        };
        let channel = session.establish()?;
        session.channel = Some(channel);
        log_info!(
            "connected to {} (remote dir {})",
            session.connector.describe(),
            session.remote_dir
        );
        Ok(session)
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Probes the current channel and reconnects when it is gone.
    pub fn ensure_connected(&mut self) -> Result<(), TransferError> {
        if let Some(channel) = self.channel.as_mut() {
            match channel.probe(&self.remote_dir) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    log_warn!(
                        "liveness probe to {} failed: {err}",
                        self.connector.describe()
                    );
                    self.channel = None;
                }
            }
        }

        let attempts = self.policy.max_attempts;
        let channel = self.establish().map_err(|err| {
            if err.is_retryable() {
                TransferError::ConnectionLost {
                    attempts,
                    reason: err.to_string(),
                }
            } else {
                TransferError::Connection(err)
            }
        })?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Writes `bytes` under a temporary name next to `filename`, then renames it
    /// into place. Returns the final remote path.
    pub fn put_atomic(&mut self, bytes: &[u8], filename: &str) -> Result<String, TransferError> {
        validate_filename(filename)?;
        let final_path = remote_join(&self.remote_dir, filename);
        let temp_path = format!("{final_path}{TEMP_SUFFIX}");

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.ensure_connected()?;

            let failure = match self.write_then_rename(bytes, &temp_path, &final_path) {
                Ok(()) => {
                    log_info!("stored {} ({} bytes)", final_path, bytes.len());
                    return Ok(final_path);
                }
                Err(failure) => failure,
            };

            if failure.is_channel_loss() {
                self.channel = None;
            }
            let error = failure.into_error(&temp_path, &final_path);
            if !is_retryable(&error) || attempt >= self.policy.max_attempts {
                self.discard_leftover(&temp_path);
                return Err(error);
            }

            log_warn!(
                "transfer attempt {}/{} for {} failed: {error}",
                attempt,
                self.policy.max_attempts,
                filename
            );
            self.policy.wait(attempt);
        }
    }

    /// Drops the channel; the next transfer reconnects.
    pub fn disconnect(&mut self) {
        self.channel = None;
    }

    fn establish(&mut self) -> Result<C::Channel, ConnectionError> {
        let max = self.policy.max_attempts;
        let mut last_error = ConnectionError::Network {
            host: self.connector.describe(),
            reason: "no connection attempt was made".into(),
        };

        for attempt in 1..=max {
            match self.open_channel() {
                Ok(channel) => {
                    if attempt > 1 {
                        log_info!("connected on attempt {}/{}", attempt, max);
                    }
                    return Ok(channel);
                }
                Err(err) if err.is_retryable() => {
                    log_warn!("connect attempt {}/{} failed: {err}", attempt, max);
                    if attempt < max {
                        self.policy.wait(attempt);
                    }
                    last_error = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error)
    }

    fn open_channel(&mut self) -> Result<C::Channel, ConnectionError> {
        let mut channel = self.connector.open()?;
        if let Err(err) = channel.ensure_dir(&self.remote_dir) {
            return Err(if is_channel_loss(&err) {
                ConnectionError::Network {
                    host: self.connector.describe(),
                    reason: err.to_string(),
                }
            } else {
                ConnectionError::RemoteDirectory {
                    path: self.remote_dir.clone(),
                    reason: err.to_string(),
                }
            });
        }
        Ok(channel)
    }

    fn write_then_rename(
        &mut self,
        bytes: &[u8],
        temp_path: &str,
        final_path: &str,
    ) -> Result<(), StepFailure> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(StepFailure::Write(io::Error::new(
                io::ErrorKind::NotConnected,
                "no open channel",
            )));
        };

        if let Err(err) = channel.write(temp_path, bytes) {
            discard_temp(channel, temp_path, &err);
            return Err(StepFailure::Write(err));
        }
        if let Err(err) = channel.rename(temp_path, final_path) {
            discard_temp(channel, temp_path, &err);
            return Err(StepFailure::Rename(err));
        }
        Ok(())
    }

    // A temp file can outlive a dropped channel; clear it if we are connected again.
    fn discard_leftover(&mut self, temp_path: &str) {
        let Some(channel) = self.channel.as_mut() else {
            log_warn!(
                "channel to {} is gone; {} may be left on the remote",
                self.connector.describe(),
                temp_path
            );
            return;
        };
        if let Err(err) = channel.remove(temp_path) {
            if err.kind() != io::ErrorKind::NotFound {
                log_debug!("could not remove leftover {}: {err}", temp_path);
            }
        }
    }
}

enum StepFailure {
    Write(io::Error),
    Rename(io::Error),
}

impl StepFailure {
    fn is_channel_loss(&self) -> bool {
        match self {
            StepFailure::Write(err) | StepFailure::Rename(err) => is_channel_loss(err),
        }
    }

    fn into_error(self, temp_path: &str, final_path: &str) -> TransferError {
        match self {
            StepFailure::Write(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                TransferError::PermissionDenied {
                    path: temp_path.to_string(),
                }
            }
            StepFailure::Rename(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                TransferError::PermissionDenied {
                    path: final_path.to_string(),
                }
            }
            StepFailure::Write(source) => TransferError::Write {
                path: temp_path.to_string(),
                source,
            },
            StepFailure::Rename(source) => TransferError::Rename {
                from: temp_path.to_string(),
                to: final_path.to_string(),
                source,
            },
        }
    }
}

fn discard_temp<F: RemoteFs>(channel: &mut F, temp_path: &str, cause: &io::Error) {
    if is_channel_loss(cause) {
        return;
    }
    if let Err(err) = channel.remove(temp_path) {
        if err.kind() != io::ErrorKind::NotFound {
            log_debug!("could not remove {} after failure: {err}", temp_path);
        }
    }
}

/// Errors after which the channel itself cannot be trusted any more.
pub(crate) fn is_channel_loss(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
    )
}

fn is_retryable(err: &TransferError) -> bool {
    match err {
        TransferError::Write { source, .. } | TransferError::Rename { source, .. } => {
            source.kind() != io::ErrorKind::AlreadyExists
        }
        _ => false,
    }
}

fn validate_filename(filename: &str) -> Result<(), TransferError> {
    let invalid = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);
    if invalid {
        return Err(TransferError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}
