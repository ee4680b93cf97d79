//! Fire-and-forget notices from the monitor to whoever is watching.

use std::fmt;

use tokio::sync::mpsc;

use crate::{log_info, log_warn};

// Set to true to mirror every notice into the log
const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Encode,
    Transfer,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Encode => "encode",
            FailureStage::Transfer => "transfer",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Uploaded {
        id: u64,
        filename: String,
        remote_path: String,
        size_bytes: u64,
        path_copied: bool,
    },
    UploadFailed {
        stage: FailureStage,
        filename: String,
        reason: String,
    },
    /// First failure of a streak; the streak ends at the next good read.
    ClipboardUnavailable { reason: String },
    MonitoringPaused { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Uploaded {
                id,
                filename,
                path_copied,
                ..
            } => {
                write!(f, "#{id} uploaded {filename}")?;
                if *path_copied {
                    f.write_str(" - path copied")?;
                }
                Ok(())
            }
            Notice::UploadFailed {
                stage,
                filename,
                reason,
            } => write!(f, "upload of {filename} failed during {stage}: {reason}"),
            Notice::ClipboardUnavailable { reason } => write!(f, "clipboard unavailable: {reason}"),
            Notice::MonitoringPaused { reason } => write!(f, "monitoring paused: {reason}"),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to the terminal surface. A closed receiver is ignored.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}

/// Writes notices to the log only.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Uploaded { .. } => log_info!("{notice}"),
            _ => log_warn!("{notice}"),
        }
    }
}

/// Sends every notice to each inner notifier in turn.
pub struct Fanout(pub Vec<Box<dyn Notifier>>);

impl Notifier for Fanout {
    fn notify(&self, notice: Notice) {
        for notifier in &self.0 {
            notifier.notify(notice.clone());
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        pub fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_survives_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(Notice::MonitoringPaused {
            reason: "gone".into(),
        });
    }

    #[test]
    fn fanout_reaches_every_notifier() {
        let (first, mut first_rx) = ChannelNotifier::new();
        let (second, mut second_rx) = ChannelNotifier::new();
        let fanout = Fanout(vec![Box::new(first), Box::new(second), Box::new(LogNotifier)]);

        fanout.notify(Notice::ClipboardUnavailable {
            reason: "locked".into(),
        });
        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_ok());
    }

    #[test]
    fn display_names_stage_and_file() {
        let notice = Notice::UploadFailed {
            stage: FailureStage::Transfer,
            filename: "screenshot_20261016_120000_0003.jpg".into(),
            reason: "permission denied".into(),
        };
        assert_eq!(
            notice.to_string(),
            "upload of screenshot_20261016_120000_0003.jpg failed during transfer: permission denied"
        );

        let uploaded = Notice::Uploaded {
            id: 4,
            filename: "a.jpg".into(),
            remote_path: "/srv/a.jpg".into(),
            size_bytes: 10,
            path_copied: true,
        };
        assert_eq!(uploaded.to_string(), "#4 uploaded a.jpg - path copied");
    }
}
