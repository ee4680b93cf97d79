use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use super::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MonitorPhase {
    #[default]
    Idle,
    Polling,
    Uploading,
    Paused,
}

impl MonitorPhase {
    pub fn label(&self) -> &'static str {
        match self {
            MonitorPhase::Idle => "idle",
            MonitorPhase::Polling => "polling",
            MonitorPhase::Uploading => "uploading",
            MonitorPhase::Paused => "paused",
        }
    }
}

/// Toggles and progress shared between the monitor and the command surface.
/// Nothing here survives a restart.
pub struct MonitorState {
    monitoring: AtomicBool,
    auto_copy: AtomicBool,
    last_fingerprint: RwLock<Fingerprint>,
    phase: RwLock<MonitorPhase>,
}

impl MonitorState {
    pub fn new(monitoring: bool, auto_copy: bool) -> Self {
        Self {
            monitoring: AtomicBool::new(monitoring),
            auto_copy: AtomicBool::new(auto_copy),
            last_fingerprint: RwLock::new(Fingerprint::Empty),
            phase: RwLock::new(MonitorPhase::Idle),
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// An upload in flight keeps its phase; the monitor settles it when the
    /// cycle ends.
    pub fn set_monitoring(&self, enabled: bool) {
        self.monitoring.store(enabled, Ordering::SeqCst);
        let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        *phase = match (*phase, enabled) {
            (MonitorPhase::Paused, true) => MonitorPhase::Polling,
            (MonitorPhase::Polling, false) => MonitorPhase::Paused,
            (current, _) => current,
        };
    }

    /// Returns the new value.
    pub fn toggle_monitoring(&self) -> bool {
        let enabled = !self.monitoring_enabled();
        self.set_monitoring(enabled);
        enabled
    }

    pub fn auto_copy_enabled(&self) -> bool {
        self.auto_copy.load(Ordering::SeqCst)
    }

    pub fn set_auto_copy(&self, enabled: bool) {
        self.auto_copy.store(enabled, Ordering::SeqCst);
    }

    /// Returns the new value.
    pub fn toggle_auto_copy(&self) -> bool {
        !self.auto_copy.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn last_fingerprint(&self) -> Fingerprint {
        *self
            .last_fingerprint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_last_fingerprint(&self, fingerprint: Fingerprint) {
        *self
            .last_fingerprint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fingerprint;
    }

    pub fn phase(&self) -> MonitorPhase {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_phase(&self, phase: MonitorPhase) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            phase: self.phase(),
            monitoring_enabled: self.monitoring_enabled(),
            auto_copy_enabled: self.auto_copy_enabled(),
            last_fingerprint: self.last_fingerprint().short(),
        }
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(true, true)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    pub monitoring_enabled: bool,
    pub auto_copy_enabled: bool,
    pub last_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_report_new_value() {
        let state = MonitorState::default();
        assert!(!state.toggle_monitoring());
        assert!(state.toggle_monitoring());
        assert!(!state.toggle_auto_copy());
        assert!(!state.auto_copy_enabled());
        assert!(state.toggle_auto_copy());
    }

    #[test]
    fn pausing_moves_polling_to_paused_and_back() {
        let state = MonitorState::default();
        state.set_phase(MonitorPhase::Polling);
        state.set_monitoring(false);
        assert_eq!(state.phase(), MonitorPhase::Paused);
        state.set_monitoring(true);
        assert_eq!(state.phase(), MonitorPhase::Polling);
    }

    #[test]
    fn pausing_during_upload_keeps_uploading() {
        let state = MonitorState::default();
        state.set_phase(MonitorPhase::Uploading);
        state.set_monitoring(false);
        assert_eq!(state.phase(), MonitorPhase::Uploading);
        assert!(!state.monitoring_enabled());
    }

    #[test]
    fn idle_is_untouched_by_toggles() {
        let state = MonitorState::new(false, true);
        state.set_monitoring(true);
        assert_eq!(state.phase(), MonitorPhase::Idle);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let state = MonitorState::new(true, false);
        state.set_phase(MonitorPhase::Polling);
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["phase"], "polling");
        assert_eq!(json["monitoringEnabled"], true);
        assert_eq!(json["autoCopyEnabled"], false);
        assert_eq!(json["lastFingerprint"], "empty");
    }
}
