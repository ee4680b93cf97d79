use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::codec::{DEFAULT_QUALITY, DEFAULT_THUMBNAIL_SIZE};
use crate::monitor::{CycleConfig, DEFAULT_POLL_INTERVAL};
use crate::transfer::ssh::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};
use crate::transfer::{Credentials, RetryPolicy};

const APP_DIR: &str = "shotdrop";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub remote_dir: String,
    /// `~/` is expanded.
    pub key_path: PathBuf,
    pub known_hosts_path: PathBuf,
    pub connect_timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            remote_dir: String::new(),
            key_path: PathBuf::from("~/.ssh/id_rsa"),
            known_hosts_path: PathBuf::from("~/.ssh/known_hosts"),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureSettings {
    pub poll_interval_ms: u64,
    pub jpeg_quality: u8,
    pub thumbnail_size: u32,
    pub start_monitoring: bool,
    pub auto_copy: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            jpeg_quality: DEFAULT_QUALITY,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            start_monitoring: true,
            auto_copy: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub capture: CaptureSettings,
    pub retry: RetrySettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let remote = &self.remote;
        if remote.host.trim().is_empty() {
            bail!("remote.host is not set");
        }
        if remote.username.trim().is_empty() {
            bail!("remote.username is not set");
        }
        if remote.remote_dir.trim().is_empty() {
            bail!("remote.remote_dir is not set");
        }
        if remote.port == 0 {
            bail!("remote.port must not be 0");
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            bail!(
                "capture.jpeg_quality must be between 1 and 100, got {}",
                self.capture.jpeg_quality
            );
        }
        if self.capture.poll_interval_ms == 0 {
            bail!("capture.poll_interval_ms must be positive");
        }
        if self.capture.thumbnail_size == 0 {
            bail!("capture.thumbnail_size must be positive");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn key_path(&self) -> PathBuf {
        expand_home(&self.remote.key_path)
    }

    pub fn credentials(&self, passphrase: Option<SecretString>) -> Credentials {
        Credentials {
            host: self.remote.host.clone(),
            port: self.remote.port,
            username: self.remote.username.clone(),
            remote_dir: self.remote.remote_dir.clone(),
            key_path: self.key_path(),
            known_hosts_path: expand_home(&self.remote.known_hosts_path),
            passphrase,
            connect_timeout: Duration::from_secs(self.remote.connect_timeout_secs.max(1)),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }

    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            quality: self.capture.jpeg_quality,
            thumbnail_size: self.capture.thumbnail_size,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture.poll_interval_ms)
    }
}

/// `<config_dir>/shotdrop/settings.json`
pub fn default_settings_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("no configuration directory for this user")?;
    Ok(base.join(APP_DIR).join(SETTINGS_FILE))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads `path`, falling back to defaults when the file does not exist yet.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn settings(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Changes the in-memory copy only; see [`SettingsStore::persist`].
    pub fn update(&self, apply: impl FnOnce(&mut Settings)) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
    }

    pub fn persist(&self) -> Result<()> {
        let data = self.settings();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(&data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Settings {
        let mut settings = Settings::default();
        settings.remote.host = "shots.example.org".into();
        settings.remote.username = "alice".into();
        settings.remote.remote_dir = "/srv/shots".into();
        settings
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(!store.exists());
        assert_eq!(store.settings(), Settings::default());
        assert_eq!(store.settings().capture.jpeg_quality, 85);
        assert_eq!(store.settings().capture.thumbnail_size, 128);
        assert_eq!(store.settings().capture.poll_interval_ms, 500);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "remote": { "host": "h", "username": "u", "remote_dir": "/d" }, "capture": { "jpeg_quality": 70 } }"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).unwrap().settings();
        assert_eq!(settings.remote.host, "h");
        assert_eq!(settings.remote.port, 22);
        assert_eq!(settings.capture.jpeg_quality, 70);
        assert!(settings.capture.auto_copy);
        assert_eq!(settings.retry, RetrySettings::default());
        settings.validate().unwrap();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = SettingsStore::new(path).err().unwrap();
        assert!(format!("{err:#}").contains("Failed to parse settings"));
    }

    #[test]
    fn persist_round_trips_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.update(|s| s.remote.host = "example.net".into());
        store.persist().unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.settings().remote.host, "example.net");
    }

    #[test]
    fn validation_names_the_field() {
        assert!(valid().validate().is_ok());
        assert!(Settings::default()
            .validate()
            .unwrap_err()
            .to_string()
            .contains("remote.host"));

        let mut bad = valid();
        bad.capture.jpeg_quality = 0;
        assert!(bad.validate().unwrap_err().to_string().contains("jpeg_quality"));

        let mut bad = valid();
        bad.retry.max_attempts = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn derived_runtime_values() {
        let settings = valid();
        let policy = settings.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        assert_eq!(settings.poll_interval(), Duration::from_millis(500));
        assert_eq!(settings.cycle_config(), CycleConfig::default());

        let creds = settings.credentials(None);
        assert_eq!(creds.describe(), "alice@shots.example.org:22");
        assert!(!creds.key_path.starts_with("~"));
    }

    #[test]
    fn home_prefix_is_expanded() {
        let absolute = PathBuf::from("/etc/ssh/key");
        assert_eq!(expand_home(&absolute), absolute);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/.ssh/id_rsa")), home.join(".ssh/id_rsa"));
        }
    }
}
