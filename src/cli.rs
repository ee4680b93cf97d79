use std::path::PathBuf;

use clap::Parser;

use crate::settings::Settings;

/// Command-line options. Anything given here overrides the settings file for
/// this run only.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "shotdrop")]
#[command(about = "Uploads clipboard screenshots to a remote host over SFTP", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a settings template to the config path and exit
    #[arg(long)]
    pub init_config: bool,

    /// Remote host name or address
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Remote SSH port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Remote user name
    #[arg(short, long, value_name = "USER")]
    pub user: Option<String>,

    /// Remote directory that receives the screenshots
    #[arg(short = 'd', long, value_name = "DIR")]
    pub remote_dir: Option<String>,

    /// Private key used for authentication
    #[arg(short, long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// known_hosts file used to verify the server
    #[arg(long, value_name = "FILE")]
    pub known_hosts: Option<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Clipboard poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Start with monitoring paused
    #[arg(long)]
    pub paused: bool,

    /// Do not copy the remote path after an upload
    #[arg(long)]
    pub no_auto_copy: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn apply(&self, settings: &mut Settings) {
        let remote = &mut settings.remote;
        if let Some(host) = &self.host {
            remote.host = host.clone();
        }
        if let Some(port) = self.port {
            remote.port = port;
        }
        if let Some(user) = &self.user {
            remote.username = user.clone();
        }
        if let Some(dir) = &self.remote_dir {
            remote.remote_dir = dir.clone();
        }
        if let Some(key) = &self.key {
            remote.key_path = key.clone();
        }
        if let Some(known_hosts) = &self.known_hosts {
            remote.known_hosts_path = known_hosts.clone();
        }

        let capture = &mut settings.capture;
        if let Some(quality) = self.quality {
            capture.jpeg_quality = quality;
        }
        if let Some(interval) = self.interval_ms {
            capture.poll_interval_ms = interval;
        }
        if self.paused {
            capture.start_monitoring = false;
        }
        if self.no_auto_copy {
            capture.auto_copy = false;
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}
