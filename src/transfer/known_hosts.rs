//! Trust-on-first-use host key verification against an OpenSSH `known_hosts` file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ssh2::{CheckResult, KnownHostFileKind, Session};

use crate::error::ConnectionError;
use crate::{log_info, log_warn};

// Set to true to log host key decisions
const ENABLE_LOGS: bool = true;

const ENTRY_COMMENT: &str = "added by shotdrop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTrust {
    /// The presented key matches the recorded one.
    Known,
    /// First contact; the key was appended to the file.
    Recorded,
}

/// Checks the key the server presented during the handshake.
pub fn verify_host_key(
    session: &Session,
    host: &str,
    port: u16,
    known_hosts: &Path,
) -> Result<HostTrust, ConnectionError> {
    let (key, _) = session
        .host_key()
        .ok_or_else(|| ConnectionError::HostKeyUnverifiable {
            host: host.to_string(),
            reason: "server presented no host key".into(),
        })?;
    check_known_host(session, host, port, key, known_hosts)
}

/// Looks `key` (SSH wire format) up in `known_hosts`. Unknown hosts are
/// appended as one new line; existing lines are never rewritten. A different
/// key for a known host is refused.
pub fn check_known_host(
    session: &Session,
    host: &str,
    port: u16,
    key: &[u8],
    known_hosts: &Path,
) -> Result<HostTrust, ConnectionError> {
    let unverifiable = |reason: String| ConnectionError::HostKeyUnverifiable {
        host: host.to_string(),
        reason,
    };

    let mut hosts = session
        .known_hosts()
        .map_err(|e| unverifiable(e.to_string()))?;
    if known_hosts.exists() {
        hosts
            .read_file(known_hosts, KnownHostFileKind::OpenSSH)
            .map_err(|e| unverifiable(format!("reading {}: {e}", known_hosts.display())))?;
    }

    match hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(HostTrust::Known),
        CheckResult::Mismatch => {
            log_warn!(
                "host key for {} differs from {}",
                host_entry(host, port),
                known_hosts.display()
            );
            Err(ConnectionError::HostKeyMismatch {
                host: host_entry(host, port),
            })
        }
        CheckResult::Failure => Err(unverifiable("known_hosts lookup failed".into())),
        CheckResult::NotFound => {
            let entry = host_entry(host, port);
            let line = known_hosts_line(&entry, key).map_err(unverifiable)?;
            append_line(known_hosts, &line)
                .map_err(|e| unverifiable(format!("writing {}: {e}", known_hosts.display())))?;
            log_info!(
                "recorded new host key for {} in {}",
                entry,
                known_hosts.display()
            );
            Ok(HostTrust::Recorded)
        }
    }
}

/// `<host> <key-type> <base64 key> <comment>`; the type is read from the key blob.
fn known_hosts_line(entry: &str, key: &[u8]) -> Result<String, String> {
    let key_type = key_type_name(key).ok_or("host key blob has no readable type")?;
    Ok(format!(
        "{entry} {key_type} {} {ENTRY_COMMENT}",
        STANDARD.encode(key)
    ))
}

fn key_type_name(key: &[u8]) -> Option<&str> {
    let len = u32::from_be_bytes(key.get(..4)?.try_into().ok()?) as usize;
    let name = key.get(4..4usize.checked_add(len)?)?;
    std::str::from_utf8(name)
        .ok()
        .filter(|name| !name.is_empty() && name.is_ascii())
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // Keep the new entry on its own line even if the file lacks a final newline.
    let needs_newline = fs::read(path)
        .map(|bytes| bytes.last().is_some_and(|&b| b != b'\n'))
        .unwrap_or(false);

    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    if needs_newline {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{line}")
}

/// OpenSSH spells non-default ports as `[host]:port`.
fn host_entry(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &[u8] = b"\x00\x00\x00\x07ssh-rsa\x00\x00\x00\x03\x01\x00\x01\x00\x00\x00\x10first-host-key!!";
    const KEY_B: &[u8] = b"\x00\x00\x00\x07ssh-rsa\x00\x00\x00\x03\x01\x00\x01\x00\x00\x00\x10other-host-key!!";

    fn check(path: &Path, host: &str, port: u16, key: &[u8]) -> Result<HostTrust, ConnectionError> {
        let session = Session::new().unwrap();
        check_known_host(&session, host, port, key, path)
    }

    #[test]
    fn first_contact_records_then_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssh").join("known_hosts");

        assert_eq!(check(&path, "shots.example.org", 22, KEY_A).unwrap(), HostTrust::Recorded);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("shots.example.org"));

        assert_eq!(check(&path, "shots.example.org", 22, KEY_A).unwrap(), HostTrust::Known);
    }

    #[test]
    fn changed_key_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        check(&path, "shots.example.org", 22, KEY_A).unwrap();

        let err = check(&path, "shots.example.org", 22, KEY_B).unwrap_err();
        assert!(matches!(err, ConnectionError::HostKeyMismatch { .. }));
        assert!(!err.is_retryable());

        // The file still only trusts the original key.
        assert_eq!(check(&path, "shots.example.org", 22, KEY_A).unwrap(), HostTrust::Known);
    }

    #[test]
    fn custom_port_uses_bracketed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");

        check(&path, "shots.example.org", 2222, KEY_A).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[shots.example.org]:2222"));
        assert_eq!(check(&path, "shots.example.org", 2222, KEY_A).unwrap(), HostTrust::Known);
    }

    #[test]
    fn existing_lines_survive_first_contact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        let original = format!(
            "# my notes about servers\nother.example.org ssh-rsa {}\n",
            STANDARD.encode(KEY_B)
        );
        fs::write(&path, &original).unwrap();

        assert_eq!(check(&path, "shots.example.org", 22, KEY_A).unwrap(), HostTrust::Recorded);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(&original));
        assert_eq!(
            &written[original.len()..],
            format!("shots.example.org ssh-rsa {} {ENTRY_COMMENT}\n", STANDARD.encode(KEY_A))
        );
        assert_eq!(check(&path, "other.example.org", 22, KEY_B).unwrap(), HostTrust::Known);
        assert_eq!(check(&path, "shots.example.org", 22, KEY_A).unwrap(), HostTrust::Known);
    }

    #[test]
    fn missing_final_newline_is_added_before_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        fs::write(&path, "# no trailing newline").unwrap();

        check(&path, "shots.example.org", 22, KEY_A).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# no trailing newline\nshots.example.org ssh-rsa "));
    }

    #[test]
    fn key_type_comes_from_the_blob() {
        assert_eq!(key_type_name(KEY_A), Some("ssh-rsa"));
        assert_eq!(key_type_name(b"\x00\x00\x00\x0bssh-ed25519rest"), Some("ssh-ed25519"));
        assert_eq!(key_type_name(b"\x00\x00\x00\x40short"), None);
        assert_eq!(key_type_name(b"\x00\x00"), None);
    }

    #[test]
    fn entry_format() {
        assert_eq!(host_entry("h", 22), "h");
        assert_eq!(host_entry("h", 2022), "[h]:2022");
    }
}
