//! In-memory remote used to inject transfer and connection faults in tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use crate::error::ConnectionError;

use super::{Connector, RemoteFs};

#[derive(Debug, Clone, Copy)]
pub enum WriteFault {
    /// Nothing is written.
    Fail(io::ErrorKind),
    /// Half of the payload lands on the remote, then the error.
    Truncate(io::ErrorKind),
}

#[derive(Debug, Default)]
pub struct RemoteState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    pub connect_failures: VecDeque<ConnectionError>,
    pub write_faults: VecDeque<WriteFault>,
    pub rename_faults: VecDeque<io::ErrorKind>,
    pub probe_faults: VecDeque<io::ErrorKind>,
    pub dir_faults: VecDeque<io::ErrorKind>,
    pub opens: usize,
    pub writes: usize,
    pub renames: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            remote: self.clone(),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut RemoteState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.with(|s| s.files.get(path).cloned())
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.with(|s| s.files.contains_key(path))
    }

    pub fn paths(&self) -> Vec<String> {
        self.with(|s| s.files.keys().cloned().collect())
    }

    pub fn opens(&self) -> usize {
        self.with(|s| s.opens)
    }
}

#[derive(Debug)]
pub struct FakeConnector {
    remote: FakeRemote,
}

impl Connector for FakeConnector {
    type Channel = FakeChannel;

    fn open(&mut self) -> Result<FakeChannel, ConnectionError> {
        self.remote.with(|s| {
            s.opens += 1;
            match s.connect_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })?;
        Ok(FakeChannel {
            remote: self.remote.clone(),
        })
    }

    fn describe(&self) -> String {
        "tester@fake:22".to_string()
    }
}

#[derive(Debug)]
pub struct FakeChannel {
    remote: FakeRemote,
}

impl RemoteFs for FakeChannel {
    fn write(&mut self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.remote.with(|s| {
            s.writes += 1;
            match s.write_faults.pop_front() {
                Some(WriteFault::Fail(kind)) => Err(io::Error::new(kind, "injected write fault")),
                Some(WriteFault::Truncate(kind)) => {
                    s.files
                        .insert(path.to_string(), bytes[..bytes.len() / 2].to_vec());
                    Err(io::Error::new(kind, "injected truncated write"))
                }
                None => {
                    s.files.insert(path.to_string(), bytes.to_vec());
                    Ok(())
                }
            }
        })
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        self.remote.with(|s| {
            s.renames += 1;
            if let Some(kind) = s.rename_faults.pop_front() {
                return Err(io::Error::new(kind, "injected rename fault"));
            }
            if s.files.contains_key(to) {
                return Err(io::Error::new(io::ErrorKind::AlreadyExists, "target exists"));
            }
            let bytes = s
                .files
                .remove(from)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
            s.files.insert(to.to_string(), bytes);
            Ok(())
        })
    }

    fn remove(&mut self, path: &str) -> io::Result<()> {
        self.remote.with(|s| match s.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        })
    }

    fn probe(&mut self, _dir: &str) -> io::Result<()> {
        self.remote.with(|s| match s.probe_faults.pop_front() {
            Some(kind) => Err(io::Error::new(kind, "injected probe fault")),
            None => Ok(()),
        })
    }

    fn ensure_dir(&mut self, dir: &str) -> io::Result<()> {
        self.remote.with(|s| {
            if let Some(kind) = s.dir_faults.pop_front() {
                return Err(io::Error::new(kind, "injected directory fault"));
            }
            s.dirs.insert(dir.to_string());
            Ok(())
        })
    }
}
