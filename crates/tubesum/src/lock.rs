//! PID-file instance lock.
//!
//! Guarantees a single active orchestrator per deployment. The lock is a
//! small file holding the owning process id; a recorded process that is no
//! longer alive (or a file that cannot be parsed) counts as stale and is
//! cleared on the next acquire.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// File name of the lock record inside the data directory.
pub const LOCK_FILE_NAME: &str = "processor.pid";

/// Errors from lock acquisition.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("IO error for lock file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// OS process introspection behind a seam so tests can substitute a fake
/// process table.
pub trait ProcessProbe: Send + Sync {
    /// Whether a process with this pid is alive and looks like one of ours.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Production probe backed by the system process table.
pub struct SystemProbe {
    /// Substring the process name must contain to count as ours (matched
    /// case-insensitively). Empty matches any process.
    name_fragment: String,
}

impl SystemProbe {
    pub fn new(name_fragment: &str) -> Self {
        Self {
            name_fragment: name_fragment.to_ascii_lowercase(),
        }
    }
}

impl ProcessProbe for SystemProbe {
    fn is_alive(&self, pid: u32) -> bool {
        use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

        let pid = Pid::from_u32(pid);
        let mut system = System::new_with_specifics(RefreshKind::nothing());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing(),
        );

        match system.process(pid) {
            Some(process) => {
                let name = process.name().to_string_lossy().to_ascii_lowercase();
                name.contains(&self.name_fragment)
            }
            None => false,
        }
    }
}

/// Guard for a held instance lock. Dropping it removes the lock file, so
/// the lock is released on every exit path; a missing file is not an error.
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove lock file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// The instance lock itself.
pub struct InstanceLock {
    path: PathBuf,
    probe: Box<dyn ProcessProbe>,
}

impl InstanceLock {
    /// Lock at the canonical location inside `data_dir`, probing the real
    /// process table for processes whose name contains `name_fragment`.
    pub fn new(data_dir: &Path, name_fragment: &str) -> Self {
        Self::with_probe(
            data_dir.join(LOCK_FILE_NAME),
            Box::new(SystemProbe::new(name_fragment)),
        )
    }

    /// Lock at an explicit path with an injected probe (tests).
    pub fn with_probe(path: PathBuf, probe: Box<dyn ProcessProbe>) -> Self {
        Self { path, probe }
    }

    /// Tries to take the lock. `Ok(None)` means another live orchestrator
    /// holds it and the caller must exit without side effects.
    pub fn acquire(&self) -> Result<Option<LockGuard>, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LockError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => {
                match content.trim().parse::<u32>() {
                    // Our own pid in the file is a leftover, not another
                    // instance.
                    Ok(pid) if pid != std::process::id() && self.probe.is_alive(pid) => {
                        log::info!("Instance lock held by live process {}", pid);
                        return Ok(None);
                    }
                    Ok(pid) => {
                        log::info!("Clearing stale lock for process {}", pid);
                    }
                    Err(_) => {
                        log::warn!("Clearing unreadable lock file {}", self.path.display());
                    }
                }
                if let Err(e) = fs::remove_file(&self.path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        return Err(LockError::Io {
                            path: self.path.clone(),
                            source: e,
                        });
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(LockError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        }

        fs::write(&self.path, std::process::id().to_string()).map_err(|e| LockError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(Some(LockGuard {
            path: self.path.clone(),
        }))
    }
}
