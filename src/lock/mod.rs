//! File-Lock Manager (C9): coordinates concurrent file edits between this
//! process and others, including other invocations of the same tool
//! (spec.md §4.8).
//!
//! No crate in this project's dependency stack wraps `flock`/`LockFileEx`,
//! so the OS advisory lock is approximated by atomic lock-file creation
//! (`O_EXCL`-equivalent `create_new`) rather than a second, independent
//! kernel-level lock — see DESIGN.md.

use crate::error::LockError;
use chrono::{DateTime, Utc};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// On-disk record for one held lock (spec.md §6 "Lock files on disk").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub file_path: String,
    pub pid: u32,
    pub session_id: String,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalChangeKind {
    Write,
    Remove,
    Rename,
}

#[derive(Debug, Clone)]
pub struct ExternalChangeEvent {
    pub file_path: PathBuf,
    pub kind: ExternalChangeKind,
}

pub type ChangeCallback = Arc<dyn Fn(ExternalChangeEvent) + Send + Sync>;

pub struct FileLockManager {
    lock_dir: PathBuf,
    ttl: Duration,
    session_id: String,
    table: Mutex<HashMap<PathBuf, LockInfo>>,
    callbacks: Arc<Mutex<HashMap<PathBuf, Vec<ChangeCallback>>>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

fn lock_file_name(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{hex}.lock")
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn pid_is_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}")])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(true)
}

impl FileLockManager {
    pub fn new(lock_dir: impl Into<PathBuf>, ttl: Duration) -> std::io::Result<Self> {
        let lock_dir = lock_dir.into();
        std::fs::create_dir_all(&lock_dir)?;
        Ok(Self {
            lock_dir,
            ttl,
            session_id: format!("{:x}", std::process::id()),
            table: Mutex::new(HashMap::new()),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            watcher: Mutex::new(None),
        })
    }

    fn lock_file_path(&self, path: &Path) -> PathBuf {
        self.lock_dir.join(lock_file_name(path))
    }

    fn is_stale(info: &LockInfo) -> bool {
        Utc::now() > info.expires_at || !pid_is_alive(info.pid)
    }

    /// Acquire an exclusive lock on `path` for `reason` (spec.md §4.8
    /// "Acquire"). Re-acquiring a path this same manager already holds is
    /// idempotent: it updates the recorded reason in place rather than
    /// touching the underlying lock file's exclusivity (spec.md §8 scenario
    /// 6).
    #[tracing::instrument(skip(self))]
    pub fn acquire(&self, path: &Path, reason: &str) -> Result<(), LockError> {
        if self.table.lock().contains_key(path) {
            return self.update_reason(path, reason);
        }

        let lock_file = self.lock_file_path(path);

        if let Ok(contents) = std::fs::read_to_string(&lock_file) {
            if let Ok(existing) = serde_json::from_str::<LockInfo>(&contents) {
                if !Self::is_stale(&existing) {
                    return Err(LockError::FileLocked {
                        path: path.to_path_buf(),
                        holder_pid: existing.pid,
                        reason: existing.reason,
                    });
                }
                std::fs::remove_file(&lock_file)?;
            }
        }

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_file)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    LockError::FileLocked {
                        path: path.to_path_buf(),
                        holder_pid: 0,
                        reason: "lost the race to acquire this lock".to_string(),
                    }
                } else {
                    LockError::Io(e)
                }
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(std::fs::Permissions::from_mode(0o644));
        }
        drop(file);

        let now = Utc::now();
        let info = LockInfo {
            file_path: path.to_string_lossy().to_string(),
            pid: std::process::id(),
            session_id: self.session_id.clone(),
            locked_at: now,
            expires_at: now + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::seconds(300)),
            reason: reason.to_string(),
        };
        std::fs::write(&lock_file, serde_json::to_vec_pretty(&info)?)?;

        self.watch(path);
        self.table.lock().insert(path.to_path_buf(), info);
        crate::log_event!("lock", "acquired", "{}: {reason}", path.display());
        Ok(())
    }

    /// Update the recorded reason for an already-held lock without
    /// re-acquiring the underlying lock file.
    #[tracing::instrument(skip(self))]
    pub fn update_reason(&self, path: &Path, reason: &str) -> Result<(), LockError> {
        let mut table = self.table.lock();
        let info = table.get_mut(path).ok_or_else(|| LockError::LockNotHeld {
            path: path.to_path_buf(),
        })?;
        info.reason = reason.to_string();
        std::fs::write(self.lock_file_path(path), serde_json::to_vec_pretty(info)?)?;
        Ok(())
    }

    /// Release a lock held by this manager (spec.md §4.8 "Release").
    #[tracing::instrument(skip(self))]
    pub fn release(&self, path: &Path) -> Result<(), LockError> {
        let mut table = self.table.lock();
        if table.remove(path).is_none() {
            return Err(LockError::LockNotHeld {
                path: path.to_path_buf(),
            });
        }
        let lock_file = self.lock_file_path(path);
        if lock_file.exists() {
            std::fs::remove_file(lock_file)?;
        }
        self.callbacks.lock().remove(path);
        crate::log_event!("lock", "released", "{}", path.display());
        Ok(())
    }

    /// Scan the lock directory and delete any lock file whose `LockInfo` has
    /// expired or whose holder PID is dead (spec.md §4.8 "Stale-lock cleanup").
    #[tracing::instrument(skip(self))]
    pub fn cleanup_stale(&self) -> usize {
        let mut removed = 0;
        let Ok(entries) = std::fs::read_dir(&self.lock_dir) else {
            return 0;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            let Ok(contents) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(info) = serde_json::from_str::<LockInfo>(&contents) else {
                continue;
            };
            if Self::is_stale(&info) {
                let _ = std::fs::remove_file(&path);
                removed += 1;
            }
        }
        if removed > 0 {
            crate::debug_event!("lock", "stale locks reclaimed", "{removed} lock file(s)");
        }
        removed
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.table.lock().contains_key(path)
    }

    /// Register a callback invoked on external writes/removes/renames to a
    /// locked path.
    #[tracing::instrument(skip(self, callback))]
    pub fn on_external_change(&self, path: &Path, callback: ChangeCallback) {
        self.callbacks.lock().entry(path.to_path_buf()).or_default().push(callback);
    }

    fn watch(&self, path: &Path) {
        let watched_path = path.to_path_buf();

        let mut watcher_guard = self.watcher.lock();
        if watcher_guard.is_none() {
            let callbacks = self.callbacks.clone();
            let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let Ok(event) = res else { return };
                let kind = match event.kind {
                    notify::EventKind::Modify(_) => ExternalChangeKind::Write,
                    notify::EventKind::Remove(_) => ExternalChangeKind::Remove,
                    notify::EventKind::Create(_) => ExternalChangeKind::Write,
                    _ => return,
                };
                for changed in &event.paths {
                    let callbacks = callbacks.lock();
                    if let Some(cbs) = callbacks.get(changed) {
                        for cb in cbs {
                            cb(ExternalChangeEvent {
                                file_path: changed.clone(),
                                kind,
                            });
                        }
                    }
                }
            });
            if let Ok(w) = watcher {
                *watcher_guard = Some(w);
            }
        }

        if let Some(watcher) = watcher_guard.as_mut() {
            let _ = watcher.watch(&watched_path, RecursiveMode::NonRecursive);
        }
    }
}
