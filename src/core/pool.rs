//! Per-file write serialization for whole-document stores.
//!
//! Every managed file (config, history, rotating log) is rewritten in full on
//! each mutation. Two overlapping read-modify-write cycles on the same file
//! would lose an update, so each cycle runs under a mutex keyed by the file
//! path. Cycles on different files proceed in parallel.
//!
//! Locks are in-process only. Paths are used as given (not canonicalized), so
//! two spellings of the same file get two locks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Per-file entry holding the write mutex.
struct LockEntry {
    write_lock: Mutex<()>,
}

/// Registry of per-file mutexes.
pub struct FileLockPool {
    entries: Mutex<HashMap<PathBuf, &'static LockEntry>>,
}

impl FileLockPool {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_entry(&self, path: &Path) -> &'static LockEntry {
        // A poisoned registry only means another thread panicked while
        // inserting; the map itself is still consistent.
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = entries.get(path) {
            return entry;
        }
        let entry: &'static LockEntry = Box::leak(Box::new(LockEntry {
            write_lock: Mutex::new(()),
        }));
        entries.insert(path.to_path_buf(), entry);
        entry
    }

    /// Run `f` while holding the write lock for `path`.
    pub fn with_lock<F, R>(&self, path: &Path, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let entry = self.get_entry(path);
        let _guard = entry
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }
}

/// Global pool instance (same lifetime as the process).
pub fn global_pool() -> &'static FileLockPool {
    static POOL: OnceLock<FileLockPool> = OnceLock::new();
    POOL.get_or_init(FileLockPool::new)
}
