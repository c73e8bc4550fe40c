//! Advisory-locked PID file for single-instance enforcement.
//!
//! No two shipyardd processes may run against the same configuration: the
//! exclusive lock makes a second invocation fail fast instead of racing
//! the first over nginx symlinks and binary swaps.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;

/// Holds the lock for the process lifetime; dropping releases the lock and
/// removes the file.
pub struct PidFile {
    path: PathBuf,
    file: File,
}

impl PidFile {
    /// Create and exclusively lock the PID file. Fails if another instance
    /// holds the lock.
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create pidfile directory {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("create pidfile {}", path.display()))?;

        file.try_lock_exclusive()
            .with_context(|| format!("pidfile {} locked (another instance running)", path.display()))?;

        writeln!(file, "{}", std::process::id()).context("write pid")?;
        file.flush().context("flush pid")?;

        Ok(Self { path, file })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}
