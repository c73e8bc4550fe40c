//! shipyard-update — atomic self-update of the daemon binary.
//!
//! Three paths take part in a replacement: the live binary `P`, the
//! incoming candidate `P.new`, and the backup `P.old`. Because `rename(2)`
//! is atomic within a filesystem, there is no window in which `P` is
//! missing or non-executable once the first update has completed. The
//! candidate must pass a `version` spawn before it is allowed anywhere near
//! `P`.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

pub mod error;

pub use error::{UpdateError, UpdateResult};

/// How long the candidate binary gets to answer `version`.
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handles the `P` / `P.new` / `P.old` replacement dance for one binary
/// path.
#[derive(Debug, Clone)]
pub struct Updater {
    binary_path: PathBuf,
}

impl Updater {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Perform an update from raw binary bytes.
    ///
    /// 1. Write the candidate to `P.new` (0755, fsynced).
    /// 2. Spawn `P.new version`; non-zero exit or a 10 s timeout aborts and
    ///    deletes the candidate.
    /// 3. Remove any stale `P.old`, rename `P → P.old`, rename `P.new → P`.
    ///    A failed final rename attempts to restore `P.old → P`.
    pub async fn update(&self, new_binary: &[u8]) -> UpdateResult<()> {
        let new_path = self.new_path();
        let old_path = self.old_path();

        self.write_candidate(&new_path, new_binary)?;

        if let Err(e) = self.validate(&new_path).await {
            let _ = fs::remove_file(&new_path);
            return Err(e);
        }

        if let Err(e) = self.replace(&new_path, &old_path) {
            let _ = fs::remove_file(&new_path);
            return Err(e);
        }

        info!(path = %self.binary_path.display(), "binary updated");
        Ok(())
    }

    /// A backup from a previous update exists.
    pub fn has_backup(&self) -> bool {
        self.old_path().is_file()
    }

    /// Restore the previous binary from `P.old`.
    ///
    /// The current binary is parked at `P.new` during the swap so a failed
    /// second rename can be undone, and removed once the backup is in
    /// place.
    pub fn rollback(&self) -> UpdateResult<()> {
        let old_path = self.old_path();
        let new_path = self.new_path();

        if !old_path.is_file() {
            return Err(UpdateError::NoBackup(old_path.display().to_string()));
        }

        let _ = fs::remove_file(&new_path);
        fs::rename(&self.binary_path, &new_path).map_err(UpdateError::Swap)?;

        if let Err(e) = fs::rename(&old_path, &self.binary_path) {
            // Put the current binary back.
            let _ = fs::rename(&new_path, &self.binary_path);
            return Err(UpdateError::Swap(e));
        }

        let _ = fs::remove_file(&new_path);
        info!(path = %self.binary_path.display(), "rolled back to previous binary");
        Ok(())
    }

    /// Log a startup notice when a backup is still lying around.
    pub fn warn_if_backup_present(&self) {
        if self.has_backup() {
            warn!(
                path = %self.old_path().display(),
                "backup binary exists from previous update; run 'shipyardd rollback' to restore it"
            );
        }
    }

    fn new_path(&self) -> PathBuf {
        append_extension(&self.binary_path, "new")
    }

    fn old_path(&self) -> PathBuf {
        append_extension(&self.binary_path, "old")
    }

    fn write_candidate(&self, path: &PathBuf, data: &[u8]) -> UpdateResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(UpdateError::Write)?;
        }
        let mut file = fs::File::create(path).map_err(UpdateError::Write)?;
        file.write_all(data).map_err(UpdateError::Write)?;
        file.sync_all().map_err(UpdateError::Write)?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(UpdateError::Write)?;
        Ok(())
    }

    /// Run `<candidate> version` and require a zero exit within the
    /// timeout.
    async fn validate(&self, path: &PathBuf) -> UpdateResult<()> {
        let mut child = tokio::process::Command::new(path)
            .arg("version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| UpdateError::Validation(format!("spawn candidate: {e}")))?;

        match tokio::time::timeout(VALIDATE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(UpdateError::Validation(format!(
                "candidate exited with {status}"
            ))),
            Ok(Err(e)) => Err(UpdateError::Validation(format!("wait on candidate: {e}"))),
            Err(_) => {
                let _ = child.start_kill();
                Err(UpdateError::Validation("candidate timed out".to_string()))
            }
        }
    }

    fn replace(&self, new_path: &PathBuf, old_path: &PathBuf) -> UpdateResult<()> {
        // Stale backup from the update before last.
        let _ = fs::remove_file(old_path);

        fs::rename(&self.binary_path, old_path).map_err(UpdateError::Swap)?;

        if let Err(e) = fs::rename(new_path, &self.binary_path) {
            if let Err(restore) = fs::rename(old_path, &self.binary_path) {
                return Err(UpdateError::SwapAndRestoreFailed {
                    swap: e.to_string(),
                    restore: restore.to_string(),
                });
            }
            return Err(UpdateError::Swap(e));
        }
        Ok(())
    }
}

/// `/path/to/bin` → `/path/to/bin.ext` (std `set_extension` would clobber
/// an existing extension).
fn append_extension(path: &PathBuf, ext: &str) -> PathBuf {
    let mut s = path.clone().into_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}
