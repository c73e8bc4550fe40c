//! shipyard-store — commit-addressed frontend artifact store.
//!
//! Deployed frontend trees live under `<frontend_root>/<commit_id>/`, one
//! immutable directory per commit. The currently served commit is named by
//! the `<frontend_root>/latest` symlink, which is swapped atomically
//! (create-temp-link-and-rename) so a crash can never leave a dangling or
//! half-written pointer. Build tools that nest their output one level down
//! (`dist/`, `build/`, `out/`, `public/`) are detected and the symlink
//! points inside the commit directory instead.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

pub mod error;

pub use error::{StoreError, StoreResult};

/// Build output sub-directories probed for `index.html`, in fixed priority
/// order. First match wins.
const BUILD_SUBDIRS: &[&str] = &["dist", "build", "out", "public"];

/// Written into the commit root when the artifact ships no robots.txt.
const DEFAULT_ROBOTS_TXT: &str = "User-agent: *\nAllow: /\n";

/// Unpack a zipped frontend artifact into `<site_root>/<commit_id>/`.
///
/// Every entry path is sanitised before extraction: absolute paths, `..`
/// traversal, and anything else that would resolve outside the commit
/// directory is rejected. An extraction error aborts without cleanup — the
/// commit id is content-bound, so a retry simply overwrites in place.
pub fn unpack(site_root: &Path, commit_id: &str, zip_bytes: &[u8]) -> StoreResult<()> {
    let commit_dir = site_root.join(commit_id);
    fs::create_dir_all(&commit_dir)?;
    fs::set_permissions(&commit_dir, fs::Permissions::from_mode(0o755))?;

    let mut archive =
        ZipArchive::new(Cursor::new(zip_bytes)).map_err(|e| StoreError::InvalidZip(e.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| StoreError::InvalidZip(e.to_string()))?;
        let rel = sanitize_entry_path(entry.name())?;
        let Some(rel) = rel else {
            // Entry cleaned away to nothing ("." and friends).
            continue;
        };
        let target = commit_dir.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
    }

    let robots = commit_dir.join("robots.txt");
    if !robots.exists() {
        fs::write(&robots, DEFAULT_ROBOTS_TXT)?;
    }

    debug!(commit = %commit_id, dir = %commit_dir.display(), "artifact unpacked");
    Ok(())
}

/// Atomically point `<site_root>/latest` at the freshly unpacked commit.
///
/// Heals a pre-existing regular file or directory named `latest` (from a
/// manual install), then creates `latest.tmp` and renames it over `latest`.
pub fn promote_latest(site_root: &Path, commit_id: &str) -> StoreResult<()> {
    let latest = site_root.join("latest");
    let tmp = site_root.join("latest.tmp");

    // Leftover from an interrupted previous promotion.
    let _ = fs::remove_file(&tmp);

    if let Ok(meta) = fs::symlink_metadata(&latest) {
        if !meta.file_type().is_symlink() {
            if meta.is_dir() {
                fs::remove_dir_all(&latest)?;
            } else {
                fs::remove_file(&latest)?;
            }
        }
    }

    let target = detect_content_dir(site_root, commit_id);
    std::os::unix::fs::symlink(&target, &tmp)?;
    if let Err(e) = fs::rename(&tmp, &latest) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    info!(commit = %commit_id, target = %target.display(), "latest promoted");
    Ok(())
}

/// Pull a named binary out of a zipped backend artifact into a temp file
/// with the executable bit set. The returned handle deletes the file when
/// dropped, so callers keep it alive until the copy into the jail is done.
pub fn extract_binary(zip_bytes: &[u8], binary_name: &str) -> StoreResult<tempfile::NamedTempFile> {
    let mut archive =
        ZipArchive::new(Cursor::new(zip_bytes)).map_err(|e| StoreError::InvalidZip(e.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| StoreError::InvalidZip(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let matches = Path::new(entry.name())
            .file_name()
            .is_some_and(|n| n == std::ffi::OsStr::new(binary_name));
        if !matches {
            continue;
        }

        let mut tmp = tempfile::Builder::new().prefix("shipyard-binary-").tempfile()?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        tmp.write_all(&data)?;
        tmp.flush()?;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o755))?;
        return Ok(tmp);
    }

    Err(StoreError::BinaryNotFound(binary_name.to_string()))
}

/// The symlink target for a commit: the commit directory itself, or the
/// first recognised build sub-directory containing an `index.html`.
fn detect_content_dir(site_root: &Path, commit_id: &str) -> PathBuf {
    let commit_dir = site_root.join(commit_id);
    for subdir in BUILD_SUBDIRS {
        if commit_dir.join(subdir).join("index.html").is_file() {
            return PathBuf::from(commit_id).join(subdir);
        }
    }
    PathBuf::from(commit_id)
}

/// Reject zip entry paths that would escape the extraction root.
///
/// Returns `Ok(None)` for paths that clean away to nothing.
fn sanitize_entry_path(raw: &str) -> StoreResult<Option<PathBuf>> {
    let path = Path::new(raw);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::ZipSlip(raw.to_string()));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(clean))
}
