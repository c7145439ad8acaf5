use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use scanshelf_application::{ApplicationError, CacheCleanReport};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::paths::{ensure_dir, ensure_parent};

/// File operations on page assets and the quota-managed cache.
#[derive(Debug, Clone)]
pub struct PageStorage {
    cache_root: PathBuf,
}

impl PageStorage {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Copies a file, or a directory tree, to `dst`.
    pub fn copy(&self, src: &Path, dst: &Path) -> Result<(), ApplicationError> {
        let metadata = fs::symlink_metadata(src).map_err(|error| missing_or_storage(src, error))?;
        if !metadata.is_dir() {
            ensure_parent(dst)?;
            fs::copy(src, dst).map_err(|error| storage_error("copy", src, error))?;
            return Ok(());
        }

        for entry in WalkDir::new(src).follow_links(false) {
            let entry = entry.map_err(|error| {
                ApplicationError::Storage(format!("walk {}: {error}", src.display()))
            })?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|error| ApplicationError::Storage(error.to_string()))?;
            let target = dst.join(relative);
            if entry.file_type().is_dir() {
                ensure_dir(&target)?;
            } else {
                ensure_parent(&target)?;
                fs::copy(entry.path(), &target)
                    .map_err(|error| storage_error("copy", entry.path(), error))?;
            }
        }
        Ok(())
    }

    /// Renames `src` to `dst`, falling back to copy-then-delete across
    /// filesystems. If the source cannot be removed after a successful copy
    /// the call fails and the copy at `dst` is left in place.
    pub fn move_path(&self, src: &Path, dst: &Path) -> Result<(), ApplicationError> {
        self.move_path_with(src, dst, |from, to| fs::rename(from, to), remove_any)
    }

    pub(crate) fn move_path_with(
        &self,
        src: &Path,
        dst: &Path,
        rename: impl Fn(&Path, &Path) -> io::Result<()>,
        remove_source: impl Fn(&Path) -> io::Result<()>,
    ) -> Result<(), ApplicationError> {
        ensure_parent(dst)?;
        match rename(src, dst) {
            Ok(()) => return Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(missing_or_storage(src, error));
            }
            Err(error) => {
                debug!(src = %src.display(), dst = %dst.display(), %error, "rename failed, copying");
            }
        }

        self.copy(src, dst)?;
        remove_source(src).map_err(|error| {
            ApplicationError::Storage(format!(
                "copied {} to {} but could not remove the source: {error}",
                src.display(),
                dst.display()
            ))
        })
    }

    /// Deletes a file or a directory tree, children before parents. A path
    /// that does not exist counts as deleted.
    pub fn delete_recursive(&self, path: &Path) -> Result<(), ApplicationError> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(storage_error("stat", path, error)),
        };
        if !metadata.is_dir() {
            return remove_file_if_present(path);
        }

        for entry in WalkDir::new(path).follow_links(false).contents_first(true) {
            let entry = entry.map_err(|error| {
                ApplicationError::Storage(format!("walk {}: {error}", path.display()))
            })?;
            if entry.file_type().is_dir() {
                match fs::remove_dir(entry.path()) {
                    Ok(()) => {}
                    Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                    Err(error) => return Err(storage_error("remove", entry.path(), error)),
                }
            } else {
                remove_file_if_present(entry.path())?;
            }
        }
        Ok(())
    }

    /// Removes `path` only when it is an empty directory. Anything still
    /// inside is kept and reported.
    pub fn remove_dir_if_empty(&self, path: &Path) -> Result<(), ApplicationError> {
        let mut entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(storage_error("read", path, error)),
        };
        if entries.next().is_some() {
            return Err(ApplicationError::Storage(format!(
                "{} is not empty",
                path.display()
            )));
        }
        match fs::remove_dir(path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(storage_error("remove", path, error)),
        }
    }

    /// Evicts the oldest-modified cache files until the cache fits into
    /// `max_bytes`. Symlinks are neither followed nor counted.
    pub fn clean_cache(&self, max_bytes: u64) -> Result<CacheCleanReport, ApplicationError> {
        if !self.cache_root.is_dir() {
            return Ok(CacheCleanReport::default());
        }

        let mut files: Vec<(SystemTime, PathBuf, u64)> = Vec::new();
        for entry in WalkDir::new(&self.cache_root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(%error, "skipping unreadable cache entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, entry.into_path(), metadata.len()));
        }

        let bytes_before: u64 = files.iter().map(|(_, _, size)| size).sum();
        let mut report = CacheCleanReport {
            bytes_before,
            bytes_after: bytes_before,
            files_removed: 0,
        };
        if bytes_before <= max_bytes {
            return Ok(report);
        }

        files.sort();
        for (_, path, size) in files {
            if report.bytes_after <= max_bytes {
                break;
            }
            if !path.starts_with(&self.cache_root) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    report.bytes_after -= size;
                    report.files_removed += 1;
                }
                Err(error) => warn!(path = %path.display(), %error, "cache eviction failed"),
            }
        }

        self.prune_empty_dirs();
        debug!(
            before = report.bytes_before,
            after = report.bytes_after,
            removed = report.files_removed,
            "cache cleaned"
        );
        Ok(report)
    }

    fn prune_empty_dirs(&self) {
        for entry in WalkDir::new(&self.cache_root)
            .follow_links(false)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_dir() {
                // Non-empty directories stay.
                let _ = fs::remove_dir(entry.path());
            }
        }
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn remove_file_if_present(path: &Path) -> Result<(), ApplicationError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(storage_error("remove", path, error)),
    }
}

fn missing_or_storage(path: &Path, error: io::Error) -> ApplicationError {
    if error.kind() == io::ErrorKind::NotFound {
        ApplicationError::MissingAsset(path.display().to_string())
    } else {
        storage_error("stat", path, error)
    }
}

fn storage_error(action: &str, path: &Path, error: io::Error) -> ApplicationError {
    ApplicationError::Storage(format!("{action} {}: {error}", path.display()))
}
