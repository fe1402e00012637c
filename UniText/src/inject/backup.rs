//! Timestamped backups taken before a file is modified
//!
//! A run writes into `<backup_root>/<YYYYMMDD_HHMMSS>/`, mirroring each
//! file's path relative to the game directory.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Files at or above this size are verified by size only
pub const MD5_VERIFY_LIMIT: u64 = 50 * 1024 * 1024;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The backup directory of one injection run
#[derive(Debug, Clone)]
pub struct BackupSet {
    dir: PathBuf,
    game_path: PathBuf,
    md5_limit: u64,
}

impl BackupSet {
    /// Create a fresh timestamped directory under `backup_root`
    ///
    /// Two runs within the same second get `_1`, `_2`... suffixes.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn create(backup_root: &Path, game_path: &Path, md5_limit: u64) -> Result<Self> {
        let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut dir = backup_root.join(&stamp);
        let mut n = 0;
        while dir.exists() {
            n += 1;
            dir = backup_root.join(format!("{stamp}_{n}"));
        }
        fs::create_dir_all(&dir)?;
        tracing::info!("Backup directory: {}", dir.display());
        Ok(Self {
            dir,
            game_path: game_path.to_path_buf(),
            md5_limit,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the backup of `original` lives
    #[must_use]
    pub fn backup_path(&self, original: &Path) -> PathBuf {
        match original.strip_prefix(&self.game_path) {
            Ok(relative) => self.dir.join(relative),
            Err(_) => self.dir.join(original.file_name().unwrap_or(original.as_os_str())),
        }
    }

    /// Copy `original` into the set and verify the copy
    ///
    /// # Errors
    /// Returns [`Error::BackupVerification`] if the copy does not match, or
    /// an IO error.
    pub fn back_up(&self, original: &Path) -> Result<PathBuf> {
        let target = self.backup_path(original);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(original, &target)?;
        verify_copy(original, &target, self.md5_limit)?;
        tracing::debug!("Backed up {} to {}", original.display(), target.display());
        Ok(target)
    }
}

/// Compare a copy against its original by size and, below `md5_limit`, MD5
///
/// # Errors
/// Returns [`Error::BackupVerification`] on mismatch.
pub fn verify_copy(original: &Path, copy: &Path, md5_limit: u64) -> Result<()> {
    let mismatch = |reason: String| Error::BackupVerification {
        path: original.to_path_buf(),
        reason,
    };

    let original_size = fs::metadata(original)?.len();
    let copy_size = fs::metadata(copy)?.len();
    if original_size != copy_size {
        return Err(mismatch(format!("size {copy_size} != {original_size}")));
    }
    if original_size < md5_limit {
        let expected = file_md5(original)?;
        let actual = file_md5(copy)?;
        if expected != actual {
            return Err(mismatch(format!("md5 {actual:x} != {expected:x}")));
        }
    }
    Ok(())
}

/// MD5 of a file, read in chunks
///
/// # Errors
/// Returns an IO error if the file cannot be read.
pub fn file_md5(path: &Path) -> Result<md5::Digest> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(context.compute())
}

/// Result of [`restore_backup`]
#[derive(Debug, Clone, Default)]
pub struct RestoreResult {
    /// Number of files copied back
    pub success_count: usize,
    /// Number of files that could not be copied back
    pub fail_count: usize,
    /// One message per file
    pub results: Vec<String>,
}

/// Copy every file of a backup directory back into the game directory
///
/// A file that fails is reported and the rest are still restored.
///
/// # Errors
/// Returns [`Error::BackupNotFound`] if `backup_dir` is not a directory.
pub fn restore_backup(backup_dir: &Path, game_path: &Path) -> Result<RestoreResult> {
    if !backup_dir.is_dir() {
        return Err(Error::BackupNotFound(backup_dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(backup_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();

    let mut result = RestoreResult::default();
    for file in files {
        let Ok(relative) = file.strip_prefix(backup_dir) else {
            continue;
        };
        let target = game_path.join(relative);
        let copied = target
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::copy(&file, &target));
        match copied {
            Ok(_) => {
                tracing::info!("Restored {}", relative.display());
                result.success_count += 1;
                result.results.push(format!("Restored {}", relative.display()));
            }
            Err(e) => {
                tracing::error!("Failed to restore {}: {}", relative.display(), e);
                result.fail_count += 1;
                result.results.push(format!("Failed {}: {e}", relative.display()));
            }
        }
    }
    Ok(result)
}

/// Backup directories under `backup_root`, oldest first
///
/// # Errors
/// Returns an IO error if `backup_root` exists but cannot be listed.
pub fn list_backups(backup_root: &Path) -> Result<Vec<PathBuf>> {
    if !backup_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(backup_root)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backup_mirrors_relative_path() {
        let game = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let data_dir = game.path().join("Game_Data");
        fs::create_dir_all(&data_dir).unwrap();
        let original = data_dir.join("level0.assets");
        fs::write(&original, b"container bytes").unwrap();

        let set = BackupSet::create(backups.path(), game.path(), MD5_VERIFY_LIMIT).unwrap();
        let copy = set.back_up(&original).unwrap();
        assert_eq!(copy, set.dir().join("Game_Data").join("level0.assets"));
        assert_eq!(fs::read(&copy).unwrap(), b"container bytes");
    }

    #[test]
    fn test_same_second_runs_get_distinct_dirs() {
        let game = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let a = BackupSet::create(backups.path(), game.path(), MD5_VERIFY_LIMIT).unwrap();
        let b = BackupSet::create(backups.path(), game.path(), MD5_VERIFY_LIMIT).unwrap();
        assert_ne!(a.dir(), b.dir());
        assert_eq!(list_backups(backups.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_verify_copy_detects_differences() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"abcd").unwrap();
        fs::write(&b, b"abce").unwrap();
        assert!(matches!(
            verify_copy(&a, &b, MD5_VERIFY_LIMIT),
            Err(Error::BackupVerification { .. })
        ));
        // Same size, not hashed under a zero limit
        assert!(verify_copy(&a, &b, 0).is_ok());
        fs::write(&b, b"abc").unwrap();
        assert!(verify_copy(&a, &b, 0).is_err());
    }

    #[test]
    fn test_restore_backup() {
        let game = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let original = game.path().join("sub").join("ui.txt");
        fs::create_dir_all(original.parent().unwrap()).unwrap();
        fs::write(&original, b"before").unwrap();

        let set = BackupSet::create(backups.path(), game.path(), MD5_VERIFY_LIMIT).unwrap();
        set.back_up(&original).unwrap();
        fs::write(&original, b"after").unwrap();

        let result = restore_backup(set.dir(), game.path()).unwrap();
        assert_eq!(result.success_count, 1);
        assert_eq!(result.fail_count, 0);
        assert_eq!(fs::read(&original).unwrap(), b"before");

        assert!(matches!(
            restore_backup(&backups.path().join("missing"), game.path()),
            Err(Error::BackupNotFound(_))
        ));
    }
}
