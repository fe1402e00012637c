//! Writing translations back into game files
//!
//! Each target file runs through a fixed pipeline, one file at a time:
//!
//! ```text
//! Idle -> BackupCreated -> Loaded -> Mutated -> Verified -> Committed
//! ```
//!
//! Mutation happens on an in-memory copy and the result is written to a
//! temporary file next to the target. The live file is only touched by the
//! final rename, so a failure at any stage leaves it exactly as it was.
//! Per-record failures (schema drift, type mismatch) skip that record;
//! failures from verification onwards fail every record of the file.

mod backup;
mod commit;
mod filter;
mod mutate;
mod verify;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use crate::error::{Error, Result};
use crate::formats::Container;
use crate::inventory::{Inventory, TextRecord};
use crate::progress::{percent, ProgressCallback};
use crate::scanner::FileKind;

pub use backup::{file_md5, list_backups, restore_backup, verify_copy, BackupSet, RestoreResult, MD5_VERIFY_LIMIT};
pub use commit::{commit_replace, CommitPolicy};
pub use filter::{filter_records, sanitize_translation, FilterOutcome, RejectReason, Rejection};
pub use mutate::apply_record;
pub use verify::{ExpectedField, ReloadVerifier, VerificationPlan, Verifier};

/// Injector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectOptions {
    /// Files below this size get an MD5 check of their backup
    pub md5_verify_limit: u64,
    pub commit_attempts: u32,
    /// First retry delay of the final rename, doubled per attempt
    pub commit_backoff_ms: u64,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            md5_verify_limit: MD5_VERIFY_LIMIT,
            commit_attempts: 5,
            commit_backoff_ms: 100,
        }
    }
}

impl InjectOptions {
    fn commit_policy(&self) -> CommitPolicy {
        CommitPolicy {
            attempts: self.commit_attempts,
            initial_backoff: Duration::from_millis(self.commit_backoff_ms),
        }
    }
}

/// How far a file got through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectStage {
    Idle,
    BackupCreated,
    Loaded,
    Mutated,
    Verified,
    Committed,
}

/// What happened to one target file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub stage: InjectStage,
    /// Ids of the records written
    pub applied: Vec<String>,
    /// Ids of the records skipped, with the reason
    pub failed: Vec<(String, String)>,
    /// Set when the whole file failed
    pub error: Option<String>,
}

impl FileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            stage: InjectStage::Idle,
            applied: Vec::new(),
            failed: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.stage == InjectStage::Committed
    }
}

/// Summary of an injection run
#[derive(Debug, Clone, Default, Serialize)]
pub struct InjectionReport {
    /// Records written
    pub success_count: usize,
    /// Records that were selected but could not be written
    pub error_count: usize,
    /// Records the filter left out
    pub skipped: Vec<Rejection>,
    pub files: Vec<FileReport>,
    pub backup_dir: Option<PathBuf>,
    pub cancelled: bool,
}

impl InjectionReport {
    /// Files whose new version replaced the original
    pub fn files_touched(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().filter(|f| f.is_committed()).map(|f| f.path.as_path())
    }

    /// One-line run summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped, {} files modified",
            self.success_count,
            self.error_count,
            self.skipped.len(),
            self.files_touched().count()
        )
    }
}

/// Drives injection for one game directory
pub struct Injector {
    game_path: PathBuf,
    backup_root: PathBuf,
    options: InjectOptions,
    verifier: Box<dyn Verifier + Send + Sync>,
}

impl Injector {
    /// Create an injector writing backups under `backup_root`
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(game_path: P, backup_root: Q) -> Self {
        Self {
            game_path: game_path.into(),
            backup_root: backup_root.into(),
            options: InjectOptions::default(),
            verifier: Box::new(ReloadVerifier),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: InjectOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the post-write integrity check
    #[must_use]
    pub fn with_verifier<V: Verifier + Send + Sync + 'static>(mut self, verifier: V) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    #[must_use]
    pub fn game_path(&self) -> &Path {
        &self.game_path
    }

    /// Inject every translated record of `inventory`
    ///
    /// # Errors
    /// Only fails if the backup directory cannot be created; file-level
    /// failures are reported in the [`InjectionReport`].
    pub fn inject(&self, inventory: &Inventory, progress: ProgressCallback, cancel: &AtomicBool) -> Result<InjectionReport> {
        self.inject_records(&inventory.texts, progress, cancel)
    }

    /// Inject a list of records
    ///
    /// The cancel flag is checked between files; a file already in its
    /// pipeline always runs to completion or failure.
    ///
    /// # Errors
    /// See [`Self::inject`].
    pub fn inject_records(
        &self,
        records: &[TextRecord],
        progress: ProgressCallback,
        cancel: &AtomicBool,
    ) -> Result<InjectionReport> {
        let outcome = filter_records(records);
        let mut report = InjectionReport::default();
        for rejection in outcome.nul_rejections() {
            tracing::warn!("Record {} rejected: {}", rejection.id, rejection.reason);
        }

        let groups = outcome.group_by_file();
        tracing::info!(
            "{} records selected in {} files ({} skipped)",
            outcome.accepted.len(),
            groups.len(),
            outcome.rejected.len()
        );
        report.skipped = outcome.rejected.clone();
        if groups.is_empty() {
            progress(100.0, "Nothing to inject");
            return Ok(report);
        }

        let backups = BackupSet::create(&self.backup_root, &self.game_path, self.options.md5_verify_limit)?;
        report.backup_dir = Some(backups.dir().to_path_buf());

        let total = groups.len();
        for (index, (path, group)) in groups.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!("Injection cancelled, {} files left untouched", total - index);
                report.cancelled = true;
                break;
            }
            let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            progress(percent(index, total), &format!("Injecting {name}"));

            let mut file = FileReport::new(path);
            match self.inject_file(path, group, &backups, &mut file) {
                Ok(()) => {
                    report.success_count += file.applied.len();
                    report.error_count += file.failed.len();
                }
                Err(e) => {
                    tracing::error!("Injection into {} failed at {:?}: {}", path.display(), file.stage, e);
                    file.error = Some(e.to_string());
                    file.applied.clear();
                    report.error_count += group.len();
                }
            }
            report.files.push(file);
        }

        tracing::info!("Injection complete: {}", report.summary());
        progress(100.0, &format!("Injection complete: {}", report.summary()));
        Ok(report)
    }

    fn inject_file(&self, path: &Path, records: &[&TextRecord], backups: &BackupSet, file: &mut FileReport) -> Result<()> {
        if fs::metadata(path)?.permissions().readonly() {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "file is read-only").into());
        }
        if FileKind::of(path) == Some(FileKind::Container) {
            self.inject_container(path, records, backups, file)
        } else {
            self.inject_text_file(path, records, backups, file)
        }
    }

    fn inject_container(&self, path: &Path, records: &[&TextRecord], backups: &BackupSet, file: &mut FileReport) -> Result<()> {
        let safety_copy = backups.back_up(path)?;
        file.stage = InjectStage::BackupCreated;

        let mut container = Container::load(path)?;
        file.stage = InjectStage::Loaded;

        let mut plan = VerificationPlan {
            object_count: container.objects().len(),
            fields: Vec::with_capacity(records.len()),
        };
        for record in records {
            match apply_record(&mut container, record) {
                Ok(expected) => {
                    tracing::debug!("Applied {} to object {}", record.id, expected.path_id);
                    plan.fields.push(expected);
                    file.applied.push(record.id.clone());
                }
                Err(e) => {
                    tracing::warn!("Skipping record {}: {}", record.id, e);
                    file.failed.push((record.id.clone(), e.to_string()));
                }
            }
        }
        if plan.fields.is_empty() {
            tracing::info!("No modification for {}", path.display());
            return Ok(());
        }
        file.stage = InjectStage::Mutated;

        let bytes = container.to_bytes()?;
        drop(container);
        let candidate = write_candidate(path, &bytes)?;
        self.verifier.verify(&candidate, &plan)?;
        file.stage = InjectStage::Verified;

        commit_replace(candidate, path, &safety_copy, self.options.commit_policy())?;
        file.stage = InjectStage::Committed;
        tracing::info!("Injected {} records into {}", file.applied.len(), path.display());
        Ok(())
    }

    /// Whole-file replacement; exactly one record may target the file
    fn inject_text_file(&self, path: &Path, records: &[&TextRecord], backups: &BackupSet, file: &mut FileReport) -> Result<()> {
        let [record] = records else {
            return Err(Error::UnsupportedTextFileConfiguration {
                path: path.to_path_buf(),
                count: records.len(),
            });
        };
        let safety_copy = backups.back_up(path)?;
        file.stage = InjectStage::BackupCreated;

        let candidate = write_candidate(path, record.translated_text.as_bytes())?;
        if fs::read(&candidate)? != record.translated_text.as_bytes() {
            return Err(Error::IntegrityVerification {
                path: candidate.to_path_buf(),
                reason: "text did not read back".to_string(),
            });
        }
        file.stage = InjectStage::Mutated;

        commit_replace(candidate, path, &safety_copy, self.options.commit_policy())?;
        file.stage = InjectStage::Committed;
        file.applied.push(record.id.clone());
        Ok(())
    }
}

/// Write `bytes` to a closed temporary file beside `target`
fn write_candidate(target: &Path, bytes: &[u8]) -> Result<TempPath> {
    let dir = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".unitext-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::AssetType;
    use crate::progress::no_progress;
    use pretty_assertions::assert_eq;

    fn text_record(path: &Path, id: &str, translated: &str) -> TextRecord {
        let mut record = TextRecord::new(id.into(), path.to_path_buf(), AssetType::TextFile, "Hello".into());
        record.translated_text = translated.into();
        record.is_translated = true;
        record
    }

    #[test]
    fn test_text_file_replaced_and_backed_up() {
        let game = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let path = game.path().join("intro.txt");
        fs::write(&path, "Hello").unwrap();

        let injector = Injector::new(game.path(), backups.path());
        let report = injector
            .inject_records(&[text_record(&path, "t", "Bonjour")], &no_progress, &AtomicBool::new(false))
            .unwrap();
        assert_eq!(report.success_count, 1);
        assert_eq!(report.error_count, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "Bonjour");
        let backup = report.backup_dir.unwrap().join("intro.txt");
        assert_eq!(fs::read_to_string(backup).unwrap(), "Hello");
    }

    #[test]
    fn test_two_records_for_one_text_file_fail() {
        let game = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let path = game.path().join("intro.txt");
        fs::write(&path, "Hello").unwrap();

        let records = [text_record(&path, "a", "Bonjour"), text_record(&path, "b", "Salut")];
        let report = Injector::new(game.path(), backups.path())
            .inject_records(&records, &no_progress, &AtomicBool::new(false))
            .unwrap();
        assert_eq!(report.success_count, 0);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.files[0].stage, InjectStage::Idle);
        assert_eq!(fs::read_to_string(&path).unwrap(), "Hello");
    }

    #[test]
    fn test_nothing_selected_creates_no_backup() {
        let game = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let path = game.path().join("intro.txt");
        fs::write(&path, "Hello").unwrap();
        let mut record = text_record(&path, "a", "Bonjour");
        record.is_translated = false;

        let report = Injector::new(game.path(), backups.path())
            .inject_records(&[record], &no_progress, &AtomicBool::new(false))
            .unwrap();
        assert!(report.backup_dir.is_none());
        assert_eq!(report.skipped.len(), 1);
        assert!(list_backups(backups.path()).unwrap().is_empty());
    }

    #[test]
    fn test_cancel_leaves_files_untouched() {
        let game = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let path = game.path().join("intro.txt");
        fs::write(&path, "Hello").unwrap();

        let report = Injector::new(game.path(), backups.path())
            .inject_records(&[text_record(&path, "t", "Bonjour")], &no_progress, &AtomicBool::new(true))
            .unwrap();
        assert!(report.cancelled);
        assert!(report.files.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Hello");
    }
}
