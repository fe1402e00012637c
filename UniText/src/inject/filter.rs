//! Record selection ahead of injection

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::inventory::{AssetType, TextRecord};

/// Why a record was left out of an injection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotTranslated,
    /// Translation is empty or equals the original after trimming
    Unchanged,
    MissingSourceFile,
    /// Container record without an object id
    MissingObjectId,
    /// Translation contains a NUL character
    ContainsNul,
    /// Read-only find from the binary sweep
    BinaryExtraction,
    /// Asset type the injector has no write path for
    UnsupportedAssetType,
}

impl RejectReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NotTranslated => "not translated",
            RejectReason::Unchanged => "translation empty or unchanged",
            RejectReason::MissingSourceFile => "source file missing",
            RejectReason::MissingObjectId => "object id missing",
            RejectReason::ContainsNul => "translation contains NUL",
            RejectReason::BinaryExtraction => "binary sweep find, not re-injectable",
            RejectReason::UnsupportedAssetType => "asset type not injectable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record left out, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub id: String,
    pub source_file: PathBuf,
    pub reason: RejectReason,
}

/// Result of [`filter_records`]
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Surviving records, translated text sanitized
    pub accepted: Vec<TextRecord>,
    pub rejected: Vec<Rejection>,
}

impl FilterOutcome {
    /// Rejections caused by an embedded NUL
    pub fn nul_rejections(&self) -> impl Iterator<Item = &Rejection> {
        self.rejected.iter().filter(|r| r.reason == RejectReason::ContainsNul)
    }

    /// Accepted records grouped by target file, in first-seen order
    #[must_use]
    pub fn group_by_file(&self) -> IndexMap<PathBuf, Vec<&TextRecord>> {
        let mut groups: IndexMap<PathBuf, Vec<&TextRecord>> = IndexMap::new();
        for record in &self.accepted {
            groups.entry(record.source_file.clone()).or_default().push(record);
        }
        groups
    }
}

/// Drop control characters other than tab and line breaks
///
/// NUL is not handled here: a record containing one is rejected outright.
#[must_use]
pub fn sanitize_translation(text: &str) -> String {
    text.chars()
        .filter(|&c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Select the records worth writing back
///
/// Accepted records are copies with their translation sanitized, so
/// filtering the accepted set again returns it unchanged.
#[must_use]
pub fn filter_records(records: &[TextRecord]) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for record in records {
        match check(record) {
            Ok(accepted) => outcome.accepted.push(accepted),
            Err(reason) => {
                tracing::debug!("Skipping record {}: {}", record.id, reason);
                outcome.rejected.push(Rejection {
                    id: record.id.clone(),
                    source_file: record.source_file.clone(),
                    reason,
                });
            }
        }
    }
    outcome
}

fn check(record: &TextRecord) -> Result<TextRecord, RejectReason> {
    if !record.is_translated {
        return Err(RejectReason::NotTranslated);
    }
    if record.translated_text.contains('\0') {
        return Err(RejectReason::ContainsNul);
    }
    let translated = sanitize_translation(&record.translated_text);
    let trimmed = translated.trim();
    if trimmed.is_empty() || trimmed == record.original_text.trim() {
        return Err(RejectReason::Unchanged);
    }
    match record.asset_type {
        AssetType::BinaryExtraction => return Err(RejectReason::BinaryExtraction),
        AssetType::TextAsset | AssetType::MonoBehaviour => {
            if record.object_id.is_none() {
                return Err(RejectReason::MissingObjectId);
            }
        }
        AssetType::TextFile => {}
        AssetType::GameObject | AssetType::Other => return Err(RejectReason::UnsupportedAssetType),
    }
    if record.source_file.as_os_str().is_empty() || !record.source_file.is_file() {
        return Err(RejectReason::MissingSourceFile);
    }

    let mut accepted = record.clone();
    accepted.translated_text = translated;
    Ok(accepted)
}
