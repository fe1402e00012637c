//! Text inventory: the JSON interchange between scan, translation and injection
//!
//! The file is a single object with `game_path`, `scan_date`,
//! `total_texts`, `texts` and `scan_options`. Keys this crate does not know
//! about, at either level, are kept and written back unchanged.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::formats::ContentType;
use crate::scanner::ScanOptions;

/// Which mutation strategy a record needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetType {
    TextAsset,
    MonoBehaviour,
    /// GameObject and Transform finds
    #[serde(alias = "Transform")]
    GameObject,
    Other,
    TextFile,
    /// Found by the binary sweep; never re-injected structurally
    BinaryExtraction,
}

impl AssetType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::TextAsset => "TextAsset",
            AssetType::MonoBehaviour => "MonoBehaviour",
            AssetType::GameObject => "GameObject",
            AssetType::Other => "Other",
            AssetType::TextFile => "TextFile",
            AssetType::BinaryExtraction => "BinaryExtraction",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Sweep variant that produced a [`AssetType::BinaryExtraction`] record
pub mod extraction_method {
    pub const RAW_SWEEP: &str = "raw_sweep";
    pub const DECOMPRESSED_SWEEP: &str = "decompressed_sweep";
}

/// One discovered string, end to end
///
/// Older inventories name the object id `path_id`, and some write an empty
/// `field_path` for non-MonoBehaviour records. Both spellings are recorded
/// in [`RecordKeys`] on load and written back the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRecord", into = "StoredRecord")]
pub struct TextRecord {
    pub id: String,
    pub source_file: PathBuf,
    /// Path id of the object inside its container (sweep ordinal for sweep finds)
    pub object_id: Option<i64>,
    pub asset_type: AssetType,
    /// Dotted/indexed path to the leaf, MonoBehaviour records only
    pub field_path: String,
    pub original_text: String,
    pub translated_text: String,
    pub is_translated: bool,
    pub extraction_date: String,
    pub asset_name: Option<String>,
    pub content_type: Option<ContentType>,
    pub extraction_method: Option<String>,
    /// Bundle directory entry holding the object
    pub bundle_entry: Option<String>,
    /// Field name to value kind, for TextAsset records
    pub data_properties: Option<BTreeMap<String, String>>,
    pub extra: Map<String, Value>,
    pub keys: RecordKeys,
}

/// How a loaded record spelled its optional keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordKeys {
    /// The object id was read from `path_id`
    pub path_id: bool,
    /// `field_path` was present even though empty
    pub empty_field_path: bool,
}

/// On-disk shape of a [`TextRecord`]
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    source_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path_id: Option<i64>,
    asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field_path: Option<String>,
    original_text: String,
    #[serde(default)]
    translated_text: String,
    #[serde(default)]
    is_translated: bool,
    #[serde(default)]
    extraction_date: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    asset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extraction_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bundle_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_properties: Option<BTreeMap<String, String>>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<StoredRecord> for TextRecord {
    fn from(stored: StoredRecord) -> Self {
        let mut extra = stored.extra;
        // With both keys present, `object_id` is authoritative and `path_id` rides along untouched
        let keys = RecordKeys {
            path_id: stored.object_id.is_none() && stored.path_id.is_some(),
            empty_field_path: stored.field_path.as_deref() == Some(""),
        };
        if let (Some(_), Some(path_id)) = (stored.object_id, stored.path_id) {
            extra.insert("path_id".to_string(), Value::from(path_id));
        }
        Self {
            id: stored.id,
            source_file: stored.source_file,
            object_id: stored.object_id.or(stored.path_id),
            asset_type: stored.asset_type,
            field_path: stored.field_path.unwrap_or_default(),
            original_text: stored.original_text,
            translated_text: stored.translated_text,
            is_translated: stored.is_translated,
            extraction_date: stored.extraction_date,
            asset_name: stored.asset_name,
            content_type: stored.content_type,
            extraction_method: stored.extraction_method,
            bundle_entry: stored.bundle_entry,
            data_properties: stored.data_properties,
            extra,
            keys,
        }
    }
}

impl From<TextRecord> for StoredRecord {
    fn from(record: TextRecord) -> Self {
        let (object_id, path_id) = if record.keys.path_id {
            (None, record.object_id)
        } else {
            (record.object_id, None)
        };
        let field_path = if record.field_path.is_empty() && !record.keys.empty_field_path {
            None
        } else {
            Some(record.field_path)
        };
        Self {
            id: record.id,
            source_file: record.source_file,
            object_id,
            path_id,
            asset_type: record.asset_type,
            field_path,
            original_text: record.original_text,
            translated_text: record.translated_text,
            is_translated: record.is_translated,
            extraction_date: record.extraction_date,
            asset_name: record.asset_name,
            content_type: record.content_type,
            extraction_method: record.extraction_method,
            bundle_entry: record.bundle_entry,
            data_properties: record.data_properties,
            extra: record.extra,
        }
    }
}

impl TextRecord {
    /// A fresh, untranslated record
    #[must_use]
    pub fn new(id: String, source_file: PathBuf, asset_type: AssetType, original_text: String) -> Self {
        Self {
            id,
            source_file,
            object_id: None,
            asset_type,
            field_path: String::new(),
            translated_text: original_text.clone(),
            original_text,
            is_translated: false,
            extraction_date: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            asset_name: None,
            content_type: None,
            extraction_method: None,
            bundle_entry: None,
            data_properties: None,
            extra: Map::new(),
            keys: RecordKeys::default(),
        }
    }

    /// Whether the record carries a translation worth writing
    #[must_use]
    pub fn has_effective_translation(&self) -> bool {
        self.is_translated && {
            let translated = self.translated_text.trim();
            !translated.is_empty() && translated != self.original_text.trim()
        }
    }
}

/// Counts over an inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub total: usize,
    pub translated: usize,
    pub by_type: BTreeMap<AssetType, usize>,
}

impl InventoryStats {
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total - self.translated
    }

    #[must_use]
    pub fn percent_translated(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.translated as f64 / self.total as f64 * 100.0
        }
    }
}

/// A scan result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub game_path: PathBuf,
    #[serde(default)]
    pub scan_date: String,
    #[serde(default)]
    pub total_texts: usize,
    #[serde(default)]
    pub texts: Vec<TextRecord>,
    #[serde(default)]
    pub scan_options: ScanOptions,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Inventory {
    #[must_use]
    pub fn new(game_path: PathBuf, scan_options: ScanOptions) -> Self {
        Self {
            game_path,
            scan_date: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            total_texts: 0,
            texts: Vec::new(),
            scan_options,
            extra: Map::new(),
        }
    }

    /// Read an inventory file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not an inventory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        let inventory: Self = serde_json::from_str(&data)?;
        tracing::debug!("Loaded {} records from {}", inventory.texts.len(), path.as_ref().display());
        Ok(inventory)
    }

    /// Write the inventory as pretty JSON
    ///
    /// The file is written to a temporary sibling and renamed into place.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.total_texts = self.texts.len();
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Append records, keeping ids unique
    ///
    /// A record whose id is already present is dropped. Returns the number
    /// added.
    pub fn extend(&mut self, records: impl IntoIterator<Item = TextRecord>) -> usize {
        let mut seen: HashSet<String> = self.texts.iter().map(|t| t.id.clone()).collect();
        let before = self.texts.len();
        for record in records {
            if seen.insert(record.id.clone()) {
                self.texts.push(record);
            } else {
                tracing::debug!("Duplicate record id {} dropped", record.id);
            }
        }
        self.total_texts = self.texts.len();
        self.texts.len() - before
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&TextRecord> {
        self.texts.iter().find(|t| t.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut TextRecord> {
        self.texts.iter_mut().find(|t| t.id == id)
    }

    /// Remove records by id; source files are not touched
    pub fn prune<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let before = self.texts.len();
        self.texts.retain(|t| !ids.contains(t.id.as_str()));
        self.total_texts = self.texts.len();
        before - self.texts.len()
    }

    /// Drop every record that is not a TextAsset
    pub fn keep_text_assets(&mut self) -> usize {
        let before = self.texts.len();
        self.texts.retain(|t| t.asset_type == AssetType::TextAsset);
        self.total_texts = self.texts.len();
        before - self.texts.len()
    }

    /// Flag records as translated
    ///
    /// An empty translation is filled with the original text. Returns the
    /// number of records whose flag changed.
    pub fn mark_translated<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let mut changed = 0;
        for record in self.texts.iter_mut().filter(|t| ids.contains(t.id.as_str())) {
            if !record.is_translated {
                record.is_translated = true;
                if record.translated_text.is_empty() {
                    record.translated_text.clone_from(&record.original_text);
                }
                changed += 1;
            }
        }
        changed
    }

    /// Flag records as untranslated, keeping their translated text
    pub fn mark_original<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let mut changed = 0;
        for record in self.texts.iter_mut().filter(|t| ids.contains(t.id.as_str())) {
            if record.is_translated {
                record.is_translated = false;
                changed += 1;
            }
        }
        changed
    }

    /// Merge translations from another inventory, matching by id
    ///
    /// Translated text and flag are copied as they are; use
    /// [`load_import`] to read files that lack the flag. Returns the number
    /// of records updated.
    pub fn import_translations(&mut self, other: &Inventory) -> usize {
        let incoming: HashMap<&str, &TextRecord> = other.texts.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut updated = 0;
        for record in &mut self.texts {
            if let Some(theirs) = incoming.get(record.id.as_str()) {
                record.translated_text.clone_from(&theirs.translated_text);
                record.is_translated = theirs.is_translated;
                updated += 1;
            }
        }
        tracing::info!("Imported {updated}/{} translations", incoming.len());
        updated
    }

    #[must_use]
    pub fn stats(&self) -> InventoryStats {
        let mut stats = InventoryStats {
            total: self.texts.len(),
            ..InventoryStats::default()
        };
        for record in &self.texts {
            if record.is_translated {
                stats.translated += 1;
            }
            *stats.by_type.entry(record.asset_type).or_default() += 1;
        }
        stats
    }
}

/// Read an inventory written by other tools, where `is_translated` may be absent
///
/// Records lacking the flag count as translated when their translated text
/// differs from the original.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_import<P: AsRef<Path>>(path: P) -> Result<Inventory> {
    let data = fs::read_to_string(path)?;
    let raw: Value = serde_json::from_str(&data)?;
    let flags: Vec<Option<bool>> = raw
        .get("texts")
        .and_then(Value::as_array)
        .map(|texts| texts.iter().map(|t| t.get("is_translated").and_then(Value::as_bool)).collect())
        .unwrap_or_default();
    let mut inventory: Inventory = serde_json::from_value(raw)?;
    for (record, flag) in inventory.texts.iter_mut().zip(flags) {
        if flag.is_none() {
            record.is_translated = record.translated_text != record.original_text;
        }
    }
    Ok(inventory)
}
