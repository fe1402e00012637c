//! Game directory scanner
//!
//! Walks a game directory, loads every Unity container and collects text
//! records from TextAsset and MonoBehaviour objects. Containers that fail
//! to load are swept for raw strings instead, and plain `.json`, `.xml` and
//! `.txt` files are picked up whole.
//!
//! Files are processed one at a time; the cancel flag is polled between
//! files.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::formats::serialized::schema::RAW_DATA_FIELD;
use crate::formats::{Container, FieldPath, FieldValue, ObjectRef};
use crate::inventory::{extraction_method, AssetType, Inventory, TextRecord};
use crate::progress::{percent, ProgressCallback};
use crate::relevance;
use crate::sweep::{self, Signature};

/// Extensions loaded as Unity containers (compared lowercased)
pub const CONTAINER_EXTENSIONS: [&str; 5] = ["assets", "bundle", "resource", "ress", "dat"];

/// Extensions read as plain text
pub const TEXT_EXTENSIONS: [&str; 3] = ["json", "xml", "txt"];

/// How a discovered file is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Container,
    TextFile,
}

impl FileKind {
    /// Classify a path by extension
    #[must_use]
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if CONTAINER_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Container)
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::TextFile)
        } else {
            None
        }
    }
}

/// What to extract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub textassets: bool,
    pub monobehaviours: bool,
    pub textfiles: bool,
    /// Looser game-text test for MonoBehaviour leaves, and structure
    /// analysis for every container that fails to load
    pub deep_scan: bool,
    /// Deepest nesting level searched inside a MonoBehaviour
    pub max_depth: usize,
    /// Elements searched per list
    pub list_limit: usize,
    /// Text must be longer than this many characters
    pub min_text_chars: usize,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            textassets: true,
            monobehaviours: true,
            textfiles: true,
            deep_scan: false,
            max_depth: 5,
            list_limit: 50,
            min_text_chars: 10,
            extra: Map::new(),
        }
    }
}

/// Game directory scanner
#[derive(Debug, Clone)]
pub struct Scanner {
    game_path: PathBuf,
    options: ScanOptions,
}

impl Scanner {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(game_path: P, options: ScanOptions) -> Self {
        Self {
            game_path: game_path.into(),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Every container and text file under the game directory, sorted
    ///
    /// # Errors
    /// Returns an error if the game directory does not exist.
    pub fn discover(&self) -> Result<Vec<(PathBuf, FileKind)>> {
        if !self.game_path.is_dir() {
            return Err(Error::InvalidPath(format!(
                "game directory not found: {}",
                self.game_path.display()
            )));
        }
        let mut files: Vec<_> = WalkDir::new(&self.game_path)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let kind = FileKind::of(e.path())?;
                (kind == FileKind::Container || self.options.textfiles).then(|| (e.path().to_path_buf(), kind))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Scan the whole game directory
    ///
    /// Per-file failures are logged and skipped. Setting `cancel` stops the
    /// scan before the next file; records found so far are kept.
    ///
    /// # Errors
    /// Returns an error only if the game directory cannot be listed.
    pub fn scan(&self, progress: ProgressCallback, cancel: &AtomicBool) -> Result<Inventory> {
        let files = self.discover()?;
        let total = files.len();
        tracing::info!("Scanning {} files under {}", total, self.game_path.display());

        let mut inventory = Inventory::new(self.game_path.clone(), self.options.clone());
        let mut ids = IdAllocator::default();
        let mut failed = 0usize;

        for (i, (path, kind)) in files.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!("Scan cancelled after {i} of {total} files");
                break;
            }
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            progress(percent(i + 1, total), &format!("Scanning: {name}"));

            match self.scan_file(path, *kind) {
                Ok(records) => {
                    if !records.is_empty() {
                        tracing::info!("{}: {} texts", path.display(), records.len());
                    }
                    inventory.extend(records.into_iter().map(|r| ids.assign(r)));
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!("Failed to scan {}: {e}", path.display());
                }
            }
        }

        inventory.total_texts = inventory.texts.len();
        tracing::info!("Scan found {} texts ({failed} files failed)", inventory.total_texts);
        Ok(inventory)
    }

    /// Extract the records of a single file
    ///
    /// # Errors
    /// Returns an I/O error, or a non-load container error.
    pub fn scan_file(&self, path: &Path, kind: FileKind) -> Result<Vec<TextRecord>> {
        match kind {
            FileKind::TextFile => self.scan_text_file(path),
            FileKind::Container => {
                let data = fs::read(path)?;
                self.scan_container_bytes(path, &data)
            }
        }
    }

    /// Structured extraction with the sweep fallback for unloadable data
    ///
    /// # Errors
    /// Returns container errors that are not load errors.
    pub fn scan_container_bytes(&self, path: &Path, data: &[u8]) -> Result<Vec<TextRecord>> {
        match Container::from_bytes(data) {
            Ok(container) => {
                if let Some(wrapping) = container.wrapping() {
                    tracing::info!(
                        "{}: container inside {} stream at offset {}",
                        path.display(),
                        wrapping.method.label(),
                        wrapping.header.len()
                    );
                }
                Ok(self.scan_container(path, &container))
            }
            Err(e) if e.is_load_error() => {
                tracing::warn!("{} does not load ({e}); sweeping raw bytes", path.display());
                Ok(self.sweep_fallback(path, data))
            }
            Err(e) => Err(e),
        }
    }

    /// Records of every TextAsset and MonoBehaviour of a loaded container
    #[must_use]
    pub fn scan_container(&self, path: &Path, container: &Container) -> Vec<TextRecord> {
        let mut records = Vec::new();
        for object in container.objects() {
            let result: Result<Vec<TextRecord>> = if object.is_text_asset() && self.options.textassets {
                self.extract_text_asset(path, container, &object)
                    .map(|found| found.into_iter().collect())
            } else if object.is_mono_behaviour() && self.options.monobehaviours {
                self.extract_mono_behaviour(path, container, &object)
            } else {
                continue;
            };
            match result {
                Ok(found) => records.extend(found),
                Err(e) => tracing::warn!(
                    "Skipping {} {} in {}: {e}",
                    object.type_name,
                    object.path_id,
                    path.display()
                ),
            }
        }
        records
    }

    fn extract_text_asset(&self, path: &Path, container: &Container, object: &ObjectRef) -> Result<Option<TextRecord>> {
        let payload = container.read(object)?;
        let Some(content) = payload.text_content() else {
            tracing::debug!("TextAsset {} has no content field", object.path_id);
            return Ok(None);
        };
        let text = content.text();
        let name = asset_name(payload.name.as_deref(), object.path_id);
        if text.chars().count() <= self.options.min_text_chars || !relevance::is_text_relevant(&name, &text) {
            return Ok(None);
        }

        let mut record = TextRecord::new(
            format!("{}_{}", file_stem(path), object.path_id),
            path.to_path_buf(),
            AssetType::TextAsset,
            text,
        );
        record.object_id = Some(object.path_id);
        record.asset_name = Some(name);
        record.content_type = Some(content.content_type);
        record.bundle_entry.clone_from(&object.entry);
        record.data_properties = payload.fields.as_map().map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), v.kind().to_string()))
                .collect::<BTreeMap<_, _>>()
        });
        tracing::debug!("TextAsset {} ({})", object.path_id, content.content_type.as_str());
        Ok(Some(record))
    }

    fn extract_mono_behaviour(&self, path: &Path, container: &Container, object: &ObjectRef) -> Result<Vec<TextRecord>> {
        let fields = container.read_typetree(object)?;
        let name = asset_name(fields.get("m_Name").and_then(FieldValue::as_str), object.path_id);
        if fields.get(RAW_DATA_FIELD).is_some() {
            tracing::debug!(
                "MonoBehaviour {} has no type tree; script fields are not searchable",
                object.path_id
            );
        }

        let mut search = FieldSearch {
            options: &self.options,
            found: Vec::new(),
        };
        search.walk(&fields, &FieldPath::root(), "", 0);

        let stem = file_stem(path);
        Ok(search
            .found
            .into_iter()
            .map(|(field_path, text)| {
                let dotted = field_path.to_string();
                let clean = dotted.replace(['.', '[', ']'], "_");
                let mut record = TextRecord::new(
                    format!("{stem}_{}_{clean}", object.path_id),
                    path.to_path_buf(),
                    AssetType::MonoBehaviour,
                    text,
                );
                record.object_id = Some(object.path_id);
                record.asset_name = Some(format!("{name}.{dotted}"));
                record.bundle_entry.clone_from(&object.entry);
                record.field_path = dotted;
                record
            })
            .collect())
    }

    fn scan_text_file(&self, path: &Path) -> Result<Vec<TextRecord>> {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if !relevance::name_is_relevant(&file_name) {
            return Ok(Vec::new());
        }
        let content = String::from_utf8_lossy(&fs::read(path)?).into_owned();
        if content.chars().count() <= self.options.min_text_chars || !relevance::contains_dialogue_pattern(&content) {
            return Ok(Vec::new());
        }
        let mut record = TextRecord::new(
            format!("textfile_{}", file_stem(path)),
            path.to_path_buf(),
            AssetType::TextFile,
            content,
        );
        record.asset_name = Some(file_name);
        Ok(vec![record])
    }

    /// Sweep an unloadable container
    ///
    /// Bundle-looking data (and, with `deep_scan`, anything) goes through
    /// structure analysis first; a successful decompression is swept
    /// instead of the raw bytes.
    #[must_use]
    pub fn sweep_fallback(&self, path: &Path, data: &[u8]) -> Vec<TextRecord> {
        let bundle_like = matches!(
            Signature::detect(data),
            Some(Signature::UnityFs | Signature::UnityWeb | Signature::UnityRaw | Signature::UnityArchive)
        );
        let is_bundle_ext = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("bundle"));

        let mut method = extraction_method::RAW_SWEEP;
        let mut decompressed = None;
        if bundle_like || is_bundle_ext || self.options.deep_scan {
            let analysis = sweep::analyze_structure(data);
            if analysis.likely_encrypted {
                tracing::warn!(
                    "{} looks encrypted (entropy {:.2}); raw sweep will find little",
                    path.display(),
                    analysis.entropy
                );
            }
            if let Some(hit) = analysis.decompressed {
                tracing::info!(
                    "{}: {} stream at offset {}",
                    path.display(),
                    hit.method.label(),
                    hit.skip
                );
                method = extraction_method::DECOMPRESSED_SWEEP;
                decompressed = Some(hit.data);
            }
        }
        let bytes = decompressed.as_deref().unwrap_or(data);

        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let stem = file_stem(path);
        sweep::sweep(bytes)
            .into_iter()
            .filter(|s| relevance::is_text_relevant(&file_name, s) || relevance::is_potential_game_text(s))
            .enumerate()
            .map(|(ordinal, text)| {
                let mut record = TextRecord::new(
                    format!("{stem}_sweep_{ordinal}"),
                    path.to_path_buf(),
                    AssetType::BinaryExtraction,
                    text,
                );
                record.object_id = Some(ordinal as i64);
                record.asset_name = Some(file_name.clone());
                record.extraction_method = Some(method.to_string());
                record
            })
            .collect()
    }
}

/// Depth- and width-bounded search of a decoded MonoBehaviour
struct FieldSearch<'a> {
    options: &'a ScanOptions,
    found: Vec<(FieldPath, String)>,
}

impl FieldSearch<'_> {
    fn accepts(&self, name: &str, text: &str) -> bool {
        text.chars().count() > self.options.min_text_chars
            && (relevance::is_text_relevant(name, text)
                || (self.options.deep_scan && relevance::is_potential_game_text(text)))
    }

    /// `name` is the nearest enclosing key, used for list elements
    fn walk(&mut self, value: &FieldValue, path: &FieldPath, name: &str, depth: usize) {
        if depth > self.options.max_depth {
            return;
        }
        match value {
            FieldValue::Map(map) => {
                for (key, child) in map {
                    if key == RAW_DATA_FIELD {
                        continue;
                    }
                    let child_path = path.key(key);
                    match child {
                        FieldValue::String(text) if self.accepts(key, text) => {
                            self.found.push((child_path, text.clone()));
                        }
                        FieldValue::Map(_) | FieldValue::List(_) if depth < self.options.max_depth => {
                            self.walk(child, &child_path, key, depth + 1);
                        }
                        _ => {}
                    }
                }
            }
            FieldValue::List(items) if depth < self.options.max_depth => {
                for (i, item) in items.iter().take(self.options.list_limit).enumerate() {
                    let item_path = path.index(i);
                    match item {
                        FieldValue::String(text) if self.accepts(name, text) => {
                            self.found.push((item_path, text.clone()));
                        }
                        FieldValue::Map(_) | FieldValue::List(_) => self.walk(item, &item_path, name, depth + 1),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

/// Makes record ids unique within one scan by suffixing repeats
#[derive(Debug, Default)]
struct IdAllocator {
    seen: HashMap<String, usize>,
}

impl IdAllocator {
    fn assign(&mut self, mut record: TextRecord) -> TextRecord {
        let count = self.seen.entry(record.id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            record.id = format!("{}_{}", record.id, count);
        }
        record
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

fn asset_name(name: Option<&str>, path_id: i64) -> String {
    name.filter(|n| !n.is_empty())
        .map_or_else(|| format!("Asset_{path_id}"), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::serialized::{schema, SerializedFileBuilder};
    use crate::formats::typetree::{build, TypeTree, TypeTreeNode};
    use crate::progress::no_progress;
    use indexmap::IndexMap;

    fn map(entries: Vec<(&str, FieldValue)>) -> FieldValue {
        FieldValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>())
    }

    fn s(text: &str) -> FieldValue {
        FieldValue::String(text.to_string())
    }

    fn search(value: &FieldValue, options: &ScanOptions) -> Vec<(String, String)> {
        let mut search = FieldSearch { options, found: Vec::new() };
        search.walk(value, &FieldPath::root(), "", 0);
        search.found.into_iter().map(|(p, t)| (p.to_string(), t)).collect()
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::of(Path::new("a/level0.ASSETS")), Some(FileKind::Container));
        assert_eq!(FileKind::of(Path::new("a/sharedassets0.resS")), Some(FileKind::Container));
        assert_eq!(FileKind::of(Path::new("a/strings.json")), Some(FileKind::TextFile));
        assert_eq!(FileKind::of(Path::new("a/game.exe")), None);
    }

    #[test]
    fn test_search_paths_and_list_elements() {
        let value = map(vec![
            ("m_Name", s("Intro")),
            (
                "dialogue",
                map(vec![(
                    "lines",
                    FieldValue::List(vec![
                        map(vec![("text", s("Hello there, stranger"))]),
                        map(vec![("speaker", s("Mara"))]),
                    ]),
                )]),
            ),
            ("subtitles", FieldValue::List(vec![s("The storm is coming"), FieldValue::Int(3)])),
            ("m_Speed", FieldValue::Float(1.5)),
        ]);
        let found = search(&value, &ScanOptions::default());
        assert_eq!(
            found,
            vec![
                ("dialogue.lines[0].text".to_string(), "Hello there, stranger".to_string()),
                ("subtitles[0]".to_string(), "The storm is coming".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_depth_bound() {
        let mut value = map(vec![("text", s("innermost dialogue line"))]);
        for _ in 0..50 {
            value = map(vec![("text", s("a dialogue line here")), ("child", value)]);
        }
        let options = ScanOptions::default();
        let found = search(&value, &options);
        assert!(!found.is_empty());
        for (path, _) in &found {
            let parsed = FieldPath::parse(path).unwrap();
            assert!(parsed.depth() <= options.max_depth + 1, "{path} is too deep");
        }
        assert_eq!(found.len(), options.max_depth + 1);
    }

    #[test]
    fn test_search_list_cap() {
        let items = (0..200).map(|i| s(&format!("Caption number {i:03}"))).collect();
        let value = map(vec![("captions", FieldValue::List(items))]);
        assert_eq!(search(&value, &ScanOptions::default()).len(), 50);
    }

    #[test]
    fn test_deep_scan_accepts_mangled_names() {
        let value = map(vec![("<k__BackingField>a", s("Press any key to continue."))]);
        assert!(search(&value, &ScanOptions::default()).is_empty());
        let options = ScanOptions {
            deep_scan: true,
            ..ScanOptions::default()
        };
        assert_eq!(search(&value, &options).len(), 1);
    }

    fn text_asset_container(name: &str, script: &str) -> Vec<u8> {
        let mut builder = SerializedFileBuilder::new(17, "2019.4.1f1");
        let tree = TypeTree::new(vec![TypeTreeNode::new(0, "TextAsset", "Base", -1)])
            .with(build::string(1, "m_Name"))
            .with(build::string(1, "m_Script"));
        let ty = builder.add_type(schema::CLASS_TEXT_ASSET, tree);
        builder
            .add_value(7, ty, &map(vec![("m_Name", s(name)), ("m_Script", s(script))]))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("level1.assets"),
            text_asset_container("subtitles_en", "Hello, how are you today?"),
        )
        .unwrap();
        fs::write(dir.path().join("other.assets"), text_asset_container("config", "short")).unwrap();
        fs::write(dir.path().join("dialogue.txt"), "Mara: Where is the key?\nJon: Here.").unwrap();
        fs::write(dir.path().join("readme.md"), "Mara: ignored").unwrap();

        let scanner = Scanner::new(dir.path(), ScanOptions::default());
        let inventory = scanner.scan(&no_progress, &AtomicBool::new(false)).unwrap();
        let ids: Vec<&str> = inventory.texts.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["textfile_dialogue", "level1_7"]);

        let record = inventory.find("level1_7").unwrap();
        assert_eq!(record.asset_type, AssetType::TextAsset);
        assert_eq!(record.object_id, Some(7));
        assert_eq!(record.asset_name.as_deref(), Some("subtitles_en"));
        assert_eq!(record.translated_text, record.original_text);
        assert!(!record.is_translated);
    }

    #[test]
    fn test_scan_cancelled_before_first_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dialogue.txt"), "Mara: Where is the key?").unwrap();
        let scanner = Scanner::new(dir.path(), ScanOptions::default());
        let inventory = scanner.scan(&no_progress, &AtomicBool::new(true)).unwrap();
        assert!(inventory.texts.is_empty());
    }

    #[test]
    fn test_corrupt_container_falls_back_to_sweep() {
        let mut data = vec![0xFFu8; 64];
        data.extend(b"\0Welcome back, commander.\0");
        data.extend([0xEE; 32]);
        let scanner = Scanner::new("/game", ScanOptions::default());
        let records = scanner
            .scan_container_bytes(Path::new("/game/broken.assets"), &data)
            .unwrap();
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.asset_type == AssetType::BinaryExtraction));
        assert!(records.iter().any(|r| r.original_text == "Welcome back, commander."));
        assert_eq!(records[0].extraction_method.as_deref(), Some(extraction_method::RAW_SWEEP));
    }
}
