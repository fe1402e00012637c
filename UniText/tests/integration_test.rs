//! End-to-end tests: scan, edit, inject and reload real container bytes

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use unitext::formats::bundle::{BundleEntry, BundleWriter, NODE_FLAG_SERIALIZED};
use unitext::formats::serialized::schema;
use unitext::formats::typetree::{build, TypeTree, TypeTreeNode};
use unitext::formats::{Container, FieldPath, FieldValue, SerializedFileBuilder};
use unitext::inject::{filter_records, Injector, RejectReason, VerificationPlan, Verifier};
use unitext::inventory::{AssetType, Inventory, TextRecord};
use unitext::progress::no_progress;
use unitext::scanner::{ScanOptions, Scanner};
use unitext::translate::{batch_translate, TranslateOptions, TranslationCache};
use unitext::Error;

const UNITY: &str = "2021.3.4f1";

fn map(entries: Vec<(&str, FieldValue)>) -> FieldValue {
    FieldValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>())
}

fn text(s: &str) -> FieldValue {
    FieldValue::String(s.to_string())
}

fn text_asset_tree() -> TypeTree {
    TypeTree::new(vec![TypeTreeNode::new(0, "TextAsset", "Base", -1)])
        .with(build::string(1, "m_Name"))
        .with(build::string(1, "m_Script"))
}

/// A MonoBehaviour holding `dialogue.lines[*].{speaker,text}` and a counter
fn dialogue_tree() -> TypeTree {
    let line = TypeTree::new(vec![TypeTreeNode::new(0, "DialogueLine", "data", -1)])
        .with(build::string(1, "speaker"))
        .with(build::string(1, "text"));
    TypeTree::new(vec![TypeTreeNode::new(0, "MonoBehaviour", "Base", -1)])
        .with(build::string(1, "m_Name"))
        .with([TypeTreeNode::new(1, "int", "m_Version", 4)])
        .with([TypeTreeNode::new(1, "DialogueData", "dialogue", -1)])
        .with(build::vector(2, "lines", line.nodes, true))
}

fn dialogue_value(lines: &[(&str, &str)]) -> FieldValue {
    let lines = lines
        .iter()
        .map(|(speaker, line)| map(vec![("speaker", text(speaker)), ("text", text(line))]))
        .collect();
    map(vec![
        ("m_Name", text("harbor_dialogue")),
        ("m_Version", FieldValue::Int(3)),
        ("dialogue", map(vec![("lines", FieldValue::List(lines))])),
    ])
}

const LINES: [(&str, &str); 3] = [
    ("Mira", "Welcome to the harbor town."),
    ("Mira", "The ferry leaves at dawn."),
    ("Oskar", "Meet me at the old bridge."),
];

/// One TextAsset (path id 1) and one dialogue MonoBehaviour (path id 2)
fn level_file(script: &str) -> Vec<u8> {
    let mut builder = SerializedFileBuilder::new(21, UNITY);
    let text_ty = builder.add_type(schema::CLASS_TEXT_ASSET, text_asset_tree());
    let mono_ty = builder.add_type(schema::CLASS_MONO_BEHAVIOUR, dialogue_tree());
    builder
        .add_value(1, text_ty, &map(vec![("m_Name", text("dialogue_intro")), ("m_Script", text(script))]))
        .unwrap();
    builder.add_value(2, mono_ty, &dialogue_value(&LINES)).unwrap();
    builder.build().unwrap()
}

fn translated(mut record: TextRecord, translation: &str) -> TextRecord {
    record.translated_text = translation.to_string();
    record.is_translated = true;
    record
}

fn text_asset_record(path: &Path, original: &str) -> TextRecord {
    let mut record = TextRecord::new("level_1".into(), path.to_path_buf(), AssetType::TextAsset, original.into());
    record.object_id = Some(1);
    record.asset_name = Some("dialogue_intro".into());
    record
}

fn mono_record(path: &Path, field_path: &str, original: &str) -> TextRecord {
    let mut record = TextRecord::new(
        format!("level_2_{field_path}"),
        path.to_path_buf(),
        AssetType::MonoBehaviour,
        original.into(),
    );
    record.object_id = Some(2);
    record.field_path = field_path.into();
    record
}

fn read_field(path: &Path, path_id: i64, field: &str) -> FieldValue {
    let container = Container::load(path).unwrap();
    let object = container.find(None, path_id).unwrap();
    let fields = container.read_typetree(&object).unwrap();
    fields.resolve(&FieldPath::parse(field).unwrap()).unwrap().clone()
}

fn setup(bytes: &[u8], name: &str) -> (tempfile::TempDir, tempfile::TempDir, PathBuf) {
    let game = tempfile::tempdir().unwrap();
    let backups = tempfile::tempdir().unwrap();
    let path = game.path().join(name);
    fs::write(&path, bytes).unwrap();
    (game, backups, path)
}

// ==================== Container fidelity ====================

#[test]
fn test_unmodified_container_reserializes_identically() {
    let bytes = level_file("Hello");
    let container = Container::from_bytes(&bytes).unwrap();
    assert_eq!(container.to_bytes().unwrap(), bytes);
    assert_eq!(container.unity_version(), Some(UNITY));
}

#[test]
fn test_non_utf8_string_stays_a_byte_string() {
    let mut builder = SerializedFileBuilder::new(21, UNITY);
    let ty = builder.add_type(schema::CLASS_TEXT_ASSET, text_asset_tree());
    let raw = vec![0x48, 0x69, 0xFF, 0xFE, 0x00, 0x01];
    builder
        .add_value(7, ty, &map(vec![("m_Name", text("blob_text")), ("m_Script", FieldValue::Bytes(raw.clone()))]))
        .unwrap();
    let bytes = builder.build().unwrap();

    let container = Container::from_bytes(&bytes).unwrap();
    let fields = container.read_typetree(&container.find(None, 7).unwrap()).unwrap();
    assert_eq!(fields.get("m_Script"), Some(&FieldValue::Bytes(raw)));
    assert_eq!(container.to_bytes().unwrap(), bytes);
}

#[test]
fn test_byte_content_injects_as_byte_string() {
    let mut builder = SerializedFileBuilder::new(17, "2019.4.40f1");
    let tree = TypeTree::new(vec![TypeTreeNode::new(0, "TextAsset", "Base", -1)])
        .with(build::string(1, "m_Name"))
        .with(build::vector(1, "m_Bytes", vec![TypeTreeNode::new(0, "UInt8", "data", 1)], true));
    let ty = builder.add_type(schema::CLASS_TEXT_ASSET, tree);
    builder
        .add_value(1, ty, &map(vec![("m_Name", text("dialogue_intro")), ("m_Bytes", FieldValue::Bytes(b"Hello".to_vec()))]))
        .unwrap();
    let (game, backups, path) = setup(&builder.build().unwrap(), "sharedassets0.assets");

    let record = translated(text_asset_record(&path, "Hello"), "Grüß dich");
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&[record], &no_progress, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.success_count, 1);
    assert_eq!(read_field(&path, 1, "m_Bytes"), FieldValue::Bytes("Grüß dich".as_bytes().to_vec()));
}

// ==================== Injection scenarios ====================

#[test]
fn test_text_asset_injection_with_byte_identical_backup() {
    let original = level_file("Hello");
    let (game, backups, path) = setup(&original, "level.assets");

    let record = translated(text_asset_record(&path, "Hello"), "Bonjour");
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&[record], &no_progress, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.error_count, 0);
    assert_eq!(report.files_touched().count(), 1);
    assert_eq!(read_field(&path, 1, "m_Script"), text("Bonjour"));
    // The other object is untouched
    assert_eq!(read_field(&path, 2, "dialogue.lines[0].text"), text(LINES[0].1));

    let backup = report.backup_dir.unwrap().join("level.assets");
    assert_eq!(fs::read(backup).unwrap(), original);
}

#[test]
fn test_nested_mono_behaviour_field_injection() {
    let (game, backups, path) = setup(&level_file("Hello"), "level.assets");

    let record = translated(
        mono_record(&path, "dialogue.lines[2].text", LINES[2].1),
        "Retrouve-moi au vieux pont.",
    );
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&[record], &no_progress, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.success_count, 1);

    assert_eq!(read_field(&path, 2, "dialogue.lines[2].text"), text("Retrouve-moi au vieux pont."));
    assert_eq!(read_field(&path, 2, "dialogue.lines[2].speaker"), text("Oskar"));
    assert_eq!(read_field(&path, 2, "dialogue.lines[0].text"), text(LINES[0].1));
    assert_eq!(read_field(&path, 2, "dialogue.lines[1].text"), text(LINES[1].1));
    assert_eq!(read_field(&path, 2, "m_Version"), FieldValue::Int(3));
    assert_eq!(read_field(&path, 1, "m_Script"), text("Hello"));
}

#[test]
fn test_unread_trailing_bytes_survive_injection() {
    let mut data = unitext::formats::typetree::encode_object(&dialogue_tree(), &dialogue_value(&LINES), false).unwrap();
    data.extend_from_slice(&[0xAB; 8]);
    let mut builder = SerializedFileBuilder::new(21, UNITY);
    let mono_ty = builder.add_type(schema::CLASS_MONO_BEHAVIOUR, dialogue_tree());
    builder.add_object(2, mono_ty, data).unwrap();
    let (game, backups, path) = setup(&builder.build().unwrap(), "level.assets");

    let record = translated(mono_record(&path, "dialogue.lines[0].text", LINES[0].1), "Salut.");
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&[record], &no_progress, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.success_count, 1);
    assert_eq!(read_field(&path, 2, "dialogue.lines[0].text"), text("Salut."));

    let container = Container::load(&path).unwrap();
    let object = container.find(None, 2).unwrap();
    assert_eq!(container.unread_len(&object).unwrap(), 8);
    let data = container.object_data(&object).unwrap();
    let lines = [("Mira", "Salut."), LINES[1], LINES[2]];
    let fields = unitext::formats::typetree::encode_object(&dialogue_tree(), &dialogue_value(&lines), false).unwrap();
    assert_eq!(data.len(), fields.len() + 8);
    assert_eq!(&data[..fields.len()], fields.as_slice());
    assert_eq!(&data[fields.len()..], &[0xAB; 8]);
}

#[test]
fn test_drifted_record_is_skipped_and_siblings_still_written() {
    let (game, backups, path) = setup(&level_file("Hello"), "level.assets");

    let records = [
        translated(text_asset_record(&path, "Hello"), "Bonjour"),
        translated(mono_record(&path, "dialogue.lines[9].text", "Gone"), "Parti"),
        translated(mono_record(&path, "m_Version", "3"), "four"),
    ];
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&records, &no_progress, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.error_count, 2);
    assert_eq!(report.files[0].failed.len(), 2);
    assert_eq!(read_field(&path, 1, "m_Script"), text("Bonjour"));
    assert_eq!(read_field(&path, 2, "m_Version"), FieldValue::Int(3));
}

#[test]
fn test_corrupt_container_falls_back_to_sweep_and_is_never_injected() {
    let mut corrupt = vec![0xAB; 64];
    corrupt.extend_from_slice(b"Hello traveler, welcome to our village!");
    corrupt.extend_from_slice(&[0xCD; 64]);
    let (game, backups, path) = setup(&corrupt, "broken.assets");

    let scanner = Scanner::new(game.path(), ScanOptions::default());
    let inventory = scanner.scan(&no_progress, &AtomicBool::new(false)).unwrap();
    let found = inventory
        .texts
        .iter()
        .find(|r| r.original_text.contains("welcome to our village"))
        .unwrap();
    assert_eq!(found.asset_type, AssetType::BinaryExtraction);
    assert_eq!(found.extraction_method.as_deref(), Some("raw_sweep"));

    let record = translated(found.clone(), "Bonjour voyageur, bienvenue au village !");
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&[record], &no_progress, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.success_count, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, RejectReason::BinaryExtraction);
    assert!(report.backup_dir.is_none());
    assert_eq!(fs::read(&path).unwrap(), corrupt);
}

#[test]
fn test_gzip_wrapped_container_scans_and_injects_structurally() {
    let packed = unitext::compression::compress_gzip(&level_file("Hello traveler")).unwrap();
    let (game, backups, path) = setup(&packed, "level.assets");

    let scanner = Scanner::new(game.path(), ScanOptions::default());
    let inventory = scanner.scan(&no_progress, &AtomicBool::new(false)).unwrap();
    let kinds: Vec<_> = inventory.texts.iter().map(|r| r.asset_type).collect();
    assert_eq!(
        kinds,
        vec![AssetType::TextAsset, AssetType::MonoBehaviour, AssetType::MonoBehaviour, AssetType::MonoBehaviour]
    );
    assert_eq!(inventory.texts[0].original_text, "Hello traveler");

    let records = [
        translated(inventory.texts[0].clone(), "Bonjour voyageur"),
        translated(inventory.texts[1].clone(), "Bienvenue au port."),
    ];
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&records, &no_progress, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.success_count, 2);

    let container = Container::load(&path).unwrap();
    assert_eq!(container.wrapping().map(|w| w.method), Some(unitext::compression::LadderMethod::Gzip));
    assert_eq!(read_field(&path, 1, "m_Script"), text("Bonjour voyageur"));
    assert_eq!(read_field(&path, 2, "dialogue.lines[0].text"), text("Bienvenue au port."));
    assert_eq!(read_field(&path, 2, "dialogue.lines[1].text"), text(LINES[1].1));
}

struct RejectEverything;

impl Verifier for RejectEverything {
    fn verify(&self, candidate: &Path, _plan: &VerificationPlan) -> unitext::Result<()> {
        Err(Error::IntegrityVerification {
            path: candidate.to_path_buf(),
            reason: "rejected for test".to_string(),
        })
    }
}

#[test]
fn test_failed_verification_leaves_original_untouched() {
    let original = level_file("Hello");
    let (game, backups, path) = setup(&original, "level.assets");

    let records = [
        translated(text_asset_record(&path, "Hello"), "Bonjour"),
        translated(mono_record(&path, "dialogue.lines[0].text", LINES[0].1), "Bienvenue au port."),
    ];
    let report = Injector::new(game.path(), backups.path())
        .with_verifier(RejectEverything)
        .inject_records(&records, &no_progress, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(report.success_count, 0);
    assert_eq!(report.error_count, 2);
    assert!(report.files[0].error.as_deref().unwrap().contains("rejected for test"));
    assert_eq!(fs::read(&path).unwrap(), original);

    // No temporary candidate is left next to the game file
    let leftovers: Vec<_> = fs::read_dir(game.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|name| name.to_string_lossy().starts_with(".unitext-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_bundle_injection_keeps_other_entries() {
    let other = level_file("Second entry");
    let bundle = BundleWriter::new(7, "5.x.x", UNITY)
        .write(&[
            BundleEntry { path: "CAB-main".into(), flags: NODE_FLAG_SERIALIZED, data: level_file("Hello") },
            BundleEntry { path: "CAB-other".into(), flags: NODE_FLAG_SERIALIZED, data: other },
        ])
        .unwrap();
    let (game, backups, path) = setup(&bundle, "level.bundle");

    let mut record = translated(text_asset_record(&path, "Hello"), "Bonjour");
    record.bundle_entry = Some("CAB-main".into());
    let report = Injector::new(game.path(), backups.path())
        .inject_records(&[record], &no_progress, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.success_count, 1);

    let container = Container::load(&path).unwrap();
    let main = container.read(&container.find(Some("CAB-main"), 1).unwrap()).unwrap();
    assert_eq!(main.text_content().unwrap().text(), "Bonjour");
    let other = container.read(&container.find(Some("CAB-other"), 1).unwrap()).unwrap();
    assert_eq!(other.text_content().unwrap().text(), "Second entry");
}

// ==================== Filtering ====================

#[test]
fn test_nul_translation_rejected_and_filter_idempotent() {
    let (_game, _backups, path) = setup(&level_file("Hello"), "level.assets");
    let records = vec![
        translated(text_asset_record(&path, "Hello"), "Bon\0jour"),
        translated(mono_record(&path, "dialogue.lines[1].text", LINES[1].1), "Le bac\u{7} part à l'aube."),
        mono_record(&path, "dialogue.lines[0].text", LINES[0].1),
    ];

    let outcome = filter_records(&records);
    assert_eq!(outcome.accepted.len(), 1);
    assert_eq!(outcome.accepted[0].translated_text, "Le bac part à l'aube.");
    let nul: Vec<_> = outcome.nul_rejections().map(|r| r.id.as_str()).collect();
    assert_eq!(nul, vec!["level_1"]);

    let again = filter_records(&outcome.accepted);
    assert_eq!(again.accepted, outcome.accepted);
    assert!(again.rejected.is_empty());
}

// ==================== Full workflow ====================

#[test]
fn test_scan_translate_inject_workflow() {
    let (game, backups, path) = setup(&level_file("Captain: The storm is coming!"), "level.assets");
    let work = tempfile::tempdir().unwrap();
    let inventory_path = work.path().join("inventory.json");

    let scanner = Scanner::new(game.path(), ScanOptions::default());
    let mut inventory = scanner.scan(&no_progress, &AtomicBool::new(false)).unwrap();
    let fields: Vec<_> = inventory.texts.iter().map(|r| r.field_path.as_str()).collect();
    assert_eq!(
        fields,
        vec!["", "dialogue.lines[0].text", "dialogue.lines[1].text", "dialogue.lines[2].text"]
    );
    inventory.save(&inventory_path).unwrap();

    let mut inventory = Inventory::load(&inventory_path).unwrap();
    let translator = |text: &str, lang: &str, _context: &str| -> unitext::Result<String> {
        Ok(format!("[{lang}] {text}"))
    };
    let options = TranslateOptions {
        delay_ms: 0,
        ..TranslateOptions::default()
    };
    let mut cache = TranslationCache::in_memory();
    let done = batch_translate(&mut inventory.texts, &translator, &mut cache, &options, &no_progress, &|| false);
    assert_eq!(done, 4);
    inventory.save(&inventory_path).unwrap();

    let inventory = Inventory::load(&inventory_path).unwrap();
    let report = Injector::new(game.path(), backups.path())
        .inject(&inventory, &no_progress, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.success_count, 4);
    assert_eq!(report.error_count, 0);

    assert_eq!(read_field(&path, 1, "m_Script"), text("[fr] Captain: The storm is coming!"));
    assert_eq!(read_field(&path, 2, "dialogue.lines[2].text"), text("[fr] Meet me at the old bridge."));
    assert_eq!(read_field(&path, 2, "dialogue.lines[2].speaker"), text("Oskar"));
}
