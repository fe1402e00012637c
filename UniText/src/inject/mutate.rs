//! Writing one record's translation into a loaded container

use crate::error::{Error, Result};
use crate::formats::{detect_content, Container, FieldPath, FieldValue};
use crate::inventory::{AssetType, TextRecord};

use super::verify::ExpectedField;

/// Apply `record` to its object in `container`
///
/// TextAssets have their content convention detected again on the current
/// payload and the translation stored in that field with the field's own
/// kind, so byte strings stay byte strings. MonoBehaviours have the leaf at
/// `field_path` overwritten with a value coerced to the leaf's kind.
///
/// # Errors
/// Any error leaves the container unchanged: [`Error::ObjectNotFound`],
/// [`Error::FieldNavigation`], [`Error::TypeMismatch`],
/// [`Error::NoContentField`], [`Error::UnsupportedObjectType`] or a decode
/// or encode error.
pub fn apply_record(container: &mut Container, record: &TextRecord) -> Result<ExpectedField> {
    let path_id = record
        .object_id
        .ok_or_else(|| Error::InvalidPath(format!("record {} has no object id", record.id)))?;
    let object = container
        .find(record.bundle_entry.as_deref(), path_id)
        .ok_or(Error::ObjectNotFound(path_id))?;

    let (fields, field, kind) = match record.asset_type {
        AssetType::TextAsset => {
            if !object.is_text_asset() {
                return Err(Error::UnsupportedObjectType(object.type_name));
            }
            let payload = container.read(&object)?;
            check_asset_name(record, payload.name.as_deref())?;

            let content = detect_content(&payload.fields).ok_or(Error::NoContentField(path_id))?;
            if record.content_type.is_some_and(|ct| ct != content.content_type) {
                tracing::warn!(
                    "Object {} now uses {} content, recorded as {:?}",
                    path_id,
                    content.content_type.as_str(),
                    record.content_type
                );
            }
            let field = FieldPath::root().key(content.key);
            let kind = content.value.kind();
            let mut fields = payload.fields.clone();
            fields.set_text(&field, &record.translated_text)?;
            (fields, field, kind)
        }
        AssetType::MonoBehaviour => {
            if !object.is_mono_behaviour() {
                return Err(Error::UnsupportedObjectType(object.type_name));
            }
            if record.field_path.is_empty() {
                return Err(Error::InvalidFieldPath(String::new()));
            }
            let field = FieldPath::parse(&record.field_path)?;
            let mut fields = container.read_typetree(&object)?;
            let previous = fields.set_text(&field, &record.translated_text)?;
            (fields, field, previous.kind())
        }
        other => return Err(Error::UnsupportedObjectType(other.to_string())),
    };

    let unread = container.unread_len(&object)?;
    container.write_payload(&object, &fields)?;
    let text = match fields.resolve(&field)? {
        value @ (FieldValue::String(_) | FieldValue::Bytes(_)) => value.text_lossy().unwrap_or_default(),
        _ => record.translated_text.clone(),
    };
    Ok(ExpectedField {
        entry: object.entry,
        path_id,
        field,
        kind,
        text,
        unread,
    })
}

// The scanner names unnamed assets `Asset_<id>`; those are never compared
fn check_asset_name(record: &TextRecord, current: Option<&str>) -> Result<()> {
    let Some(expected) = record.asset_name.as_deref() else {
        return Ok(());
    };
    let fallback = record.object_id.map(|id| format!("Asset_{id}"));
    if fallback.as_deref() == Some(expected) {
        return Ok(());
    }
    match current {
        Some(name) if name != expected => Err(Error::FieldNavigation {
            path: "m_Name".to_string(),
            reason: format!("asset is now named '{name}', expected '{expected}'"),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::serialized::schema;
    use crate::formats::typetree::{build, TypeTree, TypeTreeNode};
    use crate::formats::SerializedFileBuilder;
    use indexmap::IndexMap;
    use std::path::PathBuf;

    fn map(entries: Vec<(&str, FieldValue)>) -> FieldValue {
        FieldValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>())
    }

    fn record(asset_type: AssetType, path_id: i64, translated: &str) -> TextRecord {
        let mut record = TextRecord::new("r".into(), PathBuf::from("x.assets"), asset_type, String::new());
        record.object_id = Some(path_id);
        record.translated_text = translated.to_string();
        record.is_translated = true;
        record
    }

    fn container() -> Container {
        let mut builder = SerializedFileBuilder::new(21, "2021.3.4f1");
        let text_tree = TypeTree::new(vec![TypeTreeNode::new(0, "TextAsset", "Base", -1)])
            .with(build::string(1, "m_Name"))
            .with(build::vector(1, "m_Bytes", vec![TypeTreeNode::new(0, "UInt8", "data", 1)], true));
        let text_ty = builder.add_type(schema::CLASS_TEXT_ASSET, text_tree);
        let mono_tree = TypeTree::new(vec![TypeTreeNode::new(0, "MonoBehaviour", "Base", -1)])
            .with(build::string(1, "m_Name"))
            .with([TypeTreeNode::new(1, "int", "count", 4)])
            .with(build::string(1, "title"));
        let mono_ty = builder.add_type(schema::CLASS_MONO_BEHAVIOUR, mono_tree);
        builder
            .add_value(
                1,
                text_ty,
                &map(vec![
                    ("m_Name", FieldValue::String("credits".into())),
                    ("m_Bytes", FieldValue::Bytes(b"Thanks".to_vec())),
                ]),
            )
            .unwrap();
        builder
            .add_value(
                2,
                mono_ty,
                &map(vec![
                    ("m_Name", FieldValue::String("menu".into())),
                    ("count", FieldValue::Int(3)),
                    ("title", FieldValue::String("Start".into())),
                ]),
            )
            .unwrap();
        Container::from_bytes(&builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_text_asset_keeps_byte_kind() {
        let mut container = container();
        let expected = apply_record(&mut container, &record(AssetType::TextAsset, 1, "Merci")).unwrap();
        assert_eq!(expected.kind, "bytes");
        assert_eq!(expected.field.to_string(), "m_Bytes");

        let fields = container.read_typetree(&container.find(None, 1).unwrap()).unwrap();
        assert_eq!(fields.get("m_Bytes"), Some(&FieldValue::Bytes(b"Merci".to_vec())));
    }

    #[test]
    fn test_mono_behaviour_coerces_to_leaf_kind() {
        let mut container = container();
        let mut r = record(AssetType::MonoBehaviour, 2, "Commencer");
        r.field_path = "title".into();
        apply_record(&mut container, &r).unwrap();

        let mut r = record(AssetType::MonoBehaviour, 2, "five");
        r.field_path = "count".into();
        assert!(matches!(apply_record(&mut container, &r), Err(Error::TypeMismatch { .. })));

        r.translated_text = "5".into();
        let expected = apply_record(&mut container, &r).unwrap();
        assert_eq!(expected.kind, "int");

        let fields = container.read_typetree(&container.find(None, 2).unwrap()).unwrap();
        assert_eq!(fields.get("title"), Some(&FieldValue::String("Commencer".into())));
        assert_eq!(fields.get("count"), Some(&FieldValue::Int(5)));
    }

    #[test]
    fn test_drifted_records_are_rejected() {
        let mut container = container();
        let mut r = record(AssetType::MonoBehaviour, 2, "x");
        r.field_path = "dialogue.lines[0]".into();
        assert!(matches!(apply_record(&mut container, &r), Err(Error::FieldNavigation { .. })));

        let r = record(AssetType::TextAsset, 99, "x");
        assert!(matches!(apply_record(&mut container, &r), Err(Error::ObjectNotFound(99))));

        let r = record(AssetType::TextAsset, 2, "x");
        assert!(matches!(apply_record(&mut container, &r), Err(Error::UnsupportedObjectType(_))));

        let mut r = record(AssetType::TextAsset, 1, "x");
        r.asset_name = Some("renamed".into());
        assert!(matches!(apply_record(&mut container, &r), Err(Error::FieldNavigation { .. })));
    }
}
