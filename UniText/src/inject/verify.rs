//! Post-write integrity checks
//!
//! A candidate file is reloaded from disk before it may replace the
//! original. [`Verifier`] is the seam; [`ReloadVerifier`] is the check the
//! injector runs by default.

use std::path::Path;

use crate::error::{Error, Result};
use crate::formats::{Container, FieldPath};

/// A field the mutation pass wrote, and what it should now hold
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedField {
    pub entry: Option<String>,
    pub path_id: i64,
    pub field: FieldPath,
    /// [`FieldValue::kind`](crate::formats::FieldValue::kind) of the value before the write
    pub kind: &'static str,
    pub text: String,
    /// Bytes after the decoded fields, which the write must carry over
    pub unread: usize,
}

/// Everything a verifier needs to judge a candidate file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationPlan {
    /// Object count of the container before mutation
    pub object_count: usize,
    pub fields: Vec<ExpectedField>,
}

/// Judges whether a freshly written container may replace the original
pub trait Verifier {
    /// # Errors
    /// Returns [`Error::IntegrityVerification`] when the candidate is not fit.
    fn verify(&self, candidate: &Path, plan: &VerificationPlan) -> Result<()>;
}

/// Reload the candidate and decode every object
///
/// Object count must be unchanged, every object must decode, and every
/// mutated field must resolve to a value of its original kind carrying the
/// written text. A mutated object must also keep as many bytes past its
/// decoded fields as it had before the write. `string` and `bytes` count as the same kind, because a
/// `string` node decodes to bytes whenever its content is not valid UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReloadVerifier;

impl Verifier for ReloadVerifier {
    fn verify(&self, candidate: &Path, plan: &VerificationPlan) -> Result<()> {
        let fail = |reason: String| Error::IntegrityVerification {
            path: candidate.to_path_buf(),
            reason,
        };

        let container = Container::load(candidate).map_err(|e| fail(format!("reload failed: {e}")))?;
        let objects = container.objects();
        if objects.len() != plan.object_count {
            return Err(fail(format!(
                "object count changed from {} to {}",
                plan.object_count,
                objects.len()
            )));
        }
        for object in &objects {
            container
                .read_typetree(object)
                .map_err(|e| fail(format!("object {} unreadable: {e}", object.path_id)))?;
        }

        for expected in &plan.fields {
            let object = container
                .find(expected.entry.as_deref(), expected.path_id)
                .ok_or_else(|| fail(format!("object {} missing", expected.path_id)))?;
            let fields = container
                .read_typetree(&object)
                .map_err(|e| fail(format!("object {} unreadable: {e}", object.path_id)))?;
            let value = fields
                .resolve(&expected.field)
                .map_err(|e| fail(format!("object {}: {e}", object.path_id)))?;
            if !kinds_match(expected.kind, value.kind()) {
                return Err(fail(format!(
                    "object {} field {} is {}, expected {}",
                    object.path_id,
                    expected.field,
                    value.kind(),
                    expected.kind
                )));
            }
            if value.text_lossy().is_some_and(|text| text != expected.text) {
                return Err(fail(format!(
                    "object {} field {} does not hold the written text",
                    object.path_id, expected.field
                )));
            }
            let unread = container
                .unread_len(&object)
                .map_err(|e| fail(format!("object {} unreadable: {e}", object.path_id)))?;
            if unread != expected.unread {
                return Err(fail(format!(
                    "object {} has {} unread trailing bytes, expected {}",
                    object.path_id, unread, expected.unread
                )));
            }
        }
        Ok(())
    }
}

fn kinds_match(expected: &str, found: &str) -> bool {
    expected == found || matches!((expected, found), ("string", "bytes") | ("bytes", "string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::serialized::schema;
    use crate::formats::typetree::{self, build, TypeTree, TypeTreeNode};
    use crate::formats::{FieldValue, SerializedFileBuilder};
    use indexmap::IndexMap;

    fn tree() -> TypeTree {
        TypeTree::new(vec![TypeTreeNode::new(0, "TextAsset", "Base", -1)])
            .with(build::string(1, "m_Name"))
            .with(build::string(1, "m_Script"))
    }

    fn asset_bytes(script: &str) -> Vec<u8> {
        let mut map = IndexMap::new();
        map.insert("m_Name".to_string(), FieldValue::String("notes".into()));
        map.insert("m_Script".to_string(), FieldValue::String(script.into()));
        typetree::encode_object(&tree(), &FieldValue::Map(map), false).unwrap()
    }

    fn write_candidate(dir: &Path, objects: Vec<(i64, Vec<u8>)>) -> std::path::PathBuf {
        let mut builder = SerializedFileBuilder::new(21, "2021.3.4f1");
        let ty = builder.add_type(schema::CLASS_TEXT_ASSET, tree());
        for (path_id, data) in objects {
            builder.add_object(path_id, ty, data).unwrap();
        }
        let path = dir.join("candidate.assets");
        std::fs::write(&path, builder.build().unwrap()).unwrap();
        path
    }

    fn expected_script(text: &str, unread: usize) -> ExpectedField {
        ExpectedField {
            entry: None,
            path_id: 1,
            field: FieldPath::root().key("m_Script"),
            kind: "string",
            text: text.to_string(),
            unread,
        }
    }

    #[test]
    fn test_text_kinds_are_interchangeable() {
        assert!(kinds_match("string", "bytes"));
        assert!(kinds_match("bytes", "string"));
        assert!(kinds_match("int", "int"));
        assert!(!kinds_match("int", "string"));
    }

    #[test]
    fn test_unreadable_candidate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.assets");
        std::fs::write(&path, [0u8; 64]).unwrap();
        let err = ReloadVerifier
            .verify(&path, &VerificationPlan::default())
            .unwrap_err();
        assert!(matches!(err, Error::IntegrityVerification { .. }));
    }

    #[test]
    fn test_truncated_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cut = asset_bytes("A line that gets cut short");
        cut.truncate(cut.len() - 6);
        let path = write_candidate(dir.path(), vec![(1, asset_bytes("Hello")), (2, cut)]);

        let plan = VerificationPlan {
            object_count: 2,
            fields: vec![expected_script("Hello", 0)],
        };
        let err = ReloadVerifier.verify(&path, &plan).unwrap_err();
        match err {
            Error::IntegrityVerification { reason, .. } => assert!(reason.contains("object 2 unreadable")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dropped_trailing_bytes_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_candidate(dir.path(), vec![(1, asset_bytes("Hello"))]);
        let plan = VerificationPlan {
            object_count: 1,
            fields: vec![expected_script("Hello", 8)],
        };
        let err = ReloadVerifier.verify(&path, &plan).unwrap_err();
        match err {
            Error::IntegrityVerification { reason, .. } => assert!(reason.contains("unread trailing bytes")),
            other => panic!("unexpected error: {other}"),
        }

        let mut data = asset_bytes("Hello");
        data.extend_from_slice(&[0xAB; 8]);
        let path = write_candidate(dir.path(), vec![(1, data)]);
        ReloadVerifier.verify(&path, &plan).unwrap();
    }

    #[test]
    fn test_wrong_text_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_candidate(dir.path(), vec![(1, asset_bytes("Hello"))]);
        let plan = VerificationPlan {
            object_count: 1,
            fields: vec![expected_script("Bonjour", 0)],
        };
        assert!(matches!(
            ReloadVerifier.verify(&path, &plan),
            Err(Error::IntegrityVerification { .. })
        ));
    }
}
