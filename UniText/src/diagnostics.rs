//! Diagnostic mode: look inside a container before committing to a run

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::formats::{Container, FieldValue};

/// Characters of text shown per field
const PREVIEW_CHARS: usize = 60;

/// Nesting levels listed under each object
const FIELD_DEPTH: usize = 2;

/// One field of a sampled object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub path: String,
    pub kind: &'static str,
    /// Characters for text, bytes for byte strings, elements for lists and maps
    pub len: usize,
    pub preview: Option<String>,
}

/// What diagnostic mode reports for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDiagnostic {
    pub entry: Option<String>,
    pub path_id: i64,
    pub class_id: i32,
    pub type_name: String,
    pub byte_size: u32,
    pub name: Option<String>,
    /// Detected TextAsset content convention
    pub content_type: Option<&'static str>,
    pub fields: Vec<FieldSummary>,
    /// Set when the object could not be decoded
    pub error: Option<String>,
}

impl fmt::Display for ObjectDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({} bytes)", self.path_id, self.type_name, self.byte_size)?;
        if let Some(entry) = &self.entry {
            write!(f, " in {entry}")?;
        }
        if let Some(name) = &self.name {
            write!(f, " name={name:?}")?;
        }
        if let Some(content) = self.content_type {
            write!(f, " content={content}")?;
        }
        if let Some(error) = &self.error {
            write!(f, "\n    error: {error}")?;
        }
        for field in &self.fields {
            write!(f, "\n    {}: {} len={}", field.path, field.kind, field.len)?;
            if let Some(preview) = &field.preview {
                write!(f, " {preview:?}")?;
            }
        }
        Ok(())
    }
}

/// Sample the first `sample` objects of the container at `path`
///
/// Objects that fail to decode are reported with their error rather than
/// failing the call.
///
/// # Errors
/// Returns an error if the container cannot be loaded.
pub fn diagnose(path: &Path, sample: usize) -> Result<Vec<ObjectDiagnostic>> {
    let container = Container::load(path)?;
    let objects = container.objects();
    tracing::info!(
        "{}: {} objects, Unity {}",
        path.display(),
        objects.len(),
        container.unity_version().unwrap_or("unknown")
    );

    Ok(objects
        .iter()
        .take(sample)
        .map(|object| {
            let mut diagnostic = ObjectDiagnostic {
                entry: object.entry.clone(),
                path_id: object.path_id,
                class_id: object.class_id,
                type_name: object.type_name.clone(),
                byte_size: object.byte_size,
                name: None,
                content_type: None,
                fields: Vec::new(),
                error: None,
            };
            match container.read(object) {
                Ok(payload) => {
                    if object.is_text_asset() {
                        diagnostic.content_type = payload.text_content().map(|c| c.content_type.as_str());
                    }
                    summarize(&payload.fields, "", 0, &mut diagnostic.fields);
                    diagnostic.name = payload.name;
                }
                Err(e) => diagnostic.error = Some(e.to_string()),
            }
            diagnostic
        })
        .collect())
}

fn summarize(value: &FieldValue, path: &str, depth: usize, out: &mut Vec<FieldSummary>) {
    let FieldValue::Map(map) = value else {
        return;
    };
    for (key, child) in map {
        let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
        out.push(FieldSummary {
            path: child_path.clone(),
            kind: child.kind(),
            len: value_len(child),
            preview: child.text_lossy().map(|t| preview(&t)),
        });
        if depth + 1 < FIELD_DEPTH {
            summarize(child, &child_path, depth + 1, out);
        }
    }
}

fn value_len(value: &FieldValue) -> usize {
    match value {
        FieldValue::String(s) => s.chars().count(),
        FieldValue::Bytes(b) => b.len(),
        FieldValue::List(l) => l.len(),
        FieldValue::Map(m) => m.len(),
        FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_) => 1,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}
