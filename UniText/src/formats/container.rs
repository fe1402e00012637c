//! Loaded Unity containers
//!
//! [`Container`] hides whether a file is a bare SerializedFile or a UnityFS
//! bundle of them: objects are enumerated as [`ObjectRef`]s, decoded on
//! demand, and written back through the format's own writer.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::bundle::{self, Bundle};
use crate::compression::{decompress_ladder, LadderMethod};
use super::serialized::{self, schema, SerializedFile};
use super::value::FieldValue;
use crate::error::{Error, Result};

/// Which content convention a TextAsset-like payload uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// `m_Text` / `text` property
    #[serde(rename = "text_property")]
    TextProperty,
    /// `m_Script` / `script` property (string or byte string)
    #[serde(rename = "script_property")]
    ScriptProperty,
    /// `m_Bytes` / `bytes` property
    #[serde(rename = "bytes_property")]
    BytesProperty,
    #[serde(other)]
    Unknown,
}

impl ContentType {
    /// Conventions in detection order
    pub const DETECTION_ORDER: [ContentType; 3] = [
        ContentType::TextProperty,
        ContentType::ScriptProperty,
        ContentType::BytesProperty,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::TextProperty => "text_property",
            ContentType::ScriptProperty => "script_property",
            ContentType::BytesProperty => "bytes_property",
            ContentType::Unknown => "unknown",
        }
    }

    /// Field names that carry this convention
    #[must_use]
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            ContentType::TextProperty => &["m_Text", "text"],
            ContentType::ScriptProperty => &["m_Script", "script"],
            ContentType::BytesProperty => &["m_Bytes", "bytes"],
            ContentType::Unknown => &[],
        }
    }
}

/// The content field of a TextAsset-like payload
#[derive(Debug, Clone, Copy)]
pub struct TextContent<'a> {
    pub content_type: ContentType,
    pub key: &'static str,
    pub value: &'a FieldValue,
}

impl TextContent<'_> {
    /// Content as text; byte strings are decoded lossily
    #[must_use]
    pub fn text(&self) -> String {
        self.value.text_lossy().unwrap_or_default()
    }
}

/// Find the content field of a TextAsset-like record
///
/// Only string and byte-string values qualify.
#[must_use]
pub fn detect_content(fields: &FieldValue) -> Option<TextContent<'_>> {
    for content_type in ContentType::DETECTION_ORDER {
        for &key in content_type.keys() {
            if let Some(value @ (FieldValue::String(_) | FieldValue::Bytes(_))) = fields.get(key) {
                return Some(TextContent { content_type, key, value });
            }
        }
    }
    None
}

/// A decoded object
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub type_name: String,
    pub name: Option<String>,
    pub fields: FieldValue,
}

impl Payload {
    #[must_use]
    pub fn text_content(&self) -> Option<TextContent<'_>> {
        detect_content(&self.fields)
    }
}

/// Handle to one object of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Bundle entry holding the object; `None` for bare SerializedFiles
    pub entry: Option<String>,
    pub path_id: i64,
    pub class_id: i32,
    pub type_name: String,
    pub byte_size: u32,
}

impl ObjectRef {
    #[must_use]
    pub fn is_text_asset(&self) -> bool {
        self.class_id == schema::CLASS_TEXT_ASSET
    }

    #[must_use]
    pub fn is_mono_behaviour(&self) -> bool {
        self.class_id == schema::CLASS_MONO_BEHAVIOUR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Serialized,
    Bundle,
}

#[derive(Debug, Clone)]
struct BundleFile {
    entry: String,
    file: SerializedFile,
    dirty: bool,
}

#[derive(Debug, Clone)]
enum Source {
    Serialized(SerializedFile),
    Bundle { bundle: Bundle, files: Vec<BundleFile> },
}

/// Compression stream a container was found inside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapping {
    pub method: LadderMethod,
    /// Bytes in front of the compressed stream, written back verbatim
    pub header: Vec<u8>,
}

/// A loaded container
#[derive(Debug, Clone)]
pub struct Container {
    path: Option<PathBuf>,
    source: Source,
    wrapping: Option<Wrapping>,
}

impl Container {
    /// Load a container from disk
    ///
    /// # Errors
    /// Returns an I/O error or a load error (see [`Error::is_load_error`]).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut container = Self::from_bytes(&data)?;
        container.path = Some(path.to_path_buf());
        Ok(container)
    }

    /// Parse a container from bytes, detecting bundles by signature
    ///
    /// Bytes that do not parse directly are run through the decompression
    /// ladder, and a container found inside is remembered as wrapped so
    /// [`Self::to_bytes`] compresses it the same way again.
    ///
    /// # Errors
    /// Returns a load error if the bytes are neither a supported bundle nor
    /// a supported SerializedFile, compressed or not.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let err = match Self::parse_source(data) {
            Ok(source) => {
                return Ok(Self {
                    path: None,
                    source,
                    wrapping: None,
                })
            }
            Err(e) if e.is_load_error() => e,
            Err(e) => return Err(e),
        };
        let Ok(hit) = decompress_ladder(data) else {
            return Err(err);
        };
        match Self::parse_source(&hit.data) {
            Ok(source) => {
                tracing::debug!("Found container inside {} stream at offset {}", hit.method.label(), hit.skip);
                Ok(Self {
                    path: None,
                    source,
                    wrapping: Some(Wrapping {
                        method: hit.method,
                        header: data[..hit.skip].to_vec(),
                    }),
                })
            }
            Err(_) => Err(err),
        }
    }

    fn parse_source(data: &[u8]) -> Result<Source> {
        if bundle::is_bundle(data) {
            let bundle = bundle::parse_bundle_bytes(data)?;
            let files = bundle
                .entries
                .iter()
                .filter(|e| e.is_serialized())
                .map(|e| {
                    Ok(BundleFile {
                        entry: e.path.clone(),
                        file: serialized::parse_serialized_bytes(&e.data)?,
                        dirty: false,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Source::Bundle { bundle, files })
        } else {
            Ok(Source::Serialized(serialized::parse_serialized_bytes(data)?))
        }
    }

    /// The compression stream around the container, if any
    #[must_use]
    pub fn wrapping(&self) -> Option<&Wrapping> {
        self.wrapping.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> ContainerKind {
        match self.source {
            Source::Serialized(_) => ContainerKind::Serialized,
            Source::Bundle { .. } => ContainerKind::Bundle,
        }
    }

    /// Unity version of the (first) serialized file
    #[must_use]
    pub fn unity_version(&self) -> Option<&str> {
        self.files().next().map(|(_, f)| f.unity_version.as_str())
    }

    fn files(&self) -> Box<dyn Iterator<Item = (Option<&str>, &SerializedFile)> + '_> {
        match &self.source {
            Source::Serialized(file) => Box::new(std::iter::once((None, file))),
            Source::Bundle { files, .. } => Box::new(files.iter().map(|b| (Some(b.entry.as_str()), &b.file))),
        }
    }

    fn file(&self, entry: Option<&str>) -> Result<&SerializedFile> {
        self.files()
            .find(|(e, _)| *e == entry)
            .map(|(_, f)| f)
            .ok_or_else(|| Error::InvalidPath(format!("container entry {}", entry.unwrap_or("<root>"))))
    }

    fn file_mut(&mut self, entry: Option<&str>) -> Result<&mut SerializedFile> {
        match (&mut self.source, entry) {
            (Source::Serialized(file), None) => Ok(file),
            (Source::Bundle { files, .. }, Some(name)) => files
                .iter_mut()
                .find(|b| b.entry == name)
                .map(|b| {
                    b.dirty = true;
                    &mut b.file
                })
                .ok_or_else(|| Error::InvalidPath(format!("container entry {name}"))),
            (_, entry) => Err(Error::InvalidPath(format!(
                "container entry {}",
                entry.unwrap_or("<root>")
            ))),
        }
    }

    /// Every object, in object table order (bundle entries in order)
    #[must_use]
    pub fn objects(&self) -> Vec<ObjectRef> {
        self.files()
            .flat_map(|(entry, file)| {
                file.objects.iter().map(move |o| ObjectRef {
                    entry: entry.map(str::to_string),
                    path_id: o.path_id,
                    class_id: o.class_id,
                    type_name: file.type_name(o),
                    byte_size: o.byte_size(),
                })
            })
            .collect()
    }

    /// Look an object up by entry and path id
    #[must_use]
    pub fn find(&self, entry: Option<&str>, path_id: i64) -> Option<ObjectRef> {
        self.objects()
            .into_iter()
            .find(|o| o.entry.as_deref() == entry && o.path_id == path_id)
    }

    /// Decode an object's fields
    ///
    /// # Errors
    /// Returns [`Error::ObjectNotFound`] or a decode error.
    pub fn read_typetree(&self, object: &ObjectRef) -> Result<FieldValue> {
        self.file(object.entry.as_deref())?.decode(object.path_id)
    }

    /// Raw stored bytes of an object
    ///
    /// # Errors
    /// Returns [`Error::ObjectNotFound`] or [`Error::InvalidPath`].
    pub fn object_data(&self, object: &ObjectRef) -> Result<&[u8]> {
        self.file(object.entry.as_deref())?
            .object(object.path_id)
            .map(|o| o.data.as_slice())
            .ok_or(Error::ObjectNotFound(object.path_id))
    }

    /// Bytes of an object left over after its fields are decoded
    ///
    /// # Errors
    /// See [`Self::read_typetree`].
    pub fn unread_len(&self, object: &ObjectRef) -> Result<usize> {
        self.file(object.entry.as_deref())?.unread_len(object.path_id)
    }

    /// Decode an object into a [`Payload`]
    ///
    /// # Errors
    /// See [`Self::read_typetree`].
    pub fn read(&self, object: &ObjectRef) -> Result<Payload> {
        let fields = self.read_typetree(object)?;
        let name = fields
            .get("m_Name")
            .and_then(FieldValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Payload {
            type_name: object.type_name.clone(),
            name,
            fields,
        })
    }

    /// Re-encode `fields` as the object's new data
    ///
    /// # Errors
    /// Returns [`Error::ObjectNotFound`] or an encode error; the container
    /// is unchanged on error.
    pub fn write_payload(&mut self, object: &ObjectRef, fields: &FieldValue) -> Result<()> {
        self.file_mut(object.entry.as_deref())?.encode(object.path_id, fields)
    }

    /// Serialize the container
    ///
    /// Bundle entries that were never written to keep their original bytes.
    /// A wrapped container is compressed again behind its original header.
    ///
    /// # Errors
    /// Returns an error if a SerializedFile cannot be re-emitted.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let inner = match &self.source {
            Source::Serialized(file) => serialized::serialize_serialized(file)?,
            Source::Bundle { bundle, files } => {
                let mut bundle = bundle.clone();
                for f in files.iter().filter(|f| f.dirty) {
                    bundle.set_entry_data(&f.entry, serialized::serialize_serialized(&f.file)?)?;
                }
                bundle::serialize_bundle(&bundle)?
            }
        };
        let Some(wrapping) = &self.wrapping else {
            return Ok(inner);
        };
        let mut out = wrapping.header.clone();
        out.extend(wrapping.method.compress(&inner)?);
        Ok(out)
    }

    /// Serialize and write the container to `path`
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}
