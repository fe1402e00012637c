//! Unity SerializedFile (`.assets`, bundle entries) format module
//!
//! A SerializedFile is a big-endian header, a metadata block (unity version,
//! type table, object table, script and external references) and the
//! object data area.

mod builder;
mod document;
mod reader;
pub mod schema;
mod writer;

// Public API
pub use builder::SerializedFileBuilder;
pub use document::{
    ExternalRef, ObjectEntry, RefTypeNames, ScriptRef, SerializedFile, SerializedHeader, SerializedType,
};
pub use reader::{parse_serialized_bytes, read_serialized, MAX_VERSION, MIN_VERSION};
pub use writer::{serialize_serialized, write_serialized, OBJECT_ALIGNMENT};
