//! Unity container formats
//!
//! `serialized` and `bundle` are the two on-disk containers; `container`
//! puts a single object-level API over both.

pub mod binary;
pub mod bundle;
pub mod container;
pub mod serialized;
pub mod typetree;
pub mod value;

// Re-export the types most callers need
pub use container::{detect_content, Container, ContainerKind, ContentType, ObjectRef, Payload, TextContent, Wrapping};
pub use serialized::{SerializedFile, SerializedFileBuilder};
pub use bundle::{Bundle, BundleEntry, BundleWriter};
pub use typetree::{TypeTree, TypeTreeNode};
pub use value::{FieldPath, FieldValue, Segment};
