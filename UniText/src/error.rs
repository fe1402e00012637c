//! Error types for `UniText`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `UniText` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected end of data while decoding a structure.
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof {
        /// Byte offset at which more data was expected.
        offset: u64,
    },

    // ==================== Container Load Errors ====================
    /// The data does not start with a plausible SerializedFile header.
    #[error("invalid SerializedFile header: {0}")]
    InvalidSerializedHeader(String),

    /// SerializedFile metadata version outside the supported range.
    #[error("unsupported SerializedFile version: {0}")]
    UnsupportedSerializedVersion(u32),

    /// The data is not a UnityFS bundle.
    #[error("invalid bundle signature: {0:?}")]
    InvalidBundleSignature(String),

    /// UnityFS format version outside the supported range.
    #[error("unsupported bundle format version: {0}")]
    UnsupportedBundleVersion(u32),

    /// A type tree could not be parsed or does not match the object data.
    #[error("invalid type tree: {0}")]
    InvalidTypeTree(String),

    /// An object references a serialized type index that does not exist.
    #[error("object {path_id} references unknown type index {type_index}")]
    UnknownTypeIndex {
        /// The path id of the offending object.
        path_id: i64,
        /// The out-of-range type index.
        type_index: i32,
    },

    /// An object's byte range lies outside the file.
    #[error("object {path_id} data range {start}..{end} is out of bounds")]
    ObjectOutOfBounds {
        /// The path id of the offending object.
        path_id: i64,
        /// Absolute start offset.
        start: u64,
        /// Absolute end offset.
        end: u64,
    },

    /// No object with the given path id exists in the container.
    #[error("object {0} not found in container")]
    ObjectNotFound(i64),

    // ==================== Compression Errors ====================
    /// Unsupported compression method.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompressionMethod {
        /// The compression method identifier.
        method: u32,
    },

    /// Decompression failed (all strategies exhausted for the ladder).
    #[error("decompression failed: {0}")]
    DecompressionError(String),

    /// Compression failed.
    #[error("compression failed: {0}")]
    CompressionError(String),

    // ==================== Payload / Field Errors ====================
    /// A field path no longer resolves inside the decoded structure.
    #[error("field path '{path}' does not resolve: {reason}")]
    FieldNavigation {
        /// The dotted/indexed path that failed.
        path: String,
        /// What went wrong at the failing segment.
        reason: String,
    },

    /// A field path string could not be parsed.
    #[error("malformed field path '{0}'")]
    InvalidFieldPath(String),

    /// A value cannot be coerced to the original field's type.
    #[error("cannot store {found} into a {expected} field")]
    TypeMismatch {
        /// Kind of the original field.
        expected: String,
        /// Kind of the value that was offered.
        found: String,
    },

    /// A TextAsset payload exposes none of the known content conventions.
    #[error("object {0} has no recognised text content field")]
    NoContentField(i64),

    /// The object's class cannot be mutated by the injector.
    #[error("unsupported object type '{0}' for injection")]
    UnsupportedObjectType(String),

    // ==================== Injection Errors ====================
    /// Backup copy does not match the original.
    #[error("backup verification failed for {path}: {reason}")]
    BackupVerification {
        /// The original file.
        path: PathBuf,
        /// Why verification failed.
        reason: String,
    },

    /// Post-mutation reload failed or was structurally incoherent.
    #[error("integrity verification failed for {path}: {reason}")]
    IntegrityVerification {
        /// The container being injected.
        path: PathBuf,
        /// Why verification failed.
        reason: String,
    },

    /// Atomic replacement of the original failed after all retries.
    #[error("failed to replace {path} after {attempts} attempts: {reason}")]
    Commit {
        /// The container being replaced.
        path: PathBuf,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure.
        reason: String,
    },

    /// More than one record targets the same plain-text file.
    #[error("{count} records target plain-text file {path}; only one is supported")]
    UnsupportedTextFileConfiguration {
        /// The plain-text file.
        path: PathBuf,
        /// How many records target it.
        count: usize,
    },

    /// A backup directory does not exist.
    #[error("backup directory not found: {0}")]
    BackupNotFound(PathBuf),

    // ==================== Translation Errors ====================
    /// The translation backend failed.
    #[error("translation failed: {message}")]
    Translation {
        /// Backend-provided message.
        message: String,
        /// Whether retrying could succeed (timeouts, rate limits).
        transient: bool,
    },

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Regex compilation error.
    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    // ==================== File System Errors ====================
    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

impl Error {
    /// Whether this error means "the container could not be parsed".
    ///
    /// The scanner answers these with the binary sweep fallback instead of
    /// giving up on the file.
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        if let Error::Io(err) = self {
            // Truncated structures surface as short reads from the cursor
            return err.kind() == std::io::ErrorKind::UnexpectedEof;
        }
        matches!(
            self,
            Error::UnexpectedEof { .. }
                | Error::InvalidSerializedHeader(_)
                | Error::UnsupportedSerializedVersion(_)
                | Error::InvalidBundleSignature(_)
                | Error::UnsupportedBundleVersion(_)
                | Error::InvalidTypeTree(_)
                | Error::UnknownTypeIndex { .. }
                | Error::ObjectOutOfBounds { .. }
                | Error::UnsupportedCompressionMethod { .. }
                | Error::DecompressionError(_)
        )
    }

    /// Whether a translation error is worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Translation { transient: true, .. })
    }
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

/// A specialized Result type for `UniText` operations.
pub type Result<T> = std::result::Result<T, Error>;
