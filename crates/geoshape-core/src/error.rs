use std::path::PathBuf;
use thiserror::Error;

use crate::types::ShapeType;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

impl Error {
    /// Maps an open-time I/O failure onto the access/permission taxonomy.
    pub fn from_open(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AccessError::FileNotFound { path: path.into() }.into(),
            std::io::ErrorKind::PermissionDenied => {
                PermissionError::Denied { path: path.into() }.into()
            }
            _ => Self::Io(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("truncated input at byte {at}, need {needed} bytes")]
    Truncated { at: u64, needed: usize },

    #[error("bad file code: expected 9994, got {0}")]
    BadFileCode(i32),

    #[error("Not a {expected} record (found shape type {found})")]
    ShapeTypeMismatch { expected: ShapeType, found: i32 },

    #[error("unsupported shape type: {0}")]
    UnsupportedShapeType(i32),

    #[error("content length mismatch for record {id}: declared {declared} words, index has {actual}")]
    ContentLengthMismatch { id: u32, declared: u32, actual: u32 },

    #[error("Record count not matched")]
    RecordCountMismatch,

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid offset/length for {field}")]
    InvalidRange { field: &'static str },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("value for field {field} does not fit in {width} bytes")]
    FieldOverflow { field: String, width: usize },
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{path:?} is not opened")]
    NotOpen { path: PathBuf },

    #[error("file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("index out of range: {id} (count {count})")]
    IndexOutOfRange { id: u64, count: u64 },

    #[error("index file {path:?} doesn't exist")]
    MissingIndex { path: PathBuf },

    #[error("record {id} is deleted; recover it before editing")]
    RecordDeleted { id: u32 },
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("permission denied: {path:?}")]
    Denied { path: PathBuf },

    #[error("{path:?} is opened read-only")]
    ReadOnly { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_map_to_taxonomy() {
        let err = Error::from_open(std::io::Error::from(std::io::ErrorKind::NotFound), "a.shp");
        assert!(matches!(err, Error::Access(AccessError::FileNotFound { .. })));

        let err = Error::from_open(
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            "a.shp",
        );
        assert!(matches!(err, Error::Permission(PermissionError::Denied { .. })));

        let err = Error::from_open(std::io::Error::other("boom"), "a.shp");
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn shape_mismatch_message_names_expected_type() {
        let err = FormatError::ShapeTypeMismatch {
            expected: ShapeType::Point,
            found: 3,
        };
        assert!(err.to_string().starts_with("Not a point record"));
    }
}
