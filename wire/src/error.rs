use std::io;

use thiserror::Error;

use crate::kind::WireKind;

pub type Result<T> = std::result::Result<T, WireError>;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("number does not fit {target}")]
    NumberOutOfRange { target: &'static str },

    #[error("invalid bool value {0}")]
    InvalidBoolValue(u64),

    #[error("invalid tag value {value} for {tag}")]
    InvalidTagValue { tag: String, value: u64 },

    #[error("stream closed: expected {expected} byte(s), {available} available")]
    StreamClosed { expected: usize, available: usize },

    #[error("invalid wire kind {0}")]
    InvalidWireKind(u8),

    #[error("field {field} of {model} arrived as {found:?}, expected {expected:?}")]
    UnexpectedWireKind {
        model: String,
        field: u32,
        expected: WireKind,
        found: WireKind,
    },

    #[error("string is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unknown type {0}")]
    UnknownType(String),

    #[error("{model} expects {expected} type argument(s) but {found} were given")]
    ArityMismatch {
        model: String,
        expected: usize,
        found: usize,
    },

    #[error("{0} would hold void elements")]
    VoidElement(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
