use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::identifier::Identifier;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Line and column (both 1-based) of a token in its source file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A positioned lexer or grammar error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub span: Span,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file.display(), self.span, self.message)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error("{} syntax error(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Syntax(Vec<Diagnostic>),

    #[error("{identifier} is declared more than once")]
    DuplicateDeclaration { identifier: Identifier },

    #[error("namespace {namespace:?} is reserved for built-in types")]
    ReservedNamespace { namespace: String },

    #[error("unresolved reference {reference:?} in {context} at {span}")]
    UnresolvedReference {
        reference: String,
        context: Identifier,
        span: Span,
    },

    #[error("{reference:?} in {context} refers to service {service}, which is not a model")]
    NotAModel {
        reference: String,
        context: Identifier,
        service: Identifier,
    },

    #[error("circular model dependency: {}", display_path(.path))]
    CircularDependency { path: Vec<Identifier> },

    #[error("field id {id} is used more than once in {model}")]
    DuplicateFieldId { model: Identifier, id: u32 },

    #[error("tag value {value} is used more than once in {model}")]
    DuplicateTagValue { model: Identifier, value: u32 },

    #[error("field name {name:?} is used more than once in {model}")]
    DuplicateFieldName { model: Identifier, name: String },

    #[error("id {id} of {model} is listed in @used_ids but still in use")]
    RetiredIdInUse { model: Identifier, id: u32 },

    #[error("service id {id} is used by both {first} and {second}")]
    DuplicateServiceId {
        id: u32,
        first: Identifier,
        second: Identifier,
    },

    #[error("service {service} has id {id}, service ids must be positive")]
    InvalidServiceId { service: Identifier, id: u32 },

    #[error("service {service} is missing the @{option} option")]
    MissingServiceOption {
        service: Identifier,
        option: &'static str,
    },

    #[error("unknown option @{option} in {context}")]
    UnknownOption { context: Identifier, option: String },

    #[error("option @{option} in {context} expects {expected}")]
    InvalidOptionValue {
        context: Identifier,
        option: String,
        expected: &'static str,
    },

    #[error("{reference} expects {expected} type argument(s) but {found} were given (in {context})")]
    ArityMismatch {
        context: Identifier,
        reference: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("{template} cannot be instantiated with void (in {context})")]
    VoidTypeArgument {
        context: Identifier,
        template: Identifier,
    },
}

fn display_path(path: &[Identifier]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl CompileError {
    /// Every diagnostic carried by this error; empty for semantic errors.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Syntax(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}
