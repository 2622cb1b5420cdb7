//! Error types shared by every datakit crate.

use std::error::Error as StdError;
use std::fmt;

/// Result alias used throughout datakit.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug)]
pub enum Error {
    /// Service or sequence configuration is invalid. Raised at construction.
    Config(ConfigError),
    /// A caller supplied an unusable argument.
    InvalidArgument(ArgumentError),
    /// The storage driver failed.
    Storage(StorageError),
    /// A value could not be converted to the requested type.
    Conversion(ConversionError),
    /// Beginning, committing or rolling back a transaction failed.
    Transaction(String),
    /// An event subscriber aborted the operation.
    Handler(String),
    /// Projecting an entity to or from a dictionary failed.
    Serialization(serde_json::Error),
}

/// Configuration failure detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Service the configuration belongs to.
    pub service: String,
    pub message: String,
}

/// Invalid argument detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentError {
    /// Name of the offending argument.
    pub argument: &'static str,
    pub kind: ArgumentErrorKind,
    pub message: String,
}

/// Classification of invalid arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentErrorKind {
    /// A required argument was missing or blank.
    Missing,
    /// More than three positional key values were supplied.
    TooManyKeys,
    /// The key could not be resolved to a condition.
    UnresolvedKey,
    /// The argument was present but unusable.
    Invalid,
}

/// Storage driver failure detail.
#[derive(Debug)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Classification of storage driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// The named entity set does not exist.
    NotFound,
    /// A write violated a uniqueness constraint.
    Conflict,
    /// The driver does not support the requested operation.
    Unsupported,
    /// Any other failure.
    Other,
}

/// Conversion failure detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
}

impl Error {
    /// A required argument was missing.
    pub fn missing(argument: &'static str) -> Self {
        Error::InvalidArgument(ArgumentError {
            argument,
            kind: ArgumentErrorKind::Missing,
            message: format!("the '{}' argument is required", argument),
        })
    }

    /// A generic invalid argument.
    pub fn invalid_argument(argument: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument(ArgumentError {
            argument,
            kind: ArgumentErrorKind::Invalid,
            message: message.into(),
        })
    }

    /// Too many positional key values.
    pub fn too_many_keys(count: usize) -> Self {
        Error::InvalidArgument(ArgumentError {
            argument: "keys",
            kind: ArgumentErrorKind::TooManyKeys,
            message: format!("too many keys: {} supplied, at most 3 are supported", count),
        })
    }

    /// A key could not be resolved for the named service.
    pub fn unresolved_key(argument: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument(ArgumentError {
            argument,
            kind: ArgumentErrorKind::UnresolvedKey,
            message: message.into(),
        })
    }

    /// A configuration error for the named service.
    pub fn config(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            service: service.into(),
            message: message.into(),
        })
    }

    /// A storage driver error without an underlying source.
    pub fn storage(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Error::Storage(StorageError {
            kind,
            message: message.into(),
            source: None,
        })
    }

    /// True for invalid-argument errors.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }

    /// Kind of the invalid-argument error, if this is one.
    pub fn argument_kind(&self) -> Option<ArgumentErrorKind> {
        match self {
            Error::InvalidArgument(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Kind of the storage error, if this is one.
    pub fn storage_kind(&self) -> Option<StorageErrorKind> {
        match self {
            Error::Storage(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "configuration error in '{}': {}", e.service, e.message),
            Error::InvalidArgument(e) => write!(f, "invalid argument '{}': {}", e.argument, e.message),
            Error::Storage(e) => write!(f, "storage error ({:?}): {}", e.kind, e.message),
            Error::Conversion(e) => write!(f, "cannot convert '{}' to {}", e.value, e.target),
            Error::Transaction(msg) => write!(f, "transaction error: {}", msg),
            Error::Handler(msg) => write!(f, "event handler error: {}", msg),
            Error::Serialization(e) => write!(f, "serialization error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Storage(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn StdError + 'static)),
            Error::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conversion(err)
    }
}
