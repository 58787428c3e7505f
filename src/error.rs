//! Failure taxonomy for descriptors, override stores and loaders.
//!
//! Callers must be able to tell configuration-authoring mistakes (fix the
//! document) from environment problems (fix the deployment) from programming
//! mistakes (fix the call site). Every [`OverrideError`] maps to exactly one
//! [`ErrorKind`] for that purpose.

use crate::codes::FacilityIdError;
use std::io;

/// Result alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, OverrideError>;

/// Coarse classification of an [`OverrideError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required argument was not supplied.
    Argument,
    /// A facility id outside 0-2047.
    OutOfRange,
    /// Malformed assembly name, version, key token or value text.
    Format,
    /// File or stream failure, or a document that is not well-formed.
    Io,
    /// The store was disposed.
    Disposed,
    /// API misuse that is neither an argument nor a lifecycle problem.
    Usage,
}

/// Every failure this crate surfaces.
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("required argument `{name}` was not supplied")]
    MissingArgument { name: &'static str },

    #[error(transparent)]
    FacilityOutOfRange(#[from] FacilityIdError),

    #[error("invalid assembly name `{input}`: {reason}")]
    InvalidAssemblyName { input: String, reason: &'static str },

    #[error("invalid version `{input}`: expected 2 to 4 dot-separated numbers")]
    InvalidVersion { input: String },

    #[error("invalid public key token `{input}`: expected an even number of hex digits")]
    InvalidPublicKeyToken { input: String },

    #[error("entry {entry}: invalid value `{value}` for `{field}`")]
    InvalidValue {
        entry: usize,
        field: &'static str,
        value: String,
    },

    #[error("entry {entry}: missing required field `{field}`")]
    MissingField { entry: usize, field: &'static str },

    #[error("failed to read override source `{path}`")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed {format} override document: {source}")]
    Document {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("override store has been disposed")]
    Disposed,

    #[error("end_batch called without a matching begin_batch")]
    NoActiveBatch,
}

impl OverrideError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingArgument { .. } => ErrorKind::Argument,
            Self::FacilityOutOfRange(_) => ErrorKind::OutOfRange,
            Self::InvalidAssemblyName { .. }
            | Self::InvalidVersion { .. }
            | Self::InvalidPublicKeyToken { .. }
            | Self::InvalidValue { .. }
            | Self::MissingField { .. } => ErrorKind::Format,
            Self::Io { .. } => ErrorKind::Io,
            Self::Document { .. } => ErrorKind::Io,
            Self::Disposed => ErrorKind::Disposed,
            Self::NoActiveBatch => ErrorKind::Usage,
        }
    }

    #[inline]
    pub fn is_format(&self) -> bool {
        self.kind() == ErrorKind::Format
    }

    #[inline]
    pub fn is_io(&self) -> bool {
        self.kind() == ErrorKind::Io
    }

    #[cfg_attr(not(any(feature = "xml", feature = "json")), allow(dead_code))]
    pub(crate) fn document(
        format: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Document {
            format,
            source: Box::new(source),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
