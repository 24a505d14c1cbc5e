//! Centralized error handling for Refcode.
//!
//! Every failure in an encode or decode call is fatal for that call: there is no
//! partial document and no best-effort graph. The caller receives exactly one
//! [`RefcodeError`] describing the first problem encountered.
//!
//! ## Error Categories
//!
//! - **Encode side:** [`RefcodeError::UnsupportedType`] when a reachable value has no
//!   wire representation.
//! - **Type resolution:** [`RefcodeError::UnresolvedType`] and
//!   [`RefcodeError::InstantiationFailure`] when a canonical type string cannot be turned
//!   back into a live record or enumeration member.
//! - **Document shape:** [`RefcodeError::DanglingReference`],
//!   [`RefcodeError::MalformedTag`] and [`RefcodeError::MalformedDocument`] for wire
//!   trees that the encoder could not have produced.
//! - **Field conversion:** [`RefcodeError::ValueMismatch`] and
//!   [`RefcodeError::FieldMismatch`] when a decoded value does not fit a typed record field.
//! - **Plumbing:** [`RefcodeError::Io`], [`RefcodeError::Json`] and
//!   [`RefcodeError::Internal`].
//!
//! ## Usage
//!
//! ```rust
//! use refcode::{Refcode, RefcodeError, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! match Refcode::decode(r#"{"__ci": "??"}"#, &registry) {
//!     Err(RefcodeError::MalformedTag(tag)) => assert_eq!(tag, "??"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// A specialized `Result` type for Refcode operations.
pub type Result<T> = std::result::Result<T, RefcodeError>;

/// The master error enum covering all failure domains in Refcode.
///
/// The type is `Clone` so a failure can be stored or handed across threads;
/// I/O errors are wrapped in an `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum RefcodeError {
    /// Low-level I/O failure while reading or writing a document.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The text is not valid JSON, or JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(String),

    /// A value reachable from the encode root has no wire representation.
    #[error("unsupported value at {path}: {reason}")]
    UnsupportedType {
        /// Location of the value, starting at `$` (the root).
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A canonical type string (or an enumeration member name) is unknown to the registry.
    #[error("unresolved type '{0}'")]
    UnresolvedType(String),

    /// A resolved type could not be default-constructed.
    #[error("could not instantiate '{type_name}': {reason}")]
    InstantiationFailure {
        /// Canonical type string.
        type_name: String,
        /// Cause reported by the factory.
        reason: String,
    },

    /// A `{"__r": id}` token names an id that was never registered.
    #[error("reference to unregistered id {0}")]
    DanglingReference(u64),

    /// A `__ci` discriminator outside the recognized set.
    #[error("unrecognized tag '{0}'")]
    MalformedTag(String),

    /// The wire tree has a shape the encoder never produces.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A value could not be converted into the requested Rust type.
    #[error("expected {expected}, found {found}")]
    ValueMismatch {
        /// The Rust-side shape that was requested.
        expected: &'static str,
        /// The shape of the value that was supplied.
        found: String,
    },

    /// A decoded value could not be assigned to a record field.
    #[error("field '{field}' of '{record}': {reason}")]
    FieldMismatch {
        /// Canonical type of the record.
        record: String,
        /// Field name as it appears on the wire.
        field: String,
        /// Conversion failure or "unknown field".
        reason: String,
    },

    /// Logic error or runtime borrow conflict inside the codec.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RefcodeError {
    /// Wraps a conversion failure with the record and field it happened in.
    pub fn in_field(self, record: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldMismatch {
            record: record.into(),
            field: field.into(),
            reason: self.to_string(),
        }
    }
}

impl From<io::Error> for RefcodeError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for RefcodeError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return Self::Io(Arc::new(io::Error::other(err.to_string())));
        }
        Self::Json(err.to_string())
    }
}
