//! Error types and result types for entity mapping operations.
//!
//! This module provides error handling for the whole mapping layer.
//! Use [`MappingResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use bson::oid::ObjectId;
use thiserror::Error;

/// Represents all possible errors that can occur while mapping entities
/// to and from raw documents.
///
/// Every variant is locally recoverable by the caller; nothing in this
/// core treats an error as process-fatal.
#[derive(Error, Debug)]
pub enum MappingError {
    /// A required field was absent from the document.
    #[error("missing value for key `{key}`")]
    MissingValue {
        /// The wire name of the absent field.
        key: String,
    },
    /// A field was present but its stored primitive did not match the
    /// expected shape or type.
    #[error("missing or invalid value for key `{key}`, expected {expected}")]
    MissingOrInvalidValue {
        /// The wire name of the offending field.
        key: String,
        /// A short description of the expected primitive shape.
        expected: &'static str,
    },
    /// The document as a whole does not match the expected container shape
    /// for the target entity type.
    #[error("cannot deserialize a `{collection}` document: {reason}")]
    CannotDeserialize {
        /// Collection name of the target entity type.
        collection: &'static str,
        /// What went wrong.
        reason: String,
    },
    /// A string tag did not name any case of a closed enumeration.
    #[error("unknown case `{tag}` for enumeration `{name}`")]
    EnumCaseNotFound {
        /// The enumeration's type name.
        name: &'static str,
        /// The unrecognized wire tag.
        tag: String,
    },
    /// A reference descriptor did not resolve to a stored entity.
    #[error("broken reference to collection `{collection}` id {id}")]
    BrokenReference {
        /// Collection the descriptor pointed into.
        collection: String,
        /// Identity the descriptor carried.
        id: ObjectId,
    },
    /// One or more individual deletions failed during a bulk remove.
    ///
    /// Carries every (identity, error) pair so no failure hides another.
    #[error("failed to delete {} of the matched entities", .0.len())]
    DeletingMultiple(Vec<(ObjectId, MappingError)>),
    /// An operation was attempted on an entity handle whose `delete()` has
    /// already completed.
    #[error("entity {0} was deleted, operation refused")]
    EntityDeleted(ObjectId),
    /// Raw document serialization failed (BSON encoding).
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The collection collaborator reported a failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for entity mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

impl From<BsonError> for MappingError {
    fn from(err: BsonError) -> Self {
        MappingError::Serialization(err.to_string())
    }
}

impl MappingError {
    /// Stamps a wire key onto an error raised below the key level.
    ///
    /// Primitive conversions do not know which document key they are being
    /// decoded for; the reader attaches it here. Errors that already carry
    /// their own identity (enum tags, broken references) pass through
    /// untouched.
    pub(crate) fn at_key(self, key: &str) -> Self {
        match self {
            MappingError::MissingOrInvalidValue { expected, .. } => {
                MappingError::MissingOrInvalidValue { key: key.to_string(), expected }
            }
            MappingError::MissingValue { .. } => {
                MappingError::MissingValue { key: key.to_string() }
            }
            other => other,
        }
    }

    /// Shorthand for a shape-mismatch error before the key is known.
    pub(crate) fn invalid(expected: &'static str) -> Self {
        MappingError::MissingOrInvalidValue { key: String::new(), expected }
    }
}
