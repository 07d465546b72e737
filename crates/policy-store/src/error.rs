use std::fmt;

use thiserror::Error;

/// The two kinds of keyed entity held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Rule,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule => write!(f, "rule"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Errors returned by store mutations and the exception-app builder.
///
/// Every failed mutation leaves the store exactly as it was before the call.
/// An absent target id is not an error; see [`Outcome::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{kind} id must not be empty")]
    EmptyId { kind: EntityKind },

    #[error("{kind} id '{id}' is longer than {max} bytes")]
    IdTooLong {
        kind: EntityKind,
        id: String,
        max: usize,
    },

    #[error("{kind} '{id}' already exists")]
    Duplicate { kind: EntityKind, id: String },

    /// The entity cannot be created within its fixed shape.
    #[error("{what} holds {len} entries but the capacity is {max}")]
    CapacityExceeded {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("rule '{id}' is still referenced by {refer_count} group(s)")]
    StillReferenced { id: String, refer_count: usize },

    #[error("invalid feature string '{input}': {reason}")]
    InvalidFeatureString { input: String, reason: String },
}

impl PolicyError {
    pub(crate) fn feature(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFeatureString {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result of a mutation that targets an existing entity by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target existed and the change was made.
    Applied,
    /// No entity with the given id exists; nothing changed.
    NotFound,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}
