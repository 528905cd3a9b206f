//! # Engine Errors
//!
//! This module defines the error taxonomy shared by every component of the engine.
//! By centralizing error definitions, every verb reports failures the same way:
//! the verb that failed, the resource it failed on, and a classified [`ErrorKind`].
//!
//! ## Layers
//!
//! - [`IdError`] - identifier codec failures (pure, no I/O).
//! - [`MigrationError`] - persisted state could not be brought to the current layout.
//! - [`RemoteError`] - a failure reported by the Remote API Client, classified by [`ErrorClass`].
//! - [`ReconcileError`] - what the reconciler surfaces to its caller.

use std::fmt;

/// The lifecycle verb an error (or log line) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Import => "import",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the identifier codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("malformed locator: {0}")]
    MalformedLocator(String),
    #[error("unable to parse identifier {input:?}: {reason}")]
    UnparseableIdentifier { input: String, reason: String },
    #[error("identifier {input:?} is missing the {segment:?} segment")]
    MissingSegment { input: String, segment: String },
}

/// Failures of the state version migrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    #[error("unsupported state version {found} (current version is {current})")]
    UnsupportedStateVersion { found: u32, current: u32 },
    #[error("upgrading state from version {from} failed: {reason}")]
    UpgradeFailed { from: u32, reason: String },
    #[error("malformed state record: {0}")]
    Malformed(String),
}

/// Classification of a provider error, as reported by the Remote API Client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    Transient,
    Rejected,
    Unknown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::NotFound => "not found",
            ErrorClass::Conflict => "conflict",
            ErrorClass::Transient => "transient",
            ErrorClass::Rejected => "rejected",
            ErrorClass::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// An error returned by the Remote API Client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct RemoteError {
    pub class: ErrorClass,
    pub message: String,
}

impl RemoteError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Transient, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Rejected, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unknown, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.class == ErrorClass::NotFound
    }
}

/// The classified cause of a [`ReconcileError`].
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Identifier(#[from] IdError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("a resource with identifier {identifier:?} already exists - it must be imported to be managed")]
    AlreadyExists { identifier: String },
    #[error("the provider reported success but returned no identifier")]
    IdentifierUnavailable,
    #[error("changing {field} requires replacing the resource ({current:?} -> {desired:?})")]
    RequiresReplacement {
        field: &'static str,
        current: String,
        desired: String,
    },
    #[error("request rejected: {0}")]
    RequestRejected(RemoteError),
    #[error("operation failed remotely: {0}")]
    OperationFailed(String),
    #[error("the resource disappeared while the operation was in progress")]
    VanishedDuringOperation,
    #[error("deadline exceeded{}", pending_suffix(.operation))]
    DeadlineExceeded { operation: Option<String> },
    #[error("cancelled{}", pending_suffix(.operation))]
    Cancelled { operation: Option<String> },
    #[error("transient remote failure: {0}")]
    TransientRemoteFailure(RemoteError),
    #[error("remote error: {0}")]
    Remote(RemoteError),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

fn pending_suffix(operation: &Option<String>) -> String {
    match operation {
        Some(token) => format!(" (operation {token} still pending)"),
        None => String::new(),
    }
}

impl ErrorKind {
    /// Maps a provider error to the engine taxonomy. NotFound has no generic meaning,
    /// so callers that care about it must check before classifying.
    pub fn from_remote(err: RemoteError) -> Self {
        match err.class {
            ErrorClass::Transient => ErrorKind::TransientRemoteFailure(err),
            ErrorClass::Rejected | ErrorClass::Conflict => ErrorKind::RequestRejected(err),
            ErrorClass::NotFound | ErrorClass::Unknown => ErrorKind::Remote(err),
        }
    }
}

/// An error surfaced by the reconciler.
///
/// Always names the verb and the resource (its identifier, or the would-be identifier
/// rendered from the locator if none has been minted yet) so engine errors can be
/// correlated with the provider's audit logs.
#[derive(Debug, thiserror::Error)]
#[error("{verb} {resource}: {kind}")]
pub struct ReconcileError {
    pub verb: Verb,
    pub resource: String,
    #[source]
    pub kind: ErrorKind,
}

impl ReconcileError {
    pub fn new(verb: Verb, resource: impl Into<String>, kind: impl Into<ErrorKind>) -> Self {
        Self {
            verb,
            resource: resource.into(),
            kind: kind.into(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// True for failures a caller may reasonably retry as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::TransientRemoteFailure(_))
    }
}
