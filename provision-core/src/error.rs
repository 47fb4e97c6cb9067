use crate::id::{Fingerprint, ObjectId};
use std::io;
use thiserror::Error;

/// Represents all possible errors raised while provisioning or calling instances
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Malformed spawn, initializer or call arguments
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A second `initialize` on the same upgradeable instance
    #[error("Instance {0} is already initialized")]
    AlreadyInitialized(ObjectId),

    /// A domain call reached an upgradeable instance before `initialize`
    #[error("Instance {0} has not been initialized")]
    Uninitialized(ObjectId),

    /// The caller is not the admin/owner required by a privileged operation
    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized { caller: ObjectId, action: String },

    /// Duplicate insert of a registered fingerprint
    #[error("Document already exists: {0}")]
    DocumentExists(Fingerprint),

    /// The operation references a record or object that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A balance or quantity is smaller than the operation requires
    #[error("Insufficient {resource}: required {required}, available {available}")]
    InsufficientResource {
        resource: String,
        required: u64,
        available: u64,
    },

    /// The active logic module has no such method
    #[error("Logic `{logic}` has no method `{method}`")]
    UnknownMethod { logic: String, method: String },

    /// No off-curve identifier could be derived for the given seeds
    #[error("Could not derive an object id for {0}")]
    IdDerivation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl ProvisionError {
    /// Symbolic reason code surfaced to callers in failed receipts
    pub fn code(&self) -> &'static str {
        match self {
            ProvisionError::InvalidParameters(_) => "InvalidParameters",
            ProvisionError::AlreadyInitialized(_) => "AlreadyInitialized",
            ProvisionError::Uninitialized(_) => "Uninitialized",
            ProvisionError::Unauthorized { .. } => "Unauthorized",
            ProvisionError::DocumentExists(_) => "DocumentExists",
            ProvisionError::NotFound(_) => "NotFound",
            ProvisionError::InsufficientResource { .. } => "InsufficientResource",
            ProvisionError::UnknownMethod { .. } => "UnknownMethod",
            ProvisionError::IdDerivation(_) => "IdDerivation",
            ProvisionError::Serialization(_) => "Serialization",
            ProvisionError::Io(_) => "Io",
            ProvisionError::Journal(_) => "Journal",
            ProvisionError::Config(_) => "Config",
            ProvisionError::Context(_) => "Other",
        }
    }

    pub fn unauthorized(caller: ObjectId, action: impl Into<String>) -> Self {
        ProvisionError::Unauthorized {
            caller,
            action: action.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ProvisionError::NotFound(what.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ProvisionError::InvalidParameters(reason.into())
    }
}

impl From<bincode::Error> for ProvisionError {
    fn from(err: bincode::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}
