//! # Domain Errors
//!
//! Error types for the task-token lifecycle.

use thiserror::Error;

use super::entities::WorkflowPhase;
use super::value_objects::Outpoint;

/// Hash type alias (32-byte double SHA-256)
pub type Hash = [u8; 32];

/// Coarse error taxonomy used by callers to decide presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any asynchronous call.
    Validation,
    /// A script or payload could not be decoded or decrypted.
    Decode,
    /// The signing service is not reachable or has no identity.
    ServiceUnavailable,
    /// A create or redeem workflow failed.
    Workflow,
    /// An evidence bundle did not verify.
    Verification,
}

/// Task-token error types.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TaskTokenError {
    /// Task text was empty or whitespace.
    #[error("Task text must not be empty")]
    EmptyTaskText,

    /// Task value was zero, negative or not a number.
    #[error("Invalid task value: {0}")]
    InvalidValue(String),

    /// Script does not carry this protocol's record shape.
    #[error("Script not recognized: {0}")]
    UnrecognizedScript(String),

    /// Script bytes could not be parsed.
    #[error("Malformed script: {0}")]
    MalformedScript(String),

    /// Transaction is missing data needed for signing.
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Ciphertext could not be decrypted under the configured context.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Decrypted bytes are not UTF-8 text.
    #[error("Decrypted payload is not valid UTF-8")]
    InvalidPlaintext,

    /// Signing service unreachable or not authorized.
    #[error("Signing service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Failure reported by the signing service, message kept verbatim.
    #[error("{0}")]
    Wallet(String),

    /// Evidence bundle rejected.
    #[error("Evidence verification failed: {0}")]
    VerificationFailed(String),

    /// Spending input does not match what the record committed to.
    #[error("Unlocking refused: committed {field} does not match the spent output")]
    CommitmentMismatch {
        /// Which committed field differed
        field: &'static str,
    },

    /// The record's outpoint is not an input of the signable transaction.
    #[error("Input {0} not present in the signable transaction")]
    InputNotFound(Outpoint),

    /// The record was already redeemed by this client.
    #[error("Record {0} has already been redeemed")]
    AlreadyRedeemed(Outpoint),

    /// No record with this identity in the catalog.
    #[error("Record {0} not found in catalog")]
    RecordNotFound(Outpoint),

    /// Redemption expected a signable skeleton.
    #[error("Signing service returned no signable transaction")]
    MissingSignableTransaction,

    /// Creation expected a transaction id.
    #[error("Signing service returned no transaction id")]
    MissingTxid,

    /// Workflow state machine violation.
    #[error("Invalid workflow transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Phase the workflow was in
        from: WorkflowPhase,
        /// Phase that was requested
        to: WorkflowPhase,
    },

    /// Text could not be parsed as `<txid>.<vout>`.
    #[error("Invalid outpoint: {0}")]
    InvalidOutpoint(String),

    /// Configuration value rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TaskTokenError {
    /// Map the error onto the caller-facing taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyTaskText | Self::InvalidValue(_) | Self::Config(_) => {
                ErrorCategory::Validation
            }
            Self::UnrecognizedScript(_)
            | Self::MalformedScript(_)
            | Self::DecryptionFailed(_)
            | Self::InvalidPlaintext
            | Self::InvalidOutpoint(_) => ErrorCategory::Decode,
            Self::ServiceUnavailable(_) => ErrorCategory::ServiceUnavailable,
            Self::VerificationFailed(_) => ErrorCategory::Verification,
            Self::MalformedTransaction(_)
            | Self::Wallet(_)
            | Self::CommitmentMismatch { .. }
            | Self::InputNotFound(_)
            | Self::AlreadyRedeemed(_)
            | Self::RecordNotFound(_)
            | Self::MissingSignableTransaction
            | Self::MissingTxid
            | Self::InvalidTransition { .. } => ErrorCategory::Workflow,
        }
    }

    /// True when the signing service is unreachable or has no identity.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}
