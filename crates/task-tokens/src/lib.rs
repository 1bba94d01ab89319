//! # Task Tokens
//!
//! Encrypted, value-bearing task records anchored on a ledger.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! A task is stored as a small ledger output whose locking script carries
//! the task text encrypted for its owner. Completing the task spends the
//! output and returns its value. The crate covers:
//! - encoding a task into a lockable record (codec, encryption, script)
//! - discovering and decrypting the user's live records
//! - redeeming a record through the two-phase sign protocol
//!
//! ## Lifecycle
//!
//! | Stage | Component | Effect |
//! |-------|-----------|--------|
//! | Created | `TransactionOrchestrator::create` | Output locked to the owner key |
//! | Catalogued | `discover` | Records listed newest first |
//! | Redeemed | `TransactionOrchestrator::redeem` | Output spent, value returned |
//!
//! ## Module Structure
//!
//! ```text
//! task-tokens/
//! ├── domain/          # Records, scripts, transactions, workflow, errors
//! ├── algorithms/      # PushDrop template, record codec, signature digest
//! ├── ports/           # API trait (inbound) + signing service / verifier (outbound)
//! ├── application/     # Orchestrator, catalog, availability monitor, service
//! ├── adapters/        # In-memory signing service and ledger verifier
//! └── config.rs        # TaskTokenConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{decode_bundle, LedgerChainVerifier, LocalSigningService};
pub use algorithms::{decode_record, encode_fields, NAMESPACE_MARKER};
pub use application::{
    AvailabilityMonitor, AvailabilityStatus, EncryptionAdapter, RecordCatalog, RecordUnlocker,
    ScriptBuilder, TaskTokenService, TransactionOrchestrator,
};
pub use config::{EvidencePolicy, TaskTokenConfig};
pub use domain::{
    parse_task_value, CreateOutcome, DerivationContext, DiscoveryFailure, DiscoveryReport,
    DiscoveryStage, DiscoveryStatus, ErrorCategory, EvidenceBundle, LockingScript, Network,
    Outpoint, RedeemOutcome, TaskRecord, TaskTokenError, UnlockingScript, VerificationStatus,
    WorkflowPhase, DEFAULT_LIST_LIMIT, MIN_TASK_VALUE, UNLOCKING_SCRIPT_LENGTH,
};
pub use ports::{ChainVerifier, MockChainVerifier, SigningService, TaskListApi};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
