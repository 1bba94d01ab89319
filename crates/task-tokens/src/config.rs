//! # Task Token Configuration
//!
//! Protocol contexts, discovery limits and workflow policy.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::domain::{
    DerivationContext, ProtocolId, SecurityLevel, TaskTokenError, DEFAULT_LIST_LIMIT,
    UNLOCKING_SCRIPT_LENGTH,
};

/// What redemption does with a record's evidence bundle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidencePolicy {
    /// Never verify.
    Skip,
    /// Verify, log and report a failure, then finalize anyway.
    #[default]
    Warn,
    /// Verify and refuse to finalize on failure.
    Enforce,
}

impl fmt::Display for EvidencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::Warn => f.write_str("warn"),
            Self::Enforce => f.write_str("enforce"),
        }
    }
}

impl FromStr for EvidencePolicy {
    type Err = TaskTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "warn" => Ok(Self::Warn),
            "enforce" => Ok(Self::Enforce),
            other => Err(TaskTokenError::Config(format!(
                "unknown evidence policy {other:?}"
            ))),
        }
    }
}

/// Task token configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTokenConfig {
    /// Protocol namespace used for encryption and locking keys.
    pub protocol_name: String,

    /// Security level of the protocol namespace.
    pub security_level: SecurityLevel,

    /// Key selector inside the namespace.
    pub key_id: String,

    /// Store records are tracked under.
    pub basket: String,

    /// Maximum outputs requested per discovery pass.
    pub list_limit: u32,

    /// Evidence handling at redemption.
    pub evidence_policy: EvidencePolicy,

    /// Ask the verifier for strict checking.
    pub strict_verification: bool,

    /// Availability poll period in milliseconds.
    pub poll_interval_ms: u64,

    /// Allow the signing service to queue broadcasts.
    pub accept_delayed_broadcast: bool,

    /// Reserved unlocking proof length.
    pub unlocking_script_length: usize,

    /// Description attached to creating transactions.
    pub create_description: String,

    /// Description attached to redeeming transactions.
    pub redeem_description: String,
}

impl Default for TaskTokenConfig {
    fn default() -> Self {
        Self {
            protocol_name: "todo list".to_string(),
            security_level: SecurityLevel::Silent,
            key_id: "1".to_string(),
            basket: "todo tokens".to_string(),
            list_limit: DEFAULT_LIST_LIMIT,
            evidence_policy: EvidencePolicy::Warn,
            strict_verification: true,
            poll_interval_ms: 1000,
            accept_delayed_broadcast: true,
            unlocking_script_length: UNLOCKING_SCRIPT_LENGTH,
            create_description: "Create a TODO task".to_string(),
            redeem_description: "Complete a TODO task".to_string(),
        }
    }
}

impl TaskTokenConfig {
    /// Create a config for testing (fast polling, strict evidence).
    pub fn for_testing() -> Self {
        Self {
            list_limit: 100,
            evidence_policy: EvidencePolicy::Enforce,
            poll_interval_ms: 10,
            accept_delayed_broadcast: false,
            ..Default::default()
        }
    }

    /// Defaults overridden by `TT_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TT_PROTOCOL_NAME`, `TT_SECURITY_LEVEL` (0-2), `TT_KEY_ID`
    /// - `TT_BASKET`, `TT_LIST_LIMIT`
    /// - `TT_EVIDENCE_POLICY` (skip, warn, enforce), `TT_STRICT_VERIFICATION`
    /// - `TT_POLL_INTERVAL_MS`, `TT_DELAYED_BROADCAST`
    pub fn from_env() -> Result<Self, TaskTokenError> {
        let mut config = Self::default();

        if let Ok(name) = env::var("TT_PROTOCOL_NAME") {
            config.protocol_name = name;
        }
        if let Ok(level) = env::var("TT_SECURITY_LEVEL") {
            config.security_level = match level.trim() {
                "0" => SecurityLevel::Silent,
                "1" => SecurityLevel::App,
                "2" => SecurityLevel::Counterparty,
                other => {
                    return Err(TaskTokenError::Config(format!(
                        "TT_SECURITY_LEVEL must be 0, 1 or 2, got {other:?}"
                    )))
                }
            };
        }
        if let Ok(key_id) = env::var("TT_KEY_ID") {
            config.key_id = key_id;
        }
        if let Ok(basket) = env::var("TT_BASKET") {
            config.basket = basket;
        }
        if let Ok(limit) = env::var("TT_LIST_LIMIT") {
            config.list_limit = parse_number("TT_LIST_LIMIT", &limit)?;
        }
        if let Ok(policy) = env::var("TT_EVIDENCE_POLICY") {
            config.evidence_policy = policy.parse()?;
        }
        if let Ok(strict) = env::var("TT_STRICT_VERIFICATION") {
            config.strict_verification = parse_flag(&strict);
        }
        if let Ok(ms) = env::var("TT_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_number("TT_POLL_INTERVAL_MS", &ms)?;
        }
        if let Ok(delayed) = env::var("TT_DELAYED_BROADCAST") {
            config.accept_delayed_broadcast = parse_flag(&delayed);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the workflows cannot run with.
    pub fn validate(&self) -> Result<(), TaskTokenError> {
        if self.protocol_name.trim().is_empty() {
            return Err(TaskTokenError::Config("protocol name is empty".to_string()));
        }
        if self.key_id.is_empty() {
            return Err(TaskTokenError::Config("key id is empty".to_string()));
        }
        if self.basket.trim().is_empty() {
            return Err(TaskTokenError::Config("basket is empty".to_string()));
        }
        if self.list_limit == 0 {
            return Err(TaskTokenError::Config("list limit must be positive".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(TaskTokenError::Config(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.unlocking_script_length == 0 {
            return Err(TaskTokenError::Config(
                "unlocking script length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Protocol context for encryption and locking.
    pub fn protocol(&self) -> ProtocolId {
        ProtocolId::new(self.security_level, self.protocol_name.clone())
    }

    /// Owner derivation context.
    pub fn derivation_context(&self) -> DerivationContext {
        DerivationContext::owner(self.protocol(), self.key_id.clone())
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, TaskTokenError> {
    value
        .trim()
        .parse()
        .map_err(|_| TaskTokenError::Config(format!("{name} is not a number: {value:?}")))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
