//! # Runtime Configuration
//!
//! Task-token settings, telemetry settings and the local wallet's seed.

use task_telemetry::TelemetryConfig;
use task_tokens::TaskTokenConfig;
use thiserror::Error;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Task-token settings.
    pub tokens: TaskTokenConfig,
    /// Logging and metrics.
    pub telemetry: TelemetryConfig,
    /// Local wallet settings.
    pub wallet: WalletConfig,
}

/// Local signing service settings.
#[derive(Debug, Clone, Default)]
pub struct WalletConfig {
    /// Root secret; random when unset.
    pub seed: Option<[u8; 32]>,
    /// Change minted at startup.
    pub funding: u64,
    /// Flat fee per transaction.
    pub fee: u64,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Wallet seed is not 32 bytes of hex.
    #[error("TT_WALLET_SEED must be 32 bytes (64 hex chars)")]
    InvalidSeed,

    /// Task-token settings rejected.
    #[error(transparent)]
    Tokens(#[from] task_tokens::TaskTokenError),
}

impl RuntimeConfig {
    /// Load from `TT_*` environment variables.
    ///
    /// `TT_WALLET_SEED` (64 hex chars) fixes the wallet's root secret.
    pub fn from_env() -> Result<Self, ConfigError> {
        let seed = match std::env::var("TT_WALLET_SEED") {
            Ok(seed_hex) => Some(parse_seed(&seed_hex)?),
            Err(_) => None,
        };

        Ok(Self {
            tokens: TaskTokenConfig::from_env()?,
            telemetry: TelemetryConfig::from_env(),
            wallet: WalletConfig {
                seed,
                ..Default::default()
            },
        })
    }
}

/// Parse a 64-character hex seed.
pub fn parse_seed(seed_hex: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(seed_hex.trim()).map_err(|_| ConfigError::InvalidSeed)?;
    bytes.try_into().map_err(|_| ConfigError::InvalidSeed)
}
