//! # Ledger Chain Verifier
//!
//! Checks evidence bundles issued by a `LocalSigningService` against that
//! service's ledger.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::local_wallet::LocalSigningService;
use crate::domain::{EvidenceBundle, Hash, TaskTokenError, Transaction};
use crate::ports::ChainVerifier;

/// Verifies bundles against the local ledger.
pub struct LedgerChainVerifier {
    ledger: Arc<LocalSigningService>,
}

impl LedgerChainVerifier {
    /// Verifier backed by `ledger`.
    pub fn new(ledger: Arc<LocalSigningService>) -> Self {
        Self { ledger }
    }
}

/// Decode a bundle produced by the local signing service.
pub fn decode_bundle(evidence: &EvidenceBundle) -> Result<Vec<Transaction>, TaskTokenError> {
    bincode::deserialize(evidence.as_bytes())
        .map_err(|e| TaskTokenError::VerificationFailed(format!("malformed evidence bundle: {e}")))
}

#[async_trait]
impl ChainVerifier for LedgerChainVerifier {
    /// Every transaction in the bundle must be on the ledger. In strict mode
    /// the bundle must also carry the parent of every input it spends.
    async fn verify(&self, evidence: &EvidenceBundle, strict: bool) -> Result<bool, TaskTokenError> {
        let transactions = decode_bundle(evidence)?;
        if transactions.is_empty() {
            return Ok(false);
        }

        let txids: HashSet<Hash> = transactions.iter().map(Transaction::txid).collect();

        if let Some(unknown) = txids.iter().find(|txid| !self.ledger.knows_transaction(txid)) {
            debug!(txid = %hex::encode(unknown), "Evidence references unknown transaction");
            return Ok(false);
        }

        if strict {
            let missing_parent = transactions
                .iter()
                .flat_map(|tx| tx.inputs.iter())
                .any(|input| !txids.contains(&input.source.txid));
            if missing_parent {
                debug!("Evidence bundle lacks ancestry");
                return Ok(false);
            }
        }

        Ok(true)
    }
}
