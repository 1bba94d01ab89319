//! # Lock/Unlock Script Builder
//!
//! Builds a record's locking script under the owner's derived key, and the
//! unlocker that produces the matching proof at redemption time.

use std::sync::Arc;

use crate::algorithms::{build_locking_script, build_unlocking_script, decode_locking_script, sighash_digest};
use crate::domain::{
    DerivationContext, LockingScript, SighashType, TaskTokenError, Transaction, UnlockingScript,
    UNLOCKING_SCRIPT_LENGTH,
};
use crate::ports::SigningService;

/// Builds locking scripts and unlockers through the signing service.
pub struct ScriptBuilder<W: SigningService> {
    service: Arc<W>,
}

impl<W: SigningService> Clone for ScriptBuilder<W> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<W: SigningService> ScriptBuilder<W> {
    /// Builder backed by `service`.
    pub fn new(service: Arc<W>) -> Self {
        Self { service }
    }

    /// Locking script for `fields`, spendable only with the key derived for
    /// `context`. No ledger interaction.
    pub async fn lock(
        &self,
        fields: &[Vec<u8>],
        context: &DerivationContext,
    ) -> Result<LockingScript, TaskTokenError> {
        let owner = self.service.get_public_key(context).await?;
        Ok(build_locking_script(&owner, fields))
    }

    /// Unlocker for a record committed with `value` and `locking_script`.
    pub fn unlock(
        &self,
        context: &DerivationContext,
        sighash: SighashType,
        value: u64,
        locking_script: LockingScript,
    ) -> RecordUnlocker<W> {
        RecordUnlocker {
            service: Arc::clone(&self.service),
            context: context.clone(),
            sighash,
            value,
            locking_script,
        }
    }
}

/// Produces the unlocking proof for one record input.
pub struct RecordUnlocker<W: SigningService> {
    service: Arc<W>,
    context: DerivationContext,
    sighash: SighashType,
    value: u64,
    locking_script: LockingScript,
}

impl<W: SigningService> RecordUnlocker<W> {
    /// Upper bound of the proof length, reserved before the proof exists.
    pub fn estimate_length(&self) -> usize {
        UNLOCKING_SCRIPT_LENGTH
    }

    /// Sign input `input_index` of `tx`.
    ///
    /// The input must spend an output carrying exactly the committed value
    /// and locking script, locked to the key derived for this context.
    /// Otherwise `CommitmentMismatch` is returned and nothing is signed. An
    /// input without its source output is rejected as malformed.
    pub async fn sign(
        &self,
        tx: &Transaction,
        input_index: usize,
    ) -> Result<UnlockingScript, TaskTokenError> {
        let input = tx.inputs.get(input_index).ok_or_else(|| {
            TaskTokenError::MalformedTransaction(format!("input {input_index} out of range"))
        })?;

        let source_value = input.source_satoshis.ok_or_else(|| {
            TaskTokenError::MalformedTransaction(format!(
                "input {input_index} does not carry its source value"
            ))
        })?;
        let source_script = input.source_locking_script.as_ref().ok_or_else(|| {
            TaskTokenError::MalformedTransaction(format!(
                "input {input_index} does not carry its source locking script"
            ))
        })?;
        if source_value != self.value {
            return Err(TaskTokenError::CommitmentMismatch { field: "value" });
        }
        if source_script != &self.locking_script {
            return Err(TaskTokenError::CommitmentMismatch {
                field: "locking script",
            });
        }

        let committed_owner = decode_locking_script(&self.locking_script)
            .map_err(|_| TaskTokenError::CommitmentMismatch {
                field: "locking script",
            })?
            .owner;
        let derived_owner = self.service.get_public_key(&self.context).await?;
        if committed_owner != derived_owner {
            return Err(TaskTokenError::CommitmentMismatch { field: "owner key" });
        }

        let digest = sighash_digest(tx, input_index, self.sighash)?;
        let signature = self.service.create_signature(&digest, &self.context).await?;

        Ok(build_unlocking_script(&signature, self.sighash.to_byte()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalSigningService;
    use crate::algorithms::{encode_fields, parse_unlocking_script};
    use crate::config::TaskTokenConfig;
    use crate::domain::{Outpoint, ProtocolId, SecurityLevel, TxInput, TxOutput};

    fn context() -> DerivationContext {
        TaskTokenConfig::default().derivation_context()
    }

    fn spend_of(script: &LockingScript, value: u64) -> Transaction {
        Transaction {
            inputs: vec![TxInput::new(Outpoint::new([9u8; 32], 0))
                .with_source_output(value, script.clone())],
            outputs: vec![TxOutput::new(value, LockingScript::from_bytes(vec![0x51]))],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lock_embeds_owner_key() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let builder = ScriptBuilder::new(Arc::clone(&wallet));

        let script = builder.lock(&encode_fields(b"ct"), &context()).await.unwrap();
        let decoded = decode_locking_script(&script).unwrap();

        assert_eq!(decoded.owner, wallet.get_public_key(&context()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_produces_verifiable_proof() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let builder = ScriptBuilder::new(Arc::clone(&wallet));
        let script = builder.lock(&encode_fields(b"ct"), &context()).await.unwrap();

        let unlocker = builder.unlock(&context(), SighashType::all(), 1000, script.clone());
        let tx = spend_of(&script, 1000);
        let proof = unlocker.sign(&tx, 0).await.unwrap();

        assert!(proof.len() <= unlocker.estimate_length());
        let (_, sighash) = parse_unlocking_script(&proof).unwrap();
        assert_eq!(sighash, 0x41);
        assert!(wallet.verify_unlocking(&tx, 0, &proof).unwrap());
    }

    #[tokio::test]
    async fn test_missing_source_output_refused() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let builder = ScriptBuilder::new(Arc::clone(&wallet));
        let script = builder.lock(&encode_fields(b"ct"), &context()).await.unwrap();
        let calls_before = wallet.call_count();

        // Committed to 999 while the real output holds 1000.
        let unlocker = builder.unlock(&context(), SighashType::all(), 999, script.clone());

        let mut tx = spend_of(&script, 1000);
        tx.inputs[0].source_satoshis = None;
        tx.inputs[0].source_locking_script = None;
        assert!(matches!(
            unlocker.sign(&tx, 0).await,
            Err(TaskTokenError::MalformedTransaction(_))
        ));

        let mut tx = spend_of(&script, 1000);
        tx.inputs[0].source_locking_script = None;
        assert!(matches!(
            unlocker.sign(&tx, 0).await,
            Err(TaskTokenError::MalformedTransaction(_))
        ));

        let mut tx = spend_of(&script, 1000);
        tx.inputs[0].source_satoshis = None;
        assert!(matches!(
            unlocker.sign(&tx, 0).await,
            Err(TaskTokenError::MalformedTransaction(_))
        ));

        assert_eq!(wallet.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_value_mismatch_fails_closed() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let builder = ScriptBuilder::new(wallet);
        let script = builder.lock(&encode_fields(b"ct"), &context()).await.unwrap();

        let unlocker = builder.unlock(&context(), SighashType::all(), 999, script.clone());
        let err = unlocker.sign(&spend_of(&script, 1000), 0).await.unwrap_err();
        assert_eq!(err, TaskTokenError::CommitmentMismatch { field: "value" });
    }

    #[tokio::test]
    async fn test_script_mismatch_fails_closed() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let builder = ScriptBuilder::new(wallet);
        let script = builder.lock(&encode_fields(b"ct"), &context()).await.unwrap();
        let other = builder.lock(&encode_fields(b"other"), &context()).await.unwrap();

        let unlocker = builder.unlock(&context(), SighashType::all(), 1000, script);
        let err = unlocker.sign(&spend_of(&other, 1000), 0).await.unwrap_err();
        assert_eq!(
            err,
            TaskTokenError::CommitmentMismatch {
                field: "locking script"
            }
        );
    }

    #[tokio::test]
    async fn test_wrong_context_fails_closed() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let builder = ScriptBuilder::new(wallet);
        let script = builder.lock(&encode_fields(b"ct"), &context()).await.unwrap();

        let other = DerivationContext::owner(ProtocolId::new(SecurityLevel::Silent, "other"), "1");
        let unlocker = builder.unlock(&other, SighashType::all(), 1000, script.clone());
        let err = unlocker.sign(&spend_of(&script, 1000), 0).await.unwrap_err();
        assert_eq!(err, TaskTokenError::CommitmentMismatch { field: "owner key" });
    }

    #[tokio::test]
    async fn test_input_out_of_range() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let builder = ScriptBuilder::new(wallet);
        let script = builder.lock(&encode_fields(b"ct"), &context()).await.unwrap();

        let unlocker = builder.unlock(&context(), SighashType::all(), 1000, script.clone());
        assert!(matches!(
            unlocker.sign(&spend_of(&script, 1000), 3).await,
            Err(TaskTokenError::MalformedTransaction(_))
        ));
    }
}
