//! # Signature Digest
//!
//! BIP-143 style digest with the fork-id flag. Committing to the spent
//! value and script means a signature cannot be replayed against a
//! different source output.
//!
//! # Algorithm
//!
//! 1. hashPrevouts = SHA256d(all outpoints), zero when anyone-can-pay
//! 2. hashSequence = SHA256d(all sequences), zero unless scope is `All`
//!    without anyone-can-pay
//! 3. hashOutputs = SHA256d(all outputs) for `All`, the matching output for
//!    `Single`, zero otherwise
//! 4. digest = SHA256d(version || hashPrevouts || hashSequence || outpoint
//!    || scriptCode || value || sequence || hashOutputs || locktime || type)

use shared_crypto::sha256d;

use crate::domain::{
    write_varint, Hash, SighashType, SignatureScope, TaskTokenError, Transaction,
};

/// Build the preimage for input `index`.
pub fn sighash_preimage(
    tx: &Transaction,
    index: usize,
    sighash: SighashType,
) -> Result<Vec<u8>, TaskTokenError> {
    let input = tx.inputs.get(index).ok_or_else(|| {
        TaskTokenError::MalformedTransaction(format!("input {index} out of range"))
    })?;
    let satoshis = input.source_satoshis.ok_or_else(|| {
        TaskTokenError::MalformedTransaction(format!("input {index} missing source value"))
    })?;
    let script_code = input.source_locking_script.as_ref().ok_or_else(|| {
        TaskTokenError::MalformedTransaction(format!("input {index} missing source script"))
    })?;

    let hash_prevouts = if sighash.anyone_can_pay {
        [0u8; 32]
    } else {
        let mut buf = Vec::with_capacity(tx.inputs.len() * 36);
        for i in &tx.inputs {
            buf.extend_from_slice(&i.source.txid);
            buf.extend_from_slice(&i.source.vout.to_le_bytes());
        }
        sha256d(&buf)
    };

    let hash_sequence = if !sighash.anyone_can_pay && sighash.scope == SignatureScope::All {
        let mut buf = Vec::with_capacity(tx.inputs.len() * 4);
        for i in &tx.inputs {
            buf.extend_from_slice(&i.sequence.to_le_bytes());
        }
        sha256d(&buf)
    } else {
        [0u8; 32]
    };

    let hash_outputs = match sighash.scope {
        SignatureScope::All => {
            let mut buf = Vec::new();
            for output in &tx.outputs {
                output.serialize_into(&mut buf);
            }
            sha256d(&buf)
        }
        SignatureScope::Single if index < tx.outputs.len() => {
            let mut buf = Vec::new();
            tx.outputs[index].serialize_into(&mut buf);
            sha256d(&buf)
        }
        _ => [0u8; 32],
    };

    let mut preimage = Vec::with_capacity(160 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&input.source.txid);
    preimage.extend_from_slice(&input.source.vout.to_le_bytes());
    write_varint(&mut preimage, script_code.len() as u64);
    preimage.extend_from_slice(script_code.as_bytes());
    preimage.extend_from_slice(&satoshis.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&(sighash.to_byte() as u32).to_le_bytes());

    Ok(preimage)
}

/// Digest signed for input `index`.
pub fn sighash_digest(
    tx: &Transaction,
    index: usize,
    sighash: SighashType,
) -> Result<Hash, TaskTokenError> {
    Ok(sha256d(&sighash_preimage(tx, index, sighash)?))
}
