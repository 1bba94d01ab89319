//! # PushDrop Template
//!
//! Locking scripts that carry data fields behind an owner signature check:
//!
//! ```text
//! <33-byte owner pubkey> OP_CHECKSIG <field 1> ... <field n> OP_2DROP... [OP_DROP]
//! ```
//!
//! The fields are dropped at execution time, so only the signature check
//! decides spendability.

use crate::domain::script::{write_push, ScriptChunk, OP_2DROP, OP_CHECKSIG, OP_DROP};
use crate::domain::{LockingScript, PublicKey, TaskTokenError, UnlockingScript};

/// Owner key and data fields of a PushDrop script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushDropScript {
    /// Key the spending signature must verify under.
    pub owner: PublicKey,
    /// Embedded data fields, in order.
    pub fields: Vec<Vec<u8>>,
}

/// Build a locking script for `fields` spendable by `owner`.
pub fn build_locking_script(owner: &PublicKey, fields: &[Vec<u8>]) -> LockingScript {
    let mut bytes = Vec::with_capacity(36 + fields.iter().map(|f| f.len() + 3).sum::<usize>());
    write_push(&mut bytes, owner.as_bytes());
    bytes.push(OP_CHECKSIG);

    for field in fields {
        write_push(&mut bytes, field);
    }

    for _ in 0..fields.len() / 2 {
        bytes.push(OP_2DROP);
    }
    if fields.len() % 2 == 1 {
        bytes.push(OP_DROP);
    }

    LockingScript::from_bytes(bytes)
}

/// Decode a PushDrop locking script.
///
/// Anything that is not exactly the template is `UnrecognizedScript`.
pub fn decode_locking_script(script: &LockingScript) -> Result<PushDropScript, TaskTokenError> {
    let chunks = script
        .chunks()
        .map_err(|e| TaskTokenError::UnrecognizedScript(e.to_string()))?;

    let owner = match chunks.first() {
        Some(ScriptChunk::Push(key)) => PublicKey::from_slice(key).ok_or_else(|| {
            TaskTokenError::UnrecognizedScript("first push is not a public key".to_string())
        })?,
        _ => {
            return Err(TaskTokenError::UnrecognizedScript(
                "missing owner key".to_string(),
            ))
        }
    };

    if chunks.get(1) != Some(&ScriptChunk::Op(OP_CHECKSIG)) {
        return Err(TaskTokenError::UnrecognizedScript(
            "owner key not followed by OP_CHECKSIG".to_string(),
        ));
    }

    let mut fields = Vec::new();
    let mut rest = chunks[2..].iter().peekable();
    while let Some(chunk) = rest.peek() {
        match chunk.data() {
            Some(data) => {
                fields.push(data);
                rest.next();
            }
            None => break,
        }
    }

    let mut dropped = 0usize;
    for chunk in rest {
        match chunk {
            ScriptChunk::Op(OP_2DROP) => dropped += 2,
            ScriptChunk::Op(OP_DROP) => dropped += 1,
            _ => {
                return Err(TaskTokenError::UnrecognizedScript(
                    "unexpected opcode after fields".to_string(),
                ))
            }
        }
    }

    if fields.is_empty() || dropped != fields.len() {
        return Err(TaskTokenError::UnrecognizedScript(format!(
            "{} fields but {} dropped",
            fields.len(),
            dropped
        )));
    }

    Ok(PushDropScript { owner, fields })
}

/// Unlocking script: one push of `DER signature || sighash byte`.
pub fn build_unlocking_script(der_signature: &[u8], sighash: u8) -> UnlockingScript {
    let mut payload = Vec::with_capacity(der_signature.len() + 1);
    payload.extend_from_slice(der_signature);
    payload.push(sighash);

    let mut bytes = Vec::with_capacity(payload.len() + 1);
    write_push(&mut bytes, &payload);
    UnlockingScript::from_bytes(bytes)
}

/// Split an unlocking script into the DER signature and sighash byte.
pub fn parse_unlocking_script(script: &UnlockingScript) -> Result<(Vec<u8>, u8), TaskTokenError> {
    let chunks = script.chunks()?;
    match chunks.as_slice() {
        [ScriptChunk::Push(payload)] if payload.len() > 1 => {
            let (der, sighash) = payload.split_at(payload.len() - 1);
            Ok((der.to_vec(), sighash[0]))
        }
        _ => Err(TaskTokenError::MalformedScript(
            "unlocking script must be a single signature push".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> PublicKey {
        let mut key = [7u8; 33];
        key[0] = 0x02;
        PublicKey::from_bytes(key)
    }

    #[test]
    fn test_two_field_layout() {
        let script = build_locking_script(&owner(), &[b"marker".to_vec(), vec![1, 2, 3]]);
        let bytes = script.as_bytes();

        assert_eq!(bytes[0], 33);
        assert_eq!(bytes[34], OP_CHECKSIG);
        assert_eq!(*bytes.last().unwrap(), OP_2DROP);
    }

    #[test]
    fn test_odd_field_count_uses_drop() {
        let fields = vec![vec![1u8; 4], vec![2u8; 4], vec![3u8; 4]];
        let script = build_locking_script(&owner(), &fields);
        let bytes = script.as_bytes();
        assert_eq!(&bytes[bytes.len() - 2..], &[OP_2DROP, OP_DROP]);

        let decoded = decode_locking_script(&script).unwrap();
        assert_eq!(decoded.fields, fields);
        assert_eq!(decoded.owner, owner());
    }

    #[test]
    fn test_large_field_decodes() {
        let fields = vec![b"m".to_vec(), vec![9u8; 1000]];
        let decoded = decode_locking_script(&build_locking_script(&owner(), &fields)).unwrap();
        assert_eq!(decoded.fields, fields);
    }

    #[test]
    fn test_rejects_foreign_scripts() {
        // Pay-to-pubkey-hash style script.
        let mut p2pkh = vec![0x76, 0xa9, 20];
        p2pkh.extend_from_slice(&[0u8; 20]);
        p2pkh.extend_from_slice(&[0x88, 0xac]);
        assert!(matches!(
            decode_locking_script(&LockingScript::from_bytes(p2pkh)),
            Err(TaskTokenError::UnrecognizedScript(_))
        ));

        assert!(decode_locking_script(&LockingScript::default()).is_err());
        assert!(decode_locking_script(&LockingScript::from_bytes(vec![0x05, 1])).is_err());
    }

    #[test]
    fn test_rejects_drop_count_mismatch() {
        let mut bytes = build_locking_script(&owner(), &[vec![1], vec![2]])
            .as_bytes()
            .to_vec();
        bytes.push(OP_DROP);
        assert!(decode_locking_script(&LockingScript::from_bytes(bytes)).is_err());
    }

    #[test]
    fn test_unlocking_roundtrip() {
        let der = vec![0x30u8; 70];
        let script = build_unlocking_script(&der, 0x41);
        assert_eq!(script.len(), 72);

        let (parsed, sighash) = parse_unlocking_script(&script).unwrap();
        assert_eq!(parsed, der);
        assert_eq!(sighash, 0x41);
    }

    #[test]
    fn test_unlocking_rejects_extra_chunks() {
        let mut bytes = build_unlocking_script(&[0x30; 8], 0x41).as_bytes().to_vec();
        bytes.push(0xac);
        assert!(parse_unlocking_script(&UnlockingScript::from_bytes(bytes)).is_err());
    }
}
