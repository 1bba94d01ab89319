//! # Record Codec
//!
//! Maps a record payload to its ordered field list and back. A record
//! carries exactly two fields: the namespace marker, then the ciphertext.
//! Decoding is purely structural and never touches encryption.

use crate::algorithms::pushdrop::decode_locking_script;
use crate::domain::{LockingScript, PublicKey, TaskTokenError};

/// Constant identifying this protocol's records on a shared ledger.
pub const NAMESPACE_MARKER: &[u8] = b"1ToDoDtKreEzbHYKFjmoBuduFmSXXUGZG";

/// Number of fields a record script carries.
pub const RECORD_FIELD_COUNT: usize = 2;

/// Fields decoded from a record's locking script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Owner key the script locks to.
    pub owner: PublicKey,
    /// `[marker, ciphertext]`.
    pub fields: Vec<Vec<u8>>,
}

impl DecodedRecord {
    /// The encrypted task text.
    pub fn ciphertext(&self) -> &[u8] {
        &self.fields[1]
    }
}

/// Ordered field list for `ciphertext`.
pub fn encode_fields(ciphertext: &[u8]) -> Vec<Vec<u8>> {
    vec![NAMESPACE_MARKER.to_vec(), ciphertext.to_vec()]
}

/// Decode a locking script as a record.
///
/// Scripts without the `[marker, non-empty ciphertext]` shape are
/// `UnrecognizedScript`; callers skip them.
pub fn decode_record(script: &LockingScript) -> Result<DecodedRecord, TaskTokenError> {
    let decoded = decode_locking_script(script)?;

    if decoded.fields.len() != RECORD_FIELD_COUNT {
        return Err(TaskTokenError::UnrecognizedScript(format!(
            "expected {RECORD_FIELD_COUNT} fields, found {}",
            decoded.fields.len()
        )));
    }
    if decoded.fields[0] != NAMESPACE_MARKER {
        return Err(TaskTokenError::UnrecognizedScript(
            "namespace marker mismatch".to_string(),
        ));
    }
    if decoded.fields[1].is_empty() {
        return Err(TaskTokenError::UnrecognizedScript(
            "empty ciphertext".to_string(),
        ));
    }

    Ok(DecodedRecord {
        owner: decoded.owner,
        fields: decoded.fields,
    })
}
