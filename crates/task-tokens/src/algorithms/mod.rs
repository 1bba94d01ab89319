//! # Algorithms Module
//!
//! Script templates, the record codec and the signature digest.

pub mod pushdrop;
pub mod record_codec;
pub mod sighash;

pub use pushdrop::{
    build_locking_script, build_unlocking_script, decode_locking_script, parse_unlocking_script,
    PushDropScript,
};
pub use record_codec::{decode_record, encode_fields, DecodedRecord, NAMESPACE_MARKER};
pub use sighash::{sighash_digest, sighash_preimage};
