//! # Domain Value Objects
//!
//! Immutable value types shared by the codec, the orchestrator and the ports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{Hash, TaskTokenError};

/// Reference to a ledger position: transaction id plus output index.
///
/// This is a record's `identity`. Text form is `<txid hex>.<vout>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    /// Transaction id.
    pub txid: Hash,
    /// Output index within the transaction.
    pub vout: u32,
}

impl Outpoint {
    /// Create a new outpoint.
    pub const fn new(txid: Hash, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Transaction id as lowercase hex.
    pub fn txid_hex(&self) -> String {
        hex::encode(self.txid)
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.txid_hex(), self.vout)
    }
}

impl FromStr for Outpoint {
    type Err = TaskTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid_hex, vout) = s
            .split_once('.')
            .ok_or_else(|| TaskTokenError::InvalidOutpoint(s.to_string()))?;

        let bytes = hex::decode(txid_hex).map_err(|_| TaskTokenError::InvalidOutpoint(s.to_string()))?;
        let txid: Hash = bytes
            .try_into()
            .map_err(|_| TaskTokenError::InvalidOutpoint(s.to_string()))?;
        let vout = vout
            .parse::<u32>()
            .map_err(|_| TaskTokenError::InvalidOutpoint(s.to_string()))?;

        Ok(Self { txid, vout })
    }
}

/// Who may observe that a derived key belongs to the owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// No per-counterparty or per-app confirmation.
    #[default]
    Silent,
    /// Confirmed once per application.
    App,
    /// Confirmed per counterparty.
    Counterparty,
}

impl SecurityLevel {
    /// Numeric level used in invoice numbers.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Silent => 0,
            Self::App => 1,
            Self::Counterparty => 2,
        }
    }
}

/// Protocol context: a stable namespace for key derivation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolId {
    /// Security level of the protocol.
    pub security_level: SecurityLevel,
    /// Protocol name.
    pub name: String,
}

impl ProtocolId {
    /// Create a protocol id.
    pub fn new(security_level: SecurityLevel, name: impl Into<String>) -> Self {
        Self {
            security_level,
            name: name.into(),
        }
    }
}

/// Compressed secp256k1 public key bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    /// Wrap compressed bytes.
    pub const fn from_bytes(bytes: [u8; 33]) -> Self {
        Self(bytes)
    }

    /// Create from a slice of exactly 33 bytes with a compressed prefix.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 33] = bytes.try_into().ok()?;
        matches!(array[0], 0x02 | 0x03).then_some(Self(array))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Owner selector for derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Counterparty {
    /// The current user themself.
    #[default]
    Myself,
    /// Publicly derivable key.
    Anyone,
    /// A specific other party.
    Other(PublicKey),
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Myself => f.write_str("self"),
            Self::Anyone => f.write_str("anyone"),
            Self::Other(key) => write!(f, "{key}"),
        }
    }
}

/// Protocol context, key context and owner selector in one value.
///
/// Encryption at creation and decryption at discovery must use equal
/// contexts or decryption fails.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DerivationContext {
    /// Protocol namespace.
    pub protocol: ProtocolId,
    /// Key selector inside the namespace.
    pub key_id: String,
    /// Whose key.
    pub counterparty: Counterparty,
}

impl DerivationContext {
    /// Context owned by the current user.
    pub fn owner(protocol: ProtocolId, key_id: impl Into<String>) -> Self {
        Self {
            protocol,
            key_id: key_id.into(),
            counterparty: Counterparty::Myself,
        }
    }

    /// Invoice number `<level>-<protocol>-<key id>` used for derivation.
    pub fn invoice_number(&self) -> String {
        format!(
            "{}-{}-{}",
            self.protocol.security_level.as_u8(),
            self.protocol.name,
            self.key_id
        )
    }
}

/// Evidence bundle (BEEF): a transaction plus the ancestry proving it.
///
/// Opaque to this crate; produced by the signing service and checked by a
/// chain verifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBundle(Vec<u8>);

impl EvidenceBundle {
    /// Wrap raw bundle bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True when no evidence was supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bundle length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Ledger network reported by the signing service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Main network.
    Mainnet,
    /// Test network.
    Testnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => f.write_str("mainnet"),
            Self::Testnet => f.write_str("testnet"),
        }
    }
}

/// Which outputs a signature commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SignatureScope {
    /// Every input and output.
    #[default]
    All,
    /// Inputs only.
    None,
    /// The output at the signed input's index.
    Single,
}

/// Fork-id flag carried in every sighash byte.
pub const SIGHASH_FORKID: u8 = 0x40;
/// Anyone-can-pay flag.
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Signature scope plus the anyone-can-pay modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SighashType {
    /// Output commitment.
    pub scope: SignatureScope,
    /// Commit to the signed input only.
    pub anyone_can_pay: bool,
}

impl SighashType {
    /// Commit to all inputs and outputs.
    pub const fn all() -> Self {
        Self {
            scope: SignatureScope::All,
            anyone_can_pay: false,
        }
    }

    /// Byte appended to a DER signature.
    pub fn to_byte(self) -> u8 {
        let base = match self.scope {
            SignatureScope::All => 0x01,
            SignatureScope::None => 0x02,
            SignatureScope::Single => 0x03,
        };
        let acp = if self.anyone_can_pay { SIGHASH_ANYONECANPAY } else { 0 };
        base | SIGHASH_FORKID | acp
    }

    /// Parse a sighash byte; requires the fork-id flag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte & SIGHASH_FORKID == 0 {
            return None;
        }
        let scope = match byte & 0x1f {
            0x01 => SignatureScope::All,
            0x02 => SignatureScope::None,
            0x03 => SignatureScope::Single,
            _ => return None,
        };
        Some(Self {
            scope,
            anyone_can_pay: byte & SIGHASH_ANYONECANPAY != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outpoint_display_parse() {
        let outpoint = Outpoint::new([0xab; 32], 3);
        let text = outpoint.to_string();
        assert!(text.ends_with(".3"));
        assert_eq!(text.parse::<Outpoint>().unwrap(), outpoint);
    }

    #[test]
    fn test_outpoint_rejects_garbage() {
        assert!("nodot".parse::<Outpoint>().is_err());
        assert!("abcd.0".parse::<Outpoint>().is_err());
        let txid = hex::encode([1u8; 32]);
        assert!(format!("{txid}.x").parse::<Outpoint>().is_err());
    }

    #[test]
    fn test_invoice_number() {
        let ctx = DerivationContext::owner(ProtocolId::new(SecurityLevel::Silent, "todo list"), "1");
        assert_eq!(ctx.invoice_number(), "0-todo list-1");
        assert_eq!(ctx.counterparty, Counterparty::Myself);
    }

    #[test]
    fn test_sighash_all_byte() {
        assert_eq!(SighashType::all().to_byte(), 0x41);
        assert_eq!(SighashType::from_byte(0x41), Some(SighashType::all()));
    }

    #[test]
    fn test_sighash_requires_forkid() {
        assert_eq!(SighashType::from_byte(0x01), None);
        let single_acp = SighashType::from_byte(0xc3).unwrap();
        assert_eq!(single_acp.scope, SignatureScope::Single);
        assert!(single_acp.anyone_can_pay);
    }

    #[test]
    fn test_public_key_prefix_checked() {
        let mut bytes = [0u8; 33];
        assert!(PublicKey::from_slice(&bytes).is_none());
        bytes[0] = 0x02;
        assert!(PublicKey::from_slice(&bytes).is_some());
        assert!(PublicKey::from_slice(&bytes[..32]).is_none());
    }
}
