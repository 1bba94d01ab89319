//! # Transactions
//!
//! Minimal ledger transaction model with the legacy wire serialisation used
//! to compute transaction ids.

use serde::{Deserialize, Serialize};

use super::errors::Hash;
use super::script::{LockingScript, UnlockingScript};
use super::value_objects::Outpoint;

/// Sequence number marking an input as final.
pub const FINAL_SEQUENCE: u32 = 0xffff_ffff;

/// Spending reference to a previous output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Output being spent.
    pub source: Outpoint,
    /// Proof satisfying the source's locking script.
    pub unlocking_script: UnlockingScript,
    /// Input sequence number.
    pub sequence: u32,
    /// Value of the spent output, needed for the signature digest.
    pub source_satoshis: Option<u64>,
    /// Locking script of the spent output, needed for the signature digest.
    pub source_locking_script: Option<LockingScript>,
}

impl TxInput {
    /// Input spending `source` with an empty unlocking script.
    pub fn new(source: Outpoint) -> Self {
        Self {
            source,
            unlocking_script: UnlockingScript::default(),
            sequence: FINAL_SEQUENCE,
            source_satoshis: None,
            source_locking_script: None,
        }
    }

    /// Attach the spent output's value and script.
    pub fn with_source_output(mut self, satoshis: u64, locking_script: LockingScript) -> Self {
        self.source_satoshis = Some(satoshis);
        self.source_locking_script = Some(locking_script);
        self
    }
}

/// New output created by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Attached value.
    pub satoshis: u64,
    /// Spending condition.
    pub locking_script: LockingScript,
}

impl TxOutput {
    /// Create a new output.
    pub fn new(satoshis: u64, locking_script: LockingScript) -> Self {
        Self {
            satoshis,
            locking_script,
        }
    }

    /// Wire serialisation of the output.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.satoshis.to_le_bytes());
        write_varint(out, self.locking_script.len() as u64);
        out.extend_from_slice(self.locking_script.as_bytes());
    }
}

/// Ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction format version.
    pub version: u32,
    /// Spent outputs.
    pub inputs: Vec<TxInput>,
    /// Created outputs.
    pub outputs: Vec<TxOutput>,
    /// Lock time.
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }
}

impl Transaction {
    /// Wire serialisation (source metadata is not serialised).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.inputs.len() * 148 + self.outputs.len() * 44);
        out.extend_from_slice(&self.version.to_le_bytes());

        write_varint(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(&input.source.txid);
            out.extend_from_slice(&input.source.vout.to_le_bytes());
            write_varint(&mut out, input.unlocking_script.len() as u64);
            out.extend_from_slice(input.unlocking_script.as_bytes());
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_varint(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.serialize_into(&mut out);
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Transaction id: double SHA-256 of the serialisation.
    pub fn txid(&self) -> Hash {
        shared_crypto::sha256d(&self.serialize())
    }

    /// Position of the input spending `source`.
    pub fn input_index_of(&self, source: &Outpoint) -> Option<usize> {
        self.inputs.iter().position(|input| &input.source == source)
    }

    /// Outpoint of output `vout` of this transaction.
    pub fn outpoint(&self, vout: u32) -> Outpoint {
        Outpoint::new(self.txid(), vout)
    }

    /// Sum of all output values.
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis).sum()
    }
}

/// Append a compact-size integer.
pub fn write_varint(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}
