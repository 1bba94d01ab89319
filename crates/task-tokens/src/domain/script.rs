//! # Scripts
//!
//! Byte-level script representation: opcodes, minimal data pushes and a
//! chunk parser. Templates that give scripts meaning live in `algorithms`.

use serde::{Deserialize, Serialize};

use super::errors::TaskTokenError;

/// Push an empty byte vector.
pub const OP_0: u8 = 0x00;
/// Next byte holds the push length.
pub const OP_PUSHDATA1: u8 = 0x4c;
/// Next two bytes (LE) hold the push length.
pub const OP_PUSHDATA2: u8 = 0x4d;
/// Next four bytes (LE) hold the push length.
pub const OP_PUSHDATA4: u8 = 0x4e;
/// Push -1.
pub const OP_1NEGATE: u8 = 0x4f;
/// Push 1.
pub const OP_1: u8 = 0x51;
/// Push 16.
pub const OP_16: u8 = 0x60;
/// Drop the top two stack items.
pub const OP_2DROP: u8 = 0x6d;
/// Drop the top stack item.
pub const OP_DROP: u8 = 0x75;
/// Check a signature against a public key.
pub const OP_CHECKSIG: u8 = 0xac;

/// Largest length encodable in the opcode byte itself.
const MAX_DIRECT_PUSH: usize = 0x4b;

/// One parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptChunk {
    /// Data push (including `OP_0` as an empty push).
    Push(Vec<u8>),
    /// Any non-push opcode.
    Op(u8),
}

impl ScriptChunk {
    /// Data carried by the chunk, decoding small-number opcodes.
    pub fn data(&self) -> Option<Vec<u8>> {
        match self {
            Self::Push(data) => Some(data.clone()),
            Self::Op(OP_1NEGATE) => Some(vec![0x81]),
            Self::Op(op) if (OP_1..=OP_16).contains(op) => Some(vec![op - OP_1 + 1]),
            Self::Op(_) => None,
        }
    }
}

/// Append a minimal data push to `out`.
pub fn write_push(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len == 0 {
        out.push(OP_0);
        return;
    }
    if len <= MAX_DIRECT_PUSH {
        out.push(len as u8);
    } else if len <= u8::MAX as usize {
        out.push(OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
}

/// Parse script bytes into chunks.
pub fn parse_chunks(bytes: &[u8]) -> Result<Vec<ScriptChunk>, TaskTokenError> {
    let mut chunks = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let op = bytes[pos];
        pos += 1;

        let len = match op {
            OP_0 => {
                chunks.push(ScriptChunk::Push(Vec::new()));
                continue;
            }
            1..=0x4b => op as usize,
            OP_PUSHDATA1 => read_len(bytes, &mut pos, 1)?,
            OP_PUSHDATA2 => read_len(bytes, &mut pos, 2)?,
            OP_PUSHDATA4 => read_len(bytes, &mut pos, 4)?,
            _ => {
                chunks.push(ScriptChunk::Op(op));
                continue;
            }
        };

        let end = pos
            .checked_add(len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| {
                TaskTokenError::MalformedScript(format!("push of {len} bytes overruns script"))
            })?;
        chunks.push(ScriptChunk::Push(bytes[pos..end].to_vec()));
        pos = end;
    }

    Ok(chunks)
}

fn read_len(bytes: &[u8], pos: &mut usize, width: usize) -> Result<usize, TaskTokenError> {
    let end = *pos + width;
    if end > bytes.len() {
        return Err(TaskTokenError::MalformedScript(
            "truncated push length".to_string(),
        ));
    }
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(&bytes[*pos..end]);
    *pos = end;
    Ok(u32::from_le_bytes(buf) as usize)
}

macro_rules! script_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wrap raw script bytes.
            pub fn from_bytes(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            /// Parse from hex.
            pub fn from_hex(text: &str) -> Result<Self, TaskTokenError> {
                hex::decode(text)
                    .map(Self)
                    .map_err(|e| TaskTokenError::MalformedScript(e.to_string()))
            }

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Hex encoding.
            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }

            /// Script length in bytes.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True for the empty script.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Parse into chunks.
            pub fn chunks(&self) -> Result<Vec<ScriptChunk>, TaskTokenError> {
                parse_chunks(&self.0)
            }
        }
    };
}

script_newtype!(
    /// Spending condition attached to an output.
    LockingScript
);

script_newtype!(
    /// Proof satisfying a locking script.
    UnlockingScript
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_lengths() {
        let mut out = Vec::new();
        write_push(&mut out, &[7u8; 75]);
        assert_eq!(out[0], 75);

        let mut out = Vec::new();
        write_push(&mut out, &[7u8; 76]);
        assert_eq!(&out[..2], &[OP_PUSHDATA1, 76]);

        let mut out = Vec::new();
        write_push(&mut out, &[7u8; 300]);
        assert_eq!(&out[..3], &[OP_PUSHDATA2, 0x2c, 0x01]);
    }

    #[test]
    fn test_parse_mixed_script() {
        let mut bytes = Vec::new();
        write_push(&mut bytes, b"hello");
        bytes.push(OP_CHECKSIG);
        write_push(&mut bytes, &[]);
        write_push(&mut bytes, &[9u8; 300]);
        bytes.push(OP_2DROP);

        let chunks = parse_chunks(&bytes).unwrap();
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0], ScriptChunk::Push(b"hello".to_vec()));
        assert_eq!(chunks[1], ScriptChunk::Op(OP_CHECKSIG));
        assert_eq!(chunks[2], ScriptChunk::Push(vec![]));
        assert_eq!(chunks[3].data().map(|d| d.len()), Some(300));
        assert_eq!(chunks[4], ScriptChunk::Op(OP_2DROP));
    }

    #[test]
    fn test_truncated_push_rejected() {
        let result = parse_chunks(&[0x05, 0x01, 0x02]);
        assert!(matches!(result, Err(TaskTokenError::MalformedScript(_))));

        let result = parse_chunks(&[OP_PUSHDATA2, 0x01]);
        assert!(matches!(result, Err(TaskTokenError::MalformedScript(_))));
    }

    #[test]
    fn test_small_number_opcodes_as_data() {
        assert_eq!(ScriptChunk::Op(OP_1).data(), Some(vec![1]));
        assert_eq!(ScriptChunk::Op(OP_16).data(), Some(vec![16]));
        assert_eq!(ScriptChunk::Op(OP_CHECKSIG).data(), None);
    }

    #[test]
    fn test_hex_roundtrip() {
        let script = LockingScript::from_bytes(vec![0x51, OP_CHECKSIG]);
        assert_eq!(script.to_hex(), "51ac");
        assert_eq!(LockingScript::from_hex("51ac").unwrap(), script);
        assert!(LockingScript::from_hex("zz").is_err());
    }
}
