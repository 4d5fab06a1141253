//! Script constants and helpers for the standard output types the node
//! understands: P2PKH payments and OP_RETURN data carriers.

use crate::PubKeyHash;

pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;

/// Builds the standard P2PKH locking script for a pubkey hash.
pub fn p2pkh_script(hash: &PubKeyHash) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
    script.extend_from_slice(hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// Extracts the pubkey hash from a P2PKH script, if the script matches the
/// standard 25-byte template.
pub fn script_p2pkh_hash(script: &[u8]) -> Option<PubKeyHash> {
    if script.len() != 25 {
        return None;
    }
    if script[0] != OP_DUP
        || script[1] != OP_HASH160
        || script[2] != 0x14
        || script[23] != OP_EQUALVERIFY
        || script[24] != OP_CHECKSIG
    {
        return None;
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&script[3..23]);
    Some(out)
}

/// Extracts the payment destination of a locking script. Only P2PKH is a
/// valid payout destination.
pub fn extract_destination(script: &[u8]) -> Option<PubKeyHash> {
    script_p2pkh_hash(script)
}

/// Builds an OP_RETURN data-carrier script around the given payload.
pub fn op_return_script(payload: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(payload.len() + 4);
    script.push(OP_RETURN);
    match payload.len() {
        0 => {}
        n if n < OP_PUSHDATA1 as usize => {
            script.push(n as u8);
        }
        n if n <= u8::MAX as usize => {
            script.push(OP_PUSHDATA1);
            script.push(n as u8);
        }
        n if n <= u16::MAX as usize => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(n as u16).to_le_bytes());
        }
        n => {
            script.push(OP_PUSHDATA4);
            script.extend_from_slice(&(n as u32).to_le_bytes());
        }
    }
    script.extend_from_slice(payload);
    script
}

/// Walks an OP_RETURN script and returns the first non-empty push-data
/// payload. Returns `None` for scripts that do not start with OP_RETURN or
/// are malformed.
pub fn op_return_payload(script: &[u8]) -> Option<&[u8]> {
    if script.first() != Some(&OP_RETURN) {
        return None;
    }
    let mut pos = 1;
    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;
        let len = match opcode {
            0x00 => 0,
            n if n < OP_PUSHDATA1 => n as usize,
            OP_PUSHDATA1 => {
                let n = *script.get(pos)? as usize;
                pos += 1;
                n
            }
            OP_PUSHDATA2 => {
                let bytes = script.get(pos..pos + 2)?;
                pos += 2;
                u16::from_le_bytes([bytes[0], bytes[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let bytes = script.get(pos..pos + 4)?;
                pos += 4;
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
            }
            // Non-push opcodes carry no payload, keep walking.
            _ => continue,
        };
        let data = script.get(pos..pos + len)?;
        pos += len;
        if !data.is_empty() {
            return Some(data);
        }
    }
    None
}
