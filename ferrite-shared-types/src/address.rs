//! Address encoding for payment destinations.
//!
//! Addresses are the hex encoding of the 20-byte pubkey hash that locks a
//! P2PKH output.

use crate::script::p2pkh_script;
use crate::PubKeyHash;

/// Converts a payment destination to its address string.
pub fn encode_destination(dest: &PubKeyHash) -> String {
    hex::encode(dest)
}

/// Decodes an address string back into a payment destination. Returns `None`
/// if the string is not a 40-character hex pubkey hash.
pub fn decode_destination(address: &str) -> Option<PubKeyHash> {
    if address.len() != 40 {
        return None;
    }
    let bytes = hex::decode(address).ok()?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Some(out)
}

/// Builds the locking script paying the given destination.
pub fn script_for_destination(dest: &PubKeyHash) -> Vec<u8> {
    p2pkh_script(dest)
}
