//! Compact recoverable ECDSA signatures.
//!
//! Signatures are 65 bytes: a header byte `27 + recovery_id + 4` (the +4
//! marks a compressed pubkey, which is the only form the chain produces)
//! followed by the 64-byte compact signature. The signer's public key is
//! recovered from the signature, so signed payloads never carry a pubkey.

use ferrite_shared_types::Hash;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

pub const COMPACT_SIGNATURE_SIZE: usize = 65;

const COMPACT_HEADER_BASE: u8 = 27;
const COMPACT_HEADER_COMPRESSED: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("compact signature must be {COMPACT_SIGNATURE_SIZE} bytes, got {0}")]
    InvalidSignatureLength(usize),
    #[error("invalid compact signature header byte {0}")]
    InvalidHeader(u8),
    #[error("signature recovery failed: {0}")]
    Recovery(String),
}

/// Derives the public key for a secret key.
pub fn public_key(secret: &SecretKey) -> PublicKey {
    PublicKey::from_secret_key(&Secp256k1::new(), secret)
}

/// Signs a 32-byte digest, producing a 65-byte compact recoverable signature.
pub fn sign_compact(secret: &SecretKey, digest: &Hash) -> [u8; COMPACT_SIGNATURE_SIZE] {
    let secp = Secp256k1::new();
    let message = Message::from_digest(*digest);
    let signature = secp.sign_ecdsa_recoverable(&message, secret);
    let (rec_id, bytes) = signature.serialize_compact();
    let mut out = [0u8; COMPACT_SIGNATURE_SIZE];
    out[0] = COMPACT_HEADER_BASE + rec_id.to_i32() as u8 + COMPACT_HEADER_COMPRESSED;
    out[1..].copy_from_slice(&bytes);
    out
}

/// Recovers the public key that produced a compact signature over the digest.
pub fn recover_compact(digest: &Hash, signature: &[u8]) -> Result<PublicKey, CryptoError> {
    if signature.len() != COMPACT_SIGNATURE_SIZE {
        return Err(CryptoError::InvalidSignatureLength(signature.len()));
    }
    let header = signature[0];
    if !(COMPACT_HEADER_BASE..COMPACT_HEADER_BASE + 8).contains(&header) {
        return Err(CryptoError::InvalidHeader(header));
    }
    let rec_id = RecoveryId::from_i32(((header - COMPACT_HEADER_BASE) & 3) as i32)
        .map_err(|e| CryptoError::Recovery(e.to_string()))?;
    let recoverable = RecoverableSignature::from_compact(&signature[1..], rec_id)
        .map_err(|e| CryptoError::Recovery(e.to_string()))?;
    let secp = Secp256k1::new();
    let message = Message::from_digest(*digest);
    secp.recover_ecdsa(&message, &recoverable)
        .map_err(|e| CryptoError::Recovery(e.to_string()))
}
