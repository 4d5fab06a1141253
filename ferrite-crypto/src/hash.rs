//! Hashing for Ferrite Coin.

use ferrite_shared_types::{Hash, PubKeyHash};

/// Domain string for pubkey hashing.
const PUBKEY_HASH_DOMAIN: &str = "ferrite pubkey hash v1";

/// Computes the BLAKE3 hash of the input.
pub fn hash256(data: &[u8]) -> Hash {
    blake3::hash(data).into()
}

/// Computes a domain-separated 256-bit digest. Distinct domain strings yield
/// independent hash functions over the same input bytes.
pub fn tagged_hash256(domain: &str, data: &[u8]) -> Hash {
    blake3::Hasher::new_derive_key(domain)
        .update(data)
        .finalize()
        .into()
}

/// Returns the 160-bit hash identifying a public key. This is the value a
/// P2PKH locking script commits to.
pub fn pubkey_hash(pubkey: &[u8]) -> PubKeyHash {
    let digest = tagged_hash256(PUBKEY_HASH_DOMAIN, pubkey);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    out
}
