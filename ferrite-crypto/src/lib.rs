pub mod hash;
pub mod signature;

pub use hash::{hash256, pubkey_hash, tagged_hash256};
pub use signature::{public_key, recover_compact, sign_compact, CryptoError, COMPACT_SIGNATURE_SIZE};

// Key types are re-exported so downstream crates don't depend on the
// backing curve library directly.
pub use secp256k1::{PublicKey, SecretKey};
