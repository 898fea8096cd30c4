//! Cryptographic primitives for the single supported handshake profile.
//!
//! Key agreement and the AEAD are built here on top of raw field arithmetic
//! and the AES block cipher. Hashing, HMAC and RSA come from RustCrypto.

mod certificate;
mod field;
pub mod gcm;
pub mod prf;
mod protection;
pub mod x25519;

pub use certificate::ServerPublicKey;
pub use gcm::AesGcm;
pub use protection::{AeadRecordProtection, NullProtection, RecordProtection, Side};
pub use x25519::KeyPair;
