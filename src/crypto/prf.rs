//! TLS 1.2 PRF with HMAC-SHA256 (RFC 5246, section 5).
//!
//! `PRF(secret, label, seed) = P_SHA256(secret, label || seed)`

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::Error;

pub const MASTER_SECRET_LEN: usize = 48;
pub const VERIFY_DATA_LEN: usize = 12;

pub const LABEL_MASTER_SECRET: &str = "master secret";
pub const LABEL_KEY_EXPANSION: &str = "key expansion";
pub const LABEL_CLIENT_FINISHED: &str = "client finished";
pub const LABEL_SERVER_FINISHED: &str = "server finished";

type HmacSha256 = Hmac<Sha256>;

fn hmac(secret: &[u8]) -> Result<HmacSha256, Error> {
    HmacSha256::new_from_slice(secret).map_err(|_| Error::CryptoError("Invalid HMAC key".into()))
}

/// Expand `secret` into `output_len` bytes written to `out`.
///
/// The label is prepended to `seed`. `out` is cleared first.
pub fn expand(
    out: &mut Buf,
    output_len: usize,
    secret: &[u8],
    label: &str,
    seed: &[u8],
) -> Result<(), Error> {
    out.clear();
    let label = label.as_bytes();

    // A(1) = HMAC(secret, A(0)) where A(0) = label || seed
    let mut mac = hmac(secret)?;
    mac.update(label);
    mac.update(seed);
    let mut a = mac.finalize().into_bytes();

    while out.len() < output_len {
        // HMAC(secret, A(i) || label || seed)
        let mut mac = hmac(secret)?;
        mac.update(&a);
        mac.update(label);
        mac.update(seed);
        let chunk = mac.finalize().into_bytes();

        let take = (output_len - out.len()).min(chunk.len());
        out.extend_from_slice(&chunk[..take]);

        if out.len() < output_len {
            let mut mac = hmac(secret)?;
            mac.update(&a);
            a = mac.finalize().into_bytes();
        }
    }

    Ok(())
}

/// Master secret from the ECDHE shared secret.
///
/// Seed is `client_random || server_random`.
pub fn master_secret(
    pre_master: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Zeroizing<[u8; MASTER_SECRET_LEN]>, Error> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);

    let mut out = Buf::new();
    expand(
        &mut out,
        MASTER_SECRET_LEN,
        pre_master,
        LABEL_MASTER_SECRET,
        &seed,
    )?;

    let mut master = Zeroizing::new([0u8; MASTER_SECRET_LEN]);
    master.copy_from_slice(&out);
    out.wipe();
    Ok(master)
}

/// Finished verify data over the SHA-256 of the handshake transcript.
pub fn verify_data(
    master: &[u8],
    label: &str,
    transcript: &[u8],
) -> Result<[u8; VERIFY_DATA_LEN], Error> {
    let hash = Sha256::digest(transcript);

    let mut out = Buf::new();
    expand(&mut out, VERIFY_DATA_LEN, master, label, &hash)?;

    let mut verify = [0u8; VERIFY_DATA_LEN];
    verify.copy_from_slice(&out);
    Ok(verify)
}
