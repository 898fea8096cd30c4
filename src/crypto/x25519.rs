//! X25519 key agreement over the field kernel.
//!
//! Peer public values are not checked against small-order points. A peer
//! sending one yields an all-zero shared secret, which is passed on unchanged.

use zeroize::Zeroizing;

use super::field::FieldElement;
use crate::rng::SeededRng;

/// Length of scalars, public values and shared secrets.
pub const KEY_LEN: usize = 32;

/// The curve base point, u = 9.
pub const BASE_POINT: [u8; KEY_LEN] = {
    let mut b = [0u8; KEY_LEN];
    b[0] = 9;
    b
};

/// Clear the low three bits, clear bit 255 and set bit 254.
fn clamp(scalar: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let mut k = *scalar;
    k[0] &= 248;
    k[31] &= 127;
    k[31] |= 64;
    k
}

/// Montgomery-ladder scalar multiplication of the u-coordinate `u`.
pub fn scalar_mult(scalar: &[u8; KEY_LEN], u: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let k = Zeroizing::new(clamp(scalar));
    let x1 = FieldElement::from_bytes(u);

    let mut x2 = FieldElement::ONE;
    let mut z2 = FieldElement::ZERO;
    let mut x3 = x1;
    let mut z3 = FieldElement::ONE;
    let mut swap = 0u8;

    for t in (0..255).rev() {
        let bit = (k[t / 8] >> (t % 8)) & 1;
        swap ^= bit;
        FieldElement::cswap(&mut x2, &mut x3, swap);
        FieldElement::cswap(&mut z2, &mut z3, swap);
        swap = bit;

        let a = x2.add(&z2);
        let aa = a.square();
        let b = x2.sub(&z2);
        let bb = b.square();
        let e = aa.sub(&bb);
        let c = x3.add(&z3);
        let d = x3.sub(&z3);
        let da = d.mul(&a);
        let cb = c.mul(&b);

        x3 = da.add(&cb).square();
        z3 = x1.mul(&da.sub(&cb).square());
        x2 = aa.mul(&bb);
        z2 = e.mul(&bb.add(&e.mul121666()));
    }

    FieldElement::cswap(&mut x2, &mut x3, swap);
    FieldElement::cswap(&mut z2, &mut z3, swap);

    x2.mul(&z2.invert()).to_bytes()
}

/// Public value for a private scalar.
pub fn derive_public(private: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    scalar_mult(private, &BASE_POINT)
}

/// Shared secret between our private scalar and the peer's public value.
pub fn shared_secret(private: &[u8; KEY_LEN], peer: &[u8; KEY_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    Zeroizing::new(scalar_mult(private, peer))
}

/// Ephemeral key pair for one handshake.
pub struct KeyPair {
    private: Zeroizing<[u8; KEY_LEN]>,
    public: [u8; KEY_LEN],
}

impl KeyPair {
    pub fn generate(rng: &mut SeededRng) -> Self {
        let mut private = Zeroizing::new([0u8; KEY_LEN]);
        rng.fill(&mut private[..]);
        Self::from_private(*private)
    }

    pub fn from_private(private: [u8; KEY_LEN]) -> Self {
        let public = derive_public(&private);
        KeyPair {
            private: Zeroizing::new(private),
            public,
        }
    }

    pub fn public(&self) -> &[u8; KEY_LEN] {
        &self.public
    }

    /// Parse a peer public value from the wire and agree on a shared secret.
    pub fn agree(&self, peer: &[u8]) -> Option<Zeroizing<[u8; KEY_LEN]>> {
        let peer: &[u8; KEY_LEN] = peer.try_into().ok()?;
        Some(shared_secret(&self.private, peer))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
