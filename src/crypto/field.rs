//! Arithmetic in GF(2^255 - 19).
//!
//! An element is ten signed limbs in radix 2^25.5: limb `i` holds 26 bits when
//! `i` is even and 25 bits when odd, at bit position `ceil(25.5 * i)`. Limbs are
//! kept "carried" between operations: limbs 1..9 in `[0, 2^width)` and limb 0 at
//! most 19 above its width. That bound keeps every product sum in `mul` below
//! 2^61, so no intermediate overflows an `i64`.

const LIMBS: usize = 10;

/// Bit width of each limb.
const WIDTH: [u32; LIMBS] = [26, 25, 26, 25, 26, 25, 26, 25, 26, 25];

/// 2p in limb form, added in `sub` to keep every limb non-negative.
const TWO_P: [i64; LIMBS] = [
    0x7ff_ffda, 0x3ff_fffe, 0x7ff_fffe, 0x3ff_fffe, 0x7ff_fffe, 0x3ff_fffe, 0x7ff_fffe,
    0x3ff_fffe, 0x7ff_fffe, 0x3ff_fffe,
];

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FieldElement([i64; LIMBS]);

impl FieldElement {
    pub const ZERO: FieldElement = FieldElement([0; LIMBS]);
    pub const ONE: FieldElement = FieldElement([1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

    /// Unpack 32 little-endian bytes. Bit 255 is ignored.
    pub fn from_bytes(s: &[u8; 32]) -> Self {
        let mut h = [0i64; LIMBS];
        let mut pos = 0usize;
        for (i, limb) in h.iter_mut().enumerate() {
            *limb = load_bits(s, pos, WIDTH[i]);
            pos += WIDTH[i] as usize;
        }
        FieldElement(h)
    }

    /// Pack into 32 little-endian bytes, fully reduced mod p.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut h = carry(self.0);

        // q = 1 iff the value is >= p, found by propagating the carry of (h + 19).
        let mut q = (h[0] + 19) >> WIDTH[0];
        for i in 1..LIMBS {
            q = (h[i] + q) >> WIDTH[i];
        }

        h[0] += 19 * q;
        for i in 0..LIMBS - 1 {
            let c = h[i] >> WIDTH[i];
            h[i] -= c << WIDTH[i];
            h[i + 1] += c;
        }
        // Drop 2^255, which is what subtracting p leaves behind.
        h[9] &= (1 << WIDTH[9]) - 1;

        let mut out = [0u8; 32];
        let mut acc: u64 = 0;
        let mut acc_bits = 0u32;
        let mut idx = 0;
        for i in 0..LIMBS {
            acc |= (h[i] as u64) << acc_bits;
            acc_bits += WIDTH[i];
            while acc_bits >= 8 {
                out[idx] = acc as u8;
                idx += 1;
                acc >>= 8;
                acc_bits -= 8;
            }
        }
        if acc_bits > 0 {
            out[idx] = acc as u8;
        }
        out
    }

    pub fn add(&self, other: &FieldElement) -> FieldElement {
        let mut h = [0i64; LIMBS];
        for (i, limb) in h.iter_mut().enumerate() {
            *limb = self.0[i] + other.0[i];
        }
        FieldElement(carry(h))
    }

    pub fn sub(&self, other: &FieldElement) -> FieldElement {
        let mut h = [0i64; LIMBS];
        for (i, limb) in h.iter_mut().enumerate() {
            *limb = self.0[i] + TWO_P[i] - other.0[i];
        }
        FieldElement(carry(h))
    }

    pub fn mul(&self, other: &FieldElement) -> FieldElement {
        let f = &self.0;
        let g = &other.0;
        let mut h = [0i64; LIMBS];

        for i in 0..LIMBS {
            for j in 0..LIMBS {
                let mut p = f[i] * g[j];
                // Two odd positions sum to one bit past the target limb position.
                if i & 1 == 1 && j & 1 == 1 {
                    p *= 2;
                }
                // 2^255 = 19 (mod p)
                if i + j >= LIMBS {
                    h[i + j - LIMBS] += 19 * p;
                } else {
                    h[i + j] += p;
                }
            }
        }

        FieldElement(carry(h))
    }

    pub fn square(&self) -> FieldElement {
        self.mul(self)
    }

    /// Square `n` times.
    fn pow2k(&self, n: usize) -> FieldElement {
        let mut t = *self;
        for _ in 0..n {
            t = t.square();
        }
        t
    }

    /// Multiply by the curve constant (A + 2) / 4 + 1 = 121666.
    pub fn mul121666(&self) -> FieldElement {
        let mut h = [0i64; LIMBS];
        for (i, limb) in h.iter_mut().enumerate() {
            *limb = self.0[i] * 121666;
        }
        FieldElement(carry(h))
    }

    /// `self^(p - 2)`, the multiplicative inverse. Zero maps to zero.
    pub fn invert(&self) -> FieldElement {
        let z = self;
        let z2 = z.square();
        let z8 = z2.pow2k(2);
        let z9 = z8.mul(z);
        let z11 = z9.mul(&z2);
        let z22 = z11.square();
        let z_5_0 = z22.mul(&z9);
        let z_10_0 = z_5_0.pow2k(5).mul(&z_5_0);
        let z_20_0 = z_10_0.pow2k(10).mul(&z_10_0);
        let z_40_0 = z_20_0.pow2k(20).mul(&z_20_0);
        let z_50_0 = z_40_0.pow2k(10).mul(&z_10_0);
        let z_100_0 = z_50_0.pow2k(50).mul(&z_50_0);
        let z_200_0 = z_100_0.pow2k(100).mul(&z_100_0);
        let z_250_0 = z_200_0.pow2k(50).mul(&z_50_0);
        z_250_0.pow2k(5).mul(&z11)
    }

    /// Swap `a` and `b` when `bit == 1`, without branching on `bit`.
    pub fn cswap(a: &mut FieldElement, b: &mut FieldElement, bit: u8) {
        let mask = -((bit & 1) as i64);
        for i in 0..LIMBS {
            let x = mask & (a.0[i] ^ b.0[i]);
            a.0[i] ^= x;
            b.0[i] ^= x;
        }
    }
}

impl std::fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldElement(..)")
    }
}

/// Read `width` bits starting at bit `start` of a little-endian byte string.
fn load_bits(s: &[u8; 32], start: usize, width: u32) -> i64 {
    let first = start / 8;
    let shift = start % 8;
    let mut v: u64 = 0;
    for k in 0..5 {
        if let Some(b) = s.get(first + k) {
            v |= (*b as u64) << (8 * k);
        }
    }
    ((v >> shift) & ((1u64 << width) - 1)) as i64
}

/// Two floor-carry passes, folding the top carry back into limb 0 times 19.
fn carry(mut h: [i64; LIMBS]) -> [i64; LIMBS] {
    for _ in 0..2 {
        for i in 0..LIMBS {
            let c = h[i] >> WIDTH[i];
            h[i] -= c << WIDTH[i];
            if i == LIMBS - 1 {
                h[0] += 19 * c;
            } else {
                h[i + 1] += c;
            }
        }
    }
    h
}
