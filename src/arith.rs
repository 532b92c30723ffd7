//! # Arith — Word-Prime and Big-Integer Scalar Utilities
//!
//! The scalar kit shared by every stage of the GCD engine:
//!
//! 1. **Word arithmetic mod p** (`mul_mod`, `pow_mod`, `inv_mod`) using u128
//!    intermediates, valid for any modulus below 2^64.
//! 2. **Prime cursor** (`next_prime`) over word-sized integers with an upper
//!    sentinel: the split engine walks primes upward from just below 2^62.
//! 3. **Balanced residues** (`mods`): the unique representative in
//!    (−m/2, m/2], the normal form every CRT merge reduces to.
//! 4. **Ceiling logarithm** (`clog`): how many prime-sized factors a modulus
//!    needs before it covers a coefficient bound.

use rug::Integer;

/// First candidate handed to the prime cursor: just below 2^62, leaving two
/// spare bits so products of a residue and a coefficient stay in range.
pub const PRIME_START: u64 = 1 << 62;

/// a·b mod m without overflow, for any m < 2^64.
#[inline]
pub fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    (a as u128 * b as u128 % m as u128) as u64
}

/// a + b mod m for reduced operands, without u64 overflow even when m is
/// in the top half of the word range.
#[inline]
pub fn add_mod(a: u64, b: u64, m: u64) -> u64 {
    debug_assert!(a < m && b < m);
    let gap = m - b;
    if a >= gap {
        a - gap
    } else {
        a + b
    }
}

/// a − b mod m for reduced operands, without u64 overflow.
#[inline]
pub fn sub_mod(a: u64, b: u64, m: u64) -> u64 {
    debug_assert!(a < m && b < m);
    if a >= b {
        a - b
    } else {
        a + (m - b)
    }
}

/// Modular exponentiation: base^exp mod m via binary exponentiation.
pub fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    if m == 1 {
        return 0;
    }
    let mut result = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        exp >>= 1;
        base = mul_mod(base, base, m);
    }
    result
}

/// Modular inverse via the extended Euclidean algorithm.
/// Returns `None` when `gcd(a, m) != 1`.
pub fn inv_mod(a: u64, m: u64) -> Option<u64> {
    let a = a % m;
    if a == 0 {
        return None;
    }
    let (mut old_r, mut r) = (a as i128, m as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    if old_r != 1 {
        return None;
    }
    let mut inv = old_s % m as i128;
    if inv < 0 {
        inv += m as i128;
    }
    Some(inv as u64)
}

/// Greatest common divisor of two words.
pub fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Smallest prime strictly greater than `n`, or `None` once the word range
/// is exhausted. The result is checked before anything is published, so a
/// caller never observes a cursor past the last word prime.
pub fn next_prime(n: u64) -> Option<u64> {
    let p = Integer::from(n).next_prime();
    p.to_u64()
}

/// x mod p in [0, p) for a signed big integer and a word modulus.
pub fn rem_u64(x: &Integer, p: u64) -> u64 {
    let m = Integer::from(p);
    let mut r = Integer::from(x % &m);
    if r.is_negative() {
        r += &m;
    }
    r.to_u64().expect("residue fits the word modulus")
}

/// Balanced residue: the unique representative of `x` mod `m` in
/// (−m/2, m/2]. `m` must be positive.
pub fn mods(x: &Integer, m: &Integer) -> Integer {
    debug_assert!(m.cmp0() == std::cmp::Ordering::Greater);
    let mut r = Integer::from(x % m);
    if r.is_negative() {
        r += m;
    }
    // r in [0, m); pull the upper open half down.
    if Integer::from(&r * 2u32) > *m {
        r -= m;
    }
    r
}

/// Ceiling logarithm: the smallest `n >= 0` with `b^n >= x`, for `x >= 1`
/// and `b >= 2`. Word-prime bases keep `n` tiny (it is an image count), so
/// the repeated-multiplication loop is exact and cheap.
pub fn clog(x: &Integer, b: u64) -> usize {
    debug_assert!(b >= 2);
    debug_assert!(x.cmp0() == std::cmp::Ordering::Greater);
    let mut acc = Integer::from(1u32);
    let mut n = 0usize;
    while acc < *x {
        acc *= b;
        n += 1;
    }
    n
}
