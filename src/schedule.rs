//! # Schedule — Dividing Threads Between Masters and Inner Workers
//!
//! The split stage can parallelize two ways at once: across primes (several
//! masters, each computing its own images) and within one image (a master
//! lending its spare threads to the modular GCD kernel). Given `n` images
//! to compute and `m` threads to spend, this module picks `l` masters and
//! fractions aᵢ/bᵢ with Σaᵢ = n and Σbᵢ = m: master i computes aᵢ images
//! with bᵢ − 1 inner workers.
//!
//! The procedure starts from gcd(n, m) copies of n/m and repeatedly
//! replaces a fraction by its Stern–Brocot (Farey) neighbors while the
//! right neighbor stays under 1.1·n/m, so no master is ever loaded much
//! beyond the average. Example for n = 10, m = 16:
//!
//! ```text
//! 5/8, 5/8  →  2/3, 5/8, 3/5  →  2/3, 2/3, 3/5, 3/5  →  …  →
//! 2/3, 2/3, 2/3, 2/3, 1/2, 1/2
//! ```

use crate::arith::{gcd_u64, inv_mod};

/// Farey neighbors of `p/q` in lowest terms with `q >= 2`: the unique
/// adjacent fractions `l/lq < p/q < r/rq` with `p·lq − l·q = 1` and
/// `r·q − p·rq = 1`. The input is their mediant: `p = l + r`, `q = lq + rq`.
pub fn farey_neighbors(p: u64, q: u64) -> Option<((u64, u64), (u64, u64))> {
    if q < 2 || gcd_u64(p, q) != 1 {
        return None;
    }
    let s0 = inv_mod(p % q, q)?;
    let rq = q - s0;
    let r = (1 + p * rq) / q;
    let lq = q - rq;
    let l = p - r;
    debug_assert_eq!(r * q - p * rq, 1);
    debug_assert_eq!(p * lq - l * q, 1);
    Some(((l, lq), (r, rq)))
}

/// Split `n` required images over `m` available threads. Returns the list
/// of (images, threads) per master: every entry has at least one image and
/// one thread, entries sum to exactly (n, m), and no fraction exceeds
/// 1.1·n/m.
pub fn divide_master_threads(n: u64, m: u64) -> Vec<(u64, u64)> {
    debug_assert!(n > 0 && m > 0);
    let threshold = 1.1 * n as f64 / m as f64;

    let g = gcd_u64(n, m);
    let mut v = vec![(n / g, m / g); g as usize];

    let mut i = 0;
    while i < v.len() {
        let (p, q) = v[i];
        // Splitting 1/q would strand a zero-image master; leave it whole.
        if q >= 2 && p >= 2 {
            if let Some(((l, lq), (r, rq))) = farey_neighbors(p, q) {
                if (r as f64) / (rq as f64) < threshold {
                    v[i] = (r, rq);
                    v.push((l, lq));
                    continue;
                }
            }
        }
        i += 1;
    }
    v
}
