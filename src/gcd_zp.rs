//! # Gcd_zp — Single-Prime Multivariate GCD
//!
//! The per-image kernel the split engine calls once per prime: given the
//! reductions of A and B mod p, produce the modular GCD with its leading
//! scalar coefficient normalized to 1 together with both exact cofactors.
//!
//! Internally the sparse images are laid out densely and recursively — a
//! polynomial in k variables is a coefficient vector in its top variable
//! whose entries are polynomials in k−1 variables — and the GCD is computed
//! by content/primitive-part recursion with pseudo-remainder sequences.
//! Every step is exact arithmetic in GF(p)[x₁,…,x_k], so the computation is
//! deterministic at a prime; unlucky primes are recognized one level up by
//! the split engine, from the degree of the image this module returns.

use std::sync::{Arc, Mutex};

use crate::arith::{inv_mod, mul_mod};
use crate::modp::{PolyUZp, PolyZp};
use crate::pool::{Handle, ThreadPool};

/// Dense recursive polynomial over GF(p). A value at "level" k is a
/// polynomial in k variables: `Scalar` at level 0, otherwise a dense
/// coefficient vector in the level's top variable with entries one level
/// down. The zero polynomial is `Scalar(0)` or an empty vector; nonzero
/// vectors carry no trailing zero entry.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Rec {
    Scalar(u64),
    Coeffs(Vec<Rec>),
}

fn zero(lev: usize) -> Rec {
    if lev == 0 {
        Rec::Scalar(0)
    } else {
        Rec::Coeffs(Vec::new())
    }
}

fn is_zero(a: &Rec) -> bool {
    match a {
        Rec::Scalar(c) => *c == 0,
        Rec::Coeffs(v) => v.is_empty(),
    }
}

fn is_one(a: &Rec) -> bool {
    match a {
        Rec::Scalar(c) => *c == 1,
        Rec::Coeffs(v) => v.len() == 1 && is_one(&v[0]),
    }
}

/// Degree in the level's top variable; −1 for zero.
fn deg(a: &Rec) -> isize {
    match a {
        Rec::Scalar(c) => {
            if *c == 0 {
                -1
            } else {
                0
            }
        }
        Rec::Coeffs(v) => v.len() as isize - 1,
    }
}

fn trim(v: &mut Vec<Rec>) {
    while v.last().map(is_zero).unwrap_or(false) {
        v.pop();
    }
}

/// The single leading scalar in the full lexicographic order.
fn lead_scalar(a: &Rec) -> u64 {
    match a {
        Rec::Scalar(c) => *c,
        Rec::Coeffs(v) => lead_scalar(v.last().expect("nonzero")),
    }
}

fn add(a: &Rec, b: &Rec, lev: usize, p: u64) -> Rec {
    if lev == 0 {
        let (Rec::Scalar(x), Rec::Scalar(y)) = (a, b) else {
            unreachable!("level 0 holds scalars")
        };
        return Rec::Scalar(crate::arith::add_mod(*x, *y, p));
    }
    let (Rec::Coeffs(av), Rec::Coeffs(bv)) = (a, b) else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let n = av.len().max(bv.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let z = zero(lev - 1);
        let x = av.get(i).unwrap_or(&z);
        let y = bv.get(i).unwrap_or(&z);
        out.push(add(x, y, lev - 1, p));
    }
    trim(&mut out);
    Rec::Coeffs(out)
}

fn sub(a: &Rec, b: &Rec, lev: usize, p: u64) -> Rec {
    if lev == 0 {
        let (Rec::Scalar(x), Rec::Scalar(y)) = (a, b) else {
            unreachable!("level 0 holds scalars")
        };
        return Rec::Scalar(crate::arith::sub_mod(*x, *y, p));
    }
    let (Rec::Coeffs(av), Rec::Coeffs(bv)) = (a, b) else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let n = av.len().max(bv.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let z = zero(lev - 1);
        let x = av.get(i).unwrap_or(&z);
        let y = bv.get(i).unwrap_or(&z);
        out.push(sub(x, y, lev - 1, p));
    }
    trim(&mut out);
    Rec::Coeffs(out)
}

fn mul(a: &Rec, b: &Rec, lev: usize, p: u64) -> Rec {
    if lev == 0 {
        let (Rec::Scalar(x), Rec::Scalar(y)) = (a, b) else {
            unreachable!("level 0 holds scalars")
        };
        return Rec::Scalar(mul_mod(*x, *y, p));
    }
    if is_zero(a) || is_zero(b) {
        return zero(lev);
    }
    let (Rec::Coeffs(av), Rec::Coeffs(bv)) = (a, b) else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let mut out = vec![zero(lev - 1); av.len() + bv.len() - 1];
    for (i, x) in av.iter().enumerate() {
        if is_zero(x) {
            continue;
        }
        for (j, y) in bv.iter().enumerate() {
            let t = mul(x, y, lev - 1, p);
            out[i + j] = add(&out[i + j], &t, lev - 1, p);
        }
    }
    trim(&mut out);
    Rec::Coeffs(out)
}

/// Multiply every top-variable coefficient by `c` (one level down).
fn mul_coeffs(a: &Rec, c: &Rec, lev: usize, p: u64) -> Rec {
    debug_assert!(lev >= 1);
    let Rec::Coeffs(av) = a else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let mut out: Vec<Rec> = av.iter().map(|x| mul(x, c, lev - 1, p)).collect();
    trim(&mut out);
    Rec::Coeffs(out)
}

fn mul_scalar(a: &Rec, s: u64, p: u64) -> Rec {
    match a {
        Rec::Scalar(c) => Rec::Scalar(mul_mod(*c, s, p)),
        Rec::Coeffs(v) => Rec::Coeffs(v.iter().map(|x| mul_scalar(x, s, p)).collect()),
    }
}

/// Scale so the leading scalar is 1; zero stays zero.
fn monic(a: Rec, p: u64) -> Rec {
    if is_zero(&a) {
        return a;
    }
    let s = lead_scalar(&a);
    if s == 1 {
        return a;
    }
    let inv = inv_mod(s, p).expect("p is prime and the lead scalar is nonzero");
    mul_scalar(&a, inv, p)
}

/// Pseudo-remainder in the top variable: repeatedly scale by lc(v) and
/// cancel the leading term. The result differs from the true remainder by a
/// power of lc(v), which the primitive-part step strips again.
fn prem(u: &Rec, v: &Rec, lev: usize, p: u64) -> Rec {
    debug_assert!(lev >= 1 && !is_zero(v));
    let Rec::Coeffs(vv) = v else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let dv = vv.len() - 1;
    let lv = vv[dv].clone();
    let mut r = u.clone();
    loop {
        let Rec::Coeffs(rv) = &r else {
            unreachable!("level {lev} holds coefficient vectors")
        };
        if rv.is_empty() || rv.len() - 1 < dv {
            return r;
        }
        let k = rv.len() - 1 - dv;
        let lr = rv.last().expect("nonzero").clone();
        let scaled = mul_coeffs(&r, &lv, lev, p);
        let mut shifted: Vec<Rec> = vec![zero(lev - 1); k];
        shifted.extend(vv.iter().map(|x| mul(x, &lr, lev - 1, p)));
        r = sub(&scaled, &Rec::Coeffs(shifted), lev, p);
    }
}

/// Exact division; `None` when `b` does not divide `a`.
fn divexact(a: &Rec, b: &Rec, lev: usize, p: u64) -> Option<Rec> {
    if is_zero(a) {
        return Some(zero(lev));
    }
    if is_zero(b) {
        return None;
    }
    if lev == 0 {
        let (Rec::Scalar(x), Rec::Scalar(y)) = (a, b) else {
            unreachable!("level 0 holds scalars")
        };
        return Some(Rec::Scalar(mul_mod(*x, inv_mod(*y, p)?, p)));
    }
    let (Rec::Coeffs(av), Rec::Coeffs(bv)) = (a, b) else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let (da, db) = (av.len() - 1, bv.len() - 1);
    if da < db {
        return None;
    }
    let mut r = av.clone();
    let mut q = vec![zero(lev - 1); da - db + 1];
    loop {
        trim(&mut r);
        if r.is_empty() {
            break;
        }
        if r.len() - 1 < db {
            return None;
        }
        let k = r.len() - 1 - db;
        let qc = divexact(r.last().expect("nonzero"), &bv[db], lev - 1, p)?;
        for (i, bc) in bv.iter().enumerate() {
            let t = mul(bc, &qc, lev - 1, p);
            r[k + i] = sub(&r[k + i], &t, lev - 1, p);
        }
        debug_assert!(is_zero(&r[k + db]));
        q[k] = qc;
    }
    Some(Rec::Coeffs(q))
}

/// Divide every top-variable coefficient exactly by `c` (one level down).
fn div_coeffs(a: &Rec, c: &Rec, lev: usize, p: u64) -> Option<Rec> {
    debug_assert!(lev >= 1);
    let Rec::Coeffs(av) = a else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let mut out = Vec::with_capacity(av.len());
    for x in av {
        out.push(divexact(x, c, lev - 1, p)?);
    }
    Some(Rec::Coeffs(out))
}

/// Content with respect to the top variable: gcd of the coefficients, one
/// level down, scalar-monic.
fn content(a: &Rec, lev: usize, p: u64) -> Rec {
    debug_assert!(lev >= 1);
    let Rec::Coeffs(av) = a else {
        unreachable!("level {lev} holds coefficient vectors")
    };
    let mut g = zero(lev - 1);
    for c in av {
        if is_zero(c) {
            continue;
        }
        g = gcd_rec(&g, c, lev - 1, p);
        if is_one(&g) {
            break;
        }
    }
    g
}

/// GCD in GF(p)[x₁,…,x_lev], scalar-monic. Content/primitive-part recursion
/// with a primitive pseudo-remainder sequence in the top variable.
fn gcd_rec(a: &Rec, b: &Rec, lev: usize, p: u64) -> Rec {
    if is_zero(a) {
        return monic(b.clone(), p);
    }
    if is_zero(b) {
        return monic(a.clone(), p);
    }
    if lev == 0 {
        return Rec::Scalar(1);
    }
    let ca = content(a, lev, p);
    let cb = content(b, lev, p);
    let mut pa = div_coeffs(a, &ca, lev, p).expect("content divides");
    let mut pb = div_coeffs(b, &cb, lev, p).expect("content divides");
    let cg = gcd_rec(&ca, &cb, lev - 1, p);
    if deg(&pa) < deg(&pb) {
        std::mem::swap(&mut pa, &mut pb);
    }
    while !is_zero(&pb) {
        let r = prem(&pa, &pb, lev, p);
        pa = pb;
        pb = if is_zero(&r) {
            r
        } else {
            let cr = content(&r, lev, p);
            div_coeffs(&r, &cr, lev, p).expect("content divides")
        };
    }
    monic(mul_coeffs(&pa, &cg, lev, p), p)
}

/// Pack a sparse image into the dense recursive layout. `terms` are sorted
/// decreasing, share the exponent prefix consumed so far, and `depth` is the
/// next exponent position to split on.
fn sparse_to_rec(terms: &[(Vec<u32>, u64)], depth: usize, nvars_left: usize) -> Rec {
    if nvars_left == 0 {
        debug_assert!(terms.len() <= 1);
        return Rec::Scalar(terms.first().map(|(_, c)| *c).unwrap_or(0));
    }
    if terms.is_empty() {
        return zero(nvars_left);
    }
    let max_e = terms[0].0[depth] as usize;
    let mut v = vec![zero(nvars_left - 1); max_e + 1];
    let mut i = 0;
    while i < terms.len() {
        let e = terms[i].0[depth] as usize;
        let mut j = i;
        while j < terms.len() && terms[j].0[depth] as usize == e {
            j += 1;
        }
        v[e] = sparse_to_rec(&terms[i..j], depth + 1, nvars_left - 1);
        i = j;
    }
    Rec::Coeffs(v)
}

fn to_rec(img: &PolyUZp) -> Rec {
    if img.terms.is_empty() {
        return zero(img.inner_nvars + 1);
    }
    let top = img.terms[0].0 as usize;
    let mut v = vec![zero(img.inner_nvars); top + 1];
    for (e, inner) in &img.terms {
        v[*e as usize] = sparse_to_rec(&inner.terms, 0, img.inner_nvars);
    }
    Rec::Coeffs(v)
}

fn collect_inner(r: &Rec, nvars_left: usize, mon: &mut Vec<u32>, out: &mut Vec<(Vec<u32>, u64)>) {
    if nvars_left == 0 {
        let Rec::Scalar(c) = r else {
            unreachable!("level 0 holds scalars")
        };
        if *c != 0 {
            out.push((mon.clone(), *c));
        }
        return;
    }
    let Rec::Coeffs(v) = r else {
        unreachable!("positive level holds coefficient vectors")
    };
    for e in (0..v.len()).rev() {
        mon.push(e as u32);
        collect_inner(&v[e], nvars_left - 1, mon, out);
        mon.pop();
    }
}

fn from_rec(r: &Rec, p: u64, inner_nvars: usize) -> PolyUZp {
    let mut out = PolyUZp::zero(p, inner_nvars);
    let Rec::Coeffs(v) = r else {
        // A scalar can only appear when there are no variables at all,
        // which the callers never produce at the top level.
        unreachable!("top level holds coefficient vectors")
    };
    for e in (0..v.len()).rev() {
        if is_zero(&v[e]) {
            continue;
        }
        let mut terms = Vec::new();
        let mut mon = Vec::new();
        collect_inner(&v[e], inner_nvars, &mut mon, &mut terms);
        if !terms.is_empty() {
            out.terms.push((e as u64, PolyZp { nvars: inner_nvars, terms }));
        }
    }
    out
}

/// Modular GCD of two nonzero images at the same prime. Returns the
/// scalar-monic GCD and both exact cofactors, or `None` if the kernel could
/// not certify the division (the caller then skips the prime).
pub fn gcd_at_prime(a: &PolyUZp, b: &PolyUZp) -> Option<(PolyUZp, PolyUZp, PolyUZp)> {
    debug_assert_eq!(a.p, b.p);
    debug_assert_eq!(a.inner_nvars, b.inner_nvars);
    debug_assert!(!a.is_zero() && !b.is_zero());
    let p = a.p;
    let lev = a.inner_nvars + 1;
    let ra = to_rec(a);
    let rb = to_rec(b);
    let g = gcd_rec(&ra, &rb, lev, p);
    let abar = divexact(&ra, &g, lev, p)?;
    let bbar = divexact(&rb, &g, lev, p)?;
    Some((
        from_rec(&g, p, a.inner_nvars),
        from_rec(&abar, p, a.inner_nvars),
        from_rec(&bbar, p, a.inner_nvars),
    ))
}

/// Like [`gcd_at_prime`], with the two cofactor divisions split across the
/// caller and one reserved pool worker when any are available.
pub fn gcd_at_prime_threaded(
    a: &PolyUZp,
    b: &PolyUZp,
    pool: &ThreadPool,
    handles: &[Handle],
) -> Option<(PolyUZp, PolyUZp, PolyUZp)> {
    if handles.is_empty() {
        return gcd_at_prime(a, b);
    }
    debug_assert_eq!(a.p, b.p);
    let p = a.p;
    let lev = a.inner_nvars + 1;
    let ra = to_rec(a);
    let rb = to_rec(b);
    let g = gcd_rec(&ra, &rb, lev, p);

    let abar_slot: Arc<Mutex<Option<Rec>>> = Arc::new(Mutex::new(None));
    {
        let slot = Arc::clone(&abar_slot);
        let (ra, g) = (ra.clone(), g.clone());
        pool.wake(handles[0], move || {
            *slot.lock().unwrap() = divexact(&ra, &g, lev, p);
        });
    }
    let bbar = divexact(&rb, &g, lev, p);
    pool.wait(handles[0]);

    let abar = abar_slot.lock().unwrap().take()?;
    let bbar = bbar?;
    Some((
        from_rec(&g, p, a.inner_nvars),
        from_rec(&abar, p, a.inner_nvars),
        from_rec(&bbar, p, a.inner_nvars),
    ))
}
