//! # Modp — Polynomial Images in GF(p)
//!
//! Word-prime images of the integer polynomials: the same nested shape as
//! [`PolyU`](crate::polyu::PolyU) with coefficients reduced into [0, p).
//! Alongside the shapes live the three per-prime coefficient transfers the
//! split engine runs in lockstep on G, Ā and B̄:
//!
//! - reduction ℤ → GF(p) of a whole [`PolyU`],
//! - the balanced lift of a first image (modulus 1 → p),
//! - the two-modulus CRT fold of a partial lift with a fresh image
//!   (modulus m → m·p), term-merged over (outer exponent, inner monomial).

use std::cmp::Ordering;

use rug::Integer;

use crate::arith::{inv_mod, mul_mod, rem_u64, sub_mod};
use crate::poly::{cmp_monomials, Poly, Term};
use crate::polyu::PolyU;

/// Sparse inner polynomial with coefficients in GF(p): strictly decreasing
/// monomials, no zero coefficients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolyZp {
    pub nvars: usize,
    pub terms: Vec<(Vec<u32>, u64)>,
}

impl PolyZp {
    pub fn zero(nvars: usize) -> Self {
        PolyZp { nvars, terms: Vec::new() }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// True for a nonzero constant.
    pub fn is_constant(&self) -> bool {
        self.terms.len() == 1 && self.terms[0].0.iter().all(|&e| e == 0)
    }

    pub fn leading_monomial(&self) -> Option<&[u32]> {
        self.terms.first().map(|(m, _)| m.as_slice())
    }
}

/// Image of a [`PolyU`] at the word prime `p`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolyUZp {
    pub p: u64,
    pub inner_nvars: usize,
    pub terms: Vec<(u64, PolyZp)>,
}

impl PolyUZp {
    pub fn zero(p: u64, inner_nvars: usize) -> Self {
        PolyUZp { p, inner_nvars, terms: Vec::new() }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn leading_exp(&self) -> u64 {
        self.terms[0].0
    }

    pub fn leading_inner(&self) -> &PolyZp {
        &self.terms[0].1
    }

    /// The single leading scalar coefficient in the full term order.
    pub fn leading_coeff(&self) -> Option<u64> {
        self.terms.first().and_then(|(_, p)| p.terms.first()).map(|&(_, c)| c)
    }

    /// True when the image is a nonzero constant, i.e. the modular GCD says
    /// the integer GCD has no nonconstant part.
    pub fn is_nonzero_constant(&self) -> bool {
        self.terms.len() == 1 && self.terms[0].0 == 0 && self.terms[0].1.is_constant()
    }

    /// Multiply every coefficient by the nonzero scalar `s` mod p.
    pub fn scalar_mul(&mut self, s: u64) {
        debug_assert!(s % self.p != 0);
        for (_, inner) in &mut self.terms {
            for (_, c) in &mut inner.terms {
                *c = mul_mod(*c, s, self.p);
            }
        }
    }
}

/// Reduce a [`PolyU`] mod p, dropping vanished coefficients and terms.
pub fn reduce_polyu(a: &PolyU, p: u64) -> PolyUZp {
    let mut out = PolyUZp::zero(p, a.inner_nvars);
    for (e, inner) in &a.terms {
        let mut ip = PolyZp::zero(a.inner_nvars);
        for t in &inner.terms {
            let c = rem_u64(&t.coeff, p);
            if c != 0 {
                ip.terms.push((t.exps.clone(), c));
            }
        }
        if !ip.is_zero() {
            out.terms.push((*e, ip));
        }
    }
    out
}

/// Balanced representative of a residue in [0, p): pull the upper half down
/// to (−p/2, p/2].
fn balanced(r: u64, p: u64) -> Integer {
    if r > p / 2 {
        Integer::from(r) - Integer::from(p)
    } else {
        Integer::from(r)
    }
}

/// First image lift: the partial CRT result at modulus p, coefficients
/// taken as balanced representatives.
pub fn lift_polyu(img: &PolyUZp) -> PolyU {
    let p = img.p;
    let mut out = PolyU::zero(img.inner_nvars);
    for (e, inner) in &img.terms {
        let mut ip = Poly::zero(img.inner_nvars);
        for (m, c) in &inner.terms {
            ip.terms.push(Term { exps: m.clone(), coeff: balanced(*c, p) });
        }
        out.terms.push((*e, ip));
    }
    out
}

/// CRT-fold one fresh image into a partial lift: given `acc` correct mod
/// `modulus` and `img` at the coprime prime p, produce the balanced lift
/// mod `modulus·p`. Terms present on only one side are treated as zero on
/// the other; coefficients that combine to zero are dropped.
pub fn crt_fold_polyu(acc: &PolyU, modulus: &Integer, img: &PolyUZp) -> PolyU {
    let p = img.p;
    let mp = rem_u64(modulus, p);
    let minv = inv_mod(mp, p).expect("modulus and fresh prime are coprime");
    let new_modulus = Integer::from(modulus * p);
    let zero_inner = Poly::zero(acc.inner_nvars);
    let zero_inner_p = PolyZp::zero(img.inner_nvars);

    let mut out = PolyU::zero(acc.inner_nvars);
    let (mut i, mut j) = (0usize, 0usize);
    while i < acc.terms.len() || j < img.terms.len() {
        let ea = acc.terms.get(i).map(|(e, _)| *e);
        let eb = img.terms.get(j).map(|(e, _)| *e);
        let (e, a_inner, b_inner) = match (ea, eb) {
            (Some(ea), Some(eb)) if ea == eb => {
                let r = (ea, &acc.terms[i].1, &img.terms[j].1);
                i += 1;
                j += 1;
                r
            }
            (Some(ea), Some(eb)) if ea > eb => {
                let r = (ea, &acc.terms[i].1, &zero_inner_p);
                i += 1;
                r
            }
            (Some(_), Some(eb)) => {
                let r = (eb, &zero_inner, &img.terms[j].1);
                j += 1;
                r
            }
            (Some(ea), None) => {
                let r = (ea, &acc.terms[i].1, &zero_inner_p);
                i += 1;
                r
            }
            (None, Some(eb)) => {
                let r = (eb, &zero_inner, &img.terms[j].1);
                j += 1;
                r
            }
            (None, None) => unreachable!(),
        };
        let merged = crt_fold_inner(a_inner, b_inner, modulus, &new_modulus, p, minv);
        if !merged.is_zero() {
            out.terms.push((e, merged));
        }
    }
    out
}

/// Inner-coefficient merge for [`crt_fold_polyu`]: classic two-modulus CRT
/// `x = c + m·((r − c)·m⁻¹ mod p)` reduced to the balanced representative.
fn crt_fold_inner(
    a: &Poly,
    b: &PolyZp,
    modulus: &Integer,
    new_modulus: &Integer,
    p: u64,
    minv: u64,
) -> Poly {
    let mut out = Poly::zero(a.nvars);
    let (mut i, mut j) = (0usize, 0usize);
    let zero = Integer::new();
    while i < a.terms.len() || j < b.terms.len() {
        let ord = match (a.terms.get(i), b.terms.get(j)) {
            (Some(ta), Some(tb)) => cmp_monomials(&ta.exps, &tb.0),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => unreachable!(),
        };
        let (exps, c, r) = match ord {
            Ordering::Equal => {
                let t = (a.terms[i].exps.clone(), &a.terms[i].coeff, b.terms[j].1);
                i += 1;
                j += 1;
                t
            }
            Ordering::Greater => {
                let t = (a.terms[i].exps.clone(), &a.terms[i].coeff, 0u64);
                i += 1;
                t
            }
            Ordering::Less => {
                let t = (b.terms[j].0.clone(), &zero, b.terms[j].1);
                j += 1;
                t
            }
        };
        let cr = rem_u64(c, p);
        let t = mul_mod(sub_mod(r, cr, p), minv, p);
        let mut x = Integer::from(modulus * t);
        x += c;
        let x = crate::arith::mods(&x, new_modulus);
        if x != 0 {
            out.terms.push(Term { exps, coeff: x });
        }
    }
    out
}
