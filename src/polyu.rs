//! # PolyU — Distributed-Univariate Form over a Main Variable
//!
//! The working shape of the GCD engine: a polynomial in one distinguished
//! main variable X whose coefficients are multivariate polynomials in the
//! remaining variables. Terms are (exponent-on-X, inner polynomial) pairs
//! with strictly decreasing exponents and nonzero inner polynomials.
//!
//! Variable 0 of a [`Poly`] plays the role of X; the inner polynomials keep
//! the remaining variables in their original order, so the global
//! lexicographic term order of the flat form and the nested form agree and
//! conversion in either direction is a single ordered pass.

use std::cmp::Ordering;

use rug::Integer;

use crate::poly::{cmp_monomials, Poly, Term};

/// Polynomial in X over ℤ[x₁, …, x_k]: decreasing outer exponents, each
/// paired with a nonzero inner polynomial in `inner_nvars` variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolyU {
    pub inner_nvars: usize,
    pub terms: Vec<(u64, Poly)>,
}

impl PolyU {
    pub fn zero(inner_nvars: usize) -> Self {
        PolyU { inner_nvars, terms: Vec::new() }
    }

    /// The constant polynomial 1.
    pub fn one(inner_nvars: usize) -> Self {
        PolyU {
            inner_nvars,
            terms: vec![(0, Poly::constant(inner_nvars, Integer::from(1u32)))],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Leading outer exponent; the polynomial must be nonzero.
    pub fn leading_exp(&self) -> u64 {
        self.terms[0].0
    }

    /// Leading inner polynomial; the polynomial must be nonzero.
    pub fn leading_inner(&self) -> &Poly {
        &self.terms[0].1
    }

    /// The single leading integer coefficient in the full term order.
    pub fn leading_coeff(&self) -> Option<&Integer> {
        self.terms.first().and_then(|(_, p)| p.leading_coeff())
    }

    /// Content: gcd of every integer coefficient, non-negative.
    pub fn content(&self) -> Integer {
        let mut g = Integer::new();
        for (_, inner) in &self.terms {
            g = g.gcd(&inner.content());
            if g == 1 {
                break;
            }
        }
        g
    }

    /// Height: largest coefficient in absolute value across all terms.
    pub fn height(&self) -> Integer {
        let mut h = Integer::new();
        for (_, inner) in &self.terms {
            let ih = inner.height();
            if h.cmp_abs(&ih) == Ordering::Less {
                h = ih;
            }
        }
        h
    }

    pub fn mul_integer(&mut self, c: &Integer) {
        for (_, inner) in &mut self.terms {
            inner.mul_integer(c);
        }
    }

    pub fn divexact_integer(&mut self, c: &Integer) {
        for (_, inner) in &mut self.terms {
            inner.divexact_integer(c);
        }
    }

    /// Nest a flat polynomial: variable 0 becomes the main variable, the
    /// rest keep their order as inner variables. The input's global term
    /// order makes this a single grouping pass.
    pub fn from_poly(p: &Poly) -> PolyU {
        assert!(p.nvars >= 1, "need a main variable");
        let inner_nvars = p.nvars - 1;
        let mut out = PolyU::zero(inner_nvars);
        for t in &p.terms {
            let e = t.exps[0] as u64;
            let term = Term { exps: t.exps[1..].to_vec(), coeff: t.coeff.clone() };
            if let Some((last_e, inner)) = out.terms.last_mut() {
                if *last_e == e {
                    inner.terms.push(term);
                    continue;
                }
            }
            let mut inner = Poly::zero(inner_nvars);
            inner.terms.push(term);
            out.terms.push((e, inner));
        }
        debug_assert!(out.is_canonical());
        out
    }

    /// Flatten back to the distributed form; inverse of [`PolyU::from_poly`].
    pub fn to_poly(&self) -> Poly {
        let nvars = self.inner_nvars + 1;
        let mut out = Poly::zero(nvars);
        for (e, inner) in &self.terms {
            let e = u32::try_from(*e).expect("outer exponent fits u32");
            for t in &inner.terms {
                let mut exps = Vec::with_capacity(nvars);
                exps.push(e);
                exps.extend_from_slice(&t.exps);
                out.terms.push(Term { exps, coeff: t.coeff.clone() });
            }
        }
        debug_assert!(out.is_canonical());
        out
    }

    /// Structural well-formedness: strictly decreasing outer exponents,
    /// nonzero canonical inner polynomials of matching arity.
    pub fn is_canonical(&self) -> bool {
        self.terms.iter().all(|(_, p)| {
            !p.is_zero() && p.nvars == self.inner_nvars && p.is_canonical()
        }) && self.terms.windows(2).all(|w| w[0].0 > w[1].0)
    }
}

/// Order two (outer exponent, leading inner monomial) heads: outer exponent
/// first, then the inner monomial lexicographically. This is the comparison
/// both the split accumulators and the orchestrator's survivor merge use to
/// tell lucky images from unlucky ones.
pub fn cmp_leading(ea: u64, ma: &[u32], eb: u64, mb: &[u32]) -> Ordering {
    ea.cmp(&eb).then_with(|| cmp_monomials(ma, mb))
}
