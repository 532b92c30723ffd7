//! # Poly — Sparse Distributed Multivariate Polynomials over ℤ
//!
//! The user-facing polynomial representation: an ordered list of
//! (monomial, coefficient) terms with arbitrary-precision integer
//! coefficients. Monomials are explicit exponent vectors compared
//! lexicographically with the first variable most significant; the term list
//! is kept strictly decreasing with no zero coefficients, so equality is
//! structural and every operation can merge rather than search.
//!
//! Everything the GCD driver needs from the integer side lives here:
//! content and height (the coefficient bounds that size the CRT modulus),
//! scalar multiply / exact-divide (content stripping and reattachment), and
//! full multiplication (used by callers and tests to verify the cofactor
//! identities A = G·Ā, B = G·B̄).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rug::Integer;

/// One term: an exponent vector and a nonzero coefficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub exps: Vec<u32>,
    pub coeff: Integer,
}

/// Sparse distributed polynomial in `nvars` variables over ℤ.
///
/// Invariants: every term has `exps.len() == nvars` and a nonzero
/// coefficient; terms are strictly decreasing in the lexicographic monomial
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Poly {
    pub nvars: usize,
    pub terms: Vec<Term>,
}

/// Lexicographic monomial comparison, first variable most significant.
/// Both slices must have the same length.
#[inline]
pub fn cmp_monomials(a: &[u32], b: &[u32]) -> Ordering {
    debug_assert_eq!(a.len(), b.len());
    a.cmp(b)
}

impl Poly {
    /// The zero polynomial.
    pub fn zero(nvars: usize) -> Self {
        Poly { nvars, terms: Vec::new() }
    }

    /// A constant polynomial (empty term list when `c == 0`).
    pub fn constant(nvars: usize, c: Integer) -> Self {
        let mut p = Poly::zero(nvars);
        if c != 0 {
            p.terms.push(Term { exps: vec![0; nvars], coeff: c });
        }
        p
    }

    /// Build a polynomial from arbitrary (coefficient, exponents) pairs:
    /// like monomials are combined, zeros dropped, terms sorted decreasing.
    ///
    /// # Panics
    /// Panics if any exponent vector has the wrong arity.
    pub fn from_terms(nvars: usize, terms: Vec<(Integer, Vec<u32>)>) -> Self {
        let mut map: BTreeMap<Vec<u32>, Integer> = BTreeMap::new();
        for (c, exps) in terms {
            assert_eq!(exps.len(), nvars, "monomial arity mismatch");
            *map.entry(exps).or_insert_with(Integer::new) += c;
        }
        let mut out = Poly::zero(nvars);
        for (exps, coeff) in map.into_iter().rev() {
            if coeff != 0 {
                out.terms.push(Term { exps, coeff });
            }
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// True when the polynomial is a (possibly zero) constant.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
            || (self.terms.len() == 1 && self.terms[0].exps.iter().all(|&e| e == 0))
    }

    /// Leading coefficient in the monomial order, if nonzero.
    pub fn leading_coeff(&self) -> Option<&Integer> {
        self.terms.first().map(|t| &t.coeff)
    }

    /// Leading monomial, if nonzero.
    pub fn leading_monomial(&self) -> Option<&[u32]> {
        self.terms.first().map(|t| t.exps.as_slice())
    }

    /// Content: the gcd of all coefficients, non-negative; 0 for the zero
    /// polynomial.
    pub fn content(&self) -> Integer {
        let mut g = Integer::new();
        for t in &self.terms {
            g = g.gcd(&t.coeff);
            if g == 1 {
                break;
            }
        }
        g
    }

    /// Height: the largest coefficient in absolute value.
    pub fn height(&self) -> Integer {
        let mut h = Integer::new();
        for t in &self.terms {
            if h.cmp_abs(&t.coeff) == Ordering::Less {
                h = Integer::from(t.coeff.abs_ref());
            }
        }
        h
    }

    pub fn neg(&self) -> Poly {
        let mut out = self.clone();
        for t in &mut out.terms {
            t.coeff = Integer::from(-&t.coeff);
        }
        out
    }

    /// Multiply every coefficient by a nonzero integer.
    pub fn mul_integer(&mut self, c: &Integer) {
        debug_assert!(*c != 0);
        for t in &mut self.terms {
            t.coeff *= c;
        }
    }

    /// Divide every coefficient exactly by `c`. The division must be exact.
    pub fn divexact_integer(&mut self, c: &Integer) {
        debug_assert!(*c != 0);
        if *c == 1 {
            return;
        }
        for t in &mut self.terms {
            t.coeff = Integer::from(t.coeff.div_exact_ref(c));
        }
    }

    /// Full product. Used by callers and tests to check A = G·Ā exactly.
    pub fn mul(&self, other: &Poly) -> Poly {
        assert_eq!(self.nvars, other.nvars, "variable arity mismatch");
        let mut map: BTreeMap<Vec<u32>, Integer> = BTreeMap::new();
        for s in &self.terms {
            for o in &other.terms {
                let exps: Vec<u32> = s
                    .exps
                    .iter()
                    .zip(&o.exps)
                    .map(|(&x, &y)| x.checked_add(y).expect("exponent overflow"))
                    .collect();
                *map.entry(exps).or_insert_with(Integer::new) +=
                    Integer::from(&s.coeff * &o.coeff);
            }
        }
        let mut out = Poly::zero(self.nvars);
        for (exps, coeff) in map.into_iter().rev() {
            if coeff != 0 {
                out.terms.push(Term { exps, coeff });
            }
        }
        out
    }

    /// Structural well-formedness: strictly decreasing monomials, no zeros.
    pub fn is_canonical(&self) -> bool {
        self.terms.iter().all(|t| t.exps.len() == self.nvars && t.coeff != 0)
            && self
                .terms
                .windows(2)
                .all(|w| cmp_monomials(&w[0].exps, &w[1].exps) == Ordering::Greater)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Integer {
        Integer::from(v)
    }

    /// from_terms must combine duplicate monomials, drop the zeros that
    /// result, and order the survivors strictly decreasing.
    #[test]
    fn from_terms_normalizes() {
        let p = Poly::from_terms(
            2,
            vec![
                (int(1), vec![1, 0]),
                (int(2), vec![0, 1]),
                (int(-1), vec![1, 0]),
                (int(5), vec![2, 2]),
            ],
        );
        assert!(p.is_canonical());
        assert_eq!(p.terms.len(), 2);
        assert_eq!(p.terms[0].exps, vec![2, 2]);
        assert_eq!(p.terms[1].exps, vec![0, 1]);
    }

    #[test]
    fn monomial_order_is_lex_first_var_major() {
        assert_eq!(cmp_monomials(&[1, 0], &[0, 9]), Ordering::Greater);
        assert_eq!(cmp_monomials(&[1, 2], &[1, 3]), Ordering::Less);
        assert_eq!(cmp_monomials(&[2, 2], &[2, 2]), Ordering::Equal);
    }

    /// (x + 1)(x − 1) = x² − 1: the cross terms must cancel away entirely.
    #[test]
    fn mul_cancels_cross_terms() {
        let a = Poly::from_terms(1, vec![(int(1), vec![1]), (int(1), vec![0])]);
        let b = Poly::from_terms(1, vec![(int(1), vec![1]), (int(-1), vec![0])]);
        let prod = a.mul(&b);
        let expected = Poly::from_terms(1, vec![(int(1), vec![2]), (int(-1), vec![0])]);
        assert_eq!(prod, expected);
    }

    #[test]
    fn mul_bivariate_known_product() {
        // (xy + 1)(x + 2) = x²y + 2xy + x + 2
        let a = Poly::from_terms(2, vec![(int(1), vec![1, 1]), (int(1), vec![0, 0])]);
        let b = Poly::from_terms(2, vec![(int(1), vec![1, 0]), (int(2), vec![0, 0])]);
        let prod = a.mul(&b);
        let expected = Poly::from_terms(
            2,
            vec![
                (int(1), vec![2, 1]),
                (int(2), vec![1, 1]),
                (int(1), vec![1, 0]),
                (int(2), vec![0, 0]),
            ],
        );
        assert_eq!(prod, expected);
    }

    #[test]
    fn content_and_height() {
        let p = Poly::from_terms(1, vec![(int(6), vec![2]), (int(-10), vec![1]), (int(4), vec![0])]);
        assert_eq!(p.content(), 2);
        assert_eq!(p.height(), 10);
        assert_eq!(Poly::zero(1).content(), 0);
        assert_eq!(Poly::zero(1).height(), 0);
    }

    /// Content is always reported non-negative, even when every coefficient
    /// is negative.
    #[test]
    fn content_of_all_negative_poly_is_positive() {
        let p = Poly::from_terms(1, vec![(int(-6), vec![1]), (int(-9), vec![0])]);
        assert_eq!(p.content(), 3);
    }

    #[test]
    fn scalar_mul_div_roundtrip() {
        let mut p = Poly::from_terms(1, vec![(int(3), vec![1]), (int(-7), vec![0])]);
        let orig = p.clone();
        let c = int(12);
        p.mul_integer(&c);
        assert_eq!(p.content(), 12);
        p.divexact_integer(&c);
        assert_eq!(p, orig);
    }

    #[test]
    fn constant_and_zero_shapes() {
        assert!(Poly::zero(3).is_zero());
        assert!(Poly::constant(3, int(0)).is_zero());
        let c = Poly::constant(3, int(5));
        assert!(c.is_constant());
        assert!(!c.is_zero());
        assert_eq!(c.leading_coeff(), Some(&int(5)));
    }
}
