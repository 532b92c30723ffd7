//! End-to-end scenarios for the public GCD entry point.
//!
//! Every test certifies the full contract, not just the gcd itself: on
//! success `A = G·Ā` and `B = G·B̄` hold exactly over ℤ, `G` has positive
//! leading coefficient and primitive content, and the answer is invariant
//! under swapping the inputs and under the thread budget.
//!
//! # How to run
//!
//! ```bash
//! cargo test --test gcd_scenarios
//! ```

use polygcd::{gcd, Gcd, Poly};
use rug::ops::Pow;
use rug::Integer;

fn int(v: i64) -> Integer {
    Integer::from(v)
}

fn poly(nvars: usize, terms: &[(i64, &[u32])]) -> Poly {
    Poly::from_terms(
        nvars,
        terms.iter().map(|&(c, e)| (Integer::from(c), e.to_vec())).collect(),
    )
}

/// Full-contract check: identities, sign, primitivity, commutativity, and
/// thread invariance. Returns the result computed single-threaded.
fn check(a: &Poly, b: &Poly) -> Gcd {
    let r = gcd(a, b, 1).expect("gcd");
    assert_eq!(r.g.mul(&r.abar), *a, "A != G*Abar");
    assert_eq!(r.g.mul(&r.bbar), *b, "B != G*Bbar");
    if !r.g.is_zero() {
        assert!(r.g.leading_coeff().unwrap().is_positive(), "lc(G) not positive");
        // cont(G) divides gcd(cont(A), cont(B)).
        let common = Integer::from(a.content().gcd_ref(&b.content()));
        assert!(common.is_divisible(&r.g.content()), "cont(G) too large");
    }

    // Swapping the inputs swaps the cofactors and keeps G.
    let s = gcd(b, a, 1).expect("gcd swapped");
    assert_eq!(s.g, r.g, "G changed under commutativity");
    assert_eq!(s.abar, r.bbar);
    assert_eq!(s.bbar, r.abar);

    // The thread budget must not change a single bit of the answer.
    for threads in [2usize, 4, 8] {
        let t = gcd(a, b, threads).expect("gcd threaded");
        assert_eq!(t, r, "answer changed at thread_limit={threads}");
    }
    r
}

/// Scenario 1: univariate over the main variable alone.
/// A = (x−2)(x+3), B = (x−2)(x+5).
#[test]
fn univariate_shared_root() {
    let a = poly(1, &[(1, &[2]), (1, &[1]), (-6, &[0])]);
    let b = poly(1, &[(1, &[2]), (3, &[1]), (-10, &[0])]);
    let r = check(&a, &b);
    assert_eq!(r.g, poly(1, &[(1, &[1]), (-2, &[0])]));
    assert_eq!(r.abar, poly(1, &[(1, &[1]), (3, &[0])]));
    assert_eq!(r.bbar, poly(1, &[(1, &[1]), (5, &[0])]));
}

/// Scenario 2: bivariate, the common factor carries the main variable.
/// A = (yx+1)(x+2), B = (yx+1)(x−3).
#[test]
fn bivariate_common_factor() {
    let f = poly(2, &[(1, &[1, 1]), (1, &[0, 0])]);
    let a = f.mul(&poly(2, &[(1, &[1, 0]), (2, &[0, 0])]));
    let b = f.mul(&poly(2, &[(1, &[1, 0]), (-3, &[0, 0])]));
    let r = check(&a, &b);
    assert_eq!(r.g, f);
}

/// Scenario 3: coprime inputs short-circuit through the constant-image
/// flag. A = x²+1, B = x²+2.
#[test]
fn coprime_inputs_give_unit_gcd() {
    let a = poly(1, &[(1, &[2]), (1, &[0])]);
    let b = poly(1, &[(1, &[2]), (2, &[0])]);
    let r = check(&a, &b);
    assert_eq!(r.g, poly(1, &[(1, &[0])]));
    assert_eq!(r.abar, a);
    assert_eq!(r.bbar, b);
}

/// Scenario 4: a 10^30 coefficient forces the CRT over several 62-bit
/// primes. A = (x − 10^30)(x+1), B = (x − 10^30)(x−2).
#[test]
fn large_coefficients_need_multiple_primes() {
    let big = Integer::from(10u32).pow(30u32);
    let shared = Poly::from_terms(1, vec![(int(1), vec![1]), (-big, vec![0])]);
    let a = shared.mul(&poly(1, &[(1, &[1]), (1, &[0])]));
    let b = shared.mul(&poly(1, &[(1, &[1]), (-2, &[0])]));
    let r = check(&a, &b);
    assert_eq!(r.g, shared);
}

/// Scenario 5: integer content must be split between G and the cofactors.
/// A = 6(x+1), B = 10(x+1): G = 2(x+1), Ā = 3, B̄ = 5.
#[test]
fn content_bearing_inputs() {
    let a = poly(1, &[(6, &[1]), (6, &[0])]);
    let b = poly(1, &[(10, &[1]), (10, &[0])]);
    let r = check(&a, &b);
    assert_eq!(r.g, poly(1, &[(2, &[1]), (2, &[0])]));
    assert_eq!(r.abar, poly(1, &[(3, &[0])]));
    assert_eq!(r.bbar, poly(1, &[(5, &[0])]));
}

/// Scenario 6: three variables with a nontrivial shared factor.
/// A = (xy+z)(x+y+z), B = (xy+z)(x−y+2z).
#[test]
fn trivariate_shared_factor() {
    let f = poly(3, &[(1, &[1, 1, 0]), (1, &[0, 0, 1])]);
    let u = poly(3, &[(1, &[1, 0, 0]), (1, &[0, 1, 0]), (1, &[0, 0, 1])]);
    let v = poly(3, &[(1, &[1, 0, 0]), (-1, &[0, 1, 0]), (2, &[0, 0, 1])]);
    let a = f.mul(&u);
    let b = f.mul(&v);
    let r = check(&a, &b);
    assert_eq!(r.g, f);
    assert_eq!(r.abar, u);
    assert_eq!(r.bbar, v);
}

/// gcd(A, A) is ±A normalized to a positive leading coefficient.
#[test]
fn idempotent_on_self() {
    let a = poly(2, &[(-2, &[2, 1]), (4, &[0, 0])]);
    let r = check(&a, &a);
    assert_eq!(r.g, a.neg());
    assert_eq!(r.abar, poly(2, &[(-1, &[0, 0])]));
}

/// Negative leading coefficients on both sides: the sign lands in the
/// cofactors, never in G.
#[test]
fn negative_inputs_normalize_sign() {
    let f = poly(1, &[(1, &[1]), (7, &[0])]);
    let a = f.mul(&poly(1, &[(-3, &[1]), (1, &[0])]));
    let b = f.mul(&poly(1, &[(-5, &[0])]));
    let r = check(&a, &b);
    assert_eq!(r.g, f);
}

/// Mixed-degree gcd in the main variable with inner-variable content:
/// A = y²·(x+y), B = y·(x+y)·(x−y).
#[test]
fn inner_variable_content() {
    let xy = poly(2, &[(1, &[1, 0]), (1, &[0, 1])]);
    let y = poly(2, &[(1, &[0, 1])]);
    let a = y.mul(&y).mul(&xy);
    let b = y.mul(&xy).mul(&poly(2, &[(1, &[1, 0]), (-1, &[0, 1])]));
    let r = check(&a, &b);
    assert_eq!(r.g, y.mul(&xy));
}

/// Deep thread budgets on a wider problem: eight threads split into
/// masters and inner workers without changing the result.
#[test]
fn wide_problem_under_many_threads() {
    let f = poly(2, &[(2, &[2, 1]), (1, &[1, 0]), (-3, &[0, 2])]);
    let u = poly(2, &[(1, &[3, 0]), (5, &[1, 1]), (1, &[0, 0])]);
    let v = poly(2, &[(1, &[2, 0]), (-7, &[0, 1])]);
    let a = f.mul(&u);
    let b = f.mul(&v);
    let r = check(&a, &b);
    assert_eq!(r.g, f);
    assert_eq!(r.abar, u);
    assert_eq!(r.bbar, v);
}
