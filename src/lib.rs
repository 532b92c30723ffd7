//! # Polygcd — Parallel Multivariate GCD over ℤ
//!
//! Computes the greatest common divisor of two multivariate polynomials
//! with integer coefficients, together with both cofactors, using Brown's
//! dense modular algorithm lifted across worker threads by Chinese
//! Remaindering: many word-prime images of the problem are solved
//! independently (the *split*), then recombined coefficient-by-coefficient
//! through a precompiled CRT program (the *join*) until a
//! rational-reconstruction bound certifies the integer answer.
//!
//! ## Module Organization
//!
//! **Engine modules** (the split–join pipeline):
//! - [`brown`] — the orchestrator and public entry point: bound
//!   estimation, split→join rounds, divisibility certification.
//! - [`split`] — masters pulling primes off a shared cursor, folding
//!   modular images into private partial CRT lifts.
//! - [`join`] — workers draining shared exponent cursors through the
//!   compiled CRT program, plus the final top-level merge.
//! - [`crt`] — the compile-once/run-many CRT straight-line program and the
//!   K-way coefficient mergers.
//! - [`schedule`] — Farey-mediant division of the thread budget between
//!   prime-level masters and per-image inner workers.
//!
//! **Arithmetic modules**:
//! - [`poly`], [`polyu`] — sparse distributed polynomials over ℤ and
//!   their distributed-univariate nesting over the main variable.
//! - [`modp`] — GF(p) images, reduction, balanced lifts, two-modulus CRT.
//! - [`gcd_zp`] — the per-prime multivariate GCD kernel.
//! - [`arith`] — word-prime scalar arithmetic, the prime cursor, balanced
//!   residues.
//!
//! **Infrastructure**:
//! - [`pool`] — the reserved-handle worker thread pool.
//!
//! ## Example
//!
//! ```
//! use polygcd::{gcd, Poly};
//! use rug::Integer;
//!
//! // A = (x − 2)(x + 3), B = (x − 2)(x + 5)
//! let a = Poly::from_terms(1, vec![
//!     (Integer::from(1), vec![2]),
//!     (Integer::from(1), vec![1]),
//!     (Integer::from(-6), vec![0]),
//! ]);
//! let b = Poly::from_terms(1, vec![
//!     (Integer::from(1), vec![2]),
//!     (Integer::from(3), vec![1]),
//!     (Integer::from(-10), vec![0]),
//! ]);
//! let r = gcd(&a, &b, 4).unwrap();
//! assert_eq!(r.g, Poly::from_terms(1, vec![
//!     (Integer::from(1), vec![1]),
//!     (Integer::from(-2), vec![0]),
//! ]));
//! assert_eq!(r.g.mul(&r.abar), a);
//! assert_eq!(r.g.mul(&r.bbar), b);
//! ```

pub mod arith;
pub mod brown;
pub mod crt;
pub mod gcd_zp;
pub mod join;
pub mod modp;
pub mod poly;
pub mod polyu;
pub mod pool;
pub mod schedule;
pub mod split;

pub use brown::{gcd, gcd_with_pool, Gcd};
pub use poly::Poly;
pub use polyu::PolyU;
pub use pool::ThreadPool;
