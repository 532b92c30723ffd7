//! # Brown — The Split–Join Driver and Public Entry Point
//!
//! Brown's modular GCD, lifted to threads: strip integer content, estimate
//! a coefficient bound from γ = gcd(lc A, lc B) and the input heights, then
//! alternate split rounds (fresh prime images, §split) and join rounds
//! (CRT lift of the survivors, §join) until the modulus clears the bound
//! and a rational-reconstruction check certifies that the lifted
//! candidates are the true G, Ā, B̄. A failed check widens the bound by
//! 2^128 and buys more primes; a constant modular image short-circuits the
//! whole computation with G = 1.
//!
//! The certified results are normalized — G primitive with positive
//! leading coefficient — and the stripped contents are reattached so that
//! A = G·Ā and B = G·B̄ hold exactly over ℤ.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use rug::Integer;
use tracing::debug;

use crate::arith::PRIME_START;
use crate::crt::CrtProg;
use crate::join::{final_join, run_join, JoinBase, JoinImages};
use crate::poly::Poly;
use crate::polyu::{cmp_leading, PolyU};
use crate::pool::{Handle, ThreadPool};
use crate::schedule::divide_master_threads;
use crate::split::{run_split, SplitBase, WordPrimes};

/// The certified output of [`gcd`]: `a = g·abar` and `b = g·bbar` exactly,
/// `g` primitive with positive leading coefficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gcd {
    pub g: Poly,
    pub abar: Poly,
    pub bbar: Poly,
}

/// GCD with cofactors over ℤ, using at most `thread_limit` threads (the
/// caller included). Fails only on mismatched variable arity or exhaustion
/// of the word-prime space.
pub fn gcd(a: &Poly, b: &Poly, thread_limit: usize) -> Result<Gcd> {
    let workers = thread_limit.saturating_sub(1);
    let pool = Arc::new(ThreadPool::new(workers));
    gcd_with_pool(a, b, &pool, thread_limit)
}

/// Like [`gcd`], but borrowing workers from an existing pool instead of
/// spawning one per call.
pub fn gcd_with_pool(
    a: &Poly,
    b: &Poly,
    pool: &Arc<ThreadPool>,
    thread_limit: usize,
) -> Result<Gcd> {
    ensure!(
        a.nvars == b.nvars,
        "variable arity mismatch: {} vs {}",
        a.nvars,
        b.nvars
    );

    // Trivial shapes never reach the modular machinery.
    if a.is_zero() || b.is_zero() {
        return Ok(gcd_with_zero(a, b));
    }
    if a.nvars == 0 {
        let (ca, cb) = (&a.terms[0].coeff, &b.terms[0].coeff);
        let g = Integer::from(ca.gcd_ref(cb));
        return Ok(Gcd {
            g: Poly::constant(0, g.clone()),
            abar: Poly::constant(0, Integer::from(ca.div_exact_ref(&g))),
            bbar: Poly::constant(0, Integer::from(cb.div_exact_ref(&g))),
        });
    }

    let handles = pool.request(thread_limit.saturating_sub(1));
    let result = gcd_polyu(PolyU::from_poly(a), PolyU::from_poly(b), pool, &handles);
    for h in &handles {
        pool.give_back(*h);
    }
    let (gu, abaru, bbaru) = result?;

    let mut g = gu.to_poly();
    let mut abar = abaru.to_poly();
    let mut bbar = bbaru.to_poly();
    if g.leading_coeff().map(|c| c.is_negative()).unwrap_or(false) {
        g = g.neg();
        abar = abar.neg();
        bbar = bbar.neg();
    }
    Ok(Gcd { g, abar, bbar })
}

/// One or both inputs zero: the gcd is the other input up to sign.
fn gcd_with_zero(a: &Poly, b: &Poly) -> Gcd {
    let nvars = a.nvars;
    if a.is_zero() && b.is_zero() {
        return Gcd { g: Poly::zero(nvars), abar: Poly::zero(nvars), bbar: Poly::zero(nvars) };
    }
    let (zero_side_is_a, nz) = if a.is_zero() { (true, b) } else { (false, a) };
    let negative = nz.leading_coeff().map(|c| c.is_negative()).unwrap_or(false);
    let g = if negative { nz.neg() } else { nz.clone() };
    let unit = Poly::constant(nvars, Integer::from(if negative { -1 } else { 1 }));
    if zero_side_is_a {
        Gcd { g, abar: Poly::zero(nvars), bbar: unit }
    } else {
        Gcd { g, abar: unit, bbar: Poly::zero(nvars) }
    }
}

/// The split–join loop on the nested form. Consumes A and B (they are
/// content-stripped in place); returns (G, Ā, B̄) before sign adjustment
/// and flattening.
fn gcd_polyu(
    mut a: PolyU,
    mut b: PolyU,
    pool: &Arc<ThreadPool>,
    handles: &[Handle],
) -> Result<(PolyU, PolyU, PolyU)> {
    let inner_nvars = a.inner_nvars;

    // Integer contents come off first and go back on at the very end.
    let ca = a.content();
    let cb = b.content();
    let cg = Integer::from(ca.gcd_ref(&cb));
    let cabar = Integer::from(ca.div_exact_ref(&cg));
    let cbbar = Integer::from(cb.div_exact_ref(&cg));
    a.divexact_integer(&ca);
    b.divexact_integer(&cb);

    let gamma = Integer::from(
        a.leading_coeff()
            .expect("nonzero")
            .gcd_ref(b.leading_coeff().expect("nonzero")),
    );

    // Initial modulus target: 2·γ·max(height A, height B).
    let mut bound = a.height().max(b.height());
    bound *= &gamma;
    bound *= 2u32;

    let base = Arc::new(SplitBase::new(
        a.clone(),
        b.clone(),
        gamma.clone(),
        PRIME_START,
        Box::new(WordPrimes),
    ));
    let num_threads = handles.len() as u64 + 1;

    let mut modulus = Integer::from(1u32);
    let mut g = PolyU::zero(inner_nvars);
    let mut abar = PolyU::zero(inner_nvars);
    let mut bbar = PolyU::zero(inner_nvars);
    let mut unit_gcd = false;

    loop {
        // Fresh images needed to push the modulus past the bound.
        let mut quota = Integer::from(&bound + &modulus);
        quota -= 1u32;
        quota /= &modulus;
        quota += 2u32;
        let needed = (crate::arith::clog(&quota, base.cursor()) as u64).max(1);

        let plan = divide_master_threads(needed, num_threads);
        debug!(images = needed, masters = plan.len(), "split round");

        base.reset_gcd_is_one();
        let accs = run_split(pool, &base, &plan, handles);

        if base.gcd_is_one() {
            debug!("modular gcd is constant, gcd is the common content");
            g = PolyU::one(inner_nvars);
            abar = a.clone();
            bbar = b.clone();
            unit_gcd = true;
            break;
        }

        // Every master must have met its quota; running dry is fatal.
        for (&(required, _), acc) in plan.iter().zip(&accs) {
            if acc.image_count < required as usize {
                bail!("word-prime space exhausted before the modulus covered the bound");
            }
        }

        // Collect the images to join: the running accumulator first, then
        // each master's lift, keeping only those whose leading term ties
        // the lowest seen (lower beats higher; higher means unlucky).
        let mut gs: Vec<PolyU> = Vec::new();
        let mut abars: Vec<PolyU> = Vec::new();
        let mut bbars: Vec<PolyU> = Vec::new();
        let mut moduli: Vec<Integer> = Vec::new();
        if modulus != 1 {
            gs.push(std::mem::replace(&mut g, PolyU::zero(inner_nvars)));
            abars.push(std::mem::replace(&mut abar, PolyU::zero(inner_nvars)));
            bbars.push(std::mem::replace(&mut bbar, PolyU::zero(inner_nvars)));
            moduli.push(modulus.clone());
        }
        for acc in accs {
            if !gs.is_empty() {
                let keep = cmp_leading(
                    gs[0].leading_exp(),
                    gs[0].leading_inner().leading_monomial().expect("canonical"),
                    acc.g.leading_exp(),
                    acc.g.leading_inner().leading_monomial().expect("canonical"),
                );
                match keep {
                    Ordering::Less => continue, // this master was unlucky
                    Ordering::Greater => {
                        // everything kept so far was unlucky
                        gs.clear();
                        abars.clear();
                        bbars.clear();
                        moduli.clear();
                    }
                    Ordering::Equal => {}
                }
            }
            gs.push(acc.g);
            abars.push(acc.abar);
            bbars.push(acc.bbar);
            moduli.push(acc.modulus);
        }

        let prog = CrtProg::compile(&moduli);
        assert!(prog.is_good(), "split produced non-coprime moduli");

        modulus = Integer::from(1u32);
        for m in &moduli {
            modulus *= m;
        }

        let join_base = Arc::new(JoinBase::new(
            prog,
            JoinImages { g: gs, abar: abars, bbar: bbars },
            inner_nvars,
        ));
        let mut jaccs = run_join(pool, handles, &join_base);

        let mut gnm = Integer::new();
        let mut gns = Integer::new();
        let mut anm = Integer::new();
        let mut ans = Integer::new();
        let mut bnm = Integer::new();
        let mut bns = Integer::new();
        for acc in &jaccs {
            gns += &acc.gsum;
            ans += &acc.abarsum;
            bns += &acc.bbarsum;
            if gnm < acc.gmax {
                gnm = acc.gmax.clone();
            }
            if anm < acc.abarmax {
                anm = acc.abarmax.clone();
            }
            if bnm < acc.bbarmax {
                bnm = acc.bbarmax.clone();
            }
        }

        let mut g_parts: Vec<PolyU> =
            jaccs.iter_mut().map(|a| std::mem::replace(&mut a.g, PolyU::zero(inner_nvars))).collect();
        let mut abar_parts: Vec<PolyU> = jaccs
            .iter_mut()
            .map(|a| std::mem::replace(&mut a.abar, PolyU::zero(inner_nvars)))
            .collect();
        let mut bbar_parts: Vec<PolyU> = jaccs
            .iter_mut()
            .map(|a| std::mem::replace(&mut a.bbar, PolyU::zero(inner_nvars)))
            .collect();
        g = final_join(&mut g_parts, inner_nvars);
        abar = final_join(&mut abar_parts, inner_nvars);
        bbar = final_join(&mut bbar_parts, inner_nvars);

        // Divisibility is only worth testing once the modulus clears the
        // heuristic bound.
        if modulus <= bound {
            continue;
        }

        // Rational-reconstruction check: coefficient growth of G·Ā and
        // G·B̄ must fit well inside the modulus on both sides.
        let lhs_a = Integer::from(&ans * &gnm).max(Integer::from(&anm * &gns)) * 2u32;
        let lhs_b = Integer::from(&bns * &gnm).max(Integer::from(&bnm * &gns)) * 2u32;
        if lhs_a < modulus && lhs_b < modulus {
            break;
        }

        debug!("divisibility check failed, widening the bound");
        bound = modulus.clone() << 128u32;
    }

    if !unit_gcd {
        debug_assert_eq!(g.leading_coeff(), Some(&gamma));
        let cont = g.content();
        g.divexact_integer(&cont);
        let lcg = g.leading_coeff().expect("nonzero").clone();
        abar.divexact_integer(&lcg);
        bbar.divexact_integer(&lcg);
    }

    g.mul_integer(&cg);
    abar.mul_integer(&cabar);
    bbar.mul_integer(&cbbar);
    Ok((g, abar, bbar))
}
