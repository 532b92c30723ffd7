//! # Join — Parallel CRT Lift of the Surviving Images
//!
//! Once the split round is over, the surviving partial lifts all describe
//! the same three polynomials at coprime moduli. The join stage compiles
//! one CRT program over those moduli and lets workers pull outer exponents
//! off three shared countdown cursors — G first, then Ā, then B̄ — merging
//! each exponent's coefficients into a private output. Exponents are handed
//! to exactly one worker, so the private outputs partition the terms and
//! the final assembly is a trivial greatest-head merge.
//!
//! Each worker also tallies the maximum and the sum of the absolute
//! coefficients it produced; the orchestrator folds the tallies into the
//! rational-reconstruction divisibility check.

use std::sync::{Arc, Mutex};

use rug::Integer;

use crate::crt::{crt_polyu_exp, CrtProg};
use crate::polyu::PolyU;
use crate::pool::{Handle, ThreadPool};

/// The image triples being joined, one entry per surviving modulus, in the
/// same order as the moduli the program was compiled over.
pub struct JoinImages {
    pub g: Vec<PolyU>,
    pub abar: Vec<PolyU>,
    pub bbar: Vec<PolyU>,
}

struct Cursors {
    g_exp: i64,
    abar_exp: i64,
    bbar_exp: i64,
}

/// Shared state of one join round.
pub struct JoinBase {
    prog: CrtProg,
    images: JoinImages,
    inner_nvars: usize,
    cursors: Mutex<Cursors>,
}

/// One worker's private outputs and tallies.
pub struct JoinAccum {
    pub g: PolyU,
    pub abar: PolyU,
    pub bbar: PolyU,
    pub gmax: Integer,
    pub gsum: Integer,
    pub abarmax: Integer,
    pub abarsum: Integer,
    pub bbarmax: Integer,
    pub bbarsum: Integer,
}

impl JoinBase {
    /// Cursors start at the first image's leading exponents and count down.
    pub fn new(prog: CrtProg, images: JoinImages, inner_nvars: usize) -> Self {
        let cursors = Cursors {
            g_exp: images.g[0].leading_exp() as i64,
            abar_exp: images.abar[0].leading_exp() as i64,
            bbar_exp: images.bbar[0].leading_exp() as i64,
        };
        JoinBase { prog, images, inner_nvars, cursors: Mutex::new(cursors) }
    }
}

fn join_worker(base: &JoinBase) -> JoinAccum {
    let mut acc = JoinAccum {
        g: PolyU::zero(base.inner_nvars),
        abar: PolyU::zero(base.inner_nvars),
        bbar: PolyU::zero(base.inner_nvars),
        gmax: Integer::new(),
        gsum: Integer::new(),
        abarmax: Integer::new(),
        abarsum: Integer::new(),
        bbarmax: Integer::new(),
        bbarsum: Integer::new(),
    };
    let g_refs: Vec<&PolyU> = base.images.g.iter().collect();
    let abar_refs: Vec<&PolyU> = base.images.abar.iter().collect();
    let bbar_refs: Vec<&PolyU> = base.images.bbar.iter().collect();

    loop {
        // Claim one exponent under the mutex, G before Ā before B̄.
        let (g_exp, abar_exp, bbar_exp) = {
            let mut cur = base.cursors.lock().unwrap();
            let claimed = (cur.g_exp, cur.abar_exp, cur.bbar_exp);
            if cur.g_exp >= 0 {
                cur.g_exp -= 1;
            } else if cur.abar_exp >= 0 {
                cur.abar_exp -= 1;
            } else if cur.bbar_exp >= 0 {
                cur.bbar_exp -= 1;
            }
            claimed
        };

        if g_exp >= 0 {
            crt_polyu_exp(
                &base.prog,
                &mut acc.gmax,
                &mut acc.gsum,
                &mut acc.g,
                g_exp as u64,
                &g_refs,
            );
        } else if abar_exp >= 0 {
            crt_polyu_exp(
                &base.prog,
                &mut acc.abarmax,
                &mut acc.abarsum,
                &mut acc.abar,
                abar_exp as u64,
                &abar_refs,
            );
        } else if bbar_exp >= 0 {
            crt_polyu_exp(
                &base.prog,
                &mut acc.bbarmax,
                &mut acc.bbarsum,
                &mut acc.bbar,
                bbar_exp as u64,
                &bbar_refs,
            );
        } else {
            return acc;
        }
    }
}

/// Run one join round over the caller plus every handle. Returns the
/// per-worker accumulators in worker order.
pub fn run_join(pool: &ThreadPool, handles: &[Handle], base: &Arc<JoinBase>) -> Vec<JoinAccum> {
    let slots: Vec<Arc<Mutex<Option<JoinAccum>>>> =
        (0..handles.len()).map(|_| Arc::new(Mutex::new(None))).collect();

    for (h, slot) in handles.iter().zip(&slots) {
        let base = Arc::clone(base);
        let slot = Arc::clone(slot);
        pool.wake(*h, move || {
            *slot.lock().unwrap() = Some(join_worker(&base));
        });
    }
    let own = join_worker(base);
    for h in handles {
        pool.wait(*h);
    }

    let mut accs: Vec<JoinAccum> = slots
        .into_iter()
        .map(|s| s.lock().unwrap().take().expect("join worker finished"))
        .collect();
    accs.push(own);
    accs
}

/// Concatenate per-worker outputs covering disjoint exponent sets: move the
/// greatest head across until every part is empty. The parts are consumed.
pub fn final_join(parts: &mut [PolyU], inner_nvars: usize) -> PolyU {
    let mut starts = vec![0usize; parts.len()];
    let total: usize = parts.iter().map(|p| p.terms.len()).sum();
    let mut out = PolyU::zero(inner_nvars);
    out.terms.reserve(total);
    loop {
        let mut best: Option<(usize, u64)> = None;
        for (i, part) in parts.iter().enumerate() {
            if let Some(&(e, _)) = part.terms.get(starts[i]) {
                if best.map(|(_, be)| e > be).unwrap_or(true) {
                    best = Some((i, e));
                }
            }
        }
        let Some((i, e)) = best else {
            break;
        };
        let inner = std::mem::replace(
            &mut parts[i].terms[starts[i]].1,
            crate::poly::Poly::zero(inner_nvars),
        );
        starts[i] += 1;
        out.terms.push((e, inner));
    }
    debug_assert_eq!(out.terms.len(), total);
    debug_assert!(out.is_canonical());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modp::{lift_polyu, reduce_polyu};
    use crate::poly::Poly;

    fn upoly(coeffs: &[(i64, u32)]) -> PolyU {
        let p = Poly::from_terms(
            1,
            coeffs.iter().map(|&(c, e)| (Integer::from(c), vec![e])).collect(),
        );
        PolyU::from_poly(&p)
    }

    fn images_of(truth: &PolyU, primes: &[u64]) -> Vec<PolyU> {
        primes.iter().map(|&p| lift_polyu(&reduce_polyu(truth, p))).collect()
    }

    /// Joining single-prime lifts of the same polynomials reconstructs
    /// them exactly once the product modulus covers the coefficients.
    #[test]
    fn join_reconstructs_truth() {
        let g = upoly(&[(3, 4), (-40, 1), (7, 0)]);
        let abar = upoly(&[(11, 2), (5, 0)]);
        let bbar = upoly(&[(-9, 3), (2, 2), (1, 0)]);
        let primes = [1009u64, 1013, 1019];
        let moduli: Vec<Integer> = primes.iter().map(|&p| Integer::from(p)).collect();
        let prog = CrtProg::compile(&moduli);
        let images = JoinImages {
            g: images_of(&g, &primes),
            abar: images_of(&abar, &primes),
            bbar: images_of(&bbar, &primes),
        };
        let base = Arc::new(JoinBase::new(prog, images, 0));
        let pool = ThreadPool::new(2);
        let handles = pool.request(2);
        let mut accs = run_join(&pool, &handles, &base);
        for h in handles {
            pool.give_back(h);
        }

        let mut g_parts: Vec<PolyU> = accs.iter_mut().map(|a| std::mem::replace(&mut a.g, PolyU::zero(0))).collect();
        let mut abar_parts: Vec<PolyU> =
            accs.iter_mut().map(|a| std::mem::replace(&mut a.abar, PolyU::zero(0))).collect();
        let mut bbar_parts: Vec<PolyU> =
            accs.iter_mut().map(|a| std::mem::replace(&mut a.bbar, PolyU::zero(0))).collect();
        assert_eq!(final_join(&mut g_parts, 0), g);
        assert_eq!(final_join(&mut abar_parts, 0), abar);
        assert_eq!(final_join(&mut bbar_parts, 0), bbar);

        // Tallies add up across workers to the scan of the results.
        let gsum: Integer = accs.iter().fold(Integer::new(), |acc, a| acc + &a.gsum);
        assert_eq!(gsum, 3 + 40 + 7);
        let gmax = accs.iter().fold(Integer::new(), |acc, a| acc.max(a.gmax.clone()));
        assert_eq!(gmax, 40);
    }

    /// Every exponent goes to exactly one worker: the private outputs are
    /// disjoint and their union covers each exponent once.
    #[test]
    fn exponents_partition_across_workers() {
        let g = upoly(&[(1, 5), (1, 4), (1, 3), (1, 2), (1, 1), (1, 0)]);
        let primes = [1009u64, 1013];
        let moduli: Vec<Integer> = primes.iter().map(|&p| Integer::from(p)).collect();
        let images = JoinImages {
            g: images_of(&g, &primes),
            abar: images_of(&g, &primes),
            bbar: images_of(&g, &primes),
        };
        let base = Arc::new(JoinBase::new(CrtProg::compile(&moduli), images, 0));
        let pool = ThreadPool::new(3);
        let handles = pool.request(3);
        let accs = run_join(&pool, &handles, &base);
        for h in handles {
            pool.give_back(h);
        }
        let mut seen: Vec<u64> = accs.iter().flat_map(|a| a.g.terms.iter().map(|(e, _)| *e)).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    /// final_join on parts with interleaved exponents produces one strictly
    /// decreasing sequence.
    #[test]
    fn final_join_merges_interleaved_parts() {
        let mut parts = vec![upoly(&[(1, 5), (1, 2)]), upoly(&[(1, 4), (1, 1)]), upoly(&[(1, 3)])];
        let joined = final_join(&mut parts, 0);
        let exps: Vec<u64> = joined.terms.iter().map(|(e, _)| *e).collect();
        assert_eq!(exps, vec![5, 4, 3, 2, 1]);
    }
}
