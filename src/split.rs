//! # Split — Parallel Modular Images Across Primes
//!
//! The split stage turns the integer problem into many word-prime problems:
//! masters pull fresh primes from a shared cursor, reduce A and B, run the
//! modular GCD kernel, and fold each accepted image into their private
//! partial CRT lift of (G, Ā, B̄). A master keeps going until it has the
//! image quota the orchestrator assigned or the prime space runs dry.
//!
//! Per-prime recovery is local and silent: a prime dividing γ is skipped, a
//! kernel refusal is skipped, an image with a worse leading term than the
//! accumulated lift is skipped, and an image with a better leading term
//! discards the accumulation (everything folded so far came from unlucky
//! primes). A constant image proves gcd = 1 and raises the shared monotone
//! flag that stops every master.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use rug::Integer;
use tracing::trace;

use crate::arith::{next_prime, rem_u64};
use crate::gcd_zp::{gcd_at_prime, gcd_at_prime_threaded};
use crate::modp::{crt_fold_polyu, lift_polyu, reduce_polyu, PolyUZp};
use crate::polyu::{cmp_leading, PolyU};
use crate::pool::{Handle, ThreadPool};

/// Where the split workers get their primes. Production uses the word
/// primes above the cursor; tests inject sequences to provoke the γ-divider
/// and unlucky-prime paths.
pub trait PrimeSource: Send + Sync {
    /// The next usable prime strictly above `n`, or `None` when the range
    /// is exhausted.
    fn next_after(&self, n: u64) -> Option<u64>;
}

/// Word-sized primes walked upward from the shared cursor.
pub struct WordPrimes;

impl PrimeSource for WordPrimes {
    fn next_after(&self, n: u64) -> Option<u64> {
        next_prime(n)
    }
}

/// State shared by every split master: the inputs (read-only once
/// published), the mutex-guarded prime cursor, and the monotone gcd-is-one
/// flag.
pub struct SplitBase {
    pub a: PolyU,
    pub b: PolyU,
    pub gamma: Integer,
    cursor: Mutex<u64>,
    gcd_is_one: AtomicBool,
    primes: Box<dyn PrimeSource>,
}

impl SplitBase {
    pub fn new(a: PolyU, b: PolyU, gamma: Integer, start: u64, primes: Box<dyn PrimeSource>) -> Self {
        SplitBase {
            a,
            b,
            gamma,
            cursor: Mutex::new(start),
            gcd_is_one: AtomicBool::new(false),
            primes,
        }
    }

    /// Current cursor position (the last prime handed out, or the start).
    pub fn cursor(&self) -> u64 {
        *self.cursor.lock().unwrap()
    }

    pub fn gcd_is_one(&self) -> bool {
        self.gcd_is_one.load(AtomicOrdering::Relaxed)
    }

    /// Re-arm the flag before another split round.
    pub fn reset_gcd_is_one(&self) {
        self.gcd_is_one.store(false, AtomicOrdering::Relaxed)
    }

    /// Advance the cursor under the mutex. The successor is computed first
    /// and only a successful result is published, so the cursor never
    /// silently overshoots the prime range.
    fn take_prime(&self) -> Option<u64> {
        let mut cur = self.cursor.lock().unwrap();
        let p = self.primes.next_after(*cur)?;
        *cur = p;
        Some(p)
    }
}

/// One master's partial CRT lift. `modulus == 1` means no image yet.
pub struct SplitAccum {
    pub g: PolyU,
    pub abar: PolyU,
    pub bbar: PolyU,
    pub modulus: Integer,
    pub image_count: usize,
}

impl SplitAccum {
    fn empty(inner_nvars: usize) -> Self {
        SplitAccum {
            g: PolyU::zero(inner_nvars),
            abar: PolyU::zero(inner_nvars),
            bbar: PolyU::zero(inner_nvars),
            modulus: Integer::from(1u32),
            image_count: 0,
        }
    }
}

/// Compare an accumulated lift's leading term against a fresh image's.
/// `Greater` means the accumulation is structurally above the image, i.e.
/// every prime folded so far was unlucky.
fn cmp_accum_vs_image(acc_g: &PolyU, gp: &PolyUZp) -> std::cmp::Ordering {
    cmp_leading(
        acc_g.leading_exp(),
        acc_g.leading_inner().leading_monomial().expect("canonical"),
        gp.leading_exp(),
        gp.leading_inner().leading_monomial().expect("canonical"),
    )
}

/// The master loop: collect `required_images` images into a private lift.
/// `inner` names the pool workers lent to the modular GCD kernel; an empty
/// slice runs the kernel serially.
pub fn split_worker(
    base: &SplitBase,
    required_images: usize,
    pool: &ThreadPool,
    inner: &[Handle],
) -> SplitAccum {
    let mut acc = SplitAccum::empty(base.a.inner_nvars);

    while acc.image_count < required_images {
        let Some(p) = base.take_prime() else {
            break;
        };

        // The reduction must kill neither leading coefficient.
        let gammared = rem_u64(&base.gamma, p);
        if gammared == 0 {
            trace!(p, "prime divides gamma, skipped");
            continue;
        }

        let ap = reduce_polyu(&base.a, p);
        let bp = reduce_polyu(&base.b, p);
        debug_assert!(!ap.is_zero() && !bp.is_zero());

        let image = if inner.is_empty() {
            gcd_at_prime(&ap, &bp)
        } else {
            gcd_at_prime_threaded(&ap, &bp, pool, inner)
        };
        let Some((mut gp, abarp, bbarp)) = image else {
            trace!(p, "modular gcd failed, prime skipped");
            continue;
        };

        if base.gcd_is_one() {
            break;
        }
        if gp.is_nonzero_constant() {
            base.gcd_is_one.store(true, AtomicOrdering::Relaxed);
            break;
        }

        if acc.modulus != 1 {
            match cmp_accum_vs_image(&acc.g, &gp) {
                std::cmp::Ordering::Less => {
                    trace!(p, "unlucky prime, image discarded");
                    continue;
                }
                std::cmp::Ordering::Greater => {
                    trace!(p, "image beats accumulation, lift restarted");
                    acc.modulus = Integer::from(1u32);
                    acc.image_count = 0;
                }
                std::cmp::Ordering::Equal => {}
            }
        }

        debug_assert_eq!(gp.leading_coeff(), Some(1));
        gp.scalar_mul(gammared);

        if acc.modulus != 1 {
            acc.g = crt_fold_polyu(&acc.g, &acc.modulus, &gp);
            acc.abar = crt_fold_polyu(&acc.abar, &acc.modulus, &abarp);
            acc.bbar = crt_fold_polyu(&acc.bbar, &acc.modulus, &bbarp);
        } else {
            acc.g = lift_polyu(&gp);
            acc.abar = lift_polyu(&abarp);
            acc.bbar = lift_polyu(&bbarp);
        }
        acc.modulus *= p;
        acc.image_count += 1;
    }
    acc
}

/// Launch one split round: master i of the plan computes `plan[i].0` images
/// with `plan[i].1 − 1` inner workers. Master 0 runs on the calling thread;
/// the remaining masters and all inner workers come from `handles`, laid
/// out master-handle first, then that master's inner workers.
pub fn run_split(
    pool: &Arc<ThreadPool>,
    base: &Arc<SplitBase>,
    plan: &[(u64, u64)],
    handles: &[Handle],
) -> Vec<SplitAccum> {
    debug_assert_eq!(
        plan.iter().map(|&(_, b)| b as usize).sum::<usize>(),
        handles.len() + 1,
        "plan does not match the thread budget"
    );

    let mut k = 0usize;
    let mut master_handles = Vec::with_capacity(plan.len());
    let mut inner_handles = Vec::with_capacity(plan.len());
    for (i, &(_, b)) in plan.iter().enumerate() {
        let master = if i == 0 {
            None
        } else {
            let h = handles[k];
            k += 1;
            Some(h)
        };
        let inner: Vec<Handle> = handles[k..k + (b as usize - 1)].to_vec();
        k += b as usize - 1;
        master_handles.push(master);
        inner_handles.push(inner);
    }
    debug_assert_eq!(k, handles.len());

    let slots: Vec<Arc<Mutex<Option<SplitAccum>>>> =
        plan.iter().map(|_| Arc::new(Mutex::new(None))).collect();

    for (i, &(required, _)) in plan.iter().enumerate().skip(1) {
        let base = Arc::clone(base);
        let pool_for_job = Arc::clone(pool);
        let inner = inner_handles[i].clone();
        let slot = Arc::clone(&slots[i]);
        pool.wake(master_handles[i].expect("non-caller master"), move || {
            let acc = split_worker(&base, required as usize, &pool_for_job, &inner);
            *slot.lock().unwrap() = Some(acc);
        });
    }

    let acc0 = split_worker(base, plan[0].0 as usize, pool, &inner_handles[0]);
    *slots[0].lock().unwrap() = Some(acc0);

    for h in master_handles.into_iter().flatten() {
        pool.wait(h);
    }

    slots
        .into_iter()
        .map(|s| s.lock().unwrap().take().expect("master finished"))
        .collect()
}
