//! # Crt — Compile-Once, Run-Many Chinese Remaindering
//!
//! The join stage evaluates the same CRT over thousands of coefficient
//! vectors, so the combination is compiled once into a straight-line
//! program and replayed. The program is a balanced binary tree of pairwise
//! merges flattened into instructions
//!
//! ```text
//! A = B − idem·(B − C)  mod M
//! ```
//!
//! where `idem = m_left·(m_left⁻¹ mod m_right)` and `M = m_left·m_right`.
//! Moduli are sorted by bit length and the tree is balanced on total bit
//! length, which keeps intermediate integers near their minimal width. The
//! result in scratch slot 0 is the balanced representative in (−M/2, M/2].
//!
//! On top of the program sit the two mergers the join workers use:
//! [`crt_poly`] combines K polynomial images coefficient-by-coefficient
//! (absent monomials contribute zero), and [`crt_polyu_exp`] does the same
//! for the inner polynomial at one outer exponent.

use std::cmp::Ordering;

use rug::Integer;

use crate::arith::mods;
use crate::poly::{cmp_monomials, Poly, Term};
use crate::polyu::PolyU;

/// One merge instruction. `b_idx`/`c_idx` at or above zero address scratch;
/// a negative value −k−1 addresses `inputs[k]`.
#[derive(Debug)]
struct CrtInstr {
    a_idx: usize,
    b_idx: i64,
    c_idx: i64,
    idem: Integer,
    modulus: Integer,
}

/// A compiled CRT program. Create with [`CrtProg::compile`], check
/// [`CrtProg::is_good`], then [`CrtProg::run`] any number of times.
#[derive(Debug)]
pub struct CrtProg {
    prog: Vec<CrtInstr>,
    localsize: usize,
    temp1loc: usize,
    temp2loc: usize,
    good: bool,
    n_inputs: usize,
}

/// Compilation state: the instruction tape plus the running scratch-size
/// watermark and the coprimality verdict.
struct Compiler<'a> {
    prog: Vec<CrtInstr>,
    localsize: usize,
    good: bool,
    moduli: &'a [Integer],
    perm: Vec<(usize, u32)>,
}

impl Compiler<'_> {
    /// Combine `perm[start..stop]` (two or more moduli) into one value,
    /// leaving the result in scratch slot `ret_idx`. Returns the index of
    /// the instruction that computes it.
    fn push_prog(&mut self, ret_idx: usize, start: usize, stop: usize) -> Option<usize> {
        debug_assert!(start + 1 < stop);
        let mut mid = start + (stop - start) / 2;

        let mut lefttot: u64 = self.perm[start..mid].iter().map(|&(_, b)| b as u64).sum();
        let mut righttot: u64 = self.perm[mid..stop].iter().map(|&(_, b)| b as u64).sum();

        // Slide the midpoint to balance total bit length on both sides.
        while lefttot < righttot
            && mid + 1 < stop
            && (self.perm[mid].1 as u64) < righttot - lefttot
        {
            lefttot += self.perm[mid].1 as u64;
            righttot -= self.perm[mid].1 as u64;
            mid += 1;
        }

        self.localsize = self.localsize.max(1 + ret_idx);

        let (b_idx, left_modulus) = if start + 1 < mid {
            let idx = self.push_prog(ret_idx + 1, start, mid)?;
            ((ret_idx + 1) as i64, self.prog[idx].modulus.clone())
        } else {
            let k = self.perm[start].0;
            (-1 - k as i64, self.moduli[k].clone())
        };

        let (c_idx, right_modulus) = if mid + 1 < stop {
            let idx = self.push_prog(ret_idx + 2, mid, stop)?;
            ((ret_idx + 2) as i64, self.prog[idx].modulus.clone())
        } else {
            let k = self.perm[mid].0;
            (-1 - k as i64, self.moduli[k].clone())
        };

        if left_modulus == 0 || right_modulus == 0 {
            self.good = false;
            return None;
        }
        let inv = match left_modulus.clone().invert(&right_modulus) {
            Ok(inv) => inv,
            Err(_) => {
                self.good = false;
                return None;
            }
        };
        let idem = Integer::from(&left_modulus * &inv);
        let modulus = Integer::from(&left_modulus * &right_modulus);
        self.prog.push(CrtInstr { a_idx: ret_idx, b_idx, c_idx, idem, modulus });
        Some(self.prog.len() - 1)
    }
}

impl CrtProg {
    /// Compile a program for a non-empty modulus list. The program is
    /// usable only when [`is_good`](CrtProg::is_good) reports true, i.e.
    /// the moduli are nonzero and pairwise coprime.
    pub fn compile(moduli: &[Integer]) -> CrtProg {
        assert!(!moduli.is_empty(), "need at least one modulus");

        let mut perm: Vec<(usize, u32)> = moduli
            .iter()
            .enumerate()
            .map(|(i, m)| (i, m.significant_bits()))
            .collect();
        perm.sort_by_key(|&(_, bits)| bits);

        let mut c = Compiler { prog: Vec::new(), localsize: 1, good: true, moduli, perm };
        if moduli.len() > 1 {
            let _ = c.push_prog(0, 0, moduli.len());
        } else {
            // One modulus: reduce input[0] mod it, via idem = 0.
            c.good = moduli[0] != 0;
            c.prog.push(CrtInstr {
                a_idx: 0,
                b_idx: -1,
                c_idx: -1,
                idem: Integer::new(),
                modulus: moduli[0].clone(),
            });
        }
        if !c.good {
            c.prog.clear();
        }

        let temp1loc = c.localsize;
        let temp2loc = c.localsize + 1;
        CrtProg {
            prog: c.prog,
            localsize: c.localsize + 2,
            temp1loc,
            temp2loc,
            good: c.good,
            n_inputs: moduli.len(),
        }
    }

    /// Scratch length [`run`](CrtProg::run) requires, two reserved
    /// temporary slots included.
    pub fn local_size(&self) -> usize {
        self.localsize
    }

    /// False when compilation found a zero modulus or a missing inverse;
    /// such a program must not be run.
    pub fn is_good(&self) -> bool {
        self.good
    }

    /// Evaluate against one residue vector: afterwards `scratch[0]` holds
    /// the signed integer of smallest absolute value congruent to
    /// `inputs[k]` mod the k-th modulus, for every k.
    ///
    /// # Panics
    /// Panics on a program that is not good, on a short scratch buffer, or
    /// on a residue vector of the wrong length: all three are caller bugs.
    pub fn run(&self, scratch: &mut [Integer], inputs: &[&Integer]) {
        assert!(self.good, "ran a CRT program whose moduli were not coprime");
        assert!(scratch.len() >= self.localsize, "scratch shorter than local_size");
        assert_eq!(inputs.len(), self.n_inputs, "residue count mismatch");
        let _ = (self.temp1loc, self.temp2loc); // reserved by local_size

        for (i, instr) in self.prog.iter().enumerate() {
            let b = if instr.b_idx < 0 {
                inputs[(-instr.b_idx - 1) as usize]
            } else {
                &scratch[instr.b_idx as usize]
            };
            let c = if instr.c_idx < 0 {
                inputs[(-instr.c_idx - 1) as usize]
            } else {
                &scratch[instr.c_idx as usize]
            };
            // A = B − idem·(B − C) mod M
            let mut t = Integer::from(b - c);
            t *= &instr.idem;
            let r = Integer::from(b - &t);
            let value = mods(&r, &instr.modulus);
            scratch[instr.a_idx] = value;
            debug_assert!(i + 1 < self.prog.len() || instr.a_idx == 0);
        }
    }
}

/// Combine K polynomial images into integer coefficients: for every
/// monomial present in any image, CRT the coefficients (zero where absent)
/// and keep the result if nonzero. `amax`/`asum` accumulate the maximum and
/// the sum of the absolute values of the produced coefficients.
pub fn crt_poly(
    prog: &CrtProg,
    amax: &mut Integer,
    asum: &mut Integer,
    images: &[&Poly],
    nvars: usize,
) -> Poly {
    debug_assert_eq!(images.len(), prog.n_inputs);
    let zero = Integer::new();
    let mut scratch: Vec<Integer> = (0..prog.local_size()).map(|_| Integer::new()).collect();
    let mut starts = vec![0usize; images.len()];
    let mut out = Poly::zero(nvars);

    loop {
        // Pick the greatest live monomial as the pivot; a later cursor that
        // beats the current pivot resets the selections made so far.
        let mut sel: Vec<bool> = vec![false; images.len()];
        let Some(mut pivot_k) = (0..images.len()).find(|&k| starts[k] < images[k].terms.len())
        else {
            break;
        };
        sel[pivot_k] = true;
        for k in pivot_k + 1..images.len() {
            if starts[k] >= images[k].terms.len() {
                continue;
            }
            match cmp_monomials(
                &images[k].terms[starts[k]].exps,
                &images[pivot_k].terms[starts[pivot_k]].exps,
            ) {
                Ordering::Equal => sel[k] = true,
                Ordering::Greater => {
                    for s in sel.iter_mut() {
                        *s = false;
                    }
                    pivot_k = k;
                    sel[k] = true;
                }
                Ordering::Less => {}
            }
        }

        let inputs: Vec<&Integer> = (0..images.len())
            .map(|k| {
                if sel[k] {
                    &images[k].terms[starts[k]].coeff
                } else {
                    &zero
                }
            })
            .collect();
        prog.run(&mut scratch, &inputs);
        let coeff = std::mem::take(&mut scratch[0]);

        if coeff.is_positive() {
            *asum += &coeff;
        } else {
            *asum -= &coeff;
        }
        if amax.cmp_abs(&coeff) == Ordering::Less {
            *amax = Integer::from(coeff.abs_ref());
        }

        let exps = images[pivot_k].terms[starts[pivot_k]].exps.clone();
        for (k, taken) in sel.iter().enumerate() {
            if *taken {
                starts[k] += 1;
            }
        }
        if coeff != 0 {
            out.terms.push(Term { exps, coeff });
        }
    }
    debug_assert!(out.is_canonical());
    out
}

/// Append to `out` the CRT of the coefficient of X^`exp` across the image
/// list (images without that exponent contribute the zero polynomial).
/// Propagates the max/sum tallies of [`crt_poly`].
pub fn crt_polyu_exp(
    prog: &CrtProg,
    amax: &mut Integer,
    asum: &mut Integer,
    out: &mut PolyU,
    exp: u64,
    images: &[&PolyU],
) {
    let zero = Poly::zero(out.inner_nvars);
    let inner: Vec<&Poly> = images
        .iter()
        .map(|u| {
            u.terms
                .iter()
                .find(|(e, _)| *e == exp)
                .map(|(_, p)| p)
                .unwrap_or(&zero)
        })
        .collect();
    let merged = crt_poly(prog, amax, asum, &inner, out.inner_nvars);
    if !merged.is_zero() {
        debug_assert!(out.terms.last().map(|(e, _)| *e > exp).unwrap_or(true));
        out.terms.push((exp, merged));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(vals: &[i64]) -> Vec<Integer> {
        vals.iter().map(|&v| Integer::from(v)).collect()
    }

    fn run_once(moduli: &[Integer], residues: &[i64]) -> Integer {
        let prog = CrtProg::compile(moduli);
        assert!(prog.is_good());
        let res = ints(residues);
        let inputs: Vec<&Integer> = res.iter().collect();
        let mut scratch: Vec<Integer> =
            (0..prog.local_size()).map(|_| Integer::new()).collect();
        prog.run(&mut scratch, &inputs);
        std::mem::take(&mut scratch[0])
    }

    /// x ≡ 2 (3), x ≡ 3 (5), x ≡ 2 (7) has the classic solution 23.
    #[test]
    fn sunzi_example() {
        assert_eq!(run_once(&ints(&[3, 5, 7]), &[2, 3, 2]), 23);
    }

    /// The result is the balanced representative: for x ≡ 4 (5), x ≡ 6 (7)
    /// the answer is −1, not 34.
    #[test]
    fn result_is_balanced() {
        assert_eq!(run_once(&ints(&[5, 7]), &[4, 6]), -1);
    }

    /// A single modulus reduces the lone input, balanced.
    #[test]
    fn single_modulus_reduces() {
        assert_eq!(run_once(&ints(&[7]), &[23]), 2);
        assert_eq!(run_once(&ints(&[7]), &[-23]), -2);
        assert_eq!(run_once(&ints(&[10]), &[15]), 5);
    }

    /// Congruence must hold for every modulus, across mixed bit lengths
    /// that force the balancing slide to move the midpoint.
    #[test]
    fn congruences_hold_for_mixed_widths() {
        let moduli = ints(&[3, 5, 7, 11, 65537, 1_000_003, 13]);
        let residues: Vec<i64> = vec![1, 2, 3, 4, 12345, 999_999, 6];
        let x = run_once(&moduli, &residues);
        let mut total = Integer::from(1u32);
        for m in &moduli {
            total *= m;
        }
        for (m, r) in moduli.iter().zip(&residues) {
            assert_eq!(mods(&Integer::from(&x - *r), m), 0, "x !≡ {r} mod {m}");
        }
        assert!(Integer::from(x.abs_ref()) * 2u32 <= total);
    }

    /// Shared factors between moduli must be reported through `good`, and
    /// a zero modulus likewise.
    #[test]
    fn non_coprime_or_zero_moduli_are_rejected() {
        assert!(!CrtProg::compile(&ints(&[6, 10])).is_good());
        assert!(!CrtProg::compile(&ints(&[5, 0])).is_good());
        assert!(!CrtProg::compile(&ints(&[0])).is_good());
        assert!(CrtProg::compile(&ints(&[6, 35])).is_good());
    }

    #[test]
    #[should_panic(expected = "not coprime")]
    fn running_a_bad_program_panics() {
        let prog = CrtProg::compile(&ints(&[6, 10]));
        let res = ints(&[1, 1]);
        let inputs: Vec<&Integer> = res.iter().collect();
        let mut scratch: Vec<Integer> =
            (0..prog.local_size()).map(|_| Integer::new()).collect();
        prog.run(&mut scratch, &inputs);
    }

    /// Compiling the same moduli in forward and reverse order must give
    /// identical answers on every residue vector.
    #[test]
    fn order_of_moduli_is_irrelevant() {
        let fwd = ints(&[3, 5, 7, 11, 13]);
        let mut rev = fwd.clone();
        rev.reverse();
        for seed in 0..50i64 {
            let residues: Vec<i64> = (0..5).map(|k| (seed * 17 + k * 29) % 100 - 50).collect();
            let residues_rev: Vec<i64> = residues.iter().rev().copied().collect();
            assert_eq!(
                run_once(&fwd, &residues),
                run_once(&rev, &residues_rev),
                "seed {seed}"
            );
        }
    }

    fn poly_of(nvars: usize, terms: &[(i64, &[u32])]) -> Poly {
        Poly::from_terms(
            nvars,
            terms.iter().map(|&(c, e)| (Integer::from(c), e.to_vec())).collect(),
        )
    }

    /// Merging images with disjoint and overlapping monomials: absent
    /// monomials CRT against zero, and the tallies cover every produced
    /// coefficient.
    #[test]
    fn crt_poly_merges_images() {
        let truth = poly_of(1, &[(40, &[2]), (-33, &[1]), (7, &[0])]);
        let moduli = ints(&[101, 103]);
        // Image k: truth mod m_k, with coefficients in [0, m).
        let images: Vec<Poly> = [101i64, 103]
            .iter()
            .map(|&m| {
                Poly::from_terms(
                    1,
                    truth
                        .terms
                        .iter()
                        .map(|t| {
                            let c = Integer::from(&t.coeff % m);
                            let c = if c < 0 { c + m } else { c };
                            (c, t.exps.clone())
                        })
                        .collect(),
                )
            })
            .collect();
        let prog = CrtProg::compile(&moduli);
        let refs: Vec<&Poly> = images.iter().collect();
        let mut amax = Integer::new();
        let mut asum = Integer::new();
        let merged = crt_poly(&prog, &mut amax, &mut asum, &refs, 1);
        assert_eq!(merged, truth);
        assert_eq!(amax, 40);
        assert_eq!(asum, 40 + 33 + 7);
    }

    /// A monomial that only one image carries still merges, against zero on
    /// the other side, and in both directions of the cursor order.
    #[test]
    fn crt_poly_handles_absent_monomials() {
        let a_img = poly_of(1, &[(5, &[3])]);
        let b_img = poly_of(1, &[(7, &[1])]);
        let prog = CrtProg::compile(&ints(&[101, 103]));
        let mut amax = Integer::new();
        let mut asum = Integer::new();
        let merged = crt_poly(&prog, &mut amax, &mut asum, &[&a_img, &b_img], 1);
        assert_eq!(merged.terms.len(), 2);
        assert_eq!(merged.terms[0].exps, vec![3]);
        assert_eq!(merged.terms[1].exps, vec![1]);
        // x ≡ 5 (101), 0 (103) and x ≡ 0 (101), 7 (103).
        assert_eq!(crate::arith::rem_u64(&merged.terms[0].coeff, 101), 5);
        assert_eq!(crate::arith::rem_u64(&merged.terms[0].coeff, 103), 0);
        assert_eq!(crate::arith::rem_u64(&merged.terms[1].coeff, 101), 0);
        assert_eq!(crate::arith::rem_u64(&merged.terms[1].coeff, 103), 7);
    }

    /// The exponent-level merger picks the right inner polynomial per image
    /// and appends nothing when the combination vanishes.
    #[test]
    fn crt_polyu_exp_selects_by_exponent() {
        use crate::polyu::PolyU;
        let u1 = PolyU::from_poly(&poly_of(2, &[(3, &[2, 1]), (4, &[0, 0])]));
        let u2 = PolyU::from_poly(&poly_of(2, &[(3, &[2, 1]), (4, &[0, 0])]));
        let prog = CrtProg::compile(&ints(&[101, 103]));
        let mut amax = Integer::new();
        let mut asum = Integer::new();
        let mut out = PolyU::zero(1);
        crt_polyu_exp(&prog, &mut amax, &mut asum, &mut out, 2, &[&u1, &u2]);
        crt_polyu_exp(&prog, &mut amax, &mut asum, &mut out, 1, &[&u1, &u2]);
        crt_polyu_exp(&prog, &mut amax, &mut asum, &mut out, 0, &[&u1, &u2]);
        assert_eq!(out.terms.len(), 2);
        assert_eq!(out.terms[0].0, 2);
        assert_eq!(out.terms[0].1, poly_of(1, &[(3, &[1])]));
        assert_eq!(out.terms[1].0, 0);
        assert_eq!(out.terms[1].1, poly_of(1, &[(4, &[0])]));
        assert_eq!(amax, 4);
        assert_eq!(asum, 7);
    }
}
