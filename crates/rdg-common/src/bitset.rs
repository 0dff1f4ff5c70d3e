// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Word-packed bitset with parallel bulk operations.

use once_cell::sync::Lazy;
use rayon::prelude::*;

const BITS_PER_WORD: usize = 64;

/// Process-wide empty bitset, handed out where an algorithm wants "no bits
/// set" without allocating.
pub static EMPTY_BITSET: Lazy<DynamicBitset> = Lazy::new(DynamicBitset::new);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DynamicBitset {
    words: Vec<u64>,
    num_bits: usize,
}

impl DynamicBitset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(num_bits: usize) -> Self {
        Self {
            words: vec![0; num_bits.div_ceil(BITS_PER_WORD)],
            num_bits,
        }
    }

    pub fn size(&self) -> usize {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Grow or shrink to `num_bits`, preserving existing bits that remain in
    /// range. Stray bits past the new end are cleared so word-level
    /// operations stay exact.
    pub fn resize(&mut self, num_bits: usize) {
        self.words.resize(num_bits.div_ceil(BITS_PER_WORD), 0);
        self.num_bits = num_bits;
        let tail = num_bits % BITS_PER_WORD;
        if tail != 0
            && let Some(last) = self.words.last_mut()
        {
            *last &= (1u64 << tail) - 1;
        }
    }

    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.num_bits);
        self.words[bit / BITS_PER_WORD] |= 1u64 << (bit % BITS_PER_WORD);
    }

    pub fn reset(&mut self, bit: usize) {
        debug_assert!(bit < self.num_bits);
        self.words[bit / BITS_PER_WORD] &= !(1u64 << (bit % BITS_PER_WORD));
    }

    pub fn reset_all(&mut self) {
        self.words.par_iter_mut().for_each(|w| *w = 0);
    }

    pub fn test(&self, bit: usize) -> bool {
        debug_assert!(bit < self.num_bits);
        self.words[bit / BITS_PER_WORD] & (1u64 << (bit % BITS_PER_WORD)) != 0
    }

    pub fn bitwise_or(&mut self, other: &DynamicBitset) {
        debug_assert_eq!(self.num_bits, other.num_bits);
        self.words
            .par_iter_mut()
            .zip(other.words.par_iter())
            .for_each(|(w, o)| *w |= o);
    }

    pub fn bitwise_or_of(&mut self, a: &DynamicBitset, b: &DynamicBitset) {
        debug_assert_eq!(self.num_bits, a.num_bits);
        debug_assert_eq!(self.num_bits, b.num_bits);
        self.words
            .par_iter_mut()
            .zip(a.words.par_iter().zip(b.words.par_iter()))
            .for_each(|(w, (x, y))| *w = x | y);
    }

    pub fn bitwise_and(&mut self, other: &DynamicBitset) {
        debug_assert_eq!(self.num_bits, other.num_bits);
        self.words
            .par_iter_mut()
            .zip(other.words.par_iter())
            .for_each(|(w, o)| *w &= o);
    }

    pub fn bitwise_and_of(&mut self, a: &DynamicBitset, b: &DynamicBitset) {
        debug_assert_eq!(self.num_bits, a.num_bits);
        debug_assert_eq!(self.num_bits, b.num_bits);
        self.words
            .par_iter_mut()
            .zip(a.words.par_iter().zip(b.words.par_iter()))
            .for_each(|(w, (x, y))| *w = x & y);
    }

    pub fn bitwise_xor(&mut self, other: &DynamicBitset) {
        debug_assert_eq!(self.num_bits, other.num_bits);
        self.words
            .par_iter_mut()
            .zip(other.words.par_iter())
            .for_each(|(w, o)| *w ^= o);
    }

    pub fn bitwise_xor_of(&mut self, a: &DynamicBitset, b: &DynamicBitset) {
        debug_assert_eq!(self.num_bits, a.num_bits);
        debug_assert_eq!(self.num_bits, b.num_bits);
        self.words
            .par_iter_mut()
            .zip(a.words.par_iter().zip(b.words.par_iter()))
            .for_each(|(w, (x, y))| *w = x ^ y);
    }

    /// Complement in place. The stray bits of the last word stay clear.
    pub fn bitwise_not(&mut self) {
        self.words.par_iter_mut().for_each(|w| *w = !*w);
        let tail = self.num_bits % BITS_PER_WORD;
        if tail != 0
            && let Some(last) = self.words.last_mut()
        {
            *last &= (1u64 << tail) - 1;
        }
    }

    pub fn count(&self) -> usize {
        self.words
            .par_iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }

    pub fn serial_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Sorted positions of all set bits.
    ///
    /// Three passes: per-block counts, a prefix sum across blocks, then each
    /// block scatters into its slice of the pre-sized output. The result is
    /// stable and strictly ascending.
    pub fn offsets(&self) -> Vec<u64> {
        let num_blocks = rayon::current_num_threads().max(1);
        let block_range = |b: usize| -> (usize, usize) {
            (
                b * self.num_bits / num_blocks,
                (b + 1) * self.num_bits / num_blocks,
            )
        };

        let counts: Vec<usize> = (0..num_blocks)
            .into_par_iter()
            .map(|b| {
                let (start, end) = block_range(b);
                (start..end).filter(|&i| self.test(i)).count()
            })
            .collect();

        let total: usize = counts.iter().sum();
        let mut out = vec![0u64; total];

        // Carve the output into per-block slices so each block writes
        // disjoint memory.
        let mut slices = Vec::with_capacity(num_blocks);
        let mut rest = out.as_mut_slice();
        for &count in &counts {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(count);
            slices.push(head);
            rest = tail;
        }

        slices
            .into_par_iter()
            .enumerate()
            .for_each(|(b, slice)| {
                let (start, end) = block_range(b);
                let mut at = 0;
                for i in start..end {
                    if self.test(i) {
                        slice[at] = i as u64;
                        at += 1;
                    }
                }
            });

        out
    }
}
