//! Seeded randomness — the single source of non-determinism.
//!
//! Every random decision in the tester routes through [`RngSource`]: action
//! selection, operand picks, literal and symbol generation.  A run is fully
//! determined by its 32-bit seed, and with per-action re-seeding enabled
//! each traced action is independently reproducible from its `set-seed`
//! line.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// The five SMT-LIB rounding-mode constants.
pub const RM_VALUES: [&str; 5] = ["RNE", "RNA", "RTP", "RTN", "RTZ"];

/// Seeded pseudo-random source with the sampling primitives the actions
/// need.
pub struct RngSource {
    rng: ChaCha8Rng,
    seed: u32,
}

impl RngSource {
    pub fn new(seed: u32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed as u64),
            seed,
        }
    }

    /// The seed this source was (re-)seeded with.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Restart the stream from a new seed.
    pub fn reseed(&mut self, seed: u32) {
        *self = Self::new(seed);
    }

    /// Draw a fresh seed for a child stream (or the next re-seed).
    pub fn derive_seed(&mut self) -> u32 {
        self.rng.gen()
    }

    pub fn next_u32(&mut self) -> u32 {
        self.rng.gen()
    }

    pub fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Uniform in `[lo, hi]`, inclusive on both ends.
    pub fn range_u32(&mut self, lo: u32, hi: u32) -> u32 {
        debug_assert!(lo <= hi);
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform in `[lo, hi]`, inclusive on both ends.
    pub fn range_usize(&mut self, lo: usize, hi: usize) -> usize {
        debug_assert!(lo <= hi);
        self.rng.gen_range(lo..=hi)
    }

    /// Fair coin.
    pub fn flip(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// True with probability `percent`/100.
    pub fn with_prob(&mut self, percent: u32) -> bool {
        debug_assert!(percent <= 100);
        self.rng.gen_range(0..100) < percent
    }

    /// Index into `weights`, picked proportionally to the weights.
    ///
    /// Requires a non-empty slice with at least one non-zero weight.
    pub fn pick_weighted(&mut self, weights: &[u32]) -> usize {
        let total: u64 = weights.iter().map(|w| *w as u64).sum();
        debug_assert!(total > 0, "pick_weighted over zero total weight");
        let mut roll = self.rng.gen_range(0..total);
        for (i, w) in weights.iter().enumerate() {
            let w = *w as u64;
            if roll < w {
                return i;
            }
            roll -= w;
        }
        weights.len() - 1
    }

    /// `k` distinct indices out of `0..n`, in random order.
    pub fn sample(&mut self, n: usize, k: usize) -> Vec<usize> {
        debug_assert!(k <= n);
        let mut indices: Vec<usize> = (0..n).collect();
        for i in 0..k {
            let j = self.rng.gen_range(i..n);
            indices.swap(i, j);
        }
        indices.truncate(k);
        indices
    }

    /// A random element of a non-empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        debug_assert!(!items.is_empty());
        &items[self.rng.gen_range(0..items.len())]
    }

    /// A random key of a non-empty map.
    pub fn pick_key<'a, K, V>(&mut self, map: &'a HashMap<K, V>) -> &'a K {
        debug_assert!(!map.is_empty());
        let idx = self.rng.gen_range(0..map.len());
        map.keys().nth(idx).expect("index in range")
    }

    /// A bit-vector width in `[1, max]`, biased toward powers of two and
    /// small widths.
    pub fn bv_width(&mut self, max: u32) -> u32 {
        debug_assert!(max >= 1);
        if self.flip() {
            let powers: Vec<u32> = (0..8).map(|i| 1u32 << i).filter(|w| *w <= max).collect();
            *self.pick(&powers)
        } else if self.with_prob(50) {
            self.range_u32(1, max.min(8))
        } else {
            self.range_u32(1, max)
        }
    }

    /// A random u128 restricted to `width` bits.
    fn bits(&mut self, width: u32) -> u128 {
        debug_assert!((1..=128).contains(&width));
        let raw = ((self.next_u64() as u128) << 64) | self.next_u64() as u128;
        if width == 128 {
            raw
        } else {
            raw & ((1u128 << width) - 1)
        }
    }

    /// A bit-vector literal of `width` bits, randomly in binary, hex (when
    /// the width allows it) or decimal form.
    pub fn bv_literal(&mut self, width: u32) -> String {
        let value = self.bits(width);
        match self.range_u32(0, 2) {
            0 => {
                let mut text = String::with_capacity(width as usize + 2);
                text.push_str("#b");
                for i in (0..width).rev() {
                    text.push(if (value >> i) & 1 == 1 { '1' } else { '0' });
                }
                text
            }
            1 if width % 4 == 0 => {
                format!("#x{:0fill$x}", value, fill = (width / 4) as usize)
            }
            _ => format!("(_ bv{} {})", value, width),
        }
    }

    /// A decimal integer literal, biased toward small magnitudes.
    pub fn int_literal(&mut self) -> String {
        let magnitude: u64 = if self.with_prob(70) {
            self.range_u32(0, 9) as u64
        } else if self.with_prob(80) {
            self.range_u32(0, u32::MAX) as u64
        } else {
            self.next_u64()
        };
        if magnitude != 0 && self.with_prob(25) {
            format!("-{}", magnitude)
        } else {
            magnitude.to_string()
        }
    }

    /// A real literal: decimal (`a.b`) or rational (`a/b`).
    pub fn real_literal(&mut self) -> String {
        if self.flip() {
            format!("{}.{}", self.range_u32(0, 999), self.range_u32(0, 999))
        } else {
            format!(
                "{}/{}",
                self.range_u32(0, 9999),
                self.range_u32(1, 9999)
            )
        }
    }

    /// One of the five rounding-mode constants.
    pub fn rm_literal(&mut self) -> &'static str {
        RM_VALUES[self.range_usize(0, RM_VALUES.len() - 1)]
    }

    /// A string-literal body of up to `max_len` characters, escape-safe for
    /// both trace quoting and SMT-LIB printing.
    pub fn string_literal(&mut self, max_len: usize) -> String {
        let len = self.range_usize(0, max_len);
        (0..len).map(|_| self.string_char()).collect()
    }

    /// A single safe character, mostly printable ASCII with occasional
    /// non-ASCII code points.
    pub fn string_char(&mut self) -> char {
        if self.with_prob(90) {
            // Printable ASCII minus the characters with quoting meaning.
            loop {
                let c = self.range_u32(0x20, 0x7e) as u8 as char;
                if c != '"' && c != '\\' && c != '|' {
                    return c;
                }
            }
        } else {
            char::from_u32(self.range_u32(0xa1, 0x2ff)).unwrap_or('?')
        }
    }
}
