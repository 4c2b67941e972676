// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Demo workloads.
//!
//! Two comparison sets: three arithmetic loops of different cost, and a
//! buffer-filling baseline with one correct and one broken rewrite.

use std::hint::black_box;

/// Output buffer size for the fill workloads.
pub const BUFFER_LEN: usize = 4096;

/// Sum of the first 1000 integers, one dependent add at a time.
pub fn sum_loop() -> i32 {
    let mut sum = 0i32;
    for i in 0..1000 {
        sum = black_box(sum + i);
    }
    sum
}

/// Half-step float accumulation over 500 values.
pub fn float_loop() -> f64 {
    let mut result = 0.0f64;
    for i in 0..500 {
        result = black_box(result + f64::from(i) * 0.5);
    }
    result
}

/// 2000 x 100 nested multiply-accumulate.
pub fn nested_loop() -> i32 {
    let mut sum = 0i32;
    for i in 0..2000i32 {
        for j in 0..100i32 {
            sum = black_box(sum.wrapping_add(i.wrapping_mul(j)));
        }
    }
    sum
}

#[inline]
fn pattern_byte(index: usize) -> u8 {
    (index.wrapping_mul(31).wrapping_add(7) & 0xFF) as u8
}

/// Reference fill: one byte at a time.
pub fn fill_bytewise(out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = pattern_byte(i);
    }
}

/// Same pattern, eight bytes per store.
pub fn fill_wordwise(out: &mut [u8]) {
    let mut chunks = out.chunks_exact_mut(8);
    let mut base = 0usize;
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        for (k, byte) in word.iter_mut().enumerate() {
            *byte = pattern_byte(base + k);
        }
        chunk.copy_from_slice(&word);
        base += 8;
    }
    for (k, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte = pattern_byte(base + k);
    }
}

/// Broken rewrite: stops one byte short.
pub fn fill_short(out: &mut [u8]) {
    let len = out.len().saturating_sub(1);
    fill_bytewise(&mut out[..len]);
}
