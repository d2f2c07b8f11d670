// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_upper_case_globals)]

mod tables;

pub use tables::*;

use crate::scan_order::scan;
use crate::transform::{TxSize, TxType};
use crate::util::*;

pub fn get_log_tx_scale(tx_size: TxSize) -> usize {
  usize::from(tx_size.area() > 256)
}

#[inline]
fn lookup_tables(
  bit_depth: usize,
) -> (&'static [u16; QINDEX_RANGE], &'static [u16; QINDEX_RANGE]) {
  match bit_depth {
    8 => (&dc_qlookup_Q3, &ac_qlookup_Q3),
    _ => {
      debug_assert_eq!(bit_depth, 10);
      (&dc_qlookup_10_Q3, &ac_qlookup_10_Q3)
    }
  }
}

pub fn dc_q(qindex: u8, bit_depth: usize) -> u16 {
  lookup_tables(bit_depth).0[qindex as usize]
}

pub fn ac_q(qindex: u8, bit_depth: usize) -> u16 {
  lookup_tables(bit_depth).1[qindex as usize]
}

fn select_qi(quantizer: i64, qlookup: &[u16; QINDEX_RANGE]) -> u8 {
  if quantizer < i64::from(qlookup[MINQ]) {
    MINQ as u8
  } else if quantizer >= i64::from(qlookup[MAXQ]) {
    MAXQ as u8
  } else {
    match qlookup.binary_search(&(quantizer as u16)) {
      Ok(qi) => qi as u8,
      Err(qi) => {
        debug_assert!(qi > MINQ);
        debug_assert!(qi <= MAXQ);
        // Pick the closest quantizer in the log domain.
        let qthresh = i64::from(qlookup[qi - 1]) * i64::from(qlookup[qi]);
        if quantizer * quantizer < qthresh {
          (qi - 1) as u8
        } else {
          qi as u8
        }
      }
    }
  }
}

/// Smallest qindex whose AC step is closest to `quantizer` (Q3).
pub fn select_ac_qi(quantizer: i64, bit_depth: usize) -> u8 {
  select_qi(quantizer, lookup_tables(bit_depth).1)
}

#[derive(Debug, Clone, Copy)]
pub struct QuantizationContext {
  log_tx_scale: usize,
  dc_quant: u32,
  dc_offset: u32,
  dc_mul_add: (u32, u32, u32),

  ac_quant: u32,
  ac_offset_eob: u32,
  ac_offset0: u32,
  ac_offset1: u32,
  ac_mul_add: (u32, u32, u32),
}

impl Default for QuantizationContext {
  fn default() -> Self {
    QuantizationContext {
      log_tx_scale: 0,
      dc_quant: 1,
      dc_offset: 0,
      dc_mul_add: divu_gen(1),
      ac_quant: 1,
      ac_offset_eob: 0,
      ac_offset0: 0,
      ac_offset1: 0,
      ac_mul_add: divu_gen(1),
    }
  }
}

/// Multiply-add-shift constants dividing any `u32` by `d`.
fn divu_gen(d: u32) -> (u32, u32, u32) {
  debug_assert!(d != 0);
  let nbits = 32u64;
  let m = nbits - d.leading_zeros() as u64 - 1;
  if d.is_power_of_two() {
    (0xFFFF_FFFF, 0xFFFF_FFFF, m as u32)
  } else {
    let d = d as u64;
    let t = (1u64 << (m + nbits)) / d;
    let r = (t * d + d) & ((1 << nbits) - 1);
    if r <= 1u64 << m {
      (t as u32 + 1, 0u32, m as u32)
    } else {
      (t as u32, t as u32, m as u32)
    }
  }
}

#[inline]
const fn divu_pair(x: u32, d: (u32, u32, u32)) -> u32 {
  let x = x as u64;
  let (a, b, shift) = d;
  let shift = shift as u64;
  let a = a as u64;
  let b = b as u64;

  (((a * x + b) >> 32) >> shift) as u32
}

#[inline]
const fn copysign(value: u32, signed: i32) -> i32 {
  if signed < 0 {
    -(value as i32)
  } else {
    value as i32
  }
}

impl QuantizationContext {
  pub fn update(
    &mut self, qindex: u8, tx_size: TxSize, is_intra: bool, bit_depth: usize,
  ) {
    self.log_tx_scale = get_log_tx_scale(tx_size);

    self.dc_quant = u32::from(dc_q(qindex, bit_depth));
    self.dc_mul_add = divu_gen(self.dc_quant);

    self.ac_quant = u32::from(ac_q(qindex, bit_depth));
    self.ac_mul_add = divu_gen(self.ac_quant);

    // Rounding biases in 1/256 of a step. Inter blocks lean further
    // toward an early end of block.
    self.dc_offset = self.dc_quant * (if is_intra { 109 } else { 108 }) / 256;
    self.ac_offset0 = self.ac_quant * (if is_intra { 98 } else { 97 }) / 256;
    self.ac_offset1 = self.ac_quant * (if is_intra { 109 } else { 108 }) / 256;
    self.ac_offset_eob =
      self.ac_quant * (if is_intra { 88 } else { 44 }) / 256;
  }

  /// Quantizes `coeffs` into `qcoeffs` and returns the end of block, one
  /// past the last non-zero level in scan order.
  ///
  /// Every level at or past the end of block is zero on return.
  pub fn quantize(
    &self, coeffs: &[i32], qcoeffs: &mut [i32], tx_size: TxSize,
    tx_type: TxType,
  ) -> u16 {
    let scan = scan(tx_size, tx_type);
    let area = tx_size.area();
    qcoeffs[..area].fill(0);

    qcoeffs[0] = {
      let coeff = coeffs[0] << self.log_tx_scale;
      copysign(
        divu_pair(coeff.unsigned_abs() + self.dc_offset, self.dc_mul_add),
        coeff,
      )
    };

    // `abs(coeff) < deadzone` implies
    // (abs(coeff << log_tx_scale) + ac_offset_eob) / ac_quant == 0
    let deadzone = ((self.ac_quant - self.ac_offset_eob) as usize)
      .align_power_of_two_and_shift(self.log_tx_scale)
      as u32;
    // The DC coefficient has its own quantizer and is handled above.
    let eob = match scan[1..]
      .iter()
      .rposition(|&pos| coeffs[pos as usize].unsigned_abs() >= deadzone)
    {
      Some(n) => (n + 2) as u16,
      None => u16::from(qcoeffs[0] != 0),
    };

    // Runs of zeros and ones round toward zero harder than the larger
    // levels that precede them.
    let mut level_mode = 1;
    for &pos in scan.iter().take(usize::from(eob)).skip(1) {
      let coeff = coeffs[pos as usize] << self.log_tx_scale;
      let abs_coeff = coeff.unsigned_abs();

      let level0 = divu_pair(abs_coeff, self.ac_mul_add);
      let offset = if level0 > 1 - level_mode {
        self.ac_offset1
      } else {
        self.ac_offset0
      };

      let abs_qcoeff =
        level0 + u32::from(abs_coeff + offset >= (level0 + 1) * self.ac_quant);
      if level_mode != 0 && abs_qcoeff == 0 {
        level_mode = 0;
      } else if abs_qcoeff > 1 {
        level_mode = 1;
      }

      qcoeffs[pos as usize] = copysign(abs_qcoeff, coeff);
    }

    debug_assert_eq!(
      usize::from(eob),
      scan
        .iter()
        .rposition(|&i| qcoeffs[i as usize] != 0)
        .map(|n| n + 1)
        .unwrap_or(0)
    );

    eob
  }
}

/// Number of non-zero levels among the first `eob` positions of `scan`.
pub fn count_nonzero(qcoeffs: &[i32], scan: &[u16], eob: u16) -> u16 {
  scan[..usize::from(eob)]
    .iter()
    .filter(|&&pos| qcoeffs[pos as usize] != 0)
    .count() as u16
}

/// Decoder-side reconstruction of the coefficients.
///
/// Magnitudes are truncated to 24 bits before the transform scale is
/// removed, and the result is clamped to the `bit_depth + 8` signed range
/// the inverse transform accepts.
pub fn dequantize(
  qindex: u8, qcoeffs: &[i32], eob: u16, rcoeffs: &mut [i32],
  tx_size: TxSize, bit_depth: usize,
) {
  let area = tx_size.area();
  rcoeffs[..area].fill(0);
  if eob == 0 {
    return;
  }

  let log_tx_scale = get_log_tx_scale(tx_size);
  let dc_quant = u32::from(dc_q(qindex, bit_depth));
  let ac_quant = u32::from(ac_q(qindex, bit_depth));
  let max = (1 << (7 + bit_depth)) - 1;
  let min = -(1 << (7 + bit_depth));

  for (i, (r, &c)) in rcoeffs[..area].iter_mut().zip(qcoeffs).enumerate() {
    if c == 0 {
      continue;
    }
    let quant = if i == 0 { dc_quant } else { ac_quant };
    let magnitude = ((c.unsigned_abs() * quant) & 0xFF_FFFF) >> log_tx_scale;
    *r = clamp(copysign(magnitude, c), min, max);
  }
}
