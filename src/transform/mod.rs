// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_camel_case_types)]

pub use self::forward::*;
pub use self::inverse::*;

use crate::partition::BlockSize;
use crate::tiling::*;
use crate::util::*;

use TxSize::*;
use TxType::*;

mod forward;
mod inverse;

pub const MAX_TX_SIZE: usize = 32;
pub const MAX_TX_SQUARE: usize = MAX_TX_SIZE * MAX_TX_SIZE;

pub const TX_TYPES: usize = 16;

const SQRT2_BITS: usize = 12;
const SQRT2: i32 = 5793; // 2^12 * sqrt(2)
const INV_SQRT2: i32 = 2896; // 2^12 / sqrt(2)

/// Transform Size
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TxSize {
  TX_4X4,
  TX_8X8,
  TX_16X16,
  TX_32X32,

  TX_4X8,
  TX_8X4,
  TX_8X16,
  TX_16X8,
  TX_16X32,
  TX_32X16,

  TX_4X16,
  TX_16X4,
  TX_8X32,
  TX_32X8,
}

impl TxSize {
  /// Number of transform sizes (excluding none)
  pub const TX_SIZES_ALL: usize = 14;

  /// Width of the transform in samples, log2.
  #[inline]
  pub const fn width_log2(self) -> usize {
    match self {
      TX_4X4 | TX_4X8 | TX_4X16 => 2,
      TX_8X8 | TX_8X4 | TX_8X16 | TX_8X32 => 3,
      TX_16X16 | TX_16X8 | TX_16X32 | TX_16X4 => 4,
      TX_32X32 | TX_32X16 | TX_32X8 => 5,
    }
  }

  /// Height of the transform in samples, log2.
  #[inline]
  pub const fn height_log2(self) -> usize {
    match self {
      TX_4X4 | TX_8X4 | TX_16X4 => 2,
      TX_8X8 | TX_4X8 | TX_16X8 | TX_32X8 => 3,
      TX_16X16 | TX_8X16 | TX_32X16 | TX_4X16 => 4,
      TX_32X32 | TX_16X32 | TX_8X32 => 5,
    }
  }

  #[inline]
  pub const fn width(self) -> usize {
    1 << self.width_log2()
  }

  #[inline]
  pub const fn height(self) -> usize {
    1 << self.height_log2()
  }

  #[inline]
  pub const fn area(self) -> usize {
    1 << (self.width_log2() + self.height_log2())
  }

  /// Width in 4x4 units.
  #[inline]
  pub const fn width_mi(self) -> usize {
    self.width() >> 2
  }

  /// Height in 4x4 units.
  #[inline]
  pub const fn height_mi(self) -> usize {
    self.height() >> 2
  }

  /// # Panics
  ///
  /// - If the dimensions are not a transform size.
  #[inline]
  pub const fn by_dims(w: usize, h: usize) -> TxSize {
    match (w, h) {
      (4, 4) => TX_4X4,
      (8, 8) => TX_8X8,
      (16, 16) => TX_16X16,
      (32, 32) => TX_32X32,
      (4, 8) => TX_4X8,
      (8, 4) => TX_8X4,
      (8, 16) => TX_8X16,
      (16, 8) => TX_16X8,
      (16, 32) => TX_16X32,
      (32, 16) => TX_32X16,
      (4, 16) => TX_4X16,
      (16, 4) => TX_16X4,
      (8, 32) => TX_8X32,
      (32, 8) => TX_32X8,
      _ => panic!("unsupported transform dimensions"),
    }
  }

  /// Largest transform no larger than `w`x`h` in either dimension, no
  /// larger than `MAX_TX_SIZE`, and with sides at most 4:1.
  pub fn largest_for(w: usize, h: usize) -> TxSize {
    debug_assert!(w >= 4 && h >= 4);
    let mut tw = w.min(MAX_TX_SIZE);
    let mut th = h.min(MAX_TX_SIZE);
    if tw > th * 4 {
      tw = th * 4;
    } else if th > tw * 4 {
      th = tw * 4;
    }
    TxSize::by_dims(tw, th)
  }

  #[inline]
  pub const fn is_rect(self) -> bool {
    self.width_log2() != self.height_log2()
  }

  #[inline]
  pub const fn block_size(self) -> BlockSize {
    match BlockSize::from_width_and_height_opt(self.width(), self.height()) {
      Ok(bsize) => bsize,
      Err(_) => unreachable!(),
    }
  }
}

/// Transform Type
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub enum TxType {
  DCT_DCT = 0,   // DCT  in both horizontal and vertical
  ADST_DCT = 1,  // ADST in vertical, DCT in horizontal
  DCT_ADST = 2,  // DCT  in vertical, ADST in horizontal
  ADST_ADST = 3, // ADST in both directions
  FLIPADST_DCT = 4,
  DCT_FLIPADST = 5,
  FLIPADST_FLIPADST = 6,
  ADST_FLIPADST = 7,
  FLIPADST_ADST = 8,
  IDTX = 9,
  V_DCT = 10,
  H_DCT = 11,
  V_ADST = 12,
  H_ADST = 13,
  V_FLIPADST = 14,
  H_FLIPADST = 15,
}

impl Default for TxType {
  fn default() -> Self {
    DCT_DCT
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType1D {
  DCT,
  ADST,
  FLIPADST,
  IDTX,
}

const VTX_TAB: [TxType1D; TX_TYPES] = [
  TxType1D::DCT,
  TxType1D::ADST,
  TxType1D::DCT,
  TxType1D::ADST,
  TxType1D::FLIPADST,
  TxType1D::DCT,
  TxType1D::FLIPADST,
  TxType1D::ADST,
  TxType1D::FLIPADST,
  TxType1D::IDTX,
  TxType1D::DCT,
  TxType1D::IDTX,
  TxType1D::ADST,
  TxType1D::IDTX,
  TxType1D::FLIPADST,
  TxType1D::IDTX,
];

const HTX_TAB: [TxType1D; TX_TYPES] = [
  TxType1D::DCT,
  TxType1D::DCT,
  TxType1D::ADST,
  TxType1D::ADST,
  TxType1D::DCT,
  TxType1D::FLIPADST,
  TxType1D::FLIPADST,
  TxType1D::FLIPADST,
  TxType1D::ADST,
  TxType1D::IDTX,
  TxType1D::IDTX,
  TxType1D::DCT,
  TxType1D::IDTX,
  TxType1D::ADST,
  TxType1D::IDTX,
  TxType1D::FLIPADST,
];

impl TxType {
  pub const ALL: [TxType; TX_TYPES] = [
    DCT_DCT,
    ADST_DCT,
    DCT_ADST,
    ADST_ADST,
    FLIPADST_DCT,
    DCT_FLIPADST,
    FLIPADST_FLIPADST,
    ADST_FLIPADST,
    FLIPADST_ADST,
    IDTX,
    V_DCT,
    H_DCT,
    V_ADST,
    H_ADST,
    V_FLIPADST,
    H_FLIPADST,
  ];

  /// Kernel applied down the columns.
  #[inline]
  pub const fn vtx(self) -> TxType1D {
    VTX_TAB[self as usize]
  }

  /// Kernel applied along the rows.
  #[inline]
  pub const fn htx(self) -> TxType1D {
    HTX_TAB[self as usize]
  }

  /// (up-down, left-right) flips implied by the FLIPADST kernels.
  #[inline]
  pub fn flips(self) -> (bool, bool) {
    (self.vtx() == TxType1D::FLIPADST, self.htx() == TxType1D::FLIPADST)
  }

  /// Whether the type has kernels for both sides of `tx_size`.
  ///
  /// 32-point sides only have DCT and identity kernels, and a 32-point
  /// side only pairs DCT with DCT and identity with identity.
  pub fn is_allowed(self, tx_size: TxSize) -> bool {
    if tx_size.width() < 32 && tx_size.height() < 32 {
      return true;
    }
    matches!(self, DCT_DCT | IDTX)
  }
}

/// Utility function that returns the log of the ratio of the col and row
/// sizes.
#[inline]
pub fn get_rect_tx_log_ratio(col: usize, row: usize) -> i8 {
  debug_assert!(col > 0 && row > 0);
  col.ilog2() as i8 - row.ilog2() as i8
}

// performs half a butterfly
#[inline]
fn half_btf(w0: i32, in0: i32, w1: i32, in1: i32, bit: usize) -> i32 {
  // Ensure defined behaviour for when w0*in0 + w1*in1 is negative and
  //   overflows, but w0*in0 + w1*in1 + rounding isn't.
  let result = (w0 * in0).wrapping_add(w1 * in1);
  result.wrapping_add(1 << (bit - 1)) >> bit
}

// clamps value to a signed integer type of bit bits
#[inline]
fn clamp_value(value: i32, bit: usize) -> i32 {
  let max_value: i32 = ((1i64 << (bit - 1)) - 1) as i32;
  let min_value: i32 = (-(1i64 << (bit - 1))) as i32;
  clamp(value, min_value, max_value)
}

/// Computes `source - prediction` over a `w`x`h` window into a block-local
/// buffer of stride `w`.
///
/// Both inputs are read through their own regions so the residual never
/// depends on where either buffer is anchored.
pub fn residual<T: Pixel>(
  residual: &mut [i16], src: &PlaneRegion<'_, T>, pred: &PlaneRegion<'_, T>,
  w: usize, h: usize,
) {
  for ((r, src), pred) in residual
    .chunks_exact_mut(w)
    .zip(src.rows_iter())
    .zip(pred.rows_iter())
    .take(h)
  {
    for ((r, &s), &p) in r.iter_mut().zip(&src[..w]).zip(&pred[..w]) {
      *r = i16::cast_from(s) - i16::cast_from(p);
    }
  }
}

/// Sum of squared coefficients outside the top-left quadrant.
///
/// Coefficients are laid out row-major with a stride of the transform width.
pub fn three_quarter_energy(coeffs: &[i32], tx_size: TxSize) -> u64 {
  let w = tx_size.width();
  let h = tx_size.height();
  coeffs[..w * h]
    .chunks_exact(w)
    .enumerate()
    .map(|(r, row)| {
      let start = if r < h / 2 { w / 2 } else { 0 };
      row[start..].iter().map(|&c| (c as i64 * c as i64) as u64).sum::<u64>()
    })
    .sum()
}

/// Runs the forward 2D transform of `tx_type` over the residual and returns
/// the three-quarter energy of the result.
///
/// `coeffs` receives `tx_size.area()` coefficients, row-major, vertical
/// frequency by horizontal frequency.
///
/// # Panics
///
/// - If `tx_type` has no kernel for a 32-point side of `tx_size`.
pub fn forward_transform(
  input: &[i16], coeffs: &mut [i32], stride: usize, tx_size: TxSize,
  tx_type: TxType, bd: usize,
) -> u64 {
  assert!(tx_type.is_allowed(tx_size));
  debug_assert!(bd == 8 || bd == 10 || bd == 12);
  fwd_txfm2d(input, coeffs, stride, tx_size, tx_type);
  three_quarter_energy(coeffs, tx_size)
}

/// Inverse transforms dequantized coefficients and adds the result to the
/// prediction already present in `output`, clamping to the pixel range.
///
/// An `eob` of zero means every coefficient is zero and the prediction is
/// left untouched.
pub fn inverse_transform_add<T: Pixel>(
  rcoeffs: &[i32], output: &mut PlaneRegionMut<'_, T>, eob: u16,
  tx_size: TxSize, tx_type: TxType, bd: usize,
) {
  assert!(tx_type.is_allowed(tx_size));
  if eob == 0 {
    return;
  }
  inv_txfm2d_add(rcoeffs, output, tx_size, tx_type, bd);
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::*;
  use interpolate_name::interpolate_test;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  const ALL_SIZES: [TxSize; TxSize::TX_SIZES_ALL] = [
    TX_4X4, TX_8X8, TX_16X16, TX_32X32, TX_4X8, TX_8X4, TX_8X16, TX_16X8,
    TX_16X32, TX_32X16, TX_4X16, TX_16X4, TX_8X32, TX_32X8,
  ];

  fn test_roundtrip(tx_size: TxSize, tx_type: TxType, tolerance: i32) {
    let mut ra = ChaChaRng::from_seed([0; 32]);
    let w = tx_size.width();
    let h = tx_size.height();

    let mut src = Plane::<u8>::new(w, h, 0, 0, 0, 0);
    let mut dst = Plane::<u8>::new(w, h, 0, 0, 0, 0);
    for (s, d) in src.data.iter_mut().zip(dst.data.iter_mut()) {
      *s = ra.gen();
      *d = ra.gen();
    }

    let mut res = vec![0i16; w * h];
    residual(
      &mut res,
      &src.as_region(),
      &dst.as_region(),
      w,
      h,
    );
    let mut freq = vec![0i32; w * h];
    forward_transform(&res, &mut freq, w, tx_size, tx_type, 8);

    inverse_transform_add(
      &freq,
      &mut dst.as_region_mut(),
      1,
      tx_size,
      tx_type,
      8,
    );

    let (src, dst) = (src.as_region(), dst.as_region());
    for (s, d) in src.rows_iter().zip(dst.rows_iter()).take(h) {
      for (s, d) in s[..w].iter().zip(&d[..w]) {
        let diff = (i32::from(*s) - i32::from(*d)).abs();
        assert!(
          diff <= tolerance,
          "{:?} {:?}: |{} - {}| > {}",
          tx_size,
          tx_type,
          s,
          d,
          tolerance
        );
      }
    }
  }

  #[interpolate_test(dct_dct, DCT_DCT)]
  #[interpolate_test(adst_dct, ADST_DCT)]
  #[interpolate_test(dct_adst, DCT_ADST)]
  #[interpolate_test(adst_adst, ADST_ADST)]
  #[interpolate_test(flipadst_dct, FLIPADST_DCT)]
  #[interpolate_test(dct_flipadst, DCT_FLIPADST)]
  #[interpolate_test(flipadst_flipadst, FLIPADST_FLIPADST)]
  #[interpolate_test(adst_flipadst, ADST_FLIPADST)]
  #[interpolate_test(flipadst_adst, FLIPADST_ADST)]
  #[interpolate_test(idtx, IDTX)]
  #[interpolate_test(v_dct, V_DCT)]
  #[interpolate_test(h_dct, H_DCT)]
  #[interpolate_test(v_adst, V_ADST)]
  #[interpolate_test(h_adst, H_ADST)]
  #[interpolate_test(v_flipadst, V_FLIPADST)]
  #[interpolate_test(h_flipadst, H_FLIPADST)]
  fn roundtrip(tx_type: TxType) {
    for &tx_size in ALL_SIZES.iter().filter(|&&s| tx_type.is_allowed(s)) {
      test_roundtrip(tx_size, tx_type, 2);
    }
  }

  #[test]
  fn log_tx_ratios() {
    let combinations = [
      (TX_4X4, 0),
      (TX_8X8, 0),
      (TX_16X16, 0),
      (TX_32X32, 0),
      (TX_4X8, -1),
      (TX_8X4, 1),
      (TX_8X16, -1),
      (TX_16X8, 1),
      (TX_16X32, -1),
      (TX_32X16, 1),
      (TX_4X16, -2),
      (TX_16X4, 2),
      (TX_8X32, -2),
      (TX_32X8, 2),
    ];

    for &(tx_size, expected) in combinations.iter() {
      assert_eq!(
        get_rect_tx_log_ratio(tx_size.width(), tx_size.height()),
        expected
      );
    }
  }

  #[test]
  fn largest_tx_respects_ratio_and_cap() {
    assert_eq!(TxSize::largest_for(64, 64), TX_32X32);
    assert_eq!(TxSize::largest_for(64, 16), TX_32X16);
    assert_eq!(TxSize::largest_for(4, 32), TX_4X16);
    assert_eq!(TxSize::largest_for(32, 4), TX_16X4);
    assert_eq!(TxSize::largest_for(8, 8), TX_8X8);
  }

  #[test]
  fn large_sides_reject_adst() {
    assert!(!DCT_ADST.is_allowed(TX_32X32));
    assert!(!V_DCT.is_allowed(TX_8X32));
    assert!(IDTX.is_allowed(TX_32X8));
    assert!(FLIPADST_ADST.is_allowed(TX_16X16));
  }

  #[test]
  fn flat_residual_has_no_high_frequency_energy() {
    let res = [37i16; 64];
    let mut coeffs = [0i32; 64];
    let energy = forward_transform(&res, &mut coeffs, 8, TX_8X8, DCT_DCT, 8);
    assert_eq!(energy, 0);
    assert!(coeffs[0] > 0);
    assert!(coeffs[1..].iter().all(|&c| c == 0));
  }

  #[test]
  fn three_quarter_energy_skips_low_quadrant() {
    let mut coeffs = [0i32; 16];
    coeffs[0] = 100;
    coeffs[5] = 10;
    assert_eq!(three_quarter_energy(&coeffs, TX_4X4), 0);
    coeffs[2] = 3;
    coeffs[8] = 4;
    assert_eq!(three_quarter_energy(&coeffs, TX_4X4), 25);
  }

  #[test]
  fn ten_bit_roundtrip_dct() {
    let mut ra = ChaChaRng::from_seed([7; 32]);
    for &tx_size in &ALL_SIZES {
      let w = tx_size.width();
      let h = tx_size.height();
      let mut src = Plane::<u16>::new(w, h, 0, 0, 0, 0);
      let mut dst = Plane::<u16>::new(w, h, 0, 0, 0, 0);
      for (s, d) in src.data.iter_mut().zip(dst.data.iter_mut()) {
        *s = ra.gen_range(0..1024);
        *d = ra.gen_range(0..1024);
      }
      let mut res = vec![0i16; w * h];
      residual(&mut res, &src.as_region(), &dst.as_region(), w, h);
      let mut freq = vec![0i32; w * h];
      forward_transform(&res, &mut freq, w, tx_size, DCT_DCT, 10);
      inverse_transform_add(
        &freq,
        &mut dst.as_region_mut(),
        1,
        tx_size,
        DCT_DCT,
        10,
      );
      let (src, dst) = (src.as_region(), dst.as_region());
      for (s, d) in src.rows_iter().zip(dst.rows_iter()).take(h) {
        for (s, d) in s[..w].iter().zip(&d[..w]) {
          assert!((i32::from(*s) - i32::from(*d)).abs() <= 2);
        }
      }
    }
  }
}
