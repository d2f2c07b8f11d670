// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Chroma from luma prediction.

#![allow(non_camel_case_types)]

use crate::tiling::*;
use crate::util::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CFLSign {
  CFL_SIGN_ZERO = 0,
  CFL_SIGN_NEG = 1,
  CFL_SIGN_POS = 2,
}

impl CFLSign {
  pub const fn from_alpha(a: i16) -> CFLSign {
    [CFL_SIGN_NEG, CFL_SIGN_ZERO, CFL_SIGN_POS][(a.signum() + 1) as usize]
  }
}

use self::CFLSign::*;

const CFL_SIGNS: usize = 3;
static cfl_sign_value: [i16; CFL_SIGNS] = [0, -1, 1];

/// Largest alpha magnitude, in units of 1/8.
pub const CFL_ALPHA_MAX: i16 = 16;

/// Signs and 1-based magnitudes of the two chroma scaling factors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CFLParams {
  pub sign: [CFLSign; 2],
  pub scale: [u8; 2],
}

impl Default for CFLParams {
  #[inline]
  fn default() -> Self {
    Self { sign: [CFL_SIGN_NEG, CFL_SIGN_ZERO], scale: [1, 0] }
  }
}

impl CFLParams {
  /// # Panics
  ///
  /// - If both signs are zero
  #[inline]
  pub fn joint_sign(self) -> u32 {
    assert!(self.sign[0] != CFL_SIGN_ZERO || self.sign[1] != CFL_SIGN_ZERO);
    (self.sign[0] as u32) * (CFL_SIGNS as u32) + (self.sign[1] as u32) - 1
  }
  /// # Panics
  ///
  /// - If the sign at index `uv` is zero
  #[inline]
  pub fn context(self, uv: usize) -> usize {
    assert!(self.sign[uv] != CFL_SIGN_ZERO);
    (self.sign[uv] as usize - 1) * CFL_SIGNS + (self.sign[1 - uv] as usize)
  }
  /// # Panics
  ///
  /// - If the sign at index `uv` is zero
  #[inline]
  pub fn index(self, uv: usize) -> u32 {
    assert!(self.sign[uv] != CFL_SIGN_ZERO && self.scale[uv] != 0);
    (self.scale[uv] - 1) as u32
  }
  #[inline]
  pub fn alpha(self, uv: usize) -> i16 {
    cfl_sign_value[self.sign[uv] as usize] * (self.scale[uv] as i16)
  }
  #[inline]
  pub const fn from_alpha(u: i16, v: i16) -> CFLParams {
    CFLParams {
      sign: [CFLSign::from_alpha(u), CFLSign::from_alpha(v)],
      scale: [u.unsigned_abs() as u8, v.unsigned_abs() as u8],
    }
  }
  /// A pair of alphas can only be signalled if one of them is non-zero.
  #[inline]
  pub fn is_signalable(self) -> bool {
    self.sign[0] != CFL_SIGN_ZERO || self.sign[1] != CFL_SIGN_ZERO
  }
}

/// Computes the AC contribution of the co-located luma block, in Q3, for
/// a `w`x`h` chroma block.
///
/// `luma` starts at the top-left luma sample covered by the chroma block.
/// Only `luma_w`x`luma_h` luma samples are coded; positions past them
/// replicate the last coded column and row.
pub fn luma_ac<T: Pixel>(
  ac: &mut [i16], luma: &PlaneRegion<'_, T>, w: usize, h: usize,
  xdec: usize, ydec: usize, luma_w: usize, luma_h: usize,
) {
  debug_assert!(ac.len() >= w * h);
  let max_x = ((luma_w >> xdec).max(1) - 1).min(w - 1);
  let max_y = ((luma_h >> ydec).max(1) - 1).min(h - 1);
  let scale = 3 - xdec - ydec;

  let mut sum: i32 = 0;
  for (sub_y, ac_row) in ac[..w * h].chunks_exact_mut(w).enumerate() {
    let y = sub_y.min(max_y) << ydec;
    for (sub_x, v) in ac_row.iter_mut().enumerate() {
      let x = sub_x.min(max_x) << xdec;
      let mut sample: i32 = i32::cast_from(luma[y][x]);
      if xdec != 0 {
        sample += i32::cast_from(luma[y][x + 1]);
      }
      if ydec != 0 {
        sample += i32::cast_from(luma[y + 1][x]);
        if xdec != 0 {
          sample += i32::cast_from(luma[y + 1][x + 1]);
        }
      }
      let sample = sample << scale;
      *v = sample as i16;
      sum += sample;
    }
  }

  let shift = w.ilog2() + h.ilog2();
  let average = ((sum + (1 << (shift - 1))) >> shift) as i16;
  for v in ac[..w * h].iter_mut() {
    *v -= average;
  }
}

#[inline(always)]
fn cfl_sample(dc: i32, ac: i16, alpha: i16, max: i32) -> i32 {
  clamp(dc + round_shift_signed(alpha as i32 * ac as i32, 6), 0, max)
}

/// Adds the scaled luma AC to the DC prediction already held by `dst`.
pub fn pred_cfl<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, ac: &[i16], alpha: i16, w: usize,
  h: usize, bit_depth: usize,
) {
  if alpha == 0 {
    return;
  }
  let max = pixel_max(bit_depth);
  for (line, ac) in dst.rows_iter_mut().zip(ac.chunks_exact(w)).take(h) {
    for (v, &ac) in line[..w].iter_mut().zip(ac) {
      *v = T::cast_from(cfl_sample(i32::cast_from(*v), ac, alpha, max));
    }
  }
}

fn cfl_distortion<T: Pixel>(
  src: &PlaneRegion<'_, T>, dc: &PlaneRegion<'_, T>, ac: &[i16], alpha: i16,
  w: usize, h: usize, max: i32,
) -> u64 {
  let mut dist = 0u64;
  for ((s, d), ac) in
    src.rows_iter().zip(dc.rows_iter()).zip(ac.chunks_exact(w)).take(h)
  {
    for ((&s, &d), &ac) in s[..w].iter().zip(&d[..w]).zip(ac) {
      let e = i32::cast_from(s) - cfl_sample(i32::cast_from(d), ac, alpha, max);
      dist += (e * e) as u64;
    }
  }
  dist
}

/// Picks the alpha minimizing the squared error between `src` and the CfL
/// prediction built on the DC prediction `dc`.
///
/// The search starts at zero and walks outwards in both directions,
/// giving up once the last improvement is far enough behind.
pub fn search_cfl_alpha<T: Pixel>(
  src: &PlaneRegion<'_, T>, dc: &PlaneRegion<'_, T>, ac: &[i16], w: usize,
  h: usize, bit_depth: usize,
) -> i16 {
  let max = pixel_max(bit_depth);
  let cost = |alpha: i16| cfl_distortion(src, dc, ac, alpha, w, h, max);

  let mut best = (cost(0), 0);
  let mut count = 2;
  for alpha in 1i16..=CFL_ALPHA_MAX {
    let pos = cost(alpha);
    let neg = cost(-alpha);
    if pos < best.0 {
      best = (pos, alpha);
      count += 2;
    }
    if neg < best.0 {
      best = (neg, -alpha);
      count += 2;
    }
    if count < alpha {
      break;
    }
  }
  best.1
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::*;
  use pretty_assertions::assert_eq;

  static cfl_alpha_signs: [[CFLSign; 2]; 8] = [
    [CFL_SIGN_ZERO, CFL_SIGN_NEG],
    [CFL_SIGN_ZERO, CFL_SIGN_POS],
    [CFL_SIGN_NEG, CFL_SIGN_ZERO],
    [CFL_SIGN_NEG, CFL_SIGN_NEG],
    [CFL_SIGN_NEG, CFL_SIGN_POS],
    [CFL_SIGN_POS, CFL_SIGN_ZERO],
    [CFL_SIGN_POS, CFL_SIGN_NEG],
    [CFL_SIGN_POS, CFL_SIGN_POS],
  ];

  static cfl_context: [[usize; 8]; 2] =
    [[0, 0, 0, 1, 2, 3, 4, 5], [0, 3, 0, 1, 4, 0, 2, 5]];

  #[test]
  fn cfl_joint_sign() {
    let mut cfl = CFLParams::default();
    for (joint_sign, &signs) in cfl_alpha_signs.iter().enumerate() {
      cfl.sign = signs;
      assert!(cfl.joint_sign() as usize == joint_sign);
      for uv in 0..2 {
        if signs[uv] != CFL_SIGN_ZERO {
          assert!(cfl.context(uv) == cfl_context[uv][joint_sign]);
        }
      }
    }
  }

  #[test]
  fn alphas_round_trip_through_params() {
    let cfl = CFLParams::from_alpha(-5, 16);
    assert_eq!(cfl.alpha(0), -5);
    assert_eq!(cfl.alpha(1), 16);
    assert_eq!(cfl.index(0), 4);
    assert_eq!(cfl.index(1), 15);
    assert!(cfl.is_signalable());
    assert!(!CFLParams::from_alpha(0, 0).is_signalable());
  }

  #[test]
  fn luma_ac_subsamples_and_removes_average() {
    let mut plane = Plane::<u8>::new(8, 8, 0, 0, 0, 0);
    // Each 2x2 luma quad is flat, so the 4:2:0 average is its value.
    fill_plane(&mut plane, 8, 8, |x, y| ((x / 2) * 8 + (y / 2) * 32) as u8);
    let mut ac = [0i16; 16];
    luma_ac(&mut ac, &plane.as_region(), 4, 4, 1, 1, 8, 8);

    // Q3 samples are 8 * value; the block average is 8 * 60.
    let expected: Vec<i16> = (0..16)
      .map(|i| (((i % 4) * 8 + (i / 4) * 32) * 8 - 480) as i16)
      .collect();
    assert_eq!(&ac[..], &expected[..]);
    assert_eq!(ac.iter().map(|&v| v as i32).sum::<i32>(), 0);
  }

  #[test]
  fn luma_ac_replicates_past_the_coded_area() {
    let mut plane = Plane::<u16>::new(8, 8, 0, 0, 0, 0);
    fill_plane(&mut plane, 8, 8, |x, _| (x * 10) as u16);
    let mut ac = [0i16; 16];
    // Only two luma columns are coded: every chroma column repeats them.
    luma_ac(&mut ac, &plane.as_region(), 4, 4, 0, 0, 2, 8);
    for row in ac.chunks_exact(4) {
      assert_eq!(row[1], row[2]);
      assert_eq!(row[1], row[3]);
      assert_eq!(row[1] - row[0], 80);
    }
  }

  #[test]
  fn pred_cfl_scales_ac_around_dc() {
    let mut plane = Plane::<u8>::new(4, 1, 0, 0, 0, 0);
    fill_plane(&mut plane, 4, 1, |_, _| 128);
    let ac = [-96i16, -32, 32, 96];
    pred_cfl(&mut plane.as_region_mut(), &ac, 4, 4, 1, 8);
    assert_eq!(&plane.as_region()[0][..4], &[122, 126, 130, 134]);

    pred_cfl(&mut plane.as_region_mut(), &[-4096i16, 0, 0, 4096], 16, 4, 1, 8);
    assert_eq!(&plane.as_region()[0][..4], &[0, 126, 130, 255]);
  }

  #[test]
  fn alpha_search_recovers_the_scaling() {
    let mut luma = Plane::<u8>::new(4, 4, 0, 0, 0, 0);
    fill_plane(&mut luma, 4, 4, |x, _| (100 + 8 * x) as u8);
    let mut ac = [0i16; 16];
    luma_ac(&mut ac, &luma.as_region(), 4, 4, 0, 0, 4, 4);
    assert_eq!(&ac[..4], &[-96, -32, 32, 96]);

    let mut dc = Plane::<u8>::new(4, 4, 0, 0, 0, 0);
    fill_plane(&mut dc, 4, 4, |_, _| 128);
    let mut src = Plane::<u8>::new(4, 4, 0, 0, 0, 0);
    fill_plane(&mut src, 4, 4, |x, _| [122, 126, 130, 134][x]);
    let alpha =
      search_cfl_alpha(&src.as_region(), &dc.as_region(), &ac, 4, 4, 8);
    assert_eq!(alpha, 4);

    fill_plane(&mut src, 4, 4, |x, _| [134, 130, 126, 122][x]);
    let alpha =
      search_cfl_alpha(&src.as_region(), &dc.as_region(), &ac, 4, 4, 8);
    assert_eq!(alpha, -4);

    fill_plane(&mut src, 4, 4, |_, _| 128);
    let alpha =
      search_cfl_alpha(&src.as_region(), &dc.as_region(), &ac, 4, 4, 8);
    assert_eq!(alpha, 0);
  }
}
