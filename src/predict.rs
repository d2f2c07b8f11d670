// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]

use crate::context::*;
use crate::frame::*;
use crate::tiling::*;
use crate::transform::MAX_TX_SIZE;
use crate::util::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Hash)]
pub enum PredictionMode {
  #[default]
  DC_PRED, // Average of above and left pixels
  V_PRED,        // Vertical
  H_PRED,        // Horizontal
  D45_PRED,      // Directional 45  degree
  D135_PRED,     // Directional 135 degree
  D113_PRED,     // Directional 113 degree
  D157_PRED,     // Directional 157 degree
  D203_PRED,     // Directional 203 degree
  D67_PRED,      // Directional 67  degree
  SMOOTH_PRED,   // Combination of horizontal and vertical interpolation
  SMOOTH_V_PRED,
  SMOOTH_H_PRED,
  PAETH_PRED,
  UV_CFL_PRED,
  NEARESTMV,
  NEARMV,
  GLOBALMV,
  NEWMV,
  // Compound ref compound modes
  NEAREST_NEARESTMV,
  NEAR_NEARMV,
  NEAREST_NEWMV,
  NEW_NEARESTMV,
  NEAR_NEWMV,
  NEW_NEARMV,
  GLOBAL_GLOBALMV,
  NEW_NEWMV,
}

impl PredictionMode {
  #[inline]
  pub fn is_intra(self) -> bool {
    self <= PredictionMode::UV_CFL_PRED
  }

  #[inline]
  pub fn is_cfl(self) -> bool {
    self == PredictionMode::UV_CFL_PRED
  }

  /// Inter modes that read two references.
  #[inline]
  pub fn is_compound(self) -> bool {
    self >= PredictionMode::NEAREST_NEARESTMV
  }

  #[inline]
  pub fn is_directional(self) -> bool {
    self >= PredictionMode::V_PRED && self <= PredictionMode::D67_PRED
  }

  /// Nominal prediction angle of a directional mode, in degrees.
  pub const fn angle(self) -> isize {
    match self {
      PredictionMode::V_PRED => 90,
      PredictionMode::H_PRED => 180,
      PredictionMode::D45_PRED => 45,
      PredictionMode::D135_PRED => 135,
      PredictionMode::D113_PRED => 113,
      PredictionMode::D157_PRED => 157,
      PredictionMode::D203_PRED => 203,
      PredictionMode::D67_PRED => 67,
      _ => 0,
    }
  }
}

// Weights are quadratic from '1' to '1 / block_size', scaled by
// 2^sm_weight_log2_scale.
const sm_weight_log2_scale: u8 = 8;

// Smooth predictor weights
#[rustfmt::skip]
static sm_weight_arrays: [u8; 2 * MAX_TX_SIZE] = [
  // Unused, because we always offset by bs, which is at least 2.
  0, 0,
  // bs = 2
  255, 128,
  // bs = 4
  255, 149, 85, 64,
  // bs = 8
  255, 197, 146, 105, 73, 50, 37, 32,
  // bs = 16
  255, 225, 196, 170, 145, 123, 102, 84, 68, 54, 43, 33, 26, 20, 17, 16,
  // bs = 32
  255, 240, 225, 210, 196, 182, 169, 157, 145, 133, 122, 111, 101, 92, 83, 74,
  66, 59, 52, 45, 39, 34, 29, 25, 21, 17, 14, 12, 10, 9, 8, 8,
];

/// Step per row (or column) of a directional predictor in 1/64 sample,
/// for the angles reachable without angle deltas.
const fn dr_intra_derivative(angle: isize) -> i32 {
  match angle {
    3 => 1023,
    6 => 547,
    9 => 372,
    14 => 273,
    17 => 215,
    20 => 178,
    23 => 151,
    26 => 132,
    29 => 116,
    32 => 102,
    36 => 90,
    39 => 80,
    42 => 71,
    45 => 64,
    48 => 57,
    51 => 51,
    54 => 45,
    58 => 40,
    61 => 35,
    64 => 31,
    67 => 27,
    70 => 23,
    73 => 19,
    76 => 15,
    81 => 11,
    84 => 7,
    87 => 3,
    _ => 0,
  }
}

const EDGE_LEN: usize = 2 * MAX_TX_SIZE;

/// Reference samples around a transform block.
///
/// `above` runs left to right from the column of the block and `left`
/// runs top to bottom from its row; both hold `w + h` samples, the
/// part past the block replicated from the last available one.
#[derive(Clone, Debug)]
pub struct IntraEdge<T: Pixel> {
  // Index 0 of both holds the top-left sample.
  above: [T; EDGE_LEN + 1],
  left: [T; EDGE_LEN + 1],
  have_above: bool,
  have_left: bool,
}

impl<T: Pixel> IntraEdge<T> {
  pub fn new(
    above: &[T], left: &[T], top_left: T, have_above: bool, have_left: bool,
  ) -> Self {
    let mut edge = IntraEdge {
      above: [top_left; EDGE_LEN + 1],
      left: [top_left; EDGE_LEN + 1],
      have_above,
      have_left,
    };
    edge.above[1..=above.len()].copy_from_slice(above);
    edge.left[1..=left.len()].copy_from_slice(left);
    edge
  }

  /// Collects the edge of the `w`x`h` transform block of plane `p` at
  /// `po` from the reconstructed samples in the neighbor store.
  ///
  /// Missing neighbors are substituted the way a decoder does: a missing
  /// row or column copies the sample on the other side of the corner when
  /// there is one and falls back to mid-gray offsets otherwise.
  pub fn gather(
    nc: &NeighborContext<T>, p: usize, po: PlaneOffset, w: usize, h: usize,
    bit_depth: usize,
  ) -> Self {
    let coded = &nc.coded[p];
    let recon = &nc.recon[p];
    let (x, y) = (po.x, po.y);
    let base = 1i32 << (bit_depth - 1);
    let n = w + h;

    let have_above = coded.is_available(x, y - 1);
    let have_left = coded.is_available(x - 1, y);

    let top_left = match (have_above, have_left) {
      (true, true) => recon.read_top_left(x as usize, y as usize),
      (true, false) => recon.read_top(x as usize),
      (false, true) => recon.read_left(y as usize),
      (false, false) => T::cast_from(base),
    };
    let mut edge = IntraEdge {
      above: [top_left; EDGE_LEN + 1],
      left: [top_left; EDGE_LEN + 1],
      have_above,
      have_left,
    };

    if have_above {
      let mut last = top_left;
      for i in 0..n {
        let xi = x + i as isize;
        if i < w || coded.is_available(xi, y - 1) {
          last = recon.read_top(xi as usize);
        }
        edge.above[i + 1] = last;
      }
    } else {
      let fill = if have_left {
        recon.read_left(y as usize)
      } else {
        T::cast_from(base - 1)
      };
      edge.above[1..=n].fill(fill);
    }

    if have_left {
      let mut last = top_left;
      for i in 0..n {
        let yi = y + i as isize;
        if i < h || coded.is_available(x - 1, yi) {
          last = recon.read_left(yi as usize);
        }
        edge.left[i + 1] = last;
      }
    } else {
      let fill = if have_above {
        recon.read_top(x as usize)
      } else {
        T::cast_from(base + 1)
      };
      edge.left[1..=n].fill(fill);
    }

    edge
  }

  #[inline]
  pub fn above(&self) -> &[T] {
    &self.above[1..]
  }

  #[inline]
  pub fn left(&self) -> &[T] {
    &self.left[1..]
  }

  #[inline]
  pub fn top_left(&self) -> T {
    self.above[0]
  }

  #[inline]
  pub const fn have_above(&self) -> bool {
    self.have_above
  }

  #[inline]
  pub const fn have_left(&self) -> bool {
    self.have_left
  }
}

/// Fills the `w`x`h` block at the origin of `dst` with the intra
/// prediction for `mode`. The CfL mode predicts its DC part only.
///
/// # Panics
///
/// - If `mode` is not an intra mode.
pub fn predict_intra<T: Pixel>(
  mode: PredictionMode, dst: &mut PlaneRegionMut<'_, T>, edge: &IntraEdge<T>,
  w: usize, h: usize, bit_depth: usize,
) {
  let above = &edge.above()[..w + h];
  let left = &edge.left()[..w + h];
  match mode {
    PredictionMode::DC_PRED | PredictionMode::UV_CFL_PRED => {
      match (edge.have_above, edge.have_left) {
        (true, true) => pred_dc(dst, above, left, w, h),
        (true, false) => pred_dc_top(dst, above, w, h),
        (false, true) => pred_dc_left(dst, left, w, h),
        (false, false) => pred_dc_128(dst, w, h, bit_depth),
      }
    }
    PredictionMode::V_PRED => pred_v(dst, above, w, h),
    PredictionMode::H_PRED => pred_h(dst, left, w, h),
    PredictionMode::PAETH_PRED => {
      pred_paeth(dst, above, left, edge.top_left(), w, h)
    }
    PredictionMode::SMOOTH_PRED => pred_smooth(dst, above, left, w, h),
    PredictionMode::SMOOTH_V_PRED => pred_smooth_v(dst, above, left, w, h),
    PredictionMode::SMOOTH_H_PRED => pred_smooth_h(dst, above, left, w, h),
    PredictionMode::D45_PRED
    | PredictionMode::D67_PRED
    | PredictionMode::D113_PRED
    | PredictionMode::D135_PRED
    | PredictionMode::D157_PRED
    | PredictionMode::D203_PRED => {
      pred_directional(dst, edge, w, h, mode.angle(), bit_depth)
    }
    _ => unreachable!("{:?} is not an intra mode", mode),
  }
}

fn fill<T: Pixel>(dst: &mut PlaneRegionMut<'_, T>, w: usize, h: usize, v: T) {
  for line in dst.rows_iter_mut().take(h) {
    line[..w].fill(v);
  }
}

pub fn pred_dc<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, above: &[T], left: &[T], w: usize,
  h: usize,
) {
  let edges = left[..h].iter().chain(above[..w].iter());
  let len = (w + h) as u32;
  let avg = (edges.fold(0, |acc, &v| acc + u32::cast_from(v)) + (len >> 1))
    / len;
  fill(dst, w, h, T::cast_from(avg));
}

pub fn pred_dc_128<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, w: usize, h: usize, bit_depth: usize,
) {
  fill(dst, w, h, T::cast_from(128u32 << (bit_depth - 8)));
}

pub fn pred_dc_left<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, left: &[T], w: usize, h: usize,
) {
  let sum = left[..h].iter().fold(0u32, |acc, &v| acc + u32::cast_from(v));
  let avg = (sum + (h >> 1) as u32) >> h.ilog2();
  fill(dst, w, h, T::cast_from(avg));
}

pub fn pred_dc_top<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, above: &[T], w: usize, h: usize,
) {
  let sum = above[..w].iter().fold(0u32, |acc, &v| acc + u32::cast_from(v));
  let avg = (sum + (w >> 1) as u32) >> w.ilog2();
  fill(dst, w, h, T::cast_from(avg));
}

pub fn pred_h<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, left: &[T], w: usize, h: usize,
) {
  for (line, l) in dst.rows_iter_mut().zip(left[..h].iter()) {
    line[..w].fill(*l);
  }
}

pub fn pred_v<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, above: &[T], w: usize, h: usize,
) {
  for line in dst.rows_iter_mut().take(h) {
    line[..w].copy_from_slice(&above[..w])
  }
}

pub fn pred_paeth<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, above: &[T], left: &[T], above_left: T,
  w: usize, h: usize,
) {
  for r in 0..h {
    let row = &mut dst[r];
    for c in 0..w {
      // Top-left pixel is fixed in libaom
      let raw_top_left: i32 = above_left.into();
      let raw_left: i32 = left[r].into();
      let raw_top: i32 = above[c].into();

      let p_base = raw_top + raw_left - raw_top_left;
      let p_left = (p_base - raw_left).abs();
      let p_top = (p_base - raw_top).abs();
      let p_top_left = (p_base - raw_top_left).abs();

      // Return nearest to base of left, top and top_left
      row[c] = if p_left <= p_top && p_left <= p_top_left {
        T::cast_from(raw_left)
      } else if p_top <= p_top_left {
        T::cast_from(raw_top)
      } else {
        T::cast_from(raw_top_left)
      };
    }
  }
}

pub fn pred_smooth<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, above: &[T], left: &[T], w: usize,
  h: usize,
) {
  let below_pred = left[h - 1]; // estimated by bottom-left pixel
  let right_pred = above[w - 1]; // estimated by top-right pixel
  let sm_weights_w = &sm_weight_arrays[w..];
  let sm_weights_h = &sm_weight_arrays[h..];

  let log2_scale = 1 + sm_weight_log2_scale;
  let scale = 1_u16 << sm_weight_log2_scale;

  for r in 0..h {
    let row = &mut dst[r];
    for c in 0..w {
      let pixels = [above[c], below_pred, left[r], right_pred];

      let weights = [
        sm_weights_h[r] as u16,
        scale - sm_weights_h[r] as u16,
        sm_weights_w[c] as u16,
        scale - sm_weights_w[c] as u16,
      ];

      // Sum up weighted pixels
      let mut this_pred: u32 = weights
        .iter()
        .zip(pixels.iter())
        .map(|(w, p)| (*w as u32) * u32::cast_from(*p))
        .sum();
      this_pred = (this_pred + (1 << (log2_scale - 1))) >> log2_scale;

      row[c] = T::cast_from(this_pred);
    }
  }
}

pub fn pred_smooth_h<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, above: &[T], left: &[T], w: usize,
  h: usize,
) {
  let right_pred = above[w - 1]; // estimated by top-right pixel
  let sm_weights = &sm_weight_arrays[w..];

  let log2_scale = sm_weight_log2_scale;
  let scale = 1_u16 << sm_weight_log2_scale;

  for r in 0..h {
    let row = &mut dst[r];
    for c in 0..w {
      let pixels = [left[r], right_pred];
      let weights = [sm_weights[c] as u16, scale - sm_weights[c] as u16];

      let mut this_pred: u32 = weights
        .iter()
        .zip(pixels.iter())
        .map(|(w, p)| (*w as u32) * u32::cast_from(*p))
        .sum();
      this_pred = (this_pred + (1 << (log2_scale - 1))) >> log2_scale;

      row[c] = T::cast_from(this_pred);
    }
  }
}

pub fn pred_smooth_v<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, above: &[T], left: &[T], w: usize,
  h: usize,
) {
  let below_pred = left[h - 1]; // estimated by bottom-left pixel
  let sm_weights = &sm_weight_arrays[h..];

  let log2_scale = sm_weight_log2_scale;
  let scale = 1_u16 << sm_weight_log2_scale;

  for r in 0..h {
    let row = &mut dst[r];
    for c in 0..w {
      let pixels = [above[c], below_pred];
      let weights = [sm_weights[r] as u16, scale - sm_weights[r] as u16];

      let mut this_pred: u32 = weights
        .iter()
        .zip(pixels.iter())
        .map(|(w, p)| (*w as u32) * u32::cast_from(*p))
        .sum();
      this_pred = (this_pred + (1 << (log2_scale - 1))) >> log2_scale;

      row[c] = T::cast_from(this_pred);
    }
  }
}

/// Directional prediction along `angle` without edge filtering or
/// upsampling.
pub fn pred_directional<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, edge: &IntraEdge<T>, w: usize, h: usize,
  angle: isize, bit_depth: usize,
) {
  // Both arrays start at the top-left sample.
  let above_ext = &edge.above[..];
  let left_ext = &edge.left[..];
  let sample = |edge: &[T], base: i32, shift: i32| -> i32 {
    let a: i32 = edge[(base + 1) as usize].into();
    let b: i32 = edge[(base + 2) as usize].into();
    round_shift(a * (32 - shift) + b * shift, 5)
  };
  let max_val = pixel_max(bit_depth);
  let max_base = (w + h - 1) as i32;

  for r in 0..h {
    let row = &mut dst[r];
    for c in 0..w {
      let (i, j) = (r as i32, c as i32);
      let v = if angle < 90 {
        let dx = dr_intra_derivative(angle);
        let idx = (i + 1) * dx;
        let base = (idx >> 6) + j;
        if base < max_base {
          sample(above_ext, base, (idx >> 1) & 0x1F)
        } else {
          above_ext[max_base as usize + 1].into()
        }
      } else if angle < 180 {
        let dx = dr_intra_derivative(180 - angle);
        let dy = dr_intra_derivative(angle - 90);
        let idx = (j << 6) - (i + 1) * dx;
        let base = idx >> 6;
        if base >= -1 {
          sample(above_ext, base, (idx >> 1) & 0x1F)
        } else {
          let idx = (i << 6) - (j + 1) * dy;
          sample(left_ext, idx >> 6, (idx >> 1) & 0x1F)
        }
      } else {
        let dy = dr_intra_derivative(270 - angle);
        let idx = (j + 1) * dy;
        let base = (idx >> 6) + i;
        if base < max_base {
          sample(left_ext, base, (idx >> 1) & 0x1F)
        } else {
          left_ext[max_base as usize + 1].into()
        }
      };
      row[c] = T::cast_from(v.clamp(0, max_val));
    }
  }
}
