// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::context::MAX_SB_SIZE;
use crate::frame::*;
use crate::tiling::*;
use crate::util::*;

use std::ops;

/// Motion vectors are limited to +/- 2048 luma pixels.
pub const MV_LOW: i32 = -(1 << 14);
pub const MV_UPP: i32 = 1 << 14;

/// Displacement in 1/8 luma pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MotionVector {
  pub row: i16,
  pub col: i16,
}

impl MotionVector {
  #[inline]
  pub const fn quantize_to_fullpel(self) -> Self {
    Self { row: (self.row / 8) * 8, col: (self.col / 8) * 8 }
  }

  #[inline]
  pub const fn is_valid(self) -> bool {
    ((MV_LOW as i16) < self.row && self.row < (MV_UPP as i16))
      && ((MV_LOW as i16) < self.col && self.col < (MV_UPP as i16))
  }

  /// Squared length, in 1/64 square pixels.
  #[inline]
  pub const fn length_sqr(self) -> u32 {
    let (r, c) = (self.row as i32, self.col as i32);
    (r * r + c * c) as u32
  }
}

impl ops::Mul<i16> for MotionVector {
  type Output = MotionVector;

  #[inline]
  fn mul(self, rhs: i16) -> MotionVector {
    MotionVector { row: self.row * rhs, col: self.col * rhs }
  }
}

impl ops::Shr<u8> for MotionVector {
  type Output = MotionVector;

  #[inline]
  fn shr(self, rhs: u8) -> MotionVector {
    MotionVector { row: self.row >> rhs, col: self.col >> rhs }
  }
}

impl ops::Shl<u8> for MotionVector {
  type Output = MotionVector;

  #[inline]
  fn shl(self, rhs: u8) -> MotionVector {
    MotionVector { row: self.row << rhs, col: self.col << rhs }
  }
}

impl ops::Add<MotionVector> for MotionVector {
  type Output = MotionVector;

  #[inline]
  fn add(self, rhs: MotionVector) -> MotionVector {
    MotionVector { row: self.row + rhs.row, col: self.col + rhs.col }
  }
}

impl ops::Sub<MotionVector> for MotionVector {
  type Output = MotionVector;

  #[inline]
  fn sub(self, rhs: MotionVector) -> MotionVector {
    MotionVector { row: self.row - rhs.row, col: self.col - rhs.col }
  }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd)]
pub enum FilterMode {
  #[default]
  REGULAR = 0,
  SMOOTH = 1,
  SHARP = 2,
  BILINEAR = 3,
}

pub const SUBPEL_FILTER_SIZE: usize = 8;

const SUBPEL_FILTERS: [[[i32; SUBPEL_FILTER_SIZE]; 16]; 6] = [
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 2, -6, 126, 8, -2, 0, 0],
    [0, 2, -10, 122, 18, -4, 0, 0],
    [0, 2, -12, 116, 28, -8, 2, 0],
    [0, 2, -14, 110, 38, -10, 2, 0],
    [0, 2, -14, 102, 48, -12, 2, 0],
    [0, 2, -16, 94, 58, -12, 2, 0],
    [0, 2, -14, 84, 66, -12, 2, 0],
    [0, 2, -14, 76, 76, -14, 2, 0],
    [0, 2, -12, 66, 84, -14, 2, 0],
    [0, 2, -12, 58, 94, -16, 2, 0],
    [0, 2, -12, 48, 102, -14, 2, 0],
    [0, 2, -10, 38, 110, -14, 2, 0],
    [0, 2, -8, 28, 116, -12, 2, 0],
    [0, 0, -4, 18, 122, -10, 2, 0],
    [0, 0, -2, 8, 126, -6, 2, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 2, 28, 62, 34, 2, 0, 0],
    [0, 0, 26, 62, 36, 4, 0, 0],
    [0, 0, 22, 62, 40, 4, 0, 0],
    [0, 0, 20, 60, 42, 6, 0, 0],
    [0, 0, 18, 58, 44, 8, 0, 0],
    [0, 0, 16, 56, 46, 10, 0, 0],
    [0, -2, 16, 54, 48, 12, 0, 0],
    [0, -2, 14, 52, 52, 14, -2, 0],
    [0, 0, 12, 48, 54, 16, -2, 0],
    [0, 0, 10, 46, 56, 16, 0, 0],
    [0, 0, 8, 44, 58, 18, 0, 0],
    [0, 0, 6, 42, 60, 20, 0, 0],
    [0, 0, 4, 40, 62, 22, 0, 0],
    [0, 0, 4, 36, 62, 26, 0, 0],
    [0, 0, 2, 34, 62, 28, 2, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [-2, 2, -6, 126, 8, -2, 2, 0],
    [-2, 6, -12, 124, 16, -6, 4, -2],
    [-2, 8, -18, 120, 26, -10, 6, -2],
    [-4, 10, -22, 116, 38, -14, 6, -2],
    [-4, 10, -22, 108, 48, -18, 8, -2],
    [-4, 10, -24, 100, 60, -20, 8, -2],
    [-4, 10, -24, 90, 70, -22, 10, -2],
    [-4, 12, -24, 80, 80, -24, 12, -4],
    [-2, 10, -22, 70, 90, -24, 10, -4],
    [-2, 8, -20, 60, 100, -24, 10, -4],
    [-2, 8, -18, 48, 108, -22, 10, -4],
    [-2, 6, -14, 38, 116, -22, 10, -4],
    [-2, 6, -10, 26, 120, -18, 8, -2],
    [-2, 4, -6, 16, 124, -12, 6, -2],
    [0, 2, -2, 8, 126, -6, 2, -2],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 0, 0, 120, 8, 0, 0, 0],
    [0, 0, 0, 112, 16, 0, 0, 0],
    [0, 0, 0, 104, 24, 0, 0, 0],
    [0, 0, 0, 96, 32, 0, 0, 0],
    [0, 0, 0, 88, 40, 0, 0, 0],
    [0, 0, 0, 80, 48, 0, 0, 0],
    [0, 0, 0, 72, 56, 0, 0, 0],
    [0, 0, 0, 64, 64, 0, 0, 0],
    [0, 0, 0, 56, 72, 0, 0, 0],
    [0, 0, 0, 48, 80, 0, 0, 0],
    [0, 0, 0, 40, 88, 0, 0, 0],
    [0, 0, 0, 32, 96, 0, 0, 0],
    [0, 0, 0, 24, 104, 0, 0, 0],
    [0, 0, 0, 16, 112, 0, 0, 0],
    [0, 0, 0, 8, 120, 0, 0, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 0, -4, 126, 8, -2, 0, 0],
    [0, 0, -8, 122, 18, -4, 0, 0],
    [0, 0, -10, 116, 28, -6, 0, 0],
    [0, 0, -12, 110, 38, -8, 0, 0],
    [0, 0, -12, 102, 48, -10, 0, 0],
    [0, 0, -14, 94, 58, -10, 0, 0],
    [0, 0, -12, 84, 66, -10, 0, 0],
    [0, 0, -12, 76, 76, -12, 0, 0],
    [0, 0, -10, 66, 84, -12, 0, 0],
    [0, 0, -10, 58, 94, -14, 0, 0],
    [0, 0, -10, 48, 102, -12, 0, 0],
    [0, 0, -8, 38, 110, -12, 0, 0],
    [0, 0, -6, 28, 116, -10, 0, 0],
    [0, 0, -4, 18, 122, -8, 0, 0],
    [0, 0, -2, 8, 126, -4, 0, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 0, 30, 62, 34, 2, 0, 0],
    [0, 0, 26, 62, 36, 4, 0, 0],
    [0, 0, 22, 62, 40, 4, 0, 0],
    [0, 0, 20, 60, 42, 6, 0, 0],
    [0, 0, 18, 58, 44, 8, 0, 0],
    [0, 0, 16, 56, 46, 10, 0, 0],
    [0, 0, 14, 54, 48, 12, 0, 0],
    [0, 0, 12, 52, 52, 12, 0, 0],
    [0, 0, 12, 48, 54, 14, 0, 0],
    [0, 0, 10, 46, 56, 16, 0, 0],
    [0, 0, 8, 44, 58, 18, 0, 0],
    [0, 0, 6, 42, 60, 20, 0, 0],
    [0, 0, 4, 40, 62, 22, 0, 0],
    [0, 0, 4, 36, 62, 26, 0, 0],
    [0, 0, 2, 34, 62, 30, 0, 0],
  ],
];

const INTERMEDIATE_BITS: usize = 4;

// HBD output interval is [-20588, 36956] (10-bit).
// Subtract PREP_BIAS to ensure result fits in i16.
const PREP_BIAS: i32 = 8192;

fn get_filter(
  mode: FilterMode, frac: i32, length: usize,
) -> [i32; SUBPEL_FILTER_SIZE] {
  let filter_idx = if mode == FilterMode::BILINEAR || length > 4 {
    mode as usize
  } else if mode == FilterMode::SMOOTH {
    5
  } else {
    4
  };
  SUBPEL_FILTERS[filter_idx][frac as usize]
}

#[inline(always)]
fn filter_h<T: Pixel>(row: &[T], filter: &[i32; SUBPEL_FILTER_SIZE]) -> i32 {
  filter.iter().zip(row).map(|(&f, &p)| f * i32::cast_from(p)).sum()
}

#[inline(always)]
fn filter_v<T: Pixel>(
  src: &PlaneRegion<'_, T>, r: usize, c: usize,
  filter: &[i32; SUBPEL_FILTER_SIZE],
) -> i32 {
  filter
    .iter()
    .enumerate()
    .map(|(k, &f)| f * i32::cast_from(src[r + k][c]))
    .sum()
}

#[inline(always)]
fn filter_tmp(
  tmp: &[i16], r: usize, c: usize, filter: &[i32; SUBPEL_FILTER_SIZE],
) -> i32 {
  filter
    .iter()
    .enumerate()
    .map(|(k, &f)| f * tmp[8 * (r + k) + c] as i32)
    .sum()
}

/// Runs the horizontal pass of a 2D filter over columns `cg..cg + 8` into
/// `intermediate`, eight entries per row.
fn filter_h_pass<T: Pixel>(
  intermediate: &mut [i16], src: &PlaneRegion<'_, T>, cg: usize,
  width: usize, height: usize, x_filter: &[i32; SUBPEL_FILTER_SIZE],
) {
  for r in 0..height + SUBPEL_FILTER_SIZE - 1 {
    let src_row = &src[r];
    for c in cg..(cg + 8).min(width) {
      intermediate[8 * r + (c - cg)] = round_shift(
        filter_h(&src_row[c..], x_filter),
        7 - INTERMEDIATE_BITS,
      ) as i16;
    }
  }
}

/// Sub-pixel interpolation of a `width`x`height` block into `dst`.
///
/// `src` starts three rows above and three columns left of the integer
/// position of the block, so it covers the whole filter support.
/// Fractions are in 1/16 sample.
pub fn put_8tap<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, src: &PlaneRegion<'_, T>, width: usize,
  height: usize, col_frac: i32, row_frac: i32, mode_x: FilterMode,
  mode_y: FilterMode, bit_depth: usize,
) {
  debug_assert!(width <= MAX_SB_SIZE && height <= MAX_SB_SIZE);

  let y_filter = get_filter(mode_y, row_frac, height);
  let x_filter = get_filter(mode_x, col_frac, width);
  let max_sample_val = pixel_max(bit_depth);
  match (col_frac, row_frac) {
    (0, 0) => {
      for r in 0..height {
        dst[r][..width].copy_from_slice(&src[r + 3][3..width + 3]);
      }
    }
    (0, _) => {
      for r in 0..height {
        let dst_row = &mut dst[r];
        for c in 0..width {
          dst_row[c] = T::cast_from(
            round_shift(filter_v(src, r, c + 3, &y_filter), 7)
              .clamp(0, max_sample_val),
          );
        }
      }
    }
    (_, 0) => {
      for r in 0..height {
        let src_row = &src[r + 3];
        let dst_row = &mut dst[r];
        for c in 0..width {
          dst_row[c] = T::cast_from(
            round_shift(
              round_shift(
                filter_h(&src_row[c..], &x_filter),
                7 - INTERMEDIATE_BITS,
              ),
              INTERMEDIATE_BITS,
            )
            .clamp(0, max_sample_val),
          );
        }
      }
    }
    (_, _) => {
      let mut intermediate = [0i16; 8 * (MAX_SB_SIZE + 7)];
      for cg in (0..width).step_by(8) {
        filter_h_pass(&mut intermediate, src, cg, width, height, &x_filter);
        for r in 0..height {
          let dst_row = &mut dst[r];
          for c in cg..(cg + 8).min(width) {
            dst_row[c] = T::cast_from(
              round_shift(
                filter_tmp(&intermediate, r, c - cg, &y_filter),
                7 + INTERMEDIATE_BITS,
              )
              .clamp(0, max_sample_val),
            );
          }
        }
      }
    }
  }
}

/// Like `put_8tap`, but keeps `INTERMEDIATE_BITS` of extra precision in
/// `tmp` (row-major, `width` entries per row) for averaging.
pub fn prep_8tap<T: Pixel>(
  tmp: &mut [i16], src: &PlaneRegion<'_, T>, width: usize, height: usize,
  col_frac: i32, row_frac: i32, mode_x: FilterMode, mode_y: FilterMode,
  bit_depth: usize,
) {
  debug_assert!(width <= MAX_SB_SIZE && height <= MAX_SB_SIZE);

  let y_filter = get_filter(mode_y, row_frac, height);
  let x_filter = get_filter(mode_x, col_frac, width);
  let prep_bias = if bit_depth == 8 { 0 } else { PREP_BIAS };
  match (col_frac, row_frac) {
    (0, 0) => {
      for r in 0..height {
        let src_row = &src[r + 3];
        for c in 0..width {
          tmp[r * width + c] = (i16::cast_from(src_row[c + 3])
            << INTERMEDIATE_BITS)
            - prep_bias as i16;
        }
      }
    }
    (0, _) => {
      for r in 0..height {
        for c in 0..width {
          tmp[r * width + c] = (round_shift(
            filter_v(src, r, c + 3, &y_filter),
            7 - INTERMEDIATE_BITS,
          ) - prep_bias) as i16;
        }
      }
    }
    (_, 0) => {
      for r in 0..height {
        let src_row = &src[r + 3];
        for c in 0..width {
          tmp[r * width + c] = (round_shift(
            filter_h(&src_row[c..], &x_filter),
            7 - INTERMEDIATE_BITS,
          ) - prep_bias) as i16;
        }
      }
    }
    (_, _) => {
      let mut intermediate = [0i16; 8 * (MAX_SB_SIZE + 7)];
      for cg in (0..width).step_by(8) {
        filter_h_pass(&mut intermediate, src, cg, width, height, &x_filter);
        for r in 0..height {
          for c in cg..(cg + 8).min(width) {
            tmp[r * width + c] = (round_shift(
              filter_tmp(&intermediate, r, c - cg, &y_filter),
              7,
            ) - prep_bias) as i16;
          }
        }
      }
    }
  }
}

/// Averages two `prep_8tap` outputs into `dst`.
pub fn mc_avg<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, tmp1: &[i16], tmp2: &[i16], width: usize,
  height: usize, bit_depth: usize,
) {
  let max_sample_val = pixel_max(bit_depth);
  let prep_bias = if bit_depth == 8 { 0 } else { PREP_BIAS * 2 };
  for r in 0..height {
    let dst_row = &mut dst[r];
    for c in 0..width {
      dst_row[c] = T::cast_from(
        round_shift(
          tmp1[r * width + c] as i32 + tmp2[r * width + c] as i32 + prep_bias,
          INTERMEDIATE_BITS + 1,
        )
        .clamp(0, max_sample_val),
      );
    }
  }
}

/// Splits `mv` for a block of plane `rec` at `po` into its sub-sample
/// fractions and the region covering the filter support.
///
/// Positions past the padding are clamped onto it, which reads the
/// replicated picture edge.
pub fn get_mv_params<'a, T: Pixel>(
  rec: &'a Plane<T>, po: PlaneOffset, mv: MotionVector, width: usize,
  height: usize,
) -> (i32, i32, PlaneRegion<'a, T>) {
  let &PlaneConfig { xdec, ydec, xorigin, yorigin, stride, alloc_height, .. } =
    &rec.cfg;
  let row_offset = mv.row as i32 >> (3 + ydec);
  let col_offset = mv.col as i32 >> (3 + xdec);
  let row_frac = ((mv.row as i32) << (1 - ydec)) & 0xf;
  let col_frac = ((mv.col as i32) << (1 - xdec)) & 0xf;

  let support_w = width + SUBPEL_FILTER_SIZE - 1;
  let support_h = height + SUBPEL_FILTER_SIZE - 1;
  let max_x = (stride - xorigin) as isize - support_w as isize;
  let max_y = (alloc_height - yorigin) as isize - support_h as isize;
  let x = (po.x + col_offset as isize - 3).clamp(-(xorigin as isize), max_x);
  let y = (po.y + row_offset as isize - 3).clamp(-(yorigin as isize), max_y);

  let region =
    rec.region(Area::Rect { x, y, width: support_w, height: support_h });
  (row_frac, col_frac, region)
}

/// Motion compensated prediction of the `width`x`height` block of a plane
/// at `po` from one reference, or the average of two.
///
/// # Panics
///
/// - If `refs` holds neither one nor two references.
pub fn predict_inter<T: Pixel>(
  dst: &mut PlaneRegionMut<'_, T>, refs: &[(&Plane<T>, MotionVector)],
  po: PlaneOffset, width: usize, height: usize, mode: FilterMode,
  bit_depth: usize,
) {
  match *refs {
    [(rec, mv)] => {
      let (row_frac, col_frac, src) =
        get_mv_params(rec, po, mv, width, height);
      put_8tap(
        dst, &src, width, height, col_frac, row_frac, mode, mode, bit_depth,
      );
    }
    [(rec0, mv0), (rec1, mv1)] => {
      let mut tmp: Aligned<[[i16; MAX_SB_SIZE * MAX_SB_SIZE]; 2]> =
        Aligned::new([[0; MAX_SB_SIZE * MAX_SB_SIZE]; 2]);
      for (i, &(rec, mv)) in [(rec0, mv0), (rec1, mv1)].iter().enumerate() {
        let (row_frac, col_frac, src) =
          get_mv_params(rec, po, mv, width, height);
        prep_8tap(
          &mut tmp.data[i],
          &src,
          width,
          height,
          col_frac,
          row_frac,
          mode,
          mode,
          bit_depth,
        );
      }
      mc_avg(dst, &tmp.data[0], &tmp.data[1], width, height, bit_depth);
    }
    _ => unreachable!("inter prediction takes one or two references"),
  }
}
