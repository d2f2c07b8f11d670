// Copyright (c) 2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::frame::*;
use crate::mc::{predict_inter, FilterMode, MotionVector};
use crate::me::{full_search, subpel_refine};
use crate::tiling::*;
use crate::util::*;

use super::{TF_BLOCK_SIZE, TF_SUBBLOCKS, TF_SUBBLOCK_SIZE};

/// Side of the blocks motion is first searched for.
pub const TF_SEARCH_SIZE: usize = 32;
/// Full-pel search range around the zero vector, in luma samples.
const TF_SEARCH_RANGE: isize = 12;
/// Full-pel search range of a sub-block around its parent's vector.
const TF_SUBBLOCK_RANGE: isize = 3;

/// Motion of the 16x16 sub-blocks of one filtered block, raster order.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockMotion {
  pub mvs: [MotionVector; TF_SUBBLOCKS],
  /// Squared error of each sub-block prediction, luma.
  pub errors: [u64; TF_SUBBLOCKS],
}

impl BlockMotion {
  /// Index of the sub-block covering luma sample (`x`, `y`) of the block.
  #[inline]
  pub fn subblock(x: usize, y: usize) -> usize {
    let per_row = TF_BLOCK_SIZE / TF_SUBBLOCK_SIZE;
    (y / TF_SUBBLOCK_SIZE) * per_row + x / TF_SUBBLOCK_SIZE
  }
}

/// Whether the four sub-block searches of a 32x32 block do not improve on
/// the block search enough to pay for their extra vectors.
///
/// Either condition keeps the block whole: its error within 1/15 of the
/// sub-block sum with a moderate spread between sub-blocks, or within
/// 1/7 with a small spread.
pub fn keep_whole(
  block_error: u64, sub_errors: &[u64; 4], bit_depth: usize,
) -> bool {
  let shift = 2 * (bit_depth - 8);
  let sum: u64 = sub_errors.iter().sum();
  let max = sub_errors.iter().copied().max().unwrap_or(0);
  let min = sub_errors.iter().copied().min().unwrap_or(0);
  let spread = max - min;

  (block_error * 15 < sum * 16 && spread < 10000 << shift)
    || (block_error * 14 < sum * 16 && spread < 6000 << shift)
}

#[inline]
fn quadrant_offset(i: usize) -> (usize, usize) {
  ((i & 1) * TF_SUBBLOCK_SIZE, (i >> 1) * TF_SUBBLOCK_SIZE)
}

fn search<T: Pixel>(
  org: &Plane<T>, reference: &Plane<T>, po: PlaneOffset, size: usize,
  center: MotionVector, range: isize, filter: FilterMode, bit_depth: usize,
) -> (MotionVector, u64) {
  let area = Area::Rect { x: po.x, y: po.y, width: size, height: size };
  let org = org.region(area);
  let (mv, _) = full_search(
    &org,
    reference,
    po,
    size,
    size,
    center.quantize_to_fullpel(),
    range,
  );
  subpel_refine(&org, reference, po, size, size, mv, filter, bit_depth)
}

/// Searches the motion of the 64x64 luma block at `po` of `org` in
/// `reference`.
///
/// Each 32x32 quadrant is searched around the zero vector, then each of
/// its 16x16 sub-blocks around the quadrant's vector. A quadrant whose
/// sub-block vectors do not pay off hands its own vector to all of them.
pub fn search_block<T: Pixel>(
  org: &Plane<T>, reference: &Plane<T>, po: PlaneOffset, filter: FilterMode,
  bit_depth: usize,
) -> BlockMotion {
  let mut motion = BlockMotion::default();
  let quadrants = TF_BLOCK_SIZE / TF_SEARCH_SIZE;

  for qy in 0..quadrants {
    for qx in 0..quadrants {
      let (x, y) = (qx * TF_SEARCH_SIZE, qy * TF_SEARCH_SIZE);
      let qpo = PlaneOffset { x: po.x + x as isize, y: po.y + y as isize };
      let (mv, error) = search(
        org,
        reference,
        qpo,
        TF_SEARCH_SIZE,
        MotionVector::default(),
        TF_SEARCH_RANGE,
        filter,
        bit_depth,
      );

      let mut sub_mvs = [MotionVector::default(); 4];
      let mut sub_errors = [0u64; 4];
      for (i, (sub_mv, sub_error)) in
        sub_mvs.iter_mut().zip(sub_errors.iter_mut()).enumerate()
      {
        let (sx, sy) = quadrant_offset(i);
        let spo =
          PlaneOffset { x: qpo.x + sx as isize, y: qpo.y + sy as isize };
        (*sub_mv, *sub_error) = search(
          org,
          reference,
          spo,
          TF_SUBBLOCK_SIZE,
          mv,
          TF_SUBBLOCK_RANGE,
          filter,
          bit_depth,
        );
      }

      let whole = keep_whole(error, &sub_errors, bit_depth);
      for i in 0..4 {
        let (sx, sy) = quadrant_offset(i);
        let k = BlockMotion::subblock(x + sx, y + sy);
        if whole {
          motion.mvs[k] = mv;
          motion.errors[k] = error >> 2;
        } else {
          motion.mvs[k] = sub_mvs[i];
          motion.errors[k] = sub_errors[i];
        }
      }
    }
  }
  motion
}

/// Writes the motion compensated prediction of the 64x64 block at `po`
/// into `pred`, sub-block by sub-block, for plane `p`.
///
/// `po` is in luma samples; chroma planes use the same vectors.
pub fn predict_block<T: Pixel>(
  pred: &mut Plane<T>, reference: &Picture<T>, p: usize, po: PlaneOffset,
  motion: &BlockMotion, filter: FilterMode, bit_depth: usize,
) {
  let PlaneConfig { xdec, ydec, .. } = reference.planes[p].cfg;
  let (w, h) = (TF_SUBBLOCK_SIZE >> xdec, TF_SUBBLOCK_SIZE >> ydec);
  let per_row = TF_BLOCK_SIZE / TF_SUBBLOCK_SIZE;

  for (k, &mv) in motion.mvs.iter().enumerate() {
    let (x, y) = ((k % per_row) * w, (k / per_row) * h);
    let spo = PlaneOffset {
      x: (po.x >> xdec) + x as isize,
      y: (po.y >> ydec) + y as isize,
    };
    let mut dst = pred.region_mut(Area::Rect {
      x: x as isize,
      y: y as isize,
      width: w,
      height: h,
    });
    predict_inter(
      &mut dst,
      &[(&reference.planes[p], mv)],
      spo,
      w,
      h,
      filter,
      bit_depth,
    );
  }
}
