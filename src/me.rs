// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Block motion search: integer window search and sub-pixel refinement.

use crate::frame::*;
use crate::mc::*;
use crate::tiling::*;
use crate::util::*;

#[inline(always)]
pub fn get_sad<T: Pixel>(
  plane_org: &PlaneRegion<'_, T>, plane_ref: &PlaneRegion<'_, T>,
  blk_w: usize, blk_h: usize,
) -> u32 {
  let mut sum = 0u32;

  for (slice_org, slice_ref) in
    plane_org.rows_iter().take(blk_h).zip(plane_ref.rows_iter())
  {
    sum += slice_org[..blk_w]
      .iter()
      .zip(slice_ref)
      .map(|(&a, &b)| (i32::cast_from(a) - i32::cast_from(b)).unsigned_abs())
      .sum::<u32>();
  }

  sum
}

#[inline(always)]
pub fn get_sse<T: Pixel>(
  plane_org: &PlaneRegion<'_, T>, plane_ref: &PlaneRegion<'_, T>,
  blk_w: usize, blk_h: usize,
) -> u64 {
  plane_org.sse(plane_ref, blk_w, blk_h)
}

/// Integer displacements, in reference samples, keeping a `blk_w`x`blk_h`
/// block at `po` inside the padded reference plane.
fn get_mv_range<T: Pixel>(
  p_ref: &Plane<T>, po: PlaneOffset, blk_w: usize, blk_h: usize,
) -> (isize, isize, isize, isize) {
  let cfg = &p_ref.cfg;
  let x_min = -(cfg.xorigin as isize) - po.x;
  let y_min = -(cfg.yorigin as isize) - po.y;
  let x_max = (cfg.stride - cfg.xorigin - blk_w) as isize - po.x;
  let y_max = (cfg.alloc_height - cfg.yorigin - blk_h) as isize - po.y;
  (x_min, x_max, y_min, y_max)
}

/// Exhaustive integer search of the displacements within `range` samples
/// of `center` (a full-pel vector) minimizing the SAD.
///
/// Ties keep the candidate met first in raster order, so a zero residual
/// at the center is never displaced.
pub fn full_search<T: Pixel>(
  org: &PlaneRegion<'_, T>, p_ref: &Plane<T>, po: PlaneOffset, blk_w: usize,
  blk_h: usize, center: MotionVector, range: isize,
) -> (MotionVector, u32) {
  let (x_min, x_max, y_min, y_max) = get_mv_range(p_ref, po, blk_w, blk_h);
  let cx = (center.col >> 3) as isize;
  let cy = (center.row >> 3) as isize;

  let sad_at = |dx: isize, dy: isize| {
    let plane_ref = p_ref.region(Area::Rect {
      x: po.x + dx,
      y: po.y + dy,
      width: blk_w,
      height: blk_h,
    });
    get_sad(org, &plane_ref, blk_w, blk_h)
  };
  let to_mv = |dx: isize, dy: isize| MotionVector {
    row: (dy * 8) as i16,
    col: (dx * 8) as i16,
  };

  let (cx, cy) = (cx.clamp(x_min, x_max), cy.clamp(y_min, y_max));
  let mut best = (to_mv(cx, cy), sad_at(cx, cy));
  for dy in (cy - range).max(y_min)..=(cy + range).min(y_max) {
    for dx in (cx - range).max(x_min)..=(cx + range).min(x_max) {
      let sad = sad_at(dx, dy);
      if sad < best.1 {
        best = (to_mv(dx, dy), sad);
      }
    }
  }
  best
}

/// Squared error of the motion compensated prediction for `mv`.
///
/// `scratch` holds the prediction and must be at least `blk_w`x`blk_h`.
pub fn mv_error<T: Pixel>(
  org: &PlaneRegion<'_, T>, p_ref: &Plane<T>, po: PlaneOffset, blk_w: usize,
  blk_h: usize, mv: MotionVector, filter: FilterMode, bit_depth: usize,
  scratch: &mut Plane<T>,
) -> u64 {
  let mut pred = scratch.as_region_mut();
  predict_inter(
    &mut pred,
    &[(p_ref, mv)],
    po,
    blk_w,
    blk_h,
    filter,
    bit_depth,
  );
  get_sse(org, &pred.as_const(), blk_w, blk_h)
}

const SUBPEL_NEIGHBORS: [(i16, i16); 8] =
  [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];

/// Refines `center` to 1/8 pel by testing the eight neighbors of the
/// current best vector at 1/2, 1/4 and 1/8 pel in turn.
///
/// Returns the refined vector with its prediction error.
pub fn subpel_refine<T: Pixel>(
  org: &PlaneRegion<'_, T>, p_ref: &Plane<T>, po: PlaneOffset, blk_w: usize,
  blk_h: usize, center: MotionVector, filter: FilterMode, bit_depth: usize,
) -> (MotionVector, u64) {
  let mut scratch = Plane::new(blk_w, blk_h, 0, 0, 0, 0);
  let mut error = |mv: MotionVector| {
    mv_error(
      org,
      p_ref,
      po,
      blk_w,
      blk_h,
      mv,
      filter,
      bit_depth,
      &mut scratch,
    )
  };

  let mut best = (center, error(center));
  for step in [4i16, 2, 1] {
    let origin = best.0;
    for &(dr, dc) in SUBPEL_NEIGHBORS.iter() {
      let mv = MotionVector {
        row: origin.row + dr * step,
        col: origin.col + dc * step,
      };
      if !mv.is_valid() {
        continue;
      }
      let cost = error(mv);
      if cost < best.1 {
        best = (mv, cost);
      }
    }
  }
  best
}

#[cfg(test)]
pub mod test {
  use super::*;
  use crate::partition::BlockSize;
  use crate::partition::BlockSize::*;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  // Generate plane data for get_sad_same()
  fn setup_sad() -> (Plane<u16>, Plane<u16>) {
    let mut input_plane = Plane::new(640, 480, 0, 0, 128 + 8, 128 + 8);
    let mut rec_plane = input_plane.clone();

    fill_plane(&mut input_plane, 640, 480, |x, y| {
      ((x + y + 16) & 255) as u16
    });
    fill_plane(&mut rec_plane, 640, 480, |x, y| {
      ((x as i32 - y as i32) & 255) as u16
    });

    (input_plane, rec_plane)
  }

  // Regression and validation test for SAD computation
  #[test]
  fn get_sad_same() {
    let blocks: Vec<(BlockSize, u32)> = vec![
      (BLOCK_4X4, 1912),
      (BLOCK_4X8, 4296),
      (BLOCK_8X4, 3496),
      (BLOCK_8X8, 7824),
      (BLOCK_8X16, 16592),
      (BLOCK_16X8, 14416),
      (BLOCK_16X16, 31136),
      (BLOCK_16X32, 60064),
      (BLOCK_32X16, 59552),
      (BLOCK_32X32, 120128),
      (BLOCK_32X64, 186688),
      (BLOCK_64X32, 250176),
      (BLOCK_64X64, 438912),
      (BLOCK_64X128, 654272),
      (BLOCK_128X64, 1016768),
      (BLOCK_128X128, 1689792),
      (BLOCK_4X16, 8680),
      (BLOCK_16X4, 6664),
      (BLOCK_8X32, 31056),
      (BLOCK_32X8, 27600),
      (BLOCK_16X64, 93344),
      (BLOCK_64X16, 116384),
    ];

    let (input_plane, rec_plane) = setup_sad();

    for block in blocks {
      let bsw = block.0.width();
      let bsh = block.0.height();
      let area = Area::StartingAt { x: 40, y: 40 };

      let input_region = input_plane.region(area);
      let rec_region = rec_plane.region(area);

      assert_eq!(block.1, get_sad(&input_region, &rec_region, bsw, bsh));
    }
  }

  fn textured_plane(w: usize, h: usize) -> Plane<u8> {
    let mut ra = ChaChaRng::from_seed([7; 32]);
    let mut plane = Plane::new(w, h, 0, 0, 48, 48);
    fill_plane(&mut plane, w, h, |_, _| ra.gen_range(0u8..=255));
    plane.pad(w, h);
    plane
  }

  #[test]
  fn full_search_finds_integer_shift() {
    let p_ref = textured_plane(96, 96);
    let po = PlaneOffset { x: 32, y: 32 };
    // The block at (37, 29) of the reference is the source block.
    let org = p_ref.region(Area::Rect { x: 37, y: 29, width: 16, height: 16 });
    let (mv, sad) =
      full_search(&org, &p_ref, po, 16, 16, MotionVector::default(), 8);
    assert_eq!(sad, 0);
    assert_eq!(mv, MotionVector { row: -3 * 8, col: 5 * 8 });
  }

  #[test]
  fn full_search_stays_inside_the_padding() {
    let p_ref = textured_plane(32, 32);
    let org = p_ref.region(Area::Rect { x: 0, y: 0, width: 8, height: 8 });
    let (mv, sad) = full_search(
      &org,
      &p_ref,
      PlaneOffset { x: 0, y: 0 },
      8,
      8,
      MotionVector { row: -8 * 500, col: 8 * 500 },
      4,
    );
    assert!(sad > 0);
    assert!(mv.row < 0 && mv.col > 0);
  }

  #[test]
  fn subpel_refine_reaches_a_half_pel_vector() {
    let p_ref = textured_plane(64, 64);

    // Build the source as the prediction for a known half-pel vector.
    let target = MotionVector { row: 4, col: -4 };
    let po = PlaneOffset { x: 16, y: 16 };
    let mut org = Plane::<u8>::new(16, 16, 0, 0, 0, 0);
    predict_inter(
      &mut org.as_region_mut(),
      &[(&p_ref, target)],
      po,
      16,
      16,
      FilterMode::REGULAR,
      8,
    );

    let mut scratch = Plane::new(16, 16, 0, 0, 0, 0);
    let start = mv_error(
      &org.as_region(),
      &p_ref,
      po,
      16,
      16,
      MotionVector::default(),
      FilterMode::REGULAR,
      8,
      &mut scratch,
    );
    let (mv, err) = subpel_refine(
      &org.as_region(),
      &p_ref,
      po,
      16,
      16,
      MotionVector::default(),
      FilterMode::REGULAR,
      8,
    );
    assert!(start > 0);
    assert_eq!(err, 0);
    assert_eq!(mv, target);
  }

  #[test]
  fn subpel_refine_keeps_an_exact_center() {
    let p_ref = textured_plane(64, 64);
    let center = MotionVector { row: 16, col: -8 };
    let org = p_ref.region(Area::Rect { x: 15, y: 18, width: 8, height: 8 });
    let (mv, err) = subpel_refine(
      &org,
      &p_ref,
      PlaneOffset { x: 16, y: 16 },
      8,
      8,
      center,
      FilterMode::REGULAR,
      8,
    );
    assert_eq!((mv, err), (center, 0));
  }
}
