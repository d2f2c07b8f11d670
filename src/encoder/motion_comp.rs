// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use arrayvec::ArrayVec;

use crate::api::EncoderError;
use crate::context::SuperBlockOffset;
use crate::encoder::{CodingUnit, FrameInvariants, FrameState};
use crate::frame::*;
use crate::geometry::BlockGeom;
use crate::mc::{predict_inter, MotionVector};
use crate::tiling::*;
use crate::util::*;

/// Position and size of a block in plane `p`, picture-absolute.
pub(crate) fn block_rect(
  geom: &BlockGeom, sbo: SuperBlockOffset, sb_log2: usize, p: usize,
  cfg: &PlaneConfig,
) -> (PlaneOffset, usize, usize) {
  let sb_x = (sbo.x << sb_log2) >> cfg.xdec;
  let sb_y = (sbo.y << sb_log2) >> cfg.ydec;
  if p == 0 {
    let po = PlaneOffset {
      x: (sb_x + geom.origin.x) as isize,
      y: (sb_y + geom.origin.y) as isize,
    };
    (po, geom.bwidth, geom.bheight)
  } else {
    let po = PlaneOffset {
      x: (sb_x + geom.origin_uv.x) as isize,
      y: (sb_y + geom.origin_uv.y) as isize,
    };
    (po, geom.bwidth_uv, geom.bheight_uv)
  }
}

/// Writes the inter prediction of every plane of the block into the
/// reconstruction, before any of its transform blocks is coded.
///
/// # Errors
///
/// - Returns `EncoderError::MissingReference` if a reference picture the
///   block reads was not supplied.
pub fn motion_compensate<T: Pixel>(
  fi: &FrameInvariants<'_, T>, fs: &mut FrameState<T>, cu: &CodingUnit,
  geom: &BlockGeom, sbo: SuperBlockOffset, num_planes: usize,
) -> Result<(), EncoderError> {
  let refs = cu
    .references()
    .map(|(rf, mv)| fi.reference(rf, cu.luma_mode).map(|pic| (pic, mv)))
    .collect::<Result<ArrayVec<(&Picture<T>, MotionVector), 2>, _>>()?;

  for p in 0..num_planes {
    let cfg = &fs.rec.planes[p].cfg;
    let (po, w, h) = block_rect(geom, sbo, fi.sb_size.log2(), p, cfg);
    let planes: ArrayVec<(&Plane<T>, MotionVector), 2> =
      refs.iter().map(|&(pic, mv)| (&pic.planes[p], mv)).collect();
    let mut dst = fs.rec.planes[p].region_mut(Area::Rect {
      x: po.x,
      y: po.y,
      width: w,
      height: h,
    });
    predict_inter(&mut dst, &planes, po, w, h, fi.filter, fi.bit_depth);
  }
  Ok(())
}
