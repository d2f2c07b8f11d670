// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::mc::SUBPEL_FILTER_SIZE;
use crate::context::MAX_SB_SIZE;
use crate::util::*;

mod plane;
pub use plane::*;

pub const FRAME_MARGIN: usize = 16 + SUBPEL_FILTER_SIZE;
pub const LUMA_PADDING: usize = MAX_SB_SIZE + FRAME_MARGIN;

/// One picture: three padded planes plus the sample format.
///
/// Plane dimensions are the visible size rounded up to a multiple of 8, so
/// a block straddling the right or bottom edge always reads and writes
/// inside the allocation.
#[derive(Debug, Clone)]
pub struct Picture<T: Pixel> {
  pub planes: [Plane<T>; 3],
  /// Visible luma width
  pub width: usize,
  /// Visible luma height
  pub height: usize,
  pub bit_depth: usize,
  pub chroma_sampling: ChromaSampling,
}

impl<T: Pixel> Picture<T> {
  pub fn new(
    width: usize, height: usize, chroma_sampling: ChromaSampling,
    bit_depth: usize,
  ) -> Self {
    Self::new_with_padding(
      width,
      height,
      chroma_sampling,
      bit_depth,
      LUMA_PADDING,
    )
  }

  pub fn new_with_padding(
    width: usize, height: usize, chroma_sampling: ChromaSampling,
    bit_depth: usize, luma_padding: usize,
  ) -> Self {
    let luma_width = width.align_power_of_two(3);
    let luma_height = height.align_power_of_two(3);

    let (chroma_decimation_x, chroma_decimation_y) =
      chroma_sampling.get_decimation().unwrap_or((0, 0));
    let (chroma_width, chroma_height) =
      chroma_sampling.get_chroma_dimensions(luma_width, luma_height);
    let chroma_padding_x = luma_padding >> chroma_decimation_x;
    let chroma_padding_y = luma_padding >> chroma_decimation_y;

    let chroma = || {
      Plane::new(
        chroma_width,
        chroma_height,
        chroma_decimation_x,
        chroma_decimation_y,
        chroma_padding_x,
        chroma_padding_y,
      )
    };

    Picture {
      planes: [
        Plane::new(luma_width, luma_height, 0, 0, luma_padding, luma_padding),
        chroma(),
        chroma(),
      ],
      width,
      height,
      bit_depth,
      chroma_sampling,
    }
  }

  /// Number of coded planes: 1 for monochrome, 3 otherwise.
  #[inline]
  pub fn num_planes(&self) -> usize {
    if self.chroma_sampling == ChromaSampling::Cs400 {
      1
    } else {
      3
    }
  }

  /// Replicates the picture edges into the padding area of every plane.
  pub fn pad(&mut self) {
    let (w, h) = (self.width, self.height);
    let num_planes = self.num_planes();
    for p in self.planes[..num_planes].iter_mut() {
      p.pad(w, h);
    }
  }

  /// Visible dimensions of plane `p`.
  #[inline]
  pub fn plane_dimensions(&self, p: usize) -> (usize, usize) {
    let PlaneConfig { xdec, ydec, .. } = self.planes[p].cfg;
    ((self.width + xdec) >> xdec, (self.height + ydec) >> ydec)
  }

  /// Fills every visible sample of plane `p` from a closure of (x, y).
  pub fn fill_plane_with<F: FnMut(usize, usize) -> T>(
    &mut self, p: usize, f: F,
  ) {
    let (w, h) = self.plane_dimensions(p);
    fill_plane(&mut self.planes[p], w, h, f);
  }
}
