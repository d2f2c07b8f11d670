// Copyright (c) 2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::context::SuperBlockOffset;
use crate::encoder::{FinalizedSuperblock, TransformUnit};
use crate::tiling::PlaneRegion;
use crate::util::Pixel;

/// Hooks into the coding loop for inspecting intermediate buffers.
///
/// Every method defaults to doing nothing, so the coding loop compiles
/// down to the plain reconstruction with `NoopObserver`.
pub trait ReconObserver<T: Pixel> {
  /// A transform block was reconstructed. `levels` holds its quantized
  /// coefficients and `recon` the reconstructed samples.
  fn transform_block(
    &mut self, _tu: &TransformUnit, _levels: &[i32],
    _recon: &PlaneRegion<'_, T>,
  ) {
  }

  /// A superblock was finalized.
  fn superblock(&mut self, _sbo: SuperBlockOffset, _sb: &FinalizedSuperblock) {
  }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl<T: Pixel> ReconObserver<T> for NoopObserver {}
