// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

pub const MAX_SB_SIZE_LOG2: usize = 7;
pub const MAX_SB_SIZE: usize = 1 << MAX_SB_SIZE_LOG2;

pub const MI_SIZE_LOG2: usize = 2;
pub const MAX_MIB_SIZE_LOG2: usize = MAX_SB_SIZE_LOG2 - MI_SIZE_LOG2;
pub const MAX_MIB_SIZE: usize = 1 << MAX_MIB_SIZE_LOG2;

pub const BLOCK_TO_PLANE_SHIFT: usize = MI_SIZE_LOG2;

/// Size of the largest coding unit of a picture.
///
/// Chosen once per sequence; every superblock-dependent shift goes through
/// this type instead of a compile-time constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SuperblockSize {
  Sb64,
  Sb128,
}

impl SuperblockSize {
  #[inline]
  pub const fn log2(self) -> usize {
    match self {
      SuperblockSize::Sb64 => 6,
      SuperblockSize::Sb128 => 7,
    }
  }

  #[inline]
  pub const fn width(self) -> usize {
    1 << self.log2()
  }

  /// Superblock size in 4x4 luma units, log2.
  #[inline]
  pub const fn mib_log2(self) -> usize {
    self.log2() - MI_SIZE_LOG2
  }

  #[inline]
  pub const fn mib_size(self) -> usize {
    1 << self.mib_log2()
  }

  #[inline]
  pub const fn block_size(self) -> BlockSize {
    match self {
      SuperblockSize::Sb64 => BlockSize::BLOCK_64X64,
      SuperblockSize::Sb128 => BlockSize::BLOCK_128X128,
    }
  }

  pub const fn from_width(width: usize) -> Option<Self> {
    match width {
      64 => Some(SuperblockSize::Sb64),
      128 => Some(SuperblockSize::Sb128),
      _ => None,
    }
  }

  /// Number of superblocks needed to cover `len` luma samples.
  #[inline]
  pub const fn count(self, len: usize) -> usize {
    (len + self.width() - 1) >> self.log2()
  }
}

impl Default for SuperblockSize {
  fn default() -> Self {
    SuperblockSize::Sb64
  }
}

/// Absolute offset in superblocks, where a superblock is a square of
/// `SuperblockSize::width()` luma samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SuperBlockOffset {
  pub x: usize,
  pub y: usize,
}

impl SuperBlockOffset {
  /// Offset of a block inside the current superblock.
  #[inline]
  pub const fn block_offset(
    self, sb_size: SuperblockSize, block_x: usize, block_y: usize,
  ) -> BlockOffset {
    BlockOffset {
      x: (self.x << sb_size.mib_log2()) + block_x,
      y: (self.y << sb_size.mib_log2()) + block_y,
    }
  }

  /// Offset of the top-left pixel of this superblock.
  #[inline]
  pub const fn plane_offset(
    self, sb_size: SuperblockSize, plane: &PlaneConfig,
  ) -> PlaneOffset {
    PlaneOffset {
      x: (self.x as isize) << (sb_size.log2() - plane.xdec),
      y: (self.y as isize) << (sb_size.log2() - plane.ydec),
    }
  }

  /// Translates a superblock-relative luma position into block units.
  #[inline]
  pub const fn with_relative(
    self, sb_size: SuperblockSize, rel: SbRelativeOffset,
  ) -> BlockOffset {
    self.block_offset(
      sb_size,
      rel.x >> BLOCK_TO_PLANE_SHIFT,
      rel.y >> BLOCK_TO_PLANE_SHIFT,
    )
  }
}

/// Luma sample offset relative to the origin of the enclosing superblock.
///
/// Geometry records are expressed in this space; it must be combined with a
/// `SuperBlockOffset` before it can address a picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SbRelativeOffset {
  pub x: usize,
  pub y: usize,
}

impl SbRelativeOffset {
  /// Same position in the samples of a subsampled plane.
  #[inline]
  pub const fn decimated(self, xdec: usize, ydec: usize) -> Self {
    SbRelativeOffset { x: self.x >> xdec, y: self.y >> ydec }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn superblock_shifts_follow_size() {
    assert_eq!(SuperblockSize::Sb64.mib_size(), 16);
    assert_eq!(SuperblockSize::Sb128.mib_size(), 32);
    assert_eq!(SuperblockSize::Sb64.count(65), 2);
    assert_eq!(SuperblockSize::Sb128.count(128), 1);

    let sbo = SuperBlockOffset { x: 2, y: 1 };
    let bo = sbo.with_relative(
      SuperblockSize::Sb64,
      SbRelativeOffset { x: 8, y: 60 },
    );
    assert_eq!(bo, BlockOffset { x: 34, y: 31 });
    assert_eq!(bo.sb_offset(SuperblockSize::Sb64), sbo);
  }
}
