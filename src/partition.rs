// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_camel_case_types)]

use self::BlockSize::*;
use crate::context::*;
use crate::transform::{TxSize, MAX_TX_SIZE};
use thiserror::Error;

use std::fmt;

// LAST_FRAME through ALTREF_FRAME correspond to slots 0-6.
#[derive(PartialEq, Eq, PartialOrd, Copy, Clone, Debug, Default)]
pub enum RefType {
  #[default]
  INTRA_FRAME = 0,
  LAST_FRAME = 1,
  LAST2_FRAME = 2,
  LAST3_FRAME = 3,
  GOLDEN_FRAME = 4,
  BWDREF_FRAME = 5,
  ALTREF2_FRAME = 6,
  ALTREF_FRAME = 7,
  NONE_FRAME = 8,
}

pub const INTER_REFS_PER_FRAME: usize = 7;

impl RefType {
  /// Reference list slot, 0-6 (`INTER_REFS_PER_FRAME`), or `None` for the
  /// intra and none markers.
  #[inline]
  pub const fn to_index(self) -> Option<usize> {
    match self {
      RefType::INTRA_FRAME | RefType::NONE_FRAME => None,
      _ => Some(self as usize - 1),
    }
  }

  #[inline]
  pub const fn is_inter(self) -> bool {
    !matches!(self, RefType::INTRA_FRAME | RefType::NONE_FRAME)
  }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Debug, Hash)]
pub enum PartitionType {
  PARTITION_NONE,
  PARTITION_HORZ,
  PARTITION_VERT,
  PARTITION_SPLIT,
  PARTITION_HORZ_A, // HORZ split and the top partition is split again
  PARTITION_HORZ_B, // HORZ split and the bottom partition is split again
  PARTITION_VERT_A, // VERT split and the left partition is split again
  PARTITION_VERT_B, // VERT split and the right partition is split again
  PARTITION_HORZ_4, // 4:1 horizontal partition
  PARTITION_VERT_4, // 4:1 vertical partition
}

impl PartitionType {
  /// Number of coding blocks the partition produces inside its square.
  #[inline]
  pub const fn block_count(self) -> usize {
    use PartitionType::*;
    match self {
      PARTITION_NONE => 1,
      PARTITION_HORZ | PARTITION_VERT => 2,
      PARTITION_HORZ_A | PARTITION_HORZ_B | PARTITION_VERT_A
      | PARTITION_VERT_B => 3,
      PARTITION_SPLIT | PARTITION_HORZ_4 | PARTITION_VERT_4 => 4,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlockSize {
  BLOCK_4X4,
  BLOCK_4X8,
  BLOCK_8X4,
  BLOCK_8X8,
  BLOCK_8X16,
  BLOCK_16X8,
  BLOCK_16X16,
  BLOCK_16X32,
  BLOCK_32X16,
  BLOCK_32X32,
  BLOCK_32X64,
  BLOCK_64X32,
  BLOCK_64X64,
  BLOCK_64X128,
  BLOCK_128X64,
  BLOCK_128X128,
  BLOCK_4X16,
  BLOCK_16X4,
  BLOCK_8X32,
  BLOCK_32X8,
  BLOCK_16X64,
  BLOCK_64X16,
}

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
#[error("invalid block size")]
pub struct InvalidBlockSize;

impl PartialOrd for BlockSize {
  #[inline(always)]
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match (
      self.width().cmp(&other.width()),
      self.height().cmp(&other.height()),
    ) {
      (Greater, Less) | (Less, Greater) => None,
      (Equal, Equal) => Some(Equal),
      (Greater, _) | (_, Greater) => Some(Greater),
      (Less, _) | (_, Less) => Some(Less),
    }
  }
}

impl BlockSize {
  /// # Errors
  ///
  /// - Returns `InvalidBlockSize` if the given `w` and `h` do not produce
  ///   a valid block size.
  #[inline]
  pub const fn from_width_and_height_opt(
    w: usize, h: usize,
  ) -> Result<BlockSize, InvalidBlockSize> {
    Ok(match (w, h) {
      (4, 4) => BLOCK_4X4,
      (4, 8) => BLOCK_4X8,
      (4, 16) => BLOCK_4X16,
      (8, 4) => BLOCK_8X4,
      (8, 8) => BLOCK_8X8,
      (8, 16) => BLOCK_8X16,
      (8, 32) => BLOCK_8X32,
      (16, 4) => BLOCK_16X4,
      (16, 8) => BLOCK_16X8,
      (16, 16) => BLOCK_16X16,
      (16, 32) => BLOCK_16X32,
      (16, 64) => BLOCK_16X64,
      (32, 8) => BLOCK_32X8,
      (32, 16) => BLOCK_32X16,
      (32, 32) => BLOCK_32X32,
      (32, 64) => BLOCK_32X64,
      (64, 16) => BLOCK_64X16,
      (64, 32) => BLOCK_64X32,
      (64, 64) => BLOCK_64X64,
      (64, 128) => BLOCK_64X128,
      (128, 64) => BLOCK_128X64,
      (128, 128) => BLOCK_128X128,
      _ => return Err(InvalidBlockSize),
    })
  }

  #[inline]
  pub const fn width(self) -> usize {
    1 << self.width_log2()
  }

  /// width * height
  #[inline]
  pub const fn area(self) -> usize {
    self.width() * self.height()
  }

  #[inline]
  pub const fn width_log2(self) -> usize {
    match self {
      BLOCK_4X4 | BLOCK_4X8 | BLOCK_4X16 => 2,
      BLOCK_8X4 | BLOCK_8X8 | BLOCK_8X16 | BLOCK_8X32 => 3,
      BLOCK_16X4 | BLOCK_16X8 | BLOCK_16X16 | BLOCK_16X32 | BLOCK_16X64 => 4,
      BLOCK_32X8 | BLOCK_32X16 | BLOCK_32X32 | BLOCK_32X64 => 5,
      BLOCK_64X16 | BLOCK_64X32 | BLOCK_64X64 | BLOCK_64X128 => 6,
      BLOCK_128X64 | BLOCK_128X128 => 7,
    }
  }

  #[inline]
  pub const fn width_mi(self) -> usize {
    self.width() >> MI_SIZE_LOG2
  }

  #[inline]
  pub const fn height(self) -> usize {
    1 << self.height_log2()
  }

  #[inline]
  pub const fn height_log2(self) -> usize {
    match self {
      BLOCK_4X4 | BLOCK_8X4 | BLOCK_16X4 => 2,
      BLOCK_4X8 | BLOCK_8X8 | BLOCK_16X8 | BLOCK_32X8 => 3,
      BLOCK_4X16 | BLOCK_8X16 | BLOCK_16X16 | BLOCK_32X16 | BLOCK_64X16 => 4,
      BLOCK_8X32 | BLOCK_16X32 | BLOCK_32X32 | BLOCK_64X32 => 5,
      BLOCK_16X64 | BLOCK_32X64 | BLOCK_64X64 | BLOCK_128X64 => 6,
      BLOCK_64X128 | BLOCK_128X128 => 7,
    }
  }

  #[inline]
  pub const fn height_mi(self) -> usize {
    self.height() >> MI_SIZE_LOG2
  }

  /// Largest transform that fits the block; blocks wider or taller than
  /// `MAX_TX_SIZE` are tiled by several transform blocks of this size.
  #[inline]
  pub fn tx_size(self) -> TxSize {
    TxSize::largest_for(self.width(), self.height())
  }

  /// Number of transform blocks of `tx_size()` needed across and down.
  #[inline]
  pub fn tx_count(self) -> (usize, usize) {
    (
      (self.width() / MAX_TX_SIZE).max(1),
      (self.height() / MAX_TX_SIZE).max(1),
    )
  }

  #[inline]
  pub const fn sub8x8_offset(
    self, xdec: usize, ydec: usize,
  ) -> (isize, isize) {
    let offset_x = if xdec != 0 && self.width_log2() == 2 { -1 } else { 0 };
    let offset_y = if ydec != 0 && self.height_log2() == 2 { -1 } else { 0 };

    (offset_x, offset_y)
  }

  /// Chroma from luma is only signalled for blocks up to 32x32.
  #[inline]
  pub fn cfl_allowed(self) -> bool {
    self.width() <= 32 && self.height() <= 32
  }

  /// # Errors
  ///
  /// - Returns `InvalidBlockSize` if the block size cannot be split
  ///   in the requested way.
  pub const fn subsize(
    self, partition: PartitionType,
  ) -> Result<BlockSize, InvalidBlockSize> {
    use PartitionType::*;

    Ok(match partition {
      PARTITION_NONE => self,
      PARTITION_SPLIT => match self {
        BLOCK_8X8 => BLOCK_4X4,
        BLOCK_16X16 => BLOCK_8X8,
        BLOCK_32X32 => BLOCK_16X16,
        BLOCK_64X64 => BLOCK_32X32,
        BLOCK_128X128 => BLOCK_64X64,
        _ => return Err(InvalidBlockSize),
      },
      PARTITION_HORZ | PARTITION_HORZ_A | PARTITION_HORZ_B => match self {
        BLOCK_8X8 => BLOCK_8X4,
        BLOCK_16X16 => BLOCK_16X8,
        BLOCK_32X32 => BLOCK_32X16,
        BLOCK_64X64 => BLOCK_64X32,
        BLOCK_128X128 => BLOCK_128X64,
        _ => return Err(InvalidBlockSize),
      },
      PARTITION_VERT | PARTITION_VERT_A | PARTITION_VERT_B => match self {
        BLOCK_8X8 => BLOCK_4X8,
        BLOCK_16X16 => BLOCK_8X16,
        BLOCK_32X32 => BLOCK_16X32,
        BLOCK_64X64 => BLOCK_32X64,
        BLOCK_128X128 => BLOCK_64X128,
        _ => return Err(InvalidBlockSize),
      },
      PARTITION_HORZ_4 => match self {
        BLOCK_16X16 => BLOCK_16X4,
        BLOCK_32X32 => BLOCK_32X8,
        BLOCK_64X64 => BLOCK_64X16,
        _ => return Err(InvalidBlockSize),
      },
      PARTITION_VERT_4 => match self {
        BLOCK_16X16 => BLOCK_4X16,
        BLOCK_32X32 => BLOCK_8X32,
        BLOCK_64X64 => BLOCK_16X64,
        _ => return Err(InvalidBlockSize),
      },
    })
  }

  /// Partitions the encoder enumerates for a square node of this size,
  /// in enumeration order and excluding `PARTITION_SPLIT`.
  pub fn allowed_shapes(self) -> &'static [PartitionType] {
    use PartitionType::*;
    const ALL: [PartitionType; 9] = [
      PARTITION_NONE,
      PARTITION_HORZ,
      PARTITION_VERT,
      PARTITION_HORZ_A,
      PARTITION_HORZ_B,
      PARTITION_VERT_A,
      PARTITION_VERT_B,
      PARTITION_HORZ_4,
      PARTITION_VERT_4,
    ];
    match self {
      BLOCK_128X128 => &ALL[..7],
      BLOCK_64X64 | BLOCK_32X32 | BLOCK_16X16 => &ALL,
      BLOCK_8X8 => &ALL[..3],
      BLOCK_4X4 => &ALL[..1],
      _ => &[],
    }
  }
}

impl fmt::Display for BlockSize {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{}x{}", self.width(), self.height())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transform::TxSize::*;

  fn from_wh_opt_naive(
    w: usize, h: usize,
  ) -> Result<BlockSize, InvalidBlockSize> {
    match (w, h) {
      (4, 4) => Ok(BLOCK_4X4),
      (4, 8) => Ok(BLOCK_4X8),
      (4, 16) => Ok(BLOCK_4X16),
      (8, 4) => Ok(BLOCK_8X4),
      (8, 8) => Ok(BLOCK_8X8),
      (8, 16) => Ok(BLOCK_8X16),
      (8, 32) => Ok(BLOCK_8X32),
      (16, 4) => Ok(BLOCK_16X4),
      (16, 8) => Ok(BLOCK_16X8),
      (16, 16) => Ok(BLOCK_16X16),
      (16, 32) => Ok(BLOCK_16X32),
      (16, 64) => Ok(BLOCK_16X64),
      (32, 8) => Ok(BLOCK_32X8),
      (32, 16) => Ok(BLOCK_32X16),
      (32, 32) => Ok(BLOCK_32X32),
      (32, 64) => Ok(BLOCK_32X64),
      (64, 16) => Ok(BLOCK_64X16),
      (64, 32) => Ok(BLOCK_64X32),
      (64, 64) => Ok(BLOCK_64X64),
      (64, 128) => Ok(BLOCK_64X128),
      (128, 64) => Ok(BLOCK_128X64),
      (128, 128) => Ok(BLOCK_128X128),
      _ => Err(InvalidBlockSize),
    }
  }

  #[test]
  fn from_wh_matches_naive() {
    for w in 0..256 {
      for h in 0..256 {
        let a = BlockSize::from_width_and_height_opt(w, h);
        let b = from_wh_opt_naive(w, h);

        assert_eq!(a, b);
      }
    }
  }

  #[test]
  fn tx_size_is_capped_at_32() {
    assert_eq!(BLOCK_64X64.tx_size(), TX_32X32);
    assert_eq!(BLOCK_64X64.tx_count(), (2, 2));
    assert_eq!(BLOCK_64X16.tx_size(), TX_32X16);
    assert_eq!(BLOCK_64X16.tx_count(), (2, 1));
    assert_eq!(BLOCK_16X64.tx_size(), TX_16X32);
    assert_eq!(BLOCK_128X128.tx_count(), (4, 4));
    assert_eq!(BLOCK_8X4.tx_size(), TX_8X4);
  }

  #[test]
  fn shape_sets_by_size() {
    assert_eq!(BLOCK_128X128.allowed_shapes().len(), 7);
    assert_eq!(BLOCK_64X64.allowed_shapes().len(), 9);
    assert_eq!(BLOCK_8X8.allowed_shapes().len(), 3);
    assert_eq!(BLOCK_4X4.allowed_shapes().len(), 1);
    assert!(BLOCK_16X8.allowed_shapes().is_empty());
  }
}
