// Copyright (c) 2017-2023, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;
use crate::mc::MotionVector;
use crate::predict::PredictionMode;
use crate::tiling::PlaneRegion;

use std::ops;

/// Lanes touched by a neighbor write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborMask(u8);

impl NeighborMask {
  pub const TOP: Self = NeighborMask(1);
  pub const LEFT: Self = NeighborMask(2);
  pub const TOP_LEFT: Self = NeighborMask(4);
  pub const ALL: Self = NeighborMask(7);

  #[inline]
  pub const fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }
}

impl ops::BitOr for NeighborMask {
  type Output = Self;

  #[inline]
  fn bitor(self, rhs: Self) -> Self {
    NeighborMask(self.0 | rhs.0)
  }
}

/// Values along the bottom and right edges of already coded blocks.
///
/// The top lane spans the picture width. The left lane covers one
/// superblock height and is addressed modulo that window, so it only ever
/// holds the current superblock row. The top-left lane is indexed by
/// diagonal (`x - y`) and holds the last edge sample written on it, which
/// for a block at `(x, y)` is the sample at `(x - 1, y - 1)`.
///
/// Positions are in samples; `unit_log2` sets how many samples share one
/// entry.
#[derive(Clone, Debug)]
pub struct NeighborArray<T: Copy> {
  top: Box<[T]>,
  left: Box<[T]>,
  top_left: Box<[T]>,
  unit_log2: usize,
  rows: usize,
  default: T,
}

impl<T: Copy> NeighborArray<T> {
  pub fn new(
    width: usize, height: usize, window: usize, unit_log2: usize, default: T,
  ) -> Self {
    let cols = width.align_power_of_two_and_shift(unit_log2);
    let rows = height.align_power_of_two_and_shift(unit_log2);
    let window = window.align_power_of_two_and_shift(unit_log2);
    assert!(window > 0);
    NeighborArray {
      top: vec![default; cols].into_boxed_slice(),
      left: vec![default; window].into_boxed_slice(),
      top_left: vec![default; cols + rows + 1].into_boxed_slice(),
      unit_log2,
      rows,
      default,
    }
  }

  #[inline]
  fn left_index(&self, y: usize) -> usize {
    (y >> self.unit_log2) % self.left.len()
  }

  #[inline]
  fn diagonal_index(&self, xu: usize, yu: usize) -> usize {
    xu + self.rows - yu
  }

  /// Records a uniform `value` for the `w`x`h` block at `(x, y)`.
  pub fn write(
    &mut self, value: T, x: usize, y: usize, w: usize, h: usize,
    mask: NeighborMask,
  ) {
    let xu = x >> self.unit_log2;
    let yu = y >> self.unit_log2;
    let wu = w.align_power_of_two_and_shift(self.unit_log2);
    let hu = h.align_power_of_two_and_shift(self.unit_log2);

    if mask.contains(NeighborMask::TOP) {
      self.top[xu..xu + wu].fill(value);
    }
    if mask.contains(NeighborMask::LEFT) {
      let window = self.left.len();
      for r in yu..yu + hu {
        self.left[r % window] = value;
      }
    }
    if mask.contains(NeighborMask::TOP_LEFT) {
      let first = self.diagonal_index(xu, yu + hu - 1);
      let last = self.diagonal_index(xu + wu - 1, yu);
      self.top_left[first..=last].fill(value);
    }
  }

  #[inline]
  pub fn read_top(&self, x: usize) -> T {
    self.top[x >> self.unit_log2]
  }

  #[inline]
  pub fn read_left(&self, y: usize) -> T {
    self.left[self.left_index(y)]
  }

  /// The value diagonally above and to the left of position `(x, y)`.
  #[inline]
  pub fn read_top_left(&self, x: usize, y: usize) -> T {
    self.top_left[self.diagonal_index(x >> self.unit_log2, y >> self.unit_log2)]
  }

  /// Top lane entries starting at `x`.
  #[inline]
  pub fn top(&self, x: usize, len: usize) -> &[T] {
    let xu = x >> self.unit_log2;
    &self.top[xu..xu + len]
  }

  pub fn reset(&mut self) {
    self.top.fill(self.default);
    self.left.fill(self.default);
    self.top_left.fill(self.default);
  }

  pub fn reset_left(&mut self) {
    self.left.fill(self.default);
  }
}

impl<T: Pixel> NeighborArray<T> {
  /// Records the edges of a reconstructed `w`x`h` block whose top-left
  /// sample is at `(x, y)`. `src` is indexed from the block origin.
  ///
  /// The last row goes to the top lane and the last column to the left
  /// lane; the top-left lane receives both.
  pub fn write_samples(
    &mut self, src: &PlaneRegion<'_, T>, x: usize, y: usize, w: usize,
    h: usize, mask: NeighborMask,
  ) {
    debug_assert_eq!(self.unit_log2, 0);
    let bottom = &src[h - 1][..w];

    if mask.contains(NeighborMask::TOP) {
      self.top[x..x + w].copy_from_slice(bottom);
    }
    if mask.contains(NeighborMask::LEFT) {
      for r in 0..h {
        let i = self.left_index(y + r);
        self.left[i] = src[r][w - 1];
      }
    }
    if mask.contains(NeighborMask::TOP_LEFT) {
      for (c, &v) in bottom.iter().enumerate() {
        let i = self.diagonal_index(x + c, y + h - 1);
        self.top_left[i] = v;
      }
      for r in 0..h - 1 {
        let i = self.diagonal_index(x + w - 1, y + r);
        self.top_left[i] = src[r][w - 1];
      }
    }
  }
}

const CODED_UNIT_LOG2: usize = 2;

/// Which 4x4 units of the current superblock have been reconstructed, for
/// one plane.
///
/// Availability of a neighboring sample follows coding order: everything
/// above the superblock row and everything left of the superblock is
/// coded, nothing below or to the right of it is, and inside the
/// superblock the map is marked transform block by transform block.
#[derive(Clone, Debug)]
pub struct CodedMap {
  rows: [u32; MAX_MIB_SIZE],
  sb_x: isize,
  sb_y: isize,
  sb_w: isize,
  sb_h: isize,
  width: isize,
  height: isize,
  sb_log2: usize,
  xdec: usize,
  ydec: usize,
}

impl CodedMap {
  pub fn new(
    width: usize, height: usize, sb_size: SuperblockSize, xdec: usize,
    ydec: usize,
  ) -> Self {
    CodedMap {
      rows: [0; MAX_MIB_SIZE],
      sb_x: 0,
      sb_y: 0,
      sb_w: (sb_size.width() >> xdec) as isize,
      sb_h: (sb_size.width() >> ydec) as isize,
      width: width as isize,
      height: height as isize,
      sb_log2: sb_size.log2(),
      xdec,
      ydec,
    }
  }

  pub fn start_superblock(&mut self, sbo: SuperBlockOffset) {
    self.sb_x = ((sbo.x << self.sb_log2) >> self.xdec) as isize;
    self.sb_y = ((sbo.y << self.sb_log2) >> self.ydec) as isize;
    self.rows.fill(0);
  }

  /// Marks a reconstructed area, in picture-absolute plane samples.
  pub fn mark(&mut self, po: PlaneOffset, w: usize, h: usize) {
    debug_assert!(po.x >= self.sb_x && po.y >= self.sb_y);
    let x0 = ((po.x - self.sb_x) as usize) >> CODED_UNIT_LOG2;
    let y0 = ((po.y - self.sb_y) as usize) >> CODED_UNIT_LOG2;
    let cols = w.align_power_of_two_and_shift(CODED_UNIT_LOG2);
    let rows = h.align_power_of_two_and_shift(CODED_UNIT_LOG2);
    let bits = (((1u64 << cols) - 1) << x0) as u32;
    for row in self.rows[y0..y0 + rows].iter_mut() {
      *row |= bits;
    }
  }

  /// Whether the plane sample at `(x, y)` can serve as a prediction edge.
  pub fn is_available(&self, x: isize, y: isize) -> bool {
    if x < 0 || y < 0 || x >= self.width || y >= self.height {
      return false;
    }
    if y < self.sb_y {
      return true;
    }
    if y >= self.sb_y + self.sb_h {
      return false;
    }
    if x < self.sb_x {
      return true;
    }
    if x >= self.sb_x + self.sb_w {
      return false;
    }
    let cx = ((x - self.sb_x) as usize) >> CODED_UNIT_LOG2;
    let cy = ((y - self.sb_y) as usize) >> CODED_UNIT_LOG2;
    (self.rows[cy] >> cx) & 1 != 0
  }
}

/// Neighbor information an entropy coder needs for one block, captured
/// before the block is predicted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborModeContext {
  pub above_mode: PredictionMode,
  pub left_mode: PredictionMode,
  pub above_inter: bool,
  pub left_inter: bool,
  pub above_skip: bool,
  pub left_skip: bool,
}

/// All neighbor arrays of one picture.
#[derive(Clone, Debug)]
pub struct NeighborContext<T: Pixel> {
  /// `true` for inter coded blocks.
  pub mode_type: NeighborArray<bool>,
  pub luma_mode: NeighborArray<PredictionMode>,
  pub chroma_mode: NeighborArray<PredictionMode>,
  pub mv: NeighborArray<MotionVector>,
  pub skip: NeighborArray<bool>,
  pub recon: [NeighborArray<T>; MAX_PLANES],
  pub coded: [CodedMap; MAX_PLANES],
  sb_size: SuperblockSize,
}

fn mode_array<U: Copy>(
  width: usize, height: usize, window: usize, default: U,
) -> NeighborArray<U> {
  NeighborArray::new(width, height, window, MI_SIZE_LOG2, default)
}

impl<T: Pixel> NeighborContext<T> {
  pub fn new(pic: &Picture<T>, sb_size: SuperblockSize) -> Self {
    let width = sb_size.count(pic.width) << sb_size.log2();
    let height = sb_size.count(pic.height) << sb_size.log2();
    let window = sb_size.width();
    let base = T::cast_from(1i32 << (pic.bit_depth - 1));

    let recon = |p: usize| {
      let PlaneConfig { xdec, ydec, .. } = pic.planes[p].cfg;
      NeighborArray::new(width >> xdec, height >> ydec, window >> ydec, 0, base)
    };
    let coded = |p: usize| {
      let PlaneConfig { width: pw, height: ph, xdec, ydec, .. } =
        pic.planes[p].cfg;
      CodedMap::new(pw, ph, sb_size, xdec, ydec)
    };

    NeighborContext {
      mode_type: mode_array(width, height, window, false),
      luma_mode: mode_array(width, height, window, PredictionMode::DC_PRED),
      chroma_mode: mode_array(width, height, window, PredictionMode::DC_PRED),
      mv: mode_array(width, height, window, MotionVector::default()),
      skip: mode_array(width, height, window, false),
      recon: [recon(0), recon(1), recon(2)],
      coded: [coded(0), coded(1), coded(2)],
      sb_size,
    }
  }

  /// Forgets everything, at the start of a picture.
  pub fn reset(&mut self) {
    self.mode_type.reset();
    self.luma_mode.reset();
    self.chroma_mode.reset();
    self.mv.reset();
    self.skip.reset();
    for r in self.recon.iter_mut() {
      r.reset();
    }
  }

  /// Prepares the store for the superblock at `sbo`. The left lanes are
  /// cleared when a new superblock row begins.
  pub fn start_superblock(&mut self, sbo: SuperBlockOffset) {
    if sbo.x == 0 {
      self.mode_type.reset_left();
      self.luma_mode.reset_left();
      self.chroma_mode.reset_left();
      self.mv.reset_left();
      self.skip.reset_left();
      for r in self.recon.iter_mut() {
        r.reset_left();
      }
    }
    for c in self.coded.iter_mut() {
      c.start_superblock(sbo);
    }
  }

  #[inline]
  pub const fn sb_size(&self) -> SuperblockSize {
    self.sb_size
  }

  /// Snapshot of the above and left mode information for the block at
  /// `bo`. Missing neighbors read as intra `DC_PRED` and not skipped.
  pub fn mode_context(&self, bo: BlockOffset) -> NeighborModeContext {
    let luma = bo.to_luma_plane_offset();
    let (x, y) = (luma.x as usize, luma.y as usize);
    let mut ctx = NeighborModeContext::default();
    if bo.y > 0 {
      ctx.above_mode = self.luma_mode.read_top(x);
      ctx.above_inter = self.mode_type.read_top(x);
      ctx.above_skip = self.skip.read_top(x);
    }
    if bo.x > 0 {
      ctx.left_mode = self.luma_mode.read_left(y);
      ctx.left_inter = self.mode_type.read_left(y);
      ctx.left_skip = self.skip.read_left(y);
    }
    ctx
  }

  /// Records the mode information of a finished block.
  pub fn update_modes(
    &mut self, bo: BlockOffset, bsize: BlockSize, luma_mode: PredictionMode,
    chroma_mode: PredictionMode, is_inter: bool, mv: MotionVector,
    skip: bool,
  ) {
    let luma = bo.to_luma_plane_offset();
    let (x, y) = (luma.x as usize, luma.y as usize);
    let (w, h) = (bsize.width(), bsize.height());
    let all = NeighborMask::ALL;
    self.mode_type.write(is_inter, x, y, w, h, all);
    self.luma_mode.write(luma_mode, x, y, w, h, all);
    self.chroma_mode.write(chroma_mode, x, y, w, h, all);
    self.mv.write(mv, x, y, w, h, all);
    self.skip.write(skip, x, y, w, h, all);
  }

  /// Publishes a reconstructed area of plane `p` to later blocks.
  pub fn write_recon(
    &mut self, p: usize, src: &PlaneRegion<'_, T>, po: PlaneOffset, w: usize,
    h: usize,
  ) {
    self.recon[p].write_samples(
      src,
      po.x as usize,
      po.y as usize,
      w,
      h,
      NeighborMask::ALL,
    );
    self.coded[p].mark(po, w, h);
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::tiling::*;
  use pretty_assertions::assert_eq;

  fn block(plane: &mut Plane<u8>, w: usize, h: usize, base: u8) {
    for (r, row) in plane.as_region_mut().rows_iter_mut().take(h).enumerate()
    {
      for (c, v) in row[..w].iter_mut().enumerate() {
        *v = base + (r * w + c) as u8;
      }
    }
  }

  #[test]
  fn uniform_writes_respect_mask() {
    let mut na = NeighborArray::new(64, 64, 64, MI_SIZE_LOG2, 0u8);
    na.write(3, 8, 16, 16, 8, NeighborMask::TOP);
    na.write(5, 8, 16, 16, 8, NeighborMask::LEFT);
    assert_eq!(na.read_top(8), 3);
    assert_eq!(na.read_top(20), 3);
    assert_eq!(na.read_top(24), 0);
    assert_eq!(na.read_left(16), 5);
    assert_eq!(na.read_left(20), 5);
    assert_eq!(na.read_left(24), 0);
    assert_eq!(na.read_top_left(24, 24), 0);

    na.write(7, 8, 16, 16, 8, NeighborMask::TOP_LEFT);
    // Diagonally below and to the right of the last row and column.
    assert_eq!(na.read_top_left(24, 24), 7);
    assert_eq!(na.read_top_left(12, 24), 7);
    assert_eq!(na.read_top_left(24, 20), 7);
  }

  #[test]
  fn sample_writes_keep_last_row_and_column() {
    let mut plane = Plane::<u8>::new(4, 4, 0, 0, 0, 0);
    block(&mut plane, 4, 4, 0);
    let mut na = NeighborArray::new(16, 16, 16, 0, 128u8);
    na.write_samples(&plane.as_region(), 4, 4, 4, 4, NeighborMask::ALL);

    assert_eq!(na.top(4, 4), &[12, 13, 14, 15]);
    let left: Vec<u8> = (4..8).map(|y| na.read_left(y)).collect();
    assert_eq!(left, vec![3, 7, 11, 15]);
    assert_eq!(na.read_top_left(8, 8), 15);
    assert_eq!(na.read_top_left(6, 8), 13);
    assert_eq!(na.read_top_left(8, 6), 7);
    assert_eq!(na.read_top_left(4, 8), 128);
  }

  #[test]
  fn left_lane_wraps_per_superblock_row() {
    let mut na = NeighborArray::new(128, 128, 64, 0, 0u8);
    na.write(9, 0, 70, 8, 8, NeighborMask::LEFT);
    assert_eq!(na.read_left(70), 9);
    assert_eq!(na.read_left(6), 9);
    na.reset_left();
    assert_eq!(na.read_left(70), 0);
  }

  #[test]
  fn later_blocks_see_adjacent_edges() {
    // Four 8x8 blocks of a split 16x16, in coding order.
    let mut na = NeighborArray::new(16, 16, 16, 0, 0u8);
    let origins = [(0, 0), (8, 0), (0, 8), (8, 8)];
    let mut plane = Plane::<u8>::new(8, 8, 0, 0, 0, 0);
    for (i, &(x, y)) in origins.iter().enumerate() {
      block(&mut plane, 8, 8, (i * 64) as u8);
      if i == 3 {
        break;
      }
      na.write_samples(&plane.as_region(), x, y, 8, 8, NeighborMask::ALL);
    }

    // Bottom-right block: top from the top-right block, left from the
    // bottom-left block, corner from the top-left block.
    let top: Vec<u8> = na.top(8, 8).to_vec();
    assert_eq!(top, (56..64).map(|v| (64 + v) as u8).collect::<Vec<_>>());
    let left: Vec<u8> = (8..16).map(|y| na.read_left(y)).collect();
    let expected: Vec<u8> = (0..8).map(|r| (128 + r * 8 + 7) as u8).collect();
    assert_eq!(left, expected);
    assert_eq!(na.read_top_left(8, 8), 63);
  }

  #[test]
  fn availability_follows_coding_order() {
    let mut map = CodedMap::new(128, 128, SuperblockSize::Sb64, 0, 0);
    map.start_superblock(SuperBlockOffset { x: 1, y: 1 });
    // Picture bounds
    assert!(!map.is_available(-1, 70));
    assert!(!map.is_available(128, 10));
    // Above the superblock row, including to the right.
    assert!(map.is_available(100, 63));
    assert!(map.is_available(127, 63));
    // Left of the superblock, but not below it.
    assert!(map.is_available(63, 100));
    // Not yet coded inside the superblock.
    assert!(!map.is_available(64, 64));
    map.mark(PlaneOffset { x: 64, y: 64 }, 16, 8);
    assert!(map.is_available(64, 64));
    assert!(map.is_available(79, 71));
    assert!(!map.is_available(80, 64));
    assert!(!map.is_available(64, 72));

    map.start_superblock(SuperBlockOffset { x: 0, y: 1 });
    assert!(!map.is_available(10, 70));
    assert!(!map.is_available(64, 70));
  }

  #[test]
  fn mode_context_defaults_at_picture_edges() {
    let pic: Picture<u8> = Picture::new(64, 64, ChromaSampling::Cs420, 8);
    let mut nc = NeighborContext::new(&pic, SuperblockSize::Sb64);
    nc.start_superblock(SuperBlockOffset { x: 0, y: 0 });
    let bo = BlockOffset { x: 0, y: 0 };
    assert_eq!(nc.mode_context(bo), NeighborModeContext::default());

    nc.update_modes(
      bo,
      BlockSize::BLOCK_8X8,
      PredictionMode::V_PRED,
      PredictionMode::DC_PRED,
      false,
      MotionVector::default(),
      true,
    );
    let right = nc.mode_context(BlockOffset { x: 2, y: 0 });
    assert_eq!(right.left_mode, PredictionMode::V_PRED);
    assert!(right.left_skip);
    assert_eq!(right.above_mode, PredictionMode::DC_PRED);
    let below = nc.mode_context(BlockOffset { x: 0, y: 2 });
    assert_eq!(below.above_mode, PredictionMode::V_PRED);
    assert_eq!(below.left_mode, PredictionMode::DC_PRED);
  }

  #[test]
  fn each_lane_starts_from_its_own_default() {
    let pic: Picture<u16> = Picture::new(96, 80, ChromaSampling::Cs422, 10);
    let nc = NeighborContext::new(&pic, SuperblockSize::Sb64);
    for x in [0, 7, 23] {
      assert!(!nc.mode_type.read_top(x));
      assert!(!nc.skip.read_top(x));
      assert_eq!(nc.luma_mode.read_top(x), PredictionMode::DC_PRED);
      assert_eq!(nc.chroma_mode.read_left(x % 16), PredictionMode::DC_PRED);
      assert_eq!(nc.mv.read_top(x), MotionVector::default());
    }
    assert_eq!(nc.recon[0].read_top(95), 512);
    assert_eq!(nc.recon[1].read_left(63), 512);
  }
}
