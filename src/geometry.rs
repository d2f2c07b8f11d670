// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Every block a superblock can be coded with, in a flat depth-first order.
//!
//! Each square node of the partition tree contributes the blocks of its
//! non-split shapes, followed by the subtrees of its four quadrants. A
//! walk over a decided tree only ever moves forward: a node that is split
//! steps over its own shape blocks into its first quadrant, and a node that
//! is not split steps over its whole subtree.

use crate::context::*;
use crate::partition::PartitionType::*;
use crate::partition::*;
use crate::transform::TxSize;
use crate::util::*;

use arrayvec::ArrayVec;
use std::ops::Range;

const MAX_DEPTH: usize = MAX_SB_SIZE_LOG2 - MI_SIZE_LOG2 + 1;

/// Immutable description of one block of the superblock tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockGeom {
  /// Luma origin relative to the superblock.
  pub origin: SbRelativeOffset,
  pub bsize: BlockSize,
  pub bwidth: usize,
  pub bheight: usize,
  /// Whether this block codes chroma. Sub-8x8 blocks of subsampled
  /// formats leave it to the last block of their chroma 4x4.
  pub has_uv: bool,
  /// Chroma origin relative to the superblock, in chroma samples.
  pub origin_uv: SbRelativeOffset,
  pub bwidth_uv: usize,
  pub bheight_uv: usize,
  /// Partition shape this block belongs to.
  pub shape: PartitionType,
  /// Index of this block inside its shape.
  pub nsi: usize,
  /// Number of blocks of the shape.
  pub totns: usize,
  /// Size of the square node the shape partitions.
  pub sq_size: BlockSize,
  pub depth: usize,
  pub tx_size: TxSize,
  /// Luma transform blocks across and down.
  pub tx_count: (usize, usize),
  pub tx_size_uv: TxSize,
  pub tx_count_uv: (usize, usize),
  /// Stride from a node to its first quadrant.
  pub d1_depth_offset: usize,
  /// Stride from a node past its whole subtree.
  pub ns_depth_offset: usize,
}

impl BlockGeom {
  fn new(
    x: usize, y: usize, w: usize, h: usize, shape: PartitionType, nsi: usize,
    sq_size: BlockSize, depth: usize, cs: ChromaSampling,
  ) -> Self {
    let Ok(bsize) = BlockSize::from_width_and_height_opt(w, h) else {
      unreachable!("{:?} of {} yields {}x{}", shape, sq_size, w, h)
    };
    let (xdec, ydec) = cs.get_decimation().unwrap_or((0, 0));
    let has_uv = cs != ChromaSampling::Cs400
      && ((y >> MI_SIZE_LOG2) & 1 == 1 || h != 4 || ydec == 0)
      && ((x >> MI_SIZE_LOG2) & 1 == 1 || w != 4 || xdec == 0);

    let (off_x, off_y) = bsize.sub8x8_offset(xdec, ydec);
    let origin_uv = SbRelativeOffset {
      x: ((x as isize + (off_x << MI_SIZE_LOG2)) as usize) >> xdec,
      y: ((y as isize + (off_y << MI_SIZE_LOG2)) as usize) >> ydec,
    };
    let bwidth_uv = (w >> xdec).max(4);
    let bheight_uv = (h >> ydec).max(4);

    let tx_size = TxSize::largest_for(w, h);
    let tx_size_uv = TxSize::largest_for(bwidth_uv, bheight_uv);

    BlockGeom {
      origin: SbRelativeOffset { x, y },
      bsize,
      bwidth: w,
      bheight: h,
      has_uv,
      origin_uv,
      bwidth_uv,
      bheight_uv,
      shape,
      nsi,
      totns: shape.block_count(),
      sq_size,
      depth,
      tx_size,
      tx_count: (w / tx_size.width(), h / tx_size.height()),
      tx_size_uv,
      tx_count_uv: (
        bwidth_uv / tx_size_uv.width(),
        bheight_uv / tx_size_uv.height(),
      ),
      d1_depth_offset: 0,
      ns_depth_offset: 0,
    }
  }

  /// Transform blocks of `plane`, in raster order, as block-relative
  /// sample offsets with the transform size.
  pub fn tx_blocks(
    &self, plane: usize,
  ) -> impl Iterator<Item = (usize, usize, TxSize)> {
    let (tx_size, (cols, rows)) = if plane == 0 {
      (self.tx_size, self.tx_count)
    } else {
      (self.tx_size_uv, self.tx_count_uv)
    };
    (0..rows).flat_map(move |r| {
      (0..cols)
        .map(move |c| (c * tx_size.width(), r * tx_size.height(), tx_size))
    })
  }
}

/// Blocks of `shape` inside a square of side `s`, as (x, y, w, h).
fn shape_rects(
  shape: PartitionType, s: usize,
) -> ArrayVec<(usize, usize, usize, usize), 4> {
  let h = s / 2;
  let q = s / 4;
  let mut rects = ArrayVec::new();
  match shape {
    PARTITION_NONE => rects.push((0, 0, s, s)),
    PARTITION_HORZ => {
      rects.push((0, 0, s, h));
      rects.push((0, h, s, h));
    }
    PARTITION_VERT => {
      rects.push((0, 0, h, s));
      rects.push((h, 0, h, s));
    }
    PARTITION_HORZ_A => {
      rects.push((0, 0, h, h));
      rects.push((h, 0, h, h));
      rects.push((0, h, s, h));
    }
    PARTITION_HORZ_B => {
      rects.push((0, 0, s, h));
      rects.push((0, h, h, h));
      rects.push((h, h, h, h));
    }
    PARTITION_VERT_A => {
      rects.push((0, 0, h, h));
      rects.push((0, h, h, h));
      rects.push((h, 0, h, s));
    }
    PARTITION_VERT_B => {
      rects.push((0, 0, h, s));
      rects.push((h, 0, h, h));
      rects.push((h, h, h, h));
    }
    PARTITION_HORZ_4 => {
      for k in 0..4 {
        rects.push((0, k * q, s, q));
      }
    }
    PARTITION_VERT_4 => {
      for k in 0..4 {
        rects.push((k * q, 0, q, s));
      }
    }
    PARTITION_SPLIT => unreachable!(),
  }
  rects
}

/// Number of shape blocks a square node of `sq_size` owns.
fn node_blocks(sq_size: BlockSize) -> usize {
  sq_size.allowed_shapes().iter().map(|s| s.block_count()).sum()
}

/// The flat block table of one superblock size and chroma format.
#[derive(Clone, Debug)]
pub struct GeometryTable {
  blocks: Vec<BlockGeom>,
  d1_depth_offset: ArrayVec<usize, MAX_DEPTH>,
  ns_depth_offset: ArrayVec<usize, MAX_DEPTH>,
  sb_size: SuperblockSize,
  chroma_sampling: ChromaSampling,
}

impl GeometryTable {
  pub fn new(sb_size: SuperblockSize, chroma_sampling: ChromaSampling) -> Self {
    let mut d1_depth_offset = ArrayVec::new();
    let mut ns_depth_offset = ArrayVec::new();
    let mut sq = sb_size.block_size();
    loop {
      d1_depth_offset.push(node_blocks(sq));
      match sq.subsize(PARTITION_SPLIT) {
        Ok(child) => sq = child,
        Err(_) => break,
      }
    }
    // Subtree sizes, from the 4x4 leaves up.
    ns_depth_offset.extend(d1_depth_offset.iter().copied());
    for depth in (0..ns_depth_offset.len() - 1).rev() {
      ns_depth_offset[depth] += 4 * ns_depth_offset[depth + 1];
    }

    let mut table = GeometryTable {
      blocks: Vec::with_capacity(ns_depth_offset[0]),
      d1_depth_offset,
      ns_depth_offset,
      sb_size,
      chroma_sampling,
    };
    table.build(0, 0, sb_size.block_size(), 0);
    debug_assert_eq!(table.blocks.len(), table.ns_depth_offset[0]);
    table
  }

  fn build(&mut self, x: usize, y: usize, sq_size: BlockSize, depth: usize) {
    let s = sq_size.width();
    for &shape in sq_size.allowed_shapes() {
      for (nsi, (bx, by, bw, bh)) in
        shape_rects(shape, s).into_iter().enumerate()
      {
        let mut geom = BlockGeom::new(
          x + bx,
          y + by,
          bw,
          bh,
          shape,
          nsi,
          sq_size,
          depth,
          self.chroma_sampling,
        );
        geom.d1_depth_offset = self.d1_depth_offset[depth];
        geom.ns_depth_offset = self.ns_depth_offset[depth];
        self.blocks.push(geom);
      }
    }
    if let Ok(child) = sq_size.subsize(PARTITION_SPLIT) {
      let half = s / 2;
      for k in 0..4 {
        self.build(x + (k & 1) * half, y + (k >> 1) * half, child, depth + 1);
      }
    }
  }

  /// # Panics
  ///
  /// - If `index` is past the end of the table.
  #[inline]
  pub fn lookup(&self, index: usize) -> &BlockGeom {
    &self.blocks[index]
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  #[inline]
  pub const fn sb_size(&self) -> SuperblockSize {
    self.sb_size
  }

  #[inline]
  pub const fn chroma_sampling(&self) -> ChromaSampling {
    self.chroma_sampling
  }

  #[inline]
  pub fn d1_depth_offset(&self, depth: usize) -> usize {
    self.d1_depth_offset[depth]
  }

  #[inline]
  pub fn ns_depth_offset(&self, depth: usize) -> usize {
    self.ns_depth_offset[depth]
  }

  /// Index of the next node to visit after the node at `node`.
  #[inline]
  pub fn advance(&self, node: usize, split: bool) -> usize {
    let geom = &self.blocks[node];
    debug_assert!(geom.shape == PARTITION_NONE);
    node
      + if split { geom.d1_depth_offset } else { geom.ns_depth_offset }
  }

  /// Indices of the blocks `shape` partitions the node at `node` into, or
  /// `None` when the node cannot take that shape.
  pub fn shape_blocks(
    &self, node: usize, shape: PartitionType,
  ) -> Option<Range<usize>> {
    let sq_size = self.blocks[node].sq_size;
    let mut start = node;
    for &s in sq_size.allowed_shapes() {
      if s == shape {
        return Some(start..start + s.block_count());
      }
      start += s.block_count();
    }
    None
  }

  /// Whether the node at `node` needs a decision: nodes whose origin lies
  /// outside the picture are not coded.
  #[inline]
  pub fn node_in_picture(
    &self, node: usize, sbo: SuperBlockOffset, width: usize, height: usize,
  ) -> bool {
    let origin = self.blocks[node].origin;
    let x = (sbo.x << self.sb_size.log2()) + origin.x;
    let y = (sbo.y << self.sb_size.log2()) + origin.y;
    x < width && y < height
  }
}
