// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! The coding loop: reconstruction of superblocks from decided modes.

use log::debug;

use crate::api::*;
use crate::cfl::CFLParams;
use crate::context::*;
use crate::deltaq::*;
use crate::frame::*;
use crate::geometry::GeometryTable;
use crate::mc::{FilterMode, MotionVector};
use crate::partition::*;
use crate::predict::PredictionMode;
use crate::transform::{TxSize, TxType};
use crate::util::*;

pub use self::block::*;
pub use self::motion_comp::*;
pub use self::observer::*;
pub use self::partition::*;
pub use self::transform::*;

mod block;
mod motion_comp;
mod observer;
mod partition;
mod transform;

/// One transform block of a coded block, as handed to entropy coding.
#[derive(Clone, Copy, Debug)]
pub struct TransformUnit {
  pub plane: usize,
  /// Picture-absolute position in the samples of `plane`.
  pub po: PlaneOffset,
  pub tx_size: TxSize,
  /// `DCT_DCT` whenever the block has no coefficient.
  pub tx_type: TxType,
  pub eob: u16,
  pub nonzero: u16,
  /// Start of the quantized coefficients in `FinalizedSuperblock::coeffs`.
  /// `tx_size.area()` levels follow, row-major.
  pub coeff_offset: usize,
}

impl TransformUnit {
  #[inline]
  pub const fn has_coeff(&self) -> bool {
    self.nonzero != 0
  }
}

/// A leaf block of the partition tree.
///
/// The mode decision fields are filled in before the coding loop runs; the
/// rest is written by the coding loop.
#[derive(Clone, Debug)]
pub struct CodingUnit {
  pub luma_mode: PredictionMode,
  /// Ignored for inter blocks, which predict chroma like luma.
  pub chroma_mode: PredictionMode,
  pub ref_frames: [RefType; 2],
  pub mv: [MotionVector; 2],
  /// Luma transform type.
  pub tx_type: TxType,
  pub skip: bool,
  /// Chroma from luma scaling. Searched by the coding loop when the chroma
  /// mode is `UV_CFL_PRED` and no value was decided.
  pub cfl: Option<CFLParams>,
  /// Statistics for block level quantizer modulation.
  pub stats: Option<SuperblockStats>,

  pub block_index: usize,
  pub bo: BlockOffset,
  pub bsize: BlockSize,
  pub qp: QpDecision,
  pub neighbors: NeighborModeContext,
  pub tx_units: Vec<TransformUnit>,
  /// Transform type signaled for each plane.
  pub plane_tx_type: [TxType; MAX_PLANES],
  pub has_coeff: [bool; MAX_PLANES],
  /// Any plane has a coefficient.
  pub block_has_coeff: bool,
  /// Transform edges inside the block are deblocked.
  pub filter_tx_edges: bool,
}

impl Default for CodingUnit {
  fn default() -> Self {
    CodingUnit {
      luma_mode: PredictionMode::DC_PRED,
      chroma_mode: PredictionMode::DC_PRED,
      ref_frames: [RefType::INTRA_FRAME, RefType::NONE_FRAME],
      mv: [MotionVector::default(); 2],
      tx_type: TxType::DCT_DCT,
      skip: false,
      cfl: None,
      stats: None,
      block_index: 0,
      bo: BlockOffset::default(),
      bsize: BlockSize::BLOCK_4X4,
      qp: QpDecision::default(),
      neighbors: NeighborModeContext::default(),
      tx_units: Vec::new(),
      plane_tx_type: [TxType::DCT_DCT; MAX_PLANES],
      has_coeff: [false; MAX_PLANES],
      block_has_coeff: false,
      filter_tx_edges: false,
    }
  }
}

impl CodingUnit {
  pub fn intra(luma_mode: PredictionMode, chroma_mode: PredictionMode) -> Self {
    CodingUnit { luma_mode, chroma_mode, ..Default::default() }
  }

  /// A single reference inter block.
  pub fn inter(mode: PredictionMode, rf: RefType, mv: MotionVector) -> Self {
    CodingUnit {
      luma_mode: mode,
      chroma_mode: mode,
      ref_frames: [rf, RefType::NONE_FRAME],
      mv: [mv, MotionVector::default()],
      ..Default::default()
    }
  }

  /// A compound inter block.
  pub fn compound(
    mode: PredictionMode, ref_frames: [RefType; 2], mv: [MotionVector; 2],
  ) -> Self {
    CodingUnit {
      luma_mode: mode,
      chroma_mode: mode,
      ref_frames,
      mv,
      ..Default::default()
    }
  }

  #[inline]
  pub fn is_inter(&self) -> bool {
    !self.luma_mode.is_intra()
  }

  /// Reference slots read by the block, in prediction order.
  pub fn references(&self) -> impl Iterator<Item = (RefType, MotionVector)> {
    let count = if self.luma_mode.is_compound() { 2 } else { 1 };
    let refs = self.ref_frames;
    let mvs = self.mv;
    (0..count).map(move |i| (refs[i], mvs[i]))
  }
}

/// Mode decisions of one superblock, indexed like its geometry table.
#[derive(Clone, Debug, Default)]
pub struct SuperblockModes {
  /// Partition of each square node, at the node's index.
  pub partitions: Vec<Option<PartitionType>>,
  /// Coding unit of each leaf, at the leaf's index.
  pub units: Vec<Option<CodingUnit>>,
  pub stats: Option<SuperblockStats>,
}

impl SuperblockModes {
  pub fn new(table: &GeometryTable) -> Self {
    SuperblockModes {
      partitions: vec![None; table.len()],
      units: vec![None; table.len()],
      stats: None,
    }
  }

  /// Splits every node larger than `bsize` and codes the `bsize` squares
  /// with `cu`.
  ///
  /// # Panics
  ///
  /// - If `bsize` is not square.
  pub fn uniform(
    table: &GeometryTable, bsize: BlockSize, cu: &CodingUnit,
  ) -> Self {
    assert_eq!(bsize.width(), bsize.height());
    let mut modes = SuperblockModes::new(table);
    for index in 0..table.len() {
      let geom = table.lookup(index);
      if geom.shape != PartitionType::PARTITION_NONE {
        continue;
      }
      if geom.sq_size == bsize {
        modes.partitions[index] = Some(PartitionType::PARTITION_NONE);
        modes.units[index] = Some(cu.clone());
      } else if geom.sq_size.width() > bsize.width() {
        modes.partitions[index] = Some(PartitionType::PARTITION_SPLIT);
      }
    }
    modes
  }

  /// Codes the node at `node` as `partition` with one unit per block.
  pub fn set_shape(
    &mut self, table: &GeometryTable, node: usize, partition: PartitionType,
    units: &[CodingUnit],
  ) {
    self.partitions[node] = Some(partition);
    if let Some(blocks) = table.shape_blocks(node, partition) {
      for (index, cu) in blocks.zip(units) {
        self.units[index] = Some(cu.clone());
      }
    }
  }
}

/// Output of the coding loop for one superblock.
#[derive(Clone, Debug, Default)]
pub struct FinalizedSuperblock {
  pub sbo: SuperBlockOffset,
  pub qp: QpDecision,
  /// Coded blocks in coding order.
  pub units: Vec<CodingUnit>,
  /// Quantized levels of every transform unit, in coding order.
  pub coeffs: Vec<i32>,
  /// Number of blocks with at least one coefficient.
  pub has_coeff_count: usize,
}

impl FinalizedSuperblock {
  /// Quantized levels of `tu`.
  pub fn levels(&self, tu: &TransformUnit) -> &[i32] {
    &self.coeffs[tu.coeff_offset..tu.coeff_offset + tu.tx_size.area()]
  }
}

/// Everything the coding loop reads and never writes during a picture.
pub struct FrameInvariants<'a, T: Pixel> {
  pub sb_size: SuperblockSize,
  pub bit_depth: usize,
  pub enable_loop_filter: bool,
  pub filter: FilterMode,
  pub table: GeometryTable,
  pub delta_q: DeltaQ,
  pub source: &'a Picture<T>,
  pub refs: [Option<&'a Picture<T>>; INTER_REFS_PER_FRAME],
}

impl<'a, T: Pixel> FrameInvariants<'a, T> {
  /// Resolves `config` for coding `source`.
  ///
  /// # Errors
  ///
  /// - Returns `EncoderError::Config` if `config` does not validate.
  pub fn new(
    config: &EncoderConfig, source: &'a Picture<T>,
    complexity: PictureComplexity,
  ) -> Result<Self, EncoderError> {
    config.validate()?;
    debug!("coding {}x{} picture: {}", source.width, source.height, config);
    let sb_size = config.superblock_size();
    Ok(FrameInvariants {
      sb_size,
      bit_depth: config.bit_depth,
      enable_loop_filter: config.enable_loop_filter,
      filter: config.interp_filter,
      table: GeometryTable::new(sb_size, config.chroma_sampling),
      delta_q: DeltaQ::new(config, complexity),
      source,
      refs: [None; INTER_REFS_PER_FRAME],
    })
  }

  /// Makes `pic` available as the reference of `rf`.
  ///
  /// # Panics
  ///
  /// - If `rf` is not an inter reference.
  pub fn set_reference(&mut self, rf: RefType, pic: &'a Picture<T>) {
    let Some(slot) = rf.to_index() else {
      panic!("{:?} is not an inter reference", rf)
    };
    self.refs[slot] = Some(pic);
  }

  #[inline]
  pub fn sb_cols(&self) -> usize {
    self.sb_size.count(self.source.width)
  }

  #[inline]
  pub fn sb_rows(&self) -> usize {
    self.sb_size.count(self.source.height)
  }

  /// The picture `mode` reads for `rf`.
  pub(crate) fn reference(
    &self, rf: RefType, mode: PredictionMode,
  ) -> Result<&'a Picture<T>, EncoderError> {
    let slot = rf
      .to_index()
      .ok_or(EncoderError::InvalidPredictionMode { mode, plane: 0 })?;
    self.refs[slot].ok_or(EncoderError::MissingReference(slot))
  }
}

/// Everything the coding loop writes: the reconstruction and the neighbor
/// store feeding later blocks.
pub struct FrameState<T: Pixel> {
  pub rec: Picture<T>,
  pub nc: NeighborContext<T>,
}

impl<T: Pixel> FrameState<T> {
  pub fn new(fi: &FrameInvariants<'_, T>) -> Self {
    let src = fi.source;
    let rec = Picture::new(
      src.width,
      src.height,
      src.chroma_sampling,
      src.bit_depth,
    );
    let nc = NeighborContext::new(&rec, fi.sb_size);
    FrameState { rec, nc }
  }
}
