// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use log::trace;

use crate::api::EncoderError;
use crate::context::SuperBlockOffset;
use crate::encoder::*;
use crate::partition::PartitionType::*;

/// Reconstructs the superblock at `sbo` from its mode decisions.
///
/// The block tree is walked in coding order: a split node descends into
/// its first quadrant, any other node codes the blocks of its partition
/// and skips past its subtree. Nodes and blocks whose origin lies outside
/// the picture are not coded.
///
/// # Errors
///
/// - Returns `EncoderError::MissingPartition` or `MissingCodingUnit` when a
///   visited node has no decision, and the errors of `encode_block`.
pub fn encode_superblock<T: Pixel, O: ReconObserver<T>>(
  fi: &FrameInvariants<'_, T>, fs: &mut FrameState<T>, sbo: SuperBlockOffset,
  modes: &SuperblockModes, observer: &mut O,
) -> Result<FinalizedSuperblock, EncoderError> {
  let table = &fi.table;
  let (width, height) = (fi.source.width, fi.source.height);

  fs.nc.start_superblock(sbo);
  let qp = fi.delta_q.superblock_qp(modes.stats.as_ref());
  trace!("sb ({}, {}): enter, qindex {}", sbo.x, sbo.y, qp.qindex);

  let mut sb = FinalizedSuperblock { sbo, qp, ..Default::default() };
  let mut node = 0;
  while node < table.len() {
    if !table.node_in_picture(node, sbo, width, height) {
      node = table.advance(node, false);
      continue;
    }

    let partition = modes
      .partitions
      .get(node)
      .copied()
      .flatten()
      .ok_or(EncoderError::MissingPartition(node))?;

    if partition == PARTITION_SPLIT {
      // The smallest nodes have nothing to descend into.
      if table.lookup(node).sq_size.subsize(PARTITION_SPLIT).is_err() {
        return Err(EncoderError::MissingPartition(node));
      }
      node = table.advance(node, true);
      continue;
    }

    let blocks = table
      .shape_blocks(node, partition)
      .ok_or(EncoderError::MissingPartition(node))?;
    for index in blocks {
      if !table.node_in_picture(index, sbo, width, height) {
        continue;
      }
      let cu = modes
        .units
        .get(index)
        .and_then(Option::as_ref)
        .ok_or(EncoderError::MissingCodingUnit(index))?;
      let cu = encode_block(
        fi,
        fs,
        sbo,
        index,
        cu.clone(),
        qp,
        &mut sb.coeffs,
        observer,
      )?;
      if cu.block_has_coeff {
        sb.has_coeff_count += 1;
      }
      sb.units.push(cu);
    }
    node = table.advance(node, false);
  }

  trace!(
    "sb ({}, {}): exit, {} blocks, {} with coefficients",
    sbo.x,
    sbo.y,
    sb.units.len(),
    sb.has_coeff_count
  );
  observer.superblock(sbo, &sb);
  Ok(sb)
}

/// Reconstructs a whole picture, superblocks in raster order, and pads the
/// reconstruction so it can serve as a reference.
///
/// `modes` holds one entry per superblock in raster order.
///
/// # Errors
///
/// - Returns `EncoderError::SuperblockCount` if `modes` does not cover the
///   picture.
/// - Returns the first error of `encode_superblock`.
pub fn encode_picture<T: Pixel, O: ReconObserver<T>>(
  fi: &FrameInvariants<'_, T>, fs: &mut FrameState<T>,
  modes: &[SuperblockModes], observer: &mut O,
) -> Result<Vec<FinalizedSuperblock>, EncoderError> {
  let (cols, rows) = (fi.sb_cols(), fi.sb_rows());
  if modes.len() != cols * rows {
    return Err(EncoderError::SuperblockCount {
      given: modes.len(),
      expected: cols * rows,
    });
  }

  fs.nc.reset();
  let mut sbs = Vec::with_capacity(modes.len());
  for (i, sb_modes) in modes.iter().enumerate() {
    let sbo = SuperBlockOffset { x: i % cols, y: i / cols };
    sbs.push(encode_superblock(fi, fs, sbo, sb_modes, observer)?);
  }
  fs.rec.pad();
  Ok(sbs)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::api::EncoderConfig;
  use crate::deltaq::PictureComplexity;
  use crate::frame::*;
  use crate::geometry::GeometryTable;
  use crate::partition::{BlockSize, PartitionType};
  use crate::predict::PredictionMode;
  use pretty_assertions::assert_eq;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn random_source(w: usize, h: usize, seed: u8) -> Picture<u8> {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    let mut pic = Picture::new(w, h, ChromaSampling::Cs420, 8);
    for p in 0..3 {
      pic.fill_plane_with(p, |_, _| ra.gen());
    }
    pic.pad();
    pic
  }

  // Picks a random legal partition for every node, recursing into splits.
  fn random_tree(
    table: &GeometryTable, node: usize, ra: &mut ChaChaRng,
    modes: &mut SuperblockModes, leaves: &mut Vec<usize>,
  ) -> usize {
    let geom = table.lookup(node);
    let can_split = geom.sq_size.subsize(PARTITION_SPLIT).is_ok();
    let shapes = geom.sq_size.allowed_shapes();
    if can_split && ra.gen_bool(0.5) {
      modes.partitions[node] = Some(PARTITION_SPLIT);
      let mut child = table.advance(node, true);
      for _ in 0..4 {
        child = random_tree(table, child, ra, modes, leaves);
      }
      return child;
    }
    let shape = shapes[ra.gen_range(0..shapes.len())];
    let cu =
      CodingUnit::intra(PredictionMode::PAETH_PRED, PredictionMode::V_PRED);
    let blocks = table.shape_blocks(node, shape).unwrap();
    leaves.extend(blocks.clone());
    let units = vec![cu; blocks.len()];
    modes.set_shape(table, node, shape, &units);
    table.advance(node, false)
  }

  #[test]
  fn every_leaf_is_coded_once_in_order() {
    let src = random_source(128, 128, 1);
    let mut ra = ChaChaRng::from_seed([2; 32]);
    for sb_size in [64, 128] {
      let config = EncoderConfig { sb_size, ..Default::default() };
      let fi =
        FrameInvariants::new(&config, &src, PictureComplexity::default())
          .unwrap();
      for _ in 0..4 {
        let mut modes = SuperblockModes::new(&fi.table);
        let mut leaves = Vec::new();
        let end = random_tree(&fi.table, 0, &mut ra, &mut modes, &mut leaves);
        assert_eq!(end, fi.table.len());

        let mut fs = FrameState::new(&fi);
        let sb = encode_superblock(
          &fi,
          &mut fs,
          SuperBlockOffset { x: 0, y: 0 },
          &modes,
          &mut NoopObserver,
        )
        .unwrap();
        let coded: Vec<usize> =
          sb.units.iter().map(|cu| cu.block_index).collect();
        assert_eq!(coded, leaves);
        let area: usize =
          sb.units.iter().map(|cu| cu.bsize.width() * cu.bsize.height()).sum();
        assert_eq!(area, sb_size * sb_size);
      }
    }
  }

  #[test]
  fn nodes_outside_the_picture_are_skipped() {
    // 100x40 leaves the bottom and right of the superblock uncoded.
    let src = random_source(100, 40, 3);
    let config = EncoderConfig::default();
    let fi =
      FrameInvariants::new(&config, &src, PictureComplexity::default())
        .unwrap();
    let cu =
      CodingUnit::intra(PredictionMode::DC_PRED, PredictionMode::DC_PRED);
    let modes =
      SuperblockModes::uniform(&fi.table, BlockSize::BLOCK_16X16, &cu);
    let mut fs = FrameState::new(&fi);
    let sbs =
      encode_picture(&fi, &mut fs, &[modes.clone(), modes], &mut NoopObserver)
        .unwrap();
    assert_eq!(sbs[0].units.len(), 4 * 3);
    assert_eq!(sbs[1].units.len(), 3 * 3);
    assert_eq!(sbs[1].sbo, SuperBlockOffset { x: 1, y: 0 });
  }

  #[test]
  fn missing_decisions_are_errors() {
    let src = random_source(64, 64, 4);
    let config = EncoderConfig::default();
    let fi =
      FrameInvariants::new(&config, &src, PictureComplexity::default())
        .unwrap();
    let mut fs = FrameState::new(&fi);
    let sbo = SuperBlockOffset { x: 0, y: 0 };

    let modes = SuperblockModes::new(&fi.table);
    assert_eq!(
      encode_superblock(&fi, &mut fs, sbo, &modes, &mut NoopObserver)
        .unwrap_err(),
      EncoderError::MissingPartition(0)
    );

    let mut modes = SuperblockModes::new(&fi.table);
    modes.partitions[0] = Some(PartitionType::PARTITION_HORZ);
    let blocks = fi.table.shape_blocks(0, PartitionType::PARTITION_HORZ);
    assert_eq!(
      encode_superblock(&fi, &mut fs, sbo, &modes, &mut NoopObserver)
        .unwrap_err(),
      EncoderError::MissingCodingUnit(blocks.unwrap().start)
    );

    let cu =
      CodingUnit::intra(PredictionMode::DC_PRED, PredictionMode::DC_PRED);
    let modes =
      SuperblockModes::uniform(&fi.table, BlockSize::BLOCK_64X64, &cu);
    assert_eq!(
      encode_picture(&fi, &mut fs, &[modes.clone(), modes], &mut NoopObserver)
        .unwrap_err(),
      EncoderError::SuperblockCount { given: 2, expected: 1 }
    );
    assert_eq!(
      encode_picture(&fi, &mut fs, &[], &mut NoopObserver).unwrap_err(),
      EncoderError::SuperblockCount { given: 0, expected: 1 }
    );
  }

  #[test]
  fn pictures_do_not_leak_into_each_other() {
    let first = random_source(128, 64, 5);
    let second = random_source(128, 64, 6);
    let config = EncoderConfig { base_q_idx: 80, ..Default::default() };
    let cu =
      CodingUnit::intra(PredictionMode::SMOOTH_PRED, PredictionMode::H_PRED);

    let encode = |src: &Picture<u8>, fs: Option<FrameState<u8>>| {
      let fi =
        FrameInvariants::new(&config, src, PictureComplexity::default())
          .unwrap();
      let modes =
        SuperblockModes::uniform(&fi.table, BlockSize::BLOCK_8X8, &cu);
      let mut fs = fs.unwrap_or_else(|| FrameState::new(&fi));
      encode_picture(&fi, &mut fs, &[modes.clone(), modes], &mut NoopObserver)
        .unwrap();
      fs
    };

    let fresh = encode(&second, None);
    let reused = encode(&second, Some(encode(&first, None)));
    for p in 0..3 {
      assert_eq!(fresh.rec.planes[p].data, reused.rec.planes[p].data);
    }
  }
}
