// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::context::SuperBlockOffset;
use crate::encoder::motion_comp::block_rect;
use crate::encoder::*;
use crate::geometry::BlockGeom;
use crate::predict::{predict_intra, IntraEdge, PredictionMode};
use crate::quantize::*;
use crate::scan_order::scan;
use crate::tiling::*;
use crate::transform::*;

// For a transform block,
// predict, transform, quantize, dequantize, inverse-transform, then publish
// the reconstruction to the blocks that follow.
//
// `mode` is `None` when the prediction is already in the reconstruction.
// Skipped blocks are predicted and published but yield no transform unit.
pub fn encode_tx_block<T: Pixel, O: ReconObserver<T>>(
  fi: &FrameInvariants<'_, T>, fs: &mut FrameState<T>,
  qc: &QuantizationContext, qindex: u8, p: usize, po: PlaneOffset,
  tx_size: TxSize, tx_type: TxType, mode: Option<PredictionMode>, skip: bool,
  coeffs: &mut Vec<i32>, observer: &mut O,
) -> Option<TransformUnit> {
  let (w, h) = (tx_size.width(), tx_size.height());
  let bit_depth = fi.bit_depth;
  let area = Area::Rect { x: po.x, y: po.y, width: w, height: h };
  let FrameState { rec, nc } = fs;
  let rec = &mut rec.planes[p];

  if let Some(mode) = mode {
    let edge = IntraEdge::gather(nc, p, po, w, h, bit_depth);
    predict_intra(mode, &mut rec.region_mut(area), &edge, w, h, bit_depth);
  }

  let tu = if skip {
    None
  } else {
    let mut residual_storage: Aligned<[i16; MAX_TX_SQUARE]> =
      Aligned::zeroed();
    let mut coeffs_storage: Aligned<[i32; MAX_TX_SQUARE]> = Aligned::zeroed();
    let mut qcoeffs_storage: Aligned<[i32; MAX_TX_SQUARE]> =
      Aligned::zeroed();
    let mut rcoeffs_storage: Aligned<[i32; MAX_TX_SQUARE]> =
      Aligned::zeroed();
    let residual_buf = &mut residual_storage.data[..tx_size.area()];
    let coeffs_buf = &mut coeffs_storage.data[..tx_size.area()];
    let qcoeffs = &mut qcoeffs_storage.data[..tx_size.area()];
    let rcoeffs = &mut rcoeffs_storage.data[..tx_size.area()];

    residual(
      residual_buf,
      &fi.source.planes[p].region(area),
      &rec.region(area),
      w,
      h,
    );
    forward_transform(residual_buf, coeffs_buf, w, tx_size, tx_type, bit_depth);
    let eob = qc.quantize(coeffs_buf, qcoeffs, tx_size, tx_type);
    let nonzero = count_nonzero(qcoeffs, scan(tx_size, tx_type), eob);

    // Reconstruct
    dequantize(qindex, qcoeffs, eob, rcoeffs, tx_size, bit_depth);
    inverse_transform_add(
      rcoeffs,
      &mut rec.region_mut(area),
      eob,
      tx_size,
      tx_type,
      bit_depth,
    );

    let coeff_offset = coeffs.len();
    coeffs.extend_from_slice(qcoeffs);
    Some(TransformUnit {
      plane: p,
      po,
      tx_size,
      tx_type: if nonzero == 0 { TxType::DCT_DCT } else { tx_type },
      eob,
      nonzero,
      coeff_offset,
    })
  };

  let recon = rec.region(area);
  nc.write_recon(p, &recon, po, w, h);
  if let Some(tu) = &tu {
    let levels = &coeffs[tu.coeff_offset..tu.coeff_offset + tx_size.area()];
    observer.transform_block(tu, levels, &recon);
  }
  tu
}

/// Codes the transform blocks of plane `p` of a block in raster order and
/// returns their number of non-zero levels.
///
/// Each block reads the reconstruction of the ones before it, so the order
/// cannot change.
pub fn write_tx_blocks<T: Pixel, O: ReconObserver<T>>(
  fi: &FrameInvariants<'_, T>, fs: &mut FrameState<T>, cu: &mut CodingUnit,
  geom: &BlockGeom, sbo: SuperBlockOffset, p: usize, tx_type: TxType,
  mode: Option<PredictionMode>, coeffs: &mut Vec<i32>, observer: &mut O,
) -> u32 {
  let (po, _, _) =
    block_rect(geom, sbo, fi.sb_size.log2(), p, &fs.rec.planes[p].cfg);
  let tx_size = if p == 0 { geom.tx_size } else { geom.tx_size_uv };
  let mut qc = QuantizationContext::default();
  qc.update(cu.qp.qindex, tx_size, !cu.is_inter(), fi.bit_depth);

  let mut nonzero = 0;
  for (x, y, tx_size) in geom.tx_blocks(p) {
    let tx_po = PlaneOffset { x: po.x + x as isize, y: po.y + y as isize };
    if let Some(tu) = encode_tx_block(
      fi,
      fs,
      &qc,
      cu.qp.qindex,
      p,
      tx_po,
      tx_size,
      tx_type,
      mode,
      cu.skip,
      coeffs,
      observer,
    ) {
      nonzero += u32::from(tu.nonzero);
      cu.tx_units.push(tu);
    }
  }
  nonzero
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::api::EncoderConfig;
  use crate::deltaq::PictureComplexity;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn textured_source() -> Picture<u8> {
    let mut ra = ChaChaRng::from_seed([3; 32]);
    let mut pic = Picture::new(64, 64, ChromaSampling::Cs420, 8);
    for p in 0..3 {
      pic.fill_plane_with(p, |_, _| ra.gen_range(16..240));
    }
    pic.pad();
    pic
  }

  #[test]
  fn later_transform_blocks_predict_from_earlier_reconstruction() {
    let src = textured_source();
    let config = EncoderConfig::default();
    let fi =
      FrameInvariants::new(&config, &src, PictureComplexity::default())
        .unwrap();
    let mut fs = FrameState::new(&fi);
    fs.nc.start_superblock(SuperBlockOffset { x: 0, y: 0 });

    let mut qc = QuantizationContext::default();
    qc.update(60, TxSize::TX_32X32, true, 8);
    let mut coeffs = Vec::new();
    let mut obs = NoopObserver;
    let mut code = |fs: &mut FrameState<u8>, x, y, mode, skip| {
      encode_tx_block(
        &fi,
        fs,
        &qc,
        60,
        0,
        PlaneOffset { x, y },
        TxSize::TX_32X32,
        TxType::DCT_DCT,
        Some(mode),
        skip,
        &mut coeffs,
        &mut obs,
      )
    };

    let first = code(&mut fs, 0, 0, PredictionMode::DC_PRED, false).unwrap();
    assert!(first.has_coeff());
    assert!(code(&mut fs, 0, 32, PredictionMode::V_PRED, true).is_none());
    assert!(code(&mut fs, 32, 0, PredictionMode::H_PRED, true).is_none());

    let rec = &fs.rec.planes[0];
    let bottom: Vec<u8> = rec.region(Area::StartingAt { x: 0, y: 31 })[0]
      [..32]
      .to_vec();
    let below = rec.region(Area::StartingAt { x: 0, y: 32 });
    for row in below.rows_iter().take(32) {
      assert_eq!(&row[..32], &bottom[..]);
    }
    let first_block = rec.region(Area::StartingAt { x: 0, y: 0 });
    let right = rec.region(Area::StartingAt { x: 32, y: 0 });
    for (r, row) in right.rows_iter().take(32).enumerate() {
      assert!(row[..32].iter().all(|&v| v == first_block[r][31]));
    }
  }

  #[test]
  fn zero_residual_forces_the_default_type() {
    let src = textured_source();
    let config = EncoderConfig::default();
    let fi =
      FrameInvariants::new(&config, &src, PictureComplexity::default())
        .unwrap();
    let mut fs = FrameState::new(&fi);
    fs.nc.start_superblock(SuperBlockOffset { x: 0, y: 0 });

    // A prediction equal to the source leaves nothing to code.
    let area = Area::Rect { x: 8, y: 8, width: 8, height: 8 };
    fs.rec.planes[0]
      .region_mut(area)
      .copy_from(&src.planes[0].region(area), 8, 8);

    let mut qc = QuantizationContext::default();
    qc.update(100, TxSize::TX_8X8, false, 8);
    let mut coeffs = Vec::new();
    let tu = encode_tx_block(
      &fi,
      &mut fs,
      &qc,
      100,
      0,
      PlaneOffset { x: 8, y: 8 },
      TxSize::TX_8X8,
      TxType::ADST_ADST,
      None,
      false,
      &mut coeffs,
      &mut NoopObserver,
    )
    .unwrap();
    assert_eq!(tu.eob, 0);
    assert_eq!(tu.nonzero, 0);
    assert_eq!(tu.tx_type, TxType::DCT_DCT);
    assert!(coeffs.iter().all(|&c| c == 0));
  }
}
