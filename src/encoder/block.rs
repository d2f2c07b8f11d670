// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::api::EncoderError;
use crate::cfl::*;
use crate::context::SuperBlockOffset;
use crate::deltaq::QpDecision;
use crate::encoder::motion_comp::{block_rect, motion_compensate};
use crate::encoder::*;
use crate::geometry::BlockGeom;
use crate::predict::{predict_intra, IntraEdge, PredictionMode};
use crate::quantize::QuantizationContext;
use crate::tiling::*;
use crate::transform::{TxType, MAX_TX_SQUARE};

/// Rejects mode decisions the coding loop cannot reconstruct.
fn check_modes<T: Pixel>(
  fi: &FrameInvariants<'_, T>, cu: &CodingUnit, geom: &BlockGeom,
  num_planes: usize,
) -> Result<(), EncoderError> {
  let luma = cu.luma_mode;
  let invalid =
    |mode, plane| Err(EncoderError::InvalidPredictionMode { mode, plane });

  if luma.is_cfl() {
    return invalid(luma, 0);
  }
  if luma.is_intra() {
    if cu.ref_frames.iter().any(|rf| rf.is_inter()) {
      return invalid(luma, 0);
    }
    let chroma = cu.chroma_mode;
    if num_planes > 1
      && (!chroma.is_intra() || chroma.is_cfl() && !geom.bsize.cfl_allowed())
    {
      return invalid(chroma, 1);
    }
  } else {
    for (rf, _) in cu.references() {
      fi.reference(rf, luma)?;
    }
  }

  if !cu.tx_type.is_allowed(geom.tx_size) {
    return Err(EncoderError::InvalidTxType {
      tx_type: cu.tx_type,
      tx_size: geom.tx_size,
    });
  }
  Ok(())
}

/// Predicts and codes both chroma planes of a chroma from luma block.
///
/// Returns the scaling and the number of non-zero levels of each plane.
fn encode_cfl<T: Pixel, O: ReconObserver<T>>(
  fi: &FrameInvariants<'_, T>, fs: &mut FrameState<T>, cu: &mut CodingUnit,
  geom: &BlockGeom, sbo: SuperBlockOffset, tx_type: TxType,
  coeffs: &mut Vec<i32>, observer: &mut O,
) -> ([i16; 2], [u32; 2]) {
  let bit_depth = fi.bit_depth;
  let tx_size = geom.tx_size_uv;
  debug_assert_eq!(geom.tx_count_uv, (1, 1));

  let PlaneConfig { xdec, ydec, .. } = fs.rec.planes[1].cfg;
  let (po, w, h) =
    block_rect(geom, sbo, fi.sb_size.log2(), 1, &fs.rec.planes[1].cfg);

  let mut ac: Aligned<[i16; MAX_TX_SQUARE]> = Aligned::zeroed();
  {
    let luma = &fs.rec.planes[0];
    let luma_x = po.x << xdec;
    let luma_y = po.y << ydec;
    let luma_w = (w << xdec).min(luma.cfg.width - luma_x as usize);
    let luma_h = (h << ydec).min(luma.cfg.height - luma_y as usize);
    luma_ac(
      &mut ac.data,
      &luma.region(Area::StartingAt { x: luma_x, y: luma_y }),
      w,
      h,
      xdec,
      ydec,
      luma_w,
      luma_h,
    );
  }

  let mut qc = QuantizationContext::default();
  qc.update(cu.qp.qindex, tx_size, true, bit_depth);

  let mut alphas = [0i16; 2];
  let mut nonzero = [0u32; 2];
  for p in 1..3 {
    let area = Area::Rect { x: po.x, y: po.y, width: w, height: h };
    let FrameState { rec, nc } = &mut *fs;
    let rec = &mut rec.planes[p];

    let edge = IntraEdge::gather(nc, p, po, w, h, bit_depth);
    predict_intra(
      PredictionMode::UV_CFL_PRED,
      &mut rec.region_mut(area),
      &edge,
      w,
      h,
      bit_depth,
    );
    let alpha = match cu.cfl {
      Some(cfl) => cfl.alpha(p - 1),
      None => search_cfl_alpha(
        &fi.source.planes[p].region(area),
        &rec.region(area),
        &ac.data,
        w,
        h,
        bit_depth,
      ),
    };
    pred_cfl(&mut rec.region_mut(area), &ac.data, alpha, w, h, bit_depth);
    alphas[p - 1] = alpha;

    if let Some(tu) = encode_tx_block(
      fi,
      fs,
      &qc,
      cu.qp.qindex,
      p,
      po,
      tx_size,
      tx_type,
      None,
      cu.skip,
      coeffs,
      observer,
    ) {
      nonzero[p - 1] = u32::from(tu.nonzero);
      cu.tx_units.push(tu);
    }
  }
  (alphas, nonzero)
}

/// Reconstructs the leaf block at `index` of the superblock at `sbo` and
/// returns its finalized coding unit.
///
/// The luma transform blocks are coded before the chroma ones, and every
/// transform block is published to the neighbor store as soon as it is
/// reconstructed.
///
/// # Errors
///
/// - Returns `EncoderError::InvalidPredictionMode`, `InvalidTxType` or
///   `MissingReference` if the mode decision cannot be reconstructed.
pub fn encode_block<T: Pixel, O: ReconObserver<T>>(
  fi: &FrameInvariants<'_, T>, fs: &mut FrameState<T>, sbo: SuperBlockOffset,
  index: usize, mut cu: CodingUnit, sb_qp: QpDecision, coeffs: &mut Vec<i32>,
  observer: &mut O,
) -> Result<CodingUnit, EncoderError> {
  let geom = fi.table.lookup(index);
  let num_planes = if geom.has_uv { fs.rec.num_planes() } else { 1 };
  check_modes(fi, &cu, geom, num_planes)?;

  let bo = sbo.with_relative(fi.sb_size, geom.origin);
  let is_inter = cu.is_inter();
  cu.block_index = index;
  cu.bo = bo;
  cu.bsize = geom.bsize;
  cu.qp = fi.delta_q.block_qp(sb_qp, cu.stats.as_ref());
  cu.neighbors = fs.nc.mode_context(bo);
  cu.tx_units.clear();
  cu.has_coeff = [false; MAX_PLANES];
  cu.plane_tx_type = [TxType::DCT_DCT; MAX_PLANES];

  if is_inter {
    cu.chroma_mode = cu.luma_mode;
    cu.cfl = None;
    motion_compensate(fi, fs, &cu, geom, sbo, num_planes)?;
  }

  let tx_type = cu.tx_type;
  let luma_mode = (!is_inter).then_some(cu.luma_mode);
  let luma_nz = write_tx_blocks(
    fi, fs, &mut cu, geom, sbo, 0, tx_type, luma_mode, coeffs, observer,
  );
  cu.has_coeff[0] = luma_nz != 0;
  if luma_nz != 0 {
    cu.plane_tx_type[0] = tx_type;
  }

  if num_planes > 1 {
    let uv_tx_type = if is_inter && luma_nz == 0 {
      TxType::DCT_DCT
    } else if tx_type.is_allowed(geom.tx_size_uv) {
      tx_type
    } else {
      TxType::DCT_DCT
    };

    let mut uv_nz = [0u32; 2];
    if cu.chroma_mode.is_cfl() {
      let (alphas, nz) =
        encode_cfl(fi, fs, &mut cu, geom, sbo, uv_tx_type, coeffs, observer);
      uv_nz = nz;
      if alphas == [0, 0] {
        cu.chroma_mode = PredictionMode::DC_PRED;
        cu.cfl = None;
      } else {
        cu.cfl = Some(CFLParams::from_alpha(alphas[0], alphas[1]));
      }
    } else {
      let chroma_mode = (!is_inter).then_some(cu.chroma_mode);
      for p in 1..num_planes {
        uv_nz[p - 1] = write_tx_blocks(
          fi,
          fs,
          &mut cu,
          geom,
          sbo,
          p,
          uv_tx_type,
          chroma_mode,
          coeffs,
          observer,
        );
      }
    }

    for p in 1..num_planes {
      cu.has_coeff[p] = uv_nz[p - 1] != 0;
      if cu.has_coeff[p] {
        cu.plane_tx_type[p] = uv_tx_type;
      }
    }
  }

  fs.nc.update_modes(
    bo,
    geom.bsize,
    cu.luma_mode,
    cu.chroma_mode,
    is_inter,
    cu.mv[0],
    cu.skip,
  );

  cu.block_has_coeff = cu.has_coeff.iter().any(|&c| c);
  cu.filter_tx_edges =
    fi.enable_loop_filter && !(is_inter && !cu.block_has_coeff);
  Ok(cu)
}
