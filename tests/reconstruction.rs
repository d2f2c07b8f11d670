// Copyright (c) 2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use av1_recon::frame::{fill_plane, AsRegion};
use av1_recon::prelude::*;
use av1_recon::quantize::{ac_q, dequantize};
use av1_recon::tiling::PlaneRegion;
use av1_recon::transform::inverse_transform_add;

#[derive(Default)]
struct Recorder {
  blocks: Vec<(TransformUnit, Vec<i32>, Vec<u8>)>,
  superblocks: usize,
}

impl ReconObserver<u8> for Recorder {
  fn transform_block(
    &mut self, tu: &TransformUnit, levels: &[i32], recon: &PlaneRegion<'_, u8>,
  ) {
    let (w, h) = (tu.tx_size.width(), tu.tx_size.height());
    let samples = (0..h).flat_map(|y| recon[y][..w].to_vec()).collect();
    self.blocks.push((*tu, levels.to_vec(), samples));
  }

  fn superblock(&mut self, _sbo: SuperBlockOffset, _sb: &FinalizedSuperblock) {
    self.superblocks += 1;
  }
}

fn picture<F: FnMut(usize, usize) -> u8>(
  w: usize, h: usize, mut luma: F,
) -> Picture<u8> {
  let mut pic = Picture::new(w, h, ChromaSampling::Cs420, 8);
  pic.fill_plane_with(0, &mut luma);
  pic.fill_plane_with(1, |_, _| 128);
  pic.fill_plane_with(2, |_, _| 128);
  pic.pad();
  pic
}

#[test]
fn flat_skipped_picture_reconstructs_exactly(
) -> Result<(), Box<dyn std::error::Error>> {
  let config = EncoderConfig { base_q_idx: 60, ..Default::default() };
  let source = picture(128, 128, |_, _| 128);

  let fi =
    FrameInvariants::new(&config, &source, PictureComplexity::default())?;
  let mut fs = FrameState::new(&fi);
  let cu = CodingUnit {
    skip: true,
    ..CodingUnit::intra(PredictionMode::DC_PRED, PredictionMode::DC_PRED)
  };
  let modes: Vec<_> = (0..fi.sb_cols() * fi.sb_rows())
    .map(|_| {
      SuperblockModes::uniform(&fi.table, BlockSize::BLOCK_64X64, &cu)
    })
    .collect();

  let mut recorder = Recorder::default();
  let sbs = encode_picture(&fi, &mut fs, &modes, &mut recorder)?;
  assert_eq!(sbs.len(), 4);
  assert_eq!(recorder.superblocks, 4);

  for sb in &sbs {
    assert_eq!(sb.has_coeff_count, 0);
    assert!(sb.coeffs.iter().all(|&c| c == 0));
    assert!(sb.units.iter().all(|cu| !cu.block_has_coeff));
  }
  for p in 0..3 {
    let (w, h) = source.plane_dimensions(p);
    let rec = fs.rec.planes[p].as_region();
    for y in 0..h {
      assert!(rec[y][..w].iter().all(|&v| v == 128), "plane {p} row {y}");
    }
  }
  Ok(())
}

fn reconstruct_ramp(qindex: u8) -> Result<(), Box<dyn std::error::Error>> {
  let config = EncoderConfig { base_q_idx: qindex, ..Default::default() };
  let source = picture(8, 8, |x, y| (y * 8 + x) as u8);

  let fi =
    FrameInvariants::new(&config, &source, PictureComplexity::default())?;
  let mut fs = FrameState::new(&fi);
  let cu = CodingUnit::intra(PredictionMode::DC_PRED, PredictionMode::DC_PRED);
  let modes = SuperblockModes::uniform(&fi.table, BlockSize::BLOCK_8X8, &cu);

  let mut recorder = Recorder::default();
  let sbs = encode_picture(&fi, &mut fs, &[modes], &mut recorder)?;
  assert_eq!(sbs.len(), 1);

  let (tu, levels, samples) = recorder
    .blocks
    .iter()
    .find(|(tu, ..)| tu.plane == 0)
    .ok_or("no luma transform block")?;
  assert!(tu.has_coeff());

  // Rebuild the block from its levels: DC prediction with no neighbors is
  // mid-gray, plus the inverse transform of the dequantized levels.
  let (w, h) = (tu.tx_size.width(), tu.tx_size.height());
  let mut expected = Plane::new(w, h, 0, 0, 0, 0);
  fill_plane(&mut expected, w, h, |_, _| 128u8);
  let mut rcoeffs = vec![0; tu.tx_size.area()];
  dequantize(qindex, levels, tu.eob, &mut rcoeffs, tu.tx_size, 8);
  inverse_transform_add(
    &rcoeffs,
    &mut expected.as_region_mut(),
    tu.eob,
    tu.tx_size,
    tu.tx_type,
    8,
  );

  let expected = expected.as_region();
  let rec = fs.rec.planes[0].as_region();
  let src = source.planes[0].as_region();
  let bound = i32::from(ac_q(qindex, 8)) / 2 + 1;
  for y in 0..h {
    assert_eq!(&rec[y][..w], &expected[y][..w]);
    assert_eq!(&rec[y][..w], &samples[y * w..(y + 1) * w]);
    for x in 0..w {
      let err = i32::from(rec[y][x]) - i32::from(src[y][x]);
      assert!(err.abs() <= bound, "({x}, {y}) off by {err}");
    }
  }
  Ok(())
}

#[test]
fn ramp_reconstruction_fine_quantizer(
) -> Result<(), Box<dyn std::error::Error>> {
  reconstruct_ramp(1)
}

#[test]
fn ramp_reconstruction_coarse_quantizer(
) -> Result<(), Box<dyn std::error::Error>> {
  reconstruct_ramp(40)
}

#[test]
fn ramp_block_matches_reference_values(
) -> Result<(), Box<dyn std::error::Error>> {
  let config = EncoderConfig { base_q_idx: 60, ..Default::default() };
  let source = picture(8, 8, |x, y| (100 + 3 * x + 2 * y) as u8);

  let fi =
    FrameInvariants::new(&config, &source, PictureComplexity::default())?;
  let mut fs = FrameState::new(&fi);
  let cu = CodingUnit::intra(PredictionMode::DC_PRED, PredictionMode::DC_PRED);
  let modes = SuperblockModes::uniform(&fi.table, BlockSize::BLOCK_8X8, &cu);

  let mut recorder = Recorder::default();
  encode_picture(&fi, &mut fs, &[modes], &mut recorder)?;
  let (tu, levels, samples) = recorder
    .blocks
    .iter()
    .find(|(tu, ..)| tu.plane == 0)
    .ok_or("no luma transform block")?;

  // A separable ramp against a flat 128 prediction only excites the
  // first row and column of the transform.
  #[rustfmt::skip]
  let expected_levels: [i32; 64] = [
    -12, -6, 0, -1, 0, 0, 0, 0,
     -4,  0, 0,  0, 0, 0, 0, 0,
      0,  0, 0,  0, 0, 0, 0, 0,
      0,  0, 0,  0, 0, 0, 0, 0,
      0,  0, 0,  0, 0, 0, 0, 0,
      0,  0, 0,  0, 0, 0, 0, 0,
      0,  0, 0,  0, 0, 0, 0, 0,
      0,  0, 0,  0, 0, 0, 0, 0,
  ];
  #[rustfmt::skip]
  let expected_samples: [u8; 64] = [
    102, 105, 108, 111, 113, 115, 119, 122,
    103, 105, 109, 112, 113, 116, 120, 122,
    104, 107, 111, 113, 115, 118, 121, 124,
    106, 109, 113, 115, 117, 120, 123, 126,
    109, 111, 115, 118, 119, 122, 126, 128,
    111, 114, 117, 120, 122, 124, 128, 131,
    112, 115, 119, 121, 123, 126, 129, 132,
    113, 116, 120, 122, 124, 127, 130, 133,
  ];

  assert_eq!(tu.tx_size, TxSize::TX_8X8);
  assert_eq!(tu.tx_type, TxType::DCT_DCT);
  assert_eq!(tu.eob, 7);
  assert_eq!(tu.nonzero, 4);
  assert_eq!(&levels[..], &expected_levels[..]);
  assert_eq!(&samples[..], &expected_samples[..]);

  let rec = fs.rec.planes[0].as_region();
  for y in 0..8 {
    assert_eq!(&rec[y][..8], &expected_samples[y * 8..(y + 1) * 8]);
  }
  Ok(())
}
