// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Adaptive quantizer offsets per superblock or block.
//!
//! Offsets are derived in units of the delta quantizer resolution and
//! scaled to quantizer indices once, after every adjustment.

use crate::api::{DeltaQConfig, EncoderConfig, QpModulation};
use crate::context::{MAX_SB_SIZE_LOG2, MI_SIZE_LOG2};

use log::debug;

/// Number of block tree depths, from 128x128 down to 4x4.
pub const COMPLEXITY_DEPTHS: usize = MAX_SB_SIZE_LOG2 - MI_SIZE_LOG2 + 1;

/// Largest offset, in resolution steps, either way.
pub const MAX_DELTA_Q_STEPS: i32 = 8;

const LOGO_STEPS: i32 = 3;
const BACKGROUND_STEPS: i32 = 2;
const GRASS_STEPS: i32 = 1;

// Forced offsets of smooth areas, by increasing variance.
const ANTI_CONTOURING_BANDS: [(u32, i32); 3] = [(16, -3), (64, -2), (256, -1)];

/// Distortion spread of the blocks coded at one depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComplexityBucket {
  pub min: u64,
  pub avg: u64,
  pub max: u64,
}

impl ComplexityBucket {
  /// Offset in resolution steps: a piecewise-linear map sending `min` to
  /// `-MAX_DELTA_Q_STEPS`, `avg` to zero and `max` to `MAX_DELTA_Q_STEPS`.
  fn offset(&self, distortion: u64) -> i32 {
    let d = distortion.clamp(self.min, self.max);
    if d >= self.avg {
      if self.max == self.avg {
        return 0;
      }
      ((d - self.avg) * MAX_DELTA_Q_STEPS as u64 / (self.max - self.avg))
        as i32
    } else {
      if self.avg == self.min {
        return 0;
      }
      -(((self.avg - d) * MAX_DELTA_Q_STEPS as u64 / (self.avg - self.min))
        as i32)
    }
  }
}

/// Picture-wide distortion buckets, per block depth, for intra and inter
/// coded blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PictureComplexity {
  pub intra: [ComplexityBucket; COMPLEXITY_DEPTHS],
  pub inter: [ComplexityBucket; COMPLEXITY_DEPTHS],
}

impl PictureComplexity {
  /// Gathers the buckets from the statistics of every superblock (or
  /// block) of the picture.
  pub fn from_stats<'a, I: IntoIterator<Item = &'a SuperblockStats>>(
    stats: I,
  ) -> Self {
    let mut sums = [[(u64::MAX, 0u64, 0u64, 0u64); COMPLEXITY_DEPTHS]; 2];
    for s in stats {
      let (min, sum, max, count) = &mut sums[s.is_intra as usize][s.depth];
      *min = (*min).min(s.distortion);
      *max = (*max).max(s.distortion);
      *sum += s.distortion;
      *count += 1;
    }

    let mut complexity = PictureComplexity::default();
    for (intra, buckets) in
      [(false, &mut complexity.inter), (true, &mut complexity.intra)]
    {
      for (bucket, &(min, sum, max, count)) in
        buckets.iter_mut().zip(sums[intra as usize].iter())
      {
        if count > 0 {
          *bucket = ComplexityBucket { min, avg: sum / count, max };
        }
      }
    }
    complexity
  }

  #[inline]
  pub fn bucket(&self, is_intra: bool, depth: usize) -> &ComplexityBucket {
    if is_intra {
      &self.intra[depth]
    } else {
      &self.inter[depth]
    }
  }
}

/// Statistics of one superblock (or block) gathered by the analysis
/// stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SuperblockStats {
  /// Prediction distortion of the area.
  pub distortion: u64,
  /// Depth of the block tree level the distortion was measured at.
  pub depth: usize,
  pub is_intra: bool,
  pub background: bool,
  pub logo: bool,
  pub grass: bool,
  /// Edges that do not move across frames; the quantizer is never raised
  /// on them.
  pub stationary_edge: bool,
  /// Sample variance of the source.
  pub variance: u32,
}

/// Quantizer chosen for an area, with its offset from the picture
/// quantizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QpDecision {
  pub qindex: u8,
  pub delta: i16,
}

/// Derives the quantizer of an area.
///
/// The result always lies in `[min_q, max_q]` (and under the rate control
/// ceiling) and its delta is a multiple of the resolution.
pub fn derive_qindex(
  cfg: &DeltaQConfig, base_q_idx: u8, min_q: u8, max_q: u8,
  stats: &SuperblockStats, complexity: &PictureComplexity,
) -> QpDecision {
  let (lo, hi) = qindex_bounds(cfg, min_q, max_q);
  let base = base_q_idx.clamp(lo, hi) as i32;

  let bucket = complexity.bucket(stats.is_intra, stats.depth);
  let mut steps = bucket.offset(stats.distortion);

  if stats.logo {
    steps -= LOGO_STEPS;
  }
  if stats.background {
    steps -= BACKGROUND_STEPS;
  }
  if stats.grass {
    steps -= GRASS_STEPS;
  }
  if stats.stationary_edge && steps > 0 {
    steps = 0;
  }
  if cfg.anti_contouring {
    if let Some(&(_, forced)) =
      ANTI_CONTOURING_BANDS.iter().find(|&&(band, _)| stats.variance < band)
    {
      steps = forced;
    }
  }

  let res = 1i32 << cfg.resolution_log2;
  let qindex = (base + steps * res).clamp(lo as i32, hi as i32);
  // Truncating toward zero keeps the result between base and the clamp.
  let delta = (qindex - base) / res * res;

  QpDecision { qindex: (base + delta) as u8, delta: delta as i16 }
}

fn qindex_bounds(cfg: &DeltaQConfig, min_q: u8, max_q: u8) -> (u8, u8) {
  let hi = match cfg.rc_ceiling {
    Some(ceiling) => max_q.min(ceiling).max(min_q),
    None => max_q,
  };
  (min_q, hi)
}

/// Quantizer selection for one picture, resolved from the configuration.
#[derive(Clone, Debug)]
pub struct DeltaQ {
  cfg: DeltaQConfig,
  base_q_idx: u8,
  min_q: u8,
  max_q: u8,
  complexity: PictureComplexity,
}

impl DeltaQ {
  pub fn new(config: &EncoderConfig, complexity: PictureComplexity) -> Self {
    let dq = DeltaQ {
      cfg: config.delta_q,
      base_q_idx: config.base_q_idx,
      min_q: config.min_q_idx,
      max_q: config.max_q_idx,
      complexity,
    };
    debug!(
      "delta q: {:?} base {} range {}..={} res {} anti-contouring {}",
      dq.cfg.modulation,
      dq.base_q_idx,
      dq.min_q,
      dq.max_q,
      1 << dq.cfg.resolution_log2,
      dq.cfg.anti_contouring
    );
    dq
  }

  #[inline]
  pub const fn modulation(&self) -> QpModulation {
    self.cfg.modulation
  }

  /// The picture quantizer, used by every area when modulation is off.
  pub fn base(&self) -> QpDecision {
    let (lo, hi) = qindex_bounds(&self.cfg, self.min_q, self.max_q);
    QpDecision { qindex: self.base_q_idx.clamp(lo, hi), delta: 0 }
  }

  fn derive(&self, stats: &SuperblockStats) -> QpDecision {
    derive_qindex(
      &self.cfg,
      self.base_q_idx,
      self.min_q,
      self.max_q,
      stats,
      &self.complexity,
    )
  }

  /// Quantizer of a superblock.
  pub fn superblock_qp(&self, stats: Option<&SuperblockStats>) -> QpDecision {
    match (self.cfg.modulation, stats) {
      (QpModulation::Off, _) | (_, None) => self.base(),
      (_, Some(stats)) => self.derive(stats),
    }
  }

  /// Quantizer of a block of a superblock coded at `sb`.
  pub fn block_qp(
    &self, sb: QpDecision, stats: Option<&SuperblockStats>,
  ) -> QpDecision {
    match (self.cfg.modulation, stats) {
      (QpModulation::Off, _) => self.base(),
      (QpModulation::Block, Some(stats)) => self.derive(stats),
      _ => sb,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn complexity() -> PictureComplexity {
    let stats: Vec<SuperblockStats> = [100u64, 300, 500]
      .iter()
      .map(|&distortion| SuperblockStats {
        distortion,
        depth: 1,
        is_intra: true,
        ..Default::default()
      })
      .collect();
    PictureComplexity::from_stats(&stats)
  }

  fn cfg(resolution_log2: u8) -> DeltaQConfig {
    DeltaQConfig {
      modulation: QpModulation::Superblock,
      resolution_log2,
      anti_contouring: false,
      rc_ceiling: None,
    }
  }

  fn stats(distortion: u64) -> SuperblockStats {
    SuperblockStats {
      distortion,
      depth: 1,
      is_intra: true,
      ..Default::default()
    }
  }

  #[test]
  fn buckets_track_min_avg_max() {
    let c = complexity();
    assert_eq!(c.intra[1], ComplexityBucket { min: 100, avg: 300, max: 500 });
    assert_eq!(c.intra[0], ComplexityBucket::default());
    assert_eq!(c.inter[1], ComplexityBucket::default());
  }

  #[test]
  fn distortion_maps_linearly_between_buckets() {
    let c = complexity();
    let qp = |d| derive_qindex(&cfg(2), 100, 0, 255, &stats(d), &c);
    assert_eq!(qp(300), QpDecision { qindex: 100, delta: 0 });
    assert_eq!(qp(500), QpDecision { qindex: 132, delta: 32 });
    assert_eq!(qp(100), QpDecision { qindex: 68, delta: -32 });
    assert_eq!(qp(400), QpDecision { qindex: 116, delta: 16 });
    // Past the extremes the offset saturates.
    assert_eq!(qp(u64::MAX), qp(500));
    assert_eq!(qp(0), qp(100));
  }

  #[test]
  fn flags_and_overrides() {
    let c = complexity();
    let base = stats(500);

    let logo = SuperblockStats { logo: true, ..base };
    assert_eq!(derive_qindex(&cfg(0), 100, 0, 255, &logo, &c).delta, 5);

    let edge = SuperblockStats { stationary_edge: true, ..base };
    assert_eq!(derive_qindex(&cfg(0), 100, 0, 255, &edge, &c).delta, 0);

    // Stationary edges do not cancel a negative offset.
    let edge = SuperblockStats { stationary_edge: true, ..stats(100) };
    assert_eq!(derive_qindex(&cfg(0), 100, 0, 255, &edge, &c).delta, -8);

    let mut anti = cfg(1);
    anti.anti_contouring = true;
    let smooth = SuperblockStats { variance: 10, ..base };
    assert_eq!(derive_qindex(&anti, 100, 0, 255, &smooth, &c).delta, -6);
    let textured = SuperblockStats { variance: 1000, ..base };
    assert_eq!(derive_qindex(&anti, 100, 0, 255, &textured, &c).delta, 16);
  }

  #[test]
  fn clamps_round_toward_the_base() {
    let c = complexity();
    // 164 clamps to 105, then the delta rounds down to a multiple of 8.
    let d = derive_qindex(&cfg(3), 100, 0, 105, &stats(500), &c);
    assert_eq!(d, QpDecision { qindex: 100, delta: 0 });
    let d = derive_qindex(&cfg(2), 100, 0, 105, &stats(500), &c);
    assert_eq!(d, QpDecision { qindex: 104, delta: 4 });

    let mut ceiling = cfg(0);
    ceiling.rc_ceiling = Some(104);
    let d = derive_qindex(&ceiling, 100, 0, 255, &stats(500), &c);
    assert_eq!(d, QpDecision { qindex: 104, delta: 4 });
  }

  #[test]
  fn derived_qindex_stays_within_bounds() {
    let mut ra = ChaChaRng::from_seed([3; 32]);
    let c = complexity();
    for _ in 0..2000 {
      let min_q = ra.gen_range(0u8..=200);
      let max_q = ra.gen_range(min_q..=255);
      let mut dq = cfg(ra.gen_range(0..=3));
      dq.anti_contouring = ra.gen();
      dq.rc_ceiling = if ra.gen() { Some(ra.gen()) } else { None };
      let s = SuperblockStats {
        distortion: ra.gen_range(0..10_000),
        logo: ra.gen(),
        background: ra.gen(),
        grass: ra.gen(),
        stationary_edge: ra.gen(),
        variance: ra.gen_range(0..512),
        ..stats(0)
      };
      let base = ra.gen();
      let d = derive_qindex(&dq, base, min_q, max_q, &s, &c);
      assert!(min_q <= d.qindex && d.qindex <= max_q, "{:?}", d);
      if let Some(ceiling) = dq.rc_ceiling {
        assert!(d.qindex <= ceiling.max(min_q));
      }
      assert_eq!(d.delta % (1 << dq.resolution_log2), 0);
    }
  }

  #[test]
  fn modulation_strategies() {
    let c = complexity();
    let sb_stats = stats(500);
    let block_stats = stats(100);

    let mut config = EncoderConfig::default();
    config.delta_q = cfg(2);

    config.delta_q.modulation = QpModulation::Off;
    let off = DeltaQ::new(&config, c.clone());
    let sb = off.superblock_qp(Some(&sb_stats));
    assert_eq!(sb, QpDecision { qindex: 100, delta: 0 });
    assert_eq!(off.block_qp(sb, Some(&block_stats)), sb);

    config.delta_q.modulation = QpModulation::Superblock;
    let per_sb = DeltaQ::new(&config, c.clone());
    let sb = per_sb.superblock_qp(Some(&sb_stats));
    assert_eq!(sb.qindex, 132);
    assert_eq!(per_sb.block_qp(sb, Some(&block_stats)), sb);

    config.delta_q.modulation = QpModulation::Block;
    let per_block = DeltaQ::new(&config, c);
    let sb = per_block.superblock_qp(Some(&sb_stats));
    assert_eq!(per_block.block_qp(sb, Some(&block_stats)).qindex, 68);
    assert_eq!(per_block.block_qp(sb, None), sb);
  }
}
