// Copyright (c) 2020-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use itertools::*;

use crate::mc::FilterMode;
use crate::util::ChromaSampling;

use std::fmt;

/// Largest delta quantizer resolution, log2 (a step of 8 quantizer indices).
pub const MAX_DELTA_Q_RES_LOG2: u8 = 3;
/// Largest number of frames blended by the temporal filter.
pub const MAX_TEMPORAL_FRAMES: usize = 7;
/// Largest temporal filter strength.
pub const MAX_TEMPORAL_STRENGTH: u8 = 6;

/// Encoder settings consumed by the reconstruction core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
  /// Bit depth.
  pub bit_depth: usize,
  /// Chroma subsampling.
  pub chroma_sampling: ChromaSampling,
  /// Superblock width in luma samples, 64 or 128.
  pub sb_size: usize,
  /// The base quantizer index of the picture.
  pub base_q_idx: u8,
  /// The minimum quantizer index any block may use.
  pub min_q_idx: u8,
  /// The maximum quantizer index any block may use.
  pub max_q_idx: u8,
  /// Adaptive quantization settings.
  pub delta_q: DeltaQConfig,
  /// Whether the loop filter runs on the reconstruction; it only changes
  /// which per-block statistics are kept for it.
  pub enable_loop_filter: bool,
  /// Interpolation filter for inter prediction.
  pub interp_filter: FilterMode,
  /// Temporal pre-filter settings.
  pub temporal: TemporalFilterConfig,
}

impl Default for EncoderConfig {
  fn default() -> Self {
    EncoderConfig {
      bit_depth: 8,
      chroma_sampling: ChromaSampling::Cs420,
      sb_size: 64,
      base_q_idx: 100,
      min_q_idx: 0,
      max_q_idx: 255,
      delta_q: DeltaQConfig::default(),
      enable_loop_filter: true,
      interp_filter: FilterMode::REGULAR,
      temporal: TemporalFilterConfig::default(),
    }
  }
}

impl fmt::Display for EncoderConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let pairs = [
      ("bit_depth", self.bit_depth.to_string()),
      ("chroma_sampling", format!("{:?}", self.chroma_sampling)),
      ("sb_size", self.sb_size.to_string()),
      ("base_q_idx", self.base_q_idx.to_string()),
      ("min_q_idx", self.min_q_idx.to_string()),
      ("max_q_idx", self.max_q_idx.to_string()),
      ("qp_modulation", format!("{:?}", self.delta_q.modulation)),
      ("delta_q_res_log2", self.delta_q.resolution_log2.to_string()),
      ("anti_contouring", self.delta_q.anti_contouring.to_string()),
      ("loop_filter", self.enable_loop_filter.to_string()),
      ("interp_filter", format!("{:?}", self.interp_filter)),
      (
        "temporal_window",
        format!("{}+{}", self.temporal.past, self.temporal.future),
      ),
      ("temporal_strength", self.temporal.strength.to_string()),
      ("temporal_planewise", self.temporal.planewise.to_string()),
    ];
    write!(
      f,
      "{}",
      pairs.iter().map(|pair| format!("{}={}", pair.0, pair.1)).join(" ")
    )
  }
}

/// Granularity at which the quantizer is modulated inside a picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QpModulation {
  /// Every block uses the picture quantizer.
  #[default]
  Off,
  /// One quantizer per superblock, inherited by its blocks.
  Superblock,
  /// Blocks carrying their own statistics get their own quantizer.
  Block,
}

/// Adaptive quantization settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeltaQConfig {
  /// Modulation granularity.
  pub modulation: QpModulation,
  /// Delta quantizer resolution, log2: offsets are multiples of
  /// `1 << resolution_log2` quantizer indices.
  pub resolution_log2: u8,
  /// Force lower quantizers on smooth areas to avoid banding.
  pub anti_contouring: bool,
  /// Additional upper bound on the quantizer set by rate control.
  pub rc_ceiling: Option<u8>,
}

impl Default for DeltaQConfig {
  fn default() -> Self {
    DeltaQConfig {
      modulation: QpModulation::Off,
      resolution_log2: 2,
      anti_contouring: false,
      rc_ceiling: None,
    }
  }
}

/// Temporal pre-filter settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemporalFilterConfig {
  /// Frames before the filtered frame.
  pub past: usize,
  /// Frames after the filtered frame.
  pub future: usize,
  /// Filter strength, lowered at low quantizers and for clean sources.
  pub strength: u8,
  /// Use the plane-wise 5x5 weighting instead of the 3x3 one.
  pub planewise: bool,
  /// Segments across the picture, each filtered independently.
  pub segment_cols: usize,
  /// Segments down the picture.
  pub segment_rows: usize,
}

impl Default for TemporalFilterConfig {
  fn default() -> Self {
    TemporalFilterConfig {
      past: 0,
      future: 0,
      strength: 5,
      planewise: true,
      segment_cols: 1,
      segment_rows: 1,
    }
  }
}

impl TemporalFilterConfig {
  /// Number of frames in the window, the filtered one included.
  #[inline]
  pub const fn frames(&self) -> usize {
    self.past + self.future + 1
  }

  /// Whether any other frame contributes.
  #[inline]
  pub const fn enabled(&self) -> bool {
    self.past + self.future > 0
  }

  /// Strength limited to the supported maximum.
  #[inline]
  pub fn clamped_strength(&self) -> u8 {
    self.strength.min(MAX_TEMPORAL_STRENGTH)
  }
}
