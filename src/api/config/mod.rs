// Copyright (c) 2020-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use thiserror::Error;

use crate::context::SuperblockSize;

mod encoder;
pub use encoder::*;

/// Enumeration of possible invalid configuration errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum InvalidConfig {
  /// The bit depth is unsupported.
  #[error("invalid bit depth {0} (expected 8 or 10)")]
  InvalidBitDepth(usize),
  /// The superblock size is unsupported.
  #[error("invalid superblock size {0} (expected 64 or 128)")]
  InvalidSuperblockSize(usize),
  /// The delta quantizer resolution is invalid.
  #[error("invalid delta q resolution log2 {actual} (expected <= {max})")]
  InvalidDeltaQResolution {
    /// The actual value.
    actual: u8,
    /// The maximal supported value.
    max: u8,
  },
  /// The quantizer bounds are inverted.
  #[error("invalid quantizer range {min}..={max} (expected min <= max)")]
  InvalidQuantizerRange {
    /// The minimal allowed quantizer index.
    min: u8,
    /// The maximal allowed quantizer index.
    max: u8,
  },
  /// The temporal filter window holds too many frames.
  #[error(
    "invalid temporal filter window of {actual} frames (expected <= {max})"
  )]
  TemporalWindowTooLarge {
    /// The actual value.
    actual: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// The temporal filter strength is invalid.
  #[error("invalid temporal filter strength {0} (expected > 0)")]
  InvalidTemporalFilterStrength(u8),
  /// The temporal filter segment grid is empty.
  #[error("invalid temporal filter segments {cols}x{rows} (expected > 0)")]
  InvalidTemporalSegments {
    /// Segment columns.
    cols: usize,
    /// Segment rows.
    rows: usize,
  },
}

impl EncoderConfig {
  /// Validates the configuration.
  ///
  /// Parameters with a soft limit are reported with a warning and clamped
  /// where they are consumed.
  ///
  /// # Errors
  ///
  /// - Returns `InvalidConfig` if the configuration cannot be encoded.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    use InvalidConfig::*;

    if self.bit_depth != 8 && self.bit_depth != 10 {
      return Err(InvalidBitDepth(self.bit_depth));
    }
    if SuperblockSize::from_width(self.sb_size).is_none() {
      return Err(InvalidSuperblockSize(self.sb_size));
    }
    if self.min_q_idx > self.max_q_idx {
      return Err(InvalidQuantizerRange {
        min: self.min_q_idx,
        max: self.max_q_idx,
      });
    }
    if self.delta_q.resolution_log2 > MAX_DELTA_Q_RES_LOG2 {
      return Err(InvalidDeltaQResolution {
        actual: self.delta_q.resolution_log2,
        max: MAX_DELTA_Q_RES_LOG2,
      });
    }

    let temporal = &self.temporal;
    if temporal.enabled() {
      if temporal.frames() > MAX_TEMPORAL_FRAMES {
        return Err(TemporalWindowTooLarge {
          actual: temporal.frames(),
          max: MAX_TEMPORAL_FRAMES,
        });
      }
      if temporal.strength == 0 {
        return Err(InvalidTemporalFilterStrength(temporal.strength));
      }
      if temporal.strength > MAX_TEMPORAL_STRENGTH {
        log::warn!(
          "temporal filter strength {} clamped to {}",
          temporal.strength,
          MAX_TEMPORAL_STRENGTH
        );
      }
      if temporal.segment_cols == 0 || temporal.segment_rows == 0 {
        return Err(InvalidTemporalSegments {
          cols: temporal.segment_cols,
          rows: temporal.segment_rows,
        });
      }
    }

    if !(self.min_q_idx..=self.max_q_idx).contains(&self.base_q_idx) {
      log::warn!(
        "base quantizer {} clamped to {}..={}",
        self.base_q_idx,
        self.min_q_idx,
        self.max_q_idx
      );
    }

    Ok(())
  }

  /// Superblock size of a validated configuration.
  pub fn superblock_size(&self) -> SuperblockSize {
    SuperblockSize::from_width(self.sb_size).unwrap_or_default()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use v_frame::pixel::ChromaSampling;

  #[test]
  fn default_config_is_valid() {
    let config = EncoderConfig::default();
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.superblock_size(), SuperblockSize::Sb64);
    assert_eq!(config.chroma_sampling, ChromaSampling::Cs420);
  }

  #[test]
  fn hard_limits_are_errors() {
    let config = EncoderConfig { bit_depth: 12, ..Default::default() };
    assert_eq!(config.validate(), Err(InvalidConfig::InvalidBitDepth(12)));

    let config = EncoderConfig { sb_size: 32, ..Default::default() };
    assert_eq!(
      config.validate(),
      Err(InvalidConfig::InvalidSuperblockSize(32))
    );

    let config =
      EncoderConfig { min_q_idx: 200, max_q_idx: 100, ..Default::default() };
    assert_eq!(
      config.validate(),
      Err(InvalidConfig::InvalidQuantizerRange { min: 200, max: 100 })
    );

    let mut config = EncoderConfig::default();
    config.delta_q.resolution_log2 = 4;
    assert_eq!(
      config.validate(),
      Err(InvalidConfig::InvalidDeltaQResolution { actual: 4, max: 3 })
    );
  }

  #[test]
  fn temporal_limits() {
    let mut config = EncoderConfig::default();
    config.temporal.past = 5;
    config.temporal.future = 5;
    assert_eq!(
      config.validate(),
      Err(InvalidConfig::TemporalWindowTooLarge { actual: 11, max: 7 })
    );

    config.temporal.past = 2;
    config.temporal.future = 2;
    config.temporal.strength = 0;
    assert_eq!(
      config.validate(),
      Err(InvalidConfig::InvalidTemporalFilterStrength(0))
    );

    // Above the maximum is only a warning.
    config.temporal.strength = 40;
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.temporal.clamped_strength(), MAX_TEMPORAL_STRENGTH);

    config.temporal.segment_rows = 0;
    assert_eq!(
      config.validate(),
      Err(InvalidConfig::InvalidTemporalSegments { cols: 1, rows: 0 })
    );

    // A disabled filter is not checked.
    config.temporal.past = 0;
    config.temporal.future = 0;
    assert_eq!(config.validate(), Ok(()));
  }

  #[test]
  fn display_lists_settings() {
    let config = EncoderConfig { base_q_idx: 60, ..Default::default() };
    let text = config.to_string();
    assert!(text.starts_with("bit_depth=8 chroma_sampling=Cs420 sb_size=64"));
    assert!(text.contains(" base_q_idx=60 "));
    assert!(text.ends_with("temporal_planewise=true"));
  }
}
