// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use thiserror::*;

use crate::api::InvalidConfig;
use crate::predict::PredictionMode;
use crate::transform::{TxSize, TxType};

/// Fatal errors of the coding loop.
///
/// They point at an inconsistent mode decision handed to the coding loop
/// and are never retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum EncoderError {
  /// A prediction mode that cannot be used where it was given: an intra
  /// mode with a reference frame, an inter mode without one, or chroma
  /// from luma on the luma plane.
  #[error("prediction mode {mode:?} is invalid on plane {plane}")]
  InvalidPredictionMode {
    /// The offending mode.
    mode: PredictionMode,
    /// The plane it was used on.
    plane: usize,
  },
  /// No partition was decided for a visited node of the block tree.
  #[error("no partition decided for block tree node {0}")]
  MissingPartition(usize),
  /// No coding unit was decided for a visited leaf of the block tree.
  #[error("no coding unit decided for block {0}")]
  MissingCodingUnit(usize),
  /// The transform type is not allowed at the transform size.
  #[error("transform type {tx_type:?} is not allowed for {tx_size:?}")]
  InvalidTxType {
    /// The offending transform type.
    tx_type: TxType,
    /// The transform size it was used with.
    tx_size: TxSize,
  },
  /// A coding unit refers to a reference picture that was not supplied.
  #[error("reference picture {0} was not supplied")]
  MissingReference(usize),
  /// The mode decisions do not cover the picture's superblocks.
  #[error("{given} superblock decisions for {expected} superblocks")]
  SuperblockCount {
    /// Number of decisions supplied.
    given: usize,
    /// Number of superblocks in the picture.
    expected: usize,
  },
  /// The configuration is invalid.
  #[error("invalid configuration: {0}")]
  Config(#[from] InvalidConfig),
}
