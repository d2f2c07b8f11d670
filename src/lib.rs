// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! The encode-side reconstruction core of an AV1 encoder.
//!
//! Given a picture and the mode decisions made for it upstream, the coding
//! loop predicts, transforms, quantizes and reconstructs every block in
//! the order a decoder will, so that the reconstruction matches the
//! decoder's bit for bit and can serve as a reference. An optional
//! temporal pre-filter denoises source pictures before they are coded.
//!
//! # Basic usage
//!
//! ```
//! use av1_recon::prelude::*;
//!
//! let config = EncoderConfig::default();
//! let mut source = Picture::<u8>::new(64, 64, config.chroma_sampling, 8);
//! for p in 0..3 {
//!   source.fill_plane_with(p, |x, y| (x + y) as u8);
//! }
//! source.pad();
//!
//! let fi =
//!   FrameInvariants::new(&config, &source, PictureComplexity::default())?;
//! let mut fs = FrameState::new(&fi);
//! let cu = CodingUnit::intra(PredictionMode::DC_PRED, PredictionMode::H_PRED);
//! let modes =
//!   SuperblockModes::uniform(&fi.table, BlockSize::BLOCK_16X16, &cu);
//! let sbs = encode_picture(&fi, &mut fs, &[modes], &mut NoopObserver)?;
//! assert_eq!(sbs[0].units.len(), 16);
//! # Ok::<(), EncoderError>(())
//! ```

#![deny(bare_trait_objects)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::unreadable_literal)]
#![warn(clippy::expl_impl_clone_on_copy)]
#![warn(clippy::linkedlist)]
#![warn(clippy::map_flatten)]
#![warn(clippy::mem_forget)]
#![warn(clippy::mut_mut)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_continue)]
#![warn(clippy::path_buf_push_overwrite)]
#![warn(clippy::range_plus_one)]

pub mod cfl;
pub mod context;
pub mod deltaq;
pub mod encoder;
pub mod frame;
pub mod geometry;
pub mod mc;
pub mod me;
pub mod partition;
pub mod predict;
pub mod quantize;
pub mod scan_order;
pub mod temporal_filter;
pub mod tiling;
pub mod transform;
pub mod util;

mod api;

pub use crate::api::*;

/// Commonly used types and functions
pub mod prelude {
  pub use crate::api::*;
  pub use crate::cfl::CFLParams;
  pub use crate::context::{SuperBlockOffset, SuperblockSize};
  pub use crate::deltaq::{PictureComplexity, SuperblockStats};
  pub use crate::encoder::*;
  pub use crate::frame::{Picture, Plane};
  pub use crate::mc::{FilterMode, MotionVector};
  pub use crate::partition::{BlockSize, PartitionType, RefType};
  pub use crate::predict::PredictionMode;
  pub use crate::temporal_filter::{temporal_filter, FilteredPicture};
  pub use crate::transform::{TxSize, TxType};
  pub use crate::util::{ChromaSampling, Pixel};
}
