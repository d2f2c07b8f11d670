// Copyright (c) 2017-2023, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Coordinates and the per-picture neighbor store consulted while coding
//! blocks.

use crate::frame::*;
use crate::partition::*;
use crate::util::*;

pub const MAX_PLANES: usize = 3;

mod superblock_unit;
pub use superblock_unit::*;

mod block_unit;
pub use block_unit::*;

mod neighbor;
pub use neighbor::*;
