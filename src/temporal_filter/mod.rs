// Copyright (c) 2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Motion compensated temporal filtering of a source picture.
//!
//! Every 64x64 block of the filtered picture is predicted from the other
//! pictures of a window around it, and the predictions are averaged with
//! weights that fall off with their local error. The picture is cut into
//! segments filtered in parallel; each segment owns its working set and
//! only the output picture and the statistics are shared.

mod blend;
mod noise;
mod search;

pub use self::blend::*;
pub use self::noise::*;
pub use self::search::*;

use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

use arrayvec::ArrayVec;
use log::debug;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::api::{EncoderConfig, EncoderError, TemporalFilterConfig};
use crate::frame::*;
use crate::mc::FilterMode;
use crate::tiling::*;
use crate::util::*;

/// Side of the blocks filtered as a unit.
pub const TF_BLOCK_SIZE: usize = 64;
/// Side of the blocks carrying their own motion vector.
pub const TF_SUBBLOCK_SIZE: usize = 16;
/// Sub-blocks per filtered block.
pub const TF_SUBBLOCKS: usize =
  (TF_BLOCK_SIZE / TF_SUBBLOCK_SIZE) * (TF_BLOCK_SIZE / TF_SUBBLOCK_SIZE);
/// Weight of the filtered picture itself in the plane-wise path, and the
/// largest weight of any other picture.
pub const TF_WEIGHT_SCALE: u32 = 1000;

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A value computed by whichever caller comes first and handed to every
/// caller after it.
///
/// Callers arriving while the value is computed wait for it.
#[derive(Debug)]
pub struct RunOnce<T> {
  value: Mutex<Option<T>>,
}

impl<T> Default for RunOnce<T> {
  fn default() -> Self {
    RunOnce { value: Mutex::new(None) }
  }
}

impl<T: Clone> RunOnce<T> {
  pub const fn new() -> Self {
    RunOnce { value: Mutex::new(None) }
  }

  /// Returns the value, running `f` to compute it if no caller did yet.
  pub fn get_or_run<F: FnOnce() -> T>(&self, f: F) -> T {
    lock(&self.value).get_or_insert_with(f).clone()
  }

  /// Returns the value if it was computed.
  pub fn get(&self) -> Option<T> {
    lock(&self.value).clone()
  }
}

/// Counts finished segments and tells the last one it is last.
#[derive(Debug)]
pub(crate) struct CompletionCounter {
  done: Mutex<usize>,
  total: usize,
}

impl CompletionCounter {
  pub(crate) const fn new(total: usize) -> Self {
    CompletionCounter { done: Mutex::new(0), total }
  }

  /// Records a finished segment; true for exactly one caller, the one
  /// completing the count.
  pub(crate) fn finish(&self) -> bool {
    let mut done = lock(&self.done);
    *done += 1;
    *done == self.total
  }
}

/// Per picture decisions shared by all segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterStrength {
  /// Estimated noise of each plane, on the 8-bit scale.
  pub noise_levels: [Option<f64>; 3],
  /// Strength after adjustment to the noise and the quantizer.
  pub strength: u8,
}

/// A filtered picture.
#[derive(Clone, Debug)]
pub struct FilteredPicture<T: Pixel> {
  /// The filtered samples, padded.
  pub picture: Picture<T>,
  /// Squared error between the filtered and the source samples, per
  /// plane.
  pub sse: [u64; 3],
  /// Estimated noise of the luma plane, on the 8-bit scale.
  pub noise_level: Option<f64>,
  /// The strength the picture was filtered with.
  pub strength: u8,
}

struct FilterContext<'a, T: Pixel> {
  frames: &'a [&'a Picture<T>],
  center: usize,
  qindex: u8,
  tf: TemporalFilterConfig,
  filter: FilterMode,
  bit_depth: usize,
  /// Segment grid, in segments.
  segment_cols: usize,
  segment_rows: usize,
  /// Block grid, in filtered blocks.
  block_cols: usize,
  block_rows: usize,
  prep: RunOnce<FilterStrength>,
  completed: CompletionCounter,
  output: Mutex<Picture<T>>,
  sse: Mutex<[u64; 3]>,
}

impl<'a, T: Pixel> FilterContext<'a, T> {
  fn source(&self) -> &'a Picture<T> {
    self.frames[self.center]
  }

  fn prepare(&self) -> FilterStrength {
    let src = self.source();
    let num_planes = src.num_planes();
    let noise_levels: [Option<f64>; 3] = std::array::from_fn(|p| {
      (p < num_planes)
        .then(|| {
          let (w, h) = src.plane_dimensions(p);
          estimate_noise(&src.planes[p], w, h, self.bit_depth)
        })
        .flatten()
    });
    let strength = adjust_strength(
      self.tf.clamped_strength(),
      self.qindex,
      noise_levels[0],
      self.bit_depth,
      self.tf.planewise,
    );
    debug!(
      "temporal filter: noise {:?}, strength {} adjusted to {}",
      noise_levels, self.tf.strength, strength
    );
    FilterStrength { noise_levels, strength }
  }

  /// Filtered blocks of segment `s`, as column and row ranges.
  fn segment_blocks(&self, s: usize) -> (Range<usize>, Range<usize>) {
    let (sc, sr) = (s % self.segment_cols, s / self.segment_cols);
    let cols = sc * self.block_cols / self.segment_cols
      ..(sc + 1) * self.block_cols / self.segment_cols;
    let rows = sr * self.block_rows / self.segment_rows
      ..(sr + 1) * self.block_rows / self.segment_rows;
    (cols, rows)
  }

  fn filter_segment(&self, s: usize) {
    let params = self.prep.get_or_run(|| self.prepare());
    let src = self.source();
    let num_planes = src.num_planes();
    let decays: ArrayVec<PlanewiseDecay, 3> = (0..num_planes)
      .map(|p| {
        PlanewiseDecay::new(
          params.noise_levels[p].unwrap_or(0.0),
          q_factor(self.qindex, self.bit_depth),
          params.strength,
          src.height,
        )
      })
      .collect();
    let block_plane = |p: usize| {
      let PlaneConfig { xdec, ydec, .. } = src.planes[p].cfg;
      Plane::new(TF_BLOCK_SIZE >> xdec, TF_BLOCK_SIZE >> ydec, 0, 0, 0, 0)
    };
    let mut preds: ArrayVec<Plane<T>, 3> =
      (0..num_planes).map(block_plane).collect();
    let mut filtered = preds.clone();
    let mut acc = Accumulator::default();
    let mut sse = [0u64; 3];

    let (cols, rows) = self.segment_blocks(s);
    for by in rows {
      for bx in cols.clone() {
        let po = PlaneOffset {
          x: (bx * TF_BLOCK_SIZE) as isize,
          y: (by * TF_BLOCK_SIZE) as isize,
        };
        self.filter_block(po, &params, &decays, &mut acc, &mut preds);

        let mut visible = ArrayVec::<_, 3>::new();
        for p in 0..num_planes {
          let PlaneConfig { xdec, ydec, .. } = src.planes[p].cfg;
          let (pw, ph) = src.plane_dimensions(p);
          let (x, y) = ((po.x >> xdec) as usize, (po.y >> ydec) as usize);
          let w = (TF_BLOCK_SIZE >> xdec).min(pw.saturating_sub(x));
          let h = (TF_BLOCK_SIZE >> ydec).min(ph.saturating_sub(y));
          let area =
            Area::Rect { x: x as isize, y: y as isize, width: w, height: h };
          sse[p] += normalize(
            &acc,
            p,
            &mut filtered[p].as_region_mut(),
            &src.planes[p].region(area),
            w,
            h,
          );
          visible.push((area, w, h));
        }

        let mut output = lock(&self.output);
        for (p, &(area, w, h)) in visible.iter().enumerate() {
          output.planes[p]
            .region_mut(area)
            .copy_from(&filtered[p].as_region(), w, h);
        }
      }
    }

    {
      let mut total = lock(&self.sse);
      for (t, v) in total.iter_mut().zip(sse) {
        *t += v;
      }
    }
    if self.completed.finish() {
      lock(&self.output).pad();
    }
  }

  fn filter_block(
    &self, po: PlaneOffset, params: &FilterStrength,
    decays: &[PlanewiseDecay], acc: &mut Accumulator, preds: &mut [Plane<T>],
  ) {
    let src = self.source();
    let center_weight =
      if self.tf.planewise { TF_WEIGHT_SCALE } else { TF_CENTER_WEIGHT };

    acc.reset();
    for (i, frame) in self.frames.iter().enumerate() {
      let motion = if i == self.center {
        None
      } else {
        Some(search_block(
          &src.planes[0],
          &frame.planes[0],
          po,
          self.filter,
          self.bit_depth,
        ))
      };

      for (p, pred) in preds.iter_mut().enumerate() {
        let PlaneConfig { xdec, ydec, .. } = src.planes[p].cfg;
        let (w, h) = (TF_BLOCK_SIZE >> xdec, TF_BLOCK_SIZE >> ydec);
        let org = src.planes[p].region(Area::Rect {
          x: po.x >> xdec,
          y: po.y >> ydec,
          width: w,
          height: h,
        });

        let Some(motion) = &motion else {
          apply_center(acc, p, &org, w, h, center_weight);
          continue;
        };
        predict_block(pred, frame, p, po, motion, self.filter, self.bit_depth);
        if self.tf.planewise {
          apply_planewise(
            acc,
            p,
            &org,
            &pred.as_region(),
            w,
            h,
            (xdec, ydec),
            motion,
            &decays[p],
            self.bit_depth,
          );
        } else {
          apply_scalar(
            acc,
            p,
            &org,
            &pred.as_region(),
            w,
            h,
            (xdec, ydec),
            motion,
            params.strength,
            self.bit_depth,
          );
        }
      }
    }
  }
}

/// Filters the center picture of `frames` with the other pictures of the
/// window.
///
/// `frames` holds `config.temporal.past` pictures, the picture to filter
/// and `config.temporal.future` pictures, in display order, all padded.
/// `qindex` is the quantizer the filtered picture will be coded with.
///
/// # Errors
///
/// - Returns `EncoderError::Config` if the configuration is invalid.
///
/// # Panics
///
/// - If `frames` does not match the window of the configuration, or the
///   pictures differ in size or format.
pub fn temporal_filter<T: Pixel>(
  config: &EncoderConfig, frames: &[&Picture<T>], qindex: u8,
) -> Result<FilteredPicture<T>, EncoderError> {
  config.validate()?;
  let tf = config.temporal;
  assert_eq!(frames.len(), tf.frames());
  let src = frames[tf.past];
  for frame in frames {
    assert_eq!((frame.width, frame.height), (src.width, src.height));
    assert_eq!(frame.chroma_sampling, src.chroma_sampling);
  }

  if !tf.enabled() {
    return Ok(FilteredPicture {
      picture: src.clone(),
      sse: [0; 3],
      noise_level: None,
      strength: 0,
    });
  }

  let block_cols = src.width.align_power_of_two_and_shift(6);
  let block_rows = src.height.align_power_of_two_and_shift(6);
  let segment_cols = tf.segment_cols.min(block_cols);
  let segment_rows = tf.segment_rows.min(block_rows);
  let segments = segment_cols * segment_rows;
  let ctx = FilterContext {
    frames,
    center: tf.past,
    qindex,
    tf,
    filter: config.interp_filter,
    bit_depth: config.bit_depth,
    segment_cols,
    segment_rows,
    block_cols,
    block_rows,
    prep: RunOnce::new(),
    completed: CompletionCounter::new(segments),
    output: Mutex::new(src.clone()),
    sse: Mutex::new([0; 3]),
  };

  (0..segments).into_par_iter().for_each(|s| ctx.filter_segment(s));

  let params = ctx.prep.get_or_run(|| ctx.prepare());
  let sse = ctx.sse.into_inner().unwrap_or_else(PoisonError::into_inner);
  debug!(
    "temporal filter: {} frames in {} segments, sse {:?}",
    frames.len(),
    segments,
    sse
  );
  Ok(FilteredPicture {
    picture: ctx.output.into_inner().unwrap_or_else(PoisonError::into_inner),
    sse,
    noise_level: params.noise_levels[0],
    strength: params.strength,
  })
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn run_once_runs_once() {
    let once = RunOnce::new();
    let runs = AtomicUsize::new(0);
    assert_eq!(once.get(), None);

    let values: Vec<usize> = (0..64)
      .into_par_iter()
      .map(|i| {
        once.get_or_run(|| {
          runs.fetch_add(1, Ordering::SeqCst);
          i + 1000
        })
      })
      .collect();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let first = values[0];
    assert!(values.iter().all(|&v| v == first));
    assert_eq!(once.get(), Some(first));
  }

  #[test]
  fn exactly_one_segment_finishes_last() {
    let counter = CompletionCounter::new(48);
    let last = (0..48)
      .into_par_iter()
      .filter(|_| counter.finish())
      .count();
    assert_eq!(last, 1);
  }
}
