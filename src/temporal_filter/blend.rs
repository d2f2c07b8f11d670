// Copyright (c) 2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::mc::MotionVector;
use crate::tiling::*;
use crate::util::*;

use super::search::BlockMotion;
use super::{TF_BLOCK_SIZE, TF_SUBBLOCKS, TF_SUBBLOCK_SIZE, TF_WEIGHT_SCALE};

/// Largest weight of the 3x3 path before the block weight.
pub const TF_MAX_MODIFIER: u32 = 16;
/// Largest block weight of the 3x3 path.
const TF_MAX_BLOCK_WEIGHT: u32 = 2;
/// Weight of the filtered frame itself in the 3x3 path.
pub const TF_CENTER_WEIGHT: u32 = TF_MAX_MODIFIER * TF_MAX_BLOCK_WEIGHT;

/// Sub-block squared errors, on the 8-bit scale, under which a predicted
/// sub-block gets the full and the half block weight.
const TF_BLOCK_ERROR_LOW: u64 = 10000;
const TF_BLOCK_ERROR_HIGH: u64 = 20000;

const TF_WINDOW_BLOCK_BALANCE_WEIGHT: f64 = 5.0;
const TF_Q_DECAY_THRESHOLD: f64 = 20.0;
const TF_STRENGTH_THRESHOLD: f64 = 4.0;
/// Fraction of the picture height at which motion starts to cost weight.
const TF_SEARCH_DISTANCE_THRESHOLD: f64 = 0.1;
const TF_MAX_SCALED_ERROR: f64 = 7.0;

/// Running weighted sums and weights of every sample of one filtered
/// block, per plane.
#[derive(Clone, Debug)]
pub struct Accumulator {
  accum: [Vec<u32>; 3],
  count: [Vec<u32>; 3],
}

impl Default for Accumulator {
  fn default() -> Self {
    let buf = || vec![0; TF_BLOCK_SIZE * TF_BLOCK_SIZE];
    Accumulator { accum: [buf(), buf(), buf()], count: [buf(), buf(), buf()] }
  }
}

impl Accumulator {
  pub fn reset(&mut self) {
    for buf in self.accum.iter_mut().chain(self.count.iter_mut()) {
      buf.fill(0);
    }
  }

  #[inline(always)]
  fn add(&mut self, p: usize, x: usize, y: usize, value: u32, weight: u32) {
    let i = y * TF_BLOCK_SIZE + x;
    self.accum[p][i] += weight * value;
    self.count[p][i] += weight;
  }
}

/// Adds the samples of the filtered frame itself with a uniform `weight`.
pub fn apply_center<T: Pixel>(
  acc: &mut Accumulator, p: usize, org: &PlaneRegion<'_, T>, w: usize,
  h: usize, weight: u32,
) {
  for (y, row) in org.rows_iter().take(h).enumerate() {
    for (x, &v) in row[..w].iter().enumerate() {
      acc.add(p, x, y, u32::cast_from(v), weight);
    }
  }
}

fn squared_diffs<T: Pixel>(
  org: &PlaneRegion<'_, T>, pred: &PlaneRegion<'_, T>, w: usize, h: usize,
) -> Vec<u32> {
  let mut diffs = Vec::with_capacity(w * h);
  for (org_row, pred_row) in org.rows_iter().zip(pred.rows_iter()).take(h) {
    diffs.extend(org_row[..w].iter().zip(&pred_row[..w]).map(|(&a, &b)| {
      let d = i32::cast_from(a) - i32::cast_from(b);
      (d * d) as u32
    }));
  }
  diffs
}

/// Sum of the squared differences in the window of `radius` around
/// (`x`, `y`), clipped to the block, and the number of samples summed.
#[inline]
fn window_sum(
  diffs: &[u32], w: usize, h: usize, x: usize, y: usize, radius: usize,
) -> (u64, u64) {
  let (x0, x1) = (x.saturating_sub(radius), (x + radius + 1).min(w));
  let (y0, y1) = (y.saturating_sub(radius), (y + radius + 1).min(h));
  let sum = (y0..y1)
    .flat_map(|j| &diffs[j * w + x0..j * w + x1])
    .map(|&d| u64::from(d))
    .sum();
  (sum, ((x1 - x0) * (y1 - y0)) as u64)
}

/// Weight of a predicted sample in the 3x3 path, from the sum `sum` of
/// `n` squared differences around it, on the 8-bit scale.
///
/// The result lies in `0..=TF_MAX_MODIFIER`; a larger `strength` lets
/// larger differences through.
#[inline]
pub fn scalar_weight(sum: u64, n: u64, strength: u8) -> u32 {
  let rounding = (1u64 << strength) >> 1;
  let modifier = ((sum * 3 / n + rounding) >> strength) as u32;
  TF_MAX_MODIFIER - modifier.min(TF_MAX_MODIFIER)
}

/// Weight of a whole predicted sub-block in the 3x3 path.
#[inline]
fn block_weight(error: u64, bit_depth: usize) -> u32 {
  match error >> (2 * (bit_depth - 8)) {
    e if e < TF_BLOCK_ERROR_LOW => TF_MAX_BLOCK_WEIGHT,
    e if e < TF_BLOCK_ERROR_HIGH => 1,
    _ => 0,
  }
}

/// Blends a motion compensated prediction with the 3x3 window weights.
///
/// `xdec` and `ydec` map plane samples back onto the luma sub-blocks of
/// `motion`.
pub fn apply_scalar<T: Pixel>(
  acc: &mut Accumulator, p: usize, org: &PlaneRegion<'_, T>,
  pred: &PlaneRegion<'_, T>, w: usize, h: usize, (xdec, ydec): (usize, usize),
  motion: &BlockMotion, strength: u8, bit_depth: usize,
) {
  let shift = 2 * (bit_depth - 8);
  let diffs = squared_diffs(org, pred, w, h);
  let block_weights = motion.errors.map(|e| block_weight(e, bit_depth));

  for (y, row) in pred.rows_iter().take(h).enumerate() {
    for (x, &v) in row[..w].iter().enumerate() {
      let (sum, n) = window_sum(&diffs, w, h, x, y, 1);
      let modifier = scalar_weight(sum >> shift, n, strength);
      let k = BlockMotion::subblock(x << xdec, y << ydec);
      acc.add(p, x, y, u32::cast_from(v), modifier * block_weights[k]);
    }
  }
}

/// Decay terms of the plane-wise weights, fixed for one plane of one
/// picture.
#[derive(Clone, Copy, Debug)]
pub struct PlanewiseDecay {
  inv_factor: f64,
  distance_threshold: f64,
}

impl PlanewiseDecay {
  /// Noisier planes, higher quantizers and stronger filters decay slower.
  pub fn new(
    noise_level: f64, q_factor: i32, strength: u8, height: usize,
  ) -> Self {
    let n_decay = 0.5 + (2.0 * noise_level.max(0.0) + 5.0).ln();
    let q_decay =
      (f64::from(q_factor) / TF_Q_DECAY_THRESHOLD).powi(2).clamp(1e-5, 1.0);
    let s_decay =
      (f64::from(strength) / TF_STRENGTH_THRESHOLD).powi(2).clamp(1e-5, 1.0);
    PlanewiseDecay {
      inv_factor: 1.0
        / ((TF_WINDOW_BLOCK_BALANCE_WEIGHT + 1.0)
          * n_decay
          * n_decay
          * q_decay
          * s_decay),
      distance_threshold: (height as f64 * TF_SEARCH_DISTANCE_THRESHOLD)
        .max(1.0),
    }
  }

  /// Factor of at least 1 growing with the length of `mv`.
  #[inline]
  pub fn distance_factor(&self, mv: MotionVector) -> f64 {
    let distance = f64::from(mv.length_sqr()).sqrt() / 8.0;
    (distance / self.distance_threshold).max(1.0)
  }

  /// Weight of a predicted sample from the mean squared differences of
  /// its window and of its sub-block, on the 8-bit scale.
  ///
  /// The result lies in `0..=TF_WEIGHT_SCALE`.
  #[inline]
  pub fn weight(
    &self, window_error: f64, block_error: f64, distance_factor: f64,
  ) -> u32 {
    let combined =
      TF_WINDOW_BLOCK_BALANCE_WEIGHT * window_error + block_error;
    let scaled =
      (combined * distance_factor * self.inv_factor).min(TF_MAX_SCALED_ERROR);
    ((-scaled).exp() * f64::from(TF_WEIGHT_SCALE)) as u32
  }
}

/// Blends a motion compensated prediction with the 5x5 window weights.
pub fn apply_planewise<T: Pixel>(
  acc: &mut Accumulator, p: usize, org: &PlaneRegion<'_, T>,
  pred: &PlaneRegion<'_, T>, w: usize, h: usize, (xdec, ydec): (usize, usize),
  motion: &BlockMotion, decay: &PlanewiseDecay, bit_depth: usize,
) {
  let norm = f64::from(1u32 << (2 * (bit_depth - 8)));
  let diffs = squared_diffs(org, pred, w, h);
  let subblock_area = (TF_SUBBLOCK_SIZE * TF_SUBBLOCK_SIZE) as f64;
  let mut block_errors = [0f64; TF_SUBBLOCKS];
  let mut distance_factors = [0f64; TF_SUBBLOCKS];
  for k in 0..TF_SUBBLOCKS {
    block_errors[k] = motion.errors[k] as f64 / subblock_area / norm;
    distance_factors[k] = decay.distance_factor(motion.mvs[k]);
  }

  for (y, row) in pred.rows_iter().take(h).enumerate() {
    for (x, &v) in row[..w].iter().enumerate() {
      let (sum, n) = window_sum(&diffs, w, h, x, y, 2);
      let window_error = sum as f64 / n as f64 / norm;
      let k = BlockMotion::subblock(x << xdec, y << ydec);
      let weight =
        decay.weight(window_error, block_errors[k], distance_factors[k]);
      acc.add(p, x, y, u32::cast_from(v), weight);
    }
  }
}

/// Writes the rounded weighted averages of the `w`x`h` samples of plane
/// `p` into `dst` and returns their squared error against `org`.
pub fn normalize<T: Pixel>(
  acc: &Accumulator, p: usize, dst: &mut PlaneRegionMut<'_, T>,
  org: &PlaneRegion<'_, T>, w: usize, h: usize,
) -> u64 {
  let mut sse = 0u64;
  for y in 0..h {
    let accum = &acc.accum[p][y * TF_BLOCK_SIZE..][..w];
    let count = &acc.count[p][y * TF_BLOCK_SIZE..][..w];
    for (x, (&a, &c)) in accum.iter().zip(count).enumerate() {
      let o = u32::cast_from(org[y][x]);
      let v = if c == 0 { o } else { (a + c / 2) / c };
      dst[y][x] = T::cast_from(v);
      let d = i64::from(v) - i64::from(o);
      sse += (d * d) as u64;
    }
  }
  sse
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::*;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn random_plane(seed: u8, bit_depth: usize) -> Plane<u16> {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    let mut plane = Plane::new(TF_BLOCK_SIZE, TF_BLOCK_SIZE, 0, 0, 0, 0);
    fill_plane(&mut plane, TF_BLOCK_SIZE, TF_BLOCK_SIZE, |_, _| {
      ra.gen_range(0..1u16 << bit_depth)
    });
    plane
  }

  #[test]
  fn scalar_weights_are_bounded() {
    let mut ra = ChaChaRng::from_seed([1; 32]);
    for _ in 0..1000 {
      let n = ra.gen_range(4..=9);
      let sum = ra.gen_range(0..n * 255 * 255);
      let strength = ra.gen_range(0..=6);
      assert!(scalar_weight(sum, n, strength) <= TF_MAX_MODIFIER);
    }
    assert_eq!(scalar_weight(0, 9, 0), TF_MAX_MODIFIER);
    assert_eq!(scalar_weight(9 * 255 * 255, 9, 6), 0);
    // Stronger filters keep more of the same difference.
    assert!(scalar_weight(9 * 16, 9, 6) > scalar_weight(9 * 16, 9, 2));
  }

  #[test]
  fn planewise_weights_are_bounded() {
    let mut ra = ChaChaRng::from_seed([2; 32]);
    for _ in 0..1000 {
      let decay = PlanewiseDecay::new(
        ra.gen_range(-1.0..20.0),
        ra.gen_range(0..400),
        ra.gen_range(0..=6),
        ra.gen_range(1..2160),
      );
      let weight = decay.weight(
        ra.gen_range(0.0..65025.0),
        ra.gen_range(0.0..65025.0),
        decay.distance_factor(MotionVector {
          row: ra.gen_range(-512..512),
          col: ra.gen_range(-512..512),
        }),
      );
      assert!(weight <= TF_WEIGHT_SCALE);
    }

    let decay = PlanewiseDecay::new(2.0, 40, 5, 1080);
    assert_eq!(decay.weight(0.0, 0.0, 1.0), TF_WEIGHT_SCALE);
    assert!(decay.weight(10.0, 10.0, 1.0) < decay.weight(1.0, 1.0, 1.0));
    // Far motion costs weight, short motion does not.
    let near = decay.distance_factor(MotionVector { row: 8, col: 8 });
    let far = decay.distance_factor(MotionVector { row: 1600, col: 0 });
    assert_eq!(near, 1.0);
    assert!(far > 1.0);
  }

  #[test]
  fn average_stays_within_contributions() {
    let org = random_plane(3, 10);
    let preds = [random_plane(4, 10), random_plane(5, 10)];
    let motion = BlockMotion::default();
    let decay = PlanewiseDecay::new(8.0, 100, 6, 64);
    let n = TF_BLOCK_SIZE;

    let mut acc = Accumulator::default();
    apply_center(&mut acc, 0, &org.as_region(), n, n, TF_WEIGHT_SCALE);
    for pred in &preds {
      apply_planewise(
        &mut acc,
        0,
        &org.as_region(),
        &pred.as_region(),
        n,
        n,
        (0, 0),
        &motion,
        &decay,
        10,
      );
    }

    let mut dst = Plane::new(n, n, 0, 0, 0, 0);
    normalize(&acc, 0, &mut dst.as_region_mut(), &org.as_region(), n, n);
    for y in 0..n {
      for x in 0..n {
        let samples =
          [org.p(x, y), preds[0].p(x, y), preds[1].p(x, y)];
        let min = samples.iter().copied().min().unwrap();
        let max = samples.iter().copied().max().unwrap();
        assert!((min..=max).contains(&dst.p(x, y)));
      }
    }
  }

  #[test]
  fn identical_predictions_change_nothing() {
    let org = random_plane(6, 8);
    let n = TF_BLOCK_SIZE;
    let mut acc = Accumulator::default();
    apply_center(&mut acc, 1, &org.as_region(), n, n, TF_CENTER_WEIGHT);
    for strength in [0, 3, 6] {
      apply_scalar(
        &mut acc,
        1,
        &org.as_region(),
        &org.as_region(),
        n,
        n,
        (0, 0),
        &BlockMotion::default(),
        strength,
        8,
      );
    }
    let mut dst = Plane::new(n, n, 0, 0, 0, 0);
    let sse =
      normalize(&acc, 1, &mut dst.as_region_mut(), &org.as_region(), n, n);
    assert_eq!(sse, 0);
    assert_eq!(dst.data, org.data);

    // A reset leaves no trace of earlier blocks.
    acc.reset();
    let other = random_plane(7, 8);
    apply_center(&mut acc, 1, &other.as_region(), n, n, 1);
    normalize(&acc, 1, &mut dst.as_region_mut(), &other.as_region(), n, n);
    assert_eq!(dst.data, other.data);
  }
}
