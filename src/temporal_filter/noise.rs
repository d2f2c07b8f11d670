// Copyright (c) 2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::f64::consts::PI;

use crate::api::MAX_TEMPORAL_STRENGTH;
use crate::frame::*;
use crate::quantize::ac_q;
use crate::util::*;

/// Gradient magnitude, on the 8-bit scale, above which a sample is taken
/// to sit on an edge.
const EDGE_THRESHOLD: i32 = 50;

/// Fewest smooth samples a noise estimate is made from.
const MIN_SMOOTH_SAMPLES: u64 = 16;

/// Estimates the standard deviation of the noise of a plane, on the 8-bit
/// scale, from the `w`x`h` visible area.
///
/// The estimator averages the response of a 3x3 Laplacian over the
/// samples whose Sobel gradient is small, so that texture and edges are
/// not mistaken for noise. Returns `None` when the plane is too small or
/// too busy to hold enough smooth samples.
pub fn estimate_noise<T: Pixel>(
  plane: &Plane<T>, w: usize, h: usize, bit_depth: usize,
) -> Option<f64> {
  if w < 3 || h < 3 {
    return None;
  }

  let shift = bit_depth - 8;
  let rounding = (1 << shift) >> 1;
  let region = plane.as_region();

  let mut accum = 0u64;
  let mut count = 0u64;
  for y in 1..h - 1 {
    let rows = [&region[y - 1][..w], &region[y][..w], &region[y + 1][..w]];
    for x in 1..w - 1 {
      let m = |r: usize, c: usize| i32::cast_from(rows[r][x + c - 1]);

      let gx = (m(0, 0) - m(0, 2)) + (m(2, 0) - m(2, 2))
        + 2 * (m(1, 0) - m(1, 2));
      let gy = (m(0, 0) - m(2, 0)) + (m(0, 2) - m(2, 2))
        + 2 * (m(0, 1) - m(2, 1));
      let ga = (gx.abs() + gy.abs() + rounding) >> shift;
      if ga >= EDGE_THRESHOLD {
        continue;
      }

      let v = 4 * m(1, 1) - 2 * (m(0, 1) + m(2, 1) + m(1, 0) + m(1, 2))
        + (m(0, 0) + m(0, 2) + m(2, 0) + m(2, 2));
      accum += ((v.abs() + rounding) >> shift) as u64;
      count += 1;
    }
  }

  if count < MIN_SMOOTH_SAMPLES {
    return None;
  }
  Some(accum as f64 / (6 * count) as f64 * (PI / 2.0).sqrt())
}

/// Quantizer on the scale of the 8-bit AC step divided by 4.
pub(crate) fn q_factor(qindex: u8, bit_depth: usize) -> i32 {
  i32::from(ac_q(qindex, bit_depth)) >> (bit_depth - 8 + 2)
}

/// Filter strength for a picture.
///
/// Clean sources and low quantizers get a weaker filter, noisy sources a
/// stronger one. High bit depth sources filtered plane-wise get one more
/// step to make up for the finer sample scale.
pub fn adjust_strength(
  strength: u8, qindex: u8, noise_level: Option<f64>, bit_depth: usize,
  planewise: bool,
) -> u8 {
  let mut strength = i32::from(strength);

  if let Some(noise) = noise_level {
    strength += match noise {
      n if n < 0.75 => -2,
      n if n < 1.75 => -1,
      n if n < 4.0 => 0,
      _ => 1,
    };
  }

  let q = q_factor(qindex, bit_depth);
  if q <= 16 {
    strength -= (16 - q) / 2;
  }

  if planewise && bit_depth > 8 {
    strength += 1;
  }

  strength.clamp(0, i32::from(MAX_TEMPORAL_STRENGTH)) as u8
}

#[cfg(test)]
mod test {
  use super::*;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn noisy_plane<T: Pixel>(
    w: usize, h: usize, amplitude: i32, bit_depth: usize,
  ) -> Plane<T> {
    let mut ra = ChaChaRng::from_seed([9; 32]);
    let mut plane = Plane::new(w, h, 0, 0, 0, 0);
    let mid = 1 << (bit_depth - 1);
    let scale = 1 << (bit_depth - 8);
    fill_plane(&mut plane, w, h, |_, _| {
      let n = if amplitude > 0 {
        ra.gen_range(-amplitude..=amplitude)
      } else {
        0
      };
      T::cast_from(mid + n * scale)
    });
    plane
  }

  #[test]
  fn flat_plane_has_no_noise() {
    let plane = noisy_plane::<u8>(64, 64, 0, 8);
    assert_eq!(estimate_noise(&plane, 64, 64, 8), Some(0.0));
  }

  #[test]
  fn noise_grows_with_amplitude() {
    let low = estimate_noise(&noisy_plane::<u8>(64, 64, 2, 8), 64, 64, 8);
    let high = estimate_noise(&noisy_plane::<u8>(64, 64, 6, 8), 64, 64, 8);
    assert!(low.unwrap() > 0.0);
    assert!(high.unwrap() > low.unwrap());
  }

  #[test]
  fn estimate_is_on_the_8_bit_scale() {
    let low = estimate_noise(&noisy_plane::<u8>(64, 64, 3, 8), 64, 64, 8);
    let high = estimate_noise(&noisy_plane::<u16>(64, 64, 3, 10), 64, 64, 10);
    assert!((low.unwrap() - high.unwrap()).abs() < 0.5);
  }

  #[test]
  fn edges_are_not_noise() {
    // A hard vertical edge every 8 samples leaves few smooth samples.
    let mut plane = Plane::new(64, 64, 0, 0, 0, 0);
    fill_plane(&mut plane, 64, 64, |x, _| if x % 8 < 4 { 0u8 } else { 255 });
    let noise = estimate_noise(&plane, 64, 64, 8);
    assert!(noise.map_or(true, |n| n == 0.0));
    assert_eq!(estimate_noise(&plane, 2, 64, 8), None);
  }

  #[test]
  fn strength_follows_noise_and_quantizer() {
    let high_q = 200;
    assert_eq!(adjust_strength(5, high_q, None, 8, false), 5);
    assert_eq!(adjust_strength(5, high_q, Some(0.5), 8, false), 3);
    assert_eq!(adjust_strength(5, high_q, Some(1.0), 8, false), 4);
    assert_eq!(adjust_strength(5, high_q, Some(2.0), 8, false), 5);
    assert_eq!(adjust_strength(5, high_q, Some(9.0), 8, false), 6);
    assert_eq!(adjust_strength(6, high_q, Some(9.0), 8, false), 6);

    // Near-lossless quantizers barely filter.
    assert_eq!(adjust_strength(5, 0, None, 8, false), 0);
    assert!(adjust_strength(5, 20, None, 8, false) < 5);

    assert_eq!(adjust_strength(4, high_q, None, 10, true), 5);
    assert_eq!(adjust_strength(4, high_q, None, 10, false), 4);
  }
}
