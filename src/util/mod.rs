// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

mod align;

pub use self::align::*;
pub use v_frame::pixel::*;

pub trait Fixed {
  fn floor_log2(&self, n: usize) -> usize;
  fn ceil_log2(&self, n: usize) -> usize;
  fn align_power_of_two(&self, n: usize) -> usize;
  fn align_power_of_two_and_shift(&self, n: usize) -> usize;
}

impl Fixed for usize {
  #[inline]
  fn floor_log2(&self, n: usize) -> usize {
    self & !((1 << n) - 1)
  }
  #[inline]
  fn ceil_log2(&self, n: usize) -> usize {
    (self + (1 << n) - 1).floor_log2(n)
  }
  #[inline]
  fn align_power_of_two(&self, n: usize) -> usize {
    self.ceil_log2(n)
  }
  #[inline]
  fn align_power_of_two_and_shift(&self, n: usize) -> usize {
    (self + (1 << n) - 1) >> n
  }
}

#[inline(always)]
pub fn clamp<T: PartialOrd>(input: T, min: T, max: T) -> T {
  if input < min {
    min
  } else if input > max {
    max
  } else {
    input
  }
}

/// Rounding right shift; a shift of zero is the identity.
#[inline(always)]
pub const fn round_shift(value: i32, bit: usize) -> i32 {
  if bit == 0 {
    value
  } else {
    (value + (1 << (bit - 1))) >> bit
  }
}

/// Rounding right shift that rounds half away from zero on both signs.
#[inline(always)]
pub const fn round_shift_signed(value: i32, bit: usize) -> i32 {
  if value < 0 {
    -round_shift(-value, bit)
  } else {
    round_shift(value, bit)
  }
}

/// Index of the most significant set bit, or -1 for zero.
#[inline(always)]
pub const fn msb(x: i32) -> i32 {
  if x <= 0 {
    -1
  } else {
    31 - x.leading_zeros() as i32
  }
}

/// Largest representable sample for the given bit depth.
#[inline(always)]
pub const fn pixel_max(bit_depth: usize) -> i32 {
  (1 << bit_depth) - 1
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn round_shift_rounds_half_up() {
    assert_eq!(round_shift(5, 1), 3);
    assert_eq!(round_shift(-5, 1), -2);
    assert_eq!(round_shift(7, 0), 7);
    assert_eq!(round_shift_signed(-5, 1), -3);
    assert_eq!(round_shift_signed(5, 1), 3);
  }

  #[test]
  fn msb_matches_ilog2() {
    assert_eq!(msb(0), -1);
    for x in 1..4096 {
      assert_eq!(msb(x), x.ilog2() as i32);
    }
  }

  #[test]
  fn alignment_helpers() {
    assert_eq!(13usize.align_power_of_two(3), 16);
    assert_eq!(16usize.align_power_of_two(3), 16);
    assert_eq!(13usize.align_power_of_two_and_shift(2), 4);
    assert_eq!(13usize.floor_log2(2), 12);
  }
}
