// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::ops::{Deref, DerefMut};

#[repr(align(64))]
pub struct Align64;

// A 64 byte aligned piece of data, used for the per-transform scratch
// buffers (residual, coefficients, edges) that live on the stack.
// # Examples
// ```
// let mut x: Aligned<[i16; 32 * 32]> = Aligned::new([0; 32 * 32]);
// assert!(x.data.as_ptr() as usize % 64 == 0);
// ```
pub struct Aligned<T> {
  _alignment: [Align64; 0],
  pub data: T,
}

impl<T> Aligned<T> {
  pub const fn new(data: T) -> Self {
    Aligned { _alignment: [], data }
  }
}

impl<const N: usize, T: Copy + Default> Aligned<[T; N]> {
  #[inline(always)]
  pub fn zeroed() -> Self {
    Aligned::new([T::default(); N])
  }
}

impl<T> Deref for Aligned<T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.data
  }
}

impl<T> DerefMut for Aligned<T> {
  fn deref_mut(&mut self) -> &mut T {
    &mut self.data
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn is_aligned<T>(ptr: *const T, n: usize) -> bool {
    ((ptr as usize) & ((1 << n) - 1)) == 0
  }

  #[test]
  fn sanity_stack() {
    let a: Aligned<_> = Aligned::new([0u8; 3]);
    assert!(is_aligned(a.data.as_ptr(), 6));
  }

  #[test]
  fn zeroed_is_zero() {
    let a: Aligned<[i32; 16]> = Aligned::zeroed();
    assert!(a.iter().all(|&v| v == 0));
    assert!(is_aligned(a.as_ptr(), 6));
  }
}
