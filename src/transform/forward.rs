// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Forward transforms.
//!
//! The forward side is not normative, so each 1D kernel is evaluated as a
//! direct product with its Q12 basis. The bases are the transposes of the
//! inverse kernels and the stage shifts match the ones the decoder undoes,
//! so the round trip through `inverse_transform_add` has unit gain.

use super::inverse::{COSPI_INV, SINPI_INV};
use super::*;

const FWD_COS_BIT: usize = 12;

/// cos(angle * pi / 128) in Q12, for any integer angle.
#[inline]
fn cos_q12(angle: isize) -> i32 {
  let mut i = angle.rem_euclid(256) as usize;
  if i > 128 {
    i = 256 - i;
  }
  match i {
    0..=63 => COSPI_INV[i],
    64 => 0,
    _ => -COSPI_INV[128 - i],
  }
}

/// The 4-point ADST basis, sin(m * pi / 9) scaled like `SINPI_INV`.
#[inline]
fn sin_pi_9(m: usize) -> i32 {
  let mut m = m % 18;
  let mut sign = 1;
  if m >= 9 {
    m -= 9;
    sign = -1;
  }
  if m > 4 {
    m = 9 - m;
  }
  sign * SINPI_INV[m]
}

/// Basis value of output frequency `k` at input position `n`.
#[inline]
fn basis(kind: TxType1D, size: usize, k: usize, n: usize) -> i32 {
  match kind {
    TxType1D::DCT => {
      if k == 0 {
        COSPI_INV[32]
      } else {
        cos_q12(((2 * n + 1) * k * (64 / size)) as isize)
      }
    }
    TxType1D::ADST | TxType1D::FLIPADST => {
      if size == 4 {
        sin_pi_9((2 * k + 1) * (n + 1))
      } else {
        cos_q12(64 - ((2 * n + 1) * (2 * k + 1) * (32 / size)) as isize)
      }
    }
    TxType1D::IDTX => unreachable!(),
  }
}

fn fwd_identity(input: &[i32], output: &mut [i32]) {
  let n = input.len();
  for (o, &i) in output.iter_mut().zip(input) {
    *o = match n {
      4 => round_shift(i * SQRT2, SQRT2_BITS),
      8 => i * 2,
      16 => round_shift(i * 2 * SQRT2, SQRT2_BITS),
      _ => i * 4,
    };
  }
}

fn fwd_txfm1d(kind: TxType1D, input: &[i32], output: &mut [i32]) {
  if kind == TxType1D::IDTX {
    return fwd_identity(input, output);
  }
  let n = input.len();
  for (k, out) in output[..n].iter_mut().enumerate() {
    let acc: i64 = input
      .iter()
      .enumerate()
      .map(|(j, &x)| i64::from(x) * i64::from(basis(kind, n, k, j)))
      .sum();
    *out = ((acc + (1 << (FWD_COS_BIT - 1))) >> FWD_COS_BIT) as i32;
  }
}

/// Down-shift applied after the column pass.
const fn col_shift(tx_size: TxSize) -> usize {
  match tx_size {
    TX_4X4 => 0,
    TX_8X8 | TX_4X8 | TX_8X4 | TX_4X16 | TX_16X4 => 1,
    TX_16X32 | TX_32X16 | TX_32X32 => 4,
    TX_16X16 | TX_8X16 | TX_16X8 | TX_8X32 | TX_32X8 => 2,
  }
}

pub(super) fn fwd_txfm2d(
  input: &[i16], output: &mut [i32], stride: usize, tx_size: TxSize,
  tx_type: TxType,
) {
  let w = tx_size.width();
  let h = tx_size.height();
  let (ud_flip, lr_flip) = tx_type.flips();
  let shift = col_shift(tx_size);

  let mut tmp: Aligned<[i32; MAX_TX_SQUARE]> = Aligned::zeroed();
  let buf = &mut tmp.data[..w * h];
  let mut col_in = [0i32; MAX_TX_SIZE];
  let mut col_out = [0i32; MAX_TX_SIZE];

  // Columns
  for c in 0..w {
    for (r, v) in col_in[..h].iter_mut().enumerate() {
      let src_r = if ud_flip { h - 1 - r } else { r };
      *v = i32::from(input[src_r * stride + c]) << 2;
    }
    fwd_txfm1d(tx_type.vtx(), &col_in[..h], &mut col_out[..h]);
    let dst_c = if lr_flip { w - 1 - c } else { c };
    for (r, &v) in col_out[..h].iter().enumerate() {
      buf[r * w + dst_c] = round_shift(v, shift);
    }
  }

  // Rows
  let rect = get_rect_tx_log_ratio(w, h).abs() == 1;
  for (row_in, row_out) in
    buf.chunks_exact(w).zip(output[..w * h].chunks_exact_mut(w))
  {
    fwd_txfm1d(tx_type.htx(), row_in, row_out);
    if rect {
      for v in row_out.iter_mut() {
        *v = round_shift(*v * SQRT2, SQRT2_BITS);
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn basis_is_symmetric() {
    // DCT rows alternate parity around the center.
    for &size in &[4usize, 8, 16, 32] {
      for k in 1..size {
        for n in 0..size / 2 {
          let a = basis(TxType1D::DCT, size, k, n);
          let b = basis(TxType1D::DCT, size, k, size - 1 - n);
          if k % 2 == 0 {
            assert_eq!(a, b);
          } else {
            assert_eq!(a, -b);
          }
        }
      }
    }
  }

  #[test]
  fn dc_gain_is_sqrt_half() {
    let input = [64i32; 8];
    let mut output = [0i32; 8];
    fwd_txfm1d(TxType1D::DCT, &input, &mut output);
    assert_eq!(output[0], round_shift(8 * 64 * COSPI_INV[32], 12));
    assert!(output[1..].iter().all(|&v| v == 0));
  }

  #[test]
  fn four_point_adst_matches_sinpi() {
    let mut input = [0i32; 4];
    input[0] = 1 << 12;
    let mut output = [0i32; 4];
    fwd_txfm1d(TxType1D::ADST, &input, &mut output);
    assert_eq!(
      output,
      [SINPI_INV[1], SINPI_INV[3], SINPI_INV[4], SINPI_INV[2]]
    );
  }
}
