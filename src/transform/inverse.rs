// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Normative inverse transforms.
//!
//! The decoder reproduces these bit for bit, so every intermediate rounding
//! and clamp here is part of the bitstream contract.

use super::*;

use std::cmp;

/// cos(i * pi / 128) in Q12
pub(super) static COSPI_INV: [i32; 64] = [
  4096, 4095, 4091, 4085, 4076, 4065, 4052, 4036, 4017, 3996, 3973, 3948,
  3920, 3889, 3857, 3822, 3784, 3745, 3703, 3659, 3612, 3564, 3513, 3461,
  3406, 3349, 3290, 3229, 3166, 3102, 3035, 2967, 2896, 2824, 2751, 2675,
  2598, 2520, 2440, 2359, 2276, 2191, 2106, 2019, 1931, 1842, 1751, 1660,
  1567, 1474, 1380, 1285, 1189, 1092, 995, 897, 799, 700, 601, 501, 401, 301,
  201, 101,
];

pub(super) static SINPI_INV: [i32; 5] = [0, 1321, 2482, 3344, 3803];

const INV_COS_BIT: usize = 12;

#[inline(always)]
fn btf(
  w0: usize, in0: i32, w1: usize, in1: i32, neg0: bool, neg1: bool,
) -> i32 {
  let c0 = if neg0 { -COSPI_INV[w0] } else { COSPI_INV[w0] };
  let c1 = if neg1 { -COSPI_INV[w1] } else { COSPI_INV[w1] };
  half_btf(c0, in0, c1, in1, INV_COS_BIT)
}

/// Rotation of `(a, b)` by angle `ang`: (cos a - sin b, sin a + cos b).
#[inline(always)]
fn rotate(ang: usize, a: i32, b: i32) -> (i32, i32) {
  (
    btf(64 - ang, a, ang, b, false, true),
    btf(ang, a, 64 - ang, b, false, false),
  )
}

fn idct4(input: &[i32], output: &mut [i32], range: usize) {
  let s0 = btf(32, input[0], 32, input[2], false, false);
  let s1 = btf(32, input[0], 32, input[2], false, true);
  let s2 = btf(48, input[1], 16, input[3], false, true);
  let s3 = btf(16, input[1], 48, input[3], false, false);

  output[0] = clamp_value(s0 + s3, range);
  output[1] = clamp_value(s1 + s2, range);
  output[2] = clamp_value(s1 - s2, range);
  output[3] = clamp_value(s0 - s3, range);
}

/// (input a, input b, angle) for the first stage of the odd half.
const ODD_ROTATIONS_8: [(usize, usize, usize); 2] = [(1, 7, 8), (5, 3, 40)];
const ODD_ROTATIONS_16: [(usize, usize, usize); 4] =
  [(1, 15, 4), (9, 7, 36), (5, 11, 20), (13, 3, 52)];
const ODD_ROTATIONS_32: [(usize, usize, usize); 8] = [
  (1, 31, 2),
  (17, 15, 34),
  (9, 23, 18),
  (25, 7, 50),
  (5, 27, 10),
  (21, 11, 42),
  (13, 19, 26),
  (29, 3, 58),
];

/// Rotates the odd-indexed inputs into mirrored positions, then folds each
/// group of four with one sum and one difference butterfly.
fn odd_input_stage(
  input: &[i32], rotations: &[(usize, usize, usize)], out: &mut [i32],
  range: usize,
) {
  let h = rotations.len() * 2;
  for (k, &(a, b, ang)) in rotations.iter().enumerate() {
    let (lo, hi) = rotate(ang, input[a], input[b]);
    out[k] = lo;
    out[h - 1 - k] = hi;
  }
  for g in out[..h].chunks_exact_mut(4) {
    let [a, b, c, d] = [g[0], g[1], g[2], g[3]];
    g[0] = clamp_value(a + b, range);
    g[1] = clamp_value(a - b, range);
    g[2] = clamp_value(d - c, range);
    g[3] = clamp_value(c + d, range);
  }
}

/// Butterflies over groups of four, alternating the outer and inner
/// sign patterns between neighboring groups.
fn quad_stage(v: &mut [i32], range: usize) {
  for (i, g) in v.chunks_exact_mut(4).enumerate() {
    let [a, b, c, d] = [g[0], g[1], g[2], g[3]];
    if i % 2 == 0 {
      g[0] = clamp_value(a + d, range);
      g[1] = clamp_value(b + c, range);
      g[2] = clamp_value(b - c, range);
      g[3] = clamp_value(a - d, range);
    } else {
      g[0] = clamp_value(d - a, range);
      g[1] = clamp_value(c - b, range);
      g[2] = clamp_value(b + c, range);
      g[3] = clamp_value(a + d, range);
    }
  }
}

/// Final pi/4 rotation of the middle of an odd half of length `2 * m`.
fn middle_rotation(v: &mut [i32], m: usize) {
  let n = 2 * m;
  let q = m / 2;
  for i in 0..q {
    let (a, b) = (v[q + i], v[n - q - 1 - i]);
    v[q + i] = btf(32, a, 32, b, true, false);
    v[n - q - 1 - i] = btf(32, a, 32, b, false, false);
  }
}

fn idct_odd8(input: &[i32], out: &mut [i32], range: usize) {
  odd_input_stage(input, &ODD_ROTATIONS_8, out, range);
  let (t1, t2) = (out[1], out[2]);
  out[1] = btf(32, t1, 32, t2, true, false);
  out[2] = btf(32, t1, 32, t2, false, false);
}

fn idct_odd16(input: &[i32], out: &mut [i32], range: usize) {
  let mut t = [0i32; 8];
  odd_input_stage(input, &ODD_ROTATIONS_16, &mut t, range);

  out[..8].copy_from_slice(&t);
  out[1] = btf(16, t[1], 48, t[6], true, false);
  out[2] = btf(48, t[2], 16, t[5], true, true);
  out[5] = btf(16, t[2], 48, t[5], true, false);
  out[6] = btf(48, t[1], 16, t[6], false, false);

  quad_stage(&mut out[..8], range);
  middle_rotation(&mut out[..8], 4);
}

fn idct_odd32(input: &[i32], out: &mut [i32], range: usize) {
  let mut t = [0i32; 16];
  odd_input_stage(input, &ODD_ROTATIONS_32, &mut t, range);

  let mut s = t;
  s[1] = btf(8, t[1], 56, t[14], true, false);
  s[2] = btf(56, t[2], 8, t[13], true, true);
  s[5] = btf(40, t[5], 24, t[10], true, false);
  s[6] = btf(24, t[6], 40, t[9], true, true);
  s[9] = btf(40, t[6], 24, t[9], true, false);
  s[10] = btf(24, t[5], 40, t[10], false, false);
  s[13] = btf(8, t[2], 56, t[13], true, false);
  s[14] = btf(56, t[1], 8, t[14], false, false);
  quad_stage(&mut s, range);

  let mut w = s;
  w[2] = btf(16, s[2], 48, s[13], true, false);
  w[3] = btf(16, s[3], 48, s[12], true, false);
  w[4] = btf(48, s[4], 16, s[11], true, true);
  w[5] = btf(48, s[5], 16, s[10], true, true);
  w[10] = btf(16, s[5], 48, s[10], true, false);
  w[11] = btf(16, s[4], 48, s[11], true, false);
  w[12] = btf(48, s[3], 16, s[12], false, false);
  w[13] = btf(48, s[2], 16, s[13], false, false);

  for i in 0..4 {
    out[i] = clamp_value(w[i] + w[7 - i], range);
    out[7 - i] = clamp_value(w[i] - w[7 - i], range);
    out[8 + i] = clamp_value(w[15 - i] - w[8 + i], range);
    out[15 - i] = clamp_value(w[8 + i] + w[15 - i], range);
  }
  middle_rotation(&mut out[..16], 8);
}

/// Inverse DCT of any supported length, built from the half-length DCT of
/// the even inputs and a dedicated odd half.
fn idct(input: &[i32], output: &mut [i32], range: usize) {
  let n = input.len();
  if n == 4 {
    return idct4(input, output, range);
  }
  let h = n / 2;

  let mut even_in = [0i32; MAX_TX_SIZE / 2];
  for (e, &x) in even_in.iter_mut().zip(input.iter().step_by(2)) {
    *e = x;
  }
  let mut even = [0i32; MAX_TX_SIZE / 2];
  idct(&even_in[..h], &mut even[..h], range);

  let mut odd = [0i32; MAX_TX_SIZE / 2];
  match n {
    8 => idct_odd8(input, &mut odd, range),
    16 => idct_odd16(input, &mut odd, range),
    _ => idct_odd32(input, &mut odd, range),
  }

  for i in 0..h {
    let o = odd[h - 1 - i];
    output[i] = clamp_value(even[i] + o, range);
    output[n - 1 - i] = clamp_value(even[i] - o, range);
  }
}

fn iadst4(input: &[i32], output: &mut [i32], _range: usize) {
  let [x0, x1, x2, x3] = [input[0], input[1], input[2], input[3]];

  let s0 = SINPI_INV[1] * x0 + SINPI_INV[4] * x2 + SINPI_INV[2] * x3;
  let s1 = SINPI_INV[2] * x0 - SINPI_INV[1] * x2 - SINPI_INV[4] * x3;
  let s2 = SINPI_INV[3] * x1;
  let s3 = SINPI_INV[3] * ((x0 - x2) + x3);

  output[0] = round_shift(s0 + s2, INV_COS_BIT);
  output[1] = round_shift(s1 + s2, INV_COS_BIT);
  output[2] = round_shift(s3, INV_COS_BIT);
  output[3] = round_shift(s0 + s1 - s2, INV_COS_BIT);
}

/// Output gather of the 8- and 16-point ADST; odd positions are negated.
const IADST8_OUT: [usize; 8] = [0, 4, 6, 2, 3, 7, 5, 1];
const IADST16_OUT: [usize; 16] =
  [0, 8, 12, 4, 6, 14, 10, 2, 3, 11, 15, 7, 5, 13, 9, 1];

/// Inverse ADST for 8 and 16 points.
fn iadst(input: &[i32], output: &mut [i32], range: usize) {
  let n = input.len();
  let mut t = [0i32; 16];

  // Interleave from both ends and rotate each pair.
  for i in 0..n / 2 {
    let a = 32 / n + i * (128 / n);
    let (x0, x1) = (input[n - 1 - 2 * i], input[2 * i]);
    t[2 * i] = btf(a, x0, 64 - a, x1, false, false);
    t[2 * i + 1] = btf(64 - a, x0, a, x1, false, true);
  }

  let mut b = n;
  while b >= 4 {
    let h = b / 2;
    let npairs = b / 4;
    for block in t[..n].chunks_exact_mut(b) {
      for i in 0..h {
        let (p, q) = (block[i], block[i + h]);
        block[i] = clamp_value(p + q, range);
        block[i + h] = clamp_value(p - q, range);
      }
      for j in 0..npairs {
        let p = h + 2 * j;
        let (x0, x1) = (block[p], block[p + 1]);
        let (a, first) = if b == 4 {
          (32, true)
        } else {
          (128 / b + (j % (npairs / 2)) * (512 / b), j < npairs / 2)
        };
        if first {
          block[p] = btf(a, x0, 64 - a, x1, false, false);
          block[p + 1] = btf(64 - a, x0, a, x1, false, true);
        } else {
          block[p] = btf(64 - a, x0, a, x1, true, false);
          block[p + 1] = btf(a, x0, 64 - a, x1, false, false);
        }
      }
    }
    b = h;
  }

  let order: &[usize] = if n == 8 { &IADST8_OUT } else { &IADST16_OUT };
  for (k, (o, &src)) in output.iter_mut().zip(order).enumerate() {
    *o = if k % 2 == 1 { -t[src] } else { t[src] };
  }
}

fn iidentity(input: &[i32], output: &mut [i32], _range: usize) {
  let n = input.len();
  for (o, &i) in output.iter_mut().zip(input) {
    *o = match n {
      4 => round_shift(SQRT2 * i, SQRT2_BITS),
      8 => 2 * i,
      16 => round_shift(2 * SQRT2 * i, SQRT2_BITS),
      _ => 4 * i,
    };
  }
}

fn inv_txfm1d(kind: TxType1D, input: &[i32], output: &mut [i32], range: usize) {
  match kind {
    TxType1D::DCT => idct(input, output, range),
    TxType1D::ADST | TxType1D::FLIPADST if input.len() == 4 => {
      iadst4(input, output, range)
    }
    TxType1D::ADST | TxType1D::FLIPADST => iadst(input, output, range),
    TxType1D::IDTX => iidentity(input, output, range),
  }
}

/// Rounding shift between the row and column passes.
const fn intermediate_shift(tx_size: TxSize) -> usize {
  match tx_size {
    TX_4X4 | TX_4X8 | TX_8X4 => 0,
    TX_16X16 | TX_32X32 | TX_8X32 | TX_32X8 => 2,
    _ => 1,
  }
}

pub(super) fn inv_txfm2d_add<T: Pixel>(
  input: &[i32], output: &mut PlaneRegionMut<'_, T>, tx_size: TxSize,
  tx_type: TxType, bd: usize,
) {
  let w = tx_size.width();
  let h = tx_size.height();
  let (ud_flip, lr_flip) = tx_type.flips();
  let rect = get_rect_tx_log_ratio(w, h).abs() == 1;

  let mut tmp: Aligned<[i32; MAX_TX_SQUARE]> = Aligned::zeroed();
  let buffer = &mut tmp.data[..w * h];
  let mut temp_in = [0i32; MAX_TX_SIZE];
  let mut temp_out = [0i32; MAX_TX_SIZE];

  // Rows
  let row_range = bd + 8;
  for (input_row, buffer_row) in
    input[..w * h].chunks_exact(w).zip(buffer.chunks_exact_mut(w))
  {
    for (raw, clamped) in input_row.iter().zip(temp_in.iter_mut()) {
      let val =
        if rect { round_shift(*raw * INV_SQRT2, SQRT2_BITS) } else { *raw };
      *clamped = clamp_value(val, row_range);
    }
    inv_txfm1d(tx_type.htx(), &temp_in[..w], buffer_row, row_range);
    if lr_flip {
      buffer_row.reverse();
    }
  }

  // Columns
  let col_range = cmp::max(bd + 6, 16);
  let shift = intermediate_shift(tx_size);
  let max = pixel_max(bd);
  for c in 0..w {
    for (r, v) in temp_in[..h].iter_mut().enumerate() {
      *v = clamp_value(round_shift(buffer[r * w + c], shift), col_range);
    }
    inv_txfm1d(tx_type.vtx(), &temp_in[..h], &mut temp_out[..h], col_range);
    if ud_flip {
      temp_out[..h].reverse();
    }
    for (r, &v) in temp_out[..h].iter().enumerate() {
      let px = &mut output[r][c];
      let v = i32::cast_from(*px) + round_shift(v, 4);
      *px = T::cast_from(clamp(v, 0, max));
    }
  }
}
