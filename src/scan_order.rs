// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Coefficient scan orders.
//!
//! Positions index the row-major coefficient layout produced by
//! `forward_transform` (vertical frequency by horizontal frequency, stride
//! equal to the transform width).

use crate::transform::{TxSize, TxType, TxType1D, MAX_TX_SQUARE};

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanKind {
  Diagonal,
  Row,
  Col,
}

const fn build_scan<const N: usize>(
  w: usize, h: usize, kind: ScanKind,
) -> [u16; N] {
  let mut scan = [0u16; N];
  let mut i = 0;
  match kind {
    ScanKind::Row => {
      while i < N {
        scan[i] = i as u16;
        i += 1;
      }
    }
    ScanKind::Col => {
      let mut c = 0;
      while c < w {
        let mut r = 0;
        while r < h {
          scan[i] = (r * w + c) as u16;
          i += 1;
          r += 1;
        }
        c += 1;
      }
    }
    ScanKind::Diagonal => {
      let mut d = 0;
      while d < w + h - 1 {
        let r_lo = if d >= w { d - (w - 1) } else { 0 };
        let r_hi = if d < h { d } else { h - 1 };
        // Square blocks alternate direction on every anti-diagonal, tall
        // blocks always walk down and wide blocks always walk up.
        let downward = if w == h { d % 2 == 1 } else { w < h };
        let mut k = 0;
        while k <= r_hi - r_lo {
          let r = if downward { r_lo + k } else { r_hi - k };
          scan[i] = (r * w + (d - r)) as u16;
          i += 1;
          k += 1;
        }
        d += 1;
      }
    }
  }
  scan
}

macro_rules! scan_tables {
  ($($name:ident: ($w:expr, $h:expr)),* $(,)?) => {
    paste::paste! {
      $(
        static [<DEFAULT_SCAN_ $name>]: [u16; $w * $h] =
          build_scan($w, $h, ScanKind::Diagonal);
        static [<ROW_SCAN_ $name>]: [u16; $w * $h] =
          build_scan($w, $h, ScanKind::Row);
        static [<COL_SCAN_ $name>]: [u16; $w * $h] =
          build_scan($w, $h, ScanKind::Col);
      )*

      /// [tx_size][default, row, col]
      static SCANS: [[&[u16]; 3]; TxSize::TX_SIZES_ALL] = [
        $([&[<DEFAULT_SCAN_ $name>], &[<ROW_SCAN_ $name>], &[<COL_SCAN_ $name>]],)*
      ];
    }
  };
}

// Same order as the `TxSize` discriminants.
scan_tables! {
  TX_4X4: (4, 4),
  TX_8X8: (8, 8),
  TX_16X16: (16, 16),
  TX_32X32: (32, 32),
  TX_4X8: (4, 8),
  TX_8X4: (8, 4),
  TX_8X16: (8, 16),
  TX_16X8: (16, 8),
  TX_16X32: (16, 32),
  TX_32X16: (32, 16),
  TX_4X16: (4, 16),
  TX_16X4: (16, 4),
  TX_8X32: (8, 32),
  TX_32X8: (32, 8),
}

/// Scan order for the coefficients of `tx_size` under `tx_type`.
///
/// One-dimensional types scan along the axis that carries the transform:
/// a vertical-only transform is read row by row and a horizontal-only
/// transform column by column. Everything else uses the diagonal scan.
pub fn scan(tx_size: TxSize, tx_type: TxType) -> &'static [u16] {
  let kind = match (tx_type.vtx(), tx_type.htx()) {
    (TxType1D::IDTX, TxType1D::IDTX) => 0,
    (_, TxType1D::IDTX) => 1,
    (TxType1D::IDTX, _) => 2,
    _ => 0,
  };
  let s = SCANS[tx_size as usize][kind];
  debug_assert!(s.len() <= MAX_TX_SQUARE);
  s
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::transform::TxSize::*;
  use crate::transform::TxType::*;

  #[test]
  fn diagonal_scans_start_like_av1() {
    assert_eq!(&scan(TX_4X4, DCT_DCT)[..8], &[0, 1, 4, 8, 5, 2, 3, 6]);
    assert_eq!(&scan(TX_4X8, DCT_DCT)[..6], &[0, 1, 4, 2, 5, 8]);
    assert_eq!(&scan(TX_8X4, DCT_DCT)[..6], &[0, 8, 1, 16, 9, 2]);
  }

  #[test]
  fn one_dimensional_types_scan_along_the_transform() {
    assert_eq!(&scan(TX_8X8, V_DCT)[..3], &[0, 1, 2]);
    assert_eq!(&scan(TX_8X8, H_DCT)[..3], &[0, 8, 16]);
    assert_eq!(scan(TX_8X8, IDTX), scan(TX_8X8, DCT_DCT));
  }

  #[test]
  fn scans_are_permutations() {
    for &tx_size in &[
      TX_4X4, TX_8X8, TX_16X16, TX_32X32, TX_4X8, TX_8X4, TX_8X16, TX_16X8,
      TX_16X32, TX_32X16, TX_4X16, TX_16X4, TX_8X32, TX_32X8,
    ] {
      for table in SCANS[tx_size as usize].iter() {
        assert_eq!(table.len(), tx_size.area());
        let mut seen = vec![false; tx_size.area()];
        for &pos in table.iter() {
          assert!(!seen[pos as usize]);
          seen[pos as usize] = true;
        }
        assert_eq!(table[0], 0);
      }
    }
  }
}
