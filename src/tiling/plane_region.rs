// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::frame::*;
use crate::context::*;
use crate::util::*;

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

/// Rectangle of a plane region, in samples of that plane
///
/// `x` and `y` are picture-absolute: they are relative to the plane origin
/// (`xorigin`, `yorigin`), never to the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
  pub x: isize,
  pub y: isize,
  pub width: usize,
  pub height: usize,
}

impl Rect {
  #[inline(always)]
  pub const fn decimated(&self, xdec: usize, ydec: usize) -> Self {
    Self {
      x: self.x >> xdec,
      y: self.y >> ydec,
      width: self.width >> xdec,
      height: self.height >> ydec,
    }
  }

  #[inline(always)]
  pub const fn origin(&self) -> PlaneOffset {
    PlaneOffset { x: self.x, y: self.y }
  }
}

/// A subregion of a region, expressed relative to the parent region.
///
/// The block variants take a picture-absolute `BlockOffset` only when the
/// parent is the whole plane; otherwise the offset is interpreted relative
/// to the parent, like the pixel variants.
#[derive(Debug, Clone, Copy)]
pub enum Area {
  /// A well-defined rectangle
  Rect { x: isize, y: isize, width: usize, height: usize },
  /// A rectangle starting at offset (x, y) and ending at the bottom-right
  /// corner of the parent
  StartingAt { x: isize, y: isize },
  /// A well-defined rectangle with its offset expressed in 4x4 luma units
  BlockRect { bo: BlockOffset, width: usize, height: usize },
  /// A rectangle starting at the given block offset until the bottom-right
  /// corner of the parent
  BlockStartingAt { bo: BlockOffset },
}

impl Area {
  #[inline(always)]
  pub const fn to_rect(
    &self, xdec: usize, ydec: usize, parent_width: usize, parent_height: usize,
  ) -> Rect {
    match *self {
      Area::Rect { x, y, width, height } => Rect { x, y, width, height },
      Area::StartingAt { x, y } => Rect {
        x,
        y,
        width: (parent_width as isize - x) as usize,
        height: (parent_height as isize - y) as usize,
      },
      Area::BlockRect { bo, width, height } => Rect {
        x: (bo.x >> xdec << MI_SIZE_LOG2) as isize,
        y: (bo.y >> ydec << MI_SIZE_LOG2) as isize,
        width,
        height,
      },
      Area::BlockStartingAt { bo } => {
        let x = (bo.x >> xdec << MI_SIZE_LOG2) as isize;
        let y = (bo.y >> ydec << MI_SIZE_LOG2) as isize;
        Rect {
          x,
          y,
          width: (parent_width as isize - x) as usize,
          height: (parent_height as isize - y) as usize,
        }
      }
    }
  }
}

/// Bounded read-only view of a plane.
///
/// Indexing is local to the region: `region[0][0]` is the sample at
/// `rect().x`, `rect().y` of the plane. This is how block-relative buffers
/// (prediction, residual windows) are addressed.
#[derive(Debug)]
pub struct PlaneRegion<'a, T: Pixel> {
  data: *const T, // points to (rect.x, rect.y)
  pub plane_cfg: &'a PlaneConfig,
  rect: Rect,
  phantom: PhantomData<&'a T>,
}

/// Bounded mutable view of a plane.
#[derive(Debug)]
pub struct PlaneRegionMut<'a, T: Pixel> {
  data: *mut T, // points to (rect.x, rect.y)
  pub plane_cfg: &'a PlaneConfig,
  rect: Rect,
  phantom: PhantomData<&'a mut T>,
}

// shared by PlaneRegion and PlaneRegionMut
macro_rules! plane_region_common {
  ($name:ident, $as_ptr:ident $(,$opt_mut:tt)?) => {
    impl<'a, T: Pixel> $name<'a, T> {
      #[inline(always)]
      pub fn new(plane: &'a $($opt_mut)? Plane<T>, rect: Rect) -> Self {
        assert!(rect.x >= -(plane.cfg.xorigin as isize));
        assert!(rect.y >= -(plane.cfg.yorigin as isize));
        assert!(plane.cfg.xorigin as isize + rect.x + rect.width as isize <= plane.cfg.stride as isize);
        assert!(plane.cfg.yorigin as isize + rect.y + rect.height as isize <= plane.cfg.alloc_height as isize);
        let origin = (plane.cfg.yorigin as isize + rect.y) * plane.cfg.stride as isize
                    + plane.cfg.xorigin as isize + rect.x;
        Self {
          // SAFETY: the asserts above keep `origin` inside the allocation
          data: unsafe { plane.data.$as_ptr().offset(origin) },
          plane_cfg: &plane.cfg,
          rect,
          phantom: PhantomData,
        }
      }

      #[inline(always)]
      pub fn new_from_plane(plane: &'a $($opt_mut)? Plane<T>) -> Self {
        let rect = Rect {
          x: 0,
          y: 0,
          width: plane.cfg.stride - plane.cfg.xorigin,
          height: plane.cfg.alloc_height - plane.cfg.yorigin,
        };
        Self::new(plane, rect)
      }

      #[inline(always)]
      pub const fn rect(&self) -> &Rect {
        &self.rect
      }

      #[inline(always)]
      pub fn rows_iter(&self) -> RowsIter<'_, T> {
        RowsIter {
          data: self.data,
          stride: self.plane_cfg.stride,
          width: self.rect.width,
          remaining: self.rect.height,
          phantom: PhantomData,
        }
      }

      /// Read-only view of a subregion, described relative to this region.
      ///
      /// The subregion must be included in this region.
      #[inline(always)]
      pub fn subregion(&self, area: Area) -> PlaneRegion<'_, T> {
        let rect = area.to_rect(
          self.plane_cfg.xdec,
          self.plane_cfg.ydec,
          self.rect.width,
          self.rect.height,
        );
        assert!(rect.x >= 0 && rect.x as usize <= self.rect.width);
        assert!(rect.y >= 0 && rect.y as usize <= self.rect.height);
        // SAFETY: the subregion starts inside this region
        let data = unsafe {
          self.data.add(rect.y as usize * self.plane_cfg.stride + rect.x as usize)
        };
        let absolute_rect = Rect {
          x: self.rect.x + rect.x,
          y: self.rect.y + rect.y,
          width: rect.width,
          height: rect.height,
        };
        PlaneRegion {
          data,
          plane_cfg: self.plane_cfg,
          rect: absolute_rect,
          phantom: PhantomData,
        }
      }

      /// Converts a region-local position into a picture-absolute one.
      #[inline(always)]
      pub const fn to_frame_plane_offset(&self, local: PlaneOffset) -> PlaneOffset {
        PlaneOffset {
          x: self.rect.x + local.x,
          y: self.rect.y + local.y,
        }
      }

      /// Sum of squared differences against another region of the same size.
      pub fn sse(&self, other: &PlaneRegion<'_, T>, w: usize, h: usize) -> u64 {
        let mut sum = 0u64;
        for (a, b) in self.rows_iter().zip(other.rows_iter()).take(h) {
          for (&p, &q) in a[..w].iter().zip(&b[..w]) {
            let d = i32::cast_from(p) - i32::cast_from(q);
            sum += (d * d) as u64;
          }
        }
        sum
      }
    }

    unsafe impl<T: Pixel> Send for $name<'_, T> {}
    unsafe impl<T: Pixel> Sync for $name<'_, T> {}

    impl<T: Pixel> Index<usize> for $name<'_, T> {
      type Output = [T];

      #[inline(always)]
      fn index(&self, index: usize) -> &Self::Output {
        assert!(index < self.rect.height);
        // SAFETY: the row lies inside the region
        unsafe {
          let ptr = self.data.add(index * self.plane_cfg.stride);
          slice::from_raw_parts(ptr, self.rect.width)
        }
      }
    }
  }
}

plane_region_common!(PlaneRegion, as_ptr);
plane_region_common!(PlaneRegionMut, as_mut_ptr, mut);

impl<'a, T: Pixel> PlaneRegionMut<'a, T> {
  #[inline(always)]
  pub fn rows_iter_mut(&mut self) -> RowsIterMut<'_, T> {
    RowsIterMut {
      data: self.data,
      stride: self.plane_cfg.stride,
      width: self.rect.width,
      remaining: self.rect.height,
      phantom: PhantomData,
    }
  }

  #[inline(always)]
  pub fn as_const(&self) -> PlaneRegion<'_, T> {
    PlaneRegion {
      data: self.data,
      plane_cfg: self.plane_cfg,
      rect: self.rect,
      phantom: PhantomData,
    }
  }

  /// Copies a `w`x`h` window of `src` into the top-left of this region.
  pub fn copy_from(&mut self, src: &PlaneRegion<'_, T>, w: usize, h: usize) {
    for (dst, src) in self.rows_iter_mut().zip(src.rows_iter()).take(h) {
      dst[..w].copy_from_slice(&src[..w]);
    }
  }
}

impl<T: Pixel> IndexMut<usize> for PlaneRegionMut<'_, T> {
  #[inline(always)]
  fn index_mut(&mut self, index: usize) -> &mut Self::Output {
    assert!(index < self.rect.height);
    // SAFETY: the row lies inside the region
    unsafe {
      let ptr = self.data.add(index * self.plane_cfg.stride);
      slice::from_raw_parts_mut(ptr, self.rect.width)
    }
  }
}

/// Iterator over plane region rows
pub struct RowsIter<'a, T: Pixel> {
  data: *const T,
  stride: usize,
  width: usize,
  remaining: usize,
  phantom: PhantomData<&'a T>,
}

/// Mutable iterator over plane region rows
pub struct RowsIterMut<'a, T: Pixel> {
  data: *mut T,
  stride: usize,
  width: usize,
  remaining: usize,
  phantom: PhantomData<&'a mut T>,
}

impl<'a, T: Pixel> Iterator for RowsIter<'a, T> {
  type Item = &'a [T];

  #[inline(always)]
  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining > 0 {
      // SAFETY: `remaining` rows are left inside the region
      let row = unsafe {
        let ptr = self.data;
        self.data = self.data.add(self.stride);
        slice::from_raw_parts(ptr, self.width)
      };
      self.remaining -= 1;
      Some(row)
    } else {
      None
    }
  }

  #[inline(always)]
  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<'a, T: Pixel> Iterator for RowsIterMut<'a, T> {
  type Item = &'a mut [T];

  #[inline(always)]
  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining > 0 {
      // SAFETY: `remaining` rows are left inside the region
      let row = unsafe {
        let ptr = self.data;
        self.data = self.data.add(self.stride);
        slice::from_raw_parts_mut(ptr, self.width)
      };
      self.remaining -= 1;
      Some(row)
    } else {
      None
    }
  }

  #[inline(always)]
  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<T: Pixel> ExactSizeIterator for RowsIter<'_, T> {}
impl<T: Pixel> ExactSizeIterator for RowsIterMut<'_, T> {}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn subregion_is_block_local() {
    let mut plane: Plane<u8> = Plane::new(64, 64, 0, 0, 16, 16);
    for y in 0..64 {
      for x in 0..64 {
        let stride = plane.cfg.stride;
        let base = (plane.cfg.yorigin + y) * stride + plane.cfg.xorigin;
        plane.data[base + x] = (x + y) as u8;
      }
    }
    let region = plane.region(Area::BlockStartingAt {
      bo: BlockOffset { x: 2, y: 3 },
    });
    assert_eq!(region[0][0], 8 + 12);
    let po = region.to_frame_plane_offset(PlaneOffset { x: 1, y: 1 });
    assert_eq!((po.x, po.y), (9, 13));
    let sub = region.subregion(Area::StartingAt { x: 4, y: 4 });
    assert_eq!(sub[0][0], 8 + 4 + 12 + 4);
  }

  #[test]
  fn chroma_block_rect_is_decimated() {
    let plane: Plane<u16> = Plane::new(32, 32, 1, 1, 8, 8);
    let region = plane.region(Area::BlockRect {
      bo: BlockOffset { x: 3, y: 5 },
      width: 4,
      height: 4,
    });
    // odd 4x4 offsets collapse onto the shared chroma 4x4
    assert_eq!(region.rect().x, 4);
    assert_eq!(region.rect().y, 8);
  }
}
