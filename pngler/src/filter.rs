// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

//! Scanline filters: reconstruction of raw samples on decode and the
//! minimum-entropy re-filtering pass on encode.

use num_enum::TryFromPrimitive;

use crate::header::ColorMode;
use crate::image::Image;
use crate::{PngError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum FilterTag {
  None = 0,
  Sub = 1,
  Up = 2,
  Average = 3,
  Paeth = 4,
}

pub const FILTER_TAGS: [FilterTag; 5] = [FilterTag::None, FilterTag::Sub, FilterTag::Up, FilterTag::Average, FilterTag::Paeth];

/// Neighborhood of one byte: the byte itself (x), the byte one pixel back
/// (a), the byte above (b) and the byte above one pixel back (c). Missing
/// neighbors read as zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct Neighbors {
  pub x: u8,
  pub a: u8,
  pub b: u8,
  pub c: u8,
}

/// Predicts from whichever neighbor is closest to a + b - c, ties resolved
/// in the fixed order a, b, c.
fn paeth_predictor(n: Neighbors) -> u8 {
  let p = n.a as i32 + n.b as i32 - n.c as i32;
  let pa = (p - n.a as i32).abs();
  let pb = (p - n.b as i32).abs();
  let pc = (p - n.c as i32).abs();
  if pa <= pb && pa <= pc {
    n.a
  } else if pb <= pc {
    n.b
  } else {
    n.c
  }
}

pub fn recon(tag: FilterTag, n: Neighbors) -> u8 {
  match tag {
    FilterTag::None => n.x,
    FilterTag::Sub => n.x.wrapping_add(n.a),
    FilterTag::Up => n.x.wrapping_add(n.b),
    FilterTag::Average => n.x.wrapping_add(((n.a as u32 + n.b as u32) / 2) as u8),
    FilterTag::Paeth => n.x.wrapping_add(paeth_predictor(n)),
  }
}

pub fn filt(tag: FilterTag, n: Neighbors) -> u8 {
  match tag {
    FilterTag::None => n.x,
    FilterTag::Sub => n.x.wrapping_sub(n.a),
    FilterTag::Up => n.x.wrapping_sub(n.b),
    FilterTag::Average => n.x.wrapping_sub(((n.a as u32 + n.b as u32) / 2) as u8),
    FilterTag::Paeth => n.x.wrapping_sub(paeth_predictor(n)),
  }
}

/// Reconstructs raw samples in place, top-down, so that the a/b/c neighbors
/// of every byte are already reconstructed when it is reached. Resets each
/// row's tag to None and rejects unknown tag bytes.
pub fn reconstruct(image: &mut Image) -> Result<()> {
  let stride = image.stride();
  let bpp = image.header.bytes_per_pixel();
  let row_len = 1 + stride;
  for y in 0..image.height() {
    let (done, rest) = image.data.split_at_mut(y * row_len);
    let row = &mut rest[..row_len];
    let tag = FilterTag::try_from(row[0]).map_err(|_| PngError::Malformed(format!("invalid filter type {}", row[0])))?;
    let prev = (y > 0).then(|| &done[(y - 1) * row_len + 1..]);
    for i in 0..stride {
      let n = Neighbors {
        x: row[1 + i],
        a: if i >= bpp { row[1 + i - bpp] } else { 0 },
        b: prev.map_or(0, |p| p[i]),
        c: if i >= bpp { prev.map_or(0, |p| p[i - bpp]) } else { 0 },
      };
      row[1 + i] = recon(tag, n);
    }
    row[0] = FilterTag::None as u8;
  }
  Ok(())
}

/// Recomputes each row's filter, keeping the tag whose filtered bytes have
/// the smallest sum of absolute values read as signed bytes; ties keep the
/// lowest-numbered tag. Rows are visited last-to-first so the a/b/c
/// neighbors still read the raw previous row. Indexed and sub-byte rows are
/// left unfiltered as filtering only helps byte-aligned color samples.
pub fn refilter(image: &mut Image) {
  if image.header.color == ColorMode::Indexed || image.header.depth < 8 {
    return;
  }
  let stride = image.stride();
  let bpp = image.header.bytes_per_pixel();
  let row_len = 1 + stride;
  let mut candidates = vec![vec![0u8; stride]; FILTER_TAGS.len()];
  for y in (0..image.height()).rev() {
    let (done, rest) = image.data.split_at_mut(y * row_len);
    let row = &mut rest[..row_len];
    let prev = (y > 0).then(|| &done[(y - 1) * row_len + 1..]);
    let mut scores = [0u64; 5];
    let mut best = FilterTag::None;
    for (t, &tag) in FILTER_TAGS.iter().enumerate() {
      for i in 0..stride {
        let n = Neighbors {
          x: row[1 + i],
          a: if i >= bpp { row[1 + i - bpp] } else { 0 },
          b: prev.map_or(0, |p| p[i]),
          c: if i >= bpp { prev.map_or(0, |p| p[i - bpp]) } else { 0 },
        };
        let filtered = filt(tag, n);
        candidates[t][i] = filtered;
        scores[t] += (filtered as i8).unsigned_abs() as u64;
      }
      if scores[t] < scores[best as usize] {
        best = tag;
      }
    }
    row[0] = best as u8;
    row[1..].copy_from_slice(&candidates[best as usize]);
  }
}
