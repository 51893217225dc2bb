// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

//! Mutable image state: descriptor, palette tables and the flat scanline
//! buffer. Row views are derived from the current header on every access,
//! so transforms that change the geometry stay consistent by updating the
//! header and replacing the buffer.

use crate::header::Ihdr;
use crate::palette::Palette;
use crate::{PngError, Result};

#[derive(Clone, Debug)]
pub struct Image {
  pub header: Ihdr,
  pub palette: Palette,
  /// `height` rows of one filter tag byte plus `row_stride` sample bytes.
  pub data: Vec<u8>,
}

impl Image {
  /// Allocates the zeroed scanline buffer for `header`. Dimensions come
  /// straight from the file, so the size is computed checked and the
  /// allocation is allowed to fail cleanly.
  pub fn with_header(header: Ihdr) -> Result<Self> {
    let Some(len) = header.data_len().and_then(|len| usize::try_from(len).ok()) else {
      return Err(PngError::OutOfMemory(format!("data size overflow for {}", header)));
    };
    let mut data = Vec::new();
    if data.try_reserve_exact(len).is_err() {
      return Err(PngError::OutOfMemory(format!("allocation of {} bytes", len)));
    }
    data.resize(len, 0);
    Ok(Self {
      header,
      palette: Palette::default(),
      data,
    })
  }

  pub fn width(&self) -> usize {
    self.header.width as usize
  }

  pub fn height(&self) -> usize {
    self.header.height as usize
  }

  /// Sample bytes per row under the current geometry.
  pub fn stride(&self) -> usize {
    self.header.row_stride() as usize
  }

  /// Filter tag byte and sample bytes of one row.
  pub fn row(&self, y: usize) -> (u8, &[u8]) {
    let stride = self.stride();
    let offset = y * (1 + stride);
    (self.data[offset], &self.data[offset + 1..offset + 1 + stride])
  }

  pub fn row_mut(&mut self, y: usize) -> (&mut u8, &mut [u8]) {
    let stride = self.stride();
    let offset = y * (1 + stride);
    let (tag, samples) = self.data[offset..offset + 1 + stride].split_at_mut(1);
    (&mut tag[0], samples)
  }

  /// Byte view of one pixel; callers must hold a byte-aligned geometry
  /// (depth of at least 8).
  pub fn pixel(&self, y: usize, x: usize) -> &[u8] {
    let bpp = self.header.bytes_per_pixel();
    let (_, samples) = self.row(y);
    &samples[x * bpp..(x + 1) * bpp]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::header::{ColorMode, Interlace};

  fn header(width: u32, height: u32, depth: u8, color: ColorMode) -> Ihdr {
    Ihdr {
      width,
      height,
      depth,
      color,
      interlace: Interlace::Progressive,
    }
  }

  #[test]
  fn buffer_is_sized_and_zeroed() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let image = Image::with_header(header(3, 2, 8, ColorMode::Truecolor))?;
    assert_eq!(image.stride(), 9);
    assert_eq!(image.data.len(), 2 * 10);
    assert!(image.data.iter().all(|&b| b == 0));
    Ok(())
  }

  #[test]
  fn row_views_follow_the_layout() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut image = Image::with_header(header(2, 2, 8, ColorMode::Grayscale))?;
    image.data = vec![1, 10, 11, 2, 20, 21];
    assert_eq!(image.row(0), (1, &[10u8, 11][..]));
    assert_eq!(image.row(1), (2, &[20u8, 21][..]));
    let (tag, samples) = image.row_mut(1);
    *tag = 0;
    samples[0] = 99;
    assert_eq!(image.row(1), (0, &[99u8, 21][..]));
    Ok(())
  }

  #[test]
  fn pixel_views_are_pixel_sized() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut image = Image::with_header(header(2, 1, 8, ColorMode::TruecolorAlpha))?;
    image.data = vec![0, 1, 2, 3, 4, 5, 6, 7, 8];
    assert_eq!(image.pixel(0, 0), &[1, 2, 3, 4]);
    assert_eq!(image.pixel(0, 1), &[5, 6, 7, 8]);
    Ok(())
  }

  #[test]
  fn absurd_dimensions_fail_cleanly() {
    let err = Image::with_header(header(u32::MAX, u32::MAX, 16, ColorMode::TruecolorAlpha)).unwrap_err();
    assert!(matches!(err, PngError::OutOfMemory(_)));
  }
}
