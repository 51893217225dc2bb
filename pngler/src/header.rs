// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

//! IHDR image descriptor: parsing, validation and the quantities derived
//! from it (bits per pixel, filter distance, row stride).

use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use num_enum::TryFromPrimitive;

use crate::{PngError, Result};

pub const IHDR_SIZE: usize = 13;

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ColorMode {
  Grayscale = 0,
  Truecolor = 2,
  Indexed = 3,
  GrayscaleAlpha = 4,
  TruecolorAlpha = 6,
}

impl ColorMode {
  pub fn channels(self) -> u64 {
    match self {
      Self::Grayscale | Self::Indexed => 1,
      Self::GrayscaleAlpha => 2,
      Self::Truecolor => 3,
      Self::TruecolorAlpha => 4,
    }
  }

  pub fn has_alpha(self) -> bool {
    matches!(self, Self::GrayscaleAlpha | Self::TruecolorAlpha)
  }

  /// Legal bit depths for this color mode.
  fn accepts_depth(self, depth: u8) -> bool {
    match self {
      Self::Grayscale => matches!(depth, 1 | 2 | 4 | 8 | 16),
      Self::Indexed => matches!(depth, 1 | 2 | 4 | 8),
      Self::Truecolor | Self::GrayscaleAlpha | Self::TruecolorAlpha => matches!(depth, 8 | 16),
    }
  }
}

impl fmt::Display for ColorMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Grayscale => "grayscale",
      Self::Truecolor => "truecolor",
      Self::Indexed => "indexed",
      Self::GrayscaleAlpha => "grayscale alpha",
      Self::TruecolorAlpha => "truecolor alpha",
    })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Interlace {
  Progressive = 0,
  Adam7 = 1,
}

/// The image descriptor. Compression and filter method have a single legal
/// value each; they are validated on parse and emitted as zero on write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ihdr {
  pub width: u32,
  pub height: u32,
  pub depth: u8,
  pub color: ColorMode,
  pub interlace: Interlace,
}

impl Ihdr {
  pub fn parse(payload: &[u8]) -> Result<Self> {
    if payload.len() != IHDR_SIZE {
      return Err(PngError::Malformed(format!("expected IHDR size {}, found {}", IHDR_SIZE, payload.len())));
    }
    let mut cursor = Cursor::new(payload);
    let width = cursor.read_u32::<BigEndian>()?;
    let height = cursor.read_u32::<BigEndian>()?;
    let depth = cursor.read_u8()?;
    let color = cursor.read_u8()?;
    let compression = cursor.read_u8()?;
    let filter = cursor.read_u8()?;
    let interlace = cursor.read_u8()?;

    if width == 0 {
      return Err(PngError::Malformed("invalid width 0".into()));
    }
    if height == 0 {
      return Err(PngError::Malformed("invalid height 0".into()));
    }
    let color = ColorMode::try_from(color)
      .ok()
      .filter(|mode| mode.accepts_depth(depth))
      .ok_or_else(|| PngError::Malformed(format!("invalid color type {} and bit depth {}", color, depth)))?;
    if compression != 0 {
      return Err(PngError::Malformed(format!("invalid compression method {}", compression)));
    }
    if filter != 0 {
      return Err(PngError::Malformed(format!("invalid filter method {}", filter)));
    }
    let interlace =
      Interlace::try_from(interlace).map_err(|_| PngError::Malformed(format!("invalid interlace method {}", interlace)))?;

    Ok(Self {
      width,
      height,
      depth,
      color,
      interlace,
    })
  }

  pub fn to_payload(&self) -> [u8; IHDR_SIZE] {
    let mut payload = [0u8; IHDR_SIZE];
    payload[0..4].copy_from_slice(&self.width.to_be_bytes());
    payload[4..8].copy_from_slice(&self.height.to_be_bytes());
    payload[8] = self.depth;
    payload[9] = self.color as u8;
    payload[12] = self.interlace as u8;
    payload
  }

  pub fn bits_per_pixel(&self) -> u64 {
    self.color.channels() * self.depth as u64
  }

  /// Filter neighbor distance: a whole pixel for byte-aligned samples,
  /// one byte for packed sub-byte samples.
  pub fn bytes_per_pixel(&self) -> usize {
    ((self.bits_per_pixel() + 7) / 8) as usize
  }

  /// Sample bytes per scanline, excluding the filter tag byte.
  pub fn row_stride(&self) -> u64 {
    (self.width as u64 * self.bits_per_pixel() + 7) / 8
  }

  /// Total decompressed size: per row one tag byte plus the sample bytes.
  /// `None` when the product exceeds the u64 range.
  pub fn data_len(&self) -> Option<u64> {
    (1 + self.row_stride()).checked_mul(self.height as u64)
  }
}

impl fmt::Display for Ihdr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{} {}-bit {}", self.width, self.height, self.depth, self.color)
  }
}
