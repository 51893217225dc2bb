// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

//! Lossless recoding passes over reconstructed samples. Every pass first
//! proves that no information would be lost and otherwise leaves the image
//! untouched, so the pipeline can only shrink the encoded form.

use log::debug;

use crate::header::ColorMode;
use crate::image::Image;

/// Drops the alpha channel when every alpha sample is fully opaque.
pub fn discard_alpha(image: &mut Image) -> bool {
  if image.header.color != ColorMode::GrayscaleAlpha && image.header.color != ColorMode::TruecolorAlpha {
    return false;
  }
  let sample = image.header.depth as usize / 8;
  let pixel = image.header.bytes_per_pixel();
  let color = pixel - sample;
  for y in 0..image.height() {
    for x in 0..image.width() {
      if image.pixel(y, x)[color..].iter().any(|&a| a != 0xFF) {
        return false;
      }
    }
  }

  let mut out = Vec::with_capacity((1 + color * image.width()) * image.height());
  for y in 0..image.height() {
    let (tag, samples) = image.row(y);
    out.push(tag);
    for x in 0..image.width() {
      out.extend_from_slice(&samples[x * pixel..x * pixel + color]);
    }
  }
  image.header.color = if image.header.color == ColorMode::GrayscaleAlpha {
    ColorMode::Grayscale
  } else {
    ColorMode::Truecolor
  };
  image.data = out;
  true
}

/// Collapses the three color channels into one when red, green and blue
/// agree for every pixel. An alpha channel survives the collapse.
pub fn discard_color(image: &mut Image) -> bool {
  if image.header.color != ColorMode::Truecolor && image.header.color != ColorMode::TruecolorAlpha {
    return false;
  }
  let sample = image.header.depth as usize / 8;
  let pixel = image.header.bytes_per_pixel();
  for y in 0..image.height() {
    for x in 0..image.width() {
      let px = image.pixel(y, x);
      if px[..sample] != px[sample..2 * sample] || px[sample..2 * sample] != px[2 * sample..3 * sample] {
        return false;
      }
    }
  }

  let keep = pixel - 2 * sample;
  let mut out = Vec::with_capacity((1 + keep * image.width()) * image.height());
  for y in 0..image.height() {
    let (tag, samples) = image.row(y);
    out.push(tag);
    for x in 0..image.width() {
      let px = &samples[x * pixel..(x + 1) * pixel];
      out.extend_from_slice(&px[..sample]);
      if image.header.color == ColorMode::TruecolorAlpha {
        out.extend_from_slice(&px[3 * sample..]);
      }
    }
  }
  image.header.color = if image.header.color == ColorMode::Truecolor {
    ColorMode::Grayscale
  } else {
    ColorMode::GrayscaleAlpha
  };
  image.data = out;
  true
}

/// Rewrites 8-bit truecolor pixels as palette indices when they fit in one
/// palette. Entries preloaded from a suggested palette seed the scan, and
/// translucent entries are compacted to the front so the transparency table
/// stays minimal.
pub fn index_color(image: &mut Image) -> bool {
  if image.header.color != ColorMode::Truecolor && image.header.color != ColorMode::TruecolorAlpha {
    return false;
  }
  if image.header.depth != 8 {
    return false;
  }
  let with_alpha = image.header.color == ColorMode::TruecolorAlpha;
  let pixel = image.header.bytes_per_pixel();
  for y in 0..image.height() {
    for x in 0..image.width() {
      let px = image.pixel(y, x);
      let rgba = [px[0], px[1], px[2], if with_alpha { px[3] } else { 0xFF }];
      if !image.palette.add(with_alpha, rgba) {
        return false;
      }
    }
  }
  image.palette.compact_transparency();

  let mut out = Vec::with_capacity((1 + image.width()) * image.height());
  for y in 0..image.height() {
    let (tag, samples) = image.row(y);
    out.push(tag);
    for x in 0..image.width() {
      let px = &samples[x * pixel..(x + 1) * pixel];
      let rgba = [px[0], px[1], px[2], if with_alpha { px[3] } else { 0xFF }];
      let Some(index) = image.palette.index_of(with_alpha, rgba) else {
        return false;
      };
      out.push(index as u8);
    }
  }
  image.header.color = ColorMode::Indexed;
  image.data = out;
  true
}

fn reduce_depth_8(image: &mut Image) -> bool {
  if image.header.color != ColorMode::Grayscale && image.header.color != ColorMode::Indexed {
    return false;
  }
  if image.header.depth != 8 {
    return false;
  }
  if image.header.color == ColorMode::Grayscale {
    for y in 0..image.height() {
      let (_, samples) = image.row(y);
      if samples.iter().any(|&a| a >> 4 != a & 0x0F) {
        return false;
      }
    }
  } else if image.palette.len() > 16 {
    return false;
  }

  let stride = image.stride();
  let mut out = Vec::with_capacity((1 + (stride + 1) / 2) * image.height());
  for y in 0..image.height() {
    let (tag, samples) = image.row(y);
    out.push(tag);
    for pair in samples.chunks(2) {
      let a = pair[0] & 0x0F;
      let b = pair.get(1).copied().unwrap_or(0) & 0x0F;
      out.push(a << 4 | b);
    }
  }
  image.header.depth = 4;
  image.data = out;
  true
}

fn reduce_depth_4(image: &mut Image) -> bool {
  if image.header.depth != 4 {
    return false;
  }
  if image.header.color == ColorMode::Grayscale {
    for y in 0..image.height() {
      let (_, samples) = image.row(y);
      for &byte in samples {
        let a = byte >> 4;
        let b = byte & 0x0F;
        if a >> 2 != a & 0x03 || b >> 2 != b & 0x03 {
          return false;
        }
      }
    }
  } else if image.palette.len() > 4 {
    return false;
  }

  let stride = image.stride();
  let mut out = Vec::with_capacity((1 + (stride + 1) / 2) * image.height());
  for y in 0..image.height() {
    let (tag, samples) = image.row(y);
    out.push(tag);
    for pair in samples.chunks(2) {
      let i_byte = pair[0];
      let j_byte = pair.get(1).copied().unwrap_or(0);
      let a = i_byte >> 4 & 0x03;
      let b = i_byte & 0x03;
      let c = j_byte >> 4 & 0x03;
      let d = j_byte & 0x03;
      out.push(a << 6 | b << 4 | c << 2 | d);
    }
  }
  image.header.depth = 2;
  image.data = out;
  true
}

fn reduce_depth_2(image: &mut Image) -> bool {
  if image.header.depth != 2 {
    return false;
  }
  if image.header.color == ColorMode::Grayscale {
    for y in 0..image.height() {
      let (_, samples) = image.row(y);
      for &byte in samples {
        for shift in [6, 4, 2, 0] {
          let a = byte >> shift & 0x03;
          if a >> 1 != a & 0x01 {
            return false;
          }
        }
      }
    }
  } else if image.palette.len() > 2 {
    return false;
  }

  let stride = image.stride();
  let mut out = Vec::with_capacity((1 + (stride + 1) / 2) * image.height());
  for y in 0..image.height() {
    let (tag, samples) = image.row(y);
    out.push(tag);
    for pair in samples.chunks(2) {
      let i_byte = pair[0];
      let j_byte = pair.get(1).copied().unwrap_or(0);
      let mut packed = 0u8;
      for (slot, byte) in [i_byte, j_byte].into_iter().enumerate() {
        for (sample, shift) in [6u8, 4, 2, 0].into_iter().enumerate() {
          let bit = byte >> shift & 0x01;
          packed |= bit << (7 - (slot * 4 + sample));
        }
      }
      out.push(packed);
    }
  }
  image.header.depth = 1;
  image.data = out;
  true
}

/// Packs grayscale samples whose halves replicate, or indexed samples whose
/// palette is small enough, into fewer bits per pixel. Each step halves the
/// depth and the chain stops at the first step that would lose bits.
pub fn reduce_depth(image: &mut Image) -> bool {
  let mut reduced = reduce_depth_8(image);
  reduced |= reduce_depth_4(image);
  reduced |= reduce_depth_2(image);
  reduced
}

/// Runs the recoding pipeline in its fixed order. Later passes feed on what
/// earlier ones expose, so an opaque gray RGBA image can end up as packed
/// grayscale.
pub fn apply(image: &mut Image) {
  if discard_alpha(image) {
    debug!("discarded alpha channel");
  }
  if discard_color(image) {
    debug!("discarded color channels");
  }
  if index_color(image) {
    debug!("indexed {} colors", image.palette.len());
  }
  if reduce_depth(image) {
    debug!("reduced depth to {}-bit", image.header.depth);
  }
}
