// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

//! Codec driver: reads a complete image into memory, reconstructs the raw
//! samples, recodes them, and writes the smallest equivalent stream the
//! recoding passes can reach.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use log::{debug, info};

use crate::chunk::{self, ChunkHead, ChunkTag};
use crate::header::{ColorMode, Ihdr, Interlace};
use crate::image::Image;
use crate::{PngError, Result, filter, transform};

/// Decompresses the concatenated image-data chunks straight into the
/// scanline buffer. `first` is the head of the chunk that opened the
/// stream; further heads are consumed until the stream reports completion.
/// The decoder is always offered at least one output byte (a scratch byte
/// once the buffer is full), so output past the declared size surfaces as a
/// data error instead of stalling the stream.
fn read_data<R: Read>(input: &mut R, first: ChunkHead, image: &mut Image, label: &str) -> Result<()> {
  let expected = image.data.len();
  info!("{}: data size {}", label, expected);

  let mut stream = Decompress::new(true);
  let mut head = first;
  'stream: loop {
    if head.tag != ChunkTag::IDAT {
      return Err(PngError::Malformed("missing IDAT chunk".into()));
    }
    let payload = chunk::read_payload(input, &head, "image data")?;
    let mut consumed = 0;
    let mut scratch = [0u8; 1];
    loop {
      let before_in = stream.total_in();
      let before_out = stream.total_out();
      let written = before_out as usize;
      let output = if written < expected {
        &mut image.data[written..]
      } else {
        &mut scratch[..]
      };
      let status = stream
        .decompress(&payload[consumed..], output, FlushDecompress::Sync)
        .map_err(|err| PngError::Malformed(format!("inflate: {}", err)))?;
      consumed += (stream.total_in() - before_in) as usize;
      if stream.total_out() > expected as u64 {
        return Err(PngError::Malformed(format!("inflate: data exceeds {} bytes", expected)));
      }
      match status {
        Status::StreamEnd => break 'stream,
        Status::Ok | Status::BufError => {
          if stream.total_in() == before_in && stream.total_out() == before_out {
            if consumed < payload.len() {
              return Err(PngError::Malformed("inflate: no progress".into()));
            }
            // The rest of the stream has to be in a later chunk.
            break;
          }
        }
      }
    }
    head = chunk::read_head(input)?;
  }

  if stream.total_out() != expected as u64 {
    return Err(PngError::Malformed(format!(
      "expected data size {}, found {}",
      expected,
      stream.total_out()
    )));
  }
  info!("{}: deflate size {}", label, stream.total_in());
  Ok(())
}

/// Reads signature, header and every chunk up to the end marker, leaving a
/// fully decompressed scanline buffer. `label` names the input in logs.
fn read_image<R: Read>(input: &mut R, label: &str) -> Result<Image> {
  chunk::read_signature(input)?;
  let head = chunk::read_head(input)?;
  if head.tag != ChunkTag::IHDR {
    return Err(PngError::Malformed(format!("expected IHDR, found {}", head.tag)));
  }
  let header = Ihdr::parse(&chunk::read_payload(input, &head, "header")?)?;
  info!("{}: {}", label, header);
  if header.interlace != Interlace::Progressive {
    return Err(PngError::Unsupported(format!(
      "unsupported interlace method {}",
      header.interlace as u8
    )));
  }

  let mut image = Image::with_header(header)?;
  let mut palette_seen = false;
  let mut data_seen = false;
  loop {
    let head = chunk::read_head(input)?;
    match head.tag {
      ChunkTag::PLTE => {
        let payload = chunk::read_payload(input, &head, "palette data")?;
        image.palette.load_rgb(&payload)?;
        palette_seen = true;
        info!("{}: palette length {}", label, image.palette.len());
      }
      ChunkTag::TRNS if image.header.color == ColorMode::Indexed => {
        if !palette_seen {
          return Err(PngError::Malformed("tRNS before PLTE".into()));
        }
        let payload = chunk::read_payload(input, &head, "transparency alpha")?;
        image.palette.load_alpha(&payload)?;
        info!("{}: transparency length {}", label, image.palette.alpha().len());
      }
      ChunkTag::TRNS => {
        debug!("{}: ignoring transparency for {} image", label, image.header.color);
        chunk::skip_chunk(input, &head)?;
      }
      ChunkTag::IDAT if data_seen => {
        return Err(PngError::Malformed("unexpected IDAT after image data".into()));
      }
      ChunkTag::IDAT => {
        read_data(input, head, &mut image, label)?;
        data_seen = true;
      }
      ChunkTag::IEND => break,
      _ => chunk::skip_chunk(input, &head)?,
    }
  }
  if !data_seen {
    return Err(PngError::Malformed("missing IDAT chunk".into()));
  }
  Ok(image)
}

/// Writes signature, header, palette tables when the image is indexed, one
/// maximum-compression data chunk and the end marker.
fn write_image<W: Write>(output: &mut W, image: &Image, label: &str) -> Result<()> {
  chunk::write_signature(output)?;
  info!("{}: {}", label, image.header);
  chunk::write_chunk(output, ChunkTag::IHDR, &image.header.to_payload())?;

  if image.header.color == ColorMode::Indexed {
    info!("{}: palette length {}", label, image.palette.len());
    chunk::write_chunk(output, ChunkTag::PLTE, &image.palette.rgb_payload())?;
    if !image.palette.alpha().is_empty() {
      info!("{}: transparency length {}", label, image.palette.alpha().len());
      chunk::write_chunk(output, ChunkTag::TRNS, image.palette.alpha())?;
    }
  }

  info!("{}: data size {}", label, image.data.len());
  let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
  encoder.write_all(&image.data)?;
  let deflated = encoder.finish()?;
  chunk::write_chunk(output, ChunkTag::IDAT, &deflated)?;
  info!("{}: deflate size {}", label, deflated.len());
  chunk::write_chunk(output, ChunkTag::IEND, &[])
}

/// Recodes one image stream: decode, reconstruct, recode, re-filter,
/// encode. `label` names the input in logs and is never opened.
pub fn optimize_stream<R: Read, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<()> {
  let mut image = read_image(input, label)?;
  filter::reconstruct(&mut image)?;
  transform::apply(&mut image);
  filter::refilter(&mut image);
  write_image(output, &image, label)
}

/// Recodes the file at `path` into `output`. The input is read whole up
/// front, so `output` may be backed by the same path.
pub fn optimize_file<W: Write>(path: impl AsRef<Path>, output: &mut W) -> Result<()> {
  let path = path.as_ref();
  let contents = fs::read(path).map_err(|err| PngError::with_io_error(path, err))?;
  optimize_stream(&mut contents.as_slice(), output, &path.to_string_lossy())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
  }

  fn ihdr(width: u32, height: u32, depth: u8, color: u8, interlace: u8) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&width.to_be_bytes());
    payload.extend_from_slice(&height.to_be_bytes());
    payload.extend_from_slice(&[depth, color, 0, 0, interlace]);
    payload
  }

  fn png(chunks: &[(ChunkTag, Vec<u8>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    chunk::write_signature(&mut buf).unwrap();
    for (tag, payload) in chunks {
      chunk::write_chunk(&mut buf, *tag, payload).unwrap();
    }
    chunk::write_chunk(&mut buf, ChunkTag::IEND, &[]).unwrap();
    buf
  }

  #[test]
  fn first_chunk_must_be_the_header() {
    let input = png(&[(ChunkTag(*b"tEXt"), vec![0]), (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0))]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "expected IHDR, found tEXt"));
  }

  #[test]
  fn interlaced_images_are_refused() {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 1)),
      (ChunkTag::IDAT, zlib(&[0, 0x42])),
    ]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Unsupported(ref msg) if msg == "unsupported interlace method 1"));
  }

  #[test]
  fn image_without_data_is_rejected() {
    let input = png(&[(ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0))]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "missing IDAT chunk"));
  }

  #[test]
  fn interrupted_data_stream_is_rejected() {
    // A chunk of another type between two halves of the deflate stream.
    let compressed = zlib(&[0, 0x42]);
    let (front, back) = compressed.split_at(2);
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0)),
      (ChunkTag::IDAT, front.to_vec()),
      (ChunkTag(*b"tEXt"), vec![0]),
      (ChunkTag::IDAT, back.to_vec()),
    ]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "missing IDAT chunk"));
  }

  #[test]
  fn split_data_stream_is_concatenated() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let compressed = zlib(&[0, 0x11, 0x2F]);
    let (front, back) = compressed.split_at(3);
    let input = png(&[
      (ChunkTag::IHDR, ihdr(2, 1, 8, 0, 0)),
      (ChunkTag::IDAT, front.to_vec()),
      (ChunkTag::IDAT, back.to_vec()),
    ]);
    let image = read_image(&mut input.as_slice(), "test")?;
    assert_eq!(image.data, vec![0, 0x11, 0x2F]);
    Ok(())
  }

  #[test]
  fn data_after_stream_end_is_rejected() {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0)),
      (ChunkTag::IDAT, zlib(&[0, 0x42])),
      (ChunkTag::IDAT, vec![0]),
    ]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "unexpected IDAT after image data"));
  }

  #[test]
  fn short_data_stream_is_a_size_mismatch() {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(2, 2, 8, 0, 0)),
      (ChunkTag::IDAT, zlib(&[0, 0x42])),
    ]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "expected data size 6, found 2"));
  }

  #[test]
  fn oversized_data_stream_is_rejected() {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0)),
      (ChunkTag::IDAT, zlib(&[0, 0x42, 0x43, 0x44])),
    ]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "inflate: data exceeds 2 bytes"));
  }

  #[test]
  fn oversized_stream_split_across_chunks_is_rejected() {
    // The surplus only becomes visible after the first chunk has filled
    // the whole scanline buffer.
    let compressed = zlib(&[0, 0x42, 0x43, 0x44]);
    let (front, back) = compressed.split_at(4);
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0)),
      (ChunkTag::IDAT, front.to_vec()),
      (ChunkTag::IDAT, back.to_vec()),
    ]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "inflate: data exceeds 2 bytes"));
  }

  #[test]
  fn checksum_only_final_chunk_is_accepted() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // The deflate data ends exactly with the buffer; the zlib checksum
    // arrives whole or split in later chunks.
    let compressed = zlib(&[0, 0x11, 0x2F]);
    for split in [compressed.len() - 4, compressed.len() - 2] {
      let (front, back) = compressed.split_at(split);
      let input = png(&[
        (ChunkTag::IHDR, ihdr(2, 1, 8, 0, 0)),
        (ChunkTag::IDAT, front.to_vec()),
        (ChunkTag::IDAT, back.to_vec()),
      ]);
      let image = read_image(&mut input.as_slice(), "test")?;
      assert_eq!(image.data, vec![0, 0x11, 0x2F]);
    }
    Ok(())
  }

  #[test]
  fn transparency_before_palette_is_rejected() {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 3, 0)),
      (ChunkTag::TRNS, vec![0x80]),
      (ChunkTag::PLTE, vec![1, 2, 3]),
      (ChunkTag::IDAT, zlib(&[0, 0])),
    ]);
    let err = read_image(&mut input.as_slice(), "test").unwrap_err();
    assert!(matches!(err, PngError::Malformed(ref msg) if msg == "tRNS before PLTE"));
  }

  #[test]
  fn color_key_transparency_is_ignored() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 2, 0)),
      (ChunkTag::TRNS, vec![0, 1, 0, 2, 0, 3]),
      (ChunkTag::IDAT, zlib(&[0, 1, 2, 3])),
    ]);
    let image = read_image(&mut input.as_slice(), "test")?;
    assert!(image.palette.alpha().is_empty());
    Ok(())
  }

  #[test]
  fn palette_and_transparency_are_loaded() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(2, 1, 8, 3, 0)),
      (ChunkTag::PLTE, vec![1, 2, 3, 4, 5, 6]),
      (ChunkTag::TRNS, vec![0x80]),
      (ChunkTag::IDAT, zlib(&[0, 0, 1])),
    ]);
    let image = read_image(&mut input.as_slice(), "test")?;
    assert_eq!(image.palette.entries(), &[[1, 2, 3], [4, 5, 6]]);
    assert_eq!(image.palette.alpha(), &[0x80]);
    assert_eq!(image.data, vec![0, 0, 1]);
    Ok(())
  }

  #[test]
  fn ancillary_chunks_are_skipped() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0)),
      (ChunkTag(*b"gAMA"), vec![0, 0, 0xB1, 0x8F]),
      (ChunkTag::IDAT, zlib(&[0, 0x42])),
      (ChunkTag(*b"tIME"), vec![0; 7]),
    ]);
    let image = read_image(&mut input.as_slice(), "test")?;
    assert_eq!(image.data, vec![0, 0x42]);
    Ok(())
  }

  #[test]
  fn recoded_stream_decodes_to_the_same_samples() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(2, 1, 8, 0, 0)),
      (ChunkTag::IDAT, zlib(&[0, 0x00, 0xFF])),
    ]);
    let mut output = Vec::new();
    optimize_stream(&mut input.as_slice(), &mut output, "test")?;

    let mut recoded = read_image(&mut output.as_slice(), "test")?;
    assert_eq!(recoded.header.depth, 1);
    assert_eq!(recoded.header.color, ColorMode::Grayscale);
    filter::reconstruct(&mut recoded)?;
    assert_eq!(recoded.data, vec![0, 0b0100_0000]);
    Ok(())
  }

  #[test]
  fn optimize_file_reads_from_disk() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let input = png(&[
      (ChunkTag::IHDR, ihdr(1, 1, 8, 0, 0)),
      (ChunkTag::IDAT, zlib(&[0, 0x42])),
    ]);
    let path = std::env::temp_dir().join("pngler-optimize-file-test.png");
    fs::write(&path, &input)?;
    let mut output = Vec::new();
    optimize_file(&path, &mut output)?;
    fs::remove_file(&path)?;
    assert_eq!(&output[..8], &chunk::SIGNATURE);

    let err = optimize_file(&path, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, PngError::Io(_)));
    Ok(())
  }
}
