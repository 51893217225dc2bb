// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

//! PNG chunk framing: the fixed signature plus length-prefixed, typed,
//! CRC-protected records. The CRC32 covers the type bytes and the payload,
//! never the length.

use std::fmt;
use std::io::{ErrorKind, Read, Write};

use byteorder::{BigEndian, WriteBytesExt};
use crc32fast::Hasher;

use crate::{PngError, Result};

/// Fixed eight byte signature preceding the first chunk.
pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
  pub const IHDR: Self = Self(*b"IHDR");
  pub const PLTE: Self = Self(*b"PLTE");
  pub const TRNS: Self = Self(*b"tRNS");
  pub const IDAT: Self = Self(*b"IDAT");
  pub const IEND: Self = Self(*b"IEND");

  /// Critical chunks carry bit 5 of the first type byte cleared.
  pub fn is_critical(&self) -> bool {
    self.0[0] & 0x20 == 0
  }
}

impl fmt::Display for ChunkTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", String::from_utf8_lossy(&self.0))
  }
}

/// Length and type of the next record. The payload and trailing CRC are
/// still unconsumed, so oversized chunks can be skipped without buffering.
#[derive(Clone, Copy, Debug)]
pub struct ChunkHead {
  pub size: u32,
  pub tag: ChunkTag,
}

/// EOF during a structural read means a truncated file, not an I/O fault.
fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
  match reader.read_exact(buf) {
    Ok(()) => Ok(()),
    Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(PngError::Malformed(format!("missing {}", what))),
    Err(err) => Err(PngError::Io(err.to_string())),
  }
}

pub fn read_signature<R: Read>(reader: &mut R) -> Result<()> {
  let mut signature = [0u8; 8];
  read_exact_or(reader, &mut signature, "signature")?;
  if signature != SIGNATURE {
    return Err(PngError::Malformed("invalid signature".into()));
  }
  Ok(())
}

pub fn write_signature<W: Write>(writer: &mut W) -> Result<()> {
  writer.write_all(&SIGNATURE)?;
  Ok(())
}

pub fn read_head<R: Read>(reader: &mut R) -> Result<ChunkHead> {
  let mut raw = [0u8; 8];
  read_exact_or(reader, &mut raw, "chunk")?;
  Ok(ChunkHead {
    size: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
    tag: ChunkTag([raw[4], raw[5], raw[6], raw[7]]),
  })
}

/// Reads the payload announced by `head` and validates the trailing CRC.
/// `what` names the payload in truncation errors. The length field comes
/// straight from the file, so the allocation is allowed to fail cleanly.
pub fn read_payload<R: Read>(reader: &mut R, head: &ChunkHead, what: &str) -> Result<Vec<u8>> {
  let mut payload = Vec::new();
  if payload.try_reserve_exact(head.size as usize).is_err() {
    return Err(PngError::OutOfMemory(format!("allocation of {} bytes", head.size)));
  }
  payload.resize(head.size as usize, 0);
  read_exact_or(reader, &mut payload, what)?;
  let mut hasher = Hasher::new();
  hasher.update(&head.tag.0);
  hasher.update(&payload);
  check_crc(reader, hasher.finalize())?;
  Ok(payload)
}

/// Discards an ancillary chunk, still validating its CRC. Unknown critical
/// chunks make the image unprocessable and are refused instead.
pub fn skip_chunk<R: Read>(reader: &mut R, head: &ChunkHead) -> Result<()> {
  if head.tag.is_critical() {
    return Err(PngError::Unsupported(format!("unsupported critical chunk {}", head.tag)));
  }
  let mut hasher = Hasher::new();
  hasher.update(&head.tag.0);
  let mut discard = [0u8; 4096];
  let mut left = head.size as usize;
  while left > 0 {
    let n = left.min(discard.len());
    read_exact_or(reader, &mut discard[..n], "chunk data")?;
    hasher.update(&discard[..n]);
    left -= n;
  }
  check_crc(reader, hasher.finalize())
}

fn check_crc<R: Read>(reader: &mut R, expected: u32) -> Result<()> {
  let mut raw = [0u8; 4];
  read_exact_or(reader, &mut raw, "CRC32")?;
  let found = u32::from_be_bytes(raw);
  if found != expected {
    return Err(PngError::Malformed(format!("expected CRC32 {:08X}, found {:08X}", expected, found)));
  }
  Ok(())
}

pub fn write_chunk<W: Write>(writer: &mut W, tag: ChunkTag, payload: &[u8]) -> Result<()> {
  writer.write_u32::<BigEndian>(payload.len() as u32)?;
  writer.write_all(&tag.0)?;
  writer.write_all(payload)?;
  let mut hasher = Hasher::new();
  hasher.update(&tag.0);
  hasher.update(payload);
  writer.write_u32::<BigEndian>(hasher.finalize())?;
  Ok(())
}
