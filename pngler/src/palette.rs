// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

//! Bounded color palette with a parallel per-entry alpha table. Alpha
//! entries are aligned to palette entries by index; indices past the end of
//! the alpha table are implicitly opaque.

use crate::{PngError, Result};

pub const MAX_ENTRIES: usize = 256;

#[derive(Clone, Debug, Default)]
pub struct Palette {
  entries: Vec<[u8; 3]>,
  alpha: Vec<u8>,
}

impl Palette {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn entries(&self) -> &[[u8; 3]] {
    &self.entries
  }

  pub fn alpha(&self) -> &[u8] {
    &self.alpha
  }

  /// Linear scan. An entry matches on the RGB triple; with `with_alpha` set,
  /// entries inside the alpha table must match the alpha sample too.
  pub fn index_of(&self, with_alpha: bool, rgba: [u8; 4]) -> Option<usize> {
    for (i, entry) in self.entries.iter().enumerate() {
      if with_alpha && i < self.alpha.len() && self.alpha[i] != rgba[3] {
        continue;
      }
      if *entry == [rgba[0], rgba[1], rgba[2]] {
        return Some(i);
      }
    }
    None
  }

  /// Registers a color, returning false once 256 distinct entries would be
  /// exceeded. The caller must then abandon indexing for the whole image.
  pub fn add(&mut self, with_alpha: bool, rgba: [u8; 4]) -> bool {
    if with_alpha && self.alpha.len() < self.entries.len() {
      // Entries preloaded from PLTE carry no alpha; they are implicitly
      // opaque and must not match translucent samples on RGB alone.
      self.alpha.resize(self.entries.len(), 0xFF);
    }
    if self.index_of(with_alpha, rgba).is_some() {
      return true;
    }
    if self.entries.len() == MAX_ENTRIES {
      return false;
    }
    self.entries.push([rgba[0], rgba[1], rgba[2]]);
    if with_alpha {
      self.alpha.push(rgba[3]);
    }
    true
  }

  /// Moves fully-opaque entries behind all translucent ones (palette entries
  /// swapped in lockstep), then truncates the alpha table to the translucent
  /// prefix. Trailing opaque entries need not be transmitted.
  pub fn compact_transparency(&mut self) {
    let mut i = 0;
    while i < self.alpha.len() && self.alpha[i] != 0xFF {
      i += 1;
    }
    if i == self.alpha.len() {
      return;
    }
    let mut j = i + 1;
    while j < self.alpha.len() {
      if self.alpha[j] != 0xFF {
        self.alpha.swap(i, j);
        self.entries.swap(i, j);
        i += 1;
      }
      j += 1;
    }
    self.alpha.truncate(i);
  }

  pub fn load_rgb(&mut self, payload: &[u8]) -> Result<()> {
    if payload.len() % 3 != 0 {
      return Err(PngError::Malformed(format!("PLTE size {} not divisible by 3", payload.len())));
    }
    let len = payload.len() / 3;
    if len > MAX_ENTRIES {
      return Err(PngError::Malformed(format!("PLTE length {} > 256", len)));
    }
    self.entries = payload.chunks_exact(3).map(|rgb| [rgb[0], rgb[1], rgb[2]]).collect();
    Ok(())
  }

  pub fn load_alpha(&mut self, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_ENTRIES {
      return Err(PngError::Malformed(format!("tRNS length {} > 256", payload.len())));
    }
    self.alpha = payload.to_vec();
    Ok(())
  }

  pub fn rgb_payload(&self) -> Vec<u8> {
    self.entries.iter().flatten().copied().collect()
  }
}
