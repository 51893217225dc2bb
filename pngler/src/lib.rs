//! Library to losslessly shrink PNG files. Given a non-interlaced image the
//! library decodes it, reduces the pixel representation wherever that is
//! provably reversible (dropping unused alpha or color channels, indexing,
//! packing to a smaller bit depth), picks the cheapest scanline filters and
//! re-compresses at maximum ratio. The decoded pixels of the result are
//! bit-for-bit identical to the input.
//!
//! # Example
//! ```rust,no_run
//! use std::env;
//! use std::fs::File;
//! use std::io::BufWriter;
//!
//! fn main() {
//!   let args: Vec<_> = env::args().collect();
//!   if args.len() != 3 {
//!     println!("Usage: {} <input> <output>", args[0]);
//!     std::process::exit(2);
//!   }
//!   let mut output = BufWriter::new(File::create(&args[2]).unwrap());
//!   pngler::optimize_file(&args[1], &mut output).unwrap();
//! }
//! ```

#![deny(
    //missing_docs,
    //unsafe_code,
    unstable_features,
  )]

use std::path::Path;
use thiserror::Error;

pub mod chunk;
pub mod filter;
pub mod header;
pub mod image;
pub mod optimize;
pub mod palette;
pub mod transform;

pub use header::ColorMode;
pub use image::Image;
pub use optimize::optimize_file;
pub use optimize::optimize_stream;

#[derive(Error, Debug)]
pub enum PngError {
  /// Structurally broken input: bad signature, CRC mismatch, illegal
  /// header values, truncated or missing mandatory chunks.
  #[error("{}", _0)]
  Malformed(String),

  /// Well-formed input this codec does not process, like interlaced
  /// images or unknown critical chunks.
  #[error("{}", _0)]
  Unsupported(String),

  #[error("I/O error: {}", _0)]
  Io(String),

  #[error("Out of memory: {}", _0)]
  OutOfMemory(String),
}

pub type Result<T> = std::result::Result<T, PngError>;

impl PngError {
  pub fn with_io_error(path: impl AsRef<Path>, error: std::io::Error) -> Self {
    Self::Io(format!("{:?}: {}", path.as_ref(), error))
  }
}

impl From<&str> for PngError {
  fn from(str: &str) -> Self {
    Self::Malformed(str.into())
  }
}

impl From<String> for PngError {
  fn from(str: String) -> Self {
    Self::Malformed(str)
  }
}

impl From<std::io::Error> for PngError {
  fn from(error: std::io::Error) -> Self {
    Self::Io(error.to_string())
  }
}
