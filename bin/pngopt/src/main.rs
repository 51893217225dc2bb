// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

mod app;

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::ArgMatches;
use fern::colors::{Color, ColoredLevelConfig};
use log::{debug, error, info};
use pngler::PngError;
use thiserror::Error;

pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

// Exit codes from sysexits.h.
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_NOINPUT: u8 = 66;
const EX_OSERR: u8 = 71;
const EX_CANTCREAT: u8 = 73;
const EX_IOERR: u8 = 74;
const EX_CONFIG: u8 = 78;

#[derive(Error, Debug)]
enum AppError {
  #[error("invalid arguments: {}", _0)]
  Usage(String),
  #[error("{}: {}", _0, _1)]
  Data(String, String),
  #[error("{}: {}", _0, _1)]
  NoInput(String, String),
  #[error("{}: {}", _0, _1)]
  Resource(String, String),
  #[error("{}: {}", _0, _1)]
  CantCreate(String, String),
  #[error("{}: {}", _0, _1)]
  Io(String, String),
  #[error("{}: {}", _0, _1)]
  Config(String, String),
}

type Result<T> = std::result::Result<T, AppError>;

impl AppError {
  fn exit_code(&self) -> u8 {
    match self {
      Self::Usage(_) => EX_USAGE,
      Self::Data(..) => EX_DATAERR,
      Self::NoInput(..) => EX_NOINPUT,
      Self::Resource(..) => EX_OSERR,
      Self::CantCreate(..) => EX_CANTCREAT,
      Self::Io(..) => EX_IOERR,
      Self::Config(..) => EX_CONFIG,
    }
  }

  fn coding(label: &str, err: PngError) -> Self {
    match err {
      PngError::Malformed(msg) => Self::Data(label.into(), msg),
      PngError::Unsupported(msg) => Self::Config(label.into(), msg),
      PngError::Io(msg) => Self::Io(label.into(), msg),
      PngError::OutOfMemory(msg) => Self::Resource(label.into(), msg),
    }
  }
}

fn main() -> ExitCode {
  let app = app::create_app();
  // Help and version keep clap's exit 0; real parse errors must report the
  // sysexits usage status instead of clap's default.
  let matches = app.try_get_matches().unwrap_or_else(|err| match err.kind() {
    clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => err.exit(),
    _ => {
      let _ = err.print();
      std::process::exit(EX_USAGE as i32)
    }
  });

  let colors = ColoredLevelConfig::new().debug(Color::Magenta);
  fern::Dispatch::new()
    .chain(std::io::stderr())
    .level(match matches.get_count("verbose") {
      0 => log::LevelFilter::Error,
      1 => log::LevelFilter::Info,
      2 => log::LevelFilter::Debug,
      _ => log::LevelFilter::Trace,
    })
    .format(move |out, message, record| {
      out.finish(format_args!(
        "[{:6}][{}] {} ({}:{})",
        colors.color(record.level()),
        record.target(),
        message,
        record.file().unwrap_or("<undefined>"),
        record.line().unwrap_or(0)
      ))
    })
    .apply()
    .expect("Invalid fern configuration, exiting");

  debug!("{} v{}", PKG_NAME, PKG_VERSION);

  match run(&matches) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{}", err);
      ExitCode::from(err.exit_code())
    }
  }
}

/// Routes inputs to outputs following the classic filter conventions.
/// A single file with `-c` or `-o` goes to the requested destination,
/// a list of files is rewritten in place and no files at all reads
/// standard input.
fn run(matches: &ArgMatches) -> Result<()> {
  let stdio = matches.get_flag("stdio");
  let output = matches.get_one::<PathBuf>("output");
  let files: Vec<&PathBuf> = matches.get_many("files").map(|files| files.collect()).unwrap_or_default();

  if files.len() == 1 && (stdio || output.is_some()) {
    let encoded = recode_file(files[0])?;
    match output {
      Some(path) => persist(path, &encoded),
      None => write_stdout(&encoded),
    }
  } else if !files.is_empty() {
    if stdio || output.is_some() {
      return Err(AppError::Usage("-c and -o apply to a single input file".into()));
    }
    for file in &files {
      let encoded = recode_file(file)?;
      persist(file, &encoded)?;
    }
    Ok(())
  } else {
    let mut contents = Vec::new();
    std::io::stdin()
      .lock()
      .read_to_end(&mut contents)
      .map_err(|err| AppError::Io("(stdin)".into(), err.to_string()))?;
    let encoded = recode(&contents, "(stdin)")?;
    match output {
      Some(path) => persist(path, &encoded),
      None => write_stdout(&encoded),
    }
  }
}

fn recode(contents: &[u8], label: &str) -> Result<Vec<u8>> {
  let mut encoded = Vec::new();
  pngler::optimize_stream(&mut &contents[..], &mut encoded, label).map_err(|err| AppError::coding(label, err))?;
  info!("{}: {} bytes in, {} bytes out", label, contents.len(), encoded.len());
  Ok(encoded)
}

/// Recodes one file entirely in memory, so the result can safely be
/// persisted over the input path afterwards.
fn recode_file(path: &Path) -> Result<Vec<u8>> {
  let label = path.display().to_string();
  let contents = fs::read(path).map_err(|err| match err.kind() {
    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => AppError::NoInput(label.clone(), err.to_string()),
    _ => AppError::Io(label.clone(), err.to_string()),
  })?;
  recode(&contents, &label)
}

fn persist(path: &Path, encoded: &[u8]) -> Result<()> {
  fs::write(path, encoded).map_err(|err| match err.kind() {
    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
      AppError::CantCreate(path.display().to_string(), err.to_string())
    }
    _ => AppError::Io(path.display().to_string(), err.to_string()),
  })
}

fn write_stdout(encoded: &[u8]) -> Result<()> {
  let mut stdout = std::io::stdout().lock();
  stdout
    .write_all(encoded)
    .and_then(|()| stdout.flush())
    .map_err(|err| AppError::Io("(stdout)".into(), err.to_string()))
}
