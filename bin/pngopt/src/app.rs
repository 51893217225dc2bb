// SPDX-License-Identifier: LGPL-2.1
// Copyright 2026 Daniel Vogelbacher <daniel@chaospixel.com>

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, crate_version};

/// Builds the command line interface.
pub fn create_app() -> Command {
  Command::new("pngopt")
    .version(crate_version!())
    .about("Lossless PNG re-encoder and size optimizer")
    .arg(
      Arg::new("stdio")
        .short('c')
        .long("stdio")
        .action(ArgAction::SetTrue)
        .help("Write the result to standard output"),
    )
    .arg(
      Arg::new("output")
        .short('o')
        .long("output")
        .value_name("PATH")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Write the result to PATH instead of rewriting the input"),
    )
    .arg(
      Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::Count)
        .help("Report each coding stage, repeat for more detail"),
    )
    .arg(
      Arg::new("files")
        .value_name("FILE")
        .num_args(0..)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Input files, rewritten in place unless -c or -o is given"),
    )
}
