// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use fieldwatch::Cli;

fn main() {
    let cli = Cli::parse();
    fieldwatch::init_logging(&cli.command);
    if let Err(e) = fieldwatch::run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
