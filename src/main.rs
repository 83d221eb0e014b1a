//! # crossgcc
//!
//! Build cross-compilation GCC toolchains from source.
//!
//! ## Usage
//!
//! ```bash
//! crossgcc build --arch arm64 --flavor gnu --gcc 7    # Full pipeline
//! crossgcc resolve --arch arm --flavor linaro --gcc 6 # Show the component plan
//! crossgcc fetch --arch x86_64 --flavor gnu --gcc 8   # Fetch sources only
//! crossgcc status                                     # Show cache status
//! crossgcc clean                                      # Drop cached sources
//! ```
//!
//! ## Architecture
//!
//! - Sources: cached under vendor/ (git checkouts and release tarballs)
//! - Build: staged configure+make pipeline under build/, installed to out/<triple>
//! - Packaging: optional tarball of the installed prefix

use anyhow::Result;
use clap::Parser;

use crossgcc::builder;

#[derive(Parser)]
#[command(name = "crossgcc", about = "Cross-compilation GCC toolchain builder")]
struct Cli {
    #[command(subcommand)]
    command: builder::Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    builder::run(cli.command)
}
