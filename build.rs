//! Build script for generating the `provision` man page.
//!
//! Packaging installs `provision.1` from the build output directory. The
//! parser definitions are shared with the binary through the included CLI
//! module, so the rendered page always matches the flags the binary accepts.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;
    // The source string below embeds the package version.
    writeln!(stdout, "cargo:rerun-if-changed=Cargo.toml")?;

    let out_dir = PathBuf::from(
        env::var_os("OUT_DIR")
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set"))?,
    );
    render_man_page(&out_dir)
}

fn render_man_page(out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let man = Man::new(Cli::command())
        .title("PROVISION")
        .section("1")
        .source(format!("magicbox-provision {}", env!("CARGO_PKG_VERSION")))
        .manual("MagicBox Operations Manual");

    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    fs::write(out_dir.join("provision.1"), buffer)?;
    Ok(())
}
