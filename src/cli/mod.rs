//! Command-line interface definitions for the `provision` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page. It
//! deliberately depends on nothing but clap; defaults that come from
//! configuration are applied in the binary, not here.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `provision` binary.
#[derive(Debug, Parser)]
#[command(
    name = "provision",
    about = "Provision a MagicBox customer server and deploy the stack",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Customer identifier; the server is named magicbox-<customer>.
    #[arg(long, value_name = "NAME")]
    pub(crate) customer: String,
    /// Name of an SSH key already uploaded to the Hetzner Cloud project.
    #[arg(long = "ssh-key", value_name = "NAME")]
    pub(crate) ssh_key: String,
    /// Override the commercial server type for this run.
    #[arg(long, value_name = "TYPE")]
    pub(crate) size: Option<String>,
    /// Override the provider location for this run.
    #[arg(long, value_name = "LOCATION")]
    pub(crate) location: Option<String>,
    /// Override the boot image for this run.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// Override the admin account created on the host.
    #[arg(long = "admin-user", value_name = "NAME")]
    pub(crate) admin_user: Option<String>,
    /// Result rendering format.
    #[arg(long, value_enum, default_value = "text")]
    pub(crate) output: OutputFormatArg,
    /// Validate the request and print the plan without creating anything.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Seconds to wait for the server to report running after creation.
    #[arg(long, value_name = "SECONDS", default_value_t = 300)]
    pub(crate) timeout: u64,
}

/// CLI-facing rendering choice, mapped onto the reporting format by the
/// binary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormatArg {
    /// Human-readable summary.
    Text,
    /// Machine-readable JSON.
    Json,
}
