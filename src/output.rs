//! Output formatting for command results.
//!
//! Supports Rust pretty-debug and pretty-printed JSON, written to stdout.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Debug;
use std::io::Write;
use tracing::debug;

/// Output format of a command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Pretty,
}

/// Writes `value` using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(out: &mut impl Write, value: &T) -> Result<()> {
    writeln!(out, "{value:#?}")?;
    Ok(())
}

/// Writes `value` as pretty-printed JSON.
pub fn print_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    debug!(bytes = json.len(), "Writing JSON output");
    writeln!(out, "{json}")?;
    Ok(())
}

/// Writes `value` in the requested format.
pub fn emit<T: Serialize + Debug>(out: &mut impl Write, format: Format, value: &T) -> Result<()> {
    match format {
        Format::Json => print_json(out, value),
        Format::Pretty => print_pretty(out, value),
    }
}
