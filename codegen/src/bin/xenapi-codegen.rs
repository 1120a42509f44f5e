// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "xenapi-codegen", version, about = "Generate the XenAPI Rust surface")]
struct Args {
    /// Path of the JSON API schema.
    #[arg(long)]
    schema: PathBuf,

    /// Output file. Defaults to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let schema = xenapi_codegen::load_schema(&args.schema)
        .with_context(|| format!("Failed to load schema {}", args.schema.display()))?;
    let code = xenapi_codegen::generate(&schema).context("Invalid schema")?;

    match &args.out {
        Some(path) => std::fs::write(path, code)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => std::io::stdout()
            .write_all(code.as_bytes())
            .context("Failed to write to stdout")?,
    }
    Ok(())
}
