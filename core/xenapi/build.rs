// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use anyhow::Context;

const SCHEMA: &str = "schema/xenapi.json";

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed={SCHEMA}");

    let schema = xenapi_codegen::load_schema(Path::new(SCHEMA))
        .with_context(|| format!("failed to load {SCHEMA}"))?;
    let code = xenapi_codegen::generate(&schema).context("failed to generate the API surface")?;

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").context("OUT_DIR is not set")?);
    let out = out_dir.join("xenapi.rs");
    std::fs::write(&out, code).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}
