// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

mod classes;
mod enums;
mod errors;
mod types;
mod versions;

use crate::model;
use crate::schema::{Schema, SchemaError};

/// Indented source buffer.
pub(crate) struct Code {
    out: String,
    depth: usize,
}

impl Code {
    fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Opens a block: writes `header {` and indents.
    pub(crate) fn open(&mut self, header: impl AsRef<str>) {
        self.line(format!("{} {{", header.as_ref()));
        self.depth += 1;
    }

    /// Writes `line` as is and indents what follows. For openers that are
    /// not blocks, like `vec![`.
    pub(crate) fn indent(&mut self, line: impl AsRef<str>) {
        self.line(line);
        self.depth += 1;
    }

    pub(crate) fn close(&mut self) {
        self.close_with("}");
    }

    pub(crate) fn close_with(&mut self, text: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Writes `text` as `///` lines. Empty text writes nothing.
    pub(crate) fn doc(&mut self, text: &str) {
        for line in text.trim().lines() {
            let line = line.trim_end();
            if line.is_empty() {
                self.line("///");
            } else {
                self.line(format!("/// {line}"));
            }
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

const HEADER: &str = "\
// @generated by xenapi-codegen. Do not edit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use xenapi_wire::{
    CallSite, CodecError, Marshal, RecordReader, RecordWriter, Unmarshal, Value, require_non_null,
};

use crate::dispatch::dropped_params;
use crate::errors::Error;
use crate::session::Session;
use crate::task::PendingTask;
";

/// Generates the Rust source of the API surface described by `schema`.
pub fn generate(schema: &Schema) -> Result<String, SchemaError> {
    schema.validate()?;
    let surface = model::build(schema)?;

    let mut code = Code::new();
    for line in HEADER.lines() {
        code.line(line);
    }

    versions::emit(&mut code, schema);
    errors::emit(&mut code, schema);
    enums::emit(&mut code, schema);
    for class in &surface {
        classes::emit(&mut code, schema, class);
    }

    Ok(code.finish())
}
