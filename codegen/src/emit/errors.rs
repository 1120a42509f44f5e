// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use super::Code;
use crate::names;
use crate::schema::{ErrorCode, Schema};

/// Field names of a typed error variant, made unique.
fn fields(error: &ErrorCode) -> Vec<String> {
    let mut seen = HashSet::new();
    error
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let name = names::ident(p);
            if seen.insert(name.clone()) {
                name
            } else {
                format!("{name}_{i}")
            }
        })
        .collect()
}

/// `ApiError`: a typed variant per documented error code and `Other` for
/// the rest.
pub(crate) fn emit(code: &mut Code, schema: &Schema) {
    code.blank();
    code.doc(
        "Failure codes the server documents, with their parameters.\n\n\
         Codes not in the table, and any future ones, are `Other`.",
    );
    code.line("#[derive(Debug, Clone, PartialEq, Eq)]");
    code.line("#[non_exhaustive]");
    code.open("pub enum ApiError");
    for error in &schema.errors {
        code.doc(&error.doc);
        let fields = fields(error);
        if fields.is_empty() {
            code.line(format!("{} {{}},", names::error_variant(&error.code)));
        } else {
            let list: Vec<String> = fields.iter().map(|f| format!("{f}: String")).collect();
            code.line(format!(
                "{} {{ {} }},",
                names::error_variant(&error.code),
                list.join(", ")
            ));
        }
    }
    code.open("Other");
    code.line("code: String,");
    code.line("params: Vec<String>,");
    code.close_with("},");
    code.close();

    code.blank();
    code.open("impl ApiError");
    code.doc("Reconstructs the typed error from the code and parameters of a fault.");
    code.open("pub fn from_parts(code: &str, params: &[String]) -> ApiError");
    code.line("let param = |i: usize| params.get(i).cloned().unwrap_or_default();");
    code.open("match code");
    for error in &schema.errors {
        let fields = fields(error);
        let variant = names::error_variant(&error.code);
        if fields.is_empty() {
            code.line(format!("{:?} => ApiError::{variant} {{}},", error.code));
        } else {
            let list: Vec<String> = fields
                .iter()
                .enumerate()
                .map(|(i, f)| format!("{f}: param({i})"))
                .collect();
            code.line(format!(
                "{:?} => ApiError::{variant} {{ {} }},",
                error.code,
                list.join(", ")
            ));
        }
    }
    code.open("_ => ApiError::Other");
    code.line("code: code.to_string(),");
    code.line("params: params.to_vec(),");
    code.close_with("},");
    code.close();
    code.close();
    code.blank();

    code.doc("The wire code of the error.");
    code.open("pub fn code(&self) -> &str");
    code.open("match self");
    for error in &schema.errors {
        code.line(format!(
            "ApiError::{} {{ .. }} => {:?},",
            names::error_variant(&error.code),
            error.code
        ));
    }
    code.line("ApiError::Other { code, .. } => code,");
    code.close();
    code.close();
    code.close();
}
