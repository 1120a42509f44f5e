// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use super::Code;
use crate::names;
use crate::schema::Schema;

/// `ApiVersion`, one variant per release plus `Unknown`, ordered oldest
/// first with `Unknown` greatest so that an undiscovered version selects
/// the newest arities.
pub(crate) fn emit(code: &mut Code, schema: &Schema) {
    let variants: Vec<String> = schema
        .releases
        .iter()
        .map(|r| names::release_variant(&r.code_name))
        .collect();
    // validate() guarantees at least one release
    let latest = variants.last().cloned().unwrap_or_default();

    code.blank();
    code.doc("Releases of the API, oldest first.");
    code.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]");
    code.open("pub enum ApiVersion");
    for (release, variant) in schema.releases.iter().zip(&variants) {
        code.doc(&format!(
            "{} ({}), API {}.{}",
            release.branding, release.code_name, release.major, release.minor
        ));
        code.line(format!("{variant},"));
    }
    code.doc("The server version has not been discovered or is not in the table.");
    code.line("#[default]");
    code.line("Unknown,");
    code.close();

    code.blank();
    code.open("impl ApiVersion");
    code.line(format!("pub const LATEST: ApiVersion = ApiVersion::{latest};"));
    code.blank();
    code.doc("Every known release, oldest first.");
    code.indent("pub const ALL: &'static [ApiVersion] = &[");
    for variant in &variants {
        code.line(format!("ApiVersion::{variant},"));
    }
    code.close_with("];");
    code.blank();

    code.doc(
        "Maps the version a host reports to its release. Releases sharing an\n\
         API version map to the oldest of them.",
    );
    code.open("pub fn from_parts(major: i64, minor: i64) -> ApiVersion");
    code.open("match (major, minor)");
    let mut seen = HashSet::new();
    for (release, variant) in schema.releases.iter().zip(&variants) {
        if !seen.insert((release.major, release.minor)) {
            continue;
        }
        code.line(format!(
            "({}, {}) => ApiVersion::{variant},",
            release.major, release.minor
        ));
    }
    code.line("_ => ApiVersion::Unknown,");
    code.close();
    code.close();
    code.blank();

    code.open("pub fn parts(&self) -> Option<(i64, i64)>");
    code.open("match self");
    for (release, variant) in schema.releases.iter().zip(&variants) {
        code.line(format!(
            "ApiVersion::{variant} => Some(({}, {})),",
            release.major, release.minor
        ));
    }
    code.line("ApiVersion::Unknown => None,");
    code.close();
    code.close();
    code.blank();

    code.open("pub fn code_name(&self) -> &'static str");
    code.open("match self");
    for (release, variant) in schema.releases.iter().zip(&variants) {
        code.line(format!("ApiVersion::{variant} => {:?},", release.code_name));
    }
    code.line("ApiVersion::Unknown => \"unknown\",");
    code.close();
    code.close();
    code.blank();

    code.open("pub fn branding(&self) -> &'static str");
    code.open("match self");
    for (release, variant) in schema.releases.iter().zip(&variants) {
        code.line(format!("ApiVersion::{variant} => {:?},", release.branding));
    }
    code.line("ApiVersion::Unknown => \"Unknown\",");
    code.close();
    code.close();
    code.blank();

    code.open("pub fn is_known(&self) -> bool");
    code.line("*self != ApiVersion::Unknown");
    code.close();
    code.close();

    code.blank();
    code.open("impl std::fmt::Display for ApiVersion");
    code.open("fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result");
    code.open("match self.parts()");
    code.line("Some((major, minor)) => write!(f, \"{major}.{minor}\"),");
    code.line("None => f.write_str(\"Unknown\"),");
    code.close();
    code.close();
    code.close();
}
