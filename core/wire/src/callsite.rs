// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How record decoding treats struct members the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Undeclared members are a codec error.
    Strict,
    /// Undeclared members are dropped.
    Lenient,
}

impl Default for DecodeMode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            DecodeMode::Strict
        } else {
            DecodeMode::Lenient
        }
    }
}

/// Breadcrumb identifying where in a call a value is being (de)serialized.
///
/// Each step of the descent returns a new, longer path:
///
/// ```
/// use xenapi_wire::CallSite;
///
/// let site = CallSite::new("Bond.create").arg("members").index(3);
/// assert_eq!(site.to_string(), "Bond.create(members)[3]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    path: String,
    mode: DecodeMode,
}

impl CallSite {
    pub fn new(method: &str) -> Self {
        Self {
            path: method.to_string(),
            mode: DecodeMode::default(),
        }
    }

    pub fn with_mode(self, mode: DecodeMode) -> Self {
        Self { mode, ..self }
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn is_strict(&self) -> bool {
        self.mode == DecodeMode::Strict
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Positional argument of the call.
    pub fn arg(&self, name: &str) -> Self {
        self.extend(format_args!("({name})"))
    }

    /// Value returned by the call.
    pub fn result(&self) -> Self {
        self.extend(format_args!(" -> "))
    }

    /// Element of a set.
    pub fn index(&self, i: usize) -> Self {
        self.extend(format_args!("[{i}]"))
    }

    /// Member of a record.
    pub fn field(&self, name: &str) -> Self {
        if self.path.ends_with(' ') {
            self.extend(format_args!("{name}"))
        } else {
            self.extend(format_args!(".{name}"))
        }
    }

    /// Entry of a map.
    pub fn key(&self, key: &str) -> Self {
        self.extend(format_args!("[{key:?}]"))
    }

    fn extend(&self, step: fmt::Arguments<'_>) -> Self {
        use fmt::Write;

        let mut path = self.path.clone();
        // writing into a String cannot fail
        let _ = path.write_fmt(step);
        Self {
            path,
            mode: self.mode,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&CallSite> for String {
    fn from(site: &CallSite) -> Self {
        site.path.clone()
    }
}

impl From<CallSite> for String {
    fn from(site: CallSite) -> Self {
        site.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_accumulates() {
        let site = CallSite::new("Bond.get_record").result().field("mode");
        assert_eq!(site.as_str(), "Bond.get_record -> mode");

        let site = CallSite::new("VM_metrics.get_record")
            .result()
            .field("VCPUs_utilisation")
            .key("0");
        assert_eq!(site.as_str(), "VM_metrics.get_record -> VCPUs_utilisation[\"0\"]");

        let site = CallSite::new("Bond.create").arg("members").index(3);
        assert_eq!(site.as_str(), "Bond.create(members)[3]");
    }

    #[test]
    fn test_into_string() {
        let site = CallSite::new("pool.get_other_config");
        let borrowed: String = (&site).into();
        let owned: String = site.result().into();
        assert_eq!(borrowed, "pool.get_other_config");
        assert_eq!(owned, "pool.get_other_config -> ");
    }

    #[test]
    fn test_mode_is_inherited() {
        let site = CallSite::new("x").with_mode(DecodeMode::Lenient);
        assert_eq!(site.arg("a").index(0).mode(), DecodeMode::Lenient);
        assert!(!site.is_strict());
    }

    #[test]
    fn test_decode_mode_serde() {
        let m: DecodeMode = serde_json::from_str("\"lenient\"").unwrap();
        assert_eq!(m, DecodeMode::Lenient);
        assert_eq!(serde_json::to_string(&DecodeMode::Strict).unwrap(), "\"strict\"");
    }
}
