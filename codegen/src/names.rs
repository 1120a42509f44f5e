// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Rust names for schema entities.

use heck::ToUpperCamelCase;

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Namespace types that would shadow runtime types get a suffix.
const RESERVED_TYPES: &[&str] = &["Session", "Error", "Value", "ApiVersion", "ApiError"];

/// Field, parameter and method names: lowercase, keywords suffixed with `_`.
///
/// Lowercasing instead of snake-casing keeps acronyms whole (`PIFs` becomes
/// `pifs`, not `pi_fs`).
pub fn ident(name: &str) -> String {
    let lower: String = name
        .chars()
        .map(|c| match c {
            '-' | '.' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    if KEYWORDS.contains(&lower.as_str()) || lower.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{lower}_")
    } else {
        lower
    }
}

/// Locals of the generated method bodies.
const LOCALS: &[&str] = &["session", "site"];

/// Parameter names: like [`ident`], renamed away from the locals of the
/// generated method bodies.
pub fn param_ident(name: &str) -> String {
    let name = ident(name);
    if LOCALS.contains(&name.as_str()) {
        format!("{name}_")
    } else {
        name
    }
}

pub fn type_name(name: &str) -> String {
    let camel = name.to_upper_camel_case();
    if camel.starts_with(|c: char| c.is_ascii_digit()) {
        format!("V{camel}")
    } else {
        camel
    }
}

/// Zero-sized type grouping the messages of a class.
pub fn namespace_name(class: &str) -> String {
    let name = type_name(class);
    if RESERVED_TYPES.contains(&name.as_str()) {
        format!("{name}Api")
    } else {
        name
    }
}

pub fn ref_name(class: &str) -> String {
    format!("{}Ref", type_name(class))
}

pub fn record_name(class: &str) -> String {
    format!("{}Record", type_name(class))
}

pub fn enum_name(name: &str) -> String {
    type_name(name)
}

pub fn variant_name(label: &str) -> String {
    type_name(label)
}

pub fn error_variant(code: &str) -> String {
    type_name(&code.to_ascii_lowercase())
}

/// Releases named by their xapi version (`1.250.0`) keep the dots as
/// underscores so that `1.25.0` and `12.5.0` stay apart.
pub fn release_variant(code_name: &str) -> String {
    if code_name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Xapi{}", code_name.replace('.', "_"))
    } else {
        type_name(code_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident() {
        assert_eq!(ident("API_version_major"), "api_version_major");
        assert_eq!(ident("PIFs"), "pifs");
        assert_eq!(ident("MAC"), "mac");
        assert_eq!(ident("self"), "self_");
        assert_eq!(ident("type"), "type_");
        assert_eq!(ident("uuid"), "uuid");
    }

    #[test]
    fn test_param_ident() {
        assert_eq!(param_ident("site"), "site_");
        assert_eq!(param_ident("session"), "session_");
        assert_eq!(param_ident("VIF"), "vif");
        assert_eq!(param_ident("self"), "self_");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ref_name("PIF_metrics"), "PifMetricsRef");
        assert_eq!(record_name("VLAN"), "VlanRecord");
        assert_eq!(namespace_name("cluster_host"), "ClusterHost");
        assert_eq!(namespace_name("session"), "SessionApi");
        assert_eq!(enum_name("bond_mode"), "BondMode");
        assert_eq!(variant_name("balance-slb"), "BalanceSlb");
        assert_eq!(variant_name("802.1q"), "V8021q");
        assert_eq!(error_variant("VLAN_TAG_INVALID"), "VlanTagInvalid");
        assert_eq!(release_variant("midnight-ride"), "MidnightRide");
        assert_eq!(release_variant("1.250.0"), "Xapi1_250_0");
        assert_eq!(release_variant("21.3.0"), "Xapi21_3_0");
    }
}
