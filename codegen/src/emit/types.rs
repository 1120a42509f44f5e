// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use crate::names;
use crate::schema::Type;

/// The owned Rust type of values of `ty`.
pub(crate) fn owned(ty: &Type) -> String {
    match ty {
        Type::String => "String".to_string(),
        Type::Int => "i64".to_string(),
        Type::Float => "f64".to_string(),
        Type::Bool => "bool".to_string(),
        Type::DateTime => "DateTime<Utc>".to_string(),
        Type::Void => "()".to_string(),
        Type::Ref(class) => names::ref_name(class),
        Type::Enum(name) => names::enum_name(name),
        Type::Record(class) => names::record_name(class),
        Type::Set(inner) => format!("Vec<{}>", owned(inner)),
        Type::Map(key, value) => format!("HashMap<{}, {}>", owned(key), owned(value)),
        Type::External(path) => format!("crate::{path}"),
    }
}

/// The type a message takes `ty` arguments as.
pub(crate) fn param(ty: &Type) -> String {
    match ty {
        Type::String => "&str".to_string(),
        Type::Int | Type::Float | Type::Bool | Type::DateTime | Type::Enum(_) | Type::Void => {
            owned(ty)
        }
        Type::Set(inner) => format!("&[{}]", owned(inner)),
        Type::Ref(_) | Type::Record(_) | Type::Map(..) | Type::External(_) => {
            format!("&{}", owned(ty))
        }
    }
}

/// Whether the owned type has a zero value to fill in for an absent
/// optional field.
pub(crate) fn has_default(ty: &Type) -> bool {
    !matches!(ty, Type::Enum(_) | Type::Record(_) | Type::External(_))
}
