// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Conversions between native values and [`Value`].
//!
//! Every conversion takes the [`CallSite`] describing where the value sits
//! in the call, and every failure reports that site.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::callsite::CallSite;
use crate::datetime;
use crate::error::CodecError;
use crate::value::{Struct, Value};

/// Native value to wire value.
pub trait Marshal {
    fn marshal(&self, site: &CallSite) -> Result<Value, CodecError>;
}

/// Wire value to native value.
pub trait Unmarshal: Sized {
    /// Class name when `Self` is an object reference. Used to check the
    /// class tag that tasks and events send next to a bare reference.
    const REFERENCE_CLASS: Option<&'static str> = None;

    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError>;
}

/// Types usable as keys of a wire map. Struct member names are strings, so
/// keys go through their string form.
pub trait MapKey: Sized + Eq + Hash {
    fn to_key(&self, site: &CallSite) -> Result<String, CodecError>;
    fn from_key(key: String, site: &CallSite) -> Result<Self, CodecError>;
}

pub(crate) fn mismatch(site: &CallSite, expected: &'static str, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        site: site.into(),
        expected,
        found: found.kind(),
    }
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn marshal(&self, site: &CallSite) -> Result<Value, CodecError> {
        (**self).marshal(site)
    }
}

impl Marshal for Value {
    fn marshal(&self, _site: &CallSite) -> Result<Value, CodecError> {
        Ok(self.clone())
    }
}

impl Unmarshal for Value {
    fn unmarshal(value: Value, _site: &CallSite) -> Result<Self, CodecError> {
        Ok(value)
    }
}

// Void results come back as an empty string.
impl Unmarshal for () {
    fn unmarshal(_value: Value, _site: &CallSite) -> Result<Self, CodecError> {
        Ok(())
    }
}

impl Marshal for i64 {
    fn marshal(&self, _site: &CallSite) -> Result<Value, CodecError> {
        Ok(Value::Int(*self))
    }
}

impl Unmarshal for i64 {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        match value {
            Value::Int(i) => Ok(i),
            // 64-bit counters are sometimes sent as decimal strings
            Value::String(s) => s.trim().parse().map_err(|_| CodecError::InvalidValue {
                site: site.into(),
                message: format!("{s:?} is not an integer"),
            }),
            other => Err(mismatch(site, "int", &other)),
        }
    }
}

impl Marshal for f64 {
    fn marshal(&self, _site: &CallSite) -> Result<Value, CodecError> {
        Ok(Value::Double(*self))
    }
}

impl Unmarshal for f64 {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        match value {
            Value::Double(d) => Ok(d),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch(site, "double", &other)),
        }
    }
}

impl Marshal for bool {
    fn marshal(&self, _site: &CallSite) -> Result<Value, CodecError> {
        Ok(Value::Boolean(*self))
    }
}

impl Unmarshal for bool {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => Err(mismatch(site, "boolean", &other)),
        }
    }
}

impl Marshal for str {
    fn marshal(&self, _site: &CallSite) -> Result<Value, CodecError> {
        Ok(Value::String(self.to_string()))
    }
}

impl Marshal for String {
    fn marshal(&self, _site: &CallSite) -> Result<Value, CodecError> {
        Ok(Value::String(self.clone()))
    }
}

impl Unmarshal for String {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(site, "string", &other)),
        }
    }
}

impl Marshal for DateTime<Utc> {
    fn marshal(&self, _site: &CallSite) -> Result<Value, CodecError> {
        Ok(Value::DateTime(*self))
    }
}

impl Unmarshal for DateTime<Utc> {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        match value {
            Value::DateTime(ts) => Ok(ts),
            // some fields carry timestamps as strings
            Value::String(s) => datetime::parse(&s).ok_or(CodecError::InvalidTimestamp {
                site: site.into(),
                value: s,
            }),
            other => Err(mismatch(site, "dateTime.iso8601", &other)),
        }
    }
}

impl<T: Marshal> Marshal for [T] {
    fn marshal(&self, site: &CallSite) -> Result<Value, CodecError> {
        self.iter()
            .enumerate()
            .map(|(i, item)| item.marshal(&site.index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn marshal(&self, site: &CallSite) -> Result<Value, CodecError> {
        self.as_slice().marshal(site)
    }
}

impl<T: Unmarshal> Unmarshal for Vec<T> {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| T::unmarshal(item, &site.index(i)))
                .collect(),
            other => Err(mismatch(site, "array", &other)),
        }
    }
}

impl<K: MapKey, V: Marshal, S> Marshal for HashMap<K, V, S> {
    fn marshal(&self, site: &CallSite) -> Result<Value, CodecError> {
        let mut members = Struct::new();
        for (k, v) in self {
            let key = k.to_key(site)?;
            let value = v.marshal(&site.key(&key))?;
            members.insert(key, value);
        }
        Ok(Value::Struct(members))
    }
}

impl<K: MapKey, V: Unmarshal> Unmarshal for HashMap<K, V> {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        match value {
            Value::Struct(members) => {
                let mut out = HashMap::with_capacity(members.len());
                for (key, v) in members {
                    let entry_site = site.key(&key);
                    let v = V::unmarshal(v, &entry_site)?;
                    out.insert(K::from_key(key, &entry_site)?, v);
                }
                Ok(out)
            }
            other => Err(mismatch(site, "struct", &other)),
        }
    }
}

/// Optional values are carried by omitting the struct member, never by a
/// wire null; see [`crate::record::RecordWriter::optional`].
impl<T: Marshal> Marshal for Option<T> {
    fn marshal(&self, site: &CallSite) -> Result<Value, CodecError> {
        match self {
            Some(v) => v.marshal(site),
            None => Err(CodecError::InvalidValue {
                site: site.into(),
                message: "absent value cannot be encoded".to_string(),
            }),
        }
    }
}

impl<T: Unmarshal> Unmarshal for Option<T> {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        T::unmarshal(value, site).map(Some)
    }
}

impl MapKey for String {
    fn to_key(&self, _site: &CallSite) -> Result<String, CodecError> {
        Ok(self.clone())
    }

    fn from_key(key: String, _site: &CallSite) -> Result<Self, CodecError> {
        Ok(key)
    }
}

impl MapKey for i64 {
    fn to_key(&self, _site: &CallSite) -> Result<String, CodecError> {
        Ok(self.to_string())
    }

    fn from_key(key: String, site: &CallSite) -> Result<Self, CodecError> {
        key.parse().map_err(|_| CodecError::InvalidValue {
            site: site.into(),
            message: format!("map key {key:?} is not an integer"),
        })
    }
}

/// Decodes `value` as `T`, starting a fresh result path under `site`.
pub fn decode<T: Unmarshal>(value: Value, site: &CallSite) -> Result<T, CodecError> {
    T::unmarshal(value, &site.result())
}
