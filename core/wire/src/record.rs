// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Helpers the generated record (de)serializers are built from.

use tracing::trace;

use crate::callsite::CallSite;
use crate::error::CodecError;
use crate::marshal::{Marshal, Unmarshal, mismatch};
use crate::value::{Struct, Value};

/// Implemented by the generated record of each class.
pub trait Record: Marshal + Unmarshal {
    /// Wire name of the class the record describes.
    const CLASS: &'static str;
}

/// Pulls declared members out of a struct value.
///
/// Members are removed as they are read, so whatever is left when
/// [`finish`](RecordReader::finish) is called was not declared by the
/// schema.
pub struct RecordReader<'s> {
    members: Struct,
    site: &'s CallSite,
}

impl<'s> RecordReader<'s> {
    pub fn new(value: Value, site: &'s CallSite) -> Result<Self, CodecError> {
        match value {
            Value::Struct(members) => Ok(Self { members, site }),
            other => Err(mismatch(site, "struct", &other)),
        }
    }

    /// A member the schema requires.
    pub fn required<T: Unmarshal>(&mut self, name: &str) -> Result<T, CodecError> {
        match self.members.remove(name) {
            Some(v) => T::unmarshal(v, &self.site.field(name)),
            None => Err(CodecError::MissingMember {
                site: self.site.into(),
                member: name.to_string(),
            }),
        }
    }

    /// A member the schema marks optional; absent means the zero value.
    pub fn optional<T: Unmarshal + Default>(&mut self, name: &str) -> Result<T, CodecError> {
        match self.members.remove(name) {
            Some(v) => T::unmarshal(v, &self.site.field(name)),
            None => Ok(T::default()),
        }
    }

    /// Checks for undeclared members according to the site's decode mode.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.members.is_empty() {
            return Ok(());
        }

        if self.site.is_strict() {
            // members are sorted, so the reported one is deterministic
            let member = self.members.into_keys().next().unwrap_or_default();
            return Err(CodecError::UnexpectedMember {
                site: self.site.into(),
                member,
            });
        }

        trace!(
            site = %self.site,
            ignored = ?self.members.keys().collect::<Vec<_>>(),
            "dropping undeclared record members"
        );
        Ok(())
    }
}

/// Builds a struct value member by member.
pub struct RecordWriter<'s> {
    members: Struct,
    site: &'s CallSite,
}

impl<'s> RecordWriter<'s> {
    pub fn new(site: &'s CallSite) -> Self {
        Self {
            members: Struct::new(),
            site,
        }
    }

    pub fn member<T: Marshal + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), CodecError> {
        let v = value.marshal(&self.site.field(name))?;
        self.members.insert(name.to_string(), v);
        Ok(())
    }

    /// Writes the member only when present.
    pub fn optional<T: Marshal>(&mut self, name: &str, value: &Option<T>) -> Result<(), CodecError> {
        match value {
            Some(v) => self.member(name, v),
            None => Ok(()),
        }
    }

    pub fn finish(self) -> Value {
        Value::Struct(self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecodeMode;

    #[derive(Debug, PartialEq)]
    struct VlanRecord {
        uuid: String,
        tag: i64,
        other_config: std::collections::HashMap<String, String>,
    }

    impl Unmarshal for VlanRecord {
        fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
            let mut r = RecordReader::new(value, site)?;
            let record = VlanRecord {
                uuid: r.required("uuid")?,
                tag: r.required("tag")?,
                other_config: r.optional("other_config")?,
            };
            r.finish()?;
            Ok(record)
        }
    }

    fn wire(extra: Option<(&str, Value)>) -> Value {
        let mut v = Value::structure([
            ("uuid", Value::from("7f3c")),
            ("tag", Value::from(42)),
        ]);
        if let (Value::Struct(m), Some((k, x))) = (&mut v, extra) {
            m.insert(k.to_string(), x);
        }
        v
    }

    #[test]
    fn test_optional_member_defaults() {
        let site = CallSite::new("VLAN.get_record").result();
        let rec = VlanRecord::unmarshal(wire(None), &site).unwrap();
        assert_eq!(rec.tag, 42);
        assert!(rec.other_config.is_empty());
    }

    #[test]
    fn test_missing_required_member() {
        let site = CallSite::new("VLAN.get_record").result();
        let err = VlanRecord::unmarshal(Value::structure([("uuid", Value::from("x"))]), &site)
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingMember {
                site: "VLAN.get_record -> ".to_string(),
                member: "tag".to_string()
            }
        );
    }

    #[test]
    fn test_extra_member_strict_and_lenient() {
        let strict = CallSite::new("VLAN.get_record")
            .with_mode(DecodeMode::Strict)
            .result();
        let err = VlanRecord::unmarshal(wire(Some(("future_field", Value::from(true)))), &strict)
            .unwrap_err();
        assert!(
            matches!(&err, CodecError::UnexpectedMember { member, .. } if member == "future_field"),
            "{err:?}"
        );

        let lenient = CallSite::new("VLAN.get_record")
            .with_mode(DecodeMode::Lenient)
            .result();
        let rec =
            VlanRecord::unmarshal(wire(Some(("future_field", Value::from(true)))), &lenient)
                .unwrap();
        assert_eq!(rec.uuid, "7f3c");
    }

    #[test]
    fn test_writer_skips_absent_optionals() {
        let site = CallSite::new("VM.create").arg("args");
        let mut w = RecordWriter::new(&site);
        w.member("name_label", "vm").unwrap();
        w.optional::<String>("domain_type", &None).unwrap();
        w.optional("suspend_SR", &Some("OpaqueRef:NULL".to_string()))
            .unwrap();
        let v = w.finish();
        assert_eq!(v.get("name_label"), Some(&Value::from("vm")));
        assert!(v.get("domain_type").is_none());
        assert!(v.get("suspend_SR").is_some());
    }
}
