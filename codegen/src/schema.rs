// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Machine-readable description of the API: releases, classes with their
//! fields and messages, enums and error codes.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    // Loading
    #[error("cannot read schema: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse schema: {0}")]
    Parse(#[from] serde_json::Error),

    // Validation
    #[error("the release table is empty")]
    NoReleases,
    #[error("{context}: unknown release {release:?}")]
    UnknownRelease { context: String, release: String },
    #[error("{context}: unknown class {class:?}")]
    UnknownClass { context: String, class: String },
    #[error("{context}: class {class:?} has no record")]
    NoRecord { context: String, class: String },
    #[error("{context}: unknown enum {name:?}")]
    UnknownEnum { context: String, name: String },
    #[error("{context}: map keys must be strings, integers, references or enums")]
    InvalidMapKey { context: String },
    #[error("{context}: a parameter cannot be void")]
    VoidParam { context: String },
    #[error("{context}: an asynchronous message needs a session")]
    AsyncWithoutSession { context: String },
    #[error("enum {0:?} has no values")]
    EmptyEnum(String),
    #[error("duplicate {kind} {name:?}")]
    Duplicate { kind: &'static str, name: String },
}

/// Value types of the API.
///
/// In JSON, scalar types are plain strings (`"string"`, `"int"`) and the
/// others are single-key objects: `{"ref": "PIF"}`, `{"set": "string"}`,
/// `{"map": ["string", {"ref": "VM"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    String,
    Int,
    Float,
    Bool,
    #[serde(rename = "datetime")]
    DateTime,
    Void,
    Ref(String),
    Enum(String),
    Record(String),
    Set(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// A type supplied by the SDK runtime, as a path from the crate root.
    External(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Lifecycle {
    #[default]
    Published,
    Deprecated {
        since: String,
    },
    Removed {
        since: String,
    },
}

impl Lifecycle {
    pub fn is_removed(&self) -> bool {
        matches!(self, Lifecycle::Removed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    #[default]
    Ro,
    Rw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub code_name: String,
    pub major: u32,
    pub minor: u32,
    pub branding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    #[serde(default)]
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    #[serde(default)]
    pub doc: String,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode {
    pub code: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub qualifier: Qualifier,
    /// Absent from the struct means the zero value.
    #[serde(default)]
    pub optional: bool,
    /// Defaults to the class release.
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    /// Defaults to the message release.
    #[serde(default)]
    pub since: Option<String>,
    /// The null reference is accepted.
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub name: String,
    #[serde(default)]
    pub doc: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "void")]
    pub result: Type,
    /// An `Async.` variant exists.
    #[serde(default, rename = "async")]
    pub is_async: bool,
    /// The session reference is passed as first argument.
    #[serde(default = "yes")]
    pub session: bool,
    /// Defaults to the class release.
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// Error codes the message documents.
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default)]
    pub doc: String,
    pub since: String,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// References are credentials and must not be printed.
    #[serde(default)]
    pub secret: bool,
    /// Emit a record type and the implicit accessors.
    #[serde(default = "yes")]
    pub record: bool,
    /// Emit the accessors implied by the fields. Classes whose records only
    /// travel inside other results have none.
    #[serde(default = "yes")]
    pub accessors: bool,
    /// Emit `get_all` and `get_all_records`.
    #[serde(default = "yes")]
    pub get_all: bool,
    /// Emit `create` from a record and `destroy`.
    #[serde(default)]
    pub constructor: bool,
    /// Implicit messages the server does not have for this class.
    #[serde(default)]
    pub omit: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Class {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub releases: Vec<Release>,
    #[serde(default)]
    pub enums: Vec<EnumType>,
    #[serde(default)]
    pub errors: Vec<ErrorCode>,
    pub classes: Vec<Class>,
}

fn yes() -> bool {
    true
}

fn void() -> Type {
    Type::Void
}

pub fn load_schema(path: &Path) -> Result<Schema, SchemaError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

impl Schema {
    /// Position of a release in the table, oldest first.
    pub fn release_index(&self, code_name: &str) -> Option<usize> {
        self.releases.iter().position(|r| r.code_name == code_name)
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn error_code(&self, code: &str) -> Option<&ErrorCode> {
        self.errors.iter().find(|e| e.code == code)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.releases.is_empty() {
            return Err(SchemaError::NoReleases);
        }
        unique("release", self.releases.iter().map(|r| r.code_name.as_str()))?;
        unique("class", self.classes.iter().map(|c| c.name.as_str()))?;
        unique("enum", self.enums.iter().map(|e| e.name.as_str()))?;
        unique("error code", self.errors.iter().map(|e| e.code.as_str()))?;

        for e in &self.enums {
            if e.values.is_empty() {
                return Err(SchemaError::EmptyEnum(e.name.clone()));
            }
            unique("enum value", e.values.iter().map(|v| v.name.as_str()))?;
        }

        let enums: HashSet<&str> = self.enums.iter().map(|e| e.name.as_str()).collect();
        let records: HashMap<&str, bool> = self
            .classes
            .iter()
            .map(|c| (c.name.as_str(), c.record))
            .collect();
        let check = TypeCheck {
            enums: &enums,
            records: &records,
        };

        for class in &self.classes {
            self.check_release(&class.name, &class.since)?;
            self.check_lifecycle(&class.name, &class.lifecycle)?;
            unique("field", class.fields.iter().map(|f| f.name.as_str()))?;

            for field in &class.fields {
                let context = format!("{}.{}", class.name, field.name);
                check.check(&context, &field.ty)?;
                if field.ty == Type::Void {
                    return Err(SchemaError::VoidParam { context });
                }
                if let Some(since) = &field.since {
                    self.check_release(&context, since)?;
                }
                self.check_lifecycle(&context, &field.lifecycle)?;
            }

            for message in &class.messages {
                let context = format!("{}.{}", class.name, message.name);
                check.check(&context, &message.result)?;
                if let Some(since) = &message.since {
                    self.check_release(&context, since)?;
                }
                self.check_lifecycle(&context, &message.lifecycle)?;
                if message.is_async && !message.session {
                    return Err(SchemaError::AsyncWithoutSession { context });
                }
                unique("parameter", message.params.iter().map(|p| p.name.as_str()))?;
                for param in &message.params {
                    let context = format!("{context}({})", param.name);
                    if param.ty == Type::Void {
                        return Err(SchemaError::VoidParam { context });
                    }
                    check.check(&context, &param.ty)?;
                    if let Some(since) = &param.since {
                        self.check_release(&context, since)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_release(&self, context: &str, release: &str) -> Result<(), SchemaError> {
        match self.release_index(release) {
            Some(_) => Ok(()),
            None => Err(SchemaError::UnknownRelease {
                context: context.to_string(),
                release: release.to_string(),
            }),
        }
    }

    fn check_lifecycle(&self, context: &str, lifecycle: &Lifecycle) -> Result<(), SchemaError> {
        match lifecycle {
            Lifecycle::Published => Ok(()),
            Lifecycle::Deprecated { since } | Lifecycle::Removed { since } => {
                self.check_release(context, since)
            }
        }
    }
}

struct TypeCheck<'a> {
    enums: &'a HashSet<&'a str>,
    records: &'a HashMap<&'a str, bool>,
}

impl TypeCheck<'_> {
    fn check(&self, context: &str, ty: &Type) -> Result<(), SchemaError> {
        match ty {
            Type::Ref(class) => self.class(context, class).map(|_| ()),
            Type::Record(class) => {
                if self.class(context, class)? {
                    Ok(())
                } else {
                    Err(SchemaError::NoRecord {
                        context: context.to_string(),
                        class: class.clone(),
                    })
                }
            }
            Type::Enum(name) if !self.enums.contains(name.as_str()) => {
                Err(SchemaError::UnknownEnum {
                    context: context.to_string(),
                    name: name.clone(),
                })
            }
            Type::Set(inner) => self.check(context, inner),
            Type::Map(key, value) => {
                if !matches!(
                    key.as_ref(),
                    Type::String | Type::Int | Type::Ref(_) | Type::Enum(_)
                ) {
                    return Err(SchemaError::InvalidMapKey {
                        context: context.to_string(),
                    });
                }
                self.check(context, key)?;
                self.check(context, value)
            }
            _ => Ok(()),
        }
    }

    /// Whether the class exists with a record.
    fn class(&self, context: &str, class: &str) -> Result<bool, SchemaError> {
        self.records
            .get(class)
            .copied()
            .ok_or_else(|| SchemaError::UnknownClass {
                context: context.to_string(),
                class: class.to_string(),
            })
    }
}

fn unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SchemaError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
