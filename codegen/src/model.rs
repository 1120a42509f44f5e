// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Schema to surface mapping.
//!
//! A class surface is the list of messages the class exposes: the explicit
//! ones from the schema plus the accessors implied by its fields. Each
//! message is broken down into the arities it had across releases.

use std::collections::HashSet;

use crate::names;
use crate::schema::{Class, Field, Lifecycle, Message, Param, Qualifier, Schema, SchemaError, Type};

/// One callable shape of a message: the parameters available from `release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arity {
    /// Index into the release table.
    pub release: usize,
    /// Indices into the message parameters, in call order.
    pub params: Vec<usize>,
    /// Number of wire arguments, session included.
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct MessageSurface {
    pub class: String,
    pub message: Message,
    /// Index into the release table.
    pub since: usize,
    pub deprecated: Option<String>,
    /// Oldest first. The last one is the canonical arity.
    pub arities: Vec<Arity>,
    pub implicit: bool,
}

impl MessageSurface {
    pub fn wire_name(&self) -> String {
        format!("{}.{}", self.class, self.message.name)
    }

    pub fn fn_name(&self) -> String {
        names::ident(&self.message.name)
    }

    pub fn latest(&self) -> &Arity {
        // arities is never empty
        &self.arities[self.arities.len() - 1]
    }
}

#[derive(Debug, Clone)]
pub struct ClassSurface<'s> {
    pub class: &'s Class,
    pub since: usize,
    /// Fields that are not removed.
    pub fields: Vec<&'s Field>,
    pub messages: Vec<MessageSurface>,
}

pub fn build(schema: &Schema) -> Result<Vec<ClassSurface<'_>>, SchemaError> {
    let mut classes = Vec::new();
    for class in schema.classes.iter().filter(|c| !c.lifecycle.is_removed()) {
        classes.push(class_surface(schema, class)?);
    }
    Ok(classes)
}

fn class_surface<'s>(schema: &Schema, class: &'s Class) -> Result<ClassSurface<'s>, SchemaError> {
    let since = release(schema, &class.name, Some(&class.since), 0)?;
    let fields: Vec<&Field> = class
        .fields
        .iter()
        .filter(|f| !f.lifecycle.is_removed())
        .collect();

    let explicit: HashSet<&str> = class.messages.iter().map(|m| m.name.as_str()).collect();
    let mut messages = Vec::new();

    for message in &class.messages {
        if message.lifecycle.is_removed() {
            continue;
        }
        messages.push(message_surface(schema, class, message.clone(), since, false)?);
    }

    for message in implicit_messages(class, &fields) {
        if explicit.contains(message.name.as_str()) || class.omit.contains(&message.name) {
            continue;
        }
        messages.push(message_surface(schema, class, message, since, true)?);
    }

    // every generated function name must be unique within the namespace
    let mut seen = HashSet::new();
    for m in &messages {
        let base = m.fn_name();
        let mut generated = vec![base.clone()];
        generated.extend(m.arities.iter().map(|a| format!("{base}{}", a.count)));
        if m.message.is_async {
            generated.push(format!("async_{base}"));
            generated.extend(m.arities.iter().map(|a| format!("async_{base}{}", a.count)));
        }
        for name in generated {
            if !seen.insert(name.clone()) {
                return Err(SchemaError::Duplicate {
                    kind: "method",
                    name: format!("{}.{name}", class.name),
                });
            }
        }
    }

    Ok(ClassSurface {
        class,
        since,
        fields,
        messages,
    })
}

fn message_surface(
    schema: &Schema,
    class: &Class,
    message: Message,
    class_since: usize,
    implicit: bool,
) -> Result<MessageSurface, SchemaError> {
    let context = format!("{}.{}", class.name, message.name);
    let since = release(schema, &context, message.since.as_deref(), class_since)?;

    let mut param_since = Vec::with_capacity(message.params.len());
    for p in &message.params {
        let context = format!("{context}({})", p.name);
        // a parameter cannot predate its message
        param_since.push(release(schema, &context, p.since.as_deref(), since)?.max(since));
    }

    let mut releases: Vec<usize> = param_since.clone();
    releases.push(since);
    releases.sort_unstable();
    releases.dedup();

    let session = usize::from(message.session);
    let arities = releases
        .into_iter()
        .map(|release| {
            let params: Vec<usize> = param_since
                .iter()
                .enumerate()
                .filter(|(_, s)| **s <= release)
                .map(|(i, _)| i)
                .collect();
            Arity {
                release,
                count: params.len() + session,
                params,
            }
        })
        .collect();

    let deprecated = match &message.lifecycle {
        Lifecycle::Deprecated { since } => Some(since.clone()),
        _ => None,
    };

    Ok(MessageSurface {
        class: class.name.clone(),
        message,
        since,
        deprecated,
        arities,
        implicit,
    })
}

fn release(
    schema: &Schema,
    context: &str,
    code_name: Option<&str>,
    default: usize,
) -> Result<usize, SchemaError> {
    match code_name {
        None => Ok(default),
        Some(name) => schema
            .release_index(name)
            .ok_or_else(|| SchemaError::UnknownRelease {
                context: context.to_string(),
                release: name.to_string(),
            }),
    }
}

fn param(name: &str, ty: Type, doc: &str) -> Param {
    Param {
        name: name.to_string(),
        ty,
        since: None,
        nullable: false,
        doc: doc.to_string(),
    }
}

fn implicit(name: String, doc: String, params: Vec<Param>, result: Type, since: Option<String>) -> Message {
    Message {
        name,
        doc,
        params,
        result,
        is_async: false,
        session: true,
        since,
        lifecycle: Lifecycle::Published,
        errors: Vec::new(),
    }
}

/// Messages implied by the class fields.
fn implicit_messages(class: &Class, fields: &[&Field]) -> Vec<Message> {
    if !class.record || !class.accessors {
        return Vec::new();
    }

    let this = Type::Ref(class.name.clone());
    let self_param = || param("self", this.clone(), "reference to the object");
    let mut out = Vec::new();

    out.push(implicit(
        "get_record".to_string(),
        format!("Get a record containing the current state of the given {}.", class.name),
        vec![self_param()],
        Type::Record(class.name.clone()),
        None,
    ));

    if class.field("uuid").is_some() {
        out.push(implicit(
            "get_by_uuid".to_string(),
            format!("Get a reference to the {} instance with the specified UUID.", class.name),
            vec![param("uuid", Type::String, "UUID of object to return")],
            this.clone(),
            None,
        ));
    }

    if class.get_all {
        out.push(implicit(
            "get_all".to_string(),
            format!("Return a list of all the {}s known to the system.", class.name),
            Vec::new(),
            Type::Set(Box::new(this.clone())),
            None,
        ));
        out.push(implicit(
            "get_all_records".to_string(),
            format!(
                "Return a map of {0} references to {0} records for all {0}s known to the system.",
                class.name
            ),
            Vec::new(),
            Type::Map(
                Box::new(this.clone()),
                Box::new(Type::Record(class.name.clone())),
            ),
            None,
        ));
    }

    if class.field("name_label").is_some() {
        out.push(implicit(
            "get_by_name_label".to_string(),
            format!("Get all the {} instances with the given label.", class.name),
            vec![param("label", Type::String, "label of object to return")],
            Type::Set(Box::new(this.clone())),
            None,
        ));
    }

    if class.constructor {
        out.push(implicit(
            "create".to_string(),
            format!("Create a new {} instance, and return its handle.", class.name),
            vec![param(
                "args",
                Type::Record(class.name.clone()),
                "All constructor arguments",
            )],
            this.clone(),
            None,
        ));
        out.push(implicit(
            "destroy".to_string(),
            format!("Destroy the specified {} instance.", class.name),
            vec![self_param()],
            Type::Void,
            None,
        ));
    }

    for field in fields {
        let doc = if field.doc.is_empty() {
            field.name.clone()
        } else {
            field.doc.clone()
        };
        out.push(implicit(
            format!("get_{}", field.name),
            format!("Get the {} field of the given {}.", field.name, class.name),
            vec![self_param()],
            field.ty.clone(),
            field.since.clone(),
        ));

        if field.qualifier != Qualifier::Rw {
            continue;
        }

        out.push(implicit(
            format!("set_{}", field.name),
            format!("Set the {} field of the given {}.", field.name, class.name),
            vec![self_param(), param("value", field.ty.clone(), &doc)],
            Type::Void,
            field.since.clone(),
        ));

        match &field.ty {
            Type::Map(key, value) => {
                out.push(implicit(
                    format!("add_to_{}", field.name),
                    format!(
                        "Add the given key-value pair to the {} field of the given {}.",
                        field.name, class.name
                    ),
                    vec![
                        self_param(),
                        param("key", key.as_ref().clone(), "Key to add"),
                        param("value", value.as_ref().clone(), "Value to add"),
                    ],
                    Type::Void,
                    field.since.clone(),
                ));
                out.push(implicit(
                    format!("remove_from_{}", field.name),
                    format!(
                        "Remove the given key and its corresponding value from the {} field of the given {}.",
                        field.name, class.name
                    ),
                    vec![self_param(), param("key", key.as_ref().clone(), "Key to remove")],
                    Type::Void,
                    field.since.clone(),
                ));
            }
            Type::Set(element) => {
                out.push(implicit(
                    format!("add_{}", field.name),
                    format!("Add the given value to the {} field of the given {}.", field.name, class.name),
                    vec![self_param(), param("value", element.as_ref().clone(), "New value to add")],
                    Type::Void,
                    field.since.clone(),
                ));
                out.push(implicit(
                    format!("remove_{}", field.name),
                    format!(
                        "Remove the given value from the {} field of the given {}.",
                        field.name, class.name
                    ),
                    vec![self_param(), param("value", element.as_ref().clone(), "Value to remove")],
                    Type::Void,
                    field.since.clone(),
                ));
            }
            _ => {}
        }
    }

    out
}
