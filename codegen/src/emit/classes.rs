// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use super::Code;
use super::types;
use crate::model::{Arity, ClassSurface, MessageSurface};
use crate::names;
use crate::schema::{Field, Lifecycle, Schema, Type};

pub(crate) fn emit(code: &mut Code, schema: &Schema, surface: &ClassSurface<'_>) {
    let class = surface.class;
    code.blank();
    code.line(format!("// {}", class.name));

    emit_reference(code, surface);
    if class.record {
        emit_record(code, surface);
    }
    emit_namespace(code, schema, surface);
}

fn emit_reference(code: &mut Code, surface: &ClassSurface<'_>) {
    let class = surface.class;
    let secret = if class.secret { "secret " } else { "" };
    code.blank();
    code.open("xenapi_wire::reference!");
    code.doc(&format!("A reference to a {} object.", class.name));
    code.line(format!(
        "pub {secret}struct {} => {:?};",
        names::ref_name(&class.name),
        class.name
    ));
    code.close();
}

/// Fields that may be absent and have no zero value are `Option`s.
fn field_type(field: &Field) -> String {
    let owned = types::owned(&field.ty);
    if field.optional && !types::has_default(&field.ty) {
        format!("Option<{owned}>")
    } else {
        owned
    }
}

fn deprecated(code: &mut Code, lifecycle: &Lifecycle) {
    if let Lifecycle::Deprecated { since } = lifecycle {
        code.line(format!(
            "#[deprecated(since = {since:?}, note = \"deprecated by the server API\")]"
        ));
    }
}

fn emit_record(code: &mut Code, surface: &ClassSurface<'_>) {
    let class = surface.class;
    let record = names::record_name(&class.name);

    code.blank();
    code.doc(&class.doc);
    code.line("#[derive(Debug, Clone, PartialEq)]");
    code.open(format!("pub struct {record}"));
    for field in &surface.fields {
        code.doc(&field.doc);
        deprecated(code, &field.lifecycle);
        code.line(format!("pub {}: {},", names::ident(&field.name), field_type(field)));
    }
    code.close();

    code.blank();
    code.open(format!("impl Marshal for {record}"));
    code.open("fn marshal(&self, site: &CallSite) -> Result<Value, CodecError>");
    code.line("let mut w = RecordWriter::new(site);");
    for field in &surface.fields {
        let method = if field.optional && !types::has_default(&field.ty) {
            "optional"
        } else {
            "member"
        };
        code.line(format!(
            "w.{method}({:?}, &self.{})?;",
            field.name,
            names::ident(&field.name)
        ));
    }
    code.line("Ok(w.finish())");
    code.close();
    code.close();

    code.blank();
    code.open(format!("impl Unmarshal for {record}"));
    code.open("fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError>");
    code.line("let mut r = RecordReader::new(value, site)?;");
    code.open(format!("let record = {record}"));
    for field in &surface.fields {
        let method = if field.optional { "optional" } else { "required" };
        code.line(format!(
            "{}: r.{method}({:?})?,",
            names::ident(&field.name),
            field.name
        ));
    }
    code.close_with("};");
    code.line("r.finish()?;");
    code.line("Ok(record)");
    code.close();
    code.close();

    code.blank();
    code.open(format!("impl xenapi_wire::Record for {record}"));
    code.line(format!("const CLASS: &'static str = {:?};", class.name));
    code.close();
}

fn emit_namespace(code: &mut Code, schema: &Schema, surface: &ClassSurface<'_>) {
    let class = surface.class;
    let namespace = names::namespace_name(&class.name);

    code.blank();
    code.doc(&class.doc);
    code.line("#[derive(Debug, Clone, Copy, Default)]");
    code.line(format!("pub struct {namespace};"));

    if surface.messages.is_empty() {
        return;
    }

    code.blank();
    code.open(format!("impl {namespace}"));
    let mut first = true;
    for message in &surface.messages {
        for variant in [Variant::Sync, Variant::Async] {
            if variant == Variant::Async && !message.message.is_async {
                continue;
            }
            if !first {
                code.blank();
            }
            first = false;
            emit_canonical(code, schema, message, variant);
            for arity in &message.arities {
                code.blank();
                emit_arity(code, schema, message, arity, variant);
            }
        }
    }
    code.close();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Sync,
    Async,
}

impl Variant {
    fn fn_name(self, message: &MessageSurface) -> String {
        match self {
            Variant::Sync => message.fn_name(),
            Variant::Async => format!("async_{}", message.fn_name()),
        }
    }

    fn result(self, message: &MessageSurface) -> String {
        let owned = types::owned(&message.message.result);
        match self {
            Variant::Sync => owned,
            Variant::Async => format!("PendingTask<{owned}>"),
        }
    }
}

fn signature(message: &MessageSurface, arity: &Arity, name: &str, result: &str) -> String {
    let mut params = vec!["session: &Session".to_string()];
    for &i in &arity.params {
        let p = &message.message.params[i];
        params.push(format!("{}: {}", names::param_ident(&p.name), types::param(&p.ty)));
    }
    format!(
        "pub async fn {name}({}) -> Result<{result}, Error>",
        params.join(", ")
    )
}

fn call_args(message: &MessageSurface, arity: &Arity) -> String {
    let mut args = vec!["session".to_string()];
    args.extend(
        arity
            .params
            .iter()
            .map(|&i| names::param_ident(&message.message.params[i].name)),
    );
    args.join(", ")
}

fn emit_docs(code: &mut Code, schema: &Schema, message: &MessageSurface, release: usize, variant: Variant) {
    let mut doc = message.message.doc.clone();
    if variant == Variant::Async {
        doc = format!(
            "Asynchronous form of [`Self::{}`]: returns the task running the call.\n\n{doc}",
            message.fn_name()
        );
    }
    code.doc(&doc);
    if !doc.trim().is_empty() {
        code.line("///");
    }
    code.line(format!("/// Since: {}", schema.releases[release].code_name));

    if !message.message.errors.is_empty() {
        code.line("///");
        code.line("/// # Errors");
        code.line("///");
        for error in &message.message.errors {
            match schema
                .error_code(error)
                .map(|e| e.doc.trim().lines().next().unwrap_or_default())
            {
                Some(text) if !text.is_empty() => code.line(format!("/// * `{error}` - {text}")),
                _ => code.line(format!("/// * `{error}`")),
            }
        }
    }
    if let Some(since) = &message.deprecated {
        code.line(format!(
            "#[deprecated(since = {since:?}, note = \"deprecated by the server API\")]"
        ));
    }
}

/// The unsuffixed method: the latest arity, or a dispatch on the server
/// version when the message changed arity over time.
fn emit_canonical(code: &mut Code, schema: &Schema, message: &MessageSurface, variant: Variant) {
    let name = variant.fn_name(message);
    let latest = message.latest();
    emit_docs(code, schema, message, latest.release, variant);
    code.open(signature(message, latest, &name, &variant.result(message)));

    if message.arities.len() == 1 {
        code.line(format!(
            "Self::{name}{}({}).await",
            latest.count,
            call_args(message, latest)
        ));
        code.close();
        return;
    }

    let wire = message.wire_name();
    code.open("match session.api_version()");
    let newest_first: Vec<&Arity> = message.arities.iter().rev().collect();
    for (n, arity) in newest_first.iter().enumerate() {
        let call = format!("Self::{name}{}({}).await", arity.count, call_args(message, arity));
        let oldest = n + 1 == newest_first.len();
        let guard = if oldest {
            "v".to_string()
        } else {
            format!(
                "v if v >= ApiVersion::{}",
                names::release_variant(&schema.releases[arity.release].code_name)
            )
        };

        if n == 0 {
            code.line(format!("{guard} => {call},"));
            continue;
        }

        let dropped: Vec<String> = latest
            .params
            .iter()
            .filter(|&&i| !arity.params.contains(&i))
            .map(|&i| format!("{:?}", message.message.params[i].name))
            .collect();
        code.open(format!("{guard} =>"));
        code.line(format!("dropped_params({wire:?}, v, &[{}]);", dropped.join(", ")));
        code.line(call);
        code.close();
    }
    code.close();
    code.close();
}

fn emit_arity(code: &mut Code, schema: &Schema, message: &MessageSurface, arity: &Arity, variant: Variant) {
    let name = format!("{}{}", variant.fn_name(message), arity.count);
    let wire = message.wire_name();
    let site_name = match variant {
        Variant::Sync => wire.clone(),
        Variant::Async => format!("Async.{wire}"),
    };

    emit_docs(code, schema, message, arity.release, variant);
    code.open(signature(message, arity, &name, &variant.result(message)));
    code.line(format!("let site = session.call_site({site_name:?});"));

    for &i in &arity.params {
        let p = &message.message.params[i];
        if matches!(p.ty, Type::Ref(_)) && !p.nullable {
            code.line(format!(
                "require_non_null({}, &site.arg({:?}))?;",
                names::param_ident(&p.name),
                p.name
            ));
        }
    }

    if arity.params.is_empty() {
        code.line("let args = Vec::new();");
    } else {
        code.indent("let args = vec![");
        for &i in &arity.params {
            let p = &message.message.params[i];
            code.line(format!(
                "{}.marshal(&site.arg({:?}))?,",
                names::param_ident(&p.name),
                p.name
            ));
        }
        code.close_with("];");
    }

    let call = match (variant, message.message.session) {
        (Variant::Sync, true) => "call",
        (Variant::Sync, false) => "call_anonymous",
        // rejected by schema validation
        (Variant::Async, _) => "submit",
    };
    code.line(format!("session.{call}({wire:?}, &site, args).await"));
    code.close();
}
