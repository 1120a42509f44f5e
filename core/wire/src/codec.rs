// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! XML-RPC encoding and decoding.
//!
//! Encoding builds the document text directly. Decoding parses the
//! document into a small element tree with `quick-xml` and then walks the
//! tree against the grammar. Whitespace between structural elements is
//! ignored; any other text or element the grammar does not allow is an
//! error.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::datetime;
use crate::error::CodecError;
use crate::value::{Struct, Value};

/// A `<methodCall>` document.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub params: Vec<Value>,
}

/// Payload of a `<fault>` response.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: i64,
    pub message: String,
}

/// A `<methodResponse>` document.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault(Fault),
}

const XML_DECL: &str = "<?xml version=\"1.0\"?>";

// Encoding

/// Encodes a `<methodCall>` for `method` with positional `params`.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(XML_DECL);
    out.push_str("<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for p in params {
        out.push_str("<param>");
        write_value(p, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Encodes a `<methodResponse>`.
pub fn encode_response(response: &MethodResponse) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(XML_DECL);
    out.push_str("<methodResponse>");
    match response {
        MethodResponse::Success(v) => {
            out.push_str("<params><param>");
            write_value(v, &mut out);
            out.push_str("</param></params>");
        }
        MethodResponse::Fault(f) => {
            let fault = Value::structure([
                ("faultCode", Value::Int(f.code)),
                ("faultString", Value::String(f.message.clone())),
            ]);
            out.push_str("<fault>");
            write_value(&fault, &mut out);
            out.push_str("</fault>");
        }
    }
    out.push_str("</methodResponse>");
    out
}

/// Encodes a single `<value>` element without an XML declaration.
pub fn encode_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Int(i) => {
            // <int> is 32 bits in the base grammar
            if i32::try_from(*i).is_ok() {
                push_scalar(out, "int", &i.to_string());
            } else {
                push_scalar(out, "i8", &i.to_string());
            }
        }
        Value::Double(d) => push_scalar(out, "double", &d.to_string()),
        Value::Boolean(b) => push_scalar(out, "boolean", if *b { "1" } else { "0" }),
        Value::String(s) => push_scalar(out, "string", &escape(s.as_str())),
        Value::DateTime(ts) => push_scalar(out, "dateTime.iso8601", &datetime::format(ts)),
        Value::Base64(bytes) => push_scalar(out, "base64", &STANDARD.encode(bytes)),
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, v) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(v, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn push_scalar(out: &mut String, tag: &str, text: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(text);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

// Decoding

#[derive(Debug)]
struct Element {
    name: String,
    children: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    /// Child elements, rejecting any non-whitespace text between them.
    fn elements(&self) -> Result<Vec<&Element>, CodecError> {
        let mut out = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match child {
                Node::Element(e) => out.push(e),
                Node::Text(t) if t.trim().is_empty() => {}
                Node::Text(t) => {
                    return Err(CodecError::UnexpectedText {
                        text: t.clone(),
                        parent: self.name.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Text content of a leaf element.
    fn text(&self) -> Result<String, CodecError> {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => {
                    return Err(CodecError::UnexpectedElement {
                        element: e.name.clone(),
                        parent: self.name.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// The only child element, which must be named `name`.
    fn single(&self, name: &str) -> Result<&Element, CodecError> {
        let elements = self.elements()?;
        match elements.as_slice() {
            [] => Err(CodecError::MissingElement {
                element: name.to_string(),
                parent: self.name.clone(),
            }),
            [only] if only.name == name => Ok(*only),
            [only] => Err(self.unexpected(only)),
            [first, second, ..] => Err(self.unexpected(if first.name != name {
                first
            } else {
                second
            })),
        }
    }

    fn unexpected(&self, child: &Element) -> CodecError {
        CodecError::UnexpectedElement {
            element: child.name.clone(),
            parent: self.name.clone(),
        }
    }
}

fn parse_document(xml: &str) -> Result<Element, CodecError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push(Element {
                    name,
                    children: Vec::new(),
                });
            }
            Event::Empty(start) => {
                let element = Element {
                    name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                    children: Vec::new(),
                };
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                // quick-xml checks that end tags match
                let element = stack
                    .pop()
                    .ok_or_else(|| CodecError::InvalidXml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                push_text(&mut stack, text)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| CodecError::InvalidXml(e.to_string()))?;
                push_text(&mut stack, text)?;
            }
            Event::Eof => break,
            // declarations, comments, processing instructions
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(CodecError::InvalidXml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| CodecError::InvalidXml("empty document".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), CodecError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(CodecError::InvalidXml(format!(
            "more than one root element (<{}>)",
            element.name
        ))),
    }
}

fn push_text(stack: &mut [Element], text: String) -> Result<(), CodecError> {
    match stack.last_mut() {
        Some(parent) => {
            if let Some(Node::Text(prev)) = parent.children.last_mut() {
                prev.push_str(&text);
            } else {
                parent.children.push(Node::Text(text));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(CodecError::InvalidXml(format!(
            "text outside the root element: {text:?}"
        ))),
    }
}

fn expect_root<'a>(root: &'a Element, name: &str) -> Result<&'a Element, CodecError> {
    if root.name == name {
        Ok(root)
    } else {
        Err(CodecError::UnexpectedElement {
            element: root.name.clone(),
            parent: "document".to_string(),
        })
    }
}

/// Decodes a `<methodResponse>` document.
pub fn decode_response(xml: &str) -> Result<MethodResponse, CodecError> {
    let doc = parse_document(xml)?;
    let root = expect_root(&doc, "methodResponse")?;

    let elements = root.elements()?;
    let body = match elements.as_slice() {
        [only] => *only,
        [] => {
            return Err(CodecError::MissingElement {
                element: "params".to_string(),
                parent: root.name.clone(),
            });
        }
        [_, second, ..] => return Err(root.unexpected(second)),
    };

    match body.name.as_str() {
        "params" => {
            let param = body.single("param")?;
            let value = decode_value_element(param.single("value")?)?;
            Ok(MethodResponse::Success(value))
        }
        "fault" => {
            let value = decode_value_element(body.single("value")?)?;
            decode_fault(value).map(MethodResponse::Fault)
        }
        _ => Err(root.unexpected(body)),
    }
}

fn decode_fault(value: Value) -> Result<Fault, CodecError> {
    let Value::Struct(mut members) = value else {
        return Err(CodecError::MalformedFault(format!(
            "expected a struct, found {}",
            value.kind()
        )));
    };

    let code = match members.remove("faultCode") {
        Some(Value::Int(code)) => code,
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| CodecError::MalformedFault(format!("faultCode {s:?}")))?,
        Some(other) => {
            return Err(CodecError::MalformedFault(format!(
                "faultCode is a {}",
                other.kind()
            )));
        }
        None => return Err(CodecError::MalformedFault("missing faultCode".to_string())),
    };

    let message = match members.remove("faultString") {
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(CodecError::MalformedFault(format!(
                "faultString is a {}",
                other.kind()
            )));
        }
        None => return Err(CodecError::MalformedFault("missing faultString".to_string())),
    };

    Ok(Fault { code, message })
}

/// Decodes a `<methodCall>` document.
pub fn decode_call(xml: &str) -> Result<MethodCall, CodecError> {
    let doc = parse_document(xml)?;
    let root = expect_root(&doc, "methodCall")?;

    let mut method = None;
    let mut params = Vec::new();
    for child in root.elements()? {
        match child.name.as_str() {
            "methodName" if method.is_none() => method = Some(child.text()?.trim().to_string()),
            "params" => {
                for param in child.elements()? {
                    if param.name != "param" {
                        return Err(child.unexpected(param));
                    }
                    params.push(decode_value_element(param.single("value")?)?);
                }
            }
            _ => return Err(root.unexpected(child)),
        }
    }

    let method = method.ok_or_else(|| CodecError::MissingElement {
        element: "methodName".to_string(),
        parent: root.name.clone(),
    })?;
    Ok(MethodCall { method, params })
}

/// Decodes a standalone `<value>` element, as stored in task results.
pub fn decode_value(xml: &str) -> Result<Value, CodecError> {
    let doc = parse_document(xml)?;
    decode_value_element(expect_root(&doc, "value")?)
}

fn decode_value_element(element: &Element) -> Result<Value, CodecError> {
    // bare text inside <value> is a string
    if !has_elements(element) {
        return Ok(Value::String(element.text()?));
    }

    let elements = element.elements()?;
    let typed = match elements.as_slice() {
        [only] => *only,
        [_, second, ..] => return Err(element.unexpected(second)),
        [] => return Ok(Value::String(String::new())),
    };

    match typed.name.as_str() {
        "int" | "i4" | "i8" => {
            let text = typed.text()?;
            text.trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| malformed(typed, &text))
        }
        "boolean" => {
            let text = typed.text()?;
            match text.trim() {
                "1" | "true" => Ok(Value::Boolean(true)),
                "0" | "false" => Ok(Value::Boolean(false)),
                _ => Err(malformed(typed, &text)),
            }
        }
        "double" => {
            let text = typed.text()?;
            text.trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| malformed(typed, &text))
        }
        "string" => Ok(Value::String(typed.text()?)),
        "dateTime.iso8601" => {
            let text = typed.text()?;
            datetime::parse(&text)
                .map(Value::DateTime)
                .ok_or_else(|| malformed(typed, &text))
        }
        "base64" => {
            let text = typed.text()?;
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Base64)
                .map_err(|_| malformed(typed, &text))
        }
        "array" => {
            let data = typed.single("data")?;
            let mut items = Vec::new();
            for item in data.elements()? {
                if item.name != "value" {
                    return Err(data.unexpected(item));
                }
                items.push(decode_value_element(item)?);
            }
            Ok(Value::Array(items))
        }
        "struct" => {
            let mut members = Struct::new();
            for member in typed.elements()? {
                if member.name != "member" {
                    return Err(typed.unexpected(member));
                }
                let (name, value) = decode_member(member)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        _ => Err(element.unexpected(typed)),
    }
}

fn malformed(typed: &Element, text: &str) -> CodecError {
    CodecError::MalformedScalar {
        element: typed.name.clone(),
        text: text.to_string(),
    }
}

fn has_elements(element: &Element) -> bool {
    element
        .children
        .iter()
        .any(|c| matches!(c, Node::Element(_)))
}

fn decode_member(member: &Element) -> Result<(String, Value), CodecError> {
    let mut name = None;
    let mut value = None;
    for child in member.elements()? {
        match child.name.as_str() {
            "name" if name.is_none() => name = Some(child.text()?),
            "value" if value.is_none() => value = Some(decode_value_element(child)?),
            _ => return Err(member.unexpected(child)),
        }
    }

    match (name, value) {
        (Some(name), Some(value)) => Ok((name, value)),
        (None, _) => Err(CodecError::MissingElement {
            element: "name".to_string(),
            parent: "member".to_string(),
        }),
        (_, None) => Err(CodecError::MissingElement {
            element: "value".to_string(),
            parent: "member".to_string(),
        }),
    }
}
