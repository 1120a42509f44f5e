// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors raised while encoding or decoding wire values.
///
/// Every variant produced by a (de)serializer carries the call-site path
/// accumulated while descending into the value, e.g.
/// `Bond.create(members)[3]`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    // XML grammar
    #[error("invalid xml: {0}")]
    InvalidXml(String),
    #[error("unexpected element <{element}> inside <{parent}>")]
    UnexpectedElement { element: String, parent: String },
    #[error("unexpected text {text:?} inside <{parent}>")]
    UnexpectedText { text: String, parent: String },
    #[error("missing <{element}> inside <{parent}>")]
    MissingElement { element: String, parent: String },
    #[error("malformed <{element}> content {text:?}")]
    MalformedScalar { element: String, text: String },
    #[error("malformed fault: {0}")]
    MalformedFault(String),

    // Typed (de)serialization
    #[error("{site}: expected {expected}, found {found}")]
    TypeMismatch {
        site: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{site}: unknown {enum_name} label {label:?}")]
    UnknownEnumLabel {
        site: String,
        enum_name: &'static str,
        label: String,
    },
    #[error("{site}: missing required member {member:?}")]
    MissingMember { site: String, member: String },
    #[error("{site}: unexpected member {member:?}")]
    UnexpectedMember { site: String, member: String },
    #[error("{site}: malformed timestamp {value:?}")]
    InvalidTimestamp { site: String, value: String },
    #[error("{site}: null {class} reference is not permitted")]
    NullReference { site: String, class: &'static str },
    #[error("{site}: expected a {expected} reference, found a {found} reference")]
    ReferenceClassMismatch {
        site: String,
        expected: &'static str,
        found: String,
    },
    #[error("{site}: {message}")]
    InvalidValue { site: String, message: String },
}

impl CodecError {
    /// Call-site path of the failure, when the error came from a (de)serializer.
    pub fn site(&self) -> Option<&str> {
        match self {
            CodecError::TypeMismatch { site, .. }
            | CodecError::UnknownEnumLabel { site, .. }
            | CodecError::MissingMember { site, .. }
            | CodecError::UnexpectedMember { site, .. }
            | CodecError::InvalidTimestamp { site, .. }
            | CodecError::NullReference { site, .. }
            | CodecError::ReferenceClassMismatch { site, .. }
            | CodecError::InvalidValue { site, .. } => Some(site),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for CodecError {
    fn from(e: quick_xml::Error) -> Self {
        CodecError::InvalidXml(e.to_string())
    }
}
