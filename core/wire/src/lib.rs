// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Wire layer of the XenAPI SDK: the XML-RPC value model, its codec and the
//! building blocks the generated (de)serializers are made of.

pub mod callsite;
pub mod codec;
pub mod datetime;
pub mod enums;
pub mod error;
pub mod marshal;
pub mod record;
pub mod reference;
pub mod value;

pub use callsite::{CallSite, DecodeMode};
pub use codec::{Fault, MethodCall, MethodResponse};
pub use enums::UnknownLabel;
pub use error::CodecError;
pub use marshal::{MapKey, Marshal, Unmarshal, decode};
pub use record::{Record, RecordReader, RecordWriter};
pub use reference::{NULL_REF, Reference, check_class, check_result_class, require_non_null};
pub use value::{Struct, Value};
