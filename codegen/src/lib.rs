// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Generates the Rust surface of the XenAPI from its JSON schema: object
//! references, records, enums, the error table, the release table and the
//! message stubs with their arity variants.
//!
//! The SDK runs [`generate`] from its build script. The `xenapi-codegen`
//! binary does the same from the command line.

mod emit;
pub mod model;
pub mod names;
pub mod schema;

pub use emit::generate;
pub use schema::{Schema, SchemaError, load_schema};
