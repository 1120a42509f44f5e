// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Classes, records, enums and error codes of the API, generated from
//! `schema/xenapi.json` by the build script.

#![allow(
    deprecated,
    unused_imports,
    clippy::too_many_arguments,
    clippy::should_implement_trait
)]

include!(concat!(env!("OUT_DIR"), "/xenapi.rs"));
