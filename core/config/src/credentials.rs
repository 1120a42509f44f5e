// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::opaque::OpaqueString;

/// Static username and password used for `session.login_with_password`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Credentials {
    /// The user the client logs in as.
    username: String,

    /// The password for the username.
    password: OpaqueString,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Credentials {
            username: username.to_string(),
            password: OpaqueString::new(password),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &OpaqueString {
        &self.password
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        Ok(())
    }
}
