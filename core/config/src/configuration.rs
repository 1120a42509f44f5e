// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

/// Implemented by configuration blocks that can be checked before use.
pub trait Configuration {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Validate the configuration
    fn validate(&self) -> Result<(), Self::Error>;
}
