// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::provider::initialize_crypto_provider;
use super::root_store_builder::RootStoreBuilder;
use crate::configuration::Configuration;
use crate::errors::ConfigError;

/// Server certificate verification policy.
///
/// Verification is on by default. Turning it off is only possible through
/// the `insecure_skip_verify` option, so the insecure mode is visible in
/// configuration files and logs.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, JsonSchema)]
pub struct TlsClientConfig {
    /// Accept any server certificate.
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Path to a PEM bundle of additional trust roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,

    /// In memory PEM bundle of additional trust roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_pem: Option<String>,

    /// If true, also trust the platform root certificates.
    #[serde(default = "default_include_system_ca_certs_pool")]
    pub include_system_ca_certs_pool: bool,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        TlsClientConfig {
            insecure_skip_verify: false,
            ca_file: None,
            ca_pem: None,
            include_system_ca_certs_pool: default_include_system_ca_certs_pool(),
        }
    }
}

fn default_include_system_ca_certs_pool() -> bool {
    true
}

impl Configuration for TlsClientConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.insecure_skip_verify && (self.ca_file.is_some() || self.ca_pem.is_some()) {
            return Err(ConfigError::InsecureWithCustomRoots);
        }
        Ok(())
    }
}

impl TlsClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable server certificate verification.
    pub fn insecure() -> Self {
        TlsClientConfig {
            insecure_skip_verify: true,
            ..Default::default()
        }
    }

    pub fn with_insecure_skip_verify(self, insecure_skip_verify: bool) -> Self {
        TlsClientConfig {
            insecure_skip_verify,
            ..self
        }
    }

    pub fn with_ca_file(self, ca_file: &str) -> Self {
        TlsClientConfig {
            ca_file: Some(ca_file.to_string()),
            ..self
        }
    }

    pub fn with_ca_pem(self, ca_pem: &str) -> Self {
        TlsClientConfig {
            ca_pem: Some(ca_pem.to_string()),
            ..self
        }
    }

    pub fn with_include_system_ca_certs_pool(self, include_system_ca_certs_pool: bool) -> Self {
        TlsClientConfig {
            include_system_ca_certs_pool,
            ..self
        }
    }

    /// Builds the rustls client configuration, or `None` when verification
    /// is disabled and the transport must accept any certificate.
    pub fn load_rustls_config(&self) -> Result<Option<Arc<rustls::ClientConfig>>, ConfigError> {
        self.validate()?;
        initialize_crypto_provider();

        if self.insecure_skip_verify {
            warn!("TLS server certificate verification is disabled (insecure_skip_verify)");
            return Ok(None);
        }

        let mut builder = RootStoreBuilder::new();
        if self.include_system_ca_certs_pool {
            builder = builder.with_system_roots();
        }
        if let Some(path) = &self.ca_file {
            builder = builder.add_file(path)?;
        }
        if let Some(pem) = &self.ca_pem {
            builder = builder.add_pem(pem)?;
        }
        let roots = builder.finish()?;

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Some(Arc::new(config)))
    }
}
