// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Assembles a `rustls::RootCertStore` from the system roots, PEM strings
//! and PEM files.
//!
//! ```ignore
//! let store = RootStoreBuilder::new()
//!     .with_system_roots()
//!     .add_file("/etc/xapi/pool-ca.pem")?
//!     .finish()?;
//! ```

use std::path::Path;

use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, pem::PemObject};
use tracing::warn;

use crate::errors::ConfigError;

/// Builder for constructing a RootCertStore from multiple certificate sources.
pub struct RootStoreBuilder {
    store: RootCertStore,
    include_system: bool,
}

impl Default for RootStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RootStoreBuilder {
    pub fn new() -> Self {
        Self {
            store: RootCertStore::empty(),
            include_system: false,
        }
    }

    /// Load the platform roots when `finish()` is called.
    pub fn with_system_roots(mut self) -> Self {
        self.include_system = true;
        self
    }

    /// Add every certificate of a PEM bundle file.
    pub fn add_file(mut self, path: &str) -> Result<Self, ConfigError> {
        let iter = CertificateDer::pem_file_iter(Path::new(path))?;
        for item in iter {
            self.store.add(item?).map_err(ConfigError::RootStore)?;
        }
        Ok(self)
    }

    /// Add every certificate of a PEM string.
    pub fn add_pem(mut self, data: &str) -> Result<Self, ConfigError> {
        for item in CertificateDer::pem_slice_iter(data.as_bytes()) {
            self.store.add(item?).map_err(ConfigError::RootStore)?;
        }
        Ok(self)
    }

    pub fn finish(mut self) -> Result<RootCertStore, ConfigError> {
        if self.include_system {
            let native = rustls_native_certs::load_native_certs();
            for e in &native.errors {
                warn!(error = %e, "could not load some system root certificates");
            }
            // a broken system bundle must not prevent using the custom roots
            let (added, ignored) = self.store.add_parsable_certificates(native.certs);
            if ignored > 0 {
                warn!(added, ignored, "ignored unparsable system root certificates");
            }
        }

        if self.store.is_empty() {
            return Err(ConfigError::NoTrustRoots);
        }
        Ok(self.store)
    }
}
