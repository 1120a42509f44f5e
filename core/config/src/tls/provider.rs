// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Once;

use tracing::debug;

static RUSTLS: Once = Once::new();

/// Installs aws-lc-rs as the process-wide rustls crypto provider.
///
/// Safe to call any number of times. If the application installed a
/// provider of its own first, that one is kept.
pub fn initialize_crypto_provider() {
    RUSTLS.call_once(|| {
        if rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed, keeping it");
        }
    });
}
