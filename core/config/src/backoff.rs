// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod exponential;
pub mod fixedinterval;

use std::time::Duration;

/// Produces the delays between successive retries of a failed call.
pub trait Strategy {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send>;
}
