// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use super::Strategy;
use duration_string::DurationString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// First delay, in milliseconds.
    base: u64,
    factor: u64,
    #[schemars(with = "String")]
    max_delay: DurationString,
    jitter: bool,
}

impl Config {
    pub fn new(base: u64, factor: u64, max_delay: Duration, jitter: bool) -> Self {
        Config {
            base,
            factor,
            max_delay: max_delay.into(),
            jitter,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay.into()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base: 2,
            factor: 50,
            max_delay: Duration::from_secs(2).into(),
            jitter: true,
        }
    }
}

impl Strategy for Config {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let ret = ExponentialBackoff::from_millis(self.base)
            .factor(self.factor)
            .max_delay(self.max_delay.into());
        let jitter_flag = self.jitter;

        Box::new(ret.map(move |d| if jitter_flag { jitter(d) } else { d }))
    }
}
