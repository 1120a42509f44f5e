// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use duration_string::DurationString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{FixedInterval, jitter};

use super::Strategy;

/// Waits the same time before every retry.
///
/// With `jitter` each delay is drawn uniformly from `(0, interval]`, which
/// spreads out clients that failed together, e.g. during a pool master
/// failover.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct Config {
    #[schemars(with = "String")]
    interval: DurationString,
    jitter: bool,
}

impl Config {
    pub fn new(interval: Duration) -> Self {
        Config {
            interval: interval.into(),
            jitter: false,
        }
    }

    pub fn with_jitter(self, jitter: bool) -> Self {
        Config { jitter, ..self }
    }

    pub fn interval(&self) -> Duration {
        self.interval.into()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(Duration::from_millis(200))
    }
}

impl Strategy for Config {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let delays = FixedInterval::new(self.interval());
        if self.jitter {
            Box::new(delays.map(jitter))
        } else {
            Box::new(delays)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_delays() {
        let cfg = Config::new(Duration::from_millis(30));
        let delays: Vec<_> = cfg.get_strategy().take(3).collect();
        assert_eq!(delays, vec![Duration::from_millis(30); 3]);
    }

    #[test]
    fn test_jittered_delays_stay_below_interval() {
        let cfg = Config::new(Duration::from_millis(30)).with_jitter(true);
        for d in cfg.get_strategy().take(20) {
            assert!(d <= Duration::from_millis(30));
        }
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"interval": "50ms"}"#).unwrap();
        assert_eq!(cfg.interval(), Duration::from_millis(50));
        assert!(!cfg.jitter);

        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
    }
}
