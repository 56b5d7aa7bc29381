// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the sampling engine.

use std::time::Duration;

use log::warn;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Environment variable that overrides the sampling interval, in milliseconds.
pub const INTERVAL_ENV_VAR: &str = "PERF_SAMPLER_INTERVAL_MS";

/// Default time between two ticks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for a [`SamplingEngine`](crate::SamplingEngine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    /// How often the engine reads the metrics provider.
    ///
    /// Default: 1 second
    pub interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl SamplerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sampling interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Builds the default configuration, applying `PERF_SAMPLER_INTERVAL_MS` if it is set.
    ///
    /// Unparseable, zero or out-of-range values are logged and ignored.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(INTERVAL_ENV_VAR) {
            Ok(raw) => match parse_interval_millis(&raw) {
                Some(interval) if validate_interval(interval).is_ok() => {
                    config.with_interval(interval)
                }
                _ => {
                    warn!(
                        "Ignoring {}={:?}: expected a positive number of milliseconds",
                        INTERVAL_ENV_VAR, raw
                    );
                    config
                }
            },
            Err(_) => config,
        }
    }

    /// Checks that the configuration can drive a sampling loop.
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.interval)
    }
}

/// Rejects intervals the ticker cannot schedule: zero, or so large that a
/// deadline two periods ahead is not representable.
pub(crate) fn validate_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::Configuration {
            details: "sampling interval must be greater than zero".to_string(),
        });
    }
    // Each deadline is computed one period past the time the previous tick fired.
    let reachable = interval
        .checked_mul(2)
        .and_then(|span| Instant::now().checked_add(span))
        .is_some();
    if !reachable {
        return Err(Error::Configuration {
            details: format!("sampling interval {interval:?} is too large to schedule"),
        });
    }
    Ok(())
}

fn parse_interval_millis(raw: &str) -> Option<Duration> {
    let millis: u64 = raw.trim().parse().ok()?;
    if millis == 0 {
        None
    } else {
        Some(Duration::from_millis(millis))
    }
}
