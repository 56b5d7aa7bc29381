// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Metrics providers.
//!
//! A [`MetricsProvider`] is the OS-facing capability the engine queries once
//! per tick. The engine only depends on the trait; [`ProcessMetricsProvider`]
//! is the implementation used by the shared instance.
//!
//! Closures returning `Result<Reading, ProviderError>` implement the trait, which
//! keeps scripted providers in tests short:
//!
//! ```rust
//! use perf_sampler::{MetricsProvider, ProviderError, Reading};
//!
//! let fixed = || -> Result<Reading, ProviderError> {
//!     Ok(Reading { cpu: 0.5, memory_bytes: 4096 })
//! };
//! assert_eq!(fixed.sample().unwrap().memory_bytes, 4096);
//! ```

mod process;

pub use process::ProcessMetricsProvider;

/// One point-in-time reading for the monitored process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// CPU utilization as a fraction of one core (1.0 = one fully busy core).
    pub cpu: f64,
    /// Memory footprint in bytes.
    pub memory_bytes: u64,
}

/// Errors a provider can report for a single reading.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderError {
    /// The underlying OS facility could not be queried.
    Unavailable {
        /// Additional context about the failure
        details: String,
    },
}

impl ProviderError {
    /// Shorthand for [`ProviderError::Unavailable`].
    pub fn unavailable(details: impl Into<String>) -> Self {
        ProviderError::Unavailable {
            details: details.into(),
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Unavailable { details } => write!(f, "unavailable: {details}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Source of CPU and memory readings.
///
/// `sample` is called from the engine's ticker task, once per tick, and never
/// concurrently with itself for one engine. It should be synchronous and cheap
/// relative to the sampling interval; a read slower than the interval delays
/// the following ticks.
///
/// The call may block briefly, e.g. on a `/proc` read. On a multi-thread Tokio
/// runtime it runs inside [`tokio::task::block_in_place`], so other tasks keep
/// being served. On a current-thread runtime it runs inline and holds the
/// runtime for its duration.
pub trait MetricsProvider: Send + Sync + 'static {
    /// Reads the current CPU utilization and memory footprint.
    fn sample(&self) -> Result<Reading, ProviderError>;

    /// Name of this provider for logging.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> MetricsProvider for F
where
    F: Fn() -> Result<Reading, ProviderError> + Send + Sync + 'static,
{
    fn sample(&self) -> Result<Reading, ProviderError> {
        self()
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_provider() {
        let failing = || -> Result<Reading, ProviderError> {
            Err(ProviderError::unavailable("no /proc"))
        };
        assert_eq!(failing.name(), "closure");
        assert_eq!(
            failing.sample().unwrap_err().to_string(),
            "unavailable: no /proc"
        );
    }
}
