// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Dropped Sample Reporting
//!
//! A dropped sample is a tick whose metrics provider could not produce a reading,
//! for example because an OS call failed. The tick is not recorded in either
//! series, the engine keeps running, and the miss is reported here.
//!
//! # Observability
//!
//! Every dropped sample is logged at `warn` level. With the `tracing` feature the
//! event carries structured fields instead:
//!
//! ```text
//! WARN perf_sampler::dropped: Dropped sample: metrics provider unavailable
//!   sampler.tick=2
//!   sampler.reason="Metrics provider 'process' is unavailable: unavailable: getrusage failed"
//! ```
//!
//! Consumers that need the miss programmatically install a hook with
//! [`SamplingEngine::set_dropped_sample_hook`](crate::SamplingEngine::set_dropped_sample_hook)
//! or poll [`SamplingEngine::dropped_samples`](crate::SamplingEngine::dropped_samples).

use crate::Error;

/// Logs a dropped sample.
///
/// `tick` is the engine's tick number since the last reset.
#[cold]
pub(crate) fn record(tick: u64, error: &Error) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        sampler.tick = tick,
        sampler.reason = %error,
        "Dropped sample: metrics provider unavailable"
    );

    #[cfg(not(feature = "tracing"))]
    log::warn!("Dropped sample on tick {}: {}", tick, error);
}
