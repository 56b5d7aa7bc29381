// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Process-wide sampler.
//!
//! The shared engine is created on first use, reads the current process through
//! [`ProcessMetricsProvider`], takes its interval from
//! [`SamplerConfig::from_env`], and lives until the process exits.
//!
//! ```rust,no_run
//! use perf_sampler::{start_recorder, stop_recorder, SamplingEngine};
//!
//! start_recorder();
//! // ... run the workload ...
//! stop_recorder();
//!
//! let snapshot = SamplingEngine::shared().snapshot();
//! println!("{} samples, peak rss {:?}", snapshot.len(), snapshot.memory.peak());
//! ```

use std::sync::{Arc, OnceLock};

use log::error;

use crate::{ProcessMetricsProvider, SamplerConfig, SamplingEngine};

static SHARED: OnceLock<SamplingEngine> = OnceLock::new();

impl SamplingEngine {
    /// Returns the process-wide engine, creating it on first call.
    pub fn shared() -> &'static SamplingEngine {
        SHARED.get_or_init(|| {
            SamplingEngine::from_parts(
                Arc::new(ProcessMetricsProvider::new()),
                SamplerConfig::from_env(),
            )
        })
    }
}

/// Starts the shared sampler. Errors are logged, never returned.
pub fn start_recorder() {
    if let Err(e) = SamplingEngine::shared().start() {
        error!("Failed to start the shared sampler: {e}");
    }
}

/// Stops the shared sampler.
pub fn stop_recorder() {
    SamplingEngine::shared().stop();
}
