// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! # perf-sampler: In-Process CPU and Memory Sampling
//!
//! `perf-sampler` periodically measures the CPU utilization and memory footprint
//! of the current process and accumulates the readings into two paired,
//! time-ordered series for later inspection by a dashboard, a log exporter or a
//! test harness. Sampling is driven by a single `tokio` task.
//!
//! ## Features
//!
//! - **Idempotent lifecycle**: `start` while running and `stop` while idle are no-ops;
//!   there is never more than one ticker.
//! - **Paired series**: every tick appends one CPU and one memory sample with the
//!   same timestamp, atomically.
//! - **Clean stop**: once `stop` returns, no further sample is appended.
//! - **Resilient ticks**: a failed provider read drops that tick's sample, is
//!   logged, and sampling continues.
//! - **Pluggable provider**: any [`MetricsProvider`] (including a closure) can be
//!   injected; [`ProcessMetricsProvider`] reads the OS.
//!
//! ## Core Concepts
//!
//! - **[`SamplingEngine`]**: owns the Idle/Running state machine, the ticker and the series.
//! - **[`MetricsProvider`]**: returns one [`Reading`] (CPU fraction, memory bytes) per call.
//! - **[`Series`] / [`Sample`]**: append-only, timestamped history of one metric.
//! - **[`RecordingSnapshot`]**: both series copied under one lock.
//! - **[`start_recorder`] / [`stop_recorder`]**: fire-and-forget control of the
//!   process-wide engine returned by [`SamplingEngine::shared`].
//!
//! ## Getting Started
//!
//! ```rust
//! use std::time::Duration;
//! use perf_sampler::{ProviderError, Reading, SamplerConfig, SamplingEngine};
//!
//! #[tokio::main(flavor = "current_thread", start_paused = true)]
//! async fn main() -> perf_sampler::Result<()> {
//!     let provider = || -> Result<Reading, ProviderError> {
//!         Ok(Reading { cpu: 0.5, memory_bytes: 32 << 20 })
//!     };
//!     let config = SamplerConfig::new().with_interval(Duration::from_millis(250));
//!     let engine = SamplingEngine::new(provider, config)?;
//!
//!     engine.start()?;
//!     tokio::time::sleep(Duration::from_millis(800)).await;
//!     engine.stop();
//!
//!     let snapshot = engine.snapshot();
//!     assert_eq!(snapshot.len(), 3);
//!     assert_eq!(snapshot.cpu.mean(), Some(0.5));
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Lifecycle transitions are logged through the `log` facade at `info`, tick
//! internals at `debug`/`trace`, and dropped samples at `warn`. Enable the
//! `tracing` feature to get an instrumented span around each ticker and
//! structured dropped-sample events.

#![warn(missing_docs)]

mod config;
mod dropped;
mod engine;
mod error;
pub mod provider;
pub mod series;
mod shared;

pub use config::{SamplerConfig, DEFAULT_INTERVAL, INTERVAL_ENV_VAR};
pub use engine::{DroppedSampleHook, EngineState, SamplingEngine};
pub use error::{Error, Result};
pub use provider::{MetricsProvider, ProcessMetricsProvider, ProviderError, Reading};
pub use series::{RecordingSnapshot, Sample, SampleValue, Series};
pub use shared::{start_recorder, stop_recorder};
