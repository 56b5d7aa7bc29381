// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Sample Series
//!
//! This module holds the data the sampling engine accumulates: timestamped
//! [`Sample`]s collected into append-only [`Series`], plus the paired
//! [`RecordingSnapshot`] handed to consumers.
//!
//! # Ownership
//!
//! The engine is the only writer. Every accessor hands out an owned copy, so a
//! consumer (logger, exporter, UI) can iterate at leisure without holding any
//! engine lock.
//!
//! # Example
//!
//! ```rust,ignore
//! let cpu = engine.cpu_series();
//! if let Some(latest) = cpu.latest() {
//!     println!("cpu {:.1}% at {:?}", latest.value() * 100.0, latest.at());
//! }
//! println!("peak rss: {:?}", engine.memory_series().peak().map(|s| s.value()));
//! ```

mod sample;
mod snapshot;

pub use sample::{Sample, SampleValue, Series};
pub use snapshot::RecordingSnapshot;
