// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{Shared, TickOutcome};
use crate::provider::{ProviderError, Reading};

/// Periodic sampling loop of one session.
///
/// The first tick fires at `first_deadline`, one `period` after the session
/// started. Ticks are strictly sequential: the next deadline is awaited only once
/// the previous read and append are done, and a late tick delays the schedule
/// instead of bursting to catch up. The loop ends as soon as the engine reports
/// the session as stale; `stop` also aborts the task at its next await point.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "sampler", skip(shared, first_deadline))
)]
pub(super) async fn run(
    shared: Arc<Shared>,
    generation: u64,
    first_deadline: Instant,
    period: Duration,
) {
    let mut interval = time::interval_at(first_deadline, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("Sampler ticker for session {generation} running every {period:?}");

    loop {
        let deadline = interval.tick().await;
        let reading = read_provider(&shared);

        match shared.record(generation, deadline, reading) {
            TickOutcome::Recorded => trace!("Sampler session {generation} recorded a sample"),
            TickOutcome::Dropped => {}
            TickOutcome::Stale => break,
        }
    }

    debug!("Sampler ticker for session {generation} finished");
}

/// Calls the provider once, turning a panic into an unavailable reading.
///
/// On a multi-thread runtime the call goes through `block_in_place`, so a
/// provider doing file or syscall I/O does not hold up the other tasks of the
/// worker. A current-thread runtime has no other worker to hand them to.
fn read_provider(shared: &Shared) -> Result<Reading, ProviderError> {
    let provider = shared.provider();
    let read = || {
        std::panic::catch_unwind(AssertUnwindSafe(|| provider.sample())).unwrap_or_else(|_| {
            Err(ProviderError::unavailable(format!(
                "provider '{}' panicked",
                provider.name()
            )))
        })
    };

    match Handle::current().runtime_flavor() {
        RuntimeFlavor::MultiThread => tokio::task::block_in_place(read),
        _ => read(),
    }
}
