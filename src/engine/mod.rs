// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! The sampling engine.
//!
//! [`SamplingEngine`] owns the Idle/Running lifecycle, a single ticker task that
//! reads the [`MetricsProvider`] once per interval, and the two series the
//! readings are appended to.
//!
//! # Locking
//!
//! Lifecycle state, the session generation, the ticker handle and both series
//! live behind one mutex. A tick appends only while holding that mutex and only
//! if the engine is still Running the same session, so once [`SamplingEngine::stop`]
//! returns no further sample can land. Readers copy under the same mutex and
//! never see a CPU sample without its memory partner.

mod ticker;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::config::{validate_interval, SamplerConfig};
use crate::error::{Error, Result};
use crate::provider::{MetricsProvider, ProviderError, Reading};
use crate::series::{RecordingSnapshot, Sample, Series};

/// Callback notified of every dropped sample, outside of any engine lock.
pub type DroppedSampleHook = Arc<dyn Fn(&Error) + Send + Sync + 'static>;

/// Lifecycle state of a [`SamplingEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EngineState {
    /// No ticker is scheduled. Initial state.
    Idle,
    /// A ticker is appending one paired sample per interval.
    Running,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

/// State shared between the engine handle and its ticker task.
pub(crate) struct Shared {
    provider: Arc<dyn MetricsProvider>,
    origin: tokio::time::Instant,
    recording: Mutex<Recording>,
}

struct Recording {
    state: EngineState,
    generation: u64,
    interval: Duration,
    ticker: Option<JoinHandle<()>>,
    cpu: Series<f64>,
    memory: Series<u64>,
    dropped: u64,
    ticks: u64,
    on_dropped: Option<DroppedSampleHook>,
}

/// Outcome of handing one tick's reading to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Recorded,
    Dropped,
    /// The session this ticker belongs to is over.
    Stale,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn provider(&self) -> &dyn MetricsProvider {
        self.provider.as_ref()
    }

    /// Appends one tick's reading if `generation` is still the running session.
    pub(crate) fn record(
        &self,
        generation: u64,
        deadline: tokio::time::Instant,
        reading: std::result::Result<Reading, ProviderError>,
    ) -> TickOutcome {
        let at = deadline.saturating_duration_since(self.origin);
        let mut rec = self.lock();
        if rec.state != EngineState::Running || rec.generation != generation {
            return TickOutcome::Stale;
        }
        rec.ticks += 1;
        let tick = rec.ticks;

        match reading {
            Ok(reading) => {
                rec.cpu.push(Sample::new(at, reading.cpu));
                rec.memory.push(Sample::new(at, reading.memory_bytes));
                TickOutcome::Recorded
            }
            Err(source) => {
                rec.dropped += 1;
                let hook = rec.on_dropped.clone();
                drop(rec);

                let err = Error::ProviderUnavailable {
                    provider: self.provider.name(),
                    source,
                };
                crate::dropped::record(tick, &err);
                if let Some(hook) = hook {
                    hook(&err);
                }
                TickOutcome::Dropped
            }
        }
    }
}

/// Periodically samples CPU utilization and memory footprint into two paired series.
///
/// The engine starts Idle. [`start`](Self::start) schedules exactly one ticker task;
/// further `start` calls while Running are no-ops. [`stop`](Self::stop) cancels the
/// ticker and returns to Idle. Both series survive stop/start cycles until
/// [`reset`](Self::reset) is called.
///
/// The ticker runs on the Tokio runtime `start` is called from. Outside of a
/// runtime the engine lazily creates a single-worker background runtime of its own.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use perf_sampler::{ProviderError, Reading, SamplerConfig, SamplingEngine};
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() -> perf_sampler::Result<()> {
/// let provider = || -> Result<Reading, ProviderError> {
///     Ok(Reading { cpu: 0.25, memory_bytes: 64 << 20 })
/// };
/// let engine = SamplingEngine::new(
///     provider,
///     SamplerConfig::new().with_interval(Duration::from_millis(100)),
/// )?;
///
/// engine.start()?;
/// tokio::time::sleep(Duration::from_millis(350)).await;
/// engine.stop();
///
/// assert_eq!(engine.cpu_series().len(), 3);
/// assert_eq!(engine.memory_series().len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct SamplingEngine {
    shared: Arc<Shared>,
    config: SamplerConfig,
    background: Mutex<Option<BackgroundRuntime>>,
}

impl SamplingEngine {
    /// Creates an Idle engine reading from `provider`.
    ///
    /// Fails with [`Error::Configuration`] if `config` is invalid.
    pub fn new<P: MetricsProvider>(provider: P, config: SamplerConfig) -> Result<Self> {
        Self::with_shared_provider(Arc::new(provider), config)
    }

    /// Creates an Idle engine from a provider that is already shared elsewhere.
    pub fn with_shared_provider(
        provider: Arc<dyn MetricsProvider>,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(provider, config))
    }

    /// Builds an engine from a configuration that is already known to be valid.
    pub(crate) fn from_parts(provider: Arc<dyn MetricsProvider>, config: SamplerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                origin: tokio::time::Instant::now(),
                recording: Mutex::new(Recording {
                    state: EngineState::Idle,
                    generation: 0,
                    interval: config.interval,
                    ticker: None,
                    cpu: Series::new(),
                    memory: Series::new(),
                    dropped: 0,
                    ticks: 0,
                    on_dropped: None,
                }),
            }),
            config,
            background: Mutex::new(None),
        }
    }

    /// Starts sampling at the configured interval.
    ///
    /// Does nothing if the engine is already Running.
    pub fn start(&self) -> Result<()> {
        self.start_session(self.config.interval)
    }

    /// Starts sampling at `interval` for this session.
    ///
    /// Fails with [`Error::Configuration`] for a zero interval or one too large to
    /// schedule, leaving the engine untouched. Does nothing if the engine is already
    /// Running.
    pub fn start_with_interval(&self, interval: Duration) -> Result<()> {
        self.start_session(interval)
    }

    fn start_session(&self, interval: Duration) -> Result<()> {
        validate_interval(interval)?;

        let mut rec = self.shared.lock();
        if rec.state == EngineState::Running {
            if rec.ticker.as_ref().is_some_and(|t| !t.is_finished()) {
                debug!("Sampler already running, ignoring start");
                return Ok(());
            }
            // The runtime hosting the ticker went away underneath us.
            warn!("Sampler ticker is gone while running, restarting it");
            rec.ticker = None;
            rec.state = EngineState::Idle;
        }

        if let Some(stale) = rec.ticker.take() {
            stale.abort();
            let details = format!(
                "ticker of session {} still scheduled while idle",
                rec.generation
            );
            error!("Sampler invariant violated: {details}");
            if cfg!(debug_assertions) {
                return Err(Error::InvariantViolation { details });
            }
        }

        let handle = self.runtime_handle()?;
        let first_deadline = tokio::time::Instant::now()
            .checked_add(interval)
            .ok_or_else(|| Error::Configuration {
                details: format!("sampling interval {interval:?} is too large to schedule"),
            })?;
        let generation = rec.generation.wrapping_add(1);
        rec.generation = generation;
        rec.interval = interval;
        rec.state = EngineState::Running;
        rec.ticker = Some(handle.spawn(ticker::run(
            Arc::clone(&self.shared),
            generation,
            first_deadline,
            interval,
        )));

        info!("Sampler started (session {generation}, interval {interval:?})");
        Ok(())
    }

    /// Stops sampling.
    ///
    /// Does nothing if the engine is Idle. Once this returns, neither series grows
    /// until the next [`start`](Self::start): an append already in progress is
    /// waited for, and a tick that fires later is discarded.
    pub fn stop(&self) {
        let mut rec = self.shared.lock();
        if rec.state == EngineState::Idle {
            return;
        }
        rec.state = EngineState::Idle;
        if let Some(ticker) = rec.ticker.take() {
            ticker.abort();
        }
        info!(
            "Sampler stopped (session {}, {} samples recorded)",
            rec.generation,
            rec.cpu.len()
        );
    }

    /// Clears both series and the tick counters.
    ///
    /// Only allowed while Idle; fails with [`Error::InvalidState`] while Running.
    pub fn reset(&self) -> Result<()> {
        let mut rec = self.shared.lock();
        if rec.state == EngineState::Running {
            return Err(Error::InvalidState {
                operation: "reset",
                state: rec.state,
            });
        }
        rec.cpu.clear();
        rec.memory.clear();
        rec.dropped = 0;
        rec.ticks = 0;
        debug!("Sampler series cleared");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.shared.lock().state
    }

    /// Returns true while a ticker is scheduled.
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Interval of the current session, or of the most recent one while Idle.
    pub fn interval(&self) -> Duration {
        self.shared.lock().interval
    }

    /// Snapshot of the CPU series (fraction of one core).
    pub fn cpu_series(&self) -> Series<f64> {
        self.shared.lock().cpu.clone()
    }

    /// Snapshot of the memory series (bytes).
    pub fn memory_series(&self) -> Series<u64> {
        self.shared.lock().memory.clone()
    }

    /// Both series and the dropped-sample count, copied under one lock.
    pub fn snapshot(&self) -> RecordingSnapshot {
        let rec = self.shared.lock();
        RecordingSnapshot {
            cpu: rec.cpu.clone(),
            memory: rec.memory.clone(),
            dropped_samples: rec.dropped,
        }
    }

    /// Number of ticks whose provider read failed since the last reset.
    pub fn dropped_samples(&self) -> u64 {
        self.shared.lock().dropped
    }

    /// Number of ticks executed since the last reset, recorded or dropped.
    pub fn ticks(&self) -> u64 {
        self.shared.lock().ticks
    }

    /// Installs a callback that is notified of every dropped sample.
    ///
    /// Replaces any previously installed hook.
    pub fn set_dropped_sample_hook<F>(&self, hook: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.shared.lock().on_dropped = Some(Arc::new(hook));
    }

    /// Removes the dropped-sample callback.
    pub fn clear_dropped_sample_hook(&self) {
        self.shared.lock().on_dropped = None;
    }

    fn runtime_handle(&self) -> Result<Handle> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(handle);
        }

        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(runtime) = background.as_ref() {
            return Ok(runtime.handle());
        }
        let runtime = BackgroundRuntime::new()?;
        let handle = runtime.handle();
        *background = Some(runtime);
        Ok(handle)
    }
}

impl Drop for SamplingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SamplingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rec = self.shared.lock();
        f.debug_struct("SamplingEngine")
            .field("provider", &self.shared.provider.name())
            .field("state", &rec.state)
            .field("interval", &rec.interval)
            .field("samples", &rec.cpu.len())
            .field("dropped", &rec.dropped)
            .finish()
    }
}

/// Runtime used when `start` is called outside of any Tokio runtime.
struct BackgroundRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl BackgroundRuntime {
    fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("perf-sampler")
            .enable_time()
            .build()
            .map_err(|e| Error::Runtime {
                details: format!("failed to build the background sampler runtime: {e}"),
            })?;
        debug!("Created background runtime for the sampler");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Drop for BackgroundRuntime {
    fn drop(&mut self) {
        // May run inside another runtime, where a blocking shutdown would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
