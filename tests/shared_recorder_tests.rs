// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Tests for the process-wide recorder.
//!
//! The shared engine is a process singleton, so everything runs in one test to
//! keep the steps ordered.

use std::time::Duration;

use perf_sampler::{start_recorder, stop_recorder, EngineState, SamplingEngine, INTERVAL_ENV_VAR};

fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test(start_paused = true)]
async fn test_shared_recorder_lifecycle() {
    init_test_logger();

    // Must be set before the first access creates the engine
    std::env::set_var(INTERVAL_ENV_VAR, "200");

    let engine = SamplingEngine::shared();
    assert!(std::ptr::eq(engine, SamplingEngine::shared()));
    assert_eq!(engine.interval(), Duration::from_millis(200));
    assert_eq!(engine.state(), EngineState::Idle);

    // Stopping an idle recorder is harmless
    stop_recorder();

    start_recorder();
    start_recorder();
    assert!(engine.is_running());

    tokio::time::sleep(Duration::from_millis(700)).await;
    stop_recorder();
    assert_eq!(engine.state(), EngineState::Idle);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.len() as u64 + snapshot.dropped_samples, 3);
    assert_eq!(snapshot.cpu.len(), snapshot.memory.len());

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        assert_eq!(snapshot.dropped_samples, 0);
        assert!(snapshot.memory.iter().all(|s| s.value() > 0));
        assert!(snapshot.cpu.iter().all(|s| s.value() >= 0.0));
    }

    engine.reset().expect("reset while idle should succeed");
    assert!(engine.snapshot().is_empty());
}
