// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Concurrency tests: start/stop races, single ticker, and paired appends

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use perf_sampler::{ProviderError, Reading, SamplerConfig, SamplingEngine};

const INTERVAL: Duration = Duration::from_millis(100);

fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn counting_engine(interval: Duration) -> (SamplingEngine, Arc<AtomicU64>) {
    let calls = Arc::new(AtomicU64::new(0));
    let calls_clone = calls.clone();
    let provider = move || -> Result<Reading, ProviderError> {
        let call = calls_clone.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Reading {
            cpu: call as f64,
            memory_bytes: call,
        })
    };
    let engine = SamplingEngine::new(provider, SamplerConfig::new().with_interval(interval))
        .expect("valid config");
    (engine, calls)
}

#[tokio::test(start_paused = true)]
async fn test_random_start_stop_sequences_never_double_sample() {
    init_test_logger();

    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (engine, calls) = counting_engine(INTERVAL);

        for _ in 0..40 {
            if rng.random_bool(0.5) {
                engine.start().unwrap();
            } else {
                engine.stop();
            }
            let pause_ms = rng.random_range(0..250u64);
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;

            let snapshot = engine.snapshot();
            assert_eq!(snapshot.cpu.len(), snapshot.memory.len());
        }

        engine.stop();
        // Every provider call of a live session produced exactly one sample
        assert_eq!(calls.load(Ordering::SeqCst), engine.cpu_series().len() as u64);

        let before = engine.cpu_series().len();
        engine.start().unwrap();
        engine.start().unwrap();
        tokio::time::sleep(INTERVAL * 3 + INTERVAL / 2).await;
        engine.stop();

        assert_eq!(
            engine.cpu_series().len(),
            before + 3,
            "seed {seed}: expected exactly one sample per interval"
        );
        let cpu = engine.cpu_series();
        assert!(cpu.as_slice().windows(2).all(|w| w[0].at() < w[1].at()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_start_back_to_back_keeps_single_ticker() {
    init_test_logger();

    let (engine, _calls) = counting_engine(INTERVAL);
    for _ in 0..10 {
        engine.start().unwrap();
        engine.stop();
    }
    engine.start().unwrap();

    tokio::time::sleep(INTERVAL * 5 + INTERVAL / 2).await;
    engine.stop();
    assert_eq!(engine.cpu_series().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_never_see_torn_samples() {
    init_test_logger();

    let (engine, _calls) = counting_engine(Duration::from_millis(1));
    let engine = Arc::new(engine);
    let done = Arc::new(AtomicBool::new(false));

    engine.start().unwrap();

    let mut readers = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        let done = done.clone();
        readers.push(tokio::spawn(async move {
            let mut observed = 0usize;
            while !done.load(Ordering::SeqCst) {
                let snapshot = engine.snapshot();
                assert_eq!(snapshot.cpu.len(), snapshot.memory.len());
                for (cpu, mem) in snapshot.paired() {
                    assert_eq!(cpu.at(), mem.at());
                    assert_eq!(cpu.value() as u64, mem.value());
                }
                observed = observed.max(snapshot.len());
                tokio::task::yield_now().await;
            }
            observed
        }));
    }

    // Control operations racing with ticks and reads from another thread
    let controller = {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || {
            for i in 0..50 {
                if i % 3 == 0 {
                    engine.stop();
                }
                engine.start().unwrap();
                std::thread::sleep(Duration::from_millis(2));
            }
        })
    };

    controller.await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.stop();
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.await.expect("reader should not panic");
    }

    let final_len = engine.snapshot().len();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.snapshot().len(), final_len);
    assert!(final_len > 0);
}

#[test]
fn test_stop_from_other_threads_while_ticking() {
    init_test_logger();

    let (engine, _calls) = counting_engine(Duration::from_millis(1));
    let engine = Arc::new(engine);
    engine.start().unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || engine.stop())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!engine.is_running());
    let settled = engine.snapshot();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(engine.snapshot(), settled);
}
