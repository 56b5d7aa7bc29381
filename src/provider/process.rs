// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{MetricsProvider, ProviderError, Reading};

/// Reads CPU and memory usage of the current process from the OS.
///
/// - CPU: user + system CPU time consumed since the previous reading, divided by
///   the wall-clock time elapsed since then. The first reading is measured
///   against the moment the provider was created.
/// - Memory: current resident set size. Linux reads `/proc/self/statm`; macOS
///   asks the kernel for `MACH_TASK_BASIC_INFO`. The value goes down again when
///   the process releases memory.
///
/// Other platforms report [`ProviderError::Unavailable`] on every reading.
#[derive(Debug)]
pub struct ProcessMetricsProvider {
    last: Mutex<CpuMark>,
}

#[derive(Debug, Clone, Copy)]
struct CpuMark {
    wall: Instant,
    cpu: Duration,
}

impl ProcessMetricsProvider {
    /// Creates a provider whose first CPU reading covers the time from now on.
    pub fn new() -> Self {
        Self {
            last: Mutex::new(CpuMark {
                wall: Instant::now(),
                cpu: cpu_time().unwrap_or(Duration::ZERO),
            }),
        }
    }

    fn cpu_fraction(&self) -> Result<f64, ProviderError> {
        let now = CpuMark {
            wall: Instant::now(),
            cpu: cpu_time()?,
        };
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let wall = now.wall.saturating_duration_since(last.wall);
        let cpu = now.cpu.saturating_sub(last.cpu);
        *last = now;

        if wall.is_zero() {
            Ok(0.0)
        } else {
            Ok(cpu.as_secs_f64() / wall.as_secs_f64())
        }
    }
}

impl Default for ProcessMetricsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for ProcessMetricsProvider {
    fn sample(&self) -> Result<Reading, ProviderError> {
        let memory_bytes = resident_bytes()?;
        let cpu = self.cpu_fraction()?;
        Ok(Reading { cpu, memory_bytes })
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// Total user + system CPU time consumed by this process.
#[cfg(unix)]
fn cpu_time() -> Result<Duration, ProviderError> {
    // SAFETY: `rusage` is plain old data and getrusage only writes into it.
    let usage = unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut usage) != 0 {
            return Err(ProviderError::unavailable(format!(
                "getrusage failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        usage
    };
    Ok(timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime))
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

#[cfg(not(unix))]
fn cpu_time() -> Result<Duration, ProviderError> {
    Err(ProviderError::unavailable(
        "process CPU time is not supported on this platform",
    ))
}

#[cfg(target_os = "linux")]
fn resident_bytes() -> Result<u64, ProviderError> {
    // Format: size resident shared text lib data dt, in pages
    let statm = std::fs::read_to_string("/proc/self/statm")
        .map_err(|e| ProviderError::unavailable(format!("cannot read /proc/self/statm: {e}")))?;
    let resident_pages = parse_statm_resident(&statm)
        .ok_or_else(|| ProviderError::unavailable("malformed /proc/self/statm"))?;

    // SAFETY: sysconf has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return Err(ProviderError::unavailable("cannot determine page size"));
    }
    Ok(resident_pages * page_size as u64)
}

#[cfg(target_os = "macos")]
#[allow(deprecated)] // libc points at the mach2 crate for mach_task_self
fn resident_bytes() -> Result<u64, ProviderError> {
    let mut info = std::mem::MaybeUninit::<libc::mach_task_basic_info>::zeroed();
    let mut count = libc::MACH_TASK_BASIC_INFO_COUNT;
    // SAFETY: `info` is large enough for MACH_TASK_BASIC_INFO_COUNT words, and
    // task_info writes at most `count` of them.
    let status = unsafe {
        libc::task_info(
            libc::mach_task_self(),
            libc::MACH_TASK_BASIC_INFO,
            info.as_mut_ptr() as libc::task_info_t,
            &mut count,
        )
    };
    if status != libc::KERN_SUCCESS {
        return Err(ProviderError::unavailable(format!(
            "task_info(MACH_TASK_BASIC_INFO) failed with kern_return_t {status}"
        )));
    }
    // SAFETY: task_info succeeded and filled the struct.
    let info = unsafe { info.assume_init() };
    Ok(info.resident_size)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn resident_bytes() -> Result<u64, ProviderError> {
    Err(ProviderError::unavailable(
        "resident memory is not supported on this platform",
    ))
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}
