// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use super::Series;

/// Immutable, paired view of everything an engine has recorded.
///
/// Both series are copied under the same lock, so `cpu.len() == memory.len()`
/// always holds and the `i`-th CPU sample shares its timestamp with the `i`-th
/// memory sample.
///
/// # Example
///
/// ```rust,ignore
/// let snapshot = engine.snapshot();
/// for (cpu, mem) in snapshot.paired() {
///     println!("{:?}: cpu={:.3} rss={}", cpu.at(), cpu.value(), mem.value());
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct RecordingSnapshot {
    /// CPU utilization as a fraction of one core.
    pub cpu: Series<f64>,

    /// Resident memory in bytes.
    pub memory: Series<u64>,

    /// Ticks whose provider read failed and were therefore not recorded.
    pub dropped_samples: u64,
}

impl RecordingSnapshot {
    /// Number of paired samples.
    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    /// Iterates over `(cpu, memory)` pairs in time order.
    pub fn paired(
        &self,
    ) -> impl Iterator<Item = (&super::Sample<f64>, &super::Sample<u64>)> + '_ {
        self.cpu.iter().zip(self.memory.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Sample;
    use std::time::Duration;

    #[test]
    fn test_snapshot_default() {
        let snapshot = RecordingSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
        assert_eq!(snapshot.dropped_samples, 0);
        assert_eq!(snapshot.paired().count(), 0);
    }

    #[test]
    fn test_snapshot_paired_iteration() {
        let mut snapshot = RecordingSnapshot::default();
        for i in 1..=3u64 {
            let at = Duration::from_secs(i);
            snapshot.cpu.push(Sample::new(at, i as f64 / 10.0));
            snapshot.memory.push(Sample::new(at, i * 1024));
        }

        let pairs: Vec<_> = snapshot.paired().collect();
        assert_eq!(pairs.len(), 3);
        for (cpu, mem) in pairs {
            assert_eq!(cpu.at(), mem.at());
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_snapshot_serialization() {
        let mut snapshot = RecordingSnapshot::default();
        snapshot.cpu.push(Sample::new(Duration::from_secs(1), 0.5));
        snapshot.memory.push(Sample::new(Duration::from_secs(1), 2048));
        snapshot.dropped_samples = 1;

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("dropped_samples"));
        assert!(json.contains("2048"));

        let back: RecordingSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
