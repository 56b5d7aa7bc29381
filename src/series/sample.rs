// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Numeric values that can be stored in a [`Series`].
///
/// Implemented for `f64` (CPU fraction of one core) and `u64` (memory bytes).
pub trait SampleValue: Copy + PartialOrd + Send + Sync + 'static {
    /// Widens the value for statistics.
    fn as_f64(self) -> f64;
}

impl SampleValue for f64 {
    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

impl SampleValue for u64 {
    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

/// A single timestamped measurement.
///
/// The timestamp is the monotonic offset from the owning engine's origin
/// instant, so samples from one engine are directly comparable.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample<T> {
    at: Duration,
    value: T,
}

impl<T: SampleValue> Sample<T> {
    pub(crate) fn new(at: Duration, value: T) -> Self {
        Self { at, value }
    }

    /// Offset from the engine origin at which the tick fired.
    #[inline]
    pub fn at(&self) -> Duration {
        self.at
    }

    /// The measured value.
    #[inline]
    pub fn value(&self) -> T {
        self.value
    }
}

/// Ordered, append-only history of samples for one metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Series<T> {
    samples: Vec<Sample<T>>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}

impl<T: SampleValue> Series<T> {
    /// Creates an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample. Timestamps must not go backwards.
    pub(crate) fn push(&mut self, sample: Sample<T>) {
        debug_assert!(
            self.samples.last().map_or(true, |last| last.at <= sample.at),
            "series timestamps must be monotonically non-decreasing"
        );
        self.samples.push(sample);
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of samples recorded.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no sample has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in time order.
    pub fn as_slice(&self) -> &[Sample<T>] {
        &self.samples
    }

    /// Iterates over the samples in time order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample<T>> {
        self.samples.iter()
    }

    /// The oldest sample.
    pub fn first(&self) -> Option<Sample<T>> {
        self.samples.first().copied()
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<Sample<T>> {
        self.samples.last().copied()
    }

    /// The sample with the highest value. Ties resolve to the earliest sample.
    pub fn peak(&self) -> Option<Sample<T>> {
        self.samples.iter().copied().fold(None, |peak, sample| match peak {
            Some(p) if p.value >= sample.value => Some(p),
            _ => Some(sample),
        })
    }

    /// Arithmetic mean of all values, `None` for an empty series.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(|s| s.value.as_f64()).sum();
        Some(total / self.samples.len() as f64)
    }

    /// Time covered between the first and the latest sample.
    pub fn span(&self) -> Duration {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.at.saturating_sub(first.at),
            _ => Duration::ZERO,
        }
    }
}

impl<'a, T> IntoIterator for &'a Series<T> {
    type Item = &'a Sample<T>;
    type IntoIter = std::slice::Iter<'a, Sample<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

impl<T> IntoIterator for Series<T> {
    type Item = Sample<T>;
    type IntoIter = std::vec::IntoIter<Sample<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}
