// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery accounting. A [PipelineObserver] is handed to the pipeline at
//! construction and told about every record that is exported, fails, or is
//! dropped. [ExportCounters] is the default implementation.

use crate::exporter::ExportResult;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why records were discarded without being delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The queue was full under the drop-newest policy.
    QueueFull,
    /// The queue lock stayed contended past the offer spin limit.
    Contention,
    /// The oldest queued record made room under the drop-oldest policy.
    Evicted,
    /// Offered after shutdown began.
    Stopped,
    /// The batch could not be encoded.
    Encode,
    /// The batch failed to export.
    Export,
    /// Still queued or in flight when the shutdown deadline passed.
    ShutdownTimeout,
}

impl DropReason {
    pub const ALL: [DropReason; 7] = [
        DropReason::QueueFull,
        DropReason::Contention,
        DropReason::Evicted,
        DropReason::Stopped,
        DropReason::Encode,
        DropReason::Export,
        DropReason::ShutdownTimeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::QueueFull => "queue_full",
            DropReason::Contention => "contention",
            DropReason::Evicted => "evicted",
            DropReason::Stopped => "stopped",
            DropReason::Encode => "encode",
            DropReason::Export => "export",
            DropReason::ShutdownTimeout => "shutdown_timeout",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives delivery outcomes. Called from producer threads (drops on offer)
/// and from the export worker, so implementations must be cheap and must not
/// block.
pub trait PipelineObserver: Send + Sync {
    fn records_dropped(&self, count: u64, reason: DropReason);

    fn batch_exported(&self, records: usize);

    /// `result` is always a failure. The records of a failed batch are also
    /// reported through [`PipelineObserver::records_dropped`].
    fn batch_failed(&self, records: usize, result: &ExportResult);
}

/// Atomic counters for every outcome.
#[derive(Debug, Default)]
pub struct ExportCounters {
    dropped: [AtomicU64; DropReason::ALL.len()],
    batches_exported: AtomicU64,
    records_exported: AtomicU64,
    batches_failed: AtomicU64,
    records_failed: AtomicU64,
}

/// A point-in-time copy of [ExportCounters].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub dropped: [u64; DropReason::ALL.len()],
    pub batches_exported: u64,
    pub records_exported: u64,
    pub batches_failed: u64,
    pub records_failed: u64,
}

impl CountersSnapshot {
    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.dropped[reason.index()]
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.iter().sum()
    }
}

impl ExportCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let mut dropped = [0; DropReason::ALL.len()];
        for (value, counter) in dropped.iter_mut().zip(&self.dropped) {
            *value = counter.load(Ordering::Relaxed);
        }
        CountersSnapshot {
            dropped,
            batches_exported: self.batches_exported.load(Ordering::Relaxed),
            records_exported: self.records_exported.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
        }
    }
}

impl PipelineObserver for ExportCounters {
    fn records_dropped(&self, count: u64, reason: DropReason) {
        self.dropped[reason.index()].fetch_add(count, Ordering::Relaxed);
    }

    fn batch_exported(&self, records: usize) {
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
        self.records_exported
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    fn batch_failed(&self, records: usize, _result: &ExportResult) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.records_failed.fetch_add(records as u64, Ordering::Relaxed);
    }
}
