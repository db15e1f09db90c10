// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::DropPolicy;
use crate::observer::{DropReason, PipelineObserver};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Fixed-capacity FIFO shared by producers and the export worker.
///
/// Producers never block: `offer` only ever tries the lock, and gives up
/// after a bounded number of attempts. The backing buffer is allocated once
/// at full capacity and never grows.
pub struct BoundedQueue<R> {
    records: Mutex<VecDeque<R>>,
    capacity: usize,
    policy: DropPolicy,
    spin_limit: u32,
    dropped: AtomicU64,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl<R> BoundedQueue<R> {
    pub fn new(capacity: usize, policy: DropPolicy, spin_limit: u32) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            spin_limit,
            dropped: AtomicU64::new(0),
            observer: None,
        }
    }

    /// Reports every drop to `observer` in addition to [`BoundedQueue::dropped`].
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Enqueues `record` without blocking. Returns false if the record was
    /// dropped.
    pub fn offer(&self, record: R) -> bool {
        self.try_offer(record).is_ok()
    }

    /// Like [`BoundedQueue::offer`], returning the queue depth after the
    /// insert, or why the record was dropped.
    pub fn try_offer(&self, record: R) -> Result<usize, DropReason> {
        let Some(mut records) = self.lock_for_offer() else {
            self.record_drop(1, DropReason::Contention);
            return Err(DropReason::Contention);
        };
        if records.len() >= self.capacity {
            match self.policy {
                DropPolicy::DropNewest => {
                    drop(records);
                    self.record_drop(1, DropReason::QueueFull);
                    return Err(DropReason::QueueFull);
                }
                DropPolicy::DropOldest => {
                    records.pop_front();
                    records.push_back(record);
                    let depth = records.len();
                    drop(records);
                    self.record_drop(1, DropReason::Evicted);
                    return Ok(depth);
                }
            }
        }
        records.push_back(record);
        Ok(records.len())
    }

    fn lock_for_offer(&self) -> Option<parking_lot::MutexGuard<'_, VecDeque<R>>> {
        for _ in 0..=self.spin_limit {
            if let Some(guard) = self.records.try_lock() {
                return Some(guard);
            }
            std::hint::spin_loop();
        }
        None
    }

    /// Removes up to `max_items` records, oldest first.
    pub fn drain(&self, max_items: usize) -> Vec<R> {
        let mut records = self.records.lock();
        let count = max_items.min(records.len());
        records.drain(..count).collect()
    }

    /// Empties the queue, counting everything in it as dropped for `reason`.
    pub fn discard_all(&self, reason: DropReason) -> usize {
        let discarded = {
            let mut records = self.records.lock();
            let count = records.len();
            records.clear();
            count
        };
        if discarded > 0 {
            self.record_drop(discarded as u64, reason);
        }
        discarded
    }

    pub fn size(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records dropped by this queue since it was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drop(&self, count: u64, reason: DropReason) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
        debug!(count, reason = reason.as_str(), "Dropped records from queue");
        if let Some(observer) = &self.observer {
            observer.records_dropped(count, reason);
        }
    }
}
