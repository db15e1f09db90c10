// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The pipeline coordinator: a bounded queue fed by producer threads and a
//! dedicated worker thread that batches, encodes and exports its contents.
//!
//! Lifecycle: `Idle -> Running -> Draining -> Stopped`. Records offered while
//! `Idle` are buffered until [Pipeline::start]. [Pipeline::shutdown] moves
//! through `Draining`, where one final flush runs under the caller's timeout,
//! to the terminal `Stopped`.

mod simple;
mod worker;

pub use self::simple::SimplePipeline;

use self::worker::{WorkerHandle, WorkerSettings};
use crate::config::PipelineConfig;
use crate::error::ExportError;
use crate::exporter::{BatchExporter, ExportResult, ProfilesExporter};
use crate::observer::{CountersSnapshot, DropReason, ExportCounters, PipelineObserver};
use crate::queue::BoundedQueue;
use crate::record::{ProfileRecord, Resource};
use anyhow::Context;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Idle,
            1 => PipelineState::Running,
            2 => PipelineState::Draining,
            _ => PipelineState::Stopped,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Stopped => "stopped",
        })
    }
}

/// Reports to the built-in counters and to the caller's observer, if any.
struct Observers {
    counters: Arc<ExportCounters>,
    extra: Option<Arc<dyn PipelineObserver>>,
}

impl PipelineObserver for Observers {
    fn records_dropped(&self, count: u64, reason: DropReason) {
        self.counters.records_dropped(count, reason);
        if let Some(extra) = &self.extra {
            extra.records_dropped(count, reason);
        }
    }

    fn batch_exported(&self, records: usize) {
        self.counters.batch_exported(records);
        if let Some(extra) = &self.extra {
            extra.batch_exported(records);
        }
    }

    fn batch_failed(&self, records: usize, result: &ExportResult) {
        self.counters.batch_failed(records, result);
        if let Some(extra) = &self.extra {
            extra.batch_failed(records, result);
        }
    }
}

/// Reports the outcome of one export. The records of a failed batch are
/// dropped.
fn report(observer: &dyn PipelineObserver, count: usize, result: &ExportResult) {
    match result {
        ExportResult::Success => {
            debug!(records = count, "Batch exported");
            observer.batch_exported(count);
        }
        ExportResult::Failure { retryable, cause } => {
            warn!(
                records = count,
                retryable,
                error = %cause,
                "Dropping batch after failed export"
            );
            observer.batch_failed(count, result);
            let reason = match cause {
                ExportError::Encode(_) => DropReason::Encode,
                _ => DropReason::Export,
            };
            observer.records_dropped(count as u64, reason);
        }
    }
}

/// State shared by producers and the worker.
pub(crate) struct Shared<R> {
    queue: BoundedQueue<R>,
    notify: Notify,
    observer: Arc<dyn PipelineObserver>,
    state: AtomicU8,
}

/// Batches records offered from any thread and exports them in the
/// background.
///
/// Offering never blocks and never fails loudly: a record that cannot be
/// queued is counted as dropped and `offer` returns false. The only failures
/// a caller sees are [Pipeline::force_flush] and [Pipeline::shutdown]
/// returning false.
pub struct Pipeline<R: Send + 'static> {
    shared: Arc<Shared<R>>,
    counters: Arc<ExportCounters>,
    resource: Arc<Resource>,
    config: PipelineConfig,
    exporter: Mutex<Option<Box<dyn BatchExporter<R>>>>,
    /// Only held for short, non-blocking sections.
    worker: Mutex<Option<WorkerHandle>>,
    /// Held for the whole of a shutdown; records its outcome once finished.
    shutdown_outcome: Mutex<Option<bool>>,
}

impl Pipeline<ProfileRecord> {
    /// A pipeline of profile records exported over HTTP as configured.
    pub fn profiles(config: PipelineConfig, resource: Resource) -> anyhow::Result<Self> {
        config
            .validate()
            .context("invalid pipeline configuration")?;
        let exporter =
            ProfilesExporter::from_config(&config).context("failed to create profiles exporter")?;
        Self::new(config, resource, exporter)
    }
}

impl<R: Send + 'static> Pipeline<R> {
    pub fn new(
        config: PipelineConfig,
        resource: Resource,
        exporter: impl BatchExporter<R> + 'static,
    ) -> anyhow::Result<Self> {
        Self::build(config, resource, Box::new(exporter), None)
    }

    /// Like [Pipeline::new], also reporting every outcome to `observer`.
    pub fn with_observer(
        config: PipelineConfig,
        resource: Resource,
        exporter: impl BatchExporter<R> + 'static,
        observer: Arc<dyn PipelineObserver>,
    ) -> anyhow::Result<Self> {
        Self::build(config, resource, Box::new(exporter), Some(observer))
    }

    fn build(
        config: PipelineConfig,
        resource: Resource,
        exporter: Box<dyn BatchExporter<R>>,
        extra: Option<Arc<dyn PipelineObserver>>,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .context("invalid pipeline configuration")?;
        let counters = Arc::new(ExportCounters::new());
        let observer: Arc<dyn PipelineObserver> = Arc::new(Observers {
            counters: counters.clone(),
            extra,
        });
        let queue = BoundedQueue::new(
            config.max_queue_size,
            config.drop_policy,
            config.offer_spin_limit,
        )
        .with_observer(observer.clone());
        let shared = Arc::new(Shared {
            queue,
            notify: Notify::new(),
            observer,
            state: AtomicU8::new(PipelineState::Idle as u8),
        });
        Ok(Self {
            shared,
            counters,
            resource: Arc::new(resource),
            config,
            exporter: Mutex::new(Some(exporter)),
            worker: Mutex::new(None),
            shutdown_outcome: Mutex::new(None),
        })
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PipelineState) {
        debug!(%state, "Pipeline state changed");
        self.shared.state.store(state as u8, Ordering::Release);
    }

    /// Queues `record` for export without blocking. Returns false if the
    /// record was dropped: the pipeline is shutting down, the queue is full
    /// under the drop-newest policy, or the queue stayed contended.
    pub fn offer(&self, record: R) -> bool {
        match self.state() {
            PipelineState::Draining | PipelineState::Stopped => {
                debug!("Dropped record offered after shutdown");
                self.shared
                    .observer
                    .records_dropped(1, DropReason::Stopped);
                return false;
            }
            PipelineState::Idle | PipelineState::Running => {}
        }
        match self.shared.queue.try_offer(record) {
            Ok(depth) => {
                if depth >= self.config.batch_max_records {
                    self.shared.notify.notify_one();
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Fire-and-forget [Pipeline::offer].
    pub fn submit(&self, record: R) {
        let _ = self.offer(record);
    }

    /// Starts the background worker. Starting a running pipeline does
    /// nothing; a pipeline that began shutting down cannot be restarted.
    pub fn start(&self) -> anyhow::Result<()> {
        let mut worker = self.worker.lock();
        match self.state() {
            PipelineState::Idle => {}
            PipelineState::Running => return Ok(()),
            state => anyhow::bail!("cannot start a {state} pipeline"),
        }
        *worker = Some(self.spawn_worker()?);
        self.set_state(PipelineState::Running);
        Ok(())
    }

    fn spawn_worker(&self) -> anyhow::Result<WorkerHandle> {
        let exporter = self
            .exporter
            .lock()
            .take()
            .context("exporter already handed to a worker")?;
        WorkerHandle::spawn(
            self.shared.clone(),
            exporter,
            self.resource.clone(),
            WorkerSettings {
                batch_max_records: self.config.batch_max_records,
                batch_timeout: self.config.batch_timeout(),
                export_timeout: self.config.export_timeout(),
            },
        )
    }

    /// Exports everything queued, waiting up to `timeout`. Returns true if
    /// every record was exported in time. The lifecycle state is unchanged;
    /// records not exported in time stay queued.
    pub fn force_flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let flusher = {
            let worker = self.worker.lock();
            match (self.state(), worker.as_ref()) {
                (PipelineState::Running, Some(worker)) => Some(worker.flusher()),
                _ => None,
            }
        };
        match flusher {
            Some(flusher) => flusher.flush(deadline),
            None => self.shared.queue.is_empty(),
        }
    }

    /// Stops accepting records, runs one final flush bounded by `timeout`,
    /// and stops the worker. Records still queued or in flight at the
    /// deadline are dropped and counted. Returns true if nothing was lost.
    ///
    /// Later calls return the outcome of the first one. A call that cannot
    /// observe that outcome within its own `timeout` returns false.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Some(mut outcome) = self.shutdown_outcome.try_lock_until(deadline) else {
            warn!("Timed out waiting for a concurrent shutdown to finish");
            return false;
        };
        if let Some(delivered) = *outcome {
            return delivered;
        }

        let handle = {
            let mut worker = self.worker.lock();
            let handle = match self.state() {
                PipelineState::Running => worker.take(),
                PipelineState::Idle if !self.shared.queue.is_empty() => {
                    match self.spawn_worker() {
                        Ok(handle) => Some(handle),
                        Err(e) => {
                            error!(error = %e, "Failed to start worker for the final flush");
                            None
                        }
                    }
                }
                PipelineState::Idle | PipelineState::Draining | PipelineState::Stopped => None,
            };
            self.set_state(PipelineState::Draining);
            handle
        };

        let delivered = match handle {
            Some(handle) => handle.shutdown(deadline),
            None => true,
        };

        let discarded = self.shared.queue.discard_all(DropReason::ShutdownTimeout);
        if discarded > 0 {
            warn!(
                records = discarded,
                "Pipeline shut down with records still queued"
            );
        }
        self.set_state(PipelineState::Stopped);
        let delivered = delivered && discarded == 0;
        *outcome = Some(delivered);
        delivered
    }

    pub fn queue_size(&self) -> usize {
        self.shared.queue.size()
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }
}

impl<R: Send + 'static> Drop for Pipeline<R> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().as_ref() {
            worker.cancel();
        }
        let discarded = self.shared.queue.discard_all(DropReason::ShutdownTimeout);
        if discarded > 0 {
            warn!(
                records = discarded,
                "Pipeline dropped without shutdown, discarding queued records"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DropPolicy;
    use crate::testing::InMemoryExporter;

    fn config() -> PipelineConfig {
        PipelineConfig {
            max_queue_size: 4,
            batch_max_records: 2,
            batch_timeout_ms: 50,
            ..Default::default()
        }
    }

    fn pipeline(config: PipelineConfig) -> (Pipeline<u32>, InMemoryExporter<u32>) {
        let exporter = InMemoryExporter::new();
        let pipeline = Pipeline::new(config, Resource::new("svc"), exporter.clone()).unwrap();
        (pipeline, exporter)
    }

    #[test]
    fn rejects_invalid_config() {
        let config = PipelineConfig {
            max_queue_size: 0,
            ..Default::default()
        };
        let result = Pipeline::new(config, Resource::new("svc"), InMemoryExporter::<u32>::new());
        assert!(result.is_err());
    }

    #[test]
    fn idle_pipeline_buffers() {
        let (pipeline, exporter) = pipeline(config());
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.offer(1));
        assert!(pipeline.offer(2));
        assert_eq!(pipeline.queue_size(), 2);
        assert!(!pipeline.force_flush(Duration::from_millis(10)));
        assert!(exporter.batches().is_empty());
    }

    #[test]
    fn drop_newest_counts_overflow() {
        let (pipeline, _exporter) = pipeline(config());
        for i in 0..6 {
            pipeline.submit(i);
        }
        assert_eq!(pipeline.queue_size(), 4);
        assert_eq!(pipeline.counters().dropped(DropReason::QueueFull), 2);
    }

    #[test]
    fn drop_oldest_counts_evictions() {
        let (pipeline, _exporter) = pipeline(PipelineConfig {
            drop_policy: DropPolicy::DropOldest,
            ..config()
        });
        for i in 0..6 {
            assert!(pipeline.offer(i));
        }
        assert_eq!(pipeline.counters().dropped(DropReason::Evicted), 2);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn shutdown_of_empty_idle_pipeline() {
        let (pipeline, _exporter) = pipeline(config());
        assert!(pipeline.shutdown(Duration::ZERO));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(!pipeline.offer(1));
        assert_eq!(pipeline.counters().dropped(DropReason::Stopped), 1);
        assert!(pipeline.start().is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn shutdown_of_idle_pipeline_flushes() {
        let (pipeline, exporter) = pipeline(config());
        pipeline.submit(1);
        pipeline.submit(2);
        pipeline.submit(3);
        assert!(pipeline.shutdown(Duration::from_secs(5)));
        assert_eq!(exporter.records(), [1, 2, 3]);
        assert_eq!(exporter.batches().len(), 2);
        assert_eq!(pipeline.counters().records_exported, 3);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn start_is_idempotent() {
        let (pipeline, _exporter) = pipeline(config());
        pipeline.start().unwrap();
        pipeline.start().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(pipeline.shutdown(Duration::from_secs(5)));
        assert!(pipeline.shutdown(Duration::from_secs(5)));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn force_flush_exports_everything() {
        let (pipeline, exporter) = pipeline(PipelineConfig {
            batch_timeout_ms: 60_000,
            ..config()
        });
        pipeline.start().unwrap();
        pipeline.submit(7);
        assert!(pipeline.force_flush(Duration::from_secs(5)));
        assert_eq!(exporter.records(), [7]);
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(pipeline.shutdown(Duration::from_secs(5)));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn profiles_pipeline_builds_with_default_config() {
        let pipeline =
            Pipeline::profiles(PipelineConfig::default(), Resource::new("svc")).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.shutdown(Duration::ZERO));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn shutdown_is_not_held_up_by_a_pending_flush() {
        let exporter = InMemoryExporter::new().with_delay(Duration::from_secs(2));
        let config = PipelineConfig {
            batch_timeout_ms: 60_000,
            ..config()
        };
        let pipeline = Pipeline::new(config, Resource::new("svc"), exporter.clone()).unwrap();
        pipeline.start().unwrap();
        pipeline.submit(1u32);

        std::thread::scope(|scope| {
            let flush = scope.spawn(|| pipeline.force_flush(Duration::from_secs(3)));
            std::thread::sleep(Duration::from_millis(50));

            let start = Instant::now();
            assert!(!pipeline.shutdown(Duration::from_millis(100)));
            let elapsed = start.elapsed();
            assert!(elapsed < Duration::from_secs(1), "shutdown took {elapsed:?}");
            assert!(!flush.join().unwrap());
        });
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(pipeline.counters().dropped(DropReason::ShutdownTimeout), 1);
        assert!(exporter.records().is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn concurrent_shutdown_respects_its_own_timeout() {
        let exporter = InMemoryExporter::new().with_delay(Duration::from_secs(2));
        let pipeline = Pipeline::new(config(), Resource::new("svc"), exporter).unwrap();
        pipeline.start().unwrap();
        pipeline.submit(1u32);

        std::thread::scope(|scope| {
            let first = scope.spawn(|| pipeline.shutdown(Duration::from_millis(500)));
            std::thread::sleep(Duration::from_millis(50));

            let start = Instant::now();
            assert!(!pipeline.shutdown(Duration::from_millis(50)));
            assert!(start.elapsed() < Duration::from_millis(400));
            assert!(!first.join().unwrap());
        });
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn repeated_shutdown_returns_the_first_outcome() {
        let (pipeline, _exporter) = pipeline(PipelineConfig {
            batch_timeout_ms: 60_000,
            ..config()
        });
        pipeline.start().unwrap();
        pipeline.submit(1);
        pipeline.submit(2);
        pipeline.submit(3);
        assert!(!pipeline.shutdown(Duration::ZERO));
        assert!(!pipeline.shutdown(Duration::from_secs(5)));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn dropping_a_pipeline_reports_queued_records() {
        let observer = Arc::new(ExportCounters::new());
        let pipeline = Pipeline::with_observer(
            config(),
            Resource::new("svc"),
            InMemoryExporter::<u32>::new(),
            observer.clone(),
        )
        .unwrap();
        pipeline.submit(1);
        pipeline.submit(2);
        pipeline.submit(3);
        drop(pipeline);
        assert_eq!(
            observer.snapshot().dropped(DropReason::ShutdownTimeout),
            3
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn failed_exports_are_counted_and_do_not_halt() {
        let (pipeline, exporter) = pipeline(PipelineConfig {
            batch_timeout_ms: 60_000,
            ..config()
        });
        pipeline.start().unwrap();
        exporter.set_failing(true);
        pipeline.submit(1);
        assert!(!pipeline.force_flush(Duration::from_secs(5)));
        exporter.set_failing(false);
        pipeline.submit(2);
        assert!(pipeline.force_flush(Duration::from_secs(5)));
        assert!(pipeline.shutdown(Duration::from_secs(5)));

        let counters = pipeline.counters();
        assert_eq!(counters.batches_failed, 1);
        assert_eq!(counters.dropped(DropReason::Export), 1);
        assert_eq!(counters.records_exported, 1);
        assert_eq!(exporter.records(), [2]);
    }
}
