// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{report, Observers};
use crate::batch::Batch;
use crate::config::PipelineConfig;
use crate::error::ExportError;
use crate::exporter::{BatchExporter, ExportResult, ProfilesExporter};
use crate::observer::{CountersSnapshot, DropReason, ExportCounters, PipelineObserver};
use crate::record::{ProfileRecord, Resource};
use anyhow::Context;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Exports every record on the calling thread, as a batch of one, before
/// returning. There is no queue and no background worker.
///
/// Most collectors handle single-record requests poorly; this is meant for
/// tests and for processes that emit a handful of records. Use [`super::Pipeline`]
/// otherwise.
///
/// Exports run on a private current-thread runtime, so [SimplePipeline::export]
/// must not be called from within an async context. Concurrent calls are
/// serialized.
pub struct SimplePipeline<R> {
    exporter: Box<dyn BatchExporter<R>>,
    resource: Arc<Resource>,
    runtime: Runtime,
    counters: Arc<ExportCounters>,
    observer: Arc<dyn PipelineObserver>,
    export_timeout: Duration,
    in_flight: Mutex<()>,
    shut_down: AtomicBool,
    shutdown_outcome: Mutex<Option<bool>>,
}

impl SimplePipeline<ProfileRecord> {
    /// Exports profile records over HTTP as configured. Only the endpoint,
    /// transport and retry settings of `config` apply.
    pub fn profiles(config: PipelineConfig, resource: Resource) -> anyhow::Result<Self> {
        config
            .validate()
            .context("invalid pipeline configuration")?;
        let exporter =
            ProfilesExporter::from_config(&config).context("failed to create profiles exporter")?;
        Ok(Self::new(resource, exporter)?.with_export_timeout(config.export_timeout()))
    }
}

impl<R: Send + 'static> SimplePipeline<R> {
    pub fn new(
        resource: Resource,
        exporter: impl BatchExporter<R> + 'static,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build export runtime")?;
        let counters = Arc::new(ExportCounters::new());
        Ok(Self {
            exporter: Box::new(exporter),
            resource: Arc::new(resource),
            runtime,
            observer: Arc::new(Observers {
                counters: counters.clone(),
                extra: None,
            }),
            counters,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
            in_flight: Mutex::new(()),
            shut_down: AtomicBool::new(false),
            shutdown_outcome: Mutex::new(None),
        })
    }

    /// Bounds each export, retries included.
    pub fn with_export_timeout(mut self, export_timeout: Duration) -> Self {
        self.export_timeout = export_timeout;
        self
    }

    /// Also reports every outcome to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Arc::new(Observers {
            counters: self.counters.clone(),
            extra: Some(observer),
        });
        self
    }

    /// Exports `record` and waits for the result.
    pub fn export(&self, record: R) -> ExportResult {
        let _guard = self.in_flight.lock();
        if self.shut_down.load(Ordering::Acquire) {
            debug!("Dropped record offered after shutdown");
            self.observer.records_dropped(1, DropReason::Stopped);
            return ExportResult::Failure {
                retryable: false,
                cause: ExportError::Shutdown,
            };
        }
        let batch = Batch::new(self.resource.clone(), vec![record]);
        let export = tokio::time::timeout(self.export_timeout, self.exporter.export(batch));
        let result = self
            .runtime
            .block_on(export)
            .unwrap_or(ExportResult::Failure {
                retryable: false,
                cause: ExportError::DeadlineExceeded,
            });
        report(self.observer.as_ref(), 1, &result);
        result
    }

    /// Fire-and-forget [SimplePipeline::export].
    pub fn submit(&self, record: R) {
        let _ = self.export(record);
    }

    /// Waits up to `timeout` for an export running on another thread.
    pub fn force_flush(&self, timeout: Duration) -> bool {
        self.in_flight.try_lock_for(timeout).is_some()
    }

    /// Rejects further records, waits for an in-flight export and shuts the
    /// exporter down, all within `timeout`. Later calls return the outcome of
    /// the first one.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Some(mut outcome) = self.shutdown_outcome.try_lock_until(deadline) else {
            return false;
        };
        if let Some(done) = *outcome {
            return done;
        }
        self.shut_down.store(true, Ordering::Release);

        let done = match self.in_flight.try_lock_until(deadline) {
            Some(_guard) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                self.runtime
                    .block_on(tokio::time::timeout(remaining, self.exporter.shutdown()))
                    .is_ok()
            }
            None => {
                warn!("Shutdown deadline exceeded while an export was in flight");
                false
            }
        };
        *outcome = Some(done);
        done
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }
}
