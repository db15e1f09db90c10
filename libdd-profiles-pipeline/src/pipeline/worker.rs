// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::Shared;
use crate::batch::Batch;
use crate::error::ExportError;
use crate::exporter::{BatchExporter, ExportResult};
use crate::observer::DropReason;
use crate::record::Resource;
use anyhow::Context;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Requests from the pipeline to its worker. Deadlines are wall-clock
/// instants shared by both sides; the reply carries whether everything
/// queued was exported.
pub(super) enum Control {
    Flush {
        deadline: std::time::Instant,
        reply: crossbeam_channel::Sender<bool>,
    },
    Shutdown {
        deadline: std::time::Instant,
        reply: crossbeam_channel::Sender<bool>,
    },
}

pub(super) struct WorkerSettings {
    pub batch_max_records: usize,
    pub batch_timeout: Duration,
    pub export_timeout: Duration,
}

struct Worker<R> {
    shared: Arc<Shared<R>>,
    exporter: Box<dyn BatchExporter<R>>,
    resource: Arc<Resource>,
    settings: WorkerSettings,
    cancel: CancellationToken,
}

/// The pipeline's side of a running worker thread.
pub(super) struct WorkerHandle {
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    thread: JoinHandle<anyhow::Result<()>>,
}

impl WorkerHandle {
    pub(super) fn spawn<R: Send + 'static>(
        shared: Arc<Shared<R>>,
        exporter: Box<dyn BatchExporter<R>>,
        resource: Arc<Resource>,
        settings: WorkerSettings,
    ) -> anyhow::Result<Self> {
        let (control, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = Worker {
            shared,
            exporter,
            resource,
            settings,
            cancel: cancel.clone(),
        };
        let thread = std::thread::Builder::new()
            .name("dd-profiles-export".to_owned())
            .spawn(move || -> anyhow::Result<()> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(worker.run(receiver));
                Ok(())
            })
            .context("failed to spawn export worker thread")?;
        Ok(Self {
            control,
            cancel,
            thread,
        })
    }

    /// A handle for flush requests that can be used after the pipeline's
    /// worker lock is released.
    pub(super) fn flusher(&self) -> Flusher {
        Flusher {
            control: self.control.clone(),
        }
    }

    /// Runs the final flush and stops the worker. If the flush has not
    /// finished by `deadline`, the worker is cancelled and whatever it was
    /// exporting is dropped.
    pub(super) fn shutdown(self, deadline: std::time::Instant) -> bool {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        let delivered = self
            .control
            .send(Control::Shutdown { deadline, reply })
            .is_ok()
            && match receiver
                .recv_timeout(deadline.saturating_duration_since(std::time::Instant::now()))
            {
                Ok(delivered) => delivered,
                Err(_) => {
                    warn!("Shutdown deadline exceeded, cancelling export worker");
                    false
                }
            };

        self.cancel.cancel();
        match self.thread.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Export worker failed"),
            Err(_) => error!("Export worker panicked"),
        }
        delivered
    }

    /// Stops the worker at its next await point without waiting for it.
    pub(super) fn cancel(&self) {
        self.cancel.cancel();
    }
}

pub(super) struct Flusher {
    control: mpsc::UnboundedSender<Control>,
}

impl Flusher {
    /// Asks the worker to export everything queued and waits for it until
    /// `deadline`. Returns false if the worker stopped first.
    pub(super) fn flush(&self, deadline: std::time::Instant) -> bool {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        if self.control.send(Control::Flush { deadline, reply }).is_err() {
            return false;
        }
        receiver
            .recv_timeout(deadline.saturating_duration_since(std::time::Instant::now()))
            .unwrap_or(false)
    }
}

impl<R: Send + 'static> Worker<R> {
    async fn run(self, mut control: mpsc::UnboundedReceiver<Control>) {
        let mut next_export = Instant::now() + self.settings.batch_timeout;
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Export worker cancelled");
                    break;
                }
                msg = control.recv() => match msg {
                    Some(Control::Flush { deadline, reply }) => {
                        let delivered = self.flush_until(Instant::from_std(deadline)).await;
                        let _ = reply.send(delivered);
                        next_export = Instant::now() + self.settings.batch_timeout;
                    }
                    Some(Control::Shutdown { deadline, reply }) => {
                        let deadline = Instant::from_std(deadline);
                        let delivered = self.flush_until(deadline).await;
                        let discarded = self
                            .shared
                            .queue
                            .discard_all(DropReason::ShutdownTimeout);
                        if discarded > 0 {
                            warn!(
                                records = discarded,
                                "Shutdown deadline exceeded, dropping queued records"
                            );
                        }
                        let exporter_shutdown =
                            tokio::time::timeout_at(deadline, self.exporter.shutdown());
                        let _ = self.cancel.run_until_cancelled(exporter_shutdown).await;
                        let _ = reply.send(delivered && discarded == 0);
                        break;
                    }
                    None => break,
                },
                _ = self.shared.notify.notified() => {
                    while self.shared.queue.size() >= self.settings.batch_max_records
                        && !self.cancel.is_cancelled()
                    {
                        let records = self.shared.queue.drain(self.settings.batch_max_records);
                        let deadline = Instant::now() + self.settings.export_timeout;
                        self.export(records, deadline).await;
                    }
                    next_export = Instant::now() + self.settings.batch_timeout;
                }
                _ = tokio::time::sleep_until(next_export) => {
                    self.export_queued().await;
                    next_export = Instant::now() + self.settings.batch_timeout;
                }
            }
        }
    }

    /// Exports what was queued when the timer fired, in batches of at most
    /// `batch_max_records`.
    async fn export_queued(&self) {
        let mut remaining = self.shared.queue.size();
        while remaining > 0 && !self.cancel.is_cancelled() {
            let records = self
                .shared
                .queue
                .drain(remaining.min(self.settings.batch_max_records));
            if records.is_empty() {
                break;
            }
            remaining -= records.len();
            self.export(records, Instant::now() + self.settings.export_timeout)
                .await;
        }
    }

    /// Exports until the queue is empty or `deadline` passes. Records still
    /// queued at the deadline stay in the queue.
    async fn flush_until(&self, deadline: Instant) -> bool {
        let mut delivered = true;
        loop {
            if self.shared.queue.is_empty() {
                return delivered;
            }
            if self.cancel.is_cancelled() || Instant::now() >= deadline {
                return false;
            }
            let records = self.shared.queue.drain(self.settings.batch_max_records);
            let export_deadline = deadline.min(Instant::now() + self.settings.export_timeout);
            delivered &= self.export(records, export_deadline).await;
        }
    }

    async fn export(&self, records: Vec<R>, deadline: Instant) -> bool {
        let count = records.len();
        let batch = Batch::new(self.resource.clone(), records);
        debug!(records = count, "Exporting batch");

        let export = tokio::time::timeout_at(deadline, self.exporter.export(batch));
        let result = match self.cancel.run_until_cancelled(export).await {
            Some(Ok(result)) => result,
            Some(Err(_)) => ExportResult::Failure {
                retryable: false,
                cause: ExportError::DeadlineExceeded,
            },
            None => {
                warn!(
                    records = count,
                    "Export cancelled by shutdown, dropping in-flight records"
                );
                self.shared
                    .observer
                    .records_dropped(count as u64, DropReason::ShutdownTimeout);
                return false;
            }
        };
        super::report(self.shared.observer.as_ref(), count, &result);
        result.is_success()
    }
}
