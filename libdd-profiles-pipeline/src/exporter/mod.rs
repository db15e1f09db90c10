// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod string_writing;

pub use string_writing::StringWritingExporter;

use crate::batch::Batch;
use crate::config::PipelineConfig;
use crate::encoder::{Encoder, ProfilesEncoder};
use crate::error::ExportError;
use crate::sender::{HttpTransport, Sender, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of exporting one batch.
#[derive(Debug)]
pub enum ExportResult {
    Success,
    Failure {
        /// Whether sending the same batch again later could succeed.
        retryable: bool,
        cause: ExportError,
    },
}

impl ExportResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExportResult::Success)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExportResult::Failure {
                retryable: true,
                ..
            }
        )
    }

    pub fn cause(&self) -> Option<&ExportError> {
        match self {
            ExportResult::Success => None,
            ExportResult::Failure { cause, .. } => Some(cause),
        }
    }
}

/// Delivers batches somewhere. The pipeline worker calls `export` for one
/// batch at a time and never concurrently.
#[async_trait]
pub trait BatchExporter<R>: Send + Sync {
    async fn export(&self, batch: Batch<R>) -> ExportResult;

    /// Releases resources. Exports after shutdown fail with
    /// [`ExportError::Shutdown`].
    async fn shutdown(&self) {}
}

/// Encodes each batch and hands the payload to a [Sender].
pub struct EncodingExporter<E, T> {
    encoder: E,
    sender: Sender<T>,
    export_timeout: Duration,
    shut_down: AtomicBool,
}

/// The exporter a [`crate::Pipeline`] of profile records uses by default.
pub type ProfilesExporter = EncodingExporter<ProfilesEncoder, HttpTransport>;

impl<E, T> EncodingExporter<E, T> {
    /// `export_timeout` bounds each export, retries included.
    pub fn new(encoder: E, sender: Sender<T>, export_timeout: Duration) -> Self {
        Self {
            encoder,
            sender,
            export_timeout,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn sender(&self) -> &Sender<T> {
        &self.sender
    }
}

impl ProfilesExporter {
    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(
            ProfilesEncoder,
            Sender::new(transport, config.retry_config()),
            config.export_timeout(),
        ))
    }
}

#[async_trait]
impl<R, E, T> BatchExporter<R> for EncodingExporter<E, T>
where
    R: Send + Sync + 'static,
    E: Encoder<R>,
    T: Transport,
{
    async fn export(&self, batch: Batch<R>) -> ExportResult {
        if self.shut_down.load(Ordering::Acquire) {
            return ExportResult::Failure {
                retryable: false,
                cause: ExportError::Shutdown,
            };
        }
        let deadline = tokio::time::Instant::now() + self.export_timeout;
        let payload = match self.encoder.encode(&batch) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, records = batch.len(), "Failed to encode batch");
                return ExportResult::Failure {
                    retryable: false,
                    cause: e.into(),
                };
            }
        };
        debug!(
            records = payload.record_count(),
            bytes = payload.bytes().len(),
            "Encoded batch"
        );
        self.sender.send(&payload, deadline).await
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }
}

/// Exports every batch to all of its children, one after the other.
///
/// The result is a success only if every child succeeded. A failure is
/// retryable only if every failing child reported a retryable failure.
pub struct MultiExporter<R> {
    exporters: Vec<Box<dyn BatchExporter<R>>>,
}

impl<R> MultiExporter<R> {
    pub fn new(exporters: Vec<Box<dyn BatchExporter<R>>>) -> Self {
        Self { exporters }
    }
}

#[async_trait]
impl<R> BatchExporter<R> for MultiExporter<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn export(&self, batch: Batch<R>) -> ExportResult {
        let total = self.exporters.len();
        let mut failed = 0;
        let mut retryable = true;
        let mut first = None;
        for exporter in &self.exporters {
            if let ExportResult::Failure {
                retryable: child_retryable,
                cause,
            } = exporter.export(batch.clone()).await
            {
                failed += 1;
                retryable &= child_retryable;
                first.get_or_insert(cause);
            }
        }
        match first {
            None => ExportResult::Success,
            Some(cause) if total == 1 => ExportResult::Failure { retryable, cause },
            Some(cause) => ExportResult::Failure {
                retryable,
                cause: ExportError::Partial {
                    failed,
                    total,
                    first: cause.to_string(),
                },
            },
        }
    }

    async fn shutdown(&self) {
        for exporter in &self.exporters {
            exporter.shutdown().await;
        }
    }
}

/// Accepts and discards every batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopExporter;

#[async_trait]
impl<R: Send + 'static> BatchExporter<R> for NoopExporter {
    async fn export(&self, _batch: Batch<R>) -> ExportResult {
        ExportResult::Success
    }
}
