// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Test doubles for exporters and transports.

use crate::batch::Batch;
use crate::encoder::EncodedPayload;
use crate::error::{ExportError, TransportError};
use crate::exporter::{BatchExporter, ExportResult};
use crate::sender::Transport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Keeps every exported batch in memory. Clones share the same storage.
pub struct InMemoryExporter<R> {
    batches: Arc<Mutex<Vec<Batch<R>>>>,
    delay: Option<Duration>,
    fail: Arc<AtomicBool>,
}

impl<R> Clone for InMemoryExporter<R> {
    fn clone(&self) -> Self {
        Self {
            batches: self.batches.clone(),
            delay: self.delay,
            fail: self.fail.clone(),
        }
    }
}

impl<R> Default for InMemoryExporter<R> {
    fn default() -> Self {
        Self {
            batches: Arc::default(),
            delay: None,
            fail: Arc::default(),
        }
    }
}

impl<R: Clone> InMemoryExporter<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each export sleeps for `delay` before it completes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// While set, exports fail with a retryable error and store nothing.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Batch<R>> {
        self.batches.lock().clone()
    }

    /// Records of all exported batches, in export order.
    pub fn records(&self) -> Vec<R> {
        self.batches
            .lock()
            .iter()
            .flat_map(|batch| batch.records().iter().cloned())
            .collect()
    }
}

#[async_trait]
impl<R: Send + 'static> BatchExporter<R> for InMemoryExporter<R> {
    async fn export(&self, batch: Batch<R>) -> ExportResult {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return ExportResult::Failure {
                retryable: true,
                cause: ExportError::Transport(TransportError::Network(
                    "in-memory exporter set to fail".to_owned(),
                )),
            };
        }
        self.batches.lock().push(batch);
        ExportResult::Success
    }
}

/// Replies to each send with the next scripted response.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<u16, TransportError>>>,
    fallback: Option<Result<u16, TransportError>>,
    latency: Option<Duration>,
    attempts: AtomicUsize,
}

impl ScriptedTransport {
    /// Once `responses` runs out, every send fails with a network error.
    pub fn new(responses: impl IntoIterator<Item = Result<u16, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            fallback: None,
            latency: None,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Replies to every send with `response`.
    pub fn repeating(response: Result<u16, TransportError>) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _payload: &EncodedPayload) -> Result<u16, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.responses.lock().pop_front();
        next.or_else(|| self.fallback.clone()).unwrap_or_else(|| {
            Err(TransportError::Network(
                "no scripted response left".to_owned(),
            ))
        })
    }
}
