// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of encoded payloads, with retries and a deadline.

mod http;
mod retry;

pub use self::http::HttpTransport;
pub use retry::{is_retryable_status, RetryConfig};

use crate::encoder::EncodedPayload;
use crate::error::{ExportError, TransportError};
use crate::exporter::ExportResult;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Moves one payload to the collector and reports the response status.
///
/// Retries are the [Sender]'s job; a transport makes exactly one attempt per
/// call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &EncodedPayload) -> Result<u16, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, payload: &EncodedPayload) -> Result<u16, TransportError> {
        (**self).send(payload).await
    }
}

/// Sends payloads through a [Transport], retrying retryable failures with
/// exponential backoff.
pub struct Sender<T> {
    transport: T,
    retry: RetryConfig,
}

impl<T: Transport> Sender<T> {
    pub fn new(transport: T, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `payload`, giving up at `deadline`.
    ///
    /// # Returns
    ///
    /// - `Success` on a 2xx response.
    /// - `Failure { retryable: false }` on a non-retryable failure, after a
    ///   single attempt, or when the deadline passes. An attempt still in
    ///   flight at the deadline is abandoned.
    /// - `Failure { retryable: true }` when every retry failed with a
    ///   retryable failure.
    pub async fn send(&self, payload: &EncodedPayload, deadline: Instant) -> ExportResult {
        match tokio::time::timeout_at(deadline, self.send_with_retry(payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    records = payload.record_count(),
                    "Export deadline exceeded, abandoning payload"
                );
                ExportResult::Failure {
                    retryable: false,
                    cause: ExportError::DeadlineExceeded,
                }
            }
        }
    }

    async fn send_with_retry(&self, payload: &EncodedPayload) -> ExportResult {
        let max_retries = self.retry.max_retries;
        let mut retry = 0;

        debug!(
            payload_size = payload.bytes().len(),
            records = payload.record_count(),
            max_retries,
            "Sending with retry"
        );

        loop {
            let attempt = retry + 1;
            debug!(attempt, max_retries, "Attempting request");

            let cause = match self.transport.send(payload).await {
                Ok(status) if (200..300).contains(&status) => {
                    debug!(status, attempts = attempt, "Request succeeded");
                    return ExportResult::Success;
                }
                Ok(status) if is_retryable_status(status) => {
                    debug!(status, attempt, "Received retryable status code");
                    ExportError::Rejected { status }
                }
                Ok(status) => {
                    warn!(status, attempts = attempt, "Payload rejected by collector");
                    return ExportResult::Failure {
                        retryable: false,
                        cause: ExportError::Rejected { status },
                    };
                }
                Err(e) if e.is_retryable() => {
                    debug!(error = %e, attempt, "Request failed with error");
                    ExportError::Transport(e)
                }
                Err(e) => {
                    warn!(error = %e, attempts = attempt, "Request failed, not retrying");
                    return ExportResult::Failure {
                        retryable: false,
                        cause: ExportError::Transport(e),
                    };
                }
            };

            if retry >= max_retries {
                error!(
                    error = %cause,
                    attempts = attempt,
                    "Max retries exceeded, returning last error"
                );
                return ExportResult::Failure {
                    retryable: true,
                    cause,
                };
            }

            let delay = self.retry.delay_for_retry(retry);
            debug!(
                attempt,
                remaining_retries = max_retries - retry,
                delay_ms = delay.as_millis() as u64,
                "Retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
