// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for `libdd-profiles-pipeline`.

use thiserror::Error;

/// A [`crate::ProfileRecord`] that breaks one of the record invariants.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has no samples")]
    NoSamples,

    #[error("sample {sample} has an empty stack")]
    EmptyStack { sample: usize },

    #[error("sample {sample} has a timestamp earlier than the sample before it")]
    NonMonotonicTimestamp { sample: usize },

    #[error("sample {sample} has {actual} values but the record declares {expected} sample types")]
    ValueCountMismatch {
        sample: usize,
        expected: usize,
        actual: usize,
    },
}

/// Errors that can occur while turning a batch into a payload.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The attribute value has no representation in the current wire schema:
    /// key-value lists, and arrays nested inside arrays.
    #[error("attribute {key:?} holds a {kind} value, which the wire schema cannot represent")]
    UnsupportedValueType { key: String, kind: &'static str },

    /// A profile has more distinct strings than a string index can address.
    #[error("string table overflow")]
    StringTableOverflow,

    #[error("I/O error while encoding: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while turning a payload back into a batch.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("required field {0} is missing")]
    MissingField(&'static str),

    #[error("{field} index {index} is out of range")]
    InvalidIndex { field: &'static str, index: u64 },

    #[error("{field} must be {expected} bytes long, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("decoded record is invalid: {0}")]
    InvalidRecord(#[from] ValidationError),

    #[error("malformed protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Errors raised by a [`crate::sender::Transport`] before a status code was
/// received.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The TCP/socket connection to the collector could not be established or
    /// was interrupted.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the per-request timeout.
    #[error("request timed out")]
    TimedOut,

    /// The request could not be built. Retrying would fail the same way.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_))
    }
}

/// The cause carried by a failed [`crate::ExportResult`].
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("collector rejected the payload with status {status}")]
    Rejected { status: u16 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("export deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("exporter is shut down")]
    Shutdown,

    #[error("{failed} of {total} exporters failed, first error: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: String,
    },
}

/// Invalid [`crate::PipelineConfig`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("batch_max_records ({batch}) must not exceed max_queue_size ({queue})")]
    BatchLargerThanQueue { batch: usize, queue: usize },

    #[error("base_backoff_ms ({base}) must not exceed max_backoff_ms ({max})")]
    BackoffRange { base: u64, max: u64 },

    #[error("jitter_fraction must be within [0, 1], got {0}")]
    Jitter(String),

    #[error("invalid endpoint {url:?}: {reason}")]
    Endpoint { url: String, reason: String },

    #[error("invalid header {name:?}")]
    Header { name: String },
}
