// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Export pipeline for profiling records.
//!
//! Producer threads [offer](Pipeline::offer) [ProfileRecord]s to a
//! [Pipeline]. A background worker drains its bounded queue into [Batch]es,
//! either when `batch_max_records` records are waiting or when
//! `batch_timeout_ms` elapses, encodes each batch into the versioned protobuf
//! wire schema and posts it to a collector, retrying transient failures with
//! exponential backoff until the export deadline.
//!
//! Delivery is best-effort. Nothing is persisted, and every record that is
//! not delivered is counted by reason through a [PipelineObserver].
//!
//! ```no_run
//! use libdd_profiles_pipeline::{Frame, Pipeline, PipelineConfig, ProfileRecord, Resource, StackSample};
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let pipeline = Pipeline::profiles(PipelineConfig::default(), Resource::new("my-service"))?;
//! pipeline.start()?;
//!
//! let record = ProfileRecord::builder()
//!     .sample_type("cpu", "nanoseconds")
//!     .sample(StackSample::new(vec![Frame::new("main", "main.rs", 12)], 0, vec![10_000]))
//!     .build()?;
//! pipeline.submit(record);
//!
//! pipeline.shutdown(Duration::from_secs(5));
//! # Ok(())
//! # }
//! ```

mod batch;
pub mod config;
pub mod encoder;
pub mod error;
pub mod exporter;
pub mod observer;
mod pipeline;
pub mod queue;
pub mod record;
pub mod sender;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use batch::Batch;
pub use config::{Compression, DropPolicy, PipelineConfig};
pub use encoder::{decode, EncodedPayload, Encoder, ProfilesEncoder};
pub use error::{
    ConfigError, DecodeError, EncodeError, ExportError, TransportError, ValidationError,
};
pub use exporter::{
    BatchExporter, EncodingExporter, ExportResult, MultiExporter, NoopExporter, ProfilesExporter,
    StringWritingExporter,
};
pub use observer::{CountersSnapshot, DropReason, ExportCounters, PipelineObserver};
pub use pipeline::{Pipeline, PipelineState, SimplePipeline};
pub use record::{
    AnyValue, Frame, KeyValue, ProfileRecord, ProfileRecordBuilder, RecordLimits, Resource,
    SpanContext, StackSample, ValueType,
};
pub use sender::{HttpTransport, RetryConfig, Sender, Transport};
