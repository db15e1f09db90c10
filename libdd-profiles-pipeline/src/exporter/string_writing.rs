// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{BatchExporter, ExportResult};
use crate::batch::Batch;
use crate::error::ExportError;
use crate::record::{ProfileRecord, Resource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

type Consumer = Box<dyn Fn(&str) + Send + Sync>;

/// Writes a one-line summary of every record to a string consumer, such as
/// stdout or a logger.
///
/// With folding enabled, each distinct line of a batch is written once, in
/// the order it was first seen, followed by a space and the number of
/// records that produced it.
pub struct StringWritingExporter {
    consumer: Consumer,
    fold: bool,
    shut_down: AtomicBool,
}

impl StringWritingExporter {
    pub fn new(consumer: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            consumer: Box::new(consumer),
            fold: false,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Writes every line as an `info` event.
    pub fn logging() -> Self {
        Self::new(|line| info!(target: "libdd_profiles_pipeline::profiles", "{line}"))
    }

    pub fn fold(mut self, fold: bool) -> Self {
        self.fold = fold;
        self
    }

    fn write_unfolded(&self, batch: &Batch<ProfileRecord>) {
        let mut line = String::with_capacity(60);
        for record in batch.records() {
            line.clear();
            format_record(&mut line, batch.resource(), record);
            (self.consumer)(&line);
        }
    }

    fn write_folded(&self, batch: &Batch<ProfileRecord>) {
        let mut lines: Vec<(String, u64)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut line = String::with_capacity(60);
        for record in batch.records() {
            line.clear();
            format_record(&mut line, batch.resource(), record);
            match index.get(&line) {
                Some(&i) => lines[i].1 += 1,
                None => {
                    index.insert(line.clone(), lines.len());
                    lines.push((line.clone(), 1));
                }
            }
        }
        for (line, count) in lines {
            (self.consumer)(&format!("{line} {count}"));
        }
    }
}

/// `Profile [service:instance] type/unit=total ... samples=N {k=v, ...}`,
/// where each total is the sum of that value column over all samples.
fn format_record(out: &mut String, resource: &Resource, record: &ProfileRecord) {
    let _ = write!(
        out,
        "Profile [{}:{}]",
        resource.service_name(),
        resource.service_instance_id()
    );
    for (column, value_type) in record.sample_types().iter().enumerate() {
        let total = record
            .samples()
            .iter()
            .filter_map(|sample| sample.values.get(column))
            .fold(0i64, |acc, v| acc.saturating_add(*v));
        let _ = write!(out, " {}/{}={total}", value_type.r#type, value_type.unit);
    }
    let _ = write!(out, " samples={} {{", record.samples().len());
    for (i, kv) in record.attributes().iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{kv}");
    }
    out.push('}');
}

#[async_trait]
impl BatchExporter<ProfileRecord> for StringWritingExporter {
    async fn export(&self, batch: Batch<ProfileRecord>) -> ExportResult {
        if self.shut_down.load(Ordering::Acquire) {
            return ExportResult::Failure {
                retryable: false,
                cause: ExportError::Shutdown,
            };
        }
        if self.fold {
            self.write_folded(&batch);
        } else {
            self.write_unfolded(&batch);
        }
        ExportResult::Success
    }

    async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("String writing exporter already shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AnyValue, Frame, StackSample};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn record(values: [i64; 2], thread: &str) -> ProfileRecord {
        ProfileRecord::builder()
            .sample_type("cpu", "nanoseconds")
            .sample_type("wall", "nanoseconds")
            .sample(StackSample::new(
                vec![Frame::new("main", "main.rs", 1)],
                1,
                values.to_vec(),
            ))
            .sample(StackSample::new(
                vec![Frame::new("work", "main.rs", 9)],
                2,
                values.to_vec(),
            ))
            .attribute("thread.name", thread)
            .build()
            .unwrap()
    }

    fn batch(records: Vec<ProfileRecord>) -> Batch<ProfileRecord> {
        let resource = Resource::new("svc").with_instance_id("host-1");
        Batch::new(Arc::new(resource), records)
    }

    fn collecting(fold: bool) -> (StringWritingExporter, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let exporter =
            StringWritingExporter::new(move |line| sink.lock().push(line.to_owned())).fold(fold);
        (exporter, lines)
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn writes_one_line_per_record() {
        let (exporter, lines) = collecting(false);
        let batch = batch(vec![record([10, 20], "main"), record([10, 20], "main")]);
        assert!(exporter.export(batch).await.is_success());

        let expected = "Profile [svc:host-1] cpu/nanoseconds=20 wall/nanoseconds=40 samples=2 \
                        {thread.name=main}";
        assert_eq!(*lines.lock(), [expected, expected]);
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn folds_identical_lines() {
        let (exporter, lines) = collecting(true);
        let batch = batch(vec![
            record([1, 2], "a"),
            record([5, 5], "b"),
            record([1, 2], "a"),
        ]);
        assert!(exporter.export(batch).await.is_success());

        let lines = lines.lock();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("{thread.name=a} 2"), "{}", lines[0]);
        assert!(lines[1].ends_with("{thread.name=b} 1"), "{}", lines[1]);
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn formats_structured_attributes() {
        let (exporter, lines) = collecting(false);
        let record = ProfileRecord::builder()
            .sample(StackSample::new(vec![Frame::default()], 0, vec![]))
            .attribute("ids", vec![AnyValue::Int(1), AnyValue::Int(2)])
            .attribute("raw", vec![0xde_u8, 0xad])
            .build()
            .unwrap();
        assert!(exporter.export(batch(vec![record])).await.is_success());
        assert_eq!(
            *lines.lock(),
            ["Profile [svc:host-1] samples=1 {ids=[1, 2], raw=dead}"]
        );
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn export_after_shutdown_fails() {
        let (exporter, lines) = collecting(false);
        exporter.shutdown().await;
        exporter.shutdown().await;
        let result = exporter.export(batch(vec![record([1, 1], "main")])).await;
        assert!(matches!(result.cause(), Some(ExportError::Shutdown)));
        assert!(lines.lock().is_empty());
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn logging_exporter_accepts_batches() {
        let exporter = StringWritingExporter::logging().fold(true);
        let batch = batch(vec![record([1, 1], "main")]);
        assert!(exporter.export(batch).await.is_success());
    }
}
