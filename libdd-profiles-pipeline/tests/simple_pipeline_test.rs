// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libdd_profiles_pipeline::{
    Frame, ProfileRecord, Resource, SimplePipeline, StackSample, StringWritingExporter,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn record(cpu: i64) -> ProfileRecord {
    ProfileRecord::builder()
        .sample_type("cpu", "nanoseconds")
        .sample(StackSample::new(
            vec![Frame::new("main", "main.rs", 3)],
            0,
            vec![cpu],
        ))
        .attribute("thread.name", "main")
        .build()
        .unwrap()
}

#[test]
#[cfg_attr(miri, ignore)]
fn writes_each_record_as_it_is_exported() {
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = lines.clone();
    let exporter = StringWritingExporter::new(move |line| sink.lock().push(line.to_owned()));
    let pipeline = SimplePipeline::new(Resource::new("svc"), exporter).unwrap();

    assert!(pipeline.export(record(5)).is_success());
    assert_eq!(lines.lock().len(), 1);
    pipeline.submit(record(7));

    assert_eq!(
        *lines.lock(),
        [
            "Profile [svc:] cpu/nanoseconds=5 samples=1 {thread.name=main}",
            "Profile [svc:] cpu/nanoseconds=7 samples=1 {thread.name=main}",
        ]
    );
    assert!(pipeline.shutdown(Duration::from_secs(5)));
    assert!(!pipeline.export(record(9)).is_success());
    assert_eq!(lines.lock().len(), 2);
    assert_eq!(pipeline.counters().records_exported, 2);
}
