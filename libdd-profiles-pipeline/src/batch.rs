// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::record::Resource;
use std::sync::Arc;

/// Records drained from the queue together, in the order they were offered,
/// paired with the pipeline's resource. A batch is moved into the exporter
/// and never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch<R> {
    resource: Arc<Resource>,
    records: Vec<R>,
}

impl<R> Batch<R> {
    pub fn new(resource: Arc<Resource>, records: Vec<R>) -> Self {
        Self { resource, records }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}
