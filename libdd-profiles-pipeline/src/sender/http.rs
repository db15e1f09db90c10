// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! reqwest-based [Transport] posting payloads to an OTLP-style collector.

use super::Transport;
use crate::config::{Compression, PipelineConfig};
use crate::encoder::{EncodedPayload, SCHEMA_VERSION_HEADER};
use crate::error::TransportError;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use std::io::Write;
use std::sync::Once;
use tracing::debug;

pub const DATADOG_API_KEY: HeaderName = HeaderName::from_static("dd-api-key");

const USER_AGENT: &str = concat!("libdd-profiles-pipeline/", env!("CARGO_PKG_VERSION"));

/// Posts each payload to the configured endpoint.
///
/// Holds a connection-pooling client reused across all requests. The client
/// timeout is the export timeout, so a single stuck request can never outlive
/// the export deadline.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
    compression: Compression,
}

/// reqwest is built with `rustls-no-provider`, so its client builder panics
/// unless a process-wide rustls provider exists. Installs ring unless the
/// host already installed one.
fn init_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        #[cfg(feature = "https")]
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            // Losing a race with another installer is fine.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
    });
}

impl HttpTransport {
    pub fn new(config: &PipelineConfig) -> anyhow::Result<Self> {
        let url = reqwest::Url::parse(&config.endpoint)
            .with_context(|| format!("invalid endpoint {:?}", config.endpoint))?;

        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(api_key).context("invalid api key")?;
            value.set_sensitive(true);
            headers.insert(DATADOG_API_KEY, value);
        }
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            headers.insert(name, value);
        }

        init_crypto_provider();
        let client = reqwest::Client::builder()
            .timeout(config.export_timeout())
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            url,
            compression: config.compression,
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &EncodedPayload) -> Result<u16, TransportError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static(payload.content_type()))
            .header(
                SCHEMA_VERSION_HEADER,
                HeaderValue::from(payload.schema_version()),
            );

        let body = match self.compression {
            Compression::None => payload.bytes().clone(),
            Compression::Gzip => {
                request = request.header(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                gzip(payload.bytes())
                    .map(Bytes::from)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?
            }
        };
        debug!(
            url = %self.url,
            body_size = body.len(),
            "Posting payload"
        );

        let response = request.body(body).send().await.map_err(map_reqwest_error)?;
        Ok(response.status().as_u16())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::TimedOut
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}
