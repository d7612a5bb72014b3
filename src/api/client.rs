use super::in_flight::InFlightGuard;
use super::logging::{debug_payload_enabled, emit_debug_payload};
use super::stream::{aggregate_stream, AggregatorEvent};
use crate::config::Config;
use crate::error::ArgueError;
use crate::types::{ArgueRequest, ArgueResponse};
use crate::util::is_local_endpoint_url;
use anyhow::anyhow;
use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;
use tokio::sync::mpsc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, request: &ArgueRequest) -> Result<ByteStream>;
}

/// Client for the argument-generation worker. Each client allows one
/// outstanding `argue` call at a time.
#[derive(Clone)]
pub struct ArgueClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    capsule_id: Option<String>,
    in_flight: InFlightGuard,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ArgueClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            capsule_id: config.capsule_id.clone(),
            in_flight: InFlightGuard::new(),
            #[cfg(test)]
            mock_stream_producer: None,
        })
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
            api_url: "http://localhost:8080/api/argue".to_string(),
            capsule_id: Some("capsule-test".to_string()),
            in_flight: InFlightGuard::new(),
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_busy()
    }

    /// Asks `question`, streams the answer and returns the aggregated result.
    ///
    /// Incremental deltas and upstream error notices go to `events_tx` as they
    /// arrive. A transport failure is returned as `ArgueError::Stream` with
    /// the partial text attached.
    pub async fn argue(
        &self,
        question: &str,
        events_tx: Option<&mpsc::UnboundedSender<AggregatorEvent>>,
    ) -> std::result::Result<ArgueResponse, ArgueError> {
        let Some(_ticket) = self.in_flight.try_acquire() else {
            return Err(ArgueError::RequestInFlight);
        };

        let request = ArgueRequest {
            question: question.to_string(),
            capsule_id: self.capsule_id.clone(),
        };
        let stream = self.create_stream(&request).await?;
        let aggregate = aggregate_stream(stream, events_tx).await?;

        Ok(ArgueResponse::from_aggregate(
            aggregate,
            request.question,
            request.capsule_id,
        ))
    }

    pub async fn create_stream(&self, request: &ArgueRequest) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(request);
            }
        }

        let payload = serde_json::to_value(request)?;
        if debug_payload_enabled() {
            emit_debug_payload(&self.api_url, &payload);
        }

        let mut http_request = self
            .http
            .post(&self.api_url)
            .header("content-type", "application/json")
            .header("accept", "application/x-ndjson")
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.header("authorization", format!("Bearer {api_key}"));
        }

        let response = http_request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &self.api_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &self.api_url))?;

        let request_url_for_stream = self.api_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local argue endpoint '{}': {}. Start the worker or update ARGUE_API_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach argue endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("argue request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "argue endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("argue request to '{}' failed: {}", request_url, error)
}
