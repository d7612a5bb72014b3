use crate::api::client::{ByteStream, MockStreamProducer};
use crate::types::ArgueRequest;
use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};

/// Replays canned NDJSON chunk lists, one list per request.
#[derive(Clone)]
pub struct MockArgueClient {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    questions: Arc<Mutex<Vec<String>>>,
    fail_after_chunks: Option<usize>,
}

impl MockArgueClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            questions: Arc::new(Mutex::new(Vec::new())),
            fail_after_chunks: None,
        }
    }

    /// Ends every stream with a transport error after `chunks` chunks.
    pub fn failing_after_chunks(mut self, chunks: usize) -> Self {
        self.fail_after_chunks = Some(chunks);
        self
    }

    pub fn recorded_questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

impl MockStreamProducer for MockArgueClient {
    fn create_mock_stream(&self, request: &ArgueRequest) -> Result<ByteStream> {
        self.questions.lock().unwrap().push(request.question.clone());

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!(
                "MockArgueClient: No more responses configured"
            ));
        }
        let chunks = responses_guard.remove(0);

        let mut byte_chunks: Vec<Result<Bytes>> = chunks
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk)))
            .collect();
        if let Some(limit) = self.fail_after_chunks {
            byte_chunks.truncate(limit);
            byte_chunks.push(Err(anyhow::anyhow!("MockArgueClient: connection reset")));
        }

        Ok(Box::pin(stream::iter(byte_chunks)))
    }
}
