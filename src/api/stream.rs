use super::logging::{emit_record_parse_error, emit_unrecognized_record, emit_upstream_error};
use crate::error::StreamError;
use crate::types::{
    parse_nested_reasoning, AggregatedText, StreamRecord, WireRecord, NO_RELEVANT_CONTEXT,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

/// Incremental notifications emitted while records are folded, in record order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorEvent {
    ChatDelta(String),
    ReasoningReplaced(String),
    UpstreamError(String),
}

/// Stateful UTF-8 decoder: an incomplete code point at the end of one chunk
/// is held until the next chunk completes it. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);
        let mut consumed = 0;

        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(error) => {
                    let valid_end = consumed + error.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_end]));
                    match error.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + invalid_len;
                        }
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
    }

    fn flush(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}

/// Folds a newline-delimited JSON record stream into the chat and reasoning
/// channels. One aggregator serves exactly one logical request and must be
/// fed sequentially.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    decoder: Utf8Decoder,
    line_buffer: String,
    /// Prefix of `line_buffer` already known to hold no newline.
    scanned: usize,
    chat: String,
    reasoning: String,
    events_tx: Option<mpsc::UnboundedSender<AggregatorEvent>>,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events_tx: mpsc::UnboundedSender<AggregatorEvent>) -> Self {
        Self {
            events_tx: Some(events_tx),
            ..Self::default()
        }
    }

    pub fn ingest(&mut self, chunk: &[u8]) {
        self.decoder.decode(chunk, &mut self.line_buffer);

        let mut buffer = std::mem::take(&mut self.line_buffer);
        let mut consumed = 0;
        let mut scan_from = self.scanned;
        while let Some(offset) = buffer[scan_from..].find('\n') {
            let end = scan_from + offset;
            self.process_line(&buffer[consumed..end]);
            consumed = end + 1;
            scan_from = consumed;
        }
        buffer.drain(..consumed);
        self.scanned = buffer.len();
        self.line_buffer = buffer;
    }

    /// Flushes held bytes, parses an unterminated trailing line if any, and
    /// returns the trimmed channels.
    pub fn finish(mut self) -> AggregatedText {
        self.decoder.flush(&mut self.line_buffer);
        let trailing = std::mem::take(&mut self.line_buffer);
        for line in trailing.split('\n') {
            self.process_line(line);
        }
        self.snapshot()
    }

    /// Trimmed view of what has been folded so far. The unterminated
    /// trailing line, if any, is not included.
    pub fn snapshot(&self) -> AggregatedText {
        AggregatedText {
            chat: self.chat.trim().to_string(),
            reasoning: self.reasoning.trim().to_string(),
        }
    }

    pub fn apply(&mut self, record: StreamRecord) {
        match record {
            StreamRecord::Filtered { content } => {
                if content.is_empty() || content.contains(NO_RELEVANT_CONTEXT) {
                    return;
                }
                // Filtered content always wins over whatever reasoning is set.
                let reasoning = parse_nested_reasoning(&content).into_text();
                self.reasoning = reasoning.clone();
                self.emit(AggregatorEvent::ReasoningReplaced(reasoning));
            }
            StreamRecord::Response {
                chat_delta,
                reasoning_full,
            } => {
                if !chat_delta.is_empty() {
                    self.chat.push_str(&chat_delta);
                    self.emit(AggregatorEvent::ChatDelta(chat_delta));
                }
                if let Some(reasoning) = reasoning_full {
                    if self.reasoning.is_empty() {
                        self.reasoning = reasoning.clone();
                        self.emit(AggregatorEvent::ReasoningReplaced(reasoning));
                    }
                }
            }
            StreamRecord::Error { message } => {
                emit_upstream_error(&message);
                self.emit(AggregatorEvent::UpstreamError(message));
            }
            StreamRecord::Unrecognized => {}
        }
    }

    fn process_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let value = match serde_json::from_str::<Value>(line) {
            Ok(value) => value,
            Err(error) => {
                emit_record_parse_error(line, &error);
                return;
            }
        };

        let record = match serde_json::from_value::<WireRecord>(value) {
            Ok(wire) => StreamRecord::from(wire),
            Err(_) => StreamRecord::Unrecognized,
        };
        if record == StreamRecord::Unrecognized {
            emit_unrecognized_record(line);
            return;
        }
        self.apply(record);
    }

    fn emit(&self, event: AggregatorEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }
}

/// Drives a transport stream through a fresh aggregator until it ends.
///
/// A transport error aborts consumption and is returned with the partial
/// text accumulated so far.
pub async fn aggregate_stream<S>(
    mut stream: S,
    events_tx: Option<&mpsc::UnboundedSender<AggregatorEvent>>,
) -> Result<AggregatedText, StreamError>
where
    S: Stream<Item = anyhow::Result<Bytes>> + Unpin,
{
    let mut aggregator = match events_tx {
        Some(tx) => StreamAggregator::with_events(tx.clone()),
        None => StreamAggregator::new(),
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => aggregator.ingest(&chunk),
            Err(error) => {
                return Err(StreamError::transport(
                    format!("{error:#}"),
                    aggregator.snapshot(),
                ));
            }
        }
    }

    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn feed(lines: &[&str]) -> AggregatedText {
        let mut aggregator = StreamAggregator::new();
        for line in lines {
            aggregator.ingest(line.as_bytes());
            aggregator.ingest(b"\n");
        }
        aggregator.finish()
    }

    #[test]
    fn test_utf8_decoder_holds_split_code_point() {
        let mut decoder = Utf8Decoder::default();
        let mut out = String::new();
        let bytes = "é".as_bytes();
        decoder.decode(&bytes[..1], &mut out);
        assert_eq!(out, "");
        decoder.decode(&bytes[1..], &mut out);
        assert_eq!(out, "é");
    }

    #[test]
    fn test_utf8_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        let mut out = String::new();
        decoder.decode(b"a\xffb", &mut out);
        assert_eq!(out, "a\u{FFFD}b");

        decoder.decode(b"\xe2\x82", &mut out);
        decoder.flush(&mut out);
        assert_eq!(out, "a\u{FFFD}b\u{FFFD}");
    }

    #[test]
    fn test_filtered_record_overwrites_reasoning() {
        let result = feed(&[
            r#"{"type":"response","content":{"reasoning":"first"}}"#,
            r#"{"type":"filtered","content":"second"}"#,
        ]);
        assert_eq!(result.reasoning, "second");
    }

    #[test]
    fn test_empty_filtered_content_is_ignored() {
        let result = feed(&[
            r#"{"type":"filtered","content":"kept"}"#,
            r#"{"type":"filtered","content":""}"#,
            r#"{"type":"filtered"}"#,
        ]);
        assert_eq!(result.reasoning, "kept");
    }

    #[test]
    fn test_response_without_content_is_skipped() {
        let result = feed(&[
            r#"{"type":"response"}"#,
            r#"{"type":"response","content":{"chat":"ok"}}"#,
        ]);
        assert_eq!(result.chat, "ok");
    }

    #[test]
    fn test_events_follow_record_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut aggregator = StreamAggregator::with_events(tx);
        aggregator.ingest(
            concat!(
                r#"{"type":"response","content":{"chat":"A","reasoning":"R"}}"#,
                "\n",
                r#"{"type":"error","content":"rate limited"}"#,
                "\n",
                r#"{"type":"response","content":{"chat":"B"}}"#,
                "\n",
            )
            .as_bytes(),
        );
        let result = aggregator.finish();

        assert_eq!(rx.try_recv().unwrap(), AggregatorEvent::ChatDelta("A".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            AggregatorEvent::ReasoningReplaced("R".to_string())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            AggregatorEvent::UpstreamError("rate limited".to_string())
        );
        assert_eq!(rx.try_recv().unwrap(), AggregatorEvent::ChatDelta("B".to_string()));
        assert_eq!(result.chat, "AB");
    }

    #[test]
    fn test_events_to_dropped_receiver_are_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut aggregator = StreamAggregator::with_events(tx);
        aggregator.ingest(b"{\"type\":\"response\",\"content\":{\"chat\":\"still\"}}\n");
        assert_eq!(aggregator.finish().chat, "still");
    }

    #[test]
    fn test_ingest_resumes_scan_after_pending_partial_line() {
        let mut aggregator = StreamAggregator::new();
        let line = br#"{"type":"response","content":{"chat":"slow line "}}"#;
        for byte in line.chunks(1) {
            aggregator.ingest(byte);
            assert_eq!(aggregator.scanned, aggregator.line_buffer.len());
        }
        aggregator.ingest(b"\n{\"type\":\"response\",\"content\":{\"chat\":\"then fast\"}}\n{\"ty");

        assert_eq!(aggregator.line_buffer, "{\"ty");
        assert_eq!(aggregator.scanned, 4);
        assert_eq!(aggregator.snapshot().chat, "slow line then fast");
    }

    #[test]
    fn test_finish_parses_unterminated_trailing_line() {
        let mut aggregator = StreamAggregator::new();
        aggregator.ingest(br#"{"type":"response","content":{"chat":"tail"}}"#);
        assert_eq!(aggregator.snapshot().chat, "");
        assert_eq!(aggregator.finish().chat, "tail");
    }

    #[tokio::test]
    async fn test_aggregate_stream_reports_transport_failure_with_partial() {
        let chunks: Vec<anyhow::Result<Bytes>> = vec![
            Ok(Bytes::from_static(
                b"{\"type\":\"response\",\"content\":{\"chat\":\"partial \"}}\n",
            )),
            Err(anyhow::anyhow!("connection reset")),
            Ok(Bytes::from_static(
                b"{\"type\":\"response\",\"content\":{\"chat\":\"never\"}}\n",
            )),
        ];

        let error = aggregate_stream(stream::iter(chunks), None)
            .await
            .expect_err("transport failure must propagate");

        assert!(error.to_string().contains("connection reset"));
        assert_eq!(error.partial().chat, "partial");
    }

    #[tokio::test]
    async fn test_aggregate_stream_completes() {
        let chunks: Vec<anyhow::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"type\":\"response\",\"content\":{\"ch")),
            Ok(Bytes::from_static(b"at\":\" done \"}}\n")),
        ];
        let result = aggregate_stream(stream::iter(chunks), None).await.unwrap();
        assert_eq!(result.chat, "done");
    }
}
