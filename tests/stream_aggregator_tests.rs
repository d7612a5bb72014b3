use signal_reveal::api::stream::{AggregatorEvent, StreamAggregator};
use signal_reveal::types::AggregatedText;
use tokio::sync::mpsc;

fn ndjson(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

fn aggregate_chunks(chunks: &[&[u8]]) -> AggregatedText {
    let mut aggregator = StreamAggregator::new();
    for chunk in chunks {
        aggregator.ingest(chunk);
    }
    aggregator.finish()
}

#[test]
fn test_concrete_argue_scenario() {
    let payload = ndjson(&[
        r#"{"type":"filtered","content":"NO_RELEVANT_CONTEXT"}"#,
        r#"{"type":"response","content":{"chat":"The evidence "}}"#,
        r#"{"type":"response","content":{"chat":"shows X.","reasoning":"Because Y."}}"#,
    ]);

    let result = aggregate_chunks(&[payload.as_bytes()]);

    assert_eq!(result.chat, "The evidence shows X.");
    assert_eq!(result.reasoning, "Because Y.");
}

#[test]
fn test_every_single_split_point_gives_same_result() {
    let payload = ndjson(&[
        r#"{"type":"response","content":{"chat":"Café "}}"#,
        "not-json{{{",
        r#"{"type":"filtered","content":"{\"output\":[{\"content\":[{\"type\":\"reasoning_text\",\"text\":\"naïve → 日本\"}]}]}"}"#,
        r#"{"type":"response","content":{"chat":"über 🎉","reasoning":"ignored"}}"#,
    ]);
    let bytes = payload.as_bytes();
    let expected = aggregate_chunks(&[bytes]);
    assert_eq!(expected.chat, "Café über 🎉");
    assert_eq!(expected.reasoning, "naïve → 日本");

    for split in 0..=bytes.len() {
        let (left, right) = bytes.split_at(split);
        assert_eq!(aggregate_chunks(&[left, right]), expected, "split at {split}");
    }

    let byte_chunks: Vec<&[u8]> = bytes.chunks(1).collect();
    assert_eq!(aggregate_chunks(&byte_chunks), expected);
}

#[test]
fn test_every_double_split_point_gives_same_result() {
    let payload = ndjson(&[
        r#"{"type":"response","content":{"chat":"日本 "}}"#,
        r#"{"type":"response","content":{"chat":"ok","reasoning":"é"}}"#,
    ]);
    let bytes = payload.as_bytes();
    let expected = aggregate_chunks(&[bytes]);

    for first in 0..=bytes.len() {
        for second in first..=bytes.len() {
            let chunks = [&bytes[..first], &bytes[first..second], &bytes[second..]];
            assert_eq!(
                aggregate_chunks(&chunks),
                expected,
                "splits at {first}/{second}"
            );
        }
    }
}

#[test]
fn test_sentinel_never_touches_reasoning() {
    let payload = ndjson(&[
        r#"{"type":"response","content":{"reasoning":"Kept."}}"#,
        r#"{"type":"filtered","content":"NO_RELEVANT_CONTEXT"}"#,
        r#"{"type":"filtered","content":"prefix NO_RELEVANT_CONTEXT suffix"}"#,
    ]);
    assert_eq!(aggregate_chunks(&[payload.as_bytes()]).reasoning, "Kept.");

    let only_sentinel = ndjson(&[r#"{"type":"filtered","content":"NO_RELEVANT_CONTEXT"}"#]);
    assert_eq!(aggregate_chunks(&[only_sentinel.as_bytes()]).reasoning, "");
}

#[test]
fn test_response_reasoning_fills_only_once() {
    let payload = ndjson(&[
        r#"{"type":"response","content":{"reasoning":"A"}}"#,
        r#"{"type":"response","content":{"reasoning":"B"}}"#,
    ]);
    assert_eq!(aggregate_chunks(&[payload.as_bytes()]).reasoning, "A");

    let payload = ndjson(&[
        r#"{"type":"filtered","content":"A"}"#,
        r#"{"type":"response","content":{"reasoning":"B"}}"#,
    ]);
    assert_eq!(aggregate_chunks(&[payload.as_bytes()]).reasoning, "A");
}

#[test]
fn test_chat_is_append_only() {
    let payload = ndjson(&[
        r#"{"type":"response","content":{"chat":"Hel"}}"#,
        r#"{"type":"response","content":{"chat":"lo"}}"#,
    ]);
    assert_eq!(aggregate_chunks(&[payload.as_bytes()]).chat, "Hello");
}

#[test]
fn test_malformed_line_does_not_change_result() {
    let first = r#"{"type":"response","content":{"chat":"One "}}"#;
    let second = r#"{"type":"response","content":{"chat":"two","reasoning":"R"}}"#;

    let clean = ndjson(&[first, second]);
    let noisy = ndjson(&[first, "not-json{{{", r#"{"no_type":true}"#, second]);

    assert_eq!(
        aggregate_chunks(&[noisy.as_bytes()]),
        aggregate_chunks(&[clean.as_bytes()])
    );
}

#[test]
fn test_blank_and_crlf_lines_are_tolerated() {
    let payload = "\r\n   \n{\"type\":\"response\",\"content\":{\"chat\":\"crlf\"}}\r\n\n";
    assert_eq!(aggregate_chunks(&[payload.as_bytes()]).chat, "crlf");
}

#[test]
fn test_upstream_error_is_surfaced_and_stream_continues() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut aggregator = StreamAggregator::with_events(tx);
    let payload = ndjson(&[
        r#"{"type":"response","content":{"chat":"Before. "}}"#,
        r#"{"type":"error","content":"quota exceeded"}"#,
        r#"{"type":"response","content":{"chat":"After."}}"#,
    ]);
    aggregator.ingest(payload.as_bytes());

    let result = aggregator.finish();
    assert_eq!(result.chat, "Before. After.");

    let mut errors = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let AggregatorEvent::UpstreamError(message) = event {
            errors.push(message);
        }
    }
    assert_eq!(errors, vec!["quota exceeded".to_string()]);
}

#[test]
fn test_filtered_plain_content_is_used_verbatim() {
    let payload = ndjson(&[r#"{"type":"filtered","content":"{\"not\":\"the shape\"}"}"#]);
    assert_eq!(
        aggregate_chunks(&[payload.as_bytes()]).reasoning,
        r#"{"not":"the shape"}"#
    );
}

#[test]
fn test_results_are_trimmed() {
    let payload = ndjson(&[
        r#"{"type":"response","content":{"chat":"  padded  ","reasoning":"\n why \n"}}"#,
    ]);
    let result = aggregate_chunks(&[payload.as_bytes()]);
    assert_eq!(result.chat, "padded");
    assert_eq!(result.reasoning, "why");
}
