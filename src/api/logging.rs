use crate::util::parse_bool_flag;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_LOG_PATH: &str = "/tmp/argue-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "ARGUE_DEBUG_PAYLOAD";
const LOG_PATH_ENV: &str = "ARGUE_LOG_PATH";
const MAX_LOGGED_LINE_CHARS: usize = 512;

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(parse_bool_flag)
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message =
        format!("ARGUE DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n");
    emit_log_message(&message);
}

pub fn emit_record_parse_error(line: &str, parse_error: &serde_json::Error) {
    let message = format!(
        "ARGUE WARN record_parse_failed error={parse_error}\nline:\n{}\n",
        clip_line(line)
    );
    emit_log_message(&message);
}

pub fn emit_unrecognized_record(line: &str) {
    let message = format!("ARGUE WARN record_unrecognized\nline:\n{}\n", clip_line(line));
    emit_log_message(&message);
}

pub fn emit_upstream_error(message_text: &str) {
    let message = format!("ARGUE ERROR upstream_error message={message_text}\n");
    emit_log_message(&message);
}

fn clip_line(line: &str) -> String {
    if line.chars().count() <= MAX_LOGGED_LINE_CHARS {
        return line.to_string();
    }
    let mut clipped: String = line.chars().take(MAX_LOGGED_LINE_CHARS).collect();
    clipped.push_str("...");
    clipped
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}
