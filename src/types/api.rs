use serde::{Deserialize, Serialize};

/// Sentinel the generation service sends as `filtered` content when no
/// relevant context was retrieved.
pub const NO_RELEVANT_CONTEXT: &str = "NO_RELEVANT_CONTEXT";

/// One line of the upstream NDJSON stream, as sent on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireRecord {
    Filtered {
        #[serde(default)]
        content: Option<String>,
    },
    Response {
        #[serde(default)]
        content: Option<ResponseContent>,
    },
    Error {
        #[serde(default)]
        content: Option<serde_json::Value>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub chat: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// A classified stream record. Folding these left to right in arrival order
/// is the only ordering the stream guarantees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    Filtered {
        content: String,
    },
    Response {
        chat_delta: String,
        reasoning_full: Option<String>,
    },
    Error {
        message: String,
    },
    Unrecognized,
}

impl From<WireRecord> for StreamRecord {
    fn from(record: WireRecord) -> Self {
        match record {
            WireRecord::Filtered { content } => StreamRecord::Filtered {
                content: content.unwrap_or_default(),
            },
            WireRecord::Response {
                content: Some(content),
            } => StreamRecord::Response {
                chat_delta: content.chat.unwrap_or_default(),
                reasoning_full: content.reasoning.filter(|r| !r.is_empty()),
            },
            WireRecord::Response { content: None } => StreamRecord::Unrecognized,
            WireRecord::Error { content } => StreamRecord::Error {
                message: match content {
                    Some(serde_json::Value::String(text)) => text,
                    Some(other) => other.to_string(),
                    None => String::new(),
                },
            },
            WireRecord::Unknown => StreamRecord::Unrecognized,
        }
    }
}

/// What a `filtered` record's content decodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasoningPayload {
    /// Content was nested JSON carrying a `reasoning_text` block.
    Reasoning(String),
    /// Content is used verbatim.
    Raw(String),
}

impl ReasoningPayload {
    pub fn into_text(self) -> String {
        match self {
            ReasoningPayload::Reasoning(text) | ReasoningPayload::Raw(text) => text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NestedEnvelope {
    #[serde(default)]
    output: Vec<NestedOutput>,
}

#[derive(Debug, Deserialize)]
struct NestedOutput {
    #[serde(default)]
    content: Vec<NestedContent>,
}

#[derive(Debug, Deserialize)]
struct NestedContent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Decodes `filtered` content in two stages: first as the nested
/// `{ output: [ { content: [ { type: "reasoning_text", text } ] } ] }`
/// envelope, falling back to the raw string when that shape is absent.
pub fn parse_nested_reasoning(content: &str) -> ReasoningPayload {
    let Ok(envelope) = serde_json::from_str::<NestedEnvelope>(content) else {
        return ReasoningPayload::Raw(content.to_string());
    };

    envelope
        .output
        .into_iter()
        .flat_map(|output| output.content)
        .find(|block| block.kind == "reasoning_text")
        .and_then(|block| block.text)
        .map(ReasoningPayload::Reasoning)
        .unwrap_or_else(|| ReasoningPayload::Raw(content.to_string()))
}

/// The two accumulated output channels of one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedText {
    pub chat: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgueRequest {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capsule_id: Option<String>,
}

/// Structured response forwarded to API callers once a stream completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgueResponse {
    pub success: bool,
    pub response: String,
    pub reasoning: String,
    pub capsule_id: Option<String>,
    pub question: String,
}

impl ArgueResponse {
    pub fn from_aggregate(
        aggregate: AggregatedText,
        question: String,
        capsule_id: Option<String>,
    ) -> Self {
        Self {
            success: true,
            response: aggregate.chat,
            reasoning: aggregate.reasoning,
            capsule_id,
            question,
        }
    }
}
