use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded payload from the upstream SSE chat stream
///
/// Providers disagree about the shape of `delta.content` (plain string vs.
/// a list of segments), so the union is resolved once at deserialization
/// time ([`DeltaContent`]) instead of being special-cased at call sites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<DeltaContent>,
}

/// Incremental content carried by one delta
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeltaContent {
    /// Plain string content
    Text(String),

    /// Structured segments; only text-bearing ones contribute
    Segments(Vec<DeltaSegment>),

    /// Anything else a provider might send; contributes no text
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeltaSegment {
    Text { text: String },
    Other(Value),
}

impl DeltaContent {
    /// Text carried by this content, segments concatenated in order
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Segments(segments) => segments
                .iter()
                .filter_map(|s| match s {
                    DeltaSegment::Text { text } => Some(text.as_str()),
                    DeltaSegment::Other(_) => None,
                })
                .collect(),
            Self::Other(_) => String::new(),
        }
    }
}

impl ChatStreamChunk {
    /// Decode one upstream payload, tolerating absent or malformed
    /// `choices`, null content, and unknown segment shapes; any mismatch
    /// yields a chunk with no choices, never an error.
    pub fn parse(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    /// Text of the first choice's delta, empty when none
    pub fn delta_text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_ref())
            .map(DeltaContent::text)
            .unwrap_or_default()
    }

    pub fn is_done(&self) -> bool {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_string_content() {
        let payload = json!({
            "choices": [{"delta": {"role": "assistant", "content": "Hel"}}]
        });
        assert_eq!(ChatStreamChunk::parse(&payload).delta_text(), "Hel");
    }

    #[test]
    fn test_extract_segment_list_content() {
        let payload = json!({
            "choices": [{"delta": {"content": [
                {"type": "text", "text": "Hel"},
                {"type": "image", "url": "ignored"},
                {"type": "text", "text": "lo"}
            ]}}]
        });
        assert_eq!(ChatStreamChunk::parse(&payload).delta_text(), "Hello");
    }

    #[test]
    fn test_extract_missing_choices() {
        assert_eq!(ChatStreamChunk::parse(&json!({})).delta_text(), "");
        assert_eq!(ChatStreamChunk::parse(&json!({"choices": []})).delta_text(), "");
    }

    #[test]
    fn test_extract_malformed_choices() {
        assert_eq!(
            ChatStreamChunk::parse(&json!({"choices": "bogus"})).delta_text(),
            ""
        );
        assert_eq!(ChatStreamChunk::parse(&json!({"choices": 42})).delta_text(), "");
    }

    #[test]
    fn test_extract_null_and_numeric_content() {
        let payload = json!({"choices": [{"delta": {"content": null}}]});
        assert_eq!(ChatStreamChunk::parse(&payload).delta_text(), "");

        let payload = json!({"choices": [{"delta": {"content": 7}}]});
        assert_eq!(ChatStreamChunk::parse(&payload).delta_text(), "");
    }

    #[test]
    fn test_extract_segments_without_text_field() {
        let payload = json!({
            "choices": [{"delta": {"content": [{"type": "audio"}, {"text": 3}]}}]
        });
        assert_eq!(ChatStreamChunk::parse(&payload).delta_text(), "");
    }

    #[test]
    fn test_is_done_via_finish_reason() {
        let chunk: ChatStreamChunk = serde_json::from_value(json!({
            "choices": [{"delta": {}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert!(chunk.is_done());
    }
}
