//! Wire types shared across the managed/native boundary.
//!
//! The managed side talks to the bridge in JSON: a completion request goes
//! in, a stream of token events comes back through the registered listener.
//! Everything here is plain data; the bridge crate owns the threading and
//! engine plumbing.

use serde::{Deserialize, Serialize};

pub mod params;

pub use params::EngineParams;

/// One completion request as decoded from the managed side.
///
/// Unknown fields are ignored; missing fields take the engine defaults, so
/// `{"prompt": "hi"}` is a complete request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: i32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    /// Maximum tokens to generate; -1 means "until the engine stops".
    #[serde(default = "default_n_predict")]
    pub n_predict: i32,
    /// Stop words; generation ends after the event whose token matched one.
    #[serde(default)]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.8
}

fn default_top_k() -> i32 {
    40
}

fn default_top_p() -> f32 {
    0.95
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_n_predict() -> i32 {
    -1
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            n_predict: default_n_predict(),
            stop: Vec::new(),
        }
    }
}

impl CompletionRequest {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// One generation step as delivered to the listener.
///
/// The steady-state wire shape is `{"content": ..., "stop": ...}`; the
/// `error` field only appears on the single terminal event of a failed
/// request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEvent {
    pub content: String,
    pub stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenEvent {
    pub fn token(content: impl Into<String>, stop: bool) -> Self {
        Self {
            content: content.into(),
            stop,
            error: None,
        }
    }

    /// Terminal event for a request that failed before or during generation.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            stop: true,
            error: Some(reason.into()),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a string/bool/option struct cannot realistically fail;
        // fall back to a bare terminal event rather than panicking on a
        // worker thread.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"content":"","stop":true}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_apply_to_missing_fields() {
        let req = CompletionRequest::from_json(r#"{"prompt": "count to 3"}"#).unwrap();
        assert_eq!(req.prompt, "count to 3");
        assert_eq!(req.temperature, 0.8);
        assert_eq!(req.top_k, 40);
        assert_eq!(req.top_p, 0.95);
        assert_eq!(req.repeat_penalty, 1.1);
        assert_eq!(req.n_predict, -1);
        assert!(req.stop.is_empty());
    }

    #[test]
    fn request_with_empty_document_is_all_defaults() {
        let req = CompletionRequest::from_json("{}").unwrap();
        assert_eq!(req.prompt, "");
        assert_eq!(req.temperature, 0.8);
    }

    #[test]
    fn request_ignores_unknown_fields() {
        let raw = r#"{"prompt": "hi", "temperature": 0.2, "grammar": "root ::= x", "seed": 7}"#;
        let req = CompletionRequest::from_json(raw).unwrap();
        assert_eq!(req.prompt, "hi");
        assert_eq!(req.temperature, 0.2);
    }

    #[test]
    fn request_rejects_malformed_json() {
        assert!(CompletionRequest::from_json(r#"{"prompt": "#).is_err());
        assert!(CompletionRequest::from_json("").is_err());
    }

    #[test]
    fn request_decodes_stop_words() {
        let req = CompletionRequest::from_json(r#"{"stop": ["</s>", "User:"]}"#).unwrap();
        assert_eq!(req.stop, vec!["</s>".to_string(), "User:".to_string()]);
    }

    #[test]
    fn token_event_wire_shape_has_no_error_field() {
        let json = TokenEvent::token("hel", false).to_json();
        assert_eq!(json, r#"{"content":"hel","stop":false}"#);
    }

    #[test]
    fn failure_event_carries_reason_and_stop() {
        let event = TokenEvent::failure("context window is full");
        let json = event.to_json();
        assert!(json.contains(r#""stop":true"#));
        assert!(json.contains("context window is full"));

        let back: TokenEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
