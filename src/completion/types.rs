use serde::{Deserialize, Serialize};

use crate::models::enums::MessageRole;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Role tag on the completion wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for ChatRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 600,
        }
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
    pub stream: bool,
    pub n: u32,
}

impl CompletionPayload {
    pub fn new(model: &str, messages: Vec<ChatMessage>, stream: bool) -> Self {
        Self {
            model: model.to_string(),
            messages,
            sampling: SamplingParams::default(),
            stream,
            n: 1,
        }
    }
}

/// One-shot completion response (only the fields we read).
#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One event of a streamed completion.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_flat_with_fixed_parameters() {
        let payload = CompletionPayload::new(
            DEFAULT_MODEL,
            vec![ChatMessage::user("hello")],
            true,
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(json["top_p"], 1.0);
        assert_eq!(json["frequency_penalty"], 0.0);
        assert_eq!(json["presence_penalty"], 0.0);
        assert_eq!(json["max_tokens"], 600);
        assert_eq!(json["stream"], true);
        assert_eq!(json["n"], 1);
    }

    #[test]
    fn message_role_maps_to_chat_role() {
        assert_eq!(ChatRole::from(MessageRole::User), ChatRole::User);
        assert_eq!(ChatRole::from(MessageRole::Assistant), ChatRole::Assistant);
    }

    #[test]
    fn chat_message_deserializes_from_client_body() {
        let msgs: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role":"system","content":"be brief"},{"role":"user","content":"hi"}]"#,
        )
        .unwrap();
        assert_eq!(msgs[0].role, ChatRole::System);
        assert_eq!(msgs[1], ChatMessage::user("hi"));
    }

    #[test]
    fn stream_chunk_tolerates_role_only_delta() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#)
                .unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }

    #[test]
    fn completion_response_reads_first_choice() {
        let resp: CompletionResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"ok"}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("ok"));
    }
}
