//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the upstream OpenAI-compatible
//! chat-completion API. It implements the `ChatCompletionStream` port from
//! the `core` crate: it opens the streaming request and hands the raw
//! `data:`-framed byte stream to the relay untouched.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Serialize;

use extractor_core::ports::{
    ByteStream, ChatCompletionStream, ChatRequest, PortError, PortResult,
};

/// Fixed sampling temperature for every generation step.
const TEMPERATURE: f32 = 0.7;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionStream` against an
/// OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`. The client carries the overall
    /// request timeout configured at startup.
    pub fn new(
        client: reqwest::Client,
        api_base: String,
        api_key: String,
        model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            api_base,
            api_key,
            model,
            max_tokens,
        }
    }
}

//=========================================================================================
// Request Body Types
//=========================================================================================

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    temperature: f32,
}

//=========================================================================================
// `ChatCompletionStream` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionStream for OpenAiChatAdapter {
    async fn open_stream(&self, request: ChatRequest) -> PortResult<ByteStream> {
        let body = CompletionBody {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: true,
            max_tokens: self.max_tokens,
            response_format: request
                .expects_json
                .then_some(ResponseFormat { kind: "json_object" }),
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("LLM API request failed: {e}")))?;

        // A non-success status is a hard failure before any stream exists.
        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Unexpected(format!("LLM API error: {status}")));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| PortError::Unexpected(e.to_string()));
        Ok(Box::pin(stream))
    }
}
