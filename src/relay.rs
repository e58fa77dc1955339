//! Chat relay handlers: forward a conversation to the completion backend,
//! echo fragments to stdout as they stream in, and answer with the full text.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::api::{drain, CompletionClient, Message};
use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::server::{parse_json, AppState};

/// `messages` arrives JSON-encoded inside a string; a bare array is also accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessagesField {
    Encoded(String),
    List(Vec<Message>),
}

impl MessagesField {
    pub fn decode(self) -> Result<Vec<Message>, ServiceError> {
        match self {
            Self::List(messages) => Ok(messages),
            Self::Encoded(text) if text.trim().is_empty() => Ok(Vec::new()),
            Self::Encoded(text) => serde_json::from_str(&text)
                .map_err(|e| ServiceError::BadRequest(format!("invalid messages: {e}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesRequest {
    #[serde(default)]
    pub model: String,
    pub messages: MessagesField,
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub model: String,
    pub prompt: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PromptResponse {
    pub role: String,
    pub model: String,
    pub prompt: String,
    pub answer: String,
}

fn effective_model(requested: &str, config: &AppConfig) -> String {
    if requested.trim().is_empty() {
        config.default_model.clone()
    } else {
        requested.to_string()
    }
}

fn print_fragment(fragment: &str) {
    let mut stdout = std::io::stdout().lock();
    // A closed stdout must not abort the relay.
    let _ = stdout.write_all(fragment.as_bytes());
    let _ = stdout.flush();
}

/// Stream one completion, printing fragments as they arrive.
async fn complete(
    client: &dyn CompletionClient,
    model: &str,
    messages: &[Message],
) -> Result<String, ServiceError> {
    if messages.is_empty() {
        tracing::debug!("empty conversation, skipping completion");
        return Ok(String::new());
    }
    tracing::info!(model, messages = messages.len(), "requesting completion");
    let stream = client
        .stream_chat(model, messages)
        .await
        .map_err(ServiceError::Completion)?;
    let answer = drain(stream, print_fragment)
        .await
        .map_err(ServiceError::Completion)?;
    tracing::info!(chars = answer.chars().count(), "completion finished");
    Ok(answer)
}

/// Relay a full conversation and return the answer text.
pub async fn relay_messages(
    client: &dyn CompletionClient,
    config: &AppConfig,
    request: MessagesRequest,
) -> Result<String, ServiceError> {
    let model = effective_model(&request.model, config);
    let messages = request.messages.decode()?;
    complete(client, &model, &messages).await
}

/// Relay a single prompt and echo the request next to the answer.
pub async fn relay_prompt(
    client: &dyn CompletionClient,
    config: &AppConfig,
    request: PromptRequest,
) -> Result<PromptResponse, ServiceError> {
    let model = effective_model(&request.model, config);
    let role = if request.role.trim().is_empty() {
        "user".to_string()
    } else {
        request.role
    };
    let messages = if request.prompt.is_empty() {
        Vec::new()
    } else {
        vec![Message::new(role.clone(), request.prompt.clone())]
    };
    let answer = complete(client, &model, &messages).await?;
    Ok(PromptResponse {
        role,
        model,
        prompt: request.prompt,
        answer,
    })
}

pub async fn messages_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<String>, ServiceError> {
    let _turn = state.lock.lock().await;
    let request: MessagesRequest = parse_json(&body)?;
    let client = state.client()?;
    let answer = relay_messages(client.as_ref(), &state.config, request).await?;
    Ok(Json(answer))
}

pub async fn prompt_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PromptResponse>, ServiceError> {
    let _turn = state.lock.lock().await;
    let request: PromptRequest = parse_json(&body)?;
    let client = state.client()?;
    let response = relay_prompt(client.as_ref(), &state.config, request).await?;
    Ok(Json(response))
}
