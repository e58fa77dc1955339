use crate::config::AppConfig;
use crate::utils::find_char_boundary;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ── Provider abstraction ────────────────────────────────────────────────

/// Supported completion backends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Provider {
    /// Any OpenAI-compatible API (optional LLM_API_KEY).
    OpenAiCompatible,
    /// Ollama local server (OpenAI-compatible endpoint, no auth).
    Ollama,
    /// HuggingFace router (cloud, requires HF_TOKEN).
    HuggingFace,
}

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434/v1/chat/completions";
const HF_DEFAULT_URL: &str = "https://router.huggingface.co/v1/chat/completions";

impl Provider {
    /// Parse the provider string from config.
    pub fn from_config(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai-compatible" | "openai" | "custom" => Ok(Self::OpenAiCompatible),
            "ollama" => Ok(Self::Ollama),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            other => Err(anyhow!(
                "Unknown provider '{}'. Supported: openai-compatible, ollama, huggingface",
                other
            )),
        }
    }

    pub fn default_api_url(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible => OPENAI_DEFAULT_URL,
            Self::Ollama => OLLAMA_DEFAULT_URL,
            Self::HuggingFace => HF_DEFAULT_URL,
        }
    }

    /// Human-readable name for logs and the banner.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "OpenAI-compatible",
            Self::Ollama => "Ollama (local)",
            Self::HuggingFace => "HuggingFace",
        }
    }

    /// The configured URL, or the provider default when it is empty.
    pub fn resolve_api_url(&self, configured_url: &str) -> String {
        let configured = configured_url.trim();
        if configured.is_empty() {
            self.default_api_url().to_string()
        } else {
            configured.to_string()
        }
    }

    /// Build the request headers for this provider.
    pub fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        match self {
            Self::HuggingFace => {
                let token = std::env::var("HF_TOKEN")
                    .context("HF_TOKEN missing in .env, required for HuggingFace provider")?;
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {token}"))
                        .context("Invalid Bearer token format")?,
                );
            }
            Self::Ollama | Self::OpenAiCompatible => {
                if let Ok(key) = std::env::var("LLM_API_KEY") {
                    if !key.is_empty() {
                        headers.insert(
                            AUTHORIZATION,
                            HeaderValue::from_str(&format!("Bearer {key}"))
                                .context("Invalid LLM_API_KEY format")?,
                        );
                    }
                }
            }
        }

        Ok(headers)
    }
}

// ── Request / chunk types (OpenAI chat completions format) ──────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

// ── Completion client ───────────────────────────────────────────────────

/// Ordered stream of answer fragments.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Something that can stream a chat completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<FragmentStream>;
}

/// Streams completions from an OpenAI-compatible HTTP endpoint.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    provider: Provider,
    api_url: String,
    headers: HeaderMap,
}

impl HttpCompletionClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = Provider::from_config(&config.provider)?;
        let api_url = provider.resolve_api_url(&config.api_url);
        let headers = provider.auth_headers()?;

        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            provider,
            api_url,
            headers,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<FragmentStream> {
        let body = ChatRequest {
            model,
            messages,
            stream: true,
        };

        let resp = self
            .client
            .post(&self.api_url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "HTTP error to {} ({}): {}",
                    self.provider.display_name(),
                    self.api_url,
                    e
                )
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text_body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "{} error {}: {}",
                self.provider.display_name(),
                status,
                &text_body[..find_char_boundary(&text_body, 500)]
            ));
        }

        let bytes = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).context("Failed to read stream chunk"))
            .boxed();
        Ok(decode_sse(bytes))
    }
}

// ── Server-sent events ──────────────────────────────────────────────────

enum SseLine {
    Fragment(String),
    Skip,
    Done,
}

fn parse_sse_line(line: &str) -> Result<SseLine> {
    let line = line.trim_end_matches('\r');
    // Comments, blank separators and fields other than `data`.
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }
    let chunk: ChatChunk = serde_json::from_str(payload).with_context(|| {
        format!(
            "Failed to parse stream chunk: {}",
            &payload[..find_char_boundary(payload, 200)]
        )
    })?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();
    if content.is_empty() {
        Ok(SseLine::Skip)
    } else {
        Ok(SseLine::Fragment(content))
    }
}

struct SseState {
    input: BoxStream<'static, Result<Vec<u8>>>,
    buf: Vec<u8>,
    eof: bool,
    done: bool,
}

/// Decode an SSE byte stream into content fragments.
///
/// Lines are split on `\n` over a byte buffer, so events and multi-byte
/// characters may straddle network chunks.
pub fn decode_sse(input: BoxStream<'static, Result<Vec<u8>>>) -> FragmentStream {
    let state = SseState {
        input,
        buf: Vec::new(),
        eof: false,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            let line = match state.buf.iter().position(|b| *b == b'\n') {
                Some(idx) => {
                    let line: Vec<u8> = state.buf.drain(..=idx).collect();
                    Some(line)
                }
                None if state.eof && !state.buf.is_empty() => Some(std::mem::take(&mut state.buf)),
                None if state.eof => return None,
                None => None,
            };

            if let Some(line) = line {
                let text = String::from_utf8_lossy(&line);
                match parse_sse_line(text.trim_end_matches('\n')) {
                    Ok(SseLine::Fragment(fragment)) => return Some((Ok(fragment), state)),
                    Ok(SseLine::Skip) => continue,
                    Ok(SseLine::Done) => return None,
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }

            match state.input.next().await {
                Some(Ok(bytes)) => state.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => state.eof = true,
            }
        }
    })
    .boxed()
}

/// Consume `stream` in order, handing each fragment to `on_fragment`, and
/// return the concatenated answer.
pub async fn drain<F>(mut stream: FragmentStream, mut on_fragment: F) -> Result<String>
where
    F: FnMut(&str),
{
    let mut answer = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        on_fragment(&fragment);
        answer.push_str(&fragment);
    }
    Ok(answer)
}

// ── Scripted client ─────────────────────────────────────────────────────

/// Replays fixed fragments and records every request it receives.
pub struct MockCompletionClient {
    fragments: Vec<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, Vec<Message>)>>,
}

impl MockCompletionClient {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(model, messages)` of every request so far.
    pub fn requests(&self) -> Vec<(String, Vec<Message>)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((model.to_string(), messages.to_vec()));
        }
        let fragments: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        Ok(stream::iter(fragments).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> BoxStream<'static, Result<Vec<u8>>> {
        let owned: Vec<Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned).boxed()
    }

    fn content_event(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_chat_request_serialization() {
        let messages = vec![Message::new("user", "Hello")];
        let request = ChatRequest {
            model: "gpt-4-turbo",
            messages: &messages,
            stream: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4-turbo",
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true
            })
        );
    }

    #[test]
    fn test_parse_sse_line() {
        assert!(matches!(parse_sse_line(": keep-alive").unwrap(), SseLine::Skip));
        assert!(matches!(parse_sse_line("event: ping").unwrap(), SseLine::Skip));
        assert!(matches!(parse_sse_line("data: [DONE]").unwrap(), SseLine::Done));
        assert!(matches!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            SseLine::Skip
        ));
        assert!(matches!(
            parse_sse_line(r#"data:{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap(),
            SseLine::Fragment(ref s) if s == "Hi"
        ));
        assert!(parse_sse_line("data: {not json").is_err());
    }

    #[tokio::test]
    async fn test_decode_sse_concatenates_in_order() {
        let body = format!(
            "{}{}: comment\n\n{}data: [DONE]\n\n",
            content_event("Hel"),
            content_event("lo"),
            content_event(" world")
        );
        let answer = drain(decode_sse(chunks(&[&body])), |_| {}).await.unwrap();
        assert_eq!(answer, "Hello world");
    }

    #[tokio::test]
    async fn test_decode_sse_handles_split_frames() {
        let body = format!("{}{}", content_event("héllo"), content_event("!"));
        // Split inside the multi-byte character and inside the prefix.
        let bytes = body.as_bytes();
        let cut_a = body.find('é').unwrap() + 1;
        let cut_b = body.rfind("data").unwrap() + 2;
        let parts: Vec<Result<Vec<u8>>> = vec![
            Ok(bytes[..cut_a].to_vec()),
            Ok(bytes[cut_a..cut_b].to_vec()),
            Ok(bytes[cut_b..].to_vec()),
        ];
        let mut seen = Vec::new();
        let answer = drain(decode_sse(stream::iter(parts).boxed()), |f| {
            seen.push(f.to_string())
        })
        .await
        .unwrap();
        assert_eq!(answer, "héllo!");
        assert_eq!(seen, vec!["héllo", "!"]);
    }

    #[tokio::test]
    async fn test_decode_sse_stops_at_done() {
        let body = format!("{}data: [DONE]\n\n{}", content_event("a"), content_event("b"));
        let answer = drain(decode_sse(chunks(&[&body])), |_| {}).await.unwrap();
        assert_eq!(answer, "a");
    }

    #[tokio::test]
    async fn test_decode_sse_without_trailing_newline() {
        let body = r#"data: {"choices":[{"delta":{"content":"x"}}]}"#;
        let answer = drain(decode_sse(chunks(&[body])), |_| {}).await.unwrap();
        assert_eq!(answer, "x");
    }

    #[tokio::test]
    async fn test_mock_client_records_requests() {
        let client = MockCompletionClient::new(["a", "b"]);
        let stream = client
            .stream_chat("m", &[Message::new("user", "hi")])
            .await
            .unwrap();
        assert_eq!(drain(stream, |_| {}).await.unwrap(), "ab");
        assert_eq!(client.calls(), 1);
        assert_eq!(client.requests()[0].0, "m");
    }

    // ── Provider tests ──────────────────────────────────────────────────

    #[test]
    fn test_provider_from_config_valid() {
        assert_eq!(Provider::from_config("huggingface").unwrap(), Provider::HuggingFace);
        assert_eq!(Provider::from_config("hf").unwrap(), Provider::HuggingFace);
        assert_eq!(Provider::from_config("Ollama").unwrap(), Provider::Ollama);
        assert_eq!(Provider::from_config("openai-compatible").unwrap(), Provider::OpenAiCompatible);
        assert_eq!(Provider::from_config("openai").unwrap(), Provider::OpenAiCompatible);
    }

    #[test]
    fn test_provider_from_config_invalid() {
        assert!(Provider::from_config("unknown").is_err());
        assert!(Provider::from_config("").is_err());
    }

    #[test]
    fn test_provider_resolve_api_url() {
        let custom = "http://my-server:8080/v1/chat/completions";
        assert_eq!(Provider::Ollama.resolve_api_url(custom), custom);
        assert_eq!(Provider::Ollama.resolve_api_url(""), OLLAMA_DEFAULT_URL);
        assert_eq!(Provider::OpenAiCompatible.resolve_api_url("  "), OPENAI_DEFAULT_URL);
    }

    #[test]
    fn test_provider_display_name() {
        assert_eq!(Provider::HuggingFace.display_name(), "HuggingFace");
        assert_eq!(Provider::Ollama.display_name(), "Ollama (local)");
        assert_eq!(Provider::OpenAiCompatible.display_name(), "OpenAI-compatible");
    }

    #[test]
    fn test_provider_ollama_auth_no_key() {
        std::env::remove_var("LLM_API_KEY");
        let headers = Provider::Ollama.auth_headers().unwrap();
        assert!(!headers.contains_key(AUTHORIZATION));
        assert_eq!(headers[ACCEPT], "text/event-stream");
    }
}
