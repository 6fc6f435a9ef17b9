//! llama.cpp backend client
//!
//! Talks to llama-server's native `/completion` endpoint with `stream: true`
//! and decodes the SSE chunk stream into [`GenerationEvent`]s.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;

use super::{BackendError, GenerationBackend, GenerationEvent, GenerationParams, GenerationStream};
use crate::config::{BackendConfig, TlsConfig};
use crate::prompt::AssembledPrompt;

/// Client for a llama.cpp llama-server instance
pub struct LlamaCppBackend {
    url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl LlamaCppBackend {
    /// Construct a backend client from configuration
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let http_client = build_http_client(config.timeout_seconds, config.tls.as_ref())?;
        Ok(Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http_client
            .request(method, format!("{}{}", self.base_url(), path));
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key);
        }
        req
    }

    /// Probe the server's `/health` endpoint
    pub async fn health(&self) -> Result<String, BackendError> {
        let response = self
            .request(reqwest::Method::GET, "/health")
            .send()
            .await
            .map_err(BackendError::Connect)?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        response.text().await.map_err(BackendError::Stream)
    }

    /// Fetch server properties (`/props`), used to cross-check the
    /// configured context window against the loaded model
    pub async fn props(&self) -> Result<ServerProps, BackendError> {
        let response = self
            .request(reqwest::Method::GET, "/props")
            .send()
            .await
            .map_err(BackendError::Connect)?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        response.json().await.map_err(BackendError::Stream)
    }
}

#[async_trait]
impl GenerationBackend for LlamaCppBackend {
    async fn stream_generation(
        &self,
        prompt: &AssembledPrompt,
        params: &GenerationParams,
    ) -> Result<GenerationStream, BackendError> {
        let body = serde_json::json!({
            "prompt": prompt.text(),
            "stream": true,
            "temperature": params.temperature,
            "n_predict": params.max_completion_tokens,
            "cache_prompt": params.cache_prompt,
        });

        let response = self
            .request(reqwest::Method::POST, "/completion")
            .json(&body)
            .send()
            .await
            .map_err(BackendError::Connect)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        Ok(decode_stream(response.bytes_stream().boxed()))
    }
}

/// Server properties from `/props`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerProps {
    pub model_path: Option<String>,
    pub n_ctx: Option<u64>,
    pub chat_template: Option<String>,
}

/// One SSE data payload from `/completion`
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
}

/// Incremental SSE decoder, tolerant of chunk boundaries splitting lines
struct SseDecoder {
    buffer: String,
    accumulated: String,
}

impl SseDecoder {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            accumulated: String::new(),
        }
    }

    /// Feed raw bytes, draining every complete `data:` line into events
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<GenerationEvent>, BackendError> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            let Some(data) = line.strip_prefix("data: ") else {
                // Blank separator lines and non-data fields
                continue;
            };

            let chunk: CompletionChunk =
                serde_json::from_str(data).map_err(BackendError::Chunk)?;

            if !chunk.content.is_empty() {
                self.accumulated.push_str(&chunk.content);
                events.push(GenerationEvent::Token(chunk.content));
            }
            if chunk.stop {
                events.push(GenerationEvent::Completion(std::mem::take(
                    &mut self.accumulated,
                )));
            }
        }
        Ok(events)
    }
}

struct DecodeState {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<GenerationEvent>,
    done: bool,
}

/// Turn a raw byte stream from `/completion` into a generation event stream.
///
/// The stream ends right after the terminal `Completion` event or the first
/// error. An upstream end without a `stop` chunk simply ends the stream; the
/// consumer treats the missing terminal as truncation.
fn decode_stream(inner: BoxStream<'static, reqwest::Result<Bytes>>) -> GenerationStream {
    let state = DecodeState {
        inner,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                if event.is_terminal() {
                    state.done = true;
                }
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(bytes)) => match state.decoder.feed(&bytes) {
                    Ok(events) => state.pending.extend(events),
                    Err(err) => {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                },
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(BackendError::Stream(err)), state));
                }
                None => {
                    state.done = true;
                    return None;
                }
            }
        }
    })
    .boxed()
}

/// Build an HTTP client with TLS configuration
fn build_http_client(
    timeout_seconds: u64,
    tls: Option<&TlsConfig>,
) -> Result<reqwest::Client, BackendError> {
    let mut client_builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .pool_max_idle_per_host(10);

    if let Some(tls) = tls {
        if tls.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: Accepting invalid certificates (use only for development/testing)");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path)
                .map_err(|e| BackendError::Client(format!("reading CA cert {}: {}", ca_path, e)))?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_cert)
                .map_err(|e| BackendError::Client(format!("parsing CA cert {}: {}", ca_path, e)))?;
            client_builder = client_builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: Loaded custom CA certificate from {}", ca_path);
        }

        if let (Some(cert_path), Some(key_path)) = (&tls.client_cert_path, &tls.client_key_path) {
            let cert_pem = std::fs::read(cert_path).map_err(|e| {
                BackendError::Client(format!("reading client cert {}: {}", cert_path, e))
            })?;
            let key_pem = std::fs::read(key_path).map_err(|e| {
                BackendError::Client(format!("reading client key {}: {}", key_path, e))
            })?;
            let identity = reqwest::Identity::from_pem(&[cert_pem, key_pem].concat())
                .map_err(|e| BackendError::Client(format!("building mTLS identity: {}", e)))?;
            client_builder = client_builder.identity(identity);
            tracing::info!("TLS: Loaded client certificate from {} for mTLS", cert_path);
        }
    }

    client_builder
        .build()
        .map_err(|e| BackendError::Client(e.to_string()))
}
