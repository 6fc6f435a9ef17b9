//! Inference backend interface
//!
//! Contract:
//! - A generation stream emits 0..n `Token` events followed by exactly one
//!   terminal `Completion` on success.
//! - Errors surface as stream items; after an error no further events are
//!   emitted.
//! - A stream that ends without a terminal event was cut off by the backend.

mod llama;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::prompt::AssembledPrompt;

pub use llama::LlamaCppBackend;

/// What the consumer receives incrementally during generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Partial generated text, not necessarily aligned to any linguistic unit
    Token(String),
    /// End of generation, carrying the full concatenated text
    Completion(String),
}

impl GenerationEvent {
    /// Returns true if this event terminates the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion(_))
    }

    /// Convenience accessor for `Token` contents
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Boxed stream of generation events
pub type GenerationStream = BoxStream<'static, Result<GenerationEvent, BackendError>>;

/// Per-request generation parameters forwarded to the backend
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_completion_tokens: usize,
    pub cache_prompt: bool,
}

impl From<&ModelConfig> for GenerationParams {
    fn from(model: &ModelConfig) -> Self {
        Self {
            temperature: model.temperature,
            max_completion_tokens: model.reserved_completion_tokens,
            cache_prompt: model.cache_prompt,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to connect to backend: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("error reading generation stream: {0}")]
    Stream(#[source] reqwest::Error),

    #[error("malformed generation chunk: {0}")]
    Chunk(#[source] serde_json::Error),

    #[error("failed to build backend client: {0}")]
    Client(String),
}

/// A text-generation backend consuming an assembled prompt
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start one generation and return its event stream.
    ///
    /// Dropping the returned stream aborts the generation.
    async fn stream_generation(
        &self,
        prompt: &AssembledPrompt,
        params: &GenerationParams,
    ) -> Result<GenerationStream, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_helpers() {
        let token = GenerationEvent::Token("hi".into());
        assert!(!token.is_terminal());
        assert_eq!(token.as_token(), Some("hi"));

        let done = GenerationEvent::Completion("hi there".into());
        assert!(done.is_terminal());
        assert_eq!(done.as_token(), None);
    }

    #[test]
    fn test_params_from_model_config() {
        let model = ModelConfig::default();
        let params = GenerationParams::from(&model);
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.max_completion_tokens, 512);
        assert!(params.cache_prompt);
    }
}
