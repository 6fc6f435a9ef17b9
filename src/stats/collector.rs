//! Generation stats collected over a request lifecycle

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Stats for one completed generation
#[derive(Debug, Clone, Serialize)]
pub struct RequestStats {
    /// Unique request ID
    pub request_id: String,
    /// Timestamp of completion
    pub timestamp: DateTime<Utc>,
    /// Prompt size in tokens (under the configured counter)
    pub prompt_tokens: usize,
    /// History turns that survived trimming
    pub turns_retained: usize,
    /// Fragments forwarded to the client
    pub fragments: usize,
    /// Generated output length in characters
    pub output_chars: usize,
    /// Request duration in ms
    pub duration_ms: f64,
    /// Output characters per second
    pub chars_per_sec: f64,
}

impl RequestStats {
    /// Build stats from the bridge's final accumulated text
    pub fn record(
        prompt_tokens: usize,
        turns_retained: usize,
        fragments: usize,
        output: &str,
        duration: Duration,
    ) -> Self {
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let output_chars = output.chars().count();
        let chars_per_sec = if duration_ms > 0.0 {
            output_chars as f64 / (duration_ms / 1000.0)
        } else {
            0.0
        };

        Self {
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt_tokens,
            turns_retained,
            fragments,
            output_chars,
            duration_ms,
            chars_per_sec,
        }
    }
}
