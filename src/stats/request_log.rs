//! Request logging formatter

use crate::api::ChatRequest;

const PREVIEW_MAX_CHARS: usize = 80;

/// Format an arriving chat request in compact form
pub fn format_request_log(request: &ChatRequest) -> String {
    let mut parts = vec![format!("msgs={}", request.messages.len())];

    if let Some(msg) = last_user_message(request) {
        parts.push(format!("\"{}\"", msg));
    }

    format!("→ {}", parts.join(" "))
}

/// Extract and format the most recent user message with truncation
fn last_user_message(request: &ChatRequest) -> Option<String> {
    let message = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user" && !m.content.is_empty())?;

    let normalized = normalize_whitespace(&message.content);
    Some(truncate_message(&normalized))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_message(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
    format!("{}…", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> ChatRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_log_includes_message_count_and_preview() {
        let req = request(
            r#"{"messages":[
                {"role":"user","content":"first"},
                {"role":"assistant","content":"reply"},
                {"role":"user","content":"tell me about rust"}
            ]}"#,
        );
        let line = format_request_log(&req);
        assert_eq!(line, "→ msgs=3 \"tell me about rust\"");
    }

    #[test]
    fn test_log_normalizes_whitespace() {
        let req = request(r#"{"messages":[{"role":"user","content":"a\n  b\t c"}]}"#);
        assert_eq!(format_request_log(&req), "→ msgs=1 \"a b c\"");
    }

    #[test]
    fn test_log_truncates_long_messages() {
        let long = "x".repeat(200);
        let req = request(&format!(
            r#"{{"messages":[{{"role":"user","content":"{}"}}]}}"#,
            long
        ));
        let line = format_request_log(&req);
        assert!(line.ends_with("…\""));
        assert!(line.chars().count() < 120);
    }

    #[test]
    fn test_log_without_user_message() {
        let req = request(r#"{"messages":[{"role":"assistant","content":"hi"}]}"#);
        assert_eq!(format_request_log(&req), "→ msgs=1");
    }
}
