//! Chat request wire types and role filtering

use serde::Deserialize;

use crate::prompt::{ChatTurn, Role};

/// Incoming chat request body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
}

/// A single message as sent by the client
///
/// The role is kept as a raw string so unknown roles deserialize cleanly and
/// can be dropped during filtering instead of failing the request.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatRequest {
    /// Conversation history eligible for prompt assembly.
    ///
    /// Only `user` and `assistant` messages survive; any other role
    /// (`system`, `function`, `tool`, typos) is silently discarded.
    /// Chronological order is preserved.
    pub fn history(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .filter_map(|message| {
                let role = match message.role.as_str() {
                    "user" => Role::User,
                    "assistant" => Role::Assistant,
                    _ => return None,
                };
                Some(ChatTurn {
                    role,
                    content: message.content.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> ChatRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_history_keeps_user_and_assistant() {
        let req = request(
            r#"{"messages":[
                {"role":"user","content":"hi"},
                {"role":"assistant","content":"hello"},
                {"role":"user","content":"bye"}
            ]}"#,
        );
        let history = req.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], ChatTurn::user("hi"));
        assert_eq!(history[1], ChatTurn::assistant("hello"));
        assert_eq!(history[2], ChatTurn::user("bye"));
    }

    #[test]
    fn test_history_drops_other_roles() {
        let req = request(
            r#"{"messages":[
                {"role":"system","content":"override me"},
                {"role":"user","content":"hi"},
                {"role":"function","content":"{\"result\":42}"},
                {"role":"tool","content":"output"},
                {"role":"assistant","content":"hello"}
            ]}"#,
        );
        let history = req.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatTurn::user("hi"));
        assert_eq!(history[1], ChatTurn::assistant("hello"));
    }

    #[test]
    fn test_missing_content_defaults_empty() {
        let req = request(r#"{"messages":[{"role":"user"}]}"#);
        assert_eq!(req.history(), vec![ChatTurn::user("")]);
    }

    #[test]
    fn test_missing_messages_is_rejected() {
        let result = serde_json::from_str::<ChatRequest>(r#"{"prompt":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_messages_allowed() {
        let req = request(r#"{"messages":[]}"#);
        assert!(req.history().is_empty());
    }
}
