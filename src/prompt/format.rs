//! Pluggable prompt formats, one per model family
//!
//! The trimming algorithm is polymorphic over a single rendering capability,
//! so adding a model family means adding a `PromptFormat` implementation and
//! nothing else.

use serde::{Deserialize, Serialize};

use super::{ChatTurn, Role};

/// Renders a system instruction and a turn history into model-ready text
pub trait PromptFormat: Send + Sync {
    fn render(&self, system: &str, turns: &[ChatTurn]) -> String;
}

/// Prompt format selector used in configuration
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptFormatKind {
    #[default]
    Llama2,
    Chatml,
}

impl PromptFormatKind {
    pub fn build(self) -> Box<dyn PromptFormat> {
        match self {
            PromptFormatKind::Llama2 => Box::new(Llama2Format),
            PromptFormatKind::Chatml => Box::new(ChatMlFormat),
        }
    }
}

/// Llama 2 chat encoding
///
/// `<s>[INST] <<SYS>>\n{system}\n<</SYS>>\n\n{user} [/INST] {assistant} </s>`
/// with a fresh `<s>[INST]` block per user turn. The rendering always ends
/// with `[/INST]` so the model produces the next assistant reply.
pub struct Llama2Format;

impl PromptFormat for Llama2Format {
    fn render(&self, system: &str, turns: &[ChatTurn]) -> String {
        let mut out = format!("<s>[INST] <<SYS>>\n{}\n<</SYS>>\n\n", system);
        let mut in_inst = true;
        for turn in turns {
            match turn.role {
                Role::User => {
                    if !in_inst {
                        out.push_str("<s>[INST] ");
                        in_inst = true;
                    }
                    out.push_str(&turn.content);
                    out.push_str(" [/INST]");
                    in_inst = false;
                }
                Role::Assistant => {
                    out.push(' ');
                    out.push_str(&turn.content);
                    out.push_str(" </s>");
                }
                // History is role-filtered upstream; system turns never appear
                Role::System => {}
            }
        }
        if in_inst {
            out.push_str(" [/INST]");
        }
        out
    }
}

/// ChatML encoding (`<|im_start|>role ... <|im_end|>`)
///
/// Ends with an open assistant header awaiting the completion.
pub struct ChatMlFormat;

impl PromptFormat for ChatMlFormat {
    fn render(&self, system: &str, turns: &[ChatTurn]) -> String {
        let mut out = format!("<|im_start|>system\n{}<|im_end|>\n", system);
        for turn in turns {
            match turn.role {
                Role::System => continue,
                Role::User | Role::Assistant => {
                    out.push_str(&format!(
                        "<|im_start|>{}\n{}<|im_end|>\n",
                        turn.role, turn.content
                    ));
                }
            }
        }
        out.push_str("<|im_start|>assistant\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llama2_system_only() {
        let text = Llama2Format.render("be helpful", &[]);
        assert_eq!(text, "<s>[INST] <<SYS>>\nbe helpful\n<</SYS>>\n\n [/INST]");
    }

    #[test]
    fn test_llama2_single_user_turn() {
        let text = Llama2Format.render("sys", &[ChatTurn::user("hello")]);
        assert_eq!(text, "<s>[INST] <<SYS>>\nsys\n<</SYS>>\n\nhello [/INST]");
    }

    #[test]
    fn test_llama2_multi_turn() {
        let turns = vec![
            ChatTurn::user("hi"),
            ChatTurn::assistant("hey"),
            ChatTurn::user("how are you?"),
        ];
        let text = Llama2Format.render("sys", &turns);
        assert_eq!(
            text,
            "<s>[INST] <<SYS>>\nsys\n<</SYS>>\n\nhi [/INST] hey </s><s>[INST] how are you? [/INST]"
        );
    }

    #[test]
    fn test_llama2_ends_open_after_assistant_history() {
        // A history ending on an assistant turn still yields a prompt the
        // model can continue from
        let turns = vec![ChatTurn::user("hi"), ChatTurn::assistant("hey")];
        let text = Llama2Format.render("sys", &turns);
        assert!(text.ends_with("hey </s>"));
    }

    #[test]
    fn test_chatml_system_only() {
        let text = ChatMlFormat.render("be helpful", &[]);
        assert_eq!(
            text,
            "<|im_start|>system\nbe helpful<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_chatml_multi_turn() {
        let turns = vec![ChatTurn::user("hi"), ChatTurn::assistant("hey")];
        let text = ChatMlFormat.render("sys", &turns);
        assert_eq!(
            text,
            "<|im_start|>system\nsys<|im_end|>\n\
             <|im_start|>user\nhi<|im_end|>\n\
             <|im_start|>assistant\nhey<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_format_kind_serde() {
        assert_eq!(
            serde_json::to_string(&PromptFormatKind::Llama2).unwrap(),
            "\"llama2\""
        );
        let kind: PromptFormatKind = serde_json::from_str("\"chatml\"").unwrap();
        assert_eq!(kind, PromptFormatKind::Chatml);
    }

    #[test]
    fn test_format_kind_default() {
        assert_eq!(PromptFormatKind::default(), PromptFormatKind::Llama2);
    }
}
