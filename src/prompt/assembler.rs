//! Context-bounded prompt assembly
//!
//! The system instruction is counted first and never dropped. History turns
//! are then retained newest-first: the retained set is always a contiguous
//! suffix of the input, so the reply is conditioned on the most recent
//! context and older turns are lost silently.

use super::{AssembledPrompt, ChatTurn, PromptBudget, PromptFormat, TokenCounter};

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("system instruction needs {used} tokens but only {budget} are usable")]
    BudgetExceeded { used: usize, budget: usize },
}

/// Assemble a prompt from a system instruction and a role-filtered history.
///
/// Pure function of its inputs: identical inputs produce byte-identical
/// output. The returned prompt's token count (under `counter`) never exceeds
/// `budget.usable()`.
pub fn assemble(
    system: &str,
    turns: &[ChatTurn],
    budget: &PromptBudget,
    counter: &dyn TokenCounter,
    format: &dyn PromptFormat,
) -> Result<AssembledPrompt, AssembleError> {
    let usable = budget.usable();

    let base = format.render(system, &[]);
    let base_tokens = counter.count(&base);
    if base_tokens > usable {
        return Err(AssembleError::BudgetExceeded {
            used: base_tokens,
            budget: usable,
        });
    }

    // Grow the retained suffix backward from the newest turn. The first turn
    // that pushes the rendering over budget is dropped along with everything
    // older than it.
    let mut best = (base, base_tokens, 0usize);
    let mut start = turns.len();
    while start > 0 {
        let candidate_turns = &turns[start - 1..];
        let text = format.render(system, candidate_turns);
        let tokens = counter.count(&text);
        if tokens > usable {
            break;
        }
        best = (text, tokens, candidate_turns.len());
        start -= 1;
    }

    let (text, token_count, turns_retained) = best;
    Ok(AssembledPrompt::new(text, token_count, turns_retained))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::HeuristicTokenCounter;

    /// Renders each part on its own line so tests can see exactly what was kept
    struct LineFormat;

    impl PromptFormat for LineFormat {
        fn render(&self, system: &str, turns: &[ChatTurn]) -> String {
            let mut out = String::from(system);
            for turn in turns {
                out.push('\n');
                out.push_str(&format!("{}: {}", turn.role, turn.content));
            }
            out
        }
    }

    /// One token per character, for exact budget arithmetic in tests
    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn budget(context: usize, reserved: usize) -> PromptBudget {
        PromptBudget {
            context_window_tokens: context,
            reserved_completion_tokens: reserved,
        }
    }

    fn history() -> Vec<ChatTurn> {
        vec![
            ChatTurn::user("first question"),
            ChatTurn::assistant("first answer"),
            ChatTurn::user("second question"),
            ChatTurn::assistant("second answer"),
            ChatTurn::user("third question"),
        ]
    }

    #[test]
    fn test_output_never_exceeds_budget() {
        let turns = history();
        for context in [10, 25, 40, 60, 100, 500] {
            let b = budget(context, 5);
            if let Ok(prompt) = assemble("sys", &turns, &b, &CharCounter, &LineFormat) {
                assert!(
                    prompt.token_count() <= b.usable(),
                    "context={} produced {} tokens for budget {}",
                    context,
                    prompt.token_count(),
                    b.usable()
                );
            }
        }
    }

    #[test]
    fn test_full_history_kept_when_it_fits() {
        let turns = history();
        let prompt = assemble("sys", &turns, &budget(1000, 10), &CharCounter, &LineFormat).unwrap();
        assert_eq!(prompt.turns_retained(), turns.len());
        assert!(prompt.text().contains("first question"));
        assert!(prompt.text().contains("third question"));
    }

    #[test]
    fn test_trimming_keeps_contiguous_recent_suffix() {
        let turns = history();
        // "sys" plus the last two turns renders to 49 chars; three turns need 71.
        let prompt = assemble("sys", &turns, &budget(60, 5), &CharCounter, &LineFormat).unwrap();
        assert_eq!(prompt.turns_retained(), 2);
        assert!(!prompt.text().contains("first question"));
        assert!(!prompt.text().contains("second question"));
        assert!(prompt.text().contains("second answer"));
        assert!(prompt.text().contains("third question"));
        // Retained turns keep their original order
        let answer_pos = prompt.text().find("second answer").unwrap();
        let question_pos = prompt.text().find("third question").unwrap();
        assert!(answer_pos < question_pos);
    }

    #[test]
    fn test_system_never_dropped() {
        let turns = history();
        let prompt = assemble(
            "always present",
            &turns,
            &budget(20, 5),
            &CharCounter,
            &LineFormat,
        )
        .unwrap();
        assert_eq!(prompt.turns_retained(), 0);
        assert_eq!(prompt.text(), "always present");
    }

    #[test]
    fn test_budget_exceeded_by_system_alone() {
        let err = assemble(
            "a very long system instruction",
            &[],
            &budget(10, 5),
            &CharCounter,
            &LineFormat,
        )
        .unwrap_err();
        let AssembleError::BudgetExceeded { used, budget } = err;
        assert_eq!(used, 30);
        assert_eq!(budget, 5);
    }

    #[test]
    fn test_empty_history_succeeds() {
        let prompt = assemble("sys", &[], &budget(100, 10), &CharCounter, &LineFormat).unwrap();
        assert_eq!(prompt.text(), "sys");
        assert_eq!(prompt.turns_retained(), 0);
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let turns = history();
        let b = budget(60, 5);
        let counter = HeuristicTokenCounter::new(4);
        let first = assemble("sys", &turns, &b, &counter, &LineFormat).unwrap();
        let second = assemble("sys", &turns, &b, &counter, &LineFormat).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.text(), second.text());
    }

    #[test]
    fn test_exact_fit_is_kept() {
        // "sys\nuser: hi" is 12 chars; usable budget of exactly 12 keeps it
        let turns = vec![ChatTurn::user("hi")];
        let prompt = assemble("sys", &turns, &budget(12, 0), &CharCounter, &LineFormat).unwrap();
        assert_eq!(prompt.turns_retained(), 1);
        assert_eq!(prompt.token_count(), 12);
    }
}
