//! Prompt assembly strategies.
//!
//! Two interchangeable renderings of the same material, selected by backend
//! capability:
//!
//! - [`PromptStrategy::Flat`] — one text blob with fixed section order
//!   `CONTEXT:` → `DOCUMENTS:` → `RECENT MESSAGES:` → `INSTRUCTIONS:` →
//!   `QUESTION:`, for backends without native chat history.
//! - [`PromptStrategy::ChatHistory`] — a system instruction holding
//!   `CONTEXT:`/`DOCUMENTS:`/`INSTRUCTIONS:` plus the ordered turn list,
//!   for backends that take history natively.
//!
//! Enum dispatch — adding a strategy is a new variant plus a new arm.
//! Ordering is deterministic, configuration text is interpolated verbatim,
//! and documents are 1-indexed in retrieval order. Nothing is truncated
//! here; history length is bounded upstream by the fetch.

use serde::Deserialize;

use crate::history::{HistoryTurn, TurnRole};
use crate::llm::{ChatRole, ChatTurn, PromptPayload};
use crate::retrieval::Document;

/// Which assembly the configured backend wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStrategy {
    Flat,
    ChatHistory,
}

impl PromptStrategy {
    /// Combine static configuration text, retrieved documents and history
    /// into the strategy's payload shape.
    pub fn assemble(
        &self,
        context: &str,
        instructions: &str,
        documents: &[Document],
        history: &[HistoryTurn],
        utterance: &str,
    ) -> PromptPayload {
        match self {
            PromptStrategy::Flat => {
                PromptPayload::Flat { prompt: flat_prompt(context, instructions, documents, history, utterance) }
            }
            PromptStrategy::ChatHistory => PromptPayload::Chat {
                system_instruction: system_instruction(context, instructions, documents),
                turns: chat_turns(history),
                latest: utterance.to_string(),
            },
        }
    }
}

/// Render one document section entry. `index` is 1-based encounter order.
fn document_line(index: usize, doc: &Document) -> String {
    format!(
        "\tDOCUMENT {index} \n\t\tTitle: {} \n\t\tData: {}",
        doc.title, doc.content
    )
}

/// `CONTEXT:`/`DOCUMENTS:`/`INSTRUCTIONS:` steering text shared by both
/// strategies. Carries no history and no question.
fn system_instruction(context: &str, instructions: &str, documents: &[Document]) -> String {
    let mut lines = Vec::with_capacity(documents.len() + 3);
    lines.push(format!("CONTEXT: {context}"));
    lines.push("DOCUMENTS:".to_string());
    for (i, doc) in documents.iter().enumerate() {
        lines.push(document_line(i + 1, doc));
    }
    lines.push("INSTRUCTIONS:".to_string());
    lines.push(instructions.to_string());
    lines.join("\n")
}

/// Single-blob rendering with history and question embedded.
fn flat_prompt(
    context: &str,
    instructions: &str,
    documents: &[Document],
    history: &[HistoryTurn],
    utterance: &str,
) -> String {
    let mut lines = Vec::with_capacity(documents.len() + history.len() + 5);
    lines.push(format!("CONTEXT: {context}"));
    lines.push("DOCUMENTS:".to_string());
    for (i, doc) in documents.iter().enumerate() {
        lines.push(document_line(i + 1, doc));
    }
    lines.push("RECENT MESSAGES:".to_string());
    for turn in history {
        let speaker = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "bot",
        };
        lines.push(format!("{speaker}: {}", turn.payload.render()));
    }
    lines.push("INSTRUCTIONS:".to_string());
    lines.push(instructions.to_string());
    lines.push(format!("QUESTION: {utterance}"));
    lines.join("\n")
}

/// Map history turns onto backend chat roles, oldest first.
fn chat_turns(history: &[HistoryTurn]) -> Vec<ChatTurn> {
    history
        .iter()
        .map(|turn| ChatTurn {
            role: match turn.role {
                TurnRole::User => ChatRole::User,
                TurnRole::Assistant => ChatRole::Model,
            },
            text: turn.payload.render(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TurnPayload;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("A", "alpha facts"),
            Document::new("B", "beta facts"),
        ]
    }

    fn history() -> Vec<HistoryTurn> {
        vec![
            HistoryTurn::user_text("hi"),
            HistoryTurn::assistant_text("hello"),
        ]
    }

    #[test]
    fn flat_sections_appear_in_order() {
        let payload = PromptStrategy::Flat.assemble("persona", "behave", &docs(), &history(), "what is alpha?");
        let PromptPayload::Flat { prompt } = payload else {
            panic!("expected flat payload");
        };
        let ctx = prompt.find("CONTEXT:").unwrap();
        let doc = prompt.find("DOCUMENTS:").unwrap();
        let msg = prompt.find("RECENT MESSAGES:").unwrap();
        let ins = prompt.find("INSTRUCTIONS:").unwrap();
        let q = prompt.find("QUESTION:").unwrap();
        assert!(ctx < doc && doc < msg && msg < ins && ins < q);
        assert!(prompt.contains("QUESTION: what is alpha?"));
    }

    #[test]
    fn documents_are_one_indexed_in_retrieval_order() {
        let payload = PromptStrategy::Flat.assemble("", "", &docs(), &[], "q");
        let PromptPayload::Flat { prompt } = payload else {
            panic!("expected flat payload");
        };
        let d1 = prompt.find("DOCUMENT 1").unwrap();
        let d2 = prompt.find("DOCUMENT 2").unwrap();
        assert!(d1 < d2);
        let a = prompt.find("Title: A").unwrap();
        let b = prompt.find("Title: B").unwrap();
        assert!(d1 < a && a < d2 && d2 < b);
    }

    #[test]
    fn flat_history_renders_user_and_bot_lines_oldest_first() {
        let payload = PromptStrategy::Flat.assemble("", "", &[], &history(), "q");
        let PromptPayload::Flat { prompt } = payload else {
            panic!("expected flat payload");
        };
        let u = prompt.find("user: hi").unwrap();
        let b = prompt.find("bot: hello").unwrap();
        assert!(u < b);
    }

    #[test]
    fn chat_system_instruction_excludes_history_and_question() {
        let payload =
            PromptStrategy::ChatHistory.assemble("persona", "behave", &docs(), &history(), "what?");
        let PromptPayload::Chat { system_instruction, turns, latest } = payload else {
            panic!("expected chat payload");
        };
        assert!(system_instruction.contains("CONTEXT: persona"));
        assert!(system_instruction.contains("DOCUMENT 1"));
        assert!(system_instruction.contains("behave"));
        assert!(!system_instruction.contains("RECENT MESSAGES"));
        assert!(!system_instruction.contains("what?"));
        assert!(!system_instruction.contains("hi"));
        assert_eq!(turns.len(), 2);
        assert_eq!(latest, "what?");
    }

    #[test]
    fn chat_roles_map_user_then_model() {
        let payload = PromptStrategy::ChatHistory.assemble("", "", &[], &history(), "q");
        let PromptPayload::Chat { turns, .. } = payload else {
            panic!("expected chat payload");
        };
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[0].text, "hi");
        assert_eq!(turns[1].role, ChatRole::Model);
        assert_eq!(turns[1].text, "hello");
    }

    #[test]
    fn structured_turn_is_rendered_not_dropped() {
        let history = vec![HistoryTurn {
            role: TurnRole::Assistant,
            payload: TurnPayload::Structured(serde_json::json!({ "buttons": ["a", "b"] })),
        }];
        let payload = PromptStrategy::ChatHistory.assemble("", "", &[], &history, "q");
        let PromptPayload::Chat { turns, .. } = payload else {
            panic!("expected chat payload");
        };
        assert_eq!(turns.len(), 1);
        assert!(turns[0].text.contains("buttons"));
    }

    #[test]
    fn configuration_text_is_verbatim() {
        let context = "Line one.\n  Indented line two.";
        let payload = PromptStrategy::Flat.assemble(context, "Do X. Then Y.", &[], &[], "q");
        let PromptPayload::Flat { prompt } = payload else {
            panic!("expected flat payload");
        };
        assert!(prompt.contains(context));
        assert!(prompt.contains("Do X. Then Y."));
    }

    #[test]
    fn strategy_deserialises_from_snake_case() {
        #[derive(Deserialize)]
        struct S {
            strategy: PromptStrategy,
        }
        let s: S = toml::from_str("strategy = \"chat_history\"").unwrap();
        assert_eq!(s.strategy, PromptStrategy::ChatHistory);
        let s: S = toml::from_str("strategy = \"flat\"").unwrap();
        assert_eq!(s.strategy, PromptStrategy::Flat);
    }
}
