use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Message, Role};

fn input_marker() -> &'static Regex {
    static INPUT: OnceLock<Regex> = OnceLock::new();
    INPUT.get_or_init(|| Regex::new(r"(?i)###\s*INPUT:").expect("valid input marker"))
}

fn output_marker() -> &'static Regex {
    static OUTPUT: OnceLock<Regex> = OnceLock::new();
    OUTPUT.get_or_init(|| Regex::new(r"(?i)###\s*OUTPUT:").expect("valid output marker"))
}

pub fn has_scaffold_marker(text: &str) -> bool {
    input_marker().is_match(text) || output_marker().is_match(text)
}

/// Text between the last input marker and the output marker that follows it,
/// trimmed. A blank block counts as missing.
fn extract_scaffolded_input(text: &str) -> Option<&str> {
    let input = input_marker().find_iter(text).last()?;
    let output = output_marker().find_at(text, input.end())?;
    Some(text[input.end()..output.start()].trim()).filter(|s| !s.is_empty())
}

/// Rewrite stored turns for reuse as context.
///
/// System messages are dropped. A user message carrying scaffold markers is
/// replaced by the text of its input block, or dropped when it has no
/// complete input/output pair or the block is blank. Everything else passes
/// through in order.
/// The output never contains a marker, so applying this twice changes nothing.
pub fn neutralize(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter_map(|msg| match msg.role() {
            Role::System => None,
            Role::User if has_scaffold_marker(msg.content()) => {
                extract_scaffolded_input(msg.content()).map(Message::user)
            }
            _ => Some(msg.clone()),
        })
        .collect()
}

/// Ordered record of completed turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed exchange: the raw user input, then the answer.
    pub fn append_turn(&mut self, user_input: impl Into<String>, assistant_text: impl Into<String>) {
        self.messages.push(Message::user(user_input));
        self.messages.push(Message::assistant(assistant_text));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent assistant answer, for copy-style read-back.
    pub fn last_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == Role::Assistant)
            .map(Message::content)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl From<Vec<Message>> for ConversationHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_histories() -> Vec<Vec<Message>> {
        vec![
            vec![],
            vec![Message::system("be terse"), Message::user("hi"), Message::assistant("hello")],
            vec![
                Message::user("### INPUT:\nprint 1\n### OUTPUT:"),
                Message::assistant("1"),
                Message::user("### input: only a header"),
                Message::assistant("?"),
            ],
            vec![
                Message::user("### INPUT: ### OUTPUT:"),
                Message::assistant("?"),
                Message::user("next"),
            ],
            vec![
                Message::user("###INPUT: a\n###OUTPUT: b\n### INPUT:\n  nested  \n### OUTPUT:\n### OUTPUT:"),
                Message::system("another"),
            ],
        ]
    }

    #[test]
    fn test_system_messages_are_dropped() {
        let cleaned = neutralize(&[
            Message::system("x"),
            Message::user("q"),
            Message::assistant("a"),
        ]);
        assert_eq!(cleaned, vec![Message::user("q"), Message::assistant("a")]);
    }

    #[test]
    fn test_scaffolded_user_message_is_extracted() {
        let cleaned = neutralize(&[Message::user("### INPUT:\n  print 1  \n### OUTPUT:")]);
        assert_eq!(cleaned, vec![Message::user("print 1")]);
    }

    #[test]
    fn test_last_input_block_wins() {
        let text = "### INPUT:\nexample\n### OUTPUT:\nresult\n### INPUT:\nreal\n### OUTPUT:";
        let cleaned = neutralize(&[Message::user(text)]);
        assert_eq!(cleaned, vec![Message::user("real")]);
    }

    #[test]
    fn test_incomplete_scaffold_is_dropped() {
        let cleaned = neutralize(&[
            Message::user("### OUTPUT: dangling"),
            Message::user("### INPUT: never closed"),
            Message::assistant("kept ### INPUT: as is"),
        ]);
        assert_eq!(cleaned, vec![Message::assistant("kept ### INPUT: as is")]);
    }

    #[test]
    fn test_blank_input_block_is_dropped() {
        let cleaned = neutralize(&[
            Message::user("### INPUT: ### OUTPUT:"),
            Message::assistant("?"),
            Message::user("### INPUT:\n   \n### OUTPUT:"),
            Message::user("next"),
        ]);
        assert_eq!(cleaned, vec![Message::assistant("?"), Message::user("next")]);
        assert!(cleaned.iter().all(|m| !m.content().is_empty()));
    }

    #[test]
    fn test_neutralize_is_idempotent() {
        for history in sample_histories() {
            let once = neutralize(&history);
            assert_eq!(neutralize(&once), once);
            assert!(once.iter().all(|m| m.role() != Role::System));
        }
    }

    #[test]
    fn test_neutralize_does_not_touch_stored_turns() {
        let mut history = ConversationHistory::new();
        history.append_turn("### INPUT:\nx\n### OUTPUT:", "y");
        let before = history.messages().to_vec();

        let derived = neutralize(history.messages());
        assert_eq!(derived[0].content(), "x");
        assert_eq!(history.messages(), before.as_slice());
    }

    #[test]
    fn test_append_turn_order() {
        let mut history = ConversationHistory::new();
        assert!(history.is_empty());
        history.append_turn("q", "a");
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0], Message::user("q"));
        assert_eq!(history.messages()[1], Message::assistant("a"));
        assert_eq!(history.last_answer(), Some("a"));
    }
}
