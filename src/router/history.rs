//! Short-term conversation memory.

use crate::services::ChatMessage;
use std::collections::VecDeque;

/// Last few `(user, assistant)` exchanges, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<(String, String)>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back((user.into(), assistant.into()));
    }

    /// What the user said most recently.
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns.back().map(|(user, _)| user.as_str())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Chat context: system prompt, past turns, then `user_text`.
    pub fn to_messages(&self, system_prompt: &str, user_text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2 + 2);
        messages.push(ChatMessage::system(system_prompt));
        for (user, assistant) in &self.turns {
            messages.push(ChatMessage::user(user.clone()));
            messages.push(ChatMessage::assistant(assistant.clone()));
        }
        messages.push(ChatMessage::user(user_text));
        messages
    }
}
