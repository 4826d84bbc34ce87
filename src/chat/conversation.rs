//! Conversation history forwarded to the agent.
//!
//! History lives in the browser and is echoed back with every request. The
//! server keeps nothing between requests; it only trims the history to the
//! configured window and prepends the system prompt.

use super::agent::{ChatMessage, Role};

/// Builds the message list for one agent turn
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: String,
    window: usize,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>, window: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            window,
        }
    }

    /// The most recent `window` messages of `history`
    ///
    /// Client-supplied system messages and empty messages are dropped, and the
    /// window never opens on an assistant reply.
    pub fn window<'a>(&self, history: &'a [ChatMessage]) -> Vec<&'a ChatMessage> {
        let kept: Vec<&ChatMessage> = history
            .iter()
            .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
            .collect();

        let start = kept.len().saturating_sub(self.window);
        let mut window = &kept[start..];
        while let Some((first, rest)) = window.split_first() {
            if first.role != Role::Assistant {
                break;
            }
            window = rest;
        }
        window.to_vec()
    }

    /// System prompt, windowed history (when enabled) and the new user message
    pub fn messages(&self, history: &[ChatMessage], use_history: bool, message: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.window + 2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatMessage::new(Role::System, self.system_prompt.clone()));
        }
        if use_history {
            messages.extend(self.window(history).into_iter().cloned());
        }
        messages.push(ChatMessage::user(message));
        messages
    }
}
