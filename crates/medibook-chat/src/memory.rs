//! Per-user conversation memory.
//!
//! A sliding window over the append-only chat log. Writes go straight
//! through to the log; nothing is cached between calls.

use std::sync::Arc;

use chrono::Utc;

use medibook_core::error::Result;
use medibook_core::store::ChatLog;
use medibook_core::types::{ChatMessage, ChatRole};

/// Default number of messages in the recent window.
pub const DEFAULT_WINDOW: usize = 8;

// =============================================================================
// ConversationMemory
// =============================================================================

/// Bounded view over each user's message log.
pub struct ConversationMemory {
    log: Arc<dyn ChatLog>,
    window: usize,
}

impl ConversationMemory {
    /// Create a memory with the given window size (0 falls back to the default).
    pub fn new(log: Arc<dyn ChatLog>, window: usize) -> Self {
        let window = if window == 0 { DEFAULT_WINDOW } else { window };
        Self { log, window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn add_user_message(&self, user_id: &str, content: &str) -> Result<()> {
        self.log.append(user_id, ChatRole::User, content, Utc::now())
    }

    pub fn add_assistant_message(&self, user_id: &str, content: &str) -> Result<()> {
        self.log
            .append(user_id, ChatRole::Assistant, content, Utc::now())
    }

    /// The last `k` messages in chronological order, or the last `window`
    /// messages when `k` is `None`.
    pub fn get_recent_messages(
        &self,
        user_id: &str,
        k: Option<usize>,
    ) -> Result<Vec<ChatMessage>> {
        let k = k.unwrap_or(self.window);
        let mut messages = self.log.recent(user_id)?;
        if messages.len() > k {
            messages.drain(..messages.len() - k);
        }
        Ok(messages)
    }

    /// Newline-joined assistant messages older than the recent window.
    pub fn get_summary(&self, user_id: &str) -> Result<String> {
        let messages = self.log.recent(user_id)?;
        let older = messages.len().saturating_sub(self.window);
        let summary = messages[..older]
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(summary)
    }

    pub fn clear(&self, user_id: &str) -> Result<()> {
        self.log.clear(user_id)
    }
}
