//! Content filter for inbound chat messages.
//!
//! A stateless denylist check: a message is blocked when it contains any
//! configured term, compared case-insensitively as a plain substring.

use crate::config::SafetyConfig;

/// A blocked message, carrying the denylist term that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub term: String,
}

/// Denylist filter consulted before any other routing step.
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    /// Lower-cased terms, in configuration order.
    denylist: Vec<String>,
    refusal_message: String,
}

impl SafetyFilter {
    /// Create a new filter with the given configuration.
    pub fn new(config: SafetyConfig) -> Self {
        let denylist = config
            .denylist
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            denylist,
            refusal_message: config.refusal_message,
        }
    }

    /// Check a message against the denylist.
    ///
    /// Returns the first term, in list order, contained in the message.
    pub fn check(&self, text: &str) -> Option<Violation> {
        let lowered = text.to_lowercase();
        self.denylist
            .iter()
            .find(|term| lowered.contains(term.as_str()))
            .map(|term| Violation { term: term.clone() })
    }

    /// Fixed reply for blocked messages.
    pub fn refusal_message(&self) -> &str {
        &self.refusal_message
    }
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}
