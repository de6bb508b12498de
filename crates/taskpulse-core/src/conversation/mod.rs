//! Conversation state for one assistant session
//!
//! Holds the ordered message history, a running token estimate and the tool
//! registry the prompt advertises. History is append-only; the only mutation
//! is truncation, which drops the oldest complete units once the estimate
//! exceeds the budget. The system preamble and the in-flight turn (everything
//! from the latest user message on) are never dropped.

use crate::core_types::{Message, Role};
use crate::errors::AssistantError;
use crate::llm::ToolMetadata;
use crate::tools::ToolRegistry;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod pairing;
pub mod tokens;

pub use pairing::check_pairing;
pub use tokens::{estimate_message, estimate_text};

/// What the model receives for one call.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub tool_messages: usize,
    pub system_messages: usize,
    pub tool_calls: usize,
    pub estimated_tokens: usize,
    pub budget_tokens: usize,
    pub truncated_messages: usize,
    pub started_at: Option<DateTime<Utc>>,
}

pub struct ConversationState {
    preamble: Option<Message>,
    messages: Vec<Message>,
    next_seq: u64,
    estimated_tokens: usize,
    budget: usize,
    registry: Arc<ToolRegistry>,
    truncated_total: usize,
    started_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(registry: Arc<ToolRegistry>, budget: usize) -> Self {
        Self {
            preamble: None,
            messages: Vec::new(),
            next_seq: 1,
            estimated_tokens: 0,
            budget,
            registry,
            truncated_total: 0,
            started_at: Utc::now(),
        }
    }

    pub fn with_system_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.set_system_preamble(Some(preamble.into()));
        self
    }

    /// Replaces the preamble. `None` removes it.
    pub fn set_system_preamble(&mut self, preamble: Option<String>) {
        if let Some(old) = self.preamble.take() {
            self.estimated_tokens -= estimate_message(&old);
        }
        if let Some(text) = preamble {
            let mut message = Message::system(text);
            message.seq = 0;
            self.estimated_tokens += estimate_message(&message);
            self.preamble = Some(message);
        }
    }

    /// Records a message, stamping its sequence number and time.
    pub fn append(&mut self, mut message: Message) -> u64 {
        message.seq = self.next_seq;
        message.timestamp = Utc::now();
        self.next_seq += 1;

        self.estimated_tokens += estimate_message(&message);
        debug!(
            "Appended {:?} message #{} (estimate now {} tokens)",
            message.role, message.seq, self.estimated_tokens
        );
        self.messages.push(message);
        self.next_seq - 1
    }

    /// Assembles the next prompt, truncating history to the budget first.
    pub fn build_prompt(&mut self) -> Result<Prompt, AssistantError> {
        if self.estimated_tokens > self.budget {
            self.truncate();
        }

        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.preamble.iter().cloned());
        messages.extend(self.messages.iter().cloned());
        check_pairing(&messages)?;

        Ok(Prompt {
            messages,
            tools: self.registry.list(),
        })
    }

    fn truncate(&mut self) {
        let before = self.estimated_tokens;
        let protected_from = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .unwrap_or(self.messages.len());

        let mut keep = vec![true; self.messages.len()];
        let mut estimate = self.estimated_tokens;
        for unit in pairing::units(&self.messages) {
            if estimate <= self.budget {
                break;
            }
            if unit.pinned || !unit.complete || unit.range.end > protected_from {
                continue;
            }
            for i in unit.range {
                estimate -= estimate_message(&self.messages[i]);
                keep[i] = false;
            }
        }

        let mut flags = keep.into_iter();
        let original = self.messages.len();
        self.messages.retain(|_| flags.next().unwrap_or(true));
        let removed = original - self.messages.len();

        self.estimated_tokens = estimate;
        self.truncated_total += removed;

        if removed > 0 {
            info!(
                "Truncated {} messages ({} -> {} estimated tokens, budget {})",
                removed, before, estimate, self.budget
            );
        }
        if estimate > self.budget {
            warn!(
                "Prompt stays over budget ({} > {} tokens): only protected messages remain",
                estimate, self.budget
            );
        }
    }

    /// Clears history. The preamble survives.
    pub fn reset(&mut self) {
        info!("Resetting conversation ({} messages)", self.messages.len());
        self.messages.clear();
        self.estimated_tokens = self.preamble.as_ref().map(estimate_message).unwrap_or(0);
        self.truncated_total = 0;
        self.started_at = Utc::now();
    }

    /// Preamble followed by the retained history.
    pub fn history(&self) -> Vec<Message> {
        self.preamble
            .iter()
            .chain(self.messages.iter())
            .cloned()
            .collect()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    pub fn stats(&self) -> ConversationStats {
        let mut stats = ConversationStats {
            estimated_tokens: self.estimated_tokens,
            budget_tokens: self.budget,
            truncated_messages: self.truncated_total,
            started_at: Some(self.started_at),
            ..Default::default()
        };

        for message in self.preamble.iter().chain(self.messages.iter()) {
            stats.total_messages += 1;
            match message.role {
                Role::System => stats.system_messages += 1,
                Role::User => stats.user_messages += 1,
                Role::Assistant => stats.assistant_messages += 1,
                Role::Tool => stats.tool_messages += 1,
            }
            stats.tool_calls += message.tool_calls.as_ref().map_or(0, Vec::len);
        }
        stats
    }
}
