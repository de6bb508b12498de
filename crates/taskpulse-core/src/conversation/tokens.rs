//! Token estimates for the context budget.

use crate::core_types::Message;
use std::sync::OnceLock;
use tiktoken_rs::{p50k_base, CoreBPE};

/// Role and separator tokens the chat format adds around each message.
pub const MESSAGE_OVERHEAD: usize = 4;

fn encoder() -> Option<&'static CoreBPE> {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();
    ENCODER
        .get_or_init(|| match p50k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                log::warn!("Falling back to character-based token estimates: {}", e);
                None
            }
        })
        .as_ref()
}

pub fn estimate_text(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count().div_ceil(4),
    }
}

pub fn estimate_message(message: &Message) -> usize {
    let mut tokens = MESSAGE_OVERHEAD + estimate_text(&message.content);
    if let Some(calls) = &message.tool_calls {
        if let Ok(json) = serde_json::to_string(calls) {
            tokens += estimate_text(&json);
        }
    }
    tokens
}
