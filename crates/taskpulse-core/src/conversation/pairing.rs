//! Tool call / tool result pairing.
//!
//! The model rejects a prompt in which an assistant tool call has no result,
//! or a tool result answers no call. Truncation therefore treats an assistant
//! message with tool calls plus the tool messages answering it as one unit.

use crate::core_types::{Message, Role};
use crate::errors::AssistantError;
use std::collections::HashSet;
use std::ops::Range;

/// Verifies that every tool call is answered before the next non-tool message
/// and that every tool result answers an earlier call.
pub fn check_pairing(messages: &[Message]) -> Result<(), AssistantError> {
    let mut pending: HashSet<&str> = HashSet::new();

    for (i, message) in messages.iter().enumerate() {
        if message.role == Role::Tool {
            let id = message.tool_call_id.as_deref().unwrap_or_default();
            if !pending.remove(id) {
                return Err(AssistantError::InternalError(format!(
                    "tool message at index {} answers unknown call '{}'",
                    i, id
                )));
            }
            continue;
        }

        if !pending.is_empty() {
            return Err(AssistantError::InternalError(format!(
                "tool calls {:?} have no result before message {}",
                pending, i
            )));
        }

        for call in message.tool_calls.iter().flatten() {
            match call.id.as_deref() {
                Some(id) => {
                    pending.insert(id);
                }
                None => {
                    return Err(AssistantError::InternalError(format!(
                        "tool call '{}' at index {} has no id",
                        call.name, i
                    )))
                }
            }
        }
    }

    if pending.is_empty() {
        Ok(())
    } else {
        Err(AssistantError::InternalError(format!(
            "tool calls {:?} have no result",
            pending
        )))
    }
}

/// A run of messages that is kept or dropped as a whole.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Unit {
    pub range: Range<usize>,
    pub pinned: bool,
    /// False while some of the unit's tool calls still await their result.
    pub complete: bool,
}

pub(crate) fn units(messages: &[Message]) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut i = 0;

    while i < messages.len() {
        let message = &messages[i];
        let start = i;
        i += 1;

        if !message.has_tool_calls() {
            units.push(Unit {
                range: start..i,
                pinned: message.role == Role::System,
                complete: true,
            });
            continue;
        }

        let mut awaiting: HashSet<&str> = message
            .tool_calls
            .iter()
            .flatten()
            .filter_map(|call| call.id.as_deref())
            .collect();
        while i < messages.len() && messages[i].role == Role::Tool {
            if let Some(id) = messages[i].tool_call_id.as_deref() {
                awaiting.remove(id);
            }
            i += 1;
        }

        units.push(Unit {
            range: start..i,
            pinned: false,
            complete: awaiting.is_empty(),
        });
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::ToolCall;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "get_users_in_team", json!({}))
    }

    #[test]
    fn test_complete_pairs_pass() {
        let messages = vec![
            Message::user("who is on the team?"),
            Message::assistant("", Some(vec![call("a"), call("b")])),
            Message::tool("b", "{}"),
            Message::tool("a", "{}"),
            Message::assistant("Alice and Bob", None),
        ];
        assert!(check_pairing(&messages).is_ok());
    }

    #[test]
    fn test_orphan_result_and_unanswered_call_fail() {
        let orphan = vec![Message::user("hi"), Message::tool("x", "{}")];
        assert!(matches!(
            check_pairing(&orphan),
            Err(AssistantError::InternalError(_))
        ));

        let unanswered = vec![
            Message::assistant("", Some(vec![call("a")])),
            Message::assistant("done", None),
        ];
        assert!(check_pairing(&unanswered).is_err());

        let trailing = vec![Message::assistant("", Some(vec![call("a")]))];
        assert!(check_pairing(&trailing).is_err());
    }

    #[test]
    fn test_units_group_calls_with_their_results() {
        let messages = vec![
            Message::system("preamble"),
            Message::user("q"),
            Message::assistant("", Some(vec![call("a"), call("b")])),
            Message::tool("a", "{}"),
            Message::tool("b", "{}"),
            Message::assistant("answer", None),
            Message::assistant("", Some(vec![call("c")])),
        ];

        let units = units(&messages);
        let ranges: Vec<_> = units.iter().map(|u| u.range.clone()).collect();
        assert_eq!(ranges, vec![0..1, 1..2, 2..5, 5..6, 6..7]);
        assert!(units[0].pinned);
        assert!(units[2].complete);
        assert!(!units[4].complete);
    }
}
