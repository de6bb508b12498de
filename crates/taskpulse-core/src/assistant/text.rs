//! Answer text assembly shared by the streaming and non-streaming paths.
//!
//! A turn's answer is every non-empty assistant text of the turn, in order,
//! separated by a blank line. Fragments handed out by `push` carry the
//! separator themselves, so joining them yields exactly `text()`.

pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// Appended when a turn stops at the iteration cap.
pub const FALLBACK_NOTICE: &str =
    "Sorry, I couldn't complete the request within the allowed number of steps.";

#[derive(Debug, Default)]
pub struct TextAccumulator {
    text: String,
    segment_started: bool,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a new model response.
    pub fn begin_segment(&mut self) {
        self.segment_started = false;
    }

    /// Adds a delta and returns the fragment to display, `None` for empty deltas.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        if delta.is_empty() {
            return None;
        }

        let fragment = if !self.segment_started && !self.text.is_empty() {
            format!("{}{}", SEGMENT_SEPARATOR, delta)
        } else {
            delta.to_string()
        };
        self.segment_started = true;
        self.text.push_str(&fragment);
        Some(fragment)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
