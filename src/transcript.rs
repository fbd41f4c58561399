//! Transcript entries shown in the chat view.
//!
//! [`Transcript`] is a plain append-only list; the egui app renders it each
//! frame with stick-to-bottom scrolling.  Entry text is always rendered
//! verbatim as plain text (egui labels never interpret markup), so reply
//! content cannot inject anything into the UI.

// ---------------------------------------------------------------------------
// Role / TranscriptEntry
// ---------------------------------------------------------------------------

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Text typed by the user.
    User,
    /// A reply from the assistant — or, when `is_error` is set, a failure
    /// notice rendered in the assistant's column.
    Assistant,
}

/// One rendered turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    /// Error entries use a distinguishable style (orange, bold) so failures
    /// are visible without a separate error channel.
    pub is_error: bool,
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Append-only list of conversation turns.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role: Role::User,
            text: text.into(),
            is_error: false,
        });
    }

    /// Append an assistant turn.
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role: Role::Assistant,
            text: text.into(),
            is_error: false,
        });
    }

    /// Append an error notice in the assistant's column.
    pub fn push_error(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role: Role::Assistant,
            text: text.into(),
            is_error: true,
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let t = Transcript::new();
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn push_preserves_order_and_roles() {
        let mut t = Transcript::new();
        t.push_user("hello");
        t.push_assistant("Hi there!");
        t.push_error("something failed");

        let entries = t.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].text, "hello");
        assert!(!entries[0].is_error);
        assert_eq!(entries[1].role, Role::Assistant);
        assert!(!entries[1].is_error);
        assert_eq!(entries[2].role, Role::Assistant);
        assert!(entries[2].is_error);
    }

    /// Entry text is stored verbatim — no escaping, no interpretation.
    #[test]
    fn text_is_stored_verbatim() {
        let mut t = Transcript::new();
        t.push_assistant("<b>**not** markup</b>");
        assert_eq!(t.entries()[0].text, "<b>**not** markup</b>");
    }
}
