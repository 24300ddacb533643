//! Conversation transcript: an append-only list of messages plus a
//! transient typing placeholder.
//!
//! Entries are immutable once rendered, except the assistant message
//! currently streaming, whose text grows monotonically through
//! [`Transcript::append_to`] until the stream ends.

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    /// Inline failure notice shown in the transcript.
    Error,
}

/// One transcript entry.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

/// Handle to a message whose text may still grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryId(usize);

/// Append-only message list with auto-scroll and a typing indicator.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Message>,
    typing: bool,
    /// Lines scrolled up from the bottom; 0 means following the newest entry.
    scroll_offset: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a handle to its text.
    ///
    /// Resets the scroll position so the newest entry is visible.
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> EntryId {
        self.entries.push(Message {
            role,
            text: text.into(),
        });
        self.scroll_offset = 0;
        EntryId(self.entries.len() - 1)
    }

    /// Extend an entry's text with a streamed fragment and scroll to it.
    pub fn append_to(&mut self, id: EntryId, fragment: &str) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.text.push_str(fragment);
            self.scroll_offset = 0;
        }
    }

    /// Show the typing placeholder. Idempotent.
    pub fn show_typing(&mut self) {
        self.typing = true;
        self.scroll_offset = 0;
    }

    /// Remove the typing placeholder; no-op when absent.
    pub fn hide_typing(&mut self) {
        self.typing = false;
    }

    pub fn typing(&self) -> bool {
        self.typing
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&Message> {
        self.entries.get(id.0)
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Scroll one line towards older entries.
    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(1);
    }

    /// Scroll one line towards the newest entry.
    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }
}
