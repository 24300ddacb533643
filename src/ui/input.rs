//! Multi-line input box with grow-up-to-cap height.

/// Clamp a desired content height to a fixed cap.
pub fn clamp_height(content_rows: u16, cap: u16) -> u16 {
    content_rows.min(cap)
}

/// Editable multi-line text buffer backing the input box.
#[derive(Debug, Default)]
pub struct InputBox {
    buffer: String,
    /// Byte offset of the cursor within `buffer`.
    cursor: usize,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Returns `true` when the buffer is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    /// Insert a character at the cursor.
    pub fn insert_char(&mut self, c: char) {
        self.buffer.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Insert a literal newline at the cursor (Shift+Enter).
    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// Delete the character before the cursor, if any.
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
    }

    /// Replace the whole buffer, placing the cursor at the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.cursor = self.buffer.len();
    }

    /// Empty the buffer, resetting the height to a single row.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Rows needed to display the wrapped buffer at `width`, clamped to
    /// `cap`. Never less than one row.
    pub fn desired_height(&self, width: u16, cap: u16) -> u16 {
        if width == 0 {
            return 1;
        }
        let width = usize::from(width);
        let rows: usize = self
            .buffer
            .split('\n')
            .map(|line| line.chars().count().div_ceil(width).max(1))
            .sum();
        clamp_height(u16::try_from(rows).unwrap_or(u16::MAX).max(1), cap)
    }

    /// Cursor position as (row, column) in character terms, pre-wrap.
    pub fn cursor_position(&self) -> (u16, u16) {
        let before = &self.buffer[..self.cursor];
        let row = before.matches('\n').count();
        let col = before
            .rsplit('\n')
            .next()
            .map(|line| line.chars().count())
            .unwrap_or(0);
        (
            u16::try_from(row).unwrap_or(u16::MAX),
            u16::try_from(col).unwrap_or(u16::MAX),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_grows_up_to_cap() {
        assert_eq!(clamp_height(200, 120), 120);
        assert_eq!(clamp_height(50, 120), 50);
    }

    #[test]
    fn clear_resets_height_to_one_row() {
        let mut input = InputBox::new();
        input.set_text("a\nb\nc\nd");
        assert_eq!(input.desired_height(40, 6), 4);

        input.clear();
        assert_eq!(input.desired_height(40, 6), 1);
    }

    #[test]
    fn desired_height_wraps_long_lines() {
        let mut input = InputBox::new();
        input.set_text("x".repeat(25));
        assert_eq!(input.desired_height(10, 6), 3);
        assert_eq!(input.desired_height(10, 2), 2);
    }

    #[test]
    fn backspace_handles_multibyte_characters() {
        let mut input = InputBox::new();
        input.insert_char('日');
        input.insert_char('本');
        input.backspace();
        assert_eq!(input.text(), "日");

        input.backspace();
        input.backspace();
        assert_eq!(input.text(), "");
    }

    #[test]
    fn newline_is_a_literal_insert() {
        let mut input = InputBox::new();
        input.insert_char('a');
        input.insert_newline();
        input.insert_char('b');
        assert_eq!(input.text(), "a\nb");
        assert_eq!(input.cursor_position(), (1, 1));
    }

    #[test]
    fn blank_detection_ignores_whitespace() {
        let mut input = InputBox::new();
        assert!(input.is_blank());
        input.set_text("  \n\t ");
        assert!(input.is_blank());
        input.set_text("  hi ");
        assert!(!input.is_blank());
    }
}
