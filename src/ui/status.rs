//! Status line and setup-guide panel state.

use ratatui::style::{Color, Modifier, Style};

/// Styling category attached to a status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusCategory {
    /// Neutral informational text.
    #[default]
    Plain,
    /// A terminal failure for this run.
    Error,
    /// A model download is in progress.
    Downloading,
    /// The session is usable.
    Ready,
}

impl StatusCategory {
    /// Terminal style used when rendering a status of this category.
    pub fn style(self) -> Style {
        match self {
            StatusCategory::Plain => Style::default().fg(Color::Gray),
            StatusCategory::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            StatusCategory::Downloading => Style::default().fg(Color::Yellow),
            StatusCategory::Ready => Style::default().fg(Color::Green),
        }
    }
}

/// Visible status label plus the setup-guide panel flag.
#[derive(Debug, Default)]
pub struct StatusReporter {
    text: String,
    category: StatusCategory,
    setup_guide_visible: bool,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the status label and its styling category.
    pub fn set_status(&mut self, text: impl Into<String>, category: StatusCategory) {
        self.text = text.into();
        self.category = category;
    }

    /// Reveal the setup-guide panel. Idempotent.
    pub fn show_setup_guide(&mut self) {
        self.setup_guide_visible = true;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> StatusCategory {
        self.category
    }

    pub fn setup_guide_visible(&self) -> bool {
        self.setup_guide_visible
    }
}
