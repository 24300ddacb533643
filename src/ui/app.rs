//! Chat application controller.
//!
//! Owns all conversation state (generation flag, listening flag, the
//! pre-dictation snapshot) and mediates between key input, the model
//! session, and the widgets. Background work reports back through
//! [`AppEvent`]s on a single channel, so every state change happens on
//! the event loop.

use crate::config::ChatConfig;
use crate::dictation::{DictationAdapter, DictationEvent};
use crate::error::ChatError;
use crate::provider::LanguageSession;
use crate::startup::LifecycleEvent;
use crate::ui::input::InputBox;
use crate::ui::status::StatusReporter;
use crate::ui::transcript::{EntryId, Role, Transcript};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Inline message shown when a stream failure looks session-related.
pub const SESSION_ERROR_MESSAGE: &str =
    "Session error occurred. Please restart the application.";

/// Events delivered to the controller from background tasks.
pub enum AppEvent {
    /// Session lifecycle notification (status text, setup guide).
    Lifecycle(LifecycleEvent),
    /// Initialization finished; the session is usable.
    SessionReady(Arc<dyn LanguageSession>),
    /// A streamed response fragment arrived.
    AssistantChunk(String),
    /// The response stream ended normally.
    AssistantDone,
    /// The response stream failed.
    AssistantFailed(ChatError),
    /// Voice dictation produced an event.
    Dictation(DictationEvent),
}

/// Top-level application state driven by the TUI event loop.
pub struct ChatApp {
    pub status: StatusReporter,
    pub transcript: Transcript,
    pub input: InputBox,
    config: ChatConfig,
    session: Option<Arc<dyn LanguageSession>>,
    dictation: Option<DictationAdapter>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    is_generating: bool,
    is_listening: bool,
    text_before_voice: String,
    streaming_entry: Option<EntryId>,
    controls_enabled: bool,
    running: bool,
}

impl ChatApp {
    /// Create the controller. Controls stay disabled until a
    /// [`AppEvent::SessionReady`] arrives.
    pub fn new(config: ChatConfig, events_tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        let dictation = DictationAdapter::detect(&config);
        Self {
            status: StatusReporter::new(),
            transcript: Transcript::new(),
            input: InputBox::new(),
            config,
            session: None,
            dictation,
            events_tx,
            is_generating: false,
            is_listening: false,
            text_before_voice: String::new(),
            streaming_entry: None,
            controls_enabled: false,
            running: true,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    /// Whether the voice control should be shown at all.
    pub fn voice_supported(&self) -> bool {
        self.dictation.is_some()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return;
        }
        match key.code {
            KeyCode::F(2) => self.toggle_voice(),
            KeyCode::PageUp => self.transcript.scroll_up(),
            KeyCode::PageDown => self.transcript.scroll_down(),
            // Editing keys only work while the controls are enabled.
            _ if !self.controls_enabled => {}
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.input.insert_newline();
            }
            KeyCode::Enter => self.send_message(),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.insert_char(c);
            }
            _ => {}
        }
    }

    /// Send the current input as a user message and start streaming the
    /// response.
    ///
    /// No-op when the input is blank or a generation is already in flight;
    /// at most one prompt is outstanding at a time.
    pub fn send_message(&mut self) {
        if self.is_generating || self.input.is_blank() {
            return;
        }
        let Some(session) = self.session.clone() else {
            return;
        };

        let text = self.input.text().trim().to_owned();
        self.is_generating = true;
        self.controls_enabled = false;
        self.streaming_entry = None;
        self.transcript.push(Role::User, text.clone());
        self.input.clear();
        self.transcript.show_typing();

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let mut stream = session.prompt_streaming(&text);
            loop {
                match stream.next().await {
                    Some(Ok(fragment)) => {
                        if events.send(AppEvent::AssistantChunk(fragment)).is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = events.send(AppEvent::AssistantFailed(e));
                        return;
                    }
                    None => {
                        let _ = events.send(AppEvent::AssistantDone);
                        return;
                    }
                }
            }
        });
    }

    /// Start or stop voice dictation.
    ///
    /// Starting snapshots the current input text; every transcript update
    /// rewrites the input as snapshot + full transcript so far.
    pub fn toggle_voice(&mut self) {
        let Some(adapter) = self.dictation.as_mut() else {
            return;
        };
        if self.is_listening {
            // The final transcript and `Ended` still arrive after stop;
            // the listening flag clears when `Ended` (or an error) does.
            adapter.stop();
            return;
        }
        if self.is_generating || !self.controls_enabled {
            return;
        }

        self.text_before_voice = self.input.text().to_owned();
        self.is_listening = true;

        let (tx, mut rx) = mpsc::channel(16);
        adapter.start(tx);

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if events.send(AppEvent::Dictation(event)).is_err() {
                    break;
                }
            }
        });
    }

    /// Apply one event from a background task.
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Lifecycle(LifecycleEvent::Status { text, category }) => {
                self.status.set_status(text, category);
            }
            AppEvent::Lifecycle(LifecycleEvent::ShowSetupGuide) => {
                self.status.show_setup_guide();
            }
            AppEvent::SessionReady(session) => {
                self.session = Some(session);
                self.controls_enabled = true;
            }
            AppEvent::AssistantChunk(fragment) => {
                let id = match self.streaming_entry {
                    Some(id) => id,
                    None => {
                        self.transcript.hide_typing();
                        let id = self.transcript.push(Role::Assistant, "");
                        self.streaming_entry = Some(id);
                        id
                    }
                };
                self.transcript.append_to(id, &fragment);
            }
            AppEvent::AssistantDone => self.finish_generation(),
            AppEvent::AssistantFailed(e) => {
                self.transcript.hide_typing();
                let text = if e.is_session_invalidated() {
                    SESSION_ERROR_MESSAGE.to_owned()
                } else {
                    format!("Error: {}", e.detail())
                };
                self.transcript.push(Role::Error, text);
                self.finish_generation();
            }
            AppEvent::Dictation(DictationEvent::Transcript { text, .. }) => {
                if self.is_listening {
                    self.input
                        .set_text(format!("{}{}", self.text_before_voice, text));
                }
            }
            AppEvent::Dictation(DictationEvent::Ended) => {
                self.is_listening = false;
            }
            AppEvent::Dictation(DictationEvent::Error { message }) => {
                warn!("dictation error, returning to idle: {message}");
                self.is_listening = false;
            }
        }
    }

    /// Cleanup run on every generation exit path.
    fn finish_generation(&mut self) {
        self.transcript.hide_typing();
        self.streaming_entry = None;
        self.is_generating = false;
        self.controls_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::Result;
    use crate::provider::TextStream;

    /// Session that replays a fixed script of fragments and errors.
    struct ScriptedSession {
        script: Vec<std::result::Result<String, String>>,
    }

    impl ScriptedSession {
        fn new(script: &[std::result::Result<&str, &str>]) -> Arc<Self> {
            Arc::new(Self {
                script: script
                    .iter()
                    .map(|r| match r {
                        Ok(s) => Ok((*s).to_owned()),
                        Err(s) => Err((*s).to_owned()),
                    })
                    .collect(),
            })
        }
    }

    impl LanguageSession for ScriptedSession {
        fn prompt_streaming(&self, _text: &str) -> TextStream {
            let items: Vec<Result<String>> = self
                .script
                .clone()
                .into_iter()
                .map(|r| r.map_err(ChatError::classify_prompt))
                .collect();
            Box::pin(futures_util::stream::iter(items))
        }
    }

    fn ready_app(
        script: &[std::result::Result<&str, &str>],
    ) -> (ChatApp, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = ChatApp::new(ChatConfig::default(), tx);
        app.handle_event(AppEvent::SessionReady(ScriptedSession::new(script)));
        (app, rx)
    }

    /// Feed queued events back into the app until the generation finishes.
    async fn pump_until_settled(app: &mut ChatApp, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        while app.is_generating() {
            let event = rx.recv().await.expect("event channel closed while generating");
            app.handle_event(event);
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let (mut app, _rx) = ready_app(&[Ok("unused")]);

        app.send_message();
        app.input.set_text("   \n\t ");
        app.send_message();

        assert!(!app.is_generating());
        assert!(app.transcript.entries().is_empty());
    }

    #[tokio::test]
    async fn sends_are_serialized_while_generating() {
        let (mut app, mut rx) = ready_app(&[Ok("reply")]);

        app.input.set_text("first");
        app.send_message();
        assert!(app.is_generating());
        assert!(!app.controls_enabled());

        app.input.set_text("second");
        app.send_message();

        pump_until_settled(&mut app, &mut rx).await;

        let users: Vec<_> = app
            .transcript
            .entries()
            .iter()
            .filter(|m| m.role == Role::User)
            .collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].text, "first");
    }

    #[tokio::test]
    async fn full_cycle_concatenates_fragments() {
        let (mut app, mut rx) = ready_app(&[Ok("Hel"), Ok("lo"), Ok(" there")]);

        app.input.set_text("hi");
        app.send_message();
        assert!(app.transcript.typing());

        pump_until_settled(&mut app, &mut rx).await;

        let entries = app.transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].text, "hi");
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].text, "Hello there");
        assert!(!app.transcript.typing());
        assert!(app.controls_enabled());
        assert!(app.input.text().is_empty());
    }

    #[tokio::test]
    async fn failure_before_first_chunk_adds_one_error_entry() {
        let (mut app, mut rx) = ready_app(&[Err("connection reset")]);

        app.input.set_text("hi");
        app.send_message();
        pump_until_settled(&mut app, &mut rx).await;

        let entries = app.transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].role, Role::Error);
        assert_eq!(entries[1].text, "Error: connection reset");
        assert!(entries.iter().all(|m| m.role != Role::Assistant));
        assert!(app.controls_enabled());
        assert!(!app.transcript.typing());
    }

    #[tokio::test]
    async fn session_related_failure_gets_distinct_message() {
        let (mut app, mut rx) = ready_app(&[Err("the Session was destroyed")]);

        app.input.set_text("hi");
        app.send_message();
        pump_until_settled(&mut app, &mut rx).await;

        let last = app.transcript.entries().last().unwrap();
        assert_eq!(last.role, Role::Error);
        assert_eq!(last.text, SESSION_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn dictation_merges_transcript_into_snapshot() {
        let (mut app, _rx) = ready_app(&[]);
        app.input.set_text("abc");
        app.text_before_voice = app.input.text().to_owned();
        app.is_listening = true;

        app.handle_event(AppEvent::Dictation(DictationEvent::Transcript {
            text: "def".to_owned(),
            is_final: false,
        }));
        assert_eq!(app.input.text(), "abcdef");

        app.handle_event(AppEvent::Dictation(DictationEvent::Transcript {
            text: "defg".to_owned(),
            is_final: true,
        }));
        assert_eq!(app.input.text(), "abcdefg");

        app.handle_event(AppEvent::Dictation(DictationEvent::Ended));
        assert!(!app.is_listening());
    }

    #[tokio::test]
    async fn final_transcript_after_manual_stop_is_applied() {
        let (mut app, _rx) = ready_app(&[]);
        let config = app.config().clone();
        app.dictation = Some(DictationAdapter::idle(&config));
        app.input.set_text("abc");
        app.text_before_voice = app.input.text().to_owned();
        app.is_listening = true;

        // Manual stop: the flag stays set until the adapter reports Ended,
        // so the final transcript still lands in the input box.
        app.toggle_voice();
        assert!(app.is_listening());

        app.handle_event(AppEvent::Dictation(DictationEvent::Transcript {
            text: "def".to_owned(),
            is_final: true,
        }));
        assert_eq!(app.input.text(), "abcdef");

        app.handle_event(AppEvent::Dictation(DictationEvent::Ended));
        assert!(!app.is_listening());
    }

    #[tokio::test]
    async fn enter_sends_and_shift_enter_inserts_newline() {
        let (mut app, mut rx) = ready_app(&[Ok("ok")]);

        app.handle_key(key(KeyCode::Char('a')));
        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        app.handle_key(key(KeyCode::Char('b')));
        assert_eq!(app.input.text(), "a\nb");
        assert!(app.transcript.entries().is_empty());

        app.handle_key(key(KeyCode::Enter));
        assert!(app.is_generating());
        assert_eq!(app.transcript.entries()[0].text, "a\nb");

        pump_until_settled(&mut app, &mut rx).await;
    }

    #[tokio::test]
    async fn edits_are_ignored_while_controls_are_disabled() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = ChatApp::new(ChatConfig::default(), tx);
        assert!(!app.controls_enabled());

        app.handle_key(key(KeyCode::Char('x')));
        app.handle_key(key(KeyCode::Enter));
        assert!(app.input.text().is_empty());
        assert!(app.transcript.entries().is_empty());
    }

    #[tokio::test]
    async fn ctrl_c_quits() {
        let (mut app, _rx) = ready_app(&[]);
        assert!(app.running());
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!app.running());
    }
}
