//! Terminal setup, rendering, and the main event loop.

use crate::config::ChatConfig;
use crate::error::Result;
use crate::provider::ProviderResolver;
use crate::startup::{initialize_session, LifecycleNotify};
use crate::ui::app::{AppEvent, ChatApp};
use crate::ui::transcript::Role;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use futures_util::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Height of the setup-guide panel, including its border.
const SETUP_GUIDE_HEIGHT: u16 = 9;

/// Run the chat UI until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be set up or an I/O failure
/// interrupts the event loop.
pub async fn run(config: ChatConfig) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, config).await;

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: ChatConfig,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut app = ChatApp::new(config.clone(), tx.clone());

    // Session initialization runs in the background; the UI stays
    // responsive and renders every lifecycle status as it arrives.
    let init_tx = tx.clone();
    tokio::spawn(async move {
        let notify_tx = init_tx.clone();
        let notify: LifecycleNotify = Arc::new(move |event| {
            let _ = notify_tx.send(AppEvent::Lifecycle(event));
        });
        match initialize_session(&config, &ProviderResolver::default(), notify).await {
            Ok(session) => {
                let _ = init_tx.send(AppEvent::SessionReady(Arc::from(session)));
            }
            Err(e) => warn!("session initialization failed: {e}"),
        }
    });

    let mut term_events = EventStream::new();
    while app.running() {
        terminal.draw(|frame| draw(frame, &app))?;

        tokio::select! {
            maybe_event = term_events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            maybe_event = rx.recv() => match maybe_event {
                Some(event) => app.handle_event(event),
                None => break,
            },
        }
    }

    Ok(())
}

fn draw(frame: &mut Frame<'_>, app: &ChatApp) {
    let input_rows = app
        .input
        .desired_height(
            frame.area().width.saturating_sub(2),
            app.config().ui.max_input_rows,
        )
        .max(1);

    let mut constraints = vec![Constraint::Min(3)];
    if app.status.setup_guide_visible() {
        constraints.push(Constraint::Length(SETUP_GUIDE_HEIGHT));
    }
    constraints.push(Constraint::Length(input_rows + 2));
    constraints.push(Constraint::Length(1));

    let areas = Layout::vertical(constraints).split(frame.area());
    let mut next = areas.iter();
    let transcript_area = next.next().copied().unwrap_or_else(|| frame.area());
    let guide_area = app
        .status
        .setup_guide_visible()
        .then(|| next.next().copied())
        .flatten();
    let input_area = next.next().copied().unwrap_or_default();
    let status_area = next.next().copied().unwrap_or_default();

    draw_transcript(frame, app, transcript_area);
    if let Some(area) = guide_area {
        draw_setup_guide(frame, area);
    }
    draw_input(frame, app, input_area);
    draw_status(frame, app, status_area);
}

fn draw_transcript(frame: &mut Frame<'_>, app: &ChatApp, area: Rect) {
    let assistant_label = app.config().ui.assistant_label.as_str();
    let mut lines: Vec<Line<'_>> = Vec::new();

    for message in app.transcript.entries() {
        let (label, style) = match message.role {
            Role::User => ("You", Style::default().fg(Color::Cyan)),
            Role::Assistant => (assistant_label, Style::default().fg(Color::White)),
            Role::Error => ("Error", Style::default().fg(Color::Red)),
        };
        lines.push(Line::from(Span::styled(
            format!("{label}:"),
            style.add_modifier(Modifier::BOLD),
        )));
        for text_line in message.text.split('\n') {
            lines.push(Line::from(Span::styled(text_line.to_owned(), style)));
        }
        lines.push(Line::default());
    }
    if app.transcript.typing() {
        lines.push(Line::from(Span::styled(
            format!("{assistant_label} is typing..."),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    let inner_width = area.width.saturating_sub(2).max(1);
    let total_rows: usize = lines
        .iter()
        .map(|l| wrapped_rows(l.width(), usize::from(inner_width)))
        .sum();
    let viewport = usize::from(area.height.saturating_sub(2));
    let scroll = total_rows
        .saturating_sub(viewport)
        .saturating_sub(app.transcript.scroll_offset());

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Chat "))
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, area);
}

fn draw_setup_guide(frame: &mut Frame<'_>, area: Rect) {
    let lines = vec![
        Line::from("No usable language model was found."),
        Line::default(),
        Line::from("To chat with a local model, set [llm] model_id and"),
        Line::from("gguf_file in the config file."),
        Line::from("To use a server instead (Ollama, llama.cpp, vLLM),"),
        Line::from("set [api] base_url, e.g. http://localhost:11434."),
        Line::from("Then restart the application."),
    ];
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Setup guide ")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_input(frame: &mut Frame<'_>, app: &ChatApp, area: Rect) {
    let mut title = String::from(" Message (Enter to send, Shift+Enter for newline");
    if app.voice_supported() {
        title.push_str(", F2 for voice");
    }
    title.push_str(") ");

    let border_style = if app.controls_enabled() {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let paragraph = Paragraph::new(app.input.text())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(border_style),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);

    if app.controls_enabled() {
        let (row, col) = app.input.cursor_position();
        let inner_width = area.width.saturating_sub(2).max(1);
        frame.set_cursor_position(Position::new(
            area.x + 1 + col.min(inner_width - 1),
            area.y + 1 + row.min(area.height.saturating_sub(3)),
        ));
    }
}

fn draw_status(frame: &mut Frame<'_>, app: &ChatApp, area: Rect) {
    let mut spans = vec![Span::styled(
        app.status.text().to_owned(),
        app.status.category().style(),
    )];
    if app.is_listening() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "● Listening",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Rows a line occupies after wrapping at `width` columns.
fn wrapped_rows(line_width: usize, width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    line_width.div_ceil(width).max(1)
}
