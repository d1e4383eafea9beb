//! Terminal UI rendering.
//!
//! Lays out the transport bar, the on-screen keyboard, and the status line,
//! plus the help overlay. All widgets read from the `App`; nothing here
//! mutates state.

mod keyboard;

pub use keyboard::render_keyboard;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use std::time::Instant;

/// Renders the whole frame.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `app` - Application state
/// * `now` - Current time, for the elapsed-session display
pub fn render(frame: &mut Frame, app: &App, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport bar
            Constraint::Min(5),    // Keyboard
            Constraint::Length(3), // Status line
        ])
        .split(frame.area());

    render_transport(frame, chunks[0], app, now);
    render_keyboard(frame, chunks[1], app);
    render_status(frame, chunks[2], app);

    if app.show_help {
        render_help(frame);
    }
}

/// Renders the transport bar: session state, instrument, rhythm, tempo.
fn render_transport(frame: &mut Frame, area: Rect, app: &App, now: Instant) {
    let block = Block::default()
        .title(" pianotui ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = Vec::new();

    if let Some(elapsed) = app.elapsed_string(now) {
        spans.push(Span::styled(
            " ● REC ",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(elapsed, Style::default().fg(Color::Red)));
        spans.push(Span::styled(
            format!("  {} notes", app.console.recorded_count()),
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        spans.push(Span::styled(" Idle", Style::default().fg(Color::DarkGray)));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Instrument: {}", app.console.instrument().name()),
        Style::default().fg(Color::Green),
    ));

    spans.push(Span::raw("  |  "));
    let rhythm_style = if app.console.rhythm_running() {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    spans.push(Span::styled(
        format!(
            "Rhythm: {} {} @ {} BPM",
            app.console.pattern().name(),
            if app.console.rhythm_running() { "on" } else { "off" },
            app.console.tempo(),
        ),
        rhythm_style,
    ));

    if app.audio_failed() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            "NO AUDIO",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

/// Renders the status line: transient messages, else last-take info.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = if let Some((message, _)) = &app.status_message {
        Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        ))
    } else if let Some(take) = app.console.last_take() {
        Line::from(Span::styled(
            format!(
                "Last take: {} notes, {:.1}s. Press 1 to export MIDI, 0 to export WAV.",
                take.notes.len(),
                take.duration
            ),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::styled(
            "Play with the letter keys. Space starts a recording.",
            Style::default().fg(Color::DarkGray),
        ))
    };

    frame.render_widget(Paragraph::new(line), inner);
}

/// Renders the help overlay with all key bindings.
pub fn render_help(frame: &mut Frame) {
    let area = centered_rect(54, 16, frame.area());
    frame.render_widget(Clear, area);

    let key_style = Style::default().fg(Color::Yellow);
    let desc_style = Style::default().fg(Color::Gray);
    let entry = |key: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", key), key_style),
            Span::styled(desc, desc_style),
        ])
    };

    let lines = vec![
        entry("Z-M, Q-I", "Play notes (two octaves)"),
        entry(", / .", "Octave down / up"),
        Line::default(),
        entry("Space", "Start / stop recording"),
        entry("1", "Export last take as MIDI"),
        entry("0", "Export last take as WAV"),
        Line::default(),
        entry("Tab", "Cycle instrument"),
        entry("k", "Rhythm on / off"),
        entry("p", "Cycle rhythm pattern"),
        entry("- / =", "Tempo down / up"),
        Line::default(),
        entry("?", "Toggle this help"),
        entry("Esc", "Quit"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Computes a centered rectangle of fixed size, clamped to the frame.
fn centered_rect(width: u16, height: u16, frame_area: Rect) -> Rect {
    let width = width.min(frame_area.width);
    let height = height.min(frame_area.height);
    Rect::new(
        frame_area.x + (frame_area.width - width) / 2,
        frame_area.y + (frame_area.height - height) / 2,
        width,
        height,
    )
}
