//! Piano keyboard display.
//!
//! Shows the computer keyboard to MIDI note mapping and highlights the keys
//! that are currently sounding.

use crate::app::{App, KEYBOARD_MAP};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Builds a keyboard row from a slice of key characters.
///
/// Maps each key to its note under the current octave shift and styles it by
/// black/white key and by whether the note is sounding right now.
fn build_keyboard_row(keys: &[char], app: &App) -> Vec<Span<'static>> {
    keys.iter()
        .map(|&key| {
            let base_note = KEYBOARD_MAP
                .iter()
                .find(|(k, _)| k.to_ascii_uppercase() == key)
                .map(|(_, n)| *n);

            if let Some(base) = base_note {
                let note = (base as i16 + app.octave_offset as i16 * 12).clamp(0, 127) as u8;
                let is_black = matches!(note % 12, 1 | 3 | 6 | 8 | 10);
                let is_sounding = app.console.is_active(note);

                let style = if is_sounding {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else if is_black {
                    Style::default()
                        .fg(Color::White)
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::White)
                        .add_modifier(Modifier::BOLD)
                };

                Span::styled(format!(" {} ", key), style)
            } else {
                Span::raw(format!(" {} ", key))
            }
        })
        .collect()
}

/// Renders the piano keyboard.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_keyboard(frame: &mut Frame, area: Rect, app: &App) {
    let octave_str = format!("{:+}", app.octave_offset);

    let block = Block::default()
        .title(format!(" Keyboard (Octave: {}) ", octave_str))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height < 2 {
        return;
    }

    // Keyboard layout: upper row (Q-I) and lower row (Z-M)
    const UPPER_KEYS: &[char] = &[
        'Q', '2', 'W', '3', 'E', 'R', '5', 'T', '6', 'Y', '7', 'U', 'I',
    ];
    const LOWER_KEYS: &[char] = &['Z', 'S', 'X', 'D', 'C', 'V', 'G', 'B', 'H', 'N', 'J', 'M'];

    let upper_row = build_keyboard_row(UPPER_KEYS, app);
    let lower_row = build_keyboard_row(LOWER_KEYS, app);

    frame.render_widget(
        Paragraph::new(Line::from(upper_row)),
        Rect::new(inner.x, inner.y, inner.width, 1),
    );
    if inner.height >= 2 {
        frame.render_widget(
            Paragraph::new(Line::from(lower_row)),
            Rect::new(inner.x, inner.y + 1, inner.width, 1),
        );
    }
    if inner.height >= 3 {
        frame.render_widget(
            Paragraph::new(build_hint_line()),
            Rect::new(inner.x, inner.y + 2, inner.width, 1),
        );
    }
}

/// Builds the transport hint line shown under the keys.
fn build_hint_line() -> Line<'static> {
    let key_style = Style::default().fg(Color::Yellow);
    let bracket_style = Style::default().fg(Color::DarkGray);
    let desc_style = Style::default().fg(Color::DarkGray);

    Line::from(vec![
        Span::styled("[", bracket_style),
        Span::styled("Space", key_style),
        Span::styled("]Rec ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("1", key_style),
        Span::styled("]MIDI ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("0", key_style),
        Span::styled("]WAV ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("Tab", key_style),
        Span::styled("]Instr ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("k", key_style),
        Span::styled("]Rhythm ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("?", key_style),
        Span::styled("]Help ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("Esc", key_style),
        Span::styled("]Quit", desc_style),
    ])
}
