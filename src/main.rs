//! pianotui - a terminal piano you can record.
//!
//! Renders a playable two-octave keyboard in the terminal, synthesizes notes
//! through a small oscillator engine, and captures performances for export.
//!
//! # Features
//!
//! - Live playing on the computer keyboard with four instrument presets
//! - Recording sessions capturing both note events and rendered audio
//! - Export to Standard MIDI File and 16-bit PCM WAV
//! - Rhythm accompaniment with selectable patterns and live tempo
//! - Settings (instrument, pattern, tempo, octave) persisted between runs
//!
//! # Usage
//!
//! ```bash
//! cargo run            # Start with saved settings
//! cargo run -- --new   # Start with default settings
//! ```
//!
//! Press `?` for help with keyboard shortcuts.

mod app;
mod audio;
mod config;
mod console;
mod midi;
mod rhythm;
mod synth;
mod ui;

use app::App;
use config::{Settings, SETTINGS_PATH};
use rhythm::{MAX_TEMPO, MIN_TEMPO};

use anyhow::{Context, Result};
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Command-line options for the application.
struct CliOptions {
    /// Start with default settings instead of the saved ones.
    fresh: bool,
    /// Initial rhythm tempo override.
    tempo: Option<u32>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `--new` or `-n`: Ignore the saved settings file
    /// - `--tempo <bpm>`: Start at a specific rhythm tempo
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut fresh = false;
        let mut tempo: Option<u32> = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--new" | "-n" => fresh = true,
                "--tempo" | "-t" => {
                    i += 1;
                    let Some(value) = args.get(i) else {
                        eprintln!("Error: --tempo requires a BPM argument");
                        std::process::exit(1);
                    };
                    match value.parse::<u32>() {
                        Ok(bpm) if (MIN_TEMPO..=MAX_TEMPO).contains(&bpm) => tempo = Some(bpm),
                        _ => {
                            eprintln!(
                                "Error: tempo must be a number between {} and {}",
                                MIN_TEMPO, MAX_TEMPO
                            );
                            std::process::exit(1);
                        }
                    }
                }
                "--help" | "-h" => {
                    eprintln!("pianotui - Terminal piano with recording and export");
                    eprintln!();
                    eprintln!(
                        "Usage: {} [OPTIONS]",
                        args.first().unwrap_or(&"pianotui".to_string())
                    );
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -n, --new         Start with default settings");
                    eprintln!("  -t, --tempo BPM   Start the rhythm machine at a specific tempo");
                    eprintln!("  -h, --help        Print this help message");
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown option: {}", other);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Ok(Self { fresh, tempo })
    }
}

/// Main entry point.
fn main() -> Result<()> {
    // Parse CLI options first (before any terminal setup)
    let cli = CliOptions::parse()?;

    // Initialize logging (optional, for debugging)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut settings = if cli.fresh {
        Settings::default()
    } else {
        Settings::load(SETTINGS_PATH)
    };
    if let Some(bpm) = cli.tempo {
        settings.tempo_bpm = bpm;
    }

    let mut app = App::new(&settings);

    let (mut terminal, release_events) = setup_terminal().context("Failed to setup terminal")?;
    app.release_events_supported = release_events;

    // Run main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal before any error is printed
    restore_terminal(&mut terminal, release_events).context("Failed to restore terminal")?;

    // Persist the current settings for the next run
    if let Err(e) = app.settings().save(SETTINGS_PATH) {
        tracing::warn!("could not save settings: {e:#}");
    }

    result
}

/// Puts the terminal into raw mode and the alternate screen.
///
/// Also probes for the keyboard enhancement protocol; when available, key
/// release events are reported and note durations track the actual key hold.
///
/// # Returns
///
/// The terminal and whether release events are supported
fn setup_terminal() -> Result<(Terminal<CrosstermBackend<Stdout>>, bool)> {
    enable_raw_mode().context("Failed to enable raw mode")?;

    // Must be probed while in raw mode
    let release_events = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false);

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    if release_events {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .context("Failed to enable keyboard enhancement")?;
    }

    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok((terminal, release_events))
}

/// Restores the terminal to its original state.
fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    release_events: bool,
) -> Result<()> {
    if release_events {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("Failed to disable keyboard enhancement")?;
    }
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        let now = Instant::now();
        app.on_tick(now);

        // Draw UI
        terminal.draw(|frame| ui::render(frame, app, now))?;

        // Handle events with a short timeout so the rhythm loop and the
        // elapsed display keep advancing while idle
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                let now = Instant::now();
                match key.kind {
                    KeyEventKind::Press => {
                        if handle_key_press(app, key.code, key.modifiers, now)? {
                            return Ok(());
                        }
                    }
                    KeyEventKind::Release => handle_key_release(app, key.code, now),
                    // Repeats never retrigger an attack; without release
                    // events they arrive as plain presses and only refresh
                    // the hold deadline inside App::key_down
                    KeyEventKind::Repeat => {}
                }
            }
        }
    }
}

/// Handles one key press.
///
/// # Returns
///
/// true if the application should quit
fn handle_key_press(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    now: Instant,
) -> Result<bool> {
    // Help overlay swallows everything except its own toggle
    if app.show_help {
        if matches!(code, KeyCode::Char('?') | KeyCode::Esc) {
            app.show_help = false;
        }
        return Ok(false);
    }

    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char('c') = code {
            return Ok(true);
        }
        return Ok(false);
    }

    match code {
        KeyCode::Esc => return Ok(true),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char(' ') => app.record_toggle(now),
        KeyCode::Tab => app.cycle_instrument(now),
        KeyCode::Char('k') => app.toggle_rhythm(now),
        KeyCode::Char('p') => app.cycle_pattern(now),
        KeyCode::Char('-') => app.adjust_tempo(-5, now),
        KeyCode::Char('=') | KeyCode::Char('+') => app.adjust_tempo(5, now),
        KeyCode::Char(',') => app.change_octave(-1),
        KeyCode::Char('.') => app.change_octave(1),
        KeyCode::Char('1') => export_midi(app)?,
        KeyCode::Char('0') => export_wav(app)?,
        KeyCode::Char(c) => {
            app.key_down(c, now);
        }
        _ => {}
    }
    Ok(false)
}

/// Handles one key release (only delivered with keyboard enhancement).
fn handle_key_release(app: &mut App, code: KeyCode, now: Instant) {
    if let KeyCode::Char(c) = code {
        app.key_up(c, now);
    }
}

/// Output directory for exported files.
const OUTPUT_DIR: &str = "output";

/// Exports the last take to a Standard MIDI File.
fn export_midi(app: &mut App) -> Result<()> {
    if app.console.last_take().is_none() {
        app.set_status("Nothing to export: record a performance first");
        return Ok(());
    }

    std::fs::create_dir_all(OUTPUT_DIR)?;
    let output_path = PathBuf::from(OUTPUT_DIR).join("performance.mid");

    match app.console.export_midi(&output_path) {
        Ok(count) => {
            app.set_status(format!("Exported {} notes to {}", count, output_path.display()));
        }
        Err(e) => {
            app.set_status(format!("MIDI export failed: {}", e));
            tracing::error!("MIDI export failed: {e:#}");
        }
    }
    Ok(())
}

/// Exports the last take's captured audio to a WAV file.
fn export_wav(app: &mut App) -> Result<()> {
    if app.console.last_take().is_none() {
        app.set_status("Nothing to export: record a performance first");
        return Ok(());
    }

    std::fs::create_dir_all(OUTPUT_DIR)?;
    let output_path = PathBuf::from(OUTPUT_DIR).join("performance.wav");

    match app.console.export_wav(&output_path) {
        Ok(seconds) => {
            app.set_status(format!(
                "Exported {:.1}s of audio to {}",
                seconds,
                output_path.display()
            ));
        }
        Err(e) => {
            app.set_status(format!("WAV export failed: {}", e));
            tracing::error!("WAV export failed: {e:#}");
        }
    }
    Ok(())
}
