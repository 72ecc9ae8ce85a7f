use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::{InputEvent, NOTE_KEYS};

// poll for input and resolve keys into semantic events. note keys report
// releases too when the terminal supports keyboard enhancement
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }
    let mut events = Vec::new();
    // drain whatever queued up so a burst of keys doesn't lag the grid
    loop {
        if let Event::Key(key) = event::read()? {
            events.extend(handle_key(key.code, key.kind));
        }
        if !event::poll(Duration::ZERO)? {
            break;
        }
    }
    Ok(events)
}

fn handle_key(code: KeyCode, kind: KeyEventKind) -> Option<InputEvent> {
    if let KeyCode::Char(c) = code {
        if let Some(idx) = NOTE_KEYS.iter().position(|k| *k == c) {
            return match kind {
                KeyEventKind::Press => Some(InputEvent::NoteOn(idx)),
                KeyEventKind::Release => Some(InputEvent::NoteOff(idx)),
                _ => None, // key repeat
            };
        }
    }
    if kind != KeyEventKind::Press {
        return None;
    }
    let event = match code {
        KeyCode::Esc => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::PlayPause,
        KeyCode::Char('.') => InputEvent::Stop,
        KeyCode::Char('m') => InputEvent::ToggleSongMode,
        KeyCode::Char('r') => InputEvent::ToggleCapture,
        KeyCode::Char('t') => InputEvent::ToggleStep,
        KeyCode::Char('u') => InputEvent::ToggleMute,
        KeyCode::Char('[') => InputEvent::BpmDown,
        KeyCode::Char(']') => InputEvent::BpmUp,
        KeyCode::Char('n') => InputEvent::NewGroup,
        KeyCode::Tab => InputEvent::NextGroup,
        KeyCode::Left => InputEvent::CursorLeft,
        KeyCode::Right => InputEvent::CursorRight,
        KeyCode::Up => InputEvent::TrackUp,
        KeyCode::Down => InputEvent::TrackDown,
        _ => return None,
    };
    Some(event)
}
