use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::mode::{DisplayState, LedState};

const NAME_WIDTH: usize = 10;

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // transport line
            Constraint::Min(6),    // step grid
            Constraint::Length(4), // help + status
        ])
        .split(area);

    draw_transport(frame, sections[0], state);
    draw_grid(frame, sections[1], state);
    draw_footer(frame, sections[2], state);
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (play_label, play_style) = if state.playing {
        ("▶ PLAY", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        ("■ STOP", Style::default().fg(Color::DarkGray))
    };
    let mode = if state.song_mode {
        format!("SONG {}/{}", state.section + 1, state.section_span.max(1))
    } else {
        "TRACK".to_string()
    };
    let mut spans = vec![
        Span::styled(play_label, play_style),
        Span::raw(format!("  {:.0} bpm  ", state.bpm)),
        Span::styled(mode, Style::default().fg(Color::Cyan)),
        Span::raw(format!(
            "  {} ({}/{})",
            state.group_name,
            state.group_index + 1,
            state.group_count
        )),
    ];
    if state.capture_armed {
        spans.push(Span::styled("  ● REC", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)));
    }
    let block = Block::default().borders(Borders::ALL).title(" groovestep ");
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn led_span(led: LedState) -> Span<'static> {
    let (glyph, style) = match led {
        LedState::Off => ("· ", Style::default().fg(Color::DarkGray)),
        LedState::On => ("■ ", Style::default().fg(Color::LightMagenta)),
        LedState::Playhead => ("▣ ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        LedState::Cursor => ("□ ", Style::default().fg(Color::White)),
    };
    Span::styled(glyph, style)
}

fn draw_grid(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut lines: Vec<Line> = state
        .tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let selected = i == state.selected_track;
            let mut name_style = if track.muted {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };
            if selected {
                name_style = name_style.add_modifier(Modifier::REVERSED);
            }
            let short: String = track.name.chars().take(NAME_WIDTH).collect();
            let name = format!("{:<width$} ", short, width = NAME_WIDTH);
            let mut spans = vec![Span::styled(name, name_style)];
            spans.extend(track.leds.iter().map(|led| led_span(*led)));
            Line::from(spans)
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from("no tracks yet; arm capture (r) and play a note"));
    }
    let block = Block::default().borders(Borders::ALL).title(" steps ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let help = "space play/pause  . stop  m song  r rec  asdfghjk notes  ←→ step  ↑↓ track  t toggle  u mute  [ ] bpm  n new  tab next  esc quit";
    let lines = vec![
        Line::styled(help, Style::default().fg(Color::DarkGray)),
        Line::from(state.status.clone()),
    ];
    frame.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::TOP)), area);
}
