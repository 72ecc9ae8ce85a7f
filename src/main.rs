mod audio;
mod loader;
mod middle;
mod tui;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use groovestep::pipeline::persistence;
use groovestep::shared::InstrumentKey;
use groovestep::{Sequencer, SequencerConfig, Transport};

use middle::Middle;
use tui::mode::InputEvent;

#[derive(Parser, Debug)]
#[command(name = "groovestep", version, about = "A 16-step groovebox in the terminal")]
struct Args {
    /// Project directory; the project is saved under <dir>/.groovestep
    project: Option<PathBuf>,

    /// Tempo to start at (overrides the saved project)
    #[arg(long)]
    bpm: Option<f64>,

    /// How far ahead of the audio clock to schedule, in milliseconds
    #[arg(long)]
    lookahead_ms: Option<u64>,

    /// Directory of WAV files to use as instruments (defaults to the project dir)
    #[arg(long)]
    kit: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let project_dir = match args.project {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let mut config = SequencerConfig::load(&project_dir)?;
    if let Some(ms) = args.lookahead_ms {
        config.lookahead = ms as f64 / 1000.0;
    }
    if let Some(bpm) = args.bpm {
        config.default_bpm = bpm;
    }

    let device = audio::OutputDevice::open()?;
    let kit_dir = args.kit.unwrap_or_else(|| project_dir.clone());
    let kit = loader::sample_loader::load_kit(&kit_dir, device.sample_rate()).unwrap_or_else(|e| {
        log::warn!("no kit loaded: {e:#}");
        audio::Kit::new()
    });
    let mut instruments: Vec<InstrumentKey> = kit.keys().cloned().collect();
    instruments.sort();
    let audio = device.start(kit)?;
    if !audio.wait_ready(Duration::from_millis(500)) {
        log::warn!("audio device hasn't started rendering yet");
    }

    let mut snapshot = persistence::load_project(&project_dir)?
        .unwrap_or_else(|| middle::starter_project(config.default_bpm, &instruments));
    if let Some(bpm) = args.bpm {
        snapshot.bpm = bpm;
    }
    // the transport starts at zero together with the audio stream's frame counter
    let clock = Transport::new(config.default_bpm);
    let sequencer = Sequencer::from_snapshot(clock, audio.sink(), config, &snapshot);
    let mut middle = Middle::new(sequencer);

    terminal::enable_raw_mode()?;
    // report key releases where the terminal supports it, for note-offs
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    loop {
        middle.tick(audio.time());
        let ds = middle.display_state();
        term.draw(|frame| tui::view::render(frame, frame.area(), &ds))?;

        for event in tui::input::poll_input(tick_rate)? {
            if event == InputEvent::Quit {
                // save before quitting
                if let Err(e) = persistence::save_project(&project_dir, &middle.snapshot()) {
                    log::error!("could not save project: {e:#}");
                }
                return Ok(());
            }
            middle.handle_input(event, audio.time());
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::PopKeyboardEnhancementFlags);
        let _ = terminal::disable_raw_mode();
    }
}
