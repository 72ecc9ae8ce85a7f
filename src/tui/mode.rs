// what the tui and the middle layer pass each other: semantic input events
// going in, a plain display snapshot coming out

// home row, in scale order
pub const NOTE_KEYS: [char; 8] = ['a', 's', 'd', 'f', 'g', 'h', 'j', 'k'];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    PlayPause,
    Stop,
    ToggleSongMode,
    ToggleCapture,
    NoteOn(usize), // index into NOTE_KEYS
    NoteOff(usize),
    CursorLeft,
    CursorRight,
    TrackUp,
    TrackDown,
    ToggleStep,
    ToggleMute,
    BpmDown,
    BpmUp,
    NewGroup,
    NextGroup,
    Quit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LedState {
    #[default]
    Off,
    On,
    Playhead, // the step under the playhead
    Cursor,
}

#[derive(Clone, Debug, Default)]
pub struct TrackRow {
    pub name: String,
    pub muted: bool,
    pub leds: Vec<LedState>,
}

#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    pub playing: bool,
    pub song_mode: bool,
    pub capture_armed: bool,
    pub bpm: f64,
    pub current_step: Option<usize>,
    pub section: usize,
    pub section_span: usize,
    pub group_name: String,
    pub group_index: usize,
    pub group_count: usize,
    pub tracks: Vec<TrackRow>,
    pub selected_track: usize,
    pub cursor_step: usize,
    pub status: String,
}
