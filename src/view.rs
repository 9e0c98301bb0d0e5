//! Plain-text presentation of a session snapshot, and the key bindings that
//! map typed input onto session commands.

use std::fmt::Write as _;

use crate::session::{Command, SlideshowState};

const UNSPLASH_URL: &str = "https://unsplash.com?utm_source=pelican_slideshow&utm_medium=referral";

/// What a line of user input asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    /// Flip between play and pause based on the current state.
    TogglePlay,
    Quit,
}

pub fn parse_input(line: &str) -> Option<Input> {
    let input = match line.trim().to_ascii_lowercase().as_str() {
        "n" | "next" => Input::Command(Command::Next),
        "p" | "prev" | "previous" => Input::Command(Command::Previous),
        "play" => Input::Command(Command::Play),
        "pause" => Input::Command(Command::Pause),
        // An empty line is what a bare space + enter becomes after trim.
        "" | "space" | "t" | "toggle" => Input::TogglePlay,
        "q" | "quit" | "exit" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

/// Resolves [`Input::TogglePlay`] against the state the user is looking at.
pub fn toggle_command(state: &SlideshowState) -> Command {
    if state.is_playing {
        Command::Pause
    } else {
        Command::Play
    }
}

/// Whether `command` is offered in `state`. Only pause stays available
/// while a fetch is in flight.
pub fn available(command: Command, state: &SlideshowState) -> bool {
    match command {
        Command::Next | Command::Previous | Command::Play => !state.is_loading,
        Command::Pause | Command::LoadInitial => true,
    }
}

/// `Image 2 / 3`, or `0 / 0` before anything has loaded.
pub fn position(state: &SlideshowState) -> String {
    if state.cache.is_empty() {
        "0 / 0".to_owned()
    } else {
        format!("{} / {}", state.cursor + 1, state.cache.len())
    }
}

pub fn render(state: &SlideshowState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Pelican Slideshow");

    match state.current() {
        Some(photo) => {
            let _ = writeln!(out, "  {}", photo.alt_text());
            let _ = writeln!(out, "  {}  {}x{}", photo.urls.regular, photo.width, photo.height);
            let _ = writeln!(out, "  Photo by {} on Unsplash", photo.user.name);
            let _ = writeln!(out, "    {}", photo.profile_url());
            let _ = writeln!(out, "    {UNSPLASH_URL}");
            if let Some(description) = &photo.description {
                let _ = writeln!(out, "  {description}");
            }
            if state.is_loading {
                let _ = writeln!(out, "  (loading next...)");
            }
        }
        None if state.is_loading => {
            let _ = writeln!(out, "  Loading...");
        }
        None if state.last_error.is_none() => {
            let _ = writeln!(out, "  No images loaded");
        }
        None => {}
    }

    if let Some(err) = &state.last_error {
        let label = if err.is_informational() {
            "warning"
        } else {
            "error"
        };
        let _ = writeln!(out, "{label}: {err}");
    }

    let _ = writeln!(
        out,
        "Image {} (cached: {}/{})",
        position(state),
        state.cache.len(),
        state.capacity()
    );
    let toggle = toggle_command(state);
    let key = |command: Command, key: &'static str| {
        if available(command, state) { key } else { "-" }
    };
    let _ = write!(
        out,
        "[{}] previous  [{}] {}  [{}] next  [q] quit",
        key(Command::Previous, "p"),
        key(toggle, "enter"),
        if toggle == Command::Pause { "pause" } else { "play" },
        key(Command::Next, "n"),
    );
    out
}
