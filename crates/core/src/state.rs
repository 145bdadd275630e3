// Playback state machine states and the commands guarded against them

use std::fmt;

/// Controller playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Nothing loaded yet
    Idle,
    /// Engine is preparing a source
    Loading,
    /// Source is ready and the playhead is not moving
    Paused,
    /// Audio is currently playing
    Playing,
    /// Playback has stopped; a new load is required to play again
    Stopped,
    /// Playback reached the end of the source
    Completed,
    /// Engine reported a failure; a new load is required
    Error,
}

impl PlaybackState {
    /// Source is loaded to the point that it can be played
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            PlaybackState::Paused | PlaybackState::Playing | PlaybackState::Completed
        )
    }

    /// Whether `command` is accepted in this state
    pub fn accepts(self, command: Command) -> bool {
        match command {
            Command::Load => true,
            Command::Play => matches!(self, PlaybackState::Paused | PlaybackState::Completed),
            Command::Pause => self == PlaybackState::Playing,
            Command::Stop | Command::Seek => matches!(
                self,
                PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Completed
            ),
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Paused => "paused",
            PlaybackState::Playing => "playing",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Completed => "completed",
            PlaybackState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Client commands subject to state guards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Load,
    Play,
    Pause,
    Stop,
    Seek,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Load => "load",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::Seek => "seek",
        };
        f.write_str(name)
    }
}
