use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::playback_state::DEFAULT_JUMP_TOLERANCE;

pub const DEFAULT_CLIP_LENGTH: f64 = 4.0;

/// Command-line and environment configuration of the editor.
#[derive(Debug, Clone, Parser)]
#[command(name = "clipscribe", about = "Edit time-synchronised captions against a media file")]
pub struct EditorConfig {
    /// Audio or video file to transcribe.
    #[arg(env = "CLIPSCRIBE_MEDIA")]
    pub media: Option<PathBuf>,

    /// Directory holding saved tracks.
    #[arg(long, env = "CLIPSCRIBE_STORE", default_value = "transcripts")]
    pub store: PathBuf,

    /// Id of a saved track to open instead of starting a new one.
    #[arg(long, env = "CLIPSCRIBE_TRACK")]
    pub track: Option<String>,

    /// WebVTT or SRT file to import as the starting transcript.
    #[arg(long = "import", env = "CLIPSCRIBE_IMPORT")]
    pub import_vtt: Option<PathBuf>,

    /// Track name used for new tracks.
    #[arg(long, env = "CLIPSCRIBE_NAME", default_value = "Transcript")]
    pub name: String,

    /// Length in seconds of the empty clips created for a new track.
    #[arg(long, env = "CLIPSCRIBE_CLIP_LENGTH", default_value_t = DEFAULT_CLIP_LENGTH)]
    pub clip_length: f64,

    /// Seconds playback may fall behind a clicked clip before the active clip follows.
    #[arg(long, env = "CLIPSCRIBE_JUMP_TOLERANCE", default_value_t = DEFAULT_JUMP_TOLERANCE)]
    pub jump_tolerance: f64,

    /// Milliseconds between time-advance polls of the player.
    #[arg(long, env = "CLIPSCRIBE_TICK_MS", default_value_t = 250)]
    pub tick_ms: u64,

    /// Initial playback rate.
    #[arg(long, env = "CLIPSCRIBE_RATE", default_value_t = 1.0)]
    pub rate: f64,

    /// Duration in seconds for the simulated clock when no media is given.
    #[arg(long, env = "CLIPSCRIBE_DURATION")]
    pub duration: Option<f64>,
}

impl EditorConfig {
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            clip_length: self.clip_length,
            jump_tolerance: self.jump_tolerance,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(10))
    }
}

/// Settings the edit session itself depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub clip_length: f64,
    pub jump_tolerance: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            clip_length: DEFAULT_CLIP_LENGTH,
            jump_tolerance: DEFAULT_JUMP_TOLERANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::try_parse_from(["clipscribe"]).unwrap();
        assert!(config.media.is_none());
        assert_eq!(config.session(), SessionConfig::default());
        assert_eq!(config.tick(), Duration::from_millis(250));
        assert_eq!(config.store, PathBuf::from("transcripts"));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = EditorConfig::try_parse_from([
            "clipscribe",
            "talk.mp3",
            "--clip-length",
            "6",
            "--jump-tolerance",
            "0.5",
            "--tick-ms",
            "1",
        ])
        .unwrap();
        assert_eq!(config.media, Some(PathBuf::from("talk.mp3")));
        assert_eq!(config.session().clip_length, 6.0);
        assert_eq!(config.session().jump_tolerance, 0.5);
        assert_eq!(config.tick(), Duration::from_millis(10));
    }
}
