use thiserror::Error;

use crate::types::clip::ClipId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelineError {
    #[error("clip index {index} out of range (timeline has {len} clips)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("caret {caret} outside text of {len} characters")]
    CaretOutOfRange { caret: usize, len: usize },
    #[error("clip {0} is not a member of this timeline")]
    NotAMember(ClipId),
    #[error("media duration is unknown or not positive")]
    UnknownDuration,
    #[error("clip length must be positive, got {0}")]
    InvalidClipLength(f64),
    #[error("speaker {0} does not exist")]
    UnknownSpeaker(String),
    #[error("cannot remove the only clip of a timeline")]
    LastClip,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("active index {index} no longer refers to a clip (timeline has {len} clips)")]
    StaleIndex { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store rejected {kind}: {reason}")]
    Rejected { kind: &'static str, reason: String },
    #[error("track {0} not found")]
    NotFound(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VttError {
    #[error("line {line}: invalid timecode line {text:?}")]
    Timecode { line: usize, text: String },
    #[error("cue ending at line {line} has out time before in time")]
    NegativeCue { line: usize },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Speakers,
    Clips,
    Track,
}

impl std::fmt::Display for SaveStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SaveStep::Speakers => "speakers",
            SaveStep::Clips => "clips",
            SaveStep::Track => "track",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("saving {step} failed: {source}")]
pub struct SaveError {
    pub step: SaveStep,
    #[source]
    pub source: StoreError,
}
