use crate::error::StoreError;
use crate::types::timeline::Timeline;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Persisted description of a track, without its clips and speakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackHeader {
    pub id: String,
    pub name: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub media_path: Option<String>,
    /// Media length in seconds; unknown until the player has loaded metadata.
    #[serde(default)]
    pub duration: Option<f64>,
}

fn default_lang() -> String {
    "en".to_string()
}

/// One caption track of a media item: header plus its timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    #[serde(flatten)]
    pub header: TrackHeader,
    pub timeline: Timeline,
}

impl Track {
    pub fn new(name: impl Into<String>, media_path: Option<String>) -> Self {
        Track {
            header: TrackHeader {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.into(),
                lang: default_lang(),
                media_path,
                duration: None,
            },
            timeline: Timeline::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// Save the whole track as one JSON document.
    pub fn save_to_file(&self, path: &Path) -> Result<(), StoreError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a track written by [`Track::save_to_file`].
    pub fn load_from_file(path: &Path) -> Result<Track, StoreError> {
        let file = File::open(path)?;
        let track = serde_json::from_reader(BufReader::new(file))?;
        Ok(track)
    }
}
