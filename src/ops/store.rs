use crate::error::{SaveError, SaveStep, StoreError};
use crate::types::clip::{Clip, ClipId, Speaker, SpeakerId};
use crate::types::timeline::Timeline;
use crate::types::track::{Track, TrackHeader};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Backend that persists a track's speakers, clips and header.
///
/// Each call either accepts the whole batch and returns one identifier per
/// record, in order, or fails.
pub trait TranscriptStore {
    fn save_speakers(&mut self, track_id: &str, speakers: &[Speaker]) -> Result<Vec<String>, StoreError>;
    fn save_clips(&mut self, track_id: &str, clips: &[Clip]) -> Result<Vec<String>, StoreError>;
    fn save_track(&mut self, header: &TrackHeader) -> Result<String, StoreError>;
}

/// Snapshot of everything a save writes, taken when the save starts.
#[derive(Debug, Clone)]
pub struct SaveBatch {
    pub revision: u64,
    pub header: TrackHeader,
    pub speakers: Vec<Speaker>,
    pub clips: Vec<Clip>,
}

impl SaveBatch {
    pub fn from_track(header: &TrackHeader, timeline: &Timeline, revision: u64) -> Self {
        SaveBatch {
            revision,
            header: header.clone(),
            speakers: timeline.speakers().to_vec(),
            clips: timeline.clips().to_vec(),
        }
    }
}

/// Identifiers handed back by a successful save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReceipt {
    pub revision: u64,
    pub track_id: String,
    pub speaker_ids: Vec<(SpeakerId, String)>,
    pub clip_ids: Vec<(ClipId, String)>,
}

fn mismatch(kind: &'static str, expected: usize, got: usize) -> StoreError {
    StoreError::Rejected {
        kind,
        reason: format!("expected {} identifiers, got {}", expected, got),
    }
}

/// Saves speakers, then clips, then the track header. The first failing step
/// aborts the chain.
pub fn save_batch(store: &mut dyn TranscriptStore, batch: &SaveBatch) -> Result<SaveReceipt, SaveError> {
    let track_id = batch.header.id.as_str();

    tracing::debug!(track = track_id, speakers = batch.speakers.len(), "saving speakers");
    let speaker_remote = store
        .save_speakers(track_id, &batch.speakers)
        .and_then(|ids| {
            if ids.len() == batch.speakers.len() {
                Ok(ids)
            } else {
                Err(mismatch("speakers", batch.speakers.len(), ids.len()))
            }
        })
        .map_err(|source| SaveError {
            step: SaveStep::Speakers,
            source,
        })?;

    tracing::debug!(track = track_id, clips = batch.clips.len(), "saving clips");
    let clip_remote = store
        .save_clips(track_id, &batch.clips)
        .and_then(|ids| {
            if ids.len() == batch.clips.len() {
                Ok(ids)
            } else {
                Err(mismatch("clips", batch.clips.len(), ids.len()))
            }
        })
        .map_err(|source| SaveError {
            step: SaveStep::Clips,
            source,
        })?;

    let remote_track = store.save_track(&batch.header).map_err(|source| SaveError {
        step: SaveStep::Track,
        source,
    })?;
    tracing::info!(track = track_id, revision = batch.revision, "track saved");

    Ok(SaveReceipt {
        revision: batch.revision,
        track_id: remote_track,
        speaker_ids: batch.speakers.iter().map(|s| s.id).zip(speaker_remote).collect(),
        clip_ids: batch.clips.iter().map(|c| c.id).zip(clip_remote).collect(),
    })
}

/// Store that keeps one directory per track holding `speakers.json`,
/// `clips.json` and `track.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonFileStore { root: root.into() }
    }

    fn track_dir(&self, track_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(track_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), value)?;
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Like `read_json`, but a missing file reads as the default value.
    fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
        match Self::read_json(path) {
            Err(StoreError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            other => other,
        }
    }

    /// Ids of tracks present under the root directory.
    pub fn track_ids(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join("track.json").exists() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn load(&self, track_id: &str) -> Result<Track, StoreError> {
        let dir = self.root.join(track_id);
        if !dir.join("track.json").exists() {
            return Err(StoreError::NotFound(track_id.to_string()));
        }
        let header: TrackHeader = Self::read_json(&dir.join("track.json"))?;
        let speakers: Vec<Speaker> = Self::read_json_or_default(&dir.join("speakers.json"))?;
        let clips: Vec<Clip> = Self::read_json_or_default(&dir.join("clips.json"))?;
        let mut timeline = Timeline::from_parts(clips, speakers);
        timeline.repair_overlaps();
        Ok(Track { header, timeline })
    }
}

impl TranscriptStore for JsonFileStore {
    fn save_speakers(&mut self, track_id: &str, speakers: &[Speaker]) -> Result<Vec<String>, StoreError> {
        let dir = self.track_dir(track_id)?;
        let saved: Vec<Speaker> = speakers
            .iter()
            .map(|speaker| Speaker {
                remote_id: Some(speaker.remote_id.clone().unwrap_or_else(|| speaker.id.to_string())),
                ..speaker.clone()
            })
            .collect();
        Self::write_json(&dir.join("speakers.json"), &saved)?;
        Ok(saved.into_iter().filter_map(|s| s.remote_id).collect())
    }

    fn save_clips(&mut self, track_id: &str, clips: &[Clip]) -> Result<Vec<String>, StoreError> {
        let dir = self.track_dir(track_id)?;
        let saved: Vec<Clip> = clips
            .iter()
            .map(|clip| Clip {
                remote_id: Some(clip.remote_id.clone().unwrap_or_else(|| clip.id.to_string())),
                ..clip.clone()
            })
            .collect();
        Self::write_json(&dir.join("clips.json"), &saved)?;
        Ok(saved.into_iter().filter_map(|c| c.remote_id).collect())
    }

    fn save_track(&mut self, header: &TrackHeader) -> Result<String, StoreError> {
        let dir = self.track_dir(&header.id)?;
        Self::write_json(&dir.join("track.json"), header)?;
        Ok(header.id.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory store that can be told to fail at a given step.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub fail_at: Option<SaveStep>,
        pub calls: Vec<SaveStep>,
        pub clips: Vec<Clip>,
    }

    impl TranscriptStore for MemoryStore {
        fn save_speakers(&mut self, _track_id: &str, speakers: &[Speaker]) -> Result<Vec<String>, StoreError> {
            self.calls.push(SaveStep::Speakers);
            if self.fail_at == Some(SaveStep::Speakers) {
                return Err(StoreError::Rejected {
                    kind: "speakers",
                    reason: "offline".into(),
                });
            }
            Ok((0..speakers.len()).map(|i| format!("s{}", i)).collect())
        }

        fn save_clips(&mut self, _track_id: &str, clips: &[Clip]) -> Result<Vec<String>, StoreError> {
            self.calls.push(SaveStep::Clips);
            if self.fail_at == Some(SaveStep::Clips) {
                return Err(StoreError::Rejected {
                    kind: "clips",
                    reason: "validation".into(),
                });
            }
            self.clips = clips.to_vec();
            Ok((0..clips.len()).map(|i| format!("c{}", i)).collect())
        }

        fn save_track(&mut self, header: &TrackHeader) -> Result<String, StoreError> {
            self.calls.push(SaveStep::Track);
            if self.fail_at == Some(SaveStep::Track) {
                return Err(StoreError::Rejected {
                    kind: "track",
                    reason: "conflict".into(),
                });
            }
            Ok(format!("t-{}", header.name))
        }
    }

    fn batch() -> SaveBatch {
        let mut track = Track::new("Talk", None);
        track.timeline.add_speaker("Host");
        track.timeline.fill_empty(10.0, 4.0).unwrap();
        SaveBatch::from_track(&track.header, &track.timeline, 7)
    }

    #[test]
    fn test_save_chain_order_and_receipt() {
        let mut store = MemoryStore::default();
        let batch = batch();
        let receipt = save_batch(&mut store, &batch).unwrap();
        assert_eq!(store.calls, [SaveStep::Speakers, SaveStep::Clips, SaveStep::Track]);
        assert_eq!(receipt.revision, 7);
        assert_eq!(receipt.track_id, "t-Talk");
        assert_eq!(receipt.speaker_ids.len(), 1);
        assert_eq!(receipt.clip_ids[2], (batch.clips[2].id, "c2".to_string()));
    }

    #[test]
    fn test_save_chain_aborts_on_first_failure() {
        let mut store = MemoryStore {
            fail_at: Some(SaveStep::Speakers),
            ..Default::default()
        };
        let err = save_batch(&mut store, &batch()).unwrap_err();
        assert_eq!(err.step, SaveStep::Speakers);
        assert_eq!(store.calls, [SaveStep::Speakers]);

        let mut store = MemoryStore {
            fail_at: Some(SaveStep::Clips),
            ..Default::default()
        };
        let err = save_batch(&mut store, &batch()).unwrap_err();
        assert_eq!(err.step, SaveStep::Clips);
        assert_eq!(store.calls, [SaveStep::Speakers, SaveStep::Clips]);
        assert!(err.to_string().starts_with("saving clips failed"));
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        let batch = batch();
        let receipt = save_batch(&mut store, &batch).unwrap();
        assert_eq!(receipt.track_id, batch.header.id);
        assert_eq!(receipt.clip_ids[0].1, batch.clips[0].id.to_string());

        assert_eq!(store.track_ids().unwrap(), [batch.header.id.clone()]);
        let track = store.load(&batch.header.id).unwrap();
        assert_eq!(track.header.name, "Talk");
        assert_eq!(track.timeline.len(), 3);
        assert_eq!(track.timeline.speakers()[0].name, "Host");
        assert!(track.timeline.clips().iter().all(|c| c.remote_id.is_some()));
    }

    #[test]
    fn test_json_store_missing_track() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(store.load("absent"), Err(StoreError::NotFound(_))));
        assert!(store.track_ids().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_load_without_clip_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        let header = Track::new("Bare", None).header;
        store.save_track(&header).unwrap();
        let track = store.load(&header.id).unwrap();
        assert!(track.timeline.is_empty());
        assert!(track.timeline.speakers().is_empty());
    }

    #[test]
    fn test_json_store_load_clamps_overlapping_clips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        let header = Track::new("Overlap", None).header;
        store
            .save_clips(&header.id, &[Clip::new(0.0, 5.0, "a"), Clip::new(3.0, 8.0, "b")])
            .unwrap();
        store.save_track(&header).unwrap();
        let track = store.load(&header.id).unwrap();
        assert!(track.timeline.is_consistent());
        assert_eq!(track.timeline.clip_at(0).out_time, 3.0);
    }
}
