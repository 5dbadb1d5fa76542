use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(pub Uuid);

impl ClipId {
    pub fn new() -> Self {
        ClipId(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeakerId(pub Uuid);

impl SpeakerId {
    pub fn new() -> Self {
        SpeakerId(Uuid::new_v4())
    }
}

impl Default for SpeakerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: SpeakerId,
    pub name: String,
    /// Identifier assigned by the store on first save.
    #[serde(default)]
    pub remote_id: Option<String>,
}

impl Speaker {
    pub fn new(name: impl Into<String>) -> Self {
        Speaker {
            id: SpeakerId::new(),
            name: name.into(),
            remote_id: None,
        }
    }
}

/// One caption segment covering the half-open interval `[in_time, out_time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub in_time: f64,
    pub out_time: f64,
    pub text: String,
    #[serde(default)]
    pub begin_paragraph: bool,
    #[serde(default)]
    pub speaker: Option<SpeakerId>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub remote_id: Option<String>,
}

impl Clip {
    pub fn new(in_time: f64, out_time: f64, text: impl Into<String>) -> Self {
        Clip {
            id: ClipId::new(),
            in_time,
            out_time,
            text: text.into(),
            begin_paragraph: false,
            speaker: None,
            edited: false,
            remote_id: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.out_time - self.in_time
    }

    pub fn is_active_at(&self, time: f64) -> bool {
        time >= self.in_time && time < self.out_time
    }

    /// Length of the caption text in characters, the unit carets are measured in.
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active_at_is_half_open() {
        let clip = Clip::new(4.0, 8.0, "hello");
        assert!(!clip.is_active_at(3.99));
        assert!(clip.is_active_at(4.0));
        assert!(clip.is_active_at(7.99));
        assert!(!clip.is_active_at(8.0));
    }

    #[test]
    fn test_text_len_counts_chars() {
        let clip = Clip::new(0.0, 1.0, "héllo");
        assert_eq!(clip.text_len(), 5);
        assert_eq!(clip.text.len(), 6);
    }

    #[test]
    fn test_clip_json_defaults() {
        let json = r#"{"id":"6f1c2e1a-3f44-4d7d-9a57-5d9cf3f5b0a1","in_time":0.0,"out_time":4.0,"text":"hi"}"#;
        let clip: Clip = serde_json::from_str(json).unwrap();
        assert!(!clip.edited);
        assert!(!clip.begin_paragraph);
        assert!(clip.speaker.is_none());
        assert!(clip.remote_id.is_none());
    }
}
