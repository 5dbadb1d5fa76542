use crate::error::TimelineError;
use crate::ops::clip_ops::{collapse_first_whitespace_run, cut_clip_at};
use crate::types::clip::{Clip, ClipId, Speaker, SpeakerId};

use serde::{Deserialize, Serialize};

/// Ordered, non-overlapping caption clips of one track plus the speakers they
/// cite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    clips: Vec<Clip>,
    #[serde(default)]
    speakers: Vec<Speaker>,
}

/// Result of joining a clip into its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    /// Index of the predecessor that absorbed the clip.
    pub index: usize,
    /// Caret at the join point inside the predecessor's new text.
    pub caret: usize,
    pub removed: Clip,
}

impl Timeline {
    pub fn new() -> Self {
        Timeline {
            clips: Vec::new(),
            speakers: Vec::new(),
        }
    }

    pub fn from_parts(clips: Vec<Clip>, speakers: Vec<Speaker>) -> Self {
        Timeline { clips, speakers }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Returns the clip at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of range. Indices are always derived from the
    /// timeline itself, so a bad one is a bug upstream.
    pub fn clip_at(&self, index: usize) -> &Clip {
        match self.clips.get(index) {
            Some(clip) => clip,
            None => panic!(
                "clip index {} out of range (timeline has {} clips)",
                index,
                self.clips.len()
            ),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut Clip, TimelineError> {
        let len = self.clips.len();
        self.clips
            .get_mut(index)
            .ok_or(TimelineError::IndexOutOfRange { index, len })
    }

    pub fn index_of(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|clip| clip.id == id)
    }

    pub fn before(&self, id: ClipId) -> Option<&Clip> {
        let index = self.index_of(id)?;
        index.checked_sub(1).and_then(|i| self.clips.get(i))
    }

    pub fn after(&self, id: ClipId) -> Option<&Clip> {
        let index = self.index_of(id)?;
        self.clips.get(index + 1)
    }

    /// Index of the clip whose interval contains `time`.
    pub fn index_at_time(&self, time: f64) -> Option<usize> {
        let index = self.clips.partition_point(|clip| clip.in_time <= time);
        let candidate = index.checked_sub(1)?;
        self.clips[candidate].is_active_at(time).then_some(candidate)
    }

    /// Inserts `clip` immediately after the clip `after`, returning its index.
    /// The caller is responsible for the new clip's times fitting the order.
    pub fn insert_after(&mut self, clip: Clip, after: ClipId) -> Result<usize, TimelineError> {
        let index = self.index_of(after).ok_or(TimelineError::NotAMember(after))?;
        debug_assert!(clip.in_time >= self.clips[index].in_time);
        self.clips.insert(index + 1, clip);
        Ok(index + 1)
    }

    /// Detaches a clip and hands it back; the timeline forgets it entirely.
    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let index = self.index_of(id)?;
        Some(self.clips.remove(index))
    }

    /// Splits the clip at `index` at a caret position inside its text and
    /// returns the index of the new tail clip.
    pub fn split(&mut self, index: usize, caret: usize) -> Result<usize, TimelineError> {
        let len = self.clips.len();
        let clip = self
            .clips
            .get(index)
            .ok_or(TimelineError::IndexOutOfRange { index, len })?;
        let (left, right) = cut_clip_at(clip, caret)?;

        tracing::debug!(
            clip = %left.id,
            new_clip = %right.id,
            split_time = right.in_time,
            "split clip"
        );
        self.clips[index] = left;
        self.clips.insert(index + 1, right);
        Ok(index + 1)
    }

    /// Merges the clip at `index` into its predecessor.
    ///
    /// Returns `Ok(None)` for the first clip, which has nothing to join with.
    /// The merged text collapses only the first whitespace run of
    /// `"{prev} {text}"`.
    pub fn join(&mut self, index: usize) -> Result<Option<Joined>, TimelineError> {
        let len = self.clips.len();
        if index >= len {
            return Err(TimelineError::IndexOutOfRange { index, len });
        }
        if index == 0 {
            return Ok(None);
        }

        let prev = &self.clips[index - 1];
        let clip = &self.clips[index];
        let caret = prev.text_len();
        let text = collapse_first_whitespace_run(&format!("{} {}", prev.text, clip.text));
        let out_time = clip.out_time;
        let caret = caret.min(text.chars().count());

        let removed = self.clips.remove(index);
        let prev = &mut self.clips[index - 1];
        prev.out_time = out_time;
        prev.text = text;

        tracing::debug!(clip = %removed.id, into = %prev.id, "joined clip into predecessor");
        Ok(Some(Joined {
            index: index - 1,
            caret,
            removed,
        }))
    }

    /// Removes the clip at `index`, refusing to empty the timeline.
    pub fn delete(&mut self, index: usize) -> Result<Clip, TimelineError> {
        let len = self.clips.len();
        if index >= len {
            return Err(TimelineError::IndexOutOfRange { index, len });
        }
        if len == 1 {
            return Err(TimelineError::LastClip);
        }
        Ok(self.clips.remove(index))
    }

    /// Divides `[0, duration)` into empty clips of `clip_length` seconds when
    /// the timeline has none. The last clip is clamped to `duration`.
    ///
    /// Returns the number of clips created.
    pub fn fill_empty(&mut self, duration: f64, clip_length: f64) -> Result<usize, TimelineError> {
        if !self.clips.is_empty() {
            return Ok(0);
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(TimelineError::UnknownDuration);
        }
        if !clip_length.is_finite() || clip_length <= 0.0 {
            return Err(TimelineError::InvalidClipLength(clip_length));
        }

        let count = (duration / clip_length).ceil() as usize;
        self.clips = (0..count)
            .map(|i| {
                let in_time = i as f64 * clip_length;
                let out_time = (in_time + clip_length).min(duration);
                Clip::new(in_time, out_time, "")
            })
            .filter(|clip| clip.in_time < duration)
            .collect();
        tracing::info!(clips = self.clips.len(), duration, "created empty transcript");
        Ok(self.clips.len())
    }

    /// Sorts clips by `in_time` and clamps each `out_time` to the next
    /// clip's `in_time`. Returns how many clips were shortened.
    pub fn repair_overlaps(&mut self) -> usize {
        self.clips.sort_by(|a, b| a.in_time.total_cmp(&b.in_time));
        let mut clamped = 0;
        for i in 1..self.clips.len() {
            let next_in = self.clips[i].in_time;
            let prev = &mut self.clips[i - 1];
            if prev.out_time > next_in {
                prev.out_time = next_in;
                clamped += 1;
            }
        }
        if clamped > 0 {
            tracing::warn!(clamped, "clamped overlapping clips");
        }
        clamped
    }

    /// True when clips are ordered by `in_time` and no two overlap.
    pub fn is_consistent(&self) -> bool {
        self.clips.iter().all(|clip| clip.in_time <= clip.out_time)
            && self
                .clips
                .windows(2)
                .all(|pair| pair[0].in_time <= pair[1].in_time && pair[0].out_time <= pair[1].in_time)
    }

    pub fn edited_count(&self) -> usize {
        self.clips.iter().filter(|clip| clip.edited).count()
    }

    /// Sets the clip's text, flagging it edited when the text differs.
    /// Returns true when the edited flag went from false to true.
    pub fn set_text(&mut self, index: usize, text: String) -> Result<bool, TimelineError> {
        let clip = self.get_mut(index)?;
        if clip.text == text {
            return Ok(false);
        }
        clip.text = text;
        let newly_edited = !clip.edited;
        clip.edited = true;
        Ok(newly_edited)
    }

    pub fn set_begin_paragraph(&mut self, index: usize, begin: bool) -> Result<bool, TimelineError> {
        let clip = self.get_mut(index)?;
        let changed = clip.begin_paragraph != begin;
        clip.begin_paragraph = begin;
        Ok(changed)
    }

    /// Whether the clip at `index` starts a new speaker run.
    pub fn is_speaker_change(&self, index: usize) -> bool {
        index == 0 || self.clip_at(index - 1).speaker != self.clip_at(index).speaker
    }

    /// Assigns `speaker` to the clip at `index` and to every following clip
    /// that shared its previous speaker. Returns the range of indices changed.
    pub fn set_speaker_run(
        &mut self,
        index: usize,
        speaker: Option<SpeakerId>,
    ) -> Result<std::ops::Range<usize>, TimelineError> {
        if let Some(id) = speaker {
            if self.speaker(id).is_none() {
                return Err(TimelineError::UnknownSpeaker(id.to_string()));
            }
        }
        let old = self.get_mut(index)?.speaker;

        let end = self.clips[index..]
            .iter()
            .position(|clip| clip.speaker != old)
            .map(|rel| index + rel)
            .unwrap_or(self.clips.len());
        for clip in &mut self.clips[index..end] {
            clip.speaker = speaker;
        }
        Ok(index..end)
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn speaker(&self, id: SpeakerId) -> Option<&Speaker> {
        self.speakers.iter().find(|speaker| speaker.id == id)
    }

    pub(crate) fn speaker_mut(&mut self, id: SpeakerId) -> Option<&mut Speaker> {
        self.speakers.iter_mut().find(|speaker| speaker.id == id)
    }

    pub fn add_speaker(&mut self, name: impl Into<String>) -> SpeakerId {
        let speaker = Speaker::new(name);
        let id = speaker.id;
        self.speakers.push(speaker);
        id
    }

    pub fn rename_speaker(&mut self, id: SpeakerId, name: impl Into<String>) -> Result<(), TimelineError> {
        let speaker = self
            .speaker_mut(id)
            .ok_or_else(|| TimelineError::UnknownSpeaker(id.to_string()))?;
        speaker.name = name.into();
        Ok(())
    }

    /// Adds "Speaker 1" when the track has no speakers yet.
    pub fn ensure_default_speaker(&mut self) -> Option<SpeakerId> {
        if self.speakers.is_empty() {
            Some(self.add_speaker("Speaker 1"))
        } else {
            None
        }
    }

    /// Records identifiers handed back by the store.
    pub(crate) fn assign_remote_ids(
        &mut self,
        clips: &[(ClipId, String)],
        speakers: &[(SpeakerId, String)],
    ) {
        for (id, remote) in clips {
            if let Some(index) = self.index_of(*id) {
                self.clips[index].remote_id = Some(remote.clone());
            }
        }
        for (id, remote) in speakers {
            if let Some(speaker) = self.speaker_mut(*id) {
                speaker.remote_id = Some(remote.clone());
            }
        }
    }
}
