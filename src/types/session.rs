use crate::config::SessionConfig;
use crate::error::{SaveError, TimelineError};
use crate::ops::clip_ops::{capitalize_first, comma_break, sentence_break};
use crate::ops::store::{SaveBatch, SaveReceipt, TranscriptStore, save_batch};
use crate::types::clip::{ClipId, SpeakerId};
use crate::types::playback_state::PlaybackTracker;
use crate::types::timeline::Timeline;
use crate::types::track::{Track, TrackHeader};

use std::fmt;

/// Which clip, if any, is open for text editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Unfocused,
    FocusedAt { index: usize, caret: usize },
}

impl Focus {
    pub fn index(&self) -> Option<usize> {
        match self {
            Focus::Unfocused => None,
            Focus::FocusedAt { index, .. } => Some(*index),
        }
    }
}

/// Display state of one clip row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipFlags {
    pub active: bool,
    pub edited: bool,
    pub begin_paragraph: bool,
    pub speaker_change: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub edited: usize,
    pub total: usize,
}

impl Stats {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.edited as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% checked ({} of {} captions)",
            self.percentage().floor() as u64,
            self.edited,
            self.total
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Backward => -1,
            Direction::Forward => 1,
        }
    }
}

/// Instructions for the player and the rendering layer, in the order they
/// must be carried out.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Render { index: usize, flags: ClipFlags },
    Focus { index: usize, caret: usize },
    Blur,
    ScrollIntoView(usize),
    Seek(f64),
    Play,
    Pause,
    SetRate(f64),
    Inserted { index: usize, id: ClipId },
    Removed { id: ClipId },
    /// Every row must be rebuilt, e.g. after the empty transcript was created.
    Reset,
    SpeakersChanged,
    StatsChanged(Stats),
    DirtyChanged(bool),
    Saved,
    SaveFailed(String),
}

/// Editing state for one track: timeline, active-clip tracking, focus and
/// save bookkeeping.
#[derive(Debug)]
pub struct EditSession {
    header: TrackHeader,
    timeline: Timeline,
    tracker: PlaybackTracker,
    focus: Focus,
    edited_count: usize,
    paused: bool,
    dirty: bool,
    revision: u64,
    saving: Option<u64>,
    config: SessionConfig,
}

type Events = Vec<SessionEvent>;

impl EditSession {
    pub fn new(track: Track, config: SessionConfig) -> Self {
        let Track {
            header,
            mut timeline,
        } = track;
        timeline.ensure_default_speaker();
        let mut session = EditSession {
            edited_count: timeline.edited_count(),
            header,
            timeline,
            tracker: PlaybackTracker::with_tolerance(config.jump_tolerance),
            focus: Focus::Unfocused,
            paused: true,
            dirty: false,
            revision: 0,
            saving: None,
            config,
        };
        if let Some(duration) = session.header.duration {
            if let Err(err) = session.create_empty_clips(duration, &mut Vec::new()) {
                tracing::warn!(error = %err, "could not create empty transcript");
            }
        }
        session
    }

    pub fn header(&self) -> &TrackHeader {
        &self.header
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn active_index(&self) -> usize {
        self.tracker.active_index()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_some()
    }

    pub fn edited_count(&self) -> usize {
        self.edited_count
    }

    pub fn stats(&self) -> Stats {
        Stats {
            edited: self.edited_count,
            total: self.timeline.len(),
        }
    }

    /// Snapshot of the track as it currently stands.
    pub fn to_track(&self) -> Track {
        Track {
            header: self.header.clone(),
            timeline: self.timeline.clone(),
        }
    }

    pub fn flags(&self, index: usize) -> ClipFlags {
        let clip = self.timeline.clip_at(index);
        ClipFlags {
            active: index == self.tracker.active_index(),
            edited: clip.edited,
            begin_paragraph: clip.begin_paragraph,
            speaker_change: self.timeline.is_speaker_change(index),
        }
    }

    fn render(&self, index: usize, events: &mut Events) {
        if index < self.timeline.len() {
            events.push(SessionEvent::Render {
                index,
                flags: self.flags(index),
            });
        }
    }

    fn resolve(&self, id: ClipId) -> Result<usize, TimelineError> {
        self.timeline.index_of(id).ok_or(TimelineError::NotAMember(id))
    }

    fn mark_dirty(&mut self, events: &mut Events) {
        self.revision += 1;
        if !self.dirty {
            self.dirty = true;
            events.push(SessionEvent::DirtyChanged(true));
        }
    }

    fn set_dirty(&mut self, dirty: bool, events: &mut Events) {
        if self.dirty != dirty {
            self.dirty = dirty;
            events.push(SessionEvent::DirtyChanged(dirty));
        }
    }

    fn edited_changed(&mut self, delta: isize, events: &mut Events) {
        if delta == 0 {
            return;
        }
        self.edited_count = self.edited_count.saturating_add_signed(delta);
        debug_assert_eq!(self.edited_count, self.timeline.edited_count());
        events.push(SessionEvent::StatsChanged(self.stats()));
    }

    fn create_empty_clips(&mut self, duration: f64, events: &mut Events) -> Result<(), TimelineError> {
        if self.timeline.fill_empty(duration, self.config.clip_length)? > 0 {
            events.push(SessionEvent::Reset);
            events.push(SessionEvent::StatsChanged(self.stats()));
            self.mark_dirty(events);
        }
        Ok(())
    }

    /// Records the media duration once the player knows it, creating the
    /// empty transcript for a track without clips.
    pub fn set_duration(&mut self, duration: f64) -> Result<Events, TimelineError> {
        let mut events = Vec::new();
        self.header.duration = Some(duration);
        self.create_empty_clips(duration, &mut events)?;
        Ok(events)
    }

    /// Handles a time-advance notification from the player.
    pub fn on_time_update(&mut self, time: f64) -> Events {
        let mut events = Vec::new();
        if self.timeline.is_empty() {
            return events;
        }
        let editing = self.focus != Focus::Unfocused;
        match self.tracker.on_time_update(&self.timeline, time, editing) {
            Ok(resolution) => {
                if let Some(change) = resolution.change {
                    if let Some(previous) = change.previous {
                        self.render(previous, &mut events);
                    }
                    self.render(change.current, &mut events);
                    if resolution.auto_scroll {
                        events.push(SessionEvent::ScrollIntoView(change.current));
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, time, "cannot resolve active clip"),
        }
        events
    }

    fn jump_to_index(&mut self, index: usize, events: &mut Events) {
        let previous = self.tracker.active_index();
        let seek = self.tracker.jump_to_index(&self.timeline, index);
        if previous != index {
            self.render(previous, events);
        }
        self.render(index, events);
        events.push(SessionEvent::Seek(seek));
    }

    /// Jumps playback to the start of a clip. Unknown clips are ignored.
    pub fn jump_to_clip(&mut self, id: ClipId) -> Events {
        let mut events = Vec::new();
        if let Some(index) = self.timeline.index_of(id) {
            self.jump_to_index(index, &mut events);
        }
        events
    }

    fn edit_at(&mut self, index: usize, caret: usize, give_focus: bool, events: &mut Events) {
        self.focus = Focus::FocusedAt { index, caret };
        if give_focus {
            events.push(SessionEvent::Focus { index, caret });
        }
        if self.paused {
            self.jump_to_index(index, events);
        }
    }

    /// Opens a clip for editing. With `give_focus` unset the caller already
    /// moved keyboard focus and only the session state follows.
    pub fn edit_clip(&mut self, id: ClipId, give_focus: bool) -> Result<Events, TimelineError> {
        let index = self.resolve(id)?;
        let caret = match self.focus {
            Focus::FocusedAt { index: current, caret } if current == index => caret,
            _ => 0,
        };
        let mut events = Vec::new();
        self.edit_at(index, caret, give_focus, &mut events);
        Ok(events)
    }

    /// Keyboard focus left the caption list.
    pub fn blur(&mut self) -> Events {
        if self.focus == Focus::Unfocused {
            return Vec::new();
        }
        self.focus = Focus::Unfocused;
        vec![SessionEvent::Blur]
    }

    /// Caret moved inside the focused clip.
    pub fn set_caret(&mut self, caret: usize) -> Result<(), TimelineError> {
        if let Focus::FocusedAt { index, .. } = self.focus {
            let len = self.timeline.clip_at(index).text_len();
            if caret > len {
                return Err(TimelineError::CaretOutOfRange { caret, len });
            }
            self.focus = Focus::FocusedAt { index, caret };
        }
        Ok(())
    }

    fn apply_text(&mut self, index: usize, text: String, mark_edited: bool, events: &mut Events) -> Result<(), TimelineError> {
        if self.timeline.clip_at(index).text == text {
            return Ok(());
        }
        if mark_edited {
            if self.timeline.set_text(index, text)? {
                self.edited_changed(1, events);
            }
        } else {
            self.timeline.get_mut(index)?.text = text;
        }
        if let Focus::FocusedAt { index: focused, caret } = self.focus {
            if focused == index {
                let len = self.timeline.clip_at(index).text_len();
                self.focus = Focus::FocusedAt {
                    index,
                    caret: caret.min(len),
                };
            }
        }
        self.render(index, events);
        self.mark_dirty(events);
        Ok(())
    }

    /// Replaces a clip's text, flagging it edited when it changed.
    pub fn set_text(&mut self, id: ClipId, text: impl Into<String>) -> Result<Events, TimelineError> {
        let index = self.resolve(id)?;
        let mut events = Vec::new();
        self.apply_text(index, text.into(), true, &mut events)?;
        Ok(events)
    }

    fn focused(&self) -> Result<Option<(usize, usize)>, TimelineError> {
        match self.focus {
            Focus::Unfocused => Ok(None),
            Focus::FocusedAt { index, caret } => {
                let len = self
                    .timeline
                    .get(index)
                    .ok_or(TimelineError::IndexOutOfRange {
                        index,
                        len: self.timeline.len(),
                    })?
                    .text_len();
                if caret > len {
                    return Err(TimelineError::CaretOutOfRange { caret, len });
                }
                Ok(Some((index, caret)))
            }
        }
    }

    /// Ends a sentence at the caret.
    ///
    /// At the end of the text a full stop is appended and editing moves on to
    /// the next clip, whose first letter is capitalized. Inside the text `ch`
    /// and a space replace the whitespace at the caret.
    pub fn insert_sentence_break(&mut self, ch: char) -> Result<Events, TimelineError> {
        let Some((index, caret)) = self.focused()? else {
            return Ok(Vec::new());
        };
        let mut events = Vec::new();
        let text = self.timeline.clip_at(index).text.clone();

        if caret == text.chars().count() {
            self.apply_text(index, format!("{}.", text), true, &mut events)?;
            if index + 1 < self.timeline.len() {
                let next = &self.timeline.clip_at(index + 1).text;
                if !next.trim().is_empty() {
                    let next = capitalize_first(next);
                    self.apply_text(index + 1, next, false, &mut events)?;
                }
                self.edit_at(index + 1, 0, true, &mut events);
            } else {
                let caret = caret + 1;
                self.focus = Focus::FocusedAt { index, caret };
                events.push(SessionEvent::Focus { index, caret });
            }
        } else {
            let (new_text, caret) = sentence_break(&text, caret, ch)?;
            self.apply_text(index, new_text, true, &mut events)?;
            self.focus = Focus::FocusedAt { index, caret };
            events.push(SessionEvent::Focus { index, caret });
        }
        Ok(events)
    }

    pub fn insert_comma(&mut self) -> Result<Events, TimelineError> {
        let Some((index, caret)) = self.focused()? else {
            return Ok(Vec::new());
        };
        let mut events = Vec::new();
        let (new_text, caret) = comma_break(&self.timeline.clip_at(index).text, caret)?;
        self.apply_text(index, new_text, true, &mut events)?;
        self.focus = Focus::FocusedAt { index, caret };
        events.push(SessionEvent::Focus { index, caret });
        Ok(events)
    }

    /// Splits the focused clip at the caret and continues editing the new
    /// clip.
    pub fn split(&mut self) -> Result<Events, TimelineError> {
        let Some((index, caret)) = self.focused()? else {
            return Ok(Vec::new());
        };
        let mut events = Vec::new();
        let new_index = self.timeline.split(index, caret)?;
        self.tracker.clip_inserted(new_index);
        events.push(SessionEvent::Inserted {
            index: new_index,
            id: self.timeline.clip_at(new_index).id,
        });
        self.edited_changed(1, &mut events);
        self.render(index, &mut events);
        self.render(new_index, &mut events);
        self.mark_dirty(&mut events);
        self.edit_at(new_index, 0, true, &mut events);
        Ok(events)
    }

    /// Joins the focused clip into its predecessor and continues editing there
    /// at the join point. The first clip has nothing to join with.
    pub fn join(&mut self) -> Result<Events, TimelineError> {
        let Some((index, _)) = self.focused()? else {
            return Ok(Vec::new());
        };
        let Some(joined) = self.timeline.join(index)? else {
            return Ok(Vec::new());
        };
        let mut events = Vec::new();
        self.tracker.clip_removed(index);
        events.push(SessionEvent::Removed {
            id: joined.removed.id,
        });
        if joined.removed.edited {
            self.edited_changed(-1, &mut events);
        }
        self.render(joined.index, &mut events);
        self.render(joined.index + 1, &mut events);
        self.mark_dirty(&mut events);
        self.edit_at(joined.index, joined.caret, true, &mut events);
        Ok(events)
    }

    /// Deletes the focused clip and moves editing to its successor, or to its
    /// predecessor when it was the last clip.
    pub fn delete_focused(&mut self) -> Result<Events, TimelineError> {
        let Some((index, _)) = self.focused()? else {
            return Ok(Vec::new());
        };
        let removed = self.timeline.delete(index)?;
        let mut events = Vec::new();
        self.tracker.clip_removed(index);
        events.push(SessionEvent::Removed { id: removed.id });
        if removed.edited {
            self.edited_changed(-1, &mut events);
        } else {
            events.push(SessionEvent::StatsChanged(self.stats()));
        }
        self.render(index, &mut events);
        self.mark_dirty(&mut events);
        if index < self.timeline.len() {
            self.edit_at(index, 0, true, &mut events);
        } else {
            let prev = index - 1;
            let caret = self.timeline.clip_at(prev).text_len();
            self.edit_at(prev, caret, true, &mut events);
        }
        Ok(events)
    }

    fn step_active(&mut self, target: usize, events: &mut Events) {
        self.jump_to_index(target, events);
        if self.paused {
            events.push(SessionEvent::ScrollIntoView(target));
        }
    }

    /// Moves editing to the previous clip with the caret at its end, or steps
    /// playback back one clip when nothing is being edited.
    pub fn move_focus_up(&mut self) -> Events {
        let mut events = Vec::new();
        match self.focus {
            Focus::FocusedAt { index, .. } if index > 0 && index < self.timeline.len() => {
                let caret = self.timeline.clip_at(index - 1).text_len();
                self.edit_at(index - 1, caret, true, &mut events);
            }
            _ => {
                let active = self.tracker.active_index();
                if active > 0 && active <= self.timeline.len() {
                    self.step_active(active - 1, &mut events);
                }
            }
        }
        events
    }

    /// Moves editing to the next clip with the caret at its start, or steps
    /// playback forward one clip when nothing is being edited.
    pub fn move_focus_down(&mut self) -> Events {
        let mut events = Vec::new();
        match self.focus {
            Focus::FocusedAt { index, .. } if index + 1 < self.timeline.len() => {
                self.edit_at(index + 1, 0, true, &mut events);
            }
            _ => {
                let active = self.tracker.active_index();
                if active + 1 < self.timeline.len() {
                    self.step_active(active + 1, &mut events);
                }
            }
        }
        events
    }

    /// Jumps to the nearest clip in `direction` that has not been edited yet,
    /// or to the first/last clip when every remaining clip is edited.
    pub fn skip_unedited(&mut self, direction: Direction) -> Events {
        let mut events = Vec::new();
        let len = self.timeline.len() as isize;
        if len == 0 {
            return events;
        }
        let step = direction.step();
        let mut index = (self.tracker.active_index() as isize + step).clamp(0, len - 1);
        while (0..len).contains(&index) && self.timeline.clip_at(index as usize).edited {
            index += step;
        }
        let index = index.clamp(0, len - 1) as usize;
        self.jump_to_index(index, &mut events);
        events.push(SessionEvent::ScrollIntoView(index));
        events
    }

    /// Assigns `speaker` to a clip and to the run of following clips that
    /// shared its previous speaker.
    pub fn set_speaker(&mut self, id: ClipId, speaker: Option<SpeakerId>) -> Result<Events, TimelineError> {
        let index = self.resolve(id)?;
        let mut events = Vec::new();
        if self.timeline.clip_at(index).speaker == speaker {
            return Ok(events);
        }
        let changed = self.timeline.set_speaker_run(index, speaker)?;
        tracing::debug!(clip = %id, clips = changed.len(), "speaker run changed");
        for i in changed.start..=changed.end {
            self.render(i, &mut events);
        }
        self.mark_dirty(&mut events);
        Ok(events)
    }

    pub fn set_begin_paragraph(&mut self, id: ClipId, begin: bool) -> Result<Events, TimelineError> {
        let index = self.resolve(id)?;
        let mut events = Vec::new();
        if self.timeline.set_begin_paragraph(index, begin)? {
            self.render(index, &mut events);
            self.mark_dirty(&mut events);
        }
        Ok(events)
    }

    pub fn add_speaker(&mut self, name: impl Into<String>) -> (SpeakerId, Events) {
        let mut events = vec![SessionEvent::SpeakersChanged];
        let id = self.timeline.add_speaker(name);
        self.mark_dirty(&mut events);
        (id, events)
    }

    pub fn rename_speaker(&mut self, id: SpeakerId, name: impl Into<String>) -> Result<Events, TimelineError> {
        self.timeline.rename_speaker(id, name)?;
        let mut events = vec![SessionEvent::SpeakersChanged];
        self.mark_dirty(&mut events);
        Ok(events)
    }

    /// Toggles playback. Pausing while editing a clip at or before the active
    /// one rewinds to the start of the edited clip.
    pub fn play_pause(&mut self) -> Events {
        let mut events = Vec::new();
        if self.paused {
            self.paused = false;
            events.push(SessionEvent::Play);
        } else {
            self.paused = true;
            events.push(SessionEvent::Pause);
            if let Some(index) = self.focus.index() {
                if index <= self.tracker.active_index() {
                    self.jump_to_index(index, &mut events);
                }
            }
        }
        events
    }

    /// Keeps the session in step with a player that paused or resumed by
    /// itself, e.g. at end of stream.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_rate(&mut self, rate: f64) -> Events {
        if rate.is_finite() && rate > 0.0 {
            vec![SessionEvent::SetRate(rate)]
        } else {
            Vec::new()
        }
    }

    /// Starts a save: snapshots the track and clears the dirty flag. Returns
    /// `None` while another save is still in flight.
    pub fn begin_save(&mut self) -> Option<(SaveBatch, Events)> {
        if self.saving.is_some() {
            return None;
        }
        let batch = SaveBatch::from_track(&self.header, &self.timeline, self.revision);
        self.saving = Some(self.revision);
        let mut events = Vec::new();
        self.set_dirty(false, &mut events);
        Some((batch, events))
    }

    /// Applies the outcome of a save started with [`EditSession::begin_save`].
    /// Edits made meanwhile keep the session dirty; a failure restores the
    /// dirty flag and leaves every local edit in place.
    pub fn finish_save(&mut self, result: Result<SaveReceipt, SaveError>) -> Events {
        let mut events = Vec::new();
        self.saving = None;
        match result {
            Ok(receipt) => {
                self.timeline
                    .assign_remote_ids(&receipt.clip_ids, &receipt.speaker_ids);
                events.push(SessionEvent::Saved);
                let dirty = self.revision != receipt.revision;
                self.set_dirty(dirty, &mut events);
            }
            Err(err) => {
                tracing::warn!(error = %err, "save failed");
                events.push(SessionEvent::SaveFailed(err.to_string()));
                self.set_dirty(true, &mut events);
            }
        }
        events
    }

    /// Saves synchronously through `store`.
    pub fn save(&mut self, store: &mut dyn TranscriptStore) -> Events {
        let Some((batch, mut events)) = self.begin_save() else {
            return Vec::new();
        };
        let result = save_batch(store, &batch);
        events.extend(self.finish_save(result));
        events
    }
}
