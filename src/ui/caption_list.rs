use eframe::egui;
use std::collections::HashMap;

use crate::ops::clip_ops::format_timecode;
use crate::ops::commands::EditorCommand;
use crate::types::clip::ClipId;
use crate::types::session::{ClipFlags, EditSession, SessionEvent};

/// View-side data for one clip row. Keyed by clip identity and dropped as
/// soon as the clip leaves the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RowState {
    pub text: String,
    pub timecode: String,
    pub flags: ClipFlags,
}

impl RowState {
    fn from_session(session: &EditSession, index: usize) -> Self {
        let clip = session.timeline().clip_at(index);
        RowState {
            text: clip.text.clone(),
            timecode: format_timecode(clip.in_time),
            flags: session.flags(index),
        }
    }
}

/// Caption rows of the current track.
#[derive(Debug, Default)]
pub struct CaptionList {
    rows: HashMap<ClipId, RowState>,
    pending_focus: Option<(ClipId, usize)>,
    scroll_to: Option<ClipId>,
    /// Set when the speaker selector asked for the speaker dialog.
    pub wants_speaker_dialog: bool,
}

fn text_id(id: ClipId) -> egui::Id {
    egui::Id::new(("caption_text", id))
}

impl CaptionList {
    pub fn new(session: &EditSession) -> Self {
        let mut list = CaptionList::default();
        list.rebuild(session);
        list
    }

    pub fn rebuild(&mut self, session: &EditSession) {
        self.rows = (0..session.timeline().len())
            .map(|i| (session.timeline().clip_at(i).id, RowState::from_session(session, i)))
            .collect();
    }

    pub fn row(&self, id: ClipId) -> Option<&RowState> {
        self.rows.get(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Applies rendering instructions emitted by the session.
    pub fn apply_events(&mut self, session: &EditSession, events: &[SessionEvent]) {
        let timeline = session.timeline();
        for event in events {
            match event {
                SessionEvent::Render { index, flags } => {
                    if let Some(clip) = timeline.get(*index) {
                        let row = self
                            .rows
                            .entry(clip.id)
                            .or_insert_with(|| RowState::from_session(session, *index));
                        row.flags = *flags;
                        row.text.clone_from(&clip.text);
                        row.timecode = format_timecode(clip.in_time);
                    }
                }
                SessionEvent::Inserted { index, id } => {
                    self.rows.insert(*id, RowState::from_session(session, *index));
                }
                SessionEvent::Removed { id } => {
                    self.rows.remove(id);
                }
                SessionEvent::Reset => self.rebuild(session),
                SessionEvent::Focus { index, caret } => {
                    if let Some(clip) = timeline.get(*index) {
                        self.pending_focus = Some((clip.id, *caret));
                    }
                }
                SessionEvent::Blur => self.pending_focus = None,
                SessionEvent::ScrollIntoView(index) => {
                    self.scroll_to = timeline.get(*index).map(|clip| clip.id);
                }
                _ => {}
            }
        }
    }

    fn apply_focus(ui: &egui::Ui, id: ClipId, caret: usize) {
        let text_id = text_id(id);
        let mut state = egui::text_edit::TextEditState::load(ui.ctx(), text_id).unwrap_or_default();
        let ccursor = egui::text::CCursor::new(caret);
        state
            .cursor
            .set_char_range(Some(egui::text::CCursorRange::one(ccursor)));
        state.store(ui.ctx(), text_id);
        ui.memory_mut(|mem| mem.request_focus(text_id));
    }

    /// Draws every row and returns the commands the operator issued.
    pub fn show(&mut self, ui: &mut egui::Ui, session: &EditSession) -> Vec<EditorCommand> {
        let mut commands = Vec::new();
        let timeline = session.timeline();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for clip in timeline.clips() {
                    let id = clip.id;
                    let Some(row) = self.rows.get_mut(&id) else {
                        continue;
                    };

                    if row.flags.begin_paragraph {
                        ui.add_space(8.0);
                    }

                    let frame = if row.flags.active {
                        egui::Frame::NONE.fill(ui.visuals().selection.bg_fill.gamma_multiply(0.35))
                    } else {
                        egui::Frame::NONE
                    };

                    let response = frame
                        .show(ui, |ui| {
                            ui.horizontal(|ui| {
                                let timecode = egui::RichText::new(&row.timecode).monospace().color(
                                    if row.flags.edited {
                                        ui.visuals().strong_text_color()
                                    } else {
                                        egui::Color32::GRAY
                                    },
                                );
                                if ui.add(egui::Button::new(timecode).frame(false)).clicked() {
                                    commands.push(EditorCommand::JumpToClip(id));
                                }

                                let mut begin = row.flags.begin_paragraph;
                                if ui.toggle_value(&mut begin, "¶").changed() {
                                    commands.push(EditorCommand::SetBeginParagraph { id, begin });
                                }

                                let name = clip
                                    .speaker
                                    .and_then(|speaker| timeline.speaker(speaker))
                                    .map(|speaker| speaker.name.as_str())
                                    .unwrap_or("(none)");
                                let selected = if row.flags.speaker_change {
                                    egui::RichText::new(name).strong()
                                } else {
                                    egui::RichText::new(name).weak()
                                };
                                egui::ComboBox::from_id_salt(("caption_speaker", id))
                                    .selected_text(selected)
                                    .width(110.0)
                                    .show_ui(ui, |ui| {
                                        for speaker in timeline.speakers() {
                                            let current = clip.speaker == Some(speaker.id);
                                            if ui.selectable_label(current, &speaker.name).clicked() && !current {
                                                commands.push(EditorCommand::SetSpeaker {
                                                    id,
                                                    speaker: Some(speaker.id),
                                                });
                                            }
                                        }
                                        ui.separator();
                                        if ui.selectable_label(false, "Edit speakers…").clicked() {
                                            self.wants_speaker_dialog = true;
                                        }
                                    });

                                let output = egui::TextEdit::singleline(&mut row.text)
                                    .id(text_id(id))
                                    .desired_width(f32::INFINITY)
                                    .show(ui);
                                if output.response.gained_focus() {
                                    commands.push(EditorCommand::EditClip {
                                        id,
                                        give_focus: false,
                                    });
                                }
                                if output.response.changed() {
                                    commands.push(EditorCommand::SetText {
                                        id,
                                        text: row.text.clone(),
                                    });
                                }
                                if output.response.has_focus() {
                                    if let Some(range) = output.cursor_range {
                                        commands.push(EditorCommand::SetCaret(range.primary.ccursor.index));
                                    }
                                }
                                // Focus moving to another row is not a blur.
                                if output.response.lost_focus() && ui.memory(|mem| mem.focused()).is_none() {
                                    commands.push(EditorCommand::Blur);
                                }
                            });
                        })
                        .response;

                    if self.scroll_to == Some(id) {
                        response.scroll_to_me(Some(egui::Align::Center));
                        self.scroll_to = None;
                    }
                    if let Some((focus_id, caret)) = self.pending_focus {
                        if focus_id == id {
                            Self::apply_focus(ui, id, caret);
                            self.pending_focus = None;
                        }
                    }
                }
            });

        commands
    }
}
