use eframe::egui;
use std::collections::HashMap;

use crate::ops::commands::EditorCommand;
use crate::types::clip::SpeakerId;
use crate::types::timeline::Timeline;

/// Window for adding and renaming the speakers of a track.
#[derive(Debug, Default)]
pub struct SpeakerDialog {
    pub open: bool,
    new_name: String,
    names: HashMap<SpeakerId, String>,
}

impl SpeakerDialog {
    /// Reloads the rename buffers from the timeline.
    pub fn refresh(&mut self, timeline: &Timeline) {
        self.names = timeline
            .speakers()
            .iter()
            .map(|speaker| (speaker.id, speaker.name.clone()))
            .collect();
    }

    pub fn show(&mut self, ctx: &egui::Context, timeline: &Timeline) -> Vec<EditorCommand> {
        let mut commands = Vec::new();
        if !self.open {
            return commands;
        }

        let mut open = self.open;
        egui::Window::new("Speakers")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                for speaker in timeline.speakers() {
                    let name = self
                        .names
                        .entry(speaker.id)
                        .or_insert_with(|| speaker.name.clone());
                    ui.horizontal(|ui| {
                        ui.text_edit_singleline(name);
                        let changed = name.trim() != speaker.name && !name.trim().is_empty();
                        if ui.add_enabled(changed, egui::Button::new("Rename")).clicked() {
                            commands.push(EditorCommand::RenameSpeaker {
                                id: speaker.id,
                                name: name.trim().to_string(),
                            });
                        }
                    });
                }

                ui.separator();
                ui.horizontal(|ui| {
                    let input = ui.text_edit_singleline(&mut self.new_name);
                    let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    let valid = !self.new_name.trim().is_empty();
                    if (ui.add_enabled(valid, egui::Button::new("Add speaker")).clicked() || submitted)
                        && valid
                    {
                        commands.push(EditorCommand::AddSpeaker(self.new_name.trim().to_string()));
                        self.new_name.clear();
                    }
                });
            });
        self.open = open;
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_tracks_speakers() {
        let mut timeline = Timeline::new();
        let host = timeline.add_speaker("Host");
        let mut dialog = SpeakerDialog::default();
        dialog.refresh(&timeline);
        assert_eq!(dialog.names.get(&host).map(String::as_str), Some("Host"));

        timeline.rename_speaker(host, "Anchor").unwrap();
        dialog.refresh(&timeline);
        assert_eq!(dialog.names.get(&host).map(String::as_str), Some("Anchor"));
    }

    #[test]
    fn test_closed_dialog_issues_nothing() {
        let ctx = egui::Context::default();
        let mut dialog = SpeakerDialog::default();
        let mut commands = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            commands = dialog.show(ctx, &Timeline::new());
        });
        assert!(commands.is_empty());
    }
}
