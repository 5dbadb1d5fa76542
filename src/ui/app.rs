use std::fs::File;
use std::io::BufWriter;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use eframe::egui;

use crate::error::{ExportError, SaveError, SaveStep, StoreError};
use crate::ops::clip_ops::format_timecode;
use crate::ops::commands::EditorCommand;
use crate::ops::store::{JsonFileStore, SaveReceipt, save_batch};
use crate::ops::transcript::{write_html, write_plaintext};
use crate::ops::vtt::write_vtt;
use crate::renderer::media_player::MediaPlayer;
use crate::renderer::time_player_bridge::TranscriptPlayerBridge;
use crate::types::session::{Direction, EditSession, Focus, SessionEvent};
use crate::ui::caption_list::CaptionList;
use crate::ui::speaker_dialog::SpeakerDialog;

const RATES: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// File formats the track can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Vtt,
    Text,
    Html,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Vtt, ExportFormat::Text, ExportFormat::Html];

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Vtt => "WebVTT",
            ExportFormat::Text => "Plain text",
            ExportFormat::Html => "HTML",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Vtt => "vtt",
            ExportFormat::Text => "txt",
            ExportFormat::Html => "html",
        }
    }

    pub fn write<W: std::io::Write>(self, session: &EditSession, out: W) -> Result<(), ExportError> {
        let timeline = session.timeline();
        match self {
            ExportFormat::Vtt => write_vtt(timeline, out)?,
            ExportFormat::Text => write_plaintext(timeline, out)?,
            ExportFormat::Html => write_html(timeline, &session.header().name, out)?,
        }
        Ok(())
    }
}

/// What the keyboard decoder needs to know about the focused caption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyContext {
    pub editing: bool,
    pub caret_at_start: bool,
    pub caret_at_end: bool,
}

impl KeyContext {
    pub fn from_session(session: &EditSession) -> Self {
        match session.focus() {
            Focus::Unfocused => KeyContext::default(),
            Focus::FocusedAt { index, caret } => {
                let len = session
                    .timeline()
                    .get(index)
                    .map(|clip| clip.text_len())
                    .unwrap_or(0);
                KeyContext {
                    editing: true,
                    caret_at_start: caret == 0,
                    caret_at_end: caret >= len,
                }
            }
        }
    }
}

/// Maps one raw input event to an editor command. Events that map to a
/// command are consumed before any widget sees them.
pub fn decode_event(event: &egui::Event, keys: KeyContext) -> Option<EditorCommand> {
    match event {
        egui::Event::Text(text) if keys.editing => match text.as_str() {
            "." => Some(EditorCommand::SentenceBreak('.')),
            "?" => Some(EditorCommand::SentenceBreak('?')),
            "," => Some(EditorCommand::Comma),
            _ => None,
        },
        egui::Event::Key {
            key,
            pressed: true,
            modifiers,
            ..
        } => decode_key(*key, *modifiers, keys),
        _ => None,
    }
}

fn decode_key(key: egui::Key, modifiers: egui::Modifiers, keys: KeyContext) -> Option<EditorCommand> {
    use egui::Key;
    match key {
        Key::Tab if modifiers.shift => Some(EditorCommand::MoveFocusUp),
        Key::Tab => Some(EditorCommand::MoveFocusDown),
        Key::N if modifiers.ctrl => Some(EditorCommand::MoveFocusDown),
        Key::P if modifiers.ctrl => Some(EditorCommand::MoveFocusUp),
        Key::ArrowDown => Some(EditorCommand::MoveFocusDown),
        Key::ArrowUp => Some(EditorCommand::MoveFocusUp),
        Key::Space if !keys.editing || modifiers.ctrl => Some(EditorCommand::PlayPause),
        Key::Enter if keys.editing => Some(EditorCommand::Split),
        Key::Backspace if keys.editing && (modifiers.ctrl || keys.caret_at_start) => Some(EditorCommand::Join),
        Key::ArrowRight if keys.editing && keys.caret_at_end => Some(EditorCommand::MoveFocusDown),
        Key::ArrowLeft if keys.editing && keys.caret_at_start => Some(EditorCommand::MoveFocusUp),
        _ => None,
    }
}

pub struct AppState {
    pub session: EditSession,
    pub bridge: TranscriptPlayerBridge<Box<dyn MediaPlayer>>,
    pub store: JsonFileStore,
    pub caption_list: CaptionList,
    pub speaker_dialog: SpeakerDialog,
    pub rate: f64,
    pub status: Option<String>,
    save_rx: Option<Receiver<Result<SaveReceipt, SaveError>>>,
}

impl AppState {
    pub fn new(
        session: EditSession,
        bridge: TranscriptPlayerBridge<Box<dyn MediaPlayer>>,
        store: JsonFileStore,
    ) -> Self {
        let caption_list = CaptionList::new(&session);
        let mut speaker_dialog = SpeakerDialog::default();
        speaker_dialog.refresh(session.timeline());
        Self {
            session,
            bridge,
            store,
            caption_list,
            speaker_dialog,
            rate: 1.0,
            status: None,
            save_rx: None,
        }
    }
}

pub struct SpindleApp {
    pub state: AppState,
}

impl SpindleApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn run(&mut self, command: EditorCommand) {
        match self.state.session.apply(command) {
            Ok(events) => self.handle(events),
            Err(err) => {
                tracing::warn!(error = %err, "command rejected");
                self.state.status = Some(err.to_string());
            }
        }
    }

    /// Routes session events to the player, the caption rows and the
    /// status line.
    pub fn handle(&mut self, events: Vec<SessionEvent>) {
        if events.is_empty() {
            return;
        }
        let state = &mut self.state;
        state.bridge.execute(&events);
        state.caption_list.apply_events(&state.session, &events);
        for event in &events {
            match event {
                SessionEvent::SpeakersChanged => state.speaker_dialog.refresh(state.session.timeline()),
                SessionEvent::SetRate(rate) => state.rate = *rate,
                SessionEvent::Saved => state.status = Some("Saved".to_string()),
                SessionEvent::SaveFailed(message) => state.status = Some(format!("Save failed: {}", message)),
                _ => {}
            }
        }
    }

    fn start_save(&mut self) {
        let Some((batch, events)) = self.state.session.begin_save() else {
            return;
        };
        self.handle(events);
        let (tx, rx) = mpsc::channel();
        let mut store = self.state.store.clone();
        std::thread::spawn(move || {
            let _ = tx.send(save_batch(&mut store, &batch));
        });
        self.state.save_rx = Some(rx);
        self.state.status = Some("Saving…".to_string());
    }

    fn poll_save(&mut self) {
        let Some(rx) = &self.state.save_rx else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(SaveError {
                step: SaveStep::Track,
                source: StoreError::Rejected {
                    kind: "track",
                    reason: "save worker stopped".to_string(),
                },
            }),
        };
        self.state.save_rx = None;
        let events = self.state.session.finish_save(result);
        self.handle(events);
    }

    fn export(&mut self, format: ExportFormat) {
        let header = self.state.session.header();
        let Some(path) = rfd::FileDialog::new()
            .add_filter(format.label(), &[format.extension()])
            .set_file_name(format!("{}.{}", header.name, format.extension()))
            .save_file()
        else {
            return;
        };
        let result = File::create(&path)
            .map_err(ExportError::from)
            .and_then(|file| format.write(&self.state.session, BufWriter::new(file)));
        self.state.status = Some(match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), ?format, "exported transcript");
                format!("Exported {}", path.display())
            }
            Err(err) => {
                tracing::warn!(error = %err, ?format, "export failed");
                format!("Export failed: {}", err)
            }
        });
    }
}

impl eframe::App for SpindleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let events = self.state.bridge.update(&mut self.state.session);
        self.handle(events);
        self.poll_save();

        let keys = KeyContext::from_session(&self.state.session);
        let commands = ctx.input_mut(|input| {
            let mut commands = Vec::new();
            input.events.retain(|event| match decode_event(event, keys) {
                Some(command) => {
                    commands.push(command);
                    false
                }
                None => true,
            });
            commands
        });
        for command in commands {
            self.run(command);
        }

        let mut commands = Vec::new();
        let mut save_clicked = false;
        let mut export_clicked = None;

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let session = &self.state.session;
                if ui
                    .button(if session.is_paused() { "Play" } else { "Pause" })
                    .clicked()
                {
                    commands.push(EditorCommand::PlayPause);
                }
                if ui.button("⏮ Unedited").clicked() {
                    commands.push(EditorCommand::SkipUnedited(Direction::Backward));
                }
                if ui.button("Unedited ⏭").clicked() {
                    commands.push(EditorCommand::SkipUnedited(Direction::Forward));
                }

                egui::ComboBox::from_id_salt("playback_rate")
                    .selected_text(format!("{}×", self.state.rate))
                    .show_ui(ui, |ui| {
                        for rate in RATES {
                            if ui
                                .selectable_label(self.state.rate == rate, format!("{}×", rate))
                                .clicked()
                            {
                                commands.push(EditorCommand::SetRate(rate));
                            }
                        }
                    });

                ui.separator();
                let save_label = if session.is_saving() { "Saving…" } else { "Save" };
                if ui
                    .add_enabled(session.is_dirty() && !session.is_saving(), egui::Button::new(save_label))
                    .clicked()
                {
                    save_clicked = true;
                }
                ui.menu_button("Export", |ui| {
                    for format in ExportFormat::ALL {
                        if ui.button(format.label()).clicked() {
                            export_clicked = Some(format);
                            ui.close_menu();
                        }
                    }
                });
                if ui.button("Speakers…").clicked() {
                    self.state.speaker_dialog.open = true;
                }
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let session = &self.state.session;
                ui.label(format_timecode(self.state.bridge.player.current_time()));
                ui.separator();
                ui.label(session.stats().to_string());
                if session.is_dirty() {
                    ui.label(egui::RichText::new("unsaved").weak());
                }
                if let Some(status) = &self.state.status {
                    ui.separator();
                    ui.label(status);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let state = &mut self.state;
            commands.extend(state.caption_list.show(ui, &state.session));
        });

        if std::mem::take(&mut self.state.caption_list.wants_speaker_dialog) {
            self.state.speaker_dialog.open = true;
        }
        commands.extend(
            self.state
                .speaker_dialog
                .show(ctx, self.state.session.timeline()),
        );

        for command in commands {
            self.run(command);
        }
        if save_clicked {
            self.start_save();
        }
        if let Some(format) = export_clicked {
            self.export(format);
        }

        ctx.request_repaint_after(self.state.bridge.tick());
    }
}
