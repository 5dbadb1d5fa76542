use clap::Parser;
use eframe::egui;
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use clipscribe::config::EditorConfig;
use clipscribe::ops::store::JsonFileStore;
use clipscribe::ops::vtt::{cues_to_timeline, read_vtt};
use clipscribe::renderer::media_player::{ClockPlayer, GstPlayer, MediaPlayer};
use clipscribe::renderer::time_player_bridge::TranscriptPlayerBridge;
use clipscribe::types::session::EditSession;
use clipscribe::types::track::Track;
use clipscribe::ui::app::{AppState, SpindleApp};

fn load_track(config: &EditorConfig, store: &JsonFileStore) -> Result<Track, Box<dyn Error>> {
    let media_path = config
        .media
        .as_ref()
        .map(|path| path.to_string_lossy().to_string());

    let mut track = if let Some(id) = &config.track {
        store.load(id)?
    } else if let Some(path) = &config.import_vtt {
        let input = std::fs::read_to_string(path)?;
        let cues = read_vtt(&input)?;
        tracing::info!(path = %path.display(), cues = cues.len(), "imported captions");
        let mut track = Track::new(&config.name, media_path.clone());
        track.timeline = cues_to_timeline(cues);
        track
    } else {
        Track::new(&config.name, media_path.clone())
    };

    if media_path.is_some() {
        track.header.media_path = media_path;
    }
    Ok(track)
}

fn open_player(config: &EditorConfig, track: &Track) -> Box<dyn MediaPlayer> {
    let fallback_duration = config.duration.or(track.header.duration);
    match track.header.media_path.as_ref().map(PathBuf::from) {
        Some(path) => match GstPlayer::open(&path) {
            Ok(player) => Box::new(player),
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "falling back to simulated clock");
                Box::new(ClockPlayer::new(fallback_duration))
            }
        },
        None => Box::new(ClockPlayer::new(fallback_duration)),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EditorConfig::parse();
    let store = JsonFileStore::new(&config.store);
    let track = load_track(&config, &store)?;
    tracing::info!(track = track.id(), name = %track.header.name, "opening track");

    let title = format!("{} - clipscribe", track.header.name);
    let player = open_player(&config, &track);
    let session = EditSession::new(track, config.session());
    let bridge = TranscriptPlayerBridge::new(player, config.tick());

    let mut app = SpindleApp::new(AppState::new(session, bridge, store));
    let events = app.state.session.set_rate(config.rate);
    app.handle(events);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(title)
            .with_inner_size([960.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "clipscribe",
        native_options,
        Box::new(|_cc| Ok(Box::new(app))),
    )?;
    Ok(())
}
