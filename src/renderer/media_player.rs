use gst::prelude::*;
use gstreamer as gst;
use gstreamer_pbutils as gst_pbutils;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("gstreamer init failed: {0}")]
    Init(#[from] gst::glib::Error),
    #[error("could not build playbin: {0}")]
    Build(#[from] gst::glib::BoolError),
    #[error("state change failed: {0}")]
    StateChange(#[from] gst::StateChangeError),
    #[error("cannot open {0}")]
    Path(String),
}

/// Media source the transcript is synchronised against.
pub trait MediaPlayer {
    /// Playback position in seconds.
    fn current_time(&self) -> f64;
    fn seek(&mut self, time: f64);
    /// Media length in seconds, `None` until metadata has loaded.
    fn duration(&self) -> Option<f64>;
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn set_rate(&mut self, rate: f64);
    /// Called once per poll to let the player process pending messages.
    fn tick(&mut self) {}
}

impl<P: MediaPlayer + ?Sized> MediaPlayer for Box<P> {
    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn seek(&mut self, time: f64) {
        (**self).seek(time)
    }

    fn duration(&self) -> Option<f64> {
        (**self).duration()
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn set_rate(&mut self, rate: f64) {
        (**self).set_rate(rate)
    }

    fn tick(&mut self) {
        (**self).tick()
    }
}

#[cfg(windows)]
fn path_to_file_uri(path: &str) -> String {
    let mut path = path.replace("\\", "/");
    if let Some(stripped) = path.strip_prefix("//?/") {
        path = stripped.to_string();
    }
    format!("file:///{}", path)
}

#[cfg(not(windows))]
fn path_to_file_uri(path: &str) -> String {
    format!("file://{}", path)
}

fn file_uri(path: &Path) -> Result<String, PlayerError> {
    let abs_path =
        std::fs::canonicalize(path).map_err(|_| PlayerError::Path(path.display().to_string()))?;
    Ok(path_to_file_uri(&abs_path.to_string_lossy()))
}

/// Media length in seconds, read with the gstreamer discoverer.
pub fn media_duration(path: &Path) -> Option<f64> {
    gst::init().ok()?;
    let uri = file_uri(path).ok()?;
    let discoverer = gst_pbutils::Discoverer::new(gst::ClockTime::from_seconds(5)).ok()?;
    let info = discoverer.discover_uri(&uri).ok()?;
    let duration = info.duration().map(|d| d.nseconds() as f64 / 1e9);
    tracing::debug!(%uri, ?duration, "discovered media duration");
    duration
}

/// Plays an audio or video file through a gstreamer `playbin`.
pub struct GstPlayer {
    playbin: gst::Element,
    paused: bool,
    rate: f64,
    duration: Option<f64>,
}

impl GstPlayer {
    pub fn open(path: &Path) -> Result<Self, PlayerError> {
        gst::init()?;
        let uri = file_uri(path)?;
        let playbin = gst::ElementFactory::make("playbin")
            .property("uri", uri.as_str())
            .build()?;
        playbin.set_state(gst::State::Paused)?;
        tracing::info!(%uri, "opened media");
        Ok(GstPlayer {
            playbin,
            paused: true,
            rate: 1.0,
            duration: media_duration(path),
        })
    }

    fn set_state(&self, state: gst::State) {
        if let Err(err) = self.playbin.set_state(state) {
            tracing::warn!(error = %err, ?state, "playbin state change failed");
        }
    }

    fn apply_rate(&self, position: gst::ClockTime) {
        let result = self.playbin.seek(
            self.rate,
            gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
            gst::SeekType::Set,
            position,
            gst::SeekType::End,
            gst::ClockTime::ZERO,
        );
        if let Err(err) = result {
            tracing::warn!(error = %err, rate = self.rate, "rate change failed");
        }
    }
}

impl MediaPlayer for GstPlayer {
    fn current_time(&self) -> f64 {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map(|pos| pos.nseconds() as f64 / 1e9)
            .unwrap_or(0.0)
    }

    fn seek(&mut self, time: f64) {
        let position = gst::ClockTime::from_nseconds((time.max(0.0) * 1e9) as u64);
        if self.rate == 1.0 {
            let result = self
                .playbin
                .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE, position);
            if let Err(err) = result {
                tracing::warn!(error = %err, time, "seek failed");
            }
        } else {
            self.apply_rate(position);
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration.or_else(|| {
            self.playbin
                .query_duration::<gst::ClockTime>()
                .map(|d| d.nseconds() as f64 / 1e9)
        })
    }

    fn play(&mut self) {
        self.set_state(gst::State::Playing);
        self.paused = false;
    }

    fn pause(&mut self) {
        self.set_state(gst::State::Paused);
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        let position = self
            .playbin
            .query_position::<gst::ClockTime>()
            .unwrap_or(gst::ClockTime::ZERO);
        self.apply_rate(position);
    }

    fn tick(&mut self) {
        let Some(bus) = self.playbin.bus() else {
            return;
        };
        while let Some(msg) = bus.pop() {
            match msg.view() {
                gst::MessageView::Eos(..) => {
                    tracing::debug!("end of stream");
                    self.pause();
                }
                gst::MessageView::Error(err) => {
                    tracing::warn!(error = %err.error(), "playback error");
                    self.pause();
                }
                gst::MessageView::DurationChanged(..) => {
                    self.duration = None;
                }
                _ => {}
            }
        }
    }
}

impl Drop for GstPlayer {
    fn drop(&mut self) {
        self.set_state(gst::State::Null);
    }
}

/// Clock-driven stand-in for a real player, used without media and in tests.
#[derive(Debug, Clone)]
pub struct ClockPlayer {
    position: f64,
    playing: bool,
    rate: f64,
    duration: Option<f64>,
    last_update: Instant,
}

impl ClockPlayer {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            position: 0.0,
            playing: false,
            rate: 1.0,
            duration,
            last_update: Instant::now(),
        }
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = Some(duration);
    }

    /// Moves the playhead as if `secs` of wall time had passed.
    pub fn advance_by(&mut self, secs: f64) {
        if self.playing {
            self.position += secs * self.rate;
        }
        if let Some(duration) = self.duration {
            if self.position >= duration {
                self.position = duration;
                self.playing = false;
            }
        }
    }
}

impl MediaPlayer for ClockPlayer {
    fn current_time(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) {
        let max_time = self.duration.unwrap_or(f64::INFINITY);
        self.position = time.clamp(0.0, max_time);
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn play(&mut self) {
        self.playing = true;
        self.last_update = Instant::now();
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_paused(&self) -> bool {
        !self.playing
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        self.advance_by(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clock_player_advances_only_while_playing() {
        let mut player = ClockPlayer::new(Some(10.0));
        player.advance_by(2.0);
        assert_eq!(player.current_time(), 0.0);
        player.play();
        player.set_rate(1.5);
        player.advance_by(2.0);
        assert_relative_eq!(player.current_time(), 3.0);
        player.pause();
        player.advance_by(2.0);
        assert_relative_eq!(player.current_time(), 3.0);
    }

    #[test]
    fn test_clock_player_stops_at_end() {
        let mut player = ClockPlayer::new(Some(5.0));
        player.seek(4.0);
        player.play();
        player.advance_by(3.0);
        assert_eq!(player.current_time(), 5.0);
        assert!(player.is_paused());
        player.seek(-2.0);
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn test_path_to_file_uri() {
        #[cfg(not(windows))]
        assert_eq!(path_to_file_uri("/tmp/a.mp3"), "file:///tmp/a.mp3");
        assert!(file_uri(Path::new("/definitely/not/here.mp3")).is_err());
    }
}
