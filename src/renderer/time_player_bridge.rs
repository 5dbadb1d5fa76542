use crate::renderer::media_player::MediaPlayer;
use crate::types::session::{EditSession, SessionEvent};
use std::time::{Duration, Instant};

/// Connects a media player to an edit session: forwards time-advance
/// notifications to the session and carries out the player instructions the
/// session emits.
pub struct TranscriptPlayerBridge<P: MediaPlayer> {
    pub player: P,
    tick: Duration,
    last_poll: Option<Instant>,
    last_time: Option<f64>,
    seeked: bool,
    duration_known: bool,
}

impl<P: MediaPlayer> TranscriptPlayerBridge<P> {
    pub fn new(player: P, tick: Duration) -> Self {
        Self {
            player,
            tick,
            last_poll: None,
            last_time: None,
            seeked: false,
            duration_known: false,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Polls the player and returns the session's rendering instructions.
    pub fn update(&mut self, session: &mut EditSession) -> Vec<SessionEvent> {
        self.update_at(session, Instant::now())
    }

    pub fn update_at(&mut self, session: &mut EditSession, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.player.tick();

        if self.player.is_paused() && !session.is_paused() {
            session.set_paused(true);
        }

        if !self.duration_known {
            if let Some(duration) = self.player.duration() {
                self.duration_known = true;
                match session.set_duration(duration) {
                    Ok(filled) => events.extend(filled),
                    Err(err) => tracing::warn!(error = %err, duration, "ignoring media duration"),
                }
            }
        }

        let due = self
            .last_poll
            .is_none_or(|last| now.duration_since(last) >= self.tick);
        if !due && !self.seeked {
            return events;
        }
        self.last_poll = Some(now);

        let time = self.player.current_time();
        if self.seeked || self.last_time != Some(time) {
            self.seeked = false;
            self.last_time = Some(time);
            events.extend(session.on_time_update(time));
        }
        events
    }

    /// Carries out the player instructions among `events`. Other events are
    /// left to the caller.
    pub fn execute(&mut self, events: &[SessionEvent]) {
        for event in events {
            match event {
                SessionEvent::Seek(time) => {
                    self.player.seek(*time);
                    self.seeked = true;
                }
                SessionEvent::Play => self.player.play(),
                SessionEvent::Pause => self.player.pause(),
                SessionEvent::SetRate(rate) => self.player.set_rate(*rate),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::renderer::media_player::ClockPlayer;
    use crate::types::track::Track;

    fn setup() -> (EditSession, TranscriptPlayerBridge<ClockPlayer>) {
        let session = EditSession::new(Track::new("bridge", None), SessionConfig::default());
        let bridge = TranscriptPlayerBridge::new(
            ClockPlayer::new(Some(10.0)),
            Duration::from_millis(250),
        );
        (session, bridge)
    }

    #[test]
    fn test_duration_creates_transcript() {
        let (mut session, mut bridge) = setup();
        let events = bridge.update_at(&mut session, Instant::now());
        assert!(events.contains(&SessionEvent::Reset));
        assert_eq!(session.timeline().len(), 3);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Render { index: 0, .. })));
    }

    #[test]
    fn test_playback_advances_active_clip() {
        let (mut session, mut bridge) = setup();
        let start = Instant::now();
        bridge.update_at(&mut session, start);

        let events = session.play_pause();
        bridge.execute(&events);
        assert!(!bridge.player.is_paused());

        bridge.player.advance_by(5.0);
        // Not due yet: no poll.
        assert!(bridge.update_at(&mut session, start).is_empty());
        bridge.update_at(&mut session, start + Duration::from_millis(250));
        assert_eq!(session.active_index(), 1);

        bridge.player.advance_by(10.0);
        bridge.update_at(&mut session, start + Duration::from_millis(500));
        assert_eq!(session.active_index(), 2);
        // The clock stopped at the end; the session follows.
        assert!(session.is_paused());
    }

    #[test]
    fn test_seek_forces_time_update() {
        let (mut session, mut bridge) = setup();
        let start = Instant::now();
        bridge.update_at(&mut session, start);

        let id = session.timeline().clip_at(2).id;
        let events = session.jump_to_clip(id);
        bridge.execute(&events);
        assert_eq!(bridge.player.current_time(), 8.0);

        let events = bridge.update_at(&mut session, start);
        assert!(events.is_empty());
        assert_eq!(session.active_index(), 2);
        assert_eq!(bridge.tick(), Duration::from_millis(250));
    }
}
