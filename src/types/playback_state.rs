use crate::error::TrackerError;
use crate::types::timeline::Timeline;

/// How far playback may fall behind a just-jumped-to clip before the tracker
/// follows it backwards.
pub const DEFAULT_JUMP_TOLERANCE: f64 = 1.0;

/// Change of the active clip reported by the tracker. The previous clip must
/// be marked inactive before the current one is marked active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveChange {
    pub previous: Option<usize>,
    pub current: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub change: Option<ActiveChange>,
    /// Whether the caller may scroll the active clip into view.
    pub auto_scroll: bool,
}

/// Resolves which clip is "playing" from the player's reported time.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTracker {
    active_index: usize,
    just_selected: Option<usize>,
    resolved: bool,
    jump_tolerance: f64,
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_JUMP_TOLERANCE)
    }

    pub fn with_tolerance(jump_tolerance: f64) -> Self {
        PlaybackTracker {
            active_index: 0,
            just_selected: None,
            resolved: false,
            jump_tolerance,
        }
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn just_selected(&self) -> Option<usize> {
        self.just_selected
    }

    /// Handles a time-advance notification at time `t`.
    pub fn on_time_update(
        &mut self,
        timeline: &Timeline,
        t: f64,
        editing: bool,
    ) -> Result<Resolution, TrackerError> {
        let previous = self.active_index;
        let mut cur = timeline
            .get(self.active_index)
            .ok_or(TrackerError::StaleIndex {
                index: self.active_index,
                len: timeline.len(),
            })?;

        if cur.is_active_at(t) {
            // in place
        } else if t >= cur.out_time
            && timeline
                .get(self.active_index + 1)
                .is_some_and(|next| t >= next.in_time)
        {
            while t >= cur.out_time && self.active_index + 1 < timeline.len() {
                self.active_index += 1;
                cur = timeline.clip_at(self.active_index);
            }
            self.just_selected = None;
        } else if t < cur.in_time
            && self.active_index > 0
            && (self.just_selected.is_none() || cur.in_time - t > self.jump_tolerance)
        {
            while t < cur.in_time && self.active_index > 0 {
                self.active_index -= 1;
                cur = timeline.clip_at(self.active_index);
            }
            self.just_selected = None;
        }

        let change = if !self.resolved {
            self.resolved = true;
            Some(ActiveChange {
                previous: None,
                current: self.active_index,
            })
        } else if previous != self.active_index {
            Some(ActiveChange {
                previous: Some(previous),
                current: self.active_index,
            })
        } else {
            None
        };

        Ok(Resolution {
            change,
            auto_scroll: self.just_selected.is_none() && !editing,
        })
    }

    /// Makes `index` active after an explicit jump and returns the time the
    /// player should seek to.
    pub fn jump_to_index(&mut self, timeline: &Timeline, index: usize) -> f64 {
        let seek = timeline.clip_at(index).in_time;
        tracing::debug!(index, seek, "jump to clip");
        self.active_index = index;
        self.just_selected = Some(index);
        self.resolved = true;
        seek
    }

    /// Re-bases indices after a clip was inserted at `index`.
    pub fn clip_inserted(&mut self, index: usize) {
        if self.active_index >= index {
            self.active_index += 1;
        }
        if let Some(selected) = self.just_selected.as_mut() {
            if *selected >= index {
                *selected += 1;
            }
        }
    }

    /// Re-bases indices after the clip at `index` was removed. A removed
    /// active clip hands over to its predecessor.
    pub fn clip_removed(&mut self, index: usize) {
        if self.active_index > index || (self.active_index == index && index > 0) {
            self.active_index -= 1;
        }
        self.just_selected = match self.just_selected {
            Some(selected) if selected == index => None,
            Some(selected) if selected > index => Some(selected - 1),
            other => other,
        };
    }
}

impl Default for PlaybackTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::clip::Clip;

    fn timeline(n: usize, length: f64) -> Timeline {
        Timeline::from_parts(
            (0..n)
                .map(|i| Clip::new(i as f64 * length, (i + 1) as f64 * length, format!("clip {}", i)))
                .collect(),
            vec![],
        )
    }

    #[test]
    fn test_first_resolution_reports_change() {
        let tl = timeline(3, 4.0);
        let mut tracker = PlaybackTracker::new();
        let res = tracker.on_time_update(&tl, 0.5, false).unwrap();
        assert_eq!(
            res.change,
            Some(ActiveChange {
                previous: None,
                current: 0
            })
        );
        assert!(res.auto_scroll);
        let res = tracker.on_time_update(&tl, 1.0, false).unwrap();
        assert_eq!(res.change, None);
    }

    #[test]
    fn test_forward_playback_is_monotonic_and_contained() {
        let tl = timeline(5, 4.0);
        let mut tracker = PlaybackTracker::new();
        let mut last = 0;
        let mut t = 0.0;
        while t < 20.0 {
            tracker.on_time_update(&tl, t, false).unwrap();
            let index = tracker.active_index();
            assert!(index >= last);
            assert!(tl.clip_at(index).is_active_at(t), "t={} index={}", t, index);
            last = index;
            t += 0.25;
        }
        tracker.on_time_update(&tl, 25.0, false).unwrap();
        assert_eq!(tracker.active_index(), 4);
    }

    #[test]
    fn test_boundary_time_belongs_to_later_clip() {
        let tl = timeline(3, 4.0);
        let mut tracker = PlaybackTracker::new();
        tracker.on_time_update(&tl, 1.0, false).unwrap();
        let res = tracker.on_time_update(&tl, 4.0, false).unwrap();
        assert_eq!(
            res.change,
            Some(ActiveChange {
                previous: Some(0),
                current: 1
            })
        );
    }

    #[test]
    fn test_forward_seek_skips_several_clips() {
        let tl = timeline(6, 4.0);
        let mut tracker = PlaybackTracker::new();
        tracker.on_time_update(&tl, 0.0, false).unwrap();
        tracker.on_time_update(&tl, 17.0, false).unwrap();
        assert_eq!(tracker.active_index(), 4);
    }

    #[test]
    fn test_forward_drift_into_gap_is_ignored() {
        let tl = Timeline::from_parts(
            vec![Clip::new(0.0, 4.0, "a"), Clip::new(6.0, 8.0, "b")],
            vec![],
        );
        let mut tracker = PlaybackTracker::new();
        tracker.on_time_update(&tl, 1.0, false).unwrap();
        tracker.on_time_update(&tl, 5.0, false).unwrap();
        assert_eq!(tracker.active_index(), 0);
        tracker.on_time_update(&tl, 6.5, false).unwrap();
        assert_eq!(tracker.active_index(), 1);
    }

    #[test]
    fn test_backward_seek_without_jump() {
        let tl = timeline(5, 4.0);
        let mut tracker = PlaybackTracker::new();
        tracker.on_time_update(&tl, 18.0, false).unwrap();
        assert_eq!(tracker.active_index(), 4);
        tracker.on_time_update(&tl, 15.5, false).unwrap();
        assert_eq!(tracker.active_index(), 3);
        tracker.on_time_update(&tl, 2.0, false).unwrap();
        assert_eq!(tracker.active_index(), 0);
    }

    #[test]
    fn test_hysteresis_after_jump() {
        let tl = timeline(5, 4.0);
        let mut tracker = PlaybackTracker::new();
        let seek = tracker.jump_to_index(&tl, 2);
        assert_eq!(seek, 8.0);
        assert_eq!(tracker.just_selected(), Some(2));

        // Player still reports a slightly earlier time right after the seek.
        let res = tracker.on_time_update(&tl, 7.2, false).unwrap();
        assert_eq!(res.change, None);
        assert!(!res.auto_scroll);
        assert_eq!(tracker.active_index(), 2);
        tracker.on_time_update(&tl, 7.0, false).unwrap();
        assert_eq!(tracker.active_index(), 2);

        // A larger regression is a real seek backwards.
        let res = tracker.on_time_update(&tl, 6.5, false).unwrap();
        assert_eq!(tracker.active_index(), 1);
        assert_eq!(tracker.just_selected(), None);
        assert_eq!(
            res.change,
            Some(ActiveChange {
                previous: Some(2),
                current: 1
            })
        );
    }

    #[test]
    fn test_forward_progress_clears_just_selected() {
        let tl = timeline(5, 4.0);
        let mut tracker = PlaybackTracker::new();
        tracker.jump_to_index(&tl, 1);
        tracker.on_time_update(&tl, 5.0, false).unwrap();
        assert_eq!(tracker.just_selected(), Some(1));
        tracker.on_time_update(&tl, 8.1, false).unwrap();
        assert_eq!(tracker.active_index(), 2);
        assert_eq!(tracker.just_selected(), None);
    }

    #[test]
    fn test_auto_scroll_suppressed_while_editing() {
        let tl = timeline(3, 4.0);
        let mut tracker = PlaybackTracker::new();
        let res = tracker.on_time_update(&tl, 5.0, true).unwrap();
        assert!(!res.auto_scroll);
    }

    #[test]
    fn test_stale_index_is_reported() {
        let mut tl = timeline(3, 4.0);
        let mut tracker = PlaybackTracker::new();
        tracker.on_time_update(&tl, 10.0, false).unwrap();
        assert_eq!(tracker.active_index(), 2);
        let last = tl.clip_at(2).id;
        tl.remove(last);
        assert_eq!(
            tracker.on_time_update(&tl, 10.0, false),
            Err(TrackerError::StaleIndex { index: 2, len: 2 })
        );
        tracker.jump_to_index(&tl, 1);
        assert!(tracker.on_time_update(&tl, 5.0, false).is_ok());
    }

    #[test]
    fn test_rebase_after_structural_edits() {
        let mut tracker = PlaybackTracker::new();
        let tl = timeline(5, 4.0);
        tracker.jump_to_index(&tl, 3);
        tracker.clip_inserted(1);
        assert_eq!(tracker.active_index(), 4);
        assert_eq!(tracker.just_selected(), Some(4));
        tracker.clip_removed(4);
        assert_eq!(tracker.active_index(), 3);
        assert_eq!(tracker.just_selected(), None);
        tracker.clip_removed(0);
        assert_eq!(tracker.active_index(), 2);
    }
}
