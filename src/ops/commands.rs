use crate::error::TimelineError;
use crate::types::clip::{ClipId, SpeakerId};
use crate::types::session::{Direction, EditSession, SessionEvent};

/// Every operation the front end can ask of an edit session. Raw input is
/// decoded into one of these exactly once, at the UI boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    Split,
    Join,
    /// Sentence terminator, `.` or `?`.
    SentenceBreak(char),
    Comma,
    MoveFocusUp,
    MoveFocusDown,
    PlayPause,
    JumpToClip(ClipId),
    EditClip { id: ClipId, give_focus: bool },
    SetText { id: ClipId, text: String },
    SetCaret(usize),
    Blur,
    SkipUnedited(Direction),
    SetSpeaker { id: ClipId, speaker: Option<SpeakerId> },
    SetBeginParagraph { id: ClipId, begin: bool },
    AddSpeaker(String),
    RenameSpeaker { id: SpeakerId, name: String },
    DeleteClip,
    SetRate(f64),
}

impl EditSession {
    /// Runs one command against the session.
    pub fn apply(&mut self, command: EditorCommand) -> Result<Vec<SessionEvent>, TimelineError> {
        tracing::trace!(?command, "apply");
        match command {
            EditorCommand::Split => self.split(),
            EditorCommand::Join => self.join(),
            EditorCommand::SentenceBreak(ch) => self.insert_sentence_break(ch),
            EditorCommand::Comma => self.insert_comma(),
            EditorCommand::MoveFocusUp => Ok(self.move_focus_up()),
            EditorCommand::MoveFocusDown => Ok(self.move_focus_down()),
            EditorCommand::PlayPause => Ok(self.play_pause()),
            EditorCommand::JumpToClip(id) => Ok(self.jump_to_clip(id)),
            EditorCommand::EditClip { id, give_focus } => self.edit_clip(id, give_focus),
            EditorCommand::SetText { id, text } => self.set_text(id, text),
            EditorCommand::SetCaret(caret) => self.set_caret(caret).map(|_| Vec::new()),
            EditorCommand::Blur => Ok(self.blur()),
            EditorCommand::SkipUnedited(direction) => Ok(self.skip_unedited(direction)),
            EditorCommand::SetSpeaker { id, speaker } => self.set_speaker(id, speaker),
            EditorCommand::SetBeginParagraph { id, begin } => self.set_begin_paragraph(id, begin),
            EditorCommand::AddSpeaker(name) => Ok(self.add_speaker(name).1),
            EditorCommand::RenameSpeaker { id, name } => self.rename_speaker(id, name),
            EditorCommand::DeleteClip => self.delete_focused(),
            EditorCommand::SetRate(rate) => Ok(self.set_rate(rate)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::types::clip::Clip;
    use crate::types::session::Focus;
    use crate::types::timeline::Timeline;
    use crate::types::track::Track;

    fn session() -> EditSession {
        let mut track = Track::new("commands", None);
        track.timeline = Timeline::from_parts(
            vec![
                Clip::new(0.0, 4.0, "hello world"),
                Clip::new(4.0, 8.0, "second"),
            ],
            vec![],
        );
        EditSession::new(track, SessionConfig::default())
    }

    #[test]
    fn test_typing_sequence() {
        let mut session = session();
        let first = session.timeline().clip_at(0).id;

        session
            .apply(EditorCommand::EditClip {
                id: first,
                give_focus: true,
            })
            .unwrap();
        session.apply(EditorCommand::SetCaret(5)).unwrap();
        session.apply(EditorCommand::SentenceBreak('?')).unwrap();
        assert_eq!(session.timeline().clip_at(0).text, "hello? World");

        session.apply(EditorCommand::Split).unwrap();
        assert_eq!(session.timeline().len(), 3);
        assert_eq!(session.focus(), Focus::FocusedAt { index: 1, caret: 0 });

        session.apply(EditorCommand::Join).unwrap();
        assert_eq!(session.timeline().len(), 2);
        assert_eq!(session.timeline().clip_at(0).text, "hello? World");
        assert!(session.timeline().is_consistent());

        assert_eq!(session.apply(EditorCommand::Blur).unwrap(), vec![SessionEvent::Blur]);
        assert_eq!(session.focus(), Focus::Unfocused);
    }

    #[test]
    fn test_errors_surface_from_apply() {
        let mut session = session();
        let stranger = ClipId::new();
        assert_eq!(
            session.apply(EditorCommand::SetText {
                id: stranger,
                text: "x".into()
            }),
            Err(TimelineError::NotAMember(stranger))
        );
    }

    #[test]
    fn test_rate_and_speaker_commands() {
        let mut session = session();
        assert_eq!(
            session.apply(EditorCommand::SetRate(1.5)).unwrap(),
            vec![SessionEvent::SetRate(1.5)]
        );
        assert!(session.apply(EditorCommand::SetRate(0.0)).unwrap().is_empty());

        session.apply(EditorCommand::AddSpeaker("Guest".into())).unwrap();
        assert_eq!(session.timeline().speakers().len(), 2);
        let guest = session.timeline().speakers()[1].id;
        let second = session.timeline().clip_at(1).id;
        session
            .apply(EditorCommand::SetSpeaker {
                id: second,
                speaker: Some(guest),
            })
            .unwrap();
        assert_eq!(session.timeline().clip_at(1).speaker, Some(guest));
        assert_eq!(session.timeline().clip_at(0).speaker, None);
    }
}
