use askama::Template;
use std::io::{self, Write};

use crate::error::ExportError;
use crate::types::clip::SpeakerId;
use crate::types::timeline::Timeline;

/// Run of text opened by a speaker change, or the leading run of a paragraph
/// when the speaker stayed the same.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    /// Speaker name, set only where the speaker changes.
    pub speaker: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    /// The first clip was marked as beginning a paragraph.
    pub marked: bool,
    pub segments: Vec<Segment>,
}

/// Groups clips into paragraphs and speaker segments. Clip text is trimmed
/// and followed by one space. The current speaker carries across paragraph
/// boundaries; clips without a speaker continue the current segment.
pub fn paragraphs(timeline: &Timeline) -> Vec<Paragraph> {
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    let mut current: Option<SpeakerId> = None;

    for clip in timeline.clips() {
        if paragraphs.is_empty() || clip.begin_paragraph {
            paragraphs.push(Paragraph {
                marked: clip.begin_paragraph,
                segments: vec![Segment::default()],
            });
        }
        let Some(para) = paragraphs.last_mut() else {
            continue;
        };

        if let Some(id) = clip.speaker.filter(|id| current != Some(*id)) {
            current = Some(id);
            para.segments.push(Segment {
                speaker: timeline.speaker(id).map(|s| s.name.clone()),
                text: String::new(),
            });
        }
        if let Some(segment) = para.segments.last_mut() {
            segment.text.push_str(clip.text.trim());
            segment.text.push(' ');
        }
    }

    for para in &mut paragraphs {
        para.segments
            .retain(|segment| segment.speaker.is_some() || !segment.text.is_empty());
    }
    paragraphs
}

/// Writes the transcript as plain text. Marked paragraphs start after a blank
/// line and speaker changes are prefixed with the name in capitals.
pub fn write_plaintext<W: Write>(timeline: &Timeline, mut out: W) -> io::Result<()> {
    for para in paragraphs(timeline) {
        if para.marked {
            write!(out, "\n\n")?;
        }
        for segment in &para.segments {
            if let Some(name) = &segment.speaker {
                write!(out, "{}: ", name.to_uppercase())?;
            }
            write!(out, "{}", segment.text)?;
        }
    }
    out.flush()
}

#[derive(Template)]
#[template(path = "transcript.html")]
struct TranscriptPage<'a> {
    title: &'a str,
    paragraphs: &'a [Paragraph],
}

/// Writes the transcript as an HTML page, one `<p>` per paragraph and a
/// `speaker` span at each speaker change.
pub fn write_html<W: Write>(timeline: &Timeline, title: &str, mut out: W) -> Result<(), ExportError> {
    let paragraphs = paragraphs(timeline);
    let page = TranscriptPage {
        title,
        paragraphs: &paragraphs,
    };
    out.write_all(page.render()?.as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::clip::Clip;

    fn timeline(texts: &[&str]) -> Timeline {
        Timeline::from_parts(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| Clip::new(i as f64 * 2.0, i as f64 * 2.0 + 2.0, *text))
                .collect(),
            vec![],
        )
    }

    fn plaintext(timeline: &Timeline) -> String {
        let mut out = Vec::new();
        write_plaintext(timeline, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plaintext_paragraph_break() {
        let mut tl = timeline(&["  first one ", "second", "third"]);
        tl.set_begin_paragraph(2, true).unwrap();
        assert_eq!(plaintext(&tl), "first one second \n\nthird ");
    }

    #[test]
    fn test_plaintext_speaker_change() {
        let mut tl = timeline(&["hi", "there", "hello", "back"]);
        let ann = tl.add_speaker("Ann");
        let bob = tl.add_speaker("Bob");
        tl.set_speaker_run(0, Some(ann)).unwrap();
        tl.set_speaker_run(2, Some(bob)).unwrap();
        tl.set_begin_paragraph(3, true).unwrap();
        assert_eq!(plaintext(&tl), "ANN: hi there BOB: hello \n\nback ");
    }

    #[test]
    fn test_paragraph_grouping() {
        let mut tl = timeline(&["a", "b", "c"]);
        let ann = tl.add_speaker("Ann");
        tl.set_speaker_run(1, Some(ann)).unwrap();
        let paras = paragraphs(&tl);
        assert_eq!(paras.len(), 1);
        assert!(!paras[0].marked);
        assert_eq!(
            paras[0].segments,
            [
                Segment {
                    speaker: None,
                    text: "a ".into()
                },
                Segment {
                    speaker: Some("Ann".into()),
                    text: "b c ".into()
                },
            ]
        );
    }

    #[test]
    fn test_html_export_escapes_text() {
        let mut tl = timeline(&["x < y & z", "next"]);
        let ann = tl.add_speaker(" Ann ");
        tl.set_speaker_run(0, Some(ann)).unwrap();
        tl.set_begin_paragraph(1, true).unwrap();

        let mut out = Vec::new();
        write_html(&tl, "Talk", &mut out).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("<title>Talk</title>"));
        assert!(html.contains("<p><span class=\"speaker\">Ann: </span>x &lt; y &amp; z </p>"));
        assert!(html.contains("<p>next </p>"));
    }
}
