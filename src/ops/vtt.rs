use crate::error::VttError;
use crate::types::clip::{Clip, SpeakerId};
use crate::types::timeline::Timeline;

use regex::Regex;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::OnceLock;

fn timecode_regex() -> &'static Regex {
    static TIMECODE_REGEX: OnceLock<Regex> = OnceLock::new();
    TIMECODE_REGEX.get_or_init(|| {
        Regex::new(
            r"^(?:(\d+):)?(\d{1,2}):(\d{2})[.,](\d{3})\s*-->\s*(?:(\d+):)?(\d{1,2}):(\d{2})[.,](\d{3})",
        )
        .expect("Failed to compile timecode regex")
    })
}

fn voice_regex() -> &'static Regex {
    static VOICE_REGEX: OnceLock<Regex> = OnceLock::new();
    VOICE_REGEX.get_or_init(|| {
        Regex::new(r"<v(?:\.[^>\s]*)?\s+([^>]+)>").expect("Failed to compile voice regex")
    })
}

fn tag_regex() -> &'static Regex {
    static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").expect("Failed to compile tag regex"))
}

/// One cue read from a WebVTT or SRT file.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub in_time: f64,
    pub out_time: f64,
    pub text: String,
    pub speaker: Option<String>,
}

/// Formats seconds as `HH:MM:SS.mmm`.
pub fn seconds_to_vtt(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let (ms, total_secs) = (total_ms % 1000, total_ms / 1000);
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms)
}

/// Writes the timeline as WebVTT. Clips with a speaker get a `<v Name>` tag.
pub fn write_vtt<W: Write>(timeline: &Timeline, mut out: W) -> io::Result<()> {
    writeln!(out, "WEBVTT")?;
    writeln!(out)?;
    for (count, clip) in timeline.clips().iter().enumerate() {
        writeln!(out, "{}", count + 1)?;
        writeln!(
            out,
            "{} --> {}",
            seconds_to_vtt(clip.in_time),
            seconds_to_vtt(clip.out_time)
        )?;
        match clip.speaker.and_then(|id| timeline.speaker(id)) {
            Some(speaker) => writeln!(out, "<v {}>{}", speaker.name, clip.text)?,
            None => writeln!(out, "{}", clip.text)?,
        }
        writeln!(out)?;
    }
    out.flush()
}

fn seconds(caps: &regex::Captures<'_>, first: usize) -> f64 {
    let field = |i: usize| {
        caps.get(first + i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let (hours, minutes, secs, millis) = (field(0), field(1), field(2), field(3));
    ((hours * 60 + minutes) * 60 + secs) as f64 + millis as f64 / 1000.0
}

fn parse_payload(lines: &[&str]) -> (Option<String>, String) {
    let raw = lines.join(" ");
    let speaker = voice_regex()
        .captures(&raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());
    let text = tag_regex().replace_all(&raw, "");
    (speaker, text.trim().to_string())
}

/// Reads WebVTT or SRT cues. Cue identifiers, `NOTE`/`STYLE`/`REGION` blocks
/// and cue settings are skipped.
pub fn read_vtt(input: &str) -> Result<Vec<Cue>, VttError> {
    let lines: Vec<&str> = input.lines().collect();
    let mut cues = Vec::new();
    let mut i = 0;

    if let Some(first) = lines.first() {
        if first.trim().trim_start_matches('\u{FEFF}').starts_with("WEBVTT") {
            i = 1;
            while i < lines.len() && !lines[i].trim().is_empty() {
                i += 1;
            }
        }
    }

    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() {
            i += 1;
            continue;
        }
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            while i < lines.len() && !lines[i].trim().is_empty() {
                i += 1;
            }
            continue;
        }

        // Optional cue identifier before the timing line.
        if !line.contains("-->") {
            i += 1;
        }
        let timing = lines.get(i).map(|l| l.trim()).unwrap_or("");
        let caps = timecode_regex().captures(timing).ok_or_else(|| VttError::Timecode {
            line: i + 1,
            text: timing.to_string(),
        })?;
        let in_time = seconds(&caps, 1);
        let out_time = seconds(&caps, 5);
        i += 1;

        let start = i;
        while i < lines.len() && !lines[i].trim().is_empty() {
            i += 1;
        }
        if out_time < in_time {
            return Err(VttError::NegativeCue { line: i });
        }
        let (speaker, text) = parse_payload(&lines[start..i]);
        cues.push(Cue {
            in_time,
            out_time,
            text,
            speaker,
        });
    }

    Ok(cues)
}

/// Builds a timeline from cues, creating one speaker per distinct voice name.
/// Imported clips count as unedited. A cue that runs into the next one is cut
/// short at the next cue's start.
pub fn cues_to_timeline(cues: Vec<Cue>) -> Timeline {
    let mut timeline = Timeline::new();
    let mut by_name: HashMap<String, SpeakerId> = HashMap::new();
    let mut clips = Vec::with_capacity(cues.len());

    for cue in cues {
        let mut clip = Clip::new(cue.in_time, cue.out_time, cue.text);
        clip.speaker = cue.speaker.map(|name| {
            *by_name
                .entry(name.clone())
                .or_insert_with(|| timeline.add_speaker(name))
        });
        clips.push(clip);
    }

    let mut timeline = Timeline::from_parts(clips, timeline.speakers().to_vec());
    timeline.repair_overlaps();
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_vtt() {
        assert_eq!(seconds_to_vtt(0.0), "00:00:00.000");
        assert_eq!(seconds_to_vtt(4.25), "00:00:04.250");
        assert_eq!(seconds_to_vtt(3725.5), "01:02:05.500");
    }

    #[test]
    fn test_write_vtt_with_speakers() {
        let mut timeline = Timeline::from_parts(
            vec![Clip::new(0.0, 4.0, "hello"), Clip::new(4.0, 8.5, "there")],
            vec![],
        );
        let host = timeline.add_speaker("Host");
        timeline.set_speaker_run(1, Some(host)).unwrap();

        let mut out = Vec::new();
        write_vtt(&timeline, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "WEBVTT\n\n1\n00:00:00.000 --> 00:00:04.000\nhello\n\n2\n00:00:04.000 --> 00:00:08.500\n<v Host>there\n\n"
        );
    }

    #[test]
    fn test_read_vtt_cues() {
        let input = "WEBVTT FILE\n\n1\n00:00:00.000 --> 00:00:04.000\nhello\nworld\n\nNOTE a comment\nspanning lines\n\n00:04.000 --> 00:08.000 align:start\n<v Host>there <b>you</b>\n";
        let cues = read_vtt(input).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "hello world");
        assert_eq!(cues[0].speaker, None);
        assert_eq!(cues[1].in_time, 4.0);
        assert_eq!(cues[1].out_time, 8.0);
        assert_eq!(cues[1].text, "there you");
        assert_eq!(cues[1].speaker.as_deref(), Some("Host"));
    }

    #[test]
    fn test_read_srt_cues() {
        let input = "1\n00:00:01,500 --> 00:00:03,000\nfirst\n\n2\n00:00:03,000 --> 00:00:05,250\nsecond\n";
        let cues = read_vtt(input).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].in_time, 1.5);
        assert_eq!(cues[1].out_time, 5.25);
    }

    #[test]
    fn test_read_vtt_bad_timecode() {
        let input = "WEBVTT\n\n1\nnot a timecode\nhello\n";
        assert_eq!(
            read_vtt(input),
            Err(VttError::Timecode {
                line: 4,
                text: "not a timecode".to_string()
            })
        );
    }

    #[test]
    fn test_cues_to_timeline_shares_speakers() {
        let cues = vec![
            Cue {
                in_time: 0.0,
                out_time: 2.0,
                text: "a".into(),
                speaker: Some("Ann".into()),
            },
            Cue {
                in_time: 2.0,
                out_time: 4.0,
                text: "b".into(),
                speaker: Some("Ann".into()),
            },
            Cue {
                in_time: 4.0,
                out_time: 6.0,
                text: "c".into(),
                speaker: None,
            },
        ];
        let timeline = cues_to_timeline(cues);
        assert_eq!(timeline.speakers().len(), 1);
        assert_eq!(timeline.clip_at(0).speaker, timeline.clip_at(1).speaker);
        assert!(timeline.clip_at(2).speaker.is_none());
        assert!(!timeline.is_speaker_change(1));
        assert!(timeline.is_consistent());
    }

    #[test]
    fn test_overlapping_cues_are_clamped() {
        let input = "WEBVTT\n\n00:00:00.000 --> 00:00:05.000\nfirst\n\n00:00:03.000 --> 00:00:08.000\nsecond\n";
        let timeline = cues_to_timeline(read_vtt(input).unwrap());
        assert!(timeline.is_consistent());
        assert_eq!(timeline.clip_at(0).out_time, 3.0);
        assert_eq!(timeline.clip_at(1).in_time, 3.0);
        assert_eq!(timeline.index_at_time(4.0), Some(1));
    }
}
