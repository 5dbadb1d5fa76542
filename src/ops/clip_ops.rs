use crate::error::TimelineError;
use crate::types::clip::{Clip, ClipId};

/// Byte offset of the `caret`-th character of `text`, or `None` when the caret
/// lies past the end.
pub fn byte_offset(text: &str, caret: usize) -> Option<usize> {
    if caret == 0 {
        return Some(0);
    }
    match text.char_indices().nth(caret) {
        Some((offset, _)) => Some(offset),
        None if text.chars().count() == caret => Some(text.len()),
        None => None,
    }
}

fn split_text(text: &str, caret: usize) -> Result<(&str, &str), TimelineError> {
    let offset = byte_offset(text, caret).ok_or(TimelineError::CaretOutOfRange {
        caret,
        len: text.chars().count(),
    })?;
    Ok(text.split_at(offset))
}

/// Cuts a clip at a caret position, returning the shortened original and the
/// new tail clip.
///
/// The split time is interpolated from the caret's share of the text, so a
/// caret halfway through the text splits the interval in half. An empty text
/// always splits at `in_time`.
pub fn cut_clip_at(clip: &Clip, caret: usize) -> Result<(Clip, Clip), TimelineError> {
    let (head, tail) = split_text(&clip.text, caret)?;
    let len = clip.text_len();
    let ratio = if len == 0 {
        0.0
    } else {
        caret as f64 / len as f64
    };
    let split_time = clip.in_time + ratio * (clip.out_time - clip.in_time);

    let mut left = clip.clone();
    left.out_time = split_time;
    left.text = head.to_string();

    let right = Clip {
        id: ClipId::new(),
        in_time: split_time,
        out_time: clip.out_time,
        text: tail.trim_start().to_string(),
        begin_paragraph: false,
        speaker: clip.speaker,
        edited: true,
        remote_id: None,
    };

    Ok((left, right))
}

/// Replaces the first run of whitespace in `text` with a single space.
///
/// Only the first run is touched; later runs are left as they are.
pub fn collapse_first_whitespace_run(text: &str) -> String {
    let Some(start) = text.find(char::is_whitespace) else {
        return text.to_string();
    };
    let end = text[start..]
        .find(|c: char| !c.is_whitespace())
        .map(|rel| start + rel)
        .unwrap_or(text.len());
    format!("{} {}", &text[..start], &text[end..])
}

/// Drops leading whitespace and upper-cases the first remaining character.
pub fn capitalize_first(text: &str) -> String {
    let trimmed = text.trim_start();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Inserts a sentence terminator at `caret` when the caret is inside the text.
///
/// Whitespace around the caret is replaced by `"{ch} "` and the following word
/// is capitalized. Returns the new text and the new caret.
pub fn sentence_break(text: &str, caret: usize, ch: char) -> Result<(String, usize), TimelineError> {
    let (before, after) = split_text(text, caret)?;
    let new_text = format!(
        "{}{} {}",
        before.trim_end(),
        ch,
        capitalize_first(after)
    );
    Ok((new_text, caret + 1))
}

/// Inserts `", "` at `caret`, swallowing whitespace on both sides.
pub fn comma_break(text: &str, caret: usize) -> Result<(String, usize), TimelineError> {
    let (before, after) = split_text(text, caret)?;
    let before = before.trim_end();
    let new_text = format!("{}, {}", before, after.trim_start());
    Ok((new_text, before.chars().count() + 1))
}

/// Short human timecode for the caption list: `4s`, `2m05s`, `1h02m05s`.
pub fn format_timecode(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if total < 60 {
        format!("{}s", seconds)
    } else if hours == 0 {
        format!("{}m{:02}s", minutes, seconds)
    } else {
        format!("{}h{:02}m{:02}s", hours, minutes, seconds)
    }
}
