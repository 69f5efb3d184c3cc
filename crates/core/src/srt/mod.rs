//! This module is responsible for SRT parsing and serialization.
//! Cue text is kept on a single line with `\N` marking internal line breaks,
//! so that timing and cue order survive a parse/format round trip untouched.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Marker used inside cue text for a line break within the same cue.
pub const LINE_BREAK: &str = "\\N";

/// A single timed cue (index, time range, text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Cue {
    /// True when the cue carries something worth translating.
    /// Whitespace-only cues count as empty spacer entries.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// An ordered list of cues in timeline order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    pub cues: Vec<Cue>,
}

impl Subtitle {
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Number of cues with translatable text.
    pub fn text_cue_count(&self) -> usize {
        self.cues.iter().filter(|c| c.has_text()).count()
    }

    /// Texts of the non-empty cues, cleaned for the translation backend.
    pub fn translatable_lines(&self) -> Vec<String> {
        self.cues
            .iter()
            .filter(|c| c.has_text())
            .map(|c| prepare_for_translation(&c.text))
            .collect()
    }
}

/// Decode a raw payload from a subtitle source.
/// Invalid UTF-8 is replaced rather than rejected, since a few broken
/// characters should not cost the whole subtitle.
pub fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => {
            warn!("subtitle payload is not valid UTF-8 ({err}), decoding lossily");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Parse SRT text into a subtitle. Cues keep their file order and a
/// multi-line cue text is joined with `\N`.
pub fn parse(input: &str) -> Result<Subtitle> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut cues = Vec::new();
    let mut lines = input.lines();
    loop {
        let index_line = match lines.next() {
            Some(l) if !l.trim().is_empty() => l.trim(),
            Some(_) => continue,
            None => break,
        };
        let index: u32 = index_line
            .parse()
            .with_context(|| format!("bad cue index `{index_line}`"))?;
        let time_line = lines
            .next()
            .ok_or_else(|| anyhow!("missing time for cue {index}"))?;
        let (start_ms, end_ms) =
            parse_times(time_line).with_context(|| format!("bad time range for cue {index}"))?;
        let mut text = Vec::new();
        for line in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
            text.push(line.trim_end());
        }
        cues.push(Cue {
            index,
            start_ms,
            end_ms,
            text: text.join(LINE_BREAK),
        });
    }
    Ok(Subtitle { cues })
}

/// Render a subtitle as SRT, turning `\N` back into real line breaks.
pub fn format(subtitle: &Subtitle) -> String {
    let mut out = String::new();
    for cue in &subtitle.cues {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_time(cue.start_ms),
            format_time(cue.end_ms),
            cue.text.replace(LINE_BREAK, "\n")
        ));
    }
    out
}

/// Clean cue text before it is sent for translation.
/// Dialogue cues (`- Hi\N- Hello`) keep one speaker per line, while other
/// breaks only wrapped a long sentence and are joined with a space.
pub fn prepare_for_translation(text: &str) -> String {
    if !text.contains(LINE_BREAK) {
        return text.to_string();
    }
    let joiner = if text.trim_start().starts_with('-') {
        "\n"
    } else {
        " "
    };
    text.replace(&format!("{LINE_BREAK}\r"), joiner)
        .replace(&format!("\r{LINE_BREAK}"), joiner)
        .replace(LINE_BREAK, joiner)
}

/// Parse a time range like `00:00:01,000 --> 00:00:02,000` to milliseconds.
fn parse_times(line: &str) -> Result<(u64, u64)> {
    let mut parts = line.split("-->");
    let start = parts.next().ok_or_else(|| anyhow!("no start"))?;
    let end = parts.next().ok_or_else(|| anyhow!("no end"))?;
    // Some files carry positioning hints after the end time.
    let end = end.split_whitespace().next().ok_or_else(|| anyhow!("no end"))?;
    Ok((parse_time(start.trim())?, parse_time(end)?))
}

/// Parse `HH:MM:SS,mmm` into milliseconds.
fn parse_time(t: &str) -> Result<u64> {
    let parts: Vec<&str> = t.split([':', ',', '.']).collect();
    if parts.len() != 4 {
        return Err(anyhow!("bad time `{t}`"));
    }
    let h: u64 = parts[0].parse()?;
    let m: u64 = parts[1].parse()?;
    let s: u64 = parts[2].parse()?;
    let ms: u64 = parts[3].parse()?;
    if m >= 60 || s >= 60 || ms >= 1000 {
        return Err(anyhow!("bad time `{t}`"));
    }
    h.checked_mul(3_600_000)
        .and_then(|v| v.checked_add((m * 60 + s) * 1000 + ms))
        .ok_or_else(|| anyhow!("time `{t}` out of range"))
}

/// Format milliseconds back to `HH:MM:SS,mmm`.
fn format_time(ms: u64) -> String {
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1000;
    let ms = ms % 1000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}
