//! Install translated lines back into a subtitle's cues.

use crate::error::{PartialTranslation, ResolveError, Result};
use crate::srt::{Subtitle, LINE_BREAK};
use std::collections::VecDeque;
use tracing::{trace, warn};

/// How far reassembly got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembly {
    Complete,
    Partial(PartialTranslation),
}

impl Reassembly {
    pub fn partial(&self) -> Option<&PartialTranslation> {
        match self {
            Reassembly::Complete => None,
            Reassembly::Partial(p) => Some(p),
        }
    }
}

/// Replace the text of every cue that has text with the next translated
/// line, front to back. Cues without text are skipped and consume nothing.
///
/// Running out of lines stops at the first cue left over and reports it;
/// those cues keep their original text. Getting more lines than text cues
/// is a bug upstream and fails before any cue is touched.
pub fn reassemble(subtitle: &mut Subtitle, translated: Vec<String>) -> Result<Reassembly> {
    let expected = subtitle.text_cue_count();
    trace!(
        "reassemble(cues={}, expected={expected}, received={})",
        subtitle.len(),
        translated.len()
    );
    if translated.len() > expected {
        return Err(ResolveError::ReassemblyMismatch {
            expected,
            received: translated.len(),
        });
    }
    let received = translated.len();
    let mut queue: VecDeque<String> = translated.into();
    for (pos, cue) in subtitle.cues.iter_mut().enumerate() {
        if !cue.has_text() {
            continue;
        }
        let Some(line) = queue.pop_front() else {
            let partial = PartialTranslation {
                stop_index: pos,
                received,
                expected,
            };
            warn!("{partial}");
            return Ok(Reassembly::Partial(partial));
        };
        cue.text = to_cue_text(&line);
    }
    Ok(Reassembly::Complete)
}

/// Turn newlines from the translator into the subtitle's line-break marker.
fn to_cue_text(line: &str) -> String {
    line.replace("\r\n", "\n").replace('\n', LINE_BREAK)
}
