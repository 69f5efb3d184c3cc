//! Error types for the resolution pipeline.
//!
//! Only `ResolveError` reaches callers. Backend and source failures are
//! folded into it so transport details never escape as raw exceptions.

use thiserror::Error;

/// Terminal failures of a resolution request.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The preferred or detected language has no catalog row.
    #[error("language `{0}` is not supported, see the language catalog for supported languages")]
    UnsupportedLanguage(String),

    /// Every fallback tier came back empty.
    #[error("no subtitle found for {0}")]
    NotFound(String),

    /// A batch exhausted its retry budget or failed permanently.
    #[error("translation of batch {batch} failed after {attempts} attempt(s): {reason}")]
    TranslationFailed {
        batch: usize,
        attempts: u32,
        reason: String,
    },

    #[error("language detection failed after {attempts} attempt(s): {reason}")]
    DetectionFailed { attempts: u32, reason: String },

    /// More translated lines than cues to receive them.
    #[error("reassembly received {received} translated lines for {expected} cues")]
    ReassemblyMismatch { expected: usize, received: usize },

    /// Language detection on a subtitle without text.
    #[error("cannot detect the language of a subtitle without text cues")]
    EmptyInput,

    #[error("subtitle source failed: {0}")]
    Source(#[from] SourceError),

    #[error("malformed subtitle from {language} search: {reason}")]
    MalformedSubtitle { language: String, reason: String },
}

/// Fewer translations than text cues. Carried inside a successful result,
/// since a partially translated subtitle is still useful.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("translation stopped at cue {stop_index}: {received} of {expected} lines available")]
pub struct PartialTranslation {
    /// Position in the cue list of the first cue left untranslated.
    pub stop_index: usize,
    pub received: usize,
    pub expected: usize,
}

/// Failures reported by a translation backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network trouble, rate limiting or a malformed response. Worth retrying.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The backend rejected the request itself. Retrying cannot help.
    #[error("backend rejected request: {0}")]
    Permanent(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.is_client_error() && status.as_u16() != 429 => {
                BackendError::Permanent(err.to_string())
            }
            _ => BackendError::Transient(err.to_string()),
        }
    }
}

/// Failures of a subtitle source other than "not found".
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
