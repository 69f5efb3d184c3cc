//! Best-effort subtitles in a preferred language.
//!
//! A [`resolve::FallbackResolver`] searches a [`source::SubtitleSource`] for
//! the preferred language, then English, then anything, and machine
//! translates whatever it finds through a [`translate::TranslatorBackend`].

pub mod catalog;
pub mod config;
pub mod detect;
pub mod error;
pub mod reassemble;
pub mod resolve;
pub mod source;
pub mod srt;
pub mod translate;

pub use error::{ResolveError, Result};
