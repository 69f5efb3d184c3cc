//! Tiered subtitle resolution.
//!
//! The preferred language is tried first, then English, then any language.
//! Anything not already in the preferred language is detected, translated
//! and reassembled before it is returned. Tiers run strictly one after the
//! other and the first hit wins.

use crate::catalog::LanguageCatalog;
use crate::config::Config;
use crate::detect::LanguageDetector;
use crate::error::{PartialTranslation, ResolveError, Result};
use crate::reassemble::reassemble;
use crate::source::{MediaQuery, SubtitleSource, ANY_LANGUAGE_CODE};
use crate::srt::{self, Subtitle};
use crate::translate::{BatchTranslator, TranslatorBackend, AUTO_LANGUAGE};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Translator code of English, the language assumed for the second tier.
pub const ENGLISH: &str = "en";
/// Source code queried on the second tier.
pub const ENGLISH_SOURCE_CODE: &str = "eng";

/// Which search produced a subtitle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Preferred,
    English,
    Any,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Preferred => "preferred-language",
            Tier::English => "English",
            Tier::Any => "any-language",
        })
    }
}

/// How the returned subtitle came to be in the preferred language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Already in the preferred language, returned as found.
    Direct { tier: Tier },
    /// Machine translated from `from`. `partial` is set when some cues kept
    /// their original text.
    Translated {
        tier: Tier,
        from: String,
        partial: Option<PartialTranslation>,
    },
}

/// A subtitle plus where it came from.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub subtitle: Subtitle,
    pub provenance: Provenance,
}

impl Resolution {
    pub fn is_machine_translated(&self) -> bool {
        matches!(self.provenance, Provenance::Translated { .. })
    }
}

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub preferred_language: String,
    pub query: MediaQuery,
}

/// Drives the tiered search, detection, translation and reassembly.
pub struct FallbackResolver<S, T> {
    catalog: Arc<LanguageCatalog>,
    source: S,
    translator: BatchTranslator<T>,
    detector: LanguageDetector<T>,
}

impl<S: SubtitleSource, T: TranslatorBackend> FallbackResolver<S, T> {
    pub fn new(
        catalog: Arc<LanguageCatalog>,
        source: S,
        translator: BatchTranslator<T>,
        detector: LanguageDetector<T>,
    ) -> Self {
        Self {
            catalog,
            source,
            translator,
            detector,
        }
    }

    /// Wire a resolver from settings, using the process-wide catalog.
    pub fn from_config(config: &Config, source: S, backend: Arc<T>) -> Self {
        let policy = config.translation.retry_policy();
        let translator = BatchTranslator::new(backend.clone())
            .with_policy(policy)
            .with_max_batch_chars(config.translation.max_batch_chars);
        let detector = match config.detection.seed {
            Some(seed) => LanguageDetector::with_seed(backend, seed),
            None => LanguageDetector::new(backend),
        }
        .with_sample_size(config.detection.sample_size)
        .with_policy(policy);
        Self::new(LanguageCatalog::global(), source, translator, detector)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Find the best subtitle for `criteria` in its preferred language.
    pub async fn resolve(&self, criteria: &SearchCriteria) -> Result<Resolution> {
        trace!(
            "resolve(language={}, query={})",
            criteria.preferred_language,
            criteria.query
        );
        let row = self
            .catalog
            .row(&criteria.preferred_language)
            .ok_or_else(|| ResolveError::UnsupportedLanguage(criteria.preferred_language.clone()))?;
        let query = &criteria.query;
        let target = row.translator_code.as_str();

        info!("searching {} subtitles for {query}", row.source_code);
        if let Some(subtitle) = self.fetch(&row.source_code, query).await? {
            info!("found {} subtitles directly", row.name);
            return Ok(Resolution {
                subtitle,
                provenance: Provenance::Direct {
                    tier: Tier::Preferred,
                },
            });
        }

        if row.source_code.eq_ignore_ascii_case(ENGLISH_SOURCE_CODE) {
            debug!("preferred language is English, skipping the English tier");
        } else {
            info!("no {} subtitles, trying English", row.name);
            if let Some(subtitle) = self.fetch(ENGLISH_SOURCE_CODE, query).await? {
                return self.translate(subtitle, Tier::English, ENGLISH, target).await;
            }
        }

        info!("no English subtitles, trying any language");
        if let Some(subtitle) = self.fetch(ANY_LANGUAGE_CODE, query).await? {
            return self.translate(subtitle, Tier::Any, AUTO_LANGUAGE, target).await;
        }

        Err(ResolveError::NotFound(query.to_string()))
    }

    /// Query the source and parse whatever it returns.
    async fn fetch(&self, code: &str, query: &MediaQuery) -> Result<Option<Subtitle>> {
        let Some(bytes) = self.source.search(code, query).await? else {
            return Ok(None);
        };
        let subtitle = srt::parse(&srt::decode(&bytes)).map_err(|err| {
            ResolveError::MalformedSubtitle {
                language: code.to_string(),
                reason: format!("{err:#}"),
            }
        })?;
        debug!("parsed {} cues from {code} search", subtitle.len());
        Ok(Some(subtitle))
    }

    /// Detect, translate and reassemble a subtitle found on a fallback tier.
    /// `declared` is what the tier is expected to hold, or `auto` if unknown.
    async fn translate(
        &self,
        mut subtitle: Subtitle,
        tier: Tier,
        declared: &str,
        target: &str,
    ) -> Result<Resolution> {
        let detected = self.detector.detect(&subtitle).await?;
        if declared != AUTO_LANGUAGE && !detected.eq_ignore_ascii_case(declared) {
            warn!("{tier} subtitle was expected in {declared} but looks like {detected}");
        }
        let from = self
            .catalog
            .to_translator_code(&detected)
            .ok_or_else(|| ResolveError::UnsupportedLanguage(detected.clone()))?
            .to_string();
        if from.eq_ignore_ascii_case(target) {
            info!("{tier} subtitle is already in {target}");
            return Ok(Resolution {
                subtitle,
                provenance: Provenance::Direct { tier },
            });
        }

        info!("translating {tier} subtitle from {from} to {target}");
        let lines = subtitle.translatable_lines();
        let translated = self.translator.translate(&lines, &from, target).await?;
        let outcome = reassemble(&mut subtitle, translated)?;
        Ok(Resolution {
            subtitle,
            provenance: Provenance::Translated {
                tier,
                from,
                partial: outcome.partial().cloned(),
            },
        })
    }
}
