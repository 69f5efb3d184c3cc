//! Estimate the dominant language of a subtitle by sampling its cues.

use crate::error::{ResolveError, Result};
use crate::srt::{prepare_for_translation, Subtitle};
use crate::translate::retry::{self, Pacer, RetryPolicy, TokioPacer};
use crate::translate::TranslatorBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Default number of cues sampled per detection.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

/// Samples cues at random, asks the backend for the language of each sample
/// and returns the most frequent answer.
pub struct LanguageDetector<T> {
    backend: Arc<T>,
    sample_size: usize,
    rng: Mutex<StdRng>,
    policy: RetryPolicy,
    pacer: Arc<dyn Pacer>,
}

impl<T: TranslatorBackend> LanguageDetector<T> {
    /// Detector seeded from the operating system.
    pub fn new(backend: Arc<T>) -> Self {
        Self::with_rng(backend, StdRng::from_os_rng())
    }

    /// Detector with a fixed seed, so the same cues are sampled every run.
    pub fn with_seed(backend: Arc<T>, seed: u64) -> Self {
        Self::with_rng(backend, StdRng::seed_from_u64(seed))
    }

    fn with_rng(backend: Arc<T>, rng: StdRng) -> Self {
        Self {
            backend,
            sample_size: DEFAULT_SAMPLE_SIZE,
            rng: Mutex::new(rng),
            policy: RetryPolicy::default(),
            pacer: Arc::new(TokioPacer),
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Positions of the cues to sample, drawn without replacement among the
    /// cues that have text. All of them when there are no more than the
    /// sample size.
    pub fn sample_positions(&self, subtitle: &Subtitle) -> Vec<usize> {
        let candidates: Vec<usize> = subtitle
            .cues
            .iter()
            .enumerate()
            .filter(|(_, c)| c.has_text())
            .map(|(i, _)| i)
            .collect();
        let amount = candidates.len().min(self.sample_size);
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rand::seq::index::sample(&mut *rng, candidates.len(), amount)
            .into_iter()
            .map(|i| candidates[i])
            .collect()
    }

    /// Detect the language of `subtitle`.
    pub async fn detect(&self, subtitle: &Subtitle) -> Result<String> {
        trace!("detect(cues={})", subtitle.len());
        let positions = self.sample_positions(subtitle);
        if positions.is_empty() {
            return Err(ResolveError::EmptyInput);
        }
        let mut codes = Vec::with_capacity(positions.len());
        for pos in positions {
            let text = prepare_for_translation(&subtitle.cues[pos].text);
            let text = text.as_str();
            let code = retry::run(&self.policy, self.pacer.as_ref(), || async move {
                self.backend.detect_language(text).await
            })
            .await
            .map_err(|failure| ResolveError::DetectionFailed {
                attempts: failure.attempts,
                reason: failure.error.to_string(),
            })?;
            codes.push(code);
        }
        let mode = mode(&codes).ok_or(ResolveError::EmptyInput)?;
        debug!("detected {mode} from {} samples", codes.len());
        Ok(mode)
    }
}

/// Most frequent code. Ties go to the lexicographically lowest code,
/// compared case-insensitively.
pub fn mode(codes: &[String]) -> Option<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for code in codes {
        *counts.entry(code.to_lowercase()).or_default() += 1;
    }
    let mut best: Option<(String, usize)> = None;
    for (code, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((code, count)),
        }
    }
    best.map(|(code, _)| code)
}
