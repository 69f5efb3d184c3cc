//! Batched translation against a rate and size limited backend.
//! Lines are grouped greedily into batches bounded by character count and
//! sent one batch at a time, so the output order is the input order.

use crate::error::{BackendError, ResolveError, Result};
use async_trait::async_trait;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, trace};

pub mod google;
pub mod retry;

use retry::{Pacer, RetryPolicy, TokioPacer};

/// Default ceiling on the combined length of one batch, in characters.
pub const DEFAULT_MAX_BATCH_CHARS: usize = 10_000;

/// Source language value asking the backend to work it out itself.
pub const AUTO_LANGUAGE: &str = "auto";

/// A translation service able to translate many texts in one call and to
/// guess the language of a single text.
#[async_trait]
pub trait TranslatorBackend: Send + Sync {
    /// Translate `texts` from `source` to `dest`, one output per input, in order.
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        dest: &str,
    ) -> std::result::Result<Vec<String>, BackendError>;

    /// Guess the language code of `text`.
    async fn detect_language(&self, text: &str) -> std::result::Result<String, BackendError>;
}

/// Split `lines` into contiguous batches whose combined length stays below
/// `max_chars`. A line longer than the ceiling still gets a batch of its own.
pub fn plan_batches(lines: &[String], max_chars: usize) -> Vec<Range<usize>> {
    let mut batches = Vec::new();
    let Some(first) = lines.first() else {
        return batches;
    };
    let mut start = 0;
    let mut chars = first.chars().count();
    for (i, line) in lines.iter().enumerate().skip(1) {
        let len = line.chars().count();
        if chars + len < max_chars {
            chars += len;
        } else {
            batches.push(start..i);
            start = i;
            chars = len;
        }
    }
    batches.push(start..lines.len());
    batches
}

/// Translates ordered lines batch by batch, retrying failed batches.
pub struct BatchTranslator<T> {
    backend: Arc<T>,
    policy: RetryPolicy,
    max_batch_chars: usize,
    pacer: Arc<dyn Pacer>,
}

impl<T: TranslatorBackend> BatchTranslator<T> {
    pub fn new(backend: Arc<T>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            max_batch_chars: DEFAULT_MAX_BATCH_CHARS,
            pacer: Arc::new(TokioPacer),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_batch_chars(mut self, max_batch_chars: usize) -> Self {
        self.max_batch_chars = max_batch_chars;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Translate `lines` from `source` (or [`AUTO_LANGUAGE`]) to `target`.
    /// The result has the same length and order as `lines`. A batch that
    /// cannot be translated fails the whole call; partial output is never
    /// returned.
    pub async fn translate(&self, lines: &[String], source: &str, target: &str) -> Result<Vec<String>> {
        trace!(
            "translate(lines={}, source={source}, target={target})",
            lines.len()
        );
        let batches = plan_batches(lines, self.max_batch_chars);
        let mut out = Vec::with_capacity(lines.len());
        for (n, range) in batches.iter().enumerate() {
            let batch = &lines[range.clone()];
            debug!("sending batch {} with {} lines", n + 1, batch.len());
            let translated = retry::run(&self.policy, self.pacer.as_ref(), || async move {
                let translated = self.backend.translate_batch(batch, source, target).await?;
                if translated.len() != batch.len() {
                    return Err(BackendError::Transient(format!(
                        "backend returned {} lines for a batch of {}",
                        translated.len(),
                        batch.len()
                    )));
                }
                Ok(translated)
            })
            .await
            .map_err(|failure| ResolveError::TranslationFailed {
                batch: n + 1,
                attempts: failure.attempts,
                reason: failure.error.to_string(),
            })?;
            out.extend(translated);
            info!(
                "translated lines {}-{} of {}",
                range.start + 1,
                range.end,
                lines.len()
            );
            if n + 1 < batches.len() {
                self.pacer.pause(self.policy.base_delay).await;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::retry::tests::RecordingPacer;
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend that answers from a script of canned results, then echoes
    /// `<dest>:<text>` once the script runs out. Every call is recorded.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        pub(crate) script: Mutex<VecDeque<std::result::Result<Option<usize>, BackendError>>>,
        pub(crate) batches: Mutex<Vec<(Vec<String>, String, String)>>,
        pub(crate) detections: Mutex<VecDeque<String>>,
        pub(crate) detected_texts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        /// Queue a failure for the next batch call.
        pub(crate) fn fail_next(&self, err: BackendError) {
            self.script.lock().unwrap().push_back(Err(err));
        }

        /// Queue a truncated answer keeping only the first `keep` lines.
        pub(crate) fn truncate_next(&self, keep: usize) {
            self.script.lock().unwrap().push_back(Ok(Some(keep)));
        }

        pub(crate) fn detect_as(&self, codes: &[&str]) {
            let mut queue = self.detections.lock().unwrap();
            queue.extend(codes.iter().map(|c| c.to_string()));
        }

        pub(crate) fn batch_calls(&self) -> Vec<(Vec<String>, String, String)> {
            self.batches.lock().unwrap().clone()
        }

        pub(crate) fn detection_calls(&self) -> usize {
            self.detected_texts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TranslatorBackend for ScriptedBackend {
        async fn translate_batch(
            &self,
            texts: &[String],
            source: &str,
            dest: &str,
        ) -> std::result::Result<Vec<String>, BackendError> {
            self.batches
                .lock()
                .unwrap()
                .push((texts.to_vec(), source.to_string(), dest.to_string()));
            let step = self.script.lock().unwrap().pop_front();
            let mut translated: Vec<String> =
                texts.iter().map(|t| format!("{dest}:{t}")).collect();
            match step {
                Some(Err(err)) => Err(err),
                Some(Ok(Some(keep))) => {
                    translated.truncate(keep);
                    Ok(translated)
                }
                _ => Ok(translated),
            }
        }

        async fn detect_language(&self, text: &str) -> std::result::Result<String, BackendError> {
            self.detected_texts.lock().unwrap().push(text.to_string());
            Ok(self
                .detections
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "en".to_string()))
        }
    }

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn translator(backend: &Arc<ScriptedBackend>, pacer: &Arc<RecordingPacer>) -> BatchTranslator<ScriptedBackend> {
        BatchTranslator::new(backend.clone()).with_pacer(pacer.clone())
    }

    #[test]
    fn batches_stay_below_ceiling() {
        let input = lines(&["aaaa", "bbb", "cc", "dddddd", "e"]);
        let batches = plan_batches(&input, 10);
        assert_eq!(batches, vec![0..3, 3..5]);
        for range in &batches {
            let total: usize = input[range.clone()].iter().map(|l| l.len()).sum();
            assert!(total < 10);
        }
    }

    #[test]
    fn oversized_line_gets_own_batch() {
        let input = lines(&["ab", "0123456789abc", "cd"]);
        assert_eq!(plan_batches(&input, 10), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn batches_cover_every_line_in_order() {
        let input: Vec<String> = (0..57).map(|i| "x".repeat(i % 13 + 1)).collect();
        let batches = plan_batches(&input, 40);
        let flat: Vec<usize> = batches.iter().flat_map(|r| r.clone()).collect();
        assert_eq!(flat, (0..57).collect::<Vec<_>>());
        assert!(plan_batches(&[], 40).is_empty());
    }

    #[test]
    fn counts_characters_not_bytes() {
        let input = lines(&["ééééé", "ééééé"]);
        assert_eq!(plan_batches(&input, 11), vec![0..2]);
    }

    #[tokio::test]
    async fn translates_in_order_across_batches() {
        let backend = Arc::new(ScriptedBackend::default());
        let pacer = Arc::new(RecordingPacer::default());
        let tr = translator(&backend, &pacer).with_max_batch_chars(7);
        let out = tr
            .translate(&lines(&["one", "two", "three", "four"]), "en", "fr")
            .await
            .unwrap();
        assert_eq!(out, lines(&["fr:one", "fr:two", "fr:three", "fr:four"]));
        let calls = backend.batch_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, lines(&["one", "two"]));
        assert_eq!(calls[0].1, "en");
        // Pacing only between batches.
        assert_eq!(pacer.recorded(), vec![Duration::from_millis(300); 2]);
    }

    #[tokio::test]
    async fn retries_with_growing_delays() {
        let backend = Arc::new(ScriptedBackend::default());
        for _ in 0..3 {
            backend.fail_next(BackendError::Transient("429".into()));
        }
        let pacer = Arc::new(RecordingPacer::default());
        let tr = translator(&backend, &pacer);
        let out = tr.translate(&lines(&["hi"]), AUTO_LANGUAGE, "de").await.unwrap();
        assert_eq!(out, lines(&["de:hi"]));
        assert_eq!(
            pacer.recorded(),
            vec![
                Duration::from_millis(600),
                Duration::from_millis(1200),
                Duration::from_millis(2400)
            ]
        );
    }

    #[tokio::test]
    async fn fails_when_retries_run_out() {
        let backend = Arc::new(ScriptedBackend::default());
        for _ in 0..11 {
            backend.fail_next(BackendError::Transient("down".into()));
        }
        let pacer = Arc::new(RecordingPacer::default());
        let tr = translator(&backend, &pacer);
        let err = tr.translate(&lines(&["hi"]), "en", "de").await.unwrap_err();
        match err {
            ResolveError::TranslationFailed { batch, attempts, .. } => {
                assert_eq!(batch, 1);
                assert_eq!(attempts, 11);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let delays = pacer.recorded();
        assert_eq!(delays.len(), 10);
        assert_eq!(delays[9], Duration::from_millis(300) * 1024);
    }

    #[tokio::test]
    async fn short_answer_is_retried() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.truncate_next(1);
        let pacer = Arc::new(RecordingPacer::default());
        let tr = translator(&backend, &pacer);
        let out = tr.translate(&lines(&["a", "b"]), "en", "it").await.unwrap();
        assert_eq!(out, lines(&["it:a", "it:b"]));
        assert_eq!(backend.batch_calls().len(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_stops_immediately() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.fail_next(BackendError::Permanent("unsupported pair".into()));
        let pacer = Arc::new(RecordingPacer::default());
        let tr = translator(&backend, &pacer);
        let err = tr.translate(&lines(&["a"]), "en", "xx").await.unwrap_err();
        assert!(matches!(err, ResolveError::TranslationFailed { attempts: 1, .. }));
        assert_eq!(backend.batch_calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let backend = Arc::new(ScriptedBackend::default());
        let pacer = Arc::new(RecordingPacer::default());
        let out = translator(&backend, &pacer)
            .translate(&[], "en", "fr")
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(backend.batch_calls().is_empty());
    }
}
