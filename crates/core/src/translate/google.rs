//! Google Translate backed translator.
//! Batches go out as one form POST with a repeated `q` field; detection uses
//! the single-text endpoint, which reports the source language it guessed.

use super::{TranslatorBackend, AUTO_LANGUAGE};
use crate::error::BackendError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

/// Public endpoint used when no other is configured.
pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Translator talking to the Google Translate web endpoints.
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    /// Create a translator for `endpoint` with a per-request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Send a request and decode its JSON body.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, BackendError> {
        let resp = request.send().await?;
        let resp = resp.error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl TranslatorBackend for GoogleTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        dest: &str,
    ) -> Result<Vec<String>, BackendError> {
        trace!(
            "translate_batch(texts={}, source={source}, dest={dest})",
            texts.len()
        );
        let form: Vec<(&str, &str)> = texts.iter().map(|t| ("q", t.as_str())).collect();
        let request = self
            .client
            .post(format!("{}/translate_a/t", self.endpoint))
            .query(&[("client", "gtx"), ("sl", source), ("tl", dest), ("format", "text")])
            .form(&form);
        let value = self.send(request).await?;
        parse_batch_response(&value, texts.len())
    }

    async fn detect_language(&self, text: &str) -> Result<String, BackendError> {
        trace!("detect_language(len={})", text.len());
        let request = self
            .client
            .get(format!("{}/translate_a/single", self.endpoint))
            .query(&[
                ("client", "gtx"),
                ("sl", AUTO_LANGUAGE),
                ("tl", "en"),
                ("dt", "t"),
                ("q", text),
            ]);
        let value = self.send(request).await?;
        let lang = value
            .get(2)
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Transient("detection response has no language".into()))?;
        debug!("detected {lang}");
        Ok(lang.to_string())
    }
}

/// Pull the translations out of a batch response.
/// With a known source the answer is `["a", "b"]`; with `auto` each item is
/// `["a", "en"]`. A single text may come back as a bare string, and a single
/// text sent with `auto` comes back flat as `["a", "en"]`, which must not be
/// read as two translations.
fn parse_batch_response(value: &Value, expected: usize) -> Result<Vec<String>, BackendError> {
    let malformed = || BackendError::Transient(format!("unexpected batch response: {value}"));
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) if expected == 1 && items.len() == 2 && items[0].is_string() => {
            items[0]
                .as_str()
                .map(|s| vec![s.to_string()])
                .ok_or_else(malformed)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Array(parts) => parts.first().and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(malformed),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn translator(server: &MockServer) -> GoogleTranslator {
        GoogleTranslator::new(&server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parses_both_response_shapes() {
        assert_eq!(
            parse_batch_response(&json!(["olá", "mundo"]), 2).unwrap(),
            vec!["olá", "mundo"]
        );
        assert_eq!(
            parse_batch_response(&json!([["olá", "en"], ["mundo", "en"]]), 2).unwrap(),
            vec!["olá", "mundo"]
        );
        assert_eq!(parse_batch_response(&json!("olá"), 1).unwrap(), vec!["olá"]);
        assert!(parse_batch_response(&json!({"error": 1}), 1).unwrap_err().is_transient());
    }

    #[test]
    fn single_auto_text_is_one_translation() {
        assert_eq!(parse_batch_response(&json!(["olá", "en"]), 1).unwrap(), vec!["olá"]);
        assert_eq!(parse_batch_response(&json!([["olá", "en"]]), 1).unwrap(), vec!["olá"]);
        assert_eq!(
            parse_batch_response(&json!(["olá", "en"]), 2).unwrap(),
            vec!["olá", "en"]
        );
    }

    #[tokio::test]
    async fn auto_source_single_text_round_trip() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/translate_a/t")
                    .query_param("sl", "auto")
                    .body_contains("q=hello");
                then.status(200).json_body(json!(["bonjour", "en"]));
            })
            .await;
        let out = translator(&server)
            .translate_batch(&["hello".to_string()], AUTO_LANGUAGE, "fr")
            .await
            .unwrap();
        assert_eq!(out, vec!["bonjour"]);
    }

    #[tokio::test]
    async fn sends_one_request_per_batch() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/translate_a/t")
                    .query_param("sl", "en")
                    .query_param("tl", "fr")
                    .body_contains("q=hello")
                    .body_contains("q=world");
                then.status(200).json_body(json!(["bonjour", "monde"]));
            })
            .await;
        let out = translator(&server)
            .translate_batch(&["hello".to_string(), "world".to_string()], "en", "fr")
            .await
            .unwrap();
        assert_eq!(out, vec!["bonjour", "monde"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/translate_a/t");
                then.status(429);
            })
            .await;
        let err = translator(&server)
            .translate_batch(&["hello".to_string()], "en", "fr")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn bad_request_is_permanent() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/translate_a/t");
                then.status(400);
            })
            .await;
        let err = translator(&server)
            .translate_batch(&["hello".to_string()], "en", "xx")
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn detects_language_from_single_endpoint() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/translate_a/single")
                    .query_param("sl", "auto")
                    .query_param("q", "bonjour");
                then.status(200)
                    .json_body(json!([[["hello", "bonjour", null, null, 1]], null, "fr"]));
            })
            .await;
        let lang = translator(&server).detect_language("bonjour").await.unwrap();
        assert_eq!(lang, "fr");
    }
}
