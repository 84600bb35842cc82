// Translation as an ordered strategy chain
//
// Each backend implements a single attempt; the chain takes the first
// success and bottoms out in an identity fallback, so the stage as a whole
// never errors: worst case the "translation" equals the source text.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TranslationConfig;
use crate::error::{DubError, Result};

/// One translation attempt against a single provider.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String>;
}

/// Google-translate style REST backend (primary provider).
pub struct GoogleTranslateBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleTranslateBackend {
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            endpoint: config.primary_endpoint.clone(),
            api_key: config.primary_api_key.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTranslateResponse {
    data: GoogleTranslateData,
}

#[derive(Debug, Deserialize)]
struct GoogleTranslateData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
struct GoogleTranslation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[async_trait]
impl TranslationBackend for GoogleTranslateBackend {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(DubError::Provider(
                "Primary translation provider has no API key".to_string(),
            ));
        }

        let url = format!(
            "{}/language/translate/v2?key={}",
            self.endpoint, self.api_key
        );
        let body = json!({
            "q": text,
            "source": source_language,
            "target": target_language,
            "format": "text",
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DubError::Provider(format!("Primary translation failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DubError::Provider(format!(
                "Primary translation API error: {}",
                response.status()
            )));
        }

        let parsed: GoogleTranslateResponse = response
            .json()
            .await
            .map_err(|e| DubError::Provider(format!("Failed to parse translation: {}", e)))?;

        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| DubError::Provider("Empty translation response".to_string()))
    }
}

/// MyMemory-style free-tier REST backend (secondary provider).
pub struct MyMemoryBackend {
    client: Client,
    endpoint: String,
}

impl MyMemoryBackend {
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            endpoint: config.fallback_endpoint.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: MyMemoryData,
}

#[derive(Debug, Deserialize)]
struct MyMemoryData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

#[async_trait]
impl TranslationBackend for MyMemoryBackend {
    fn name(&self) -> &'static str {
        "mymemory"
    }

    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        let url = format!("{}/get", self.endpoint);
        let langpair = format!("{}|{}", source_language, target_language);

        let response = self
            .client
            .get(&url)
            .query(&[("q", text), ("langpair", &langpair)])
            .send()
            .await
            .map_err(|e| DubError::Provider(format!("Fallback translation failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DubError::Provider(format!(
                "Fallback translation API error: {}",
                response.status()
            )));
        }

        let parsed: MyMemoryResponse = response
            .json()
            .await
            .map_err(|e| DubError::Provider(format!("Failed to parse translation: {}", e)))?;

        parsed
            .response_data
            .translated_text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DubError::Provider("Empty translation response".to_string()))
    }
}

/// Ordered fallback chain over translation backends. `translate` is
/// infallible by construction: when every backend fails the source text is
/// returned untranslated.
pub struct TranslationChain {
    backends: Vec<Box<dyn TranslationBackend>>,
}

impl TranslationChain {
    pub fn new(backends: Vec<Box<dyn TranslationBackend>>) -> Self {
        Self { backends }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(vec![
            Box::new(GoogleTranslateBackend::new(config)),
            Box::new(MyMemoryBackend::new(config)),
        ])
    }

    pub async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> String {
        for backend in &self.backends {
            match backend
                .translate(text, source_language, target_language)
                .await
            {
                Ok(translated) => {
                    info!(
                        backend = backend.name(),
                        target = target_language,
                        "Translation succeeded"
                    );
                    return translated;
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Translation backend failed");
                }
            }
        }

        warn!(
            target = target_language,
            "All translation backends failed, returning untranslated text"
        );
        text.to_string()
    }
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("HTTP client creation should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    #[async_trait]
    impl TranslationBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn translate(&self, _: &str, _: &str, _: &str) -> Result<String> {
            Err(DubError::Provider("unreachable".to_string()))
        }
    }

    struct FixedBackend(&'static str);

    #[async_trait]
    impl TranslationBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn translate(&self, _: &str, _: &str, _: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_chain_takes_first_success() {
        let chain = TranslationChain::new(vec![
            Box::new(FailingBackend),
            Box::new(FixedBackend("नमस्ते")),
            Box::new(FixedBackend("never reached")),
        ]);
        let out = chain.translate("hello", "en", "hi").await;
        assert_eq!(out, "नमस्ते");
    }

    #[tokio::test]
    async fn test_chain_degrades_to_source_text() {
        let chain = TranslationChain::new(vec![Box::new(FailingBackend), Box::new(FailingBackend)]);
        let out = chain.translate("hello world", "en", "hi").await;
        assert_eq!(out, "hello world");
    }
}
