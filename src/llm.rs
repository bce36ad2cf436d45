//! Text understanding and generation services.
//!
//! Both capabilities are black boxes with non-deterministic output; the
//! orchestrator validates structural shape and fails soft on malformed
//! results. [`TextService`] is the only seam through which the engine
//! talks to a language model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::OpenAiConfig;
use crate::retry::RetryPolicy;
use crate::types::LicenseerError;

/// Candidate package names pulled out of a free-text query.
///
/// Either field may be absent when the model could not confidently name
/// two packages; callers must treat that as "ask the user", not an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PackageExtraction {
    pub package1: Option<String>,
    pub package2: Option<String>,
}

impl PackageExtraction {
    /// Both names, when the extraction is complete and non-empty.
    pub fn pair(&self) -> Option<(String, String)> {
        match (&self.package1, &self.package2) {
            (Some(a), Some(b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
                Some((a.trim().to_string(), b.trim().to_string()))
            }
            _ => None,
        }
    }
}

/// External NLP collaborator: entity extraction plus prose generation.
#[async_trait]
pub trait TextService: Send + Sync {
    /// Extract up to two candidate package names from a query.
    async fn extract_packages(&self, query: &str) -> Result<PackageExtraction, LicenseerError>;

    /// Generate prose from a fully assembled prompt.
    async fn generate(&self, prompt: &str) -> Result<String, LicenseerError>;
}

// ── OpenAI-compatible implementation ───────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiTextService {
    client: reqwest::Client,
    config: OpenAiConfig,
    retry: RetryPolicy,
}

impl OpenAiTextService {
    pub fn new(config: OpenAiConfig, retry: RetryPolicy) -> Result<Self, LicenseerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LicenseerError::ExternalService(err.to_string()))?;
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, LicenseerError> {
        let body = json!({
            "model": self.config.chat_model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.1,
        });
        let response = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LicenseerError::ExternalService("chat response had no choices".into()))
    }

    fn extraction_prompt(query: &str) -> String {
        format!(
            "You are a helpful assistant that extracts package names from queries.\n\
             Extract the names of two software packages from the following query.\n\
             Return only a JSON object with two fields: 'package1' and 'package2'.\n\
             If you can't identify two packages, return null for both fields.\n\n\
             Query: {query}\n\n\
             Example response format:\n\
             {{\n  \"package1\": \"requests\",\n  \"package2\": \"urllib3\"\n}}"
        )
    }
}

#[async_trait]
impl TextService for OpenAiTextService {
    async fn extract_packages(&self, query: &str) -> Result<PackageExtraction, LicenseerError> {
        let prompt = Self::extraction_prompt(query);
        let raw = self.retry.run(|| self.complete(&prompt)).await?;
        Ok(parse_extraction(&raw))
    }

    async fn generate(&self, prompt: &str) -> Result<String, LicenseerError> {
        debug!(model = %self.config.chat_model, "generating answer");
        self.retry.run(|| self.complete(prompt)).await
    }
}

/// Pull a `PackageExtraction` out of model output.
///
/// Models wrap JSON in prose or code fences often enough that we locate
/// the outermost braces before parsing. Anything unparseable degrades to
/// an empty extraction.
fn parse_extraction(raw: &str) -> PackageExtraction {
    let candidate = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            warn!("extraction output contained no JSON object");
            return PackageExtraction::default();
        }
    };
    match serde_json::from_str::<PackageExtraction>(candidate) {
        Ok(extraction) => extraction,
        Err(err) => {
            warn!(error = %err, "extraction output was not valid JSON");
            PackageExtraction::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"package1": "requests", "package2": "urllib3"}"#;
        let extraction = parse_extraction(raw);
        assert_eq!(
            extraction.pair(),
            Some(("requests".to_string(), "urllib3".to_string()))
        );
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"package1\": \"tokio\", \"package2\": \"serde\"}\n```";
        let extraction = parse_extraction(raw);
        assert_eq!(
            extraction.pair(),
            Some(("tokio".to_string(), "serde".to_string()))
        );
    }

    #[test]
    fn nulls_yield_no_pair() {
        let raw = r#"{"package1": null, "package2": null}"#;
        assert_eq!(parse_extraction(raw).pair(), None);
    }

    #[test]
    fn garbage_degrades_to_empty_extraction() {
        assert_eq!(parse_extraction("no json here"), PackageExtraction::default());
        assert_eq!(parse_extraction("{broken"), PackageExtraction::default());
    }

    #[test]
    fn blank_names_yield_no_pair() {
        let raw = r#"{"package1": "  ", "package2": "serde"}"#;
        assert_eq!(parse_extraction(raw).pair(), None);
    }
}
