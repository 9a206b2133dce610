use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const MODEL: &str = "gemini-2.0-flash";

/// Everything the analyzer knows about one failed execution.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub pc_name: String,
    pub task_name: String,
    pub result_code: Option<i64>,
    pub result_message: String,
}

/// Asks Gemini for a plain-language explanation of a task failure.
///
/// Analysis is advisory: any failure here (no key, network, a response
/// shape we don't recognize) degrades to a static message so the caller
/// never has to branch on it.
pub struct GeminiAnalyzer {
    client: Client,
    api_key: Option<String>,
    api_url: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    /// Point the analyzer at a different endpoint (tests).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Analyze one failure. Always returns display-ready text.
    pub async fn analyze(&self, context: &ErrorContext) -> String {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                tracing::debug!("No Gemini API key; skipping analysis");
                return "AI analysis is not available (no API key configured).".to_string();
            }
        };

        match self.call_api(api_key, &build_prompt(context)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    pc = %context.pc_name,
                    task = %context.task_name,
                    "Gemini analysis failed: {}",
                    e
                );
                "AI analysis was unavailable for this error.".to_string()
            }
        }
    }

    async fn call_api(&self, api_key: &str, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.api_url, MODEL, api_key
            ))
            .header("content-type", "application/json")
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": 0.3,
                    "maxOutputTokens": 1024,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(crate::Error::ApiError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let result: GeminiResponse = response.json().await?;
        result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| crate::Error::ParseError("empty Gemini response".to_string()))
    }
}

fn build_prompt(context: &ErrorContext) -> String {
    let code = context
        .result_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        r#"A Windows scheduled task failed. Explain the likely cause and suggest
concrete remediation steps an IT administrator can take. Be brief and
practical; do not speculate beyond the evidence.

PC: {}
Task: {}
Result code: {}
Message: {}
"#,
        context.pc_name, context.task_name, code, context.result_message
    )
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ErrorContext {
        ErrorContext {
            pc_name: "PC-A".to_string(),
            task_name: "Backup".to_string(),
            result_code: Some(267014),
            result_message: "The last run of the task was terminated by the user.".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_key_yields_static_message() {
        let analyzer = GeminiAnalyzer::new(None);
        assert!(!analyzer.is_configured());
        let text = analyzer.analyze(&context()).await;
        assert!(text.contains("not available"));
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let analyzer = GeminiAnalyzer::new(Some("   ".to_string()));
        assert!(!analyzer.is_configured());
    }

    #[tokio::test]
    async fn successful_response_text_is_returned() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                mockito::Matcher::Regex(r"^/v1beta/models/gemini-2.0-flash:generateContent".to_string()),
            )
            .with_status(200)
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"The task was cancelled manually."}]}}]}"#,
            )
            .create_async()
            .await;

        let analyzer =
            GeminiAnalyzer::new(Some("test-key".to_string())).with_api_url(server.url());
        let text = analyzer.analyze(&context()).await;

        mock.assert_async().await;
        assert_eq!(text, "The task was cancelled manually.");
    }

    #[tokio::test]
    async fn api_failure_degrades_to_fallback_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "POST",
                mockito::Matcher::Regex(r"^/v1beta/models/".to_string()),
            )
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let analyzer =
            GeminiAnalyzer::new(Some("test-key".to_string())).with_api_url(server.url());
        let text = analyzer.analyze(&context()).await;
        assert!(text.contains("unavailable"));
    }

    #[tokio::test]
    async fn empty_candidates_degrade_to_fallback_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "POST",
                mockito::Matcher::Regex(r"^/v1beta/models/".to_string()),
            )
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let analyzer =
            GeminiAnalyzer::new(Some("test-key".to_string())).with_api_url(server.url());
        let text = analyzer.analyze(&context()).await;
        assert!(text.contains("unavailable"));
    }
}
