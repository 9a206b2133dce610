use crate::Result;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Posts failure cards to a Google Chat incoming webhook.
pub struct ChatNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl ChatNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Notify about one failed task execution. A missing webhook is a
    /// quiet no-op; a delivery failure is the caller's to log.
    pub async fn notify_failure(
        &self,
        pc_name: &str,
        task_name: &str,
        result_code: Option<i64>,
        result_message: &str,
        analysis: Option<&str>,
    ) -> Result<()> {
        let webhook_url = match &self.webhook_url {
            Some(url) => url,
            None => {
                tracing::debug!("No chat webhook configured; skipping notification");
                return Ok(());
            }
        };

        let code_text = result_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut widgets = vec![
            json!({ "decoratedText": { "topLabel": "PC", "text": pc_name } }),
            json!({ "decoratedText": { "topLabel": "Task", "text": task_name } }),
            json!({ "decoratedText": { "topLabel": "Result code", "text": code_text } }),
            json!({ "decoratedText": { "topLabel": "Message", "text": result_message } }),
        ];
        if let Some(analysis) = analysis {
            widgets.push(json!({
                "decoratedText": { "topLabel": "AI analysis", "text": analysis, "wrapText": true }
            }));
        }

        let payload = json!({
            "cardsV2": [{
                "cardId": "task-failure",
                "card": {
                    "header": {
                        "title": "Scheduled task failure",
                        "subtitle": format!("{} / {}", pc_name, task_name),
                    },
                    "sections": [{ "widgets": widgets }],
                },
            }],
        });

        let response = self.client.post(webhook_url).json(&payload).send().await?;
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(crate::Error::ApiError(format!(
                "Chat webhook error: {}",
                error_text
            )));
        }

        tracing::info!(pc = pc_name, task = task_name, "Failure notification sent");
        Ok(())
    }
}
