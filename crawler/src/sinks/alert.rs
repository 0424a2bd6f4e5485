//! HTTP alert webhook, grounded in
//! `original_source/apps/crawler/src/database.py::trigger_alert_processing`:
//! a bearer-authenticated POST of `{"checkMinutes": n}` to a configured URL.

use async_trait::async_trait;
use crawler_net::sinks::{AlertSink, SinkError};
use serde::Serialize;

#[derive(Serialize)]
struct CheckOverduePayload {
    #[serde(rename = "checkMinutes")]
    check_minutes: u32,
}

pub struct HttpAlertSink {
    client: reqwest::Client,
    webhook_url: String,
    api_key: String,
}

impl HttpAlertSink {
    pub fn new(webhook_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        HttpAlertSink {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl AlertSink for HttpAlertSink {
    async fn notify_check_overdue(&self, check_minutes: u32) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .bearer_auth(&self.api_key)
            .json(&CheckOverduePayload { check_minutes })
            .send()
            .await
            .map_err(|e| SinkError::Failed(format!("alert webhook request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SinkError::Failed(format!(
                "alert webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
