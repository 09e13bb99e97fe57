use log::{error, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{AnalysisError, AnalysisRequest, SidebarAnalysis, SidebarRequest};
use crate::config::AssistantConfig;

#[derive(Deserialize)]
struct AskResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the remote analysis service. One attempt per call, no retries.
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    api_url: String,
    sidebar_api_url: String,
}

impl AnalysisClient {
    pub fn new(config: &AssistantConfig) -> Self {
        let mut builder = Client::builder().user_agent("CodeAssistant/1.0");
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_url: config.api_url.clone(),
            sidebar_api_url: config.sidebar_api_url.clone(),
        }
    }

    pub fn with_urls(api_url: impl Into<String>, sidebar_api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            sidebar_api_url: sidebar_api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Sends one analysis request and returns the result text.
    ///
    /// Non-2xx statuses and an `error` field in the body are both failures.
    pub async fn ask(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        info!("📤 Sending {} analysis request ({} chars)", request.mode, request.question.len());

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("❌ Analysis API error {}: {}", status, body);
            return Err(AnalysisError::Http { status, body });
        }

        let text = response.text().await?;
        let decoded: AskResponse = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        if let Some(message) = decoded.error.filter(|m| !m.is_empty()) {
            error!("❌ Analysis API returned an error: {}", message);
            return Err(AnalysisError::Remote(message));
        }

        match decoded.result {
            Some(Value::String(result)) => {
                info!("✅ Received {} analysis: {} characters", request.mode, result.len());
                Ok(result)
            }
            Some(Value::Null) | None => Err(AnalysisError::InvalidResponse(
                "response has no result".to_string(),
            )),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Sends the sidebar's all-tabs request.
    pub async fn analyze_tabs(&self, request: &SidebarRequest) -> Result<SidebarAnalysis, AnalysisError> {
        info!("📤 Sending sidebar analysis for {} tabs", request.tabs.len());

        let response = self
            .client
            .post(&self.sidebar_api_url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(_) => status.canonical_reason().unwrap_or_default().to_string(),
            };
            error!("❌ Sidebar API error {}: {}", status.as_u16(), body);
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;
        Ok(SidebarAnalysis::from_value(raw))
    }
}
