use crate::config::LlmConfig;
use crate::llm::{LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    prompt: String,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            timeout,
        })
    }
}

fn parse_response(response_text: &str) -> Result<String, LlmError> {
    let ollama_response = serde_json::from_str::<OllamaResponse>(response_text).map_err(|e| {
        error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
        LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
    })?;

    if ollama_response.done == Some(false) {
        debug!("Ollama reported an unfinished generation");
    }

    if ollama_response.response.trim().is_empty() {
        return Err(LlmError::ResponseError("Ollama returned an empty response".to_string()));
    }

    Ok(ollama_response.response)
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            temperature: 0.1,
            stream: false, // Explicitly disable streaming
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Get the raw text response first for diagnostics
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;

        parse_response(&response_text)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let text = r#"{"model":"sqlcoder","created_at":"2024-01-01T00:00:00Z","response":"```sql\nSELECT 1\n```","done":true}"#;
        assert_eq!(parse_response(text).unwrap(), "```sql\nSELECT 1\n```");
    }

    #[test]
    fn test_parse_rejects_garbage_and_blank() {
        assert!(matches!(parse_response("<html>"), Err(LlmError::ResponseError(_))));
        assert!(matches!(
            parse_response(r#"{"response":"   ","done":true}"#),
            Err(LlmError::ResponseError(_))
        ));
    }
}
