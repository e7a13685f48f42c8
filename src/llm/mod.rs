pub mod extract;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM did not respond within {0:?}")]
    Timeout(Duration),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else if err.is_decode() {
            LlmError::ResponseError(err.to_string())
        } else {
            LlmError::ConnectionError(err.to_string())
        }
    }
}

/// A text-generation service: one prompt in, free text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

pub struct LlmManager {
    generator: Box<dyn TextGenerator + Send + Sync>,
    timeout: Duration,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let generator: Box<dyn TextGenerator + Send + Sync> = match config.backend.as_str() {
            "gemini" => Box::new(providers::gemini::GeminiProvider::new(config, timeout)?),
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config, timeout)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config, timeout)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )));
            }
        };

        Ok(Self::with_generator(generator, timeout))
    }

    pub fn with_generator(generator: Box<dyn TextGenerator + Send + Sync>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub fn backend_name(&self) -> &str {
        self.generator.name()
    }

    /// Sends `prompt` and pulls the first `sql` block out of the answer.
    ///
    /// `Ok(None)` means the service answered but produced no SQL block.
    pub async fn generate_sql(&self, prompt: &str) -> Result<Option<String>, LlmError> {
        info!("Sending prompt to {} ({} chars)", self.generator.name(), prompt.len());
        debug!("Prompt: {}", prompt);

        let response = tokio::time::timeout(self.timeout, self.generator.complete(prompt))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))??;

        debug!("Raw response from {}: {}", self.generator.name(), response);

        let sql = extract::extract_sql_block(&response);
        match &sql {
            Some(sql) => info!("Extracted SQL: {}", sql),
            None => warn!("No fenced sql block in {} response", self.generator.name()),
        }
        Ok(sql)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Replies with a canned response and records every prompt it receives.
    pub struct ScriptedGenerator {
        pub reply: Result<String, String>,
        pub delay: Option<Duration>,
        pub prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedGenerator {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                delay: None,
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(LlmError::ResponseError)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
