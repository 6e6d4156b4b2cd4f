use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::GenerationError;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: usize,
    pub temperature: f32,
    pub stop: Vec<String>,
}

impl GenerationOptions {
    pub fn new(max_tokens: usize, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
            stop: default_stop_sequences(),
        }
    }

    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self.clone()
        }
    }
}

pub fn default_stop_sequences() -> Vec<String> {
    ["</s>", "Human:", "<think>", "<reasoning>", "<scratchpad>"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub options: GenerationOptions,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    fn name(&self) -> &str;
}

#[derive(Clone)]
pub struct GenerationHandle {
    backend: Arc<dyn Generator>,
    generation_limit: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl GenerationHandle {
    pub fn new(backend: Arc<dyn Generator>, timeout: Option<Duration>) -> Self {
        Self::with_limit(backend, Arc::new(Semaphore::new(1)), timeout)
    }

    pub fn with_limit(
        backend: Arc<dyn Generator>,
        generation_limit: Arc<Semaphore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            generation_limit,
            timeout,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn close(&self) {
        self.generation_limit.close();
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let _permit = self
            .generation_limit
            .acquire()
            .await
            .map_err(|_| GenerationError::Closed)?;

        let Some(limit) = self.timeout else {
            return self.backend.generate(request).await;
        };

        match tokio::time::timeout(limit, self.backend.generate(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    timeout_secs = limit.as_secs_f32(),
                    "generation call timed out"
                );
                Err(GenerationError::Timeout(limit))
            }
        }
    }
}
