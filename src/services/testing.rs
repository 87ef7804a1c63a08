//! Scripted capabilities shared by the unit tests.

use crate::core::error::ServiceError;
use crate::core::plan::MediaKind;
use crate::services::llm::LlmClient;
use crate::services::vision::VisionClient;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned answers for the seven chain stages, ending with `plan_json`.
pub(crate) fn canned_chain(plan_json: &str) -> Vec<String> {
    vec![
        "ESSENCE: lonely growth in a dead place".to_string(),
        "1. Moon florist\n2. Crater garden\n3. Petal comet\n4. Dust bouquet\n5. Orbit wedding".to_string(),
        "Crater garden, because bioluminescent petals against grey dust look unreal.".to_string(),
        "An astronaut coaxes glowing tulips out of a crater while Earth rises behind her.".to_string(),
        "STORY DRAFT paragraph".to_string(),
        "FINAL STORY paragraph".to_string(),
        plan_json.to_string(),
    ]
}

/// Answers prompts from a fixed script, one entry per call.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedLlm {
    responses: Vec<String>,
    prompts: Arc<Mutex<Vec<String>>>,
    fail_on_call: Option<usize>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub(crate) fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            prompts: Arc::new(Mutex::new(Vec::new())),
            fail_on_call: None,
            delay: None,
        }
    }

    /// The n-th call (1-based) fails with a service error.
    pub(crate) fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on_call == Some(call) {
            return Err(ServiceError::Api {
                backend: "Scripted",
                status: 503,
                body: "quota exceeded".to_string(),
            });
        }

        self.responses
            .get(call - 1)
            .cloned()
            .ok_or_else(|| ServiceError::EmptyResponse {
                backend: "Scripted",
                reason: format!("no scripted response for call {}", call),
            })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedVision {
    caption: Option<String>,
    calls: Arc<Mutex<Vec<MediaKind>>>,
}

impl ScriptedVision {
    pub(crate) fn captioning(caption: &str) -> Self {
        Self {
            caption: Some(caption.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            caption: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn calls(&self) -> Vec<MediaKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionClient for ScriptedVision {
    async fn caption(&self, bytes: &[u8], kind: MediaKind) -> Result<String, ServiceError> {
        self.calls.lock().unwrap().push(kind);
        if bytes.is_empty() {
            return Err(ServiceError::InvalidMedia("no media bytes".to_string()));
        }
        self.caption
            .clone()
            .ok_or_else(|| ServiceError::Backend {
                backend: "Scripted",
                message: "vision model unavailable".to_string(),
            })
    }
}
