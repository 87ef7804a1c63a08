use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub planner: PlannerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "gemini", "ollama" or "openai"
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    pub model: String,
}

/// Captioning always goes through Gemini and shares its API key.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default = "default_vision_model")]
    pub model: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self { model: default_vision_model() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PlannerConfig {
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub stage_timeout_seconds: Option<u64>,
}

impl PlannerConfig {
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_seconds.map(Duration::from_secs)
    }
}

/// How a brief is turned into raw plan JSON.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Seven dependent model calls, each refining the previous answer.
    #[default]
    Chained,
    /// One model call straight from brief to JSON.
    SingleShot,
}

fn default_retry_count() -> usize {
    3
}
fn default_retry_delay() -> u64 {
    10
}
fn default_gemini_model() -> String {
    "gemini-1.5-pro-latest".to_string()
}
fn default_openai_model() -> String {
    "gpt-4".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_vision_model() -> String {
    "gemini-2.5-pro".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.apply_env_credentials();
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Blank API keys fall back to the usual environment variables.
    pub fn apply_env_credentials(&mut self) {
        if let Some(gemini) = self.llm.gemini.as_mut() {
            if gemini.api_key.trim().is_empty() {
                if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
                    gemini.api_key = key;
                }
            }
        }
        if let Some(openai) = self.llm.openai.as_mut() {
            if openai.api_key.trim().is_empty() {
                if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                    openai.api_key = key;
                }
            }
        }
    }

    /// Gemini key used for captioning, from the `llm.gemini` section or the
    /// environment.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.llm
            .gemini
            .as_ref()
            .map(|g| g.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
    }
}
