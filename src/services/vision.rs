use crate::core::config::Config;
use crate::core::error::ServiceError;
use crate::core::plan::MediaKind;
use crate::services::llm::{gemini_generate, GeminiContent, GeminiInlineData, GeminiPart, GeminiRequest};
use crate::services::prompts;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, info};
use std::fmt::Debug;
use std::io::Cursor;
use std::sync::Arc;

/// Describes an image or video as one paragraph of text.
#[async_trait]
pub trait VisionClient: Send + Sync + Debug {
    async fn caption(&self, bytes: &[u8], kind: MediaKind) -> Result<String, ServiceError>;
}

pub fn create_vision(config: &Config) -> Result<Arc<dyn VisionClient>> {
    let api_key = config
        .gemini_api_key()
        .ok_or_else(|| anyhow!("Captioning needs a Gemini api key (llm.gemini.api_key or GOOGLE_API_KEY)"))?;
    info!("Initialized vision client with model: {}", config.vision.model);
    Ok(Arc::new(GeminiVisionClient::new(&api_key, &config.vision.model)))
}

/// Checks the media and turns it into the bytes that get uploaded.
///
/// Images must decode; they are flattened to RGB and re-encoded as PNG.
/// Videos only need to be non-empty and are passed through untouched.
pub fn prepare_media(bytes: &[u8], kind: MediaKind) -> Result<Vec<u8>, ServiceError> {
    if bytes.is_empty() {
        return Err(ServiceError::InvalidMedia("no media bytes".to_string()));
    }
    match kind {
        MediaKind::Video => Ok(bytes.to_vec()),
        MediaKind::Image => {
            let decoded = image::load_from_memory(bytes)
                .map_err(|e| ServiceError::InvalidMedia(format!("image does not decode: {}", e)))?;
            let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
            let mut png = Vec::new();
            rgb.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| ServiceError::InvalidMedia(format!("image re-encode failed: {}", e)))?;
            Ok(png)
        }
    }
}

#[derive(Debug)]
pub struct GeminiVisionClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiVisionClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

fn caption_request(payload: &[u8], kind: MediaKind) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![
                GeminiPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: kind.mime_type().to_string(),
                        data: BASE64.encode(payload),
                    },
                },
                GeminiPart::Text {
                    text: prompts::media_caption(kind),
                },
            ],
        }],
        system_instruction: None,
    }
}

#[async_trait]
impl VisionClient for GeminiVisionClient {
    async fn caption(&self, bytes: &[u8], kind: MediaKind) -> Result<String, ServiceError> {
        let payload = prepare_media(bytes, kind)?;
        debug!("Captioning {:?} ({} bytes)", kind, payload.len());

        let request = caption_request(&payload, kind);
        gemini_generate(&self.client, &self.api_key, &self.model, &request).await
    }
}
