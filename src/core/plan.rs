use crate::core::error::PlanError;
use serde::Serialize;
use std::fmt;

/// Unstructured creative input, either typed by a user or produced by
/// captioning an image or video. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreativeBrief(String);

impl CreativeBrief {
    pub fn new(text: impl Into<String>) -> Result<Self, PlanError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PlanError::EmptyBrief);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CreativeBrief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// MIME type the media is uploaded with. Images are re-encoded to PNG
    /// before upload; videos go out untouched as MP4.
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/png",
            MediaKind::Video => "video/mp4",
        }
    }
}

/// A validated short-form video plan.
///
/// Only `normalize_and_validate` builds one; JSON is read back through it,
/// never deserialized directly. The JSON keys match the field list the
/// prompts ask the model for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreativePlan {
    pub(crate) title: String,
    pub(crate) concept_summary: String,
    pub(crate) hook: String,
    pub(crate) visual_style: String,
    pub(crate) tone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) audience: Option<String>,
    #[serde(rename = "scene_ideas")]
    pub(crate) scenes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) characters: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) inspirations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) dialogue_ideas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) soundtrack_style: Option<String>,
    #[serde(rename = "foley_fx", skip_serializing_if = "Vec::is_empty")]
    pub(crate) foley_effects: Vec<String>,
    // Legacy schema extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) intended_platform: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) hashtags: Vec<String>,
}

impl CreativePlan {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn concept_summary(&self) -> &str {
        &self.concept_summary
    }

    pub fn hook(&self) -> &str {
        &self.hook
    }

    pub fn visual_style(&self) -> &str {
        &self.visual_style
    }

    pub fn tone(&self) -> &str {
        &self.tone
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn scenes(&self) -> &[String] {
        &self.scenes
    }

    pub fn characters(&self) -> &[String] {
        &self.characters
    }

    pub fn inspirations(&self) -> &[String] {
        &self.inspirations
    }

    pub fn dialogue_ideas(&self) -> &[String] {
        &self.dialogue_ideas
    }

    pub fn soundtrack_style(&self) -> Option<&str> {
        self.soundtrack_style.as_deref()
    }

    pub fn foley_effects(&self) -> &[String] {
        &self.foley_effects
    }

    pub fn intended_platform(&self) -> Option<&str> {
        self.intended_platform.as_deref()
    }

    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
