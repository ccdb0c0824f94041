//! Image generation seam.
//!
//! The conversation flow talks to an [`ImageGenerator`]; the Gemini client
//! is the production implementation.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{GenerationError, GenerationResult};

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;

/// Inline images shorter than this are placeholders and never sent.
pub const MIN_INLINE_IMAGE_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Wide,
        AspectRatio::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "Unsupported aspect ratio '{}' (expected one of 1:1, 3:4, 4:3, 16:9, 9:16)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Base64 payload without the `data:` prefix.
    pub image_base64: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_base64: None,
            aspect_ratio: None,
        }
    }

    /// Image payload worth sending as inline data.
    pub fn inline_image(&self) -> Option<&str> {
        self.image_base64
            .as_deref()
            .filter(|payload| payload.len() > MIN_INLINE_IMAGE_LEN)
    }

    pub fn validate(&self) -> GenerationResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub text: Option<String>,
    /// `data:image/png;base64,...`
    pub image_url: Option<String>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> GenerationResult<GenerationResponse>;
}

/// Stand-in used when no API key is configured; every call fails.
pub struct UnconfiguredGenerator {
    setting: String,
}

impl UnconfiguredGenerator {
    pub fn new(setting: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for UnconfiguredGenerator {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _request: GenerationRequest) -> GenerationResult<GenerationResponse> {
        Err(GenerationError::NotConfigured(self.setting.clone()))
    }
}
