//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AspectRatio, GenerationRequest, GenerationResponse, ImageGenerator};
use crate::config::GeminiConfig;
use crate::errors::{GenerationError, GenerationResult};

const IMAGE_SIZE: &str = "1K";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> GenerationResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GenerationError::NotConfigured("GEMINI_API_KEY".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerationRequest) -> GenerationResult<GenerationResponse> {
        request.validate()?;
        let body = build_body(&request);

        debug!(
            model = %self.model,
            aspect_ratio = %request.aspect_ratio.unwrap_or_default(),
            with_image = request.inline_image().is_some(),
            "Calling Gemini generateContent"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = provider_message(&text).unwrap_or_else(|| "Gemini request failed".to_string());
            warn!(status = status.as_u16(), "Gemini returned an error: {}", message);
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        parse_response(&text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataRef<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataRef<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
    image_config: ImageConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    image_size: &'static str,
    aspect_ratio: AspectRatio,
}

fn build_body(request: &GenerationRequest) -> RequestBody<'_> {
    let mut parts = Vec::with_capacity(2);
    if let Some(data) = request.inline_image() {
        parts.push(RequestPart::Image {
            inline_data: InlineDataRef {
                mime_type: "image/png",
                data,
            },
        });
    }
    parts.push(RequestPart::Text {
        text: &request.prompt,
    });

    RequestBody {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: GenerationConfig {
            response_modalities: ["TEXT", "IMAGE"],
            image_config: ImageConfig {
                image_size: IMAGE_SIZE,
                aspect_ratio: request.aspect_ratio.unwrap_or_default(),
            },
        },
    }
}

#[derive(Deserialize, Default)]
struct ResponseBody {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Joined text parts and the first inline image of the first candidate.
pub fn parse_response(body: &str) -> GenerationResult<GenerationResponse> {
    let parsed: ResponseBody =
        serde_json::from_str(body).map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

    let parts = parsed
        .candidates
        .into_iter()
        .next()
        .map(|candidate| candidate.content.parts)
        .unwrap_or_default();

    let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    let image_url = parts
        .into_iter()
        .find_map(|p| p.inline_data)
        .map(|inline| format!("data:image/png;base64,{}", inline.data));

    Ok(GenerationResponse {
        text: Some(text).filter(|t| !t.is_empty()),
        image_url,
    })
}

fn provider_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
}
