use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{CoreError, CoreResult};
use crate::services::generation::AspectRatio;

pub const MAX_TITLE_LENGTH: usize = 100;

/// Prompts longer than this are cut when used as a project title.
pub const AUTO_TITLE_LENGTH: usize = 50;

pub const MAX_PROMPT_LENGTH: usize = 10_000;

static DATA_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^data:image/(png|jpeg|jpg|webp|gif);base64,[A-Za-z0-9+/]+=*$").ok());

static BASE64_PAYLOAD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]+=*$").ok());

/// Input checks shared by the services
pub struct ValidationService;

impl ValidationService {
    /// Trimmed, non-empty title of at most 100 characters.
    pub fn validate_title(title: &str) -> CoreResult<String> {
        let trimmed = title.trim();

        if trimmed.is_empty() {
            return Err(CoreError::validation("Project title cannot be empty"));
        }

        if trimmed.chars().count() > MAX_TITLE_LENGTH {
            return Err(CoreError::validation(format!(
                "Project title is too long (max {} characters)",
                MAX_TITLE_LENGTH
            )));
        }

        Ok(trimmed.to_string())
    }

    /// Title derived from the first prompt of a project.
    pub fn auto_title(prompt: &str) -> String {
        prompt.chars().take(AUTO_TITLE_LENGTH).collect()
    }

    pub fn validate_prompt(prompt: &str) -> CoreResult<()> {
        if prompt.trim().is_empty() {
            return Err(CoreError::validation("Prompt is required"));
        }
        if prompt.chars().count() > MAX_PROMPT_LENGTH {
            return Err(CoreError::validation(format!(
                "Prompt is too long (max {} characters)",
                MAX_PROMPT_LENGTH
            )));
        }
        Ok(())
    }

    pub fn validate_aspect_ratio(value: &str) -> CoreResult<AspectRatio> {
        value.parse::<AspectRatio>().map_err(CoreError::validation)
    }

    /// Accepts inline `data:image/...;base64,` URLs only.
    pub fn validate_image_url(url: &str) -> CoreResult<()> {
        match DATA_URL.as_ref() {
            Some(regex) if regex.is_match(url) => Ok(()),
            Some(_) => Err(CoreError::validation(
                "Image must be an inline base64 data URL",
            )),
            None => Err(CoreError::internal("Failed to compile image URL regex")),
        }
    }

    pub fn validate_base64(payload: &str) -> CoreResult<()> {
        match BASE64_PAYLOAD.as_ref() {
            Some(regex) if regex.is_match(payload) => Ok(()),
            Some(_) => Err(CoreError::validation("Image payload is not valid base64")),
            None => Err(CoreError::internal("Failed to compile base64 regex")),
        }
    }
}
