// src/vision/describe.rs

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::VisionConfig;
use crate::error::VisionError;

pub const PROMPT: &str = "You are an assistant for a visually impaired person. \
Describe the scene in one short sentence, focusing on obstacles and walking safety.";

/// External scene description. `Ok(None)` means the service answered with
/// no usable text.
pub trait SceneDescriber: Send {
    fn describe(&self, jpeg: &[u8]) -> Result<Option<String>, VisionError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn request_body(jpeg: &[u8]) -> GenerateRequest<'static> {
    GenerateRequest {
        contents: [Content {
            parts: [
                Part::Text { text: PROMPT },
                Part::Image {
                    inline_data: InlineData {
                        mime_type: "image/jpeg",
                        data: general_purpose::STANDARD.encode(jpeg),
                    },
                },
            ],
        }],
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a response body.
pub fn parse_description(body: &str) -> Result<Option<String>, VisionError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| VisionError::Malformed(e.to_string()))?;
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| VisionError::Malformed("no candidate text".into()))?;

    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Gemini `generateContent` over REST.
pub struct GeminiDescriber {
    client: Client,
    url: String,
}

impl GeminiDescriber {
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            config.api_url.trim_end_matches('/'),
            config.model,
            config.api_key.trim()
        );
        Ok(Self { client, url })
    }
}

impl SceneDescriber for GeminiDescriber {
    fn describe(&self, jpeg: &[u8]) -> Result<Option<String>, VisionError> {
        let response = self.client.post(&self.url).json(&request_body(jpeg)).send()?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(VisionError::Throttled),
            status if !status.is_success() => Err(VisionError::Status(status.as_u16())),
            _ => parse_description(&response.text()?),
        }
    }
}
