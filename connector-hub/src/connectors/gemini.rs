//! Gemini image generation and Google text-to-speech.

use super::send_json;
use crate::args::Args;
use crate::connector::{not_configured, unknown_operation, Connector};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use toolgate::{GatewayError, ResolvedCredential, ToolResult};

pub const TOOL_NAME: &str = "gemini";
pub const GENERATIVE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const TTS_BASE_URL: &str = "https://texttospeech.googleapis.com/v1";
pub const IMAGE_MODEL: &str = "imagen-3.0-generate-001";
pub const OPERATIONS: &[&str] = &["generate_image", "text_to_speech"];

const DISPLAY_NAME: &str = "Gemini";

/// Generation calls are slow; they get more than the client default.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: Option<String>,
    pub sample_count: i64,
    pub output_mime_type: String,
}

impl ImageRequest {
    fn from_args(args: &Args) -> Self {
        Self {
            prompt: args.text("prompt"),
            sample_count: args.integer("sample_count", 1),
            output_mime_type: args.text_or("output_mime_type", "image/png"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: Option<String>,
    pub language_code: String,
    pub voice_name: String,
    pub audio_encoding: String,
    pub speaking_rate: f64,
    pub pitch: f64,
}

impl SpeechRequest {
    fn from_args(args: &Args) -> Self {
        Self {
            text: args.text("text"),
            language_code: args.text_or("language_code", "en-US"),
            voice_name: args.text_or("voice_name", "en-US-Standard-A"),
            audio_encoding: args.text_or("audio_encoding", "MP3"),
            speaking_rate: args.float("speaking_rate", 1.0),
            pitch: args.float("pitch", 0.0),
        }
    }
}

pub struct GeminiConnector {
    api_key: Option<String>,
    http: Client,
    generative_base_url: String,
    tts_base_url: String,
}

impl GeminiConnector {
    pub fn new(credential: &ResolvedCredential, http: Client) -> Self {
        Self {
            api_key: credential.api_key().map(str::to_string),
            http,
            generative_base_url: GENERATIVE_BASE_URL.to_string(),
            tts_base_url: TTS_BASE_URL.to_string(),
        }
    }

    /// Serve both APIs from one root (for testing with a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.generative_base_url = base_url.clone();
        self.tts_base_url = base_url;
        self
    }

    /// Images come back base64-encoded. `sample_count` is clamped to 1..=4.
    pub async fn generate_image(&self, request: ImageRequest) -> ToolResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return not_configured(DISPLAY_NAME);
        };
        let Some(prompt) = request.prompt else {
            return GatewayError::Validation("prompt is required".into()).into();
        };

        let url = format!(
            "{}/models/{}:generateImages",
            self.generative_base_url, IMAGE_MODEL
        );
        let payload = json!({
            "prompt": {"text": prompt},
            "imageParameters": {
                "sampleCount": request.sample_count.clamp(1, 4),
                "outputMimeType": request.output_mime_type,
            },
        });
        let http_request = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .timeout(REQUEST_TIMEOUT)
            .json(&payload);

        match send_json(http_request).await {
            Ok(data) => {
                let images = extract_images(&data);
                ToolResult::ok()
                    .with("prompt", prompt)
                    .with("count", images.len())
                    .with("images", images)
                    .with("output_mime_type", request.output_mime_type)
            }
            Err(e) => e.into(),
        }
    }

    /// Audio comes back base64-encoded in `audio_content`.
    pub async fn text_to_speech(&self, request: SpeechRequest) -> ToolResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return not_configured(DISPLAY_NAME);
        };
        let Some(text) = request.text else {
            return GatewayError::Validation("text is required".into()).into();
        };

        let payload = json!({
            "input": {"text": text},
            "voice": {"languageCode": request.language_code, "name": request.voice_name},
            "audioConfig": {
                "audioEncoding": request.audio_encoding,
                "speakingRate": request.speaking_rate,
                "pitch": request.pitch,
            },
        });
        let http_request = self
            .http
            .post(format!("{}/text:synthesize", self.tts_base_url))
            .query(&[("key", api_key)])
            .timeout(REQUEST_TIMEOUT)
            .json(&payload);

        match send_json(http_request).await {
            Ok(data) => ToolResult::ok()
                .with(
                    "audio_content",
                    data.get("audioContent").cloned().unwrap_or(Value::Null),
                )
                .with("audio_encoding", request.audio_encoding)
                .with("voice_name", request.voice_name)
                .with("language_code", request.language_code),
            Err(e) => e.into(),
        }
    }
}

fn extract_images(data: &Value) -> Vec<String> {
    data.get("generatedImages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("bytesBase64Encoded")?.as_str())
                .filter(|b64| !b64.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Connector for GeminiConnector {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn execute(&self, operation: &str, args: &Args) -> ToolResult {
        match operation {
            "generate_image" => self.generate_image(ImageRequest::from_args(args)).await,
            "text_to_speech" => self.text_to_speech(SpeechRequest::from_args(args)).await,
            other => unknown_operation(TOOL_NAME, other),
        }
    }
}
