use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::dna::{self, CharacterDna};
use crate::error::GenerationError;
use crate::style::{AspectRatio, Style, styled_prompt};

const SERVICE: &str = "Bria API";
const AUTH_HINT: &str =
    "Please check your BRIA_API_TOKEN. Get a new token at https://platform.bria.ai/";
const MODEL_VERSION: &str = "FIBO";
const GUIDANCE_SCALE: u32 = 5;
const STEPS: u32 = 50;
const ERROR_BODY_LIMIT: usize = 200;

const PORTRAIT_SUFFIX: &str =
    "character portrait, detailed face, upper body, centered composition, clean background";
const SCENE_SUFFIX: &str = "consistent character design, same characters throughout";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_prompt: Option<Value>,
}

/// Text-to-image backend.
///
/// `generate_image` applies the style suffix itself; callers pass the bare
/// subject prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        style: Style,
        aspect: AspectRatio,
    ) -> Result<GeneratedImage, GenerationError>;

    async fn generate_portrait(
        &self,
        description: &str,
        style: Style,
    ) -> Result<GeneratedImage, GenerationError> {
        self.generate_image(&portrait_prompt(description), style, AspectRatio::Square)
            .await
    }

    async fn generate_scene(
        &self,
        scene: &str,
        characters: &[Arc<CharacterDna>],
        style: Style,
    ) -> Result<GeneratedImage, GenerationError> {
        self.generate_image(
            &scene_prompt(scene, characters),
            style,
            AspectRatio::Widescreen,
        )
        .await
    }
}

pub fn portrait_prompt(description: &str) -> String {
    format!("{}, {PORTRAIT_SUFFIX}", description.trim())
}

/// Prefixes the scene with the flattened DNA of every character in it.
pub fn scene_prompt(scene: &str, characters: &[Arc<CharacterDna>]) -> String {
    let descriptions = characters
        .iter()
        .map(|dna| dna::flatten(dna))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>();
    let scene = scene.trim();
    if descriptions.is_empty() {
        format!("{scene}, {SCENE_SUFFIX}")
    } else {
        format!("{}, {scene}, {SCENE_SUFFIX}", descriptions.join(", "))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model_version: &'static str,
    aspect_ratio: AspectRatio,
    sync: bool,
    guidance_scale: u32,
    steps_num: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    result: Option<GeneratedImage>,
    #[serde(default)]
    status_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    result: Option<GeneratedImage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct BriaClient {
    http: reqwest::Client,
    endpoint: String,
    api_token: String,
    sync: bool,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl BriaClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            sync: true,
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(300),
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let token = settings.bria.require_api_token()?;
        Ok(Self::new(settings.http_client()?, &settings.bria.endpoint, token)
            .with_polling(settings.bria.poll_interval, settings.http_timeout))
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// Requests deferred generation; results are collected from `status_url`.
    pub fn asynchronous(mut self) -> Self {
        self.sync = false;
        self
    }

    async fn poll(&self, status_url: &str) -> Result<GeneratedImage, GenerationError> {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;
        loop {
            let response = self
                .http
                .get(status_url)
                .header("api_token", &self.api_token)
                .send()
                .await
                .map_err(|err| GenerationError::transport(SERVICE, &err))?;
            let status: StatusResponse = read_json(response).await?;
            tracing::debug!(status = %status.status, "polled image status");

            match status.status.as_str() {
                "COMPLETED" => {
                    let image = status.result.ok_or_else(|| {
                        GenerationError::service(SERVICE, "completed status without a result")
                    })?;
                    return finish(image);
                }
                "ERROR" => {
                    let detail = status
                        .error
                        .map(|err| err.to_string())
                        .unwrap_or_else(|| "unknown error".to_owned());
                    return Err(GenerationError::service(
                        SERVICE,
                        format!("generation failed: {detail}"),
                    ));
                }
                _ => {}
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(GenerationError::service(
                    SERVICE,
                    format!("timed out waiting for {status_url}"),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ImageGenerator for BriaClient {
    async fn generate_image(
        &self,
        prompt: &str,
        style: Style,
        aspect: AspectRatio,
    ) -> Result<GeneratedImage, GenerationError> {
        let prompt = styled_prompt(prompt, style);
        let body = GenerateRequest {
            prompt: &prompt,
            model_version: MODEL_VERSION,
            aspect_ratio: aspect,
            sync: self.sync,
            guidance_scale: GUIDANCE_SCALE,
            steps_num: STEPS,
        };
        tracing::debug!(%style, aspect = aspect.as_str(), "requesting image");

        let response = self
            .http
            .post(&self.endpoint)
            .header("api_token", &self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::transport(SERVICE, &err))?;
        let generated: GenerateResponse = read_json(response).await?;

        if let Some(image) = generated.result {
            return finish(image);
        }
        if let Some(status_url) = generated.status_url {
            return self.poll(&status_url).await;
        }
        Err(GenerationError::service(
            SERVICE,
            "response contained neither a result nor a status_url",
        ))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GenerationError> {
    let status = response.status();
    let raw = response
        .text()
        .await
        .map_err(|err| GenerationError::transport(SERVICE, &err))?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(GenerationError::Authentication {
            service: SERVICE,
            hint: AUTH_HINT,
        });
    }
    if !status.is_success() {
        let message = if raw.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            raw.chars().take(ERROR_BODY_LIMIT).collect()
        };
        return Err(GenerationError::service(SERVICE, message));
    }

    serde_json::from_str(&raw).map_err(|err| {
        GenerationError::service(SERVICE, format!("unexpected response body: {err}"))
    })
}

fn finish(image: GeneratedImage) -> Result<GeneratedImage, GenerationError> {
    if image.image_url.trim().is_empty() {
        return Err(GenerationError::service(
            SERVICE,
            "response did not include an image URL",
        ));
    }
    Ok(image)
}
