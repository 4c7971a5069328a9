use std::fmt;
use std::time::Duration;

use anyhow::Context as _;

use crate::logging::LogFormat;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BRIA_URL: &str = "https://engine.prod.bria-api.com/v2/image/generate";

/// Which characters' DNA is injected when an existing scene is regenerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegenerationScope {
    /// Every character generated so far.
    #[default]
    AllCharacters,
    /// Only the scene's own `characters_present`.
    ScenePresent,
}

impl RegenerationScope {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::AllCharacters),
            "scene" => Ok(Self::ScenePresent),
            other => anyhow::bail!("unsupported regeneration scope: {other}"),
        }
    }
}

#[derive(Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl GeminiSettings {
    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GOOGLE_API_KEY is not set"))
    }
}

impl fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &redacted(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone)]
pub struct BriaSettings {
    pub api_token: Option<String>,
    pub endpoint: String,
    pub poll_interval: Duration,
}

impl BriaSettings {
    pub fn require_api_token(&self) -> anyhow::Result<&str> {
        self.api_token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("BRIA_API_TOKEN is not set"))
    }
}

impl fmt::Debug for BriaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BriaSettings")
            .field("api_token", &redacted(&self.api_token))
            .field("endpoint", &self.endpoint)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini: GeminiSettings,
    pub bria: BriaSettings,
    pub http_timeout: Duration,
    pub regeneration_scope: RegenerationScope,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let http_timeout_secs = parse_u64(&var, "VISIONFORGE_HTTP_TIMEOUT_SECS", 300)?;
        if http_timeout_secs == 0 {
            anyhow::bail!("VISIONFORGE_HTTP_TIMEOUT_SECS must be > 0");
        }
        let poll_interval_ms = parse_u64(&var, "VISIONFORGE_POLL_INTERVAL_MS", 1000)?;

        let regeneration_scope = match var("VISIONFORGE_REGENERATION_SCOPE") {
            Some(raw) => RegenerationScope::parse(&raw).with_context(|| {
                format!("invalid VISIONFORGE_REGENERATION_SCOPE={raw:?}. expected one of: all, scene")
            })?,
            None => RegenerationScope::default(),
        };
        let log_format = parse_log_format(&var)?;

        Ok(Self {
            gemini: GeminiSettings {
                api_key: var("GOOGLE_API_KEY"),
                base_url: var("VISIONFORGE_GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_owned())
                    .trim_end_matches('/')
                    .to_owned(),
                model: var("VISIONFORGE_GEMINI_MODEL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_owned()),
            },
            bria: BriaSettings {
                api_token: var("BRIA_API_TOKEN"),
                endpoint: var("VISIONFORGE_BRIA_URL").unwrap_or_else(|| DEFAULT_BRIA_URL.to_owned()),
                poll_interval: Duration::from_millis(poll_interval_ms),
            },
            http_timeout: Duration::from_secs(http_timeout_secs),
            regeneration_scope,
            log_format,
        })
    }

    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .context("build http client")
    }
}

/// Reads only `VISIONFORGE_LOG_FORMAT`, for commands that need no service settings.
pub fn log_format_from_env() -> anyhow::Result<LogFormat> {
    parse_log_format(&|key: &str| {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    })
}

fn parse_log_format(var: &impl Fn(&str) -> Option<String>) -> anyhow::Result<LogFormat> {
    match var("VISIONFORGE_LOG_FORMAT") {
        Some(raw) => LogFormat::parse(&raw).with_context(|| {
            format!("invalid VISIONFORGE_LOG_FORMAT={raw:?}. expected one of: text, json")
        }),
        None => Ok(LogFormat::default()),
    }
}

fn parse_u64(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> anyhow::Result<u64> {
    match var(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid {key}={raw:?}. expected a non-negative integer")),
        None => Ok(default),
    }
}

fn redacted(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}
