use std::fmt;

use serde::{Deserialize, Serialize};

const ANIME_SUFFIX: &str = "anime style, detailed linework, vibrant colors, cel shading";
const REALISTIC_SUFFIX: &str = "photorealistic, cinematic lighting, detailed, 8k quality";
const SCI_FI_SUFFIX: &str = "science fiction, futuristic, high tech, cinematic, neon lighting";
const FANTASY_SUFFIX: &str = "fantasy art, magical, detailed illustration, epic lighting";

pub const QUALITY_SUFFIX: &str = "high quality, masterpiece";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    #[default]
    Anime,
    Realistic,
    SciFi,
    Fantasy,
}

impl Style {
    pub const ALL: [Style; 4] = [Self::Anime, Self::Realistic, Self::SciFi, Self::Fantasy];

    /// Resolves a user-facing style key. Unknown keys fall back to anime.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "realistic" => Self::Realistic,
            "sci-fi" | "scifi" | "sci_fi" => Self::SciFi,
            "fantasy" => Self::Fantasy,
            "anime" => Self::Anime,
            other => {
                tracing::debug!(style = other, "unknown style; using anime");
                Self::Anime
            }
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Realistic => "realistic",
            Self::SciFi => "sci-fi",
            Self::Fantasy => "fantasy",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Anime => ANIME_SUFFIX,
            Self::Realistic => REALISTIC_SUFFIX,
            Self::SciFi => SCI_FI_SUFFIX,
            Self::Fantasy => FANTASY_SUFFIX,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Tall,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Widescreen => "16:9",
            Self::Tall => "9:16",
        }
    }
}

/// `"{prompt}, {style suffix}, high quality, masterpiece"`.
pub fn styled_prompt(prompt: &str, style: Style) -> String {
    format!("{prompt}, {}, {QUALITY_SUFFIX}", style.suffix())
}
