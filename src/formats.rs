use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A character as described by the story parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSpec {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// A scene as described by the story parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub visual_direction: String,
    #[serde(default)]
    pub characters_present: Vec<String>,
}

impl SceneSpec {
    /// Text used to render the scene: visual direction, then description, then title.
    pub fn render_text(&self) -> &str {
        [&self.visual_direction, &self.description, &self.title]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStory {
    #[serde(default)]
    pub characters: Vec<CharacterSpec>,
    #[serde(default)]
    pub scenes: Vec<SceneSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    Thought,
    Narration,
    #[serde(other)]
    Speech,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogLine {
    pub speaker: String,
    pub text: String,
    #[serde(rename = "type", default = "default_dialog_kind")]
    pub kind: DialogKind,
}

fn default_dialog_kind() -> DialogKind {
    DialogKind::Speech
}

impl fmt::Display for DialogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DialogKind::Narration => write!(f, "[{}]", self.text),
            DialogKind::Thought => write!(f, "{}: ({})", self.speaker, self.text),
            DialogKind::Speech => write!(f, "{}: \"{}\"", self.speaker, self.text),
        }
    }
}

/// Joins dialog lines into the overlay text shown under a scene.
pub fn format_dialog(lines: &[DialogLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogFormat {
    #[default]
    Manga,
    Manhwa,
}

impl DialogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manga => "manga",
            Self::Manhwa => "manhwa",
        }
    }
}

impl fmt::Display for DialogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialogFormat {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manga" => Ok(Self::Manga),
            "manhwa" => Ok(Self::Manhwa),
            other => anyhow::bail!("unsupported dialog format: {other}"),
        }
    }
}
