use async_trait::async_trait;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Settings;
use crate::dna::CharacterDna;
use crate::error::GenerationError;
use crate::fetch::ImageData;
use crate::formats::{DialogFormat, DialogKind, DialogLine, ParsedStory};
use crate::json::decode_lenient;
use crate::style::Style;

const SERVICE: &str = "Gemini API";
const AUTH_HINT: &str = "Please check your GOOGLE_API_KEY.";

pub const UNTITLED_STORY: &str = "Untitled Story";
pub const NARRATOR: &str = "NARRATOR";
const NAMING_INPUT_CHARS: usize = 500;
const TITLE_MAX_CHARS: usize = 30;
const FALLBACK_DIALOG_CHARS: usize = 100;

const STORY_PARSER_PROMPT: &str = r#"You are a story analyst preparing a story for visual production (anime, film, games).
Read the story below and extract:

1. CHARACTERS: every character, each with a detailed visual description
2. SCENES: the story split into 4-6 visual scenes

Respond with JSON only, using exactly this shape:
{
  "characters": [
    {
      "id": "char_01",
      "name": "Character Name",
      "description": "Visual description: hair color and style, eye color and shape, face, skin tone, build, clothing, accessories, distinctive features"
    }
  ],
  "scenes": [
    {
      "id": "scene_01",
      "title": "Scene Title",
      "description": "What happens in this scene",
      "visual_direction": "Setting, time of day, lighting, mood, camera angle, poses and expressions",
      "characters_present": ["char_01"]
    }
  ]
}

Rules:
- Be very specific about each character's visual features, including colors and marks
- Every scene needs a visual direction usable as an image prompt
- characters_present must only reference character ids listed above
"#;

const STORY_NAME_PROMPT: &str = r#"Give this story a short, memorable title of 2-4 words.

Story:
{story}

Return ONLY the title, nothing else. No quotes, no explanation.
Good examples: Samurai's Spirit, Neo Tokyo Dreams, Crystal Mage, Starship Alliance
"#;

const DNA_EXTRACTION_PROMPT: &str = r##"Study this character image and record the visual features needed to redraw the character consistently.

Respond with JSON only, using exactly this shape:
{
  "name": "{name}",
  "physical_features": {
    "hair": {"color": "", "style": "", "texture": ""},
    "eyes": {"color": "", "shape": "", "features": ""},
    "face": {"structure": "", "skin_tone": "", "distinctive_marks": "scars, marks, tattoos, or 'none'"},
    "body": {"build": "", "height_impression": "tall/average/short", "posture": ""}
  },
  "clothing": {
    "default_outfit": "",
    "accessories": ["each", "accessory"],
    "weapons": "weapons or tools, or 'none'"
  },
  "style_attributes": {
    "art_style": "",
    "shading": "",
    "color_palette": ["#hex1", "#hex2", "#hex3", "#hex4"]
  },
  "personality_visual_cues": {"default_expression": "", "stance": ""}
}

Be very specific. Every key must be present; use "none" when a feature does not apply.
CHARACTER NAME: {name}
"##;

const DIALOG_PROMPT: &str = r#"You write dialog for {format} panels. Write dialog and narration for the scene below.

SCENE TO SCRIPT: {scene}
Characters in scene: {characters}

Respond with JSON only, using this shape:
{"dialogs": [{"speaker": "Character Name or NARRATOR", "text": "line", "type": "speech | thought | narration"}]}

Guidelines:
- manga: short, punchy lines with dramatic pauses
- manhwa: flowing, emotional lines
- 2-4 entries, each under 50 words, matching the scene's tone
"#;

/// Structured-output language model calls used by the pipeline.
///
/// `generate_dialog` and `name_story` never fail; implementations fall back
/// to [`fallback_dialog`] and [`UNTITLED_STORY`].
#[async_trait]
pub trait StoryAnalyzer: Send + Sync {
    async fn parse_story(&self, story: &str, style: Style) -> Result<ParsedStory, GenerationError>;

    async fn extract_dna(
        &self,
        portrait: &ImageData,
        character_name: &str,
    ) -> Result<CharacterDna, GenerationError>;

    async fn generate_dialog(
        &self,
        scene: &str,
        character_names: &[String],
        format: DialogFormat,
    ) -> Vec<DialogLine>;

    async fn name_story(&self, story: &str) -> String;
}

pub fn generate_content_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

/// Cleans a model-proposed title: surrounding quotes go, long titles are cut.
pub fn normalize_story_title(raw: &str) -> String {
    let title = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if title.is_empty() {
        return UNTITLED_STORY.to_owned();
    }
    title.chars().take(TITLE_MAX_CHARS).collect::<String>().trim_end().to_owned()
}

pub fn fallback_dialog(scene: &str) -> Vec<DialogLine> {
    vec![DialogLine {
        speaker: NARRATOR.to_owned(),
        text: scene.chars().take(FALLBACK_DIALOG_CHARS).collect(),
        kind: DialogKind::Narration,
    }]
}

#[derive(Debug, Deserialize)]
struct DialogResponse {
    #[serde(default)]
    dialogs: Vec<DialogLine>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: generate_content_endpoint(base_url, model),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.gemini.require_api_key()?;
        Ok(Self::new(
            settings.http_client()?,
            &settings.gemini.base_url,
            &settings.gemini.model,
            api_key,
        ))
    }

    async fn generate(&self, parts: Vec<Value>, json_output: bool) -> Result<String, GenerationError> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if json_output && let Some(obj) = body.as_object_mut() {
            obj.insert(
                "generationConfig".to_owned(),
                json!({ "responseMimeType": "application/json" }),
            );
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::transport(SERVICE, &err))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| GenerationError::transport(SERVICE, &err))?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GenerationError::Authentication {
                service: SERVICE,
                hint: AUTH_HINT,
            });
        }
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(GenerationError::service(SERVICE, format!("({status}) {message}")));
        }

        let value: Value = serde_json::from_str(&raw).map_err(|err| {
            GenerationError::service(SERVICE, format!("unexpected response body: {err}"))
        })?;
        extract_candidate_text(&value)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_candidate_text(value: &Value) -> Result<String, GenerationError> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            let reason = value
                .pointer("/promptFeedback/blockReason")
                .and_then(|v| v.as_str())
                .unwrap_or("no candidates");
            GenerationError::service(SERVICE, format!("response contained no text ({reason})"))
        })?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect::<String>();
    if text.trim().is_empty() {
        return Err(GenerationError::service(SERVICE, "response text is empty"));
    }
    Ok(text)
}

fn text_part(text: String) -> Value {
    json!({ "text": text })
}

fn image_part(image: &ImageData) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": base64::engine::general_purpose::STANDARD.encode(&image.bytes),
        }
    })
}

#[async_trait]
impl StoryAnalyzer for GeminiClient {
    async fn parse_story(&self, story: &str, style: Style) -> Result<ParsedStory, GenerationError> {
        let prompt = format!(
            "{STORY_PARSER_PROMPT}\nTarget visual style: {style}\n\nSTORY TO ANALYZE:\n{story}"
        );
        let text = self.generate(vec![text_part(prompt)], true).await?;
        let parsed: ParsedStory = decode_lenient(&text, "story analysis")?;
        tracing::debug!(
            characters = parsed.characters.len(),
            scenes = parsed.scenes.len(),
            "parsed story"
        );
        Ok(parsed)
    }

    async fn extract_dna(
        &self,
        portrait: &ImageData,
        character_name: &str,
    ) -> Result<CharacterDna, GenerationError> {
        let prompt = DNA_EXTRACTION_PROMPT.replace("{name}", character_name);
        let text = self
            .generate(vec![text_part(prompt), image_part(portrait)], true)
            .await?;
        let mut dna: CharacterDna = decode_lenient(&text, "DNA extraction")?;
        if dna.name.trim().is_empty() {
            dna.name = character_name.to_owned();
        }
        Ok(dna)
    }

    async fn generate_dialog(
        &self,
        scene: &str,
        character_names: &[String],
        format: DialogFormat,
    ) -> Vec<DialogLine> {
        let characters = if character_names.is_empty() {
            "Unknown characters".to_owned()
        } else {
            character_names.join(", ")
        };
        let prompt = DIALOG_PROMPT
            .replace("{format}", format.as_str())
            .replace("{characters}", &characters)
            .replace("{scene}", scene);

        let decoded = match self.generate(vec![text_part(prompt)], true).await {
            Ok(text) => decode_lenient::<DialogResponse>(&text, "dialog"),
            Err(err) => Err(err),
        };
        match decoded {
            Ok(response) => response.dialogs,
            Err(err) => {
                tracing::warn!(error = %err, "dialog generation failed; using narration fallback");
                fallback_dialog(scene)
            }
        }
    }

    async fn name_story(&self, story: &str) -> String {
        let excerpt = story.chars().take(NAMING_INPUT_CHARS).collect::<String>();
        let prompt = STORY_NAME_PROMPT.replace("{story}", &excerpt);
        match self.generate(vec![text_part(prompt)], false).await {
            Ok(text) => normalize_story_title(&text),
            Err(err) => {
                tracing::warn!(error = %err, "story naming failed");
                UNTITLED_STORY.to_owned()
            }
        }
    }
}
