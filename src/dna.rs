//! Character DNA: the structured visual identity extracted from a portrait,
//! and its flattening into prompt text.
//!
//! Every nested group sits behind an `Arc`. Editing a field goes through
//! [`DnaField::apply`], which calls `Arc::make_mut` on each level it walks
//! through, so a record handed out earlier keeps pointing at the old groups.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterDna {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::group")]
    pub physical_features: Arc<PhysicalFeatures>,
    #[serde(deserialize_with = "lenient::group")]
    pub clothing: Arc<Clothing>,
    #[serde(deserialize_with = "lenient::group")]
    pub style_attributes: Arc<StyleAttributes>,
    #[serde(deserialize_with = "lenient::group")]
    pub personality_visual_cues: Arc<PersonalityVisualCues>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalFeatures {
    #[serde(deserialize_with = "lenient::group")]
    pub hair: Arc<Hair>,
    #[serde(deserialize_with = "lenient::group")]
    pub eyes: Arc<Eyes>,
    #[serde(deserialize_with = "lenient::group")]
    pub face: Arc<Face>,
    #[serde(deserialize_with = "lenient::group")]
    pub body: Arc<Body>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hair {
    #[serde(deserialize_with = "lenient::string")]
    pub color: String,
    #[serde(deserialize_with = "lenient::string")]
    pub style: String,
    #[serde(deserialize_with = "lenient::string")]
    pub texture: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Eyes {
    #[serde(deserialize_with = "lenient::string")]
    pub color: String,
    #[serde(deserialize_with = "lenient::string")]
    pub shape: String,
    #[serde(deserialize_with = "lenient::string")]
    pub features: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Face {
    #[serde(deserialize_with = "lenient::string")]
    pub structure: String,
    #[serde(deserialize_with = "lenient::string")]
    pub skin_tone: String,
    #[serde(deserialize_with = "lenient::string")]
    pub distinctive_marks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Body {
    #[serde(deserialize_with = "lenient::string")]
    pub build: String,
    #[serde(deserialize_with = "lenient::string")]
    pub height_impression: String,
    #[serde(deserialize_with = "lenient::string")]
    pub posture: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clothing {
    #[serde(deserialize_with = "lenient::string")]
    pub default_outfit: String,
    #[serde(deserialize_with = "lenient::list")]
    pub accessories: Vec<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub weapons: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleAttributes {
    #[serde(deserialize_with = "lenient::string")]
    pub art_style: String,
    #[serde(deserialize_with = "lenient::string")]
    pub shading: String,
    #[serde(deserialize_with = "lenient::list")]
    pub color_palette: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityVisualCues {
    #[serde(deserialize_with = "lenient::string")]
    pub default_expression: String,
    #[serde(deserialize_with = "lenient::string")]
    pub stance: String,
}

/// Flattens a DNA record into the phrase injected in front of scene prompts.
///
/// Fragment order is fixed (name, hair, eyes, face, body, clothing). Empty
/// leaves and the `"none"` sentinel are skipped.
pub fn flatten(dna: &CharacterDna) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(name) = meaningful(&dna.name) {
        parts.push(name.to_owned());
    }

    let features = &dna.physical_features;

    let hair = &features.hair;
    if let Some(mut phrase) = noun_phrase(&[&hair.color, &hair.style], "hair") {
        if let Some(texture) = meaningful(&hair.texture) {
            phrase.push_str(&format!(" with {texture} texture"));
        }
        parts.push(phrase);
    }

    let eyes = &features.eyes;
    if let Some(mut phrase) = noun_phrase(&[&eyes.color, &eyes.shape], "eyes") {
        if let Some(extra) = meaningful(&eyes.features) {
            phrase.push_str(&format!(" with {extra}"));
        }
        parts.push(phrase);
    }

    let face = &features.face;
    if let Some(skin) = meaningful(&face.skin_tone) {
        parts.push(format!("{skin} skin"));
    }
    if let Some(marks) = meaningful(&face.distinctive_marks) {
        parts.push(marks.to_owned());
    }
    if let Some(structure) = meaningful(&face.structure) {
        parts.push(structure.to_owned());
    }

    if let Some(build) = meaningful(&features.body.build) {
        parts.push(format!("{build} build"));
    }

    let clothing = &dna.clothing;
    if let Some(outfit) = meaningful(&clothing.default_outfit) {
        parts.push(format!("wearing {outfit}"));
    }
    if clothing
        .accessories
        .first()
        .is_some_and(|first| meaningful(first).is_some())
    {
        let accessories = clothing
            .accessories
            .iter()
            .filter_map(|a| meaningful(a))
            .collect::<Vec<_>>();
        parts.push(format!("with {}", accessories.join(", ")));
    }
    if let Some(weapons) = meaningful(&clothing.weapons) {
        parts.push(weapons.to_owned());
    }

    parts.join(", ")
}

fn meaningful(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value)
    }
}

fn noun_phrase(words: &[&str], noun: &str) -> Option<String> {
    let words = words
        .iter()
        .filter_map(|w| meaningful(w))
        .collect::<Vec<_>>();
    if words.is_empty() {
        return None;
    }
    Some(format!("{} {noun}", words.join(" ")))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect()
}

/// An editable DNA leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnaField {
    Name,
    HairColor,
    HairStyle,
    HairTexture,
    EyeColor,
    EyeShape,
    EyeFeatures,
    FaceStructure,
    SkinTone,
    DistinctiveMarks,
    BodyBuild,
    HeightImpression,
    Posture,
    DefaultOutfit,
    Accessories,
    Weapons,
    ArtStyle,
    Shading,
    ColorPalette,
    DefaultExpression,
    Stance,
}

impl DnaField {
    pub const ALL: [DnaField; 21] = [
        Self::Name,
        Self::HairColor,
        Self::HairStyle,
        Self::HairTexture,
        Self::EyeColor,
        Self::EyeShape,
        Self::EyeFeatures,
        Self::FaceStructure,
        Self::SkinTone,
        Self::DistinctiveMarks,
        Self::BodyBuild,
        Self::HeightImpression,
        Self::Posture,
        Self::DefaultOutfit,
        Self::Accessories,
        Self::Weapons,
        Self::ArtStyle,
        Self::Shading,
        Self::ColorPalette,
        Self::DefaultExpression,
        Self::Stance,
    ];

    /// Dotted path into the serialized record, e.g. `physical_features.hair.color`.
    pub fn path(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::HairColor => "physical_features.hair.color",
            Self::HairStyle => "physical_features.hair.style",
            Self::HairTexture => "physical_features.hair.texture",
            Self::EyeColor => "physical_features.eyes.color",
            Self::EyeShape => "physical_features.eyes.shape",
            Self::EyeFeatures => "physical_features.eyes.features",
            Self::FaceStructure => "physical_features.face.structure",
            Self::SkinTone => "physical_features.face.skin_tone",
            Self::DistinctiveMarks => "physical_features.face.distinctive_marks",
            Self::BodyBuild => "physical_features.body.build",
            Self::HeightImpression => "physical_features.body.height_impression",
            Self::Posture => "physical_features.body.posture",
            Self::DefaultOutfit => "clothing.default_outfit",
            Self::Accessories => "clothing.accessories",
            Self::Weapons => "clothing.weapons",
            Self::ArtStyle => "style_attributes.art_style",
            Self::Shading => "style_attributes.shading",
            Self::ColorPalette => "style_attributes.color_palette",
            Self::DefaultExpression => "personality_visual_cues.default_expression",
            Self::Stance => "personality_visual_cues.stance",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::HairColor => "hair-color",
            Self::HairStyle => "hair-style",
            Self::HairTexture => "hair-texture",
            Self::EyeColor => "eye-color",
            Self::EyeShape => "eye-shape",
            Self::EyeFeatures => "eye-features",
            Self::FaceStructure => "face-structure",
            Self::SkinTone => "skin-tone",
            Self::DistinctiveMarks => "distinctive-marks",
            Self::BodyBuild => "body-build",
            Self::HeightImpression => "height-impression",
            Self::Posture => "posture",
            Self::DefaultOutfit => "outfit",
            Self::Accessories => "accessories",
            Self::Weapons => "weapons",
            Self::ArtStyle => "art-style",
            Self::Shading => "shading",
            Self::ColorPalette => "color-palette",
            Self::DefaultExpression => "expression",
            Self::Stance => "stance",
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, Self::Accessories | Self::ColorPalette)
    }

    /// Reads the leaf as display text; list fields are joined with `", "`.
    pub fn get(self, dna: &CharacterDna) -> String {
        let features = &dna.physical_features;
        match self {
            Self::Name => dna.name.clone(),
            Self::HairColor => features.hair.color.clone(),
            Self::HairStyle => features.hair.style.clone(),
            Self::HairTexture => features.hair.texture.clone(),
            Self::EyeColor => features.eyes.color.clone(),
            Self::EyeShape => features.eyes.shape.clone(),
            Self::EyeFeatures => features.eyes.features.clone(),
            Self::FaceStructure => features.face.structure.clone(),
            Self::SkinTone => features.face.skin_tone.clone(),
            Self::DistinctiveMarks => features.face.distinctive_marks.clone(),
            Self::BodyBuild => features.body.build.clone(),
            Self::HeightImpression => features.body.height_impression.clone(),
            Self::Posture => features.body.posture.clone(),
            Self::DefaultOutfit => dna.clothing.default_outfit.clone(),
            Self::Accessories => dna.clothing.accessories.join(", "),
            Self::Weapons => dna.clothing.weapons.clone(),
            Self::ArtStyle => dna.style_attributes.art_style.clone(),
            Self::Shading => dna.style_attributes.shading.clone(),
            Self::ColorPalette => dna.style_attributes.color_palette.join(", "),
            Self::DefaultExpression => dna.personality_visual_cues.default_expression.clone(),
            Self::Stance => dna.personality_visual_cues.stance.clone(),
        }
    }

    /// Writes the leaf, cloning each shared group on the way down.
    ///
    /// List fields take a comma-separated value.
    pub fn apply(self, dna: &mut CharacterDna, value: &str) {
        let text = value.trim().to_owned();
        match self {
            Self::Name => dna.name = text,
            Self::HairColor => hair_mut(dna).color = text,
            Self::HairStyle => hair_mut(dna).style = text,
            Self::HairTexture => hair_mut(dna).texture = text,
            Self::EyeColor => eyes_mut(dna).color = text,
            Self::EyeShape => eyes_mut(dna).shape = text,
            Self::EyeFeatures => eyes_mut(dna).features = text,
            Self::FaceStructure => face_mut(dna).structure = text,
            Self::SkinTone => face_mut(dna).skin_tone = text,
            Self::DistinctiveMarks => face_mut(dna).distinctive_marks = text,
            Self::BodyBuild => body_mut(dna).build = text,
            Self::HeightImpression => body_mut(dna).height_impression = text,
            Self::Posture => body_mut(dna).posture = text,
            Self::DefaultOutfit => Arc::make_mut(&mut dna.clothing).default_outfit = text,
            Self::Accessories => Arc::make_mut(&mut dna.clothing).accessories = split_list(value),
            Self::Weapons => Arc::make_mut(&mut dna.clothing).weapons = text,
            Self::ArtStyle => Arc::make_mut(&mut dna.style_attributes).art_style = text,
            Self::Shading => Arc::make_mut(&mut dna.style_attributes).shading = text,
            Self::ColorPalette => {
                Arc::make_mut(&mut dna.style_attributes).color_palette = split_list(value)
            }
            Self::DefaultExpression => {
                Arc::make_mut(&mut dna.personality_visual_cues).default_expression = text
            }
            Self::Stance => Arc::make_mut(&mut dna.personality_visual_cues).stance = text,
        }
    }
}

fn hair_mut(dna: &mut CharacterDna) -> &mut Hair {
    Arc::make_mut(&mut Arc::make_mut(&mut dna.physical_features).hair)
}

fn eyes_mut(dna: &mut CharacterDna) -> &mut Eyes {
    Arc::make_mut(&mut Arc::make_mut(&mut dna.physical_features).eyes)
}

fn face_mut(dna: &mut CharacterDna) -> &mut Face {
    Arc::make_mut(&mut Arc::make_mut(&mut dna.physical_features).face)
}

fn body_mut(dna: &mut CharacterDna) -> &mut Body {
    Arc::make_mut(&mut Arc::make_mut(&mut dna.physical_features).body)
}

impl fmt::Display for DnaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for DnaField {
    type Err = GenerationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.path() == key || field.short_name() == key)
            .ok_or_else(|| GenerationError::UnknownField(raw.trim().to_owned()))
    }
}

/// Deserializers that accept what vision models actually emit: `null`s,
/// numbers where strings belong, and comma-joined strings where lists belong.
mod lenient {
    use std::sync::Arc;

    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn string<'de, D>(de: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(de)? {
            Value::Array(items) => items.iter().filter_map(scalar).collect::<Vec<_>>().join(", "),
            other => scalar(&other).unwrap_or_default(),
        })
    }

    pub(super) fn list<'de, D>(de: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(de)? {
            Value::Array(items) => items.iter().filter_map(scalar).collect(),
            Value::String(s) => super::split_list(&s),
            other => scalar(&other).into_iter().collect(),
        })
    }

    pub(super) fn group<'de, D, T>(de: D) -> Result<Arc<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Arc::new(Option::<T>::deserialize(de)?.unwrap_or_default()))
    }

    fn scalar(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kaito() -> CharacterDna {
        serde_json::from_value(serde_json::json!({
            "name": "Kaito",
            "physical_features": {
                "hair": { "color": "silver", "style": "long tied-back", "texture": "sleek" },
                "eyes": { "color": "crimson", "shape": "narrow", "features": "none" },
                "face": {
                    "structure": "sharp jawline",
                    "skin_tone": "pale",
                    "distinctive_marks": "diagonal scar across left cheek"
                },
                "body": { "build": "lean athletic", "height_impression": "tall", "posture": "upright" }
            },
            "clothing": {
                "default_outfit": "tattered black haori with red lining",
                "accessories": ["red cord", "straw hat"],
                "weapons": "katana with a worn hilt"
            },
            "style_attributes": {
                "art_style": "anime",
                "shading": "cel",
                "color_palette": ["#111111", "#c0c0c0"]
            },
            "personality_visual_cues": { "default_expression": "stoic", "stance": "guarded" }
        }))
        .expect("valid dna fixture")
    }

    #[test]
    fn flatten_orders_fragments_and_skips_none() {
        assert_eq!(
            flatten(&kaito()),
            "Kaito, silver long tied-back hair with sleek texture, crimson narrow eyes, \
pale skin, diagonal scar across left cheek, sharp jawline, lean athletic build, \
wearing tattered black haori with red lining, with red cord, straw hat, katana with a worn hilt"
        );
    }

    #[test]
    fn flatten_is_idempotent() {
        let dna = kaito();
        assert_eq!(flatten(&dna), flatten(&dna));
    }

    #[test]
    fn flatten_never_emits_sentinel_or_empty_fragments() {
        let mut dna = kaito();
        for field in DnaField::ALL {
            field.apply(&mut dna, "none");
        }
        assert_eq!(flatten(&dna), "");

        let mut dna = kaito();
        DnaField::EyeColor.apply(&mut dna, "None");
        DnaField::Weapons.apply(&mut dna, "");
        DnaField::Accessories.apply(&mut dna, "straw hat, none");
        let text = flatten(&dna);
        assert!(!text.to_ascii_lowercase().split(", ").any(|f| f == "none"));
        assert!(!text.contains(", ,"));
        assert!(text.contains("narrow eyes"));
        assert!(text.ends_with("with straw hat"));
    }

    #[test]
    fn accessories_are_skipped_when_first_entry_is_empty() {
        let mut dna = kaito();
        Arc::make_mut(&mut dna.clothing).accessories = vec![String::new(), "ring".to_owned()];
        assert_eq!(
            flatten(&dna),
            "Kaito, silver long tied-back hair with sleek texture, crimson narrow eyes, \
pale skin, diagonal scar across left cheek, sharp jawline, lean athletic build, \
wearing tattered black haori with red lining, katana with a worn hilt"
        );
    }

    #[test]
    fn missing_groups_decode_to_empty_records() -> anyhow::Result<()> {
        let dna: CharacterDna = serde_json::from_str(
            r#"{"name": "Yuki", "physical_features": null, "clothing": {"accessories": "fan, ribbon", "weapons": null}}"#,
        )?;
        assert_eq!(dna.name, "Yuki");
        assert_eq!(dna.physical_features.hair.color, "");
        assert_eq!(dna.clothing.accessories, vec!["fan", "ribbon"]);
        assert_eq!(flatten(&dna), "Yuki, with fan, ribbon");

        let encoded = serde_json::to_value(&dna)?;
        assert!(encoded.pointer("/physical_features/eyes/features").is_some());
        assert!(encoded.pointer("/personality_visual_cues/stance").is_some());
        Ok(())
    }

    #[test]
    fn field_names_resolve_from_paths_and_short_names() {
        assert_eq!(
            "physical_features.hair.color".parse::<DnaField>().ok(),
            Some(DnaField::HairColor)
        );
        assert_eq!("Outfit".parse::<DnaField>().ok(), Some(DnaField::DefaultOutfit));
        assert_eq!(
            "clothing.accessories".parse::<DnaField>().ok(),
            Some(DnaField::Accessories)
        );
        let err = "physical_features.wings".parse::<DnaField>().unwrap_err();
        assert_eq!(err.to_string(), "unknown DNA field: physical_features.wings");
    }

    #[test]
    fn apply_copies_only_touched_groups() {
        let before = kaito();
        let mut after = before.clone();
        DnaField::HairColor.apply(&mut after, "jet black");

        assert_eq!(before.physical_features.hair.color, "silver");
        assert_eq!(after.physical_features.hair.color, "jet black");
        assert!(!Arc::ptr_eq(&before.physical_features, &after.physical_features));
        assert!(Arc::ptr_eq(
            &before.physical_features.eyes,
            &after.physical_features.eyes
        ));
        assert!(Arc::ptr_eq(&before.clothing, &after.clothing));
    }

    #[test]
    fn list_fields_split_comma_separated_input() {
        let mut dna = kaito();
        DnaField::Accessories.apply(&mut dna, " jade pendant ,, silk sash ");
        assert_eq!(dna.clothing.accessories, vec!["jade pendant", "silk sash"]);
        assert_eq!(DnaField::Accessories.get(&dna), "jade pendant, silk sash");
    }
}
