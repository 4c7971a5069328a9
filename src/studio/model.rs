use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dna::CharacterDna;
use crate::style::Style;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub characters_present: Vec<String>,
}

impl Scene {
    /// Prompt text for regeneration: the description, or the title when empty.
    pub fn regeneration_text(&self) -> &str {
        let description = self.description.trim();
        if description.is_empty() {
            self.title.trim()
        } else {
            description
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub story: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Generate,
    RegenerateScene,
    RegenerateAllScenes,
    GenerateDialogs,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub operation: Option<Operation>,
    pub current_step: String,
    pub progress_percent: u32,
    pub error: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnaEntry {
    pub character_id: String,
    pub description: String,
    pub dna: Arc<CharacterDna>,
}

/// Everything the studio currently holds, copied out under one read lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySnapshot {
    pub project: Option<Project>,
    pub story: String,
    pub style: Style,
    pub characters: Vec<Character>,
    pub scenes: Vec<Scene>,
    pub dna: Vec<DnaEntry>,
    pub dialogs: BTreeMap<String, String>,
    pub status: RunStatus,
}
