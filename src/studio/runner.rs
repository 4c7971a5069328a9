use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

use crate::bria::ImageGenerator;
use crate::config::RegenerationScope;
use crate::dna::{self, CharacterDna, DnaField};
use crate::error::GenerationError;
use crate::fetch::ImageFetcher;
use crate::formats::{DialogFormat, ParsedStory, format_dialog};
use crate::gemini::{StoryAnalyzer, UNTITLED_STORY};
use crate::studio::dna_store::DnaStore;
use crate::studio::model::{
    Character, DnaEntry, Operation, Project, RunState, RunStatus, Scene, StorySnapshot,
};
use crate::studio::progress::{PipelineEvent, ProgressTracker, Stage, stage_percent};
use crate::style::Style;

#[derive(Debug, Default)]
struct StudioState {
    projects: Vec<Project>,
    current_project_id: Option<String>,
    project_counter: u64,

    story: String,
    style: Style,
    characters: Vec<Character>,
    scenes: Vec<Scene>,
    dna: DnaStore,
    dialogs: HashMap<String, String>,
    status: RunStatus,
}

impl StudioState {
    fn clear_results(&mut self) {
        self.characters.clear();
        self.scenes.clear();
        self.dna.clear();
        self.dialogs.clear();
    }

    fn scene_mut(&mut self, scene_id: &str) -> Result<&mut Scene, GenerationError> {
        self.scenes
            .iter_mut()
            .find(|s| s.id == scene_id)
            .ok_or_else(|| GenerationError::UnknownScene(scene_id.to_owned()))
    }

    fn next_project_id(&mut self, name: &str) -> String {
        self.project_counter += 1;
        format!("project_{}_{}", self.project_counter, name.replace(' ', "_"))
    }

    /// Names the current project after the story, creating one if none is selected.
    fn attach_story(&mut self, name: &str, story: &str) -> String {
        if let Some(current) = self.current_project_id.clone()
            && let Some(project) = self.projects.iter_mut().find(|p| p.id == current)
        {
            project.name = name.to_owned();
            project.story = story.to_owned();
            return current;
        }
        let id = self.next_project_id(name);
        self.projects.push(Project {
            id: id.clone(),
            name: name.to_owned(),
            story: story.to_owned(),
        });
        self.current_project_id = Some(id.clone());
        id
    }

    fn dna_context(&self, scope: RegenerationScope, scene: &Scene) -> Vec<Arc<CharacterDna>> {
        match scope {
            RegenerationScope::AllCharacters => self.dna.all(),
            RegenerationScope::ScenePresent => self.dna.resolve(&scene.characters_present),
        }
    }
}

/// Owns the story workspace and runs every generation operation against it.
///
/// State sits behind one async lock that is only held between remote calls,
/// so readers can observe partial results while a run is in flight.
pub struct Studio {
    images: Arc<dyn ImageGenerator>,
    analyzer: Arc<dyn StoryAnalyzer>,
    fetcher: Arc<dyn ImageFetcher>,
    scope: RegenerationScope,
    events: Option<UnboundedSender<PipelineEvent>>,
    state: RwLock<StudioState>,
}

impl Studio {
    pub fn new(
        images: Arc<dyn ImageGenerator>,
        analyzer: Arc<dyn StoryAnalyzer>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            images,
            analyzer,
            fetcher,
            scope: RegenerationScope::default(),
            events: None,
            state: RwLock::new(StudioState::default()),
        }
    }

    pub fn with_regeneration_scope(mut self, scope: RegenerationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn snapshot(&self) -> StorySnapshot {
        let st = self.state.read().await;
        let project = st
            .current_project_id
            .as_deref()
            .and_then(|id| st.projects.iter().find(|p| p.id == id))
            .cloned();
        StorySnapshot {
            project,
            story: st.story.clone(),
            style: st.style,
            characters: st.characters.clone(),
            scenes: st.scenes.clone(),
            dna: st
                .dna
                .iter()
                .map(|(id, dna)| DnaEntry {
                    character_id: id.to_owned(),
                    description: dna::flatten(dna),
                    dna: Arc::clone(dna),
                })
                .collect(),
            dialogs: st
                .dialogs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            status: st.status.clone(),
        }
    }

    pub async fn status(&self) -> RunStatus {
        self.state.read().await.status.clone()
    }

    pub async fn characters(&self) -> Vec<Character> {
        self.state.read().await.characters.clone()
    }

    pub async fn scenes(&self) -> Vec<Scene> {
        self.state.read().await.scenes.clone()
    }

    pub async fn scene(&self, scene_id: &str) -> Option<Scene> {
        let st = self.state.read().await;
        st.scenes.iter().find(|s| s.id == scene_id).cloned()
    }

    pub async fn dna(&self, character_id: &str) -> Option<Arc<CharacterDna>> {
        self.state.read().await.dna.get(character_id)
    }

    pub async fn dialog(&self, scene_id: &str) -> Option<String> {
        self.state.read().await.dialogs.get(scene_id).cloned()
    }

    /// Runs the full pipeline: naming, parsing, characters, then scenes.
    ///
    /// A failure aborts the run; characters and scenes produced before it are kept.
    pub async fn generate(&self, story: &str, style: Style) -> Result<(), GenerationError> {
        let operation = Operation::Generate;
        if story.trim().is_empty() {
            let err = GenerationError::EmptyStory;
            self.fail(operation, &err).await;
            return Err(err);
        }

        let mut progress = self.begin(operation).await;
        {
            let mut st = self.state.write().await;
            st.clear_results();
            st.story = story.to_owned();
            st.style = style;
        }

        match self.run_pipeline(&mut progress, story, style).await {
            Ok(()) => {
                tracing::info!(stage = %Stage::Complete, "pipeline stage");
                self.finish(operation, &mut progress, "Complete!").await;
                Ok(())
            }
            Err(err) => {
                tracing::error!(stage = %Stage::Aborted, error = %err, "pipeline aborted");
                self.fail(operation, &err).await;
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        progress: &mut ProgressTracker,
        story: &str,
        style: Style,
    ) -> Result<(), GenerationError> {
        tracing::info!(stage = %Stage::Naming, "pipeline stage");
        self.report(progress, 0, "Naming your story...").await;
        let name = self.analyzer.name_story(story).await;
        let project_id = self.state.write().await.attach_story(&name, story);
        tracing::info!(%project_id, story_name = %name, "story named");
        tokio::task::yield_now().await;

        tracing::info!(stage = %Stage::Parsing, "pipeline stage");
        self.report(progress, 10, "Analyzing story with AI...").await;
        let parsed: ParsedStory = self.analyzer.parse_story(story, style).await?;

        tracing::info!(
            stage = %Stage::GeneratingCharacters,
            count = parsed.characters.len(),
            "pipeline stage"
        );
        self.report(progress, 20, "Creating characters...").await;
        let total = parsed.characters.len();
        for (i, spec) in parsed.characters.iter().enumerate() {
            self.report(
                progress,
                stage_percent(20, 30, i, total),
                &format!("Forging {}... ({}/{total})", spec.name, i + 1),
            )
            .await;

            let portrait = self.images.generate_portrait(&spec.description, style).await?;
            let image = self.fetcher.fetch(&portrait.image_url).await?;
            let extracted = self.analyzer.extract_dna(&image, &spec.name).await?;

            {
                let mut st = self.state.write().await;
                st.dna.insert(&spec.id, extracted);
                st.characters.push(Character {
                    id: spec.id.clone(),
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    image_url: portrait.image_url,
                });
            }
            tracing::info!(character_id = %spec.id, "character forged");
            tokio::task::yield_now().await;
        }

        tracing::info!(
            stage = %Stage::GeneratingScenes,
            count = parsed.scenes.len(),
            "pipeline stage"
        );
        self.report(progress, 50, "Generating scenes...").await;
        let total = parsed.scenes.len();
        for (i, spec) in parsed.scenes.iter().enumerate() {
            self.report(
                progress,
                stage_percent(50, 45, i, total),
                &format!("Scene {}: {}...", i + 1, spec.title),
            )
            .await;

            let characters = self
                .state
                .read()
                .await
                .dna
                .resolve(&spec.characters_present);
            let image = self
                .images
                .generate_scene(spec.render_text(), &characters, style)
                .await?;

            self.state.write().await.scenes.push(Scene {
                id: spec.id.clone(),
                title: spec.title.clone(),
                description: spec.description.clone(),
                image_url: image.image_url,
                characters_present: spec.characters_present.clone(),
            });
            tracing::info!(scene_id = %spec.id, characters = characters.len(), "scene generated");
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    /// Regenerates one scene in place with the current DNA.
    ///
    /// On failure the scene keeps its previous image.
    pub async fn regenerate_scene(&self, scene_id: &str) -> Result<Scene, GenerationError> {
        let operation = Operation::RegenerateScene;
        let target = {
            let st = self.state.read().await;
            st.scenes
                .iter()
                .find(|s| s.id == scene_id)
                .map(|scene| (scene.clone(), st.dna_context(self.scope, scene), st.style))
        };
        let Some((scene, characters, style)) = target else {
            let err = GenerationError::UnknownScene(scene_id.to_owned());
            self.fail(operation, &err).await;
            return Err(err);
        };

        let mut progress = self.begin(operation).await;
        self.report(&mut progress, 0, &format!("Regenerating {}...", scene.title))
            .await;

        let result = match self
            .images
            .generate_scene(scene.regeneration_text(), &characters, style)
            .await
        {
            Ok(image) => {
                let mut st = self.state.write().await;
                st.scene_mut(scene_id).map(|slot| {
                    slot.image_url = image.image_url;
                    slot.clone()
                })
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(updated) => {
                tracing::info!(scene_id, characters = characters.len(), "scene regenerated");
                self.finish(operation, &mut progress, "Scene regenerated!").await;
                Ok(updated)
            }
            Err(err) => {
                tracing::error!(scene_id, error = %err, "scene regeneration failed");
                self.fail(operation, &err).await;
                Err(err)
            }
        }
    }

    /// Regenerates every scene in order against one DNA snapshot taken up front.
    ///
    /// The first failure stops the loop; scenes not yet reached keep their images.
    pub async fn regenerate_all_scenes(&self) -> Result<(), GenerationError> {
        let operation = Operation::RegenerateAllScenes;
        let (scenes, dna_snapshot, style) = {
            let st = self.state.read().await;
            (st.scenes.clone(), st.dna.clone(), st.style)
        };
        if scenes.is_empty() {
            let err = GenerationError::NoScenes("regenerate");
            self.fail(operation, &err).await;
            return Err(err);
        }

        let mut progress = self.begin(operation).await;
        let total = scenes.len();
        for (i, scene) in scenes.iter().enumerate() {
            self.report(
                &mut progress,
                stage_percent(0, 100, i, total),
                &format!("Regenerating scene {}/{total}: {}...", i + 1, scene.title),
            )
            .await;

            let characters = match self.scope {
                RegenerationScope::AllCharacters => dna_snapshot.all(),
                RegenerationScope::ScenePresent => dna_snapshot.resolve(&scene.characters_present),
            };
            let outcome = match self
                .images
                .generate_scene(scene.regeneration_text(), &characters, style)
                .await
            {
                Ok(image) => self
                    .state
                    .write()
                    .await
                    .scene_mut(&scene.id)
                    .map(|slot| slot.image_url = image.image_url),
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                tracing::error!(scene_id = %scene.id, error = %err, "bulk regeneration aborted");
                self.fail(operation, &err).await;
                return Err(err);
            }
            tracing::info!(scene_id = %scene.id, "scene regenerated");
            tokio::task::yield_now().await;
        }

        self.finish(operation, &mut progress, "All scenes regenerated!")
            .await;
        Ok(())
    }

    /// Replaces one DNA leaf. Snapshots taken earlier keep the old value.
    pub async fn update_dna_field(
        &self,
        character_id: &str,
        field: DnaField,
        value: &str,
    ) -> Result<Arc<CharacterDna>, GenerationError> {
        let updated = self
            .state
            .write()
            .await
            .dna
            .update_field(character_id, field, value)?;
        tracing::info!(character_id, %field, "dna field updated");
        Ok(updated)
    }

    /// Writes dialog overlays for every scene. Model failures fall back to narration.
    pub async fn generate_dialogs(&self, format: DialogFormat) -> Result<(), GenerationError> {
        let operation = Operation::GenerateDialogs;
        let (scenes, names) = {
            let st = self.state.read().await;
            let scenes = st
                .scenes
                .iter()
                .map(|s| (s.id.clone(), s.regeneration_text().to_owned()))
                .collect::<Vec<_>>();
            let names = st.characters.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
            (scenes, names)
        };
        if scenes.is_empty() {
            let err = GenerationError::NoScenes("write dialog for");
            self.fail(operation, &err).await;
            return Err(err);
        }

        let mut progress = self.begin(operation).await;
        let total = scenes.len();
        for (i, (scene_id, text)) in scenes.iter().enumerate() {
            self.report(
                &mut progress,
                stage_percent(0, 100, i, total),
                &format!("Writing {format} dialog {}/{total}...", i + 1),
            )
            .await;
            let lines = self.analyzer.generate_dialog(text, &names, format).await;
            self.state
                .write()
                .await
                .dialogs
                .insert(scene_id.clone(), format_dialog(&lines));
            tokio::task::yield_now().await;
        }

        self.finish(operation, &mut progress, "Dialog ready!").await;
        Ok(())
    }

    pub async fn set_scene_dialog(&self, scene_id: &str, text: &str) -> Result<(), GenerationError> {
        let mut st = self.state.write().await;
        st.scene_mut(scene_id)?;
        st.dialogs.insert(scene_id.to_owned(), text.to_owned());
        Ok(())
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.state.read().await.projects.clone()
    }

    /// Creates and selects a project. A blank name gets a numbered placeholder.
    pub async fn create_project(&self, name: Option<&str>) -> Project {
        let mut st = self.state.write().await;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_owned(),
            None => format!("{UNTITLED_STORY} {}", st.project_counter + 1),
        };
        let project = Project {
            id: st.next_project_id(&name),
            name,
            story: String::new(),
        };
        st.projects.push(project.clone());
        st.current_project_id = Some(project.id.clone());
        st.story.clear();
        st.clear_results();
        tracing::info!(project_id = %project.id, "project created");
        project
    }

    pub async fn select_project(&self, project_id: &str) -> Result<Project, GenerationError> {
        let mut st = self.state.write().await;
        let project = st
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| GenerationError::UnknownProject(project_id.to_owned()))?;
        st.current_project_id = Some(project.id.clone());
        st.story = project.story.clone();
        st.clear_results();
        Ok(project)
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), GenerationError> {
        let mut st = self.state.write().await;
        let before = st.projects.len();
        st.projects.retain(|p| p.id != project_id);
        if st.projects.len() == before {
            return Err(GenerationError::UnknownProject(project_id.to_owned()));
        }
        if st.current_project_id.as_deref() == Some(project_id) {
            st.current_project_id = None;
            st.story.clear();
            st.clear_results();
        }
        tracing::info!(project_id, "project deleted");
        Ok(())
    }

    async fn begin(&self, operation: Operation) -> ProgressTracker {
        let mut st = self.state.write().await;
        st.status = RunStatus {
            state: RunState::Running,
            operation: Some(operation),
            started_at: Some(Utc::now()),
            ..RunStatus::default()
        };
        ProgressTracker::default()
    }

    async fn report(&self, progress: &mut ProgressTracker, percent: u32, step: &str) {
        let percent = progress.advance(percent);
        {
            let mut st = self.state.write().await;
            st.status.current_step = step.to_owned();
            st.status.progress_percent = percent;
        }
        tracing::info!(step, percent, "progress");
        self.emit(PipelineEvent::Progress {
            step: step.to_owned(),
            percent,
        });
    }

    async fn finish(&self, operation: Operation, progress: &mut ProgressTracker, step: &str) {
        self.report(progress, 100, step).await;
        {
            let mut st = self.state.write().await;
            st.status.state = RunState::Done;
            st.status.finished_at = Some(Utc::now());
        }
        self.emit(PipelineEvent::Finished { operation });
    }

    async fn fail(&self, operation: Operation, err: &GenerationError) {
        let message = err.to_string();
        {
            let mut st = self.state.write().await;
            st.status.state = RunState::Error;
            st.status.operation = Some(operation);
            st.status.error = Some(message.clone());
            st.status.finished_at = Some(Utc::now());
        }
        self.emit(PipelineEvent::Failed {
            operation,
            error: message,
        });
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
