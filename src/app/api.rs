use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post, put};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::app::slot::{RunSlot, SlotBusy};
use crate::dna::{self, CharacterDna, DnaField};
use crate::error::{ErrorKind, GenerationError};
use crate::formats::DialogFormat;
use crate::samples::sample_story;
use crate::studio::Studio;
use crate::studio::model::{Operation, Project, RunStatus, StorySnapshot};
use crate::style::Style;

#[derive(Clone)]
pub struct AppState {
    pub studio: Arc<Studio>,
    pub slot: RunSlot,
}

impl AppState {
    pub fn new(studio: Studio) -> Self {
        Self {
            studio: Arc::new(studio),
            slot: RunSlot::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub story: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DnaUpdateRequest {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct DialogsRequest {
    #[serde(default)]
    pub format: DialogFormat,
}

#[derive(Debug, Deserialize)]
pub struct SceneDialogRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub operation: Operation,
}

#[derive(Debug, Serialize)]
pub struct DnaView {
    pub character_id: String,
    pub description: String,
    pub dna: Arc<CharacterDna>,
}

#[derive(Debug, Serialize)]
pub struct SampleView {
    pub style: Style,
    pub story: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<T, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn from_generation(err: GenerationError) -> ApiError {
    let status = match (&err, err.kind()) {
        (
            GenerationError::UnknownScene(_)
            | GenerationError::UnknownCharacter(_)
            | GenerationError::UnknownProject(_),
            _,
        ) => StatusCode::NOT_FOUND,
        (_, ErrorKind::Input) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::Parse | ErrorKind::Authentication | ErrorKind::Service) => {
            StatusCode::BAD_GATEWAY
        }
    };
    api_error(status, err.to_string())
}

fn busy(err: SlotBusy) -> ApiError {
    api_error(StatusCode::CONFLICT, err.to_string())
}

fn accepted(operation: Operation) -> (StatusCode, Json<Accepted>) {
    (StatusCode::ACCEPTED, Json(Accepted { operation }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/story", get(get_story))
        .route("/api/story/status", get(get_status))
        .route("/api/story/generate", post(start_generate))
        .route("/api/scenes/regenerate", post(start_regenerate_all))
        .route("/api/scenes/:scene_id/regenerate", post(start_regenerate_scene))
        .route("/api/scenes/:scene_id/dialog", put(put_scene_dialog))
        .route(
            "/api/characters/:character_id/dna",
            get(get_dna).put(update_dna),
        )
        .route("/api/dialogs", post(start_dialogs))
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/:project_id/select", post(select_project))
        .route("/api/projects/:project_id", delete(delete_project))
        .route("/api/samples/:style", get(get_sample))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_story(State(state): State<AppState>) -> Json<StorySnapshot> {
    Json(state.studio.snapshot().await)
}

async fn get_status(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.studio.status().await)
}

async fn start_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    if req.story.trim().is_empty() {
        return Err(from_generation(GenerationError::EmptyStory));
    }
    let style = req
        .style
        .as_deref()
        .map(Style::parse_lossy)
        .unwrap_or_default();

    let studio = Arc::clone(&state.studio);
    state
        .slot
        .try_spawn(async move {
            if let Err(err) = studio.generate(&req.story, style).await {
                tracing::debug!(error = %err, "generation ended with error");
            }
        })
        .map_err(busy)?;
    Ok(accepted(Operation::Generate))
}

async fn start_regenerate_all(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    if state.studio.scenes().await.is_empty() {
        return Err(from_generation(GenerationError::NoScenes("regenerate")));
    }
    let studio = Arc::clone(&state.studio);
    state
        .slot
        .try_spawn(async move {
            if let Err(err) = studio.regenerate_all_scenes().await {
                tracing::debug!(error = %err, "bulk regeneration ended with error");
            }
        })
        .map_err(busy)?;
    Ok(accepted(Operation::RegenerateAllScenes))
}

async fn start_regenerate_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    if state.studio.scene(&scene_id).await.is_none() {
        return Err(from_generation(GenerationError::UnknownScene(scene_id)));
    }
    let studio = Arc::clone(&state.studio);
    state
        .slot
        .try_spawn(async move {
            if let Err(err) = studio.regenerate_scene(&scene_id).await {
                tracing::debug!(scene_id, error = %err, "scene regeneration ended with error");
            }
        })
        .map_err(busy)?;
    Ok(accepted(Operation::RegenerateScene))
}

async fn start_dialogs(
    State(state): State<AppState>,
    Json(req): Json<DialogsRequest>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    if state.studio.scenes().await.is_empty() {
        return Err(from_generation(GenerationError::NoScenes("write dialog for")));
    }
    let studio = Arc::clone(&state.studio);
    state
        .slot
        .try_spawn(async move {
            if let Err(err) = studio.generate_dialogs(req.format).await {
                tracing::debug!(error = %err, "dialog generation ended with error");
            }
        })
        .map_err(busy)?;
    Ok(accepted(Operation::GenerateDialogs))
}

async fn put_scene_dialog(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
    Json(req): Json<SceneDialogRequest>,
) -> ApiResult<StatusCode> {
    state
        .studio
        .set_scene_dialog(&scene_id, &req.text)
        .await
        .map_err(from_generation)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_dna(
    State(state): State<AppState>,
    Path(character_id): Path<String>,
) -> ApiResult<Json<DnaView>> {
    let Some(dna) = state.studio.dna(&character_id).await else {
        return Err(from_generation(GenerationError::UnknownCharacter(
            character_id,
        )));
    };
    Ok(Json(DnaView {
        description: dna::flatten(&dna),
        character_id,
        dna,
    }))
}

async fn update_dna(
    State(state): State<AppState>,
    Path(character_id): Path<String>,
    Json(req): Json<DnaUpdateRequest>,
) -> ApiResult<Json<DnaView>> {
    let field = req.field.parse::<DnaField>().map_err(from_generation)?;
    let dna = state
        .studio
        .update_dna_field(&character_id, field, &req.value)
        .await
        .map_err(from_generation)?;
    Ok(Json(DnaView {
        description: dna::flatten(&dna),
        character_id,
        dna,
    }))
}

async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.studio.projects().await)
}

async fn create_project(
    State(state): State<AppState>,
    body: Option<Json<CreateProjectRequest>>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let _permit = state.slot.try_hold().map_err(busy)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let project = state.studio.create_project(req.name.as_deref()).await;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn select_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Project>> {
    let _permit = state.slot.try_hold().map_err(busy)?;
    let project = state
        .studio
        .select_project(&project_id)
        .await
        .map_err(from_generation)?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<StatusCode> {
    let _permit = state.slot.try_hold().map_err(busy)?;
    state
        .studio
        .delete_project(&project_id)
        .await
        .map_err(from_generation)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_sample(Path(style): Path<String>) -> Json<SampleView> {
    let style = Style::parse_lossy(&style);
    Json(SampleView {
        style,
        story: sample_story(style),
    })
}
