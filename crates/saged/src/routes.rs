//! API routes for saged
//!
//! Catalog routes are public. Progress, attempt and history routes act on
//! the caller named by the verified identity headers.

use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, Query, State},
    routing::{get, post},
    Json, Router,
};
use sage_common::{
    ContentCatalog, Difficulty, HealthResponse, LeaderboardEntry, LedgerView, NotFoundKind, Path,
    PathUpdate, ProgressEngine, ProgressUpdate, PuzzleAttempt, PuzzleSubmission, PuzzleView,
    SageError, SubmissionResult, Timeframe, Topic, TopicFilter, TopicProgress, TopicSummary,
    TopicView,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api_error::ApiError;
use crate::identity::VerifiedUser;
use crate::server::AppState;

type AppStateArc = Arc<AppState>;

/// Engine calls touch the disk; keep them off the async workers.
async fn blocking<T, F>(state: &AppStateArc, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&ProgressEngine) -> sage_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    Ok(tokio::task::spawn_blocking(move || f(&engine)).await??)
}

fn published<'a>(catalog: &'a dyn ContentCatalog, topic_id: &str) -> Result<&'a Topic, ApiError> {
    catalog
        .topic(topic_id)
        .filter(|t| t.published)
        .ok_or_else(|| SageError::not_found(NotFoundKind::Topic, topic_id).into())
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    let topics_available = state
        .engine
        .catalog()
        .list_topics(&TopicFilter::default())
        .len();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        topics_available,
    })
}

// ============================================================================
// Catalog Routes
// ============================================================================

pub fn catalog_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/topics", get(list_topics))
        .route("/v1/topics/:topic", get(get_topic))
        .route("/v1/topics/:topic/paths/:path", get(get_path))
        .route("/v1/topics/:topic/paths/:path/puzzle", get(get_puzzle))
}

#[derive(Debug, Default, Deserialize)]
pub struct TopicsQuery {
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

async fn list_topics(
    State(state): State<AppStateArc>,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<Vec<TopicSummary>>, ApiError> {
    let difficulty = match query.difficulty.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(Difficulty::parse(raw).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "unknown difficulty '{}', expected beginner, intermediate or advanced",
                raw
            ))
        })?),
    };
    let filter = TopicFilter {
        category: query.category.filter(|c| !c.is_empty()),
        difficulty,
        include_unpublished: false,
    };
    Ok(Json(state.engine.catalog().list_topics(&filter)))
}

async fn get_topic(
    State(state): State<AppStateArc>,
    UrlPath(topic_id): UrlPath<String>,
) -> Result<Json<TopicView>, ApiError> {
    let topic = published(state.engine.catalog(), &topic_id)?;
    Ok(Json(topic.view()))
}

async fn get_path(
    State(state): State<AppStateArc>,
    UrlPath((topic_id, path_id)): UrlPath<(String, String)>,
) -> Result<Json<Path>, ApiError> {
    let topic = published(state.engine.catalog(), &topic_id)?;
    let path = topic
        .path(&path_id)
        .ok_or_else(|| SageError::not_found(NotFoundKind::Path, &path_id))?;
    Ok(Json(path.clone()))
}

async fn get_puzzle(
    State(state): State<AppStateArc>,
    UrlPath((topic_id, path_id)): UrlPath<(String, String)>,
) -> Result<Json<PuzzleView>, ApiError> {
    let topic = published(state.engine.catalog(), &topic_id)?;
    let puzzle = topic
        .puzzle_for(&path_id)
        .ok_or_else(|| SageError::not_found(NotFoundKind::Puzzle, &path_id))?;
    Ok(Json(puzzle.view()))
}

// ============================================================================
// Progress Routes
// ============================================================================

pub fn progress_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/progress", get(user_progress))
        .route("/v1/progress/:topic", get(topic_progress))
        .route("/v1/progress/:topic/paths/:path", post(update_path))
        .route("/v1/progress/:topic/paths/:path/attempts", post(submit_attempt))
        .route("/v1/attempts", get(attempt_history))
}

async fn update_path(
    State(state): State<AppStateArc>,
    user: VerifiedUser,
    UrlPath((topic_id, path_id)): UrlPath<(String, String)>,
    Json(update): Json<PathUpdate>,
) -> Result<Json<ProgressUpdate>, ApiError> {
    debug!("  Path update from {}: {}/{}", user.user_id(), topic_id, path_id);
    let identity = user.0;
    let result = blocking(&state, move |engine| {
        engine.update_path_progress(&identity, &topic_id, &path_id, &update)
    })
    .await?;
    Ok(Json(result))
}

async fn submit_attempt(
    State(state): State<AppStateArc>,
    user: VerifiedUser,
    UrlPath((topic_id, path_id)): UrlPath<(String, String)>,
    Json(submission): Json<PuzzleSubmission>,
) -> Result<Json<SubmissionResult>, ApiError> {
    debug!("  Puzzle attempt from {}: {}/{}", user.user_id(), topic_id, path_id);
    let identity = user.0;
    let result = blocking(&state, move |engine| {
        engine.submit_puzzle_attempt(&identity, &topic_id, &path_id, &submission)
    })
    .await?;
    Ok(Json(result))
}

async fn topic_progress(
    State(state): State<AppStateArc>,
    user: VerifiedUser,
    UrlPath(topic_id): UrlPath<String>,
) -> Result<Json<TopicProgress>, ApiError> {
    let user_id = user.user_id().clone();
    let progress = blocking(&state, move |engine| {
        engine.topic_progress(&user_id, &topic_id)
    })
    .await?;
    Ok(Json(progress))
}

async fn user_progress(
    State(state): State<AppStateArc>,
    user: VerifiedUser,
) -> Result<Json<LedgerView>, ApiError> {
    let user_id = user.user_id().clone();
    let view = blocking(&state, move |engine| engine.user_progress(&user_id)).await?;
    Ok(Json(view))
}

async fn attempt_history(
    State(state): State<AppStateArc>,
    user: VerifiedUser,
) -> Result<Json<Vec<PuzzleAttempt>>, ApiError> {
    let user_id = user.user_id().clone();
    let attempts = blocking(&state, move |engine| engine.attempt_history(&user_id)).await?;
    Ok(Json(attempts))
}

// ============================================================================
// Leaderboard Routes
// ============================================================================

pub fn leaderboard_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/leaderboard", get(leaderboard))
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
    pub timeframe: Option<String>,
}

async fn leaderboard(
    State(state): State<AppStateArc>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let timeframe: Timeframe = query.timeframe.as_deref().unwrap_or("all").parse()?;
    let limit = query.limit;
    let entries = blocking(&state, move |engine| engine.leaderboard(limit, timeframe)).await?;
    info!("  Leaderboard ({}): {} entries", timeframe, entries.len());
    Ok(Json(entries))
}
