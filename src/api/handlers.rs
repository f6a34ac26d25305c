use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::RequestId;
use crate::models::{RecommendationOptions, ScoredCandidate, DEFAULT_SIMILAR_LIMIT};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub options: RecommendationOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub recommendations: Vec<ScoredCandidate>,
    pub total_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarTracksResponse {
    pub track_id: String,
    pub similar: Vec<ScoredCandidate>,
    pub total_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: HashMap<String, f64>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Personalized recommendations for one user
pub async fn recommend(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::debug!(%request_id, user_id = %request.user_id, "Recommendation request");

    let recommendations = state
        .engine
        .generate_recommendations(&request.user_id, &request.options, &state.request_context())
        .await?;

    Ok(Json(RecommendationResponse {
        user_id: request.user_id,
        total_count: recommendations.len(),
        recommendations,
    }))
}

/// Tracks that sound like the given one
pub async fn similar_tracks(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Query(query): Query<SimilarQuery>,
) -> AppResult<Json<SimilarTracksResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);

    let similar = state
        .engine
        .find_similar_tracks(&track_id, limit, &state.request_context())
        .await?;

    Ok(Json(SimilarTracksResponse {
        track_id,
        total_count: similar.len(),
        similar,
    }))
}

/// Applies feedback to the shared similarity weights
pub async fn feedback(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<FeedbackRequest>,
) -> StatusCode {
    tracing::debug!(%request_id, signals = request.feedback.len(), "Feedback received");
    state.engine.update_weights(&request.feedback);
    StatusCode::NO_CONTENT
}

/// Current similarity weights by feature name
pub async fn weights(State(state): State<AppState>) -> Json<BTreeMap<&'static str, f64>> {
    Json(state.engine.current_weights().as_map())
}
