//! Detector Routes
//!
//! - GET /api/v1/detectors?parent= - List roots, or children of `parent`
//! - POST /api/v1/detectors - Create a root or a subdetector
//! - GET /api/v1/detectors/*path - Get a detector subtree with conditions
//! - DELETE /api/v1/detectors/*path - Remove a detector subtree

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CreateDetectorRequest, DetectorListQuery, DetectorListResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::model::Detector;

/// GET /api/v1/detectors
pub async fn list_detectors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetectorListQuery>,
) -> ApiResult<Json<DetectorListResponse>> {
    let parent = query.parent.unwrap_or_default();
    let detectors = state.run(move |db| db.list_detectors(&parent)).await?;

    Ok(Json(DetectorListResponse {
        total: detectors.len(),
        detectors,
    }))
}

/// POST /api/v1/detectors
pub async fn create_detector(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDetectorRequest>,
) -> ApiResult<(StatusCode, Json<Detector>)> {
    let detector = state
        .run(move |db| db.add_detector(&req.name, req.parent.as_deref()))
        .await?;

    Ok((StatusCode::CREATED, Json(detector)))
}

/// GET /api/v1/detectors/*path
pub async fn get_detector(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<Json<Detector>> {
    let detector = state.run(move |db| db.get_detector(&path)).await?;
    Ok(Json(detector))
}

/// DELETE /api/v1/detectors/*path
pub async fn delete_detector(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<StatusCode> {
    state.run(move |db| db.remove_detector(&path)).await?;
    Ok(StatusCode::NO_CONTENT)
}
