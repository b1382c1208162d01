//! Fill/Run/File and Emulsion/Brick Routes
//!
//! The same handlers serve every entity kind; the router mounts them once per
//! kind:
//!
//! - GET /api/v1/{kind}?parent=&start=&end= - List ids
//! - POST /api/v1/{kind} - Create an entity
//! - GET /api/v1/{kind}/:id - Get an entity
//! - DELETE /api/v1/{kind}/:id - Remove an entity (children are kept)
//! - POST /api/v1/{kind}/:id/attributes - Add attributes that are not set yet
//!
//! Creation bodies use the entity's own field names, e.g. for a run:
//!
//! ```json
//! {"run_id": "R1", "fill_id": "F1",
//!  "start_time": "2022-07-05T10:30:00", "end_time": "2022-07-05T12:00:00",
//!  "attributes": {"nb_events": 13}}
//! ```

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::dto::{required_str, time_arg, EntityListQuery, EntityListResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::error::CdbError;
use crate::model::{AttributeSet, TimedEntity};
use crate::time::TimeArg;

/// GET /api/v1/{kind}
pub async fn list<E: TimedEntity + 'static>(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntityListQuery>,
) -> ApiResult<Json<EntityListResponse>> {
    let ids = state
        .run(move |db| {
            db.registry().list::<E>(
                query.parent.as_deref(),
                query.start.map(TimeArg::from).as_ref(),
                query.end.map(TimeArg::from).as_ref(),
            )
        })
        .await?;

    Ok(Json(EntityListResponse {
        kind: E::KIND.label().to_string(),
        total: ids.len(),
        ids,
    }))
}

/// POST /api/v1/{kind}
pub async fn create<E: TimedEntity + 'static>(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<E>)> {
    let kind = E::KIND;
    let id = required_str(&body, kind.id_field())?.to_string();
    let parent = match kind.parent() {
        Some(parent) => Some(required_str(&body, parent.id_field())?.to_string()),
        None => None,
    };
    let start = time_arg("start_time", body.get("start_time"))?
        .ok_or_else(|| CdbError::invalid_value("start_time", "is required"))?;
    let end = time_arg("end_time", body.get("end_time"))?
        .ok_or_else(|| CdbError::invalid_value("end_time", "is required"))?;
    let attributes = match body.get("attributes") {
        None | Some(Value::Null) => None,
        Some(value) => Some(E::Attributes::from_json(value.clone())?),
    };

    let entity = state
        .run(move |db| {
            db.registry()
                .add::<E>(&id, parent.as_deref(), &start, &end, attributes)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(entity)))
}

/// GET /api/v1/{kind}/:id
pub async fn get<E: TimedEntity + 'static>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<E>> {
    let entity = state.run(move |db| db.registry().get::<E>(&id)).await?;
    Ok(Json(entity))
}

/// DELETE /api/v1/{kind}/:id
pub async fn remove<E: TimedEntity + 'static>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.run(move |db| db.registry().remove::<E>(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/{kind}/:id/attributes
pub async fn add_attributes<E: TimedEntity + 'static>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<E>> {
    let attributes = E::Attributes::from_json(body)?;
    let entity = state
        .run(move |db| db.registry().add_attributes::<E>(&id, attributes))
        .await?;

    Ok(Json(entity))
}
