//! Condition Routes
//!
//! - GET /api/v1/conditions?detector=... - Query conditions of a detector
//! - POST /api/v1/conditions - Attach a new condition
//! - PATCH /api/v1/conditions - Update type and validity of a condition
//!
//! Query selection for GET, by the parameters present:
//!
//! | parameters           | lookup                              |
//! |----------------------|-------------------------------------|
//! | name, start[, end]   | validity window                     |
//! | name, tag            | single condition                    |
//! | name, collected_at   | single condition                    |
//! | name                 | all with that name                  |
//! | tag                  | all with that tag                   |
//! | (none)               | all conditions of the detector      |
//!
//! `tag`, `start` and `collected_at` select different lookups, so at most
//! one of them may be given.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    time_arg, ConditionListResponse, ConditionQuery, CreateConditionRequest,
    UpdateConditionRequest,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::conditions::{ConditionUpdate, NewCondition};
use crate::error::CdbError;
use crate::model::Condition;
use crate::time::TimeArg;

/// GET /api/v1/conditions
pub async fn query_conditions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConditionQuery>,
) -> ApiResult<Json<ConditionListResponse<Condition>>> {
    let ConditionQuery {
        detector,
        name,
        tag,
        start,
        end,
        collected_at,
    } = query;

    if name.is_none() && (start.is_some() || end.is_some() || collected_at.is_some()) {
        return Err(ApiError::Validation(
            "time parameters require 'name'".to_string(),
        ));
    }
    if end.is_some() && start.is_none() {
        return Err(ApiError::Validation("'end' requires 'start'".to_string()));
    }
    let selectors = [tag.is_some(), start.is_some(), collected_at.is_some()];
    if selectors.into_iter().filter(|given| *given).count() > 1 {
        return Err(ApiError::Validation(
            "'tag', 'start' and 'collected_at' are mutually exclusive".to_string(),
        ));
    }

    let conditions = state
        .run(move |db| match (name, tag, start, collected_at) {
            (Some(name), None, Some(start), None) => db.get_conditions_by_name_and_validity(
                &detector,
                &name,
                start,
                end.map(TimeArg::from),
            ),
            (Some(name), Some(tag), None, None) => Ok(db
                .get_condition_by_name_and_tag(&detector, &name, &tag)?
                .into_iter()
                .collect()),
            (Some(name), None, None, Some(at)) => Ok(db
                .get_condition_by_name_and_collection_date(&detector, &name, at)?
                .into_iter()
                .collect()),
            (Some(name), None, None, None) => db.get_conditions_by_name(&detector, &name),
            (None, Some(tag), None, None) => db.get_conditions_by_tag(&detector, &tag),
            (None, None, None, None) => db.get_conditions(&detector),
            _ => Err(CdbError::invalid_value("query", "ambiguous condition lookup")),
        })
        .await?;

    Ok(Json(ConditionListResponse {
        total: conditions.len(),
        conditions,
    }))
}

/// POST /api/v1/conditions
pub async fn create_condition(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConditionRequest>,
) -> ApiResult<(StatusCode, Json<Condition>)> {
    let mut new = NewCondition::new(req.name, req.tag, req.values);
    if let Some(condition_type) = req.condition_type {
        new = new.condition_type(condition_type);
    }
    if let Some(at) = time_arg("collected_at", req.collected_at.as_ref())? {
        new = new.collected_at(at);
    }
    if let Some(since) = time_arg("valid_since", req.valid_since.as_ref())? {
        new = new.valid_since(since);
    }
    if let Some(until) = time_arg("valid_until", req.valid_until.as_ref())? {
        new = new.valid_until(until);
    }

    let detector = req.detector;
    let condition = state.run(move |db| db.add_condition(&detector, new)).await?;
    Ok((StatusCode::CREATED, Json(condition)))
}

/// PATCH /api/v1/conditions
pub async fn update_condition(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateConditionRequest>,
) -> ApiResult<Json<Condition>> {
    let mut update = ConditionUpdate::new();
    if let Some(condition_type) = req.condition_type {
        update = update.condition_type(condition_type);
    }
    if let Some(since) = time_arg("valid_since", req.valid_since.as_ref())? {
        update = update.valid_since(since);
    }
    if let Some(until) = time_arg("valid_until", req.valid_until.as_ref())? {
        update = update.valid_until(until);
    }

    let UpdateConditionRequest {
        detector, name, tag, ..
    } = req;
    let condition = state
        .run(move |db| db.update_condition_by_name_and_tag(&detector, &name, &tag, update))
        .await?;

    Ok(Json(condition))
}
