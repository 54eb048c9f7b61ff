use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::core::error::TagwatchError;
use crate::dto::check::{DesiredStateDto, TimelineDto};
use crate::dto::error::ErrorDto;
use crate::model::desired::RecordKey;
use crate::service::fleet_loop::FleetLoop;
use crate::store::DesiredStateStore;

pub async fn desired_handler(
    Path((namespace, name)): Path<(String, String)>,
    State(store): State<Arc<dyn DesiredStateStore>>,
) -> Result<Json<DesiredStateDto>, (StatusCode, Json<ErrorDto>)> {
    let record = store.get(&RecordKey::new(&namespace, &name)).await
        .map_err(TagwatchError::from)?
        .ok_or(TagwatchError::NotFound)?;
    Ok(Json(DesiredStateDto::from(record)))
}

pub async fn timeline_handler(
    Path((team, name)): Path<(String, String)>,
    State(fleet): State<FleetLoop>,
) -> Result<Json<TimelineDto>, (StatusCode, Json<ErrorDto>)> {
    let timeline = fleet.timeline(&team, &name)
        .ok_or(TagwatchError::NotFound)?;
    Ok(Json(TimelineDto {
        entries: timeline.entries(),
        team,
        component: name,
    }))
}
