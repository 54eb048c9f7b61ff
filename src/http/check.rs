use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::core::error::TagwatchError;
use crate::dto::check::{CheckAcceptedDto, ComponentChangedReqDto};
use crate::dto::error::ErrorDto;
use crate::service::catalog_controller::CatalogController;
use crate::service::fleet_loop::FleetLoop;

async fn accept_checks(ctrl: CatalogController, names: Vec<String>) -> Result<(StatusCode, Json<CheckAcceptedDto>), (StatusCode, Json<ErrorDto>)> {
    if !ctrl.is_running() {
        return Err(TagwatchError::Unavailable(String::from("catalog controller is stopped")).into());
    }
    let jobs = ctrl.plan(&names).await;
    let accepted = CheckAcceptedDto::from_enqueued(jobs.len());
    if !jobs.is_empty() {
        let waiting = ctrl.submit_detached(jobs);
        log::debug!("{waiting} checks waiting for the catalog worker");
    }
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

pub async fn check_all_handler(
    State(ctrl): State<CatalogController>,
) -> Result<(StatusCode, Json<CheckAcceptedDto>), (StatusCode, Json<ErrorDto>)> {
    accept_checks(ctrl, Vec::new()).await
}

pub async fn check_one_handler(
    Path(name): Path<String>,
    State(ctrl): State<CatalogController>,
) -> Result<(StatusCode, Json<CheckAcceptedDto>), (StatusCode, Json<ErrorDto>)> {
    accept_checks(ctrl, vec![name]).await
}

pub async fn component_changed_handler(
    State(fleet): State<FleetLoop>,
    Json(req): Json<ComponentChangedReqDto>,
) -> Result<StatusCode, (StatusCode, Json<ErrorDto>)> {
    if req.name.trim().is_empty() {
        return Err(TagwatchError::BadRequest(String::from("component name is required")).into());
    }
    fleet.component_changed(&req.name, req.repository.as_deref());
    Ok(StatusCode::ACCEPTED)
}
