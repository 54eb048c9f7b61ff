use axum::routing::{get, post};
use axum::Router;

use crate::state::TagwatchState;

pub mod check;
pub mod desired;

pub fn router(state: TagwatchState) -> Router {
    Router::new()
        .route("/check", post(check::check_all_handler))
        .route("/check/:name", post(check::check_one_handler))
        .route("/fleet/changed", post(check::component_changed_handler))
        .route("/desired/:namespace/:name", get(desired::desired_handler))
        .route("/timeline/:team/:name", get(desired::timeline_handler))
        .with_state(state)
}
