use std::future::ready;

use anyhow::Context;
use axum::routing::get;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use tagwatch::core::config::{compose_config, TagwatchConfig};
use tagwatch::http;
use tagwatch::state::TagwatchState;

fn setup_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Error installing prometheus recorder")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let app_config: TagwatchConfig = compose_config("tagwatch", "tagwatch")
        .context("Error loading configuration")?;

    let address = app_config.address;
    let recorder_handle = setup_metrics_recorder()?;

    let state = TagwatchState::build(app_config).await
        .context("Error building tagwatch state")?;
    state.start().await
        .context("Error starting controllers")?;

    let app = http::router(state.clone())
        .route("/metrics", get(move || ready(recorder_handle.render())));

    log::info!("Listening on {address}");
    let served = axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await
        .context("Error starting server");

    state.stop();
    served
}
