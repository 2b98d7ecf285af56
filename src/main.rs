use std::{process, sync::Arc};

use marquee::{
    application::{error::AppError, lists::ListService},
    cache::{CacheConfig, SnapshotCache},
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        imdb::ImdbListSource,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let cache = SnapshotCache::new(&CacheConfig::from(&settings.cache));
    let source = Arc::new(ImdbListSource::new(&settings.upstream).map_err(AppError::from)?);
    let lists = Arc::new(ListService::new(cache, source));
    let router = http::build_router(AppState { lists });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        addr = %settings.server.addr,
        upstream = %settings.upstream.base_url,
        cache_ttl_seconds = settings.cache.ttl_seconds,
        cache_capacity = settings.cache.capacity,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
    }
}
