use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use btcbrief_core::config::{PipelineConfig, Settings};
use btcbrief_core::domain::report::RunReport;
use btcbrief_core::error::PipelineError;
use btcbrief_core::pipeline::{Pipeline, DEFAULT_QUERY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pipeline = match build_pipeline(&settings) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "api startup failed");
            return Err(err);
        }
    };

    let state = AppState {
        pipeline: Arc::new(pipeline),
        run_lock: Arc::new(Mutex::new(())),
        latest: Arc::new(RwLock::new(None)),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/runs", post(create_run))
        .route("/runs/latest", get(get_latest_run))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline> {
    let config =
        PipelineConfig::from_settings(settings).context("startup configuration is incomplete")?;
    Pipeline::from_config(config)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    // One run at a time.
    run_lock: Arc<Mutex<()>>,
    latest: Arc<RwLock<Option<RunReport>>>,
}

#[derive(Debug, Default, Deserialize)]
struct RunRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_output: Option<String>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

async fn create_run(
    State(state): State<AppState>,
    body: Option<Json<RunRequest>>,
) -> ApiResult<RunReport> {
    let query = body
        .and_then(|Json(req)| req.query)
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    let _guard = state.run_lock.lock().await;
    match state.pipeline.run(&query).await {
        Ok(report) => {
            *state.latest.write().await = Some(report.clone());
            Ok(Json(report))
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), %query, "run failed");
            Err(error_response(&err))
        }
    }
}

async fn get_latest_run(State(state): State<AppState>) -> ApiResult<RunReport> {
    let latest = state.latest.read().await;
    match latest.as_ref() {
        Some(report) => Ok(Json(report.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: "no run has completed yet".to_string(),
                stage: None,
                raw_output: None,
            }),
        )),
    }
}

fn error_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::ConfigMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::SearchUnavailable { .. } => StatusCode::BAD_GATEWAY,
        PipelineError::MalformedRecommendation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::StageFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &anyhow::Error) -> (StatusCode, Json<ApiError>) {
    let typed = err.downcast_ref::<PipelineError>();
    let status = typed
        .map(error_status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        Json(ApiError {
            error: format!("{err:#}"),
            stage: typed.and_then(PipelineError::stage).map(|s| s.to_string()),
            raw_output: typed.and_then(PipelineError::raw_output).map(str::to_string),
        }),
    )
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use btcbrief_core::error::Stage;

    #[test]
    fn missing_api_keys_fail_startup() {
        let settings = Settings {
            search_api_key: None,
            anthropic_api_key: Some("test-anthropic-key".to_string()),
            ..Default::default()
        };
        let err = match build_pipeline(&settings) {
            Ok(_) => panic!("startup should fail without a search key"),
            Err(err) => err,
        };
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ConfigMissing {
                key: "SERPAPI_API_KEY"
            })
        ));
    }

    #[test]
    fn search_failures_map_to_bad_gateway() {
        let err = anyhow::Error::new(PipelineError::SearchUnavailable {
            status: Some(500),
            detail: "boom".to_string(),
        });
        let (status, Json(body)) = error_response(&err);
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.stage.as_deref(), Some("search"));
        assert!(body.raw_output.is_none());
    }

    #[test]
    fn malformed_recommendation_exposes_raw_text() {
        let err = anyhow::Error::new(PipelineError::MalformedRecommendation {
            detail: "missing verdict".to_string(),
            raw_output: "maybe buy?".to_string(),
        });
        let (status, Json(body)) = error_response(&err);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.raw_output.as_deref(), Some("maybe buy?"));
    }

    #[test]
    fn stage_failures_and_untyped_errors_are_internal() {
        let err = anyhow::Error::new(PipelineError::StageFailed {
            stage: Stage::Synthesize,
            detail: "empty narrative".to_string(),
        });
        assert_eq!(error_response(&err).0, StatusCode::INTERNAL_SERVER_ERROR);

        let err = anyhow::anyhow!("something else");
        let (status, Json(body)) = error_response(&err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.stage.is_none());
    }
}
