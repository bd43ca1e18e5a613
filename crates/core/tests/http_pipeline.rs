//! Runs the real SerpAPI and Anthropic clients against a local stub server.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use btcbrief_core::config::{PipelineConfig, Settings};
use btcbrief_core::domain::recommendation::{Confidence, Verdict};
use btcbrief_core::error::{PipelineError, Stage};
use btcbrief_core::llm::error::LlmDiagnosticsError;
use btcbrief_core::pipeline::Pipeline;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct Stub {
    search_status: StatusCode,
    messages_status: StatusCode,
    empty_second_snippet: bool,
    message_calls: Arc<AtomicUsize>,
}

async fn search_handler(
    State(stub): State<Stub>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if stub.search_status != StatusCode::OK {
        return (stub.search_status, Json(json!({"error": "Internal Server Error"})));
    }
    assert_eq!(params.get("tbs").map(String::as_str), Some("qdr:d"));
    assert_eq!(params.get("api_key").map(String::as_str), Some("serp-test"));

    let second_snippet = if stub.empty_second_snippet {
        ""
    } else {
        "Miners moved 20k BTC to exchanges."
    };

    (
        StatusCode::OK,
        Json(json!({
            "organic_results": [
                {"title": "Bitcoin ETF inflows slow", "link": "https://a.example.com/etf", "snippet": "Spot ETFs saw $50m of inflows.", "date": "2 hours ago"},
                {"title": "Miners send coins to exchanges", "link": "https://b.example.com/miners", "snippet": second_snippet, "date": "5 hours ago"},
                {"title": "Options expiry looms", "link": "https://c.example.com/options", "snippet": "$4bn of options expire Friday.", "date": "9 hours ago"}
            ]
        })),
    )
}

async fn messages_handler(
    State(stub): State<Stub>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    stub.message_calls.fetch_add(1, Ordering::SeqCst);

    if stub.messages_status != StatusCode::OK {
        return (
            stub.messages_status,
            Json(json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}})),
        );
    }

    if body.get("tools").is_some() {
        return (StatusCode::OK, Json(json!({
            "content": [{
                "type": "tool_use",
                "id": "toolu_1",
                "name": "emit_recommendation",
                "input": {
                    "verdict": "HOLD",
                    "confidence": "MEDIUM",
                    "reasons": ["mixed short-term signals"],
                    "risks": ["regulatory uncertainty"],
                    "guidance": "wait for breakout confirmation",
                    "time_horizon": "1-3 days"
                }
            }],
            "stop_reason": "tool_use"
        })));
    }

    let system = body["system"].as_str().unwrap_or_default();
    let text = if system.contains("Article Analyst") {
        "The article reports modest flows and neutral sentiment."
    } else {
        "Across sources, Bitcoin is range-bound with mixed signals."
    };
    (
        StatusCode::OK,
        Json(json!({
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn"
        })),
    )
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/search.json", get(search_handler))
        .route("/v1/messages", post(messages_handler))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base_url: &str) -> PipelineConfig {
    let settings = Settings {
        search_api_key: Some("serp-test".to_string()),
        search_base_url: Some(base_url.to_string()),
        anthropic_api_key: Some("sk-ant-test".to_string()),
        anthropic_base_url: Some(base_url.to_string()),
        ..Default::default()
    };
    PipelineConfig::from_settings(&settings).unwrap()
}

fn stub(search_status: StatusCode, empty_second_snippet: bool) -> Stub {
    Stub {
        search_status,
        messages_status: StatusCode::OK,
        empty_second_snippet,
        message_calls: Arc::new(AtomicUsize::new(0)),
    }
}

#[tokio::test]
async fn full_run_over_http_produces_hold() {
    let stub = stub(StatusCode::OK, false);
    let calls = stub.message_calls.clone();
    let base = spawn_stub(stub).await;

    let pipeline = Pipeline::from_config(config(&base)).unwrap();
    let report = pipeline
        .run("Bitcoin market today trading analysis")
        .await
        .unwrap();

    assert_eq!(report.articles.len(), 3);
    assert_eq!(report.articles[0].title, "Bitcoin ETF inflows slow");
    assert_eq!(report.summaries.len(), 3);
    assert_eq!(report.placeholder_count(), 0);
    assert!(!report.narrative.text.is_empty());
    assert_eq!(report.recommendation.verdict, Verdict::Hold);
    assert_eq!(report.recommendation.confidence, Confidence::Medium);
    assert_eq!(report.recommendation.time_horizon.as_deref(), Some("1-3 days"));
    // 3 summaries + synthesis + recommendation.
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn http_500_from_search_is_search_unavailable() {
    let stub = stub(StatusCode::INTERNAL_SERVER_ERROR, false);
    let calls = stub.message_calls.clone();
    let base = spawn_stub(stub).await;

    let pipeline = Pipeline::from_config(config(&base)).unwrap();
    let err = pipeline.run("Bitcoin market today").await.unwrap_err();

    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::SearchUnavailable { status, detail }) => {
            assert_eq!(*status, Some(500));
            assert_eq!(detail, "Internal Server Error");
        }
        other => panic!("expected SearchUnavailable, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_snippet_is_a_placeholder_and_the_run_completes() {
    let stub = stub(StatusCode::OK, true);
    let calls = stub.message_calls.clone();
    let base = spawn_stub(stub).await;

    let pipeline = Pipeline::from_config(config(&base)).unwrap();
    let report = pipeline.run("Bitcoin market today").await.unwrap();

    assert_eq!(report.summaries.len(), 3);
    assert_eq!(report.placeholder_count(), 1);
    assert!(report.summaries[1].insufficient);
    assert_eq!(report.degraded.len(), 1);
    assert_eq!(report.degraded[0].url, "https://b.example.com/miners");
    assert_eq!(report.recommendation.verdict, Verdict::Hold);
    // The empty article is never sent to the model.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn rejected_model_key_degrades_extraction_then_fails_synthesis() {
    let stub = Stub {
        messages_status: StatusCode::UNAUTHORIZED,
        ..stub(StatusCode::OK, false)
    };
    let calls = stub.message_calls.clone();
    let base = spawn_stub(stub).await;

    let pipeline = Pipeline::from_config(config(&base)).unwrap();
    let err = pipeline.run("Bitcoin market today").await.unwrap_err();

    let pe = err.downcast_ref::<PipelineError>().unwrap();
    assert_eq!(pe.stage(), Some(Stage::Synthesize));
    let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
    assert_eq!(diag.phase, "http");
    assert_eq!(diag.purpose, "synthesize");
    assert!(diag.raw_output.as_deref().unwrap().contains("invalid x-api-key"));
    // Three failed summaries, then the synthesis call.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
