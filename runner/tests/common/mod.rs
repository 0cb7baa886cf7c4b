//! Common Test Utilities for Integration Tests
//!
//! A stand-in PVZ service served on an ephemeral port, plus scenario helpers.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use pvz_load::scenario::ScenarioFile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// How the mock service answers `GET /pvz`
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Healthy,
    /// 500 on every `n`-th request
    FailEvery(u64),
    /// 200 after a fixed delay
    Slow(Duration),
}

#[derive(Clone)]
struct MockState {
    behavior: Behavior,
    hits: Arc<AtomicU64>,
    seen_tokens: Arc<Mutex<HashMap<String, u64>>>,
}

/// A running mock PVZ service
pub struct MockPvz {
    pub addr: SocketAddr,
    hits: Arc<AtomicU64>,
    seen_tokens: Arc<Mutex<HashMap<String, u64>>>,
}

impl MockPvz {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    /// How many requests carried each bearer token
    pub async fn tokens(&self) -> HashMap<String, u64> {
        self.seen_tokens.lock().await.clone()
    }
}

#[derive(Serialize)]
struct PvzItem {
    id: String,
    city: &'static str,
    registration_date: &'static str,
}

#[derive(Deserialize)]
struct PvzQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list_pvz(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<PvzQuery>,
) -> impl IntoResponse {
    let n = state.hits.fetch_add(1, Ordering::SeqCst) + 1;

    let token = headers
        .get("auth-x")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    *state
        .seen_tokens
        .lock()
        .await
        .entry(token.to_string())
        .or_default() += 1;

    if query.page == Some(0) || query.limit.is_some_and(|l| l == 0 || l > 30) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match state.behavior {
        Behavior::Healthy => {}
        Behavior::FailEvery(every) => {
            if n % every == 0 {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        Behavior::Slow(delay) => tokio::time::sleep(delay).await,
    }

    Json(vec![PvzItem {
        id: uuid::Uuid::new_v4().to_string(),
        city: "Москва",
        registration_date: "2025-04-09T10:00:00Z",
    }])
    .into_response()
}

/// Start the mock service on 127.0.0.1 with an ephemeral port
pub async fn spawn_mock_pvz(behavior: Behavior) -> MockPvz {
    let state = MockState {
        behavior,
        hits: Arc::new(AtomicU64::new(0)),
        seen_tokens: Arc::new(Mutex::new(HashMap::new())),
    };
    let mock = MockPvz {
        addr: "127.0.0.1:0".parse().unwrap(),
        hits: state.hits.clone(),
        seen_tokens: state.seen_tokens.clone(),
    };

    let app = Router::new().route("/pvz", get(list_pvz)).with_state(state);
    let listener = tokio::net::TcpListener::bind(mock.addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockPvz { addr, ..mock }
}

/// A small shared-iterations scenario pointed at `base_url`
pub fn scenario(base_url: &str, vus: usize, iterations: u64) -> ScenarioFile {
    let json = format!(
        r#"{{
            "scenario": {{ "name": "it", "executor": "shared-iterations",
                          "vus": {vus}, "iterations": {iterations}, "duration": "30s",
                          "gracefulStop": "5s" }},
            "thresholds": {{
                "http_req_duration": ["p(95)<100"],
                "http_req_failed": ["rate<0.0001"]
            }},
            "target": {{ "baseUrl": "{base_url}", "timeout": "5s" }},
            "auth": {{
                "credentials": [
                    {{ "role": "moderator", "token": "moderator-token" }},
                    {{ "role": "employee", "token": "employee-token" }}
                ]
            }}
        }}"#
    );
    ScenarioFile::from_json(&json).unwrap()
}
