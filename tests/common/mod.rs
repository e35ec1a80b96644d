//! Common test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use mask_catalog::api::{build_router, AppState};
use mask_catalog::matching::{BreakdownEntry, MatchSettings, OracleError, Prediction, PredictionOracle};
use serde_json::Value;
use tower::util::ServiceExt;

/// Oracle answering from a fixed table
#[derive(Default)]
pub struct StubOracle {
    predictions: HashMap<String, Prediction>,
    pub batch_calls: AtomicUsize,
}

impl StubOracle {
    pub fn with(mut self, name: &str, pairs: &[(&str, &str)]) -> Self {
        self.predictions.insert(
            name.to_string(),
            Prediction {
                breakdown: pairs.iter().map(|(t, l)| BreakdownEntry::new(*t, *l)).collect(),
                confidence: Some(0.95),
                fallback: false,
            },
        );
        self
    }

    pub fn with_fallback(mut self, name: &str) -> Self {
        self.predictions.insert(
            name.to_string(),
            Prediction {
                breakdown: vec![BreakdownEntry::new(name, "misc")],
                confidence: None,
                fallback: true,
            },
        );
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionOracle for StubOracle {
    async fn predict(&self, name: &str) -> Result<Option<Prediction>, OracleError> {
        Ok(self.predictions.get(name).cloned())
    }

    async fn predict_batch(&self, names: &[String]) -> Result<Vec<Option<Prediction>>, OracleError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(names.iter().map(|name| self.predictions.get(name).cloned()).collect())
    }
}

/// In-memory application state with immediate reprojection
pub fn in_memory_state(oracle: Arc<dyn PredictionOracle>) -> AppState {
    AppState::in_memory(oracle, Duration::ZERO, MatchSettings::default())
}

pub fn test_app(state: AppState) -> Router {
    build_router(state)
}

/// Send one request and decode the JSON response body
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    (status, value)
}

/// Poll until the materialized record satisfies `check`
pub async fn wait_for_mask<F>(app: &Router, mask_id: &str, check: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    let uri = format!("/api/v1/masks/{}", mask_id);
    let mut last = Value::Null;
    for _ in 0..100 {
        let (status, body) = send(app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        if check(&body) {
            return body;
        }
        last = body;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("mask {} never reached the expected state, last seen: {}", mask_id, last);
}
