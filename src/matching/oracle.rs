//! Prediction oracle
//!
//! External service that decomposes a product name into a breakdown.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::components::Breakdown;
use super::tokenizer::tokenize;

const USER_AGENT: &str = concat!("mask_catalog/", env!("CARGO_PKG_VERSION"));

/// Oracle client errors
#[derive(Debug, Error)]
pub enum OracleError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Oracle returned an error response
    #[error("Oracle error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the oracle response
    #[error("Parse error: {0}")]
    Parse(String),
}

/// One oracle answer for one name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub breakdown: Breakdown,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Set when the oracle could not really predict and guessed instead
    #[serde(default)]
    pub fallback: bool,
}

impl Prediction {
    /// A prediction worth caching
    pub fn is_usable(&self) -> bool {
        !self.fallback && !self.breakdown.is_empty()
    }
}

/// Source of breakdowns for names with no cached one
#[async_trait]
pub trait PredictionOracle: Send + Sync {
    async fn predict(&self, name: &str) -> Result<Option<Prediction>, OracleError>;

    /// Results line up with `names`; `None` means nothing was predicted
    async fn predict_batch(&self, names: &[String]) -> Result<Vec<Option<Prediction>>, OracleError>;
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    name: &'a str,
    tokens: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PredictBatchRequest<'a> {
    names: &'a [String],
    tokens: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PredictBatchResponse {
    results: Vec<Option<Prediction>>,
}

/// Oracle reached over HTTP
pub struct HttpPredictionOracle {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpPredictionOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, OracleError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OracleError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PredictionOracle for HttpPredictionOracle {
    async fn predict(&self, name: &str) -> Result<Option<Prediction>, OracleError> {
        tracing::debug!(name = %name, "Requesting breakdown prediction");

        let request = PredictRequest {
            name,
            tokens: tokenize(name),
        };
        self.post("predict", &request).await
    }

    async fn predict_batch(&self, names: &[String]) -> Result<Vec<Option<Prediction>>, OracleError> {
        tracing::debug!(count = names.len(), "Requesting batch breakdown prediction");

        let request = PredictBatchRequest {
            names,
            tokens: names.iter().map(|name| tokenize(name)).collect(),
        };
        let response: PredictBatchResponse = self.post("predict_batch", &request).await?;

        if response.results.len() != names.len() {
            return Err(OracleError::Parse(format!(
                "expected {} results, got {}",
                names.len(),
                response.results.len()
            )));
        }

        Ok(response.results)
    }
}

/// Stand-in used when no oracle is configured; never predicts anything
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableOracle;

#[async_trait]
impl PredictionOracle for UnavailableOracle {
    async fn predict(&self, _name: &str) -> Result<Option<Prediction>, OracleError> {
        Ok(None)
    }

    async fn predict_batch(&self, names: &[String]) -> Result<Vec<Option<Prediction>>, OracleError> {
        Ok(vec![None; names.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::components::BreakdownEntry;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let oracle = HttpPredictionOracle::new("http://localhost:9000/", Duration::from_secs(5)).unwrap();
        assert_eq!(oracle.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_prediction_parsing() {
        let prediction: Prediction = serde_json::from_value(json!({
            "breakdown": [{"3M": "brand"}, {"Aura": "model"}],
            "confidence": 0.93
        }))
        .unwrap();

        assert!(prediction.is_usable());
        assert_eq!(prediction.breakdown[1], BreakdownEntry::new("Aura", "model"));

        let fallback: Prediction =
            serde_json::from_value(json!({"breakdown": [{"3M": "brand"}], "fallback": true})).unwrap();
        assert!(!fallback.is_usable());
    }

    #[test]
    fn test_batch_request_carries_tokens() {
        let names = vec!["3M Aura 9205+".to_string()];
        let request = PredictBatchRequest {
            names: &names,
            tokens: names.iter().map(|name| tokenize(name)).collect(),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"names": ["3M Aura 9205+"], "tokens": [["3M", "Aura", "9205+"]]})
        );
    }

    #[tokio::test]
    async fn test_unavailable_oracle_answers_nothing() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(UnavailableOracle.predict_batch(&names).await.unwrap(), vec![None, None]);
        assert_eq!(UnavailableOracle.predict("a").await.unwrap(), None);
    }
}
