use crate::errors::{AppError, AppResult};
use crate::models::LifecycleCriteria;
use serde_json::Value;
use std::time::Duration;

const CRITERIA_PATH: &str = "/api/settings/lifecycle-criteria";

// Thin client for the sourcing backend; payload validation happens in
// `schema` after the bytes arrive.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| AppError::Internal(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn criteria_url(&self) -> String {
        format!("{}{}", self.base_url, CRITERIA_PATH)
    }

    pub async fn fetch_lifecycle_criteria(&self) -> AppResult<Value> {
        let response = self
            .http
            .get(self.criteria_url())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    // The response body is the saved category mapping, which becomes the new
    // baseline snapshot.
    pub async fn save_lifecycle_criteria(&self, criteria: &LifecycleCriteria) -> AppResult<Value> {
        let response = self
            .http
            .post(self.criteria_url())
            .json(criteria)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiClient;

    #[test]
    fn trailing_slash_is_normalized_away() {
        let client = ApiClient::new("http://127.0.0.1:8700/", 5).expect("client");
        assert_eq!(
            client.criteria_url(),
            "http://127.0.0.1:8700/api/settings/lifecycle-criteria"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_surfaces_a_network_error() {
        let client = ApiClient::new("http://127.0.0.1:9", 1).expect("client");
        let error = client.fetch_lifecycle_criteria().await.expect_err("no backend");
        assert!(error.to_string().starts_with("NETWORK_FAILURE"));
    }
}
