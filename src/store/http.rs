//! HTTP resource store backend.
//!
//! This module talks to a Kubernetes style REST API server: collections
//! live under `/<api prefix>/namespaces/<namespace>/<plural>` and single
//! objects under the collection path followed by their name.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, header};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::{AgentError, Result, StoreError, status_reason};

use super::api::{ResourceKind, ResourcePath, ResourceStore, UpdateOutcome};

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 500;

/// Resource store backed by a REST API server.
#[derive(Debug, Clone)]
pub struct HttpResourceStore {
    /// HTTP client.
    client: Client,
    /// Base URL of the API server, without trailing slash.
    base_url: String,
    /// Namespace holding the managed resources.
    namespace: String,
    /// Bearer token, if any.
    token: Option<String>,
    /// Maximum attempts per request.
    max_retries: u32,
}

impl HttpResourceStore {
    /// Creates a new store client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token file cannot be read or the HTTP client
    /// cannot be created.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let token = match (&config.token, &config.token_file) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(path)) => Some(std::fs::read_to_string(path)?.trim().to_string()),
            (None, None) => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .build()
            .map_err(|e| StoreError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            token,
            max_retries: MAX_RETRIES,
        })
    }

    /// Sets the maximum number of attempts per request.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn collection_url(&self, kind: ResourceKind) -> String {
        format!(
            "{}/{}/namespaces/{}/{}",
            self.base_url,
            kind.api_prefix(),
            self.namespace,
            kind.plural()
        )
    }

    fn item_url(&self, path: &ResourcePath) -> String {
        format!("{}/{}", self.collection_url(path.kind), path.name)
    }

    /// Sends a request, retrying transient failures.
    ///
    /// Rate-limited requests wait for the server's `Retry-After` hint. A
    /// `POST` is only retried when it was rate limited, since a network
    /// failure may hide a create that already succeeded.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let mut last_error = None;
        let mut delay = Duration::ZERO;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {} for {url} in {delay:?}", self.max_retries);
                tokio::time::sleep(delay).await;
            }

            match self.execute_once(method.clone(), url, query, body).await {
                Ok(response) => return Ok(response),
                Err(e) if Self::should_retry(&method, &e) => {
                    delay = Self::retry_delay(&e, attempt + 1);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| StoreError::network("Max retries exceeded").into()))
    }

    fn should_retry(method: &Method, error: &AgentError) -> bool {
        if !error.is_retryable() {
            return false;
        }
        *method != Method::POST || matches!(error, AgentError::Store(StoreError::RateLimited { .. }))
    }

    fn retry_delay(error: &AgentError, attempt: u32) -> Duration {
        match error {
            AgentError::Store(StoreError::RateLimited { .. }) => {
                Duration::from_secs(error.retry_delay_secs().unwrap_or(1))
            }
            _ => Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)),
        }
    }

    /// Sends a single request.
    async fn execute_once(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response> {
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::network(format!("Request failed: {e}")))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Err(StoreError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status == 401 || status == 403 {
            return Err(StoreError::AuthenticationFailed {
                message: format!("{status} {}", status_reason(status)),
            }
            .into());
        }

        Ok(response)
    }

    async fn read_json(response: Response) -> Result<Value> {
        response.json().await.map_err(|e| {
            StoreError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            }
            .into()
        })
    }

    async fn failure(response: Response) -> AgentError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::api_error(status, body).into()
    }
}

#[async_trait]
impl ResourceStore for HttpResourceStore {
    async fn list(&self, kind: ResourceKind, selector: Option<&str>) -> Result<Vec<Value>> {
        let url = self.collection_url(kind);
        let query: Vec<(&str, &str)> = selector
            .map(|s| vec![("labelSelector", s)])
            .unwrap_or_default();

        let response = self.execute(Method::GET, &url, &query, None).await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let mut list = Self::read_json(response).await?;
        match list.get_mut("items").map(Value::take) {
            Some(Value::Array(items)) => {
                debug!("Listed {} {kind}", items.len());
                Ok(items)
            }
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(StoreError::InvalidResponse {
                message: format!("{kind} list has no items"),
            }
            .into()),
        }
    }

    async fn create(&self, kind: ResourceKind, body: &Value) -> Result<u16> {
        let url = self.collection_url(kind);
        let response = self.execute(Method::POST, &url, &[], Some(body)).await?;
        Ok(response.status().as_u16())
    }

    async fn update(
        &self,
        path: &ResourcePath,
        mutator: &(dyn Fn(Value) -> Result<Option<Value>> + Send + Sync),
    ) -> Result<UpdateOutcome> {
        let url = self.item_url(path);

        let response = self.execute(Method::GET, &url, &[], None).await?;
        if response.status().as_u16() == 404 {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            }
            .into());
        }
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let current = Self::read_json(response).await?;
        let Some(updated) = mutator(current)? else {
            return Ok(UpdateOutcome::Unchanged);
        };

        let response = self.execute(Method::PUT, &url, &[], Some(&updated)).await?;
        match response.status().as_u16() {
            404 => Err(StoreError::NotFound {
                path: path.to_string(),
            }
            .into()),
            409 => Err(StoreError::Conflict {
                path: path.to_string(),
            }
            .into()),
            _ if response.status().is_success() => Ok(UpdateOutcome::Updated),
            _ => Err(Self::failure(response).await),
        }
    }

    async fn delete(&self, path: &ResourcePath) -> Result<u16> {
        let url = self.item_url(path);
        let response = self.execute(Method::DELETE, &url, &[], None).await?;
        Ok(response.status().as_u16())
    }

    fn backend_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONFIG_MAPS: &str = "/api/v1/namespaces/ns/configmaps";

    fn store_for(server: &MockServer) -> HttpResourceStore {
        let config = StoreConfig {
            url: server.uri(),
            namespace: String::from("ns"),
            token: Some(String::from("secret")),
            ..StoreConfig::default()
        };
        HttpResourceStore::new(&config)
            .expect("client should build")
            .with_max_retries(1)
    }

    #[tokio::test]
    async fn test_list_with_selector_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONFIG_MAPS))
            .and(query_param("labelSelector", "type=address-config"))
            .and(header_eq("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"metadata": {"name": "space.q1"}, "data": {}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = store_for(&server)
            .list(ResourceKind::ConfigMap, Some("type=address-config"))
            .await
            .expect("list should succeed");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["metadata"]["name"], "space.q1");
    }

    #[tokio::test]
    async fn test_plan_kinds_use_admin_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/admin.enmasse.io/v1beta1/namespaces/ns/addressplans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let items = store_for(&server)
            .list(ResourceKind::AddressPlan, None)
            .await
            .expect("list should succeed");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONFIG_MAPS))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CONFIG_MAPS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let items = store_for(&server)
            .with_max_retries(2)
            .list(ResourceKind::ConfigMap, None)
            .await
            .expect("retry should succeed");
        assert!(items.is_empty());
    }

    #[test]
    fn test_retry_policy() {
        let network = AgentError::from(StoreError::network("connection reset"));
        let limited = AgentError::from(StoreError::RateLimited { retry_after_secs: 7 });
        let conflict = AgentError::from(StoreError::Conflict {
            path: String::from("configmaps/a"),
        });

        assert!(HttpResourceStore::should_retry(&Method::GET, &network));
        assert!(!HttpResourceStore::should_retry(&Method::POST, &network));
        assert!(HttpResourceStore::should_retry(&Method::POST, &limited));
        assert!(!HttpResourceStore::should_retry(&Method::PUT, &conflict));

        assert_eq!(HttpResourceStore::retry_delay(&limited, 1), Duration::from_secs(7));
        assert_eq!(
            HttpResourceStore::retry_delay(&network, 2),
            Duration::from_millis(RETRY_DELAY_MS * 2)
        );
    }

    #[tokio::test]
    async fn test_create_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONFIG_MAPS))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let status = store_for(&server)
            .create(ResourceKind::ConfigMap, &json!({"metadata": {"name": "x"}}))
            .await
            .expect("request should complete");
        assert_eq!(status, 409);
    }

    #[tokio::test]
    async fn test_update_without_change_skips_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{CONFIG_MAPS}/space.q1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = store_for(&server)
            .update(&ResourcePath::config_map("space.q1"), &|_: Value| Ok(None))
            .await
            .expect("update should succeed");
        assert_eq!(outcome, UpdateOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_update_writes_mutated_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{CONFIG_MAPS}/space.q1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"k": "old"}})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("{CONFIG_MAPS}/space.q1")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = store_for(&server)
            .update(&ResourcePath::config_map("space.q1"), &|mut v: Value| {
                v["data"]["k"] = json!("new");
                Ok(Some(v))
            })
            .await
            .expect("update should succeed");
        assert_eq!(outcome, UpdateOutcome::Updated);
    }

    #[tokio::test]
    async fn test_update_mutator_error_skips_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{CONFIG_MAPS}/space.q1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = store_for(&server)
            .update(&ResourcePath::config_map("space.q1"), &|_: Value| {
                Err(AgentError::internal("unreadable"))
            })
            .await
            .expect_err("mutator error should surface");
        assert!(matches!(err, AgentError::Internal(_)));
    }

    #[tokio::test]
    async fn test_update_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .update(&ResourcePath::config_map("space.q1"), &|v: Value| Ok(Some(v)))
            .await
            .expect_err("conflict should surface");
        assert!(matches!(err, AgentError::Store(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .update(&ResourcePath::config_map("gone"), &|v: Value| Ok(Some(v)))
            .await
            .expect_err("missing object should surface");
        assert!(matches!(err, AgentError::Store(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .list(ResourceKind::ConfigMap, None)
            .await
            .expect_err("401 should surface");
        assert!(matches!(
            err,
            AgentError::Store(StoreError::AuthenticationFailed { .. })
        ));
    }
}
