//! reqwest-backed [`StageBackend`] talking JSON to the analysis service.

use std::time::Duration;

use petriflow_config::ServiceConfig;
use petriflow_types::{DagProjection, IntentSpec, PetriNet, SimulationResult, ValidationResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::wire::{
    BuildRequest, BuildResponse, DagRequest, DagResponse, ErrorEnvelope, ParseOutcome,
    ParseRequest, ParseResponse, SimulateOptions, SimulateRequest, SimulateResponse,
    StageResponse, ValidateOptions, ValidateRequest, ValidateResponse,
};
use crate::{StageBackend, StageCallError, StageFut};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum BackendConfigError {
    #[error("service base URL is empty")]
    EmptyBaseUrl,
    #[error("service base URL must start with http:// or https:// (got {0})")]
    UnsupportedScheme(String),
    #[error("service base URL must use https (got {0})")]
    InsecureScheme(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

pub struct HttpStageBackend {
    client: reqwest::Client,
    base_url: String,
    schema_version: String,
    api_token: Option<String>,
    retry: RetryConfig,
    timeout: Duration,
}

impl std::fmt::Debug for HttpStageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStageBackend")
            .field("base_url", &self.base_url)
            .field("schema_version", &self.schema_version)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn normalize_base_url(raw: &str, require_https: bool) -> Result<String, BackendConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(BackendConfigError::EmptyBaseUrl);
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("https://") {
        return Ok(trimmed.to_string());
    }
    if lower.starts_with("http://") {
        if require_https {
            return Err(BackendConfigError::InsecureScheme(trimmed.to_string()));
        }
        return Ok(trimmed.to_string());
    }
    Err(BackendConfigError::UnsupportedScheme(trimmed.to_string()))
}

fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        "X-Petriflow-Client",
        HeaderValue::from_static(concat!("petriflow/", env!("CARGO_PKG_VERSION"))),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

impl HttpStageBackend {
    /// Backend with default timeout and retry policy.
    pub fn new(
        base_url: &str,
        schema_version: impl Into<String>,
    ) -> Result<Self, BackendConfigError> {
        let timeout = Duration::from_secs(ServiceConfig::default().request_timeout_secs);
        Self::from_parts(base_url, schema_version.into(), timeout, false)
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, BackendConfigError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let mut backend = Self::from_parts(
            &config.resolved_base_url(),
            config.schema_version.clone(),
            timeout,
            config.require_https,
        )?;
        backend.retry = RetryConfig::default().with_max_retries(config.max_retries);
        backend.api_token = config.resolved_api_token();
        Ok(backend)
    }

    fn from_parts(
        base_url: &str,
        schema_version: String,
        timeout: Duration,
        require_https: bool,
    ) -> Result<Self, BackendConfigError> {
        let base_url = normalize_base_url(base_url, require_https)?;
        let client = client_builder(timeout)
            .build()
            .map_err(BackendConfigError::Client)?;
        Ok(Self {
            client,
            base_url,
            schema_version,
            api_token: None,
            retry: RetryConfig::default(),
            timeout,
        })
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    async fn post<B, R>(&self, name: &'static str, body: &B) -> Result<R::Output, StageCallError>
    where
        B: Serialize + Sync,
        R: StageResponse + DeserializeOwned,
    {
        let url = self.endpoint(name);
        let build_request = || {
            let request = self.client.post(&url).json(body);
            match &self.api_token {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        };

        tracing::debug!(endpoint = name, url = %url, "Calling stage service");
        let outcome = send_with_retry(build_request, Some(self.timeout), &self.retry).await;

        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => return Err(http_error(response).await),
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(StageCallError::Transport {
                    attempts,
                    message: source.to_string(),
                });
            }
            RetryOutcome::NonRetryable(source) => {
                return Err(StageCallError::Transport {
                    attempts: 1,
                    message: source.to_string(),
                });
            }
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StageCallError::Transport {
                attempts: 1,
                message: format!("failed to read response body: {e}"),
            })?;
        let parsed: R = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(endpoint = name, %e, "Stage response did not match the expected shape");
            StageCallError::Decode(e.to_string())
        })?;
        parsed.settle()
    }
}

/// Turn a non-2xx response into a rejection when the body explains the
/// failure, otherwise into a plain HTTP error.
async fn http_error(response: reqwest::Response) -> StageCallError {
    let status = response.status().as_u16();
    let body = read_capped_error_body(response).await;
    if let Ok(ErrorEnvelope { error: Some(error) }) = serde_json::from_str(&body) {
        return error.into();
    }
    StageCallError::Http { status, body }
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

impl StageBackend for HttpStageBackend {
    fn parse<'a>(&'a self, text: &'a str) -> StageFut<'a, ParseOutcome> {
        Box::pin(async move {
            let body = ParseRequest {
                text,
                schema_version: &self.schema_version,
            };
            self.post::<_, ParseResponse>("parse", &body).await
        })
    }

    fn build<'a>(&'a self, intent: &'a IntentSpec) -> StageFut<'a, PetriNet> {
        Box::pin(async move {
            let body = BuildRequest {
                intent,
                schema_version: &self.schema_version,
            };
            self.post::<_, BuildResponse>("build", &body).await
        })
    }

    fn validate<'a>(
        &'a self,
        net: &'a PetriNet,
        options: &'a ValidateOptions,
    ) -> StageFut<'a, ValidationResult> {
        Box::pin(async move {
            let body = ValidateRequest {
                petri_net: net,
                config: options,
                schema_version: &self.schema_version,
            };
            self.post::<_, ValidateResponse>("validate", &body).await
        })
    }

    fn simulate<'a>(
        &'a self,
        net: &'a PetriNet,
        options: &'a SimulateOptions,
    ) -> StageFut<'a, SimulationResult> {
        Box::pin(async move {
            let body = SimulateRequest {
                petri_net: net,
                config: options,
                schema_version: &self.schema_version,
            };
            self.post::<_, SimulateResponse>("simulate", &body).await
        })
    }

    fn dag<'a>(&'a self, net: &'a PetriNet) -> StageFut<'a, DagProjection> {
        Box::pin(async move {
            let body = DagRequest {
                petri_net: net,
                schema_version: &self.schema_version,
            };
            self.post::<_, DagResponse>("dag", &body).await
        })
    }
}
