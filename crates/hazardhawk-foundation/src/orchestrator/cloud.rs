//! Cloud Analyzer: Remote Vision Model Tier
//!
//! [`CloudAnalyzer`] sends the photo to a remote safety-analysis endpoint and
//! maps the returned detections through the same catalog as the on-device
//! tier. It sits between the local model and the checklist fallback:
//!
//! ```text
//!   Request → [FallbackOrchestrator] → OnDeviceAnalyzer ── ok → result
//!                                            │
//!                                  OOM / unsupported / unavailable
//!                                            │
//!                                            ▼
//!                                     CloudAnalyzer  ← this module
//!                                            │
//!                                            ▼
//!                                    ChecklistAnalyzer
//! ```
//!
//! ## Wire format
//!
//! `POST {endpoint}` with `Authorization: Bearer <key>`:
//!
//! ```json
//! { "model": "safety-vision", "image_base64": "...", "mime_type": "image/jpeg",
//!   "work_type": "FALL_PROTECTION", "confidence_threshold": 0.6,
//!   "include_osha_codes": true }
//! ```
//!
//! The response carries raw detections:
//!
//! ```json
//! { "model": "safety-vision-2", "overall_confidence": 0.91,
//!   "detections": [{ "label": "no_hard_hat", "score": 0.93 }] }
//! ```
//!
//! ## Retry Strategy
//!
//! HTTP 429, 5xx and transport failures are retried with exponential backoff
//! and jitter:
//!
//! ```text
//! Attempt 1: immediate
//! Attempt 2: base_delay × 2^0 + jitter
//! Attempt 3: base_delay × 2^1 + jitter
//! ```
//!
//! 401/403 surface as `Initialization`, 400/413/422 as `InvalidInput`, 415 as
//! `UnsupportedContent`. Once retries run out the last failure is returned as
//! `Remote`, which the fallback chain treats as a resource failure and does
//! not retry again.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::analyzer::{AnalysisCapability, AnalyzerTier, SafetyAnalyzer};
use super::catalog::{self, AssemblyOptions};
use super::error::AnalysisError;
use super::runtime::RawInference;
use super::types::{AnalysisRequest, AnalysisResult, AnalysisStage, WorkType};

pub const DEFAULT_CLOUD_PRIORITY: i32 = 50;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the cloud tier.
///
/// ```rust
/// use hazardhawk_foundation::orchestrator::cloud::CloudAnalyzerConfig;
///
/// let config = CloudAnalyzerConfig::new("https://vision.example.com/v1/analyze")
///     .with_api_key("hh-live-123")
///     .with_model("safety-vision-large")
///     .with_max_retries(1);
/// assert_eq!(config.max_retries, 1);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudAnalyzerConfig {
    pub endpoint: String,

    /// Used when `configure` is called without a key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Remote model identifier. Default: `"safety-vision"`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout. Default: 30 000 ms.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt for transient failures. Default: `2`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Actual delay = `retry_base_delay_ms × 2^(attempt-1) + random_jitter`.
    /// Default: `500`.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_model() -> String {
    "safety-vision".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_priority() -> i32 {
    DEFAULT_CLOUD_PRIORITY
}

// The key stays out of logs.
impl std::fmt::Debug for CloudAnalyzerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudAnalyzerConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("priority", &self.priority)
            .finish()
    }
}

impl CloudAnalyzerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            priority: DEFAULT_CLOUD_PRIORITY,
        }
    }

    /// Read `HAZARDHAWK_CLOUD_ENDPOINT` (required) and
    /// `HAZARDHAWK_CLOUD_API_KEY` / `HAZARDHAWK_CLOUD_MODEL` (optional).
    pub fn try_from_env() -> Result<Self, AnalysisError> {
        let endpoint = std::env::var("HAZARDHAWK_CLOUD_ENDPOINT").map_err(|_| {
            AnalysisError::Initialization(
                "HAZARDHAWK_CLOUD_ENDPOINT environment variable not set".to_string(),
            )
        })?;
        let mut config = Self::new(endpoint);
        if let Ok(key) = std::env::var("HAZARDHAWK_CLOUD_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("HAZARDHAWK_CLOUD_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.retry_base_delay_ms = ms;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CloudRequest<'a> {
    model: &'a str,
    image_base64: String,
    mime_type: &'static str,
    work_type: WorkType,
    confidence_threshold: f32,
    include_osha_codes: bool,
}

#[derive(Debug, Deserialize)]
struct CloudResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(flatten)]
    inference: RawInference,
}

// ============================================================================
// CloudAnalyzer
// ============================================================================

/// Remote analysis tier over `reqwest`.
///
/// The HTTP client is created once and reused, so connections are pooled
/// across requests.
pub struct CloudAnalyzer {
    client: reqwest::Client,
    config: CloudAnalyzerConfig,
    /// Active key; `Some` once configured.
    api_key: RwLock<Option<String>>,
}

impl std::fmt::Debug for CloudAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudAnalyzer")
            .field("config", &self.config)
            .finish()
    }
}

impl CloudAnalyzer {
    pub fn new(config: CloudAnalyzerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("CloudAnalyzer: custom client failed ({}), using defaults", e);
                reqwest::Client::new()
            });

        Self {
            client,
            config,
            api_key: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &CloudAnalyzerConfig {
        &self.config
    }

    async fn execute_with_retry(
        &self,
        body: &CloudRequest<'_>,
        api_key: &str,
    ) -> Result<CloudResponse, AnalysisError> {
        let mut last_error: Option<AnalysisError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_base_delay_ms, attempt);
                tracing::warn!(
                    "CloudAnalyzer: retry attempt {}/{} after {:?}",
                    attempt,
                    self.config.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(body, api_key).await {
                Ok(response) => return Ok(response),
                Err(error) if is_retryable(&error) => {
                    tracing::warn!(
                        "CloudAnalyzer: transient error on attempt {}: {}",
                        attempt + 1,
                        error
                    );
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        let attempts = self.config.max_retries + 1;
        Err(match last_error {
            Some(AnalysisError::Remote { status, message }) => AnalysisError::Remote {
                status,
                message: format!("gave up after {} attempts: {}", attempts, message),
            },
            Some(other) => other,
            None => AnalysisError::Remote {
                status: None,
                message: "all retry attempts exhausted".to_string(),
            },
        })
    }

    async fn send_once(
        &self,
        body: &CloudRequest<'_>,
        api_key: &str,
    ) -> Result<CloudResponse, AnalysisError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AnalysisError::Remote {
                status: e.status().map(|s| s.as_u16()),
                message: if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text));
        }

        response.json::<CloudResponse>().await.map_err(|e| AnalysisError::Remote {
            status: Some(status.as_u16()),
            message: format!("malformed response body: {}", e),
        })
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
fn classify_status(status: u16, body: &str) -> AnalysisError {
    let detail = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body.trim())
    };
    match status {
        401 | 403 => AnalysisError::Initialization(format!("credentials rejected ({})", detail)),
        415 => AnalysisError::UnsupportedContent(detail),
        400 | 413 | 422 => AnalysisError::InvalidInput(detail),
        _ => AnalysisError::Remote {
            status: Some(status),
            message: detail,
        },
    }
}

/// Rate limits, server errors and transport failures are worth retrying.
fn is_retryable(error: &AnalysisError) -> bool {
    match error {
        AnalysisError::Remote { status: None, .. } => true,
        AnalysisError::Remote {
            status: Some(status),
            ..
        } => *status == 429 || *status >= 500,
        _ => false,
    }
}

fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let base_delay = base_ms.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
    let jitter = rand::random::<u64>() % (base_delay / 2 + 1);
    Duration::from_millis(base_delay + jitter)
}

// ============================================================================
// SafetyAnalyzer Implementation
// ============================================================================

#[async_trait]
impl SafetyAnalyzer for CloudAnalyzer {
    fn name(&self) -> &str {
        "cloud"
    }

    fn tier(&self) -> AnalyzerTier {
        AnalyzerTier::Cloud
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn capabilities(&self) -> BTreeSet<AnalysisCapability> {
        BTreeSet::from([
            AnalysisCapability::PpeDetection,
            AnalysisCapability::HazardIdentification,
            AnalysisCapability::OshaCompliance,
            AnalysisCapability::BoundingBoxes,
        ])
    }

    async fn is_available(&self) -> bool {
        self.api_key.read().await.is_some()
    }

    async fn configure(&self, api_key: Option<&str>) -> Result<(), AnalysisError> {
        let key = api_key
            .map(str::to_string)
            .or_else(|| self.config.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnalysisError::Initialization("API key is empty".to_string()))?;

        reqwest::Url::parse(&self.config.endpoint).map_err(|e| {
            AnalysisError::Initialization(format!(
                "invalid endpoint '{}': {}",
                self.config.endpoint, e
            ))
        })?;

        *self.api_key.write().await = Some(key);
        tracing::info!(
            "CloudAnalyzer: configured with model='{}', endpoint={}",
            self.config.model,
            self.config.endpoint
        );
        Ok(())
    }

    async fn analyze_photo(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let format = request.validate()?;
        let api_key = self.api_key.read().await.clone().ok_or_else(|| {
            AnalysisError::unavailable("cloud analyzer not configured; call configure() first")
        })?;

        let started = Instant::now();
        request.report(AnalysisStage::Initializing);
        let body = CloudRequest {
            model: &self.config.model,
            image_base64: general_purpose::STANDARD.encode(&request.image),
            mime_type: format.mime_type(),
            work_type: request.work_type,
            confidence_threshold: request.confidence_threshold,
            include_osha_codes: request.include_osha_codes,
        };

        tracing::debug!(
            "CloudAnalyzer: sending {} byte {} image for {}",
            request.image.len(),
            format.mime_type(),
            request.work_type
        );
        request.report(AnalysisStage::Inference);

        let response = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => return Err(AnalysisError::Cancelled),
            response = self.execute_with_retry(&body, &api_key) => response?,
        };

        request.report(AnalysisStage::Postprocessing);
        let mut result = catalog::build_result(
            &response.inference,
            AssemblyOptions {
                work_type: request.work_type,
                confidence_threshold: request.confidence_threshold,
                include_osha_codes: request.include_osha_codes,
            },
            response.model.unwrap_or_else(|| self.config.model.clone()),
        );
        result.processing_time_ms = started.elapsed().as_millis() as u64;
        request.report(AnalysisStage::Finalizing);
        Ok(result)
    }

    async fn cleanup(&self) {
        tracing::info!("CloudAnalyzer: shutting down");
        *self.api_key.write().await = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::orchestrator::test_support::jpeg_request;

    /// Serve canned `(status, body)` responses, one per connection.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/v1/analyze", addr), hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn analyzer(endpoint: String) -> CloudAnalyzer {
        CloudAnalyzer::new(
            CloudAnalyzerConfig::new(endpoint)
                .with_api_key("test-key")
                .with_retry_base_delay_ms(1),
        )
    }

    #[test]
    fn test_config_creation() {
        let config = CloudAnalyzerConfig::new("https://vision.example.com/v1/analyze")
            .with_api_key("key-123")
            .with_model("safety-vision-large")
            .with_timeout_ms(5000)
            .with_max_retries(5)
            .with_retry_base_delay_ms(250)
            .with_priority(60);

        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.model, "safety-vision-large");
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_base_delay_ms, 250);
        assert_eq!(config.priority, 60);
    }

    #[test]
    fn test_config_defaults() {
        let config = CloudAnalyzerConfig::new("https://vision.example.com");
        assert!(config.api_key.is_none());
        assert_eq!(config.model, "safety-vision");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_base_delay_ms, 500);
        assert_eq!(config.priority, DEFAULT_CLOUD_PRIORITY);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = CloudAnalyzerConfig::new("https://x").with_api_key("secret-value");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify_status(401, ""), AnalysisError::Initialization(_)));
        assert!(matches!(classify_status(403, ""), AnalysisError::Initialization(_)));
        assert!(matches!(classify_status(400, "bad"), AnalysisError::InvalidInput(_)));
        assert!(matches!(classify_status(413, ""), AnalysisError::InvalidInput(_)));
        assert!(matches!(classify_status(422, ""), AnalysisError::InvalidInput(_)));
        assert!(matches!(
            classify_status(415, ""),
            AnalysisError::UnsupportedContent(_)
        ));

        assert!(is_retryable(&classify_status(429, "")));
        assert!(is_retryable(&classify_status(503, "")));
        assert!(!is_retryable(&classify_status(404, "")));
        assert!(!is_retryable(&classify_status(401, "")));
    }

    #[test]
    fn test_backoff_grows_with_bounded_jitter() {
        for attempt in 1..=3 {
            let base = 100 * 2_u64.pow(attempt - 1);
            let delay = backoff_delay(100, attempt).as_millis() as u64;
            assert!(delay >= base && delay <= base + base / 2, "attempt {}", attempt);
        }
    }

    #[tokio::test]
    async fn test_configure_requires_key() {
        let analyzer = CloudAnalyzer::new(CloudAnalyzerConfig::new("https://x.example.com"));
        assert!(matches!(
            analyzer.configure(None).await,
            Err(AnalysisError::Initialization(_))
        ));
        assert!(matches!(
            analyzer.configure(Some("  ")).await,
            Err(AnalysisError::Initialization(_))
        ));
        assert!(!analyzer.is_available().await);

        analyzer.configure(Some("valid")).await.unwrap();
        assert!(analyzer.is_available().await);

        analyzer.cleanup().await;
        analyzer.cleanup().await;
        assert!(!analyzer.is_available().await);
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_endpoint() {
        let analyzer = CloudAnalyzer::new(CloudAnalyzerConfig::new("not a url").with_api_key("k"));
        assert!(matches!(
            analyzer.configure(None).await,
            Err(AnalysisError::Initialization(_))
        ));
    }

    #[tokio::test]
    async fn test_analyze_before_configure() {
        let analyzer = analyzer("http://127.0.0.1:9/".to_string());
        let err = analyzer
            .analyze_photo(&jpeg_request(WorkType::Electrical))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_successful_analysis_uses_catalog() {
        let (endpoint, hits) = serve(vec![(
            200,
            r#"{"model":"safety-vision-2","overall_confidence":0.91,
                "detections":[{"label":"no_hard_hat","score":0.93},
                              {"label":"hard_hat","score":0.2}]}"#,
        )])
        .await;
        let analyzer = analyzer(endpoint);
        analyzer.configure(None).await.unwrap();

        let result = analyzer
            .analyze_photo(&jpeg_request(WorkType::GeneralConstruction))
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(result.backend_used, "safety-vision-2");
        assert_eq!(result.hazards.len(), 1);
        assert_eq!(result.hazards[0].tag, "no-hard-hat");
        assert_eq!(result.ai_confidence, 0.91);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_succeed() {
        let (endpoint, hits) = serve(vec![
            (503, "busy"),
            (429, "slow down"),
            (200, r#"{"detections":[]}"#),
        ])
        .await;
        let analyzer = analyzer(endpoint);
        analyzer.configure(None).await.unwrap();

        let result = analyzer
            .analyze_photo(&jpeg_request(WorkType::Roadwork))
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(result.backend_used, "safety-vision");
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_remote() {
        let (endpoint, hits) = serve(vec![(500, "boom"), (500, "boom"), (500, "boom")]).await;
        let analyzer = analyzer(endpoint);
        analyzer.configure(None).await.unwrap();

        let err = analyzer
            .analyze_photo(&jpeg_request(WorkType::Roadwork))
            .await
            .unwrap_err();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        match err {
            AnalysisError::Remote { status, message } => {
                assert_eq!(status, Some(500));
                assert!(message.contains("gave up after 3 attempts"));
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_cloud_falls_through_without_more_requests() {
        use crate::orchestrator::checklist::ChecklistAnalyzer;
        use crate::orchestrator::error::ErrorClass;
        use crate::orchestrator::fallback::FallbackOrchestrator;

        let (endpoint, hits) = serve(vec![(503, "busy"); 6]).await;
        let orchestrator = FallbackOrchestrator::new(vec![
            Arc::new(analyzer(endpoint)),
            Arc::new(ChecklistAnalyzer::new()),
        ]);
        orchestrator.configure_all(None).await;

        let outcome = orchestrator
            .analyze(&jpeg_request(WorkType::Roadwork))
            .await
            .unwrap();
        // One call through the cloud tier's own budget: 1 + max_retries requests.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.analyzer_name, "checklist");
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].class, ErrorClass::Resource);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let (endpoint, hits) = serve(vec![(401, "nope"), (200, r#"{"detections":[]}"#)]).await;
        let analyzer = analyzer(endpoint);
        analyzer.configure(None).await.unwrap();

        let err = analyzer
            .analyze_photo(&jpeg_request(WorkType::Roadwork))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Initialization(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_try_from_env_missing_endpoint() {
        // No other test in this crate reads this variable.
        std::env::remove_var("HAZARDHAWK_CLOUD_ENDPOINT");
        assert!(CloudAnalyzerConfig::try_from_env().is_err());
    }
}
