//! Detection service client
//!
//! The inference backend is an external collaborator: it takes a frame
//! plus a target label and threshold, and answers whether the target
//! was found. The wire format is fixed by the service; this module maps
//! it onto crate types and hides the transport behind a trait so the
//! scan loop can be driven by fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One request to the detection service
#[derive(Debug, Clone)]
pub struct DetectRequest {
    /// Losslessly encoded frame (PNG), already scaled to the capture canvas
    pub image_png: Vec<u8>,
    /// Normalized target label
    pub target: String,
    /// Minimum confidence for a detection to count
    pub threshold: f32,
}

/// A single detection above the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(rename = "conf")]
    pub confidence: f32,
    /// Bounding box as `[x1, y1, x2, y2]` in capture-canvas pixels
    #[serde(rename = "box", default)]
    pub bbox: [f32; 4],
}

/// Outcome of one detection cycle
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    /// Whether the target label was found at or above the threshold
    pub found: bool,
    /// All detections above the threshold, in service order
    pub detections: Vec<Detection>,
    /// Optional annotated preview frame (PNG)
    pub preview_png: Option<Vec<u8>>,
}

/// Detection collaborator interface
#[async_trait]
pub trait Detector: Send + Sync {
    /// Submit one frame for detection
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a malformed response. Such
    /// errors are transient from the scan loop's point of view: the
    /// next cycle still fires.
    async fn detect(&self, request: &DetectRequest) -> Result<DetectionResult>;

    /// Liveness probe
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable.
    async fn health(&self) -> Result<bool>;
}

/// Request body for the detection endpoint
#[derive(Serialize)]
struct DetectBody<'a> {
    image_b64: String,
    target: &'a str,
    threshold: f32,
}

/// Response body from the detection endpoint
#[derive(Deserialize)]
struct DetectResponse {
    found: bool,
    #[serde(default)]
    detections: Vec<Detection>,
    #[serde(default)]
    preview_b64: Option<String>,
}

/// Response body from the liveness probe
#[derive(Deserialize)]
struct HealthResponse {
    ok: bool,
}

/// HTTP client for the detection service
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetector {
    /// Create a client for the given service base URL
    ///
    /// The request timeout bounds every call; a slow detection response
    /// must never hold up the capture schedule indefinitely.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Detector(format!("client init failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// The configured service base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, request: &DetectRequest) -> Result<DetectionResult> {
        let body = DetectBody {
            image_b64: BASE64.encode(&request.image_png),
            target: &request.target,
            threshold: request.threshold,
        };

        tracing::debug!(
            target = %request.target,
            threshold = request.threshold,
            image_bytes = request.image_png.len(),
            "submitting frame"
        );

        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Detector(format!("detect failed {status}: {text}")));
        }

        let parsed: DetectResponse = response.json().await?;

        let preview_png = match parsed.preview_b64 {
            Some(b64) => Some(
                BASE64
                    .decode(b64)
                    .map_err(|e| Error::Detector(format!("invalid preview: {e}")))?,
            ),
            None => None,
        };

        tracing::debug!(
            found = parsed.found,
            detections = parsed.detections.len(),
            "detection response"
        );

        Ok(DetectionResult {
            found: parsed.found,
            detections: parsed.detections,
            preview_png,
        })
    }

    async fn health(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        let parsed: HealthResponse = response.json().await?;
        Ok(parsed.ok)
    }
}
