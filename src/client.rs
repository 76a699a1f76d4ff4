// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Client for the pose detection and skeleton rendering service.
//!
//! [`PoseService`] is the seam used by renderers and sessions; [`HttpPoseService`] is the
//! blocking HTTP implementation. Tests substitute their own implementations.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::{
    DetectionRequest, DetectionResponse, PoseExtractRequest, PoseExtractResponse,
    SkeletonRenderRequest, SkeletonRenderResponse,
};
use crate::config::ServiceConfig;
use crate::error::{PoseError, Result};
use crate::verbose;

/// Remote pose service.
///
/// Implementations return the decoded response body as is; `success: false` is not an
/// error at this level. Transport failures, non-success HTTP status and malformed bodies
/// are errors.
pub trait PoseService: Send + Sync {
    /// Run detection on an image.
    ///
    /// # Errors
    ///
    /// [`PoseError::DetectionServiceError`] on transport or protocol failure.
    fn detect(&self, request: &DetectionRequest) -> Result<DetectionResponse>;

    /// Render a skeleton from pose data.
    ///
    /// # Errors
    ///
    /// [`PoseError::RenderServiceError`] on transport or protocol failure.
    fn render_skeleton(&self, request: &SkeletonRenderRequest) -> Result<SkeletonRenderResponse>;

    /// Extract poses from an image.
    ///
    /// # Errors
    ///
    /// [`PoseError::DetectionServiceError`] on transport or protocol failure.
    fn extract_pose(&self, request: &PoseExtractRequest) -> Result<PoseExtractResponse>;
}

/// Blocking HTTP implementation of [`PoseService`].
#[derive(Debug)]
pub struct HttpPoseService {
    agent: ureq::Agent,
    config: ServiceConfig,
}

impl HttpPoseService {
    /// Create a client for `config`.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_connect(Some(config.connect_timeout))
            .timeout_recv_body(Some(config.read_timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            config,
        }
    }

    /// Service configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn post_json<Req, Resp>(&self, path: &str, body: &Req, fail: fn(String) -> PoseError) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = self.config.url(path);
        verbose!("POST {url}");

        let mut response = self.agent.post(&url).send_json(body).map_err(|e| {
            fail(match &e {
                ureq::Error::StatusCode(code) => format!("{url} returned HTTP {code}"),
                ureq::Error::Timeout(_) => format!("request to {url} timed out"),
                ureq::Error::Io(io_err) => format!("network error calling {url}: {io_err}"),
                _ => format!("request to {url} failed: {e}"),
            })
        })?;

        response
            .body_mut()
            .read_json::<Resp>()
            .map_err(|e| fail(format!("malformed response from {url}: {e}")))
    }
}

impl PoseService for HttpPoseService {
    fn detect(&self, request: &DetectionRequest) -> Result<DetectionResponse> {
        self.post_json(
            &self.config.detect_path,
            request,
            PoseError::DetectionServiceError,
        )
    }

    fn render_skeleton(&self, request: &SkeletonRenderRequest) -> Result<SkeletonRenderResponse> {
        self.post_json(
            &self.config.render_path,
            request,
            PoseError::RenderServiceError,
        )
    }

    fn extract_pose(&self, request: &PoseExtractRequest) -> Result<PoseExtractResponse> {
        self.post_json(
            &self.config.extract_path,
            request,
            PoseError::DetectionServiceError,
        )
    }
}
