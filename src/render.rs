// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Render pipeline: remote rendering with a local vector fallback.
//!
//! A [`RenderPipeline`] tries its remote renderer first. Any remote failure (transport,
//! HTTP status, `success: false`, malformed body or undecodable image) is logged with
//! [`warn!`](crate::warn) and the local renderer is used instead; the failure is kept on the
//! returned [`RenderOutput`]. Only when no renderer produces an image does the pipeline
//! fail, with [`PoseError::NoRenderer`].

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, RgbaImage};

use crate::api::{DetectionParams, DetectionRequest, RenderParameters, SkeletonRenderRequest};
use crate::client::PoseService;
use crate::error::{PoseError, Result};
use crate::io::encode_image_base64;
use crate::pose::PoseDocument;
use crate::warn;

/// Raster produced by every renderer.
pub type RasterImage = RgbaImage;

/// Something that turns a pose document into a raster.
pub trait Renderer: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Render `doc`, optionally over `background`.
    ///
    /// # Errors
    ///
    /// Renderer specific; remote renderers return remote errors (see
    /// [`PoseError::is_remote`]).
    fn render(&self, doc: &PoseDocument, background: Option<&DynamicImage>) -> Result<RasterImage>;
}

/// What the remote renderer asks the service for.
#[derive(Debug, Clone)]
pub enum RemoteMode {
    /// Run detection on the background image and return the processed image.
    Detection {
        /// Model id.
        model: String,
        /// Detection parameters.
        params: DetectionParams,
    },
    /// Render the document's skeleton.
    Skeleton {
        /// Drawing parameters.
        parameters: RenderParameters,
    },
}

/// Renderer backed by the pose service.
#[derive(Clone)]
pub struct RemoteRenderer {
    service: Arc<dyn PoseService>,
    mode: RemoteMode,
}

impl fmt::Debug for RemoteRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRenderer")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl RemoteRenderer {
    /// Create a remote renderer.
    #[must_use]
    pub fn new(service: Arc<dyn PoseService>, mode: RemoteMode) -> Self {
        Self { service, mode }
    }

    /// Detection mode.
    #[must_use]
    pub fn detection(service: Arc<dyn PoseService>, model: impl Into<String>, params: DetectionParams) -> Self {
        Self::new(
            service,
            RemoteMode::Detection {
                model: model.into(),
                params,
            },
        )
    }

    /// Skeleton mode.
    #[must_use]
    pub fn skeleton(service: Arc<dyn PoseService>, parameters: RenderParameters) -> Self {
        Self::new(service, RemoteMode::Skeleton { parameters })
    }

    /// Active mode.
    #[must_use]
    pub const fn mode(&self) -> &RemoteMode {
        &self.mode
    }
}

impl Renderer for RemoteRenderer {
    fn name(&self) -> &'static str {
        match self.mode {
            RemoteMode::Detection { .. } => "remote detection",
            RemoteMode::Skeleton { .. } => "remote skeleton",
        }
    }

    fn render(&self, doc: &PoseDocument, background: Option<&DynamicImage>) -> Result<RasterImage> {
        let image = match &self.mode {
            RemoteMode::Detection { model, params } => {
                let source = background.ok_or_else(|| {
                    PoseError::DetectionServiceError("detection needs a source image".to_string())
                })?;
                let request = DetectionRequest {
                    image: encode_image_base64(source)?,
                    model: model.clone(),
                    params: params.clone(),
                };
                self.service.detect(&request)?.into_image()?
            }
            RemoteMode::Skeleton { parameters } => {
                let request = SkeletonRenderRequest::for_document(doc, parameters.clone());
                self.service.render_skeleton(&request)?.into_image()?
            }
        };
        Ok(image.to_rgba8())
    }
}

/// Which renderer produced a [`RenderOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSource {
    /// The remote renderer.
    Remote,
    /// The local renderer; no remote renderer was configured.
    Local,
    /// The local renderer, after the remote renderer failed.
    LocalFallback,
}

/// Result of a pipeline render.
#[derive(Debug)]
pub struct RenderOutput {
    /// Rendered raster.
    pub image: RasterImage,
    /// Renderer that produced it.
    pub source: RenderSource,
    /// Remote failure that caused a fallback.
    pub warning: Option<PoseError>,
}

/// Remote-first render pipeline with local fallback.
#[derive(Clone, Default)]
pub struct RenderPipeline {
    remote: Option<Arc<dyn Renderer>>,
    local: Option<Arc<dyn Renderer>>,
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("local", &self.local.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl RenderPipeline {
    /// Pipeline with no renderers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote renderer.
    #[must_use]
    pub fn with_remote(mut self, renderer: impl Renderer + 'static) -> Self {
        self.remote = Some(Arc::new(renderer));
        self
    }

    /// Set the local renderer.
    #[must_use]
    pub fn with_local(mut self, renderer: impl Renderer + 'static) -> Self {
        self.local = Some(Arc::new(renderer));
        self
    }

    /// Whether a remote renderer is configured.
    #[must_use]
    pub const fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Render `doc`, remote first.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::NoRenderer`] if neither renderer produced an image.
    pub fn render(&self, doc: &PoseDocument, background: Option<&DynamicImage>) -> Result<RenderOutput> {
        let mut warning = None;
        if let Some(remote) = &self.remote {
            match remote.render(doc, background) {
                Ok(image) => {
                    return Ok(RenderOutput {
                        image,
                        source: RenderSource::Remote,
                        warning: None,
                    });
                }
                Err(e) => {
                    warn!("{} renderer failed, using local skeleton: {e}", remote.name());
                    warning = Some(e);
                }
            }
        }

        let Some(local) = &self.local else {
            return Err(PoseError::NoRenderer(match warning {
                Some(e) => format!("remote renderer failed ({e}) and no local renderer is configured"),
                None => "no renderer configured".to_string(),
            }));
        };

        match local.render(doc, background) {
            Ok(image) => Ok(RenderOutput {
                image,
                source: if warning.is_some() {
                    RenderSource::LocalFallback
                } else {
                    RenderSource::Local
                },
                warning,
            }),
            Err(e) => Err(PoseError::NoRenderer(format!("{} renderer failed: {e}", local.name()))),
        }
    }
}
