// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Apply pipeline: render the edited pose remotely and hand the result to the host canvas.
//!
//! ```text
//! Idle ──begin──▶ Requesting(id) ──complete(id, Ok)──▶ Applied(id)
//!                      │
//!                      └──complete(id, Err)──▶ Idle
//! ```
//!
//! Only one request is in flight at a time: [`ApplyPipeline::begin`] while requesting is
//! rejected, not queued. Completions for any other id are stale and ignored.

use std::fmt;
use std::path::PathBuf;

use image::DynamicImage;

use crate::api::{RenderParameters, SkeletonRenderRequest, SkeletonRenderResponse};
use crate::client::PoseService;
use crate::error::{PoseError, Result};
use crate::io::save_image;
use crate::pose::{ImageInfo, PoseDocument};
use crate::render::RasterImage;
use crate::{verbose, warn};

/// Receives applied skeleton images.
pub trait HostCanvas {
    /// Place `image`, rendered for a source image of `info` dimensions. Placement and
    /// scaling are up to the host.
    ///
    /// # Errors
    ///
    /// Any error refuses the image and fails the apply.
    fn place(&mut self, image: RasterImage, info: ImageInfo) -> Result<()>;
}

/// Host canvas that writes each placed image to a file.
#[derive(Debug, Clone)]
pub struct FileCanvas {
    path: PathBuf,
}

impl FileCanvas {
    /// Write placed images to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl HostCanvas for FileCanvas {
    fn place(&mut self, image: RasterImage, _info: ImageInfo) -> Result<()> {
        save_image(&DynamicImage::ImageRgba8(image), &self.path)
    }
}

/// Identifier of one apply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Apply state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyState {
    /// Ready to apply.
    #[default]
    Idle,
    /// A render request is in flight.
    Requesting(RequestId),
    /// The last request was placed on the host canvas.
    Applied(RequestId),
}

/// A request issued by [`ApplyPipeline::begin`], to be sent to the render service.
#[derive(Debug, Clone)]
pub struct PendingApply {
    /// Request id to pass back to [`ApplyPipeline::complete`].
    pub id: RequestId,
    /// Render request body.
    pub request: SkeletonRenderRequest,
}

/// Result of completing a request.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The image was placed on the host canvas.
    Applied {
        /// Request id.
        id: RequestId,
        /// Source image dimensions passed to the host.
        info: ImageInfo,
    },
    /// Rendering, decoding or placement failed; the pipeline is idle again.
    Failed {
        /// Request id.
        id: RequestId,
        /// Cause.
        error: PoseError,
    },
    /// The response did not belong to the request in flight and was dropped.
    Stale(RequestId),
}

impl ApplyOutcome {
    /// Whether the image reached the host canvas.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Single-flight apply state machine.
#[derive(Debug, Clone)]
pub struct ApplyPipeline {
    state: ApplyState,
    next_id: u64,
    in_flight: Option<(RequestId, ImageInfo)>,
    parameters: RenderParameters,
}

impl ApplyPipeline {
    /// Create an idle pipeline rendering with `parameters`.
    #[must_use]
    pub const fn new(parameters: RenderParameters) -> Self {
        Self {
            state: ApplyState::Idle,
            next_id: 1,
            in_flight: None,
            parameters,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ApplyState {
        self.state
    }

    /// Whether a request is in flight.
    #[must_use]
    pub const fn is_requesting(&self) -> bool {
        matches!(self.state, ApplyState::Requesting(_))
    }

    /// Start an apply for `doc`. Returns `None` while another request is in flight.
    pub fn begin(&mut self, doc: &PoseDocument) -> Option<PendingApply> {
        if let ApplyState::Requesting(current) = self.state {
            verbose!("Apply {current} still in flight, ignoring apply");
            return None;
        }
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.state = ApplyState::Requesting(id);
        self.in_flight = Some((id, doc.image_info()));
        Some(PendingApply {
            id,
            request: SkeletonRenderRequest::for_document(doc, self.parameters.clone()),
        })
    }

    /// Drop the in-flight request without a response, returning to `Idle`.
    pub fn abandon(&mut self, id: RequestId) {
        if matches!(self.in_flight, Some((current, _)) if current == id) {
            self.in_flight = None;
            self.state = ApplyState::Idle;
        }
    }

    /// Finish request `id` with the service response.
    pub fn complete(
        &mut self,
        id: RequestId,
        response: Result<SkeletonRenderResponse>,
        host: &mut dyn HostCanvas,
    ) -> ApplyOutcome {
        let info = match self.in_flight {
            Some((current, info)) if current == id => info,
            _ => {
                verbose!("Dropping stale apply response {id}");
                return ApplyOutcome::Stale(id);
            }
        };
        self.in_flight = None;

        let placed = response
            .and_then(SkeletonRenderResponse::into_image)
            .and_then(|image| host.place(image.to_rgba8(), info));

        match placed {
            Ok(()) => {
                self.state = ApplyState::Applied(id);
                ApplyOutcome::Applied { id, info }
            }
            Err(error) => {
                warn!("Apply {id} failed: {error}");
                self.state = ApplyState::Idle;
                ApplyOutcome::Failed { id, error }
            }
        }
    }

    /// Begin, call `service` on the current thread and complete.
    /// Returns `None` if a request is already in flight.
    pub fn run(
        &mut self,
        doc: &PoseDocument,
        service: &dyn PoseService,
        host: &mut dyn HostCanvas,
    ) -> Option<ApplyOutcome> {
        let pending = self.begin(doc)?;
        let response = service.render_skeleton(&pending.request);
        Some(self.complete(pending.id, response, host))
    }
}
