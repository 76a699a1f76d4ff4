// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Editing sessions.
//!
//! An [`EditSession`] owns one pose document together with its editor, renderers and apply
//! state. Input handling is synchronous. The two network calls (preview and apply) run on
//! worker threads and report back over a channel that the owner drains with
//! [`EditSession::poll`] or [`EditSession::wait`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pose_editor::{
//!     EditSession, EditorConfig, EditorEvent, FileCanvas, HttpPoseService, ServiceConfig,
//!     ViewportSize, io,
//! };
//!
//! let doc = io::load_pose("pose.json", None)?;
//! let mut session = EditSession::open(doc, &EditorConfig::default(), ViewportSize::new(800.0, 600.0)?)
//!     .with_service(Arc::new(HttpPoseService::new(ServiceConfig::from_env())));
//!
//! session.handle_event(EditorEvent::PointerDown { x: 110.0, y: 110.0 })?;
//! session.handle_event(EditorEvent::PointerMove { x: 160.0, y: 160.0 })?;
//! session.handle_event(EditorEvent::PointerUp)?;
//!
//! let mut canvas = FileCanvas::new("applied.png");
//! session.apply()?;
//! let update = session.wait(&mut canvas, Duration::from_secs(30));
//! let edited = session.close();
//! io::save_pose(&edited, "edited.json")?;
//! # Ok::<(), pose_editor::PoseError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;

use crate::api::SkeletonRenderResponse;
use crate::apply::{ApplyOutcome, ApplyPipeline, ApplyState, HostCanvas, RequestId};
use crate::client::PoseService;
use crate::config::EditorConfig;
use crate::editor::{Editor, EditorEvent, EditorOutcome, EditorState};
use crate::error::{PoseError, Result};
use crate::pose::PoseDocument;
use crate::render::{RasterImage, RemoteRenderer, RenderOutput, RenderPipeline, Renderer};
use crate::transform::{EditorViewport, ViewportSize};
use crate::verbose;
use crate::visualizer::skeleton::LocalRenderer;

/// Message from a worker thread.
enum WorkerMessage {
    Apply(RequestId, Result<SkeletonRenderResponse>),
    Preview(u64, Result<RenderOutput>),
}

/// Something a worker finished.
#[derive(Debug)]
pub enum SessionUpdate {
    /// An apply request completed.
    Apply(ApplyOutcome),
    /// A preview render completed.
    Preview(Result<RenderOutput>),
}

/// One editing session.
pub struct EditSession {
    doc: PoseDocument,
    editor: Editor,
    config: EditorConfig,
    local: LocalRenderer,
    service: Option<Arc<dyn PoseService>>,
    background: Option<Arc<DynamicImage>>,
    apply: ApplyPipeline,
    alive: Arc<AtomicBool>,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
    preview_seq: u64,
    preview_pending: Option<u64>,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("schema", &self.doc.schema().id)
            .field("editor", &self.editor)
            .field("apply", &self.apply.state())
            .field("has_service", &self.service.is_some())
            .finish_non_exhaustive()
    }
}

impl EditSession {
    /// Open a session on `doc`, shown on a canvas of `canvas` display pixels.
    ///
    /// The document takes the configured visibility threshold and the viewport is fitted to
    /// the canvas.
    #[must_use]
    pub fn open(doc: PoseDocument, config: &EditorConfig, canvas: ViewportSize) -> Self {
        let doc = doc.with_visibility_threshold(config.visibility_threshold);
        let editor = Editor::new(config, doc.image_info(), canvas);
        let (tx, rx) = mpsc::channel();
        verbose!(
            "Opened {} session: {} keypoints, {} visible",
            doc.schema().id,
            doc.len(),
            doc.count_visible()
        );
        Self {
            editor,
            local: LocalRenderer::from_config(config),
            apply: ApplyPipeline::new(config.style.to_parameters()),
            config: config.clone(),
            service: None,
            background: None,
            alive: Arc::new(AtomicBool::new(true)),
            tx,
            rx,
            preview_seq: 0,
            preview_pending: None,
            doc,
        }
    }

    /// Use `service` for previews and apply.
    #[must_use]
    pub fn with_service(mut self, service: Arc<dyn PoseService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Draw over `image` (the source image the pose was detected on).
    #[must_use]
    pub fn with_background(mut self, image: DynamicImage) -> Self {
        self.background = Some(Arc::new(image));
        self
    }

    /// The document being edited.
    #[must_use]
    pub const fn document(&self) -> &PoseDocument {
        &self.doc
    }

    /// Current viewport.
    #[must_use]
    pub const fn viewport(&self) -> EditorViewport {
        self.editor.viewport()
    }

    /// Current drag state.
    #[must_use]
    pub const fn editor_state(&self) -> EditorState {
        self.editor.state()
    }

    /// Current apply state.
    #[must_use]
    pub const fn apply_state(&self) -> ApplyState {
        self.apply.state()
    }

    /// Whether a preview request is outstanding.
    #[must_use]
    pub const fn preview_pending(&self) -> bool {
        self.preview_pending.is_some()
    }

    /// Feed one input event to the editor.
    ///
    /// # Errors
    ///
    /// See [`Editor::handle`].
    pub fn handle_event(&mut self, event: EditorEvent) -> Result<EditorOutcome> {
        self.editor.handle(&mut self.doc, event)
    }

    /// Feed events in order.
    ///
    /// # Errors
    ///
    /// See [`Editor::dispatch`].
    pub fn dispatch<I>(&mut self, events: I) -> Result<Vec<EditorOutcome>>
    where
        I: IntoIterator<Item = EditorEvent>,
    {
        self.editor.dispatch(&mut self.doc, events)
    }

    /// Move keypoint `index` to image coordinates without going through pointer events.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::IndexOutOfRange`] for an invalid index and
    /// [`PoseError::InvalidCoordinate`] for a non-finite coordinate.
    pub fn set_keypoint(&mut self, index: usize, x: f64, y: f64) -> Result<()> {
        self.doc.set_keypoint(index, x, y)
    }

    /// Render the editor view: background and skeleton through the current viewport.
    ///
    /// # Errors
    ///
    /// See [`Renderer::render`].
    pub fn render_view(&self) -> Result<RasterImage> {
        self.local
            .clone()
            .with_viewport(self.editor.viewport(), self.editor.canvas())
            .render(&self.doc, self.background.as_deref())
    }

    /// Render a preview at source image size on the current thread.
    ///
    /// Uses the remote detection renderer when remote previews are enabled and a service is
    /// configured, falling back to the local renderer.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::NoRenderer`] if no renderer produced an image.
    pub fn render_preview(&self) -> Result<RenderOutput> {
        self.preview_pipeline()
            .render(&self.doc, self.background.as_deref())
    }

    /// Render the document locally at source image size, without background.
    ///
    /// # Errors
    ///
    /// See [`Renderer::render`].
    pub fn render_local(&self) -> Result<RasterImage> {
        self.local.clone().in_image_space().render(&self.doc, None)
    }

    /// Start a preview render on a worker thread. A newer request supersedes an
    /// outstanding one, whose result is then dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::Io`] if the worker thread cannot be spawned.
    pub fn request_preview(&mut self) -> Result<()> {
        self.preview_seq += 1;
        let seq = self.preview_seq;
        let pipeline = self.preview_pipeline();
        let doc = self.doc.clone();
        let background = self.background.clone();
        let tx = self.tx.clone();
        let alive = Arc::clone(&self.alive);

        thread::Builder::new()
            .name("pose-preview".to_string())
            .spawn(move || {
                let output = pipeline.render(&doc, background.as_deref());
                if alive.load(Ordering::Acquire) {
                    let _ = tx.send(WorkerMessage::Preview(seq, output));
                }
            })?;
        self.preview_pending = Some(seq);
        Ok(())
    }

    /// Start an apply on a worker thread.
    ///
    /// Returns `Ok(false)` without doing anything while another apply is in flight.
    ///
    /// # Errors
    ///
    /// [`PoseError::NoRenderer`] if the session has no service, [`PoseError::Io`] if the
    /// worker thread cannot be spawned.
    pub fn apply(&mut self) -> Result<bool> {
        let Some(service) = self.service.as_ref().map(Arc::clone) else {
            return Err(PoseError::NoRenderer(
                "apply needs a pose service".to_string(),
            ));
        };
        let Some(pending) = self.apply.begin(&self.doc) else {
            return Ok(false);
        };
        verbose!("Applying pose as request {}", pending.id);

        let tx = self.tx.clone();
        let alive = Arc::clone(&self.alive);
        let id = pending.id;
        let spawned = thread::Builder::new()
            .name("pose-apply".to_string())
            .spawn(move || {
                let response = service.render_skeleton(&pending.request);
                if alive.load(Ordering::Acquire) {
                    let _ = tx.send(WorkerMessage::Apply(pending.id, response));
                }
            });
        if let Err(e) = spawned {
            self.apply.abandon(id);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Collect every finished worker result without blocking.
    pub fn poll(&mut self, host: &mut dyn HostCanvas) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if let Some(update) = self.process(message, host) {
                updates.push(update);
            }
        }
        updates
    }

    /// Block until one worker result arrives or `timeout` elapses.
    pub fn wait(&mut self, host: &mut dyn HostCanvas, timeout: Duration) -> Option<SessionUpdate> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(message) => {
                    if let Some(update) = self.process(message, host) {
                        return Some(update);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// End the session and return the edited document. Results of outstanding requests
    /// are discarded.
    #[must_use]
    pub fn close(self) -> PoseDocument {
        self.alive.store(false, Ordering::Release);
        verbose!("Closed {} session", self.doc.schema().id);
        self.doc.clone()
    }

    fn preview_pipeline(&self) -> RenderPipeline {
        let pipeline = RenderPipeline::new().with_local(self.local.clone().in_image_space());
        match &self.service {
            Some(service) if self.config.remote_preview => pipeline.with_remote(RemoteRenderer::detection(
                Arc::clone(service),
                self.config.model.clone(),
                self.config.detection.clone(),
            )),
            _ => pipeline,
        }
    }

    fn process(&mut self, message: WorkerMessage, host: &mut dyn HostCanvas) -> Option<SessionUpdate> {
        match message {
            WorkerMessage::Apply(id, response) => {
                Some(SessionUpdate::Apply(self.apply.complete(id, response, host)))
            }
            WorkerMessage::Preview(seq, output) if self.preview_pending == Some(seq) => {
                self.preview_pending = None;
                Some(SessionUpdate::Preview(output))
            }
            WorkerMessage::Preview(seq, _) => {
                verbose!("Dropping superseded preview {seq}");
                None
            }
        }
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        DetectionRequest, DetectionResponse, PoseExtractRequest, PoseExtractResponse,
        SkeletonRenderRequest,
    };
    use crate::io::encode_image_base64;
    use crate::pose::{ImageInfo, Keypoint};
    use crate::render::RenderSource;
    use crate::topology::DEFAULT_SCHEMA;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    struct Offline;

    impl PoseService for Offline {
        fn detect(&self, _: &DetectionRequest) -> Result<DetectionResponse> {
            Err(PoseError::DetectionServiceError("offline".to_string()))
        }

        fn render_skeleton(&self, _: &SkeletonRenderRequest) -> Result<SkeletonRenderResponse> {
            Err(PoseError::RenderServiceError("offline".to_string()))
        }

        fn extract_pose(&self, _: &PoseExtractRequest) -> Result<PoseExtractResponse> {
            Err(PoseError::DetectionServiceError("offline".to_string()))
        }
    }

    struct Echo;

    impl PoseService for Echo {
        fn detect(&self, request: &DetectionRequest) -> Result<DetectionResponse> {
            Ok(DetectionResponse {
                success: true,
                processed_image: Some(request.image.clone()),
                ..Default::default()
            })
        }

        fn render_skeleton(&self, request: &SkeletonRenderRequest) -> Result<SkeletonRenderResponse> {
            let img = RgbaImage::from_pixel(request.image_width, request.image_height, Rgba([9, 9, 9, 255]));
            Ok(SkeletonRenderResponse {
                success: true,
                skeleton_image: Some(encode_image_base64(&DynamicImage::ImageRgba8(img))?),
                ..Default::default()
            })
        }

        fn extract_pose(&self, _: &PoseExtractRequest) -> Result<PoseExtractResponse> {
            Ok(PoseExtractResponse::default())
        }
    }

    /// Renders like [`Echo`] once released, then reports that it returned.
    struct Gated {
        gate: Mutex<Receiver<()>>,
        returned: Sender<()>,
    }

    impl PoseService for Gated {
        fn detect(&self, request: &DetectionRequest) -> Result<DetectionResponse> {
            Echo.detect(request)
        }

        fn render_skeleton(&self, request: &SkeletonRenderRequest) -> Result<SkeletonRenderResponse> {
            let _ = self.gate.lock().unwrap().recv();
            let response = Echo.render_skeleton(request);
            let _ = self.returned.send(());
            response
        }

        fn extract_pose(&self, request: &PoseExtractRequest) -> Result<PoseExtractResponse> {
            Echo.extract_pose(request)
        }
    }

    fn gated() -> (Arc<Gated>, Sender<()>, Receiver<()>) {
        let (release, gate) = mpsc::channel();
        let (returned, finished) = mpsc::channel();
        let service = Gated {
            gate: Mutex::new(gate),
            returned,
        };
        (Arc::new(service), release, finished)
    }

    #[derive(Default)]
    struct Recorder(Vec<ImageInfo>);

    impl HostCanvas for Recorder {
        fn place(&mut self, _image: RasterImage, info: ImageInfo) -> Result<()> {
            self.0.push(info);
            Ok(())
        }
    }

    fn session() -> EditSession {
        let points = (0..18u32).map(|i| Keypoint::new(10.0 * f64::from(i), 20.0, 0.9)).collect();
        let doc = PoseDocument::create(DEFAULT_SCHEMA, points, ImageInfo::new(200, 100).unwrap()).unwrap();
        EditSession::open(doc, &EditorConfig::default(), ViewportSize::new(400.0, 400.0).unwrap())
    }

    #[test]
    fn test_open_fits_viewport() {
        let s = session();
        assert!((s.viewport().scale() - 2.0).abs() < 1e-12);
        assert_eq!(s.viewport().offset(), (0.0, 100.0));
        assert_eq!(s.render_view().unwrap().dimensions(), (400, 400));
        assert_eq!(s.render_local().unwrap().dimensions(), (200, 100));
    }

    #[test]
    fn test_apply_without_service() {
        let mut s = session();
        assert!(matches!(s.apply(), Err(PoseError::NoRenderer(_))));
        assert_eq!(s.apply_state(), ApplyState::Idle);
    }

    #[test]
    fn test_apply_round_trip() {
        let mut s = session().with_service(Arc::new(Echo));
        let mut host = Recorder::default();
        assert!(s.apply().unwrap());
        let update = s.wait(&mut host, Duration::from_secs(10)).unwrap();
        assert!(matches!(update, SessionUpdate::Apply(ref o) if o.is_applied()));
        assert!(matches!(s.apply_state(), ApplyState::Applied(_)));
        assert_eq!(host.0, vec![ImageInfo::new(200, 100).unwrap()]);
    }

    #[test]
    fn test_offline_apply_fails_back_to_idle() {
        let mut s = session().with_service(Arc::new(Offline));
        let mut host = Recorder::default();
        assert!(s.apply().unwrap());
        let update = s.wait(&mut host, Duration::from_secs(10)).unwrap();
        assert!(matches!(
            update,
            SessionUpdate::Apply(ApplyOutcome::Failed { error: PoseError::RenderServiceError(_), .. })
        ));
        assert_eq!(s.apply_state(), ApplyState::Idle);
        assert!(host.0.is_empty());
    }

    #[test]
    fn test_preview_falls_back_when_offline() {
        let config = EditorConfig::default().with_remote_preview(true);
        let points = (0..18).map(|_| Keypoint::new(5.0, 5.0, 0.9)).collect();
        let doc = PoseDocument::create(DEFAULT_SCHEMA, points, ImageInfo::new(20, 10).unwrap()).unwrap();
        let s = EditSession::open(doc, &config, ViewportSize::new(40.0, 40.0).unwrap())
            .with_service(Arc::new(Offline))
            .with_background(DynamicImage::new_rgba8(20, 10));
        let out = s.render_preview().unwrap();
        assert_eq!(out.source, RenderSource::LocalFallback);
        assert_eq!(out.image.dimensions(), (20, 10));
    }

    #[test]
    fn test_superseded_preview_dropped() {
        let mut s = session();
        let mut host = Recorder::default();
        s.request_preview().unwrap();
        s.request_preview().unwrap();
        let update = s.wait(&mut host, Duration::from_secs(10)).unwrap();
        assert!(matches!(update, SessionUpdate::Preview(Ok(ref o)) if o.source == RenderSource::Local));
        assert!(!s.preview_pending());
        // the other result, if it arrives, is dropped
        assert!(s.wait(&mut host, Duration::from_millis(200)).is_none());
    }

    #[test]
    fn test_close_returns_document() {
        let mut s = session();
        s.handle_event(EditorEvent::PointerDown { x: 0.0, y: 140.0 }).unwrap();
        s.handle_event(EditorEvent::PointerMove { x: 10.0, y: 150.0 }).unwrap();
        let doc = s.close();
        let kp = doc.keypoint(0).unwrap();
        assert_eq!((kp.x, kp.y), (5.0, 25.0));
    }

    #[test]
    fn test_open_session_receives_apply_result() {
        let (service, release, finished) = gated();
        let mut s = session().with_service(service);
        let (tx, rx) = mpsc::channel();
        s.tx = tx;

        assert!(s.apply().unwrap());
        release.send(()).unwrap();
        finished.recv_timeout(Duration::from_secs(10)).unwrap();
        let message = rx.recv_timeout(Duration::from_secs(10));
        assert!(matches!(message, Ok(WorkerMessage::Apply(_, Ok(_)))));
    }

    #[test]
    fn test_apply_result_after_close_is_not_sent() {
        let (service, release, finished) = gated();
        let mut s = session().with_service(service);
        let (tx, rx) = mpsc::channel();
        s.tx = tx;

        assert!(s.apply().unwrap());
        let doc = s.close();
        release.send(()).unwrap();
        finished.recv_timeout(Duration::from_secs(10)).unwrap();
        // the worker still holds a live sender; it must not use it
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
        assert!(!doc.is_modified());
    }
}
