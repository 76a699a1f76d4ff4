// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Subcommand implementations.
//!
//! Outputs default to numbered run directories under `runs/pose` (`render`, `render2`, ...).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;

use crate::api::{DetectionParams, PoseExtractRequest};
use crate::apply::{ApplyOutcome, FileCanvas};
use crate::cli::args::{
    ApplyArgs, EditArgs, EditOp, ExtractArgs, PoseArgs, PreviewArgs, PreviewMode, RenderArgs,
    ServiceArgs,
};
use crate::client::{HttpPoseService, PoseService};
use crate::config::{EditorConfig, ServiceConfig};
use crate::editor::{EditorEvent, EditorOutcome};
use crate::error::{PoseError, Result};
use crate::io;
use crate::pose::PoseDocument;
use crate::render::{RemoteRenderer, RenderPipeline, RenderSource, Renderer};
use crate::session::{EditSession, SessionUpdate};
use crate::transform::ViewportSize;
use crate::visualizer::LocalRenderer;
use crate::{info, section, success, verbose, warn};

/// Root of the default output directories.
const RUNS_DIR: &str = "runs/pose";

/// Grace period on top of the service read timeout when waiting for an apply.
const APPLY_GRACE: Duration = Duration::from_secs(5);

fn output_path(explicit: Option<&Path>, prefix: &str, file: &str) -> PathBuf {
    explicit.map_or_else(
        || io::find_next_run_dir(RUNS_DIR, prefix).join(file),
        Path::to_path_buf,
    )
}

fn load_document(args: &PoseArgs) -> Result<PoseDocument> {
    let doc = io::load_pose(&args.pose, args.schema.as_deref())?
        .with_visibility_threshold(args.threshold);
    let info = doc.image_info();
    info!(
        "{}: {} {} keypoints, {} visible, {}x{}",
        args.pose.display(),
        doc.len(),
        doc.schema().id,
        doc.count_visible(),
        info.width,
        info.height
    );
    Ok(doc)
}

fn load_background(path: Option<&Path>) -> Result<Option<DynamicImage>> {
    path.map(io::load_image).transpose()
}

fn connect(args: &ServiceArgs) -> HttpPoseService {
    let config = args
        .service
        .as_deref()
        .map_or_else(ServiceConfig::from_env, |url| {
            ServiceConfig::new().with_base_url(url)
        });
    let connect_timeout = config.connect_timeout;
    let config = config.with_timeouts(connect_timeout, Duration::from_secs(args.timeout));
    verbose!("Pose service: {}", config.base_url);
    HttpPoseService::new(config)
}

fn save_raster(image: crate::render::RasterImage, path: &Path) -> Result<()> {
    io::save_image(&DynamicImage::ImageRgba8(image), path)
}

/// Draw a pose locally.
///
/// # Errors
///
/// Returns an error if the pose or image cannot be loaded, the canvas is invalid or the
/// output cannot be written.
pub fn run_render(args: &RenderArgs) -> Result<()> {
    section!("Render");
    let doc = load_document(&args.pose)?;
    let config = args.style.editor_config(args.pose.threshold);
    let background = load_background(args.image.as_deref())?;

    let start = Instant::now();
    let image = match args.canvas {
        Some((width, height)) => {
            let mut session = EditSession::open(doc, &config, ViewportSize::new(width, height)?);
            if let Some(background) = background {
                session = session.with_background(background);
            }
            let viewport = session.viewport();
            verbose!(
                "Viewport scale {:.4}, offset ({:.1}, {:.1})",
                viewport.scale(),
                viewport.offset().0,
                viewport.offset().1
            );
            session.render_view()?
        }
        None => LocalRenderer::from_config(&config)
            .in_image_space()
            .render(&doc, background.as_ref())?,
    };
    verbose!(
        "Rendered {}x{} in {:.1}ms",
        image.width(),
        image.height(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let output = output_path(args.output.as_deref(), "render", "skeleton.png");
    save_raster(image, &output)?;
    success!("Saved skeleton to {}", output.display());
    Ok(())
}

/// Render a pose through the service, falling back to the local renderer.
///
/// # Errors
///
/// Returns an error if inputs cannot be loaded, no renderer produced an image or the output
/// cannot be written.
pub fn run_preview(args: &PreviewArgs) -> Result<()> {
    section!("Preview");
    let doc = load_document(&args.pose)?;
    let config = args.style.editor_config(args.pose.threshold);
    let background = load_background(args.image.as_deref())?;
    let service: Arc<dyn PoseService> = Arc::new(connect(&args.service));

    let remote = match args.mode {
        PreviewMode::Detection => RemoteRenderer::detection(
            service,
            args.model.as_str(),
            DetectionParams {
                confidence_threshold: args.pose.threshold,
                keypoint_thickness: config.style.point_radius,
                skeleton_thickness: config.style.line_width,
                detect_face: config.show_face,
                detect_hand: config.show_hands,
            },
        ),
        PreviewMode::Skeleton => RemoteRenderer::skeleton(service, config.style.to_parameters()),
    };
    let pipeline = RenderPipeline::new()
        .with_remote(remote)
        .with_local(LocalRenderer::from_config(&config).in_image_space());

    let start = Instant::now();
    let output = pipeline.render(&doc, background.as_ref())?;
    let ms = start.elapsed().as_secs_f64() * 1000.0;
    match output.source {
        RenderSource::Remote => info!("Rendered remotely in {ms:.1}ms"),
        RenderSource::Local | RenderSource::LocalFallback => {
            info!("Rendered locally in {ms:.1}ms");
        }
    }

    let path = output_path(args.output.as_deref(), "preview", "preview.png");
    save_raster(output.image, &path)?;
    success!("Saved preview to {}", path.display());
    Ok(())
}

/// Render a pose remotely and place it on a canvas file.
///
/// # Errors
///
/// Returns the apply failure, or a render service error if no response arrives in time.
pub fn run_apply(args: &ApplyArgs) -> Result<()> {
    section!("Apply");
    let doc = load_document(&args.pose)?;
    let config = args.style.editor_config(args.pose.threshold);
    let info = doc.image_info();
    let canvas = ViewportSize::new(f64::from(info.width), f64::from(info.height))?;
    let mut session =
        EditSession::open(doc, &config, canvas).with_service(Arc::new(connect(&args.service)));

    let output = output_path(args.output.as_deref(), "apply", "applied.png");
    let mut host = FileCanvas::new(&output);
    let timeout = Duration::from_secs(args.service.timeout).saturating_add(APPLY_GRACE);

    let start = Instant::now();
    session.apply()?;
    let update = session.wait(&mut host, timeout);
    drop(session);

    match update {
        Some(SessionUpdate::Apply(ApplyOutcome::Applied { id, info })) => {
            verbose!(
                "Apply {id} took {:.1}ms",
                start.elapsed().as_secs_f64() * 1000.0
            );
            success!(
                "Applied {}x{} skeleton to {}",
                info.width,
                info.height,
                host.path().display()
            );
            Ok(())
        }
        Some(SessionUpdate::Apply(ApplyOutcome::Failed { error, .. })) => Err(error),
        Some(other) => Err(PoseError::RenderServiceError(format!(
            "unexpected apply update: {other:?}"
        ))),
        None => Err(PoseError::RenderServiceError(format!(
            "no response from the render service within {}s",
            timeout.as_secs()
        ))),
    }
}

/// Extract a pose from an image with the service.
///
/// # Errors
///
/// Returns an error if the image cannot be loaded, extraction fails, the requested person
/// does not exist or the output cannot be written.
pub fn run_extract(args: &ExtractArgs) -> Result<()> {
    section!("Extract");
    let image = io::load_image(&args.image)?;
    let request = PoseExtractRequest {
        image: io::encode_image_base64(&image)?,
        processor: args.processor.clone(),
        parameters: serde_json::Map::new(),
    };

    let start = Instant::now();
    let frame = connect(&args.service).extract_pose(&request)?.into_frame()?;
    info!(
        "{}: {} people, {}x{}, {:.1}ms",
        args.image.display(),
        frame.people.len(),
        frame.canvas_width,
        frame.canvas_height,
        start.elapsed().as_secs_f64() * 1000.0
    );
    if frame.people.len() > 1 {
        warn!(
            "{} people detected, keeping person {}",
            frame.people.len(),
            args.person
        );
    }

    let doc = PoseDocument::from_openpose(args.schema.as_deref(), &frame, args.person)?;
    let output = output_path(args.output.as_deref(), "extract", "pose.json");
    io::save_pose(&doc, &output)?;
    success!(
        "Saved {} pose ({} visible keypoints) to {}",
        doc.schema().id,
        doc.count_visible(),
        output.display()
    );
    Ok(())
}

/// Apply scripted edits to a pose and write the result.
///
/// # Errors
///
/// Returns an error if the pose cannot be loaded, an edit names an invalid keypoint or the
/// output cannot be written.
pub fn run_edit(args: &EditArgs) -> Result<()> {
    section!("Edit");
    let doc = load_document(&args.pose)?;
    let config = EditorConfig::new().with_visibility_threshold(args.pose.threshold);
    let (width, height) = args.canvas;
    let mut session = EditSession::open(doc, &config, ViewportSize::new(width, height)?);

    for op in &args.ops {
        match *op {
            EditOp::Set { index, x, y } => {
                session.set_keypoint(index, x, y)?;
                verbose!("Moved keypoint {index} to ({x:.1}, {y:.1})");
            }
            EditOp::Drag { from, to } => {
                let outcomes = session.dispatch([
                    EditorEvent::PointerDown { x: from.0, y: from.1 },
                    EditorEvent::PointerMove { x: to.0, y: to.1 },
                    EditorEvent::PointerUp,
                ])?;
                if let [_, EditorOutcome::KeypointMoved { index, x, y }, _] = outcomes.as_slice() {
                    verbose!("Dragged keypoint {index} to ({x:.1}, {y:.1})");
                } else {
                    warn!(
                        "No visible keypoint at ({:.1}, {:.1}), drag ignored",
                        from.0,
                        from.1
                    );
                }
            }
            EditOp::Reset => {
                session.handle_event(EditorEvent::Reset)?;
                verbose!("Restored loaded keypoints");
            }
        }
    }

    let doc = session.close();
    let moved = doc
        .keypoints()
        .iter()
        .zip(doc.original_keypoints())
        .filter(|(now, before)| now != before)
        .count();
    let output = output_path(args.output.as_deref(), "edit", "pose.json");
    io::save_pose(&doc, &output)?;
    success!("Saved pose with {moved} moved keypoints to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use crate::pose::{ImageInfo, Keypoint};
    use crate::topology::DEFAULT_SCHEMA;
    use clap::Parser;

    fn write_pose(dir: &Path) -> PathBuf {
        let points = (0..18u32)
            .map(|i| Keypoint::new(100.0 + f64::from(i) * 10.0, 200.0, 0.9))
            .collect();
        let doc =
            PoseDocument::create(DEFAULT_SCHEMA, points, ImageInfo::new(400, 300).unwrap()).unwrap();
        let path = dir.join("pose.json");
        io::save_pose(&doc, &path).unwrap();
        path
    }

    fn parse(argv: &[&str]) -> Commands {
        Cli::parse_from(argv.iter().copied()).command
    }

    #[test]
    fn test_render_writes_png() {
        let tmp = tempfile::tempdir().unwrap();
        let pose = write_pose(tmp.path());
        let out = tmp.path().join("out/skeleton.png");
        let Commands::Render(args) = parse(&[
            "app",
            "render",
            "--pose",
            pose.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ]) else {
            panic!("expected render");
        };
        run_render(&args).unwrap();
        assert_eq!(image::open(&out).unwrap().width(), 400);
    }

    #[test]
    fn test_render_canvas_size() {
        let tmp = tempfile::tempdir().unwrap();
        let pose = write_pose(tmp.path());
        let out = tmp.path().join("view.png");
        let Commands::Render(args) = parse(&[
            "app",
            "render",
            "--pose",
            pose.to_str().unwrap(),
            "--canvas",
            "200x100",
            "--output",
            out.to_str().unwrap(),
        ]) else {
            panic!("expected render");
        };
        run_render(&args).unwrap();
        let img = image::open(&out).unwrap();
        assert_eq!((img.width(), img.height()), (200, 100));
    }

    #[test]
    fn test_edit_ops_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let pose = write_pose(tmp.path());
        let out = tmp.path().join("edited.json");
        let Commands::Edit(args) = parse(&[
            "app",
            "edit",
            "--pose",
            pose.to_str().unwrap(),
            "--op",
            "0=5,5",
            "--op",
            "reset",
            "--op",
            "3=300,250",
            "--output",
            out.to_str().unwrap(),
        ]) else {
            panic!("expected edit");
        };
        run_edit(&args).unwrap();

        let edited = io::load_pose(&out, None).unwrap();
        assert_eq!(edited.keypoint(0), Some(&Keypoint::new(100.0, 200.0, 0.9)));
        assert_eq!(edited.keypoint(3), Some(&Keypoint::new(300.0, 250.0, 0.9)));
    }

    #[test]
    fn test_edit_drag_through_viewport() {
        let tmp = tempfile::tempdir().unwrap();
        let pose = write_pose(tmp.path());
        let out = tmp.path().join("dragged.json");
        // 400x300 image on an 800x600 canvas: scale 2, no offset
        let Commands::Edit(args) = parse(&[
            "app",
            "edit",
            "--pose",
            pose.to_str().unwrap(),
            "--canvas",
            "800x600",
            "--op",
            "drag:260,400:300,500",
            "--output",
            out.to_str().unwrap(),
        ]) else {
            panic!("expected edit");
        };
        run_edit(&args).unwrap();

        let edited = io::load_pose(&out, None).unwrap();
        let kp = edited.keypoint(3).unwrap();
        assert!((kp.x - 150.0).abs() < 1e-9);
        assert!((kp.y - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_edit_invalid_index() {
        let tmp = tempfile::tempdir().unwrap();
        let pose = write_pose(tmp.path());
        let Commands::Edit(args) = parse(&["app", "edit", "--pose", pose.to_str().unwrap(), "--op", "18=1,1"])
        else {
            panic!("expected edit");
        };
        assert!(matches!(
            run_edit(&args),
            Err(PoseError::IndexOutOfRange { index: 18, len: 18 })
        ));
    }
}
