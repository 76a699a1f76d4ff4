// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{DEFAULT_MODEL, EditorConfig, RenderStyle};
use crate::pose::DEFAULT_VISIBILITY_THRESHOLD;
use crate::visualizer::{Background, Color};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    pose-editor render --pose pose.json --image photo.jpg
    pose-editor render --pose pose.json --canvas 800x600 --no-face
    pose-editor edit --pose pose.json --op 3=300,300 --op 4=320,410
    pose-editor edit --pose pose.json --canvas 800x600 --op drag:110,110:160,160
    pose-editor preview --pose pose.json --image photo.jpg --mode detection
    pose-editor apply --pose edited.json --output applied.png
    pose-editor extract --image photo.jpg --output pose.json

The service URL defaults to $POSE_SERVICE_URL, then http://127.0.0.1:8000."#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,

    /// Show verbose output
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Print only warnings and errors
    #[arg(short, long, global = true, default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Draw a pose locally, optionally over its source image
    Render(RenderArgs),
    /// Render a pose through the service, falling back to local drawing
    Preview(PreviewArgs),
    /// Render a pose remotely and place it on a canvas file
    Apply(ApplyArgs),
    /// Extract a pose from an image with the service
    Extract(ExtractArgs),
    /// Move or reset keypoints and write the edited pose
    Edit(EditArgs),
}

/// Pose input shared by every command that reads a pose file.
#[derive(Args, Debug, Clone)]
pub struct PoseArgs {
    /// Pose JSON file
    #[arg(short, long)]
    pub pose: PathBuf,

    /// Keypoint schema (openpose_18, coco_17); inferred from the keypoint count if omitted
    #[arg(long)]
    pub schema: Option<String>,

    /// Minimum confidence for a keypoint to be drawn
    #[arg(long, default_value_t = DEFAULT_VISIBILITY_THRESHOLD)]
    pub threshold: f32,
}

/// Drawing options.
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct StyleArgs {
    /// Bone colour (name or #rrggbb)
    #[arg(long, default_value = "white")]
    pub skeleton_color: Color,

    /// Keypoint colour (name or #rrggbb)
    #[arg(long, default_value = "red")]
    pub point_color: Color,

    /// Background (colour name, #rrggbb or transparent)
    #[arg(long, default_value = "black")]
    pub background: Background,

    /// Bone width in pixels
    #[arg(long, default_value_t = 2)]
    pub line_width: u32,

    /// Keypoint radius in pixels
    #[arg(long, default_value_t = 4)]
    pub point_radius: u32,

    /// Colour bones and keypoints with the OpenPose limb palette
    #[arg(long, default_value_t = false)]
    pub limb_palette: bool,

    /// Hide the face keypoints (eyes and ears)
    #[arg(long, default_value_t = false)]
    pub no_face: bool,

    /// Draw hand placeholder markers around the wrists
    #[arg(long, default_value_t = false)]
    pub hands: bool,
}

impl StyleArgs {
    /// Drawing style selected on the command line.
    #[must_use]
    pub fn style(&self) -> RenderStyle {
        RenderStyle::new()
            .with_skeleton_color(self.skeleton_color)
            .with_point_color(self.point_color)
            .with_background(self.background)
            .with_line_width(self.line_width)
            .with_point_radius(self.point_radius)
            .with_limb_palette(self.limb_palette)
    }

    /// Editor configuration for these options and `threshold`.
    #[must_use]
    pub fn editor_config(&self, threshold: f32) -> EditorConfig {
        EditorConfig::new()
            .with_visibility_threshold(threshold)
            .with_face(!self.no_face)
            .with_hands(self.hands)
            .with_style(self.style())
    }
}

/// Pose service location.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Pose service base URL
    #[arg(long)]
    pub service: Option<String>,

    /// Service read timeout in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

/// Arguments for the render command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub pose: PoseArgs,

    #[command(flatten)]
    pub style: StyleArgs,

    /// Source image to draw over
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Render through a fitted editor viewport of this size (WIDTHxHEIGHT)
    #[arg(long, value_parser = parse_canvas)]
    pub canvas: Option<(f64, f64)>,

    /// Output PNG [default: runs/pose/render/skeleton.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Remote render mode for previews.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewMode {
    /// Run detection on the source image
    Detection,
    /// Render the pose skeleton
    Skeleton,
}

/// Arguments for the preview command.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub pose: PoseArgs,

    #[command(flatten)]
    pub style: StyleArgs,

    #[command(flatten)]
    pub service: ServiceArgs,

    /// Source image (required by detection mode, drawn under the local fallback)
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// What the service is asked to render
    #[arg(long, value_enum, default_value_t = PreviewMode::Skeleton)]
    pub mode: PreviewMode,

    /// Detection model
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Output PNG [default: runs/pose/preview/preview.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the apply command.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub pose: PoseArgs,

    #[command(flatten)]
    pub style: StyleArgs,

    #[command(flatten)]
    pub service: ServiceArgs,

    /// Canvas file receiving the rendered skeleton [default: runs/pose/apply/applied.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Source image
    #[arg(short, long)]
    pub image: PathBuf,

    /// Extraction processor
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub processor: String,

    /// Index of the person to keep
    #[arg(long, default_value_t = 0)]
    pub person: usize,

    /// Keypoint schema; inferred from the keypoint count if omitted
    #[arg(long)]
    pub schema: Option<String>,

    /// Output pose JSON [default: runs/pose/extract/pose.json]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the edit command.
#[derive(Args, Debug)]
pub struct EditArgs {
    #[command(flatten)]
    pub pose: PoseArgs,

    /// Edit to apply, in order; repeatable. INDEX=X,Y moves a keypoint to image
    /// coordinates, drag:X1,Y1:X2,Y2 drags on the editor canvas, reset restores the
    /// loaded pose
    #[arg(long = "op", value_parser = parse_edit_op, required = true)]
    pub ops: Vec<EditOp>,

    /// Editor canvas size used by drag edits (WIDTHxHEIGHT)
    #[arg(long, value_parser = parse_canvas, default_value = "1024x1024")]
    pub canvas: (f64, f64),

    /// Output pose JSON [default: runs/pose/edit/pose.json]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One scripted edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOp {
    /// Move keypoint `index` to image coordinates.
    Set {
        /// Keypoint index.
        index: usize,
        /// New x in image pixels.
        x: f64,
        /// New y in image pixels.
        y: f64,
    },
    /// Press at `from` and release at `to`, in canvas pixels.
    Drag {
        /// Pointer down position.
        from: (f64, f64),
        /// Pointer up position.
        to: (f64, f64),
    },
    /// Restore the loaded keypoints.
    Reset,
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid coordinate '{v}'"))
    };
    Ok((coord(x)?, coord(y)?))
}

fn parse_edit_op(s: &str) -> Result<EditOp, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("reset") {
        return Ok(EditOp::Reset);
    }
    if let Some(rest) = s.strip_prefix("drag:") {
        let (from, to) = rest
            .split_once(':')
            .ok_or_else(|| format!("expected drag:X1,Y1:X2,Y2, got '{s}'"))?;
        return Ok(EditOp::Drag {
            from: parse_point(from)?,
            to: parse_point(to)?,
        });
    }
    let (index, point) = s
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=X,Y, drag:X1,Y1:X2,Y2 or reset, got '{s}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| format!("invalid keypoint index '{index}'"))?;
    let (x, y) = parse_point(point)?;
    Ok(EditOp::Set { index, x, y })
}

fn parse_canvas(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let dim = |v: &str| {
        v.trim()
            .parse::<u32>()
            .ok()
            .filter(|v| *v > 0)
            .map(f64::from)
            .ok_or_else(|| format!("invalid canvas dimension '{v}'"))
    };
    Ok((dim(w)?, dim(h)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_args_defaults() {
        let args = Cli::parse_from(["app", "render", "--pose", "pose.json"]);
        assert!(!args.verbose);
        match args.command {
            Commands::Render(render) => {
                assert_eq!(render.pose.pose, PathBuf::from("pose.json"));
                assert!((render.pose.threshold - 0.3).abs() < f32::EPSILON);
                assert!(render.pose.schema.is_none());
                assert_eq!(render.style.skeleton_color, Color::WHITE);
                assert_eq!(render.style.background, Background::Solid(Color::BLACK));
                assert!(render.canvas.is_none());
                assert!(render.output.is_none());

                let config = render.style.editor_config(render.pose.threshold);
                assert!(config.show_face);
                assert!(!config.show_hands);
                assert_eq!(config.style, RenderStyle::default());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quiet_flag() {
        let args = Cli::parse_from(["app", "render", "--pose", "pose.json", "-q"]);
        assert!(args.quiet && !args.verbose);
        assert!(Cli::try_parse_from(["app", "-q", "--verbose", "render", "--pose", "p.json"]).is_err());
    }

    #[test]
    fn test_render_args_custom() {
        let args = Cli::parse_from([
            "app",
            "render",
            "-p",
            "pose.json",
            "--background",
            "transparent",
            "--point-color",
            "#00ff00",
            "--canvas",
            "800x600",
            "--no-face",
            "--verbose",
        ]);
        assert!(args.verbose);
        match args.command {
            Commands::Render(render) => {
                assert_eq!(render.style.background, Background::Transparent);
                assert_eq!(render.style.point_color, Color::GREEN);
                assert_eq!(render.canvas, Some((800.0, 600.0)));
                assert!(!render.style.editor_config(0.3).show_face);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_edit_args() {
        let args = Cli::parse_from([
            "app", "edit", "--pose", "p.json", "--op", "3=300,300", "--op", "reset", "-o",
            "out.json", "--op", "drag:110,110:160, 160",
        ]);
        match args.command {
            Commands::Edit(edit) => {
                assert_eq!(edit.canvas, (1024.0, 1024.0));
                assert_eq!(edit.output, Some(PathBuf::from("out.json")));
                assert_eq!(
                    edit.ops,
                    vec![
                        EditOp::Set { index: 3, x: 300.0, y: 300.0 },
                        EditOp::Reset,
                        EditOp::Drag { from: (110.0, 110.0), to: (160.0, 160.0) },
                    ]
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        for argv in [
            &["app", "edit", "--pose", "p.json"][..],
            &["app", "edit", "--pose", "p.json", "--op", "3:300,300"][..],
            &["app", "edit", "--pose", "p.json", "--op", "x=1,2"][..],
            &["app", "edit", "--pose", "p.json", "--op", "1=nan,2"][..],
            &["app", "edit", "--pose", "p.json", "--op", "drag:1,2"][..],
            &["app", "render", "--pose", "p.json", "--canvas", "0x600"][..],
            &["app", "render", "--pose", "p.json", "--skeleton-color", "chartreuse"][..],
        ] {
            assert!(Cli::try_parse_from(argv.iter().copied()).is_err(), "{argv:?}");
        }
    }

    #[test]
    fn test_preview_args() {
        let args = Cli::parse_from([
            "app", "preview", "--pose", "p.json", "--mode", "detection", "--service", "http://h:1",
        ]);
        match args.command {
            Commands::Preview(preview) => {
                assert_eq!(preview.mode, PreviewMode::Detection);
                assert_eq!(preview.model, "dwpose");
                assert_eq!(preview.service.service.as_deref(), Some("http://h:1"));
                assert_eq!(preview.service.timeout, 300);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
