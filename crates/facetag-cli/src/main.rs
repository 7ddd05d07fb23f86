mod config;
mod display;
mod live;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use display::PreviewDisplay;
use facetag_core::{
    label_faces, Enrollment, EnrollmentBuilder, EnrollmentReport, EuclideanMatcher, FaceDetector,
    FaceEmbedder,
};
use facetag_hw::Camera;
use live::LiveOptions;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facetag", about = "Enroll labeled faces and name them in a live camera feed")]
struct Cli {
    /// TOML config file (default: $FACETAG_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the enrollment from a labeled photo directory and summarize it
    Enroll {
        /// Directory with one subdirectory of photos per person
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Enroll, then label faces in the live camera feed
    Run {
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Maximum distance accepted as a match
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Camera device path (e.g., /dev/video0)
        #[arg(short, long)]
        camera: Option<String>,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// Enroll, then label the faces in a single image
    Still {
        image: PathBuf,
        /// Where to write the annotated copy (default: <IMAGE>-labeled.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        dir: Option<PathBuf>,
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Enroll { dir, json } => {
            if let Some(dir) = dir {
                cfg.enroll_dir = dir;
            }
            let (enrollment, report) = enroll(&cfg)?;
            let summary = EnrollSummary::new(&enrollment, &report);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                summary.print();
            }
        }
        Commands::Run {
            dir,
            threshold,
            camera,
            max_frames,
        } => {
            if let Some(dir) = dir {
                cfg.enroll_dir = dir;
            }
            if let Some(t) = threshold {
                cfg.threshold = t;
            }
            if camera.is_some() {
                cfg.camera_device = camera;
            }
            if max_frames.is_some() {
                cfg.max_frames = max_frames;
            }
            cfg.validate()?;
            run(&cfg)?;
        }
        Commands::Still {
            image,
            output,
            dir,
            threshold,
        } => {
            if let Some(dir) = dir {
                cfg.enroll_dir = dir;
            }
            if let Some(t) = threshold {
                cfg.threshold = t;
            }
            cfg.validate()?;
            let output = output.unwrap_or_else(|| labeled_path(&image));
            still(&cfg, &image, &output)?;
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
    }

    Ok(())
}

fn load_models(cfg: &Config) -> Result<(FaceDetector, FaceEmbedder)> {
    let det_path = cfg.detector_model_path();
    let emb_path = cfg.embedder_model_path();
    let detector = FaceDetector::load(&det_path)
        .with_context(|| format!("loading detector {}", det_path.display()))?;
    let embedder = FaceEmbedder::load(&emb_path, cfg.embedder_options())
        .with_context(|| format!("loading embedder {}", emb_path.display()))?;
    Ok((detector, embedder))
}

fn enroll(cfg: &Config) -> Result<(Enrollment, EnrollmentReport)> {
    let (mut detector, mut embedder) = load_models(cfg)?;
    build_enrollment(cfg, &mut detector, &mut embedder)
}

fn build_enrollment(
    cfg: &Config,
    detector: &mut FaceDetector,
    embedder: &mut FaceEmbedder,
) -> Result<(Enrollment, EnrollmentReport)> {
    EnrollmentBuilder::new(detector, embedder)
        .build(&cfg.enroll_dir)
        .with_context(|| format!("enrolling faces from {}", cfg.enroll_dir.display()))
}

fn run(cfg: &Config) -> Result<()> {
    let (mut detector, mut embedder) = load_models(cfg)?;
    let (enrollment, _report) = build_enrollment(cfg, &mut detector, &mut embedder)?;
    if enrollment.is_empty() {
        tracing::warn!("no faces enrolled; everyone will be labeled Unknown");
    }

    let device = cfg.camera_device();
    let mut camera = Camera::open(&device, cfg.frame_timeout())
        .with_context(|| format!("opening camera {device}"))?;
    let mut display = PreviewDisplay::new(&cfg.preview_path);
    tracing::info!(
        preview = %display.path().display(),
        "live preview running; type q + Enter to quit, s + Enter for a snapshot"
    );

    let options = LiveOptions {
        threshold: cfg.threshold,
        max_frames: cfg.max_frames,
        snapshot_dir: cfg.snapshot_dir.clone(),
    };
    let summary = live::run_live(
        &mut camera,
        &mut detector,
        &mut embedder,
        &EuclideanMatcher,
        &enrollment,
        &mut display,
        &options,
    )?;

    println!(
        "Processed {} frames, labeled {} faces, saved {} snapshots",
        summary.frames, summary.faces_labeled, summary.snapshots
    );
    Ok(())
}

fn still(cfg: &Config, image_path: &Path, output: &Path) -> Result<()> {
    let (mut detector, mut embedder) = load_models(cfg)?;
    let (enrollment, _report) = build_enrollment(cfg, &mut detector, &mut embedder)?;

    let mut image = image::open(image_path)
        .with_context(|| format!("opening {}", image_path.display()))?
        .to_rgb8();
    let faces = label_faces(
        &mut detector,
        &mut embedder,
        &EuclideanMatcher,
        &enrollment,
        &image,
        cfg.threshold,
    )
    .context("detecting faces")?;

    for f in &faces {
        println!(
            "{}  distance={:.3}  confidence={:.0}%  box=({:.0}, {:.0}, {:.0}x{:.0})",
            f.name(),
            f.result.distance,
            f.face.confidence * 100.0,
            f.face.x,
            f.face.y,
            f.face.width,
            f.face.height
        );
    }

    render::annotate(&mut image, &faces);
    image
        .save(output)
        .with_context(|| format!("saving {}", output.display()))?;
    println!("{} face(s); annotated image written to {}", faces.len(), output.display());
    Ok(())
}

/// `photo.jpg` -> `photo-labeled.png` in the same directory.
fn labeled_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    image.with_file_name(format!("{stem}-labeled.png"))
}

#[derive(Serialize)]
struct EnrollSummary {
    identities: Vec<IdentitySummary>,
    scanned: usize,
    skipped: Vec<SkippedSummary>,
}

#[derive(Serialize)]
struct IdentitySummary {
    label: String,
    embeddings: usize,
}

#[derive(Serialize)]
struct SkippedSummary {
    label: String,
    path: PathBuf,
    reason: String,
}

impl EnrollSummary {
    fn new(enrollment: &Enrollment, report: &EnrollmentReport) -> Self {
        Self {
            identities: enrollment
                .identities()
                .iter()
                .map(|id| IdentitySummary {
                    label: id.label.clone(),
                    embeddings: id.embeddings.len(),
                })
                .collect(),
            scanned: report.scanned,
            skipped: report
                .skipped
                .iter()
                .map(|s| SkippedSummary {
                    label: s.label.clone(),
                    path: s.path.clone(),
                    reason: s.reason.to_string(),
                })
                .collect(),
        }
    }

    fn print(&self) {
        println!(
            "Enrolled {} identities from {} images",
            self.identities.len(),
            self.scanned
        );
        for id in &self.identities {
            println!("  {:<20} {} embedding(s)", id.label, id.embeddings);
        }
        if !self.skipped.is_empty() {
            println!("Skipped {} image(s):", self.skipped.len());
            for s in &self.skipped {
                println!("  {}: {}", s.path.display(), s.reason);
            }
        }
    }
}
