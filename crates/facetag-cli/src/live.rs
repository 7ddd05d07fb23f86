//! Live recognition loop: camera frame in, annotated frame out.

use crate::display::{Display, DisplayError, Key};
use crate::render;
use facetag_core::{label_faces, Detector, Embedder, Enrollment, Matcher};
use facetag_hw::FrameSource;
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("display failed: {0}")]
    Display(#[from] DisplayError),
}

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub threshold: f32,
    /// Stop after this many frames; `None` runs until quit or camera failure.
    pub max_frames: Option<u64>,
    pub snapshot_dir: PathBuf,
}

/// What a finished live session did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LiveSummary {
    pub frames: u64,
    pub faces_labeled: u64,
    pub snapshots: u64,
}

/// Run until the quit key, a camera read failure, or `max_frames`.
///
/// A camera failure ends the loop normally. The source is released on
/// every exit path.
pub fn run_live<S, D, E, M, P>(
    source: &mut S,
    detector: &mut D,
    embedder: &mut E,
    matcher: &M,
    enrollment: &Enrollment,
    display: &mut P,
    options: &LiveOptions,
) -> Result<LiveSummary, LiveError>
where
    S: FrameSource + ?Sized,
    D: Detector + ?Sized,
    E: Embedder + ?Sized,
    M: Matcher + ?Sized,
    P: Display + ?Sized,
{
    let result = live_loop(source, detector, embedder, matcher, enrollment, display, options);
    source.release();
    if let Ok(summary) = &result {
        tracing::info!(
            frames = summary.frames,
            faces = summary.faces_labeled,
            snapshots = summary.snapshots,
            "live session ended"
        );
    }
    result
}

fn live_loop<S, D, E, M, P>(
    source: &mut S,
    detector: &mut D,
    embedder: &mut E,
    matcher: &M,
    enrollment: &Enrollment,
    display: &mut P,
    options: &LiveOptions,
) -> Result<LiveSummary, LiveError>
where
    S: FrameSource + ?Sized,
    D: Detector + ?Sized,
    E: Embedder + ?Sized,
    M: Matcher + ?Sized,
    P: Display + ?Sized,
{
    let mut summary = LiveSummary::default();

    loop {
        if options.max_frames.is_some_and(|max| summary.frames >= max) {
            tracing::info!(frames = summary.frames, "frame limit reached");
            break;
        }

        let frame = match source.read_frame() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "camera read failed; stopping");
                break;
            }
        };

        let faces = label_faces(detector, embedder, matcher, enrollment, &frame.image, options.threshold)
            .unwrap_or_else(|e| {
                tracing::warn!(seq = frame.sequence, error = %e, "detection failed; frame shown unlabeled");
                Vec::new()
            });
        tracing::debug!(seq = frame.sequence, faces = faces.len(), "frame processed");

        let mut image = frame.image;
        render::annotate(&mut image, &faces);
        display.present(&image)?;

        summary.frames += 1;
        summary.faces_labeled += faces.len() as u64;

        let mut quit = false;
        while let Some(key) = display.poll_key() {
            match key {
                Key::Quit => quit = true,
                Key::Snapshot => match save_snapshot(&image, &options.snapshot_dir) {
                    Ok(path) => {
                        summary.snapshots += 1;
                        tracing::info!(path = %path.display(), faces = faces.len(), "snapshot saved");
                    }
                    Err(e) => tracing::warn!(error = %e, "snapshot failed"),
                },
            }
        }
        if quit {
            tracing::info!("quit requested");
            break;
        }
    }

    Ok(summary)
}

/// Save `image` as a timestamped PNG in `dir`, creating it if needed.
pub fn save_snapshot(image: &RgbImage, dir: &Path) -> Result<PathBuf, image::ImageError> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    let path = dir.join(format!("facetag-{stamp}.png"));
    image.save_with_format(&path, image::ImageFormat::Png)?;
    Ok(path)
}
