//! Where annotated frames go and where key presses come from.

use image::RgbImage;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("writing preview {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("replacing preview {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Commands the live loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Quit,
    Snapshot,
}

impl Key {
    /// Map a line of keyboard input to a command (`q` quits, `s` snapshots).
    pub fn from_input(line: &str) -> Option<Self> {
        match line.trim() {
            "q" | "Q" => Some(Self::Quit),
            "s" | "S" => Some(Self::Snapshot),
            _ => None,
        }
    }
}

pub trait Display {
    /// Show an annotated frame.
    fn present(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Next pending key press, without blocking.
    fn poll_key(&mut self) -> Option<Key>;
}

/// Rewrites a PNG with every frame and takes keys from stdin.
///
/// Each frame is written next to the target and renamed over it, so a
/// viewer watching the file never sees a half-written image.
pub struct PreviewDisplay {
    path: PathBuf,
    tmp_path: PathBuf,
    keys: Receiver<Key>,
}

impl PreviewDisplay {
    /// Preview at `path`, reading keys from stdin on a background thread.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("facetag-keys".into())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if let Some(key) = Key::from_input(&line) {
                        if tx.send(key).is_err() {
                            break;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "keyboard watcher unavailable; stop with Ctrl-C");
        }
        Self::with_keys(path, rx)
    }

    /// Preview at `path` with keys from an existing channel.
    pub fn with_keys(path: impl Into<PathBuf>, keys: Receiver<Key>) -> Self {
        let path = path.into();
        let tmp_path = tmp_path_for(&path);
        Self { path, tmp_path, keys }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp.png");
    path.with_file_name(name)
}

impl Display for PreviewDisplay {
    fn present(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        frame
            .save_with_format(&self.tmp_path, image::ImageFormat::Png)
            .map_err(|source| DisplayError::Write {
                path: self.tmp_path.clone(),
                source,
            })?;
        std::fs::rename(&self.tmp_path, &self.path).map_err(|source| DisplayError::Rename {
            path: self.path.clone(),
            source,
        })
    }

    fn poll_key(&mut self) -> Option<Key> {
        match self.keys.try_recv() {
            Ok(key) => Some(key),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}
