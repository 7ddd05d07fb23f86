use facetag_core::{ChannelOrder, EmbedderOptions, TensorLayout, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "FACETAG_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration.
///
/// Layered as: defaults, then the TOML file, then `FACETAG_*` environment
/// variables. Command-line flags are applied last by `main`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root directory with one subdirectory of photos per person.
    pub enroll_dir: PathBuf,
    /// Maximum Euclidean distance accepted as a match.
    pub threshold: f32,
    /// Camera index, used as `/dev/video<N>` when `camera_device` is unset.
    pub camera_index: u32,
    pub camera_device: Option<String>,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    pub detector_model: String,
    pub embedder_model: String,
    pub embedder_input_size: u32,
    pub embedder_channel_order: ChannelOrder,
    pub embedder_layout: TensorLayout,
    /// How long a single frame read may block before the live loop gives up.
    pub frame_timeout_ms: u64,
    /// PNG rewritten with every annotated frame.
    pub preview_path: PathBuf,
    pub snapshot_dir: PathBuf,
    /// Stop the live loop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let embedder = EmbedderOptions::default();
        Self {
            enroll_dir: PathBuf::from("Faces"),
            threshold: DEFAULT_THRESHOLD,
            camera_index: 0,
            camera_device: None,
            model_dir: facetag_core::default_model_dir(),
            detector_model: "det_10g.onnx".to_string(),
            embedder_model: "facenet.onnx".to_string(),
            embedder_input_size: embedder.input_size,
            embedder_channel_order: embedder.channel_order,
            embedder_layout: embedder.layout,
            frame_timeout_ms: 2000,
            preview_path: PathBuf::from("facetag-preview.png"),
            snapshot_dir: PathBuf::from("snapshots"),
            max_frames: None,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    ///
    /// With no explicit path, `FACETAG_CONFIG` is consulted; with neither,
    /// the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Override fields from `FACETAG_*` variables returned by `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = var("FACETAG_ENROLL_DIR") {
            self.enroll_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse(&var, "FACETAG_THRESHOLD") {
            self.threshold = v;
        }
        if let Some(v) = env_parse(&var, "FACETAG_CAMERA_INDEX") {
            self.camera_index = v;
        }
        if let Some(v) = var("FACETAG_CAMERA_DEVICE") {
            self.camera_device = Some(v);
        }
        if let Some(v) = var("FACETAG_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = var("FACETAG_DETECTOR_MODEL") {
            self.detector_model = v;
        }
        if let Some(v) = var("FACETAG_EMBEDDER_MODEL") {
            self.embedder_model = v;
        }
        if let Some(v) = env_parse(&var, "FACETAG_EMBEDDER_INPUT_SIZE") {
            self.embedder_input_size = v;
        }
        if let Some(v) = env_parse(&var, "FACETAG_EMBEDDER_CHANNEL_ORDER") {
            self.embedder_channel_order = v;
        }
        if let Some(v) = env_parse(&var, "FACETAG_EMBEDDER_LAYOUT") {
            self.embedder_layout = v;
        }
        if let Some(v) = env_parse(&var, "FACETAG_FRAME_TIMEOUT_MS") {
            self.frame_timeout_ms = v;
        }
        if let Some(v) = var("FACETAG_PREVIEW_PATH") {
            self.preview_path = PathBuf::from(v);
        }
        if let Some(v) = var("FACETAG_SNAPSHOT_DIR") {
            self.snapshot_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse(&var, "FACETAG_MAX_FRAMES") {
            self.max_frames = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        if self.embedder_input_size == 0 {
            return Err(ConfigError::Invalid("embedder_input_size must be positive".into()));
        }
        if self.frame_timeout_ms == 0 {
            return Err(ConfigError::Invalid("frame_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// V4L2 device path: `camera_device` if set, else `/dev/video<camera_index>`.
    pub fn camera_device(&self) -> String {
        self.camera_device
            .clone()
            .unwrap_or_else(|| facetag_hw::Camera::device_path_for_index(self.camera_index))
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector_model)
    }

    /// Path to the FaceNet embedding model.
    pub fn embedder_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.embedder_model)
    }

    pub fn embedder_options(&self) -> EmbedderOptions {
        EmbedderOptions {
            input_size: self.embedder_input_size,
            channel_order: self.embedder_channel_order,
            layout: self.embedder_layout,
        }
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

fn env_parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.enroll_dir, PathBuf::from("Faces"));
        assert_eq!(config.threshold, 1.0);
        assert_eq!(config.camera_device(), "/dev/video0");
        assert_eq!(config.embedder_input_size, 160);
        assert_eq!(config.embedder_channel_order, ChannelOrder::Rgb);
        assert_eq!(config.embedder_layout, TensorLayout::Nhwc);
        assert_eq!(config.frame_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_frames, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            threshold = 0.8
            camera_index = 2
            embedder_channel_order = "bgr"
            embedder_layout = "nchw"
            model_dir = "/opt/models"
            "#,
        )
        .unwrap();

        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.camera_device(), "/dev/video2");
        assert_eq!(config.embedder_options().channel_order, ChannelOrder::Bgr);
        assert_eq!(config.embedder_options().layout, TensorLayout::Nchw);
        assert_eq!(config.detector_model_path(), PathBuf::from("/opt/models/det_10g.onnx"));
        assert_eq!(config.embedder_model_path(), PathBuf::from("/opt/models/facenet.onnx"));
        assert_eq!(config.enroll_dir, PathBuf::from("Faces"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_toml("treshold = 0.5").is_err());
    }

    #[test]
    fn test_from_file_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::from_file(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("nope.toml"));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "threshold = \"high\"").unwrap();
        assert!(matches!(Config::from_file(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("FACETAG_THRESHOLD", "0.6"),
            ("FACETAG_CAMERA_DEVICE", "/dev/video7"),
            ("FACETAG_EMBEDDER_CHANNEL_ORDER", "BGR"),
            ("FACETAG_MAX_FRAMES", "30"),
            ("FACETAG_ENROLL_DIR", "people"),
        ]));

        assert_eq!(config.threshold, 0.6);
        assert_eq!(config.camera_device(), "/dev/video7");
        assert_eq!(config.embedder_channel_order, ChannelOrder::Bgr);
        assert_eq!(config.max_frames, Some(30));
        assert_eq!(config.enroll_dir, PathBuf::from("people"));
    }

    #[test]
    fn test_bad_env_value_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("FACETAG_THRESHOLD", "lots"),
            ("FACETAG_EMBEDDER_LAYOUT", "chwn"),
            ("FACETAG_CAMERA_INDEX", ""),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = Config {
            threshold: -0.1,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            threshold: f32::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
