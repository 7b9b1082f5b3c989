use facegate_core::Tolerance;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Kiosk configuration.
///
/// Built from defaults, then an optional TOML file, then `FACEGATE_*`
/// environment variables. Command-line flags are applied last by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub remote: RemoteConfig,
    pub camera: CameraConfig,
    pub paths: PathsConfig,
    pub recognition: RecognitionConfig,
    pub prompts: PromptConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Hardware-status endpoint polled before the kiosk starts.
    pub status_url: String,
    /// Match flag endpoint.
    pub flag_url: String,
    /// Body the status endpoint returns once the hardware is ready.
    pub ready_value: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            status_url: facegate_remote::DEFAULT_STATUS_URL.to_string(),
            flag_url: facegate_remote::DEFAULT_FLAG_URL.to_string(),
            ready_value: facegate_remote::DEFAULT_READY_VALUE.to_string(),
            poll_interval_secs: facegate_remote::DEFAULT_POLL_INTERVAL.as_secs(),
            request_timeout_secs: facegate_remote::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// V4L2 device path.
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Frames discarded after opening while exposure settles.
    pub warmup_frames: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: facegate_hw::camera::DEFAULT_DEVICE.to_string(),
            width: facegate_hw::camera::DEFAULT_WIDTH,
            height: facegate_hw::camera::DEFAULT_HEIGHT,
            warmup_frames: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory containing det_10g.onnx and w600k_r50.onnx.
    pub model_dir: PathBuf,
    /// Directory of `<name>_<id>.<ext>` pictures.
    pub dataset_dir: PathBuf,
    /// Gallery JSON produced by a rebuild.
    pub gallery_path: PathBuf,
    /// Where annotated pictures and the latest webcam frame are written.
    pub display_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model_dir: facegate_core::default_model_dir(),
            dataset_dir: PathBuf::from("dataset"),
            gallery_path: PathBuf::from("dataset/gallery.json"),
            display_dir: PathBuf::from("display"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecognitionConfig {
    pub tolerance: Tolerance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    pub picture: String,
    pub webcam: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            picture: "Supply one or more pictures; each face found is matched against the dataset.".to_string(),
            webcam: "Look into the camera; the panel shows who is recognized.".to_string(),
        }
    }
}

impl Config {
    /// Load defaults + optional TOML file + process environment.
    ///
    /// The file is `path`, else `$FACEGATE_CONFIG`; with neither, only
    /// defaults and environment apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os("FACEGATE_CONFIG").map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = toml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Apply `FACEGATE_*` overrides read through `lookup`.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let env = Env(&lookup);

        env.string("FACEGATE_STATUS_URL", &mut self.remote.status_url);
        env.string("FACEGATE_FLAG_URL", &mut self.remote.flag_url);
        env.string("FACEGATE_READY_VALUE", &mut self.remote.ready_value);
        env.parsed("FACEGATE_POLL_INTERVAL_SECS", &mut self.remote.poll_interval_secs);
        env.parsed("FACEGATE_REQUEST_TIMEOUT_SECS", &mut self.remote.request_timeout_secs);

        env.string("FACEGATE_CAMERA_DEVICE", &mut self.camera.device);
        env.parsed("FACEGATE_CAMERA_WIDTH", &mut self.camera.width);
        env.parsed("FACEGATE_CAMERA_HEIGHT", &mut self.camera.height);
        env.parsed("FACEGATE_WARMUP_FRAMES", &mut self.camera.warmup_frames);

        env.parsed("FACEGATE_MODEL_DIR", &mut self.paths.model_dir);
        env.parsed("FACEGATE_DATASET_DIR", &mut self.paths.dataset_dir);
        env.parsed("FACEGATE_GALLERY_PATH", &mut self.paths.gallery_path);
        env.parsed("FACEGATE_DISPLAY_DIR", &mut self.paths.display_dir);

        env.parsed("FACEGATE_TOLERANCE", &mut self.recognition.tolerance);

        env.string("FACEGATE_PICTURE_PROMPT", &mut self.prompts.picture);
        env.string("FACEGATE_WEBCAM_PROMPT", &mut self.prompts.webcam);
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, key: &str, slot: &mut String) {
        if let Some(v) = (self.0)(key) {
            *slot = v;
        }
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, slot: &mut T) {
        let Some(raw) = (self.0)(key) else {
            return;
        };
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable environment override"),
        }
    }
}
