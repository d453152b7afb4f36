use sentinel_core::DetectOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
///
/// Layered as defaults, then the optional TOML file, then `SENTINEL_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognizer sidecar command line (program followed by arguments).
    pub engine_command: Vec<String>,
    /// Path to the SQLite database holding the enrollment record.
    pub db_path: PathBuf,
    /// Sound file played when the alarm fires.
    pub alert_sound: PathBuf,
    /// Player program invoked as `<audio_player> [args] <alert_sound>`.
    pub audio_player: String,
    /// Extra player arguments that make playback silent (used for the unlock cycle).
    pub audio_mute_args: Vec<String>,
    /// Detector input resolution forwarded to the sidecar.
    pub detect_input_size: u32,
    /// Detector confidence cut-off forwarded to the sidecar.
    pub detect_score_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = DetectOptions::default();
        Self {
            engine_command: vec!["sentinel-recognizer".to_string()],
            db_path: data_dir().join("sentinel.db"),
            alert_sound: PathBuf::from(
                "/usr/share/sounds/freedesktop/stereo/alarm-clock-elapsed.oga",
            ),
            audio_player: "paplay".to_string(),
            audio_mute_args: vec!["--volume=0".to_string()],
            detect_input_size: defaults.input_size,
            detect_score_threshold: defaults.score_threshold,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    ///
    /// A broken config file is logged and ignored; the daemon always starts.
    pub fn load() -> Self {
        let path = config_file_path();
        let mut config = match Self::from_file(&path) {
            Ok(Some(config)) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring config file; using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// `Ok(None)` when the file does not exist.
    pub fn from_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(Some(toml::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Apply `SENTINEL_*` overrides. Unparseable numeric values are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(cmd) = var("SENTINEL_ENGINE_CMD") {
            let parts: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
            if !parts.is_empty() {
                self.engine_command = parts;
            }
        }
        if let Some(path) = var("SENTINEL_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(path) = var("SENTINEL_ALERT_SOUND") {
            self.alert_sound = PathBuf::from(path);
        }
        if let Some(player) = var("SENTINEL_AUDIO_PLAYER") {
            self.audio_player = player;
        }
        if let Some(args) = var("SENTINEL_AUDIO_MUTE_ARGS") {
            self.audio_mute_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(size) = var("SENTINEL_DETECT_INPUT_SIZE").and_then(|v| v.parse().ok()) {
            self.detect_input_size = size;
        }
        if let Some(score) = var("SENTINEL_DETECT_SCORE_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.detect_score_threshold = score;
        }
    }

    pub fn detect_options(&self) -> DetectOptions {
        DetectOptions {
            input_size: self.detect_input_size,
            score_threshold: self.detect_score_threshold,
        }
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
        .join("sentinel")
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var("SENTINEL_CONFIG") {
        return PathBuf::from(path);
    }
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("sentinel")
        .join("sentineld.toml")
}
