use remuxcode_av::{AudioConfig, CleanupConfig, VideoConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub arrs: Vec<ArrConfig>,

    #[serde(default)]
    pub path_mappings: Vec<PathMapping>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret expected in the `X-API-Key` header. Unset or empty
    /// disables authentication.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7889
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

impl ServerConfig {
    /// The configured key, if authentication is enabled.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Number of concurrent job workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Root for per-job temp directories, overriding the media volume
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Directory holding `remuxcode.db`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Days to keep finished jobs before the retention sweep removes them
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Timeout for cleanup remuxes, in seconds (0 = unbounded)
    #[serde(default = "default_cleanup_timeout")]
    pub cleanup_timeout: u64,
}

fn default_workers() -> usize {
    1
}

fn default_retention_days() -> u32 {
    30
}

fn default_cleanup_timeout() -> u64 {
    3600
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            temp_dir: None,
            data_dir: None,
            retention_days: default_retention_days(),
            cleanup_timeout: default_cleanup_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArrConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub arr_type: ArrType,

    pub url: String,

    pub api_key: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Refresh and rename in the Arr after a successful conversion
    #[serde(default = "default_true")]
    pub auto_rename: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArrType {
    Radarr,
    Sonarr,
}

impl std::fmt::Display for ArrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrType::Radarr => write!(f, "radarr"),
            ArrType::Sonarr => write!(f, "sonarr"),
        }
    }
}

/// Maps a path as seen by the Arr (`container`) to the local path (`host`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PathMapping {
    pub container: String,
    pub host: String,
}
