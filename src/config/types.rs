use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::conversion::BackpressurePolicy;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    1998
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Require a session for upload and browsing
    #[serde(default = "default_auth_enabled")]
    pub enabled: bool,

    /// Username for the login form
    #[serde(default)]
    pub username: Option<String>,

    /// Bcrypt hash of the password (generate with `rawdrop hash-password`)
    #[serde(default)]
    pub password_hash: Option<String>,

    /// Key used to sign session cookies (generate with `rawdrop generate-secret`)
    #[serde(default)]
    pub session_secret: Option<String>,

    /// Session lifetime in minutes (default: 20)
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: u64,
}

fn default_auth_enabled() -> bool {
    true
}

fn default_session_timeout() -> u64 {
    20
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_auth_enabled(),
            username: None,
            password_hash: None,
            session_secret: None,
            session_timeout_minutes: default_session_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Where uploads and converted JPEGs are stored
    #[serde(default = "default_media_directory")]
    pub directory: PathBuf,

    /// Largest accepted request body in bytes (default: 200 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_media_directory() -> PathBuf {
    PathBuf::from("./media")
}

fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            directory: default_media_directory(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// RAW decoding backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Re-encode the JPEG preview embedded in the RAW file
    #[default]
    Embedded,
    /// Demosaic with the dcraw CLI
    Dcraw,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Number of conversion workers (default: 5)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Tasks that may wait for a worker (default: 16)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Behaviour when the queue is full: "reject" or "block"
    #[serde(default)]
    pub backpressure: BackpressurePolicy,

    /// How long a blocked submit waits for space (default: 5000)
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_ms: u64,

    /// JPEG quality, 1-100 (default: 100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Per-file conversion limit (default: 300)
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// How long shutdown waits for queued tasks (default: 10)
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,

    #[serde(default)]
    pub codec: CodecKind,
}

fn default_max_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    16
}

fn default_submit_timeout() -> u64 {
    5000
}

fn default_jpeg_quality() -> u8 {
    100
}

fn default_task_timeout() -> u64 {
    300
}

fn default_drain_timeout() -> u64 {
    10
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            queue_capacity: default_queue_capacity(),
            backpressure: BackpressurePolicy::default(),
            submit_timeout_ms: default_submit_timeout(),
            jpeg_quality: default_jpeg_quality(),
            task_timeout_secs: default_task_timeout(),
            drain_timeout_secs: default_drain_timeout(),
            codec: CodecKind::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub dcraw_path: Option<PathBuf>,
}
