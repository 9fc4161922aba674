use crate::error::{CurriculumError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token. `CURRICULUM_TOKEN` in the environment takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DragConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DragConfig {
    #[serde(default = "default_activation_distance")]
    pub activation_distance_px: f32,
}

fn default_activation_distance() -> f32 {
    8.0
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            activation_distance_px: default_activation_distance(),
        }
    }
}

// ---------------------------------------------------------------------------
// UploadConfig
// ---------------------------------------------------------------------------

/// Order of the two writes in the finalize step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeOrder {
    /// Delete the superseded objects, then point the item at the new ones.
    #[default]
    DeleteThenUpdate,
    /// Point the item at the new objects, then delete the superseded ones.
    UpdateThenDelete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: f64,
    #[serde(default = "default_parallel")]
    pub parallel_transfers: bool,
    #[serde(default)]
    pub finalize_order: FinalizeOrder,
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<u64>,
    /// Ceiling on a single storage PUT. Unset means no limit; `api.timeout_secs`
    /// never applies to transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<PathBuf>,
}

fn default_thumbnail_offset() -> f64 {
    1.0
}

fn default_parallel() -> bool {
    true
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            thumbnail_offset_secs: default_thumbnail_offset(),
            parallel_transfers: default_parallel(),
            finalize_order: FinalizeOrder::default(),
            chunk_size_bytes: default_chunk_size(),
            max_file_bytes: None,
            transfer_timeout_secs: None,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// EditorConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub drag: DragConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            api: ApiConfig::default(),
            drag: DragConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(CurriculumError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: EditorConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`EditorConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(CurriculumError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// The token from the environment, falling back to the config file.
    pub fn auth_token(&self) -> Option<String> {
        std::env::var("CURRICULUM_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api.auth_token.clone())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        let base = self.api.base_url.trim();
        if base.is_empty() {
            push(WarnLevel::Error, "api.base_url is empty".to_string());
        } else if !(base.starts_with("http://") || base.starts_with("https://")) {
            push(
                WarnLevel::Error,
                format!("api.base_url '{base}' must start with http:// or https://"),
            );
        }

        if self.api.timeout_secs == 0 {
            push(
                WarnLevel::Error,
                "api.timeout_secs must be greater than 0".to_string(),
            );
        } else if self.api.timeout_secs > 600 {
            push(
                WarnLevel::Warning,
                format!(
                    "api.timeout_secs={} (>600 is unusual)",
                    self.api.timeout_secs
                ),
            );
        }

        if self.drag.activation_distance_px <= 0.0 {
            push(
                WarnLevel::Warning,
                "drag.activation_distance_px <= 0: every click on a row will start a drag"
                    .to_string(),
            );
        }

        if self.upload.chunk_size_bytes == 0 {
            push(
                WarnLevel::Error,
                "upload.chunk_size_bytes must be greater than 0".to_string(),
            );
        }

        if !self.upload.thumbnail_offset_secs.is_finite()
            || self.upload.thumbnail_offset_secs < 0.0
        {
            push(
                WarnLevel::Error,
                format!(
                    "upload.thumbnail_offset_secs={} must be a non-negative number",
                    self.upload.thumbnail_offset_secs
                ),
            );
        }

        if self.upload.transfer_timeout_secs == Some(0) {
            push(
                WarnLevel::Error,
                "upload.transfer_timeout_secs must be greater than 0 (omit it for no limit)"
                    .to_string(),
            );
        }

        if self.upload.max_file_bytes == Some(0) {
            push(
                WarnLevel::Warning,
                "upload.max_file_bytes=0 rejects every upload".to_string(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
