pub mod config;
pub mod order;
pub mod upload;

use anyhow::Context;
use clap::Args;
use curriculum_client::HttpPersistenceClient;
use curriculum_core::config::{EditorConfig, WarnLevel};
use curriculum_core::types::ScopeId;
use std::path::Path;
use std::sync::Arc;

/// Which list to operate on: a course's sections, or one section's items.
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Course id
    #[arg(long)]
    pub course: String,

    /// Section id (omit to address the course's section list)
    #[arg(long)]
    pub section: Option<String>,
}

impl ScopeArgs {
    pub fn scope(&self) -> ScopeId {
        match &self.section {
            Some(section) => ScopeId::section(&self.course, section),
            None => ScopeId::course(&self.course),
        }
    }
}

/// Load the config and refuse to run on one with error-level problems.
pub fn load_config(root: &Path) -> anyhow::Result<EditorConfig> {
    let config = EditorConfig::load_or_default(root).context("failed to load config")?;
    if let Some(w) = config
        .validate()
        .into_iter()
        .find(|w| w.level == WarnLevel::Error)
    {
        anyhow::bail!("invalid config: {} (see `curriculum config validate`)", w.message);
    }
    Ok(config)
}

pub fn http_client(config: &EditorConfig) -> anyhow::Result<Arc<HttpPersistenceClient>> {
    let client = HttpPersistenceClient::from_config(config).context("failed to build HTTP client")?;
    Ok(Arc::new(client))
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}
