use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use curriculum_core::config::{EditorConfig, WarnLevel};
use curriculum_core::paths;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a default .curriculum/config.yaml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init { force } => init(root, force),
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(root: &Path, force: bool) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    EditorConfig::default()
        .save(root)
        .context("failed to write config")?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = EditorConfig::load(root).context("failed to load config")?;

    if json {
        return print_json(&config);
    }

    let token = match config.auth_token() {
        Some(_) => "(set)",
        None => "(none)",
    };
    println!("API base URL:        {}", config.api.base_url);
    println!("API timeout:         {}s", config.api.timeout_secs);
    println!("Auth token:          {token}");
    println!("Drag activation:     {}px", config.drag.activation_distance_px);
    println!("Thumbnail offset:    {}s", config.upload.thumbnail_offset_secs);
    println!(
        "Transfers:           {}",
        if config.upload.parallel_transfers {
            "parallel"
        } else {
            "sequential"
        }
    );
    println!("Finalize order:      {:?}", config.upload.finalize_order);
    match config.upload.transfer_timeout_secs {
        Some(secs) => println!("Transfer timeout:    {secs}s"),
        None => println!("Transfer timeout:    (none)"),
    }
    if let Some(limit) = config.upload.max_file_bytes {
        println!(
            "Max file size:       {}",
            crate::output::human_bytes(limit)
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = EditorConfig::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
