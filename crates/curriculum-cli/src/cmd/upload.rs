use crate::cmd::{http_client, load_config, runtime};
use crate::output::{human_bytes, print_json};
use anyhow::Context;
use clap::Args;
use curriculum_client::{FfmpegDeriver, UploadCoordinator, UploadJobSpec, UploadOutcome};
use curriculum_core::types::ScopeId;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct UploadArgs {
    /// Course id
    #[arg(long)]
    pub course: String,

    /// Section that owns the item
    #[arg(long)]
    pub section: String,

    /// Lecture or quiz id whose content is replaced
    #[arg(long)]
    pub item: String,

    /// File to upload
    pub file: PathBuf,

    /// Object key of superseded content, deleted after the transfer (repeatable)
    #[arg(long = "replace", value_name = "KEY")]
    pub replaces: Vec<String>,

    /// Skip the derived thumbnail for video files
    #[arg(long)]
    pub no_thumbnail: bool,

    /// Override the content type guessed from the file extension
    #[arg(long)]
    pub content_type: Option<String>,
}

pub fn run(root: &Path, args: UploadArgs, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let http = http_client(&config)?;
    let deriver = Arc::new(FfmpegDeriver::new(
        config.upload.ffmpeg_path.clone(),
        config.upload.ffprobe_path.clone(),
    ));
    let coordinator = UploadCoordinator::new(http.clone(), http, deriver, config.upload.clone());
    let rt = runtime()?;

    rt.block_on(async move {
        let scope = ScopeId::section(&args.course, &args.section);
        let mut spec = UploadJobSpec::from_path(scope, &args.item, &args.file)
            .await
            .with_context(|| format!("failed to read {}", args.file.display()))?
            .replacing(args.replaces);
        if let Some(content_type) = args.content_type {
            spec.derive_thumbnail = spec.derive_thumbnail || content_type.starts_with("video/");
            spec.content_type = content_type;
        }
        if args.no_thumbnail {
            spec = spec.without_thumbnail();
        }

        let handle = coordinator.start(spec);
        let printer = (!json).then(|| {
            handle.on_progress(|p| {
                let mut err = std::io::stderr();
                let _ = write!(
                    err,
                    "\r{:<12} {:>3}%  {} / {}",
                    p.phase.as_str(),
                    p.percent,
                    human_bytes(p.uploaded_bytes),
                    human_bytes(p.total_bytes)
                );
                let _ = err.flush();
            })
        });

        let token = handle.cancel_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });

        let outcome = handle.result().await;
        interrupt.abort();
        if let Some(printer) = printer {
            let _ = printer.await;
            eprintln!();
        }

        match outcome.context("upload failed")? {
            UploadOutcome::Completed(content) => {
                if json {
                    print_json(&content)?;
                } else {
                    println!("Uploaded {} → {}", content.file_name, content.object_key);
                    if let Some(thumb) = &content.derived_thumbnail_key {
                        println!("Thumbnail  → {thumb}");
                    }
                    if let Some(duration) = content.duration {
                        println!("Duration   {duration:.1}s");
                    }
                }
            }
            UploadOutcome::Cancelled => {
                if json {
                    print_json(&serde_json::json!({ "cancelled": true }))?;
                } else {
                    println!("Upload cancelled; existing content left untouched.");
                }
            }
        }
        anyhow::Ok(())
    })
}
