//! Convert command - one-shot conversion of a local file

use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{ConversionMode, ConversionOutcome, DocumentUpload};
use crate::infrastructure::logging::init_logging;

/// Rate limit bucket used for local conversions
const CLI_CLIENT_ID: &str = "cli";

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// PDF or image file to convert
    pub file: PathBuf,

    /// Use the lighter model and shorter prompt
    #[arg(long)]
    pub fast: bool,

    /// Write the Markdown here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run a single conversion through the same service the server uses
pub async fn run(args: ConvertArgs) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let service = crate::create_conversion_service(&config)?;
    let upload = read_upload(&args.file).await?;
    let mode = ConversionMode::from_fast_flag(args.fast);

    let outcome = service
        .convert(CLI_CLIENT_ID, upload, mode)
        .await
        .with_context(|| format!("Failed to convert {}", args.file.display()))?;

    info!(
        title = %outcome.record.metadata.title,
        pages = outcome.record.metadata.total_pages,
        completeness = outcome.record.quality.completeness_percent,
        tier = %outcome.record.quality.quality_tier,
        "Conversion finished"
    );

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &outcome.record.markdown)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}", summary(&outcome, path));
        }
        None => print!("{}", outcome.record.markdown),
    }

    Ok(())
}

async fn read_upload(path: &Path) -> anyhow::Result<DocumentUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(DocumentUpload::new(file_name, None, Bytes::from(bytes)))
}

fn summary(outcome: &ConversionOutcome, path: &Path) -> String {
    let quality = &outcome.record.quality;

    format!(
        "Wrote {} ({} pages, {}% complete, {} quality, {} mode)",
        path.display(),
        outcome.record.metadata.total_pages,
        quality.completeness_percent,
        quality.quality_tier,
        outcome.mode
    )
}
