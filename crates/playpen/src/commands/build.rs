//! Standalone preview build command.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use playpen_bundler::{BundleResult, Compile, VirtualFileStore};
use playpen_preview::{MemorySurface, PreviewDocument, PreviewHost};

use crate::config::Config;

/// Compile the project and wrap it in a preview document.
pub async fn build_document(
    config: &Config,
    project: &Path,
    entry: Option<&str>,
) -> Result<PreviewDocument> {
    let files = VirtualFileStore::from_dir(project)
        .with_context(|| format!("Run 'playpen init' to create {}", project.display()))?;

    let entry = entry.or(config.project.entry.as_deref());
    let code = match config.compiler().compile(&files, entry).await {
        BundleResult::Success { code } => code,
        BundleResult::Failure { error } => anyhow::bail!("Compilation failed:\n{}", error),
    };

    let mut host = PreviewHost::new(Arc::new(MemorySurface::new()), config.preview_config());
    let id = host.present(&code).await?;
    host.surface()
        .document(id)
        .context("Preview frame was released before it could be written")
}

/// Run the build command.
pub async fn run(config: &Config, output: PathBuf, entry: Option<String>) -> Result<()> {
    tracing::info!("Building {}...", config.project.dir.display());
    let started = Instant::now();

    let document = build_document(config, &config.project.dir, entry.as_deref()).await?;

    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let index = output.join("index.html");
    fs::write(&index, document.as_str())
        .with_context(|| format!("Failed to write {}", index.display()))?;

    tracing::info!(
        "Built preview ({} bytes) in {}ms",
        document.len(),
        started.elapsed().as_millis()
    );
    tracing::info!("Output: {}", index.display());

    Ok(())
}
