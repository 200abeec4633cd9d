//! Create a playground project.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use playpen_bundler::starter_project;

use crate::config::{Config, DEFAULT_CONFIG};

/// Run the init command.
pub async fn run(config: &Config, config_path: &Path, dir: Option<PathBuf>, yes: bool) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.project.dir.clone());
    tracing::info!("Initializing playground in {}...", dir.display());

    if !init_project(&dir, config_path, yes)? {
        return Ok(());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'playpen dev' to start the playground.");

    Ok(())
}

/// Write the starter project and default config. Returns false when the
/// project already exists and `yes` was not given.
fn init_project(dir: &Path, config_path: &Path, yes: bool) -> Result<bool> {
    let occupied = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);

    if occupied && !yes {
        tracing::warn!(
            "{} already exists and is not empty. Use --yes to overwrite.",
            dir.display()
        );
        return Ok(false);
    }

    let project = starter_project();
    project
        .write_to_dir(dir)
        .with_context(|| format!("Failed to write starter project to {}", dir.display()))?;
    for path in project.paths() {
        tracing::info!("Created {}{}", dir.display(), path);
    }

    if !config_path.exists() || yes {
        fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        tracing::info!("Created {}", config_path.display());
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_starter_project_and_config() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("playground");
        let config_path = temp.path().join("playpen.toml");

        assert!(init_project(&dir, &config_path, false).unwrap());

        assert!(dir.join("src/main.ts").is_file());
        assert!(dir.join("src/AppPage.ts").is_file());
        assert!(dir.join("tsconfig.json").is_file());
        assert_eq!(fs::read_to_string(&config_path).unwrap(), DEFAULT_CONFIG);
    }

    #[test]
    fn refuses_to_overwrite_without_yes() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("playground");
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("src/main.ts"), "mine").unwrap();
        let config_path = temp.path().join("playpen.toml");

        assert!(!init_project(&dir, &config_path, false).unwrap());
        assert_eq!(fs::read_to_string(dir.join("src/main.ts")).unwrap(), "mine");
        assert!(!config_path.exists());

        assert!(init_project(&dir, &config_path, true).unwrap());
        assert_ne!(fs::read_to_string(dir.join("src/main.ts")).unwrap(), "mine");
    }
}
