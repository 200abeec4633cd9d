//! Development server command.

use anyhow::Result;
use playpen_server::{DevServer, DevServerConfig};

use crate::config::Config;

/// Run the dev server.
pub async fn run(config: &Config, port: u16, open: bool) -> Result<()> {
    tracing::info!(
        "Starting playground for {} on port {}",
        config.project.dir.display(),
        port
    );

    let server_config = DevServerConfig {
        project_dir: config.project.dir.clone(),
        port,
        open,
        compiler: config.compiler(),
        preview: config.preview_config(),
        live: config.live_config(),
        ..Default::default()
    };

    DevServer::new(server_config).start().await?;

    Ok(())
}
