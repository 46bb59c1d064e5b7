use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentdeck::web::server::{WebServer, WebServerConfig};
use agentdeck::{Cli, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let bind_addr: SocketAddr = format!("{}:{}", cli.bind, cli.port)
        .parse()
        .context("invalid bind address")?;

    let settings = Settings::load(&cli.settings_file);

    let server = WebServer::new(WebServerConfig {
        bind_addr,
        projects_dir: cli.projects_dir,
        settings,
    });
    server.start().await
}
