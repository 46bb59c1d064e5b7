use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::web::{routes, session_manager::SessionManager};

/// Web server configuration.
pub struct WebServerConfig {
    pub bind_addr: SocketAddr,
    pub projects_dir: PathBuf,
    pub settings: Settings,
}

/// Web server instance.
pub struct WebServer {
    config: WebServerConfig,
    session_manager: Arc<SessionManager>,
}

impl WebServer {
    /// Create a new web server owning the session registry.
    pub fn new(config: WebServerConfig) -> Self {
        Self {
            config,
            session_manager: Arc::new(SessionManager::new()),
        }
    }

    /// Start the web server.
    pub async fn start(self) -> Result<()> {
        let app_state = routes::AppState {
            session_manager: self.session_manager.clone(),
            settings: Arc::new(self.config.settings),
            projects_dir: self.config.projects_dir,
        };

        let mut app = routes::create_router(app_state);

        // Browser frontends run on a different origin during development
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);

        println!("🌐 Agentdeck server starting on http://{}", self.config.bind_addr);
        println!(
            "   Terminal WebSocket: ws://{}/ws/terminal/{{project_id}}/{{agent}}",
            self.config.bind_addr
        );
        println!("   Session list: http://{}/api/terminals", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Get the session manager (for status surfaces outside the router).
    pub fn session_manager(&self) -> Arc<SessionManager> {
        self.session_manager.clone()
    }
}
