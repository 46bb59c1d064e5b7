//! Agentdeck - drive interactive command-line AI agents from a browser.
//!
//! The application bridges one WebSocket client to one pseudo-terminal
//! session per (project, agent) pair: the session registry and output
//! reader live in [`web::session_manager`], the wire protocol in
//! [`web::protocol`], and the axum surface in [`web::routes`].

pub mod cli;
pub mod config;
pub mod web;

pub use cli::Cli;
pub use config::Settings;
