use std::path::PathBuf;

use clap::Parser;

/// CLI arguments for agentdeck
#[derive(Parser, Debug)]
#[command(name = "agentdeck")]
#[command(about = "Agentdeck - drive interactive CLI AI agents from the browser")]
#[command(version)]
pub struct Cli {
    /// Address to bind the web server to
    #[arg(long, default_value = "0.0.0.0", value_name = "ADDR")]
    pub bind: String,

    /// Port for the web server
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Directory holding per-project working directories
    #[arg(long, value_name = "PATH", default_value = "./projects")]
    pub projects_dir: PathBuf,

    /// Settings file supplying model configuration for agents
    #[arg(long, value_name = "PATH", default_value = "./settings.json")]
    pub settings_file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["agentdeck"]);
        assert_eq!(cli.bind, "0.0.0.0");
        assert_eq!(cli.port, 8000);
        assert_eq!(cli.projects_dir, PathBuf::from("./projects"));
    }

    #[test]
    fn overrides() {
        let cli = Cli::parse_from([
            "agentdeck",
            "--bind",
            "127.0.0.1",
            "--port",
            "9100",
            "--projects-dir",
            "/srv/projects",
        ]);
        assert_eq!(cli.bind, "127.0.0.1");
        assert_eq!(cli.port, 9100);
        assert_eq!(cli.projects_dir, PathBuf::from("/srv/projects"));
    }
}
