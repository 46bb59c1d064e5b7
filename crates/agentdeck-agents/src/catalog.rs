//! Known agent kinds and their launch configuration.
//!
//! All agents are configured for autonomous operation - no permission
//! prompts. Unknown or uninstalled agents fall back to a bash shell that
//! prints an install hint first, so the user sees a diagnostic in the
//! terminal rather than a failed connection.

use tracing::warn;

/// Executable and argument vector for a known agent kind.
#[derive(Debug, Clone, Copy)]
pub struct AgentCommand {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

/// Command actually handed to the pty spawner.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
    /// True when the agent executable was missing and a bannered shell
    /// was substituted.
    pub fallback: bool,
}

/// Look up the command for a known agent kind.
pub fn agent_command(agent: &str) -> Option<AgentCommand> {
    let command = match agent {
        // Skip all permission prompts
        "claude" => AgentCommand {
            program: "claude",
            args: &["--dangerously-skip-permissions"],
        },
        // Gemini uses environment variables for auto mode
        "gemini" => AgentCommand {
            program: "gemini",
            args: &[],
        },
        "codex" => AgentCommand {
            program: "codex",
            args: &[],
        },
        "qwen" => AgentCommand {
            program: "qwen",
            args: &[],
        },
        // Auto-approve all changes
        "aider" => AgentCommand {
            program: "aider",
            args: &["--yes", "--no-suggest-shell-commands"],
        },
        "bash" => AgentCommand {
            program: "bash",
            args: &[],
        },
        "python" => AgentCommand {
            program: "python3",
            args: &[],
        },
        _ => return None,
    };
    Some(command)
}

/// Installation hint for an agent whose executable is missing.
pub fn install_hint(agent: &str) -> String {
    match agent {
        "claude" => "npm install -g @anthropic-ai/claude-code".to_string(),
        "gemini" => "npm install -g @anthropic-ai/gemini-cli".to_string(),
        "aider" => "pip install aider-chat".to_string(),
        "codex" => "npm install -g @openai/codex".to_string(),
        "qwen" => "pip install qwen-cli".to_string(),
        _ => format!("Install the {} CLI", agent),
    }
}

/// Resolve the command to launch for `agent`.
///
/// A known, installed agent resolves to its real argv. A known agent whose
/// executable is not on PATH, or an unknown agent kind, resolves to a bash
/// shell that prints the install hint and then execs an interactive bash,
/// so the session still starts and the user sees what went wrong.
pub fn resolve_command(agent: &str) -> ResolvedCommand {
    if let Some(command) = agent_command(agent) {
        if which::which(command.program).is_ok() {
            return ResolvedCommand {
                program: command.program.to_string(),
                args: command.args.iter().map(|a| a.to_string()).collect(),
                fallback: false,
            };
        }
        warn!(agent, program = command.program, "agent executable not found on PATH");
    } else {
        warn!(agent, "unknown agent kind");
    }

    fallback_shell(agent)
}

/// Bash shell that prints a diagnostic banner before dropping into an
/// interactive shell.
fn fallback_shell(agent: &str) -> ResolvedCommand {
    let hint = install_hint(agent);
    let banner = format!(
        r#"
echo ""
echo "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
echo "  Agent '{agent}' is not installed"
echo "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
echo ""
echo "  To install, run:"
echo "    {hint}"
echo ""
echo "  Starting bash shell instead..."
echo ""
exec bash
"#
    );

    ResolvedCommand {
        program: "bash".to_string(),
        args: vec!["-c".to_string(), banner],
        fallback: true,
    }
}

/// Static environment that puts an agent into autonomous operation.
///
/// Model and provider credentials are layered on separately via
/// [`crate::model_env`].
pub fn static_env(agent: &str) -> &'static [(&'static str, &'static str)] {
    match agent {
        "claude" => &[
            // Mark as programmatic entry
            ("CLAUDE_CODE_ENTRYPOINT", "1"),
        ],
        "gemini" => &[
            ("GEMINI_AUTO_APPROVE", "true"),
            ("GEMINI_SANDBOX_RUN", "true"),
        ],
        "aider" => &[
            ("AIDER_AUTO_COMMITS", "true"),
            ("AIDER_YES", "true"),
            ("AIDER_AUTO_LINT", "true"),
        ],
        "codex" => &[("CODEX_AUTO_APPROVE", "true")],
        "qwen" => &[("QWEN_AUTO_RUN", "true")],
        _ => &[],
    }
}

/// Kickoff prompt sent to agents that support unattended operation,
/// shortly after the session starts. Agents without one are left idle
/// until the user types something.
pub fn kickoff_prompt(agent: &str) -> Option<&'static str> {
    match agent {
        "claude" => Some(
            "Read the CLAUDE.md file in this directory for project context and instructions. \
             Then autonomously start working on the fine-tuning task described there. \
             Create progress checkpoints, generate training code, and keep working until \
             the task is complete. Do not ask for permission - execute all necessary \
             operations autonomously.",
        ),
        "gemini" => Some(
            "Read the GEMINI.md file for project context and task instructions. \
             Start the fine-tuning workflow autonomously. Generate code, run training, \
             and report progress. Execute all operations without asking for confirmation.",
        ),
        "aider" => Some(
            "Read the project context from README.md and any .md files. \
             Start implementing the fine-tuning code autonomously. \
             Commit changes as you go and keep working until complete.",
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_agents_have_commands() {
        for agent in ["claude", "gemini", "codex", "qwen", "aider", "bash", "python"] {
            assert!(agent_command(agent).is_some(), "missing command for {agent}");
        }
    }

    #[test]
    fn unknown_agent_has_no_command() {
        assert!(agent_command("ghost").is_none());
    }

    #[test]
    fn unknown_agent_resolves_to_bannered_shell() {
        let resolved = resolve_command("ghost");
        assert!(resolved.fallback);
        assert_eq!(resolved.program, "bash");
        assert_eq!(resolved.args[0], "-c");
        assert!(resolved.args[1].contains("Agent 'ghost' is not installed"));
        assert!(resolved.args[1].contains("Install the ghost CLI"));
        assert!(resolved.args[1].contains("exec bash"));
    }

    #[test]
    fn missing_executable_banner_carries_install_hint() {
        let shell = fallback_shell("aider");
        assert!(shell.args[1].contains("pip install aider-chat"));
    }

    #[test]
    fn bash_resolves_directly() {
        // bash is present on any system these tests run on
        let resolved = resolve_command("bash");
        assert!(!resolved.fallback);
        assert_eq!(resolved.program, "bash");
        assert!(resolved.args.is_empty());
    }

    #[test]
    fn static_env_tables() {
        assert_eq!(static_env("claude"), &[("CLAUDE_CODE_ENTRYPOINT", "1")]);
        assert!(static_env("gemini")
            .iter()
            .any(|(k, v)| *k == "GEMINI_AUTO_APPROVE" && *v == "true"));
        assert!(static_env("bash").is_empty());
        assert!(static_env("ghost").is_empty());
    }

    #[test]
    fn kickoff_prompts_only_for_autonomous_agents() {
        assert!(kickoff_prompt("claude").is_some());
        assert!(kickoff_prompt("gemini").is_some());
        assert!(kickoff_prompt("aider").is_some());
        assert!(kickoff_prompt("bash").is_none());
        assert!(kickoff_prompt("codex").is_none());
        assert!(kickoff_prompt("ghost").is_none());
    }
}
