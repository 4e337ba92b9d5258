//! CLI command building logic for subprocess transport

use std::collections::HashMap;
use std::env;
use std::path::Path;
use tokio::process::Command;

use crate::types::permissions::PermissionMode;

use super::config::{DANGEROUS_ENV_VARS, ENTRYPOINT, LaunchMode, LaunchOptions};

/// Command builder for Claude CLI
///
/// The prompt is never placed on the command line; it is always written to
/// the process's standard input.
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    options: &'a LaunchOptions,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub const fn new(cli_path: &'a Path, options: &'a LaunchOptions) -> Self {
        Self { cli_path, options }
    }

    /// Argument list for the configured launch
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--print".to_string()];

        if self.options.mode == LaunchMode::StreamJson {
            args.extend(
                [
                    "--output-format",
                    "stream-json",
                    "--verbose",
                    "--input-format",
                    "stream-json",
                ]
                .map(String::from),
            );
            // Tool approvals come back to us as control requests
            if self.options.permission_mode != PermissionMode::BypassPermissions {
                args.push("--permission-prompt-tool".to_string());
                args.push("stdio".to_string());
            }
        }

        args.push("--permission-mode".to_string());
        args.push(self.options.permission_mode.as_flag().to_string());

        if self.options.continue_conversation {
            args.push("--continue".to_string());
        }

        if let Some(ref session_id) = self.options.resume {
            args.push("--resume".to_string());
            args.push(session_id.as_str().to_string());
        }

        if let Some(ref model) = self.options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        args
    }

    /// Build the complete CLI command with arguments and environment
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);
        cmd.args(self.args());

        let mut process_env = env::vars().collect::<HashMap<_, _>>();
        for (key, value) in &self.options.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                log::warn!("Ignoring protected environment variable {key}");
                continue;
            }
            process_env.insert(key.clone(), value.clone());
        }
        process_env.insert("CLAUDE_CODE_ENTRYPOINT".to_string(), ENTRYPOINT.to_string());

        if let Some(ref cwd) = self.options.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().to_string());
            cmd.current_dir(cwd);
        }

        cmd.envs(process_env);
        cmd
    }
}
