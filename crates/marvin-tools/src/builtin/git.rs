// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `git` — run a single git subcommand against a working tree (§4.2).
//!
//! Flags and positional arguments are kept in separate schema fields rather
//! than one flat `args` list: `flags` are passed through as-is (they're
//! supposed to start with `-`), while every `paths` entry is checked with
//! [`sandbox::looks_like_option`] before exec and rejected if it starts with
//! `-` — a path smuggled in as `--upload-pack=...` or `-oProxyCommand=...`
//! would otherwise be reinterpreted by git as a flag. `GIT_DIR` is cleared
//! in the child environment so a pre-existing value can't redirect the
//! command at a different repository, and provider API keys are scrubbed
//! the same way as every other subprocess tool.
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use marvin_config::ToolCategory;

use crate::policy::ApprovalPolicy;
use crate::sandbox;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const OUTPUT_LIMIT_BYTES: usize = 20_000;

pub struct GitTool {
    pub timeout_secs: u64,
}

impl Default for GitTool {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[async_trait]
impl Tool for GitTool {
    fn name(&self) -> &str {
        "git"
    }

    fn description(&self) -> &str {
        "Run a single git subcommand (status, diff, log, add, commit, branch, show, ...) in a working tree.\n\
         subcommand: the git verb, e.g. 'diff'. flags: recognized git flags, e.g. ['--stat'].\n\
         paths: file paths or refs passed positionally — any entry starting with '-' is rejected.\n\
         For cloning a fresh repository use shell; this tool operates on an existing working tree."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subcommand": {
                    "type": "string",
                    "description": "git verb, e.g. 'status', 'diff', 'log', 'add', 'commit'"
                },
                "flags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Flags for the subcommand, e.g. ['--short'] (optional)"
                },
                "paths": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Positional arguments: paths, refs, commit messages (optional)"
                },
                "workdir": {
                    "type": "string",
                    "description": "Working directory (optional, defaults to cwd)"
                }
            },
            "required": ["subcommand", "workdir"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }
    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::Coding
    }
    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let subcommand = match call.args.get("subcommand").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return ToolOutput::err(&call.id, "missing required parameter 'subcommand'"),
        };
        let flags: Vec<String> = call
            .args
            .get("flags")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let paths: Vec<String> = call
            .args
            .get("paths")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let workdir = call
            .args
            .get("workdir")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        for path in &paths {
            if sandbox::looks_like_option(path) {
                return ToolOutput::err(
                    &call.id,
                    format!("path argument '{path}' looks like an option and was rejected"),
                );
            }
        }

        debug!(subcommand = %subcommand, flags = ?flags, paths = ?paths, "git tool");

        let mut cmd = tokio::process::Command::new("git");
        cmd.arg(&subcommand).args(&flags);
        if !paths.is_empty() {
            cmd.arg("--").args(&paths);
        }
        cmd.stdin(std::process::Stdio::null());
        cmd.kill_on_drop(true);
        cmd.env_remove("GIT_DIR");
        sandbox::scrub_env(&mut cmd);
        if let Some(wd) = &workdir {
            cmd.current_dir(wd);
        }

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut content = String::new();
                content.push_str(&truncate(&stdout));
                if !stderr.is_empty() {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str("[stderr]\n");
                    content.push_str(&truncate(&stderr));
                }
                if content.is_empty() {
                    content = format!("[exit {}]", output.status.code().unwrap_or(-1));
                }
                if output.status.success() {
                    ToolOutput::ok(&call.id, content)
                } else {
                    let code = output.status.code().unwrap_or(-1);
                    ToolOutput::err(&call.id, format!("[exit {code}]\n{content}"))
                }
            }
            Ok(Err(e)) => ToolOutput::err(&call.id, format!("spawn error: {e}")),
            Err(_) => ToolOutput::err(&call.id, format!("timeout after {}s", self.timeout_secs)),
        }
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        s.to_string()
    } else {
        format!("{}...[truncated]", &s[..OUTPUT_LIMIT_BYTES])
    }
}
