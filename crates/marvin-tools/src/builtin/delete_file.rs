// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use marvin_config::ToolCategory;

use crate::policy::ApprovalPolicy;
use crate::sandbox;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct DeleteFileTool {
    pub root: PathBuf,
}

impl Default for DeleteFileTool {
    fn default() -> Self {
        Self { root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")) }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a single file. Fails gracefully if not found. NEVER delete without explicit user request.\n\
         Permanent — no recovery. For directories use the shell tool with rm -r."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to delete"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Coding
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!(
                        "missing required parameter 'path'. Received: {}",
                        args_preview
                    ),
                );
            }
        };

        debug!(path = %path, "delete_file tool");

        let resolved = match sandbox::resolve(&self.root, &path) {
            Ok(p) => p,
            Err(reason) => return ToolOutput::err(&call.id, format!("{path}: {reason}")),
        };

        // Refuse to delete directories
        match tokio::fs::metadata(&resolved).await {
            Ok(m) if m.is_dir() => {
                return ToolOutput::err(
                    &call.id,
                    format!(
                        "{path} is a directory; use the shell tool with 'rm -rf' instead"
                    ),
                );
            }
            Err(e) => return ToolOutput::err(&call.id, format!("stat error: {e}")),
            Ok(_) => {}
        }

        match tokio::fs::remove_file(&resolved).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("deleted {path}")),
            Err(e) => ToolOutput::err(&call.id, format!("delete error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{Tool, ToolCall};

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "d1".into(),
            name: "delete_file".into(),
            args,
        }
    }

    fn tool_in(dir: &std::path::Path) -> DeleteFileTool {
        DeleteFileTool { root: dir.to_path_buf() }
    }

    fn tmp_dir(name: &str) -> PathBuf {
        let d = std::env::temp_dir().join(format!("marvin_delete_file_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&d);
        std::fs::create_dir_all(&d).unwrap();
        d
    }

    #[tokio::test]
    async fn deletes_existing_file() {
        let dir = tmp_dir("basic");
        std::fs::write(dir.join("a.txt"), "bye").unwrap();
        let t = tool_in(&dir);
        let out = t.execute(&call(json!({"path": "a.txt"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("deleted"));
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let dir = tmp_dir("missing");
        let t = tool_in(&dir);
        let out = t.execute(&call(json!({"path": "no_such_file.txt"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn directory_is_error() {
        let dir = tmp_dir("directory");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        let t = tool_in(&dir);
        let out = t.execute(&call(json!({"path": "sub"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("directory"));
    }

    #[tokio::test]
    async fn missing_file_path_is_error() {
        let dir = tmp_dir("missing_param");
        let t = tool_in(&dir);
        let out = t.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing required parameter 'path'"));
    }

    #[test]
    fn requires_coding_category_and_confirmation() {
        let t = DeleteFileTool::default();
        assert_eq!(t.category(), ToolCategory::Coding);
        assert!(t.requires_confirmation());
    }

    #[tokio::test]
    async fn rejects_parent_traversal() {
        let dir = tmp_dir("sandbox");
        let t = tool_in(&dir);
        let out = t.execute(&call(json!({"path": "../escape.txt"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("'..'"));
    }
}
