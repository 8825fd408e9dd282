// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `apply_patch` — the registry's argument deserializer (§4.3, §9) sniffs a
//! raw argument string starting with `*** Begin Patch` / `*** Update File`
//! and routes it here as `{"patch": rawArgs}` without attempting JSON parsing.
//! Capturing that format is required; applying it is explicitly out of scope
//! (§9) — the handler always reports it as unimplemented so the model falls
//! back to `edit_file` or `write` instead of silently failing on bad JSON.
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use marvin_config::ToolCategory;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct ApplyPatchTool;

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str { "apply_patch" }

    fn description(&self) -> &str {
        "Not implemented. The Codex *** Begin Patch format is detected but not applied — \
         use edit_file for unified-diff hunks or write to replace a whole file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patch": {
                    "type": "string",
                    "description": "Raw patch text in the *** Begin Patch format"
                }
            },
            "required": ["patch"]
        })
    }

    fn default_policy(&self) -> ApprovalPolicy { ApprovalPolicy::Ask }
    fn category(&self) -> ToolCategory { ToolCategory::Coding }
    fn requires_confirmation(&self) -> bool { true }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        debug!("apply_patch tool invoked (unimplemented format)");
        ToolOutput::err(
            &call.id,
            "apply_patch does not implement the Codex patch format. Use edit_file (unified diff \
             hunks) or write (whole-file replacement) instead.",
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{Tool, ToolCall};

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "ap1".into(), name: "apply_patch".into(), args }
    }

    #[tokio::test]
    async fn always_reports_unimplemented() {
        let t = ApplyPatchTool;
        let out = t.execute(&call(json!({"patch": "*** Begin Patch\n*** End Patch\n"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("does not implement"));
    }

    #[test]
    fn requires_coding_category_and_confirmation() {
        let t = ApplyPatchTool;
        assert_eq!(t.category(), ToolCategory::Coding);
        assert!(t.requires_confirmation());
    }
}
