// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use marvin_config::AgentMode;
use serde_json::Value;

use crate::category::{coding_mode, is_permitted};
use crate::{Tool, ToolCall, ToolOutput};

/// A tool schema – mirrors marvin_model::ToolSchema but keeps tools crate
/// independent from the model crate.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry holding all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

// SAFETY: ToolRegistry is Sync because:
// - HashMap<String, Arc<dyn Tool>> is Sync (String is Sync, Arc<T: Send + Sync> is Sync)
// - Tools implement Send + Sync (required by the Tool trait)
// - No interior mutability exists after construction (all methods take &self)
// - Parallel tool execution is safe because tools are immutable after registration
unsafe impl Sync for ToolRegistry {}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Produce schemas for ALL registered tools (mode-unfiltered).
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| ToolSchema {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters_schema(),
        }).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Produce schemas only for tools whose category is permitted in the
    /// given mode (§4.3 Gating, §4.6 mode policies).
    pub fn schemas_for_mode(&self, mode: AgentMode) -> Vec<ToolSchema> {
        let coding = coding_mode(mode);
        let mut schemas: Vec<ToolSchema> = self.tools.values()
            .filter(|t| is_permitted(t.category(), coding))
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute an already-structured tool call, with no gating check. Used
    /// directly by tests and by callers that have already resolved gating.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => ToolOutput::err(
                &call.id,
                format!("unknown tool: {}", call.name),
            ),
        }
    }

    /// Full dispatch path (§4.3 Execution): resolve the tool, gate on its
    /// category against `coding_mode`, deserialize the model's raw argument
    /// string via [`deserialize_args`], then execute. Handler errors are
    /// caught and formatted uniformly rather than propagated.
    pub async fn execute_raw(
        &self,
        id: &str,
        name: &str,
        raw_args: &str,
        coding_mode: bool,
    ) -> ToolOutput {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => return ToolOutput::err(id, format!("unknown tool: {name}")),
        };

        if !is_permitted(tool.category(), coding_mode) {
            return ToolOutput::err(
                id,
                format!("tool '{name}' is not available outside coding mode"),
            );
        }

        let args = match deserialize_args(raw_args) {
            Ok(v) => v,
            Err(msg) => return ToolOutput::err(id, msg),
        };

        let call = ToolCall { id: id.to_string(), name: name.to_string(), args };
        tool.execute(&call).await
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn names_for_mode(&self, mode: AgentMode) -> Vec<String> {
        let coding = coding_mode(mode);
        let mut names: Vec<String> = self.tools.values()
            .filter(|t| is_permitted(t.category(), coding))
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self { Self::new() }
}

/// Parse the model's raw argument string into a JSON object (§4.3, §6, §9).
///
/// Three shapes are accepted:
/// 1. A literal patch body (`*** Begin Patch` / `*** Update File` prefix) is
///    routed as `{"patch": rawArgs}` without further parsing — this is the
///    sniff the Codex patch format relies on (§9).
/// 2. A plain JSON object.
/// 3. A double-stringified JSON object: the first parse yields a JSON
///    string, which is itself parsed; only accepted if that second parse
///    yields an object.
///
/// Anything else is an error naming the tool and a ≤200-char prefix of the
/// offending input.
pub fn deserialize_args(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with("*** Begin Patch") || trimmed.starts_with("*** Update File") {
        return Ok(serde_json::json!({ "patch": raw }));
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::Object(map)) => Ok(Value::Object(map)),
            _ => Err(invalid_args_error(raw)),
        },
        _ => Err(invalid_args_error(raw)),
    }
}

fn invalid_args_error(raw: &str) -> String {
    let prefix: String = raw.chars().take(200).collect();
    format!("invalid arguments: expected a JSON object, got: {prefix}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
