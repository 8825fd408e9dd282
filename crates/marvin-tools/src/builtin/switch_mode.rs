// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use marvin_config::{AgentMode, ToolCategory};

use crate::events::ToolEvent;
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct SwitchModeTool {
    current_mode: Arc<Mutex<AgentMode>>,
    event_tx: mpsc::Sender<ToolEvent>,
}

impl SwitchModeTool {
    pub fn new(current_mode: Arc<Mutex<AgentMode>>, event_tx: mpsc::Sender<ToolEvent>) -> Self {
        Self { current_mode, event_tx }
    }
}

#[async_trait]
impl Tool for SwitchModeTool {
    fn name(&self) -> &str { "switch_mode" }

    fn description(&self) -> &str {
        "Switch the agent's operating mode to match the current task type.\n\n\
         ## Modes\n\
         - 'surf': Browsing and conversation. No file writes, no sandbox-heavy tools.\n\
         - 'coding': Read/write files, run shell and git commands, edit code.\n\
         - 'lockin': Coding plus productivity tools (notes, alarms, timers, calendar, downloads).\n\n\
         ## When to Switch\n\
         - surf → coding: the task needs file edits or commands\n\
         - coding → lockin: the task needs the productivity tools too\n\
         - coding/lockin → surf: back to browsing/conversation only\n\n\
         ## IMPORTANT\n\
         - Any mode may switch to any other mode; the target mode's own tool\n\
           set determines what becomes available, not the direction of the switch.\n\
         - Switch proactively when the task type changes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "enum": ["surf", "coding", "lockin"],
                    "description": "Target mode to switch to"
                }
            },
            "required": ["mode"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy { ApprovalPolicy::Auto }

    fn category(&self) -> ToolCategory { ToolCategory::Always }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let mode_str = match call.args.get("mode").and_then(|v| v.as_str()) {
            Some(m) => m.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'mode'"),
        };

        let target = match mode_str.as_str() {
            "surf" => AgentMode::Surf,
            "coding" => AgentMode::Coding,
            "lockin" => AgentMode::Lockin,
            other => return ToolOutput::err(&call.id, format!("unknown mode: {other}")),
        };

        let current = *self.current_mode.lock().await;

        debug!(from = ?current, to = ?target, "switch_mode tool");

        if current == target {
            return ToolOutput::ok(&call.id, format!("already in {mode_str} mode"));
        }

        *self.current_mode.lock().await = target;
        let _ = self.event_tx.send(ToolEvent::ModeChanged(target)).await;

        ToolOutput::ok(&call.id, format!("switched to {target} mode"))
    }
}
