// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Placeholder tools that satisfy a mode-policy name contract (§4.6's
//! `coding`/`lockin` whitelists name `web search, wiki, stack, github read,
//! system info, notes, alarms, timers, calendar, downloads` by name, plus
//! `surf`'s entertainment tools) without shipping the external-API body
//! behind each one — those bodies are out of scope (§1). A stub always
//! returns an error naming itself as unimplemented so a model that calls one
//! gets an honest answer instead of a silent no-op.
use async_trait::async_trait;
use serde_json::{json, Value};

use marvin_config::ToolCategory;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// A tool that exists only for its name, description and category — gating
/// and schema enumeration work against it, but `execute` always refuses.
pub struct StubTool {
    name: &'static str,
    description: &'static str,
    category: ToolCategory,
}

impl StubTool {
    pub const fn new(name: &'static str, description: &'static str, category: ToolCategory) -> Self {
        Self { name, description, category }
    }

    /// The `always` reference/research tools named in the `coding` mode
    /// whitelist (§4.6), beyond `web_search` which already has a body.
    pub fn coding_whitelist() -> Vec<StubTool> {
        vec![
            StubTool::new("wiki", "Look up a topic on Wikipedia.", ToolCategory::Always),
            StubTool::new(
                "stack",
                "Search Stack Overflow / Stack Exchange for a question.",
                ToolCategory::Always,
            ),
            StubTool::new(
                "github_read",
                "Read a public GitHub repository's files, issues, or PRs.",
                ToolCategory::Always,
            ),
            StubTool::new(
                "system_info",
                "Report host OS, CPU, memory, and disk information.",
                ToolCategory::Always,
            ),
        ]
    }

    /// The productivity tools added in `lockin` mode (§4.6).
    pub fn lockin_productivity() -> Vec<StubTool> {
        vec![
            StubTool::new("notes", "Create or list personal notes.", ToolCategory::Always),
            StubTool::new("alarms", "Set or list alarms.", ToolCategory::Always),
            StubTool::new("timers", "Start or list timers.", ToolCategory::Always),
            StubTool::new("calendar", "Read or add calendar events.", ToolCategory::Always),
            StubTool::new("downloads", "List or manage downloaded files.", ToolCategory::Always),
        ]
    }

    /// `surf`-only entertainment tools, excluded again once `coding`/`lockin`
    /// apply their own whitelists (§4.6: `coding` starts from the `coding`
    /// category plus a fixed whitelist, not from `always` minus a
    /// blacklist, so these simply aren't in that whitelist).
    pub fn surf_entertainment() -> Vec<StubTool> {
        vec![
            StubTool::new("jokes", "Tell a joke.", ToolCategory::Always),
            StubTool::new("trivia", "Ask a trivia question.", ToolCategory::Always),
            StubTool::new("music_recommend", "Recommend music.", ToolCategory::Always),
        ]
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": true
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn category(&self) -> ToolCategory {
        self.category
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::err(
            &call.id,
            format!("{} is not implemented in this build", self.name),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{Tool, ToolCall};

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "s1".into(),
            name: name.into(),
            args: json!({}),
        }
    }

    #[tokio::test]
    async fn execute_always_errors_naming_itself() {
        let t = StubTool::new("wiki", "desc", ToolCategory::Always);
        let out = t.execute(&call("wiki")).await;
        assert!(out.is_error);
        assert!(out.content.contains("wiki"));
        assert!(out.content.contains("not implemented"));
    }

    #[test]
    fn coding_whitelist_has_expected_names() {
        let names: Vec<&str> = StubTool::coding_whitelist().iter().map(|t| t.name()).collect();
        assert!(names.contains(&"wiki"));
        assert!(names.contains(&"stack"));
        assert!(names.contains(&"github_read"));
        assert!(names.contains(&"system_info"));
    }

    #[test]
    fn lockin_productivity_has_expected_names() {
        let names: Vec<&str> = StubTool::lockin_productivity().iter().map(|t| t.name()).collect();
        assert!(names.contains(&"notes"));
        assert!(names.contains(&"alarms"));
        assert!(names.contains(&"timers"));
        assert!(names.contains(&"calendar"));
        assert!(names.contains(&"downloads"));
    }

    #[test]
    fn all_stubs_are_always_category() {
        for t in StubTool::coding_whitelist()
            .into_iter()
            .chain(StubTool::lockin_productivity())
            .chain(StubTool::surf_entertainment())
        {
            assert_eq!(t.category(), ToolCategory::Always);
        }
    }
}
