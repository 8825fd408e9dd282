// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Gating helpers for [`marvin_config::ToolCategory`] and
//! [`marvin_config::AgentMode`] (§4.3, §4.6).

use marvin_config::{AgentMode, ToolCategory};

/// Whether `mode` grants `coding`-category tools. Only `surf` withholds them;
/// `coding` and `lockin` both allow the full coding toolset.
pub fn coding_mode(mode: AgentMode) -> bool {
    mode != AgentMode::Surf
}

/// Gating decision for a single tool category given the session's coding
/// flag. `always` and `readonly` are always permitted; `coding` requires
/// `coding_mode` to be true.
pub fn is_permitted(category: ToolCategory, coding_mode: bool) -> bool {
    match category {
        ToolCategory::Always | ToolCategory::ReadOnly => true,
        ToolCategory::Coding => coding_mode,
    }
}
