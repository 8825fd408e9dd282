// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use marvin_config::AgentMode;

use crate::profile::UserProfile;

/// The fixed personality line every system prompt opens with.
const PERSONALITY_LINE: &str =
    "You are Marvin, a helpful assistant with a dry sense of humor and a deep reservoir of patience.";

/// All optional contextual blocks that can be injected into the system prompt.
///
/// Assembled, in order, per §4.9: personality line, profile name,
/// preferences, saved places, coding-mode instruction block, a slice of
/// recent chat-log entries, then active background jobs.
#[derive(Debug, Default)]
pub struct PromptContext<'a> {
    /// The active profile, if one has been loaded. `None` for a fresh,
    /// anonymous session.
    pub profile: Option<&'a UserProfile>,
    /// One-line descriptions of jobs currently running in the background
    /// (long shell commands, scheduled reminders, ...).
    pub background_jobs: &'a [String],
    /// Text appended verbatim after the assembled prompt.
    pub append: Option<&'a str>,
}

impl<'a> PromptContext<'a> {
    /// Return a version of this context with the volatile fields cleared.
    ///
    /// Used to build the *stable* (cacheable) portion of the system prompt.
    /// Profile identity and preferences are stable within a session; the
    /// chat-log slice and background-job list change turn to turn and are
    /// injected separately via [`PromptContext::dynamic_block`] so the stable
    /// prefix stays cache-friendly.
    pub fn stable_only(&self) -> Self {
        Self {
            profile: self.profile,
            background_jobs: &[],
            append: self.append,
        }
    }

    /// Format the volatile fields (chat-log slice + background jobs) as a
    /// block suitable for appending to the system prompt outside the cached
    /// region. Returns `None` when there is nothing volatile to inject.
    pub fn dynamic_block(&self) -> Option<String> {
        let chat_log_section = self
            .profile
            .map(|p| p.recent_chat_log_lines())
            .filter(|lines| !lines.is_empty())
            .map(|lines| format!("## Recent Conversation\n\n{}", lines.join("\n")));

        let jobs_section = if self.background_jobs.is_empty() {
            None
        } else {
            Some(format!(
                "## Active Background Jobs\n\n{}",
                self.background_jobs
                    .iter()
                    .map(|j| format!("- {j}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            ))
        };

        match (chat_log_section, jobs_section) {
            (None, None) => None,
            (Some(c), None) => Some(c),
            (None, Some(j)) => Some(j),
            (Some(c), Some(j)) => Some(format!("{c}\n\n{j}")),
        }
    }
}

fn build_profile_section(profile: &UserProfile) -> String {
    let mut lines = vec![format!("## Profile\n\nYou are talking with {}.", profile.name)];

    if !profile.preferences.is_empty() {
        let mut keys: Vec<&String> = profile.preferences.keys().collect();
        keys.sort_unstable();
        let formatted: Vec<String> = keys
            .into_iter()
            .map(|k| format!("- {k}: {}", profile.preferences[k]))
            .collect();
        lines.push(format!("\nPreferences:\n{}", formatted.join("\n")));
    }

    if !profile.saved_places.is_empty() {
        let formatted: Vec<String> = profile
            .saved_places
            .iter()
            .map(|p| format!("- {} ({}): {}", p.label, p.name, p.address))
            .collect();
        lines.push(format!("\nSaved places:\n{}", formatted.join("\n")));
    }

    lines.join("\n")
}

const CODING_MODE_INSTRUCTIONS: &str = "## Coding Mode\n\n\
     Coding tools are enabled for this session. You may read, write, and edit files, \
     run shell commands inside the sandboxed working directory, and search the \
     codebase. Always verify a change compiles or runs before reporting it done, and \
     never run destructive git operations (force-push, hard reset, history rewrite) \
     without the user explicitly asking for them.";

/// Build the system prompt for the given agent mode.
pub fn system_prompt(mode: AgentMode, custom: Option<&str>, ctx: PromptContext<'_>) -> String {
    if let Some(custom) = custom {
        if let Some(extra) = ctx.append {
            return format!("{}\n\n{}", custom.trim_end(), extra);
        }
        return custom.to_string();
    }

    let mode_line = format!("Operating mode: `{mode}`.");

    let profile_section = ctx
        .profile
        .map(build_profile_section)
        .map(|s| format!("\n\n{s}"))
        .unwrap_or_default();

    let coding_section = if matches!(mode, AgentMode::Coding) {
        format!("\n\n{CODING_MODE_INSTRUCTIONS}")
    } else {
        String::new()
    };

    let dynamic_section = ctx
        .dynamic_block()
        .map(|s| format!("\n\n{s}"))
        .unwrap_or_default();

    let append_section = ctx
        .append
        .map(|extra| format!("\n\n{extra}"))
        .unwrap_or_default();

    format!(
        "{PERSONALITY_LINE}\n\n{mode_line}{profile_section}{coding_section}{dynamic_section}{append_section}",
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
