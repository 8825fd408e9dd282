// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A place the user has asked the assistant to remember (home, work, a
/// frequently-mentioned address, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPlace {
    pub label: String,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// One entry in the rolling chat log persisted to `chat_log.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLogEntry {
    /// `"you"`, `"assistant"`, or `"system"`.
    pub role: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// How many entries are kept on disk before older ones are dropped. Only a
/// short tail of this is ever injected into the prompt (see
/// [`UserProfile::recent_chat_log_lines`]); the rest exists so the history
/// survives restarts.
const MAX_PERSISTED_CHAT_LOG: usize = 500;

/// How many of the most recent entries are surfaced to the system prompt.
const PROMPT_CHAT_LOG_ENTRIES: usize = 20;

/// Per-entry truncation applied when slicing the chat log for the prompt.
const PROMPT_CHAT_LOG_ENTRY_CHARS: usize = 200;

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A user's persisted profile: preferences, saved places, chat history,
/// notification subscriptions, OAuth tokens, and shell-style input history.
///
/// Backed by one directory per profile, written as a handful of small files
/// (§6's persisted-profile-directory layout) rather than a single blob, so a
/// corrupt or missing file only loses that slice of state.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub name: String,
    pub dir: PathBuf,
    pub preferences: HashMap<String, String>,
    pub saved_places: Vec<SavedPlace>,
    pub chat_log: Vec<ChatLogEntry>,
    pub subscription_topics: Vec<String>,
    pub oauth_tokens: HashMap<String, String>,
    pub input_history: Vec<String>,
}

impl UserProfile {
    /// Root directory under which all profiles live, honouring `$MARVIN_HOME`
    /// and falling back to the XDG data directory.
    pub fn profiles_root() -> PathBuf {
        if let Ok(home) = std::env::var("MARVIN_HOME") {
            return PathBuf::from(home).join("profiles");
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("marvin")
            .join("profiles")
    }

    fn prefs_path(&self) -> PathBuf {
        self.dir.join("prefs.yaml")
    }
    fn saved_places_path(&self) -> PathBuf {
        self.dir.join("saved_places.json")
    }
    fn chat_log_path(&self) -> PathBuf {
        self.dir.join("chat_log.json")
    }
    fn ntfy_path(&self) -> PathBuf {
        self.dir.join("ntfy_subscriptions.json")
    }
    fn tokens_path(&self) -> PathBuf {
        self.dir.join("tokens.json")
    }
    fn history_path(&self) -> PathBuf {
        self.dir.join("history")
    }

    /// Start a fresh, empty profile rooted at `profiles_root/name`.
    pub fn new(profiles_root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            dir: profiles_root.join(name),
            preferences: HashMap::new(),
            saved_places: Vec::new(),
            chat_log: Vec::new(),
            subscription_topics: Vec::new(),
            oauth_tokens: HashMap::new(),
            input_history: Vec::new(),
        }
    }

    /// Load a profile from disk. Every file is read independently and
    /// tolerantly: a missing or corrupt file falls back to an empty default
    /// rather than failing the whole load, since losing e.g. the saved-places
    /// list should never block a session from starting.
    pub fn load(profiles_root: &Path, name: &str) -> Self {
        let mut profile = Self::new(profiles_root, name);

        profile.preferences = read_yaml_tolerant(&profile.prefs_path());
        profile.saved_places = read_json_tolerant(&profile.saved_places_path());
        profile.chat_log = read_json_tolerant(&profile.chat_log_path());
        profile.subscription_topics = read_json_tolerant(&profile.ntfy_path());
        profile.oauth_tokens = read_json_tolerant(&profile.tokens_path());
        profile.input_history = match std::fs::read_to_string(profile.history_path()) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        };

        profile
    }

    /// Persist every file. Each write is a full-file replace — there is no
    /// partial-write recovery, so callers should save after each turn rather
    /// than batching many turns into one save.
    pub fn save(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating profile directory {}", self.dir.display()))?;

        write_yaml(&self.prefs_path(), &self.preferences)?;
        write_json(&self.saved_places_path(), &self.saved_places)?;
        write_json(&self.chat_log_path(), &self.chat_log)?;
        write_json(&self.ntfy_path(), &self.subscription_topics)?;
        write_json(&self.tokens_path(), &self.oauth_tokens)?;
        std::fs::write(self.history_path(), self.input_history.join("\n"))
            .with_context(|| format!("writing {}", self.history_path().display()))?;

        Ok(())
    }

    /// Record the name of this profile as the sibling `last_profile` marker
    /// at the profiles root, so the next run with no explicit `--profile`
    /// flag resumes the same user.
    pub fn mark_as_last_used(&self, profiles_root: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(profiles_root)?;
        std::fs::write(profiles_root.join("last_profile"), &self.name)
            .with_context(|| "writing last_profile marker")
    }

    /// Read the sibling `last_profile` marker, if any.
    pub fn last_used(profiles_root: &Path) -> Option<String> {
        std::fs::read_to_string(profiles_root.join("last_profile"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Append a turn to the chat log, trimming to `MAX_PERSISTED_CHAT_LOG`
    /// entries from the tail.
    pub fn record_turn(&mut self, role: &str, text: &str) {
        self.chat_log.push(ChatLogEntry {
            role: role.to_string(),
            text: text.to_string(),
            timestamp: now(),
        });
        if self.chat_log.len() > MAX_PERSISTED_CHAT_LOG {
            let excess = self.chat_log.len() - MAX_PERSISTED_CHAT_LOG;
            self.chat_log.drain(0..excess);
        }
    }

    /// Append a line of free-form user input to the shell-style input
    /// history, deduplicating immediate repeats.
    pub fn record_input(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if self.input_history.last().map(String::as_str) != Some(line) {
            self.input_history.push(line.to_string());
        }
    }

    /// The last `PROMPT_CHAT_LOG_ENTRIES` chat-log entries, each truncated to
    /// `PROMPT_CHAT_LOG_ENTRY_CHARS` characters, formatted for injection into
    /// the system prompt (§4.9).
    pub fn recent_chat_log_lines(&self) -> Vec<String> {
        let start = self
            .chat_log
            .len()
            .saturating_sub(PROMPT_CHAT_LOG_ENTRIES);
        self.chat_log[start..]
            .iter()
            .map(|entry| {
                let truncated: String = entry
                    .text
                    .chars()
                    .take(PROMPT_CHAT_LOG_ENTRY_CHARS)
                    .collect();
                let suffix = if entry.text.chars().count() > PROMPT_CHAT_LOG_ENTRY_CHARS {
                    "…"
                } else {
                    ""
                };
                format!("{}: {}{}", entry.role, truncated, suffix)
            })
            .collect()
    }
}

fn read_yaml_tolerant<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_yaml::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "discarding unreadable profile file");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

fn read_json_tolerant<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "discarding unreadable profile file");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let text = serde_yaml::to_string(value)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "wrote profile file");
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "wrote profile file");
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
