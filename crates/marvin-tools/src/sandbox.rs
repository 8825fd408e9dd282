// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Path-sandbox invariants (§4.2): every filesystem-touching tool resolves
//! its path through [`resolve`] before reading, writing, or deleting
//! anything. Resolution rejects the request instead of silently narrowing
//! it — callers surface the [`DenialReason`] as a tool error.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Why a path was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The path contains a NUL byte.
    NulByte,
    /// The path contains a `..` component.
    ParentTraversal,
    /// The path is absolute, which is never permitted regardless of target.
    AbsolutePath,
    /// The path escapes the sandbox root after symlinks are resolved.
    SymlinkEscape,
    /// The path, once canonicalized, does not fall under the sandbox root.
    OutsideRoot,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NulByte => write!(f, "path contains a NUL byte"),
            DenialReason::ParentTraversal => write!(f, "path contains a '..' component"),
            DenialReason::AbsolutePath => write!(f, "absolute paths are not permitted"),
            DenialReason::SymlinkEscape => write!(f, "path escapes the sandbox root via a symlink"),
            DenialReason::OutsideRoot => write!(f, "path is outside the sandbox root"),
        }
    }
}

impl std::error::Error for DenialReason {}

/// Resolve `requested` (absolute or relative to `root`) to a canonical path
/// guaranteed to live under `root`.
///
/// Rules, checked in order:
/// 1. Reject any `..` component outright — lexical traversal is never
///    allowed, even if it would resolve back inside `root`.
/// 2. Reject a NUL byte anywhere in the path string.
/// 3. Reject an absolute path outright — every request is relative to
///    `root`, so there is no such thing as a permitted absolute target.
/// 4. Join the (now traversal-free, relative) path onto `root`.
/// 5. If the joined path exists, canonicalize it (resolving symlinks) and
///    re-check containment — a symlink planted inside the sandbox that
///    points outside it is rejected post-resolution, not just pre-resolution.
/// 6. If the joined path does not yet exist (e.g. a file about to be
///    created), canonicalize its parent instead and re-check containment.
pub fn resolve(root: &Path, requested: &str) -> Result<PathBuf, DenialReason> {
    if requested.as_bytes().contains(&0) {
        return Err(DenialReason::NulByte);
    }

    let requested_path = Path::new(requested);
    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(DenialReason::ParentTraversal);
        }
    }

    if requested_path.is_absolute() {
        return Err(DenialReason::AbsolutePath);
    }
    let joined = root.join(requested_path);

    let canonical_root = root.canonicalize().map_err(|_| DenialReason::OutsideRoot)?;

    if joined.exists() {
        let canonical = joined.canonicalize().map_err(|_| DenialReason::OutsideRoot)?;
        if !canonical.starts_with(&canonical_root) {
            return Err(DenialReason::SymlinkEscape);
        }
        Ok(canonical)
    } else {
        let parent = joined.parent().unwrap_or(&joined);
        let canonical_parent = if parent.as_os_str().is_empty() {
            canonical_root.clone()
        } else {
            parent.canonicalize().map_err(|_| DenialReason::OutsideRoot)?
        };
        if !canonical_parent.starts_with(&canonical_root) {
            return Err(DenialReason::OutsideRoot);
        }
        let file_name = joined
            .file_name()
            .ok_or(DenialReason::OutsideRoot)?;
        Ok(canonical_parent.join(file_name))
    }
}

/// True if `arg` looks like a command-line option rather than a path or
/// value — used by tools that shell out to `git`/external binaries to
/// refuse option-injection via a leading `-` (§4.2).
pub fn looks_like_option(arg: &str) -> bool {
    arg.starts_with('-') && arg != "-"
}

/// Strip provider credentials from a subprocess environment before exec
/// (§5): any `*_API_KEY` variable and `GITHUB_TOKEN`. Every shell/git/grep/
/// find spawn runs through this so a misbehaving command can't read the
/// keys the core process holds for provider calls.
pub fn scrub_env(cmd: &mut tokio::process::Command) {
    for (key, _) in std::env::vars() {
        if key.ends_with("_API_KEY") || key == "GITHUB_TOKEN" {
            cmd.env_remove(key);
        }
    }
}
