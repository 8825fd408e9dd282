// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

use marvin_config::AgentMode;

#[derive(Parser, Debug)]
#[command(
    name = "marvin",
    about = "An interactive assistant that dispatches model-initiated tool calls through a sandboxed local registry",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional initial prompt or task description. Treated as the prompt
    /// when `--prompt` is not given.
    #[arg(value_name = "PROMPT")]
    pub prompt_arg: Option<String>,

    /// Run a single turn and exit, writing to the non-interactive output
    /// contract (see the module docs on `output`) instead of starting the
    /// interactive loop.
    #[arg(long, short = 'n')]
    pub non_interactive: bool,

    /// Directory the session operates from (sandbox root for file/shell tools).
    #[arg(long, value_name = "PATH")]
    pub working_dir: Option<PathBuf>,

    /// Run a single design-only turn: coding-mode instructions are still
    /// applied, but the caller is expected to review before further turns.
    #[arg(long)]
    pub design_first: bool,

    /// The prompt text for a non-interactive run. A bare trailing argument
    /// is used instead when this is absent.
    #[arg(long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Ntfy.sh topic to notify on turn completion.
    #[arg(long, value_name = "TOPIC")]
    pub ntfy: Option<String>,

    /// Agent operating mode.
    #[arg(long, short = 'm', value_enum)]
    pub mode: Option<AgentMode>,

    /// Model provider to use.
    #[arg(long, short = 'P', value_name = "NAME")]
    pub provider: Option<String>,

    /// Model id to use, e.g. "gpt-4o" or "provider/model-name".
    #[arg(long, short = 'M', env = "MARVIN_MODEL")]
    pub model: Option<String>,

    /// Use the plain readline interactive surface (default).
    #[arg(long)]
    pub plain: bool,

    /// Use the curses interactive surface. Accepted and parsed; rendering is
    /// out of scope for this core, so this falls back to `--plain`.
    #[arg(long)]
    pub curses: bool,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Override the system prompt by reading from a file. The file contents
    /// are used verbatim instead of the built-in prompt assembly.
    #[arg(long, value_name = "PATH")]
    pub system_prompt_file: Option<PathBuf>,

    /// Append text after the assembled system prompt (or after the file
    /// content when `--system-prompt-file` is also given).
    #[arg(long, value_name = "TEXT")]
    pub append_system_prompt: Option<String>,

    /// Write the final assistant message to a file after the run completes.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output_last_message: Option<PathBuf>,

    /// Profile name to load/save under the profiles root. Defaults to the
    /// last-used profile, or "default" if none has run yet.
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Increase verbosity (-v = debug, -vv = trace). Routed to stderr below
    /// the cost line in non-interactive mode.
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the effective configuration and exit.
    ShowConfig,
    /// List saved conversations for the active profile.
    Chats {
        /// Maximum number of conversations to show.
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },
    /// List models in the static catalog, optionally filtered by provider.
    ListModels {
        #[arg(long, short = 'p')]
        provider: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List all recognized model provider drivers.
    ListProviders {
        #[arg(long, short = 'v')]
        verbose: bool,
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Resolve the effective prompt text: `--prompt` takes priority over the
    /// bare trailing argument (§6).
    pub fn effective_prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .or(self.prompt_arg.as_deref())
    }

    /// Whether this invocation should use the non-interactive output
    /// contract: the explicit flag, or either stream not being a terminal.
    pub fn is_non_interactive(&self) -> bool {
        self.non_interactive || !stdin_is_tty() || !stdout_is_tty()
    }
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "marvin", &mut std::io::stdout());
}

fn stdin_is_tty() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        unsafe { libc::isatty(std::io::stdin().as_raw_fd()) != 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn stdout_is_tty() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        unsafe { libc::isatty(std::io::stdout().as_raw_fd()) != 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
