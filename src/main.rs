// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod output;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use marvin_config::AgentMode;
use marvin_core::{Agent, AgentEvent, UsageTracker, UserProfile};
use marvin_tools::events::{TodoItem, ToolEvent};
use marvin_tools::{
    ApplyPatchTool, AskQuestionTool, DeleteFileTool, EditFileTool, FindFileTool,
    GitTool, GlobFileSearchTool, GrepTool, ListDirTool, ReadFileTool, ReadLintsTool,
    SearchCodebaseTool, ShellTool, StubTool, SwitchModeTool, TodoWriteTool, ToolRegistry,
    UpdateMemoryTool, WebFetchTool, WebSearchTool, WriteTool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.is_non_interactive());

    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                return Ok(());
            }
            Commands::ShowConfig => {
                let config = marvin_config::load(cli.config.as_deref())?;
                println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
                return Ok(());
            }
            Commands::Chats { limit } => {
                print_chats(&cli, *limit)?;
                return Ok(());
            }
            Commands::ListModels { provider, json } => {
                return list_models_cmd(provider.as_deref(), *json);
            }
            Commands::ListProviders { verbose, json } => {
                return list_providers_cmd(*verbose, *json);
            }
        }
    }

    let config = marvin_config::load(cli.config.as_deref())?;
    let non_interactive = cli.is_non_interactive();

    if non_interactive {
        let exit_code = run_non_interactive(&cli, config).await?;
        std::process::exit(exit_code);
    } else {
        run_interactive(&cli, config).await
    }
}

/// Build the model config to use for this run, applying `--provider`/`--model`
/// overrides through the registry-aware resolver (spec §4.4/§6).
fn resolve_model_config(cli: &Cli, config: &marvin_config::Config) -> marvin_config::ModelConfig {
    let override_str = match (&cli.provider, &cli.model) {
        (Some(provider), Some(model)) => Some(format!("{provider}/{model}")),
        (None, Some(model)) => Some(model.clone()),
        (Some(provider), None) => Some(provider.clone()),
        (None, None) => None,
    };
    match override_str {
        Some(spec) => marvin_model::resolve_model_from_config(config, &spec),
        None => config.model.clone(),
    }
}

/// Resolve the system prompt override: `--system-prompt-file` contents, with
/// `--append-system-prompt` tacked on after, falling back to the config's
/// `agent.system_prompt` when neither flag is given.
fn resolve_system_prompt_override(
    cli: &Cli,
    config: &marvin_config::Config,
) -> anyhow::Result<Option<String>> {
    if let Some(path) = &cli.system_prompt_file {
        let mut text = std::fs::read_to_string(path)
            .with_context(|| format!("reading system prompt file {}", path.display()))?;
        if let Some(append) = &cli.append_system_prompt {
            text.push_str(append);
        }
        Ok(Some(text))
    } else {
        Ok(config.agent.system_prompt.clone())
    }
}

async fn build_agent(
    cli: &Cli,
    config: &marvin_config::Config,
) -> anyhow::Result<(Agent, UserProfile)> {
    let model_cfg = resolve_model_config(cli, config);
    let provider = marvin_model::from_config(&model_cfg)
        .with_context(|| format!("constructing model provider '{}'", model_cfg.provider))?;
    let model: Arc<dyn marvin_model::ModelProvider> = Arc::from(provider);
    let max_ctx = model.catalog_context_window().unwrap_or(128_000) as usize;

    let mut agent_config = config.agent.clone();
    if let Some(prompt) = resolve_system_prompt_override(cli, config)? {
        agent_config.system_prompt = Some(prompt);
    }
    if let Some(mode) = cli.mode {
        agent_config.default_mode = mode;
    }

    let profiles_root = UserProfile::profiles_root();
    let profile_name = cli
        .profile
        .clone()
        .or_else(|| UserProfile::last_used(&profiles_root))
        .unwrap_or_else(|| "default".to_string());
    let profile = UserProfile::load(&profiles_root, &profile_name);

    let mode_lock = Arc::new(Mutex::new(agent_config.default_mode));
    let (tool_tx, tool_rx) = mpsc::channel::<ToolEvent>(64);
    let todos: Arc<Mutex<Vec<TodoItem>>> = Arc::new(Mutex::new(Vec::new()));

    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool);
    registry.register(WriteTool);
    registry.register(EditFileTool);
    registry.register(DeleteFileTool);
    registry.register(ListDirTool);
    registry.register(GrepTool);
    registry.register(FindFileTool);
    registry.register(GlobFileSearchTool);
    registry.register(ApplyPatchTool);
    registry.register(ReadLintsTool);
    registry.register(SearchCodebaseTool);
    registry.register(ShellTool::default());
    registry.register(GitTool::default());
    registry.register(WebFetchTool);
    registry.register(WebSearchTool {
        api_key: config.tools.web.search.api_key.clone(),
    });
    registry.register(UpdateMemoryTool::default());
    registry.register(AskQuestionTool::new_headless());
    registry.register(TodoWriteTool::new(todos, tool_tx.clone()));
    registry.register(SwitchModeTool::new(mode_lock.clone(), tool_tx));
    for stub in StubTool::coding_whitelist() {
        registry.register(stub);
    }
    for stub in StubTool::lockin_productivity() {
        registry.register(stub);
    }
    for stub in StubTool::surf_entertainment() {
        registry.register(stub);
    }

    let agent = Agent::new(
        model,
        Arc::new(registry),
        Arc::new(agent_config),
        Some(profile.clone()),
        mode_lock,
        tool_rx,
        max_ctx,
    );

    Ok((agent, profile))
}

async fn run_non_interactive(cli: &Cli, config: marvin_config::Config) -> anyhow::Result<i32> {
    let prompt = cli.effective_prompt().map(|s| s.to_string());
    let prompt = match prompt {
        Some(p) => p,
        None => {
            output::write_error("no prompt given: pass --prompt or a bare trailing argument");
            let totals = UsageTracker::load(&UserProfile::profiles_root()).totals().clone();
            output::write_cost_line(&totals);
            return Ok(1);
        }
    };

    let (mut agent, profile) = build_agent(cli, &config).await?;
    let mut tracker = UsageTracker::load(&profile.dir);

    let (tx, rx) = mpsc::channel::<AgentEvent>(256);
    let drive = tokio::spawn(output::drive_turn(rx));
    let submit_result = agent.submit(&prompt, tx).await;

    let output::TurnOutcome {
        final_text,
        mut errored,
        input_tokens,
        output_tokens,
    } = drive.await.unwrap_or(output::TurnOutcome {
        final_text: None,
        errored: true,
        input_tokens: 0,
        output_tokens: 0,
    });
    if let Err(e) = submit_result {
        output::write_error(&e.to_string());
        errored = true;
    }

    tracker.record_turn(&config.model.name, input_tokens as u64, output_tokens as u64);
    let _ = tracker.save();

    if let (Some(path), Some(text)) = (&cli.output_last_message, &final_text) {
        if let Err(e) = std::fs::write(path, text) {
            output::write_error(&format!("writing {}: {e}", path.display()));
            errored = true;
        }
    }

    let _ = profile.mark_as_last_used(&UserProfile::profiles_root());
    output::write_cost_line(tracker.totals());

    Ok(if errored { 1 } else { 0 })
}

/// Minimal plain readline loop. The curses surface and the full interactive
/// feature set (resuming saved conversations, slash commands) are terminal UI
/// concerns out of scope for this core; this exists so the binary is usable
/// interactively without a TUI dependency.
async fn run_interactive(cli: &Cli, config: marvin_config::Config) -> anyhow::Result<()> {
    if cli.curses {
        eprintln!("[marvin] --curses is not implemented in this build; falling back to --plain.");
    }

    let (mut agent, profile) = build_agent(cli, &config).await?;
    let mut tracker = UsageTracker::load(&profile.dir);

    println!("marvin — plain interactive mode. Ctrl-D to exit.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        let n = stdin.lock().read_line(&mut line)?;
        if n == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
        let mut turn_input_tokens: u32 = 0;
        let mut turn_output_tokens: u32 = 0;
        let drain = async {
            while let Some(event) = rx.recv().await {
                match event {
                    AgentEvent::TextDelta(delta) => {
                        print!("{delta}");
                        io::stdout().flush().ok();
                    }
                    AgentEvent::TextComplete(_) => println!(),
                    AgentEvent::Error(message) => eprintln!("Error: {message}"),
                    AgentEvent::ToolCallStarted(call) => println!("  \u{1f527} {}", call.name),
                    AgentEvent::TokenUsage { input, output, .. } => {
                        turn_input_tokens += input;
                        turn_output_tokens += output;
                    }
                    _ => {}
                }
            }
        };
        let (submit_result, _) = tokio::join!(agent.submit(line, tx), drain);
        if let Err(e) = submit_result {
            eprintln!("Error: {e}");
        }
        tracker.record_turn(
            &config.model.name,
            turn_input_tokens as u64,
            turn_output_tokens as u64,
        );
    }

    let _ = tracker.save();
    let _ = profile.mark_as_last_used(&UserProfile::profiles_root());
    Ok(())
}

fn print_chats(_cli: &Cli, limit: usize) -> anyhow::Result<()> {
    let profiles_root = UserProfile::profiles_root();
    let profile_name =
        UserProfile::last_used(&profiles_root).unwrap_or_else(|| "default".to_string());
    let profile = UserProfile::load(&profiles_root, &profile_name);
    let entries = profile.recent_chat_log_lines();
    if entries.is_empty() {
        println!("No saved conversation entries found for profile '{profile_name}'.");
        return Ok(());
    }
    for line in entries.into_iter().take(limit) {
        println!("{line}");
    }
    Ok(())
}

fn list_models_cmd(provider_filter: Option<&str>, as_json: bool) -> anyhow::Result<()> {
    if let Some(prov) = provider_filter {
        if marvin_model::get_driver(prov).is_none() {
            eprintln!("Unknown provider: {prov:?}");
            eprintln!("\nAvailable providers (run `marvin list-providers` for details):");
            for d in marvin_model::list_drivers() {
                eprintln!("  {:20} {}", d.id, d.name);
            }
            anyhow::bail!("Invalid provider: {prov}");
        }
    }

    let mut entries = marvin_model::catalog::static_catalog();
    if let Some(prov) = provider_filter {
        entries.retain(|e| e.provider == prov);
    }
    entries.sort_by(|a, b| a.provider.cmp(&b.provider).then(a.id.cmp(&b.id)));

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    let id_w = entries.iter().map(|e| e.id.len()).max().unwrap_or(10).max(10);
    let prov_w = entries
        .iter()
        .map(|e| e.provider.len())
        .max()
        .unwrap_or(8)
        .max(8);
    println!(
        "{:<id_w$}  {:<prov_w$}  {:>12}  {:>16}",
        "ID",
        "PROVIDER",
        "CTX WINDOW",
        "MAX OUT TOKENS",
        id_w = id_w,
        prov_w = prov_w,
    );
    println!("{}", "-".repeat(id_w + prov_w + 40));
    for e in &entries {
        println!(
            "{:<id_w$}  {:<prov_w$}  {:>12}  {:>16}",
            e.id,
            e.provider,
            e.context_window,
            e.max_output_tokens,
            id_w = id_w,
            prov_w = prov_w,
        );
    }
    println!("\nTotal: {} model(s)", entries.len());
    Ok(())
}

fn list_providers_cmd(verbose: bool, as_json: bool) -> anyhow::Result<()> {
    let drivers = marvin_model::list_drivers();

    if as_json {
        #[derive(serde::Serialize)]
        struct ProviderJson {
            id: &'static str,
            name: &'static str,
            description: &'static str,
            default_api_key_env: Option<&'static str>,
            default_base_url: Option<&'static str>,
            requires_api_key: bool,
        }
        let rows: Vec<ProviderJson> = drivers
            .iter()
            .map(|d| ProviderJson {
                id: d.id,
                name: d.name,
                description: d.description,
                default_api_key_env: d.default_api_key_env,
                default_base_url: d.default_base_url,
                requires_api_key: d.requires_api_key,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Supported Model Providers ({} total)\n", drivers.len());
    if verbose {
        for d in drivers {
            println!("  {} — {}", d.id, d.name);
            println!("    {}", d.description);
            if let Some(env) = d.default_api_key_env {
                println!("    API key env : {env}");
            }
            if let Some(url) = d.default_base_url {
                println!("    Default URL : {url}");
            }
            println!();
        }
    } else {
        for d in drivers {
            println!("{:<12}  {}", d.id, d.name);
        }
    }
    Ok(())
}

fn init_logging(verbosity: u8, non_interactive: bool) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if non_interactive {
        // Logging must stay below the mandatory MARVIN_COST trailer, so
        // route it to stderr only when verbosity was explicitly raised.
        if verbosity == 0 {
            return;
        }
    }

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
