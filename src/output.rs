// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The non-interactive output contract (spec §6): raw text to stdout, tool
//! announcements as single lines, errors prefixed on stderr, and a mandatory
//! `MARVIN_COST:` trailer as the last line of stderr on every exit path.
use std::io::Write;

use marvin_core::AgentEvent;
use marvin_core::UsageTotals;
use serde::Serialize;

/// Write a raw text delta to stdout. No coloring, no injected newlines beyond
/// what the model produced.
pub fn write_stdout(text: &str) {
    let mut out = std::io::stdout();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

/// Announce a batch of tool calls starting in this round.
pub fn write_tool_announce(names: &[String]) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "  \u{1f527} {}", names.join(", "));
}

/// Write an error line to stderr, prefixed per the contract.
pub fn write_error(message: &str) {
    let mut err = std::io::stderr();
    let _ = writeln!(err, "Error: {message}");
}

#[derive(Serialize)]
struct CostLine<'a> {
    session_cost: f64,
    llm_turns: u64,
    model_turns: &'a std::collections::HashMap<String, u64>,
    model_cost: &'a std::collections::HashMap<String, f64>,
}

/// Emit the mandatory `MARVIN_COST:{json}` trailer. Must be the very last
/// line written to stderr, on both the success and error exit paths.
pub fn write_cost_line(totals: &UsageTotals) {
    let line = CostLine {
        session_cost: totals.session_cost,
        llm_turns: totals.turns,
        model_turns: &totals.model_turns,
        model_cost: &totals.model_cost,
    };
    let json = serde_json::to_string(&line).unwrap_or_else(|_| "{}".to_string());
    let mut err = std::io::stderr();
    let _ = writeln!(err, "MARVIN_COST:{json}");
}

/// Outcome of driving one non-interactive turn's event stream: the final
/// assistant text (if any), whether the turn ended in error, and the tokens
/// actually billed across every model round of the turn (a tool-call turn
/// makes several driver calls, each with its own `TokenUsage` event — the
/// usage tracker needs the sum, not just the last round's figures).
pub struct TurnOutcome {
    pub final_text: Option<String>,
    pub errored: bool,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Drive one non-interactive turn's event stream, writing to stdout/stderr
/// per the contract, and return the resulting `TurnOutcome`.
pub async fn drive_turn(mut rx: tokio::sync::mpsc::Receiver<AgentEvent>) -> TurnOutcome {
    let mut final_text: Option<String> = None;
    let mut errored = false;
    let mut input_tokens: u32 = 0;
    let mut output_tokens: u32 = 0;

    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::TextDelta(delta) => write_stdout(&delta),
            AgentEvent::TextComplete(text) => final_text = Some(text),
            AgentEvent::ThinkingDelta(_) | AgentEvent::ThinkingComplete(_) => {}
            AgentEvent::ToolCallStarted(call) => {
                write_tool_announce(std::slice::from_ref(&call.name));
            }
            AgentEvent::ToolCallFinished { .. } => {}
            AgentEvent::ContextCompacted { .. } => {}
            AgentEvent::TokenUsage { input, output, .. } => {
                input_tokens += input;
                output_tokens += output;
            }
            AgentEvent::TurnComplete => {}
            AgentEvent::Error(message) => {
                write_error(&message);
                errored = true;
            }
            AgentEvent::TodoUpdate(_) => {}
            AgentEvent::ModeChanged(_) => {}
            AgentEvent::Question { .. } | AgentEvent::QuestionAnswer { .. } => {}
            AgentEvent::Aborted { partial_text } => {
                final_text = Some(partial_text);
                errored = true;
            }
        }
    }

    TurnOutcome {
        final_text,
        errored,
        input_tokens,
        output_tokens,
    }
}
