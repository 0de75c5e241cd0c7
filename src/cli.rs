//! Command-line interface and REPL

use anyhow::{anyhow, bail, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

use crate::actions::{Action, LoopMode};
use crate::gateway::Gateway;
use crate::sync::PollOutcome;

/// A parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Action(Action),
    Vars(Option<String>),
    Var(String),
    Buttons,
    Feedbacks,
    Poll,
    Status,
    Help,
    Quit,
}

fn arg<T: std::str::FromStr>(args: &[&str], index: usize, name: &str) -> Result<T> {
    let raw = args
        .get(index)
        .ok_or_else(|| anyhow!("missing <{}>", name))?;
    raw.parse()
        .map_err(|_| anyhow!("invalid <{}>: {}", name, raw))
}

fn opt_arg<T: std::str::FromStr>(args: &[&str], index: usize, name: &str) -> Result<Option<T>> {
    if args.len() > index {
        arg(args, index, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Parse one input line; `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = parts.split_first() else {
        return Ok(None);
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "play" => ReplCommand::Action(Action::Play { button: arg(args, 0, "button")? }),
        "stop" => ReplCommand::Action(Action::Stop { button: arg(args, 0, "button")? }),
        "toggle" => ReplCommand::Action(Action::Toggle { button: arg(args, 0, "button")? }),
        "pause" => ReplCommand::Action(Action::Pause { button: arg(args, 0, "button")? }),
        "select" => ReplCommand::Action(Action::SelectClip { button: arg(args, 0, "button")? }),
        "fade" => ReplCommand::Action(Action::Fade {
            button: arg(args, 0, "button")?,
            seconds: opt_arg(args, 1, "seconds")?.unwrap_or(3.0),
        }),
        "page" => ReplCommand::Action(Action::ChangePage { page: arg(args, 0, "page")? }),
        "stopall" | "stop-all" => ReplCommand::Action(Action::StopAll),
        "next" => ReplCommand::Action(Action::Next),
        "goto" => ReplCommand::Action(Action::GotoTime {
            button: arg(args, 0, "button")?,
            seconds: arg(args, 1, "seconds")?,
        }),
        "volume" => ReplCommand::Action(Action::SetVolume {
            button: arg(args, 0, "button")?,
            percent: arg(args, 1, "percent")?,
        }),
        "loop" => {
            let mode = match args.get(1).map(|s| s.to_ascii_lowercase()).as_deref() {
                None | Some("toggle") => LoopMode::Toggle,
                Some("on") => LoopMode::On,
                Some("off") => LoopMode::Off,
                Some(other) => bail!("invalid <mode>: {} (on, off, toggle)", other),
            };
            ReplCommand::Action(Action::SetLoop {
                button: arg(args, 0, "button")?,
                mode,
            })
        },
        "fullscreen" => ReplCommand::Action(Action::ToggleFullscreen),
        "screen" => ReplCommand::Action(Action::MoveOutput { screen: arg(args, 0, "screen")? }),
        "vars" => ReplCommand::Vars(args.first().map(|s| s.to_string())),
        "var" => ReplCommand::Var(arg(args, 0, "id")?),
        "buttons" => ReplCommand::Buttons,
        "feedbacks" => ReplCommand::Feedbacks,
        "poll" => ReplCommand::Poll,
        "status" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("unknown command: {} (type 'help')", other),
    };
    Ok(Some(command))
}

fn print_help() {
    println!("{}", "Actions:".bold());
    println!("  play|stop|toggle|pause|select <button>");
    println!("  fade <button> [seconds]     goto <button> <seconds>");
    println!("  volume <button> <percent>   loop <button> [on|off|toggle]");
    println!("  page <n>   stopall   next   fullscreen   screen <id>");
    println!("{}", "Inspect:".bold());
    println!("  vars [prefix]   var <id>   buttons   feedbacks   poll   status");
    println!("  quit");
}

/// Run the interactive REPL until `quit` or EOF
///
/// Blocking; call from `spawn_blocking` with a handle to the runtime.
pub fn run_repl(gateway: Arc<Gateway>, runtime: tokio::runtime::Handle) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("{}", "vplay-gw REPL - type 'help' for commands".cyan());

    loop {
        let line = match rl.readline("vplay> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = rl.add_history_entry(line.as_str());

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{} {}", "✗".red(), e);
                continue;
            },
        };

        match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Action(action) => match runtime.block_on(gateway.execute(&action)) {
                Ok(response) => println!("{} {} {}", "✓".green(), action.name(), response),
                Err(e) => println!("{} {}: {}", "✗".red(), action.name(), e),
            },
            ReplCommand::Vars(prefix) => {
                for (id, value) in gateway.surface().variables(prefix.as_deref()) {
                    println!("  {} = {}", id.yellow(), value);
                }
            },
            ReplCommand::Var(id) => match gateway.surface().variable(&id) {
                Some(value) => println!("  {} = {}", id.yellow(), value),
                None => println!("  {} {}", id.yellow(), "(not published)".dimmed()),
            },
            ReplCommand::Buttons => {
                for (n, status) in gateway.store().entries() {
                    println!(
                        "  {:>3} {:<8} {} / {}  {}{}",
                        n,
                        status.state().as_str().green(),
                        crate::timecode::format_short(status.current_time()),
                        crate::timecode::format_short(status.remaining()),
                        status.label(),
                        if status.is_looping() { " ⟳" } else { "" },
                    );
                }
            },
            ReplCommand::Feedbacks => {
                for (id, state) in gateway.surface().feedback_states() {
                    let value = match state.value {
                        Some(true) => "true".green(),
                        Some(false) => "false".red(),
                        None => "?".dimmed(),
                    };
                    println!("  {} = {}  {:?}", id.yellow(), value, state.feedback);
                }
            },
            ReplCommand::Poll => match runtime.block_on(gateway.poll_now()) {
                PollOutcome::Applied(report) => println!(
                    "{} {} button(s), active clip: {}",
                    "✓".green(),
                    report.buttons,
                    report
                        .active_clip
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "none".into())
                ),
                other => println!("{} {:?}", "✗".red(), other),
            },
            ReplCommand::Status => {
                let stats = gateway.poller().stats();
                println!("  device:     {}", gateway.device_url());
                println!("  connection: {}", gateway.connection_status());
                println!(
                    "  polling:    {}",
                    match gateway.poller().interval() {
                        Some(period) => format!("every {}ms", period.as_millis()),
                        None => "stopped".to_string(),
                    }
                );
                println!(
                    "  polls:      {} applied, {} failed, {} skipped",
                    stats.applied, stats.failed, stats.skipped
                );
                if let Some(at) = stats.last_success {
                    println!("  last ok:    {}", at.format("%H:%M:%S"));
                }
            },
        }
    }

    Ok(())
}
