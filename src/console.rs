//! Line-oriented terminal surface: one key (plus an id where needed) per line.

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::commands::Commands;
use crate::error::CommandError;
use crate::history::HistoryEvent;
use crate::models::RecordSummary;
use crate::notify::Notice;
use crate::{log_debug, log_warn};

// Set to true to log console plumbing
const ENABLE_LOGS: bool = true;

pub const HELP: &str = "\
  s        toggle monitoring
  c        toggle auto-copy of the remote path
  d        delete the newest record from history
  w        delete every record from history
  a        copy all remote paths
  l        list history
  p <id>   copy remote path of a record
  b <id>   copy a record as base64
  i <id>   copy a record as an image
  t        show status
  q        quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    ToggleMonitoring,
    ToggleAutoCopy,
    DeleteLast,
    DeleteAll,
    CopyAllPaths,
    List,
    CopyPath(u64),
    CopyBase64(u64),
    CopyImage(u64),
    Status,
    Help,
    Quit,
}

/// Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(key) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments in '{}'", line.trim()));
    }

    let id = |name: &str| -> Result<u64, String> {
        let raw = arg.ok_or_else(|| format!("'{name}' needs a record id"))?;
        raw.trim_start_matches('#')
            .parse()
            .map_err(|_| format!("'{raw}' is not a record id"))
    };
    let bare = |command: ConsoleCommand| match arg {
        None => Ok(Some(command)),
        Some(extra) => Err(format!("'{key}' takes no argument, got '{extra}'")),
    };

    match key.to_ascii_lowercase().as_str() {
        "s" => bare(ConsoleCommand::ToggleMonitoring),
        "c" => bare(ConsoleCommand::ToggleAutoCopy),
        "d" => bare(ConsoleCommand::DeleteLast),
        "w" => bare(ConsoleCommand::DeleteAll),
        "a" => bare(ConsoleCommand::CopyAllPaths),
        "l" => bare(ConsoleCommand::List),
        "t" => bare(ConsoleCommand::Status),
        "q" => bare(ConsoleCommand::Quit),
        "h" | "?" => bare(ConsoleCommand::Help),
        "p" => id("p").map(|id| Some(ConsoleCommand::CopyPath(id))),
        "b" => id("b").map(|id| Some(ConsoleCommand::CopyBase64(id))),
        "i" => id("i").map(|id| Some(ConsoleCommand::CopyImage(id))),
        other => Err(format!("unknown command '{other}' (h for help)")),
    }
}

/// Runs a command and returns the line to print.
pub fn execute(commands: &Commands, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::ToggleMonitoring => {
            if commands.toggle_monitoring() {
                "[ON] monitoring clipboard".into()
            } else {
                "[OFF] monitoring paused".into()
            }
        }
        ConsoleCommand::ToggleAutoCopy => {
            format!(
                "auto-copy {}",
                if commands.toggle_auto_copy() { "ON" } else { "OFF" }
            )
        }
        ConsoleCommand::DeleteLast => match commands.delete_last() {
            Some(id) => format!("removed #{id} (remote file kept)"),
            None => "no screenshots to delete".into(),
        },
        ConsoleCommand::DeleteAll => {
            let ids = commands.delete_all();
            if ids.is_empty() {
                "no screenshots to delete".into()
            } else {
                format!("removed {} screenshots (remote files kept)", ids.len())
            }
        }
        ConsoleCommand::CopyAllPaths => match commands.copy_all_paths() {
            Ok(count) => format!("copied {count} path{} to clipboard", plural(count)),
            Err(CommandError::Empty) => "no screenshots to copy".into(),
            Err(err) => format!("error: {err}"),
        },
        ConsoleCommand::List => {
            let rows = commands.list();
            if rows.is_empty() {
                "history is empty".into()
            } else {
                rows.iter().map(format_row).collect::<Vec<_>>().join("\n")
            }
        }
        ConsoleCommand::CopyPath(id) => match commands.copy_path(id) {
            Ok(text) => format!("copied {text}"),
            Err(err) => format!("error: {err}"),
        },
        ConsoleCommand::CopyBase64(id) => match commands.copy_base64(id) {
            Ok(len) => format!("copied #{id} as base64 ({len} chars)"),
            Err(err) => format!("error: {err}"),
        },
        ConsoleCommand::CopyImage(id) => match commands.copy_image(id) {
            Ok(()) => format!("copied #{id} as image"),
            Err(err) => format!("error: {err}"),
        },
        ConsoleCommand::Status => {
            let status = commands.status();
            let mut line = format!(
                "{} | monitoring {} | auto-copy {} | {} records",
                status.phase.label(),
                on_off(status.monitoring_enabled),
                on_off(status.auto_copy_enabled),
                commands.list().len()
            );
            if let Some(last) = commands.last() {
                line.push_str(&format!(" | last #{} {}", last.id, last.remote_path));
            }
            line
        }
        ConsoleCommand::Help => HELP.into(),
        ConsoleCommand::Quit => {
            commands.quit();
            "quitting after the current upload".into()
        }
    }
}

fn format_row(row: &RecordSummary) -> String {
    format!(
        "#{:<4} {}  {:>9}  {}",
        row.id,
        row.created_at.format("%H:%M:%S"),
        row.size_label,
        row.remote_path
    )
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

/// Reads stdin on a plain thread; blocking reads would otherwise hold up
/// runtime shutdown. The channel closes at end of input.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log_warn!("stdin read failed: {err}");
                    break;
                }
            }
        }
    });
    rx
}

/// Prints notices and history removals, and executes typed commands, until
/// `shutdown` fires. Ctrl-C counts as `q`.
pub async fn run_console(
    commands: Commands,
    mut lines: mpsc::UnboundedReceiver<String>,
    mut notices: mpsc::UnboundedReceiver<Notice>,
    mut events: broadcast::Receiver<HistoryEvent>,
    shutdown: CancellationToken,
) {
    let mut lines_open = true;
    let mut notices_open = true;
    let mut events_open = true;
    let mut interrupted = false;

    // Created once so a signal that lands while a branch body runs is not lost.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(err) = result {
                    log_warn!("cannot listen for Ctrl-C: {err}");
                } else {
                    println!("{}", execute(&commands, ConsoleCommand::Quit));
                }
            }
            line = lines.recv(), if lines_open => match line {
                Some(line) => match parse_command(&line) {
                    Ok(Some(command)) => println!("{}", execute(&commands, command)),
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                },
                None => {
                    log_debug!("stdin closed; monitor keeps running until interrupted");
                    lines_open = false;
                }
            },
            notice = notices.recv(), if notices_open => match notice {
                Some(notice) => println!("{notice}"),
                None => notices_open = false,
            },
            event = events.recv(), if events_open => match event {
                Ok(HistoryEvent::Removed(ids)) => log_debug!("history dropped {:?}", ids),
                Ok(HistoryEvent::Appended(id)) => log_debug!("history gained #{}", id),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log_debug!("history listener skipped {} events", missed)
                }
                Err(broadcast::error::RecvError::Closed) => events_open = false,
            },
        }
    }
}
