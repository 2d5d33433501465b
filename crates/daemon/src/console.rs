//! Line-oriented front end for `vertex run`.
//!
//! Stands in for the tray menu: show the pin list, add or remove a CID, quit.
//! Generic over the reader and writer so tests can drive it in memory.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::companion::Companion;
use crate::node::NodeStatus;
use crate::process::utils::cancelled;

const HELP: &str = "commands:
  list          show the pin list
  add <cid>     add a CID to the pin list and pin it
  rm <cid>      remove a CID from the pin list and unpin it
  sync          re-pin everything in the pin list
  status        show the IPFS daemon status
  help          show this message
  quit          stop the daemon and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Add(String),
    Remove(String),
    Sync,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (type `help` for commands)", self.0)
    }
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(ParseError(format!("too many arguments to `{}`", verb)));
        }

        let with_cid = |cmd: fn(String) -> Self| match arg {
            Some(cid) => Ok(Some(cmd(cid.to_string()))),
            None => Err(ParseError(format!("`{}` needs a CID", verb))),
        };
        let bare = |cmd: Self| match arg {
            None => Ok(Some(cmd)),
            Some(_) => Err(ParseError(format!("`{}` takes no arguments", verb))),
        };

        match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => bare(Self::List),
            "add" => with_cid(Self::Add),
            "rm" | "remove" => with_cid(Self::Remove),
            "sync" => bare(Self::Sync),
            "status" => bare(Self::Status),
            "help" | "?" => bare(Self::Help),
            "quit" | "exit" => bare(Self::Quit),
            other => Err(ParseError(format!("unknown command `{}`", other))),
        }
    }
}

/// Read commands until `quit`, end of input, or an external shutdown.
///
/// `quit` and end of input both send on `shutdown_tx` so the rest of the
/// process winds down with the console.
pub async fn run<R, W>(
    companion: &Companion,
    input: R,
    mut output: W,
    shutdown_tx: watch::Sender<()>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut lines = input.lines();

    write_out(&mut output, "tz-vertex ready, type `help` for commands").await?;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = cancelled(&mut shutdown_rx) => return Ok(()),
        };

        let Some(line) = line else {
            tracing::debug!("console input closed");
            break;
        };

        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                write_out(&mut output, &e.to_string()).await?;
                continue;
            }
        };

        if command == ConsoleCommand::Quit {
            break;
        }

        let reply = execute(companion, command).await;
        write_out(&mut output, &reply).await?;
    }

    write_out(&mut output, "shutting down").await?;
    let _ = shutdown_tx.send(());
    Ok(())
}

async fn execute(companion: &Companion, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::List => {
            let pins = companion.get_pin_list().await;
            if pins.is_empty() {
                "pin list is empty".to_string()
            } else {
                pins.join("\n")
            }
        }
        ConsoleCommand::Add(cid) => match companion.add_cid(&cid).await {
            Ok(true) => format!("added {}", cid),
            Ok(false) => format!("{} is already in the pin list, re-pinning", cid),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Remove(cid) => match companion.remove_cid(&cid).await {
            Ok(true) => format!("removed {}", cid),
            Ok(false) => format!("{} is not in the pin list", cid),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Sync => match companion.resync_pins().await {
            Ok(n) => format!("re-pinning {} CIDs", n),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Status => match companion.node_status().await {
            NodeStatus::NotStarted => "IPFS daemon: adopted (not managed)".to_string(),
            NodeStatus::Running { pid: Some(pid) } => format!("IPFS daemon: running (pid {})", pid),
            NodeStatus::Running { pid: None } => "IPFS daemon: running".to_string(),
            NodeStatus::Exited { code: Some(code) } => format!("IPFS daemon: exited ({})", code),
            NodeStatus::Exited { code: None } => "IPFS daemon: exited".to_string(),
        },
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => String::new(),
    }
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
