use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand};
use plainipc_peer::Endpoint;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod chat;
pub mod listen;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and print received messages.
    Listen(ListenArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Host the demo chat service.
    Serve(ServeArgs),
    /// Call the demo chat service.
    Chat(ChatArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format).await,
        Command::Send(args) => send::run(args).await,
        Command::Serve(args) => serve::run(args).await,
        Command::Chat(args) => chat::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (tcp://host:port, unix:///path, pipe://name or a socket path).
    pub endpoint: Endpoint,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["json", "data", "file"])))]
pub struct SendArgs {
    /// Address to connect to.
    pub endpoint: Endpoint,
    /// JSON payload, sent as a string (or as a chat message with --object).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Text payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read a raw payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Send the payload as a typed object instead of a plain message.
    #[arg(long)]
    pub object: bool,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind.
    pub endpoint: Endpoint,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("action").required(true).multiple(true).args(["message", "history"])))]
pub struct ChatArgs {
    /// Address of a `plainipc serve` instance.
    pub endpoint: Endpoint,
    /// Message text to send.
    #[arg(long, short = 'm')]
    pub message: Option<String>,
    /// Sender name.
    #[arg(long, env = "PLAINIPC_CHAT_NAME", default_value = "anonymous")]
    pub from: String,
    /// Print the service's message history.
    #[arg(long)]
    pub history: bool,
    /// Deadline for connecting and for each call (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
