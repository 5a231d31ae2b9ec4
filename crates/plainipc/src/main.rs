mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::exit::{CliError, INTERNAL};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "plainipc", version, about = "Messages and remote calls between processes")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
        .and_then(|runtime| runtime.block_on(cmd::run(cli.command, format)));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use plainipc_peer::Endpoint;

    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "plainipc",
            "send",
            "tcp://127.0.0.1:7000",
            "--data",
            "hello",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.endpoint, Endpoint::Tcp("127.0.0.1:7000".into()));
                assert_eq!(args.data.as_deref(), Some("hello"));
                assert_eq!(args.timeout, Duration::from_secs(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "plainipc",
            "send",
            "/tmp/test.sock",
            "--json",
            "{\"x\":1}",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn send_requires_a_payload() {
        let err = Cli::try_parse_from(["plainipc", "send", "/tmp/test.sock"])
            .expect_err("missing payload should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = Cli::try_parse_from(["plainipc", "listen", "http://localhost:80"])
            .expect_err("unknown scheme should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_chat_subcommand() {
        let cli = Cli::try_parse_from([
            "plainipc",
            "chat",
            "unix:///tmp/chat.sock",
            "--message",
            "hi",
            "--from",
            "ada",
            "--timeout",
            "500ms",
        ])
        .expect("chat args should parse");

        match cli.command {
            Command::Chat(args) => {
                assert_eq!(args.message.as_deref(), Some("hi"));
                assert_eq!(args.from, "ada");
                assert_eq!(args.timeout, Duration::from_millis(500));
                assert!(!args.history);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn chat_requires_an_action() {
        let err = Cli::try_parse_from(["plainipc", "chat", "tcp://127.0.0.1:7000"])
            .expect_err("chat without action should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_serve_with_global_flags() {
        let cli = Cli::try_parse_from([
            "plainipc",
            "serve",
            "tcp://0.0.0.0:7000",
            "--log-format",
            "json",
            "--format",
            "pretty",
        ])
        .expect("serve args should parse");
        assert!(matches!(cli.command, Command::Serve(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
    }
}
