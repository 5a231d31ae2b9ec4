use std::fs;

use plainipc::chat::ChatMessage;
use plainipc_peer::{connect, IpcConfig, IpcHandler};

use crate::cmd::SendArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS, USAGE};

/// What goes on the wire for one `send` invocation.
#[derive(Debug, PartialEq)]
enum Payload {
    Raw(Vec<u8>),
    Text(String),
    TextObject(String),
    ChatObject(ChatMessage),
    BytesObject(Vec<u8>),
}

pub async fn run(args: SendArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let config = IpcConfig::default().with_transport(
        plainipc_transport::TransportConfig::default().with_connect_timeout(args.timeout),
    );
    let (handler, _events) = connect(&args.endpoint, config)
        .await
        .map_err(|err| peer_error("connect failed", err))?;

    send_payload(&handler, &payload)
        .await
        .map_err(|err| peer_error("send failed", err))?;
    handler
        .dispose()
        .await
        .map_err(|err| peer_error("close failed", err))?;

    Ok(SUCCESS)
}

async fn send_payload(handler: &IpcHandler, payload: &Payload) -> plainipc_peer::Result<()> {
    match payload {
        Payload::Raw(data) => handler.send_raw(data).await,
        Payload::Text(text) => handler.send_string(text).await,
        Payload::TextObject(text) => handler.send_object(text).await,
        Payload::ChatObject(message) => handler.send_object(message).await,
        Payload::BytesObject(data) => handler.send_object(data).await,
    }
}

fn resolve_payload(args: &SendArgs) -> CliResult<Payload> {
    if let Some(json) = &args.json {
        if args.object {
            let message: ChatMessage = serde_json::from_str(json).map_err(|err| {
                CliError::new(
                    USAGE,
                    format!("--json with --object must be a chat message {{\"from\",\"text\"}}: {err}"),
                )
            })?;
            return Ok(Payload::ChatObject(message));
        }
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(Payload::Text(json.clone()));
    }
    if let Some(data) = &args.data {
        return Ok(if args.object {
            Payload::TextObject(data.clone())
        } else {
            Payload::Text(data.clone())
        });
    }
    if let Some(path) = &args.file {
        let data = fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return Ok(if args.object {
            Payload::BytesObject(data)
        } else {
            Payload::Raw(data)
        });
    }
    Err(CliError::new(USAGE, "one of --json, --data or --file is required"))
}
