use plainipc::chat::{ChatClient, ChatMessage};
use plainipc_peer::{connect, IpcConfig};
use plainipc_transport::TransportConfig;

use crate::cmd::ChatArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_history, print_reply, OutputFormat};

pub async fn run(args: ChatArgs, format: OutputFormat) -> CliResult<i32> {
    let config = IpcConfig::default()
        .with_remote_timeout(args.timeout)
        .with_transport(TransportConfig::default().with_connect_timeout(args.timeout));
    let (handler, _events) = connect(&args.endpoint, config)
        .await
        .map_err(|err| peer_error("connect failed", err))?;
    let client = ChatClient::new(&handler);

    if let Some(text) = &args.message {
        let reply = client
            .send_message(&ChatMessage::new(args.from.as_str(), text.as_str()))
            .await
            .map_err(|err| peer_error("SendMessage failed", err))?;
        print_reply("SendMessage", &reply, format);
    }

    if args.history {
        let history = client
            .history()
            .await
            .map_err(|err| peer_error("History failed", err))?;
        print_history(&history, format);
    }

    handler
        .dispose()
        .await
        .map_err(|err| peer_error("close failed", err))?;
    Ok(SUCCESS)
}
