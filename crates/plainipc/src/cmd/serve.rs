use std::sync::Arc;

use plainipc::chat::{ChatMessage, ChatService};
use plainipc_peer::{ErrorEventCode, IpcConfig, IpcEvent, IpcEvents, IpcHandler, IpcListener};
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};

pub async fn run(args: ServeArgs) -> CliResult<i32> {
    let listener = IpcListener::bind(&args.endpoint, IpcConfig::default())
        .await
        .map_err(|err| peer_error("bind failed", err))?;
    let chat = Arc::new(ChatService::new());

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = tokio::signal::ctrl_c() => {
                info!(connections = listener.accepted(), "shutting down");
                return Ok(SUCCESS);
            }
        };
        let (handler, events) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        handler
            .register_service(Arc::clone(&chat).into_service())
            .map_err(|err| peer_error("service registration failed", err))?;
        handler.register_type::<ChatMessage>();

        let peer = format!("peer-{}", listener.accepted());
        tokio::spawn(serve_connection(handler, events, peer));
    }
}

async fn serve_connection(handler: IpcHandler, mut events: IpcEvents, peer: String) {
    info!(%peer, "peer connected");
    while let Some(event) = events.recv().await {
        match event {
            IpcEvent::Message(message) => {
                if let Some(chat) = message.object::<ChatMessage>() {
                    info!(%peer, from = %chat.from, text = %chat.text, "chat object received");
                } else if let Some(text) = message.as_str() {
                    info!(%peer, %text, "text received");
                } else {
                    info!(%peer, kind = %message.kind, "message received");
                }
            }
            IpcEvent::Error(error) if error.code == ErrorEventCode::ConnectionLost => break,
            IpcEvent::Error(error) => warn!(%peer, %error, "message dropped"),
        }
    }
    info!(%peer, "peer disconnected");
    let _ = handler.dispose().await;
}
