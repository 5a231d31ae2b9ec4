use plainipc::chat::ChatMessage;
use plainipc_peer::{ErrorEventCode, IpcConfig, IpcEvent, IpcListener};
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = IpcListener::bind(&args.endpoint, IpcConfig::default())
        .await
        .map_err(|err| peer_error("bind failed", err))?;

    let mut printed = 0usize;

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = tokio::signal::ctrl_c() => return Ok(SUCCESS),
        };
        let (handler, mut events) = accepted.map_err(|err| peer_error("accept failed", err))?;
        handler.register_type::<ChatMessage>();
        let peer = format!("peer-{}", listener.accepted());
        info!(%peer, "peer connected");

        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = tokio::signal::ctrl_c() => {
                    let _ = handler.dispose().await;
                    return Ok(SUCCESS);
                }
            };
            match event {
                Some(IpcEvent::Message(message)) => {
                    print_message(&message, &peer, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        let _ = handler.dispose().await;
                        return Ok(SUCCESS);
                    }
                }
                Some(IpcEvent::Error(error)) if error.code == ErrorEventCode::ConnectionLost => {
                    info!(%peer, "peer disconnected");
                    break;
                }
                Some(IpcEvent::Error(error)) => warn!(%peer, %error, "message dropped"),
                None => break,
            }
        }
    }
}
