mod common;

use std::sync::Arc;

use plainipc_peer::{connect, Endpoint, IpcConfig, IpcEvent, IpcListener};
use plainipc_rpc::CallRequest;
use pretty_assertions::assert_eq;

use common::{test_service, test_service_id, RpcTestService};

async fn roundtrip(listener: IpcListener) {
    let endpoint = listener.local_endpoint().unwrap();

    let server = tokio::spawn(async move {
        let (handler, mut events) = listener.accept().await.expect("accept");
        handler
            .register_service(test_service(Arc::new(RpcTestService::default())))
            .unwrap();
        // Echo the first string back, then keep serving until the client leaves.
        while let Some(event) = events.recv().await {
            match event {
                IpcEvent::Message(message) => {
                    let text = message.as_str().unwrap_or_default().to_uppercase();
                    handler.send_string(&text).await.unwrap();
                }
                IpcEvent::Error(_) => break,
            }
        }
        listener.accepted()
    });

    let (client, mut events) = connect(&endpoint, IpcConfig::default())
        .await
        .expect("connect");
    let sum: i32 = client
        .execute_remote(
            CallRequest::builder(test_service_id(), "Add")
                .arg(&20)
                .arg(&22)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(sum, 42);

    client.send_string("hello").await.unwrap();
    let reply = events.next_message().await.expect("reply");
    assert_eq!(reply.as_str(), Some("HELLO"));

    client.dispose().await.unwrap();
    assert_eq!(server.await.unwrap(), 1);
}

#[tokio::test]
async fn test_tcp_roundtrip() {
    let listener = IpcListener::bind_tcp("127.0.0.1:0", IpcConfig::default())
        .await
        .expect("bind tcp");
    assert_eq!(listener.transport_name(), "tcp");
    roundtrip(listener).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_roundtrip() {
    let dir = std::env::temp_dir().join(format!("plainipc-peer-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("roundtrip.sock");

    let listener = IpcListener::bind_unix(&path, IpcConfig::default())
        .await
        .expect("bind unix");
    assert_eq!(listener.local_endpoint().unwrap(), Endpoint::Unix(path.clone()));
    roundtrip(listener).await;

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = IpcListener::bind_tcp("127.0.0.1:0", IpcConfig::default())
        .await
        .unwrap();
    let endpoint = listener.local_endpoint().unwrap();
    drop(listener);

    assert!(connect(&endpoint, IpcConfig::default()).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_named_pipe_unsupported_on_unix() {
    let err = connect(&Endpoint::NamedPipe("svc".into()), IpcConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, plainipc_peer::PeerError::Unsupported("pipe")));
}
