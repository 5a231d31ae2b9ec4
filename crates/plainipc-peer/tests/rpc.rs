mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::future::join_all;
use plainipc_peer::{IpcConfig, IpcHandler, PeerError};
use plainipc_rpc::{CallRequest, CborConverter, RemoteType, RpcError, TypeIdentifier};
use plainipc_transport::StreamTransport;
use pretty_assertions::assert_eq;

use common::{harness, test_service_id, Point};

fn call(method: &str) -> plainipc_rpc::CallBuilder {
    CallRequest::builder(test_service_id(), method)
}

#[tokio::test]
async fn test_add_returns_sum() {
    let h = harness(IpcConfig::default());
    let result: i32 = h
        .client
        .execute_remote(call("Add").arg(&3).arg(&4).build().unwrap())
        .await
        .expect("Add");
    assert_eq!(result, 7);
}

#[tokio::test]
async fn test_void_method_completes() {
    let h = harness(IpcConfig::default());
    h.client
        .execute_remote_void(call("NoResultOp").build().unwrap())
        .await
        .expect("NoResultOp");
    h.client
        .execute_remote::<()>(call("NoResultOp").build().unwrap())
        .await
        .expect("NoResultOp as unit");
    assert_eq!(h.state.void_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_async_method() {
    let h = harness(IpcConfig::default());
    let total: i64 = h
        .client
        .execute_remote(call("Sum").arg(&vec![1, 2, 3, 4]).build().unwrap())
        .await
        .expect("Sum");
    assert_eq!(total, 10);
}

#[tokio::test]
async fn test_object_argument() {
    let h = harness(IpcConfig::default());
    let point = Point {
        x: 1,
        y: -2,
        label: "p".into(),
    };
    let text: String = h
        .client
        .execute_remote(call("Convert").arg(&point).build().unwrap())
        .await
        .expect("Convert");
    assert_eq!(text, "p@1,-2");
}

#[tokio::test]
async fn test_calls_over_cbor_converter() {
    let h = harness(IpcConfig::default().with_converter(CborConverter::new()));
    let sum: i32 = h
        .client
        .execute_remote(call("Add").arg(&40).arg(&2).build().unwrap())
        .await
        .expect("Add");
    assert_eq!(sum, 42);

    let point = Point {
        x: 7,
        y: 8,
        label: "cbor".into(),
    };
    let text: String = h
        .client
        .execute_remote(call("Convert").arg(&point).build().unwrap())
        .await
        .expect("Convert");
    assert_eq!(text, "cbor@7,8");

    h.client
        .execute_remote_void(call("NoResultOp").build().unwrap())
        .await
        .expect("NoResultOp");
}

#[tokio::test]
async fn test_generic_method_per_type_argument() {
    let h = harness(IpcConfig::default());
    let text: String = h
        .client
        .execute_remote(call("Generic").generic::<String>().arg("abc").build().unwrap())
        .await
        .expect("Generic<String>");
    let number: String = h
        .client
        .execute_remote(call("Generic").generic::<i32>().arg(&42).build().unwrap())
        .await
        .expect("Generic<i32>");
    assert_eq!(text, "String:abc");
    assert_eq!(number, "i32:42");
}

#[tokio::test]
async fn test_remote_failure_carries_message() {
    let h = harness(IpcConfig::default());
    let err = h
        .client
        .execute_remote::<i32>(call("ThrowError").build().unwrap())
        .await
        .unwrap_err();
    assert!(err.is_remote(), "{err:?}");
    assert_eq!(err.remote_message(), Some("ERROR"));

    // The connection stays usable.
    let result: i32 = h
        .client
        .execute_remote(call("Add").arg(&1).arg(&1).build().unwrap())
        .await
        .unwrap();
    assert_eq!(result, 2);
}

#[tokio::test]
async fn test_lookup_failures_are_remote_errors() {
    let h = harness(IpcConfig::default());

    let missing_method = h
        .client
        .execute_remote::<i32>(call("Multiply").arg(&1).build().unwrap())
        .await
        .unwrap_err();
    assert!(missing_method.remote_message().unwrap().contains("not found"));

    let arity = h
        .client
        .execute_remote::<i32>(call("Add").arg(&1).build().unwrap())
        .await
        .unwrap_err();
    assert!(arity
        .remote_message()
        .unwrap()
        .starts_with("Parameter count mismatch"));

    let generic = h
        .client
        .execute_remote::<String>(call("Generic").generic::<bool>().arg(&true).build().unwrap())
        .await
        .unwrap_err();
    assert!(generic.remote_message().unwrap().contains("not available"));

    let interface = h
        .client
        .execute_remote::<i32>(
            CallRequest::builder(TypeIdentifier::new("tests", "tests.IMissing"), "Add")
                .build()
                .unwrap(),
        )
        .await
        .unwrap_err();
    assert!(interface
        .remote_message()
        .unwrap()
        .contains("No implementation registered"));
}

#[tokio::test]
async fn test_result_type_mismatch_is_local_conversion_error() {
    let h = harness(IpcConfig::default());
    let err = h
        .client
        .execute_remote::<Point>(call("Add").arg(&1).arg(&2).build().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, PeerError::Rpc(RpcError::Conversion(_))), "{err:?}");
}

#[tokio::test]
async fn test_concurrent_calls_complete_out_of_order() {
    let h = harness(IpcConfig::default());
    let client = &h.client;

    let slow = client.execute_remote::<u64>(call("Delay").arg(&200u64).build().unwrap());
    let fast = async {
        let value = client
            .execute_remote::<u64>(call("Delay").arg(&10u64).build().unwrap())
            .await;
        (value, std::time::Instant::now())
    };
    let slow = async { (slow.await, std::time::Instant::now()) };

    let ((slow_value, slow_done), (fast_value, fast_done)) = tokio::join!(slow, fast);
    assert_eq!(slow_value.unwrap(), 200);
    assert_eq!(fast_value.unwrap(), 10);
    assert!(fast_done < slow_done);
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_many_parallel_calls_each_get_own_answer() {
    let h = harness(IpcConfig::default());
    let calls = (0..50).map(|i| {
        let client = &h.client;
        async move {
            let sum: i32 = client
                .execute_remote(call("Add").arg(&i).arg(&1000).build().unwrap())
                .await
                .unwrap();
            (i, sum)
        }
    });
    for (i, sum) in join_all(calls).await {
        assert_eq!(sum, i + 1000);
    }
}

#[tokio::test]
async fn test_timeout_does_not_affect_other_calls() {
    let h = harness(IpcConfig::default().with_remote_timeout(Duration::from_millis(100)));

    let (timed_out, quick) = tokio::join!(
        h.client
            .execute_remote::<u64>(call("Delay").arg(&1000u64).build().unwrap()),
        h.client
            .execute_remote::<i32>(call("Add").arg(&2).arg(&2).build().unwrap()),
    );
    assert!(timed_out.unwrap_err().is_timeout());
    assert_eq!(quick.unwrap(), 4);
    assert_eq!(h.client.pending_calls(), 0);
}

#[tokio::test]
async fn test_call_times_out_when_peer_stops_reading() {
    let (stream, _unread) = tokio::io::duplex(1024);
    let config = IpcConfig::default().with_remote_timeout(Duration::from_millis(200));
    let transport = StreamTransport::spawn(stream, &config.transport, "stalled");
    let (client, _events) = IpcHandler::from_transport(transport, config);

    let big = Point {
        x: 0,
        y: 0,
        label: "x".repeat(64 * 1024),
    };
    let started = std::time::Instant::now();
    let (first, second) = tokio::join!(
        client.execute_remote::<String>(call("Convert").arg(&big).build().unwrap()),
        client.execute_remote::<i32>(call("Add").arg(&1).arg(&2).build().unwrap()),
    );

    assert!(first.unwrap_err().is_timeout());
    assert!(second.unwrap_err().is_timeout());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_both_directions_on_one_connection() {
    let h = harness(IpcConfig::default());
    h.client
        .register_service(common::test_service(Default::default()))
        .unwrap();

    let (from_client, from_server) = tokio::join!(
        h.client
            .execute_remote::<i32>(call("Add").arg(&1).arg(&2).build().unwrap()),
        h.server
            .execute_remote::<i32>(call("Add").arg(&10).arg(&20).build().unwrap()),
    );
    assert_eq!(from_client.unwrap(), 3);
    assert_eq!(from_server.unwrap(), 30);
}

#[tokio::test]
async fn test_duplicate_service_rejected() {
    let h = harness(IpcConfig::default());
    let err = h
        .server
        .register_service(common::test_service(Default::default()))
        .unwrap_err();
    assert!(matches!(err, PeerError::Rpc(RpcError::DuplicateService(_))));

    assert!(h.server.unregister_service(&test_service_id()));
    h.server
        .register_service(common::test_service(Default::default()))
        .expect("re-register after unregister");
}

#[tokio::test]
async fn test_dispose_fails_pending_calls() {
    let h = harness(IpcConfig::default());
    let client = &h.client;

    let pending = client.execute_remote::<u64>(call("Delay").arg(&5000u64).build().unwrap());
    let dispose = async {
        while client.pending_calls() == 0 {
            tokio::task::yield_now().await;
        }
        client.dispose().await.unwrap();
    };
    let (result, ()) = tokio::join!(pending, dispose);
    assert!(matches!(result, Err(PeerError::Disposed)), "{result:?}");
    assert_eq!(client.pending_calls(), 0);

    // Disposal is idempotent and blocks further use.
    client.dispose().await.unwrap();
    assert!(!client.is_connected());
    let err = client
        .execute_remote::<i32>(call("Add").arg(&1).arg(&1).build().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, PeerError::Disposed));
    assert!(matches!(client.send_string("late").await, Err(PeerError::Disposed)));
}

#[tokio::test]
async fn test_call_to_closed_peer_fails_fast_or_times_out() {
    let h = harness(IpcConfig::default().with_remote_timeout(Duration::from_millis(200)));
    h.server.dispose().await.unwrap();
    drop(h.server);

    let err = h
        .client
        .execute_remote::<i32>(call("Add").arg(&1).arg(&1).build().unwrap())
        .await
        .unwrap_err();
    assert!(
        err.is_timeout() || matches!(err, PeerError::Rpc(RpcError::Send(_))),
        "{err:?}"
    );
    assert_eq!(h.client.pending_calls(), 0);
}

#[test]
fn test_call_request_carries_generic_identifiers() {
    let request = call("Generic").generic::<Vec<i32>>().arg("x").build().unwrap();
    assert_eq!(request.generic_arguments, vec![<Vec<i32>>::type_identifier()]);
}
