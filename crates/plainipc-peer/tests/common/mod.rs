#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use plainipc_peer::{memory_pair, IpcConfig, IpcEvents, IpcHandler};
use plainipc_rpc::{remote_type, RemoteType, Service, ServiceBuilder, TypeIdentifier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub label: String,
}

remote_type!(Point, "tests", "tests.Point");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unregistered {
    pub value: u8,
}

remote_type!(Unregistered, "tests", "tests.Unregistered");

#[derive(Default)]
pub struct RpcTestService {
    pub void_calls: AtomicUsize,
}

pub fn test_service_id() -> TypeIdentifier {
    TypeIdentifier::new("tests", "tests.IRpcTestService")
}

pub fn test_service(state: Arc<RpcTestService>) -> Service {
    ServiceBuilder::from_arc(test_service_id(), state)
        .method("Add", |_, (a, b): (i32, i32)| Ok::<_, Infallible>(a + b))
        .method("NoResultOp", |svc, (): ()| {
            svc.void_calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        })
        .async_method("Sum", |_, (values,): (Vec<i32>,)| async move {
            tokio::task::yield_now().await;
            Ok::<_, Infallible>(values.iter().map(|v| i64::from(*v)).sum::<i64>())
        })
        .method("Convert", |_, (point,): (Point,)| {
            Ok::<_, Infallible>(format!("{}@{},{}", point.label, point.x, point.y))
        })
        .generic_method(
            "Generic",
            [String::type_identifier()],
            |_, (value,): (String,)| Ok::<_, Infallible>(format!("String:{value}")),
        )
        .generic_method(
            "Generic",
            [i32::type_identifier()],
            |_, (value,): (i32,)| Ok::<_, Infallible>(format!("i32:{value}")),
        )
        .method("ThrowError", |_, (): ()| Err::<i32, _>("ERROR"))
        .async_method("Delay", |_, (millis,): (u64,)| async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok::<_, Infallible>(millis)
        })
        .build()
}

/// Client and server joined in memory, with the test service on the server.
pub struct Harness {
    pub client: IpcHandler,
    pub client_events: IpcEvents,
    pub server: IpcHandler,
    pub server_events: IpcEvents,
    pub state: Arc<RpcTestService>,
}

pub fn harness(config: IpcConfig) -> Harness {
    let ((client, client_events), (server, server_events)) = memory_pair(config);
    let state = Arc::new(RpcTestService::default());
    server
        .register_service(test_service(Arc::clone(&state)))
        .expect("register test service");
    Harness {
        client,
        client_events,
        server,
        server_events,
        state,
    }
}
