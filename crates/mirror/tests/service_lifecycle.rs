//! Start-up and endpoint switching of the full service against a server
//! that is not running.

use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;

use printdeck_core::endpoint::Endpoint;
use printdeck_events::bus::EventBus;
use printdeck_mirror::{EngineConfig, MirrorConfig, MirrorService};

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn reconfigure_switches_endpoint() {
    let first = Endpoint {
        ip: Ipv4Addr::LOCALHOST,
        port: closed_port(),
    };
    let service = MirrorService::start(
        MirrorConfig {
            endpoint: first,
            engine: EngineConfig::default(),
        },
        Arc::new(EventBus::default()),
    )
    .await;
    assert_eq!(service.endpoint().await, Some(first));

    let second = first.with_port(&closed_port().to_string()).unwrap();
    service.reconfigure(second).await;
    assert_eq!(service.endpoint().await, Some(second));

    // The engine keeps serving reads while the server is unreachable.
    assert!(service.engine().snapshot().await.unwrap().is_empty());

    let engine = service.engine().clone();
    service.shutdown().await;
    assert!(engine.snapshot().await.is_err());
}
