//! End-to-end delivery server tests: both worker loops running against
//! mock collaborators, under a paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use cairn_core::{DeliveryConfig, ReportFormat};
use cairn_delivery::{
    healthy, JsonReportPacker, Server, TransmitQueue, TransmitResponse, TransportError,
    DUPLICATE_REPORT,
};

use crate::mocks::{sample_transmission, MockClient, MockQueue, MockStore};

struct Fixture {
    server: Arc<Server>,
    delete_rx: Option<mpsc::Receiver<[u8; 32]>>,
    client: Arc<MockClient>,
    store: Arc<MockStore>,
    queue: Arc<MockQueue>,
    shutdown: broadcast::Sender<()>,
}

fn fixture_with(cfg: &DeliveryConfig) -> Fixture {
    let client = Arc::new(MockClient::new());
    let store = Arc::new(MockStore::new());
    let queue = Arc::new(MockQueue::new());
    let (server, delete_rx) = Server::new(
        cfg,
        "wss://example.test",
        client.clone(),
        store.clone(),
        queue.clone(),
        Arc::new(JsonReportPacker),
        Arc::new(JsonReportPacker),
    );
    let (shutdown, _) = broadcast::channel(1);
    Fixture {
        server,
        delete_rx: Some(delete_rx),
        client,
        store,
        queue,
        shutdown,
    }
}

fn fixture() -> Fixture {
    fixture_with(&DeliveryConfig::default())
}

/// Poll a condition under the paused clock; sleeps auto-advance, so this
/// resolves as fast as the loops themselves do.
async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test(start_paused = true)]
async fn delivers_and_deletes_a_queued_report() {
    let mut f = fixture();
    let t = sample_transmission(1);
    let hash = t.hash();
    assert!(f.queue.push(t));

    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    let store = f.store.clone();
    wait_for("record deleted", || store.deleted().contains(&hash)).await;

    let counters = f.server.counters();
    assert_eq!(counters.success(), 1);
    assert_eq!(counters.duplicate(), 0);
    assert_eq!(f.client.request_count(), 1);
    assert_eq!(counters.transmit_busy(), 0);
    assert_eq!(counters.delete_busy(), 0);

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn transport_error_requeues_and_retries() {
    let mut f = fixture();
    f.client.script(vec![
        Err(TransportError::Connection("connection reset".to_string())),
        Ok(TransmitResponse::default()),
    ]);
    let t = sample_transmission(2);
    let hash = t.hash();
    f.queue.push(t);

    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    let store = f.store.clone();
    wait_for("record deleted after retry", || {
        store.deleted().contains(&hash)
    })
    .await;

    let counters = f.server.counters();
    assert_eq!(f.client.request_count(), 2);
    assert_eq!(counters.connection_error(), 1);
    assert_eq!(counters.success(), 1);

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_destination_times_out_then_succeeds() {
    let mut f = fixture();
    // Longer than the 5s transmit timeout even with jitter.
    f.client.delay_next_call(Duration::from_secs(30));
    let t = sample_transmission(3);
    let hash = t.hash();
    f.queue.push(t);

    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    let store = f.store.clone();
    wait_for("record deleted after timeout retry", || {
        store.deleted().contains(&hash)
    })
    .await;

    let counters = f.server.counters();
    assert_eq!(counters.connection_error(), 1);
    assert_eq!(counters.success(), 1);
    assert_eq!(f.client.request_count(), 2);

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn duplicate_reply_counts_as_delivered() {
    let mut f = fixture();
    f.client.script(vec![Ok(TransmitResponse {
        code: DUPLICATE_REPORT,
        error: "duplicate report".to_string(),
    })]);
    let t = sample_transmission(4);
    let hash = t.hash();
    f.queue.push(t);

    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    let store = f.store.clone();
    wait_for("duplicate record deleted", || store.deleted().contains(&hash)).await;

    let counters = f.server.counters();
    assert_eq!(counters.success(), 1);
    assert_eq!(counters.duplicate(), 1);
    assert_eq!(f.client.request_count(), 1);

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn server_rejection_is_not_retried_but_still_deleted() {
    let mut f = fixture();
    f.client.script(vec![Ok(TransmitResponse {
        code: 5,
        error: "invalid signature".to_string(),
    })]);
    let t = sample_transmission(5);
    let hash = t.hash();
    f.queue.push(t);

    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    let store = f.store.clone();
    wait_for("rejected record deleted", || store.deleted().contains(&hash)).await;

    let counters = f.server.counters();
    assert_eq!(f.client.request_count(), 1);
    assert_eq!(counters.success(), 0);
    assert_eq!(counters.server_error(5), 1);
    assert_eq!(counters.server_errors(), vec![(5, 1)]);
    assert_eq!(f.queue.len(), 0);

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn unknown_format_never_reaches_the_wire() {
    let mut f = fixture();
    let mut t = sample_transmission(6);
    t.report_format = ReportFormat::Unknown(99);
    let hash = t.hash();
    f.queue.push(t);

    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    let store = f.store.clone();
    wait_for("unpackable record deleted", || {
        store.deleted().contains(&hash)
    })
    .await;

    let counters = f.server.counters();
    assert_eq!(f.client.request_count(), 0);
    assert_eq!(counters.encode_error(), 1);
    assert_eq!(counters.success(), 0);

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn delete_loop_retries_storage_failures() {
    let mut f = fixture();
    f.store.fail_next_deletes(2);
    let t = sample_transmission(7);
    let hash = t.hash();
    f.queue.push(t);

    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    let store = f.store.clone();
    wait_for("record deleted after storage recovery", || {
        store.deleted().contains(&hash)
    })
    .await;

    let counters = f.server.counters();
    assert_eq!(counters.queue_delete_error(), 2);
    assert_eq!(counters.success(), 1);
    assert_eq!(counters.delete_busy(), 0);

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn full_delete_channel_drops_requests_without_stalling_transmit() {
    // Channel capacity 1; no delete loop running to drain it.
    let cfg = DeliveryConfig {
        transmit_queue_max_size: 1,
        ..DeliveryConfig::default()
    };
    let mut f = fixture_with(&cfg);
    f.queue.push(sample_transmission(8));
    f.queue.push(sample_transmission(9));

    let h_transmit = tokio::spawn(
        f.server
            .clone()
            .run_transmit_loop(f.shutdown.subscribe()),
    );

    let client = f.client.clone();
    wait_for("both records transmitted", || client.request_count() == 2).await;

    let counters = f.server.counters();
    assert_eq!(counters.success(), 2);

    // Only the first deletion request fit in the channel.
    let mut delete_rx = f.delete_rx.take().unwrap();
    let first = delete_rx.try_recv();
    assert!(first.is_ok());
    assert!(delete_rx.try_recv().is_err());

    f.shutdown.send(()).ok();
    h_transmit.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_unblocks_an_idle_server() {
    let mut f = fixture();
    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    // Both loops are blocked waiting for work.
    tokio::time::sleep(Duration::from_millis(50)).await;
    f.shutdown.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        h_transmit.await.unwrap().unwrap();
        h_delete.await.unwrap().unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test(start_paused = true)]
async fn closed_queue_ends_the_transmit_loop() {
    let mut f = fixture();
    let (h_transmit, h_delete) = f.server.spawn(f.delete_rx.take().unwrap(), &f.shutdown);

    f.queue.close();
    tokio::time::timeout(Duration::from_secs(5), h_transmit)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    f.shutdown.send(()).ok();
    h_delete.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn health_report_merges_client_and_queue() {
    let f = fixture();
    let report = f.server.health_report();
    assert!(report.contains_key("mock_client"));
    assert!(report.contains_key("mock_queue"));
    assert!(healthy(&report));

    f.client.set_unhealthy();
    assert!(!healthy(&f.server.health_report()));
}
