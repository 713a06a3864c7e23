//! Shared harness: an orchestrator talking HTTP to the reference server
//! in-process.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tasksync_engine::{
    Clock, HttpClient, HttpFailure, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer,
    ManualClock, Method, StaticToken, SyncConfig, SyncOrchestrator,
};
use tasksync_model::Snapshot;
use tasksync_store::{InMemoryMetadataStore, InMemorySnapshotStore, VersionTracker};
use tasksync_server::{DataServer, ServerConfig};

pub const BASE_URL: &str = "http://sync.local";

/// Adapts the reference server to the loopback client.
pub struct ServerAdapter(pub Arc<DataServer>);

impl LoopbackServer for ServerAdapter {
    fn handle(&self, method: Method, path: &str, bearer: Option<&str>, body: &[u8]) -> HttpResponse {
        let authorization = bearer.map(|token| format!("Bearer {token}"));
        let response = self
            .0
            .handle(method.as_str(), path, authorization.as_deref(), body);
        HttpResponse::new(response.status, response.body)
    }
}

/// A loopback client whose connection can be cut.
pub struct FlakyClient {
    inner: LoopbackClient<ServerAdapter>,
    offline: Arc<AtomicBool>,
}

impl FlakyClient {
    fn check(&self) -> Result<(), HttpFailure> {
        if self.offline.load(Ordering::SeqCst) {
            Err(HttpFailure::Connection("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl HttpClient for FlakyClient {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, HttpFailure> {
        self.check()?;
        self.inner.get(url, bearer)
    }

    fn put(&self, url: &str, bearer: Option<&str>, body: Vec<u8>) -> Result<HttpResponse, HttpFailure> {
        self.check()?;
        self.inner.put(url, bearer, body)
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, HttpFailure> {
        self.check()?;
        self.inner.post_form(url, fields)
    }
}

pub type Transport = HttpTransport<FlakyClient, StaticToken>;
pub type Orchestrator = SyncOrchestrator<Transport, Arc<InMemorySnapshotStore>>;

/// One device connected to a shared server.
pub struct Device {
    pub orchestrator: Orchestrator,
    pub store: Arc<InMemorySnapshotStore>,
    pub clock: Arc<ManualClock>,
    offline: Arc<AtomicBool>,
}

impl Device {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Queues `snapshot` stamped with the device clock and writes it at once.
    pub fn write(&self, mut snapshot: Snapshot) {
        snapshot.last_modified = self.clock.now_millis();
        self.orchestrator.record_mutation(snapshot);
        self.orchestrator.flush_debounce();
    }

    pub fn local(&self) -> Option<Snapshot> {
        self.store.snapshot()
    }
}

pub fn server() -> Arc<DataServer> {
    Arc::new(DataServer::in_memory(ServerConfig::default()))
}

pub fn device(server: &Arc<DataServer>, start: i64) -> Device {
    device_with(server, start, InMemorySnapshotStore::new(), InMemoryMetadataStore::new())
}

pub fn device_with(
    server: &Arc<DataServer>,
    start: i64,
    store: InMemorySnapshotStore,
    metadata: InMemoryMetadataStore,
) -> Device {
    build(server, start, store, metadata, StaticToken::anonymous())
}

pub fn device_with_token(server: &Arc<DataServer>, start: i64, token: &str) -> Device {
    build(
        server,
        start,
        InMemorySnapshotStore::new(),
        InMemoryMetadataStore::new(),
        StaticToken::new(token),
    )
}

fn build(
    server: &Arc<DataServer>,
    start: i64,
    store: InMemorySnapshotStore,
    metadata: InMemoryMetadataStore,
    tokens: StaticToken,
) -> Device {
    let offline = Arc::new(AtomicBool::new(false));
    let client = FlakyClient {
        inner: LoopbackClient::new(ServerAdapter(Arc::clone(server))),
        offline: Arc::clone(&offline),
    };
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new(start));
    let orchestrator = SyncOrchestrator::new(
        HttpTransport::with_tokens(BASE_URL, client, tokens),
        Arc::clone(&store),
        VersionTracker::new(metadata),
        SyncConfig::default(),
    )
    .with_clock(Arc::clone(&clock));
    Device {
        orchestrator,
        store,
        clock,
        offline,
    }
}

pub fn server_with(config: ServerConfig) -> Arc<DataServer> {
    Arc::new(DataServer::in_memory(config))
}
