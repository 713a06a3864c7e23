//! Tokio driver for the orchestrator.
//!
//! The driver owns the timers: it runs the startup pass, feeds mutations
//! into the debounce window, polls the push interval and serves manual
//! requests. Cycles run on the blocking pool so a slow transport call never
//! delays local writes; only one runs at a time and manual requests issued
//! meanwhile are queued behind it.

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::{CycleReport, SyncOrchestrator};
use crate::transport::{PushReceipt, RemoteTransport};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tasksync_model::Snapshot;
use tasksync_store::SnapshotStore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

type CycleReply = oneshot::Sender<SyncResult<Option<CycleReport>>>;

enum DriverMessage {
    Mutate(Snapshot),
    SyncNow(CycleReply),
    Unload(oneshot::Sender<SyncResult<Option<PushReceipt>>>),
    Shutdown(oneshot::Sender<()>),
}

/// Who is waiting for the running cycle.
enum Running {
    Background,
    Manual(CycleReply),
}

/// Spawns the driver loop.
pub struct SyncDriver;

impl SyncDriver {
    /// Starts driving `orchestrator` on the current tokio runtime.
    ///
    /// The push interval and debounce window come from the orchestrator's
    /// [`crate::SyncConfig`].
    pub fn spawn<T, S>(orchestrator: Arc<SyncOrchestrator<T, S>>) -> DriverHandle
    where
        T: RemoteTransport + 'static,
        S: SnapshotStore + 'static,
    {
        let (sender, receiver) = mpsc::channel(256);
        tokio::spawn(run(orchestrator, receiver));
        DriverHandle { sender }
    }
}

/// Handle for talking to a running driver.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    sender: mpsc::Sender<DriverMessage>,
}

impl DriverHandle {
    /// Queues a local mutation.
    pub async fn mutate(&self, snapshot: Snapshot) -> SyncResult<()> {
        self.sender
            .send(DriverMessage::Mutate(snapshot))
            .await
            .map_err(|_| SyncError::NotConnected)
    }

    /// Runs a manual cycle, after the one in flight if any.
    pub async fn sync_now(&self) -> SyncResult<Option<CycleReport>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(DriverMessage::SyncNow(reply))
            .await
            .map_err(|_| SyncError::NotConnected)?;
        response.await.map_err(|_| SyncError::NotConnected)?
    }

    /// Writes pending mutations, pushes if a push is owed, and stops the
    /// driver.
    pub async fn unload(&self) -> SyncResult<Option<PushReceipt>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(DriverMessage::Unload(reply))
            .await
            .map_err(|_| SyncError::NotConnected)?;
        response.await.map_err(|_| SyncError::NotConnected)?
    }

    /// Writes pending mutations locally and stops the driver without pushing.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(DriverMessage::Shutdown(reply))
            .await
            .map_err(|_| SyncError::NotConnected)?;
        response.await.map_err(|_| SyncError::NotConnected)
    }
}

async fn join_running<R>(task: &mut Option<JoinHandle<R>>) -> Result<R, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_due(remaining: Option<Duration>) {
    match remaining {
        Some(duration) => sleep(duration).await,
        None => std::future::pending().await,
    }
}

async fn run<T, S>(
    orchestrator: Arc<SyncOrchestrator<T, S>>,
    mut receiver: mpsc::Receiver<DriverMessage>,
) where
    T: RemoteTransport + 'static,
    S: SnapshotStore + 'static,
{
    tracing::info!(backend = %orchestrator.transport().kind(), "sync driver started");

    let mut push_timer = interval(orchestrator.config().push_interval);
    push_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    push_timer.tick().await;

    let startup = Arc::clone(&orchestrator);
    let mut task: Option<JoinHandle<SyncResult<Option<CycleReport>>>> =
        Some(tokio::task::spawn_blocking(move || startup.start()));
    let mut running = Some(Running::Background);
    let mut queued: VecDeque<CycleReply> = VecDeque::new();

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(DriverMessage::Mutate(snapshot)) => orchestrator.record_mutation(snapshot),
                Some(DriverMessage::SyncNow(reply)) => queued.push_back(reply),
                Some(DriverMessage::Unload(reply)) => {
                    let unloading = Arc::clone(&orchestrator);
                    let push = tokio::task::spawn_blocking(move || unloading.flush_on_unload());
                    let result = match timeout(orchestrator.config().request_timeout, push).await {
                        Ok(joined) => flatten(joined),
                        Err(_) => Err(SyncError::Timeout),
                    };
                    let _ = reply.send(result);
                    break;
                }
                Some(DriverMessage::Shutdown(reply)) => {
                    orchestrator.flush_debounce();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    orchestrator.flush_debounce();
                    break;
                }
            },

            _ = sleep_until_due(orchestrator.debounce_remaining()) => {
                orchestrator.poll_debounce();
            }

            _ = push_timer.tick(), if task.is_none() => {
                if orchestrator.has_pending_push() {
                    let ticking = Arc::clone(&orchestrator);
                    task = Some(tokio::task::spawn_blocking(move || ticking.tick()));
                    running = Some(Running::Background);
                }
            }

            joined = join_running(&mut task) => {
                task = None;
                let result = flatten(joined);
                match running.take() {
                    Some(Running::Manual(reply)) => {
                        let _ = reply.send(result);
                    }
                    _ => {
                        if let Err(e) = result {
                            tracing::debug!(error = %e, "background cycle failed, will retry");
                        }
                    }
                }
            }
        }

        if task.is_none() {
            if let Some(reply) = queued.pop_front() {
                let manual = Arc::clone(&orchestrator);
                task = Some(tokio::task::spawn_blocking(move || manual.sync_now()));
                running = Some(Running::Manual(reply));
            }
        }
    }

    for reply in queued {
        let _ = reply.send(Err(SyncError::NotConnected));
    }
    tracing::info!("sync driver stopped");
}

fn flatten<R>(joined: Result<SyncResult<R>, JoinError>) -> SyncResult<R> {
    joined.unwrap_or_else(|e| Err(SyncError::transport_fatal(format!("sync task failed: {e}"))))
}
