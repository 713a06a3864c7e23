//! Sync orchestrator state machine.
//!
//! The orchestrator owns the transport, the local store and the version
//! tracker and decides when a sync cycle runs:
//!
//! - [`SyncOrchestrator::start`] runs one reconciliation pass on app start
//! - [`SyncOrchestrator::record_mutation`] queues a local write that
//!   [`SyncOrchestrator::poll_debounce`] persists after the quiet period and
//!   that raises the pending-push flag
//! - [`SyncOrchestrator::tick`] runs a cycle when the flag is raised
//! - [`SyncOrchestrator::flush_on_unload`] pushes directly, bypassing cycles
//!
//! Only one cycle runs at a time; concurrent triggers return `Ok(None)`.
//! Nothing in here sleeps or spawns: time comes from a [`Clock`] and the
//! caller (normally [`crate::SyncDriver`]) decides when to call in.

use crate::classifier::{classify, SyncAction};
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::merge::{merge, MergeInfo};
use crate::transport::{PushReceipt, RemoteTransport};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasksync_model::{Snapshot, Timestamp};
use tasksync_store::{SnapshotStore, VersionTracker};

/// User-visible sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No cycle has run yet.
    Idle,
    /// A cycle is in flight.
    Syncing,
    /// The last cycle succeeded.
    Synced,
    /// The last cycle failed; the next tick retries.
    Error,
}

impl SyncStatus {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Reconciliation pass on app start.
    Startup,
    /// Periodic timer with the pending flag raised.
    Timer,
    /// Manual "sync now".
    Manual,
}

impl Trigger {
    /// Stable lowercase name, recorded on the `sync_cycle` span.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Timer => "timer",
            Trigger::Manual => "manual",
        }
    }
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// What started the cycle.
    pub trigger: Trigger,
    /// The classified action.
    pub action: SyncAction,
    /// Version assigned by the remote, if the cycle pushed.
    pub pushed_version: Option<u64>,
    /// Merge summary, if the cycle merged.
    pub merge_info: Option<MergeInfo>,
    /// Whether the local store and tracker now reflect the outcome.
    ///
    /// False when the local snapshot changed while the cycle was in flight,
    /// or when a merge was discarded; the next cycle reconciles.
    pub committed: bool,
}

impl CycleReport {
    fn new(trigger: Trigger, action: SyncAction) -> Self {
        Self {
            trigger,
            action,
            pushed_version: None,
            merge_info: None,
            committed: true,
        }
    }
}

/// Both pre-merge sides and the merge result, kept after an automatic merge
/// so the user can review it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictReview {
    /// Local snapshot before the merge.
    pub local: Snapshot,
    /// Remote snapshot before the merge.
    pub remote: Snapshot,
    /// The merged snapshot as pushed.
    pub merged: Snapshot,
    /// What the merge changed.
    pub info: MergeInfo,
}

/// Side picked when discarding an automatic merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Keep the pre-merge local snapshot and push it as a new version.
    Local,
    /// Keep the pre-merge remote snapshot without pushing.
    Remote,
}

/// Counters about sync activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Cycles run, successful or not.
    pub cycles: u64,
    /// Cycles that merged.
    pub merges: u64,
    /// Successful pushes, including unload and conflict-resolution pushes.
    pub pushes: u64,
    /// Failed cycles.
    pub failures: u64,
    /// Action of the last successful cycle.
    pub last_action: Option<SyncAction>,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct PendingWrite {
    snapshot: Snapshot,
    deadline: Timestamp,
}

#[derive(Debug)]
struct OrchestratorState {
    status: SyncStatus,
    pending_push: bool,
    /// Raised by a write that landed during a cycle; moved to
    /// `pending_push` when the cycle ends.
    deferred_push: bool,
    debounce: Option<PendingWrite>,
    /// Bumped by every user write to the local store.
    generation: u64,
    /// Last snapshot written or read; used when the store is unusable.
    current: Option<Snapshot>,
    store_degraded: bool,
    /// `(version, last_modified)` of the last snapshot the engine applied.
    last_applied: Option<(u64, Timestamp)>,
    review: Option<ConflictReview>,
    stats: SyncStats,
}

impl OrchestratorState {
    fn new() -> Self {
        Self {
            status: SyncStatus::Idle,
            pending_push: false,
            deferred_push: false,
            debounce: None,
            generation: 0,
            current: None,
            store_degraded: false,
            last_applied: None,
            review: None,
            stats: SyncStats::default(),
        }
    }
}

/// Releases the in-flight flag on drop.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Coordinates local writes, the pending-push flag and sync cycles.
pub struct SyncOrchestrator<T: RemoteTransport, S: SnapshotStore> {
    transport: T,
    store: S,
    tracker: VersionTracker,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    state: Mutex<OrchestratorState>,
    in_flight: AtomicBool,
}

impl<T: RemoteTransport, S: SnapshotStore> SyncOrchestrator<T, S> {
    /// Creates an orchestrator on the system clock.
    pub fn new(transport: T, store: S, tracker: VersionTracker, config: SyncConfig) -> Self {
        Self {
            transport,
            store,
            tracker,
            clock: Arc::new(SystemClock),
            config,
            state: Mutex::new(OrchestratorState::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Uses `clock` for deadlines and timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the version tracker.
    pub fn tracker(&self) -> &VersionTracker {
        &self.tracker
    }

    /// Current sync status.
    pub fn status(&self) -> SyncStatus {
        self.state.lock().status
    }

    /// Returns true if a push is owed to the remote.
    pub fn has_pending_push(&self) -> bool {
        let state = self.state.lock();
        state.pending_push || state.deferred_push
    }

    /// Returns true if a mutation is waiting for its debounce deadline.
    pub fn has_unsaved_mutation(&self) -> bool {
        self.state.lock().debounce.is_some()
    }

    /// Deadline of the queued mutation, if any.
    pub fn debounce_deadline(&self) -> Option<Timestamp> {
        self.state.lock().debounce.as_ref().map(|w| w.deadline)
    }

    /// Time left until the queued mutation is due, if any.
    pub fn debounce_remaining(&self) -> Option<Duration> {
        let deadline = self.debounce_deadline()?;
        let left = deadline.saturating_sub(self.clock.now_millis());
        Some(Duration::from_millis(u64::try_from(left).unwrap_or(0)))
    }

    /// Returns true while a cycle is running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The most recently persisted local snapshot.
    pub fn current_snapshot(&self) -> Option<Snapshot> {
        self.load_local()
    }

    /// The last automatic merge awaiting review, if any.
    pub fn conflict_review(&self) -> Option<ConflictReview> {
        self.state.lock().review.clone()
    }

    /// Dismisses the pending review, keeping the merged result.
    pub fn accept_merge(&self) {
        self.state.lock().review = None;
    }

    /// Sync counters.
    pub fn stats(&self) -> SyncStats {
        self.state.lock().stats.clone()
    }

    /// Runs the startup reconciliation pass.
    ///
    /// Returns `Ok(None)` if another cycle is already running.
    pub fn start(&self) -> SyncResult<Option<CycleReport>> {
        self.run_cycle(Trigger::Startup)
    }

    /// Queues a local mutation. Restarts the debounce window; only the last
    /// snapshot of a burst is written.
    ///
    /// The caller stamps `last_modified`.
    pub fn record_mutation(&self, snapshot: Snapshot) {
        let deadline = self.clock.now_millis().saturating_add(self.debounce_millis());
        self.state.lock().debounce = Some(PendingWrite { snapshot, deadline });
    }

    /// Persists the queued mutation if its debounce deadline has passed.
    ///
    /// Returns true if a write happened.
    pub fn poll_debounce(&self) -> bool {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        if state.debounce.as_ref().is_some_and(|w| w.deadline <= now) {
            self.write_queued(&mut state)
        } else {
            false
        }
    }

    /// Persists the queued mutation now, ignoring its deadline.
    pub fn flush_debounce(&self) -> bool {
        let mut state = self.state.lock();
        self.write_queued(&mut state)
    }

    /// Runs a push cycle if the pending flag is raised.
    ///
    /// The flag is cleared before the attempt and raised again only if the
    /// cycle fails. Returns `Ok(None)` when there was nothing to do or a
    /// cycle was already running.
    pub fn tick(&self) -> SyncResult<Option<CycleReport>> {
        if !self.state.lock().pending_push {
            return Ok(None);
        }
        self.run_cycle(Trigger::Timer)
    }

    /// Runs a cycle regardless of the pending flag.
    pub fn sync_now(&self) -> SyncResult<Option<CycleReport>> {
        self.run_cycle(Trigger::Manual)
    }

    /// Fetches the remote and classifies without applying anything.
    pub fn preview(&self) -> SyncResult<SyncAction> {
        let local = self.load_local();
        let remote = self.fetch_remote_lenient()?;
        Ok(classify(local.as_ref(), remote.as_ref(), self.tracker.marker()))
    }

    /// Best-effort push on shutdown.
    ///
    /// Writes any queued mutation, then, if a push is owed, sends the local
    /// snapshot straight to the transport without classification or the
    /// in-flight guard. Returns the receipt if a push happened.
    pub fn flush_on_unload(&self) -> SyncResult<Option<PushReceipt>> {
        self.flush_debounce();
        if !self.has_pending_push() {
            return Ok(None);
        }
        let Some(local) = self.load_local() else {
            return Ok(None);
        };

        let receipt = match self.transport.push_remote(&local) {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(error = %e, "unload push failed");
                return Err(e);
            }
        };

        let mut stored = local;
        stored.version = receipt.version;
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        self.apply(&mut state, &stored, now);
        state.pending_push = false;
        state.deferred_push = false;
        state.stats.pushes += 1;
        tracing::info!(version = receipt.version, "pushed on unload");
        Ok(Some(receipt))
    }

    /// Discards the last automatic merge in favor of one pre-merge side.
    ///
    /// The chosen side replaces the local snapshot. Choosing
    /// [`ConflictChoice::Local`] pushes it as a new version; choosing
    /// [`ConflictChoice::Remote`] re-anchors the tracker to the remote's
    /// pre-merge version without pushing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoConflictPending`] without a pending review and
    /// [`SyncError::Busy`] while a cycle is running.
    pub fn resolve_conflict(&self, choice: ConflictChoice) -> SyncResult<Option<PushReceipt>> {
        let guard = CycleGuard::try_acquire(&self.in_flight).ok_or(SyncError::Busy)?;
        let span = tracing::info_span!("sync_cycle", trigger = "conflict-resolution");
        let _entered = span.enter();

        let review = self
            .state
            .lock()
            .review
            .take()
            .ok_or(SyncError::NoConflictPending)?;

        let result = match choice {
            ConflictChoice::Local => match self.transport.push_remote(&review.local) {
                Ok(receipt) => {
                    let mut stored = review.local.clone();
                    stored.version = receipt.version;
                    let mut state = self.state.lock();
                    self.apply(&mut state, &stored, self.clock.now_millis());
                    state.stats.pushes += 1;
                    Ok(Some(receipt))
                }
                Err(e) => {
                    // Keep the review so the user can try again.
                    self.state.lock().review = Some(review);
                    Err(e)
                }
            },
            ConflictChoice::Remote => {
                let mut state = self.state.lock();
                self.apply(&mut state, &review.remote, self.clock.now_millis());
                Ok(None)
            }
        };

        tracing::info!(?choice, ok = result.is_ok(), "conflict resolved");
        drop(guard);
        result
    }

    fn debounce_millis(&self) -> i64 {
        i64::try_from(self.config.debounce.as_millis()).unwrap_or(i64::MAX)
    }

    fn write_queued(&self, state: &mut OrchestratorState) -> bool {
        let Some(write) = state.debounce.take() else {
            return false;
        };
        let snapshot = write.snapshot;
        let echo = state
            .last_applied
            .is_some_and(|(version, modified)| {
                snapshot.version == version && snapshot.last_modified == modified
            });

        self.persist(state, &snapshot);
        if echo {
            tracing::debug!(version = snapshot.version, "local write echoes applied snapshot");
            return true;
        }

        state.generation += 1;
        // The review's pre-merge sides no longer describe the local data.
        state.review = None;
        if self.in_flight.load(Ordering::Acquire) {
            state.deferred_push = true;
        } else {
            state.pending_push = true;
        }
        tracing::debug!(last_modified = snapshot.last_modified, "local snapshot written");
        true
    }

    fn load_local(&self) -> Option<Snapshot> {
        let mut state = self.state.lock();
        if state.store_degraded {
            return state.current.clone();
        }
        match self.store.load() {
            Ok(snapshot) => {
                state.current.clone_from(&snapshot);
                snapshot
            }
            Err(e) => {
                tracing::warn!(error = %e, "local store read failed, using in-memory snapshot");
                state.current.clone()
            }
        }
    }

    fn persist(&self, state: &mut OrchestratorState, snapshot: &Snapshot) {
        match self.store.save(snapshot) {
            Ok(()) => state.store_degraded = false,
            Err(e) => {
                tracing::warn!(error = %e, "local store write failed, keeping snapshot in memory");
                state.store_degraded = true;
            }
        }
        state.current = Some(snapshot.clone());
    }

    /// Persists an engine-applied snapshot and anchors the tracker to it.
    ///
    /// Drops any pending review; a merge sets its own after committing.
    fn apply(&self, state: &mut OrchestratorState, snapshot: &Snapshot, now: Timestamp) {
        self.persist(state, snapshot);
        state.review = None;
        state.last_applied = Some((snapshot.version, snapshot.last_modified));
        self.record(snapshot.version, now);
    }

    fn record(&self, version: u64, now: Timestamp) {
        if let Err(e) = self.tracker.record_sync_at(version, now) {
            tracing::warn!(error = %e, version, "failed to record sync point");
        }
    }

    fn fetch_remote_lenient(&self) -> SyncResult<Option<Snapshot>> {
        match self.transport.fetch_remote() {
            Ok(remote) => Ok(remote),
            Err(e) if e.is_malformed_payload() => {
                tracing::warn!(error = %e, "ignoring malformed remote payload");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn run_cycle(&self, trigger: Trigger) -> SyncResult<Option<CycleReport>> {
        let Some(guard) = CycleGuard::try_acquire(&self.in_flight) else {
            tracing::debug!(trigger = trigger.as_str(), "sync already in flight");
            return Ok(None);
        };
        let span = tracing::info_span!("sync_cycle", trigger = trigger.as_str());
        let _entered = span.enter();

        let (generation, owed) = {
            let mut state = self.state.lock();
            state.status = SyncStatus::Syncing;
            (state.generation, std::mem::take(&mut state.pending_push))
        };

        let result = self.cycle(trigger, generation, owed);
        self.finish(guard, &result);
        result.map(Some)
    }

    fn cycle(&self, trigger: Trigger, generation: u64, owed: bool) -> SyncResult<CycleReport> {
        let local = self.load_local();
        let remote = self.fetch_remote_lenient()?;
        let marker = self.tracker.marker();
        let action = classify(local.as_ref(), remote.as_ref(), marker);
        tracing::debug!(
            %action,
            last_version = marker.last_version,
            last_synced_at = marker.last_synced_at,
            remote_version = remote.as_ref().map(|r| r.version),
            "classified"
        );

        let mut report = CycleReport::new(trigger, action);
        match (action, local, remote) {
            (SyncAction::UploadOnly, Some(local), _) => {
                let receipt = self.transport.push_remote(&local)?;
                let mut stored = local;
                stored.version = receipt.version;
                report.pushed_version = Some(receipt.version);
                // The push reached the remote even if the local store moved
                // on, so the sync point is recorded either way.
                report.committed = self.commit(generation, &stored, true);
            }
            (SyncAction::TakeRemote, _, Some(remote)) => {
                report.committed = self.commit(generation, &remote, false);
            }
            (SyncAction::Merge, Some(local), Some(remote)) => {
                let now = self.clock.now_millis();
                let outcome = match merge(&local, &remote, marker, now) {
                    Ok(outcome) => outcome,
                    Err(SyncError::VersionOverflow) => {
                        tracing::warn!("merge version overflow, skipping push");
                        return Ok(self.discard_merge(report, owed));
                    }
                    Err(e) => return Err(e),
                };

                let floor = remote.version.max(marker.last_version);
                if outcome.merged.version <= floor {
                    let stale = SyncError::StaleMerge {
                        expected_above: floor,
                        got: outcome.merged.version,
                    };
                    tracing::warn!(error = %stale, "discarding merge");
                    return Ok(self.discard_merge(report, owed));
                }

                let receipt = self.transport.push_remote(&outcome.merged)?;
                let mut merged = outcome.merged;
                merged.version = receipt.version;
                tracing::info!(summary = %outcome.info.summary(), version = receipt.version, "merged");

                report.pushed_version = Some(receipt.version);
                report.merge_info = Some(outcome.info.clone());
                report.committed = self.commit(generation, &merged, false);
                if report.committed {
                    self.state.lock().review = Some(ConflictReview {
                        local,
                        remote,
                        merged,
                        info: outcome.info,
                    });
                }
            }
            _ => {}
        }
        Ok(report)
    }

    /// Leaves local state untouched and keeps an owed push owed.
    fn discard_merge(&self, mut report: CycleReport, owed: bool) -> CycleReport {
        report.committed = false;
        if owed {
            self.state.lock().deferred_push = true;
        }
        report
    }

    /// Applies a cycle's result unless a user write landed mid-cycle.
    ///
    /// With `record_if_moved`, the tracker is still anchored when the local
    /// store moved on.
    fn commit(&self, generation: u64, snapshot: &Snapshot, record_if_moved: bool) -> bool {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::info!("local snapshot changed during sync, reconciling next cycle");
            state.deferred_push = true;
            if record_if_moved {
                self.record(snapshot.version, now);
            }
            return false;
        }
        self.apply(&mut state, snapshot, now);
        true
    }

    fn finish(&self, guard: CycleGuard<'_>, result: &SyncResult<CycleReport>) {
        let mut state = self.state.lock();
        state.stats.cycles += 1;
        match result {
            Ok(report) => {
                state.status = SyncStatus::Synced;
                state.stats.last_action = Some(report.action);
                if report.pushed_version.is_some() {
                    state.stats.pushes += 1;
                }
                if report.merge_info.is_some() {
                    state.stats.merges += 1;
                }
                tracing::info!(
                    action = %report.action,
                    pushed_version = report.pushed_version,
                    committed = report.committed,
                    "sync cycle finished"
                );
            }
            Err(e) => {
                state.status = SyncStatus::Error;
                state.pending_push = true;
                state.stats.failures += 1;
                state.stats.last_error = Some(e.to_string());
                tracing::warn!(error = %e, "sync cycle failed");
            }
        }
        if std::mem::take(&mut state.deferred_push) {
            state.pending_push = true;
        }
        // Released under the state lock so a concurrent write sees either the
        // running cycle or none.
        drop(guard);
    }
}

impl<T: RemoteTransport, S: SnapshotStore> fmt::Debug for SyncOrchestrator<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SyncOrchestrator")
            .field("backend", &self.transport.kind())
            .field("status", &state.status)
            .field("pending_push", &state.pending_push)
            .field("in_flight", &self.in_flight.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::MockTransport;
    use tasksync_model::{Category, Task, TimeBlock};
    use tasksync_store::{InMemoryMetadataStore, InMemorySnapshotStore, SyncMarker};

    type Orchestrator = SyncOrchestrator<Arc<MockTransport>, Arc<InMemorySnapshotStore>>;

    struct Harness {
        orchestrator: Orchestrator,
        transport: Arc<MockTransport>,
        store: Arc<InMemorySnapshotStore>,
        clock: Arc<ManualClock>,
    }

    fn harness(local: Option<Snapshot>, remote: Option<Snapshot>, marker: SyncMarker) -> Harness {
        let transport = Arc::new(match remote {
            Some(remote) => MockTransport::with_remote(remote),
            None => MockTransport::new(),
        });
        let store = Arc::new(match local {
            Some(local) => InMemorySnapshotStore::with_snapshot(local),
            None => InMemorySnapshotStore::new(),
        });
        let tracker = VersionTracker::new(InMemoryMetadataStore::new());
        if marker.last_version > 0 || marker.last_synced_at > 0 {
            tracker
                .record_sync_at(marker.last_version, marker.last_synced_at)
                .unwrap();
        }
        let clock = Arc::new(ManualClock::new(1_000));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            tracker,
            SyncConfig::new().with_debounce(Duration::from_millis(800)),
        )
        .with_clock(Arc::clone(&clock));
        Harness {
            orchestrator,
            transport,
            store,
            clock,
        }
    }

    fn snapshot(version: u64, last_modified: Timestamp, task_ids: &[&str]) -> Snapshot {
        let mut s = Snapshot::empty();
        s.version = version;
        s.last_modified = last_modified;
        for id in task_ids {
            s.tasks.push(Task::with_id(*id, *id, "c", last_modified));
        }
        s
    }

    #[test]
    fn initial_state() {
        let h = harness(None, None, SyncMarker::never());
        assert_eq!(h.orchestrator.status(), SyncStatus::Idle);
        assert!(!h.orchestrator.has_pending_push());
        assert!(h.orchestrator.current_snapshot().is_none());
        assert!(h.orchestrator.tick().unwrap().is_none());
    }

    #[test]
    fn startup_takes_remote_on_fresh_device() {
        let remote = snapshot(3, 500, &["a", "b", "c", "d", "e"]);
        let h = harness(None, Some(remote), SyncMarker::never());

        let report = h.orchestrator.start().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::TakeRemote);
        assert!(report.committed);
        assert_eq!(h.orchestrator.status(), SyncStatus::Synced);
        assert_eq!(h.orchestrator.tracker().last_version(), 3);
        assert_eq!(h.store.snapshot().unwrap().tasks.len(), 5);
        assert_eq!(h.transport.push_count(), 0);
    }

    #[test]
    fn startup_uploads_when_remote_empty() {
        let h = harness(Some(snapshot(0, 100, &["t"])), None, SyncMarker::never());

        let report = h.orchestrator.start().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::UploadOnly);
        assert_eq!(report.pushed_version, Some(1));
        assert_eq!(h.transport.remote().unwrap().tasks.len(), 1);
        assert_eq!(h.store.snapshot().unwrap().version, 1);
        assert_eq!(h.orchestrator.tracker().marker(), SyncMarker::new(1, 1_000));
    }

    #[test]
    fn debounce_coalesces_mutations() {
        let h = harness(None, None, SyncMarker::never());

        h.orchestrator.record_mutation(snapshot(0, 1_000, &["a"]));
        h.clock.advance(500);
        h.orchestrator.record_mutation(snapshot(0, 1_500, &["a", "b"]));
        h.clock.advance(500);
        assert_eq!(h.orchestrator.debounce_remaining(), Some(Duration::from_millis(300)));
        assert!(!h.orchestrator.poll_debounce());
        assert_eq!(h.store.save_count(), 0);

        h.clock.advance(300);
        assert!(h.orchestrator.poll_debounce());
        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.store.snapshot().unwrap().tasks.len(), 2);
        assert!(h.orchestrator.has_pending_push());
        assert!(!h.orchestrator.poll_debounce());
    }

    #[test]
    fn tick_pushes_pending_write() {
        let h = harness(None, None, SyncMarker::never());
        h.orchestrator.record_mutation(snapshot(0, 1_000, &["a"]));
        h.orchestrator.flush_debounce();

        let report = h.orchestrator.tick().unwrap().unwrap();
        assert_eq!(report.trigger, Trigger::Timer);
        assert_eq!(report.action, SyncAction::UploadOnly);
        assert!(!h.orchestrator.has_pending_push());
        assert!(h.orchestrator.tick().unwrap().is_none());
        assert_eq!(h.orchestrator.stats().pushes, 1);
    }

    #[test]
    fn unreachable_remote_keeps_flag_raised() {
        let h = harness(None, None, SyncMarker::never());
        h.orchestrator.record_mutation(snapshot(0, 1_000, &["a"]));
        h.orchestrator.flush_debounce();
        h.transport.set_connected(false);

        assert!(h.orchestrator.tick().is_err());
        assert_eq!(h.orchestrator.status(), SyncStatus::Error);
        assert!(h.orchestrator.has_pending_push());
        assert_eq!(h.store.save_count(), 1);

        h.transport.set_connected(true);
        let report = h.orchestrator.tick().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::UploadOnly);
        assert_eq!(h.store.save_count(), 2);
        assert_eq!(h.transport.push_count(), 1);
        assert_eq!(h.transport.fetch_count(), 2);

        let stats = h.orchestrator.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.cycles, 2);
        assert!(stats.last_error.is_some());
    }

    #[test]
    fn malformed_remote_is_treated_as_absent() {
        let h = harness(
            Some(snapshot(2, 900, &["a"])),
            Some(snapshot(5, 100, &["z"])),
            SyncMarker::new(2, 800),
        );
        h.transport.set_malformed(true);

        assert_eq!(h.orchestrator.preview().unwrap(), SyncAction::UploadOnly);
        let report = h.orchestrator.sync_now().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::UploadOnly);
    }

    #[test]
    fn divergence_merges_and_keeps_review() {
        let mut local = snapshot(3, 900, &["t1"]);
        let mut block = TimeBlock::new("b", "Week", 900);
        block.task_ids.push("t1".into());
        local.time_blocks.push(block);
        let remote = snapshot(4, 700, &["t2"]);
        let h = harness(Some(local), Some(remote), SyncMarker::new(3, 50));

        let report = h.orchestrator.sync_now().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::Merge);
        assert_eq!(report.pushed_version, Some(5));
        let info = report.merge_info.unwrap();
        assert_eq!(info.tasks_added, vec!["t1".to_string()]);

        let stored = h.store.snapshot().unwrap();
        assert_eq!(stored.version, 5);
        assert!(stored.task("t1").is_some() && stored.task("t2").is_some());
        assert_eq!(h.orchestrator.tracker().last_version(), 5);

        let review = h.orchestrator.conflict_review().unwrap();
        assert_eq!(review.local.version, 3);
        assert_eq!(review.remote.version, 4);
        assert_eq!(review.merged, stored);
        assert_eq!(h.orchestrator.stats().merges, 1);
    }

    #[test]
    fn resolve_conflict_local_pushes_new_version() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(4, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        h.orchestrator.sync_now().unwrap();

        let receipt = h
            .orchestrator
            .resolve_conflict(ConflictChoice::Local)
            .unwrap()
            .unwrap();
        assert_eq!(receipt.version, 6);
        let remote = h.transport.remote().unwrap();
        assert!(remote.task("t2").is_none());
        assert_eq!(h.store.snapshot().unwrap().version, 6);
        assert_eq!(h.orchestrator.tracker().last_version(), 6);
        assert!(h.orchestrator.conflict_review().is_none());
    }

    #[test]
    fn resolve_conflict_remote_does_not_push() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(4, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        h.orchestrator.sync_now().unwrap();
        let pushes = h.transport.push_count();

        assert!(h
            .orchestrator
            .resolve_conflict(ConflictChoice::Remote)
            .unwrap()
            .is_none());
        assert_eq!(h.transport.push_count(), pushes);
        let stored = h.store.snapshot().unwrap();
        assert!(stored.task("t1").is_none());
        assert_eq!(h.orchestrator.tracker().last_version(), 4);
    }

    #[test]
    fn resolve_without_review_fails() {
        let h = harness(None, None, SyncMarker::never());
        assert!(matches!(
            h.orchestrator.resolve_conflict(ConflictChoice::Local),
            Err(SyncError::NoConflictPending)
        ));
    }

    #[test]
    fn failed_local_resolution_keeps_review() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(4, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        h.orchestrator.sync_now().unwrap();
        h.transport.set_connected(false);

        assert!(h.orchestrator.resolve_conflict(ConflictChoice::Local).is_err());
        assert!(h.orchestrator.conflict_review().is_some());
    }

    #[test]
    fn later_write_drops_stale_review() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(4, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        h.orchestrator.sync_now().unwrap();
        assert!(h.orchestrator.conflict_review().is_some());

        h.clock.set(6_000);
        h.orchestrator.record_mutation(snapshot(5, 6_000, &["t1", "t2", "t9"]));
        h.orchestrator.flush_debounce();
        assert!(h.orchestrator.conflict_review().is_none());

        let report = h.orchestrator.tick().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::UploadOnly);
        assert_eq!(report.pushed_version, Some(6));

        assert!(matches!(
            h.orchestrator.resolve_conflict(ConflictChoice::Remote),
            Err(SyncError::NoConflictPending)
        ));
        assert!(h.store.snapshot().unwrap().task("t9").is_some());
        assert_eq!(h.orchestrator.tracker().last_version(), 6);
    }

    #[test]
    fn later_cycle_drops_stale_review() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(4, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        h.orchestrator.sync_now().unwrap();
        assert!(h.orchestrator.conflict_review().is_some());

        // Another device pushes; this device takes it without a local write.
        h.transport.set_remote(Some(snapshot(7, 3_000, &["t1", "t2", "t4"])));
        let report = h.orchestrator.sync_now().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::TakeRemote);
        assert!(h.orchestrator.conflict_review().is_none());
        assert!(matches!(
            h.orchestrator.resolve_conflict(ConflictChoice::Local),
            Err(SyncError::NoConflictPending)
        ));
        assert_eq!(h.transport.push_count(), 1);
    }

    #[test]
    fn merge_without_room_for_a_version_is_discarded() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(u64::MAX, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        h.orchestrator.record_mutation(snapshot(3, 950, &["t1", "t3"]));
        h.orchestrator.flush_debounce();
        let saves = h.store.save_count();

        let report = h.orchestrator.tick().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::Merge);
        assert!(!report.committed);
        assert_eq!(report.pushed_version, None);
        assert!(report.merge_info.is_none());
        assert_eq!(h.transport.push_count(), 0);
        assert_eq!(h.store.save_count(), saves);
        assert_eq!(h.store.snapshot().unwrap(), snapshot(3, 950, &["t1", "t3"]));
        assert_eq!(h.orchestrator.tracker().marker(), SyncMarker::new(3, 50));
        assert!(h.orchestrator.conflict_review().is_none());
        assert_eq!(h.orchestrator.status(), SyncStatus::Synced);

        // The local change is still owed to the remote.
        assert!(h.orchestrator.has_pending_push());
    }

    #[test]
    fn discarded_manual_merge_does_not_raise_flag() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(u64::MAX, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        let report = h.orchestrator.sync_now().unwrap().unwrap();
        assert!(!report.committed);
        assert!(!h.orchestrator.has_pending_push());
        assert_eq!(h.transport.push_count(), 0);
    }

    #[test]
    fn echo_of_applied_snapshot_does_not_raise_flag() {
        let remote = snapshot(3, 500, &["a"]);
        let h = harness(None, Some(remote.clone()), SyncMarker::never());
        h.orchestrator.start().unwrap();

        h.orchestrator.record_mutation(remote);
        h.orchestrator.flush_debounce();
        assert!(!h.orchestrator.has_pending_push());

        h.orchestrator.record_mutation(snapshot(3, 1_200, &["a", "b"]));
        h.orchestrator.flush_debounce();
        assert!(h.orchestrator.has_pending_push());
    }

    #[test]
    fn store_write_failure_keeps_in_memory_snapshot() {
        let h = harness(None, None, SyncMarker::never());
        h.store.set_fail_writes(true);

        h.orchestrator.record_mutation(snapshot(0, 1_000, &["a"]));
        h.orchestrator.flush_debounce();
        assert!(h.store.snapshot().is_none());
        assert_eq!(h.orchestrator.current_snapshot().unwrap().tasks.len(), 1);

        let report = h.orchestrator.tick().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::UploadOnly);
        assert_eq!(h.transport.remote().unwrap().tasks.len(), 1);
    }

    #[test]
    fn store_read_failure_does_not_crash() {
        let h = harness(Some(snapshot(1, 100, &["a"])), None, SyncMarker::never());
        h.store.set_fail_reads(true);
        let report = h.orchestrator.start().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::Noop);
    }

    #[test]
    fn unload_pushes_pending_write_directly() {
        let h = harness(None, None, SyncMarker::never());
        h.orchestrator.record_mutation(snapshot(0, 1_000, &["a"]));

        let receipt = h.orchestrator.flush_on_unload().unwrap().unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(h.store.snapshot().unwrap().version, 1);
        assert_eq!(h.orchestrator.tracker().last_version(), 1);
        assert!(!h.orchestrator.has_pending_push());
        assert_eq!(h.orchestrator.stats().cycles, 0);

        assert!(h.orchestrator.flush_on_unload().unwrap().is_none());
    }

    #[test]
    fn guard_rejects_concurrent_cycles() {
        let h = harness(None, None, SyncMarker::never());
        let guard = CycleGuard::try_acquire(&h.orchestrator.in_flight).unwrap();

        assert!(h.orchestrator.sync_now().unwrap().is_none());
        assert!(matches!(
            h.orchestrator.resolve_conflict(ConflictChoice::Local),
            Err(SyncError::Busy)
        ));

        // A write during the cycle is deferred.
        h.orchestrator.record_mutation(snapshot(0, 1_000, &["a"]));
        h.orchestrator.flush_debounce();
        assert!(h.orchestrator.is_syncing());
        assert!(!h.orchestrator.state.lock().pending_push);
        assert!(h.orchestrator.has_pending_push());

        drop(guard);
        assert!(h.orchestrator.sync_now().unwrap().is_some());
    }

    #[test]
    fn write_during_cycle_blocks_commit() {
        let h = harness(
            Some(snapshot(3, 900, &["t1"])),
            Some(snapshot(4, 700, &["t2"])),
            SyncMarker::new(3, 50),
        );
        let generation = h.orchestrator.state.lock().generation;

        h.orchestrator.record_mutation(snapshot(3, 950, &["t1", "t3"]));
        h.orchestrator.flush_debounce();

        let merged = snapshot(5, 1_000, &["t1", "t2"]);
        assert!(!h.orchestrator.commit(generation, &merged, false));
        assert_eq!(h.store.snapshot().unwrap().tasks.len(), 2);
        assert!(h.store.snapshot().unwrap().task("t3").is_some());
        assert_eq!(h.orchestrator.tracker().last_version(), 3);
    }

    #[test]
    fn noop_when_nothing_changed() {
        let mut both = snapshot(4, 600, &[]);
        both.categories.push(Category::new("c", "Home", "#fff"));
        let h = harness(Some(both.clone()), Some(both), SyncMarker::new(4, 700));

        let report = h.orchestrator.sync_now().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::Noop);
        assert_eq!(h.transport.push_count(), 0);
        assert_eq!(h.store.save_count(), 0);
    }
}
