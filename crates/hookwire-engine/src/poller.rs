//! Source poller / scheduler — one recurring poll task per enabled
//! workflow.
//!
//! Each tick runs to completion before that workflow's next tick may
//! fire; ticks for different workflows overlap freely. Cancellation
//! prevents future ticks but never aborts a tick in flight. Nothing
//! escapes a tick: cycle-level errors are logged and the timer keeps
//! running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use hookwire_core::{Result, SourceConnector, SourceKind, TriggerKind, Workflow};

use crate::cursor::CursorStore;
use crate::dispatch::Dispatcher;
use crate::filter;

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Cursor position after the cycle.
    pub cursor: u64,
    pub dispatched: usize,
    /// Items that failed a filter predicate.
    pub filtered: usize,
    /// Items whose delivery failed (not retried).
    pub failed: usize,
    /// True when this was the first tick and the cursor was
    /// initialized without dispatching.
    pub first_run: bool,
}

/// Debug view of one scheduled workflow.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScheduledInfo {
    pub workflow_id: String,
    pub trigger: String,
    pub schedule: String,
}

struct PollHandle {
    cancel: Arc<Notify>,
    trigger: TriggerKind,
    every_minutes: u64,
}

/// Owns the poll tasks. At most one active task per workflow id.
pub struct PollScheduler {
    cursors: Arc<CursorStore>,
    dispatcher: Arc<Dispatcher>,
    connectors: HashMap<SourceKind, Arc<dyn SourceConnector>>,
    default_poll_minutes: u64,
    tasks: Mutex<HashMap<String, PollHandle>>,
}

impl PollScheduler {
    pub fn new(
        cursors: Arc<CursorStore>,
        dispatcher: Arc<Dispatcher>,
        default_poll_minutes: u64,
    ) -> Self {
        Self {
            cursors,
            dispatcher,
            connectors: HashMap::new(),
            default_poll_minutes: default_poll_minutes.max(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Register the connector for one source kind. Wiring happens at
    /// startup, before any workflow is scheduled.
    pub fn register_connector(&mut self, kind: SourceKind, connector: Arc<dyn SourceConnector>) {
        self.connectors.insert(kind, connector);
    }

    /// Start the recurring poll task for a workflow.
    ///
    /// Webhook-sourced workflows are push-driven and skipped; a
    /// workflow whose source kind has no registered connector is a
    /// configuration problem — logged, not scheduled, never fatal.
    /// Scheduling an id that already has an active task is a no-op.
    pub fn schedule(self: &Arc<Self>, workflow: Workflow) {
        if !workflow.source.is_polled() {
            tracing::debug!("Workflow {} is webhook-sourced, not polled", workflow.id);
            return;
        }
        let Some(connector) = self.connectors.get(&workflow.source).cloned() else {
            tracing::warn!(
                "Workflow {} not scheduled: no connector for source '{}'",
                workflow.id,
                workflow.source.as_str()
            );
            return;
        };

        // Clamp to [1 minute, 1 week]: a zero interval would spin, and
        // an absurd one would overflow the timer arithmetic.
        let every_minutes = workflow
            .poll_minutes
            .unwrap_or(self.default_poll_minutes)
            .clamp(1, 60 * 24 * 7);
        let cancel = Arc::new(Notify::new());
        {
            let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            if tasks.contains_key(&workflow.id) {
                tracing::debug!("Workflow {} already scheduled", workflow.id);
                return;
            }
            tasks.insert(
                workflow.id.clone(),
                PollHandle {
                    cancel: cancel.clone(),
                    trigger: workflow.trigger,
                    every_minutes,
                },
            );
        }

        tracing::info!(
            "Scheduled workflow {} ({} -> {}/{}, every {}m)",
            workflow.id,
            workflow.source.as_str(),
            workflow.target,
            workflow.action,
            every_minutes
        );

        let cursors = self.cursors.clone();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(every_minutes.saturating_mul(60)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.notified() => break,
                    _ = interval.tick() => {
                        match run_cycle(connector.as_ref(), &cursors, &dispatcher, &workflow).await {
                            Ok(outcome) if outcome.first_run => {
                                tracing::info!(
                                    "Workflow {} initialized at cursor {}",
                                    workflow.id, outcome.cursor
                                );
                            }
                            Ok(outcome) if outcome.dispatched + outcome.failed > 0 => {
                                tracing::info!(
                                    "Workflow {} tick: {} dispatched, {} filtered, {} failed, cursor {}",
                                    workflow.id, outcome.dispatched, outcome.filtered,
                                    outcome.failed, outcome.cursor
                                );
                            }
                            Ok(_) => {}
                            Err(e) => {
                                // Cursor untouched; next tick retries the range.
                                tracing::warn!("Workflow {} tick failed: {e}", workflow.id);
                            }
                        }
                    }
                }
            }
            tracing::info!("Workflow {} poll task stopped", workflow.id);
        });
    }

    /// Cancel a workflow's poll task. Tolerates unknown or
    /// already-cancelled ids.
    pub fn unschedule(&self, workflow_id: &str) {
        let handle = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            tasks.remove(workflow_id)
        };
        if let Some(handle) = handle {
            // notify_one stores a permit, so the loop observes the
            // cancel even if it is mid-tick right now.
            handle.cancel.notify_one();
            tracing::info!("Unscheduled workflow {workflow_id}");
        }
    }

    /// Re-derive the full task set from the registry's enabled
    /// workflows. Called on process start; assumes no in-memory state
    /// survived.
    pub fn restore(self: &Arc<Self>, enabled: Vec<Workflow>) {
        for workflow in enabled {
            self.schedule(workflow);
        }
    }

    pub fn is_scheduled(&self, workflow_id: &str) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(workflow_id)
    }

    /// The shared cursor store, for the debug surface.
    pub fn cursors(&self) -> &CursorStore {
        &self.cursors
    }

    /// Currently scheduled workflows, for the debug surface.
    pub fn scheduled(&self) -> Vec<ScheduledInfo> {
        let tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        let mut infos: Vec<ScheduledInfo> = tasks
            .iter()
            .map(|(id, h)| ScheduledInfo {
                workflow_id: id.clone(),
                trigger: h.trigger.as_str().to_string(),
                schedule: format!("every {}m", h.every_minutes),
            })
            .collect();
        infos.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));
        infos
    }
}

/// One poll cycle for one workflow.
///
/// The cursor state machine:
/// 1. resolve the source's current end marker;
/// 2. no cursor yet → persist `position = current_end`, dispatch
///    nothing (history is never replayed);
/// 3. `current_end <= position` (nothing new, or the source shrank) →
///    return without writing;
/// 4. fetch `(position, current_end]` oldest first, filter, dispatch
///    each item with per-item error isolation;
/// 5. persist `position = current_end` regardless of individual item
///    outcomes.
///
/// Any error before the final set leaves the cursor at its pre-cycle
/// value, so the next tick re-scans the same range (at-least-once).
pub async fn run_cycle(
    connector: &dyn SourceConnector,
    cursors: &CursorStore,
    dispatcher: &Dispatcher,
    workflow: &Workflow,
) -> Result<CycleOutcome> {
    let source_identity = workflow.source_identity();
    let current_end = connector.current_end(&workflow.params.source).await?;

    let Some(position) = cursors.get(&source_identity, &workflow.id) else {
        // First tick: everything that exists so far counts as seen.
        cursors.set(&source_identity, &workflow.id, current_end)?;
        return Ok(CycleOutcome {
            cursor: current_end,
            dispatched: 0,
            filtered: 0,
            failed: 0,
            first_run: true,
        });
    };

    if current_end <= position {
        return Ok(CycleOutcome {
            cursor: position,
            dispatched: 0,
            filtered: 0,
            failed: 0,
            first_run: false,
        });
    }

    let items = connector
        .fetch_range(&workflow.params.source, position, current_end)
        .await?;

    let mut dispatched = 0;
    let mut filtered = 0;
    let mut failed = 0;
    for item in &items {
        let payload = connector.to_payload(item, workflow);
        if !filter::passes(&payload, &workflow.filters) {
            filtered += 1;
            continue;
        }
        match dispatcher
            .dispatch(&workflow.target, &workflow.action, &workflow.params.target, &payload)
            .await
        {
            Ok(()) => dispatched += 1,
            Err(e) => {
                // One item's failure must not block its siblings or
                // the cursor advance. No retry by design.
                failed += 1;
                tracing::warn!(
                    "Workflow {} delivery failed for item {}: {e}",
                    workflow.id,
                    item.position
                );
            }
        }
    }

    cursors.set(&source_identity, &workflow.id, current_end)?;
    Ok(CycleOutcome {
        cursor: current_end,
        dispatched,
        filtered,
        failed,
        first_run: false,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::MemorySource;
    use super::*;
    use crate::dispatch::testing::RecordingSender;
    use hookwire_core::{Predicate, PredicateOp, WorkflowDraft, WorkflowParams};
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hookwire-poller-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .subsec_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn workflow(filters: Vec<Predicate>) -> Workflow {
        Workflow::from_draft(WorkflowDraft {
            source: SourceKind::Spreadsheet,
            trigger: TriggerKind::NewRow,
            target: "chat".into(),
            action: "message".into(),
            params: WorkflowParams {
                source: serde_json::json!({"sheet_id": "sheet-1"}),
                target: serde_json::json!({}),
            },
            filters,
            poll_minutes: Some(1),
        })
    }

    fn wiring(sender: std::sync::Arc<RecordingSender>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("chat", "message", sender);
        dispatcher
    }

    fn row(values: serde_json::Value) -> serde_json::Value {
        values
    }

    #[tokio::test]
    async fn test_first_tick_initializes_without_dispatch() {
        let dir = temp_dir("first");
        let cursors = CursorStore::open(&dir);
        let source = MemorySource::with_items(vec![
            row(serde_json::json!({"name": "a"})),
            row(serde_json::json!({"name": "b"})),
        ]);
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = wiring(sender.clone());
        let wf = workflow(vec![]);

        let outcome = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert!(outcome.first_run);
        assert_eq!(outcome.cursor, 2);
        assert_eq!(outcome.dispatched, 0);
        assert!(sender.sent.lock().unwrap().is_empty());
        assert_eq!(cursors.get(&wf.source_identity(), &wf.id), Some(2));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_delivers_new_range_in_order() {
        let dir = temp_dir("range");
        let cursors = CursorStore::open(&dir);
        let source = MemorySource::new();
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = wiring(sender.clone());
        let wf = workflow(vec![]);

        run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        for name in ["a", "b", "c"] {
            source.append(row(serde_json::json!({"name": name})));
        }

        let outcome = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!(outcome.dispatched, 3);
        assert_eq!(outcome.cursor, 3);
        assert_eq!(sender.sent_positions(), vec![1, 2, 3]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_nothing_new_and_source_shrink() {
        let dir = temp_dir("shrink");
        let cursors = CursorStore::open(&dir);
        let source = MemorySource::with_items(vec![
            row(serde_json::json!({"name": "a"})),
            row(serde_json::json!({"name": "b"})),
            row(serde_json::json!({"name": "c"})),
        ]);
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = wiring(sender.clone());
        let wf = workflow(vec![]);

        run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();

        // No new rows: idle, cursor unchanged.
        let idle = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!(idle.dispatched, 0);
        assert_eq!(idle.cursor, 3);

        // Rows deleted: current_end < position must not underflow or
        // be treated as new items.
        source.truncate(1);
        let shrunk = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!(shrunk.dispatched, 0);
        assert_eq!(cursors.get(&wf.source_identity(), &wf.id), Some(3));
        assert!(sender.sent.lock().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_per_item_isolation() {
        let dir = temp_dir("isolation");
        let cursors = CursorStore::open(&dir);
        let source = MemorySource::new();
        let sender = std::sync::Arc::new(RecordingSender::failing_on(&[2]));
        let dispatcher = wiring(sender.clone());
        let wf = workflow(vec![]);

        run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        for name in ["a", "b", "c"] {
            source.append(row(serde_json::json!({"name": name})));
        }

        let outcome = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!(outcome.dispatched, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.cursor, 3);
        assert_eq!(sender.sent_positions(), vec![1, 3]);
        assert_eq!(cursors.get(&wf.source_identity(), &wf.id), Some(3));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_source_unreachable_leaves_cursor() {
        let dir = temp_dir("outage");
        let cursors = CursorStore::open(&dir);
        let source = MemorySource::with_items(vec![row(serde_json::json!({"name": "a"}))]);
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = wiring(sender.clone());
        let wf = workflow(vec![]);

        run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        source.append(row(serde_json::json!({"name": "b"})));
        source.set_unreachable(true);

        assert!(run_cycle(&source, &cursors, &dispatcher, &wf).await.is_err());
        assert_eq!(cursors.get(&wf.source_identity(), &wf.id), Some(1));

        // Outage over: the next tick naturally picks the range up.
        source.set_unreachable(false);
        let outcome = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(sender.sent_positions(), vec![2]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_cursor_write_failure_redelivers() {
        let dir = temp_dir("crash");
        let cursors = CursorStore::open(&dir);
        let source = MemorySource::new();
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = wiring(sender.clone());
        let wf = workflow(vec![]);

        run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        source.append(row(serde_json::json!({"name": "a"})));
        source.append(row(serde_json::json!({"name": "b"})));

        // Sabotage the cursor file so the commit at cycle end fails.
        std::fs::remove_file(dir.join("cursors.json")).unwrap();
        std::fs::create_dir(dir.join("cursors.json")).unwrap();
        assert!(run_cycle(&source, &cursors, &dispatcher, &wf).await.is_err());
        assert_eq!(cursors.get(&wf.source_identity(), &wf.id), Some(0));

        // Store healthy again: the same range is re-fetched and
        // re-dispatched. Duplicates are possible, loss is not.
        std::fs::remove_dir(dir.join("cursors.json")).unwrap();
        let outcome = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!(outcome.dispatched, 2);
        assert_eq!(sender.sent_positions(), vec![1, 2, 1, 2]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_empty_sheet_scenario() {
        // Tick 1 on a 0-row sheet, then 3 appended rows, then 2 more
        // where row 4 fails a filter and row 5 passes.
        let dir = temp_dir("scenario");
        let cursors = CursorStore::open(&dir);
        let source = MemorySource::new();
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = wiring(sender.clone());
        let wf = workflow(vec![Predicate {
            field: "column x".into(),
            op: PredicateOp::Equals,
            value: "v".into(),
        }]);

        let t1 = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!((t1.cursor, t1.dispatched), (0, 0));

        for _ in 0..3 {
            source.append(row(serde_json::json!({"column x": "v"})));
        }
        let t2 = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!((t2.cursor, t2.dispatched), (3, 3));
        assert_eq!(sender.sent_positions(), vec![1, 2, 3]);

        source.append(row(serde_json::json!({"column x": "other"})));
        source.append(row(serde_json::json!({"column x": "v"})));
        let t3 = run_cycle(&source, &cursors, &dispatcher, &wf).await.unwrap();
        assert_eq!((t3.cursor, t3.dispatched, t3.filtered), (5, 1, 1));
        assert_eq!(sender.sent_positions(), vec![1, 2, 3, 5]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_schedule_is_idempotent_per_id() {
        let dir = temp_dir("schedule");
        let cursors = std::sync::Arc::new(CursorStore::open(&dir));
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = std::sync::Arc::new(wiring(sender.clone()));
        let mut scheduler = PollScheduler::new(cursors.clone(), dispatcher, 5);
        scheduler.register_connector(
            SourceKind::Spreadsheet,
            std::sync::Arc::new(MemorySource::with_items(vec![row(
                serde_json::json!({"name": "a"}),
            )])),
        );
        let scheduler = std::sync::Arc::new(scheduler);

        let wf = workflow(vec![]);
        scheduler.schedule(wf.clone());
        scheduler.schedule(wf.clone());
        assert_eq!(scheduler.scheduled().len(), 1);
        assert!(scheduler.is_scheduled(&wf.id));

        // First tick fires immediately and initializes the cursor.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(cursors.get(&wf.source_identity(), &wf.id), Some(1));
        assert!(sender.sent.lock().unwrap().is_empty());

        scheduler.unschedule(&wf.id);
        assert!(!scheduler.is_scheduled(&wf.id));
        // Unknown id: tolerant no-op.
        scheduler.unschedule("wf-unknown");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_extreme_poll_interval_is_clamped() {
        let dir = temp_dir("clamp");
        let cursors = std::sync::Arc::new(CursorStore::open(&dir));
        let sender = std::sync::Arc::new(RecordingSender::new());
        let dispatcher = std::sync::Arc::new(wiring(sender));
        let mut scheduler = PollScheduler::new(cursors.clone(), dispatcher, 5);
        scheduler.register_connector(
            SourceKind::Spreadsheet,
            std::sync::Arc::new(MemorySource::new()),
        );
        let scheduler = std::sync::Arc::new(scheduler);

        let mut wf = workflow(vec![]);
        wf.poll_minutes = Some(u64::MAX);
        scheduler.schedule(wf.clone());
        assert_eq!(
            scheduler.scheduled()[0].schedule,
            format!("every {}m", 60 * 24 * 7)
        );

        // The immediate first tick must run without the timer
        // arithmetic panicking.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(cursors.get(&wf.source_identity(), &wf.id), Some(0));
        scheduler.unschedule(&wf.id);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_unconfigured_source_not_scheduled() {
        let dir = temp_dir("noconn");
        let cursors = std::sync::Arc::new(CursorStore::open(&dir));
        let dispatcher = std::sync::Arc::new(Dispatcher::new());
        let scheduler = std::sync::Arc::new(PollScheduler::new(cursors, dispatcher, 5));

        // No spreadsheet connector registered.
        scheduler.schedule(workflow(vec![]));
        assert!(scheduler.scheduled().is_empty());

        // Webhook workflows are push-driven, never polled.
        let mut wf = workflow(vec![]);
        wf.source = SourceKind::Webhook;
        scheduler.schedule(wf);
        assert!(scheduler.scheduled().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
