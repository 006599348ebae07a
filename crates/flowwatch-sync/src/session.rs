use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flowwatch_core::config::AppConfig;
use flowwatch_core::error::{FlowwatchError, Result};
use flowwatch_core::traits::EngineApi;
use flowwatch_core::types::{RunId, RunRecord, WorkflowDetails, WorkflowId};

use crate::annotate::{AnnotatedGraph, GraphAnnotator};
use crate::highlight::HighlightController;
use crate::output::{OutputExtractor, OutputView};
use crate::poller::{PollTick, PollingController};
use crate::store::{
    ExecutionsOutcome, ExecutionsTicket, RunStateStore, SummaryOutcome, SummaryTicket,
};

/// Everything that can change a session's state. Produced by fetch tasks and
/// the poll timer, consumed one at a time by [`WatchSession::handle`].
#[derive(Debug)]
pub enum SyncMessage {
    Summary {
        ticket: SummaryTicket,
        result: Result<WorkflowDetails>,
    },
    Executions {
        ticket: ExecutionsTicket,
        result: Result<RunRecord>,
    },
    Tick(PollTick),
    RerunStarted(Result<RunId>),
}

/// Timing and node-naming conventions for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub highlight_duration: Duration,
    pub notice_duration: Duration,
    pub summarizer_node_id: String,
    pub output_node_type: String,
    pub trigger_node_type: String,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.watch.poll_interval(),
            highlight_duration: config.watch.highlight_duration(),
            notice_duration: config.watch.notice_duration(),
            summarizer_node_id: config.output.summarizer_node_id.clone(),
            output_node_type: config.output.output_node_type.clone(),
            trigger_node_type: config.output.trigger_node_type.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A short-lived message for the user, cleared by [`WatchSession::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub deadline: Instant,
}

/// Watch state for one workflow.
///
/// The session is the only writer of its store. Fetches run as spawned tasks
/// and report back through the session's channel; the owner pulls them with
/// [`next_message`](Self::next_message) and applies them with
/// [`handle`](Self::handle). Every task is tied to the session's
/// cancellation token, so once the session is shut down or dropped no
/// completion can reach it.
pub struct WatchSession {
    engine: Arc<dyn EngineApi>,
    settings: SessionSettings,
    store: RunStateStore,
    poller: PollingController,
    highlight: HighlightController,
    annotator: GraphAnnotator,
    extractor: OutputExtractor,
    output: Option<Arc<OutputView>>,
    output_revision: u64,
    notice: Option<Notice>,
    rerun_in_flight: bool,
    /// Set by a read failure that retrying cannot fix; polling stays off
    /// until the user selects a run, refreshes or re-runs.
    halted: bool,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<SyncMessage>,
    rx: mpsc::UnboundedReceiver<SyncMessage>,
}

impl WatchSession {
    pub fn new(
        engine: Arc<dyn EngineApi>,
        workflow_id: WorkflowId,
        settings: SessionSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        Self {
            poller: PollingController::new(settings.poll_interval, cancel.clone(), tx.clone()),
            highlight: HighlightController::new(settings.highlight_duration),
            extractor: OutputExtractor::new(settings.summarizer_node_id.clone()),
            annotator: GraphAnnotator::new(),
            store: RunStateStore::new(workflow_id),
            engine,
            settings,
            output: None,
            output_revision: 0,
            notice: None,
            rerun_in_flight: false,
            halted: false,
            cancel,
            tx,
            rx,
        }
    }

    /// Fetch the workflow summary. The result arrives as a message.
    pub fn load_summary(&mut self) {
        let ticket = self.store.begin_summary();
        let engine = Arc::clone(&self.engine);
        let workflow_id = self.store.workflow_id().clone();
        self.spawn(async move {
            let result = engine.workflow_details(&workflow_id).await;
            SyncMessage::Summary { ticket, result }
        });
    }

    /// Refresh the selected run's snapshot, if a run is selected.
    pub fn load_executions(&mut self) {
        if let Some(ticket) = self.store.begin_executions() {
            self.fetch_executions(ticket);
        }
    }

    /// Reload the summary and the selected run, resuming polling after a
    /// permanent read failure.
    pub fn refresh(&mut self) {
        self.halted = false;
        self.load_summary();
        self.load_executions();
    }

    /// Switch to `run_id`. Cancels the running poll timer and any pending
    /// snapshot for the previous run is discarded when it lands.
    pub fn select_run(&mut self, run_id: RunId) {
        info!(run = %run_id, "Selecting run");
        self.halted = false;
        let ticket = self.store.select_run(run_id);
        self.refresh_output();
        self.fetch_executions(ticket);
        self.poller.stop();
        self.sync_polling();
    }

    pub fn highlight_node(&mut self, node_id: impl Into<String>) {
        self.highlight.highlight(node_id, Instant::now());
    }

    /// Start a new run of the workflow with the selected run's trigger input.
    ///
    /// Rejected while a previous rerun is still in flight or when there is no
    /// snapshot to take the input from. The outcome arrives as
    /// [`SyncMessage::RerunStarted`]; failures are not retried.
    pub fn rerun(&mut self) -> Result<()> {
        if self.rerun_in_flight {
            return Err(FlowwatchError::Busy("a re-run is already starting".into()));
        }
        let input = self
            .store
            .trigger_input(&self.settings.trigger_node_type)
            .ok_or_else(|| {
                FlowwatchError::InvalidRequest("no executions to re-run from".into())
            })?;

        self.rerun_in_flight = true;
        let engine = Arc::clone(&self.engine);
        let workflow_id = self.store.workflow_id().clone();
        info!(workflow = %workflow_id, "Re-running workflow");
        self.spawn(async move {
            SyncMessage::RerunStarted(engine.run_workflow(&workflow_id, input).await)
        });
        Ok(())
    }

    pub async fn next_message(&mut self) -> Option<SyncMessage> {
        self.rx.recv().await
    }

    pub fn try_next_message(&mut self) -> Option<SyncMessage> {
        self.rx.try_recv().ok()
    }

    /// Apply one message. Returns true when anything visible changed.
    pub fn handle(&mut self, msg: SyncMessage) -> bool {
        match msg {
            SyncMessage::Summary { ticket, result } => self.on_summary(ticket, result),
            SyncMessage::Executions { ticket, result } => self.on_executions(ticket, result),
            SyncMessage::Tick(tick) => {
                self.on_tick(tick);
                false
            }
            SyncMessage::RerunStarted(result) => {
                self.on_rerun(result);
                true
            }
        }
    }

    fn on_summary(&mut self, ticket: SummaryTicket, result: Result<WorkflowDetails>) -> bool {
        let changed = match self.store.apply_summary(ticket, result) {
            SummaryOutcome::Applied { fetch } => {
                if let Some(ticket) = fetch {
                    info!(run = %ticket.run_id(), "Auto-selected latest run");
                    self.refresh_output();
                    self.fetch_executions(ticket);
                }
                true
            }
            SummaryOutcome::Failed { transient: true } => {
                warn!(
                    error = self.store.summary_error().unwrap_or_default(),
                    "Summary refresh failed, keeping previous state"
                );
                true
            }
            SummaryOutcome::Failed { transient: false } => {
                let err = self.store.summary_error().unwrap_or_default().to_string();
                self.halt(format!("Workflow unavailable: {err}"));
                true
            }
            SummaryOutcome::Stale => {
                debug!("Dropped stale summary");
                false
            }
        };
        self.sync_polling();
        changed
    }

    fn on_executions(&mut self, ticket: ExecutionsTicket, result: Result<RunRecord>) -> bool {
        let run_id = ticket.run_id().clone();
        match self.store.apply_executions(ticket, result) {
            ExecutionsOutcome::Applied => {
                self.refresh_output();
                self.sync_polling();
                true
            }
            ExecutionsOutcome::Failed { transient: true } => {
                warn!(
                    run = %run_id,
                    error = self.store.executions_error().unwrap_or_default(),
                    "Snapshot refresh failed, keeping previous state"
                );
                true
            }
            ExecutionsOutcome::Failed { transient: false } => {
                let err = self.store.executions_error().unwrap_or_default().to_string();
                self.halt(format!("Run {} unavailable: {err}", run_id.short()));
                true
            }
            ExecutionsOutcome::Stale => {
                debug!(run = %run_id, "Dropped stale snapshot");
                false
            }
        }
    }

    fn on_tick(&mut self, tick: PollTick) {
        if !self.poller.accepts(&tick) {
            debug!(generation = tick.generation, "Ignoring tick from stopped timer");
            return;
        }
        if self.store.summary_in_flight() {
            debug!("Previous poll still in flight, skipping tick");
            return;
        }
        self.load_summary();
        self.load_executions();
    }

    fn on_rerun(&mut self, result: Result<RunId>) {
        self.rerun_in_flight = false;
        match result {
            Ok(run_id) => {
                info!(run = %run_id, "Re-run started");
                self.notify(
                    NoticeLevel::Info,
                    format!("Started run {}", run_id.short()),
                );
                self.halted = false;
                let ticket = self.store.expect_run(run_id);
                self.refresh_output();
                self.fetch_executions(ticket);
                self.load_summary();
                self.poller.restart();
            }
            Err(e) => {
                error!(error = %e, "Re-run failed");
                self.notify(NoticeLevel::Error, format!("Re-run failed: {e}"));
            }
        }
    }

    /// Expire the highlight and the notice. Returns true if either cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.highlight.expire(now);
        if self.notice.as_ref().is_some_and(|n| now >= n.deadline) {
            self.notice = None;
            changed = true;
        }
        changed
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notice = Some(Notice {
            level,
            text: text.into(),
            deadline: Instant::now() + self.settings.notice_duration,
        });
    }

    fn halt(&mut self, text: String) {
        warn!(error = %text, "Read failure will not clear on retry, polling halted");
        self.halted = true;
        self.poller.stop();
        self.notify(NoticeLevel::Error, text);
    }

    fn sync_polling(&mut self) {
        self.poller.sync(self.store.is_live() && !self.halted);
    }

    /// Stop polling and orphan every in-flight fetch.
    pub fn shutdown(&mut self) {
        self.poller.stop();
        self.cancel.cancel();
    }

    /// The annotated graph for the current snapshot and highlight.
    pub fn graph(&mut self) -> Arc<AnnotatedGraph> {
        self.annotator.annotate(
            self.store.definition(),
            self.store.executions(),
            self.highlight.current(),
        )
    }

    pub fn output(&self) -> Option<&Arc<OutputView>> {
        self.output.as_ref()
    }

    /// Bumped every time the output view changes value.
    pub fn output_revision(&self) -> u64 {
        self.output_revision
    }

    pub fn store(&self) -> &RunStateStore {
        &self.store
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_live(&self) -> bool {
        self.store.is_live()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlight.current()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn rerun_in_flight(&self) -> bool {
        self.rerun_in_flight
    }

    fn refresh_output(&mut self) {
        let next = self
            .extractor
            .from_snapshot(self.store.executions(), &self.settings.output_node_type);
        if self.output.as_deref() != next.as_ref() {
            self.output = next.map(Arc::new);
            self.output_revision += 1;
        }
    }

    fn fetch_executions(&self, ticket: ExecutionsTicket) {
        let engine = Arc::clone(&self.engine);
        self.spawn(async move {
            let result = engine.get_run(ticket.run_id()).await;
            SyncMessage::Executions { ticket, result }
        });
    }

    fn spawn<F>(&self, fetch: F)
    where
        F: Future<Output = SyncMessage> + Send + 'static,
    {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                msg = fetch => {
                    let _ = tx.send(msg);
                }
            }
        });
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
