use std::sync::Arc;

use flowwatch_core::error::Result;
use flowwatch_core::types::{
    NodeExecution, RunId, RunRecord, RunSummary, WorkflowDefinition, WorkflowDetails,
    WorkflowId,
};

/// Issued when a summary fetch starts; must be handed back with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryTicket(u64);

/// Issued when an execution snapshot fetch starts for `run_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionsTicket {
    run_id: RunId,
    seq: u64,
}

impl ExecutionsTicket {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// The summary was stored. `fetch` is set when a run was auto-selected
    /// and its snapshot should now be loaded.
    Applied { fetch: Option<ExecutionsTicket> },
    /// An older response arrived after a newer one; dropped.
    Stale,
    /// The fetch failed; previous state kept. `transient` is false when a
    /// retry cannot succeed on its own (e.g. the workflow is gone).
    Failed { transient: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionsOutcome {
    Applied,
    Stale,
    Failed { transient: bool },
}

/// Single-writer state for one watched workflow.
///
/// Pure reducer: it never performs I/O. Callers take a ticket before each
/// fetch and return it with the result; results whose ticket no longer
/// matches the current selection are dropped. Derived collections are kept
/// behind `Arc`s that only change identity when their value changes.
#[derive(Debug)]
pub struct RunStateStore {
    workflow_id: WorkflowId,
    summary: Option<Arc<WorkflowDetails>>,
    definition: Arc<WorkflowDefinition>,
    selected_run: Option<RunId>,
    record: Option<Arc<RunRecord>>,
    executions: Arc<Vec<NodeExecution>>,
    awaiting_run: Option<RunId>,
    summary_error: Option<String>,
    executions_error: Option<String>,

    summary_seq: u64,
    summary_applied: u64,
    summary_settled: u64,
    executions_seq: u64,
    executions_applied: u64,
}

impl RunStateStore {
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            summary: None,
            definition: Arc::new(WorkflowDefinition::default()),
            selected_run: None,
            record: None,
            executions: Arc::new(Vec::new()),
            awaiting_run: None,
            summary_error: None,
            executions_error: None,
            summary_seq: 0,
            summary_applied: 0,
            summary_settled: 0,
            executions_seq: 0,
            executions_applied: 0,
        }
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn begin_summary(&mut self) -> SummaryTicket {
        self.summary_seq += 1;
        SummaryTicket(self.summary_seq)
    }

    /// True while the newest summary fetch has not come back yet.
    pub fn summary_in_flight(&self) -> bool {
        self.summary_seq > self.summary_settled
    }

    pub fn apply_summary(
        &mut self,
        ticket: SummaryTicket,
        result: Result<WorkflowDetails>,
    ) -> SummaryOutcome {
        let SummaryTicket(seq) = ticket;
        self.summary_settled = self.summary_settled.max(seq);
        if seq <= self.summary_applied {
            return SummaryOutcome::Stale;
        }

        let details = match result {
            Ok(details) => details,
            Err(e) => {
                self.summary_error = Some(e.to_string());
                return SummaryOutcome::Failed {
                    transient: e.is_transient(),
                };
            }
        };
        self.summary_applied = seq;
        self.summary_error = None;

        let definition = details
            .latest_version
            .as_ref()
            .map(|v| v.definition.clone())
            .unwrap_or_default();
        if *self.definition != definition {
            self.definition = Arc::new(definition);
        }

        if let Some(awaiting) = &self.awaiting_run {
            if details.run(awaiting).is_some() {
                self.awaiting_run = None;
            }
        }

        let auto = match (&self.selected_run, details.latest_run()) {
            (None, Some(latest)) => Some(latest.id.clone()),
            _ => None,
        };

        if self.summary.as_deref() != Some(&details) {
            self.summary = Some(Arc::new(details));
        }

        let fetch = auto.map(|run_id| self.select_run(run_id));
        SummaryOutcome::Applied { fetch }
    }

    /// Select `run_id`, drop the previous snapshot and return the ticket for
    /// loading the new one.
    pub fn select_run(&mut self, run_id: RunId) -> ExecutionsTicket {
        self.record = None;
        if !self.executions.is_empty() {
            self.executions = Arc::new(Vec::new());
        }
        self.selected_run = Some(run_id.clone());
        self.executions_seq += 1;
        ExecutionsTicket {
            run_id,
            seq: self.executions_seq,
        }
    }

    /// Ticket for refreshing the selected run, if there is one.
    pub fn begin_executions(&mut self) -> Option<ExecutionsTicket> {
        let run_id = self.selected_run.clone()?;
        self.executions_seq += 1;
        Some(ExecutionsTicket {
            run_id,
            seq: self.executions_seq,
        })
    }

    pub fn apply_executions(
        &mut self,
        ticket: ExecutionsTicket,
        result: Result<RunRecord>,
    ) -> ExecutionsOutcome {
        if self.selected_run.as_ref() != Some(&ticket.run_id)
            || ticket.seq <= self.executions_applied
        {
            return ExecutionsOutcome::Stale;
        }

        let mut record = match result {
            Ok(record) => record,
            Err(e) => {
                self.executions_error = Some(e.to_string());
                return ExecutionsOutcome::Failed {
                    transient: e.is_transient(),
                };
            }
        };
        self.executions_applied = ticket.seq;
        self.executions_error = None;

        let executions = std::mem::take(&mut record.node_executions);
        if *self.executions != executions {
            self.executions = Arc::new(executions);
        }
        if self.record.as_deref() != Some(&record) {
            self.record = Some(Arc::new(record));
        }
        ExecutionsOutcome::Applied
    }

    /// Select a run the engine has just created but may not list yet. The
    /// store reports live until a summary includes it.
    pub fn expect_run(&mut self, run_id: RunId) -> ExecutionsTicket {
        self.awaiting_run = Some(run_id.clone());
        self.select_run(run_id)
    }

    pub fn awaiting_run(&self) -> Option<&RunId> {
        self.awaiting_run.as_ref()
    }

    /// Whether the workflow's most recent run is still pending or running,
    /// whichever run is selected. Statuses outside the known set count as
    /// not live.
    pub fn is_live(&self) -> bool {
        if self.awaiting_run.is_some() {
            return true;
        }
        self.summary
            .as_deref()
            .and_then(|s| s.latest_run())
            .is_some_and(|r| r.status.is_live())
    }

    pub fn summary(&self) -> Option<&Arc<WorkflowDetails>> {
        self.summary.as_ref()
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn selected_run(&self) -> Option<&RunId> {
        self.selected_run.as_ref()
    }

    /// The selected run's entry in the recent-runs list.
    pub fn selected_summary(&self) -> Option<&RunSummary> {
        let id = self.selected_run.as_ref()?;
        self.summary.as_deref()?.run(id)
    }

    /// The selected run's record, minus its executions.
    pub fn record(&self) -> Option<&Arc<RunRecord>> {
        self.record.as_ref()
    }

    pub fn executions(&self) -> &Arc<Vec<NodeExecution>> {
        &self.executions
    }

    pub fn summary_error(&self) -> Option<&str> {
        self.summary_error.as_deref()
    }

    pub fn executions_error(&self) -> Option<&str> {
        self.executions_error.as_deref()
    }

    /// The most relevant unresolved read failure, summary first.
    pub fn last_error(&self) -> Option<&str> {
        self.summary_error
            .as_deref()
            .or(self.executions_error.as_deref())
    }

    /// Trigger input of the current snapshot, for re-running it. `None` when
    /// the snapshot is empty; `{}` when the trigger carried no input.
    pub fn trigger_input(&self, trigger_type: &str) -> Option<serde_json::Value> {
        if self.executions.is_empty() {
            return None;
        }
        let input = self
            .executions
            .iter()
            .find(|ex| ex.node_type == trigger_type)
            .and_then(|ex| ex.input_data.clone())
            .unwrap_or_else(|| serde_json::json!({}));
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowwatch_core::error::FlowwatchError;
    use flowwatch_core::types::NodeStatus;
    use flowwatch_test_utils::fixtures;

    fn store() -> RunStateStore {
        RunStateStore::new(WorkflowId::from_str("wf-1"))
    }

    fn run(id: &str) -> RunId {
        RunId::from_str(id)
    }

    #[test]
    fn test_summary_auto_selects_latest_run() {
        let mut s = store();
        let ticket = s.begin_summary();
        assert!(s.summary_in_flight());

        let details = fixtures::details(&[("run-2", "running"), ("run-1", "completed")]);
        let outcome = s.apply_summary(ticket, Ok(details));

        let SummaryOutcome::Applied { fetch: Some(fetch) } = outcome else {
            panic!("expected auto-selection, got {outcome:?}");
        };
        assert_eq!(fetch.run_id(), &run("run-2"));
        assert_eq!(s.selected_run(), Some(&run("run-2")));
        assert!(s.is_live());
        assert!(!s.summary_in_flight());
        assert_eq!(s.definition().nodes.len(), 3);
    }

    #[test]
    fn test_summary_keeps_existing_selection() {
        let mut s = store();
        s.select_run(run("run-1"));
        let ticket = s.begin_summary();
        let outcome = s.apply_summary(
            ticket,
            Ok(fixtures::details(&[("run-2", "running"), ("run-1", "completed")])),
        );
        assert_eq!(outcome, SummaryOutcome::Applied { fetch: None });
        assert_eq!(s.selected_run(), Some(&run("run-1")));
        // run-2 is still running, so the workflow stays live.
        assert!(s.is_live());
    }

    #[test]
    fn test_liveness_follows_latest_run_not_selection() {
        let mut s = store();
        let ticket = s.select_run(run("run-1"));
        s.apply_executions(ticket, Ok(fixtures::run_record("run-1", "running", vec![])));

        let t1 = s.begin_summary();
        s.apply_summary(
            t1,
            Ok(fixtures::details(&[("run-2", "completed"), ("run-1", "running")])),
        );
        assert!(!s.is_live());
    }

    #[test]
    fn test_empty_run_list_selects_nothing() {
        let mut s = store();
        let ticket = s.begin_summary();
        let outcome = s.apply_summary(ticket, Ok(fixtures::details(&[])));
        assert_eq!(outcome, SummaryOutcome::Applied { fetch: None });
        assert!(s.selected_run().is_none());
        assert!(!s.is_live());
    }

    #[test]
    fn test_summary_failure_keeps_previous_state() {
        let mut s = store();
        let t1 = s.begin_summary();
        s.apply_summary(t1, Ok(fixtures::details(&[("run-1", "running")])));
        let before = Arc::clone(s.summary().unwrap());

        let t2 = s.begin_summary();
        let outcome = s.apply_summary(t2, Err(FlowwatchError::Http("connection reset".into())));
        assert_eq!(outcome, SummaryOutcome::Failed { transient: true });
        assert!(Arc::ptr_eq(s.summary().unwrap(), &before));
        assert!(s.last_error().unwrap().contains("connection reset"));
        assert!(s.is_live());

        let t3 = s.begin_summary();
        s.apply_summary(t3, Ok(fixtures::details(&[("run-1", "completed")])));
        assert!(s.last_error().is_none());
        assert!(!s.is_live());
    }

    #[test]
    fn test_older_summary_response_is_stale() {
        let mut s = store();
        let older = s.begin_summary();
        let newer = s.begin_summary();
        s.apply_summary(newer, Ok(fixtures::details(&[("run-1", "completed")])));
        let outcome = s.apply_summary(older, Ok(fixtures::details(&[("run-1", "running")])));
        assert_eq!(outcome, SummaryOutcome::Stale);
        assert!(!s.is_live());
    }

    #[test]
    fn test_missing_version_gives_empty_definition() {
        let mut s = store();
        let mut details = fixtures::details(&[]);
        details.latest_version = None;
        let ticket = s.begin_summary();
        s.apply_summary(ticket, Ok(details));
        assert!(s.definition().nodes.is_empty());
        assert!(s.definition().edges.is_empty());
    }

    #[test]
    fn test_unchanged_definition_keeps_identity() {
        let mut s = store();
        let t1 = s.begin_summary();
        s.apply_summary(t1, Ok(fixtures::details(&[("run-1", "running")])));
        let def = Arc::clone(s.definition());

        let t2 = s.begin_summary();
        s.apply_summary(t2, Ok(fixtures::details(&[("run-1", "completed")])));
        assert!(Arc::ptr_eq(s.definition(), &def));
    }

    #[test]
    fn test_select_run_clears_snapshot() {
        let mut s = store();
        let ticket = s.select_run(run("run-a"));
        let record = fixtures::run_record(
            "run-a",
            "completed",
            vec![fixtures::execution("trigger-1", "trigger", NodeStatus::Success)],
        );
        assert_eq!(s.apply_executions(ticket, Ok(record)), ExecutionsOutcome::Applied);
        assert_eq!(s.executions().len(), 1);

        s.select_run(run("run-b"));
        assert!(s.executions().is_empty());
        assert!(s.record().is_none());
    }

    #[test]
    fn test_in_flight_fetch_for_previous_run_is_discarded() {
        let mut s = store();
        let ticket_a = s.select_run(run("run-a"));
        let ticket_b = s.select_run(run("run-b"));

        let record_b = fixtures::run_record(
            "run-b",
            "running",
            vec![fixtures::execution("ai-agent-1", "aiAgent", NodeStatus::Running)],
        );
        assert_eq!(s.apply_executions(ticket_b, Ok(record_b)), ExecutionsOutcome::Applied);
        let b_snapshot = Arc::clone(s.executions());

        let record_a = fixtures::run_record(
            "run-a",
            "completed",
            vec![fixtures::execution("output-1", "output", NodeStatus::Success)],
        );
        assert_eq!(s.apply_executions(ticket_a, Ok(record_a)), ExecutionsOutcome::Stale);
        assert!(Arc::ptr_eq(s.executions(), &b_snapshot));
        assert_eq!(s.executions()[0].node_id, "ai-agent-1");
    }

    #[test]
    fn test_reselecting_same_run_drops_older_ticket() {
        let mut s = store();
        let first = s.select_run(run("run-a"));
        let second = s.begin_executions().unwrap();

        let fresh = fixtures::run_record(
            "run-a",
            "running",
            vec![fixtures::execution("ai-agent-1", "aiAgent", NodeStatus::Running)],
        );
        s.apply_executions(second, Ok(fresh));
        let old = fixtures::run_record("run-a", "running", vec![]);
        assert_eq!(s.apply_executions(first, Ok(old)), ExecutionsOutcome::Stale);
        assert_eq!(s.executions().len(), 1);
    }

    #[test]
    fn test_execution_failure_keeps_snapshot() {
        let mut s = store();
        let t1 = s.select_run(run("run-a"));
        let record = fixtures::run_record(
            "run-a",
            "running",
            vec![fixtures::execution("trigger-1", "trigger", NodeStatus::Success)],
        );
        s.apply_executions(t1, Ok(record));

        let t2 = s.begin_executions().unwrap();
        let outcome = s.apply_executions(t2, Err(FlowwatchError::Decode("bad json".into())));
        assert_eq!(outcome, ExecutionsOutcome::Failed { transient: true });
        assert_eq!(s.executions().len(), 1);
        assert!(s.last_error().is_some());

        let t3 = s.begin_executions().unwrap();
        let outcome = s.apply_executions(t3, Err(FlowwatchError::NotFound("run run-a".into())));
        assert_eq!(outcome, ExecutionsOutcome::Failed { transient: false });
        assert!(s.executions_error().unwrap().contains("run-a"));
    }

    #[test]
    fn test_equal_snapshot_keeps_identity() {
        let mut s = store();
        let executions = vec![fixtures::execution("trigger-1", "trigger", NodeStatus::Success)];
        let t1 = s.select_run(run("run-a"));
        s.apply_executions(t1, Ok(fixtures::run_record("run-a", "running", executions.clone())));
        let first = Arc::clone(s.executions());

        let t2 = s.begin_executions().unwrap();
        s.apply_executions(t2, Ok(fixtures::run_record("run-a", "running", executions)));
        assert!(Arc::ptr_eq(s.executions(), &first));
    }

    #[test]
    fn test_expected_run_is_live_until_listed() {
        let mut s = store();
        let t1 = s.begin_summary();
        s.apply_summary(t1, Ok(fixtures::details(&[("run-1", "completed")])));
        assert!(!s.is_live());

        s.expect_run(run("run-2"));
        assert!(s.is_live());
        assert_eq!(s.selected_run(), Some(&run("run-2")));

        // Not listed yet: still live.
        let t2 = s.begin_summary();
        s.apply_summary(t2, Ok(fixtures::details(&[("run-1", "completed")])));
        assert!(s.is_live());

        let t3 = s.begin_summary();
        s.apply_summary(
            t3,
            Ok(fixtures::details(&[("run-2", "pending"), ("run-1", "completed")])),
        );
        assert!(s.awaiting_run().is_none());
        assert!(s.is_live());
    }

    #[test]
    fn test_unknown_run_status_is_not_live() {
        let mut s = store();
        let ticket = s.begin_summary();
        s.apply_summary(ticket, Ok(fixtures::details(&[("run-1", "paused")])));
        assert!(!s.is_live());
    }

    #[test]
    fn test_trigger_input() {
        let mut s = store();
        assert!(s.trigger_input("trigger").is_none());

        let mut trigger = fixtures::execution("trigger-1", "trigger", NodeStatus::Success);
        trigger.input_data = Some(serde_json::json!({"article_urls": ["https://a.example"]}));
        let ticket = s.select_run(run("run-a"));
        s.apply_executions(ticket, Ok(fixtures::run_record("run-a", "completed", vec![trigger])));
        assert_eq!(
            s.trigger_input("trigger").unwrap()["article_urls"][0],
            "https://a.example"
        );

        let ticket = s.select_run(run("run-b"));
        let agent = fixtures::execution("ai-agent-1", "aiAgent", NodeStatus::Success);
        s.apply_executions(ticket, Ok(fixtures::run_record("run-b", "completed", vec![agent])));
        assert_eq!(s.trigger_input("trigger").unwrap(), serde_json::json!({}));
    }
}
