use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;

use flowwatch_core::error::{FlowwatchError, Result};
use flowwatch_core::traits::EngineApi;
use flowwatch_core::types::*;

/// A scripted response. `Err` strings surface as [`FlowwatchError::Http`].
pub type Scripted<T> = std::result::Result<T, String>;

/// Responses handed out in order; the last one repeats once the rest are used.
struct Script<T> {
    queue: VecDeque<Scripted<T>>,
}

impl<T: Clone> Script<T> {
    fn new(responses: Vec<Scripted<T>>) -> Self {
        Self {
            queue: responses.into(),
        }
    }

    fn next(&mut self, what: &str) -> Result<T> {
        let response = if self.queue.len() > 1 {
            self.queue.pop_front()
        } else {
            self.queue.front().cloned()
        };
        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(msg)) => Err(FlowwatchError::Http(msg)),
            None => Err(FlowwatchError::NotFound(what.to_string())),
        }
    }
}

#[derive(Default)]
struct Calls {
    details: Vec<Instant>,
    runs: HashMap<String, usize>,
    run_workflow: usize,
    start_run: usize,
    last_run_input: Option<Value>,
    last_trigger_data: Option<Value>,
}

/// In-memory [`EngineApi`] whose responses are scripted per endpoint.
///
/// Unscripted endpoints answer `NotFound`. Every call is counted, and
/// `get_run` can be held back per run id with [`gate_run`](Self::gate_run)
/// to order completions in tests.
pub struct ScriptedEngine {
    workflows: Mutex<Script<Vec<Workflow>>>,
    example: Mutex<Script<Workflow>>,
    details: Mutex<Script<WorkflowDetails>>,
    runs: Mutex<HashMap<String, Script<RunRecord>>>,
    rerun: Mutex<Script<RunId>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Calls>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            workflows: Mutex::new(Script::new(vec![])),
            example: Mutex::new(Script::new(vec![])),
            details: Mutex::new(Script::new(vec![])),
            runs: Mutex::new(HashMap::new()),
            rerun: Mutex::new(Script::new(vec![])),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn workflows(self, workflows: Vec<Workflow>) -> Self {
        *lock(&self.workflows) = Script::new(vec![Ok(workflows)]);
        self
    }

    pub fn example(self, workflow: Workflow) -> Self {
        *lock(&self.example) = Script::new(vec![Ok(workflow)]);
        self
    }

    /// Responses for successive `workflow_details` calls.
    pub fn details(self, responses: Vec<Scripted<WorkflowDetails>>) -> Self {
        *lock(&self.details) = Script::new(responses);
        self
    }

    /// Responses for successive `get_run(run_id)` calls.
    pub fn run(self, run_id: &str, responses: Vec<Scripted<RunRecord>>) -> Self {
        lock(&self.runs).insert(run_id.to_string(), Script::new(responses));
        self
    }

    /// Result of `run_workflow`, also used for the id `start_run` reports.
    pub fn rerun_result(self, result: Scripted<RunId>) -> Self {
        *lock(&self.rerun) = Script::new(vec![result]);
        self
    }

    /// Hold every `get_run(run_id)` until the returned handle is notified
    /// once per call.
    pub fn gate_run(&self, run_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates).insert(run_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn details_calls(&self) -> usize {
        lock(&self.calls).details.len()
    }

    /// When each `workflow_details` call was made.
    pub fn details_call_times(&self) -> Vec<Instant> {
        lock(&self.calls).details.clone()
    }

    pub fn run_calls(&self, run_id: &str) -> usize {
        lock(&self.calls).runs.get(run_id).copied().unwrap_or(0)
    }

    pub fn run_workflow_calls(&self) -> usize {
        lock(&self.calls).run_workflow
    }

    pub fn start_run_calls(&self) -> usize {
        lock(&self.calls).start_run
    }

    /// Body of the most recent `run_workflow` call.
    pub fn last_run_input(&self) -> Option<Value> {
        lock(&self.calls).last_run_input.clone()
    }

    /// `trigger_data` of the most recent `start_run` call.
    pub fn last_trigger_data(&self) -> Option<Value> {
        lock(&self.calls).last_trigger_data.clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EngineApi for ScriptedEngine {
    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move { lock(&self.workflows).next("workflows") })
    }

    fn create_example_workflow(&self) -> BoxFuture<'_, Result<Workflow>> {
        Box::pin(async move { lock(&self.example).next("example") })
    }

    fn workflow_details(&self, id: &WorkflowId) -> BoxFuture<'_, Result<WorkflowDetails>> {
        let what = format!("workflow {id}");
        Box::pin(async move {
            lock(&self.calls).details.push(Instant::now());
            lock(&self.details).next(&what)
        })
    }

    fn run_workflow(&self, _id: &WorkflowId, input: Value) -> BoxFuture<'_, Result<RunId>> {
        Box::pin(async move {
            {
                let mut calls = lock(&self.calls);
                calls.run_workflow += 1;
                calls.last_run_input = Some(input);
            }
            lock(&self.rerun).next("run")
        })
    }

    fn get_run(&self, id: &RunId) -> BoxFuture<'_, Result<RunRecord>> {
        let run_id = id.as_str().to_string();
        Box::pin(async move {
            *lock(&self.calls).runs.entry(run_id.clone()).or_default() += 1;

            let gate = lock(&self.gates).get(&run_id).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            match lock(&self.runs).get_mut(&run_id) {
                Some(script) => script.next(&run_id),
                None => Err(FlowwatchError::NotFound(format!("run {run_id}"))),
            }
        })
    }

    fn start_run(
        &self,
        workflow_id: &WorkflowId,
        trigger_data: Value,
    ) -> BoxFuture<'_, Result<StartedRun>> {
        let workflow_id = workflow_id.clone();
        Box::pin(async move {
            {
                let mut calls = lock(&self.calls);
                calls.start_run += 1;
                calls.last_trigger_data = Some(trigger_data);
            }
            let id = lock(&self.rerun).next("run")?;
            Ok(StartedRun {
                id,
                workflow_id: Some(workflow_id),
                status: RunStatus::Pending,
                message: Some("Workflow execution started".to_string()),
            })
        })
    }
}
