use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Read/write interface to the remote execution engine.
///
/// Implementations own their arguments inside the returned future, so callers
/// may drop the borrowed ids as soon as the call returns.
pub trait EngineApi: Send + Sync + 'static {
    /// `GET /api/workflows/`
    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>>;

    /// `POST /api/workflows/example`
    fn create_example_workflow(&self) -> BoxFuture<'_, Result<Workflow>>;

    /// `GET /api/workflows/{id}/details`
    fn workflow_details(&self, id: &WorkflowId) -> BoxFuture<'_, Result<WorkflowDetails>>;

    /// `POST /api/workflows/{id}/run` with a free-form JSON body.
    fn run_workflow(
        &self,
        id: &WorkflowId,
        input: serde_json::Value,
    ) -> BoxFuture<'_, Result<RunId>>;

    /// `GET /api/runs/{id}`
    fn get_run(&self, id: &RunId) -> BoxFuture<'_, Result<RunRecord>>;

    /// `POST /api/runs/` with `{workflow_id, trigger_data}`.
    fn start_run(
        &self,
        workflow_id: &WorkflowId,
        trigger_data: serde_json::Value,
    ) -> BoxFuture<'_, Result<StartedRun>>;
}
