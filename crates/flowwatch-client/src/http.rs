use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowwatch_core::config::EngineConfig;
use flowwatch_core::error::{FlowwatchError, Result};
use flowwatch_core::traits::EngineApi;
use flowwatch_core::types::*;

/// Longest error body carried into an error message.
const MAX_ERROR_BODY: usize = 300;

/// `EngineApi` over the engine's JSON HTTP endpoints.
pub struct HttpEngine {
    http: Client,
    base_url: String,
}

impl HttpEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FlowwatchError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: String) -> Result<T> {
        let url = self.endpoint(&path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FlowwatchError::Http(e.to_string()))?;
        decode(response, &path).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: String, body: &B) -> Result<T> {
        let url = self.endpoint(&path);
        debug!(%url, "POST");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| FlowwatchError::Http(e.to_string()))?;
        decode(response, &path).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FlowwatchError::Http(e.to_string()))?;

    if !status.is_success() {
        return Err(status_error(status, path, &body));
    }

    serde_json::from_str(&body).map_err(|e| FlowwatchError::Decode(format!("{path}: {e}")))
}

fn status_error(status: StatusCode, path: &str, body: &str) -> FlowwatchError {
    if status == StatusCode::NOT_FOUND {
        return FlowwatchError::NotFound(path.to_string());
    }
    let mut excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
    if excerpt.len() < body.len() {
        excerpt.push_str("...");
    }
    FlowwatchError::Status {
        status: status.as_u16(),
        body: excerpt,
    }
}

#[derive(Deserialize)]
struct ExampleResponse {
    workflow: Workflow,
}

#[derive(Deserialize)]
struct RunCreated {
    run_id: RunId,
}

#[derive(Serialize)]
struct StartRunRequest<'a> {
    workflow_id: &'a WorkflowId,
    trigger_data: serde_json::Value,
}

impl EngineApi for HttpEngine {
    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move { self.get("/api/workflows/".to_string()).await })
    }

    fn create_example_workflow(&self) -> BoxFuture<'_, Result<Workflow>> {
        Box::pin(async move {
            let created: ExampleResponse = self
                .post("/api/workflows/example".to_string(), &serde_json::json!({}))
                .await?;
            Ok(created.workflow)
        })
    }

    fn workflow_details(&self, id: &WorkflowId) -> BoxFuture<'_, Result<WorkflowDetails>> {
        let path = format!("/api/workflows/{}/details", urlencoding::encode(id.as_str()));
        Box::pin(async move { self.get(path).await })
    }

    fn run_workflow(
        &self,
        id: &WorkflowId,
        input: serde_json::Value,
    ) -> BoxFuture<'_, Result<RunId>> {
        let path = format!("/api/workflows/{}/run", urlencoding::encode(id.as_str()));
        Box::pin(async move {
            let created: RunCreated = self.post(path, &input).await?;
            Ok(created.run_id)
        })
    }

    fn get_run(&self, id: &RunId) -> BoxFuture<'_, Result<RunRecord>> {
        let path = format!("/api/runs/{}", urlencoding::encode(id.as_str()));
        Box::pin(async move { self.get(path).await })
    }

    fn start_run(
        &self,
        workflow_id: &WorkflowId,
        trigger_data: serde_json::Value,
    ) -> BoxFuture<'_, Result<StartedRun>> {
        let workflow_id = workflow_id.clone();
        Box::pin(async move {
            let body = StartRunRequest {
                workflow_id: &workflow_id,
                trigger_data,
            };
            self.post("/api/runs/".to_string(), &body).await
        })
    }
}
