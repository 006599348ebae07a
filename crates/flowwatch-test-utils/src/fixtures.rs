use serde_json::{json, Value};

use flowwatch_core::types::*;

const STARTED: &str = "2025-03-01T10:00:00";
const FINISHED: &str = "2025-03-01T10:00:12";

pub fn workflow(id: &str, name: &str) -> Workflow {
    Workflow {
        id: WorkflowId::from_str(id),
        name: name.to_string(),
        description: Some("Summarize multiple articles using AI".to_string()),
        created_at: Timestamp::parse("2025-03-01T09:00:00"),
    }
}

fn node(id: &str, kind: &str, label: &str, x: f64, y: f64) -> GraphNode {
    let mut data = serde_json::Map::new();
    data.insert("label".to_string(), Value::String(label.to_string()));
    GraphNode {
        id: id.to_string(),
        kind: kind.to_string(),
        position: Position { x, y },
        data,
    }
}

fn edge(source: &str, target: &str) -> GraphEdge {
    GraphEdge {
        id: format!("{source}->{target}"),
        source: source.to_string(),
        target: target.to_string(),
    }
}

/// trigger-1 -> ai-agent-1 -> output-1
pub fn summarizer_definition() -> WorkflowDefinition {
    WorkflowDefinition {
        nodes: vec![
            node("trigger-1", "trigger", "Article URLs", 100.0, 100.0),
            node("ai-agent-1", "aiAgent", "Summarize", 350.0, 100.0),
            node("output-1", "output", "Result", 600.0, 100.0),
        ],
        edges: vec![edge("trigger-1", "ai-agent-1"), edge("ai-agent-1", "output-1")],
    }
}

/// Details of workflow `wf-1` with the summarizer definition and the given
/// `(run id, status)` pairs as its recent runs, most recent first.
pub fn details(runs: &[(&str, &str)]) -> WorkflowDetails {
    WorkflowDetails {
        workflow: workflow("wf-1", "Article Summarizer"),
        latest_version: Some(WorkflowVersion {
            id: "v-1".to_string(),
            version: 1,
            definition: summarizer_definition(),
        }),
        recent_runs: runs
            .iter()
            .map(|(id, status)| {
                let status = RunStatus::from(*status);
                let completed_at = if status.is_terminal() {
                    Timestamp::parse(FINISHED)
                } else {
                    None
                };
                RunSummary {
                    id: RunId::from_str(id),
                    status,
                    started_at: Timestamp::parse(STARTED),
                    completed_at,
                }
            })
            .collect(),
    }
}

pub fn execution(node_id: &str, node_type: &str, status: NodeStatus) -> NodeExecution {
    let completed_at = match status {
        NodeStatus::Success | NodeStatus::Failed => Timestamp::parse("2025-03-01T10:00:03"),
        _ => None,
    };
    NodeExecution {
        id: format!("ex-{node_id}"),
        node_id: node_id.to_string(),
        node_type: node_type.to_string(),
        status,
        input_data: None,
        output_data: None,
        error_message: None,
        started_at: Timestamp::parse(STARTED),
        completed_at,
    }
}

pub fn run_record(run_id: &str, status: &str, executions: Vec<NodeExecution>) -> RunRecord {
    let status = RunStatus::from(status);
    let completed_at = if status.is_terminal() {
        Timestamp::parse(FINISHED)
    } else {
        None
    };
    RunRecord {
        id: RunId::from_str(run_id),
        workflow_id: Some(WorkflowId::from_str("wf-1")),
        status,
        started_at: Timestamp::parse(STARTED),
        completed_at,
        error_message: None,
        trigger_data: Some(json!({"article_urls": ["https://example.com/a"]})),
        node_executions: executions,
    }
}

/// An output payload with two article summaries and a combined overview,
/// nested under `previous_results.<summarizer_id>`.
pub fn summary_payload(summarizer_id: &str) -> Value {
    json!({
        "previous_results": {
            summarizer_id: {
                "individual_summaries": [
                    {
                        "article_title": "Rust 2024 edition",
                        "summary": "The edition stabilises several language changes.",
                        "key_points": ["Async closures", "New prelude"]
                    },
                    {
                        "article_title": "Tokio internals",
                        "summary": "How the scheduler balances work.",
                        "key_points": ["Work stealing"]
                    }
                ],
                "combined_summary": {
                    "overview": "Both articles cover the modern Rust toolchain."
                }
            }
        }
    })
}
