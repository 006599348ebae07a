use std::collections::HashMap;
use std::sync::Arc;

use flowwatch_core::types::{GraphEdge, GraphNode, NodeExecution, NodeStatus, WorkflowDefinition};

use crate::palette::{style_for, unexecuted, StyleToken};

/// A graph node plus the visual state derived from the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedNode {
    pub node: GraphNode,
    /// Status of the node's execution, if the snapshot has one.
    pub status: Option<NodeStatus>,
    pub style: StyleToken,
    pub highlighted: bool,
}

/// The static graph merged with a snapshot, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedGraph {
    pub nodes: Vec<Arc<AnnotatedNode>>,
    definition: Arc<WorkflowDefinition>,
}

impl AnnotatedGraph {
    /// Edges of the source definition, passed through untouched.
    pub fn edges(&self) -> &[GraphEdge] {
        &self.definition.edges
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn node(&self, id: &str) -> Option<&AnnotatedNode> {
        self.nodes.iter().find(|n| n.node.id == id).map(Arc::as_ref)
    }
}

/// Merge `definition` with `executions`. The source nodes are only read.
///
/// When a node has several executions the one with the latest `started_at`
/// wins; on equal start times the earlier one in `executions` is kept.
/// Executions for ids not in the definition are ignored.
/// Only executed nodes can be highlighted: a node missing from the snapshot
/// keeps the plain unexecuted style even when it is `highlighted`.
pub fn annotate(
    definition: &Arc<WorkflowDefinition>,
    executions: &[NodeExecution],
    highlighted: Option<&str>,
) -> AnnotatedGraph {
    let latest = latest_by_node(executions);

    let nodes = definition
        .nodes
        .iter()
        .map(|node| {
            let annotated = match latest.get(node.id.as_str()) {
                Some(ex) => {
                    let lit = highlighted == Some(node.id.as_str());
                    AnnotatedNode {
                        node: node.clone(),
                        status: Some(ex.status.clone()),
                        style: style_for(&ex.status, lit),
                        highlighted: lit,
                    }
                }
                None => AnnotatedNode {
                    node: node.clone(),
                    status: None,
                    style: unexecuted(),
                    highlighted: false,
                },
            };
            Arc::new(annotated)
        })
        .collect();

    AnnotatedGraph {
        nodes,
        definition: Arc::clone(definition),
    }
}

fn latest_by_node(executions: &[NodeExecution]) -> HashMap<&str, &NodeExecution> {
    let mut latest: HashMap<&str, &NodeExecution> = HashMap::new();
    for ex in executions {
        latest
            .entry(ex.node_id.as_str())
            .and_modify(|best| {
                if ex.started_at > best.started_at {
                    *best = ex;
                }
            })
            .or_insert(ex);
    }
    latest
}

/// Memoising front end to [`annotate`].
///
/// Returns the previous graph `Arc` when the inputs are the same `Arc`s and
/// highlight, and reuses each previous node `Arc` whose value is unchanged, so
/// a renderer comparing by pointer only repaints what actually changed.
#[derive(Debug, Default)]
pub struct GraphAnnotator {
    last: Option<Memo>,
}

#[derive(Debug)]
struct Memo {
    definition: Arc<WorkflowDefinition>,
    executions: Arc<Vec<NodeExecution>>,
    highlighted: Option<String>,
    graph: Arc<AnnotatedGraph>,
}

impl GraphAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotate(
        &mut self,
        definition: &Arc<WorkflowDefinition>,
        executions: &Arc<Vec<NodeExecution>>,
        highlighted: Option<&str>,
    ) -> Arc<AnnotatedGraph> {
        if let Some(memo) = &self.last {
            if Arc::ptr_eq(&memo.definition, definition)
                && Arc::ptr_eq(&memo.executions, executions)
                && memo.highlighted.as_deref() == highlighted
            {
                return Arc::clone(&memo.graph);
            }
        }

        let mut fresh = annotate(definition, executions, highlighted);
        let graph = match &self.last {
            Some(memo) => {
                let previous = &memo.graph;
                let mut all_reused = fresh.nodes.len() == previous.nodes.len();
                for (idx, node) in fresh.nodes.iter_mut().enumerate() {
                    match previous.nodes.get(idx) {
                        Some(prev) if prev == node => *node = Arc::clone(prev),
                        _ => all_reused = false,
                    }
                }
                if all_reused && Arc::ptr_eq(&previous.definition, definition) {
                    Arc::clone(previous)
                } else {
                    Arc::new(fresh)
                }
            }
            None => Arc::new(fresh),
        };

        self.last = Some(Memo {
            definition: Arc::clone(definition),
            executions: Arc::clone(executions),
            highlighted: highlighted.map(str::to_string),
            graph: Arc::clone(&graph),
        });
        graph
    }
}
