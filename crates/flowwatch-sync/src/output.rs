use serde_json::Value;

use flowwatch_core::types::{NodeExecution, NodeStatus};

/// Which part of a structured output a section came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// One per-item summary.
    Summary,
    /// The combined overview, always last.
    CombinedOverview,
}

/// One displayable section of a structured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSection {
    pub kind: SectionKind,
    pub title: String,
    pub body: String,
    pub key_points: Vec<String>,
}

/// Display form of a run's final payload, decoded once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputView {
    Structured(Vec<OutputSection>),
    /// Pretty-printed JSON of a payload that has no recognised shape.
    Raw(String),
}

impl OutputView {
    pub fn is_structured(&self) -> bool {
        matches!(self, OutputView::Structured(_))
    }

    pub fn sections(&self) -> &[OutputSection] {
        match self {
            OutputView::Structured(sections) => sections,
            OutputView::Raw(_) => &[],
        }
    }

    /// Plain-text rendering, for the clipboard.
    pub fn to_text(&self) -> String {
        let sections = match self {
            OutputView::Raw(raw) => return raw.clone(),
            OutputView::Structured(sections) => sections,
        };

        let mut out = String::new();
        let mut in_summaries = false;
        for section in sections {
            match section.kind {
                SectionKind::Summary => {
                    if !in_summaries {
                        out.push_str("ARTICLE SUMMARIES:\n\n");
                        in_summaries = true;
                    }
                    out.push_str(&section.title);
                    out.push('\n');
                    if !section.body.is_empty() {
                        out.push_str(&section.body);
                        out.push('\n');
                    }
                    out.push('\n');
                    if !section.key_points.is_empty() {
                        out.push_str("Key Points:\n");
                        for point in &section.key_points {
                            out.push_str("• ");
                            out.push_str(point);
                            out.push('\n');
                        }
                        out.push('\n');
                    }
                }
                SectionKind::CombinedOverview => {
                    out.push_str("\n=== COMBINED OVERVIEW ===\n");
                    out.push_str(&section.body);
                    out.push('\n');
                }
            }
        }
        out
    }
}

/// Decodes output payloads produced under the summarizer-node convention:
/// `previous_results.<summarizer_node_id>.{individual_summaries, combined_summary}`.
#[derive(Debug, Clone)]
pub struct OutputExtractor {
    summarizer_node_id: String,
}

impl OutputExtractor {
    pub fn new(summarizer_node_id: impl Into<String>) -> Self {
        Self {
            summarizer_node_id: summarizer_node_id.into(),
        }
    }

    pub fn summarizer_node_id(&self) -> &str {
        &self.summarizer_node_id
    }

    /// Decode `payload`. Never fails; unrecognised shapes come back raw.
    pub fn extract(&self, payload: Option<&Value>) -> OutputView {
        let payload = payload.unwrap_or(&Value::Null);
        let Some(results) = payload
            .as_object()
            .and_then(|obj| obj.get("previous_results"))
            .and_then(|prev| prev.get(&self.summarizer_node_id))
            .and_then(Value::as_object)
        else {
            return raw(payload);
        };

        let mut sections: Vec<OutputSection> = results
            .get("individual_summaries")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, item)| summary_section(idx + 1, item))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(overview) = results
            .get("combined_summary")
            .and_then(|c| c.get("overview"))
            .and_then(Value::as_str)
        {
            sections.push(OutputSection {
                kind: SectionKind::CombinedOverview,
                title: "Combined Overview".to_string(),
                body: overview.to_string(),
                key_points: Vec::new(),
            });
        }

        if sections.is_empty() {
            return raw(payload);
        }
        OutputView::Structured(sections)
    }

    /// The output view of a snapshot: taken from the first successful
    /// execution of `output_node_type` that carries output data.
    pub fn from_snapshot(
        &self,
        executions: &[NodeExecution],
        output_node_type: &str,
    ) -> Option<OutputView> {
        executions
            .iter()
            .find(|ex| ex.node_type == output_node_type && ex.status == NodeStatus::Success)
            .and_then(|ex| ex.output_data.as_ref())
            .map(|payload| self.extract(Some(payload)))
    }
}

fn summary_section(index: usize, item: &Value) -> Option<OutputSection> {
    let item = item.as_object()?;
    let title = item
        .get("article_title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled");
    let body = item.get("summary").and_then(Value::as_str).unwrap_or_default();
    let key_points = item
        .get("key_points")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(OutputSection {
        kind: SectionKind::Summary,
        title: format!("{index}. {title}"),
        body: body.to_string(),
        key_points,
    })
}

fn raw(payload: &Value) -> OutputView {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    OutputView::Raw(text)
}

/// Compact preview of a single node's `output_data`, for the details panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPreview {
    /// A fetch node's articles: total count plus the first few titles.
    Articles {
        count: usize,
        shown: Vec<ArticlePreview>,
    },
    /// A summarizer node's per-item summaries.
    Summaries {
        items: Vec<(String, String)>,
        combined: Option<String>,
    },
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePreview {
    pub title: String,
    pub error: Option<String>,
}

/// Number of articles listed in an `Articles` preview.
const ARTICLES_SHOWN: usize = 2;

impl ExecutionPreview {
    pub fn of(output: &Value) -> Self {
        if let Some(articles) = output.get("articles").and_then(Value::as_array) {
            let shown = articles
                .iter()
                .take(ARTICLES_SHOWN)
                .map(|a| ArticlePreview {
                    title: str_field(a, "title").unwrap_or_else(|| "Untitled".to_string()),
                    error: str_field(a, "error"),
                })
                .collect();
            return ExecutionPreview::Articles {
                count: articles.len(),
                shown,
            };
        }

        if let Some(summaries) = output.get("individual_summaries").and_then(Value::as_array) {
            let items = summaries
                .iter()
                .map(|s| {
                    (
                        str_field(s, "article_title").unwrap_or_default(),
                        str_field(s, "summary").unwrap_or_default(),
                    )
                })
                .collect();
            let combined = output
                .get("combined_summary")
                .and_then(|c| c.get("overview"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return ExecutionPreview::Summaries { items, combined };
        }

        ExecutionPreview::Raw(serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string()))
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extractor() -> OutputExtractor {
        OutputExtractor::new("ai-agent-1")
    }

    fn single_summary() -> Value {
        json!({
            "previous_results": {
                "ai-agent-1": {
                    "individual_summaries": [
                        {"article_title": "A", "summary": "S", "key_points": ["k1", "k2"]}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_empty_object_is_raw() {
        assert_eq!(extractor().extract(Some(&json!({}))), OutputView::Raw("{}".to_string()));
    }

    #[test]
    fn test_absent_and_non_object_payloads_are_raw() {
        assert_eq!(extractor().extract(None), OutputView::Raw("null".to_string()));
        assert_eq!(
            extractor().extract(Some(&json!("done"))),
            OutputView::Raw("\"done\"".to_string())
        );
        let view = extractor().extract(Some(&json!([1, 2])));
        assert!(!view.is_structured());
    }

    #[test]
    fn test_missing_summarizer_node_is_raw() {
        let payload = json!({"previous_results": {"other-node": {"individual_summaries": []}}});
        let view = extractor().extract(Some(&payload));
        assert_eq!(view, OutputView::Raw(serde_json::to_string_pretty(&payload).unwrap()));
    }

    #[test]
    fn test_single_summary_section() {
        let view = extractor().extract(Some(&single_summary()));
        let sections = view.sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Summary);
        assert_eq!(sections[0].title, "1. A");
        assert_eq!(sections[0].body, "S");
        assert_eq!(sections[0].key_points, vec!["k1", "k2"]);
    }

    #[test]
    fn test_combined_overview_appended_once() {
        let mut payload = single_summary();
        payload["previous_results"]["ai-agent-1"]["combined_summary"] = json!({"overview": "O"});

        let view = extractor().extract(Some(&payload));
        let sections = view.sections();
        assert_eq!(sections.len(), 2);
        let overviews: Vec<_> = sections
            .iter()
            .filter(|s| s.kind == SectionKind::CombinedOverview)
            .collect();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].body, "O");
        assert_eq!(sections.last().unwrap().kind, SectionKind::CombinedOverview);
    }

    #[test]
    fn test_text_rendering_follows_sections() {
        let mut payload = single_summary();
        payload["previous_results"]["ai-agent-1"]["combined_summary"] = json!({"overview": "O"});
        let text = extractor().extract(Some(&payload)).to_text();
        assert_eq!(
            text,
            "ARTICLE SUMMARIES:\n\n1. A\nS\n\nKey Points:\n• k1\n• k2\n\n\n=== COMBINED OVERVIEW ===\nO\n"
        );
    }

    #[test]
    fn test_missing_optional_fields_are_tolerated() {
        let payload = json!({
            "previous_results": {
                "ai-agent-1": {
                    "individual_summaries": [
                        {"summary": "no title"},
                        "not an object",
                        {"article_title": "C", "key_points": "not a list"}
                    ],
                    "combined_summary": {}
                }
            }
        });
        let view = extractor().extract(Some(&payload));
        let sections = view.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "1. Untitled");
        assert_eq!(sections[1].title, "3. C");
        assert!(sections[1].body.is_empty());
        assert!(sections[1].key_points.is_empty());
    }

    #[test]
    fn test_overview_only_is_structured() {
        let payload = json!({
            "previous_results": {"ai-agent-1": {"combined_summary": {"overview": "just this"}}}
        });
        let view = extractor().extract(Some(&payload));
        assert_eq!(view.sections().len(), 1);
        assert_eq!(view.to_text(), "\n=== COMBINED OVERVIEW ===\njust this\n");
    }

    #[test]
    fn test_configured_summarizer_id() {
        let payload = json!({
            "previous_results": {"summarizer": {"individual_summaries": [{"article_title": "X", "summary": "Y"}]}}
        });
        assert!(!extractor().extract(Some(&payload)).is_structured());
        assert!(OutputExtractor::new("summarizer").extract(Some(&payload)).is_structured());
    }

    #[test]
    fn test_from_snapshot_picks_successful_output_node() {
        let mut running = NodeExecution {
            id: "ex-1".into(),
            node_id: "output-1".into(),
            node_type: "output".into(),
            status: NodeStatus::Running,
            input_data: None,
            output_data: Some(single_summary()),
            error_message: None,
            started_at: None,
            completed_at: None,
        };
        assert!(extractor().from_snapshot(&[running.clone()], "output").is_none());

        running.status = NodeStatus::Success;
        let view = extractor().from_snapshot(&[running], "output").unwrap();
        assert!(view.is_structured());
    }

    #[test]
    fn test_execution_preview_articles() {
        let preview = ExecutionPreview::of(&json!({
            "articles": [
                {"title": "One"},
                {"title": "Two", "error": "timeout"},
                {"title": "Three"}
            ]
        }));
        match preview {
            ExecutionPreview::Articles { count, shown } => {
                assert_eq!(count, 3);
                assert_eq!(shown.len(), 2);
                assert_eq!(shown[1].error.as_deref(), Some("timeout"));
            }
            other => panic!("unexpected preview: {other:?}"),
        }
    }

    #[test]
    fn test_execution_preview_summaries_and_raw() {
        let preview = ExecutionPreview::of(&json!({
            "individual_summaries": [{"article_title": "A", "summary": "S"}],
            "combined_summary": {"overview": "O"}
        }));
        assert_eq!(
            preview,
            ExecutionPreview::Summaries {
                items: vec![("A".to_string(), "S".to_string())],
                combined: Some("O".to_string()),
            }
        );

        assert_eq!(
            ExecutionPreview::of(&json!({"ok": true})),
            ExecutionPreview::Raw("{\n  \"ok\": true\n}".to_string())
        );
    }
}
