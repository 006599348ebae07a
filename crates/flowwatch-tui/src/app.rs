use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::time::Instant;
use tracing::{info, warn};

use flowwatch_core::types::{GraphNode, NodeExecution, RunId};
use flowwatch_sync::{NoticeLevel, WatchSession};

use crate::event::{EventLoop, TuiEvent};
use crate::input::{self, InputAction};
use crate::ui;

/// Which list the arrow keys move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Runs,
    Nodes,
}

/// Application state.
pub struct App {
    pub session: WatchSession,
    pub focus: Focus,
    pub run_cursor: usize,
    pub node_cursor: usize,
    pub show_output: bool,
    pub tick_count: usize,
    seen_output: u64,
    seen_selection: Option<RunId>,
}

impl App {
    pub fn new(session: WatchSession) -> Self {
        let seen_output = session.output_revision();
        Self {
            session,
            focus: Focus::Runs,
            run_cursor: 0,
            node_cursor: 0,
            show_output: false,
            tick_count: 0,
            seen_output,
            seen_selection: None,
        }
    }

    /// Apply a key action. Returns false when the app should exit.
    pub fn on_action(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Quit => return false,
            InputAction::FocusNext => {
                self.focus = match self.focus {
                    Focus::Runs => Focus::Nodes,
                    Focus::Nodes => Focus::Runs,
                };
            }
            InputAction::Up => {
                let cursor = self.cursor_mut();
                *cursor = cursor.saturating_sub(1);
            }
            InputAction::Down => {
                let len = self.focused_len();
                let cursor = self.cursor_mut();
                if *cursor + 1 < len {
                    *cursor += 1;
                }
            }
            InputAction::Activate => self.activate(),
            InputAction::Rerun => {
                if let Err(e) = self.session.rerun() {
                    warn!(error = %e, "Re-run rejected");
                    self.session.notify(NoticeLevel::Error, e.to_string());
                }
            }
            InputAction::ToggleOutput => {
                if self.session.output().is_some() {
                    self.show_output = !self.show_output;
                }
            }
            InputAction::Copy => self.copy_output(),
            InputAction::Refresh => self.session.refresh(),
            InputAction::None => {}
        }
        self.after_sync();
        true
    }

    /// Follow state changes made by the session: open the output panel when
    /// a new output lands and keep the run cursor on the selected run.
    pub fn after_sync(&mut self) {
        let revision = self.session.output_revision();
        if revision != self.seen_output {
            self.seen_output = revision;
            self.show_output = self.session.output().is_some();
        }

        let selected = self.session.store().selected_run().cloned();
        if selected != self.seen_selection {
            if let Some(idx) = selected.as_ref().and_then(|id| self.run_index(id)) {
                self.run_cursor = idx;
            }
            self.seen_selection = selected;
        }

        let runs = self.runs_len();
        if runs > 0 && self.run_cursor >= runs {
            self.run_cursor = runs - 1;
        }
        let nodes = self.nodes_len();
        if nodes > 0 && self.node_cursor >= nodes {
            self.node_cursor = nodes - 1;
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.tick_count += 1;
        self.session.tick(now);
    }

    /// Graph node under the node cursor.
    pub fn cursor_node(&self) -> Option<&GraphNode> {
        self.session.store().definition().nodes.get(self.node_cursor)
    }

    /// Execution of the node under the node cursor, in the current snapshot.
    pub fn cursor_execution(&self) -> Option<&NodeExecution> {
        let node = self.cursor_node()?;
        self.session
            .store()
            .executions()
            .iter()
            .filter(|ex| ex.node_id == node.id)
            .reduce(|best, ex| if ex.started_at > best.started_at { ex } else { best })
    }

    fn activate(&mut self) {
        match self.focus {
            Focus::Runs => {
                let run_id = self
                    .session
                    .store()
                    .summary()
                    .and_then(|s| s.recent_runs.get(self.run_cursor))
                    .map(|r| r.id.clone());
                if let Some(run_id) = run_id {
                    self.session.select_run(run_id.clone());
                    self.seen_selection = Some(run_id);
                }
            }
            Focus::Nodes => {
                if let Some(node) = self.cursor_node() {
                    let id = node.id.clone();
                    self.session.highlight_node(id);
                }
            }
        }
    }

    fn copy_output(&mut self) {
        let Some(view) = self.session.output() else {
            self.session
                .notify(NoticeLevel::Error, "No output to copy for this run");
            return;
        };
        let text = view.to_text();
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text)) {
            Ok(()) => self.session.notify(NoticeLevel::Info, "Copied"),
            Err(e) => {
                warn!(error = %e, "Clipboard write failed");
                self.session
                    .notify(NoticeLevel::Error, format!("Clipboard error: {e}"));
            }
        }
    }

    fn cursor_mut(&mut self) -> &mut usize {
        match self.focus {
            Focus::Runs => &mut self.run_cursor,
            Focus::Nodes => &mut self.node_cursor,
        }
    }

    fn focused_len(&self) -> usize {
        match self.focus {
            Focus::Runs => self.runs_len(),
            Focus::Nodes => self.nodes_len(),
        }
    }

    fn runs_len(&self) -> usize {
        self.session
            .store()
            .summary()
            .map_or(0, |s| s.recent_runs.len())
    }

    fn nodes_len(&self) -> usize {
        self.session.store().definition().nodes.len()
    }

    fn run_index(&self, id: &RunId) -> Option<usize> {
        self.session
            .store()
            .summary()?
            .recent_runs
            .iter()
            .position(|r| &r.id == id)
    }
}

/// Main app loop.
pub async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    session: WatchSession,
) -> anyhow::Result<()> {
    let mut app = App::new(session);
    let mut events = EventLoop::new();
    app.session.load_summary();
    info!(workflow = %app.session.store().workflow_id(), "Watching workflow");

    loop {
        let graph = app.session.graph();
        terminal.draw(|f| ui::draw(f, &app, &graph))?;

        let Some(event) = events.next(&mut app.session).await else {
            break;
        };
        match event {
            TuiEvent::Key(key) => {
                if !app.on_action(input::handle_key(key)) {
                    break;
                }
            }
            TuiEvent::Sync(msg) => {
                app.session.handle(msg);
                app.after_sync();
            }
            TuiEvent::Tick => app.on_tick(Instant::now()),
            TuiEvent::Resize => {}
        }
    }

    app.session.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use flowwatch_core::traits::EngineApi;
    use flowwatch_core::types::{NodeStatus, WorkflowId};
    use flowwatch_sync::SessionSettings;
    use flowwatch_test_utils::{fixtures, ScriptedEngine};

    fn app(engine: ScriptedEngine) -> App {
        let engine: Arc<dyn EngineApi> = Arc::new(engine);
        App::new(WatchSession::new(
            engine,
            WorkflowId::from_str("wf-1"),
            SessionSettings::default(),
        ))
    }

    async fn settle(app: &mut App) {
        while let Ok(Some(msg)) =
            tokio::time::timeout(Duration::from_millis(10), app.session.next_message()).await
        {
            app.session.handle(msg);
            app.after_sync();
        }
    }

    fn finished_engine() -> ScriptedEngine {
        let mut output = fixtures::execution("output-1", "output", NodeStatus::Success);
        output.output_data = Some(fixtures::summary_payload("ai-agent-1"));
        ScriptedEngine::new()
            .details(vec![Ok(fixtures::details(&[
                ("run-2", "completed"),
                ("run-1", "failed"),
            ]))])
            .run(
                "run-2",
                vec![Ok(fixtures::run_record(
                    "run-2",
                    "completed",
                    vec![
                        fixtures::execution("trigger-1", "trigger", NodeStatus::Success),
                        output,
                    ],
                ))],
            )
            .run(
                "run-1",
                vec![Ok(fixtures::run_record(
                    "run-1",
                    "failed",
                    vec![fixtures::execution("trigger-1", "trigger", NodeStatus::Failed)],
                ))],
            )
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_panel_opens_when_output_arrives() {
        let mut app = app(finished_engine());
        app.session.load_summary();
        settle(&mut app).await;

        assert!(app.show_output);
        app.on_action(InputAction::ToggleOutput);
        assert!(!app.show_output);

        // A refresh with the same output does not reopen the panel.
        app.on_action(InputAction::Refresh);
        settle(&mut app).await;
        assert!(!app.show_output);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selecting_other_run_closes_output() {
        let mut app = app(finished_engine());
        app.session.load_summary();
        settle(&mut app).await;
        assert_eq!(app.run_cursor, 0);

        app.on_action(InputAction::Down);
        app.on_action(InputAction::Down);
        assert_eq!(app.run_cursor, 1);
        app.on_action(InputAction::Activate);
        settle(&mut app).await;

        assert_eq!(
            app.session.store().selected_run(),
            Some(&RunId::from_str("run-1"))
        );
        assert!(!app.show_output);
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_focus_highlights_cursor_node() {
        let mut app = app(finished_engine());
        app.session.load_summary();
        settle(&mut app).await;

        app.on_action(InputAction::FocusNext);
        app.on_action(InputAction::Down);
        app.on_action(InputAction::Activate);
        assert_eq!(app.session.highlighted(), Some("ai-agent-1"));
        assert!(app.cursor_execution().is_none());
        // The agent never ran in run-2, so the graph does not light it up.
        assert!(!app.session.graph().node("ai-agent-1").unwrap().highlighted);

        app.on_action(InputAction::Down);
        assert_eq!(app.cursor_execution().unwrap().node_id, "output-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_rerun_shows_notice() {
        let mut app = app(ScriptedEngine::new());
        assert!(app.on_action(InputAction::Rerun));
        assert_eq!(app.session.notice().unwrap().level, NoticeLevel::Error);
        assert!(!app.on_action(InputAction::Quit));
    }
}
