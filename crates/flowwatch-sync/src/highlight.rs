use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Idle,
    Highlighted { node_id: String, deadline: Instant },
}

/// Tracks which node (if any) is highlighted and when the highlight lapses.
///
/// Deadline based: the owner calls [`expire`](Self::expire) from its tick and
/// a newer highlight simply replaces the old target and deadline, so no timer
/// from an earlier request can clear a later one.
#[derive(Debug, Clone)]
pub struct HighlightController {
    duration: Duration,
    state: State,
}

impl HighlightController {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: State::Idle,
        }
    }

    pub fn highlight(&mut self, node_id: impl Into<String>, now: Instant) {
        self.state = State::Highlighted {
            node_id: node_id.into(),
            deadline: now + self.duration,
        };
    }

    /// Clear the highlight if its deadline has passed. Returns true when
    /// something was cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.state {
            State::Highlighted { deadline, .. } if now >= *deadline => {
                self.state = State::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&str> {
        match &self.state {
            State::Idle => None,
            State::Highlighted { node_id, .. } => Some(node_id),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Idle => None,
            State::Highlighted { deadline, .. } => Some(*deadline),
        }
    }

    pub fn clear(&mut self) {
        self.state = State::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(3000);

    #[test]
    fn test_highlight_then_expire() {
        let start = Instant::now();
        let mut hl = HighlightController::new(WINDOW);
        hl.highlight("ai-agent-1", start);
        assert_eq!(hl.current(), Some("ai-agent-1"));

        assert!(!hl.expire(start + Duration::from_millis(2999)));
        assert_eq!(hl.current(), Some("ai-agent-1"));

        assert!(hl.expire(start + WINDOW));
        assert_eq!(hl.current(), None);
        assert!(!hl.expire(start + WINDOW * 2));
    }

    #[test]
    fn test_newer_request_replaces_target_and_deadline() {
        let start = Instant::now();
        let mut hl = HighlightController::new(WINDOW);
        hl.highlight("trigger-1", start);
        hl.highlight("output-1", start + Duration::from_millis(1000));

        // The first request's deadline passes without clearing the second.
        assert!(!hl.expire(start + WINDOW));
        assert_eq!(hl.current(), Some("output-1"));

        assert!(hl.expire(start + Duration::from_millis(4000)));
        assert_eq!(hl.current(), None);
    }

    #[test]
    fn test_clear() {
        let mut hl = HighlightController::new(WINDOW);
        hl.highlight("trigger-1", Instant::now());
        hl.clear();
        assert!(hl.current().is_none());
        assert!(hl.deadline().is_none());
    }
}
