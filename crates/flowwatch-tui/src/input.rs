use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Actions produced by key input handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Quit,
    /// Move focus between the runs list and the graph nodes.
    FocusNext,
    Up,
    Down,
    /// Select the run, or highlight the node, under the cursor.
    Activate,
    Rerun,
    ToggleOutput,
    Copy,
    Refresh,
    /// No-op (key was not bound).
    None,
}

/// Map a key event to an action.
pub fn handle_key(key: KeyEvent) -> InputAction {
    if key.kind == KeyEventKind::Release {
        return InputAction::None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => InputAction::Quit,
        KeyCode::Char('q') | KeyCode::Esc => InputAction::Quit,
        KeyCode::Tab | KeyCode::BackTab => InputAction::FocusNext,
        KeyCode::Up | KeyCode::Char('k') => InputAction::Up,
        KeyCode::Down | KeyCode::Char('j') => InputAction::Down,
        KeyCode::Enter | KeyCode::Char(' ') => InputAction::Activate,
        KeyCode::Char('r') => InputAction::Rerun,
        KeyCode::Char('o') => InputAction::ToggleOutput,
        KeyCode::Char('c') | KeyCode::Char('y') => InputAction::Copy,
        KeyCode::Char('R') | KeyCode::F(5) => InputAction::Refresh,
        _ => InputAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_bindings() {
        assert_eq!(handle_key(key(KeyCode::Char('q'))), InputAction::Quit);
        assert_eq!(handle_key(key(KeyCode::Tab)), InputAction::FocusNext);
        assert_eq!(handle_key(key(KeyCode::Char('j'))), InputAction::Down);
        assert_eq!(handle_key(key(KeyCode::Enter)), InputAction::Activate);
        assert_eq!(handle_key(key(KeyCode::Char('r'))), InputAction::Rerun);
        assert_eq!(handle_key(key(KeyCode::Char('c'))), InputAction::Copy);
        assert_eq!(handle_key(key(KeyCode::Char('x'))), InputAction::None);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let ev = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(ev), InputAction::Quit);
    }
}
