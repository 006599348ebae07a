mod app;
mod event;
mod input;
mod ui;

use flowwatch_sync::WatchSession;

/// Launch the terminal UI on `session` and run until the user quits.
pub async fn run_tui(session: WatchSession) -> anyhow::Result<()> {
    // Enter raw mode
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let result = app::run_app(&mut terminal, session).await;

    // Restore terminal
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}
