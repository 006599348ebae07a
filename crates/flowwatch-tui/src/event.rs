use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent};
use tokio::sync::mpsc;

use flowwatch_sync::{SyncMessage, WatchSession};

/// Events that drive the TUI loop.
pub enum TuiEvent {
    /// A crossterm key event.
    Key(crossterm::event::KeyEvent),
    Resize,
    /// A fetch completion or poll tick for the session.
    Sync(SyncMessage),
    /// Redraw timer for spinners and expiring notices.
    Tick,
}

/// Merged event loop: terminal input + session messages + tick timer.
pub struct EventLoop {
    term_rx: mpsc::UnboundedReceiver<CrosstermEvent>,
    tick_interval: Duration,
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, term_rx) = mpsc::unbounded_channel();

        // One blocking reader for the whole UI lifetime; it exits once the
        // loop is dropped and the channel closes.
        tokio::task::spawn_blocking(move || {
            while !tx.is_closed() {
                if !event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    continue;
                }
                match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            term_rx,
            tick_interval: Duration::from_millis(100),
        }
    }

    /// Wait for the next event from any source.
    pub async fn next(&mut self, session: &mut WatchSession) -> Option<TuiEvent> {
        let tick_sleep = tokio::time::sleep(self.tick_interval);

        tokio::select! {
            // Session messages
            Some(msg) = session.next_message() => Some(TuiEvent::Sync(msg)),
            // Terminal events
            result = self.term_rx.recv() => match result {
                Some(CrosstermEvent::Key(key)) => Some(TuiEvent::Key(key)),
                Some(CrosstermEvent::Resize(_, _)) => Some(TuiEvent::Resize),
                Some(_) => Some(TuiEvent::Tick),
                None => None,
            },
            // Tick timer
            _ = tick_sleep => Some(TuiEvent::Tick),
        }
    }
}
