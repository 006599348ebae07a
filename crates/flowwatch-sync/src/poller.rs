use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::SyncMessage;

/// One firing of the poll timer. Carries the generation of the timer that
/// produced it so ticks from a stopped timer can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    pub generation: u64,
}

/// Interval timer that feeds [`SyncMessage::Tick`] into the session loop
/// while the watched run is live.
///
/// At most one timer task exists at a time: `start` is a no-op while polling
/// and `stop` cancels the task immediately. The task is tied to a child of
/// the session token, so tearing the session down stops it as well.
pub struct PollingController {
    period: Duration,
    generation: u64,
    parent: CancellationToken,
    active: Option<CancellationToken>,
    tx: mpsc::UnboundedSender<SyncMessage>,
}

impl PollingController {
    pub fn new(
        period: Duration,
        parent: CancellationToken,
        tx: mpsc::UnboundedSender<SyncMessage>,
    ) -> Self {
        Self {
            period,
            generation: 0,
            parent,
            active: None,
            tx,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self) {
        if self.active.is_some() || self.parent.is_cancelled() {
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let cancel = self.parent.child_token();
        self.active = Some(cancel.clone());

        let period = self.period;
        let tx = self.tx.clone();
        info!(generation, period_ms = period.as_millis() as u64, "Polling started");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = cancel.cancelled() => break,
                }
                if tx.send(SyncMessage::Tick(PollTick { generation })).is_err() {
                    break;
                }
            }
            debug!(generation, "Poll timer exited");
        });
    }

    pub fn stop(&mut self) {
        if let Some(cancel) = self.active.take() {
            cancel.cancel();
            info!(generation = self.generation, "Polling stopped");
        }
    }

    /// Stop and start again, so the next tick is a full period away.
    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    /// Start or stop to match `live`.
    pub fn sync(&mut self, live: bool) {
        if live {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Whether `tick` came from the timer that is currently running.
    pub fn accepts(&self, tick: &PollTick) -> bool {
        self.active.is_some() && tick.generation == self.generation
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        if let Some(cancel) = self.active.take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(1500);

    fn controller() -> (PollingController, mpsc::UnboundedReceiver<SyncMessage>, CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let parent = CancellationToken::new();
        (PollingController::new(PERIOD, parent.clone(), tx), rx, parent)
    }

    fn tick_generation(msg: SyncMessage) -> u64 {
        match msg {
            SyncMessage::Tick(tick) => tick.generation,
            _ => panic!("expected a tick"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let (mut poller, mut rx, _parent) = controller();
        let started = tokio::time::Instant::now();
        poller.start();

        let first = rx.recv().await.unwrap();
        assert_eq!(started.elapsed(), PERIOD);
        assert_eq!(tick_generation(first), 1);

        rx.recv().await.unwrap();
        assert_eq!(started.elapsed(), PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (mut poller, mut rx, _parent) = controller();
        poller.start();
        poller.start();
        poller.sync(true);

        tokio::time::sleep(PERIOD * 3 + Duration::from_millis(10)).await;
        let mut ticks = 0;
        while rx.try_recv().is_ok() {
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_silences_timer() {
        let (mut poller, mut rx, _parent) = controller();
        poller.start();
        tokio::time::sleep(PERIOD + Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_ok());

        poller.stop();
        assert!(!poller.is_polling());
        tokio::time::sleep(PERIOD * 4).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_bumps_generation() {
        let (mut poller, mut rx, _parent) = controller();
        poller.start();
        let old = PollTick { generation: 1 };
        assert!(poller.accepts(&old));

        poller.restart();
        assert!(!poller.accepts(&old));
        assert_eq!(tick_generation(rx.recv().await.unwrap()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_stops_timer() {
        let (mut poller, mut rx, parent) = controller();
        poller.start();
        parent.cancel();
        tokio::time::sleep(PERIOD * 3).await;
        assert!(rx.try_recv().is_err());

        // Once the session is torn down the controller refuses to restart.
        poller.stop();
        poller.start();
        assert!(!poller.is_polling());
    }
}
