//! Process state notifications for interested listeners.

use tokio::sync::broadcast;
use tracing::debug;

use crate::process_state::ProcessState;

const DEFAULT_CAPACITY: usize = 64;

/// Broadcasts [`ProcessState`] changes to every subscriber.
///
/// Publishing never blocks and succeeds without subscribers. Slow subscribers
/// lag and skip older states.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ProcessState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessState> {
        self.sender.subscribe()
    }

    pub fn publish(&self, process_state: ProcessState) {
        match self.sender.send(process_state) {
            Ok(receivers) => debug!(receivers, "process state published"),
            Err(_) => debug!("process state dropped, no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
