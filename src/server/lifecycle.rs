//! Start/stop coordination for the accept loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::broadcast;

/// Lifecycle of a server: `Stopped → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Stopped = 0,
    Running = 1,
    Stopping = 2,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ServerState::Running,
            2 => ServerState::Stopping,
            _ => ServerState::Stopped,
        }
    }
}

/// Atomic state plus a broadcast channel the accept loop listens on.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    tx: broadcast::Sender<()>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            state: AtomicU8::new(ServerState::Stopped as u8),
            tx,
        }
    }

    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// `Stopped → Running`. Returns false if the server was not stopped.
    pub fn start(&self) -> bool {
        self.transition(ServerState::Stopped, ServerState::Running)
    }

    /// `Running → Stopping`, then signals the accept loop.
    ///
    /// Returns false (and does nothing) unless the server was running.
    pub fn stop(&self) -> bool {
        if !self.transition(ServerState::Running, ServerState::Stopping) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    /// `Stopping → Stopped`, called once the accept loop has drained.
    pub fn finish(&self) {
        self.state.store(ServerState::Stopped as u8, Ordering::Release);
    }

    fn transition(&self, from: ServerState, to: ServerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Cloneable handle for stopping a server from another task.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    lifecycle: Arc<Lifecycle>,
}

impl ServerHandle {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Asks the accept loop to stop. In-flight connections are not aborted.
    pub fn stop(&self) -> bool {
        let stopped = self.lifecycle.stop();
        if stopped {
            tracing::info!("Shutdown requested");
        }
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_state_machine() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), ServerState::Stopped);
        assert!(!lc.stop());

        assert!(lc.start());
        assert!(!lc.start());
        assert_eq!(lc.state(), ServerState::Running);

        let mut rx = lc.subscribe();
        assert!(lc.stop());
        assert_eq!(lc.state(), ServerState::Stopping);
        assert!(rx.try_recv().is_ok());
        assert!(!lc.stop());

        lc.finish();
        assert_eq!(lc.state(), ServerState::Stopped);
        assert!(lc.start());
    }
}
