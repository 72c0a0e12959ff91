//! Session-ended notification
//!
//! The owner of a [`crate::Gateway`] creates the signal, keeps a receiver,
//! and hands the signal to the gateway at construction. The gateway fires it
//! when the session cannot be recovered (no refresh token, or refresh failed)
//! so the host can send the user back to login without every caller having
//! to handle it.

use tokio::sync::broadcast;

/// Events broadcast to session listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Tokens were cleared; re-authentication is required.
    Ended,
}

/// Broadcast handle for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// New listener. Only sees events fired after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Fire [`SessionEvent::Ended`]. No listeners is not an error.
    pub fn end(&self) {
        let _ = self.tx.send(SessionEvent::Ended);
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn every_subscriber_sees_end() {
        let signal = SessionSignal::new();
        let mut shell = signal.subscribe();
        let mut cache = signal.subscribe();

        signal.end();

        assert_eq!(shell.try_recv().unwrap(), SessionEvent::Ended);
        assert_eq!(cache.try_recv().unwrap(), SessionEvent::Ended);
        assert!(matches!(shell.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn end_without_listeners_is_silent() {
        SessionSignal::new().end();
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let signal = SessionSignal::new();
        signal.end();
        let mut late = signal.subscribe();
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }
}
