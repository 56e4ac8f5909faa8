//! Session lifecycle events, delivered as one tagged type through a single
//! subscription point.

use smol_str::SmolStr;
use tokio::sync::broadcast;
use url::Url;

/// Everything a session reports to its host application.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Login completed through an incoming redirect.
    Login {
        /// The authenticated WebID.
        web_id: Url,
    },
    /// The session was logged out locally.
    Logout,
    /// A previously persisted session was picked up again.
    SessionRestored,
    /// Tokens expired and could not be refreshed.
    SessionExpired,
    /// Tokens were refreshed behind a request.
    SessionExtended {
        /// Seconds until the fresh access token expires, when known.
        expires_in: Option<i64>,
    },
    /// The identity provider sent the user back with an error.
    Error {
        code: SmolStr,
        description: Option<SmolStr>,
    },
}

/// Broadcast channel the session publishes on.
///
/// Receivers that fall behind miss events rather than blocking the session;
/// subscribe before triggering the operation whose events you care about.
#[derive(Clone, Debug)]
pub struct EventChannel {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Get a fresh receiver for all events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_all_subscribers() {
        let channel = EventChannel::new();
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        channel.emit(SessionEvent::Logout);
        assert_eq!(a.recv().await.unwrap(), SessionEvent::Logout);
        assert_eq!(b.recv().await.unwrap(), SessionEvent::Logout);
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        EventChannel::new().emit(SessionEvent::SessionRestored);
    }
}
