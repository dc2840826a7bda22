//! # Connection Session Manager
//!
//! Maps a leased backend connection to the client session that currently owns
//! it, together with the sender its reply must go to. The backend I/O path
//! calls [`ConnectionSessionManager::deliver`] when a response is decoded; the
//! lease set clears the binding when the connection goes back to its pool, so a
//! late reply can never be attributed to the next statement using it.

use crate::backend::collector::ResultSender;
use crate::backend::packet::BackendResponse;
use dashmap::DashMap;
use tracing::{debug, warn};

/// Client-side identity of the statement being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientSession {
    pub session_id: u32,
    /// Sequence id of the client command packet
    pub sequence_id: u32,
}

impl ClientSession {
    pub fn new(session_id: u32, sequence_id: u32) -> Self {
        Self {
            session_id,
            sequence_id,
        }
    }
}

#[derive(Debug)]
struct SessionBinding {
    session_id: u32,
    reply_to: Option<ResultSender>,
}

#[derive(Debug, Default)]
pub struct ConnectionSessionManager {
    bindings: DashMap<String, SessionBinding>,
}

impl ConnectionSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a freshly leased connection to a session, replacing any stale binding
    pub fn register(&self, connection_id: &str, session_id: u32, reply_to: ResultSender) {
        let previous = self.bindings.insert(
            connection_id.to_string(),
            SessionBinding {
                session_id,
                reply_to: Some(reply_to),
            },
        );
        if let Some(previous) = previous {
            warn!(
                connection_id = %connection_id,
                previous_session = previous.session_id,
                session_id = session_id,
                "Replacing stale connection binding"
            );
        }
    }

    /// Route a decoded backend response to the statement waiting for it
    ///
    /// Returns false when the connection is unbound, already answered, or its
    /// collector has stopped waiting.
    pub fn deliver(&self, connection_id: &str, response: BackendResponse) -> bool {
        let reply_to = self
            .bindings
            .get_mut(connection_id)
            .and_then(|mut binding| binding.reply_to.take());

        match reply_to {
            Some(sender) => sender.deliver(response),
            None => {
                debug!(
                    connection_id = %connection_id,
                    "Dropping response for connection without a waiting statement"
                );
                false
            }
        }
    }

    pub fn session_of(&self, connection_id: &str) -> Option<u32> {
        self.bindings
            .get(connection_id)
            .map(|binding| binding.session_id)
    }

    pub fn clear(&self, connection_id: &str) {
        self.bindings.remove(connection_id);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::collector::ResponseCollector;
    use crate::backend::packet::OkAck;
    use std::time::Duration;

    fn ack() -> BackendResponse {
        BackendResponse::Ack(OkAck::new(1, 1, 0))
    }

    #[tokio::test]
    async fn test_deliver_reaches_registered_collector_once() {
        let sessions = ConnectionSessionManager::new();
        let mut collector = ResponseCollector::new(1);
        sessions.register("conn-a", 42, collector.sender(0, "ds_0").unwrap());

        assert_eq!(sessions.session_of("conn-a"), Some(42));
        assert!(sessions.deliver("conn-a", ack()));
        // a second reply on the same lease has nowhere to go
        assert!(!sessions.deliver("conn-a", ack()));

        let results = collector.collect(Duration::from_secs(1)).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_clear_prevents_misattribution() {
        let sessions = ConnectionSessionManager::new();
        let mut collector = ResponseCollector::new(1);
        sessions.register("conn-a", 1, collector.sender(0, "ds_0").unwrap());
        sessions.clear("conn-a");

        assert!(sessions.is_empty());
        assert!(!sessions.deliver("conn-a", ack()));
    }

    #[test]
    fn test_register_overwrites_stale_binding() {
        let sessions = ConnectionSessionManager::new();
        let mut first = ResponseCollector::new(1);
        let mut second = ResponseCollector::new(1);
        sessions.register("conn-a", 1, first.sender(0, "ds_0").unwrap());
        sessions.register("conn-a", 2, second.sender(0, "ds_0").unwrap());

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions.session_of("conn-a"), Some(2));
    }
}
