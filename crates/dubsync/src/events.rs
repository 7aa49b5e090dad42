//! Job event broadcast
//!
//! Every connected WebSocket client sees every event as a
//! `{"type": ..., "data": ...}` text frame.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One message on the event socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum JobEvent {
    /// Human-readable status line
    Progress(String),
    /// Verbatim line from the sync tool's log file
    Log(String),
    /// Output file name; the run finished and the file is in results
    Result(String),
    /// The run ended without a usable output
    Failed(String),
}

/// Clonable fan-out handle. Holding a hub does not keep events alive;
/// receivers only see what is sent after they subscribe.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<JobEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Fan out to current subscribers. Nobody listening is fine; a slow
    /// receiver lags and skips ahead instead of blocking the sender.
    pub fn send(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape_matches_clients() {
        let event = JobEvent::Progress("Generating audio...".to_string());
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "progress", "data": "Generating audio..."})
        );

        let event = JobEvent::Result("output_123.mp4".to_string());
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "result", "data": "output_123.mp4"})
        );
    }

    #[tokio::test]
    async fn test_delivers_to_subscribers() {
        let hub = EventHub::new(8);
        let mut rx = hub.subscribe();

        hub.send(JobEvent::Log("frame 1".to_string()));
        assert_eq!(rx.recv().await.unwrap(), JobEvent::Log("frame 1".to_string()));
    }

    #[test]
    fn test_send_without_subscribers_is_a_noop() {
        let hub = EventHub::new(8);
        hub.send(JobEvent::Failed("nobody cares".to_string()));
    }
}
