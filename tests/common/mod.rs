//! Common test utilities shared across integration tests.

use async_trait::async_trait;
use predictor::{Event, EventHandler, Payload};
use serde_json::json;
use tokio::sync::Mutex;

/// Payload tagged with a number, so executions can be told apart.
pub fn payload(n: u64) -> Payload {
    let mut payload = Payload::new();
    payload.insert("n".to_string(), json!(n));
    payload
}

/// Read back the tag written by [`payload`].
pub fn tag(payload: &Payload) -> u64 {
    payload["n"].as_u64().unwrap()
}

/// Event handler that keeps every event it sees.
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}
