//! Routing of `payload;message` lines to per-payload records.

use std::collections::BTreeMap;

use rfdlink_protocol::{PayloadMessage, PayloadPosition};
use tracing::debug;

/// Everything heard from one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadRecord {
    name: String,
    messages: Vec<String>,
    positions: Vec<PayloadPosition>,
    new_messages: Vec<String>,
    new_positions: Vec<PayloadPosition>,
}

impl PayloadRecord {
    fn new(name: &str) -> Self {
        PayloadRecord {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Payload name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All non-position messages, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// All position updates, oldest first.
    pub fn positions(&self) -> &[PayloadPosition] {
        &self.positions
    }

    /// Most recent position update.
    pub fn last_position(&self) -> Option<&PayloadPosition> {
        self.positions.last()
    }

    /// Whether anything arrived since the queues were last drained.
    pub fn has_new(&self) -> bool {
        !self.new_messages.is_empty() || !self.new_positions.is_empty()
    }

    /// Drain messages received since the last call.
    pub fn take_new_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.new_messages)
    }

    /// Drain position updates received since the last call.
    pub fn take_new_positions(&mut self) -> Vec<PayloadPosition> {
        std::mem::take(&mut self.new_positions)
    }

    fn push(&mut self, message: &PayloadMessage) {
        match message.position() {
            Some(position) => {
                self.positions.push(position.clone());
                self.new_positions.push(position);
            }
            None => {
                self.messages.push(message.message.clone());
                self.new_messages.push(message.message.clone());
            }
        }
    }
}

/// Per-payload message and position history.
#[derive(Debug, Clone, Default)]
pub struct PayloadTracker {
    payloads: BTreeMap<String, PayloadRecord>,
}

impl PayloadTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// File a message under its payload.
    ///
    /// Returns `true` when this is the first message from that payload.
    pub fn route(&mut self, message: &PayloadMessage) -> bool {
        let mut first = false;
        let record = self
            .payloads
            .entry(message.payload.clone())
            .or_insert_with(|| {
                first = true;
                debug!(payload = %message.payload, "new payload");
                PayloadRecord::new(&message.payload)
            });
        record.push(message);
        first
    }

    /// Record for one payload.
    pub fn get(&self, name: &str) -> Option<&PayloadRecord> {
        self.payloads.get(name)
    }

    /// Mutable record for one payload, for draining its queues.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut PayloadRecord> {
        self.payloads.get_mut(name)
    }

    /// Names of all payloads heard, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.payloads.keys().map(String::as_str)
    }

    /// Number of payloads heard.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Whether nothing has been routed yet.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(line: &str) -> PayloadMessage {
        PayloadMessage::parse(line).unwrap()
    }

    #[test]
    fn test_routes_messages_and_positions() {
        let mut tracker = PayloadTracker::new();
        assert!(tracker.route(&message("CUBE;hello")));
        assert!(!tracker.route(&message("CUBE;12:00:01,44.9,-93.2,1500,8")));
        assert!(tracker.route(&message("IMAGE;camera ready")));

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.names().collect::<Vec<_>>(), vec!["CUBE", "IMAGE"]);

        let cube = tracker.get("CUBE").unwrap();
        assert_eq!(cube.messages(), &["hello".to_string()]);
        assert_eq!(cube.positions().len(), 1);
        assert_eq!(cube.last_position().unwrap().satellites, 8);
    }

    #[test]
    fn test_new_item_queues_drain() {
        let mut tracker = PayloadTracker::new();
        tracker.route(&message("CUBE;one"));
        tracker.route(&message("CUBE;two"));

        let cube = tracker.get_mut("CUBE").unwrap();
        assert!(cube.has_new());
        assert_eq!(cube.take_new_messages(), vec!["one", "two"]);
        assert!(cube.take_new_positions().is_empty());
        assert!(!cube.has_new());
        assert_eq!(cube.messages().len(), 2);
    }
}
