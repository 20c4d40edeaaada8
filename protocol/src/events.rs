//! Execution events.
//!
//! Every handled transaction emits a small event stream the surrounding
//! runtime forwards to indexers and subscribers: one event tagged with the
//! transaction kind and its public amount, one `message` event naming the
//! module and sender, and — when a recipient is present — one more
//! carrying it.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event type & attribute constants
// ---------------------------------------------------------------------------

/// Event type for extended (confidential-capable) transactions.
pub const EVENT_TYPE_TX: &str = "veil_tx";

/// Event type for chain-native transfers.
pub const EVENT_TYPE_NATIVE: &str = "veil_transfer";

/// Event type for the module/sender message event.
pub const EVENT_TYPE_MESSAGE: &str = "message";

pub const ATTR_KEY_AMOUNT: &str = "amount";
pub const ATTR_KEY_KIND: &str = "kind";
pub const ATTR_KEY_RECIPIENT: &str = "recipient";
pub const ATTR_KEY_SENDER: &str = "sender";
pub const ATTR_KEY_MODULE: &str = "module";

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single key/value attribute of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// A typed event with ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub attributes: Vec<Attribute>,
}

impl Event {
    /// A new event with no attributes yet.
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            attributes: Vec::new(),
        }
    }

    /// Append an attribute (builder style).
    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    /// Look up an attribute value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_appends_in_order() {
        let event = Event::new(EVENT_TYPE_TX)
            .attr(ATTR_KEY_KIND, "mint")
            .attr(ATTR_KEY_AMOUNT, "100");

        assert_eq!(event.event_type, EVENT_TYPE_TX);
        assert_eq!(event.attributes.len(), 2);
        assert_eq!(event.get(ATTR_KEY_KIND), Some("mint"));
        assert_eq!(event.get(ATTR_KEY_AMOUNT), Some("100"));
        assert_eq!(event.get("missing"), None);
    }
}
