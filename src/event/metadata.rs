use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Contextual information that travels with every event across the
/// causal chain of one payment. Handlers copy the incoming event's
/// metadata onto the events they emit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl EventMetadata {
    pub fn new(
        client_id: impl Into<String>,
        request_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        EventMetadata {
            client_id: client_id.into(),
            request_id: request_id.into(),
            source: source.into(),
            extra: HashMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_field_names() {
        let meta = EventMetadata::new("web", "req-1", "payflow-api");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["clientId"], "web");
        assert_eq!(json["requestId"], "req-1");
        assert_eq!(json["source"], "payflow-api");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn extra_round_trips() {
        let meta = EventMetadata::new("web", "req-1", "api").with_extra("traceId", "t-9");
        let json = serde_json::to_string(&meta).unwrap();
        let back: EventMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extra.get("traceId").unwrap(), "t-9");
    }

    #[test]
    fn missing_fields_default() {
        let back: EventMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(back, EventMetadata::default());
    }
}
