//! Fixed event and batch record types. The JSON shape here is the wire and
//! spool format both: a `Batch` round-trips identically to and from disk and
//! to and from the ingest endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Annotation produced by the pluggable extractor. Missing fields are
/// explicit nulls, never omitted, so downstream consumers see a stable shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub ip: Option<String>,
    pub user: Option<String>,
}

/// Collector identity, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorIdentity {
    pub host: String,
}

/// An immutable record created exactly once per observed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub client_uuid: Uuid,
    pub ts: i64,
    pub source: String,
    pub msg: String,
    pub meta: Meta,
    pub collector: CollectorIdentity,
}

/// An ordered sequence of events, as carried on the wire and in the spool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    pub events: Vec<Event>,
}

impl Batch {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_wire_shape_is_events_array() {
        let batch = Batch::new(vec![Event {
            client_uuid: Uuid::nil(),
            ts: 1,
            source: "/var/log/a.log".into(),
            msg: "hello".into(),
            meta: Meta { ip: None, user: None },
            collector: CollectorIdentity { host: "h".into() },
        }]);
        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.get("events").unwrap().is_array());
        assert_eq!(json["events"][0]["meta"]["ip"], serde_json::Value::Null);
    }

    #[test]
    fn batch_round_trips_through_json() {
        let batch = Batch::new(vec![Event {
            client_uuid: Uuid::new_v4(),
            ts: 42,
            source: "/var/log/b.log".into(),
            msg: "world".into(),
            meta: Meta { ip: Some("1.2.3.4".into()), user: Some("alice".into()) },
            collector: CollectorIdentity { host: "box".into() },
        }]);
        let s = serde_json::to_string(&batch).unwrap();
        let back: Batch = serde_json::from_str(&s).unwrap();
        assert_eq!(back.events, batch.events);
    }
}
