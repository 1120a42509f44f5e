// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Event subscription.
//!
//! [`EventStream`] long-polls `event.from` with the token returned by the
//! previous batch. Servers that do not know `event.from` are read through
//! the legacy `event.register` / `event.next` pair instead.

use std::collections::HashMap;
use std::time::Duration;

// Third-party crates
use chrono::{DateTime, TimeZone, Utc};
use futures::Stream;
use tracing::{debug, warn};

// Local crates
use xenapi_wire::{
    CallSite, CodecError, DecodeMode, Record, RecordReader, Unmarshal, Value, datetime,
};

use crate::api::{Event, EventOperation};
use crate::errors::Error;
use crate::session::Session;

/// Added to the poll timeout to get the deadline of one `event.from` call.
const POLL_MARGIN: Duration = Duration::from_secs(10);

/// A change to one object.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Server-assigned event id.
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Class of the changed object, e.g. `VM`.
    pub class: String,
    pub operation: EventOperation,
    /// Reference of the changed object.
    pub reference: String,
    pub obj_uuid: String,
    /// The object record after the change. Absent for deletions.
    pub snapshot: Option<Value>,
    mode: DecodeMode,
}

impl EventRecord {
    /// Decodes the snapshot as the record of its class.
    pub fn snapshot_as<R: Record>(&self) -> Result<Option<R>, CodecError> {
        let site = CallSite::new("event")
            .with_mode(self.mode)
            .field("snapshot");

        if !self.class.eq_ignore_ascii_case(R::CLASS) {
            return Err(CodecError::ReferenceClassMismatch {
                site: (&site).into(),
                expected: R::CLASS,
                found: self.class.clone(),
            });
        }

        match &self.snapshot {
            Some(snapshot) => R::unmarshal(snapshot.clone(), &site).map(Some),
            None => Ok(None),
        }
    }
}

impl Unmarshal for EventRecord {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        let mut r = RecordReader::new(value, site)?;
        let id = event_id(r.required("id")?, &site.field("id"))?;
        let timestamp = r.optional::<Option<Value>>("timestamp")?.and_then(timestamp);
        let record = EventRecord {
            id,
            timestamp,
            class: r.required("class")?,
            operation: r.required("operation")?,
            reference: r.required("ref")?,
            obj_uuid: r.optional("obj_uuid")?,
            snapshot: r.optional("snapshot")?,
            mode: site.mode(),
        };
        r.finish()?;
        Ok(record)
    }
}

// Ids are ints from event.next and strings from event.from.
fn event_id(value: Value, site: &CallSite) -> Result<String, CodecError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Int(i) => Ok(i.to_string()),
        other => Err(CodecError::TypeMismatch {
            site: site.into(),
            expected: "string",
            found: other.kind(),
        }),
    }
}

// Timestamps come as dateTime values, as ISO 8601 strings or as seconds
// since the epoch.
fn timestamp(value: Value) -> Option<DateTime<Utc>> {
    match value {
        Value::DateTime(ts) => Some(ts),
        Value::String(s) => datetime::parse(&s).or_else(|| {
            let seconds: f64 = s.trim().parse().ok()?;
            Utc.timestamp_millis_opt((seconds * 1000.0) as i64).single()
        }),
        _ => None,
    }
}

/// One answer of `event.from`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventBatch {
    pub events: Vec<EventRecord>,
    pub valid_ref_counts: HashMap<String, i64>,
    /// Pass to the next call to get the events that follow this batch.
    pub token: String,
}

impl Unmarshal for EventBatch {
    fn unmarshal(value: Value, site: &CallSite) -> Result<Self, CodecError> {
        let mut r = RecordReader::new(value, site)?;
        let batch = EventBatch {
            events: r.required("events")?,
            valid_ref_counts: r.optional("valid_ref_counts")?,
            token: r.required("token")?,
        };
        r.finish()?;
        Ok(batch)
    }
}

/// Pull-style reader of event batches for a set of classes.
///
/// A stream has a single consumer. Use one stream per consumer.
pub struct EventStream {
    session: Session,
    classes: Vec<String>,
    timeout: Duration,
    token: String,
    legacy: bool,
    closed: bool,
}

impl EventStream {
    /// Subscribes to `classes` (`"*"` for all). Each poll blocks on the
    /// server for at most `timeout` when nothing happens.
    pub fn new<I, S>(session: &Session, classes: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deadline = session.timeout().max(timeout + POLL_MARGIN);
        Self {
            session: session.with_timeout(deadline),
            classes: classes.into_iter().map(Into::into).collect(),
            timeout,
            token: String::new(),
            legacy: false,
            closed: false,
        }
    }

    /// Starts from `token` instead of the beginning.
    pub fn with_token(self, token: &str) -> Self {
        Self {
            token: token.to_string(),
            ..self
        }
    }

    /// Token of the last batch received.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the legacy `event.next` interface is in use.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Waits for the next batch. Returns `None` once the stream is closed.
    pub async fn next(&mut self) -> Result<Option<EventBatch>, Error> {
        if self.closed {
            return Ok(None);
        }

        if !self.legacy {
            let result = Event::from(
                &self.session,
                &self.classes,
                &self.token,
                self.timeout.as_secs_f64(),
            )
            .await;

            match result {
                Ok(batch) => {
                    debug!(events = batch.events.len(), token = %batch.token, "received events");
                    self.token = batch.token.clone();
                    return Ok(Some(batch));
                }
                Err(e) if e.api_code() == Some("MESSAGE_METHOD_UNKNOWN") => {
                    warn!("server lacks event.from, falling back to event.register and event.next");
                    Event::register(&self.session, &self.classes).await?;
                    self.legacy = true;
                }
                Err(e) => return Err(e),
            }
        }

        let events = Event::next(&self.session).await?;
        if let Some(last) = events.last() {
            self.token = last.id.clone();
        }
        debug!(events = events.len(), "received legacy events");

        Ok(Some(EventBatch {
            events,
            valid_ref_counts: HashMap::new(),
            token: self.token.clone(),
        }))
    }

    /// Ends the subscription.
    pub async fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.legacy {
            Event::unregister(&self.session, &self.classes).await?;
        }
        Ok(())
    }

    /// Adapts the stream to [`futures::Stream`]. The stream ends after the
    /// first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<EventBatch, Error>> {
        futures::stream::unfold(self, |mut events| async move {
            match events.next().await {
                Ok(Some(batch)) => Some((Ok(batch), events)),
                Ok(None) => None,
                Err(e) => {
                    events.closed = true;
                    Some((Err(e), events))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BondMode, BondRecord, TaskRecord};

    fn site() -> CallSite {
        CallSite::new("event.from").with_mode(DecodeMode::Strict).result()
    }

    fn bond_snapshot() -> Value {
        Value::structure([
            ("uuid", Value::from("b-uuid")),
            ("master", Value::from("OpaqueRef:m")),
            ("slaves", Value::Array(vec![Value::from("OpaqueRef:p1")])),
            ("other_config", Value::Struct(Default::default())),
            ("primary_slave", Value::from("OpaqueRef:p1")),
            ("mode", Value::from("lacp")),
            ("properties", Value::Struct(Default::default())),
            ("links_up", Value::from(2)),
            ("auto_update_mac", Value::from(true)),
        ])
    }

    fn event(class: &str, snapshot: Option<Value>) -> Value {
        let mut members = vec![
            ("id", Value::from("17")),
            ("timestamp", Value::from("20250615T08:00:00Z")),
            ("class", Value::from(class)),
            ("operation", Value::from("add")),
            ("ref", Value::from("OpaqueRef:b")),
        ];
        if let Some(snapshot) = snapshot {
            members.push(("snapshot", snapshot));
        }
        Value::structure(members)
    }

    #[test]
    fn test_decode_event() {
        let record = EventRecord::unmarshal(event("Bond", None), &site()).unwrap();
        assert_eq!(record.id, "17");
        assert_eq!(record.class, "Bond");
        assert_eq!(record.operation, EventOperation::Add);
        assert_eq!(record.reference, "OpaqueRef:b");
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 6, 15, 8, 0, 0).unwrap())
        );
        assert!(record.snapshot.is_none());
    }

    #[test]
    fn test_numeric_id_and_epoch_timestamp() {
        let value = Value::structure([
            ("id", Value::from(42)),
            ("timestamp", Value::from("1750000000.5")),
            ("class", Value::from("VM")),
            ("operation", Value::from("del")),
            ("ref", Value::from("OpaqueRef:v")),
        ]);
        let record = EventRecord::unmarshal(value, &site()).unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.operation, EventOperation::Del);
        assert_eq!(
            record.timestamp.map(|ts| ts.timestamp_millis()),
            Some(1_750_000_000_500)
        );
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let value = Value::structure([
            ("id", Value::from("1")),
            ("class", Value::from("VM")),
            ("operation", Value::from("rename")),
            ("ref", Value::from("OpaqueRef:v")),
        ]);
        assert!(matches!(
            EventRecord::unmarshal(value, &site()),
            Err(CodecError::UnknownEnumLabel { .. })
        ));
    }

    #[test]
    fn test_snapshot_as_record() {
        let record =
            EventRecord::unmarshal(event("Bond", Some(bond_snapshot())), &site()).unwrap();
        let bond: BondRecord = record.snapshot_as().unwrap().unwrap();
        assert_eq!(bond.uuid, "b-uuid");
        assert_eq!(bond.mode, BondMode::Lacp);
    }

    #[test]
    fn test_snapshot_class_mismatch() {
        let record =
            EventRecord::unmarshal(event("Bond", Some(bond_snapshot())), &site()).unwrap();
        let err = record.snapshot_as::<TaskRecord>().unwrap_err();
        assert!(matches!(
            err,
            CodecError::ReferenceClassMismatch {
                expected: "task",
                ..
            }
        ));
    }

    #[test]
    fn test_decode_batch() {
        let value = Value::structure([
            ("events", Value::Array(vec![event("Bond", None)])),
            (
                "valid_ref_counts",
                Value::structure([("Bond", Value::from("3"))]),
            ),
            ("token", Value::from("17")),
        ]);
        let batch = EventBatch::unmarshal(value, &site()).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.token, "17");
        assert_eq!(batch.valid_ref_counts.get("Bond"), Some(&3));
    }
}
