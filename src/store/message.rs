use std::collections::BTreeSet;

use jiff::Timestamp;
use log::warn;
use rusqlite::Row;

/// A mailbox message as known locally.
///
/// `processed` is local bookkeeping: it records that rule evaluation has
/// been finalized for this message, and it survives any later re-fetch of
/// the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: String,
    sender: String,
    subject: String,
    snippet: String,
    received_at: Option<Timestamp>,
    labels: BTreeSet<String>,
    is_read: bool,
    processed: bool,
}

impl Message {
    pub fn new(
        id: String,
        sender: String,
        subject: String,
        snippet: String,
        received_at: Option<Timestamp>,
        labels: BTreeSet<String>,
        is_read: bool,
    ) -> Self {
        Self {
            id,
            sender,
            subject,
            snippet,
            received_at,
            labels,
            is_read,
            processed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    pub fn received_at(&self) -> Option<Timestamp> {
        self.received_at
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn processed(&self) -> bool {
        self.processed
    }
}

impl TryFrom<&Row<'_>> for Message {
    type Error = rusqlite::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let id: String = row.get(0)?;
        let labels: String = row.get(4)?;
        let received_at: Option<String> = row.get(5)?;
        let received_at = received_at.and_then(|raw| match raw.parse::<Timestamp>() {
            Ok(timestamp) => Some(timestamp),
            Err(err) => {
                warn!("message {id} has an unparseable received_at {raw:?}: {err}");
                None
            }
        });
        Ok(Self {
            labels: labels_from_json(&labels),
            id,
            sender: row.get(1)?,
            subject: row.get(2)?,
            snippet: row.get(3)?,
            received_at,
            is_read: row.get(6)?,
            processed: row.get(7)?,
        })
    }
}

pub(crate) fn labels_to_json(labels: &BTreeSet<String>) -> String {
    serde_json::to_string(labels).expect("label set should serialize")
}

pub(crate) fn labels_from_json(raw: &str) -> BTreeSet<String> {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!("stored label set {raw:?} is unreadable: {err}");
        BTreeSet::new()
    })
}
