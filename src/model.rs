// Remote item snapshot as returned by a listing or metadata call.
//
// The kind of an item is decided once, when the record is parsed, from the
// facet the drive attaches to it (`file` or `folder`). Everything downstream
// matches on `EntryKind` instead of poking at the raw JSON again.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// Items modified within this many days are flagged as recent in listings.
pub const RECENT_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    Unknown,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
            EntryKind::Unknown => "?",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub name: String,
    pub id: String,
    pub kind: EntryKind,
    pub last_modified: Option<DateTime<Utc>>,
    pub parent_id: Option<String>,
    /// Raw record as received, written verbatim into metadata sidecars.
    pub raw: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemFields {
    id: String,
    name: String,
    #[serde(default)]
    last_modified_date_time: Option<String>,
    #[serde(default)]
    parent_reference: Option<ParentReference>,
    #[serde(default)]
    file: Option<Value>,
    #[serde(default)]
    folder: Option<Value>,
}

#[derive(Deserialize)]
struct ParentReference {
    #[serde(default)]
    id: Option<String>,
}

impl RemoteEntry {
    /// Build an entry from a drive item record. Records without `id` or
    /// `name` are rejected.
    pub fn from_record(raw: Value) -> Result<Self> {
        let fields: ItemFields = serde_json::from_value(raw.clone())
            .map_err(|e| Error::Malformed(format!("drive item: {e}")))?;

        let kind = if fields.file.is_some() {
            EntryKind::File
        } else if fields.folder.is_some() {
            EntryKind::Folder
        } else {
            EntryKind::Unknown
        };

        let last_modified = fields
            .last_modified_date_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(RemoteEntry {
            name: fields.name,
            id: fields.id,
            kind,
            last_modified,
            parent_id: fields.parent_reference.and_then(|p| p.id),
            raw,
        })
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Display-only flag: modified within the last `RECENT_WINDOW_DAYS`.
    pub fn is_recent(&self, now: DateTime<Utc>) -> bool {
        match self.last_modified {
            Some(ts) => ts > now - Duration::days(RECENT_WINDOW_DAYS),
            None => false,
        }
    }

    /// Label used in menus: `"{name} ({id})"`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }

    /// One line of a directory listing, as written to the log.
    pub fn listing_line(&self) -> String {
        let modified = self
            .last_modified
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "?".into());
        format!(
            "{} - ({}) [{}] [Modified: {}]",
            self.name, self.id, self.kind, modified
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_facet_wins_over_missing_folder() {
        let entry = RemoteEntry::from_record(json!({
            "id": "I1",
            "name": "a.txt",
            "file": { "mimeType": "text/plain" },
            "lastModifiedDateTime": "2024-03-01T10:00:00Z",
            "parentReference": { "id": "ROOTID" }
        }))
        .unwrap();
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.parent_id.as_deref(), Some("ROOTID"));
        assert!(entry.last_modified.is_some());
        assert_eq!(entry.label(), "a.txt (I1)");
    }

    #[test]
    fn record_without_facet_is_unknown() {
        let entry = RemoteEntry::from_record(json!({
            "id": "P1",
            "name": "Notebook",
            "package": { "type": "oneNote" }
        }))
        .unwrap();
        assert_eq!(entry.kind, EntryKind::Unknown);
        assert!(entry.last_modified.is_none());
    }

    #[test]
    fn record_without_id_is_rejected() {
        let err = RemoteEntry::from_record(json!({ "name": "x" })).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn unparsable_timestamp_is_absent() {
        let entry = RemoteEntry::from_record(json!({
            "id": "F1",
            "name": "Docs",
            "folder": { "childCount": 0 },
            "lastModifiedDateTime": "yesterday-ish"
        }))
        .unwrap();
        assert!(entry.last_modified.is_none());
        assert!(!entry.is_recent(Utc::now()));
    }

    #[test]
    fn recent_window_is_ninety_days() {
        let now = Utc::now();
        let mut entry = RemoteEntry::from_record(json!({
            "id": "I1",
            "name": "a.txt",
            "file": {}
        }))
        .unwrap();

        entry.last_modified = Some(now - Duration::days(10));
        assert!(entry.is_recent(now));

        entry.last_modified = Some(now - Duration::days(120));
        assert!(!entry.is_recent(now));
    }
}
