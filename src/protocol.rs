//! WebSocket protocol messages
//!
//! Every request carries a `request_id` that is echoed back on the matching
//! response so clients can pipeline requests on one connection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Messages sent from a client to the server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat ping
    Ping,
    ListDirectory {
        request_id: String,
        #[serde(default)]
        path: String,
    },
    Search {
        request_id: String,
        #[serde(default)]
        path: String,
        term: String,
    },
    StatEntry {
        request_id: String,
        path: String,
    },
    Classify {
        request_id: String,
        path: String,
    },
    Preview {
        request_id: String,
        path: String,
    },
    /// Raw bytes of a file, base64 encoded on the wire
    ReadFile {
        request_id: String,
        path: String,
    },
    DeleteFile {
        request_id: String,
        path: String,
    },
}

/// Messages sent from the server to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    DirectoryListing {
        request_id: String,
        path: String,
        entries: Vec<ListingItem>,
        total_count: usize,
        truncated: bool,
    },
    SearchResults {
        request_id: String,
        path: String,
        term: String,
        entries: Vec<ListingItem>,
        truncated: bool,
    },
    EntryInfo {
        request_id: String,
        path: String,
        metadata: EntryMetadata,
    },
    Classification {
        request_id: String,
        path: String,
        content_type: ContentType,
    },
    Preview {
        request_id: String,
        path: String,
        preview: PreviewResult,
    },
    FileContent {
        request_id: String,
        path: String,
        content_type: ContentType,
        size: u64,
        data: String,
    },
    Deleted {
        request_id: String,
        path: String,
    },
    OperationError {
        request_id: String,
        operation: String,
        path: String,
        error: FileSystemError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

/// One child of a directory, as seen at enumeration time.
///
/// `relative_path` is relative to the served root and always uses `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub kind: EntryKind,
    pub name: String,
    pub relative_path: String,
}

/// Stat-derived display data for an [`Entry`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub kind_label: String,
}

impl EntryMetadata {
    pub const UNKNOWN_LABEL: &'static str = "Unknown";

    /// Sentinel for entries whose stat failed (e.g. removed mid-listing)
    pub fn unknown() -> Self {
        Self {
            size_bytes: 0,
            modified_at: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            kind_label: Self::UNKNOWN_LABEL.to_string(),
        }
    }
}

/// An entry paired with its metadata, as sent in listings and search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingItem {
    #[serde(flatten)]
    pub entry: Entry,
    pub metadata: EntryMetadata,
}

/// MIME-like classification of a file. Serialized as `primary/subtype`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType {
    pub primary: String,
    pub subtype: String,
}

impl ContentType {
    pub fn new(primary: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            subtype: subtype.into(),
        }
    }

    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Parse a static `primary/subtype` string, falling back to octet-stream
    pub fn from_mime(mime: &str) -> Self {
        mime.parse().unwrap_or_else(|_| Self::octet_stream())
    }

    pub fn is_json(&self) -> bool {
        self.primary == "application" && self.subtype == "json"
    }

    pub fn is_text(&self) -> bool {
        self.primary == "text"
    }

    pub fn is_image(&self) -> bool {
        self.primary == "image"
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::octet_stream()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary, self.subtype)
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((primary, subtype))
                if !primary.is_empty() && !subtype.is_empty() && !subtype.contains('/') =>
            {
                Ok(Self::new(primary, subtype))
            }
            _ => Err(format!("invalid content type: {}", s)),
        }
    }
}

impl Serialize for ContentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Renderable body of a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Renderable {
    Text { body: String },
    InlineImage { data_uri: String },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub display_name: String,
    pub content_type: ContentType,
    pub renderable: Renderable,
}

/// Errors surfaced to clients. Paths are always the client-supplied,
/// root-relative form so responses never disclose host layout.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSystemError {
    #[error("access denied: path is outside the allowed directory: {attempted_path}")]
    AccessDenied { attempted_path: String },
    #[error("path not found: {path}")]
    NotFound { path: String },
    #[error("not a directory: {path}")]
    NotADirectory { path: String },
    #[error("not a file: {path}")]
    NotAFile { path: String },
    #[error("failed to read {path}: {message}")]
    ReadFailure { path: String, message: String },
    #[error("file too large: {path} is {size} bytes (limit {max_size})")]
    FileTooLarge { path: String, size: u64, max_size: u64 },
    #[error("permission denied for {path}: {reason}")]
    PermissionDenied { path: String, reason: String },
}

impl FileSystemError {
    pub fn read_failure(path: &str, err: impl fmt::Display) -> Self {
        FileSystemError::ReadFailure {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_serializes_as_mime_string() {
        let json = serde_json::to_string(&ContentType::new("image", "png")).unwrap();
        assert_eq!(json, "\"image/png\"");
        let back: ContentType = serde_json::from_str(&json).unwrap();
        assert!(back.is_image());
    }

    #[test]
    fn malformed_mime_falls_back_to_octet_stream() {
        assert_eq!(ContentType::from_mime("nonsense"), ContentType::octet_stream());
        assert_eq!(ContentType::from_mime("a/b/c"), ContentType::octet_stream());
    }

    #[test]
    fn client_message_uses_snake_case_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"search","request_id":"1","term":"rep"}"#).unwrap();
        match msg {
            ClientMessage::Search { path, term, .. } => {
                assert_eq!(path, "");
                assert_eq!(term, "rep");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn listing_item_flattens_entry_fields() {
        let item = ListingItem {
            entry: Entry {
                kind: EntryKind::Folder,
                name: "sub".to_string(),
                relative_path: "sub".to_string(),
            },
            metadata: EntryMetadata::unknown(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["kind"], "folder");
        assert_eq!(value["metadata"]["kind_label"], "Unknown");
    }
}
