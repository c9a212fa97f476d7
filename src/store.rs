//! Persistence of the workspace document.
//!
//! The whole document is stored as one JSON value under [`DOCUMENT_KEY`] and
//! is always replaced in a single write. The store owns its connection, so
//! one `DocumentStore` is the only writer for a workspace within a process.

use crate::db;
use crate::model::Document;
use rusqlite::{Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DOCUMENT_KEY: &str = "conduit_data";

/// Browser local storage grants roughly 5 MiB per origin; keep the same budget.
pub const DEFAULT_STORAGE_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage quota exceeded ({needed} of {quota} bytes); free space by exporting and clearing old data")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("failed to serialize document: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("stored document is unreadable: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("storage error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::QuotaExceeded { .. } => "storage_quota_exceeded",
            StoreError::Serialization(_) => "serialization_failed",
            StoreError::Corrupt(_) => "storage_corrupt",
            StoreError::Database(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            StoreError::QuotaExceeded { needed, quota } => {
                Some(serde_json::json!({ "neededBytes": needed, "quotaBytes": quota }))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub total_assessments: usize,
    pub total_students: usize,
    pub data_size_bytes: u64,
}

pub struct DocumentStore {
    conn: Connection,
    quota_bytes: u64,
}

impl DocumentStore {
    pub fn open(workspace: &Path, quota_bytes: u64) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)?;
        Ok(Self { conn, quota_bytes })
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    pub fn load(&self) -> Result<Option<Document>, StoreError> {
        let Some(text) = db::kv_get(&self.conn, DOCUMENT_KEY)? else {
            return Ok(None);
        };
        let doc = serde_json::from_str(&text).map_err(StoreError::Corrupt)?;
        Ok(Some(doc))
    }

    /// The stored document as written, without a typed round-trip.
    pub fn load_value(&self) -> Result<Option<serde_json::Value>, StoreError> {
        let Some(text) = db::kv_get(&self.conn, DOCUMENT_KEY)? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(&text).map_err(StoreError::Corrupt)?;
        Document::deserialize(&value).map_err(StoreError::Corrupt)?;
        Ok(Some(value))
    }

    pub fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let text = serde_json::to_string(doc).map_err(StoreError::Serialization)?;
        self.write_text(&text)
    }

    /// Stores `value` as given. It must already deserialize as a [`Document`].
    pub fn save_value(&self, value: &serde_json::Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(value).map_err(StoreError::Serialization)?;
        self.write_text(&text)
    }

    fn write_text(&self, text: &str) -> Result<(), StoreError> {
        let others = db::kv_usage_excluding(&self.conn, DOCUMENT_KEY)?;
        let needed = others + (DOCUMENT_KEY.len() + text.len()) as u64;
        if needed > self.quota_bytes {
            warn!(needed, quota = self.quota_bytes, "document write rejected by quota");
            return Err(StoreError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }

        match db::kv_set(&self.conn, DOCUMENT_KEY, text) {
            Ok(()) => {
                debug!(bytes = text.len(), "document saved");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::DiskFull => {
                warn!("document write rejected: disk full");
                Err(StoreError::QuotaExceeded {
                    needed,
                    quota: self.quota_bytes,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the stored document, writing the default one on first run.
    pub fn initialize_if_absent(&self) -> Result<Document, StoreError> {
        if let Some(doc) = self.load()? {
            return Ok(doc);
        }
        let doc = Document::default();
        self.save(&doc)?;
        info!("initialized empty document");
        Ok(doc)
    }

    /// Read-modify-write of the whole document.
    pub fn update<F>(&self, mutate: F) -> Result<Document, StoreError>
    where
        F: FnOnce(&mut Document),
    {
        let mut doc = self.load()?.unwrap_or_default();
        mutate(&mut doc);
        self.save(&doc)?;
        Ok(doc)
    }

    pub fn reset(&self) -> Result<Document, StoreError> {
        let doc = Document::default();
        self.save(&doc)?;
        Ok(doc)
    }

    pub fn usage(&self, doc: &Document) -> Result<StorageUsage, StoreError> {
        let size = serde_json::to_vec(doc)
            .map_err(StoreError::Serialization)?
            .len();
        Ok(StorageUsage {
            total_assessments: doc.assessments.len(),
            total_students: doc.students.len(),
            data_size_bytes: size as u64,
        })
    }
}
