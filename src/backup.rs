use crate::model::{Assessment, Document, DOCUMENT_VERSION};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EMERGENCY_BACKUP_REASON: &str = "Pre-clear emergency backup";

/// A document plus the stamp fields added when it leaves the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampedDocument<'a> {
    #[serde(flatten)]
    pub document: &'a Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_reason: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentExport<'a> {
    pub student: &'a str,
    pub assessments: Vec<&'a Assessment>,
    pub export_date: DateTime<Utc>,
}

fn with_current_version(doc: &Document) -> Document {
    Document {
        version: DOCUMENT_VERSION.to_string(),
        ..doc.clone()
    }
}

/// Full export (`conduit-all-data-YYYY-MM-DD.json`).
pub fn export_document(doc: &Document, out_dir: &Path, now: DateTime<Utc>) -> anyhow::Result<PathBuf> {
    let doc = with_current_version(doc);
    let stamped = StampedDocument {
        document: &doc,
        export_date: Some(now),
        backup_date: None,
        backup_reason: None,
    };
    let path = out_dir.join(format!("conduit-all-data-{}.json", now.format("%Y-%m-%d")));
    write_json_file(&path, &stamped)?;
    Ok(path)
}

/// Manual backup (`conduit-backup-YYYY-MM-DD.json`).
pub fn backup_document(doc: &Document, out_dir: &Path, now: DateTime<Utc>) -> anyhow::Result<PathBuf> {
    let doc = with_current_version(doc);
    let stamped = StampedDocument {
        document: &doc,
        export_date: None,
        backup_date: Some(now),
        backup_reason: None,
    };
    let path = out_dir.join(format!("conduit-backup-{}.json", now.format("%Y-%m-%d")));
    write_json_file(&path, &stamped)?;
    Ok(path)
}

/// Safety copy written before the store is cleared. Keeps the stored version.
pub fn emergency_backup(doc: &Document, out_dir: &Path, now: DateTime<Utc>) -> anyhow::Result<PathBuf> {
    let stamped = StampedDocument {
        document: doc,
        export_date: None,
        backup_date: Some(now),
        backup_reason: Some(EMERGENCY_BACKUP_REASON),
    };
    let path = out_dir.join(format!("emergency-backup-{}.json", now.timestamp_millis()));
    write_json_file(&path, &stamped)?;
    Ok(path)
}

pub fn export_student(
    doc: &Document,
    student_name: &str,
    out_dir: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<(PathBuf, usize)> {
    let export = StudentExport {
        student: student_name,
        assessments: doc.assessments_for(student_name).collect(),
        export_date: now,
    };
    let count = export.assessments.len();
    let path = out_dir.join(format!(
        "{}-assessment-data.json",
        file_name_safe(student_name)
    ));
    write_json_file(&path, &export)?;
    Ok((path, count))
}

pub fn read_document_file(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.to_string_lossy()))
}

fn file_name_safe(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "student".to_string()
    } else {
        cleaned
    }
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let text = serde_json::to_string_pretty(value).context("failed to serialize export")?;
    let tmp = path.with_extension("json.writing");
    {
        let mut f = File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.to_string_lossy()))?;
        f.write_all(text.as_bytes())
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        f.flush().context("failed to flush export")?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move export to {}", path.to_string_lossy()))?;
    Ok(())
}
