//! Validation and application of externally supplied documents.
//!
//! Validation runs to completion before anything is mutated, so a rejected
//! candidate never produces a partial merge.

use crate::model::{Document, SUPPORTED_MAJOR_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

pub const REQUIRED_FIELDS: [&str; 5] = ["version", "assessments", "students", "settings", "profile"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} has the wrong type")]
    WrongType(&'static str),

    #[error("version `{0}` has no numeric major component")]
    InvalidVersion(String),

    #[error("data version {found} is too old; major version {minimum} or newer is required")]
    VersionTooOld { found: String, minimum: u64 },

    #[error("document does not match the expected format: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        "import_invalid"
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ImportError::MissingField(_) => "missing_field",
            ImportError::WrongType(_) => "wrong_type",
            ImportError::InvalidVersion(_) => "invalid_version",
            ImportError::VersionTooOld { .. } => "version_too_old",
            ImportError::Malformed(_) => "malformed",
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            ImportError::MissingField(f) | ImportError::WrongType(f) => {
                serde_json::json!({ "reason": self.reason(), "field": f })
            }
            _ => serde_json::json!({ "reason": self.reason() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    Replace,
    Merge,
}

/// Leading integer of `version`, read the way `parseInt` would: optional
/// sign, then digits, anything after ignored.
fn major_version(version: &str) -> Result<i64, ImportError> {
    let trimmed = version.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse::<i64>()
        .map(|major| sign * major)
        .map_err(|_| ImportError::InvalidVersion(version.to_string()))
}

pub fn validate(candidate: &Value) -> Result<(), ImportError> {
    let Some(obj) = candidate.as_object() else {
        return Err(ImportError::WrongType("document"));
    };

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            return Err(ImportError::MissingField(field));
        }
    }

    if !obj["assessments"].is_array() {
        return Err(ImportError::WrongType("assessments"));
    }
    if !obj["students"].is_array() {
        return Err(ImportError::WrongType("students"));
    }

    let Some(version) = obj["version"].as_str() else {
        return Err(ImportError::WrongType("version"));
    };
    if major_version(version)? < SUPPORTED_MAJOR_VERSION as i64 {
        return Err(ImportError::VersionTooOld {
            found: version.to_string(),
            minimum: SUPPORTED_MAJOR_VERSION,
        });
    }
    Ok(())
}

/// Keys added by export and backup files. They are not part of the document.
pub const EXPORT_STAMP_FIELDS: [&str; 3] = ["exportDate", "backupDate", "backupReason"];

/// A candidate that passed validation, kept both typed and as supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportCandidate {
    pub document: Document,
    raw: Value,
}

/// Validates and converts a candidate. Export stamps are dropped.
pub fn parse_candidate(candidate: Value) -> Result<ImportCandidate, ImportError> {
    validate(&candidate)?;
    let mut raw = candidate;
    if let Some(obj) = raw.as_object_mut() {
        for key in EXPORT_STAMP_FIELDS {
            obj.remove(key);
        }
    }
    let document = serde_json::from_value(raw.clone()).map_err(ImportError::Malformed)?;
    Ok(ImportCandidate { document, raw })
}

/// Combines `incoming` into `current`.
///
/// Assessments keep the first copy of each id (current wins), students are
/// an order-preserving union, templates are concatenated, and the incoming
/// singleton fields (version, settings, profile) overwrite the current ones.
pub fn merge(current: &Document, incoming: Document) -> Document {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let assessments = current
        .assessments
        .iter()
        .cloned()
        .chain(incoming.assessments)
        .filter(|a| seen_ids.insert(a.id.clone()))
        .collect();

    let mut seen_students: HashSet<String> = HashSet::new();
    let students = current
        .students
        .iter()
        .cloned()
        .chain(incoming.students)
        .filter(|s| seen_students.insert(s.clone()))
        .collect();

    let mut templates = current.templates.clone();
    templates.extend(incoming.templates);

    Document {
        version: incoming.version,
        profile: incoming.profile,
        settings: incoming.settings,
        assessments,
        students,
        templates,
    }
}

/// The result of an import, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    pub document: Document,
    /// Set for Replace: the candidate exactly as supplied, stamps removed.
    pub verbatim: Option<Value>,
}

pub fn apply_import(current: &Document, incoming: ImportCandidate, strategy: ImportStrategy) -> Imported {
    match strategy {
        ImportStrategy::Replace => Imported {
            document: incoming.document,
            verbatim: Some(incoming.raw),
        },
        ImportStrategy::Merge => Imported {
            document: merge(current, incoming.document),
            verbatim: None,
        },
    }
}
