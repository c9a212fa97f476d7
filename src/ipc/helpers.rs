use crate::exchange::ImportError;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::Document;
use crate::recorder::ValidationError;
use crate::store::{DocumentStore, StoreError};
use std::path::PathBuf;

pub fn require_store<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a DocumentStore, serde_json::Value> {
    state
        .store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// The stored document, or the first-run default if nothing is stored yet.
pub fn load_document(store: &DocumentStore, req: &Request) -> Result<Document, serde_json::Value> {
    store
        .load()
        .map(Option::unwrap_or_default)
        .map_err(|e| store_err(req, &e))
}

pub fn store_err(req: &Request, e: &StoreError) -> serde_json::Value {
    err(&req.id, e.code(), e.to_string(), e.details())
}

pub fn validation_err(req: &Request, e: &ValidationError) -> serde_json::Value {
    err(&req.id, e.code(), e.to_string(), e.details())
}

pub fn import_err(req: &Request, e: &ImportError) -> serde_json::Value {
    err(&req.id, e.code(), e.to_string(), Some(e.details()))
}

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

/// Deserializes `params[key]` (or all params when `key` is empty).
pub fn typed_param<T: serde::de::DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<T, serde_json::Value> {
    let raw = if key.is_empty() {
        match &req.params {
            serde_json::Value::Null => serde_json::json!({}),
            v => v.clone(),
        }
    } else {
        match req.params.get(key) {
            Some(v) => v.clone(),
            None => return Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
        }
    };
    serde_json::from_value(raw).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid {}: {e}", if key.is_empty() { "params" } else { key }),
            None,
        )
    })
}

/// `params.outDir`, else the configured backup directory.
pub fn out_dir(state: &AppState, req: &Request) -> Result<PathBuf, serde_json::Value> {
    if let Some(p) = str_param(req, "outDir") {
        return Ok(PathBuf::from(p));
    }
    match state.workspace.as_ref() {
        Some(w) => Ok(state.config.backup_dir_for(w)),
        None => Err(err(&req.id, "no_workspace", "select a workspace first", None)),
    }
}
