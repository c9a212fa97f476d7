use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::DocumentStore;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let document_version = state
        .store
        .as_ref()
        .and_then(|s| s.load().ok().flatten())
        .map(|d| d.version);
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "documentVersion": document_version,
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(initialized) => ok(
            &req.id,
            json!({ "workspacePath": path.to_string_lossy(), "initialized": initialized }),
        ),
        Err((code, message)) => err(&req.id, code, message, None),
    }
}

/// Opens the store for `path` and makes it current. Returns whether a fresh
/// document had to be written.
pub fn open_workspace(state: &mut AppState, path: &Path) -> Result<bool, (&'static str, String)> {
    let cfg = config::load_config(&state.cli, Some(path))
        .map_err(|e| ("config_invalid", format!("{e:#}")))?;

    let store = DocumentStore::open(path, cfg.storage_quota_bytes)
        .map_err(|e| ("db_open_failed", format!("{e:#}")))?;

    let existed = store
        .load()
        .map_err(|e| (e.code(), e.to_string()))?
        .is_some();
    store
        .initialize_if_absent()
        .map_err(|e| (e.code(), e.to_string()))?;

    info!(
        workspace = %path.display(),
        quota = cfg.storage_quota_bytes,
        initialized = !existed,
        "workspace opened"
    );
    state.workspace = Some(path.to_path_buf());
    state.config = cfg;
    state.store = Some(store);
    Ok(!existed)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
