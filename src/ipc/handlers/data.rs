use crate::backup;
use crate::exchange::{self, ImportStrategy};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    import_err, load_document, out_dir, require_store, store_err, str_param, typed_param,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Document;
use chrono::Utc;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// `params.document` inline, else the JSON file at `params.path`.
fn import_candidate(req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    if let Some(doc) = req.params.get("document") {
        return Ok(doc.clone());
    }
    let Some(path) = str_param(req, "path") else {
        return Err(err(&req.id, "bad_params", "missing document or path", None));
    };
    backup::read_document_file(Path::new(path))
        .map_err(|e| err(&req.id, "import_unreadable", format!("{e:#}"), None))
}

fn collection_len(candidate: &serde_json::Value, key: &str) -> usize {
    candidate
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0)
}

fn handle_document_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.load_value() {
        Ok(Some(doc)) => ok(&req.id, json!({ "document": doc })),
        Ok(None) => ok(&req.id, json!({ "document": Document::default() })),
        Err(e) => store_err(req, &e),
    }
}

fn handle_data_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    match store.usage(&doc) {
        Ok(usage) => {
            let mut result = json!(usage);
            result["quotaBytes"] = json!(store.quota_bytes());
            ok(&req.id, result)
        }
        Err(e) => store_err(req, &e),
    }
}

fn handle_validate_import(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let candidate = match import_candidate(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let counts = json!({
        "assessmentCount": collection_len(&candidate, "assessments"),
        "studentCount": collection_len(&candidate, "students"),
    });
    match exchange::parse_candidate(candidate) {
        Ok(_) => {
            let mut result = counts;
            result["valid"] = json!(true);
            ok(&req.id, result)
        }
        Err(e) => {
            let mut result = counts;
            result["valid"] = json!(false);
            result["reason"] = json!(e.reason());
            result["message"] = json!(e.to_string());
            result["details"] = e.details();
            ok(&req.id, result)
        }
    }
}

fn handle_data_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let strategy: ImportStrategy = match typed_param(req, "strategy") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let candidate = match import_candidate(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let incoming = match exchange::parse_candidate(candidate) {
        Ok(d) => d,
        Err(e) => return import_err(req, &e),
    };
    let current = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let imported = exchange::apply_import(&current, incoming, strategy);
    let saved = match &imported.verbatim {
        Some(raw) => store.save_value(raw),
        None => store.save(&imported.document),
    };
    if let Err(e) = saved {
        return store_err(req, &e);
    }
    let next = imported.document;
    info!(
        ?strategy,
        assessments = next.assessments.len(),
        students = next.students.len(),
        "document imported"
    );
    ok(
        &req.id,
        json!({
            "strategy": strategy,
            "assessmentCount": next.assessments.len(),
            "studentCount": next.students.len(),
            "templateCount": next.templates.len(),
        }),
    )
}

fn handle_data_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let dir = match out_dir(state, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    if doc.assessments.is_empty() {
        return err(&req.id, "no_data", "no data to export", None);
    }
    match backup::export_document(&doc, &dir, Utc::now()) {
        Ok(path) => ok(&req.id, json!({ "path": path.to_string_lossy() })),
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

fn handle_data_backup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let dir = match out_dir(state, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    if doc.assessments.is_empty() {
        return err(&req.id, "no_data", "no data to backup", None);
    }
    match backup::backup_document(&doc, &dir, Utc::now()) {
        Ok(path) => ok(&req.id, json!({ "path": path.to_string_lossy() })),
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

fn handle_export_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let student = match str_param(req, "studentName").map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => return err(&req.id, "bad_params", "missing studentName", None),
    };
    let dir = match out_dir(state, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    match backup::export_student(&doc, &student, &dir, Utc::now()) {
        Ok((path, count)) => ok(
            &req.id,
            json!({ "path": path.to_string_lossy(), "assessmentCount": count }),
        ),
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

fn handle_data_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let dir = match out_dir(state, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    // Never clear without the safety copy when there is anything to lose.
    let emergency = if doc.assessments.is_empty() {
        None
    } else {
        match backup::emergency_backup(&doc, &dir, Utc::now()) {
            Ok(p) => Some(p),
            Err(e) => return err(&req.id, "io_failed", format!("{e:#}"), None),
        }
    };

    if let Err(e) = store.reset() {
        return store_err(req, &e);
    }
    info!(
        cleared_assessments = doc.assessments.len(),
        backup = emergency.is_some(),
        "document cleared"
    );
    ok(
        &req.id,
        json!({ "emergencyBackupPath": emergency.map(|p| p.to_string_lossy().to_string()) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "document.get" => Some(handle_document_get(state, req)),
        "data.stats" => Some(handle_data_stats(state, req)),
        "data.validateImport" => Some(handle_validate_import(state, req)),
        "data.import" => Some(handle_data_import(state, req)),
        "data.export" => Some(handle_data_export(state, req)),
        "data.backup" => Some(handle_data_backup(state, req)),
        "data.exportStudent" => Some(handle_export_student(state, req)),
        "data.clear" => Some(handle_data_clear(state, req)),
        _ => None,
    }
}
