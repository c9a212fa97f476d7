use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{load_document, require_store, str_param, typed_param};
use crate::ipc::types::{AppState, Request};
use crate::model::Document;
use crate::stats::{self, ProgressFilter};
use serde_json::json;

fn current_document(state: &AppState, req: &Request) -> Result<Document, serde_json::Value> {
    let store = require_store(state, req)?;
    load_document(store, req)
}

fn handle_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: ProgressFilter = match typed_param(req, "") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let doc = match current_document(state, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let today = chrono::Local::now().date_naive();
    let filtered = stats::filter_progress(&doc.assessments, &filter, today);
    ok(
        &req.id,
        json!({
            "summary": stats::progress_summary(&filtered),
            "assessments": filtered,
        }),
    )
}

fn handle_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    match current_document(state, req) {
        Ok(doc) => ok(&req.id, json!(stats::class_stats(&doc.assessments))),
        Err(resp) => resp,
    }
}

fn handle_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    match current_document(state, req) {
        Ok(doc) => ok(
            &req.id,
            json!({ "subjects": stats::subject_breakdown(&doc.assessments) }),
        ),
        Err(resp) => resp,
    }
}

fn handle_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(name) = str_param(req, "studentName").map(str::trim) else {
        return err(&req.id, "bad_params", "missing studentName", None);
    };
    let doc = match current_document(state, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    match stats::student_report(&doc.assessments, name) {
        Some(report) => ok(&req.id, json!({ "report": report })),
        None => err(
            &req.id,
            "not_found",
            format!("no assessments for {name}"),
            Some(json!({ "studentName": name })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.progress" => Some(handle_progress(state, req)),
        "analytics.class" => Some(handle_class(state, req)),
        "analytics.subjects" => Some(handle_subjects(state, req)),
        "analytics.student" => Some(handle_student(state, req)),
        _ => None,
    }
}
