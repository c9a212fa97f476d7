use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_document, require_store, store_err, typed_param, validation_err,
};
use crate::ipc::types::{AppState, Request};
use crate::model::AssessmentResults;
use crate::recorder::{self, AssessmentForm, TemplateDraft};
use crate::stats::{self, ProgressFilter};
use serde_json::json;
use tracing::info;

fn handle_assessments_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let form: AssessmentForm = match typed_param(req, "form") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let results: AssessmentResults = match typed_param(req, "results") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let force = req
        .params
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let mut doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let autosave = doc.settings.auto_save;

    let assessment = match recorder::record(&mut doc, &form, results) {
        Ok(a) => a,
        Err(e) => return validation_err(req, &e),
    };

    if !autosave && !force {
        return ok(&req.id, json!({ "saved": false, "assessment": assessment }));
    }

    if let Err(e) = store.save(&doc) {
        return store_err(req, &e);
    }
    info!(
        assessment_id = %assessment.id,
        subject = %assessment.subject,
        score = assessment.score(),
        "assessment recorded"
    );
    ok(&req.id, json!({ "saved": true, "assessment": assessment }))
}

fn handle_assessments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let filter: ProgressFilter = match typed_param(req, "") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let today = chrono::Local::now().date_naive();
    let assessments = stats::filter_progress(&doc.assessments, &filter, today);
    ok(&req.id, json!({ "assessments": assessments }))
}

fn handle_validate_attachment(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(mime) = req.params.get("mimeType").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing mimeType", None);
    };
    let Some(size) = req.params.get("size").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing size", None);
    };
    match recorder::validate_attachment(mime, size) {
        Ok(()) => ok(&req.id, json!({ "valid": true })),
        Err(e) => validation_err(req, &e),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match load_document(store, req) {
        Ok(doc) => ok(&req.id, json!({ "students": doc.students })),
        Err(resp) => resp,
    }
}

fn handle_templates_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match load_document(store, req) {
        Ok(doc) => ok(&req.id, json!({ "templates": doc.templates })),
        Err(resp) => resp,
    }
}

fn handle_templates_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let draft: TemplateDraft = match typed_param(req, "") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let template = match recorder::save_template(&mut doc, &draft) {
        Ok(t) => t,
        Err(e) => return validation_err(req, &e),
    };
    if let Err(e) = store.save(&doc) {
        return store_err(req, &e);
    }
    ok(&req.id, json!({ "template": template }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.record" => Some(handle_assessments_record(state, req)),
        "assessments.list" => Some(handle_assessments_list(state, req)),
        "assessments.validateAttachment" => Some(handle_validate_attachment(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "templates.list" => Some(handle_templates_list(state, req)),
        "templates.save" => Some(handle_templates_save(state, req)),
        _ => None,
    }
}
