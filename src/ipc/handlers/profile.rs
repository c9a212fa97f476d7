use crate::ipc::error::ok;
use crate::ipc::helpers::{load_document, require_store, store_err, typed_param, validation_err};
use crate::ipc::types::{AppState, Request};
use crate::model::Profile;
use crate::profile::{self, SettingsPatch};
use serde_json::json;

fn handle_profile_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match load_document(store, req) {
        Ok(doc) => ok(&req.id, json!({ "profile": doc.profile })),
        Err(resp) => resp,
    }
}

fn handle_profile_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let input: Profile = match typed_param(req, "") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut doc = match load_document(store, req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let saved = match profile::save_profile(&mut doc, &input) {
        Ok(p) => p,
        Err(e) => return validation_err(req, &e),
    };
    if let Err(e) = store.save(&doc) {
        return store_err(req, &e);
    }
    ok(&req.id, json!({ "profile": saved }))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match load_document(store, req) {
        Ok(doc) => ok(&req.id, json!({ "settings": doc.settings })),
        Err(resp) => resp,
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let patch: SettingsPatch = match typed_param(req, "") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store.update(|doc| profile::apply_settings(&mut doc.settings, &patch)) {
        Ok(doc) => ok(&req.id, json!({ "settings": doc.settings })),
        Err(e) => store_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profile.get" => Some(handle_profile_get(state, req)),
        "profile.save" => Some(handle_profile_save(state, req)),
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
