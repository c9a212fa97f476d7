use std::path::PathBuf;

use crate::config::{Cli, ConduitConfig};
use crate::store::DocumentStore;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub cli: Cli,
    pub config: ConduitConfig,
    pub workspace: Option<PathBuf>,
    pub store: Option<DocumentStore>,
}

impl AppState {
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            config: ConduitConfig::default(),
            workspace: None,
            store: None,
        }
    }
}
