mod backup;
mod config;
mod db;
mod exchange;
mod ipc;
mod logging;
mod model;
mod profile;
mod recorder;
mod stats;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() {
    let cli = config::Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    let workspace = cli.workspace.clone();
    let mut state = ipc::AppState::new(cli);
    if let Some(path) = workspace {
        if let Err((code, message)) = ipc::open_workspace(&mut state, &path) {
            tracing::error!(code, %message, workspace = %path.display(), "could not open workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::debug!("stdin closed, exiting");
}
