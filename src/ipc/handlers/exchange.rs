use crate::exchange;
use crate::ipc::helpers::{get_optional_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    if state.book.student_count() == 0 {
        return Err(HandlerErr::new("no_data", "データがありません"));
    }
    let out = match get_optional_str(&req.params, "outPath") {
        Some(p) => PathBuf::from(p),
        None => exchange::default_export_path(&state.export_dir, chrono::Local::now()),
    };

    match exchange::export_csv(&state.book, &out) {
        Ok(rows) => {
            tracing::info!(path = %out.display(), rows, "csv exported");
            Ok(json!({ "path": out.to_string_lossy(), "rowsExported": rows }))
        }
        Err(e) => {
            tracing::warn!(path = %out.display(), error = %format!("{e:#}"), "csv export failed");
            Err(HandlerErr::new("io_failed", format!("export failed: {e:#}"))
                .with_details(json!({ "path": out.to_string_lossy() })))
        }
    }
}

fn handle_import_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(in_path) = get_optional_str(&req.params, "inPath") else {
        return Err(HandlerErr::new("bad_params", "missing inPath"));
    };
    let path = PathBuf::from(&in_path);

    // The current book is only replaced once the whole file has parsed.
    match exchange::import_csv(&path) {
        Ok(book) => {
            state.book = book;
            tracing::info!(
                path = %path.display(),
                students = state.book.student_count(),
                subjects = state.book.config().len(),
                "csv imported"
            );
            Ok(json!({
                "studentCount": state.book.student_count(),
                "subjectCount": state.book.config().len(),
            }))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "csv import failed");
            Err(HandlerErr::new("io_failed", format!("import failed: {e:#}"))
                .with_details(json!({ "path": in_path })))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "exchange.exportCsv" => handle_export_csv(state, req),
        "exchange.importCsv" => handle_import_csv(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
