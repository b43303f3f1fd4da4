use crate::ipc::helpers::{get_required_i64, get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::SubjectConfig;
use serde_json::json;

fn subjects_json(config: &SubjectConfig) -> serde_json::Value {
    let list: Vec<serde_json::Value> = config
        .iter()
        .map(|(name, total_days)| json!({ "name": name, "totalDays": total_days }))
        .collect();
    json!(list)
}

fn handle_subjects_list(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "subjects": subjects_json(state.book.config()) }))
}

fn handle_subjects_add(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let name = name.trim();
    let total_days = get_required_i64(&req.params, "totalDays")?;
    let revived = state.book.add_subject(name, total_days)?;
    tracing::info!(subject = name, total_days, revived, "subject added");
    Ok(json!({
        "subject": { "name": name, "totalDays": total_days },
        "updatedRecords": revived,
    }))
}

fn handle_subjects_remove(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let name = name.trim();
    let orphaned = state.book.remove_subject(name)?;
    tracing::info!(subject = name, orphaned, "subject removed");
    Ok(json!({ "removed": name, "orphanedRecords": orphaned }))
}

fn handle_subjects_update_total_days(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let name = name.trim();
    let total_days = get_required_i64(&req.params, "totalDays")?;
    let updated = state.book.update_total_days(name, total_days)?;
    tracing::info!(subject = name, total_days, updated, "subject total days changed");
    Ok(json!({
        "subject": { "name": name, "totalDays": total_days },
        "updatedRecords": updated,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => handle_subjects_list(state, req),
        "subjects.add" => handle_subjects_add(state, req),
        "subjects.remove" => handle_subjects_remove(state, req),
        "subjects.updateTotalDays" => handle_subjects_update_total_days(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
