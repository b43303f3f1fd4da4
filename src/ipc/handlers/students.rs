use crate::calc;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, respond, selected_student, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_students_list(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let config = state.book.config();
    let rows: Vec<calc::StudentRow> = state
        .book
        .students()
        .map(|s| calc::student_row(s, config))
        .collect();
    Ok(json!({ "students": rows }))
}

fn handle_students_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let requested_id = get_optional_str(&req.params, "studentId");
    let student_id = state.book.add_student(requested_id.as_deref(), &name)?;
    tracing::info!(student_id = %student_id, "student created");
    Ok(json!({ "studentId": student_id }))
}

fn handle_students_update(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = selected_student(&req.params)?;
    let name = get_required_str(&req.params, "name")?;
    state.book.rename_student(&student_id, &name)?;
    Ok(json!({ "studentId": student_id }))
}

fn handle_students_delete(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = selected_student(&req.params)?;
    let removed = state.book.remove_student(&student_id)?;
    tracing::info!(
        student_id = %student_id,
        records = removed.record_count(),
        "student deleted"
    );
    Ok(json!({ "deleted": student_id }))
}

fn handle_students_next_id(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "studentId": state.book.next_student_id() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.create" => handle_students_create(state, req),
        "students.update" => handle_students_update(state, req),
        "students.delete" => handle_students_delete(state, req),
        "students.nextId" => handle_students_next_id(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
