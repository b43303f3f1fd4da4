use crate::calc;
use crate::ipc::helpers::{respond, selected_student, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_student_summary(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = selected_student(&req.params)?;
    let student = state.book.student(&student_id)?;
    Ok(json!({ "summary": calc::student_summary(student) }))
}

fn handle_class_stats(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "stats": state.book.class_stats() }))
}

fn handle_score_to_grade(
    _state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(score) = req.params.get("score").and_then(|v| v.as_f64()) else {
        return Err(HandlerErr::new("bad_params", "score must be a number"));
    };
    Ok(json!({ "score": score, "grade": calc::score_to_grade(score) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "calc.studentSummary" => handle_student_summary(state, req),
        "calc.classStats" => handle_class_stats(state, req),
        "calc.scoreToGrade" => handle_score_to_grade(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
