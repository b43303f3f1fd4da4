use crate::calc::{self, SubjectDetail};
use crate::ipc::helpers::{get_optional_str, input_text, respond, selected_student, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::SubjectEntry;
use serde_json::json;

fn handle_grades_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = selected_student(&req.params)?;
    let student = state.book.student(&student_id)?;
    let config = state.book.config();

    // Configured subjects without a record show as blank entry rows; nothing
    // is created until grades.update commits a value.
    let entries: Vec<serde_json::Value> = config
        .iter()
        .map(|(subject, configured_total)| match student.record(subject) {
            Some(rec) => json!({
                "subject": subject,
                "recorded": true,
                "totalDays": rec.total_days,
                "attendedDays": rec.attended_days,
                "testScore": rec.test_score,
                "detail": SubjectDetail::from_record(subject, rec),
            }),
            None => json!({
                "subject": subject,
                "recorded": false,
                "totalDays": configured_total,
                "attendedDays": 0,
                "testScore": null,
                "detail": null,
            }),
        })
        .collect();
    let orphaned: Vec<&str> = student
        .records()
        .map(|(name, _)| name)
        .filter(|name| !config.contains(name))
        .collect();

    Ok(json!({
        "studentId": student.student_id,
        "name": student.name,
        "entries": entries,
        "orphanedSubjects": orphaned,
    }))
}

fn parse_entries(params: &serde_json::Value) -> Result<Vec<SubjectEntry>, HandlerErr> {
    let Some(raw) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "entries must be an array"));
    };
    let mut out = Vec::with_capacity(raw.len());
    for (i, item) in raw.iter().enumerate() {
        let Some(subject) = item.get("subject").and_then(|v| v.as_str()) else {
            return Err(HandlerErr::new(
                "bad_params",
                format!("entries[{}].subject must be a string", i),
            ));
        };
        out.push(SubjectEntry {
            subject: subject.trim().to_string(),
            attended_days: item.get("attendedDays").map(input_text),
            test_score: item.get("testScore").map(input_text),
        });
    }
    Ok(out)
}

fn handle_grades_update(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = selected_student(&req.params)?;
    let entries = parse_entries(&req.params)?;
    let outcome = state.book.apply_entries(&student_id, &entries)?;
    if !outcome.skipped.is_empty() {
        tracing::debug!(
            student_id = %student_id,
            skipped = ?outcome.skipped,
            "entries for unconfigured subjects skipped"
        );
    }
    let student = state.book.student(&student_id)?;
    Ok(json!({
        "outcome": outcome,
        "row": calc::student_row(student, state.book.config()),
    }))
}

fn handle_grades_preview(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let total_days = match req.params.get("totalDays").and_then(|v| v.as_i64()) {
        Some(n) => n,
        None => {
            let Some(subject) = get_optional_str(&req.params, "subject") else {
                return Err(HandlerErr::new("bad_params", "missing subject or totalDays"));
            };
            state.book.config().total_days(&subject).ok_or_else(|| {
                HandlerErr::new("not_found", format!("subject not found: {}", subject))
            })?
        }
    };
    let attended = req
        .params
        .get("attendedDays")
        .map(input_text)
        .unwrap_or_default();
    let test = req
        .params
        .get("testScore")
        .map(input_text)
        .unwrap_or_default();
    let preview = calc::preview_entry(total_days, &attended, &test);
    Ok(json!({ "totalDays": total_days, "preview": preview }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.get" => handle_grades_get(state, req),
        "grades.update" => handle_grades_update(state, req),
        "grades.preview" => handle_grades_preview(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
