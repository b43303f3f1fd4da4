use crate::ipc::error::{err, ok};
use crate::roster::RosterError;

/// Message shown when a student-scoped method arrives without a student.
pub const NO_SELECTION_MESSAGE: &str = "生徒を選択してください";

pub struct HandlerErr {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, &self.code, self.message, self.details)
    }
}

impl From<RosterError> for HandlerErr {
    fn from(e: RosterError) -> Self {
        Self {
            code: e.code,
            message: e.message,
            details: None,
        }
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be an integer", key)))
}

/// The front-end passes the currently selected row as `studentId`.
pub fn selected_student(params: &serde_json::Value) -> Result<String, HandlerErr> {
    get_optional_str(params, "studentId")
        .ok_or_else(|| HandlerErr::new("no_selection", NO_SELECTION_MESSAGE))
}

/// Turns a JSON form value into the text the entry form would hold. `null`
/// reads as an empty field.
pub fn input_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_text_mirrors_form_fields() {
        assert_eq!(input_text(&json!(null)), "");
        assert_eq!(input_text(&json!("18")), "18");
        assert_eq!(input_text(&json!(85)), "85");
        assert_eq!(input_text(&json!(72.5)), "72.5");
    }

    #[test]
    fn missing_selection_is_informational() {
        let e = selected_student(&json!({ "studentId": "  " })).err().expect("error");
        assert_eq!(e.code, "no_selection");
        assert_eq!(e.message, NO_SELECTION_MESSAGE);
    }
}
