use std::path::PathBuf;

use crate::roster::Gradebook;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub book: Gradebook,
    pub export_dir: PathBuf,
}
