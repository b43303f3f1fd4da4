use crate::roster::{RosterError, SubjectConfig};
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_SUBJECTS: &str = "数学:20,英語:18,国語:20,理科:16,社会:15";

#[derive(Debug, Parser, Clone)]
#[command(name = "gradebookd", version, about = "Gradebook calculation sidecar")]
pub struct Config {
    /// Directory for CSV exports when no explicit path is requested.
    #[arg(long, env = "GRADEBOOKD_EXPORT_DIR", default_value = ".")]
    pub export_dir: PathBuf,

    /// Initial subject list as `name:totalDays` pairs separated by commas.
    #[arg(long, env = "GRADEBOOKD_SUBJECTS", default_value = DEFAULT_SUBJECTS)]
    pub subjects: String,

    #[arg(long, env = "GRADEBOOKD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn subject_config(&self) -> Result<SubjectConfig, RosterError> {
        SubjectConfig::from_pairs(parse_subject_list(&self.subjects)?)
    }
}

pub fn parse_subject_list(raw: &str) -> Result<Vec<(String, i64)>, RosterError> {
    let mut out = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((name, days)) = item.rsplit_once(':') else {
            return Err(RosterError::new(
                "bad_config",
                format!("subject entry must be name:totalDays, got {:?}", item),
            ));
        };
        let days = days.trim().parse::<i64>().map_err(|_| {
            RosterError::new(
                "bad_config",
                format!("totalDays for {} must be a whole number", name.trim()),
            )
        })?;
        out.push((name.trim().to_string(), days));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_subjects_parse_in_order() {
        let parsed = parse_subject_list(DEFAULT_SUBJECTS).expect("parse");
        let names: Vec<&str> = parsed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["数学", "英語", "国語", "理科", "社会"]);
        assert_eq!(parsed[3].1, 16);
    }

    #[test]
    fn subject_list_tolerates_blanks_and_rejects_garbage() {
        assert!(parse_subject_list("").expect("empty").is_empty());
        assert_eq!(parse_subject_list(" 美術 : 12 ,").expect("one").len(), 1);
        assert_eq!(parse_subject_list("美術").unwrap_err().code, "bad_config");
        assert_eq!(parse_subject_list("美術:x").unwrap_err().code, "bad_config");
    }

    #[test]
    fn config_rejects_non_positive_days() {
        let cfg = Config::parse_from(["gradebookd", "--subjects", "美術:0"]);
        assert_eq!(cfg.subject_config().unwrap_err().code, "bad_params");
    }
}
