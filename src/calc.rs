use crate::roster::{Student, SubjectConfig};
use serde::{Serialize, Serializer};

/// Minimum attendance rate for a subject to be graded on its score.
pub const SUFFICIENT_ATTENDANCE_RATE: f64 = 0.8;

const ATTENDANCE_WEIGHT: f64 = 0.5;
const TEST_WEIGHT: f64 = 0.5;

pub const MAX_TEST_SCORE: f64 = 100.0;

/// Sentinel label for a subject with adequate attendance but no test yet.
pub const NO_GRADE: &str = "-";

/// Placeholder shown by live previews for values that cannot be computed.
pub const PREVIEW_PLACEHOLDER: &str = "--";

/// Score bands, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    Fail,
    Pass,
    Fair,
    Good,
    Excellent,
}

impl Grade {
    /// Display order used by the distribution panel (best band first).
    pub const BANDS: [Grade; 5] = [
        Grade::Excellent,
        Grade::Good,
        Grade::Fair,
        Grade::Pass,
        Grade::Fail,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Grade::Excellent => "秀",
            Grade::Good => "優",
            Grade::Fair => "良",
            Grade::Pass => "可",
            Grade::Fail => "不可",
        }
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Maps a score on the 0-100 composite scale to its band.
///
/// | Range  | Grade |
/// |--------|-------|
/// | >= 90  | 秀    |
/// | >= 80  | 優    |
/// | >= 70  | 良    |
/// | >= 60  | 可    |
/// | < 60   | 不可  |
///
/// NaN fails every comparison and lands in 不可.
pub fn score_to_grade(score: f64) -> Grade {
    match score {
        s if s >= 90.0 => Grade::Excellent,
        s if s >= 80.0 => Grade::Good,
        s if s >= 70.0 => Grade::Fair,
        s if s >= 60.0 => Grade::Pass,
        _ => Grade::Fail,
    }
}

/// Per-subject outcome. Attendance failure outranks a missing test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectGrade {
    AttendanceFail,
    Pending,
    Scored(Grade),
}

impl SubjectGrade {
    pub fn label(self) -> &'static str {
        match self {
            SubjectGrade::AttendanceFail => "不可(出席)",
            SubjectGrade::Pending => NO_GRADE,
            SubjectGrade::Scored(g) => g.label(),
        }
    }
}

impl Serialize for SubjectGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One student's attendance and test data for a single subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub total_days: i64,
    pub attended_days: i64,
    pub test_score: Option<f64>,
}

impl SubjectRecord {
    pub fn new(total_days: i64) -> Self {
        Self {
            total_days,
            attended_days: 0,
            test_score: None,
        }
    }

    pub fn attendance_rate(&self) -> f64 {
        if self.total_days <= 0 {
            return 0.0;
        }
        self.attended_days as f64 / self.total_days as f64
    }

    pub fn attendance_score(&self) -> f64 {
        self.attendance_rate() * 100.0
    }

    pub fn has_sufficient_attendance(&self) -> bool {
        self.attendance_rate() >= SUFFICIENT_ATTENDANCE_RATE
    }

    /// `None` until a test score is entered; a zero score is still `Some`.
    pub fn composite_score(&self) -> Option<f64> {
        self.test_score
            .map(|t| self.attendance_score() * ATTENDANCE_WEIGHT + t * TEST_WEIGHT)
    }

    pub fn grade(&self) -> SubjectGrade {
        if !self.has_sufficient_attendance() {
            return SubjectGrade::AttendanceFail;
        }
        match self.composite_score() {
            Some(c) => SubjectGrade::Scored(score_to_grade(c)),
            None => SubjectGrade::Pending,
        }
    }

    pub fn grade_label(&self) -> &'static str {
        self.grade().label()
    }

    pub fn set_attended_days(&mut self, attended: i64) {
        self.attended_days = clamp_attended(attended, self.total_days);
    }

    /// Non-finite values are ignored and the previous score kept.
    pub fn set_test_score(&mut self, score: f64) {
        if let Some(v) = clamp_test_score(score) {
            self.test_score = Some(v);
        }
    }

    pub fn clear_test_score(&mut self) {
        self.test_score = None;
    }

    /// Re-targets the record to a new session count, keeping
    /// `attended_days <= total_days`.
    pub fn set_total_days(&mut self, total_days: i64) {
        self.total_days = total_days;
        self.attended_days = clamp_attended(self.attended_days, total_days);
    }
}

pub fn clamp_attended(attended: i64, total_days: i64) -> i64 {
    attended.clamp(0, total_days.max(0))
}

pub fn clamp_test_score(score: f64) -> Option<f64> {
    if !score.is_finite() {
        return None;
    }
    Some(score.clamp(0.0, MAX_TEST_SCORE))
}

/// Parses attended days the way the entry form does: a whole number, trimmed.
pub fn parse_attended(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Parses a test score; blank and non-finite input yield `None`.
pub fn parse_test_score(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn composites<'a, I>(records: I) -> impl Iterator<Item = f64>
where
    I: IntoIterator<Item = &'a SubjectRecord>,
{
    records.into_iter().filter_map(SubjectRecord::composite_score)
}

/// Mean composite over the subjects that have a test score. Untested
/// subjects are left out of both numerator and denominator.
pub fn overall_average<'a, I>(records: I) -> f64
where
    I: IntoIterator<Item = &'a SubjectRecord>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for c in composites(records) {
        sum += c;
        count += 1;
    }
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

pub fn max_composite<'a, I>(records: I) -> f64
where
    I: IntoIterator<Item = &'a SubjectRecord>,
{
    composites(records).reduce(f64::max).unwrap_or(0.0)
}

pub fn min_composite<'a, I>(records: I) -> f64
where
    I: IntoIterator<Item = &'a SubjectRecord>,
{
    composites(records).reduce(f64::min).unwrap_or(0.0)
}

/// A single attendance shortfall fails the whole student with plain 不可,
/// whatever the average says.
pub fn overall_grade<'a, I>(records: I) -> Grade
where
    I: IntoIterator<Item = &'a SubjectRecord>,
    I::IntoIter: Clone,
{
    let records = records.into_iter();
    if records.clone().any(|r| !r.has_sufficient_attendance()) {
        return Grade::Fail;
    }
    score_to_grade(overall_average(records))
}

/// VB6-compatible 1-decimal rounding: `Int(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn round_off_whole(x: f64) -> f64 {
    (x + 0.5).floor()
}

pub fn format_1_decimal(x: f64) -> String {
    format!("{:.1}", round_off_1_decimal(x))
}

pub fn format_whole(x: f64) -> String {
    format!("{:.0}", round_off_whole(x))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDetail {
    pub subject: String,
    pub total_days: i64,
    pub attended_days: i64,
    pub attendance_rate: f64,
    pub attendance_score: f64,
    pub sufficient: bool,
    pub test_score: Option<f64>,
    pub composite_score: Option<f64>,
    pub grade: SubjectGrade,
}

impl SubjectDetail {
    pub fn from_record(subject: &str, rec: &SubjectRecord) -> Self {
        Self {
            subject: subject.to_string(),
            total_days: rec.total_days,
            attended_days: rec.attended_days,
            attendance_rate: rec.attendance_rate(),
            attendance_score: round_off_1_decimal(rec.attendance_score()),
            sufficient: rec.has_sufficient_attendance(),
            test_score: rec.test_score,
            composite_score: rec.composite_score().map(round_off_1_decimal),
            grade: rec.grade(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub name: String,
    pub overall_average: f64,
    pub max_composite: f64,
    pub min_composite: f64,
    pub overall_grade: Grade,
    pub subjects: Vec<SubjectDetail>,
}

pub fn student_summary(student: &Student) -> StudentSummary {
    StudentSummary {
        student_id: student.student_id.clone(),
        name: student.name.clone(),
        overall_average: round_off_1_decimal(student.overall_average()),
        max_composite: round_off_1_decimal(student.max_composite()),
        min_composite: round_off_1_decimal(student.min_composite()),
        overall_grade: student.overall_grade(),
        subjects: student
            .records()
            .map(|(name, rec)| SubjectDetail::from_record(name, rec))
            .collect(),
    }
}

/// Table cell for one configured subject. `detail` is `None` when the
/// student has no record for it yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCell {
    pub subject: String,
    pub configured_total_days: i64,
    pub detail: Option<SubjectDetail>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub student_id: String,
    pub name: String,
    pub subjects: Vec<SubjectCell>,
    pub overall_average: f64,
    pub overall_grade: Grade,
    pub orphaned_subjects: Vec<String>,
}

pub fn student_row(student: &Student, config: &SubjectConfig) -> StudentRow {
    let subjects = config
        .iter()
        .map(|(name, total)| SubjectCell {
            subject: name.to_string(),
            configured_total_days: total,
            detail: student
                .record(name)
                .map(|rec| SubjectDetail::from_record(name, rec)),
        })
        .collect();
    StudentRow {
        student_id: student.student_id.clone(),
        name: student.name.clone(),
        subjects,
        overall_average: round_off_1_decimal(student.overall_average()),
        overall_grade: student.overall_grade(),
        orphaned_subjects: student
            .records()
            .filter(|(name, _)| !config.contains(name))
            .map(|(name, _)| name.to_string())
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: Grade,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub student_count: usize,
    pub class_average: f64,
    pub distribution: Vec<GradeCount>,
}

/// Class-wide figures over every student. A student with no tested subject
/// contributes an average of 0.0.
pub fn class_stats<'a, I>(students: I) -> ClassStats
where
    I: IntoIterator<Item = &'a Student>,
{
    let mut student_count = 0_usize;
    let mut sum = 0.0_f64;
    let mut counts = [0_usize; Grade::BANDS.len()];
    for s in students {
        student_count += 1;
        sum += s.overall_average();
        let grade = s.overall_grade();
        if let Some(pos) = Grade::BANDS.iter().position(|g| *g == grade) {
            counts[pos] += 1;
        }
    }

    let class_average = if student_count > 0 {
        round_off_1_decimal(sum / student_count as f64)
    } else {
        0.0
    };
    let distribution = Grade::BANDS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(grade, count)| GradeCount {
            grade: *grade,
            count,
        })
        .collect();

    ClassStats {
        student_count,
        class_average,
        distribution,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPreview {
    pub attendance_rate: String,
    pub attendance_score: String,
    pub composite_score: String,
    pub grade: String,
    pub sufficient: Option<bool>,
}

impl EntryPreview {
    fn placeholder() -> Self {
        Self {
            attendance_rate: PREVIEW_PLACEHOLDER.to_string(),
            attendance_score: PREVIEW_PLACEHOLDER.to_string(),
            composite_score: PREVIEW_PLACEHOLDER.to_string(),
            grade: PREVIEW_PLACEHOLDER.to_string(),
            sufficient: None,
        }
    }
}

/// Recomputes the grade-entry row for uncommitted text, applying the same
/// clamping a commit would.
pub fn preview_entry(total_days: i64, attended_text: &str, test_text: &str) -> EntryPreview {
    let Some(attended) = parse_attended(attended_text) else {
        return EntryPreview::placeholder();
    };
    let mut rec = SubjectRecord::new(total_days);
    rec.set_attended_days(attended);
    if let Some(score) = parse_test_score(test_text) {
        rec.set_test_score(score);
    }

    let grade = match rec.grade() {
        SubjectGrade::Pending => PREVIEW_PLACEHOLDER,
        g => g.label(),
    };
    EntryPreview {
        attendance_rate: format!("{}%", format_whole(rec.attendance_score())),
        attendance_score: format_1_decimal(rec.attendance_score()),
        composite_score: rec
            .composite_score()
            .map(format_1_decimal)
            .unwrap_or_else(|| PREVIEW_PLACEHOLDER.to_string()),
        grade: grade.to_string(),
        sufficient: Some(rec.has_sufficient_attendance()),
    }
}
