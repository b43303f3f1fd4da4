use crate::calc::{self, Grade, SubjectRecord};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone)]
pub struct RosterError {
    pub code: String,
    pub message: String,
}

impl RosterError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RosterError {}

/// Subject name -> configured session count, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectConfig {
    subjects: IndexMap<String, i64>,
}

impl SubjectConfig {
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for (name, total_days) in pairs {
            config.add(name.as_ref(), total_days)?;
        }
        Ok(config)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subjects.contains_key(name)
    }

    pub fn total_days(&self, name: &str) -> Option<i64> {
        self.subjects.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.subjects.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn add(&mut self, name: &str, total_days: i64) -> Result<(), RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::new("bad_params", "subject name must not be empty"));
        }
        ensure_positive_days(total_days)?;
        if self.subjects.contains_key(name) {
            return Err(RosterError::new(
                "duplicate",
                format!("subject already exists: {}", name),
            ));
        }
        self.subjects.insert(name.to_string(), total_days);
        Ok(())
    }

    /// Returns the removed subject's session count.
    pub fn remove(&mut self, name: &str) -> Result<i64, RosterError> {
        let name = name.trim();
        self.subjects
            .shift_remove(name)
            .ok_or_else(|| subject_not_found(name))
    }

    /// Returns the previous session count.
    pub fn set_total_days(&mut self, name: &str, total_days: i64) -> Result<i64, RosterError> {
        ensure_positive_days(total_days)?;
        let name = name.trim();
        let slot = self
            .subjects
            .get_mut(name)
            .ok_or_else(|| subject_not_found(name))?;
        Ok(std::mem::replace(slot, total_days))
    }
}

fn ensure_positive_days(total_days: i64) -> Result<(), RosterError> {
    if total_days <= 0 {
        return Err(RosterError::new("bad_params", "totalDays must be positive"));
    }
    Ok(())
}

fn subject_not_found(name: &str) -> RosterError {
    RosterError::new("not_found", format!("subject not found: {}", name))
}

fn student_not_found(id: &str) -> RosterError {
    RosterError::new("not_found", format!("student not found: {}", id))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    subjects: IndexMap<String, SubjectRecord>,
}

impl Student {
    pub fn new(student_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            subjects: IndexMap::new(),
        }
    }

    pub fn record(&self, subject: &str) -> Option<&SubjectRecord> {
        self.subjects.get(subject)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &SubjectRecord)> + '_ {
        self.subjects.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn record_count(&self) -> usize {
        self.subjects.len()
    }

    /// Returns the record for `subject`, creating it with the configured
    /// session count on first use. `None` if the subject is not configured.
    pub fn get_or_create_record(
        &mut self,
        subject: &str,
        config: &SubjectConfig,
    ) -> Option<&mut SubjectRecord> {
        let total_days = config.total_days(subject)?;
        Some(
            self.subjects
                .entry(subject.to_string())
                .or_insert_with(|| SubjectRecord::new(total_days)),
        )
    }

    pub fn insert_record(&mut self, subject: impl Into<String>, record: SubjectRecord) {
        self.subjects.insert(subject.into(), record);
    }

    pub fn overall_average(&self) -> f64 {
        calc::overall_average(self.subjects.values())
    }

    pub fn max_composite(&self) -> f64 {
        calc::max_composite(self.subjects.values())
    }

    pub fn min_composite(&self) -> f64 {
        calc::min_composite(self.subjects.values())
    }

    pub fn overall_grade(&self) -> Grade {
        calc::overall_grade(self.subjects.values())
    }

    pub fn overall_grade_label(&self) -> &'static str {
        self.overall_grade().label()
    }
}

/// Raw text for one subject as typed into the entry form. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct SubjectEntry {
    pub subject: String,
    pub attended_days: Option<String>,
    pub test_score: Option<String>,
}

impl SubjectEntry {
    /// Unparseable text is dropped silently; a blank test field clears the
    /// stored score.
    pub fn apply_to(&self, rec: &mut SubjectRecord) {
        if let Some(v) = self.attended_days.as_deref().and_then(calc::parse_attended) {
            rec.set_attended_days(v);
        }
        if let Some(text) = self.test_score.as_deref() {
            if text.trim().is_empty() {
                rec.clear_test_score();
            } else if let Some(v) = calc::parse_test_score(text) {
                rec.set_test_score(v);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutcome {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Gradebook {
    config: SubjectConfig,
    students: IndexMap<String, Student>,
}

impl Gradebook {
    pub fn new(config: SubjectConfig) -> Self {
        Self {
            config,
            students: IndexMap::new(),
        }
    }

    pub fn from_parts(config: SubjectConfig, students: Vec<Student>) -> Result<Self, RosterError> {
        let mut book = Self::new(config);
        for s in students {
            if book.students.contains_key(&s.student_id) {
                return Err(RosterError::new(
                    "duplicate",
                    format!("duplicate student id: {}", s.student_id),
                ));
            }
            book.students.insert(s.student_id.clone(), s);
        }
        Ok(book)
    }

    pub fn config(&self) -> &SubjectConfig {
        &self.config
    }

    pub fn students(&self) -> impl Iterator<Item = &Student> + '_ {
        self.students.values()
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn student(&self, student_id: &str) -> Result<&Student, RosterError> {
        self.students
            .get(student_id)
            .ok_or_else(|| student_not_found(student_id))
    }

    /// First free id of the form `S001`, counting from the roster size.
    pub fn next_student_id(&self) -> String {
        let mut n = self.students.len() + 1;
        loop {
            let id = format!("S{:03}", n);
            if !self.students.contains_key(&id) {
                return id;
            }
            n += 1;
        }
    }

    pub fn add_student(
        &mut self,
        student_id: Option<&str>,
        name: &str,
    ) -> Result<String, RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::new("bad_params", "name must not be empty"));
        }
        let student_id = match student_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.next_student_id(),
        };
        if self.students.contains_key(&student_id) {
            return Err(RosterError::new(
                "duplicate",
                format!("student id already exists: {}", student_id),
            ));
        }
        self.students
            .insert(student_id.clone(), Student::new(student_id.clone(), name));
        Ok(student_id)
    }

    pub fn rename_student(&mut self, student_id: &str, name: &str) -> Result<(), RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::new("bad_params", "name must not be empty"));
        }
        let s = self
            .students
            .get_mut(student_id)
            .ok_or_else(|| student_not_found(student_id))?;
        s.name = name.to_string();
        Ok(())
    }

    pub fn remove_student(&mut self, student_id: &str) -> Result<Student, RosterError> {
        self.students
            .shift_remove(student_id)
            .ok_or_else(|| student_not_found(student_id))
    }

    /// Re-adding a removed subject re-targets its orphaned records to the
    /// new session count. Returns the number of records revived.
    pub fn add_subject(&mut self, name: &str, total_days: i64) -> Result<usize, RosterError> {
        let name = name.trim();
        self.config.add(name, total_days)?;
        Ok(self.retarget_records(name, total_days))
    }

    fn retarget_records(&mut self, name: &str, total_days: i64) -> usize {
        let mut updated = 0;
        for s in self.students.values_mut() {
            if let Some(rec) = s.subjects.get_mut(name) {
                rec.set_total_days(total_days);
                updated += 1;
            }
        }
        updated
    }

    /// Drops the configuration entry only. Returns how many students still
    /// hold a record for the removed subject.
    pub fn remove_subject(&mut self, name: &str) -> Result<usize, RosterError> {
        let name = name.trim();
        self.config.remove(name)?;
        Ok(self
            .students
            .values()
            .filter(|s| s.record(name).is_some())
            .count())
    }

    /// Changes the configured session count and carries it into every
    /// existing record for the subject. Returns the number of records updated.
    pub fn update_total_days(&mut self, name: &str, total_days: i64) -> Result<usize, RosterError> {
        let name = name.trim();
        self.config.set_total_days(name, total_days)?;
        Ok(self.retarget_records(name, total_days))
    }

    pub fn apply_entries(
        &mut self,
        student_id: &str,
        entries: &[SubjectEntry],
    ) -> Result<EntryOutcome, RosterError> {
        let student = self
            .students
            .get_mut(student_id)
            .ok_or_else(|| student_not_found(student_id))?;
        let mut outcome = EntryOutcome::default();
        for entry in entries {
            match student.get_or_create_record(&entry.subject, &self.config) {
                Some(rec) => {
                    entry.apply_to(rec);
                    outcome.applied.push(entry.subject.clone());
                }
                None => outcome.skipped.push(entry.subject.clone()),
            }
        }
        Ok(outcome)
    }

    pub fn class_stats(&self) -> calc::ClassStats {
        calc::class_stats(self.students.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> SubjectConfig {
        SubjectConfig::from_pairs([("数学", 20), ("英語", 18), ("国語", 20)]).expect("config")
    }

    fn entry(subject: &str, attended: Option<&str>, test: Option<&str>) -> SubjectEntry {
        SubjectEntry {
            subject: subject.to_string(),
            attended_days: attended.map(str::to_string),
            test_score: test.map(str::to_string),
        }
    }

    #[test]
    fn config_rejects_duplicates_and_bad_days() {
        let mut c = default_config();
        assert_eq!(c.add("数学", 10).unwrap_err().code, "duplicate");
        assert_eq!(c.add("理科", 0).unwrap_err().code, "bad_params");
        assert_eq!(c.add("  ", 10).unwrap_err().code, "bad_params");
        c.add(" 理科 ", 16).expect("add trimmed");
        assert_eq!(c.total_days("理科"), Some(16));
        let order: Vec<&str> = c.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["数学", "英語", "国語", "理科"]);
    }

    #[test]
    fn config_remove_keeps_order_of_the_rest() {
        let mut c = default_config();
        assert_eq!(c.remove("英語").expect("remove"), 18);
        let order: Vec<&str> = c.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["数学", "国語"]);
        assert_eq!(c.remove("英語").unwrap_err().code, "not_found");
    }

    #[test]
    fn get_or_create_uses_configured_total_once() {
        let mut config = default_config();
        let mut s = Student::new("S001", "山田 太郎");
        assert!(s.record("数学").is_none());

        let rec = s.get_or_create_record("数学", &config).expect("configured");
        assert_eq!(rec.total_days, 20);
        rec.attended_days = 18;

        config.set_total_days("数学", 25).expect("update");
        let rec = s.get_or_create_record("数学", &config).expect("configured");
        assert_eq!(rec.total_days, 20);
        assert_eq!(rec.attended_days, 18);

        assert!(s.get_or_create_record("美術", &config).is_none());
        assert_eq!(s.record_count(), 1);
    }

    #[test]
    fn entries_clamp_and_ignore_garbage() {
        let mut book = Gradebook::new(default_config());
        let id = book.add_student(None, "鈴木 花子").expect("add");
        assert_eq!(id, "S001");

        let outcome = book
            .apply_entries(
                &id,
                &[
                    entry("数学", Some("25"), Some("120")),
                    entry("英語", Some("abc"), Some("x")),
                    entry("美術", Some("3"), Some("50")),
                ],
            )
            .expect("apply");
        assert_eq!(outcome.applied, vec!["数学", "英語"]);
        assert_eq!(outcome.skipped, vec!["美術"]);

        let s = book.student(&id).expect("student");
        let math = s.record("数学").expect("math");
        assert_eq!(math.attended_days, 20);
        assert_eq!(math.test_score, Some(100.0));
        let eng = s.record("英語").expect("english");
        assert_eq!(eng.attended_days, 0);
        assert_eq!(eng.test_score, None);
    }

    #[test]
    fn invalid_entry_keeps_previous_values() {
        let mut book = Gradebook::new(default_config());
        let id = book.add_student(Some("S010"), "佐藤 健").expect("add");
        book.apply_entries(&id, &[entry("数学", Some("18"), Some("85"))])
            .expect("first");
        book.apply_entries(&id, &[entry("数学", Some("-"), Some("八十"))])
            .expect("second");
        let rec = book.student(&id).unwrap().record("数学").unwrap().clone();
        assert_eq!(rec.attended_days, 18);
        assert_eq!(rec.test_score, Some(85.0));

        book.apply_entries(&id, &[entry("数学", None, Some(""))])
            .expect("clear");
        let rec = book.student(&id).unwrap().record("数学").unwrap().clone();
        assert_eq!(rec.attended_days, 18);
        assert_eq!(rec.test_score, None);
    }

    #[test]
    fn overall_label_differs_from_subject_label_on_attendance_failure() {
        let mut book = Gradebook::new(default_config());
        let id = book.add_student(None, "渡辺 悠斗").expect("add");
        book.apply_entries(
            &id,
            &[
                entry("数学", Some("20"), Some("100")),
                entry("英語", Some("18"), Some("96")),
                entry("国語", Some("10"), Some("100")),
            ],
        )
        .expect("apply");
        let s = book.student(&id).unwrap();
        assert_eq!(s.record("数学").unwrap().grade_label(), "秀");
        assert_eq!(s.record("英語").unwrap().grade_label(), "秀");
        assert_eq!(s.record("国語").unwrap().grade_label(), "不可(出席)");
        assert_eq!(s.overall_grade_label(), "不可");
    }

    #[test]
    fn next_id_skips_taken_ids() {
        let mut book = Gradebook::new(default_config());
        book.add_student(Some("S002"), "A").expect("add");
        assert_eq!(book.next_student_id(), "S003");
        book.add_student(Some("S003"), "B").expect("add");
        assert_eq!(book.next_student_id(), "S004");
        assert_eq!(
            book.add_student(Some("S002"), "C").unwrap_err().code,
            "duplicate"
        );
        assert_eq!(book.add_student(None, "  ").unwrap_err().code, "bad_params");
    }

    #[test]
    fn remove_subject_leaves_orphaned_records() {
        let mut book = Gradebook::new(default_config());
        let id = book.add_student(None, "田中 美咲").expect("add");
        book.apply_entries(&id, &[entry("英語", Some("17"), Some("82"))])
            .expect("apply");
        assert_eq!(book.remove_subject("英語").expect("remove"), 1);
        assert!(!book.config().contains("英語"));
        assert!(book.student(&id).unwrap().record("英語").is_some());
    }

    #[test]
    fn total_days_update_propagates_to_existing_records() {
        let mut book = Gradebook::new(default_config());
        let a = book.add_student(None, "A").expect("add");
        let b = book.add_student(None, "B").expect("add");
        book.apply_entries(&a, &[entry("数学", Some("18"), None)])
            .expect("apply");

        assert_eq!(book.update_total_days("数学", 15).expect("update"), 1);
        let rec = book.student(&a).unwrap().record("数学").unwrap();
        assert_eq!(rec.total_days, 15);
        assert_eq!(rec.attended_days, 15);
        assert!(book.student(&b).unwrap().record("数学").is_none());

        assert_eq!(
            book.update_total_days("数学", 0).unwrap_err().code,
            "bad_params"
        );
        assert_eq!(
            book.update_total_days("美術", 10).unwrap_err().code,
            "not_found"
        );
    }

    #[test]
    fn readding_subject_retargets_orphaned_records() {
        let mut book = Gradebook::new(default_config());
        let id = book.add_student(None, "A").expect("add");
        book.apply_entries(&id, &[entry("数学", Some("18"), Some("70"))])
            .expect("apply");
        book.remove_subject("数学").expect("remove");

        assert_eq!(book.add_subject("数学", 15).expect("re-add"), 1);
        assert_eq!(book.config().total_days("数学"), Some(15));
        let rec = book.student(&id).unwrap().record("数学").unwrap();
        assert_eq!(rec.total_days, 15);
        assert_eq!(rec.attended_days, 15);
        assert_eq!(rec.test_score, Some(70.0));
    }

    #[test]
    fn subject_names_are_trimmed_on_every_operation() {
        let mut book = Gradebook::new(default_config());
        assert_eq!(book.add_subject(" 美術 ", 10).expect("add"), 0);
        assert_eq!(book.update_total_days(" 美術 ", 12).expect("update"), 0);
        assert_eq!(book.config().total_days("美術"), Some(12));
        assert_eq!(book.remove_subject("  美術").expect("remove"), 0);
        assert!(!book.config().contains("美術"));
    }

    #[test]
    fn rename_and_remove_student() {
        let mut book = Gradebook::new(default_config());
        let id = book.add_student(None, "old").expect("add");
        book.rename_student(&id, " new ").expect("rename");
        assert_eq!(book.student(&id).unwrap().name, "new");
        let removed = book.remove_student(&id).expect("remove");
        assert_eq!(removed.student_id, id);
        assert_eq!(book.student_count(), 0);
        assert_eq!(book.remove_student(&id).unwrap_err().code, "not_found");
    }

    #[test]
    fn class_stats_count_bands_and_average() {
        let mut book = Gradebook::new(default_config());
        let a = book.add_student(None, "A").expect("add");
        let b = book.add_student(None, "B").expect("add");
        let _c = book.add_student(None, "C").expect("add");
        // composite 100 -> 秀
        book.apply_entries(&a, &[entry("数学", Some("20"), Some("100"))])
            .expect("apply");
        // composite 80 -> 優
        book.apply_entries(&b, &[entry("数学", Some("20"), Some("60"))])
            .expect("apply");

        let stats = book.class_stats();
        assert_eq!(stats.student_count, 3);
        // C has no tested subject and counts as 0.0: (100 + 80 + 0) / 3
        assert_eq!(stats.class_average, 60.0);
        let bands: Vec<(&str, usize)> = stats
            .distribution
            .iter()
            .map(|g| (g.grade.label(), g.count))
            .collect();
        assert_eq!(bands, vec![("秀", 1), ("優", 1), ("不可", 1)]);
    }
}
