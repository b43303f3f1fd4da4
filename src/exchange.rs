use crate::calc::{self, SubjectRecord};
use crate::roster::{Gradebook, Student, SubjectConfig};
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, TimeZone};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const UTF8_BOM: &str = "\u{feff}";
const PLACEHOLDER: &str = "-";

const COL_STUDENT_ID: &str = "学籍番号";
const COL_NAME: &str = "氏名";
const COL_OVERALL_AVERAGE: &str = "総合平均";
const COL_OVERALL_GRADE: &str = "全体評価";

/// Per-subject column suffixes, in export order.
const SUBJECT_SUFFIXES: [&str; 7] = [
    "_総授業数",
    "_出席日数",
    "_出席率(%)",
    "_出席点",
    "_テスト点",
    "_総合点",
    "_評価",
];

const IDX_TOTAL: usize = 0;
const IDX_ATTENDED: usize = 1;
const IDX_TEST: usize = 4;
const IDX_COMPOSITE: usize = 5;
const IDX_GRADE: usize = 6;

/// Score precisions tried when recovering a test score, coarsest first.
const SCORE_DENOMINATORS: [i64; 4] = [1, 2, 10, 100];

pub fn header(config: &SubjectConfig) -> Vec<String> {
    let mut out = vec![COL_STUDENT_ID.to_string(), COL_NAME.to_string()];
    for (subject, _) in config.iter() {
        for suffix in SUBJECT_SUFFIXES {
            out.push(format!("{}{}", subject, suffix));
        }
    }
    out.push(COL_OVERALL_AVERAGE.to_string());
    out.push(COL_OVERALL_GRADE.to_string());
    out
}

fn record_cells(rec: &SubjectRecord) -> [String; 7] {
    [
        rec.total_days.to_string(),
        rec.attended_days.to_string(),
        calc::format_1_decimal(rec.attendance_rate() * 100.0),
        calc::format_1_decimal(rec.attendance_score()),
        rec.test_score.map(calc::format_whole).unwrap_or_default(),
        rec.composite_score()
            .map(calc::format_1_decimal)
            .unwrap_or_default(),
        rec.grade_label().to_string(),
    ]
}

pub fn student_row(student: &Student, config: &SubjectConfig) -> Vec<String> {
    let mut out = vec![student.student_id.clone(), student.name.clone()];
    for (subject, configured_total) in config.iter() {
        match student.record(subject) {
            Some(rec) => out.extend(record_cells(rec)),
            None => {
                out.push(configured_total.to_string());
                out.extend(
                    std::iter::repeat(PLACEHOLDER.to_string()).take(SUBJECT_SUFFIXES.len() - 1),
                );
            }
        }
    }
    out.push(calc::format_1_decimal(student.overall_average()));
    out.push(student.overall_grade_label().to_string());
    out
}

/// Writes the BOM, the header and one row per student. Returns the number of
/// student rows written.
pub fn write_csv<W: Write>(mut out: W, book: &Gradebook) -> anyhow::Result<usize> {
    out.write_all(UTF8_BOM.as_bytes())
        .context("failed to write byte-order mark")?;
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    wtr.write_record(header(book.config()))
        .context("failed to write header")?;
    let mut rows = 0;
    for s in book.students() {
        wtr.write_record(student_row(s, book.config()))
            .with_context(|| format!("failed to write row for {}", s.student_id))?;
        rows += 1;
    }
    wtr.flush().context("failed to flush csv")?;
    Ok(rows)
}

pub fn export_csv(book: &Gradebook, out_path: &Path) -> anyhow::Result<usize> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }
    let file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    write_csv(BufWriter::new(file), book)
}

/// `grades_YYYYMMDD_HHMMSS.csv` under `dir`.
pub fn default_export_path<Tz>(dir: &Path, now: DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    dir.join(format!("grades_{}.csv", now.format("%Y%m%d_%H%M%S")))
}

fn subjects_from_header(header: &csv::StringRecord) -> anyhow::Result<Vec<String>> {
    let n = header.len();
    if n < 4
        || header.get(0) != Some(COL_STUDENT_ID)
        || header.get(1) != Some(COL_NAME)
        || header.get(n - 2) != Some(COL_OVERALL_AVERAGE)
        || header.get(n - 1) != Some(COL_OVERALL_GRADE)
    {
        bail!("not a gradebook export: unexpected leading or trailing columns");
    }
    let subject_cols = n - 4;
    if subject_cols % SUBJECT_SUFFIXES.len() != 0 {
        bail!("not a gradebook export: subject columns are not in groups of 7");
    }

    let mut subjects = Vec::new();
    for group in 0..subject_cols / SUBJECT_SUFFIXES.len() {
        let base = 2 + group * SUBJECT_SUFFIXES.len();
        let first = header.get(base).unwrap_or_default();
        let Some(subject) = first.strip_suffix(SUBJECT_SUFFIXES[IDX_TOTAL]) else {
            bail!("column {} is not a total-days column: {}", base + 1, first);
        };
        for (offset, suffix) in SUBJECT_SUFFIXES.iter().enumerate() {
            let expected = format!("{}{}", subject, suffix);
            if header.get(base + offset) != Some(expected.as_str()) {
                bail!("column {} should be {}", base + offset + 1, expected);
            }
        }
        subjects.push(subject.to_string());
    }
    Ok(subjects)
}

fn parse_int_cell(cell: &str, what: &str, line: u64) -> anyhow::Result<i64> {
    cell.trim()
        .parse::<i64>()
        .with_context(|| format!("line {}: {} is not a whole number: {:?}", line, what, cell))
}

/// The test cell is exported as a whole number. Finds a score that
/// reproduces the test, composite and grade cells of `rec`, preferring the
/// coarsest precision and then the value nearest the composite.
fn recover_test_score(
    rec: &SubjectRecord,
    test: &str,
    composite: &str,
    grade: &str,
) -> Option<f64> {
    let whole = calc::parse_test_score(test)?;
    let target = 2.0 * composite.parse::<f64>().ok()? - rec.attendance_score();

    for d in SCORE_DENOMINATORS {
        let scale = d as f64;
        let lo = ((whole - 0.5) * scale).floor() as i64;
        let hi = ((whole + 0.5) * scale).ceil() as i64;
        let best = (lo..=hi)
            .map(|k| k as f64 / scale)
            .filter(|t| (0.0..=calc::MAX_TEST_SCORE).contains(t))
            .filter(|&t| {
                let mut candidate = rec.clone();
                candidate.set_test_score(t);
                calc::format_whole(t) == test
                    && candidate.composite_score().map(calc::format_1_decimal).as_deref()
                        == Some(composite)
                    && candidate.grade_label() == grade
            })
            .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()));
        if best.is_some() {
            return best;
        }
    }
    None
}

/// Rebuilds a gradebook from an export. Derived columns are ignored.
pub fn read_csv<R: Read>(mut input: R) -> anyhow::Result<Gradebook> {
    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .context("failed to read csv as UTF-8 text")?;
    let body = text.strip_prefix(UTF8_BOM).unwrap_or(&text);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());
    let header = rdr.headers().context("failed to read header")?.clone();
    let subjects = subjects_from_header(&header)?;

    let mut totals: Vec<Option<i64>> = vec![None; subjects.len()];
    let mut students = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row.context("failed to read row")?;
        let line = row.position().map(|p| p.line()).unwrap_or(i as u64 + 2);
        let id = row.get(0).unwrap_or_default().trim();
        if id.is_empty() {
            bail!("line {}: missing student id", line);
        }
        let mut student = Student::new(id, row.get(1).unwrap_or_default().trim());

        for (g, subject) in subjects.iter().enumerate() {
            let base = 2 + g * SUBJECT_SUFFIXES.len();
            let cell = |offset: usize| row.get(base + offset).unwrap_or_default();

            let total = parse_int_cell(cell(IDX_TOTAL), "total days", line)?;
            if totals[g].is_none() {
                totals[g] = Some(total);
            }
            if cell(IDX_ATTENDED).trim() == PLACEHOLDER {
                continue;
            }

            let mut rec = SubjectRecord::new(total);
            rec.set_attended_days(parse_int_cell(cell(IDX_ATTENDED), "attended days", line)?);
            let test = cell(IDX_TEST).trim();
            if !test.is_empty() {
                let composite = cell(IDX_COMPOSITE).trim();
                let grade = cell(IDX_GRADE).trim();
                let score = recover_test_score(&rec, test, composite, grade).ok_or_else(|| {
                    anyhow!(
                        "line {}: {} test score {:?} does not match composite {:?} and grade {:?}",
                        line,
                        subject,
                        test,
                        composite,
                        grade
                    )
                })?;
                rec.set_test_score(score);
            }
            student.insert_record(subject.clone(), rec);
        }
        students.push(student);
    }

    if students.is_empty() && !subjects.is_empty() {
        bail!("export has no student rows to take subject totals from");
    }
    let config = SubjectConfig::from_pairs(
        subjects
            .iter()
            .zip(totals)
            .map(|(name, total)| (name, total.unwrap_or_default())),
    )?;
    Ok(Gradebook::from_parts(config, students)?)
}

pub fn import_csv(in_path: &Path) -> anyhow::Result<Gradebook> {
    let file = File::open(in_path)
        .with_context(|| format!("failed to open {}", in_path.to_string_lossy()))?;
    read_csv(file)
}
