use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const IMPORT_MAX_ROWS: usize = 5000;

pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub student_id: String,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct RowIssue {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
    pub column: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedRow {
    pub line: usize,
    pub student_id: String,
    /// Roster spelling, not the sheet cell; the id is authoritative.
    pub full_name: String,
    /// Keyed by grade column; `None` means the cell was left blank.
    pub grades: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct SheetReport {
    pub columns: Vec<String>,
    /// Non-blank data rows seen, including rejected ones.
    pub rows_total: usize,
    pub staged: Vec<StagedRow>,
    pub issues: Vec<RowIssue>,
    /// Roster students with no row in the sheet, in roster order.
    pub missing_student_ids: Vec<String>,
}

#[derive(Debug)]
pub struct SheetFormatError {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct StagedImport {
    pub path: String,
    pub fingerprint: String,
    pub columns: Vec<String>,
    pub staged: Vec<StagedRow>,
}

pub fn read_sheet_bytes(path: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading grade sheet {}", path))
}

/// Lowercase-hex SHA-256 of the sheet bytes.
pub fn sheet_fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn format_error(message: impl Into<String>) -> SheetFormatError {
    SheetFormatError {
        message: message.into(),
    }
}

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}

struct SheetHeader {
    id_col: usize,
    name_col: Option<usize>,
    grade_cols: Vec<(String, usize)>,
}

fn resolve_header(line: &str) -> std::result::Result<SheetHeader, SheetFormatError> {
    let fields = parse_csv_record(line);
    let mut id_col = None;
    let mut name_col = None;
    let mut grade_cols: Vec<(String, usize)> = Vec::new();
    let mut seen_grade_names = HashSet::new();
    for (i, raw) in fields.iter().enumerate() {
        let name = raw.trim();
        match name.to_ascii_lowercase().as_str() {
            "student_id" => id_col = Some(i),
            "full_name" => name_col = Some(i),
            // Blank header cells (trailing commas) are ignored.
            "" => {}
            _ => {
                if !seen_grade_names.insert(name.to_ascii_lowercase()) {
                    return Err(format_error(format!("duplicate grade column '{}'", name)));
                }
                grade_cols.push((name.to_string(), i));
            }
        }
    }
    let Some(id_col) = id_col else {
        return Err(format_error("header must include a student_id column"));
    };
    if grade_cols.is_empty() {
        return Err(format_error("header must include at least one grade column"));
    }
    Ok(SheetHeader {
        id_col,
        name_col,
        grade_cols,
    })
}

fn cell<'a>(fields: &'a [String], col: usize) -> &'a str {
    fields.get(col).map(|s| s.trim()).unwrap_or("")
}

/// Parses and validates a grade sheet against the class roster. Row-level
/// problems become `issues` and reject that row only; sheet-level problems
/// (missing header columns, oversize, not UTF-8) fail the whole sheet.
pub fn validate_sheet(
    bytes: &[u8],
    roster: &[RosterEntry],
) -> std::result::Result<SheetReport, SheetFormatError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| format_error("sheet is not UTF-8 text"))?;
    let mut lines = text.lines();
    let Some(header_line) = lines.next() else {
        return Err(format_error("sheet is empty"));
    };
    let header = resolve_header(header_line)?;

    let by_id: HashMap<&str, &RosterEntry> = roster
        .iter()
        .map(|e| (e.student_id.as_str(), e))
        .collect();

    let mut staged = Vec::new();
    let mut issues = Vec::new();
    let mut seen_ids = HashSet::<String>::new();
    let mut rows_total = 0usize;

    for (line_idx, raw_line) in text.lines().enumerate().skip(1) {
        let line_no = line_idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        rows_total += 1;
        if rows_total > IMPORT_MAX_ROWS {
            return Err(format_error(format!(
                "sheet has more than {} data rows",
                IMPORT_MAX_ROWS
            )));
        }
        let fields = parse_csv_record(line);

        let student_id = cell(&fields, header.id_col);
        if student_id.is_empty() {
            issues.push(RowIssue {
                line: line_no,
                code: "missing_student_id",
                message: "student_id is required".to_string(),
                column: None,
                value: None,
            });
            continue;
        }
        let Some(entry) = by_id.get(student_id) else {
            issues.push(RowIssue {
                line: line_no,
                code: "unknown_student",
                message: format!("student '{}' is not on the roster", student_id),
                column: None,
                value: None,
            });
            continue;
        };
        if !seen_ids.insert(student_id.to_string()) {
            issues.push(RowIssue {
                line: line_no,
                code: "duplicate_student",
                message: format!("student '{}' appears earlier in the sheet", student_id),
                column: None,
                value: None,
            });
            continue;
        }

        if let Some(name_col) = header.name_col {
            let sheet_name = cell(&fields, name_col);
            let roster_name = entry.full_name.trim();
            if !sheet_name.is_empty() && !sheet_name.eq_ignore_ascii_case(roster_name) {
                issues.push(RowIssue {
                    line: line_no,
                    code: "name_mismatch",
                    message: format!(
                        "full_name '{}' does not match roster name '{}'",
                        sheet_name, roster_name
                    ),
                    column: None,
                    value: None,
                });
                continue;
            }
        }

        let mut grades = BTreeMap::new();
        let mut bad_cells = Vec::new();
        for (column, col_idx) in &header.grade_cols {
            let raw = cell(&fields, *col_idx);
            if raw.is_empty() {
                grades.insert(column.clone(), None);
                continue;
            }
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() && (GRADE_MIN..=GRADE_MAX).contains(&v) => {
                    grades.insert(column.clone(), Some(v));
                }
                _ => bad_cells.push(RowIssue {
                    line: line_no,
                    code: "bad_grade",
                    message: format!(
                        "grade must be a number between {} and {}",
                        GRADE_MIN, GRADE_MAX
                    ),
                    column: Some(column.clone()),
                    value: Some(raw.to_string()),
                }),
            }
        }
        if !bad_cells.is_empty() {
            issues.extend(bad_cells);
            continue;
        }

        staged.push(StagedRow {
            line: line_no,
            student_id: student_id.to_string(),
            full_name: entry.full_name.clone(),
            grades,
        });
    }

    let missing_student_ids = roster
        .iter()
        .filter(|e| !seen_ids.contains(&e.student_id))
        .map(|e| e.student_id.clone())
        .collect();

    Ok(SheetReport {
        columns: header.grade_cols.iter().map(|(n, _)| n.clone()).collect(),
        rows_total,
        staged,
        issues,
        missing_student_ids,
    })
}
