use std::collections::HashSet;

use crate::grades::{self, RosterEntry, RowIssue, StagedImport};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{array_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use uuid::Uuid;

const IMPORT_PENDING_LIMIT: usize = 16;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

fn bad_params(message: impl Into<String>, details: Option<Value>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
        details,
    }
}

fn parse_roster(params: &Value) -> Result<Vec<RosterEntry>, HandlerErr> {
    let Some(items) = array_param(params, "roster") else {
        return Err(bad_params("roster must be an array", None));
    };
    if items.is_empty() {
        return Err(bad_params("roster must not be empty", None));
    }
    let mut roster = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    for (i, item) in items.iter().enumerate() {
        let student_id = item
            .get("studentId")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(student_id) = student_id else {
            return Err(bad_params(
                format!("roster[{}].studentId must be a non-empty string", i),
                Some(json!({ "index": i })),
            ));
        };
        if !seen.insert(student_id.to_string()) {
            return Err(bad_params(
                format!("duplicate roster studentId '{}'", student_id),
                Some(json!({ "index": i })),
            ));
        }
        let full_name = item
            .get("fullName")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        roster.push(RosterEntry {
            student_id: student_id.to_string(),
            full_name,
        });
    }
    Ok(roster)
}

fn issue_json(issue: &RowIssue) -> Value {
    let mut v = json!({
        "line": issue.line,
        "code": issue.code,
        "message": issue.message,
    });
    if issue.column.is_some() || issue.value.is_some() {
        v["details"] = json!({ "column": issue.column, "value": issue.value });
    }
    v
}

fn handle_import_preview(state: &mut AppState, req: &Request) -> Value {
    let Some(path) = str_param(&req.params, "path") else {
        return err(&req.id, "bad_params", "missing path", None);
    };
    let roster = match parse_roster(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if state.pending_imports.len() >= IMPORT_PENDING_LIMIT {
        return err(
            &req.id,
            "import_limit",
            format!(
                "at most {} previews may be pending; apply or discard first",
                IMPORT_PENDING_LIMIT
            ),
            Some(json!({ "limit": IMPORT_PENDING_LIMIT })),
        );
    }

    let bytes = match grades::read_sheet_bytes(&path) {
        Ok(b) => b,
        Err(e) => {
            return err(
                &req.id,
                "sheet_read_failed",
                format!("{e:#}"),
                Some(json!({ "path": path })),
            )
        }
    };
    let fingerprint = grades::sheet_fingerprint(&bytes);
    let report = match grades::validate_sheet(&bytes, &roster) {
        Ok(r) => r,
        Err(e) => {
            return err(
                &req.id,
                "sheet_parse_failed",
                e.message,
                Some(json!({ "path": path })),
            )
        }
    };

    let rejected_lines: HashSet<usize> = report.issues.iter().map(|i| i.line).collect();
    let errors: Vec<Value> = report.issues.iter().map(issue_json).collect();
    let token = Uuid::new_v4().to_string();
    let response = json!({
        "token": token,
        "fingerprint": fingerprint,
        "columns": report.columns,
        "rowsTotal": report.rows_total,
        "staged": report.staged.len(),
        "rejected": rejected_lines.len(),
        "errors": errors,
        "stagedRows": report.staged,
        "missingStudentIds": report.missing_student_ids,
    });
    state.pending_imports.insert(
        token,
        StagedImport {
            path,
            fingerprint,
            columns: report.columns,
            staged: report.staged,
        },
    );
    ok(&req.id, response)
}

fn handle_import_apply(state: &mut AppState, req: &Request) -> Value {
    let Some(token) = str_param(&req.params, "token") else {
        return err(&req.id, "bad_params", "missing token", None);
    };
    let Some(import) = state.pending_imports.remove(&token) else {
        return err(
            &req.id,
            "unknown_token",
            format!("no staged import for token {}", token),
            None,
        );
    };

    // Re-read and re-hash at apply time; a sheet edited after preview must
    // never be applied from stale staging. Any failure puts the preview
    // back into the pending map.
    let bytes = match grades::read_sheet_bytes(&import.path) {
        Ok(b) => b,
        Err(e) => {
            let resp = err(
                &req.id,
                "sheet_read_failed",
                format!("{e:#}"),
                Some(json!({ "path": import.path })),
            );
            state.pending_imports.insert(token, import);
            return resp;
        }
    };
    let actual = grades::sheet_fingerprint(&bytes);
    if actual != import.fingerprint {
        let resp = err(
            &req.id,
            "sheet_changed",
            "grade sheet changed since preview; preview it again",
            Some(json!({ "expected": import.fingerprint, "actual": actual })),
        );
        state.pending_imports.insert(token, import);
        return resp;
    }

    let records: Vec<Value> = import
        .staged
        .iter()
        .map(|row| {
            json!({
                "studentId": row.student_id,
                "fullName": row.full_name,
                "grades": row.grades,
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "records": records,
            "appliedCount": records.len(),
            "columns": import.columns,
            "fingerprint": import.fingerprint,
        }),
    )
}

fn handle_import_discard(state: &mut AppState, req: &Request) -> Value {
    let Some(token) = str_param(&req.params, "token") else {
        return err(&req.id, "bad_params", "missing token", None);
    };
    if state.pending_imports.remove(&token).is_none() {
        return err(
            &req.id,
            "unknown_token",
            format!("no staged import for token {}", token),
            None,
        );
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.importPreview" => Some(handle_import_preview(state, req)),
        "grades.importApply" => Some(handle_import_apply(state, req)),
        "grades.importDiscard" => Some(handle_import_discard(state, req)),
        _ => None,
    }
}
