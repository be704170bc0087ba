use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{array_param, index_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{RowPatch, ScheduleEditor, ScheduleRow};
use serde_json::{json, Value};
use uuid::Uuid;

const SESSION_LIMIT: usize = 64;
const SCHEDULE_MAX_ROWS: usize = 256;

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

fn parse_day_of_week(value: &Value, what: &str) -> Result<i64, HandlerErr> {
    let Some(day) = value.as_i64() else {
        return Err(bad_params(format!("{} must be an integer", what), None));
    };
    if !(0..=6).contains(&day) {
        return Err(bad_params(
            format!("{} must be between 0 (Sunday) and 6 (Saturday)", what),
            Some(json!({ "dayOfWeek": day })),
        ));
    }
    Ok(day)
}

fn parse_row(item: &Value, index: usize) -> Result<ScheduleRow, HandlerErr> {
    let Some(obj) = item.as_object() else {
        return Err(bad_params(
            format!("rows[{}] must be an object", index),
            None,
        ));
    };
    let id = match obj.get("id") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            let trimmed = v.as_str().map(str::trim).filter(|s| !s.is_empty());
            let Some(id) = trimmed else {
                return Err(bad_params(
                    format!("rows[{}].id must be a non-empty string", index),
                    None,
                ));
            };
            Some(id.to_string())
        }
    };
    let Some(time_slot_id) = obj.get("timeSlotId").and_then(|v| v.as_str()) else {
        return Err(bad_params(
            format!("rows[{}].timeSlotId must be a string", index),
            None,
        ));
    };
    let Some(day_value) = obj.get("dayOfWeek") else {
        return Err(bad_params(
            format!("rows[{}].dayOfWeek must be an integer", index),
            None,
        ));
    };
    let day_of_week = parse_day_of_week(day_value, &format!("rows[{}].dayOfWeek", index))?;
    Ok(ScheduleRow {
        id,
        time_slot_id: time_slot_id.to_string(),
        day_of_week,
    })
}

fn parse_rows(params: &Value) -> Result<Vec<ScheduleRow>, HandlerErr> {
    let Some(items) = array_param(params, "rows") else {
        return Err(bad_params("rows must be an array", None));
    };
    if items.len() > SCHEDULE_MAX_ROWS {
        return Err(HandlerErr {
            code: "row_limit",
            message: format!("a schedule holds at most {} rows", SCHEDULE_MAX_ROWS),
            details: Some(json!({ "rowCount": items.len(), "max": SCHEDULE_MAX_ROWS })),
        });
    }
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        rows.push(parse_row(item, i)?);
    }
    Ok(rows)
}

fn require_session<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<(String, &'a mut ScheduleEditor), HandlerErr> {
    let Some(session_id) = str_param(&req.params, "sessionId") else {
        return Err(bad_params("missing sessionId", None));
    };
    match state.sessions.get_mut(&session_id) {
        Some(editor) => Ok((session_id, editor)),
        None => Err(HandlerErr {
            code: "no_session",
            message: format!("no open session {}", session_id),
            details: None,
        }),
    }
}

/// Every state-changing reply carries a fresh conflict report alongside
/// the rows and the dirty flag.
fn editor_payload(editor: &ScheduleEditor) -> Value {
    json!({
        "rows": editor.rows(),
        "dirty": editor.is_dirty(),
        "conflicts": editor.check(),
    })
}

fn session_payload(session_id: &str, editor: &ScheduleEditor) -> Value {
    let mut payload = editor_payload(editor);
    payload["sessionId"] = json!(session_id);
    payload["classId"] = json!(editor.class_id());
    payload
}

fn handle_open(state: &mut AppState, req: &Request) -> Value {
    let Some(class_id) = str_param(&req.params, "classId") else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let rows = match parse_rows(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if state.sessions.len() >= SESSION_LIMIT {
        return err(
            &req.id,
            "session_limit",
            format!("at most {} sessions may be open", SESSION_LIMIT),
            Some(json!({ "limit": SESSION_LIMIT })),
        );
    }
    let session_id = Uuid::new_v4().to_string();
    let editor = ScheduleEditor::open(class_id, rows);
    let payload = session_payload(&session_id, &editor);
    state.sessions.insert(session_id, editor);
    ok(&req.id, payload)
}

fn handle_get(state: &mut AppState, req: &Request) -> Value {
    let (session_id, editor) = match require_session(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    ok(&req.id, session_payload(&session_id, editor))
}

fn handle_add_row(state: &mut AppState, req: &Request) -> Value {
    let (_, editor) = match require_session(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if editor.row_count() >= SCHEDULE_MAX_ROWS {
        return err(
            &req.id,
            "row_limit",
            format!("a schedule holds at most {} rows", SCHEDULE_MAX_ROWS),
            Some(json!({ "rowCount": editor.row_count(), "max": SCHEDULE_MAX_ROWS })),
        );
    }
    let index = editor.add_row();
    let mut payload = editor_payload(editor);
    payload["index"] = json!(index);
    ok(&req.id, payload)
}

fn parse_patch(params: &Value) -> Result<RowPatch, HandlerErr> {
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(bad_params("patch must be an object", None));
    };
    let time_slot_id = match patch.get("timeSlotId") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            // Empty string is legal: it clears the slot selection.
            let Some(s) = v.as_str() else {
                return Err(bad_params("patch.timeSlotId must be a string", None));
            };
            Some(s.to_string())
        }
    };
    let day_of_week = match patch.get("dayOfWeek") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => Some(parse_day_of_week(v, "patch.dayOfWeek")?),
    };
    let patch = RowPatch {
        time_slot_id,
        day_of_week,
    };
    if patch.is_empty() {
        return Err(bad_params("patch must set timeSlotId or dayOfWeek", None));
    }
    Ok(patch)
}

fn out_of_bounds(index: usize, row_count: usize) -> HandlerErr {
    bad_params(
        format!("row index {} out of range", index),
        Some(json!({ "index": index, "rowCount": row_count })),
    )
}

fn handle_update_row(state: &mut AppState, req: &Request) -> Value {
    let patch = match parse_patch(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(index) = index_param(&req.params, "index") else {
        return err(&req.id, "bad_params", "index must be a non-negative integer", None);
    };
    let (_, editor) = match require_session(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if let Err(oob) = editor.update_row(index, patch) {
        return out_of_bounds(oob.index, oob.row_count).response(&req.id);
    }
    ok(&req.id, editor_payload(editor))
}

fn handle_remove_row(state: &mut AppState, req: &Request) -> Value {
    let Some(index) = index_param(&req.params, "index") else {
        return err(&req.id, "bad_params", "index must be a non-negative integer", None);
    };
    let (_, editor) = match require_session(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if let Err(oob) = editor.remove_row(index) {
        return out_of_bounds(oob.index, oob.row_count).response(&req.id);
    }
    ok(&req.id, editor_payload(editor))
}

fn handle_reset(state: &mut AppState, req: &Request) -> Value {
    let (_, editor) = match require_session(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    editor.reset();
    ok(&req.id, editor_payload(editor))
}

fn handle_replace(state: &mut AppState, req: &Request) -> Value {
    let rows = match parse_rows(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let (_, editor) = match require_session(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    editor.replace_all(rows);
    ok(&req.id, editor_payload(editor))
}

fn handle_check(state: &mut AppState, req: &Request) -> Value {
    let (_, editor) = match require_session(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    ok(&req.id, json!(editor.check()))
}

fn handle_close(state: &mut AppState, req: &Request) -> Value {
    let Some(session_id) = str_param(&req.params, "sessionId") else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };
    if state.sessions.remove(&session_id).is_none() {
        return err(
            &req.id,
            "no_session",
            format!("no open session {}", session_id),
            None,
        );
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.open" => Some(handle_open(state, req)),
        "schedule.get" => Some(handle_get(state, req)),
        "schedule.addRow" => Some(handle_add_row(state, req)),
        "schedule.updateRow" => Some(handle_update_row(state, req)),
        "schedule.removeRow" => Some(handle_remove_row(state, req)),
        "schedule.reset" => Some(handle_reset(state, req)),
        "schedule.replace" => Some(handle_replace(state, req)),
        "schedule.check" => Some(handle_check(state, req)),
        "schedule.close" => Some(handle_close(state, req)),
        _ => None,
    }
}
