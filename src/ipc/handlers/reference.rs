use crate::catalog::{SlotDef, DAY_NAMES};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{array_param, bool_param};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_slots_list(state: &mut AppState, req: &Request) -> Value {
    ok(&req.id, json!({ "slots": state.catalog.slots() }))
}

fn handle_days_list(_state: &mut AppState, req: &Request) -> Value {
    let days: Vec<Value> = DAY_NAMES
        .iter()
        .enumerate()
        .map(|(value, label)| json!({ "value": value, "label": label }))
        .collect();
    ok(&req.id, json!({ "days": days }))
}

fn parse_slot(item: &Value, index: usize) -> Result<SlotDef, Value> {
    let field = |key: &str| -> Option<String> {
        item.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
    };
    let Some(value) = field("value") else {
        return Err(json!({ "index": index, "field": "value" }));
    };
    let Some(start_time) = field("startTime") else {
        return Err(json!({ "index": index, "field": "startTime" }));
    };
    let Some(end_time) = field("endTime") else {
        return Err(json!({ "index": index, "field": "endTime" }));
    };
    Ok(SlotDef {
        value,
        // Blank label is filled in from the value and times.
        label: field("label").unwrap_or_default(),
        start_time,
        end_time,
    })
}

fn handle_slots_configure(state: &mut AppState, req: &Request) -> Value {
    if bool_param(&req.params, "reset").unwrap_or(false) {
        state.catalog.reset();
        return ok(&req.id, json!({ "slots": state.catalog.slots() }));
    }
    let Some(items) = array_param(&req.params, "slots") else {
        return err(&req.id, "bad_params", "slots must be an array", None);
    };
    let mut slots = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match parse_slot(item, i) {
            Ok(slot) => slots.push(slot),
            Err(details) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("slots[{}] is missing a string field", i),
                    Some(details),
                )
            }
        }
    }
    if let Err(e) = state.catalog.configure(slots) {
        return err(
            &req.id,
            "bad_params",
            e.message,
            Some(json!({ "index": e.index })),
        );
    }
    ok(&req.id, json!({ "slots": state.catalog.slots() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "slots.list" => Some(handle_slots_list(state, req)),
        "days.list" => Some(handle_days_list(state, req)),
        "slots.configure" => Some(handle_slots_configure(state, req)),
        _ => None,
    }
}
