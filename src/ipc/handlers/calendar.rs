use crate::calendar;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::i64_param;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_month_grid(_state: &mut AppState, req: &Request) -> Value {
    let Some(year) = i64_param(&req.params, "year") else {
        return err(&req.id, "bad_params", "missing year", None);
    };
    let Some(month) = i64_param(&req.params, "month") else {
        return err(&req.id, "bad_params", "missing month", None);
    };
    let grid = match (i32::try_from(year), u32::try_from(month)) {
        (Ok(y), Ok(m)) => calendar::month_grid(y, m),
        _ => None,
    };
    let Some(grid) = grid else {
        return err(
            &req.id,
            "bad_params",
            "month must be 1-12 and year within the picker range",
            Some(json!({ "year": year, "month": month })),
        );
    };
    ok(&req.id, json!(grid))
}

fn handle_shift_month(_state: &mut AppState, req: &Request) -> Value {
    let Some(year) = i64_param(&req.params, "year") else {
        return err(&req.id, "bad_params", "missing year", None);
    };
    let Some(month) = i64_param(&req.params, "month") else {
        return err(&req.id, "bad_params", "missing month", None);
    };
    let Some(delta) = i64_param(&req.params, "delta") else {
        return err(&req.id, "bad_params", "missing delta", None);
    };
    let shifted = match (i32::try_from(year), u32::try_from(month)) {
        (Ok(y), Ok(m)) => calendar::shift_month(y, m, delta),
        _ => None,
    };
    let Some((year, month)) = shifted else {
        return err(
            &req.id,
            "bad_params",
            "month must be 1-12 and the shift must stay within the picker range",
            Some(json!({ "year": year, "month": month, "delta": delta })),
        );
    };
    ok(&req.id, json!({ "year": year, "month": month }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.monthGrid" => Some(handle_month_grid(state, req)),
        "calendar.shiftMonth" => Some(handle_shift_month(state, req)),
        _ => None,
    }
}
