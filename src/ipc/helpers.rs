use serde_json::Value;

/// Trimmed, non-empty string param; `None` for anything else.
pub fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn i64_param(params: &Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn bool_param(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

pub fn array_param<'a>(params: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    params.get(key).and_then(|v| v.as_array())
}

pub fn index_param(params: &Value, key: &str) -> Option<usize> {
    i64_param(params, key).and_then(|n| usize::try_from(n).ok())
}
