use serde::Serialize;
use serde_json::Value;

/// One leaf that differs between two status fetches. `path` joins the
/// section, backend id and attribute with dots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StatusChange {
    pub path: String,
    pub old: Value,
    pub new: Value,
}

/// Leaves that changed or appeared in `current`. Attributes dropped from
/// `current` are not reported.
pub(crate) fn diff_status(previous: &Value, current: &Value) -> Vec<StatusChange> {
    let mut changes = Vec::new();
    walk(Some(previous), current, String::new(), &mut changes);
    changes
}

fn walk(previous: Option<&Value>, current: &Value, path: String, out: &mut Vec<StatusChange>) {
    if let Value::Object(fields) = current {
        let previous = previous.and_then(Value::as_object);
        for (key, value) in fields {
            let child = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            walk(previous.and_then(|p| p.get(key)), value, child, out);
        }
        return;
    }

    let old = previous.cloned().unwrap_or(Value::Null);
    if old != *current {
        out.push(StatusChange {
            path,
            old,
            new: current.clone(),
        });
    }
}
