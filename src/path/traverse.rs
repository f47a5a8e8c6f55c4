use super::{Path, Segment, is_numeric_string, parse};
use serde_json::Value;

/// Walks `value` along `path`, coercing a decimal-digit string segment to an
/// array index only when the current node is an array. Returns `None` on any
/// missing key, null/undefined intermediate, out-of-range, or negative
/// index (negative indices cannot occur in this representation, but a
/// non-numeric string segment against an array is treated the same way).
pub fn get_nested_value<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match (current, segment) {
            (Value::Array(items), Segment::Index(i)) => items.get(*i)?,
            (Value::Array(items), Segment::Key(k)) if is_numeric_string(k) => {
                items.get(k.parse::<usize>().ok()?)?
            }
            (Value::Array(_), Segment::Key(_)) => return None,
            (Value::Object(map), Segment::Key(k)) => map.get(k)?,
            (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Returns true if `value` has the shape of a dependency reference:
/// an object with both `$fromStep` and `$outputKey` keys.
pub fn is_dependency_reference(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("$fromStep") && map.contains_key("$outputKey"))
}

/// Returns true if `value` has the shape of a template reference: an object
/// with `$fromTemplateString` and an array `$values`.
pub fn is_template_reference(value: &Value) -> bool {
    value.as_object().is_some_and(|map| {
        map.contains_key("$fromTemplateString") && matches!(map.get("$values"), Some(Value::Array(_)))
    })
}

/// Recursive visitor over an argument tree. Reference-shaped objects are
/// reported to the matching callback and not descended into; everything
/// else recurses structurally. The root value itself may match.
pub fn traverse_references(
    value: &Value,
    on_dependency: &mut dyn FnMut(&Value, &Path),
    on_template: &mut dyn FnMut(&Value, &Path),
    path: &Path,
) {
    if is_dependency_reference(value) {
        on_dependency(value, path);
        return;
    }
    if is_template_reference(value) {
        on_template(value, path);
        return;
    }

    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                traverse_references(item, on_dependency, on_template, &path.push_index(i));
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                traverse_references(item, on_dependency, on_template, &path.push_key(key.clone()));
            }
        }
        _ => {}
    }
}

/// Collects the `$fromStep` of every dependency reference and every entry of
/// every template reference's `$values`, in order of first occurrence, with
/// duplicates removed.
pub fn extract_dependency_step_ids(args: &Value) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    let mut record = |id: &str| {
        if seen.insert(id.to_string()) {
            ordered.push(id.to_string());
        }
    };

    let mut on_dependency = |reference: &Value, _path: &Path| {
        if let Some(id) = reference.get("$fromStep").and_then(Value::as_str) {
            record(id);
        }
    };
    let mut on_template = |reference: &Value, _path: &Path| {
        if let Some(values) = reference.get("$values").and_then(Value::as_array) {
            for entry in values {
                if let Some(id) = entry.get("$fromStep").and_then(Value::as_str) {
                    record(id);
                }
            }
        }
    };

    traverse_references(args, &mut on_dependency, &mut on_template, &Path::root());
    ordered
}

/// Convenience: `get_nested_value` against a string path, parsed on the fly.
pub fn get_nested_value_str<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    get_nested_value(value, &parse(path))
}
