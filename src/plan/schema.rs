//! JSON-Schema → structural type tree, schema-at-path resolution, and
//! assignability — the structural type system the validator is built on.

use crate::path::{Path, Segment, is_numeric_string};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("schema parse error: {0}")]
pub struct SchemaError(pub String);

/// A structural type derived from a JSON-Schema document.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Any,
    Unknown,
    String,
    Number,
    Boolean,
    Null,
    Array(Box<SchemaNode>),
    Tuple(Vec<SchemaNode>),
    Object {
        fields: BTreeMap<String, SchemaNode>,
        required: BTreeSet<String>,
        /// `additionalProperties`, only when it is itself a concrete schema.
        catchall: Option<Box<SchemaNode>>,
    },
    Union(Vec<SchemaNode>),
    ExclusiveUnion(Vec<SchemaNode>),
    Literal(Value),
    Enum(Vec<Value>),
    Optional(Box<SchemaNode>),
    Nullable(Box<SchemaNode>),
    Default(Box<SchemaNode>),
}

impl SchemaNode {
    pub fn object_is_empty_shape(&self) -> bool {
        matches!(self, SchemaNode::Object { fields, .. } if fields.is_empty())
    }
}

/// Compiles a JSON-Schema document (already parsed as a `Value`, tolerant of
/// JSON5 input upstream) into a [`SchemaNode`] tree. Recognizes `type`,
/// `properties`, `required`, `items`, `prefixItems`, `anyOf`, `oneOf`,
/// `enum`, `const`, `additionalProperties`, and the informal `nullable`
/// extension.
pub fn compile(schema: &Value) -> Result<SchemaNode, SchemaError> {
    let Some(obj) = schema.as_object() else {
        return match schema {
            Value::Bool(true) => Ok(SchemaNode::Any),
            Value::Bool(false) => Ok(SchemaNode::Unknown),
            _ => Err(SchemaError(format!(
                "expected a JSON-Schema object, got: {schema}"
            ))),
        };
    };

    if let Some(const_value) = obj.get("const") {
        return Ok(SchemaNode::Literal(const_value.clone()));
    }

    if let Some(Value::Array(variants)) = obj.get("enum") {
        return Ok(SchemaNode::Enum(variants.clone()));
    }

    if let Some(Value::Array(options)) = obj.get("anyOf") {
        let compiled = options
            .iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(SchemaNode::Union(compiled));
    }

    if let Some(Value::Array(options)) = obj.get("oneOf") {
        let compiled = options
            .iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(SchemaNode::ExclusiveUnion(compiled));
    }

    let node = compile_typed(obj, schema)?;

    let node = if obj.get("nullable") == Some(&Value::Bool(true)) {
        SchemaNode::Nullable(Box::new(node))
    } else {
        node
    };

    Ok(node)
}

fn compile_typed(
    obj: &serde_json::Map<String, Value>,
    schema: &Value,
) -> Result<SchemaNode, SchemaError> {
    match obj.get("type") {
        Some(Value::String(t)) => compile_by_type_name(t, obj, schema),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            let has_null = names.contains(&"null");
            let rest: Vec<&str> = names.into_iter().filter(|t| *t != "null").collect();
            if rest.is_empty() {
                return Ok(SchemaNode::Null);
            }
            let compiled: Vec<SchemaNode> = rest
                .iter()
                .map(|t| compile_by_type_name(t, obj, schema))
                .collect::<Result<_, _>>()?;
            let inner = if compiled.len() == 1 {
                compiled.into_iter().next().unwrap()
            } else {
                SchemaNode::Union(compiled)
            };
            if has_null {
                Ok(SchemaNode::Nullable(Box::new(inner)))
            } else {
                Ok(inner)
            }
        }
        None => {
            if obj.contains_key("properties") {
                compile_by_type_name("object", obj, schema)
            } else if obj.contains_key("items") || obj.contains_key("prefixItems") {
                compile_by_type_name("array", obj, schema)
            } else {
                Ok(SchemaNode::Any)
            }
        }
        Some(_) => Err(SchemaError("`type` must be a string or array".to_string())),
    }
}

fn compile_by_type_name(
    type_name: &str,
    obj: &serde_json::Map<String, Value>,
    _schema: &Value,
) -> Result<SchemaNode, SchemaError> {
    match type_name {
        "string" => Ok(SchemaNode::String),
        "number" | "integer" => Ok(SchemaNode::Number),
        "boolean" => Ok(SchemaNode::Boolean),
        "null" => Ok(SchemaNode::Null),
        "array" => {
            if let Some(Value::Array(prefix)) = obj.get("prefixItems") {
                let compiled = prefix
                    .iter()
                    .map(compile)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SchemaNode::Tuple(compiled))
            } else if let Some(items) = obj.get("items") {
                Ok(SchemaNode::Array(Box::new(compile(items)?)))
            } else {
                Ok(SchemaNode::Array(Box::new(SchemaNode::Any)))
            }
        }
        "object" => {
            let mut fields = BTreeMap::new();
            if let Some(Value::Object(properties)) = obj.get("properties") {
                for (key, prop_schema) in properties {
                    let mut inner = compile(prop_schema)?;
                    if prop_schema.get("default").is_some() {
                        inner = SchemaNode::Default(Box::new(inner));
                    }
                    fields.insert(key.clone(), inner);
                }
            }

            let required: BTreeSet<String> = match obj.get("required") {
                Some(Value::Array(names)) => names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => BTreeSet::new(),
            };

            for (name, node) in fields.iter_mut() {
                if !required.contains(name) && !matches!(node, SchemaNode::Default(_)) {
                    *node = SchemaNode::Optional(Box::new(node.clone()));
                }
            }

            let catchall = match obj.get("additionalProperties") {
                Some(schema @ Value::Object(_)) => Some(Box::new(compile(schema)?)),
                _ => None,
            };

            Ok(SchemaNode::Object {
                fields,
                required,
                catchall,
            })
        }
        other => Err(SchemaError(format!("unsupported schema type: {other}"))),
    }
}

/// Peels `Optional`/`Nullable`/`Default` wrappers down to the inner schema.
pub fn unwrap(node: &SchemaNode) -> &SchemaNode {
    match node {
        SchemaNode::Optional(inner) | SchemaNode::Nullable(inner) | SchemaNode::Default(inner) => {
            unwrap(inner)
        }
        other => other,
    }
}

/// The set of primitive type tags a schema can manifest as — used both for
/// `type_mismatch` reporting and as the assignability fallback.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeTag {
    Any,
    Unknown,
    String,
    Number,
    Boolean,
    Null,
    Array,
    Object,
}

pub fn type_set(node: &SchemaNode) -> BTreeSet<TypeTag> {
    let node = unwrap(node);
    let mut set = BTreeSet::new();
    match node {
        SchemaNode::Any => {
            set.insert(TypeTag::Any);
        }
        SchemaNode::Unknown => {
            set.insert(TypeTag::Unknown);
        }
        SchemaNode::String | SchemaNode::Enum(_) => {
            set.insert(TypeTag::String);
        }
        SchemaNode::Number => {
            set.insert(TypeTag::Number);
        }
        SchemaNode::Boolean => {
            set.insert(TypeTag::Boolean);
        }
        SchemaNode::Null => {
            set.insert(TypeTag::Null);
        }
        SchemaNode::Array(_) | SchemaNode::Tuple(_) => {
            set.insert(TypeTag::Array);
        }
        SchemaNode::Object { .. } => {
            set.insert(TypeTag::Object);
        }
        SchemaNode::Literal(v) => {
            set.insert(literal_type_tag(v));
        }
        SchemaNode::Union(options) | SchemaNode::ExclusiveUnion(options) => {
            for option in options {
                set.extend(type_set(option));
            }
        }
        SchemaNode::Optional(_) | SchemaNode::Nullable(_) | SchemaNode::Default(_) => {
            unreachable!("unwrapped above")
        }
    }
    set
}

fn literal_type_tag(value: &Value) -> TypeTag {
    match value {
        Value::String(_) => TypeTag::String,
        Value::Number(_) => TypeTag::Number,
        Value::Bool(_) => TypeTag::Boolean,
        _ => TypeTag::Unknown,
    }
}

/// Overridden `enum`'s type set per the spec note "Enums of strings count as
/// string" — non-string enums fall back to the union of member literal
/// types, which is what [`type_set`] already computes via `TypeTag::String`
/// for the common case; this helper exists for the rare non-string enum.
pub fn enum_type_set(values: &[Value]) -> BTreeSet<TypeTag> {
    if values.iter().all(|v| v.is_string()) {
        BTreeSet::from([TypeTag::String])
    } else {
        values.iter().map(literal_type_tag).collect()
    }
}

/// Resolves the schema node reached by walking `path` through `root`,
/// descending into unions (collecting the subset of branches where the
/// remaining path resolves) and unwrapping optional/nullable/default
/// wrappers before each step.
pub fn schema_at_path(root: &SchemaNode, path: &Path) -> Option<SchemaNode> {
    resolve(root, path.segments())
}

fn resolve(node: &SchemaNode, remaining: &[Segment]) -> Option<SchemaNode> {
    let node = unwrap(node);

    let Some((segment, rest)) = remaining.split_first() else {
        return Some(node.clone());
    };

    match node {
        SchemaNode::Union(options) | SchemaNode::ExclusiveUnion(options) => {
            let resolved: Vec<SchemaNode> = options
                .iter()
                .filter_map(|option| resolve(option, remaining))
                .collect();
            match resolved.len() {
                0 => None,
                1 => Some(resolved.into_iter().next().unwrap()),
                _ => Some(SchemaNode::Union(resolved)),
            }
        }
        SchemaNode::Array(element) => match segment {
            Segment::Index(_) => resolve(element, rest),
            Segment::Key(k) if is_numeric_string(k) => resolve(element, rest),
            _ => None,
        },
        SchemaNode::Tuple(elements) => {
            let is_index = matches!(segment, Segment::Index(_))
                || matches!(segment, Segment::Key(k) if is_numeric_string(k));
            if !is_index {
                return None;
            }
            if elements.is_empty() {
                return None;
            }
            let union = if elements.len() == 1 {
                elements[0].clone()
            } else {
                SchemaNode::Union(elements.clone())
            };
            resolve(&union, rest)
        }
        SchemaNode::Object { fields, catchall, .. } => {
            let key = match segment {
                Segment::Key(k) => k.clone(),
                Segment::Index(i) => i.to_string(),
            };
            if let Some(field) = fields.get(&key) {
                resolve(field, rest)
            } else if let Some(catchall) = catchall {
                resolve(catchall, rest)
            } else if fields.is_empty() {
                resolve(&SchemaNode::Any, rest)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// `expected ← actual`: true iff a value conforming to `actual` is
/// assignable where `expected` is declared.
pub fn assignable(expected: &SchemaNode, actual: &SchemaNode) -> bool {
    let expected = unwrap(expected);
    let actual = unwrap(actual);

    if matches!(expected, SchemaNode::Any) || matches!(actual, SchemaNode::Any) {
        return true;
    }

    if let SchemaNode::Union(options) | SchemaNode::ExclusiveUnion(options) = expected {
        return options.iter().any(|option| assignable(option, actual));
    }

    if let SchemaNode::Union(options) | SchemaNode::ExclusiveUnion(options) = actual {
        return options.iter().any(|option| assignable(expected, option));
    }

    if let (SchemaNode::Array(expected_elem), SchemaNode::Array(actual_elem)) = (expected, actual) {
        return assignable(expected_elem, actual_elem);
    }

    if let (
        SchemaNode::Object {
            fields: expected_fields,
            required: expected_required,
            ..
        },
        SchemaNode::Object {
            fields: actual_fields,
            ..
        },
    ) = (expected, actual)
    {
        for (name, expected_field) in expected_fields {
            let is_required = expected_required.contains(name)
                && !matches!(expected_field, SchemaNode::Optional(_) | SchemaNode::Default(_));
            match actual_fields.get(name) {
                Some(actual_field) => {
                    if !assignable(expected_field, actual_field) {
                        return false;
                    }
                }
                None if is_required => return false,
                None => {}
            }
        }
        return true;
    }

    let expected_set = type_set(expected);
    let actual_set = type_set(actual);
    expected_set.contains(&TypeTag::Any)
        || actual_set.contains(&TypeTag::Unknown)
        || expected_set.intersection(&actual_set).next().is_some()
}

/// The "string-coercible" set a template-string `$values` entry must resolve
/// against: values interpolated into a template are stringified at execute
/// time, so any of string/number/boolean/object/array is acceptable.
pub fn string_coercible_set() -> SchemaNode {
    SchemaNode::Union(vec![
        SchemaNode::String,
        SchemaNode::Number,
        SchemaNode::Boolean,
        SchemaNode::Object {
            fields: BTreeMap::new(),
            required: BTreeSet::new(),
            catchall: None,
        },
        SchemaNode::Array(Box::new(SchemaNode::Any)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse;
    use serde_json::json;

    #[test]
    fn compiles_primitive_types() {
        assert_eq!(compile(&json!({"type": "string"})).unwrap(), SchemaNode::String);
        assert_eq!(compile(&json!({"type": "number"})).unwrap(), SchemaNode::Number);
        assert_eq!(compile(&json!({"type": "boolean"})).unwrap(), SchemaNode::Boolean);
        assert_eq!(compile(&json!({"type": "null"})).unwrap(), SchemaNode::Null);
    }

    #[test]
    fn compiles_object_with_required_and_optional_fields() {
        let node = compile(&json!({
            "type": "object",
            "properties": {"a": {"type": "string"}, "b": {"type": "number"}},
            "required": ["a"]
        }))
        .unwrap();

        match node {
            SchemaNode::Object { fields, required, .. } => {
                assert_eq!(fields["a"], SchemaNode::String);
                assert_eq!(fields["b"], SchemaNode::Optional(Box::new(SchemaNode::Number)));
                assert!(required.contains("a"));
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn compiles_tuple_from_prefix_items() {
        let node = compile(&json!({
            "type": "array",
            "prefixItems": [{"type": "string"}, {"type": "number"}]
        }))
        .unwrap();
        assert_eq!(
            node,
            SchemaNode::Tuple(vec![SchemaNode::String, SchemaNode::Number])
        );
    }

    #[test]
    fn compiles_any_of_union() {
        let node = compile(&json!({"anyOf": [{"type": "object", "properties": {}}, {"type": "null"}]}))
            .unwrap();
        assert!(matches!(node, SchemaNode::Union(options) if options.len() == 2));
    }

    #[test]
    fn type_set_unwraps_wrappers() {
        let node = SchemaNode::Optional(Box::new(SchemaNode::Nullable(Box::new(SchemaNode::String))));
        assert_eq!(type_set(&node), BTreeSet::from([TypeTag::String]));
    }

    #[test]
    fn schema_at_path_resolves_union_branch_with_field() {
        // anyOf(object{contractAddress: string}, null) — reference targets
        // platformInfo.contractAddress which only one branch has.
        let root = compile(&json!({
            "type": "object",
            "properties": {
                "platformInfo": {
                    "anyOf": [
                        {
                            "type": "object",
                            "properties": {"contractAddress": {"type": "string"}},
                            "required": ["platformName"]
                        },
                        {"type": "null"}
                    ]
                }
            }
        }))
        .unwrap();

        let resolved = schema_at_path(&root, &parse("platformInfo.contractAddress"));
        assert_eq!(resolved, Some(SchemaNode::String));
    }

    #[test]
    fn schema_at_path_fails_when_no_branch_has_field() {
        let root = SchemaNode::Union(vec![SchemaNode::String, SchemaNode::Number]);
        assert_eq!(schema_at_path(&root, &parse("missing")), None);
    }

    #[test]
    fn schema_at_path_empty_shape_object_is_permissive() {
        let root = SchemaNode::Object {
            fields: BTreeMap::new(),
            required: BTreeSet::new(),
            catchall: None,
        };
        assert_eq!(schema_at_path(&root, &parse("anything.nested")), Some(SchemaNode::Any));
    }

    #[test]
    fn schema_at_path_uses_additional_properties_catchall() {
        let root = SchemaNode::Object {
            fields: BTreeMap::from([("known".to_string(), SchemaNode::String)]),
            required: BTreeSet::new(),
            catchall: Some(Box::new(SchemaNode::Number)),
        };
        assert_eq!(schema_at_path(&root, &parse("unknown_key")), Some(SchemaNode::Number));
    }

    #[test]
    fn schema_at_path_non_empty_shape_without_catchall_fails_on_absent_key() {
        let root = SchemaNode::Object {
            fields: BTreeMap::from([("known".to_string(), SchemaNode::String)]),
            required: BTreeSet::new(),
            catchall: None,
        };
        assert_eq!(schema_at_path(&root, &parse("missing")), None);
    }

    #[test]
    fn schema_at_path_array_index_and_numeric_string_agree() {
        let root = SchemaNode::Array(Box::new(SchemaNode::String));
        assert_eq!(schema_at_path(&root, &parse("[0]")), Some(SchemaNode::String));
        assert_eq!(schema_at_path(&root, &parse("0")), Some(SchemaNode::String));
    }

    #[test]
    fn assignable_number_to_declared_string_is_false() {
        assert!(!assignable(&SchemaNode::String, &SchemaNode::Number));
    }

    #[test]
    fn assignable_any_is_always_true() {
        assert!(assignable(&SchemaNode::Any, &SchemaNode::Number));
        assert!(assignable(&SchemaNode::String, &SchemaNode::Any));
    }

    #[test]
    fn assignable_object_requires_required_fields_present_and_compatible() {
        let expected = SchemaNode::Object {
            fields: BTreeMap::from([("name".to_string(), SchemaNode::String)]),
            required: BTreeSet::from(["name".to_string()]),
            catchall: None,
        };
        let actual_missing = SchemaNode::Object {
            fields: BTreeMap::new(),
            required: BTreeSet::new(),
            catchall: None,
        };
        assert!(!assignable(&expected, &actual_missing));

        let actual_present = SchemaNode::Object {
            fields: BTreeMap::from([("name".to_string(), SchemaNode::String)]),
            required: BTreeSet::new(),
            catchall: None,
        };
        assert!(assignable(&expected, &actual_present));
    }

    #[test]
    fn assignable_allows_extra_actual_fields() {
        let expected = SchemaNode::Object {
            fields: BTreeMap::new(),
            required: BTreeSet::new(),
            catchall: None,
        };
        let actual = SchemaNode::Object {
            fields: BTreeMap::from([("extra".to_string(), SchemaNode::String)]),
            required: BTreeSet::new(),
            catchall: None,
        };
        assert!(assignable(&expected, &actual));
    }

    #[test]
    fn assignable_optional_expected_field_not_required() {
        let expected = SchemaNode::Object {
            fields: BTreeMap::from([(
                "maybe".to_string(),
                SchemaNode::Optional(Box::new(SchemaNode::String)),
            )]),
            required: BTreeSet::from(["maybe".to_string()]),
            catchall: None,
        };
        let actual = SchemaNode::Object {
            fields: BTreeMap::new(),
            required: BTreeSet::new(),
            catchall: None,
        };
        assert!(assignable(&expected, &actual));
    }
}
