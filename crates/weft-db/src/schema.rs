//! JSON schema subset used for collection documents
//!
//! Validation keywords: `type` (including `integer`), `enum`, `const`,
//! `minimum`, `maximum`, `exclusiveMinimum`, `exclusiveMaximum`,
//! `multipleOf`, `minLength`, `maxLength`, `pattern`, `required`,
//! `properties`, `additionalProperties`, `minProperties`, `maxProperties`,
//! `items`, `minItems`, `maxItems`, `uniqueItems`, `allOf`, `anyOf`,
//! `oneOf`, `not`, and local `$ref` pointers into `definitions` / `$defs`.
//! Annotation keywords such as `$schema`, `$id`, `title` and `description`
//! are accepted and ignored. Any other keyword makes the schema invalid, so a
//! compiled schema never silently skips a constraint.
//!
//! A `$ref` replaces its whole node; sibling keywords are not evaluated.

use crate::{DbError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Longest chain of `$ref` hops before a reference is considered cyclic
const MAX_REF_HOPS: usize = 32;

const TYPES: &[&str] = &[
    "null", "boolean", "object", "array", "number", "integer", "string",
];

const VALIDATION_KEYWORDS: &[&str] = &[
    "$ref",
    "type",
    "enum",
    "const",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "required",
    "properties",
    "additionalProperties",
    "minProperties",
    "maxProperties",
    "items",
    "minItems",
    "maxItems",
    "uniqueItems",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "definitions",
    "$defs",
];

const ANNOTATION_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "id",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "readOnly",
    "writeOnly",
    "deprecated",
];

/// A structurally checked JSON schema
#[derive(Clone, Debug)]
pub struct Schema {
    root: Value,
    /// Every `pattern` in the schema, compiled once
    patterns: Arc<HashMap<String, Regex>>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Schema {
    /// Check the schema's structure and every `$ref` in it
    pub fn compile(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(DbError::InvalidSchema(
                "schema root must be an object".to_string(),
            ));
        }

        let mut patterns = HashMap::new();
        check_node(&root, &root, "#", &mut patterns).map_err(DbError::InvalidSchema)?;
        Ok(Self {
            root,
            patterns: Arc::new(patterns),
        })
    }

    /// Parse and compile a schema from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let root = serde_json::from_str(text)
            .map_err(|e| DbError::InvalidSchema(format!("not valid JSON: {e}")))?;
        Self::compile(root)
    }

    /// The schema document
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Schema of a top-level document property, with references resolved
    pub fn property(&self, name: &str) -> Option<&Value> {
        let root = resolve(&self.root, &self.root).ok()?;
        let property = root.get("properties")?.get(name)?;
        resolve(&self.root, property).ok()
    }

    /// Documents are keyed by `_id`, so the schema must declare it as a string
    pub(crate) fn require_id(&self) -> Result<()> {
        let id = self.property("_id").ok_or_else(|| {
            DbError::InvalidSchema("schema does not declare an _id property".to_string())
        })?;

        let is_string = match id.get("type") {
            Some(Value::String(ty)) => ty == "string",
            Some(Value::Array(types)) => types.iter().any(|t| t == "string"),
            _ => false,
        };

        if is_string {
            Ok(())
        } else {
            Err(DbError::InvalidSchema(
                "_id property must have type string".to_string(),
            ))
        }
    }

    /// Validate a document, returning the first violation found
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        self.check_value(&self.root, value, "")
    }

    fn check_value(&self, schema: &Value, value: &Value, path: &str) -> std::result::Result<(), String> {
        let schema = resolve(&self.root, schema).map_err(|e| format!("{}: {e}", display(path)))?;
        let rules = match schema {
            Value::Bool(true) => return Ok(()),
            Value::Bool(false) => return Err(format!("{}: value not allowed", display(path))),
            Value::Object(rules) => rules,
            _ => return Ok(()),
        };

        if let Some(ty) = rules.get("type") {
            let matches = match ty {
                Value::Array(names) => names.iter().any(|n| type_matches(n, value)),
                name => type_matches(name, value),
            };
            if !matches {
                return Err(format!(
                    "{}: expected {}, got {}",
                    display(path),
                    type_label(ty),
                    type_of(value)
                ));
            }
        }

        if let Some(Value::Array(allowed)) = rules.get("enum") {
            if !allowed.iter().any(|a| json_eq(a, value)) {
                return Err(format!("{}: value is not one of the allowed values", display(path)));
            }
        }

        if let Some(expected) = rules.get("const") {
            if !json_eq(expected, value) {
                return Err(format!("{}: value must be {expected}", display(path)));
            }
        }

        if let Some(number) = value.as_f64() {
            self.check_number(rules, number, path)?;
        }

        if let Some(text) = value.as_str() {
            self.check_string(rules, text, path)?;
        }

        self.check_combinators(rules, value, path)?;

        match value {
            Value::Object(fields) => self.check_object(rules, fields, path),
            Value::Array(items) => self.check_array(rules, items, path),
            _ => Ok(()),
        }
    }

    fn check_number(&self, rules: &Map<String, Value>, number: f64, path: &str) -> std::result::Result<(), String> {
        // Draft 4 spells exclusivity as a boolean modifier of minimum/maximum
        let exclusive = |keyword: &str| rules.get(keyword).and_then(Value::as_bool).unwrap_or(false);

        if let Some(min) = rules.get("minimum").and_then(Value::as_f64) {
            if number < min || (exclusive("exclusiveMinimum") && number == min) {
                return Err(format!("{}: {number} is less than minimum {min}", display(path)));
            }
        }
        if let Some(max) = rules.get("maximum").and_then(Value::as_f64) {
            if number > max || (exclusive("exclusiveMaximum") && number == max) {
                return Err(format!("{}: {number} is greater than maximum {max}", display(path)));
            }
        }
        if let Some(min) = rules.get("exclusiveMinimum").and_then(Value::as_f64) {
            if number <= min {
                return Err(format!("{}: {number} is not greater than {min}", display(path)));
            }
        }
        if let Some(max) = rules.get("exclusiveMaximum").and_then(Value::as_f64) {
            if number >= max {
                return Err(format!("{}: {number} is not less than {max}", display(path)));
            }
        }
        if let Some(divisor) = rules.get("multipleOf").and_then(Value::as_f64) {
            let quotient = number / divisor;
            if (quotient - quotient.round()).abs() > f64::EPSILON * quotient.abs().max(1.0) {
                return Err(format!("{}: {number} is not a multiple of {divisor}", display(path)));
            }
        }
        Ok(())
    }

    fn check_string(&self, rules: &Map<String, Value>, text: &str, path: &str) -> std::result::Result<(), String> {
        let len = text.chars().count() as u64;
        if let Some(min) = rules.get("minLength").and_then(Value::as_u64) {
            if len < min {
                return Err(format!("{}: shorter than {min} characters", display(path)));
            }
        }
        if let Some(max) = rules.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                return Err(format!("{}: longer than {max} characters", display(path)));
            }
        }
        if let Some(pattern) = rules.get("pattern").and_then(Value::as_str) {
            let regex = self
                .patterns
                .get(pattern)
                .ok_or_else(|| format!("{}: pattern {pattern:?} was not compiled", display(path)))?;
            if !regex.is_match(text) {
                return Err(format!("{}: does not match pattern {pattern:?}", display(path)));
            }
        }
        Ok(())
    }

    fn check_combinators(&self, rules: &Map<String, Value>, value: &Value, path: &str) -> std::result::Result<(), String> {
        if let Some(Value::Array(schemas)) = rules.get("allOf") {
            for schema in schemas {
                self.check_value(schema, value, path)?;
            }
        }

        if let Some(Value::Array(schemas)) = rules.get("anyOf") {
            if !schemas.iter().any(|s| self.check_value(s, value, path).is_ok()) {
                return Err(format!("{}: matches none of anyOf", display(path)));
            }
        }

        if let Some(Value::Array(schemas)) = rules.get("oneOf") {
            let matched = schemas
                .iter()
                .filter(|s| self.check_value(s, value, path).is_ok())
                .count();
            if matched != 1 {
                return Err(format!(
                    "{}: matches {matched} schemas of oneOf, expected exactly 1",
                    display(path)
                ));
            }
        }

        if let Some(schema) = rules.get("not") {
            if self.check_value(schema, value, path).is_ok() {
                return Err(format!("{}: must not match the schema under not", display(path)));
            }
        }
        Ok(())
    }

    fn check_object(
        &self,
        rules: &Map<String, Value>,
        fields: &Map<String, Value>,
        path: &str,
    ) -> std::result::Result<(), String> {
        if let Some(Value::Array(required)) = rules.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    return Err(format!("{}: missing required property {name:?}", display(path)));
                }
            }
        }

        let count = fields.len() as u64;
        if let Some(min) = rules.get("minProperties").and_then(Value::as_u64) {
            if count < min {
                return Err(format!("{}: fewer than {min} properties", display(path)));
            }
        }
        if let Some(max) = rules.get("maxProperties").and_then(Value::as_u64) {
            if count > max {
                return Err(format!("{}: more than {max} properties", display(path)));
            }
        }

        let properties = rules.get("properties").and_then(Value::as_object);
        for (name, field) in fields {
            let field_path = format!("{path}/{}", escape(name));
            match properties.and_then(|p| p.get(name)) {
                Some(property) => self.check_value(property, field, &field_path)?,
                None => match rules.get("additionalProperties") {
                    Some(Value::Bool(false)) => {
                        return Err(format!(
                            "{}: additional property {name:?} not allowed",
                            display(path)
                        ));
                    }
                    Some(additional) => self.check_value(additional, field, &field_path)?,
                    None => {}
                },
            }
        }

        Ok(())
    }

    fn check_array(
        &self,
        rules: &Map<String, Value>,
        items: &[Value],
        path: &str,
    ) -> std::result::Result<(), String> {
        let count = items.len() as u64;
        if let Some(min) = rules.get("minItems").and_then(Value::as_u64) {
            if count < min {
                return Err(format!("{}: fewer than {min} items", display(path)));
            }
        }
        if let Some(max) = rules.get("maxItems").and_then(Value::as_u64) {
            if count > max {
                return Err(format!("{}: more than {max} items", display(path)));
            }
        }
        if rules.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            for (i, item) in items.iter().enumerate() {
                if items[..i].iter().any(|earlier| json_eq(earlier, item)) {
                    return Err(format!("{}/{i}: duplicate item", path));
                }
            }
        }

        match rules.get("items") {
            Some(Value::Array(positional)) => {
                for (i, (schema, item)) in positional.iter().zip(items).enumerate() {
                    self.check_value(schema, item, &format!("{path}/{i}"))?;
                }
            }
            Some(schema) => {
                for (i, item) in items.iter().enumerate() {
                    self.check_value(schema, item, &format!("{path}/{i}"))?;
                }
            }
            None => {}
        }
        Ok(())
    }
}

/// Follow `$ref` pointers until a concrete node is reached
fn resolve<'a>(root: &'a Value, mut node: &'a Value) -> std::result::Result<&'a Value, String> {
    for _ in 0..MAX_REF_HOPS {
        let Some(reference) = node.get("$ref") else {
            return Ok(node);
        };
        let pointer = reference
            .as_str()
            .and_then(|r| r.strip_prefix('#'))
            .ok_or_else(|| format!("unsupported $ref {reference}"))?;
        node = root
            .pointer(pointer)
            .ok_or_else(|| format!("unresolvable $ref {reference}"))?;
    }
    Err("$ref chain too long or cyclic".to_string())
}

fn check_node(
    root: &Value,
    node: &Value,
    at: &str,
    patterns: &mut HashMap<String, Regex>,
) -> std::result::Result<(), String> {
    let object = match node {
        Value::Bool(_) => return Ok(()),
        Value::Object(object) => object,
        other => return Err(format!("{at}: schema must be an object or boolean, got {other}")),
    };

    if let Some(keyword) = object
        .keys()
        .find(|k| !VALIDATION_KEYWORDS.contains(&k.as_str()) && !ANNOTATION_KEYWORDS.contains(&k.as_str()))
    {
        return Err(format!("{at}/{}: unsupported keyword", escape(keyword)));
    }

    if object.contains_key("$ref") {
        resolve(root, node).map_err(|e| format!("{at}: {e}"))?;
    }

    if let Some(ty) = object.get("type") {
        let names: Vec<&Value> = match ty {
            Value::Array(names) => names.iter().collect(),
            single => vec![single],
        };
        for name in names {
            match name.as_str() {
                Some(name) if TYPES.contains(&name) => {}
                _ => return Err(format!("{at}/type: unknown type {name}")),
            }
        }
    }

    if let Some(required) = object.get("required") {
        let all_strings = required
            .as_array()
            .is_some_and(|names| names.iter().all(Value::is_string));
        if !all_strings {
            return Err(format!("{at}/required: must be an array of strings"));
        }
    }

    if object.get("enum").is_some_and(|e| !e.is_array()) {
        return Err(format!("{at}/enum: must be an array"));
    }

    for keyword in ["minimum", "maximum"] {
        if object.get(keyword).is_some_and(|v| !v.is_number()) {
            return Err(format!("{at}/{keyword}: must be a number"));
        }
    }

    for keyword in ["exclusiveMinimum", "exclusiveMaximum"] {
        if object
            .get(keyword)
            .is_some_and(|v| !v.is_number() && !v.is_boolean())
        {
            return Err(format!("{at}/{keyword}: must be a number or boolean"));
        }
    }

    if let Some(divisor) = object.get("multipleOf") {
        if !divisor.as_f64().is_some_and(|d| d > 0.0) {
            return Err(format!("{at}/multipleOf: must be a positive number"));
        }
    }

    for keyword in [
        "minLength",
        "maxLength",
        "minProperties",
        "maxProperties",
        "minItems",
        "maxItems",
    ] {
        if object.get(keyword).is_some_and(|v| v.as_u64().is_none()) {
            return Err(format!("{at}/{keyword}: must be a non-negative integer"));
        }
    }

    if object.get("uniqueItems").is_some_and(|v| !v.is_boolean()) {
        return Err(format!("{at}/uniqueItems: must be a boolean"));
    }

    if let Some(pattern) = object.get("pattern") {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| format!("{at}/pattern: must be a string"))?;
        if !patterns.contains_key(pattern) {
            let regex = Regex::new(pattern).map_err(|e| format!("{at}/pattern: {e}"))?;
            patterns.insert(pattern.to_string(), regex);
        }
    }

    for keyword in ["properties", "definitions", "$defs"] {
        if let Some(children) = object.get(keyword) {
            let children = children
                .as_object()
                .ok_or_else(|| format!("{at}/{keyword}: must be an object"))?;
            for (name, child) in children {
                check_node(root, child, &format!("{at}/{keyword}/{}", escape(name)), patterns)?;
            }
        }
    }

    for keyword in ["allOf", "anyOf", "oneOf"] {
        if let Some(schemas) = object.get(keyword) {
            let schemas = schemas
                .as_array()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| format!("{at}/{keyword}: must be a non-empty array"))?;
            for (i, schema) in schemas.iter().enumerate() {
                check_node(root, schema, &format!("{at}/{keyword}/{i}"), patterns)?;
            }
        }
    }

    for keyword in ["additionalProperties", "not"] {
        if let Some(schema) = object.get(keyword) {
            check_node(root, schema, &format!("{at}/{keyword}"), patterns)?;
        }
    }

    match object.get("items") {
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_node(root, item, &format!("{at}/items/{i}"), patterns)?;
            }
        }
        Some(items) => check_node(root, items, &format!("{at}/items"), patterns)?,
        None => {}
    }

    Ok(())
}

/// JSON equality where numbers compare by value, so `1` equals `1.0`
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

fn type_matches(name: &Value, value: &Value) -> bool {
    match name.as_str() {
        Some("null") => value.is_null(),
        Some("boolean") => value.is_boolean(),
        Some("object") => value.is_object(),
        Some("array") => value.is_array(),
        Some("number") => value.is_number(),
        Some("integer") => is_integer(value),
        Some("string") => value.is_string(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::Number(_) if is_integer(value) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
    }
}

fn type_label(ty: &Value) -> String {
    match ty {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

/// Escape a JSON pointer segment
fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn person() -> Schema {
        Schema::compile(json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "$ref": "#/definitions/person",
            "definitions": {
                "person": {
                    "required": ["_id", "name", "age"],
                    "properties": {
                        "_id": {"type": "string"},
                        "name": {"type": "string"},
                        "age": {"type": "integer"}
                    },
                    "additionalProperties": false,
                    "type": "object"
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_person_schema_accepts_valid_document() {
        let schema = person();
        schema.require_id().unwrap();

        let doc = json!({"_id": "", "name": "Alice", "age": 30});
        assert!(schema.validate(&doc).is_ok());
    }

    #[test]
    fn test_person_schema_rejects_violations() {
        let schema = person();

        let missing = schema.validate(&json!({"_id": "", "name": "Bob"})).unwrap_err();
        assert!(missing.contains("age"));

        let wrong_type = schema
            .validate(&json!({"_id": "", "name": "Bob", "age": "old"}))
            .unwrap_err();
        assert!(wrong_type.starts_with("/age"));

        let fractional = schema
            .validate(&json!({"_id": "", "name": "Bob", "age": 1.5}))
            .unwrap_err();
        assert!(fractional.contains("integer"));

        let extra = schema
            .validate(&json!({"_id": "", "name": "Bob", "age": 3, "pet": "cat"}))
            .unwrap_err();
        assert!(extra.contains("pet"));
    }

    #[test]
    fn test_property_resolves_references() {
        let schema = person();
        assert_eq!(schema.property("age"), Some(&json!({"type": "integer"})));
        assert_eq!(schema.property("missing"), None);
    }

    #[test]
    fn test_require_id() {
        let untyped = Schema::compile(json!({"properties": {"_id": {}}})).unwrap();
        assert!(matches!(untyped.require_id(), Err(DbError::InvalidSchema(_))));

        let absent = Schema::compile(json!({"properties": {"name": {"type": "string"}}})).unwrap();
        assert!(matches!(absent.require_id(), Err(DbError::InvalidSchema(_))));

        let nullable = Schema::compile(json!({"properties": {"_id": {"type": ["string", "null"]}}})).unwrap();
        assert!(nullable.require_id().is_ok());
    }

    #[test]
    fn test_structurally_invalid_schemas() {
        let cases = [
            json!("string"),
            json!({"type": "text"}),
            json!({"required": "name"}),
            json!({"properties": []}),
            json!({"properties": {"a": 3}}),
            json!({"minLength": -1}),
            json!({"$ref": "#/definitions/nope"}),
            json!({"$ref": "http://example.com/schema"}),
            json!({"$ref": "#"}),
        ];

        for case in cases {
            assert!(
                matches!(Schema::compile(case.clone()), Err(DbError::InvalidSchema(_))),
                "accepted {case}"
            );
        }
    }

    #[test]
    fn test_nested_arrays_and_enums() {
        let schema = Schema::compile(json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "items": {"type": "string", "maxLength": 3}},
                "color": {"enum": ["red", "green"]},
                "point": {"type": "array", "items": [{"type": "number"}, {"type": "number"}]}
            }
        }))
        .unwrap();

        assert!(schema
            .validate(&json!({"tags": ["a", "bc"], "color": "red", "point": [1, 2.5]}))
            .is_ok());

        let err = schema.validate(&json!({"tags": ["a", "long"]})).unwrap_err();
        assert!(err.starts_with("/tags/1"));
        assert!(schema.validate(&json!({"color": "blue"})).is_err());
        assert!(schema.validate(&json!({"point": [1, "x"]})).is_err());
    }

    #[test]
    fn test_from_json() {
        assert!(Schema::from_json(r#"{"type": "object"}"#).is_ok());
        assert!(matches!(Schema::from_json("{"), Err(DbError::InvalidSchema(_))));
    }

    #[test]
    fn test_unsupported_keywords_are_rejected() {
        let cases = [
            json!({"properties": {"email": {"type": "string", "format": "email"}}}),
            json!({"patternProperties": {"^x": {"type": "string"}}}),
            json!({"if": {"required": ["a"]}, "then": {"required": ["b"]}}),
            json!({"items": {"contains": {"type": "string"}}}),
            json!({"anyOf": [{"dependencies": {"a": ["b"]}}]}),
        ];

        for case in cases {
            let err = Schema::compile(case.clone()).unwrap_err();
            assert!(
                matches!(err, DbError::InvalidSchema(ref reason) if reason.contains("unsupported keyword")),
                "accepted {case}: {err}"
            );
        }

        assert!(Schema::compile(json!({"title": "T", "description": "d", "$comment": "c", "default": {}})).is_ok());
    }

    #[test]
    fn test_string_pattern_and_const() {
        let schema = Schema::compile(json!({
            "type": "object",
            "properties": {
                "_id": {"type": "string"},
                "email": {"type": "string", "pattern": "^[^@]+@[^@]+$"},
                "tags": {"type": "array", "minItems": 1, "uniqueItems": true},
                "kind": {"const": "person"}
            },
            "anyOf": [{"required": ["email"]}]
        }))
        .unwrap();

        let valid = json!({"_id": "a", "email": "a@b", "tags": ["x"], "kind": "person"});
        assert!(schema.validate(&valid).is_ok());

        let bad_email = schema.validate(&json!({"_id": "a", "email": "not-an-email"})).unwrap_err();
        assert!(bad_email.starts_with("/email"));
        let no_tags = schema.validate(&json!({"_id": "a", "email": "a@b", "tags": []})).unwrap_err();
        assert!(no_tags.starts_with("/tags"));
        assert!(schema.validate(&json!({"_id": "a", "email": "a@b", "tags": ["x", "x"]})).is_err());
        assert!(schema.validate(&json!({"_id": "a", "email": "a@b", "kind": "robot"})).is_err());
        assert!(schema.validate(&json!({"_id": "a"})).unwrap_err().contains("anyOf"));

        assert!(matches!(
            Schema::compile(json!({"pattern": "("})),
            Err(DbError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_combinators_and_exclusive_bounds() {
        let schema = Schema::compile(json!({
            "properties": {
                "score": {"exclusiveMinimum": 0, "exclusiveMaximum": 10, "multipleOf": 0.5},
                "legacy": {"minimum": 0, "exclusiveMinimum": true},
                "id": {"oneOf": [{"type": "string"}, {"type": "integer", "minimum": 0}]},
                "name": {"allOf": [{"type": "string"}, {"minLength": 2}], "not": {"const": "root"}},
                "extra": {"type": "object", "minProperties": 1, "maxProperties": 2}
            }
        }))
        .unwrap();

        assert!(schema.validate(&json!({"score": 9.5, "legacy": 1, "id": 3, "name": "ab"})).is_ok());
        assert!(schema.validate(&json!({"score": 0})).is_err());
        assert!(schema.validate(&json!({"score": 10})).is_err());
        assert!(schema.validate(&json!({"score": 1.25})).is_err());
        assert!(schema.validate(&json!({"legacy": 0})).is_err());
        assert!(schema.validate(&json!({"id": -1})).is_err());
        assert!(schema.validate(&json!({"id": true})).is_err());
        assert!(schema.validate(&json!({"name": "a"})).is_err());
        assert!(schema.validate(&json!({"name": "root"})).is_err());
        assert!(schema.validate(&json!({"extra": {}})).is_err());
        assert!(schema.validate(&json!({"extra": {"a": 1, "b": 2, "c": 3}})).is_err());
    }

    #[test]
    fn test_enum_compares_numbers_by_value() {
        let schema = Schema::compile(json!({"enum": [1, "one"]})).unwrap();
        assert!(schema.validate(&json!(1.0)).is_ok());
        assert!(schema.validate(&json!(2)).is_err());
    }

    proptest! {
        #[test]
        fn prop_integer_range(n in -1000i64..1000) {
            let schema = Schema::compile(json!({"type": "integer", "minimum": 0, "maximum": 100})).unwrap();
            prop_assert_eq!(schema.validate(&json!(n)).is_ok(), (0..=100).contains(&n));
        }
    }
}
