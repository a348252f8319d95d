pub mod schema;

// -----------------------------------------------------------------------------

use crate::prelude::{Error, Result};
use chrono::DateTime;
use schema::{Builder, BuilderTable, Entry, Kind, find};
use serde_json::{Map, Value, json};
use std::net::IpAddr;

/// Attributes the server adds to every entity. They never take part in an
/// idempotency comparison and are never sent back.
pub const INTERNAL_ATTRIBUTES: &[&str] = &[
    "last_update_time",
    "creation_time",
    "spec_hash",
    "spec_version",
    "execution_context",
    "owner_reference",
    "links",
    "$reserved",
    "$object_type",
    "$unknown_fields",
];

/// Builds a spec tree from user parameters.
///
/// Parameters are applied in insertion order; the first builder error stops
/// the walk. Parameters without an entry in `table` are left to the caller.
///
/// # Arguments
///
/// * `base`: Starting tree, `{}` on create or a deep clone of the current
///   server spec on update.
/// * `params`: User parameters.
/// * `table`: Builder table of the resource.
///
pub fn generate_spec(base: Value, params: &Map<String, Value>, table: &BuilderTable) -> Result<Value> {
    let mut spec = match base {
        Value::Object(_) => base,
        _ => json!({}),
    };
    for (param, value) in params {
        if value.is_null() {
            continue;
        }
        if let Some(entry) = table.entry(param) {
            apply(entry, &mut spec, value)?;
        }
    }
    Ok(spec)
}

fn apply(entry: &Entry, spec: &mut Value, value: &Value) -> Result<()> {
    match entry.builder {
        Builder::Field { path, kind } => {
            let existing = lookup(spec, path).cloned();
            let built = build_value(entry.param, kind, value, existing)?;
            set_path(spec, path, built);
            Ok(())
        }
        Builder::Custom(build) => build(spec, value),
    }
}

fn build_value(param: &str, kind: Kind, value: &Value, existing: Option<Value>) -> Result<Value> {
    match kind {
        Kind::Scalar => match value {
            Value::Object(_) | Value::Array(_) => {
                Err(Error::Config(format!("'{}' must be a scalar value", param)))
            }
            _ => Ok(value.clone()),
        },
        Kind::Timestamp => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(text) if DateTime::parse_from_rfc3339(text).is_ok() => Ok(value.clone()),
            _ => Err(Error::Config(format!("'{}' must be an ISO-8601 timestamp", param))),
        },
        Kind::IpAddress => build_ip(param, value),
        Kind::Map => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(Error::Config(format!("'{}' must be an object", param))),
        },
        Kind::Object(entries) => {
            let Value::Object(fields) = value else {
                return Err(Error::Config(format!("'{}' must be an object", param)));
            };
            let mut child = match existing {
                Some(existing @ Value::Object(_)) => existing,
                _ => json!({}),
            };
            for (name, field) in fields {
                if field.is_null() {
                    continue;
                }
                let entry = find(entries, name).ok_or_else(|| {
                    Error::Config(format!("unsupported attribute '{}' in '{}'", name, param))
                })?;
                apply(entry, &mut child, field)?;
            }
            Ok(child)
        }
        Kind::List(element) => {
            let Value::Array(items) = value else {
                return Err(Error::Config(format!("'{}' must be a list", param)));
            };
            items
                .iter()
                .map(|item| build_value(param, *element, item, None))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
    }
}

fn build_ip(param: &str, value: &Value) -> Result<Value> {
    let invalid = || Error::Config(format!("'{}' must be an IP address", param));
    let family_of = |address: &str| -> Result<(&'static str, u64)> {
        match address.parse::<IpAddr>().map_err(|_| invalid())? {
            IpAddr::V4(_) => Ok(("ipv4", 32)),
            IpAddr::V6(_) => Ok(("ipv6", 128)),
        }
    };

    match value {
        Value::String(text) => {
            let (address, prefix) = match text.split_once('/') {
                Some((address, prefix)) => (address, Some(prefix.parse::<u64>().map_err(|_| invalid())?)),
                None => (text.as_str(), None),
            };
            let (family, default_prefix) = family_of(address)?;
            Ok(json!({ family: { "value": address, "prefix_length": prefix.unwrap_or(default_prefix) } }))
        }
        Value::Object(fields) => {
            if let Some(address) = fields.get("value").and_then(Value::as_str) {
                let (family, default_prefix) = family_of(address)?;
                let mut inner = fields.clone();
                inner.entry("prefix_length").or_insert(json!(default_prefix));
                return Ok(json!({ family: inner }));
            }
            let mut typed = fields.clone();
            for (family, default_prefix) in [("ipv4", 32), ("ipv6", 128)] {
                if let Some(Value::Object(inner)) = typed.get_mut(family) {
                    inner.entry("prefix_length").or_insert(json!(default_prefix));
                }
            }
            if typed.contains_key("ipv4") || typed.contains_key("ipv6") {
                Ok(Value::Object(typed))
            } else {
                Err(invalid())
            }
        }
        _ => Err(invalid()),
    }
}

// -----------------------------------------------------------------------------

/// Walks a dotted path; numeric segments index into lists.
///
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    })
}

/// Writes `value` at a dotted path, creating intermediate objects.
///
pub fn set_path(tree: &mut Value, path: &str, value: Value) {
    let mut current = tree;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = json!({});
        }
        let Value::Object(fields) = current else {
            return;
        };
        if segments.peek().is_none() {
            fields.insert(segment.to_owned(), value);
            return;
        }
        current = fields.entry(segment).or_insert_with(|| json!({}));
    }
}

/// Removes the attribute at a dotted path. Lists met on the way are walked
/// element by element.
///
pub fn remove_path(tree: &mut Value, path: &str) {
    match tree {
        Value::Array(items) => items.iter_mut().for_each(|item| remove_path(item, path)),
        Value::Object(fields) => match path.split_once('.') {
            None => {
                fields.shift_remove(path);
            }
            Some((head, rest)) => {
                if let Some(child) = fields.get_mut(head) {
                    remove_path(child, rest);
                }
            }
        },
        _ => {}
    }
}

/// Removes server-owned attributes: the global internal set at any depth,
/// then the resource's own read-only paths.
///
pub fn strip_internal_attributes(tree: &mut Value, table: &BuilderTable) {
    strip_keys(tree, INTERNAL_ATTRIBUTES);
    for path in table.read_only {
        remove_path(tree, path);
    }
}

fn strip_keys(tree: &mut Value, keys: &[&str]) {
    match tree {
        Value::Object(fields) => {
            fields.retain(|key, _| !keys.contains(&key.as_str()));
            fields.values_mut().for_each(|child| strip_keys(child, keys));
        }
        Value::Array(items) => items.iter_mut().for_each(|item| strip_keys(item, keys)),
        _ => {}
    }
}

/// Brings a tree into the canonical form used for comparison.
///
/// Integral floats become integers, IP objects get their default prefix
/// length, and nulls and empty objects are pruned. Strings are left alone;
/// timestamps are canonicalized by [`is_unchanged`] at the paths the builder
/// table declares as [`Kind::Timestamp`].
///
pub fn normalize(tree: Value) -> Value {
    match tree {
        Value::Object(fields) => {
            let mut normalized: Map<String, Value> = fields
                .into_iter()
                .map(|(key, child)| (key, normalize(child)))
                .filter(|(_, child)| match child {
                    Value::Null => false,
                    Value::Object(inner) => !inner.is_empty(),
                    _ => true,
                })
                .collect();
            let default_prefix = normalized
                .get("value")
                .and_then(Value::as_str)
                .and_then(|address| address.parse::<IpAddr>().ok())
                .map(|address| if address.is_ipv4() { 32 } else { 128 });
            if let Some(prefix) = default_prefix {
                normalized.entry("prefix_length").or_insert(json!(prefix));
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() && float.fract() == 0.0 => json!(float as i64),
            _ => Value::Number(number),
        },
        other => other,
    }
}

/// Whether applying `desired` would leave `current` as it is.
///
pub fn is_unchanged(desired: &Value, current: &Value, table: &BuilderTable) -> bool {
    let mut timestamps = Vec::new();
    timestamp_paths(table.entries, "", &mut timestamps);
    let canonical = |tree: &Value| {
        let mut tree = tree.clone();
        strip_internal_attributes(&mut tree, table);
        for path in table.ignored {
            remove_path(&mut tree, path);
        }
        for path in &timestamps {
            to_epoch_seconds(&mut tree, path);
        }
        normalize(tree)
    };
    canonical(desired) == canonical(current)
}

/// Collects the dotted paths of every [`Kind::Timestamp`] field reachable
/// through the table's field builders.
///
fn timestamp_paths(entries: &[Entry], prefix: &str, paths: &mut Vec<String>) {
    for entry in entries {
        if let Builder::Field { path, kind } = entry.builder {
            let full = match prefix {
                "" => path.to_string(),
                _ => format!("{}.{}", prefix, path),
            };
            kind_timestamp_paths(kind, full, paths);
        }
    }
}

fn kind_timestamp_paths(kind: Kind, path: String, paths: &mut Vec<String>) {
    match kind {
        Kind::Timestamp => paths.push(path),
        Kind::Object(children) => timestamp_paths(children, &path, paths),
        // List elements sit at the list's own path; arrays are walked on conversion.
        Kind::List(element) => kind_timestamp_paths(*element, path, paths),
        _ => {}
    }
}

/// Rewrites RFC 3339 strings at a dotted path as integer epoch seconds.
/// Lists met on the way are walked element by element.
///
fn to_epoch_seconds(tree: &mut Value, path: &str) {
    match tree {
        Value::Array(items) => items.iter_mut().for_each(|item| to_epoch_seconds(item, path)),
        Value::Object(fields) => match path.split_once('.') {
            None => {
                if let Some(value) = fields.get_mut(path) {
                    epoch_seconds(value);
                }
            }
            Some((head, rest)) => {
                if let Some(child) = fields.get_mut(head) {
                    to_epoch_seconds(child, rest);
                }
            }
        },
        _ => {}
    }
}

fn epoch_seconds(value: &mut Value) {
    if let Value::Array(items) = value {
        items.iter_mut().for_each(epoch_seconds);
        return;
    }
    let seconds = value
        .as_str()
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|timestamp| timestamp.timestamp());
    if let Some(seconds) = seconds {
        *value = json!(seconds);
    }
}

// -----------------------------------------------------------------------------

/// Converts object keys to camelCase for the v4 wire format.
///
/// Keys starting with `$` are kept verbatim together with their values.
///
pub fn to_camel_case_keys(tree: Value) -> Value {
    convert_keys(tree, &camel_case)
}

/// Converts object keys of a v4 response to snake_case.
///
pub fn to_snake_case_keys(tree: Value) -> Value {
    convert_keys(tree, &snake_case)
}

fn convert_keys(tree: Value, convert: &dyn Fn(&str) -> String) -> Value {
    match tree {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, child)| {
                    if key.starts_with('$') {
                        (key, child)
                    } else {
                        (convert(&key), convert_keys(child, convert))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|item| convert_keys(item, convert)).collect()),
        other => other,
    }
}

fn camel_case(key: &str) -> String {
    let mut parts = key.split('_').filter(|part| !part.is_empty());
    let mut camel = parts.next().unwrap_or_default().to_owned();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            camel.extend(first.to_uppercase());
            camel.push_str(chars.as_str());
        }
    }
    camel
}

fn snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut snake = String::with_capacity(key.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let previous = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match previous {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) => p.is_uppercase() && next.is_some_and(|n| n.is_lowercase()),
            };
            if boundary {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(*c);
        }
    }
    snake
}
