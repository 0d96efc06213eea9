//! Conditional `exports` / `imports` matching.
//!
//! Targets may be a string, an array of fallbacks, or a conditions object.
//! Condition objects are visited in declaration order and the first key that
//! is `default` or one of the active conditions wins. Subpath maps support
//! exact keys and single-`*` pattern keys; the pattern with the longest
//! literal prefix wins.

use log::trace;
use serde_json::{Map, Value};

const DEFAULT_CONDITION: &str = "default";

/// Every candidate path a target resolves to under `conditions`, in priority order.
pub fn resolve_target(target: &Value, conditions: &[&str]) -> Vec<String> {
    match target {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => {
            items.iter().flat_map(|item| resolve_target(item, conditions)).collect()
        }
        Value::Object(obj) => {
            for (condition, value) in obj {
                if condition == DEFAULT_CONDITION || conditions.contains(&condition.as_str()) {
                    trace!("Matched condition '{}'", condition);
                    let candidates = resolve_target(value, conditions);
                    if !candidates.is_empty() {
                        return candidates;
                    }
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Looks up `key` in a subpath map (exact key first, then patterns) and
/// returns the candidates with any `*` substituted.
pub fn resolve_subpath_map(map: &Map<String, Value>, key: &str, conditions: &[&str]) -> Vec<String> {
    if let Some(target) = map.get(key) {
        trace!("Exact subpath match for '{}'", key);
        return resolve_target(target, conditions);
    }

    let Some((pattern, star_value)) = best_pattern_match(map, key) else {
        trace!("No subpath match for '{}'", key);
        return Vec::new();
    };
    trace!("Pattern '{}' matched '{}' with '{}'", pattern, key, star_value);

    map.get(pattern)
        .map(|target| resolve_target(target, conditions))
        .unwrap_or_default()
        .into_iter()
        .map(|candidate| candidate.replace('*', star_value))
        .collect()
}

/// Resolves a package subpath (`None` for the package root) through `exports`.
pub fn resolve_exports(exports: &Value, subpath: Option<&str>, conditions: &[&str]) -> Vec<String> {
    let key = subpath.unwrap_or(".");
    match exports.as_object() {
        Some(obj) if has_subpath_keys(obj) => resolve_subpath_map(obj, key, conditions),
        // String, array or a root-level conditions object only export "."
        _ if key == "." => resolve_target(exports, conditions),
        _ => Vec::new(),
    }
}

/// Resolves a `#`-prefixed specifier through an `imports` map.
pub fn resolve_imports(imports: &Value, specifier: &str, conditions: &[&str]) -> Vec<String> {
    if !specifier.starts_with('#') {
        return Vec::new();
    }
    imports
        .as_object()
        .map(|map| resolve_subpath_map(map, specifier, conditions))
        .unwrap_or_default()
}

fn has_subpath_keys(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|k| k.starts_with('.'))
}

fn best_pattern_match<'a>(map: &'a Map<String, Value>, key: &'a str) -> Option<(&'a str, &'a str)> {
    map.keys()
        .filter_map(|pattern| {
            let (prefix, suffix) = pattern.split_once('*')?;
            if suffix.contains('*') {
                return None;
            }
            let star_value = key.strip_prefix(prefix)?.strip_suffix(suffix)?;
            if star_value.is_empty() {
                return None;
            }
            Some((pattern.as_str(), prefix.len(), star_value))
        })
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.len().cmp(&b.0.len())))
        .map(|(pattern, _, star_value)| (pattern, star_value))
}
