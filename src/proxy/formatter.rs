//! Entity formatting: per-backend field projection of decoded data.
//!
//! # Order of Operations
//! ```text
//! target (extract a nested object)
//!     → allow (keep listed fields) or deny (drop listed fields)
//!     → mapping (rename top-level fields)
//!     → group (wrap everything under one key)
//! ```
//!
//! Field paths are dotted (`user.address.city`) and walk nested objects.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::config::BackendConfig;
use crate::proxy::response::ProxyResponse;

/// Reshapes the data of a decoded response.
pub trait EntityFormatter: Send + Sync {
    fn format(&self, response: ProxyResponse) -> ProxyResponse;
}

/// Leaves responses untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFormatter;

impl EntityFormatter for IdentityFormatter {
    fn format(&self, response: ProxyResponse) -> ProxyResponse {
        response
    }
}

/// Formatter driven by a backend's `target`, `allow`, `deny`, `mapping` and `group`.
#[derive(Debug, Clone, Default)]
pub struct BackendFormatter {
    target: Option<Vec<String>>,
    allow: Vec<Vec<String>>,
    deny: Vec<Vec<String>>,
    mapping: HashMap<String, String>,
    group: Option<String>,
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

impl BackendFormatter {
    pub fn from_config(backend: &BackendConfig) -> Self {
        Self {
            target: backend
                .target
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(split_path),
            allow: backend.allow.iter().map(|p| split_path(p)).collect(),
            deny: backend.deny.iter().map(|p| split_path(p)).collect(),
            mapping: backend.mapping.clone(),
            group: backend.group.clone().filter(|g| !g.is_empty()),
        }
    }

    /// True when formatting would leave every response unchanged.
    pub fn is_identity(&self) -> bool {
        self.target.is_none()
            && self.allow.is_empty()
            && self.deny.is_empty()
            && self.mapping.is_empty()
            && self.group.is_none()
    }

    fn extract_target(&self, data: &mut Map<String, Value>, target: &[String]) {
        let extracted = match take_path(data, target) {
            Some(Value::Object(inner)) => inner,
            _ => Map::new(),
        };
        *data = extracted;
    }

    fn apply_allow(&self, data: Map<String, Value>) -> Map<String, Value> {
        let mut kept = Map::new();
        for path in &self.allow {
            if let Some(value) = get_path(&data, path) {
                insert_path(&mut kept, path, value.clone());
            }
        }
        kept
    }

    fn apply_deny(&self, data: &mut Map<String, Value>) {
        for path in &self.deny {
            take_path(data, path);
        }
    }

    fn apply_mapping(&self, data: &mut Map<String, Value>) {
        for (from, to) in &self.mapping {
            if let Some(value) = data.remove(from) {
                data.insert(to.clone(), value);
            }
        }
    }
}

impl EntityFormatter for BackendFormatter {
    fn format(&self, mut response: ProxyResponse) -> ProxyResponse {
        if let Some(target) = &self.target {
            self.extract_target(&mut response.data, target);
        }
        if !response.data.is_empty() {
            if !self.allow.is_empty() {
                response.data = self.apply_allow(std::mem::take(&mut response.data));
            } else if !self.deny.is_empty() {
                self.apply_deny(&mut response.data);
            }
        }
        if !response.data.is_empty() {
            self.apply_mapping(&mut response.data);
        }
        if let Some(group) = &self.group {
            let inner = std::mem::take(&mut response.data);
            response.data.insert(group.clone(), Value::Object(inner));
        }
        response
    }
}

fn get_path<'a>(data: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = data.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Object(inner) => get_path(inner, rest),
        _ => None,
    }
}

fn take_path(data: &mut Map<String, Value>, path: &[String]) -> Option<Value> {
    let (first, rest) = path.split_first()?;
    if rest.is_empty() {
        return data.remove(first);
    }
    match data.get_mut(first) {
        Some(Value::Object(inner)) => take_path(inner, rest),
        _ => None,
    }
}

fn insert_path(data: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        data.insert(first.clone(), value);
        return;
    }
    let entry = data
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(inner) = entry {
        insert_path(inner, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> ProxyResponse {
        match value {
            Value::Object(data) => ProxyResponse::new(200, data),
            _ => unreachable!(),
        }
    }

    fn backend() -> BackendConfig {
        BackendConfig::new("http://127.0.0.1:9000", "/")
    }

    #[test]
    fn test_target_then_allow() {
        let mut cfg = backend();
        cfg.target = Some("payload.user".into());
        cfg.allow = vec!["name".into(), "address.city".into()];
        let formatter = BackendFormatter::from_config(&cfg);

        let out = formatter.format(response(json!({
            "payload": {"user": {"name": "ada", "age": 36, "address": {"city": "London", "zip": "N1"}}}
        })));
        assert_eq!(Value::Object(out.data), json!({"name": "ada", "address": {"city": "London"}}));
        assert_eq!(out.metadata.status_code, 200);
    }

    #[test]
    fn test_missing_target_empties_data() {
        let mut cfg = backend();
        cfg.target = Some("nope".into());
        let out = BackendFormatter::from_config(&cfg).format(response(json!({"a": 1})));
        assert!(out.data.is_empty());
    }

    #[test]
    fn test_deny_mapping_group() {
        let mut cfg = backend();
        cfg.deny = vec!["secret".into(), "meta.internal".into()];
        cfg.mapping.insert("id".into(), "user_id".into());
        cfg.group = Some("user".into());
        let out = BackendFormatter::from_config(&cfg).format(response(json!({
            "id": 7, "secret": "x", "meta": {"internal": true, "v": 2}
        })));
        assert_eq!(
            Value::Object(out.data),
            json!({"user": {"user_id": 7, "meta": {"v": 2}}})
        );
    }

    #[test]
    fn test_allow_wins_over_deny() {
        let mut cfg = backend();
        cfg.allow = vec!["a".into()];
        cfg.deny = vec!["a".into()];
        let out = BackendFormatter::from_config(&cfg).format(response(json!({"a": 1, "b": 2})));
        assert_eq!(Value::Object(out.data), json!({"a": 1}));
    }
}
