//! Response combiner registry.
//!
//! # Combiners
//! - `default`: merge every part's data in order; complete only when every
//!   expected part arrived complete
//! - `default-debug`: `default`, plus one log line per part
//! - `first-error`: the first part with a non-success status, verbatim;
//!   otherwise `default`
//!
//! # Design Decisions
//! - Built once at startup through [`RegistryBuilder`]; read-only afterwards
//! - Parts arrive in backend declaration order, so "first" is positional
//! - Unknown names fail endpoint setup, never a request

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::proxy::response::ProxyResponse;

/// Reduces `parts` (at most `total` of them) into one response.
pub type Combiner = Arc<dyn Fn(usize, Vec<ProxyResponse>) -> ProxyResponse + Send + Sync>;

pub const DEFAULT_COMBINER: &str = "default";
pub const DEBUG_COMBINER: &str = "default-debug";
pub const FIRST_ERROR_COMBINER: &str = "first-error";

/// Immutable name → combiner lookup.
#[derive(Clone)]
pub struct CombinerRegistry {
    combiners: HashMap<String, Combiner>,
}

impl CombinerRegistry {
    /// Builder preloaded with the built-in combiners.
    pub fn builder() -> RegistryBuilder {
        let mut combiners: HashMap<String, Combiner> = HashMap::new();
        combiners.insert(DEFAULT_COMBINER.to_string(), Arc::new(combine_data));
        combiners.insert(DEBUG_COMBINER.to_string(), Arc::new(debug_default));
        combiners.insert(FIRST_ERROR_COMBINER.to_string(), Arc::new(first_error));
        RegistryBuilder { combiners }
    }

    pub fn get(&self, name: &str) -> Result<Combiner, ConfigError> {
        self.combiners
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownCombiner(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.combiners.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CombinerRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Collects registrations before the registry is frozen.
pub struct RegistryBuilder {
    combiners: HashMap<String, Combiner>,
}

impl RegistryBuilder {
    /// Register a combiner; names can be registered once.
    pub fn register<F>(mut self, name: impl Into<String>, combiner: F) -> Result<Self, ConfigError>
    where
        F: Fn(usize, Vec<ProxyResponse>) -> ProxyResponse + Send + Sync + 'static,
    {
        let name = name.into();
        if self.combiners.contains_key(&name) {
            return Err(ConfigError::DuplicateCombiner(name));
        }
        self.combiners.insert(name, Arc::new(combiner));
        Ok(self)
    }

    pub fn build(self) -> CombinerRegistry {
        CombinerRegistry {
            combiners: self.combiners,
        }
    }
}

/// Merge parts in order; later keys overwrite earlier ones.
///
/// The result keeps the first part's metadata. A raw body survives only
/// when a single part arrived.
pub fn combine_data(total: usize, parts: Vec<ProxyResponse>) -> ProxyResponse {
    let mut is_complete = parts.len() == total;
    let mut merged: Option<ProxyResponse> = None;

    for part in parts {
        is_complete = is_complete && part.is_complete;
        match merged.as_mut() {
            None => merged = Some(part),
            Some(acc) => {
                acc.io = None;
                acc.data.extend(part.data);
            }
        }
    }

    let mut merged = merged.unwrap_or_default();
    merged.is_complete = is_complete;
    merged
}

fn debug_default(total: usize, parts: Vec<ProxyResponse>) -> ProxyResponse {
    for (index, part) in parts.iter().enumerate() {
        tracing::info!(index, status = part.metadata.status_code, "Combining response part");
    }
    combine_data(total, parts)
}

fn first_error(total: usize, mut parts: Vec<ProxyResponse>) -> ProxyResponse {
    let position = parts.iter().position(|part| {
        let status = part.metadata.status_code;
        status != 0 && status != 200 && status != 201
    });
    match position {
        Some(index) => parts.swap_remove(index),
        None => combine_data(total, parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn part(status: u16, value: Value) -> ProxyResponse {
        match value {
            Value::Object(data) => ProxyResponse::new(status, data),
            _ => unreachable!(),
        }
    }

    fn registry() -> CombinerRegistry {
        CombinerRegistry::default()
    }

    #[test]
    fn test_first_error_returns_failing_part_verbatim() {
        let combine = registry().get(FIRST_ERROR_COMBINER).unwrap();
        let failing = part(503, json!({"error": "down"}));
        let out = combine(
            3,
            vec![
                part(200, json!({"a": 1})),
                failing.clone(),
                part(200, json!({"b": 2})),
            ],
        );
        assert_eq!(out, failing);
    }

    #[test]
    fn test_first_error_picks_earliest() {
        let combine = registry().get(FIRST_ERROR_COMBINER).unwrap();
        let out = combine(
            3,
            vec![
                part(201, json!({})),
                part(404, json!({"which": "first"})),
                part(500, json!({"which": "second"})),
            ],
        );
        assert_eq!(out.metadata.status_code, 404);
        assert_eq!(out.data["which"], "first");
    }

    #[test]
    fn test_first_error_falls_back_to_merge() {
        let combine = registry().get(FIRST_ERROR_COMBINER).unwrap();
        let unknown = part(0, json!({"c": 3}));
        let out = combine(
            3,
            vec![part(200, json!({"a": 1})), part(201, json!({"b": 2})), unknown],
        );
        assert!(out.is_complete);
        assert_eq!(Value::Object(out.data), json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(out.metadata.status_code, 200);
    }

    #[test]
    fn test_default_and_debug_agree() {
        let reg = registry();
        let parts = vec![
            part(200, json!({"a": 1, "shared": "first"})),
            part(404, json!({"b": 2, "shared": "second"})),
        ];
        let plain = reg.get(DEFAULT_COMBINER).unwrap()(3, parts.clone());
        let debug = reg.get(DEBUG_COMBINER).unwrap()(3, parts);
        assert_eq!(plain, debug);
        assert_eq!(plain.data["shared"], "second");
    }

    #[test]
    fn test_missing_parts_are_incomplete() {
        let combine = registry().get(DEFAULT_COMBINER).unwrap();
        let out = combine(3, vec![part(200, json!({"a": 1})), part(200, json!({"b": 2}))]);
        assert!(!out.is_complete);
        assert_eq!(out.data.len(), 2);

        let empty = combine(2, Vec::new());
        assert!(!empty.is_complete);
        assert!(empty.data.is_empty());
    }

    #[test]
    fn test_incomplete_part_taints_result() {
        let mut partial = part(200, json!({"b": 2}));
        partial.is_complete = false;
        let out = combine_data(2, vec![part(200, json!({"a": 1})), partial]);
        assert!(!out.is_complete);
    }

    #[test]
    fn test_merge_keeps_arrival_order() {
        let out = combine_data(
            2,
            vec![part(200, json!({"z": 1, "m": 2})), part(200, json!({"a": 3}))],
        );
        let keys: Vec<&str> = out.data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_unknown_and_duplicate_names() {
        assert!(matches!(
            registry().get("nope"),
            Err(ConfigError::UnknownCombiner(name)) if name == "nope"
        ));
        assert!(matches!(
            CombinerRegistry::builder().register(DEFAULT_COMBINER, combine_data),
            Err(ConfigError::DuplicateCombiner(_))
        ));

        let reg = CombinerRegistry::builder()
            .register("last", |_total, mut parts: Vec<ProxyResponse>| {
                parts.pop().unwrap_or_default()
            })
            .unwrap()
            .build();
        assert!(reg.names().contains(&"last"));
    }

    #[test]
    fn test_raw_body_dropped_when_parts_merge() {
        let raw = ProxyResponse {
            io: Some(bytes::Bytes::from_static(b"id,name\n")),
            ..part(200, json!({}))
        };

        let single = combine_data(1, vec![raw.clone()]);
        assert!(single.io.is_some());

        let merged = combine_data(2, vec![raw, part(200, json!({"b": 2}))]);
        assert!(merged.io.is_none());
        assert_eq!(merged.data["b"], 2);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_debug_combiner_logs_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let combine = registry().get(DEBUG_COMBINER).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            combine(2, vec![part(200, json!({"a": 1})), part(404, json!({}))]);
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("Combining response part").count(), 2);
        assert!(logs.contains("status=404"));
    }
}
