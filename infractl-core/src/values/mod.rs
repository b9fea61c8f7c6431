use std::fmt::{Debug, Formatter};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod gitlab;
pub mod openldap;

#[derive(Debug, Error)]
pub enum ValuesError {
    #[error("Couldn't build chart values! Reason: {}", .0)]
    Build(serde_json::Error),
    #[error("Couldn't serialize chart values! Reason: {}", .0)]
    Serialize(serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PullPolicy {
    Always,
    IfNotPresent,
    Never,
}

/// `repository` / `tag` / `pullPolicy` triple used by most charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageValues {
    pub repository: &'static str,
    pub tag: &'static str,
    pub pull_policy: PullPolicy,
}

impl ImageValues {
    /// Cached images are used as-is, so air-gapped clusters work after a preload.
    pub const fn cached(repository: &'static str, tag: &'static str) -> Self {
        Self {
            repository,
            tag,
            pull_policy: PullPolicy::IfNotPresent,
        }
    }
}

/// A chart component that's only configured through its image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOnly {
    pub image: ImageValues,
}

/// The nested parameter tree handed to the package manager.
///
/// Built once per install from a typed schema and never mutated afterwards. Leaves routinely
/// hold credentials, `Debug` only shows the key paths.
#[derive(Clone, PartialEq)]
pub struct ServiceValues(Value);

impl ServiceValues {
    pub fn from_schema(schema: &impl Serialize) -> Result<Self, ValuesError> {
        serde_json::to_value(schema)
            .map(Self)
            .map_err(ValuesError::Build)
    }

    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.0, |node, key| node.as_object()?.get(*key))
    }

    /// Dot-joined paths of every leaf, in key order.
    pub fn key_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_key_paths(&self.0, &mut String::new(), &mut paths);
        paths
    }

    pub fn to_yaml(&self) -> Result<String, ValuesError> {
        serde_yaml::to_string(&self.0).map_err(ValuesError::Serialize)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Debug for ServiceValues {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ServiceValues")
            .field(&self.key_paths())
            .finish()
    }
}

fn collect_key_paths(node: &Value, prefix: &mut String, paths: &mut Vec<String>) {
    match node {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let previous_len = prefix.len();

                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(key);
                collect_key_paths(child, prefix, paths);
                prefix.truncate(previous_len);
            }
        }
        _ => paths.push(prefix.to_owned()),
    }
}
