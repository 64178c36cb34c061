use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Namespace {
    pub fn new(
        name: impl Into<String>,
        annotations: BTreeMap<String, String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            labels,
            annotations,
            created_at: Utc::now(),
        }
    }

    /// Desired annotations that are missing here or carry another value.
    pub fn annotation_drift(
        &self,
        desired: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        desired
            .iter()
            .filter(|(k, v)| self.annotations.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn drift_detects_missing_and_changed_keys() {
        let ns = Namespace::new("user-a", map(&[("a", "1"), ("b", "2")]), BTreeMap::new());
        let drift = ns.annotation_drift(&map(&[("a", "1"), ("b", "3"), ("c", "4")]));
        assert_eq!(drift, map(&[("b", "3"), ("c", "4")]));
    }

    #[test]
    fn no_drift_for_subset_or_empty() {
        let ns = Namespace::new("user-a", map(&[("a", "1"), ("b", "2")]), BTreeMap::new());
        assert!(ns.annotation_drift(&map(&[("a", "1")])).is_empty());
        assert!(ns.annotation_drift(&BTreeMap::new()).is_empty());
    }
}
