use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use pkg_constants::onboarding::LAST_LOGIN_ANNOTATION;
use pkg_types::config::AnnotationConfig;
use pkg_types::identity::Identity;

/// Builds the annotations an onboarded namespace should carry.
pub struct NamespaceAnnotator {
    config: AnnotationConfig,
}

impl NamespaceAnnotator {
    pub fn new(config: AnnotationConfig) -> Self {
        Self { config }
    }

    /// Static annotations, then the last-login timestamp (Unix millis), then
    /// the configured identity attributes. Later entries win on key clashes.
    /// Attributes the identity does not carry are skipped.
    pub fn desired(&self, identity: &Identity, now: DateTime<Utc>) -> BTreeMap<String, String> {
        if !self.config.enabled {
            return BTreeMap::new();
        }

        let mut annotations = self.config.static_annotations.clone();

        if self.config.last_login_timestamp {
            annotations.insert(
                LAST_LOGIN_ANNOTATION.to_string(),
                now.timestamp_millis().to_string(),
            );
        }

        for key in &self.config.user_attributes {
            if let Some(value) = identity.attribute(key) {
                annotations.insert(key.clone(), value.to_string());
            }
        }

        annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pkg_types::identity::AttributeValue;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn disabled_yields_nothing() {
        let annotator = NamespaceAnnotator::new(AnnotationConfig {
            enabled: false,
            static_annotations: BTreeMap::from([("team".to_string(), "data".to_string())]),
            last_login_timestamp: true,
            user_attributes: vec!["email".to_string()],
        });
        assert!(annotator.desired(&Identity::new("alice"), now()).is_empty());
    }

    #[test]
    fn static_timestamp_and_attributes() {
        let annotator = NamespaceAnnotator::new(AnnotationConfig {
            enabled: true,
            static_annotations: BTreeMap::from([("team".to_string(), "data".to_string())]),
            last_login_timestamp: true,
            user_attributes: vec!["email".to_string(), "missing".to_string()],
        });
        let identity = Identity::new("alice")
            .with_attribute("email", AttributeValue::String("alice@example.org".to_string()));

        let annotations = annotator.desired(&identity, now());
        assert_eq!(annotations["team"], "data");
        assert_eq!(annotations[LAST_LOGIN_ANNOTATION], "1700000000123");
        assert_eq!(annotations["email"], "alice@example.org");
        assert!(!annotations.contains_key("missing"));
    }

    #[test]
    fn non_string_attributes_are_rendered() {
        let annotator = NamespaceAnnotator::new(AnnotationConfig {
            enabled: true,
            user_attributes: vec!["uid".to_string(), "tags".to_string()],
            ..Default::default()
        });
        let identity = Identity::new("alice")
            .with_attribute("uid", AttributeValue::Integer(1001))
            .with_attribute(
                "tags",
                AttributeValue::List(vec!["a".to_string(), "b".to_string()]),
            );

        let annotations = annotator.desired(&identity, now());
        assert_eq!(annotations["uid"], "1001");
        assert_eq!(annotations["tags"], "a,b");
        assert!(!annotations.contains_key(LAST_LOGIN_ANNOTATION));
    }
}
