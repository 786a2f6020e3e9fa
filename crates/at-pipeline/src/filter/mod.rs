//! Rule-based file filtering
//!
//! The configuration document maps a media type to an ordered list of
//! attribute rules:
//!
//! ```yaml
//! movie:
//!   resolution:
//!     nullable: false
//!     allowed_values: [1080p, 2160p]
//!   release_year:
//!     min: 1900
//! ```
//!
//! Rules are evaluated in document order and the first violation becomes the
//! rejection reason. Media types without an entry pass through.

use crate::error::{PipelineError, PipelineResult};
use at_common::types::{FieldValue, MediaItem, MediaType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Constraint on one attribute
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRule {
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub allowed_values: Option<Vec<serde_yaml::Value>>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

fn default_nullable() -> bool {
    true
}

impl FieldRule {
    /// First failure message for `value`, if any
    pub fn check(&self, key: &str, value: Option<&FieldValue>) -> Option<String> {
        let Some(value) = value else {
            return (!self.nullable).then(|| format!("{} is null", key));
        };

        if let Some(allowed) = &self.allowed_values {
            if !allowed.iter().any(|candidate| matches_value(candidate, value)) {
                return Some(format!("{} {} is not in allowed_values", key, value));
            }
        }

        if let FieldValue::Number(n) = value {
            if let Some(min) = self.min {
                if *n < min {
                    return Some(format!("{} {} is below min {}", key, value, min));
                }
            }
            if let Some(max) = self.max {
                if *n > max {
                    return Some(format!("{} {} is above max {}", key, value, max));
                }
            }
        }

        None
    }
}

fn matches_value(candidate: &serde_yaml::Value, value: &FieldValue) -> bool {
    match (candidate, value) {
        (serde_yaml::Value::String(s), FieldValue::Text(t)) => s == t,
        (serde_yaml::Value::Number(n), FieldValue::Number(v)) => n.as_f64() == Some(*v),
        (serde_yaml::Value::String(s), FieldValue::Number(v)) => s.parse::<f64>().ok() == Some(*v),
        (serde_yaml::Value::Number(n), FieldValue::Text(t)) => n.to_string() == *t,
        _ => false,
    }
}

/// Per-media-type rule lists, in document order
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    rules: HashMap<MediaType, Vec<(String, FieldRule)>>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let movie = vec![
            (
                "resolution".to_string(),
                FieldRule {
                    nullable: false,
                    allowed_values: Some(vec!["1080p".into(), "2160p".into()]),
                    ..FieldRule::default()
                },
            ),
            (
                "upload_type".to_string(),
                FieldRule {
                    nullable: true,
                    allowed_values: Some(
                        ["BluRay", "WEB-DL", "WEBRip", "WEB", "AMZN", "ATVP", "HMAX", "MAX", "HULU"]
                            .into_iter()
                            .map(Into::into)
                            .collect(),
                    ),
                    ..FieldRule::default()
                },
            ),
            (
                "media_title".to_string(),
                FieldRule {
                    nullable: false,
                    ..FieldRule::default()
                },
            ),
            (
                "release_year".to_string(),
                FieldRule {
                    nullable: false,
                    min: Some(1900.0),
                    ..FieldRule::default()
                },
            ),
        ];

        Self {
            rules: HashMap::from([(MediaType::Movie, movie)]),
        }
    }
}

impl FilterConfig {
    /// Parse a filter document; key order is preserved
    pub fn from_yaml(text: &str) -> PipelineResult<Self> {
        let doc: serde_yaml::Mapping = serde_yaml::from_str(text)?;
        let mut rules = HashMap::new();

        for (type_key, fields) in doc {
            let type_name = type_key
                .as_str()
                .ok_or_else(|| PipelineError::config("filter config keys must be media types"))?;
            let media_type: MediaType = type_name.parse()?;

            let fields: serde_yaml::Mapping = match fields {
                serde_yaml::Value::Null => serde_yaml::Mapping::new(),
                other => serde_yaml::from_value(other)?,
            };

            let mut list = Vec::with_capacity(fields.len());
            for (field_key, rule) in fields {
                let field = field_key.as_str().ok_or_else(|| {
                    PipelineError::config(format!("non-string attribute key under {}", type_name))
                })?;
                let rule: FieldRule = match rule {
                    serde_yaml::Value::Null => FieldRule {
                        nullable: true,
                        ..FieldRule::default()
                    },
                    other => serde_yaml::from_value(other)?,
                };
                list.push((field.to_string(), rule));
            }
            rules.insert(media_type, list);
        }

        Ok(Self { rules })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read filter config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    pub fn rules_for(&self, media_type: MediaType) -> &[(String, FieldRule)] {
        self.rules.get(&media_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First rule violation for `item`, or `None` when it passes
    pub fn evaluate(&self, item: &MediaItem) -> Option<String> {
        self.rules_for(item.media_type)
            .iter()
            .find_map(|(key, rule)| rule.check(key, item.field(key).as_ref()))
    }

    /// Record the filter outcome on the row. Override rows are not evaluated.
    pub fn apply(&self, item: &mut MediaItem) {
        if item.is_override() {
            return;
        }
        match self.evaluate(item) {
            Some(reason) => {
                item.reject(reason);
            }
            None => item.accept(),
        }
    }
}
