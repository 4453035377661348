//! Form validation for catalog entities.
//!
//! Each entity has a rule set keyed by its lifecycle status (and, for plans, its billing type).
//! Drafts only need a name; anything further along the lifecycle must carry the fields that
//! make it usable by buyers. Validators are pure: they take the full merged record, collect
//! every problem into a [`FieldErrors`] map and never touch the database.
//!
//! JSON-bearing fields (endpoint schemas, group injection config) may arrive either as JSON
//! objects or as JSON text. Validators canonicalize them in place so that what is persisted is
//! always an object.

pub mod endpoints;
pub mod groups;
pub mod plans;
pub mod products;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

pub use endpoints::validate_endpoint;
pub use groups::validate_group;
pub use plans::validate_plan;
pub use products::validate_product;

/// Field-keyed validation messages. Only the first problem per field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    /// Fold another map in; messages already present here win
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.0.entry(field).or_insert(message);
        }
    }

    /// `Ok(())` when no errors were collected
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "{}", fields.join(", "))
    }
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

pub(crate) fn require_text(errors: &mut FieldErrors, field: &str, value: Option<&str>, label: &str) {
    if is_blank(value) {
        errors.add(field, format!("{label} is required"));
    }
}

pub(crate) fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "Name is required");
    } else if name.chars().count() > MAX_NAME_LENGTH {
        errors.add("name", format!("Name must be at most {MAX_NAME_LENGTH} characters"));
    }
}

pub(crate) const MAX_NAME_LENGTH: usize = 120;

/// Checks that `url` is an absolute http(s) URL
pub(crate) fn check_http_url(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        return;
    };
    match url::Url::parse(raw.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
        _ => errors.add(field, "Must be a valid http or https URL"),
    }
}

/// Parse JSON text into an object in place. Objects pass through; blank strings become `None`.
pub(crate) fn canonicalize_json_object(errors: &mut FieldErrors, field: &str, value: &mut Option<Value>) {
    let parsed = match value.take() {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if text.trim().is_empty() => None,
        Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                errors.add(field, format!("Invalid JSON: {e}"));
                *value = Some(Value::String(text));
                return;
            }
        },
        Some(other) => Some(other),
    };

    match parsed {
        Some(Value::Object(map)) => *value = Some(Value::Object(map)),
        Some(other) => {
            errors.add(field, "Must be a JSON object");
            *value = Some(other);
        }
        None => *value = None,
    }
}
