//! Form validation state.
//!
//! A [`Schema`] declares the fields of a form and the rules each value must
//! satisfy. [`FormState`] holds the current values together with a
//! per-field [`FieldStatus`] and offers the input/blur hooks a form widget
//! calls while the user types.
//!
//! # Example
//!
//! ```
//! use common_hooks::form_state::{FormState, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .field("name")
//!         .required("Name is required")
//!     .field("email")
//!         .required("Email is required")
//!         .email("Invalid email format");
//!
//! let form = FormState::new(schema, json!({ "name": "Ada" }));
//!
//! form.on_blur("email", "not-an-email");
//! assert!(form.aria_invalid("email"));
//!
//! form.on_input("email", "ada@example.com");
//! assert!(!form.aria_invalid("email"));
//! assert!(form.validate_all().is_valid());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::FormError;
use crate::reactive::{Effect, batch};
use crate::state::State;

type Rule = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Form values keyed by field name.
pub type FormValues = BTreeMap<String, Value>;

// =============================================================================
// Schema
// =============================================================================

struct FieldEntry {
    name: String,
    rules: Vec<Rule>,
}

impl FieldEntry {
    /// Every message of every failing rule, in declaration order.
    fn check(&self, value: &Value) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|rule| rule(value).err())
            .collect()
    }
}

/// Declared fields of a form and the rules for each.
#[derive(Default)]
pub struct Schema {
    fields: Vec<FieldEntry>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field and start attaching rules to it.
    pub fn field(mut self, name: impl Into<String>) -> FieldBuilder {
        self.fields.push(FieldEntry {
            name: name.into(),
            rules: Vec::new(),
        });
        FieldBuilder { schema: self }
    }

    /// Field names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    fn entry(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|e| (&e.name, e.rules.len())))
            .finish()
    }
}

/// Builder for the rules of the most recently added field.
pub struct FieldBuilder {
    schema: Schema,
}

impl FieldBuilder {
    fn name(&self) -> &str {
        self.schema
            .fields
            .last()
            .map(|f| f.name.as_str())
            .unwrap_or_default()
    }

    fn push(mut self, rule: Rule) -> Self {
        if let Some(entry) = self.schema.fields.last_mut() {
            entry.rules.push(rule);
        }
        self
    }

    /// Add a custom rule.
    pub fn rule<F>(self, f: F, msg: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let msg = msg.into();
        self.push(Box::new(move |v: &Value| if f(v) { Ok(()) } else { Err(msg.clone()) }))
    }

    /// Require a value: not null, not blank, not an empty list.
    pub fn required(self, msg: impl Into<String>) -> Self {
        self.rule(|v| !is_blank(v), msg)
    }

    /// Require at least `min` characters (or list entries).
    pub fn min_length(self, min: usize, msg: impl Into<String>) -> Self {
        self.rule(move |v| length(v).is_none_or(|len| len >= min), msg)
    }

    /// Allow at most `max` characters (or list entries).
    pub fn max_length(self, max: usize, msg: impl Into<String>) -> Self {
        self.rule(move |v| length(v).is_none_or(|len| len <= max), msg)
    }

    /// Require text values to match `pattern`.
    ///
    /// An invalid regex is logged and the rule is skipped; use
    /// [`try_pattern`](Self::try_pattern) to get the error instead.
    pub fn pattern(self, pattern: &str, msg: impl Into<String>) -> Self {
        match Regex::new(pattern) {
            Ok(re) => self.matching(re, msg),
            Err(err) => {
                warn!("Schema: invalid pattern for '{}': {}", self.name(), err);
                self
            }
        }
    }

    /// Require text values to match `pattern`, failing on an invalid regex.
    pub fn try_pattern(self, pattern: &str, msg: impl Into<String>) -> Result<Self, FormError> {
        match Regex::new(pattern) {
            Ok(re) => Ok(self.matching(re, msg)),
            Err(err) => Err(FormError::InvalidPattern {
                field: self.name().to_string(),
                message: err.to_string(),
            }),
        }
    }

    fn matching(self, re: Regex, msg: impl Into<String>) -> Self {
        self.rule(
            move |v| match v {
                Value::String(s) => re.is_match(s),
                _ => true,
            },
            msg,
        )
    }

    /// Require a valid email address. Empty is valid; combine with
    /// [`required`](Self::required) for mandatory fields.
    pub fn email(self, msg: impl Into<String>) -> Self {
        self.rule(
            |v| match v {
                Value::String(s) if !s.is_empty() => email_address::EmailAddress::is_valid(s),
                _ => true,
            },
            msg,
        )
    }

    /// Require a number no smaller than `min`. Numeric strings count.
    pub fn min(self, min: f64, msg: impl Into<String>) -> Self {
        self.rule(move |v| is_blank(v) || numeric(v).is_some_and(|n| n >= min), msg)
    }

    /// Require a number no larger than `max`. Numeric strings count.
    pub fn max(self, max: f64, msg: impl Into<String>) -> Self {
        self.rule(move |v| is_blank(v) || numeric(v).is_some_and(|n| n <= max), msg)
    }

    /// Continue with the next field.
    pub fn field(self, name: impl Into<String>) -> FieldBuilder {
        self.schema.field(name)
    }

    /// Finish the schema.
    pub fn build(self) -> Schema {
        self.schema
    }
}

impl From<FieldBuilder> for Schema {
    fn from(builder: FieldBuilder) -> Self {
        builder.build()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Validation results
// =============================================================================

/// Validation status of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldStatus {
    pub errors: Vec<String>,
    pub has_error: bool,
}

/// A single failing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field_name: String,
    pub message: String,
}

/// Result of validating a whole form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationResult {
    #[default]
    Valid,
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    /// All failing rules, grouped by field in schema order.
    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }

    pub fn first_error(&self) -> Option<&FieldError> {
        self.errors().first()
    }
}

// =============================================================================
// FormState
// =============================================================================

/// Options for [`FormState::set_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetValueOptions {
    /// Validate before storing; an invalid value is not stored.
    pub validate_first: bool,
    /// Record the validation outcome in the field status.
    pub add_error_if_invalid: bool,
}

impl Default for SetValueOptions {
    fn default() -> Self {
        Self {
            validate_first: true,
            add_error_if_invalid: true,
        }
    }
}

impl SetValueOptions {
    /// Store without validating.
    pub fn unchecked() -> Self {
        Self {
            validate_first: false,
            add_error_if_invalid: false,
        }
    }
}

/// Values and validation status of a form.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FormState {
    schema: Arc<Schema>,
    values: State<FormValues>,
    status: State<BTreeMap<String, FieldStatus>>,
}

impl FormState {
    /// Create a form over `schema`.
    ///
    /// Each schema field takes its value from the `initial` object, or
    /// `null` when absent. Keys of `initial` outside the schema are dropped.
    pub fn new(schema: impl Into<Schema>, initial: Value) -> Self {
        let schema = schema.into();
        let mut initial = match initial {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                warn!("FormState: initial values must be an object, got {}", other);
                serde_json::Map::new()
            }
        };

        let values: FormValues = schema
            .keys()
            .map(|key| (key.to_string(), initial.remove(key).unwrap_or(Value::Null)))
            .collect();
        let status: BTreeMap<String, FieldStatus> = schema
            .keys()
            .map(|key| (key.to_string(), FieldStatus::default()))
            .collect();

        Self {
            schema: Arc::new(schema),
            values: State::new(values),
            status: State::new(status),
        }
    }

    /// Field names in schema order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.schema.keys()
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.with(|values| values.get(key).cloned())
    }

    pub fn values(&self) -> FormValues {
        self.values.get()
    }

    /// Decode the current values into `D`.
    pub fn values_as<D: DeserializeOwned>(&self) -> Result<D, FormError> {
        let object: serde_json::Map<String, Value> = self.values.get().into_iter().collect();
        serde_json::from_value(Value::Object(object)).map_err(|e| FormError::Decode(e.to_string()))
    }

    /// Replace the values of every schema field present in `values`,
    /// without validating. Other keys are ignored.
    pub fn set_values(&self, values: FormValues) {
        self.values.update(|current| {
            for (key, value) in values {
                if let Some(slot) = current.get_mut(&key) {
                    *slot = value;
                }
            }
        });
    }

    /// Set one value.
    ///
    /// With `validate_first` the value is only stored when it passes the
    /// field's rules; `add_error_if_invalid` then records the outcome.
    pub fn set_value(
        &self,
        key: &str,
        value: impl Into<Value>,
        options: SetValueOptions,
    ) -> Result<(), FormError> {
        let entry = self.entry(key)?;
        let value = value.into();

        if !options.validate_first {
            self.store(key, value);
            return Ok(());
        }

        let errors = entry.check(&value);
        batch(|| {
            if errors.is_empty() {
                self.store(key, value);
            }
            if options.add_error_if_invalid {
                self.set_status(key, errors);
            }
        });
        Ok(())
    }

    /// Mark the field as failing with `errors`.
    pub fn add_errors(&self, key: &str, errors: Vec<String>) -> Result<(), FormError> {
        self.entry(key)?;
        self.status.update(|status| {
            status.insert(
                key.to_string(),
                FieldStatus {
                    errors,
                    has_error: true,
                },
            );
        });
        Ok(())
    }

    /// Check the stored value of one field. Does not touch its status.
    pub fn validate(&self, key: &str) -> Result<(), Vec<String>> {
        let Some(entry) = self.schema.entry(key) else {
            warn!("FormState: validate('{}') ignored, unknown field", key);
            return Ok(());
        };
        let errors = self.values.with(|values| {
            entry.check(values.get(key).unwrap_or(&Value::Null))
        });
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Check every field. Does not touch the field statuses.
    pub fn validate_all(&self) -> ValidationResult {
        let errors: Vec<FieldError> = self.values.with(|values| {
            self.schema
                .fields
                .iter()
                .flat_map(|entry| {
                    entry
                        .check(values.get(&entry.name).unwrap_or(&Value::Null))
                        .into_iter()
                        .map(|message| FieldError {
                            field_name: entry.name.clone(),
                            message,
                        })
                })
                .collect()
        });

        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(errors)
        }
    }

    /// Input hook: store `raw` and re-validate, but only while the field is
    /// already showing an error.
    pub fn on_input(&self, key: &str, raw: impl Into<Value>) {
        let Some(entry) = self.schema.entry(key) else {
            warn!("FormState: on_input('{}') ignored, unknown field", key);
            return;
        };
        let raw = raw.into();
        let has_error = self.status.with(|s| s.get(key).is_some_and(|st| st.has_error));
        batch(|| {
            if has_error {
                self.set_status(key, entry.check(&raw));
            }
            self.store(key, raw);
        });
    }

    /// Blur hook: store `raw` and validate it.
    pub fn on_blur(&self, key: &str, raw: impl Into<Value>) {
        let Some(entry) = self.schema.entry(key) else {
            warn!("FormState: on_blur('{}') ignored, unknown field", key);
            return;
        };
        let raw = raw.into();
        batch(|| {
            self.set_status(key, entry.check(&raw));
            self.store(key, raw);
        });
    }

    pub fn status(&self, key: &str) -> Option<FieldStatus> {
        self.status.with(|status| status.get(key).cloned())
    }

    /// Value for the field's `aria-invalid` attribute.
    pub fn aria_invalid(&self, key: &str) -> bool {
        self.status
            .with(|status| status.get(key).is_some_and(|s| s.has_error))
    }

    /// Run `listener` now and after every change to values or statuses.
    pub fn subscribe<F>(&self, listener: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        Effect::new(&[&self.values, &self.status], listener)
    }

    fn entry(&self, key: &str) -> Result<&FieldEntry, FormError> {
        self.schema
            .entry(key)
            .ok_or_else(|| FormError::UnknownField(key.to_string()))
    }

    fn store(&self, key: &str, value: Value) {
        self.values.update(|values| {
            values.insert(key.to_string(), value);
        });
    }

    fn set_status(&self, key: &str, errors: Vec<String>) {
        let has_error = !errors.is_empty();
        self.status.update(|status| {
            status.insert(key.to_string(), FieldStatus { errors, has_error });
        });
    }
}

impl std::fmt::Debug for FormState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormState")
            .field("schema", &self.schema)
            .field("values", &self.values)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_rules_collect_every_message() {
        let schema: Schema = Schema::new()
            .field("code")
            .min_length(4, "too short")
            .pattern("^[0-9]+$", "digits only")
            .into();
        let entry = schema.entry("code").unwrap();

        assert_eq!(entry.check(&json!("ab")), vec!["too short", "digits only"]);
        assert!(entry.check(&json!("1234")).is_empty());
        // Null is left to `required`.
        assert!(entry.check(&Value::Null).is_empty());
    }

    #[test]
    fn test_numeric_rules_accept_numeric_strings() {
        let schema = Schema::new().field("age").min(18.0, "adults only").build();
        let entry = schema.entry("age").unwrap();

        assert!(entry.check(&json!(21)).is_empty());
        assert!(entry.check(&json!("21")).is_empty());
        assert_eq!(entry.check(&json!("12")), vec!["adults only"]);
        assert_eq!(entry.check(&json!("abc")), vec!["adults only"]);
    }

    #[test]
    fn test_try_pattern_rejects_invalid_regex() {
        let err = Schema::new()
            .field("code")
            .try_pattern("(", "bad")
            .err()
            .unwrap();
        assert!(matches!(err, FormError::InvalidPattern { ref field, .. } if field == "code"));
    }
}
