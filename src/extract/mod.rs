//! Field extraction from rendered product cards.
//!
//! A [`FieldExtractor`] turns one [`CardHandle`] into a [`RawProductRecord`].
//! Extractors are site specific (see [`sites`]); the scroll collector only
//! sees the trait.
//!
//! Every field lookup yields a `Result<FieldValue, FieldError>`. Required
//! fields fail the whole card with [`ExtractError`]; optional fields that fail
//! are stored as `null` and the failure is kept on the record as a
//! [`FieldIssue`] so callers and tests can inspect it.

pub mod fields;
pub mod sites;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use crate::driver::CardHandle;

pub use sites::{extractor_for, SiteId, SiteProfile};

/// Scalar value of one extracted field.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Flag(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Why a single field lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("no element matches `{0}`")]
    Missing(String),
    #[error("element `{selector}` has no `{attribute}` attribute")]
    MissingAttribute { selector: String, attribute: String },
    #[error("element `{0}` has no text")]
    Empty(String),
    #[error("cannot parse `{0}` as a price")]
    BadPrice(String),
    #[error("cannot parse `{0}` as a number")]
    BadNumber(String),
    #[error("invalid selector `{0}`")]
    BadSelector(String),
}

/// A card could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("required field `{field}` unavailable: {source}")]
    Required {
        field: &'static str,
        #[source]
        source: FieldError,
    },
}

/// An optional field that failed and was stored as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub error: FieldError,
}

/// Ordered mapping of field name to scalar value.
///
/// Fields keep insertion order, which is the order the extractor produced
/// them in. Issues are not serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProductRecord {
    fields: Vec<(String, FieldValue)>,
    issues: Vec<FieldIssue>,
}

impl RawProductRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Store an optional field; a failed lookup becomes `null` plus an issue.
    pub fn record<T: Into<FieldValue>>(&mut self, name: &str, result: Result<T, FieldError>) {
        match result {
            Ok(value) => self.insert(name, value),
            Err(error) => {
                self.insert(name, FieldValue::Null);
                self.issues.push(FieldIssue {
                    field: name.to_string(),
                    error,
                });
            }
        }
    }

    /// Like [`Self::record`], but a failed lookup stores `fallback` instead of `null`.
    pub fn record_or<T: Into<FieldValue>>(
        &mut self,
        name: &str,
        result: Result<T, FieldError>,
        fallback: impl Into<FieldValue>,
    ) {
        match result {
            Ok(value) => self.insert(name, value),
            Err(error) => {
                self.insert(name, fallback);
                self.issues.push(FieldIssue {
                    field: name.to_string(),
                    error,
                });
            }
        }
    }

    /// Store a required field; a failed lookup fails the card.
    pub fn require<T: Into<FieldValue>>(
        &mut self,
        name: &'static str,
        result: Result<T, FieldError>,
    ) -> Result<(), ExtractError> {
        let value = result.map_err(|source| ExtractError::Required {
            field: name,
            source,
        })?;
        self.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// JSON object with fields in insertion order.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect()
    }
}

impl Serialize for RawProductRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Turns one rendered card into a raw record.
///
/// Implementations must be pure with respect to the card: the collector
/// may call `extract` again for the same card on a later pass when an
/// earlier attempt failed.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError>;
}

impl<E: FieldExtractor + ?Sized> FieldExtractor for Box<E> {
    fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError> {
        (**self).extract(card)
    }
}
