//! Dynamically-typed metadata value used across document, capability, and
//! filter contracts (see the design notes on heterogeneous mappings).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tagged-union value standing in for a host-native "any" type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    List(Vec<MetadataValue>),
    /// String-keyed map, ordered for deterministic serialization.
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Returns the value as a `&str`, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as an `i64`, if it is numeric.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            MetadataValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Returns the value as an `f64`, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as a `bool`, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

/// Convenience alias for the string-keyed metadata maps used everywhere.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A comparison operator for a [`FilterDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Equality (the default when a bare value is supplied).
    Eq,
    /// Inequality.
    Ne,
    /// Greater than (numeric only).
    Gt,
    /// Greater than or equal (numeric only).
    Gte,
    /// Less than (numeric only).
    Lt,
    /// Less than or equal (numeric only).
    Lte,
}

/// `{operator, value}` filter descriptor per the design notes: filters compare
/// by equality unless an explicit operator is supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Comparison operator.
    pub operator: FilterOperator,
    /// Value to compare against.
    pub value: MetadataValue,
}

impl FilterDescriptor {
    /// Shorthand for an equality filter.
    pub fn eq(value: impl Into<MetadataValue>) -> Self {
        Self {
            operator: FilterOperator::Eq,
            value: value.into(),
        }
    }

    /// Evaluates this filter against a stored value.
    pub fn matches(&self, actual: Option<&MetadataValue>) -> bool {
        let Some(actual) = actual else {
            return matches!(self.operator, FilterOperator::Ne);
        };

        match self.operator {
            FilterOperator::Eq => actual == &self.value,
            FilterOperator::Ne => actual != &self.value,
            FilterOperator::Gt => compare_numeric(actual, &self.value, |a, b| a > b),
            FilterOperator::Gte => compare_numeric(actual, &self.value, |a, b| a >= b),
            FilterOperator::Lt => compare_numeric(actual, &self.value, |a, b| a < b),
            FilterOperator::Lte => compare_numeric(actual, &self.value, |a, b| a <= b),
        }
    }
}

fn compare_numeric(a: &MetadataValue, b: &MetadataValue, op: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// A filter value supplied by a caller: either a bare value (implicit
/// equality) or an explicit `{operator, value}` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Bare value, compared by equality.
    Bare(MetadataValue),
    /// Explicit operator/value pair.
    Descriptor(FilterDescriptor),
}

impl FilterValue {
    /// Evaluates this filter against a stored value.
    pub fn matches(&self, actual: Option<&MetadataValue>) -> bool {
        match self {
            FilterValue::Bare(v) => actual == Some(v),
            FilterValue::Descriptor(d) => d.matches(actual),
        }
    }
}

/// A set of named filters, all of which must match (logical AND).
pub type FilterMap = BTreeMap<String, FilterValue>;

/// Returns `true` if `metadata` satisfies every entry in `filters`.
pub fn matches_all(metadata: &Metadata, filters: &FilterMap) -> bool {
    filters
        .iter()
        .all(|(key, filter)| filter.matches(metadata.get(key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_filter_matches_equal_value() {
        let filter = FilterValue::Bare(MetadataValue::from("en"));
        assert!(filter.matches(Some(&MetadataValue::from("en"))));
        assert!(!filter.matches(Some(&MetadataValue::from("fr"))));
    }

    #[test]
    fn ne_filter_matches_missing_key() {
        let filter = FilterValue::Descriptor(FilterDescriptor {
            operator: FilterOperator::Ne,
            value: MetadataValue::from("x"),
        });
        assert!(filter.matches(None));
    }

    #[test]
    fn numeric_operators_compare_as_f64() {
        let filter = FilterValue::Descriptor(FilterDescriptor {
            operator: FilterOperator::Gte,
            value: MetadataValue::Int(10),
        });
        assert!(filter.matches(Some(&MetadataValue::Float(10.5))));
        assert!(!filter.matches(Some(&MetadataValue::Int(9))));
    }

    #[test]
    fn matches_all_requires_every_filter() {
        let mut metadata = Metadata::new();
        metadata.insert("lang".into(), MetadataValue::from("en"));
        metadata.insert("year".into(), MetadataValue::Int(2024));

        let mut filters = FilterMap::new();
        filters.insert("lang".into(), FilterValue::Bare(MetadataValue::from("en")));
        assert!(matches_all(&metadata, &filters));

        filters.insert(
            "year".into(),
            FilterValue::Descriptor(FilterDescriptor::eq(MetadataValue::Int(2023))),
        );
        assert!(!matches_all(&metadata, &filters));
    }
}
