//! Filter record shared by every view through the reactive store
//!
//! A [`FilterState`] is always replaced as a whole. Views never patch a
//! single field in place, so every observer sees one consistent snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Closed numeric interval `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    /// Build a range, swapping the bounds if they arrive reversed
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// Build a range for `field`, rejecting reversed or non-finite bounds.
    /// Non-finite floats have no JSON form, so they could not be stored.
    pub fn checked(field: &str, min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(CoreError::InvalidRange {
                field: field.to_string(),
                min,
                max,
            });
        }
        Ok(Self { min, max })
    }

    /// Smallest range covering all finite values, if any
    pub fn extent(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Self>, v| match acc {
                None => Some(Self { min: v, max: v }),
                Some(r) => Some(Self {
                    min: r.min.min(v),
                    max: r.max.max(v),
                }),
            })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Categorical constraint: one allowed value or a list of allowed values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryFilter {
    One(String),
    Any(Vec<String>),
}

impl CategoryFilter {
    /// An empty list places no constraint
    pub fn allows(&self, value: &str) -> bool {
        match self {
            CategoryFilter::One(allowed) => allowed == value,
            CategoryFilter::Any(allowed) => {
                allowed.is_empty() || allowed.iter().any(|a| a == value)
            }
        }
    }
}

/// Anything a filter can be evaluated against
pub trait Filterable {
    /// Numeric value of `field`, if the record has one
    fn number(&self, field: &str) -> Option<f64>;

    /// Categorical value of `field`, if the record has one
    fn category(&self, field: &str) -> Option<&str>;
}

/// Full set of active filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub ranges: BTreeMap<String, NumericRange>,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryFilter>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, field: impl Into<String>, range: NumericRange) -> Self {
        self.ranges.insert(field.into(), range);
        self
    }

    pub fn with_category(mut self, field: impl Into<String>, filter: CategoryFilter) -> Self {
        self.categories.insert(field.into(), filter);
        self
    }

    /// Check every range the way [`NumericRange::checked`] does
    pub fn validate(&self) -> Result<()> {
        for (field, range) in &self.ranges {
            NumericRange::checked(field, range.min, range.max)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.categories.is_empty()
    }

    /// Names of every constrained field
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.ranges
            .keys()
            .chain(self.categories.keys())
            .map(String::as_str)
    }

    /// Whether `record` passes every constraint.
    ///
    /// A record missing a constrained field fails that constraint.
    pub fn matches(&self, record: &impl Filterable) -> bool {
        let ranges_ok = self.ranges.iter().all(|(field, range)| {
            record
                .number(field)
                .map(|v| range.contains(v))
                .unwrap_or(false)
        });

        ranges_ok
            && self.categories.iter().all(|(field, filter)| {
                record
                    .category(field)
                    .map(|v| filter.allows(v))
                    .unwrap_or(false)
            })
    }
}
