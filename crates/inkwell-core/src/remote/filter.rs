//! Query vocabulary shared by every [`RemoteDataService`](super::RemoteDataService) backend.
//!
//! A [`Filter`] is a conjunction of [`Clause`]s. Backends translate it into
//! their native query language; [`Filter::matches`] is the reference
//! semantics used by the in-memory store.

use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value;

use crate::search::text_contains_term;

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `field == value`
    Eq { field: String, value: Value },
    /// `field IN values`
    In { field: String, values: Vec<Value> },
    /// Every term appears (ASCII case-insensitive) in at least one of `fields`
    Search { fields: Vec<String>, terms: Vec<String> },
}

impl Clause {
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Clause::Eq { field, value } => record
                .get(field)
                .map_or(false, |actual| values_equal(actual, value)),
            Clause::In { field, values } => record
                .get(field)
                .map_or(false, |actual| values.iter().any(|v| values_equal(actual, v))),
            Clause::Search { fields, terms } => terms.iter().all(|term| {
                fields.iter().any(|field| {
                    record
                        .get(field)
                        .and_then(Value::as_str)
                        .map_or(false, |text| text_contains_term(text, term))
                })
            }),
        }
    }
}

/// Conjunction of clauses. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.clauses.push(Clause::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn search<F: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = F>,
        terms: Vec<String>,
    ) -> Self {
        self.clauses.push(Clause::Search {
            fields: fields.into_iter().map(Into::into).collect(),
            terms,
        });
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Compare two records by this order. Records missing the field sort last.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y);
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Ids may come back as numbers from one backend and strings from another.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
