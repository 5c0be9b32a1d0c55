//! Vector index trait and metadata filters.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::document::{VectorMatch, VectorRecord};
use crate::error::Result;

/// The namespace holding one user's vectors.
pub fn user_namespace(user_id: &str) -> String {
    format!("user_{user_id}")
}

/// A condition on vector metadata, evaluated by the index during search.
///
/// Renders to the `$eq` / `$in` / `$and` JSON dialect understood by hosted
/// vector databases.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    /// `field == value`
    Eq { field: String, value: Value },
    /// `field` is one of `values`
    In { field: String, values: Vec<Value> },
    /// All conditions hold.
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        MetadataFilter::Eq { field: field.into(), value: value.into() }
    }

    pub fn one_of<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        MetadataFilter::In { field: field.into(), values }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: MetadataFilter) -> Self {
        let mut conditions = match self {
            MetadataFilter::And(conditions) => conditions,
            single => vec![single],
        };
        match other {
            MetadataFilter::And(more) => conditions.extend(more),
            single => conditions.push(single),
        }
        MetadataFilter::And(conditions)
    }

    /// Render as filter JSON.
    pub fn to_json(&self) -> Value {
        match self {
            MetadataFilter::Eq { field, value } => json!({ field: { "$eq": value } }),
            MetadataFilter::In { field, values } => json!({ field: { "$in": values } }),
            MetadataFilter::And(conditions) => {
                let rendered: Vec<Value> =
                    conditions.iter().map(MetadataFilter::to_json).collect();
                json!({ "$and": rendered })
            }
        }
    }

    /// Evaluate against a metadata map. Missing fields never match.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        match self {
            MetadataFilter::Eq { field, value } => {
                metadata.get(field).is_some_and(|actual| loosely_equal(actual, value))
            }
            MetadataFilter::In { field, values } => metadata
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| loosely_equal(actual, v))),
            MetadataFilter::And(conditions) => conditions.iter().all(|c| c.matches(metadata)),
        }
    }
}

// Stores that keep only string metadata round-trip `true` as "true".
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s.eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        _ => actual == expected,
    }
}

/// A per-namespace vector index with filtered nearest-neighbour search.
///
/// # Example
///
/// ```rust,ignore
/// use backlink_rag::{InMemoryVectorIndex, MetadataFilter, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.upsert("user_42", &records).await?;
/// let filter = MetadataFilter::one_of("role", ["user", "assistant"]);
/// let hits = index.query("user_42", &embedding, 15, Some(&filter)).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records in a namespace.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `top_k` nearest records that satisfy `filter`.
    ///
    /// Results are ordered by descending similarity score.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn renders_filter_dialect() {
        let filter = MetadataFilter::eq("isProfile", true)
            .and(MetadataFilter::one_of("role", ["user", "assistant"]));
        assert_eq!(
            filter.to_json(),
            json!({"$and": [
                {"isProfile": {"$eq": true}},
                {"role": {"$in": ["user", "assistant"]}}
            ]})
        );
    }

    #[test]
    fn evaluates_filters() {
        let filter = MetadataFilter::eq("isProfile", true)
            .and(MetadataFilter::one_of("role", ["user"]));
        assert!(filter.matches(&metadata(json!({"isProfile": true, "role": "user"}))));
        assert!(filter.matches(&metadata(json!({"isProfile": "true", "role": "user"}))));
        assert!(!filter.matches(&metadata(json!({"isProfile": true, "role": "assistant"}))));
        assert!(!filter.matches(&metadata(json!({"role": "user"}))));
    }

    #[test]
    fn namespaces_are_per_user() {
        assert_eq!(user_namespace("42"), "user_42");
    }
}
