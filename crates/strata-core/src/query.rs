//! Declarative query model: predicates, sort order, and fetch shaping.
//!
//! These types are plain values with no engine ties. A `Predicate` can be
//! evaluated against anything implementing `FieldAccess`, which is what the
//! bundled memory engine does; SQL-backed engines are free to translate the
//! tree into their own dialect instead.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{FieldAccess, Value};

// =============================================================================
// Predicate
// =============================================================================

/// Comparison operator of a field-level predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A boolean filter expression over record fields.
///
/// `True` matches everything (delete-all is a delete with `Predicate::True`).
/// A comparison whose operands cannot be ordered (cross-variant, or a missing
/// field compared to a non-null value) does not match; `Ne` against a missing
/// field does match, mirroring "is not that value".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    True,
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(field, CompareOp::Eq, value)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(field, CompareOp::Ne, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(field, CompareOp::Lt, value)
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(field, CompareOp::Le, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(field, CompareOp::Gt, value)
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(field, CompareOp::Ge, value)
    }

    /// `field IN (values...)`
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    fn cmp(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a record's fields.
    pub fn matches<F: FieldAccess + ?Sized>(&self, record: &F) -> bool {
        match self {
            Predicate::True => true,
            Predicate::Compare { field, op, value } => {
                let actual = record.field(field).unwrap_or(Value::Null);
                match actual.compare(value) {
                    Some(ordering) => compare_holds(*op, ordering),
                    // Unordered operands: only `!=` holds.
                    None => *op == CompareOp::Ne,
                }
            }
            Predicate::In { field, values } => {
                let actual = record.field(field).unwrap_or(Value::Null);
                values
                    .iter()
                    .any(|v| actual.compare(v) == Some(Ordering::Equal))
            }
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Predicate::Not(inner) => !inner.matches(record),
        }
    }
}

fn compare_holds(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

// =============================================================================
// Sort order
// =============================================================================

/// One step of a sort order: a field key and a direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub key: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn ascending(key: impl Into<String>) -> Self {
        SortDescriptor {
            key: key.into(),
            ascending: true,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        SortDescriptor {
            key: key.into(),
            ascending: false,
        }
    }

    /// Order two records by this descriptor. Unordered field pairs compare
    /// equal so later descriptors can break the tie.
    pub fn order<F: FieldAccess + ?Sized>(&self, a: &F, b: &F) -> Ordering {
        let left = a.field(&self.key).unwrap_or(Value::Null);
        let right = b.field(&self.key).unwrap_or(Value::Null);
        let ordering = left.compare(&right).unwrap_or(Ordering::Equal);
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

// =============================================================================
// Fetch shaping
// =============================================================================

/// What a fetch materializes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// Full records (the default).
    #[default]
    Records,
    /// Record ids only.
    Ids,
    /// A match count only.
    Count,
    /// Raw field dictionaries.
    Rows,
}

/// Declarative fetch tuning, applied on top of a base request.
///
/// Every field is optional: an absent field means "use the engine default",
/// never "force zero/empty". The request builder applies fields only when
/// present, so a `FetchSpec::default()` leaves a request untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchSpec {
    /// Sort descriptors, applied in order.
    pub sort: Option<Vec<SortDescriptor>>,
    /// Maximum number of matches to return.
    pub limit: Option<usize>,
    /// Number of leading matches to skip.
    pub offset: Option<usize>,
    /// Engine hint: matches are materialized in batches of this size.
    pub batch_size: Option<usize>,
    /// Engine hint: relationship key paths to prefetch eagerly.
    pub prefetch: Option<Vec<String>>,
    /// Shape of the fetched result.
    pub shape: Option<ResultShape>,
    /// Engine hint: whether returned records may be lazily materialized.
    pub lazy_records: Option<bool>,
}

impl FetchSpec {
    /// A spec that only caps the number of results.
    pub fn with_limit(limit: usize) -> Self {
        FetchSpec {
            limit: Some(limit),
            ..FetchSpec::default()
        }
    }

    /// A spec that only sets the sort order.
    pub fn with_sort(sort: Vec<SortDescriptor>) -> Self {
        FetchSpec {
            sort: Some(sort),
            ..FetchSpec::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    struct Fields(BTreeMap<String, Value>);

    impl Fields {
        fn of(pairs: &[(&str, Value)]) -> Self {
            Fields(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            )
        }
    }

    impl FieldAccess for Fields {
        fn field(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    #[test]
    fn test_compare_predicates() {
        let rec = Fields::of(&[("id", Value::Int(3)), ("name", Value::from("carol"))]);

        assert!(Predicate::eq("id", 3i64).matches(&rec));
        assert!(!Predicate::eq("id", 4i64).matches(&rec));
        assert!(Predicate::ne("id", 4i64).matches(&rec));
        assert!(Predicate::lt("id", 5i64).matches(&rec));
        assert!(Predicate::ge("id", 3i64).matches(&rec));
        assert!(Predicate::eq("name", "carol").matches(&rec));
    }

    #[test]
    fn test_true_matches_everything() {
        let rec = Fields::of(&[]);
        assert!(Predicate::True.matches(&rec));
    }

    #[test]
    fn test_missing_field_only_matches_ne() {
        let rec = Fields::of(&[("id", Value::Int(1))]);

        assert!(!Predicate::eq("missing", 1i64).matches(&rec));
        assert!(!Predicate::lt("missing", 1i64).matches(&rec));
        assert!(Predicate::ne("missing", 1i64).matches(&rec));
    }

    #[test]
    fn test_boolean_combinators() {
        let rec = Fields::of(&[("id", Value::Int(2)), ("active", Value::Bool(true))]);

        let both = Predicate::And(vec![
            Predicate::eq("id", 2i64),
            Predicate::eq("active", true),
        ]);
        assert!(both.matches(&rec));

        let either = Predicate::Or(vec![
            Predicate::eq("id", 9i64),
            Predicate::eq("active", true),
        ]);
        assert!(either.matches(&rec));

        assert!(!Predicate::Not(Box::new(both)).matches(&rec));
    }

    #[test]
    fn test_in_predicate() {
        let rec = Fields::of(&[("id", Value::Int(4))]);
        let members = Predicate::is_in("id", vec![Value::Int(1), Value::Int(4)]);
        assert!(members.matches(&rec));

        let outsiders = Predicate::is_in("id", vec![Value::Int(7)]);
        assert!(!outsiders.matches(&rec));
    }

    #[test]
    fn test_sort_descriptor_ordering() {
        let a = Fields::of(&[("id", Value::Int(1))]);
        let b = Fields::of(&[("id", Value::Int(2))]);

        let asc = SortDescriptor::ascending("id");
        assert_eq!(asc.order(&a, &b), Ordering::Less);

        let desc = SortDescriptor::descending("id");
        assert_eq!(desc.order(&a, &b), Ordering::Greater);

        let missing = SortDescriptor::ascending("other");
        assert_eq!(missing.order(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_fetch_spec_defaults_are_absent() {
        let spec = FetchSpec::default();
        assert!(spec.sort.is_none());
        assert!(spec.limit.is_none());
        assert!(spec.offset.is_none());
        assert!(spec.batch_size.is_none());
        assert!(spec.prefetch.is_none());
        assert!(spec.shape.is_none());
        assert!(spec.lazy_records.is_none());

        assert_eq!(FetchSpec::with_limit(1).limit, Some(1));
    }
}
