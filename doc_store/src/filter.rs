//! The filter and sort primitives the engine requires of its store.

use serde_json::Value;
use std::cmp::Ordering;

/// A predicate over JSON documents.
///
/// Field paths address nested values with dots, array elements by position:
/// `indices.0.start`. Only the primitives the engine actually issues are
/// modeled; anything richer belongs to the backing database, not to this
/// interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Field equals value; string comparison optionally case-insensitive.
    Eq {
        /// Dotted field path.
        field: String,
        /// Value to compare against.
        value: Value,
        /// Case-insensitive string comparison (URIs).
        case_insensitive: bool,
    },
    /// Numeric field is `<=` the bound.
    Lte {
        /// Dotted field path.
        field: String,
        /// Upper bound.
        value: f64,
    },
    /// Numeric field is `>=` the bound.
    Gte {
        /// Dotted field path.
        field: String,
        /// Lower bound.
        value: f64,
    },
    /// All sub-filters match.
    And(Vec<Filter>),
    /// Any sub-filter matches.
    Or(Vec<Filter>),
}

impl Filter {
    /// Case-sensitive equality.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
            case_insensitive: false,
        }
    }

    /// Case-insensitive string equality, as required for URI matching.
    pub fn eq_ci(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: Value::String(value.into()),
            case_insensitive: true,
        }
    }

    /// `field <= value`.
    pub fn lte(field: impl Into<String>, value: f64) -> Self {
        Self::Lte {
            field: field.into(),
            value,
        }
    }

    /// `field >= value`.
    pub fn gte(field: impl Into<String>, value: f64) -> Self {
        Self::Gte {
            field: field.into(),
            value,
        }
    }

    /// Conjunction; collapses to `All` for an empty clause list.
    pub fn and(clauses: Vec<Self>) -> Self {
        if clauses.is_empty() {
            Self::All
        } else {
            Self::And(clauses)
        }
    }

    /// Parse an OData-ish query-string suffix (`name=value&uid=abc`) into a
    /// conjunction of case-insensitive equalities.
    ///
    /// Used only for administrative listing; data retrieval never goes
    /// through this path.
    pub fn from_query_string(query: &str) -> Self {
        let clauses = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let (field, value) = pair.split_once('=')?;
                (!field.is_empty()).then(|| Self::eq_ci(field, value))
            })
            .collect();
        Self::and(clauses)
    }

    /// Does `document` satisfy this filter?
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Eq {
                field,
                value,
                case_insensitive,
            } => field_value(document, field).map_or(false, |actual| {
                if *case_insensitive {
                    match (actual.as_str(), value.as_str()) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        _ => values_equal(actual, value),
                    }
                } else {
                    values_equal(actual, value)
                }
            }),
            Self::Lte { field, value } => field_value(document, field)
                .and_then(Value::as_f64)
                .map_or(false, |actual| actual <= *value),
            Self::Gte { field, value } => field_value(document, field)
                .and_then(Value::as_f64)
                .map_or(false, |actual| actual >= *value),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(document)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(document)),
        }
    }
}

/// Equality that treats all JSON numbers as doubles, so `100` matches
/// `100.0` regardless of how a document was serialized.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Resolve a dotted field path inside a document.
pub fn field_value<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sort order over a (possibly nested) document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Dotted field path to sort by.
    pub field: String,
    /// Ascending or descending.
    pub ascending: bool,
}

impl SortKey {
    /// Ascending sort by `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    /// Descending sort by `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }

    /// Compare two documents under this key. Missing fields sort first.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = compare_values(
            field_value(a, &self.field),
            field_value(b, &self.field),
        );
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => match (a.as_str(), b.as_str()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => Ordering::Equal,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk_doc(uri: &str, start: f64, end: f64) -> Value {
        json!({
            "uri": uri,
            "indices": [{"mnemonic": "DEPTH", "start": start, "end": end}],
        })
    }

    #[test]
    fn nested_field_paths_resolve() {
        let doc = chunk_doc("eml://log(l1)", 100.0, 300.0);
        assert_eq!(field_value(&doc, "indices.0.start"), Some(&json!(100.0)));
        assert_eq!(field_value(&doc, "indices.1.start"), None);
        assert_eq!(field_value(&doc, "uri.nope"), None);
    }

    #[test]
    fn uri_equality_is_case_insensitive() {
        let doc = chunk_doc("EML://Log(L1)", 0.0, 1.0);
        assert!(Filter::eq_ci("uri", "eml://log(l1)").matches(&doc));
        assert!(!Filter::eq("uri", "eml://log(l1)").matches(&doc));
    }

    #[test]
    fn bound_filters_are_numeric() {
        let doc = chunk_doc("u", 100.0, 300.0);
        assert!(Filter::gte("indices.0.end", 250.0).matches(&doc));
        assert!(!Filter::gte("indices.0.end", 301.0).matches(&doc));
        assert!(Filter::lte("indices.0.start", 100.0).matches(&doc));

        // Integer-serialized numbers still match double bounds.
        let doc = json!({"indices": [{"start": 100}]});
        assert!(Filter::lte("indices.0.start", 100.0).matches(&doc));
    }

    #[test]
    fn and_or_compose() {
        let doc = chunk_doc("u", 100.0, 300.0);
        let overlap = Filter::and(vec![
            Filter::gte("indices.0.end", 200.0),
            Filter::lte("indices.0.start", 200.0),
        ]);
        assert!(overlap.matches(&doc));

        let either = Filter::Or(vec![
            Filter::eq("uri", "other"),
            Filter::eq("uri", "u"),
        ]);
        assert!(either.matches(&doc));
    }

    #[test]
    fn query_strings_parse_to_equalities() {
        let filter = Filter::from_query_string("name=test&uidWell=w1");
        let doc = json!({"name": "Test", "uidWell": "W1"});
        assert!(filter.matches(&doc));

        assert_eq!(Filter::from_query_string(""), Filter::All);
        assert_eq!(Filter::from_query_string("novalue"), Filter::All);
    }

    #[test]
    fn sort_keys_order_documents() {
        let mut docs = vec![
            chunk_doc("u", 2000.0, 3000.0),
            chunk_doc("u", 0.0, 1000.0),
            chunk_doc("u", 1000.0, 2000.0),
        ];
        let key = SortKey::asc("indices.0.start");
        docs.sort_by(|a, b| key.compare(a, b));
        assert_eq!(field_value(&docs[0], "indices.0.start"), Some(&json!(0.0)));

        let key = SortKey::desc("indices.0.start");
        docs.sort_by(|a, b| key.compare(a, b));
        assert_eq!(
            field_value(&docs[0], "indices.0.start"),
            Some(&json!(2000.0))
        );
    }
}
