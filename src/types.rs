use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A single field value as returned by the remote record source
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Str(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
    /// Link to another record, carried as (id, display label)
    Relation { id: i64, label: Option<String> },
}

impl RawValue {
    /// Decode a JSON-RPC field value.
    ///
    /// Many2one fields arrive as `[id, "label"]`. Other lists (x2many id
    /// lists) and objects have no scalar meaning here and are kept as their
    /// JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => RawValue::Number(n.clone()),
            Value::String(s) => RawValue::Str(s.clone()),
            Value::Array(items) => match relation_from_array(items) {
                Some(relation) => relation,
                None => RawValue::Str(value.to_string()),
            },
            Value::Object(_) => RawValue::Str(value.to_string()),
        }
    }

    /// Numeric id carried by this value, if it can act as a record reference
    pub fn as_ref_id(&self) -> Option<i64> {
        match self {
            RawValue::Relation { id, .. } => Some(*id),
            RawValue::Number(n) => n.as_i64(),
            RawValue::Str(s) => s.trim().parse().ok(),
            RawValue::Bool(_) | RawValue::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => n.as_f64(),
            RawValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn relation_from_array(items: &[Value]) -> Option<RawValue> {
    let id = match items {
        [id] | [id, _] => id.as_i64()?,
        _ => return None,
    };
    let label = match items.get(1) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Bool(false)) | Some(Value::Null) | None => None,
        Some(_) => return None,
    };
    Some(RawValue::Relation { id, label })
}

/// One record from the remote source, keyed by field name
pub type RawRecord = BTreeMap<String, RawValue>;

/// Decode a JSON object row into a [`RawRecord`]. Non-object rows yield an
/// empty record.
pub fn raw_record_from_json(value: &Value) -> RawRecord {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), RawValue::from_json(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// A record whose every value is plain text
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord(BTreeMap<String, String>);

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field value, or the empty string when the field is absent
    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for NormalizedRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An export row: normalized partner fields plus `order_count`/`order_total`
pub type EnrichedRow = NormalizedRecord;

/// Search domain term `(field, operator, value)`
#[derive(Debug, Clone, PartialEq)]
pub struct DomainFilter {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl DomainFilter {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator: "=".to_string(),
            value: value.into(),
        }
    }

    pub fn one_of(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator: "in".to_string(),
            value: value.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!([self.field, self.operator, self.value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_many2one_pair_decodes_as_relation() {
        assert_eq!(
            RawValue::from_json(&json!([7, "Manas"])),
            RawValue::Relation { id: 7, label: Some("Manas".to_string()) }
        );
        assert_eq!(
            RawValue::from_json(&json!([7, false])),
            RawValue::Relation { id: 7, label: None }
        );
    }

    #[test]
    fn test_id_list_is_kept_as_text() {
        assert_eq!(RawValue::from_json(&json!([1, 2, 3])), RawValue::Str("[1,2,3]".to_string()));
    }

    #[test]
    fn test_ref_id_extraction() {
        assert_eq!(RawValue::Relation { id: 4, label: None }.as_ref_id(), Some(4));
        assert_eq!(RawValue::Str(" 12 ".into()).as_ref_id(), Some(12));
        assert_eq!(RawValue::Str("abc".into()).as_ref_id(), None);
        assert_eq!(RawValue::Null.as_ref_id(), None);
    }

    #[test]
    fn test_normalized_record_absent_field_is_empty() {
        let mut rec = NormalizedRecord::new();
        rec.insert("name", "Acme");
        assert_eq!(rec.get("name"), "Acme");
        assert_eq!(rec.get("street"), "");
    }

    #[test]
    fn test_domain_filter_serializes_as_triple() {
        assert_eq!(DomainFilter::equals("city", "Patna").to_json(), json!(["city", "=", "Patna"]));
    }
}
