use crate::constants::NOTES_FIELD;
use crate::pipeline::processing::rich_text::clean_rich_text;
use crate::types::{NormalizedRecord, RawRecord, RawValue};

/// Trait for flattening raw source records into plain-text records
pub trait Normalizer: Send + Sync {
    /// Convert every field of `record` to a string. Never fails.
    fn normalize(&self, record: &RawRecord) -> NormalizedRecord;
}

/// Field normalizer used for partner exports.
///
/// Relations render as their display label, nulls as empty strings, booleans
/// as `True`/`False` and numbers in their plain string form. The designated
/// free-text field is additionally passed through the rich-text cleaner.
#[derive(Debug, Clone)]
pub struct DefaultNormalizer {
    pub free_text_field: String,
}

impl Default for DefaultNormalizer {
    fn default() -> Self {
        Self {
            free_text_field: NOTES_FIELD.to_string(),
        }
    }
}

impl DefaultNormalizer {
    pub fn new(free_text_field: impl Into<String>) -> Self {
        Self {
            free_text_field: free_text_field.into(),
        }
    }

    fn normalize_field(&self, field: &str, value: &RawValue) -> String {
        if field == self.free_text_field {
            return match value {
                RawValue::Str(s) => clean_rich_text(Some(s)),
                // Odoo marks an empty html field with `false`
                RawValue::Bool(false) | RawValue::Null => String::new(),
                other => clean_rich_text(Some(&normalize_value(other))),
            };
        }
        normalize_value(value)
    }
}

impl Normalizer for DefaultNormalizer {
    fn normalize(&self, record: &RawRecord) -> NormalizedRecord {
        record
            .iter()
            .map(|(field, value)| (field.clone(), self.normalize_field(field, value)))
            .collect()
    }
}

/// Plain string form of a single raw value
pub fn normalize_value(value: &RawValue) -> String {
    match value {
        RawValue::Relation { label: Some(label), .. } => label.clone(),
        RawValue::Relation { id, label: None } => id.to_string(),
        RawValue::Null => String::new(),
        RawValue::Bool(true) => "True".to_string(),
        RawValue::Bool(false) => "False".to_string(),
        RawValue::Number(n) => n.to_string(),
        RawValue::Str(s) => s.clone(),
    }
}
