//! Names shared by the export path, the dispatcher and their configuration
//! defaults.

// Remote models
pub const PARTNER_MODEL: &str = "res.partner";
pub const ORDER_MODEL: &str = "sale.order";

// Partner fields
pub const ID_FIELD: &str = "id";
pub const CITY_FIELD: &str = "city";
pub const SALES_REP_FIELD: &str = "x_studio_sales_rep";
pub const PHONE_FIELD: &str = "phone";
pub const NOTES_FIELD: &str = "comment";

// Order fields
pub const ORDER_PARTNER_FIELD: &str = "partner_id";
pub const ORDER_AMOUNT_FIELD: &str = "amount_total";
pub const ORDER_STATE_FIELD: &str = "state";

// Derived columns
pub const ORDER_COUNT_COLUMN: &str = "order_count";
pub const ORDER_TOTAL_COLUMN: &str = "order_total";

pub const DEFAULT_MAX_ROWS: u32 = 1000;
pub const DEFAULT_COUNTRY_CODE: &str = "91";
pub const DEFAULT_MESSAGE_DELAY_MS: u64 = 2000;
pub const INVALID_PHONE_REASON: &str = "invalid phone number";
pub const EXPORT_FILE_PREFIX: &str = "partner_export";

/// Partner fields requested from the source
pub fn partner_fields() -> Vec<String> {
    ["name", "street", PHONE_FIELD, CITY_FIELD, SALES_REP_FIELD, NOTES_FIELD]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Export column order
pub fn export_columns() -> Vec<String> {
    let mut columns = vec![ID_FIELD.to_string()];
    columns.extend(partner_fields());
    columns.push(ORDER_COUNT_COLUMN.to_string());
    columns.push(ORDER_TOTAL_COLUMN.to_string());
    columns
}

/// Order states that count toward partner statistics
pub fn confirmed_order_states() -> Vec<String> {
    vec!["sale".to_string(), "done".to_string()]
}
