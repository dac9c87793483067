use crate::types::EnrichedRow;

const RECORD_END: &str = "\r\n";

/// A delimited-text table: header plus rows of the same width
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Writes rows with standard double-quote escaping
#[derive(Debug, Clone)]
pub struct TabularWriter {
    columns: Vec<String>,
    delimiter: char,
}

impl TabularWriter {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            delimiter: ',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Render the header and one line per row over the configured columns.
    /// Returns `None` for an empty row set so no header-only file is produced.
    pub fn serialize(&self, rows: &[EnrichedRow]) -> Option<String> {
        if rows.is_empty() {
            return None;
        }
        let mut out = String::new();
        self.write_line(&mut out, self.columns.iter().map(String::as_str));
        for row in rows {
            self.write_line(&mut out, self.columns.iter().map(|c| row.get(c)));
        }
        Some(out)
    }

    /// Render an arbitrary table, ignoring the configured columns
    pub fn write_table(&self, table: &Table) -> String {
        let mut out = String::new();
        self.write_line(&mut out, table.headers.iter().map(String::as_str));
        for row in &table.rows {
            self.write_line(&mut out, row.iter().map(String::as_str));
        }
        out
    }

    fn write_line<'v>(&self, out: &mut String, values: impl Iterator<Item = &'v str>) {
        let values: Vec<&str> = values.collect();
        // A lone empty field is quoted, otherwise the record reads as a blank line
        if let [only] = values.as_slice() {
            if only.is_empty() {
                out.push_str("\"\"");
                out.push_str(RECORD_END);
                return;
            }
        }
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                out.push(self.delimiter);
            }
            out.push_str(&escape_field(value, self.delimiter));
        }
        out.push_str(RECORD_END);
    }
}

/// Quote a field when it contains the delimiter, a quote or a line break
pub fn escape_field(value: &str, delimiter: char) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c == delimiter || c == '"' || c == '\n' || c == '\r');
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Parse delimited text. The first record is the header; a leading BOM is
/// dropped; both CRLF and LF terminate records outside quotes. Short rows are
/// padded to the header width.
pub fn parse_table(text: &str, delimiter: char) -> Table {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = parse_records(text, delimiter).into_iter();
    let headers = records.next().unwrap_or_default();
    let width = headers.len();
    let rows = records
        .map(|mut row| {
            if row.len() < width {
                row.resize(width, String::new());
            }
            row
        })
        .collect();
    Table { headers, rows }
}

fn parse_records(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
            }
            c if c == delimiter => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                // Blank lines carry no data; a quoted empty field does
                if field_started || !field.is_empty() || !record.is_empty() {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                field_started = false;
            }
            other => {
                field.push(other);
                field_started = true;
            }
        }
    }
    if field_started || !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
