use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{ExportError, Result};
use crate::pipeline::processing::rich_text::clean_rich_text;
use crate::pipeline::processing::tabular::{parse_table, Table, TabularWriter};

const NOTES_HEADER: &str = "Notes";
const CANDIDATE_DELIMITERS: [char; 3] = [',', ';', '\t'];

/// Summary of a cleaned file
#[derive(Debug, Clone, PartialEq)]
pub struct CleanNotesSummary {
    pub output: PathBuf,
    pub notes_column: String,
    pub rows: usize,
    pub delimiter: char,
}

/// Pick the delimiter occurring most often in the header line, outside
/// quotes. Ties and headerless input fall back to `,`.
pub fn detect_delimiter(text: &str) -> char {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;
    for c in text.trim_start_matches('\u{feff}').chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\r' | '\n' if !in_quotes => break,
            _ if !in_quotes => {
                if let Some(idx) = CANDIDATE_DELIMITERS.iter().position(|d| *d == c) {
                    counts[idx] += 1;
                }
            }
            _ => {}
        }
    }
    let mut best = 0;
    for (idx, count) in counts.iter().enumerate() {
        if *count > counts[best] {
            best = idx;
        }
    }
    CANDIDATE_DELIMITERS[best]
}

/// Locate the notes column: exact `Notes`, then a trimmed case-insensitive
/// match, then a match on alphanumerics only. Falls back to the last column;
/// the flag reports whether the fallback was used.
pub fn find_notes_column(headers: &[String]) -> Option<(usize, bool)> {
    if headers.is_empty() {
        return None;
    }
    let squash = |h: &str| -> String {
        h.trim_start_matches('\u{feff}')
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    };
    headers
        .iter()
        .position(|h| h == NOTES_HEADER)
        .or_else(|| headers.iter().position(|h| h.trim().eq_ignore_ascii_case("notes")))
        .or_else(|| headers.iter().position(|h| squash(h.as_str()) == "notes"))
        .map(|idx| (idx, false))
        .or(Some((headers.len() - 1, true)))
}

/// Clean the notes column of `table` in place, returning its header
pub fn clean_notes_table(table: &mut Table) -> Result<String> {
    let (idx, fallback) = find_notes_column(&table.headers)
        .ok_or_else(|| ExportError::Config("CSV appears to have no header row".to_string()))?;
    let header = table.headers[idx].clone();
    if fallback {
        warn!("'Notes' column not matched; falling back to last column: '{}'", header);
    }
    for row in &mut table.rows {
        if let Some(cell) = row.get_mut(idx) {
            *cell = clean_rich_text(Some(cell.as_str()));
        }
    }
    Ok(header)
}

/// `<stem>.cleaned.csv` next to the input
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    input.with_file_name(format!("{stem}.cleaned.csv"))
}

/// Read `input`, clean its notes column and write the result with the
/// delimiter the input uses
pub fn clean_notes_file(input: &Path, output: Option<&Path>) -> Result<CleanNotesSummary> {
    if !input.exists() {
        return Err(ExportError::Config(format!("Input file not found: {}", input.display())));
    }
    let text = fs::read_to_string(input)?;
    let delimiter = detect_delimiter(&text);
    let mut table = parse_table(&text, delimiter);
    let notes_column = clean_notes_table(&mut table)?;

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| default_output_path(input));
    let writer = TabularWriter::new(Vec::new()).with_delimiter(delimiter);
    fs::write(&output, writer.write_table(&table))?;
    info!("Wrote cleaned CSV: {}", output.display());

    Ok(CleanNotesSummary {
        output,
        notes_column,
        rows: table.rows.len(),
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_notes_column_precedence() {
        assert_eq!(find_notes_column(&headers(&["Name", "Notes"])), Some((1, false)));
        assert_eq!(find_notes_column(&headers(&[" notes ", "Name"])), Some((0, false)));
        assert_eq!(find_notes_column(&headers(&["\u{feff}No-tes", "Name"])), Some((0, false)));
        assert_eq!(find_notes_column(&headers(&["Name", "Comment"])), Some((1, true)));
        assert_eq!(find_notes_column(&[]), None);
    }

    #[test]
    fn test_clean_notes_file() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("Contact with notes.csv");
        fs::write(
            &input,
            "Name,Phone,Notes\nAcme,98765,\"<p>Call&nbsp;back</p><p>Friday</p>\"\nZed,1,\n",
        )
        .unwrap();

        let summary = clean_notes_file(&input, None).unwrap();
        assert_eq!(summary.output, tmp.path().join("Contact with notes.cleaned.csv"));
        assert_eq!(summary.notes_column, "Notes");
        assert_eq!(summary.rows, 2);

        let written = fs::read_to_string(&summary.output).unwrap();
        let table = parse_table(&written, ',');
        assert_eq!(table.rows[0], headers(&["Acme", "98765", "Call back\nFriday"]));
        assert_eq!(table.rows[1], headers(&["Zed", "1", ""]));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("Name;Phone;Notes\r\na;b;c"), ';');
        assert_eq!(detect_delimiter("Name\tNotes\n"), '\t');
        assert_eq!(detect_delimiter("\"Last; First\",Notes\n"), ',');
        assert_eq!(detect_delimiter("Notes\n"), ',');
        assert_eq!(detect_delimiter(""), ',');
    }

    #[test]
    fn test_semicolon_file_keeps_its_delimiter() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("contacts.csv");
        fs::write(&input, "Name;Notes\nAcme;\"<p>Net 30; no COD</p>\"\n").unwrap();

        let summary = clean_notes_file(&input, None).unwrap();
        assert_eq!(summary.delimiter, ';');
        let written = fs::read_to_string(&summary.output).unwrap();
        assert_eq!(written, "Name;Notes\r\nAcme;\"Net 30; no COD\"\r\n");
    }

    #[test]
    fn test_missing_input() {
        let tmp = tempdir().unwrap();
        assert!(clean_notes_file(&tmp.path().join("nope.csv"), None).is_err());
    }
}
