//! Adapter for reading tabular task logs into raw records
//!
//! E-Prime "TAB" exports are tab-separated with a header row. JSON arrays of
//! objects are accepted as well for in-memory producers.

use crate::error::ConvertError;
use crate::schema::record::{FieldValue, RawRecord};
use csv::{ReaderBuilder, Trim};
use tracing::debug;

/// Adapter for converting tabular logs to raw records
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse tab-separated text with a header row
    pub fn parse_tsv(tsv: &str) -> Result<Vec<RawRecord>, ConvertError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(tsv.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(ConvertError::ParseError("missing header row".to_string()));
        }

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| {
                ConvertError::ParseError(format!("Failed to parse row {}: {}", line + 1, e))
            })?;
            let record: RawRecord = headers
                .iter()
                .zip(row.iter())
                .filter_map(|(name, cell)| {
                    FieldValue::parse_cell(cell).map(|value| (name.to_string(), value))
                })
                .collect();
            records.push(record);
        }

        debug!(rows = records.len(), columns = headers.len(), "parsed task log");
        Ok(records)
    }

    /// Parse a JSON array of objects, one object per row
    pub fn parse_array(json: &str) -> Result<Vec<RawRecord>, ConvertError> {
        let records: Vec<RawRecord> = serde_json::from_str(json)?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv() {
        let tsv = "Procedure[Trial]\tCountDownSlide.OnsetTime\tFixdot.OnsetTime\n\
                   \t10000\t\n\
                   FixPROC\t\t22000\n";

        let records = RecordAdapter::parse_tsv(tsv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number("CountDownSlide.OnsetTime"), Some(10000.0));
        assert!(!records[0].contains("Procedure[Trial]"));
        assert_eq!(records[1].text("Procedure[Trial]"), Some("FixPROC"));
        assert_eq!(records[1].number("Fixdot.OnsetTime"), Some(22000.0));
    }

    #[test]
    fn test_parse_tsv_short_rows() {
        let tsv = "Procedure\tType\tMovieSlide.OnsetTime\nSOCIALrunPROC\tMental\n";
        let records = RecordAdapter::parse_tsv(tsv).unwrap();
        assert_eq!(records[0].text("Type"), Some("Mental"));
        assert!(!records[0].contains("MovieSlide.OnsetTime"));
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[{"Procedure": "FixationPROC", "FixationBlock.OnsetTime": 5000},
                       {"Procedure": "RelationalPromptPROC"}]"#;
        let records = RecordAdapter::parse_array(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number("FixationBlock.OnsetTime"), Some(5000.0));
    }

    #[test]
    fn test_parse_array_invalid() {
        assert!(RecordAdapter::parse_array("not json").is_err());
    }
}
