//! Event table encoding
//!
//! Encodes normalized event tables as BIDS-style tab-separated text or as a
//! JSON document carrying producer and provenance metadata.

use crate::config::NOT_APPLICABLE;
use crate::error::ConvertError;
use crate::pipeline::Conversion;
use crate::types::{Cell, EventRow, EventTable};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Current events document schema version
pub const EVENTS_SCHEMA_VERSION: &str = "1.0.0";

/// JSON events document
#[derive(Debug, Clone, Serialize)]
pub struct EventsDocument {
    pub schema_version: String,
    pub producer: EventsProducer,
    pub provenance: EventsProvenance,
    pub columns: Vec<String>,
    pub events: Vec<Map<String, Value>>,
    pub issues: Vec<IssueEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsProvenance {
    pub task: String,
    pub trigger_ms: f64,
    pub record_count: usize,
    pub computed_at_utc: String,
}

/// A skipped record and why
#[derive(Debug, Clone, Serialize)]
pub struct IssueEntry {
    pub record: usize,
    pub message: String,
}

/// Encoder for event tables
pub struct EventsEncoder {
    instance_id: String,
    not_applicable: String,
}

impl Default for EventsEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventsEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            not_applicable: NOT_APPLICABLE.to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            ..Self::new()
        }
    }

    /// Marker written for not-applicable TSV cells
    pub fn with_not_applicable(mut self, marker: &str) -> Self {
        self.not_applicable = marker.to_string();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a table as tab-separated text with a header row
    pub fn to_tsv(&self, table: &EventTable) -> Result<String, ConvertError> {
        let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(Vec::new());
        writer.write_record(EventTable::columns())?;
        for row in &table.rows {
            writer.write_record(self.tsv_fields(row))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ConvertError::EncodingError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ConvertError::EncodingError(e.to_string()))
    }

    /// Encode a conversion into the JSON events document
    pub fn encode(&self, conversion: &Conversion) -> EventsDocument {
        let columns = EventTable::columns();

        let events = conversion
            .table
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(json_fields(row))
                    .map(|(name, value)| (name.to_string(), value))
                    .collect()
            })
            .collect();

        let issues = conversion
            .issues
            .iter()
            .map(|issue| IssueEntry {
                record: issue.record,
                message: issue.error.to_string(),
            })
            .collect();

        EventsDocument {
            schema_version: EVENTS_SCHEMA_VERSION.to_string(),
            producer: EventsProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: EventsProvenance {
                task: conversion.task.as_str().to_string(),
                trigger_ms: conversion.trigger_ms,
                record_count: conversion.record_count,
                computed_at_utc: Utc::now().to_rfc3339(),
            },
            columns: columns.into_iter().map(String::from).collect(),
            events,
            issues,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, conversion: &Conversion) -> Result<String, ConvertError> {
        let document = self.encode(conversion);
        serde_json::to_string_pretty(&document).map_err(ConvertError::JsonError)
    }

    fn tsv_fields(&self, row: &EventRow) -> Vec<String> {
        let mut fields = vec![
            format_number(row.onset),
            format_number(row.duration),
            row.trial_type.clone(),
            self.tsv_cell(&row.block),
        ];
        fields.extend(row.cells.iter().map(|cell| self.tsv_cell(cell)));
        fields
    }

    fn tsv_cell(&self, cell: &Cell) -> String {
        match cell {
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => s.clone(),
            Cell::NotApplicable => self.not_applicable.clone(),
        }
    }
}

fn json_fields(row: &EventRow) -> Vec<Value> {
    let mut fields = vec![
        Value::from(row.onset),
        Value::from(row.duration),
        Value::from(row.trial_type.as_str()),
        json_cell(&row.block),
    ];
    fields.extend(row.cells.iter().map(json_cell));
    fields
}

fn json_cell(cell: &Cell) -> Value {
    match cell {
        Cell::Number(n) => Value::from(*n),
        Cell::Text(s) => Value::from(s.as_str()),
        Cell::NotApplicable => Value::Null,
    }
}

/// Whole numbers keep one decimal so time columns read as seconds
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}
