//! Pipeline orchestration
//!
//! This module provides the public API for converting one task run's raw
//! log into a normalized event table.

use crate::config::ConvertOptions;
use crate::encoder::EventsEncoder;
use crate::error::{ConvertError, Diagnostics, RecordIssue};
use crate::labeler::{label_blocks, partition_blocks};
use crate::normalizer::Normalizer;
use crate::schema::{RawRecord, RecordAdapter};
use crate::tasks::TaskConverter;
use crate::types::{EventTable, Task};
use tracing::{debug, info};

/// Result of converting one task run
#[derive(Debug)]
pub struct Conversion {
    pub task: Task,
    /// Scan trigger in log units
    pub trigger_ms: f64,
    /// Number of raw records read
    pub record_count: usize,
    pub table: EventTable,
    /// Per-record problems that were skipped over
    pub issues: Vec<RecordIssue>,
}

/// Convert a tab-separated task log to a tab-separated event table.
///
/// # Arguments
/// * `task` - Task name (e.g., "MOTOR", "wm")
/// * `tsv` - E-Prime TAB export with a header row
///
/// # Example
/// ```ignore
/// let events_tsv = convert_tsv("GAMBLING", &eprime_tab_text)?;
/// ```
pub fn convert_tsv(task: &str, tsv: &str) -> Result<String, ConvertError> {
    let converter = EventConverter::new();
    let conversion = converter.convert_tsv(task.parse()?, tsv)?;
    converter.encoder().to_tsv(&conversion.table)
}

/// Convert already-parsed records for a named task
pub fn convert_records(task: &str, records: &[RawRecord]) -> Result<Conversion, ConvertError> {
    EventConverter::new().convert(task.parse()?, records)
}

/// Reusable converter carrying options and an encoder identity.
pub struct EventConverter {
    options: ConvertOptions,
    normalizer: Normalizer,
    encoder: EventsEncoder,
}

impl Default for EventConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventConverter {
    /// Create a converter with default options
    pub fn new() -> Self {
        Self::with_options(ConvertOptions::default())
    }

    pub fn with_options(options: ConvertOptions) -> Self {
        Self {
            normalizer: Normalizer::with_unit_divisor(options.unit_divisor),
            encoder: EventsEncoder::new().with_not_applicable(&options.not_applicable),
            options,
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn encoder(&self) -> &EventsEncoder {
        &self.encoder
    }

    /// Parse a TAB export and convert it
    pub fn convert_tsv(&self, task: Task, tsv: &str) -> Result<Conversion, ConvertError> {
        let records = RecordAdapter::parse_tsv(tsv)?;
        self.convert(task, &records)
    }

    /// Convert and encode to the JSON events document
    pub fn convert_to_json(&self, task: Task, records: &[RawRecord]) -> Result<String, ConvertError> {
        let conversion = self.convert(task, records)?;
        self.encoder.encode_to_json(&conversion)
    }

    /// Convert one task run.
    ///
    /// Pipeline stages:
    /// 1. Trigger lookup
    /// 2. Block labeling
    /// 3. Trial event emission
    /// 4. Block event synthesis and block tagging
    /// 5. Normalization
    pub fn convert(&self, task: Task, records: &[RawRecord]) -> Result<Conversion, ConvertError> {
        let converter = task.converter();
        let trigger = find_trigger(converter, records)?;

        let labeled = label_blocks(records, converter.block_scheme());
        let mut diagnostics = Diagnostics::new();

        let mut events = converter.emit_trial_events(&labeled, trigger, &mut diagnostics);

        let blocks = partition_blocks(&labeled);
        for block in &blocks {
            let synthesized = converter.synthesize_block_events(block, trigger, &mut diagnostics);
            debug!(block = %block.label, members = block.members.len(), events = synthesized.len(), "synthesized block");
            events.extend(synthesized);
        }
        let events = converter.annotate(events, &blocks);

        let rows = self.normalizer.normalize(events)?;
        info!(
            task = %task,
            records = records.len(),
            events = rows.len(),
            issues = diagnostics.len(),
            "converted task log"
        );

        Ok(Conversion {
            task,
            trigger_ms: trigger,
            record_count: records.len(),
            table: EventTable { task, rows },
            issues: diagnostics.into_issues(),
        })
    }
}

/// Trigger time from the first record carrying the task's trigger field
fn find_trigger(converter: &dyn TaskConverter, records: &[RawRecord]) -> Result<f64, ConvertError> {
    let field = converter.trigger_field();
    records
        .iter()
        .find_map(|record| record.timestamp(field))
        .ok_or_else(|| ConvertError::missing(0, field))
}
