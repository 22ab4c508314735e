//! Duration derivation shared by the task converters
//!
//! Durations are rarely stored in the logs. They are derived from an explicit
//! field, from the onset of a later record, or from a task literal, in that
//! order. Block ends use the same idea with a longer tier list and a ceiling.

use crate::error::{ConvertError, Diagnostics};
use crate::labeler::{Block, LabeledRecord};

/// A record together with every record after it
#[derive(Debug, Clone, Copy)]
pub struct Window<'s, 'a> {
    pub current: &'s LabeledRecord<'a>,
    pub rest: &'s [LabeledRecord<'a>],
}

impl<'s, 'a> Window<'s, 'a> {
    pub fn next(&self) -> Option<&'s LabeledRecord<'a>> {
        self.rest.first()
    }

    /// `next.field - onset`, when the next record carries a real timestamp
    pub fn lookahead(&self, field: &str, onset: f64) -> Option<f64> {
        self.next()
            .and_then(|next| next.timestamp(field))
            .map(|t| t - onset)
    }

    /// Like `lookahead`, but takes the first later record carrying the field
    pub fn lookahead_any(&self, field: &str, onset: f64) -> Option<f64> {
        self.rest
            .iter()
            .find_map(|record| record.timestamp(field))
            .map(|t| t - onset)
    }

    /// Like `lookahead_any`, restricted to records of the current block
    pub fn lookahead_in_block(&self, field: &str, onset: f64) -> Option<f64> {
        let label = self.current.label;
        self.rest
            .iter()
            .take_while(|record| record.label == label)
            .find_map(|record| record.timestamp(field))
            .map(|t| t - onset)
    }
}

/// Current/next view over a record sequence
pub fn windows<'s, 'a>(records: &'s [LabeledRecord<'a>]) -> impl Iterator<Item = Window<'s, 'a>> {
    std::iter::successors(records.split_first(), |&(_, rest)| rest.split_first())
        .map(|(current, rest)| Window { current, rest })
}

/// First usable candidate duration, else the task literal
pub fn derive_duration(candidates: &[Option<f64>], fallback: f64) -> f64 {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(fallback)
}

/// First candidate end time that lies after `onset`
pub fn resolve_block_end(onset: f64, tiers: &[Option<f64>]) -> Option<f64> {
    tiers
        .iter()
        .flatten()
        .copied()
        .find(|end| end.is_finite() && *end > onset)
}

/// Block duration from its end tiers, falling back to the task ceiling
pub fn block_duration(
    block: &Block<'_>,
    onset: f64,
    tiers: &[Option<f64>],
    ceiling: f64,
    diagnostics: &mut Diagnostics,
) -> f64 {
    match resolve_block_end(onset, tiers) {
        Some(end) => end - onset,
        None => {
            diagnostics.report(
                block.position(),
                ConvertError::InvalidBlockBoundary {
                    block: block.label.to_string(),
                    ceiling_ms: ceiling,
                },
            );
            ceiling
        }
    }
}

/// First field among `fields` with a real timestamp
pub fn first_timestamp(record: &LabeledRecord<'_>, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| record.timestamp(field))
}

/// `start + offset`, when the start timestamp is real
pub fn offset_from(record: &LabeledRecord<'_>, field: &str, offset: Option<f64>) -> Option<f64> {
    record.timestamp(field).zip(offset).map(|(t, d)| t + d)
}

pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
