//! Event normalization
//!
//! Converts emitted events into the fixed output schema:
//! - Onsets and durations converted from milliseconds to seconds
//! - Stable sort by onset, so equal onsets keep emission order
//! - Every task-specific column present, with an explicit not-applicable cell

use crate::error::ConvertError;
use crate::types::{Cell, Column, Event, EventRow};
use tracing::warn;

/// Milliseconds per second in E-Prime timestamps
pub const MS_PER_SECOND: f64 = 1000.0;

/// Normalizer for converting emitted events to output rows
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    unit_divisor: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            unit_divisor: MS_PER_SECOND,
        }
    }

    /// Normalizer with a custom divisor from log units to seconds
    pub fn with_unit_divisor(unit_divisor: f64) -> Self {
        Self { unit_divisor }
    }

    /// Normalize, sort and widen events to the output schema
    pub fn normalize(&self, events: Vec<Event>) -> Result<Vec<EventRow>, ConvertError> {
        let mut rows = events
            .into_iter()
            .map(|event| self.normalize_event(event))
            .collect::<Result<Vec<_>, _>>()?;

        rows.sort_by(|a, b| a.onset.total_cmp(&b.onset));
        Ok(rows)
    }

    fn normalize_event(&self, event: Event) -> Result<EventRow, ConvertError> {
        let onset = event.onset / self.unit_divisor;
        if !onset.is_finite() {
            return Err(ConvertError::UnitConsistency {
                trial_type: event.trial_type,
                column: "onset",
            });
        }

        let mut duration = event.duration / self.unit_divisor;
        if !duration.is_finite() {
            return Err(ConvertError::UnitConsistency {
                trial_type: event.trial_type,
                column: "duration",
            });
        }
        if duration < 0.0 {
            warn!(
                trial_type = %event.trial_type,
                onset,
                duration,
                "negative duration clamped to zero"
            );
            duration = 0.0;
        }

        let cells = Column::ALL
            .iter()
            .map(|column| Cell::from(event.get(*column)))
            .collect();

        Ok(EventRow {
            onset,
            duration,
            block: event
                .block
                .map(|label| Cell::Text(label.to_string()))
                .unwrap_or(Cell::NotApplicable),
            trial_type: event.trial_type,
            cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeler::BlockLabel;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unit_conversion_is_exact() {
        let trigger = 1000.0;
        let events = vec![Event::new("fixation", 5000.0 - trigger, 15000.0)];
        let rows = Normalizer::new().normalize(events).unwrap();

        assert_eq!(rows[0].onset, 4.0);
        assert_eq!(rows[0].duration, 15.0);
    }

    #[test]
    fn test_sort_is_stable_for_equal_onsets() {
        let events = vec![
            Event::new("late", 9000.0, 1000.0),
            Event::new("shape_block", 4000.0, 18000.0),
            Event::new("shape_stim", 4000.0, 2000.0),
            Event::new("early", 1000.0, 3000.0),
        ];
        let rows = Normalizer::new().normalize(events).unwrap();

        let order: Vec<&str> = rows.iter().map(|r| r.trial_type.as_str()).collect();
        assert_eq!(order, vec!["early", "shape_block", "shape_stim", "late"]);
    }

    #[test]
    fn test_every_column_present() {
        let events = vec![Event::new("cue_2back", 0.0, 2500.0)
            .in_block(Some(BlockLabel::new("2Back", 1)))
            .attr(Column::StimulusType, "Body")];
        let rows = Normalizer::new().normalize(events).unwrap();

        let row = &rows[0];
        assert_eq!(row.cells.len(), Column::ALL.len());
        assert_eq!(row.block_label(), Some("2Back_Block1"));
        assert_eq!(row.cell(Column::StimulusType), &Cell::Text("Body".to_string()));
        assert_eq!(row.cell(Column::ResponseTime), &Cell::NotApplicable);
        assert_eq!(row.cell(Column::BlockMajority), &Cell::NotApplicable);
    }

    #[test]
    fn test_negative_duration_clamped() {
        let rows = Normalizer::new()
            .normalize(vec![Event::new("present_story", 1000.0, -200.0)])
            .unwrap();
        assert_eq!(rows[0].duration, 0.0);
    }

    #[test]
    fn test_non_finite_onset_rejected() {
        let err = Normalizer::new()
            .normalize(vec![Event::new("movie", f64::NAN, 1000.0)])
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnitConsistency { column: "onset", .. }
        ));
    }
}
