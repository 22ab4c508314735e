//! Block labeling
//!
//! Assigns each raw record the block it belongs to by scanning a procedure
//! indicator column for known block markers. Counters are threaded through
//! the scan as an explicit accumulator, so labeling is a pure function of the
//! record sequence and the task's `BlockScheme`.

use crate::error::ConvertError;
use crate::schema::{FieldValue, RawRecord};
use std::collections::HashMap;
use std::fmt;

/// Block identity: block kind plus its 1-based index among blocks of that kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockLabel {
    kind: &'static str,
    index: u32,
}

impl BlockLabel {
    pub fn new(kind: &'static str, index: u32) -> Self {
        Self { kind, index }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for BlockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_Block{}", self.kind, self.index)
    }
}

/// When a recurring marker opens a new block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementRule {
    /// Every row bearing a marker opens a new block of that kind
    EveryMarker,
    /// Only a change of block kind opens a new block
    OnTransition,
}

/// Substring pattern in the indicator column that marks a block kind
#[derive(Debug, Clone, Copy)]
pub struct BlockMarker {
    pub pattern: &'static str,
    pub kind: &'static str,
}

impl BlockMarker {
    pub const fn new(pattern: &'static str, kind: &'static str) -> Self {
        Self { pattern, kind }
    }
}

/// Task-specific block structure
#[derive(Debug, Clone, Copy)]
pub struct BlockScheme {
    /// Column holding the procedure name
    pub indicator: &'static str,
    /// Markers in priority order; the first match wins
    pub markers: &'static [BlockMarker],
    pub rule: IncrementRule,
}

impl BlockScheme {
    /// Block kind marked by an indicator value, if any
    pub fn match_kind(&self, indicator: &str) -> Option<&'static str> {
        self.markers
            .iter()
            .find(|marker| indicator.contains(marker.pattern))
            .map(|marker| marker.kind)
    }
}

/// A raw record together with its source position and block label
#[derive(Debug, Clone, Copy)]
pub struct LabeledRecord<'a> {
    pub position: usize,
    pub record: &'a RawRecord,
    pub label: Option<BlockLabel>,
}

impl<'a> LabeledRecord<'a> {
    pub fn value(&self, field: &str) -> Option<&'a FieldValue> {
        self.record.get(field)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.record.number(field)
    }

    pub fn timestamp(&self, field: &str) -> Option<f64> {
        self.record.timestamp(field)
    }

    pub fn text(&self, field: &str) -> Option<&'a str> {
        self.record.text(field)
    }

    /// Timestamp the record's procedure guarantees. A `0` placeholder counts
    /// as missing.
    pub fn require(&self, field: &str) -> Result<f64, ConvertError> {
        self.timestamp(field)
            .ok_or_else(|| ConvertError::missing(self.position, field))
    }

    /// `end - start`, both required
    pub fn span(&self, start_field: &str, end_field: &str) -> Result<(f64, f64), ConvertError> {
        let start = self.require(start_field)?;
        let end = self.require(end_field)?;
        Ok((start, end - start))
    }
}

#[derive(Debug, Default)]
struct LabelState {
    counters: HashMap<&'static str, u32>,
    current: Option<BlockLabel>,
}

impl LabelState {
    fn advance(&mut self, kind: &'static str, rule: IncrementRule) {
        let opens_block = match rule {
            IncrementRule::EveryMarker => true,
            IncrementRule::OnTransition => self.current.map(|label| label.kind()) != Some(kind),
        };
        if opens_block {
            let counter = self.counters.entry(kind).or_insert(0);
            *counter += 1;
            self.current = Some(BlockLabel::new(kind, *counter));
        }
    }
}

/// Label every record with the block it belongs to.
///
/// Rows whose indicator is blank or matches no marker carry the previous
/// label forward; rows before the first marker stay unlabeled.
pub fn label_blocks<'a>(records: &'a [RawRecord], scheme: &BlockScheme) -> Vec<LabeledRecord<'a>> {
    records
        .iter()
        .enumerate()
        .scan(LabelState::default(), |state, (position, record)| {
            let indicator = record.text(scheme.indicator).unwrap_or_default();
            if let Some(kind) = scheme.match_kind(indicator) {
                state.advance(kind, scheme.rule);
            }
            Some(LabeledRecord {
                position,
                record,
                label: state.current,
            })
        })
        .collect()
}

/// A maximal run of records sharing one label
#[derive(Debug, Clone)]
pub struct Block<'a> {
    pub label: BlockLabel,
    pub members: Vec<LabeledRecord<'a>>,
    /// First record after the block's last member
    pub following: Option<LabeledRecord<'a>>,
}

impl<'a> Block<'a> {
    pub fn kind(&self) -> &'static str {
        self.label.kind()
    }

    /// Position of the block's first record
    pub fn position(&self) -> usize {
        self.members.first().map(|r| r.position).unwrap_or_default()
    }

    /// The block-initiating cue row and the trial rows after it
    pub fn split_cue(&self) -> Option<(&LabeledRecord<'a>, &[LabeledRecord<'a>])> {
        self.members.split_first()
    }
}

/// Group labeled records into blocks, in order of first appearance
pub fn partition_blocks<'a>(records: &[LabeledRecord<'a>]) -> Vec<Block<'a>> {
    let mut blocks: Vec<Block<'a>> = Vec::new();
    let mut by_label: HashMap<BlockLabel, usize> = HashMap::new();

    for record in records {
        let Some(label) = record.label else { continue };
        let slot = *by_label.entry(label).or_insert_with(|| {
            blocks.push(Block {
                label,
                members: Vec::new(),
                following: None,
            });
            blocks.len() - 1
        });
        blocks[slot].members.push(*record);
    }

    for block in &mut blocks {
        if let Some(last) = block.members.last().map(|r| r.position) {
            block.following = records.iter().find(|r| r.position > last).copied();
        }
    }

    blocks
}
