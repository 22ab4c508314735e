//! Core data types for task event conversion
//!
//! Tasks, output columns, the intermediate `Event` produced by the task
//! converters, and the normalized `EventTable` handed to downstream consumers.

use crate::error::ConvertError;
use crate::labeler::BlockLabel;
use crate::schema::FieldValue;
use crate::tasks::{converter_for, TaskConverter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HCP task-fMRI paradigms with a registered converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Task {
    Emotion,
    Gambling,
    Language,
    Motor,
    Relational,
    Social,
    #[serde(rename = "WM")]
    WorkingMemory,
}

impl Task {
    pub const ALL: [Task; 7] = [
        Task::Emotion,
        Task::Gambling,
        Task::Language,
        Task::Motor,
        Task::Relational,
        Task::Social,
        Task::WorkingMemory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Emotion => "EMOTION",
            Task::Gambling => "GAMBLING",
            Task::Language => "LANGUAGE",
            Task::Motor => "MOTOR",
            Task::Relational => "RELATIONAL",
            Task::Social => "SOCIAL",
            Task::WorkingMemory => "WM",
        }
    }

    /// Converter registered for this task
    pub fn converter(&self) -> &'static dyn TaskConverter {
        converter_for(*self)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMOTION" => Ok(Task::Emotion),
            "GAMBLING" => Ok(Task::Gambling),
            "LANGUAGE" => Ok(Task::Language),
            "MOTOR" => Ok(Task::Motor),
            "RELATIONAL" => Ok(Task::Relational),
            "SOCIAL" => Ok(Task::Social),
            "WM" | "WORKING_MEMORY" => Ok(Task::WorkingMemory),
            _ => Err(ConvertError::UnknownTask(s.to_string())),
        }
    }
}

/// Task-specific output columns, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    ResponseTime,
    Accuracy,
    Response,
    StimulusType,
    RewardType,
    FeedbackType,
    SocialType,
    MathLvl,
    OverallAcc,
    WordOpt,
    TargetType,
    FilteredRttime,
    MostlyReward,
    MostlyPunish,
    BlockMajority,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::ResponseTime,
        Column::Accuracy,
        Column::Response,
        Column::StimulusType,
        Column::RewardType,
        Column::FeedbackType,
        Column::SocialType,
        Column::MathLvl,
        Column::OverallAcc,
        Column::WordOpt,
        Column::TargetType,
        Column::FilteredRttime,
        Column::MostlyReward,
        Column::MostlyPunish,
        Column::BlockMajority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::ResponseTime => "response_time",
            Column::Accuracy => "accuracy",
            Column::Response => "response",
            Column::StimulusType => "stimulus_type",
            Column::RewardType => "reward_type",
            Column::FeedbackType => "feedback_type",
            Column::SocialType => "social_type",
            Column::MathLvl => "math_lvl",
            Column::OverallAcc => "overall_acc",
            Column::WordOpt => "word_opt",
            Column::TargetType => "target_type",
            Column::FilteredRttime => "filtered_rttime",
            Column::MostlyReward => "mostly_reward",
            Column::MostlyPunish => "mostly_punish",
            Column::BlockMajority => "block_majority",
        }
    }
}

/// Columns every output row carries before the task-specific ones
pub const CANONICAL_COLUMNS: [&str; 4] = ["onset", "duration", "trial_type", "block"];

/// A semantic event as emitted by a task converter.
///
/// `onset` is trigger-relative and, like `duration`, still in the log's
/// time unit; the normalizer converts both.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub onset: f64,
    pub duration: f64,
    pub trial_type: String,
    pub block: Option<BlockLabel>,
    pub attrs: BTreeMap<Column, FieldValue>,
}

impl Event {
    pub fn new(trial_type: impl Into<String>, onset: f64, duration: f64) -> Self {
        Self {
            onset,
            duration,
            trial_type: trial_type.into(),
            block: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn in_block(mut self, block: Option<BlockLabel>) -> Self {
        self.block = block;
        self
    }

    /// Copy a raw field into a column when present
    pub fn with(mut self, column: Column, value: Option<&FieldValue>) -> Self {
        if let Some(value) = value {
            self.attrs.insert(column, value.clone());
        }
        self
    }

    /// Set a computed column value
    pub fn attr(mut self, column: Column, value: impl Into<FieldValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: Column, value: impl Into<FieldValue>) {
        self.attrs.insert(column, value.into());
    }

    pub fn get(&self, column: Column) -> Option<&FieldValue> {
        self.attrs.get(&column)
    }
}

/// Output cell; `NotApplicable` is explicit rather than an omitted value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    NotApplicable,
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Option<&FieldValue>> for Cell {
    fn from(value: Option<&FieldValue>) -> Self {
        match value {
            Some(FieldValue::Number(n)) => Cell::Number(*n),
            Some(FieldValue::Text(s)) => Cell::Text(s.clone()),
            None => Cell::NotApplicable,
        }
    }
}

/// One normalized output row, in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub onset: f64,
    pub duration: f64,
    pub trial_type: String,
    pub block: Cell,
    /// One cell per `Column::ALL` entry
    pub cells: Vec<Cell>,
}

impl EventRow {
    pub fn cell(&self, column: Column) -> &Cell {
        &self.cells[column as usize]
    }

    pub fn block_label(&self) -> Option<&str> {
        self.block.as_str()
    }
}

/// Normalized long-format event table for one task run
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    pub task: Task,
    pub rows: Vec<EventRow>,
}

impl EventTable {
    /// Header names in output order
    pub fn columns() -> Vec<&'static str> {
        CANONICAL_COLUMNS
            .iter()
            .copied()
            .chain(Column::ALL.iter().map(Column::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with the given trial type, in table order
    pub fn of_type<'t>(&'t self, trial_type: &'t str) -> impl Iterator<Item = &'t EventRow> + 't {
        self.rows.iter().filter(move |row| row.trial_type == trial_type)
    }
}
