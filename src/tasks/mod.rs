//! Per-task converters
//!
//! Each HCP paradigm has its own block structure and column contract. A
//! `TaskConverter` bundles the three task-specific stages (block scheme,
//! trial emission, block synthesis) behind one object so the pipeline can
//! run every task the same way.

mod emotion;
mod gambling;
mod language;
mod motor;
mod relational;
mod social;
pub mod timing;
mod wm;

pub use emotion::EmotionConverter;
pub use gambling::GamblingConverter;
pub use language::LanguageConverter;
pub use motor::MotorConverter;
pub use relational::RelationalConverter;
pub use social::SocialConverter;
pub use wm::WorkingMemoryConverter;

use crate::error::{ConvertError, Diagnostics};
use crate::labeler::{Block, BlockScheme, LabeledRecord};
use crate::types::{Event, Task};
use timing::{windows, Window};

/// Trait for converting one task's labeled records to events
pub trait TaskConverter: Sync {
    /// Task handled by this converter
    fn task(&self) -> Task;

    /// Column holding the scan trigger time
    fn trigger_field(&self) -> &'static str;

    fn block_scheme(&self) -> &'static BlockScheme;

    /// Per-record events. Records that violate the task's column contract
    /// are reported and skipped.
    fn emit_trial_events(
        &self,
        records: &[LabeledRecord<'_>],
        trigger: f64,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Event>;

    /// Aggregate events for one block
    fn synthesize_block_events(
        &self,
        _block: &Block<'_>,
        _trigger: f64,
        _diagnostics: &mut Diagnostics,
    ) -> Vec<Event> {
        Vec::new()
    }

    /// Block-level tagging applied once every event exists
    fn annotate(&self, events: Vec<Event>, _blocks: &[Block<'_>]) -> Vec<Event> {
        events
    }
}

/// Converter registered for a task
pub fn converter_for(task: Task) -> &'static dyn TaskConverter {
    match task {
        Task::Emotion => &EmotionConverter,
        Task::Gambling => &GamblingConverter,
        Task::Language => &LanguageConverter,
        Task::Motor => &MotorConverter,
        Task::Relational => &RelationalConverter,
        Task::Social => &SocialConverter,
        Task::WorkingMemory => &WorkingMemoryConverter,
    }
}

/// Run `emit` over every record window, reporting failures per record
pub(crate) fn emit_each<'s, 'a, F>(
    records: &'s [LabeledRecord<'a>],
    diagnostics: &mut Diagnostics,
    mut emit: F,
) -> Vec<Event>
where
    F: FnMut(Window<'s, 'a>) -> Result<Vec<Event>, ConvertError>,
{
    let mut events = Vec::new();
    for window in windows(records) {
        match emit(window) {
            Ok(mut emitted) => events.append(&mut emitted),
            Err(error) => diagnostics.report(window.current.position, error),
        }
    }
    events
}

/// Split off the block's cue row, reporting blocks with no trials after it
pub(crate) fn cue_and_trials<'b, 'a>(
    block: &'b Block<'a>,
    diagnostics: &mut Diagnostics,
) -> Option<(&'b LabeledRecord<'a>, &'b [LabeledRecord<'a>])> {
    match block.split_cue() {
        Some((cue, trials)) if !trials.is_empty() => Some((cue, trials)),
        _ => {
            diagnostics.report(
                block.position(),
                ConvertError::EmptyBlock(block.label.to_string()),
            );
            None
        }
    }
}
