//! GAMBLING task (card guessing)
//!
//! Consecutive gambling trials form one block; a fixation row closes it.
//! Blocks are tagged after emission with the majority of their trial
//! outcomes.

use super::timing::{block_duration, derive_duration, first_timestamp, offset_from};
use super::{emit_each, TaskConverter};
use crate::error::{ConvertError, Diagnostics};
use crate::labeler::{Block, BlockLabel, BlockMarker, BlockScheme, IncrementRule, LabeledRecord};
use crate::types::{Column, Event, Task};
use std::collections::HashMap;
use tracing::warn;

const QUESTION_ONSET: &str = "QuestionMark.OnsetTime";
const QUESTION_ONSET_TO_ONSET: &str = "QuestionMark.OnsetToOnsetTime";
const FILLER_ONSET: &str = "FillerFixation.OnsetTime";
const FILLER_ONSET_TO_ONSET: &str = "FillerFixation.OnsetToOnsetTime";
const FEEDBACK_ONSET: &str = "Feedback.OnsetTime";
const FEEDBACK_ONSET_TO_ONSET: &str = "Feedback.OnsetToOnsetTime";
const ISI_ONSET: &str = "OneSecFixation.OnsetTime";
const FIX_ONSET: &str = "FifteenSecFixation.OnsetTime";

const QUESTION_FALLBACK_MS: f64 = 1500.0;
const FEEDBACK_FALLBACK_MS: f64 = 1000.0;
const ISI_FALLBACK_MS: f64 = 1000.0;
const FIXATION_FALLBACK_MS: f64 = 15000.0;
const BLOCK_CEILING_MS: f64 = 28000.0;

static SCHEME: BlockScheme = BlockScheme {
    indicator: "Procedure[Trial]",
    markers: &[
        BlockMarker::new("GamblingTrialPROC", "Gamble"),
        BlockMarker::new("FixationBlockPROC", "Fix"),
    ],
    rule: IncrementRule::OnTransition,
};

enum Procedure {
    Trial,
    Fixation,
    Other,
}

impl Procedure {
    fn resolve(record: &LabeledRecord<'_>) -> Self {
        let indicator = record.text(SCHEME.indicator).unwrap_or_default();
        if indicator.contains("GamblingTrialPROC") {
            Procedure::Trial
        } else if indicator.contains("FixationBlockPROC") {
            Procedure::Fixation
        } else {
            Procedure::Other
        }
    }
}

/// Majority outcome of a block's trials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Majority {
    Reward,
    Punish,
    /// Equal reward and punishment counts
    Tied,
}

impl Majority {
    /// Tally `TrialType` over a block's records
    fn of(block: &Block<'_>) -> Self {
        let (reward, punish) = block
            .members
            .iter()
            .filter_map(|r| r.text("TrialType"))
            .fold((0usize, 0usize), |(reward, punish), outcome| match outcome {
                "Reward" => (reward + 1, punish),
                "Punishment" => (reward, punish + 1),
                _ => (reward, punish),
            });
        match reward.cmp(&punish) {
            std::cmp::Ordering::Greater => Majority::Reward,
            std::cmp::Ordering::Less => Majority::Punish,
            std::cmp::Ordering::Equal => {
                warn!(block = %block.label, reward, punish, "gambling block has no majority outcome");
                Majority::Tied
            }
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Majority::Reward => "reward",
            Majority::Punish => "punish",
            Majority::Tied => "tied",
        }
    }

    fn flags(self) -> (f64, f64) {
        match self {
            Majority::Reward => (1.0, 0.0),
            Majority::Punish => (0.0, 1.0),
            Majority::Tied => (0.0, 0.0),
        }
    }
}

/// Converter for the GAMBLING task
pub struct GamblingConverter;

impl GamblingConverter {
    fn trial_events(
        &self,
        record: &LabeledRecord<'_>,
        next: Option<&LabeledRecord<'_>>,
        trigger: f64,
    ) -> Result<Vec<Event>, ConvertError> {
        let question = record.require(QUESTION_ONSET)?;
        let filler = record.timestamp(FILLER_ONSET);
        let feedback = record.timestamp(FEEDBACK_ONSET);
        let block = record.label;

        let question_duration = derive_duration(
            &[
                filler.map(|f| f - question),
                record.number(QUESTION_ONSET_TO_ONSET),
            ],
            QUESTION_FALLBACK_MS,
        );
        let mut events = vec![Event::new("quest_mark", question - trigger, question_duration)
            .in_block(block)
            .with(Column::ResponseTime, record.value("QuestionMark.RT"))
            .with(Column::Accuracy, record.value("QuestionMark.ACC"))
            .with(Column::Response, record.value("QuestionMark.RESP"))
            .with(Column::RewardType, record.value("TrialType"))];

        // placeholder onsets collapse to zero-length events at the question mark
        events.push(match filler {
            Some(onset) => {
                let duration = derive_duration(
                    &[
                        record.number(FILLER_ONSET_TO_ONSET),
                        feedback.map(|f| f - onset),
                    ],
                    0.0,
                );
                Event::new("filler", onset - trigger, duration)
            }
            None => Event::new("filler", question - trigger, 0.0),
        }
        .in_block(block)
        .with(Column::ResponseTime, record.value("QuestionMark.RT"))
        .with(Column::RewardType, record.value("TrialType")));

        events.push(
            match feedback {
                Some(onset) => Event::new(
                    "feedback",
                    onset - trigger,
                    derive_duration(
                        &[record.number(FEEDBACK_ONSET_TO_ONSET)],
                        FEEDBACK_FALLBACK_MS,
                    ),
                ),
                None => Event::new("feedback", question - trigger, 0.0),
            }
            .in_block(block)
            .with(Column::FeedbackType, record.value("FeedbackNumber"))
            .with(Column::RewardType, record.value("TrialType")),
        );

        if let Some(isi) = record.timestamp(ISI_ONSET) {
            let until_next = next
                .and_then(|n| n.timestamp(QUESTION_ONSET))
                .map(|t| t - isi);
            events.push(
                Event::new(
                    "isi_1sec",
                    isi - trigger,
                    derive_duration(&[until_next], ISI_FALLBACK_MS),
                )
                .in_block(block),
            );
        }
        Ok(events)
    }
}

impl TaskConverter for GamblingConverter {
    fn task(&self) -> Task {
        Task::Gambling
    }

    fn trigger_field(&self) -> &'static str {
        "SyncSlide.OnsetTime"
    }

    fn block_scheme(&self) -> &'static BlockScheme {
        &SCHEME
    }

    fn emit_trial_events(
        &self,
        records: &[LabeledRecord<'_>],
        trigger: f64,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Event> {
        emit_each(records, diagnostics, |window| {
            let record = window.current;
            match Procedure::resolve(record) {
                Procedure::Trial => self.trial_events(record, window.next(), trigger),
                Procedure::Fixation => {
                    let onset = record.require(FIX_ONSET)?;
                    let duration = derive_duration(
                        &[window.lookahead(QUESTION_ONSET, onset)],
                        FIXATION_FALLBACK_MS,
                    );
                    Ok(vec![Event::new("fixation", onset - trigger, duration)
                        .in_block(record.label)])
                }
                Procedure::Other => Ok(Vec::new()),
            }
        })
    }

    fn synthesize_block_events(
        &self,
        block: &Block<'_>,
        trigger: f64,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Event> {
        if block.kind() != "Gamble" || block.members.len() < 2 {
            return Vec::new();
        }
        let first = &block.members[0];
        let onset = match first.require(QUESTION_ONSET) {
            Ok(onset) => onset,
            Err(error) => {
                diagnostics.report(first.position, error);
                return Vec::new();
            }
        };

        let last = &block.members[block.members.len() - 1];
        let tiers = [
            offset_from(last, FEEDBACK_ONSET, last.number(FEEDBACK_ONSET_TO_ONSET)),
            offset_from(last, ISI_ONSET, Some(ISI_FALLBACK_MS)),
            block
                .following
                .as_ref()
                .and_then(|next| first_timestamp(next, &[FIX_ONSET, QUESTION_ONSET])),
        ];
        let duration = block_duration(block, onset, &tiers, BLOCK_CEILING_MS, diagnostics);

        vec![Event::new("full_gamble", onset - trigger, duration).in_block(Some(block.label))]
    }

    fn annotate(&self, events: Vec<Event>, blocks: &[Block<'_>]) -> Vec<Event> {
        let majorities: HashMap<BlockLabel, Majority> = blocks
            .iter()
            .filter(|block| block.kind() == "Gamble")
            .map(|block| (block.label, Majority::of(block)))
            .collect();

        events
            .into_iter()
            .map(|event| {
                match event.block.and_then(|label| majorities.get(&label).copied()) {
                    Some(majority) => {
                        let (reward, punish) = majority.flags();
                        event
                            .attr(Column::MostlyReward, reward)
                            .attr(Column::MostlyPunish, punish)
                            .attr(Column::BlockMajority, majority.as_str())
                    }
                    None => event,
                }
            })
            .collect()
    }
}
