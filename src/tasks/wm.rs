//! WM task (0-back / 2-back working memory)

use super::timing::{block_duration, derive_duration, first_timestamp, mean, offset_from};
use super::{cue_and_trials, emit_each, TaskConverter};
use crate::error::{ConvertError, Diagnostics};
use crate::labeler::{Block, BlockMarker, BlockScheme, IncrementRule, LabeledRecord};
use crate::types::{Column, Event, Task};
use std::collections::HashMap;

const STIM_ONSET: &str = "Stim.OnsetTime";
const STIM_ONSET_TO_ONSET: &str = "Stim.OnsetToOnsetTime";
const FIX_ONSET: &str = "Fix15sec.OnsetTime";

const CUE_FALLBACK_MS: f64 = 2000.0;
const TRIAL_FALLBACK_MS: f64 = 2000.0;
const FIXATION_MS: f64 = 15000.0;
const BLOCK_CEILING_MS: f64 = 27500.0;

static SCHEME: BlockScheme = BlockScheme {
    indicator: "Procedure[Block]",
    markers: &[
        BlockMarker::new("Cue2BackPROC", "2Back"),
        BlockMarker::new("Cue0BackPROC", "0Back"),
        BlockMarker::new("Fix15secPROC", "Fix"),
    ],
    rule: IncrementRule::EveryMarker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Load {
    ZeroBack,
    TwoBack,
}

impl Load {
    fn from_block_kind(kind: &str) -> Option<Self> {
        match kind {
            "0Back" => Some(Load::ZeroBack),
            "2Back" => Some(Load::TwoBack),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Load::ZeroBack => "0back",
            Load::TwoBack => "2back",
        }
    }

    fn cue_field(self) -> &'static str {
        match self {
            Load::ZeroBack => "CueTarget.OnsetTime",
            Load::TwoBack => "Cue2Back.OnsetTime",
        }
    }
}

enum Procedure {
    Cue(Load),
    Fixation,
    Trial(Load),
    Other,
}

impl Procedure {
    fn resolve(record: &LabeledRecord<'_>) -> Self {
        let indicator = record.text(SCHEME.indicator).unwrap_or_default();
        if indicator.contains("Cue2BackPROC") {
            Procedure::Cue(Load::TwoBack)
        } else if indicator.contains("Cue0BackPROC") {
            Procedure::Cue(Load::ZeroBack)
        } else if indicator.contains("Fix15secPROC") {
            Procedure::Fixation
        } else {
            match record.label.and_then(|l| Load::from_block_kind(l.kind())) {
                Some(load) if record.value(STIM_ONSET).is_some() => Procedure::Trial(load),
                _ => Procedure::Other,
            }
        }
    }
}

/// Converter for the WM task
pub struct WorkingMemoryConverter;

impl TaskConverter for WorkingMemoryConverter {
    fn task(&self) -> Task {
        Task::WorkingMemory
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
        let mut cue_memory: HashMap<Load, f64> = HashMap::new();

        emit_each(records, diagnostics, |window| {
            let record = window.current;
            match Procedure::resolve(record) {
                Procedure::Cue(load) => {
                    let onset = record.require(load.cue_field())?;
                    let observed = window
                        .lookahead_in_block(STIM_ONSET, onset)
                        .filter(|d| *d > 0.0);
                    if let Some(d) = observed {
                        cue_memory.insert(load, d);
                    }
                    let remembered = cue_memory.get(&load).copied();
                    let duration = derive_duration(&[observed, remembered], CUE_FALLBACK_MS);
                    Ok(vec![Event::new(format!("cue_{}", load.name()), onset - trigger, duration)
                        .in_block(record.label)
                        .with(Column::StimulusType, record.value("StimType"))])
                }
                Procedure::Fixation => {
                    let onset = record.require(FIX_ONSET)?;
                    Ok(vec![Event::new("fixation", onset - trigger, FIXATION_MS)
                        .in_block(record.label)])
                }
                Procedure::Trial(load) => {
                    let Some(target) = record.text("TargetType") else {
                        return Ok(Vec::new());
                    };
                    let target = target.to_lowercase();
                    let onset = record.require(STIM_ONSET)?;
                    let duration =
                        derive_duration(&[record.number(STIM_ONSET_TO_ONSET)], TRIAL_FALLBACK_MS);
                    Ok(vec![Event::new(
                        format!("{}_{}", load.name(), target),
                        onset - trigger,
                        duration,
                    )
                    .in_block(record.label)
                    .with(Column::ResponseTime, record.value("Stim.RT"))
                    .with(Column::Accuracy, record.value("Stim.ACC"))
                    .with(Column::Response, record.value("Stim.RESP"))
                    .with(Column::StimulusType, record.value("StimType"))
                    .attr(Column::TargetType, target)])
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
        let Some(load) = Load::from_block_kind(block.kind()) else {
            return Vec::new();
        };
        let Some((_, trials)) = cue_and_trials(block, diagnostics) else {
            return Vec::new();
        };
        let Some((first, onset)) = trials
            .iter()
            .find_map(|r| r.timestamp(STIM_ONSET).map(|t| (r, t)))
        else {
            let position = trials[0].position;
            diagnostics.report(position, ConvertError::missing(position, STIM_ONSET));
            return Vec::new();
        };

        let last = &trials[trials.len() - 1];
        let tiers = [
            offset_from(last, STIM_ONSET, last.number(STIM_ONSET_TO_ONSET)),
            offset_from(last, STIM_ONSET, Some(TRIAL_FALLBACK_MS)),
            block.following.as_ref().and_then(|next| {
                first_timestamp(
                    next,
                    &[FIX_ONSET, Load::ZeroBack.cue_field(), Load::TwoBack.cue_field()],
                )
            }),
        ];
        let duration = block_duration(block, onset, &tiers, BLOCK_CEILING_MS, diagnostics);

        let mut event = Event::new(format!("{}_full", load.name()), onset - trigger, duration)
            .in_block(Some(block.label))
            .with(Column::StimulusType, first.value("StimType"));
        if let Some(rt) = mean(trials.iter().filter_map(|r| r.number("Stim.RT"))) {
            event.set(Column::ResponseTime, rt);
        }
        if let Some(acc) = mean(trials.iter().filter_map(|r| r.number("Stim.ACC"))) {
            event.set(Column::Accuracy, acc);
        }
        vec![event]
    }
}
