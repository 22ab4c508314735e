//! RELATIONAL task (relational vs. control matching)

use super::timing::{block_duration, derive_duration, first_timestamp, mean, offset_from};
use super::{cue_and_trials, emit_each, TaskConverter};
use crate::error::Diagnostics;
use crate::labeler::{Block, BlockMarker, BlockScheme, IncrementRule, LabeledRecord};
use crate::types::{Column, Event, Task};

const FIX_ONSET: &str = "FixationBlock.OnsetTime";
const FIX_FINISH: &str = "FixationBlock.FinishTime";

const BLANK_FALLBACK_MS: f64 = 500.0;
const BLOCK_CEILING_MS: f64 = 16000.0;

static SCHEME: BlockScheme = BlockScheme {
    indicator: "Procedure",
    markers: &[
        BlockMarker::new("RelationalPromptPROC", "Relation"),
        BlockMarker::new("ControlPromptPROC", "Control"),
        BlockMarker::new("FixationPROC", "Fix"),
    ],
    rule: IncrementRule::EveryMarker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Relation,
    Control,
}

/// Column names of one condition's slide objects
struct Objects {
    prompt: &'static str,
    slide: &'static str,
    blank: &'static str,
}

impl Condition {
    fn from_block_kind(kind: &str) -> Option<Self> {
        match kind {
            "Relation" => Some(Condition::Relation),
            "Control" => Some(Condition::Control),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Condition::Relation => "relation",
            Condition::Control => "control",
        }
    }

    fn objects(self) -> Objects {
        match self {
            Condition::Relation => Objects {
                prompt: "RelationalPrompt",
                slide: "RelationalSlide",
                blank: "RelationalBlank",
            },
            Condition::Control => Objects {
                prompt: "ControlPrompt",
                slide: "ControlSlide",
                blank: "ControlBlank",
            },
        }
    }
}

fn field(object: &str, attribute: &str) -> String {
    format!("{object}.{attribute}")
}

enum Procedure {
    Prompt(Condition),
    Fixation,
    Trial(Condition),
    Other,
}

impl Procedure {
    fn resolve(record: &LabeledRecord<'_>) -> Self {
        let indicator = record.text(SCHEME.indicator).unwrap_or_default();
        if indicator.contains("RelationalPromptPROC") {
            Procedure::Prompt(Condition::Relation)
        } else if indicator.contains("ControlPromptPROC") {
            Procedure::Prompt(Condition::Control)
        } else if indicator.contains("FixationPROC") {
            Procedure::Fixation
        } else {
            match record.label.and_then(|l| Condition::from_block_kind(l.kind())) {
                Some(condition)
                    if record
                        .value(&field(condition.objects().slide, "OnsetTime"))
                        .is_some() =>
                {
                    Procedure::Trial(condition)
                }
                _ => Procedure::Other,
            }
        }
    }
}

/// Onset of a prompt or fixation record
fn record_onset(record: &LabeledRecord<'_>) -> Option<f64> {
    first_timestamp(
        record,
        &[
            "RelationalPrompt.OnsetTime",
            "ControlPrompt.OnsetTime",
            FIX_ONSET,
        ],
    )
}

/// Converter for the RELATIONAL task
pub struct RelationalConverter;

impl TaskConverter for RelationalConverter {
    fn task(&self) -> Task {
        Task::Relational
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
                Procedure::Prompt(condition) => {
                    let prompt = condition.objects().prompt;
                    let (onset, duration) = record
                        .span(&field(prompt, "OnsetTime"), &field(prompt, "OffsetTime"))?;
                    Ok(vec![Event::new(
                        format!("{}_prompt", condition.name()),
                        onset - trigger,
                        duration,
                    )
                    .in_block(record.label)])
                }
                Procedure::Fixation => {
                    let (onset, duration) = record.span(FIX_ONSET, FIX_FINISH)?;
                    Ok(vec![Event::new("fix_block", onset - trigger, duration)
                        .in_block(record.label)])
                }
                Procedure::Trial(condition) => {
                    let objects = condition.objects();
                    let (onset, duration) = record.span(
                        &field(objects.slide, "OnsetTime"),
                        &field(objects.slide, "FinishTime"),
                    )?;
                    let mut events = vec![Event::new(
                        format!("{}_stim", condition.name()),
                        onset - trigger,
                        duration,
                    )
                    .in_block(record.label)
                    .with(Column::StimulusType, record.value("Instruction"))
                    .with(Column::ResponseTime, record.value(&field(objects.slide, "RT")))
                    .with(Column::Accuracy, record.value(&field(objects.slide, "ACC")))
                    .with(Column::Response, record.value(&field(objects.slide, "RESP")))];

                    let blank_onset_field = field(objects.blank, "OnsetTime");
                    if let Some(blank) = record.timestamp(&blank_onset_field) {
                        let finish = record
                            .timestamp(&field(objects.blank, "FinishTime"))
                            .map(|t| t - blank);
                        let duration = derive_duration(
                            &[record.number(&field(objects.blank, "OnsetToOnsetTime")), finish],
                            BLANK_FALLBACK_MS,
                        );
                        events.push(
                            Event::new(format!("{}_blank", condition.name()), blank - trigger, duration)
                                .in_block(record.label),
                        );
                    }
                    Ok(events)
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
        let Some(condition) = Condition::from_block_kind(block.kind()) else {
            return Vec::new();
        };
        let Some((_, trials)) = cue_and_trials(block, diagnostics) else {
            return Vec::new();
        };
        let objects = condition.objects();
        let slide_onset = field(objects.slide, "OnsetTime");
        let onset = match trials[0].require(&slide_onset) {
            Ok(onset) => onset,
            Err(error) => {
                diagnostics.report(trials[0].position, error);
                return Vec::new();
            }
        };

        let last = &trials[trials.len() - 1];
        let blank_onset = field(objects.blank, "OnsetTime");
        let tiers = [
            last.timestamp(&field(objects.blank, "FinishTime")),
            offset_from(
                last,
                &blank_onset,
                last.number(&field(objects.blank, "OnsetToOnsetTime")),
            ),
            block.following.as_ref().and_then(record_onset),
        ];
        let duration = block_duration(block, onset, &tiers, BLOCK_CEILING_MS, diagnostics);

        let mut event = Event::new(format!("{}_block", condition.name()), onset - trigger, duration)
            .in_block(Some(block.label));
        let rt_field = field(objects.slide, "RT");
        let acc_field = field(objects.slide, "ACC");
        if let Some(rt) = mean(trials.iter().filter_map(|r| r.number(&rt_field))) {
            event.set(Column::ResponseTime, rt);
        }
        if let Some(acc) = mean(trials.iter().filter_map(|r| r.number(&acc_field))) {
            event.set(Column::Accuracy, acc);
        }
        vec![event]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawRecord;
    use crate::tasks::test_support::{find, run};

    fn prompt(onset: f64) -> RawRecord {
        RawRecord::new()
            .with("Procedure", "RelationalPromptPROC")
            .with("RelationalPrompt.OnsetTime", onset)
            .with("RelationalPrompt.OffsetTime", onset + 1500.0)
    }

    fn relation_trial(onset: f64, rt: f64) -> RawRecord {
        RawRecord::new()
            .with("Procedure", "RelationalTrialPROC")
            .with("Instruction", "shape")
            .with("RelationalSlide.OnsetTime", onset)
            .with("RelationalSlide.FinishTime", onset + 3500.0)
            .with("RelationalSlide.RT", rt)
            .with("RelationalSlide.ACC", 1.0)
            .with("RelationalSlide.RESP", 2.0)
            .with("RelationalBlank.OnsetTime", onset + 3500.0)
            .with("RelationalBlank.OnsetToOnsetTime", 500.0)
            .with("RelationalBlank.FinishTime", onset + 4000.0)
    }

    #[test]
    fn test_prompt_and_trial_events() {
        let records = vec![prompt(2000.0), relation_trial(4000.0, 1800.0)];
        let (events, diagnostics) = run(&RelationalConverter, &records, 1000.0);
        assert!(diagnostics.is_empty());

        let prompt = find(&events, "relation_prompt");
        assert_eq!((prompt[0].onset, prompt[0].duration), (1000.0, 1500.0));

        let stim = find(&events, "relation_stim");
        assert_eq!((stim[0].onset, stim[0].duration), (3000.0, 3500.0));
        assert_eq!(stim[0].get(Column::StimulusType).and_then(|v| v.as_str()), Some("shape"));

        let blank = find(&events, "relation_blank");
        assert_eq!((blank[0].onset, blank[0].duration), (6500.0, 500.0));
    }

    #[test]
    fn test_block_spans_to_last_blank_finish() {
        let records = vec![
            prompt(2000.0),
            relation_trial(4000.0, 1800.0),
            relation_trial(8000.0, 2200.0),
        ];
        let (events, _) = run(&RelationalConverter, &records, 0.0);

        let block = find(&events, "relation_block");
        assert_eq!(block.len(), 1);
        assert_eq!(block[0].onset, 4000.0);
        assert_eq!(block[0].duration, 8000.0);
        assert_eq!(block[0].get(Column::ResponseTime).and_then(|v| v.as_f64()), Some(2000.0));
    }

    #[test]
    fn test_fixation_block_span() {
        let records = vec![RawRecord::new()
            .with("Procedure", "FixationPROC")
            .with(FIX_ONSET, 50000.0)
            .with(FIX_FINISH, 66000.0)];
        let (events, _) = run(&RelationalConverter, &records, 0.0);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trial_type, "fix_block");
        assert_eq!(events[0].duration, 16000.0);
    }

    #[test]
    fn test_prompt_without_offset_is_skipped() {
        let records = vec![
            RawRecord::new()
                .with("Procedure", "ControlPromptPROC")
                .with("ControlPrompt.OnsetTime", 2000.0),
        ];
        let (events, diagnostics) = run(&RelationalConverter, &records, 0.0);

        assert!(find(&events, "control_prompt").is_empty());
        assert_eq!(diagnostics.issues()[0].record, 0);
    }
}
