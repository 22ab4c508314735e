//! EMOTION task (shape/face matching)
//!
//! Each block opens with a shape or face prompt row followed by the matching
//! trials. Cue durations run to the first stimulus of the block.

use super::timing::{block_duration, derive_duration, first_timestamp, mean, offset_from};
use super::{cue_and_trials, emit_each, TaskConverter};
use crate::error::Diagnostics;
use crate::labeler::{Block, BlockMarker, BlockScheme, IncrementRule, LabeledRecord};
use crate::types::{Column, Event, Task};
use std::collections::HashMap;

const STIM_ONSET: &str = "StimSlide.OnsetTime";
const STIM_FINISH: &str = "StimSlide.FinishTime";
const STIM_ONSET_TO_ONSET: &str = "StimSlide.OnsetToOnsetTime";
const ISI_ONSET: &str = "Fixation.OnsetTime";

const CUE_FALLBACK_MS: f64 = 1000.0;
const STIM_FALLBACK_MS: f64 = 2000.0;
const ISI_MS: f64 = 2000.0;
const BLOCK_CEILING_MS: f64 = 30000.0;

static SCHEME: BlockScheme = BlockScheme {
    indicator: "Procedure",
    markers: &[
        BlockMarker::new("ShapePromptPROC", "Shape"),
        BlockMarker::new("FacePromptPROC", "Face"),
    ],
    rule: IncrementRule::EveryMarker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stimulus {
    Shape,
    Face,
}

impl Stimulus {
    fn from_block_kind(kind: &str) -> Option<Self> {
        match kind {
            "Shape" => Some(Stimulus::Shape),
            "Face" => Some(Stimulus::Face),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Stimulus::Shape => "shape",
            Stimulus::Face => "face",
        }
    }

    fn cue_field(self) -> &'static str {
        match self {
            Stimulus::Shape => "shape.OnsetTime",
            Stimulus::Face => "face.OnsetTime",
        }
    }
}

enum Procedure {
    Prompt(Stimulus),
    Trial(Stimulus),
    Other,
}

impl Procedure {
    fn resolve(record: &LabeledRecord<'_>) -> Self {
        let indicator = record.text(SCHEME.indicator).unwrap_or_default();
        if indicator.contains("ShapePromptPROC") {
            return Procedure::Prompt(Stimulus::Shape);
        }
        if indicator.contains("FacePromptPROC") {
            return Procedure::Prompt(Stimulus::Face);
        }
        match record.label.and_then(|l| Stimulus::from_block_kind(l.kind())) {
            Some(stimulus) if record.value(STIM_ONSET).is_some() => Procedure::Trial(stimulus),
            _ => Procedure::Other,
        }
    }
}

/// Converter for the EMOTION task
pub struct EmotionConverter;

impl TaskConverter for EmotionConverter {
    fn task(&self) -> Task {
        Task::Emotion
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
        // last valid cue duration per stimulus kind
        let mut cue_memory: HashMap<Stimulus, f64> = HashMap::new();

        emit_each(records, diagnostics, |window| {
            let record = window.current;
            match Procedure::resolve(record) {
                Procedure::Prompt(stimulus) => {
                    let onset = record.require(stimulus.cue_field())?;
                    let observed = window
                        .lookahead(STIM_ONSET, onset)
                        .filter(|d| *d > 0.0);
                    if let Some(d) = observed {
                        cue_memory.insert(stimulus, d);
                    }
                    let remembered = cue_memory.get(&stimulus).copied();
                    let duration = derive_duration(&[observed, remembered], CUE_FALLBACK_MS);
                    Ok(vec![Event::new(
                        format!("cue_{}", stimulus.name()),
                        onset - trigger,
                        duration,
                    )
                    .in_block(record.label)
                    .with(Column::ResponseTime, record.value("StimSlide.RT"))
                    .with(Column::Accuracy, record.value("StimSlide.ACC"))])
                }
                Procedure::Trial(stimulus) => {
                    let onset = record.require(STIM_ONSET)?;
                    let duration = derive_duration(
                        &[
                            record.number(STIM_ONSET_TO_ONSET),
                            window.lookahead(STIM_ONSET, onset),
                        ],
                        STIM_FALLBACK_MS,
                    );
                    let mut events = vec![Event::new(
                        format!("{}_stim", stimulus.name()),
                        onset - trigger,
                        duration,
                    )
                    .in_block(record.label)
                    .with(Column::ResponseTime, record.value("StimSlide.RT"))
                    .with(Column::Accuracy, record.value("StimSlide.ACC"))
                    .with(Column::Response, record.value("StimSlide.RESP"))];

                    if let Some(isi) = record.timestamp(ISI_ONSET) {
                        events.push(
                            Event::new(format!("{}_isi", stimulus.name()), isi - trigger, ISI_MS)
                                .in_block(record.label)
                                .with(Column::ResponseTime, record.value("StimSlide.RT"))
                                .with(Column::Accuracy, record.value("StimSlide.ACC")),
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
        let Some(stimulus) = Stimulus::from_block_kind(block.kind()) else {
            return Vec::new();
        };
        let Some((_, trials)) = cue_and_trials(block, diagnostics) else {
            return Vec::new();
        };

        let onset = match trials[0].require(STIM_ONSET) {
            Ok(onset) => onset,
            Err(error) => {
                diagnostics.report(trials[0].position, error);
                return Vec::new();
            }
        };

        let last = &trials[trials.len() - 1];
        let tiers = [
            last.timestamp(STIM_FINISH),
            offset_from(
                last,
                STIM_ONSET,
                Some(last.number(STIM_ONSET_TO_ONSET).unwrap_or(1000.0)),
            ),
            block.following.as_ref().and_then(|next| {
                first_timestamp(next, &["shape.OnsetTime", "face.OnsetTime"])
            }),
        ];
        let duration = block_duration(block, onset, &tiers, BLOCK_CEILING_MS, diagnostics);

        let mut event = Event::new(format!("{}_block", stimulus.name()), onset - trigger, duration)
            .in_block(Some(block.label));
        if let Some(rt) = mean(trials.iter().filter_map(|r| r.number("StimSlide.RT"))) {
            event.set(Column::ResponseTime, rt);
        }
        if let Some(acc) = mean(trials.iter().filter_map(|r| r.number("StimSlide.ACC"))) {
            event.set(Column::Accuracy, acc);
        }
        vec![event]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::schema::RawRecord;
    use crate::tasks::test_support::{find, run};

    fn prompt(kind: &str, onset: f64) -> RawRecord {
        let (procedure, field) = match kind {
            "shape" => ("ShapePromptPROC", "shape.OnsetTime"),
            _ => ("FacePromptPROC", "face.OnsetTime"),
        };
        RawRecord::new().with("Procedure", procedure).with(field, onset)
    }

    fn trial(onset: f64, rt: f64, acc: f64) -> RawRecord {
        RawRecord::new()
            .with("Procedure", "TrialsPROC")
            .with(STIM_ONSET, onset)
            .with(STIM_ONSET_TO_ONSET, 2000.0)
            .with(STIM_FINISH, onset + 2000.0)
            .with("StimSlide.RT", rt)
            .with("StimSlide.ACC", acc)
    }

    fn sample_run() -> Vec<RawRecord> {
        vec![
            RawRecord::new().with("SyncSlide.OnsetTime", 10000.0),
            prompt("shape", 11000.0),
            trial(14000.0, 700.0, 1.0),
            trial(16000.0, 900.0, 0.0),
            prompt("face", 18000.0),
            trial(21000.0, 800.0, 1.0),
        ]
    }

    #[test]
    fn test_cue_duration_from_next_stimulus() {
        let (events, diagnostics) = run(&EmotionConverter, &sample_run(), 10000.0);
        assert!(diagnostics.is_empty());

        let cues = find(&events, "cue_shape");
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].onset, 1000.0);
        assert_eq!(cues[0].duration, 3000.0);

        let face_cue = find(&events, "cue_face");
        assert_eq!(face_cue[0].duration, 3000.0);
    }

    #[test]
    fn test_cue_fallback_uses_memory_then_literal() {
        let records = vec![
            prompt("shape", 1000.0),
            trial(4000.0, 700.0, 1.0),
            prompt("shape", 8000.0),
            prompt("face", 9000.0),
        ];
        let (events, _) = run(&EmotionConverter, &records, 0.0);

        let shape_cues = find(&events, "cue_shape");
        assert_eq!(shape_cues[1].duration, 3000.0);
        let face_cues = find(&events, "cue_face");
        assert_eq!(face_cues[0].duration, CUE_FALLBACK_MS);
    }

    #[test]
    fn test_block_event_spans_trials() {
        let (events, _) = run(&EmotionConverter, &sample_run(), 10000.0);

        let blocks = find(&events, "shape_block");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].onset, 4000.0);
        assert_eq!(blocks[0].duration, 4000.0);
        assert_eq!(blocks[0].get(Column::ResponseTime).and_then(|v| v.as_f64()), Some(800.0));
        assert_eq!(blocks[0].get(Column::Accuracy).and_then(|v| v.as_f64()), Some(0.5));
        assert_eq!(blocks[0].block.map(|b| b.to_string()), Some("Shape_Block1".to_string()));

        assert_eq!(find(&events, "shape_stim").len(), 2);
        assert_eq!(find(&events, "face_block").len(), 1);
    }

    #[test]
    fn test_cue_and_isi_carry_row_responses() {
        let records = vec![
            prompt("shape", 1000.0)
                .with("StimSlide.RT", 0.0)
                .with("StimSlide.ACC", 0.0),
            trial(4000.0, 700.0, 1.0).with(ISI_ONSET, 6000.0),
        ];
        let (events, _) = run(&EmotionConverter, &records, 0.0);

        let cue = find(&events, "cue_shape")[0];
        assert_eq!(cue.get(Column::ResponseTime).and_then(|v| v.as_f64()), Some(0.0));
        assert_eq!(cue.get(Column::Accuracy).and_then(|v| v.as_f64()), Some(0.0));

        let isi = find(&events, "shape_isi")[0];
        assert_eq!((isi.onset, isi.duration), (6000.0, ISI_MS));
        assert_eq!(isi.get(Column::ResponseTime).and_then(|v| v.as_f64()), Some(700.0));
        assert_eq!(isi.get(Column::Accuracy).and_then(|v| v.as_f64()), Some(1.0));
    }

    #[test]
    fn test_prompt_only_block_is_reported() {
        let records = vec![prompt("face", 1000.0), prompt("shape", 5000.0), trial(8000.0, 1.0, 1.0)];
        let (events, diagnostics) = run(&EmotionConverter, &records, 0.0);

        assert!(find(&events, "face_block").is_empty());
        assert_eq!(find(&events, "shape_block").len(), 1);
        assert!(diagnostics
            .issues()
            .iter()
            .any(|issue| matches!(&issue.error, ConvertError::EmptyBlock(b) if b == "Face_Block1")));
    }

    #[test]
    fn test_missing_prompt_onset_skips_only_that_row() {
        let records = vec![
            RawRecord::new().with("Procedure", "ShapePromptPROC"),
            trial(4000.0, 700.0, 1.0),
        ];
        let (events, diagnostics) = run(&EmotionConverter, &records, 0.0);

        assert!(find(&events, "cue_shape").is_empty());
        assert_eq!(find(&events, "shape_stim").len(), 1);
        assert_eq!(diagnostics.issues()[0].record, 0);
    }
}
