//! LANGUAGE task (story comprehension vs. arithmetic)
//!
//! Every story or math row carries the whole trial: presentation, the
//! question, the answer options and the response period. Each phase becomes
//! its own event. No block-level events are produced.

use super::{emit_each, TaskConverter};
use crate::error::{ConvertError, Diagnostics};
use crate::labeler::{BlockMarker, BlockScheme, IncrementRule, LabeledRecord};
use crate::types::{Column, Event, Task};

const STORY_ONSET: &str = "PresentStoryFile.OnsetTime";
const QUESTION_ONSET: &str = "ThatWasAbout.OnsetTime";
const MATH_ONSET: &str = "PresentMathFile.OnsetTime";
const MATH_OPTIONS_ONSET: &str = "PresentMathOptions.OnsetTime";
const RESPONSE_ONSET: &str = "ResponsePeriod.OnsetTime";
const RESPONSE_FINISH: &str = "ResponsePeriod.FinishTime";

const OVERALL_ACC: (Column, &str) = (Column::OverallAcc, "OverallAcc[Trial]");
const MATH_LEVEL: (Column, &str) = (Column::MathLvl, "CurrentMathLevel[Trial]");

// ResponsePeriod.RT misses responses given before the period opens
const FIRST_OPTION_RT: (Column, &str) = (Column::ResponseTime, "FilteredTrialStats.RTFromFirstOption");
const FILTERED_RTTIME: (Column, &str) = (Column::FilteredRttime, "FilteredTrialStats.RTTIME");

static SCHEME: BlockScheme = BlockScheme {
    indicator: "Procedure[Block]",
    markers: &[
        BlockMarker::new("StoryProc", "Story"),
        BlockMarker::new("MathProc", "Math"),
        BlockMarker::new("DummyProc", "Dummy"),
        BlockMarker::new("PresentChangePROC", "Change"),
    ],
    rule: IncrementRule::EveryMarker,
};

enum Procedure {
    Story,
    Math,
    Change,
    Other,
}

impl Procedure {
    fn resolve(record: &LabeledRecord<'_>) -> Self {
        let indicator = record.text(SCHEME.indicator).unwrap_or_default();
        if indicator.contains("Story") {
            Procedure::Story
        } else if indicator.contains("Math") {
            Procedure::Math
        } else if indicator.contains("Change") {
            Procedure::Change
        } else {
            Procedure::Other
        }
    }
}

/// `{object}.OnsetTime` to `{object}.FinishTime`
fn shown(object: &str) -> (String, String) {
    (format!("{object}.OnsetTime"), format!("{object}.FinishTime"))
}

/// Builds the phase events of one trial row
struct Phases<'r, 'a> {
    record: &'r LabeledRecord<'a>,
    trigger: f64,
    events: Vec<Event>,
}

impl<'r, 'a> Phases<'r, 'a> {
    fn new(record: &'r LabeledRecord<'a>, trigger: f64) -> Self {
        Self {
            record,
            trigger,
            events: Vec::new(),
        }
    }

    /// Phase from `start` to `end` carrying the given row columns; skipped
    /// when either timestamp is missing
    fn between(&mut self, trial_type: &str, start: &str, end: &str, columns: &[(Column, &str)]) {
        let (Some(onset), Some(finish)) = (self.record.timestamp(start), self.record.timestamp(end))
        else {
            return;
        };
        let event = columns.iter().fold(
            Event::new(trial_type, onset - self.trigger, finish - onset).in_block(self.record.label),
            |event, (column, field)| event.with(*column, self.record.value(field)),
        );
        self.events.push(event);
    }

    /// Display phase of one slide object
    fn object(&mut self, trial_type: &str, object: &str, columns: &[(Column, &str)]) {
        let (start, end) = shown(object);
        self.between(trial_type, &start, &end, columns);
    }

    /// Display phase whose timestamps the row's procedure guarantees
    fn required(&mut self, trial_type: &str, object: &str) -> Result<(), ConvertError> {
        let (start, end) = shown(object);
        self.record.require(&start)?;
        self.record.require(&end)?;
        self.between(trial_type, &start, &end, &[]);
        Ok(())
    }

    fn finish(self) -> Vec<Event> {
        self.events
    }
}

/// Converter for the LANGUAGE task
pub struct LanguageConverter;

impl LanguageConverter {
    fn story(phases: &mut Phases<'_, '_>) -> Result<(), ConvertError> {
        phases.required("present_story", "PresentStoryFile")?;
        phases.between("story_to_question", STORY_ONSET, QUESTION_ONSET, &[]);
        phases.between("full_story", STORY_ONSET, RESPONSE_FINISH, &[]);
        phases.object("question_story", "ThatWasAbout", &[]);
        for (trial_type, object, word) in [
            ("story_opt1", "PresentStoryOption1", "Option1"),
            ("story_opt2", "PresentStoryOption2", "Option2"),
        ] {
            let rt = format!("{object}.RT");
            let acc = format!("{object}.ACC");
            let resp = format!("{object}.RESP");
            phases.object(
                trial_type,
                object,
                &[
                    (Column::WordOpt, word),
                    (Column::ResponseTime, rt.as_str()),
                    (Column::Accuracy, acc.as_str()),
                    (Column::Response, resp.as_str()),
                    OVERALL_ACC,
                ],
            );
        }
        phases.between(
            "story_answer",
            RESPONSE_ONSET,
            RESPONSE_FINISH,
            &[
                FIRST_OPTION_RT,
                FILTERED_RTTIME,
                (Column::Accuracy, "FilteredTrialStats.ACC"),
                (Column::Response, "FilteredTrialStats.RESP"),
                OVERALL_ACC,
            ],
        );
        Ok(())
    }

    fn math(phases: &mut Phases<'_, '_>) -> Result<(), ConvertError> {
        phases.required("present_math", "PresentMathFile")?;
        phases.between("full_math", MATH_ONSET, RESPONSE_FINISH, &[]);
        phases.between("math_to_question", MATH_ONSET, MATH_OPTIONS_ONSET, &[]);
        phases.object("question_math", "PresentMathOptions", &[MATH_LEVEL]);
        phases.between(
            "math_answer",
            RESPONSE_ONSET,
            RESPONSE_FINISH,
            &[
                FIRST_OPTION_RT,
                FILTERED_RTTIME,
                (Column::Accuracy, "ResponsePeriod.ACC"),
                (Column::Response, "ResponsePeriod.RESP"),
                MATH_LEVEL,
                OVERALL_ACC,
            ],
        );
        Ok(())
    }
}

impl TaskConverter for LanguageConverter {
    fn task(&self) -> Task {
        Task::Language
    }

    fn trigger_field(&self) -> &'static str {
        "GetReady.OffsetTime"
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
            let mut phases = Phases::new(record, trigger);
            match Procedure::resolve(record) {
                Procedure::Story => Self::story(&mut phases)?,
                Procedure::Math => Self::math(&mut phases)?,
                Procedure::Change => phases.required("change", "PresentBlockChange")?,
                Procedure::Other => {}
            }
            Ok(phases.finish())
        })
    }
}
