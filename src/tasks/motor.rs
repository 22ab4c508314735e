//! MOTOR task (hand, foot and tongue movement blocks)

use super::timing::{block_duration, derive_duration, offset_from};
use super::{cue_and_trials, emit_each, TaskConverter};
use crate::error::Diagnostics;
use crate::labeler::{Block, BlockMarker, BlockScheme, IncrementRule, LabeledRecord};
use crate::types::{Event, Task};

const FIX_ONSET: &str = "Fixdot.OnsetTime";
const BLANK_ONSET: &str = "BLANK.OnsetTime";

const CUE_FALLBACK_MS: f64 = 3000.0;
const FIXATION_MS: f64 = 18000.0;
const BLANK_MS: f64 = 1000.0;
const BLOCK_CEILING_MS: f64 = 12000.0;

static SCHEME: BlockScheme = BlockScheme {
    indicator: "Procedure[Trial]",
    markers: &[
        BlockMarker::new("LeftHand", "LeftHand"),
        BlockMarker::new("RightHand", "RightHand"),
        BlockMarker::new("LeftFoot", "LeftFoot"),
        BlockMarker::new("RightFoot", "RightFoot"),
        BlockMarker::new("Tongue", "Tongue"),
        BlockMarker::new("Fix", "Fix"),
    ],
    rule: IncrementRule::EveryMarker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effector {
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
    Tongue,
}

impl Effector {
    const ALL: [Effector; 5] = [
        Effector::LeftHand,
        Effector::RightHand,
        Effector::LeftFoot,
        Effector::RightFoot,
        Effector::Tongue,
    ];

    /// Cue procedure names as written by the stimulus scripts
    fn cue_procedures(self) -> &'static [&'static str] {
        match self {
            Effector::LeftHand => &["LeftHandCueProcedure"],
            Effector::RightHand => &["RightHandCuePROC"],
            Effector::LeftFoot => &["LeftFootCuePROC"],
            Effector::RightFoot => &["RightFoottCuePROC", "RightFootCuePROC"],
            Effector::Tongue => &["TongueCuePROC"],
        }
    }

    fn block_kind(self) -> &'static str {
        match self {
            Effector::LeftHand => "LeftHand",
            Effector::RightHand => "RightHand",
            Effector::LeftFoot => "LeftFoot",
            Effector::RightFoot => "RightFoot",
            Effector::Tongue => "Tongue",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Effector::LeftHand => "lefthand",
            Effector::RightHand => "righthand",
            Effector::LeftFoot => "leftfoot",
            Effector::RightFoot => "rightfoot",
            Effector::Tongue => "tongue",
        }
    }

    fn cue_field(self) -> &'static str {
        match self {
            Effector::LeftHand => "LeftHandCue.OnsetTime",
            Effector::RightHand => "RightHandCue.OnsetTime",
            Effector::LeftFoot => "LeftFootCue.OnsetTime",
            Effector::RightFoot => "RightFootCue.OnsetTime",
            Effector::Tongue => "TongueCue.OnsetTime",
        }
    }

    /// Fixation cross shown during movement
    fn cross_field(self) -> &'static str {
        match self {
            Effector::LeftHand | Effector::LeftFoot => "CrossLeft.OnsetTime",
            Effector::RightHand | Effector::RightFoot => "CrossRight.OnsetTime",
            Effector::Tongue => "CrossCenter.OnsetTime",
        }
    }

    fn from_block_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.block_kind() == kind)
    }

    fn from_cue_procedure(procedure: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.cue_procedures().iter().any(|name| *name == procedure))
    }
}

enum Procedure {
    Cue(Effector),
    Fixation,
    Other,
}

impl Procedure {
    fn resolve(record: &LabeledRecord<'_>) -> Self {
        let indicator = record.text(SCHEME.indicator).unwrap_or_default();
        if let Some(effector) = Effector::from_cue_procedure(indicator) {
            Procedure::Cue(effector)
        } else if indicator == "FixPROC" {
            Procedure::Fixation
        } else {
            Procedure::Other
        }
    }
}

/// Onset of whatever starts a record: a cue, a fixation or a movement cross
fn record_onset(record: &LabeledRecord<'_>) -> Option<f64> {
    Effector::ALL
        .into_iter()
        .find_map(|e| record.timestamp(e.cue_field()))
        .or_else(|| record.timestamp(FIX_ONSET))
}

/// Converter for the MOTOR task
pub struct MotorConverter;

impl TaskConverter for MotorConverter {
    fn task(&self) -> Task {
        Task::Motor
    }

    fn trigger_field(&self) -> &'static str {
        "CountDownSlide.OnsetTime"
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
                Procedure::Cue(effector) => {
                    let onset = record.require(effector.cue_field())?;
                    let duration = derive_duration(
                        &[window.lookahead(effector.cross_field(), onset)],
                        CUE_FALLBACK_MS,
                    );
                    Ok(vec![Event::new(
                        format!("cue_{}", effector.name()),
                        onset - trigger,
                        duration,
                    )
                    .in_block(record.label)])
                }
                Procedure::Fixation => {
                    let onset = record.require(FIX_ONSET)?;
                    Ok(vec![Event::new("fixation", onset - trigger, FIXATION_MS)
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
        let Some(effector) = Effector::from_block_kind(block.kind()) else {
            return Vec::new();
        };
        let Some((_, trials)) = cue_and_trials(block, diagnostics) else {
            return Vec::new();
        };
        let onset = match trials[0].require(effector.cross_field()) {
            Ok(onset) => onset,
            Err(error) => {
                diagnostics.report(trials[0].position, error);
                return Vec::new();
            }
        };

        let last = &trials[trials.len() - 1];
        let tiers = [
            offset_from(last, BLANK_ONSET, Some(BLANK_MS)),
            block.following.as_ref().and_then(record_onset),
        ];
        let duration = block_duration(block, onset, &tiers, BLOCK_CEILING_MS, diagnostics);

        vec![Event::new(effector.name(), onset - trigger, duration).in_block(Some(block.label))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::schema::RawRecord;
    use crate::tasks::test_support::{find, run};
    use pretty_assertions::assert_eq;

    fn cue(procedure: &str, field: &str, onset: f64) -> RawRecord {
        RawRecord::new()
            .with("Procedure[Trial]", procedure)
            .with(field, onset)
    }

    fn movement(cross: &str, onset: f64) -> RawRecord {
        RawRecord::new()
            .with("Procedure[Trial]", "CrossPROC")
            .with(cross, onset)
            .with(BLANK_ONSET, onset + 11000.0)
    }

    #[test]
    fn test_fixation_fallback_duration() {
        let records = vec![
            RawRecord::new().with("CountDownSlide.OnsetTime", 10000.0),
            cue("FixPROC", FIX_ONSET, 28000.0),
        ];
        let (events, diagnostics) = run(&MotorConverter, &records, 10000.0);

        assert!(diagnostics.is_empty());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trial_type, "fixation");
        assert_eq!(events[0].onset / 1000.0, 18.0);
        assert_eq!(events[0].duration / 1000.0, 18.0);
    }

    #[test]
    fn test_misspelled_right_foot_cue() {
        let records = vec![
            cue("RightFoottCuePROC", "RightFootCue.OnsetTime", 5000.0),
            movement("CrossRight.OnsetTime", 8000.0),
        ];
        let (events, diagnostics) = run(&MotorConverter, &records, 0.0);
        assert!(diagnostics.is_empty());

        let summary: Vec<(&str, f64, f64)> = events
            .iter()
            .map(|e| (e.trial_type.as_str(), e.onset, e.duration))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("cue_rightfoot", 5000.0, 3000.0),
                ("rightfoot", 8000.0, 12000.0),
            ]
        );
    }

    #[test]
    fn test_block_end_from_following_record() {
        let records = vec![
            cue("TongueCuePROC", "TongueCue.OnsetTime", 1000.0),
            RawRecord::new()
                .with("Procedure[Trial]", "CrossPROC")
                .with("CrossCenter.OnsetTime", 4000.0),
            cue("LeftHandCueProcedure", "LeftHandCue.OnsetTime", 16000.0),
        ];
        let (events, _) = run(&MotorConverter, &records, 0.0);

        let tongue = find(&events, "tongue");
        assert_eq!(tongue[0].onset, 4000.0);
        assert_eq!(tongue[0].duration, 12000.0);
        assert_eq!(tongue[0].block.map(|b| b.to_string()), Some("Tongue_Block1".to_string()));

        let left_cue = find(&events, "cue_lefthand");
        assert_eq!(left_cue[0].duration, CUE_FALLBACK_MS);
    }

    #[test]
    fn test_missing_cross_onset_reports_block() {
        let records = vec![
            cue("LeftFootCuePROC", "LeftFootCue.OnsetTime", 1000.0),
            RawRecord::new().with("Procedure[Trial]", "CrossPROC"),
        ];
        let (events, diagnostics) = run(&MotorConverter, &records, 0.0);

        assert!(find(&events, "leftfoot").is_empty());
        assert!(matches!(
            &diagnostics.issues()[0].error,
            ConvertError::MissingField { record: 1, field } if field == "CrossLeft.OnsetTime"
        ));
    }
}
