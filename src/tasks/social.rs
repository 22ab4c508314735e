//! SOCIAL task (theory-of-mind movie clips)

use super::timing::derive_duration;
use super::{emit_each, TaskConverter};
use crate::error::Diagnostics;
use crate::labeler::{BlockMarker, BlockScheme, IncrementRule, LabeledRecord};
use crate::types::{Column, Event, Task};

const MOVIE_ONSET: &str = "MovieSlide.OnsetTime";
const MOVIE_ONSET_TO_ONSET: &str = "MovieSlide.OnsetToOnsetTime";
const RESPONSE_ONSET: &str = "ResponseSlide.OnsetTime";
const RESPONSE_ONSET_TO_ONSET: &str = "ResponseSlide.OnsetToOnsetTime";
const FIX_ONSET: &str = "FixationBlock.OnsetTime";

const MOVIE_FALLBACK_MS: f64 = 20000.0;
const RESPONSE_FALLBACK_MS: f64 = 3000.0;
const FIXATION_FALLBACK_MS: f64 = 15000.0;

static SCHEME: BlockScheme = BlockScheme {
    indicator: "Procedure",
    markers: &[
        BlockMarker::new("SOCIALrunPROC", "Social"),
        BlockMarker::new("FixationBlockPROC", "Fix"),
    ],
    rule: IncrementRule::EveryMarker,
};

enum Procedure {
    Movie,
    Fixation,
    Other,
}

impl Procedure {
    fn resolve(record: &LabeledRecord<'_>) -> Self {
        let indicator = record.text(SCHEME.indicator).unwrap_or_default();
        if indicator.contains("SOCIALrunPROC") {
            Procedure::Movie
        } else if indicator.contains("FixationBlockPROC") {
            Procedure::Fixation
        } else {
            Procedure::Other
        }
    }
}

/// Converter for the SOCIAL task
pub struct SocialConverter;

impl TaskConverter for SocialConverter {
    fn task(&self) -> Task {
        Task::Social
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
                Procedure::Movie => {
                    let movie = record.require(MOVIE_ONSET)?;
                    let social_type = record.value("Type");
                    let response_time = record.value("ResponseSlide.RT");
                    let accuracy = record.value("ResponseSlide.ACC");
                    let answer = record.value("ResponseSlide.RESP");
                    let movie_duration = derive_duration(
                        &[
                            record.number(MOVIE_ONSET_TO_ONSET),
                            record.timestamp(RESPONSE_ONSET).map(|t| t - movie),
                        ],
                        MOVIE_FALLBACK_MS,
                    );

                    let mut events = Vec::with_capacity(3);
                    let mut end = movie + movie_duration;
                    if let Some(response) = record.timestamp(RESPONSE_ONSET) {
                        let duration = derive_duration(
                            &[record.number(RESPONSE_ONSET_TO_ONSET)],
                            RESPONSE_FALLBACK_MS,
                        );
                        end = response + duration;
                        events.push(
                            Event::new("response", response - trigger, duration)
                                .in_block(record.label)
                                .with(Column::ResponseTime, response_time)
                                .with(Column::Accuracy, accuracy)
                                .with(Column::Response, answer)
                                .with(Column::SocialType, social_type),
                        );
                    }
                    events.push(
                        Event::new("movie", movie - trigger, movie_duration)
                            .in_block(record.label)
                            .with(Column::SocialType, social_type),
                    );
                    events.push(
                        Event::new("social_full", movie - trigger, end - movie)
                            .in_block(record.label)
                            .with(Column::ResponseTime, response_time)
                            .with(Column::Accuracy, accuracy)
                            .with(Column::Response, answer)
                            .with(Column::SocialType, social_type),
                    );
                    Ok(events)
                }
                Procedure::Fixation => {
                    let onset = record.require(FIX_ONSET)?;
                    let duration = derive_duration(
                        &[window.lookahead_any(MOVIE_ONSET, onset)],
                        FIXATION_FALLBACK_MS,
                    );
                    Ok(vec![Event::new("fixation", onset - trigger, duration)
                        .in_block(record.label)])
                }
                Procedure::Other => Ok(Vec::new()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawRecord;
    use crate::tasks::test_support::{find, run};

    fn movie(onset: f64, kind: &str) -> RawRecord {
        RawRecord::new()
            .with("Procedure", "SOCIALrunPROC")
            .with("Type", kind)
            .with(MOVIE_ONSET, onset)
            .with(MOVIE_ONSET_TO_ONSET, 20000.0)
            .with(RESPONSE_ONSET, onset + 20000.0)
            .with(RESPONSE_ONSET_TO_ONSET, 3000.0)
            .with("ResponseSlide.RT", 1100.0)
            .with("ResponseSlide.ACC", 1.0)
            .with("ResponseSlide.RESP", 2.0)
    }

    fn fixation(onset: f64) -> RawRecord {
        RawRecord::new()
            .with("Procedure", "FixationBlockPROC")
            .with(FIX_ONSET, onset)
    }

    #[test]
    fn test_movie_events_carry_social_type() {
        let (events, diagnostics) = run(&SocialConverter, &[movie(10000.0, "Mental")], 8000.0);
        assert!(diagnostics.is_empty());

        let trial_types: Vec<&str> = events.iter().map(|e| e.trial_type.as_str()).collect();
        assert_eq!(trial_types, vec!["response", "movie", "social_full"]);

        let full = find(&events, "social_full");
        assert_eq!((full[0].onset, full[0].duration), (2000.0, 23000.0));
        for event in &events {
            assert_eq!(
                event.get(Column::SocialType).and_then(|v| v.as_str()),
                Some("Mental")
            );
        }
    }

    #[test]
    fn test_response_columns_on_response_and_full() {
        let (events, _) = run(&SocialConverter, &[movie(10000.0, "Mental")], 0.0);

        for trial_type in ["response", "social_full"] {
            let event = find(&events, trial_type)[0];
            assert_eq!(event.get(Column::ResponseTime).and_then(|v| v.as_f64()), Some(1100.0));
            assert_eq!(event.get(Column::Accuracy).and_then(|v| v.as_f64()), Some(1.0));
            assert_eq!(event.get(Column::Response).and_then(|v| v.as_f64()), Some(2.0));
        }
        let movie = find(&events, "movie")[0];
        assert_eq!(movie.get(Column::ResponseTime), None);
    }

    #[test]
    fn test_fixation_runs_to_next_movie() {
        let records = vec![
            fixation(1000.0),
            RawRecord::new().with("Procedure", "InstructionPROC"),
            movie(16500.0, "Random"),
            fixation(40000.0),
        ];
        let (events, _) = run(&SocialConverter, &records, 0.0);

        let fixations = find(&events, "fixation");
        assert_eq!(fixations[0].duration, 15500.0);
        assert_eq!(fixations[1].duration, FIXATION_FALLBACK_MS);
    }
}
