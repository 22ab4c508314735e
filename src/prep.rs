//! Design event preparation
//!
//! Turns a normalized event table into the `onset, duration, condition`
//! rows a first-level design matrix is built from. Two model flavours are
//! supported: `hcp`, which mirrors the published HCP block models, and
//! `alt`, which keeps finer trial types and adds reaction-time regressors.

use crate::error::ConvertError;
use crate::types::{Column, EventRow, EventTable, Task};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Condition name given to reaction-time regressors
pub const RT_CONDITION: &str = "rt";

/// Design model flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Hcp,
    Alt,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Hcp => f.write_str("hcp"),
            ModelKind::Alt => f.write_str("alt"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hcp" => Ok(ModelKind::Hcp),
            "alt" => Ok(ModelKind::Alt),
            other => Err(ConvertError::InvalidModel(other.to_string())),
        }
    }
}

/// One row of design-matrix input, in seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignEvent {
    pub onset: f64,
    pub duration: f64,
    /// Trial type after task-specific renaming; used for inclusion
    pub trial_type: String,
    /// Regressor name
    pub condition: String,
}

/// A design event and the table row it came from
#[derive(Debug, Clone)]
struct Draft<'t> {
    source: &'t EventRow,
    event: DesignEvent,
}

impl<'t> Draft<'t> {
    fn from_row(source: &'t EventRow) -> Self {
        Self {
            source,
            event: DesignEvent {
                onset: source.onset,
                duration: source.duration,
                trial_type: source.trial_type.clone(),
                condition: source.trial_type.clone(),
            },
        }
    }

    fn text(&self, column: Column) -> Option<&'t str> {
        self.source.cell(column).as_str()
    }

    fn trial_type(&self) -> &str {
        &self.event.trial_type
    }

    /// `{trial_type}_{suffix}`
    fn suffix_condition(&mut self, suffix: &str) {
        self.event.condition = format!("{}_{}", self.event.trial_type, suffix.to_lowercase());
    }
}

/// Prepare design events for a normalized table.
///
/// An empty `include` list keeps every trial type; otherwise only rows whose
/// (renamed) trial type is listed are kept.
pub fn prepare(table: &EventTable, model: ModelKind, include: &[&str]) -> Vec<DesignEvent> {
    let drafts: Vec<Draft<'_>> = table.rows.iter().map(Draft::from_row).collect();
    let keep = |draft: &Draft<'_>| {
        include.is_empty() || include.iter().any(|name| *name == draft.trial_type())
    };

    let drafts = match (table.task, model) {
        (Task::Emotion, ModelKind::Hcp) => {
            let is_emotion_block =
                |block: &str| block.starts_with("Shape_") || block.starts_with("Face_");
            filter(merge_cues(drafts, is_emotion_block, "_block"), keep)
        }
        (Task::WorkingMemory, ModelKind::Hcp) => {
            let mut drafts = filter(
                merge_cues(drafts, |block| block.contains("Back_Block"), "_full"),
                keep,
            );
            tag_stimulus_type(&mut drafts);
            drafts
        }
        (Task::WorkingMemory, ModelKind::Alt) => {
            let mut drafts = filter(
                with_rt_regressors(drafts, &[
                    "2back_nonlure",
                    "2back_target",
                    "2back_lure",
                    "0back_nonlure",
                    "0back_target",
                    "0back_lure",
                ]),
                keep,
            );
            tag_stimulus_type(&mut drafts);
            drafts
        }
        (Task::Gambling, ModelKind::Hcp) => {
            let mut drafts = filter(drafts, keep);
            for draft in &mut drafts {
                let outcome = match draft.text(Column::BlockMajority) {
                    Some("reward") => "reward",
                    Some("punish") => "loss",
                    Some("tied") => "tied",
                    _ => continue,
                };
                draft.suffix_condition(outcome);
            }
            drafts
        }
        (Task::Gambling, ModelKind::Alt) => {
            let mut drafts = drafts;
            for draft in &mut drafts {
                if draft.trial_type() == "quest_mark" {
                    let choice = match draft.source.cell(Column::Response).as_f64() {
                        Some(r) if r == 2.0 => "lwr",
                        Some(r) if r == 3.0 => "hihr",
                        _ => "othr",
                    };
                    draft.event.condition = format!("quest_{choice}");
                } else if draft.trial_type() == "feedback" {
                    if let Some(reward) = draft.text(Column::RewardType) {
                        draft.event.condition = format!("feedback_{}", reward.to_lowercase());
                    }
                }
            }
            filter(drafts, keep)
        }
        (Task::Motor, ModelKind::Hcp) => {
            let mut drafts = drafts;
            for draft in &mut drafts {
                if draft.trial_type().starts_with("cue_") {
                    draft.event.trial_type = "cue".to_string();
                    draft.event.condition = "cue".to_string();
                }
            }
            filter(drafts, keep)
        }
        (Task::Social, model) => {
            let mut drafts = filter(drafts, keep);
            for draft in &mut drafts {
                if let Some(social) = draft.text(Column::SocialType) {
                    draft.suffix_condition(social);
                }
            }
            match model {
                ModelKind::Hcp => drafts,
                ModelKind::Alt => with_rt_regressors(drafts, &["response"]),
            }
        }
        (Task::Language, ModelKind::Alt) => {
            with_rt_regressors(filter(drafts, keep), &["story_answer", "math_answer"])
        }
        (Task::Relational, ModelKind::Alt) => filter(
            with_rt_regressors(drafts, &["relation_stim", "control_stim"]),
            keep,
        ),
        (Task::Emotion | Task::Language | Task::Motor | Task::Relational, _) => {
            filter(drafts, keep)
        }
    };

    drafts.into_iter().map(|draft| draft.event).collect()
}

fn filter<'t>(drafts: Vec<Draft<'t>>, keep: impl Fn(&Draft<'t>) -> bool) -> Vec<Draft<'t>> {
    drafts.into_iter().filter(|draft| keep(draft)).collect()
}

/// Start each matching block event at its block's first cue and extend it by
/// the cue's duration
fn merge_cues<'t>(
    mut drafts: Vec<Draft<'t>>,
    block_matches: impl Fn(&str) -> bool,
    target_suffix: &str,
) -> Vec<Draft<'t>> {
    let mut first_cue: HashMap<&'t str, (f64, f64)> = HashMap::new();
    for draft in &drafts {
        if let Some(block) = draft.source.block_label() {
            if draft.source.trial_type.starts_with("cue_") {
                first_cue
                    .entry(block)
                    .or_insert((draft.source.onset, draft.source.duration));
            }
        }
    }

    for draft in &mut drafts {
        let Some(block) = draft.source.block_label() else {
            continue;
        };
        if !block_matches(block) || !draft.source.trial_type.ends_with(target_suffix) {
            continue;
        }
        if let Some((onset, duration)) = first_cue.get(block) {
            draft.event.onset = *onset;
            draft.event.duration = duration + draft.source.duration;
        }
    }
    drafts
}

/// Append a reaction-time regressor for every row of the given trial types
/// that carries a response time
fn with_rt_regressors<'t>(mut drafts: Vec<Draft<'t>>, trial_types: &[&str]) -> Vec<Draft<'t>> {
    let regressors: Vec<Draft<'t>> = drafts
        .iter()
        .filter(|draft| trial_types.iter().any(|name| *name == draft.trial_type()))
        .filter_map(|draft| {
            let rt = draft.source.cell(Column::ResponseTime).as_f64()?;
            Some(Draft {
                source: draft.source,
                event: DesignEvent {
                    onset: draft.event.onset,
                    duration: rt / 1000.0,
                    trial_type: RT_CONDITION.to_string(),
                    condition: RT_CONDITION.to_string(),
                },
            })
        })
        .collect();
    drafts.extend(regressors);
    drafts
}

fn tag_stimulus_type(drafts: &mut [Draft<'_>]) {
    for draft in drafts {
        if draft.trial_type() == RT_CONDITION {
            continue;
        }
        if let Some(stimulus) = draft.text(Column::StimulusType) {
            draft.suffix_condition(stimulus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;
    use pretty_assertions::assert_eq;

    fn row(trial_type: &str, onset: f64, duration: f64, block: Option<&str>) -> EventRow {
        EventRow {
            onset,
            duration,
            trial_type: trial_type.to_string(),
            block: block
                .map(|b| Cell::Text(b.to_string()))
                .unwrap_or(Cell::NotApplicable),
            cells: vec![Cell::NotApplicable; Column::ALL.len()],
        }
    }

    fn set(mut row: EventRow, column: Column, cell: Cell) -> EventRow {
        row.cells[column as usize] = cell;
        row
    }

    fn conditions(events: &[DesignEvent]) -> Vec<&str> {
        events.iter().map(|e| e.condition.as_str()).collect()
    }

    #[test]
    fn test_model_kind_parse() {
        assert_eq!("hcp".parse::<ModelKind>().unwrap(), ModelKind::Hcp);
        assert!(matches!(
            "spm".parse::<ModelKind>(),
            Err(ConvertError::InvalidModel(m)) if m == "spm"
        ));
    }

    #[test]
    fn test_wm_cue_merged_into_block() {
        let table = EventTable {
            task: Task::WorkingMemory,
            rows: vec![
                set(
                    row("cue_2back", 10.0, 2.5, Some("2Back_Block1")),
                    Column::StimulusType,
                    Cell::Text("Body".to_string()),
                ),
                set(
                    row("2back_full", 12.5, 2.5, Some("2Back_Block1")),
                    Column::StimulusType,
                    Cell::Text("Body".to_string()),
                ),
                row("2back_target", 12.5, 2.5, Some("2Back_Block1")),
            ],
        };
        let events = prepare(&table, ModelKind::Hcp, &["2back_full"]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].onset, 10.0);
        assert_eq!(events[0].duration, 2.5 + 2.5);
        assert_eq!(events[0].condition, "2back_full_body");
    }

    #[test]
    fn test_emotion_block_starts_at_cue() {
        let table = EventTable {
            task: Task::Emotion,
            rows: vec![
                row("cue_face", 20.0, 3.0, Some("Face_Block1")),
                row("face_stim", 23.0, 2.0, Some("Face_Block1")),
                row("face_block", 23.0, 18.0, Some("Face_Block1")),
                row("cue_shape", 45.0, 3.0, Some("Shape_Block1")),
                row("shape_block", 48.0, 18.0, Some("Shape_Block1")),
            ],
        };
        let events = prepare(&table, ModelKind::Hcp, &["face_block", "shape_block"]);

        let spans: Vec<(f64, f64)> = events.iter().map(|e| (e.onset, e.duration)).collect();
        assert_eq!(spans, vec![(20.0, 21.0), (45.0, 21.0)]);
    }

    #[test]
    fn test_gambling_majority_conditions() {
        let reward = Cell::Text("reward".to_string());
        let punish = Cell::Text("punish".to_string());
        let table = EventTable {
            task: Task::Gambling,
            rows: vec![
                set(row("full_gamble", 5.0, 28.0, Some("Gamble_Block1")), Column::BlockMajority, reward),
                set(row("full_gamble", 50.0, 28.0, Some("Gamble_Block2")), Column::BlockMajority, punish),
                row("fixation", 33.0, 15.0, Some("Fix_Block1")),
            ],
        };
        let events = prepare(&table, ModelKind::Hcp, &["full_gamble"]);
        assert_eq!(conditions(&events), vec!["full_gamble_reward", "full_gamble_loss"]);
    }

    #[test]
    fn test_gambling_alt_choices() {
        let table = EventTable {
            task: Task::Gambling,
            rows: vec![
                set(row("quest_mark", 5.0, 1.5, None), Column::Response, Cell::Number(2.0)),
                set(row("quest_mark", 8.5, 1.5, None), Column::Response, Cell::Number(3.0)),
                row("quest_mark", 12.0, 1.5, None),
                set(
                    row("feedback", 7.0, 1.0, None),
                    Column::RewardType,
                    Cell::Text("Punishment".to_string()),
                ),
            ],
        };
        let events = prepare(&table, ModelKind::Alt, &[]);
        assert_eq!(
            conditions(&events),
            vec!["quest_lwr", "quest_hihr", "quest_othr", "feedback_punishment"]
        );
    }

    #[test]
    fn test_motor_cues_collapse() {
        let table = EventTable {
            task: Task::Motor,
            rows: vec![
                row("cue_lefthand", 8.0, 3.0, Some("LeftHand_Block1")),
                row("lefthand", 11.0, 12.0, Some("LeftHand_Block1")),
                row("cue_tongue", 23.0, 3.0, Some("Tongue_Block1")),
            ],
        };
        let events = prepare(&table, ModelKind::Hcp, &["cue", "lefthand"]);
        assert_eq!(conditions(&events), vec!["cue", "lefthand", "cue"]);
    }

    #[test]
    fn test_social_alt_adds_rt_regressors() {
        let table = EventTable {
            task: Task::Social,
            rows: vec![
                set(
                    set(row("response", 22.0, 3.0, None), Column::ResponseTime, Cell::Number(1100.0)),
                    Column::SocialType,
                    Cell::Text("Mental".to_string()),
                ),
                set(row("movie", 2.0, 20.0, None), Column::SocialType, Cell::Text("Mental".to_string())),
            ],
        };
        let events = prepare(&table, ModelKind::Alt, &["response", "movie"]);

        assert_eq!(conditions(&events), vec!["response_mental", "movie_mental", "rt"]);
        assert_eq!(events[2].onset, 22.0);
        assert_eq!(events[2].duration, 1.1);
    }

    #[test]
    fn test_relational_alt_rt_regressor_needs_inclusion() {
        let table = EventTable {
            task: Task::Relational,
            rows: vec![set(
                row("relation_stim", 3.0, 3.5, Some("Relation_Block1")),
                Column::ResponseTime,
                Cell::Number(1800.0),
            )],
        };
        let without = prepare(&table, ModelKind::Alt, &["relation_stim"]);
        assert_eq!(conditions(&without), vec!["relation_stim"]);

        let with = prepare(&table, ModelKind::Alt, &["relation_stim", "rt"]);
        assert_eq!(conditions(&with), vec!["relation_stim", "rt"]);
    }
}
