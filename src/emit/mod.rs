//! Finalization: validate timeline completeness and expose the engine output
//!
//! The emitter owns the four finished `PartTimeline`s plus the time-major
//! full-score interleaving. It is all-or-nothing: either every timeline
//! passes the coverage check or the call fails with `IncompleteTimeline`
//! and the caller sees no partial artifacts.

pub mod midi;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{UnclassifiedNote, VoiceLabel};
use crate::score::{beat_zero, Beat, ScoreModel};
use crate::timeline::{PartTimeline, TimelineEvent};

/// Finalization-time invariant violation: a timeline does not cover the
/// whole score. Fatal; indicates a merge bug or an unsupported layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("incomplete {label} timeline: gap at measure {measure}, beat {beat}")]
pub struct IncompleteTimeline {
    pub label: VoiceLabel,
    pub measure: usize,
    pub beat: Beat,
}

/// One event of the combined full-score stream, tagged with its part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub label: VoiceLabel,
    pub event: TimelineEvent,
}

/// The engine's output contract: four complete part timelines, the combined
/// full-score stream, and the unclassified-note diagnostics. Read-only to
/// exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Separation {
    timelines: [PartTimeline; 4],
    full_score: Vec<ScoreEvent>,
    pub unclassified: Vec<UnclassifiedNote>,
}

impl Separation {
    /// Panics if called with `VoiceLabel::Unclassified`, which has no timeline
    pub fn timeline(&self, label: VoiceLabel) -> &PartTimeline {
        match label.part_index() {
            Some(idx) => &self.timelines[idx],
            None => panic!("no timeline for {label}"),
        }
    }

    pub fn timelines(&self) -> &[PartTimeline; 4] {
        &self.timelines
    }

    /// All pitched events of all four parts, ordered by onset then
    /// part order (S, A, T, B) then pitch descending
    pub fn full_score(&self) -> &[ScoreEvent] {
        &self.full_score
    }
}

/// Validate the four timelines and assemble the final output
pub fn finalize(
    score: &ScoreModel,
    timelines: [PartTimeline; 4],
    unclassified: Vec<UnclassifiedNote>,
) -> Result<Separation, IncompleteTimeline> {
    for timeline in &timelines {
        validate_coverage(score, timeline)?;
    }

    let mut full_score: Vec<ScoreEvent> = Vec::new();
    for (idx, timeline) in timelines.iter().enumerate() {
        for event in timeline.events.iter().filter(|e| !e.is_rest()) {
            full_score.push(ScoreEvent {
                label: VoiceLabel::PARTS[idx],
                event: *event,
            });
        }
    }
    full_score.sort_by(|a, b| {
        a.event
            .onset()
            .cmp(&b.event.onset())
            .then_with(|| label_order(a.label).cmp(&label_order(b.label)))
    });

    log::info!(
        "emitted {} part timelines, {} full-score events, {} unclassified notes",
        timelines.len(),
        full_score.len(),
        unclassified.len(),
    );

    Ok(Separation {
        timelines,
        full_score,
        unclassified,
    })
}

fn label_order(label: VoiceLabel) -> usize {
    label.part_index().unwrap_or(VoiceLabel::PARTS.len())
}

/// Every beat of every measure must be accounted for, and the timeline must
/// end exactly at the score's total duration
fn validate_coverage(
    score: &ScoreModel,
    timeline: &PartTimeline,
) -> Result<(), IncompleteTimeline> {
    let mut covered = beat_zero();
    for event in &timeline.events {
        if event.onset() > covered {
            return Err(gap_error(score, timeline.label, covered));
        }
        if event.end() > covered {
            covered = event.end();
        }
    }
    if covered != score.total_duration() {
        return Err(gap_error(score, timeline.label, covered));
    }
    Ok(())
}

fn gap_error(score: &ScoreModel, label: VoiceLabel, at: Beat) -> IncompleteTimeline {
    let (measure, beat) = score.measure_map.locate(at);
    IncompleteTimeline {
        label,
        measure,
        beat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Clef, PartDraft, ScoreDraft, StaffDraft, TimeSig};
    use num_rational::Rational32;

    fn r(n: i32) -> Beat {
        Rational32::from_integer(n)
    }

    fn empty_score(measures: usize) -> ScoreModel {
        ScoreModel::build(ScoreDraft {
            measures: vec![TimeSig::new(4, 4); measures],
            parts: vec![PartDraft {
                name: None,
                staves: vec![StaffDraft {
                    clefs: vec![(0, Clef::Treble)],
                    voices: vec![],
                    measure_count: measures,
                }],
            }],
        })
        .expect("valid draft")
    }

    fn full_timeline(label: VoiceLabel, events: Vec<TimelineEvent>) -> PartTimeline {
        PartTimeline { label, events }
    }

    fn complete_timelines(measures: usize) -> [PartTimeline; 4] {
        VoiceLabel::PARTS.map(|label| {
            full_timeline(
                label,
                (0..measures)
                    .map(|m| TimelineEvent::Rest {
                        onset: r(4 * m as i32),
                        duration: r(4),
                    })
                    .collect(),
            )
        })
    }

    #[test]
    fn test_finalize_accepts_complete_timelines() {
        let score = empty_score(2);
        let result = finalize(&score, complete_timelines(2), Vec::new());
        assert!(result.is_ok());
    }

    #[test]
    fn test_finalize_rejects_gap_naming_label_and_location() {
        let score = empty_score(2);
        let mut timelines = complete_timelines(2);
        // Punch a hole in the tenor stream (second measure missing)
        timelines[2].events.truncate(1);
        let err = finalize(&score, timelines, Vec::new()).unwrap_err();
        assert_eq!(err.label, VoiceLabel::Tenor);
        assert_eq!(err.measure, 1);
        assert_eq!(err.beat, r(0));
        assert!(err.to_string().contains("Tenor"));
    }

    #[test]
    fn test_finalize_rejects_short_final_event() {
        let score = empty_score(1);
        let mut timelines = complete_timelines(1);
        timelines[3].events = vec![TimelineEvent::Rest {
            onset: r(0),
            duration: r(3),
        }];
        let err = finalize(&score, timelines, Vec::new()).unwrap_err();
        assert_eq!(err.label, VoiceLabel::Bass);
        assert_eq!(err.measure, 0);
        assert_eq!(err.beat, r(3));
    }

    #[test]
    fn test_full_score_is_time_major_and_part_ordered() {
        let score = empty_score(1);
        let mut timelines = complete_timelines(1);
        timelines[3].events.insert(
            0,
            TimelineEvent::Note {
                onset: r(0),
                duration: r(4),
                pitch: 48,
            },
        );
        timelines[0].events.insert(
            0,
            TimelineEvent::Note {
                onset: r(0),
                duration: r(4),
                pitch: 72,
            },
        );
        let sep = finalize(&score, timelines, Vec::new()).expect("complete");
        let full = sep.full_score();
        assert_eq!(full.len(), 2);
        assert_eq!(full[0].label, VoiceLabel::Soprano);
        assert_eq!(full[1].label, VoiceLabel::Bass);
    }

    #[test]
    fn test_separation_serializes_to_json() {
        let score = empty_score(1);
        let sep = finalize(&score, complete_timelines(1), Vec::new()).expect("complete");
        let json = serde_json::to_string(&sep).expect("serializable");
        assert!(json.contains("Soprano"));
    }
}
