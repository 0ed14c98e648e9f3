//! Timeline reconstruction: classified notes → four continuous part streams
//!
//! Per label this stage merges tie chains into single logical notes and
//! orders everything by absolute onset. Genuine overlaps stay as
//! simultaneous events (a part may be locally polyphonic under divisi).
//! Uncovered spans are filled with explicit rests, chopped at measure
//! boundaries so the streams stay measure-synchronized. After this stage
//! each of the four timelines accounts for every beat of every measure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::classify::{Classification, VoiceLabel};
use crate::score::{beat_zero, Beat, MeasureMap, ScoreModel};

/// One entry of a part timeline: a pitched note or an explicit rest,
/// both with absolute rational onset and duration in beats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEvent {
    Note { onset: Beat, duration: Beat, pitch: u8 },
    Rest { onset: Beat, duration: Beat },
}

impl TimelineEvent {
    pub fn onset(&self) -> Beat {
        match self {
            TimelineEvent::Note { onset, .. } | TimelineEvent::Rest { onset, .. } => *onset,
        }
    }

    pub fn duration(&self) -> Beat {
        match self {
            TimelineEvent::Note { duration, .. } | TimelineEvent::Rest { duration, .. } => {
                *duration
            }
        }
    }

    pub fn end(&self) -> Beat {
        self.onset() + self.duration()
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, TimelineEvent::Rest { .. })
    }
}

/// Continuous, gap-free stream of one SATB part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTimeline {
    pub label: VoiceLabel,
    /// Events ordered by onset; overlapping notes are divisi
    pub events: Vec<TimelineEvent>,
}

impl PartTimeline {
    /// Sum of all event durations (counts divisi overlap twice)
    pub fn summed_duration(&self) -> Beat {
        self.events
            .iter()
            .map(|e| e.duration())
            .fold(beat_zero(), |a, d| a + d)
    }

    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| !e.is_rest()).count()
    }
}

/// A classified note lifted to absolute time, before tie merging
#[derive(Debug, Clone, Copy)]
struct Collected {
    pitch: u8,
    onset: Beat,
    duration: Beat,
    starts_tie: bool,
    ends_tie: bool,
    /// Source stream, so ties only merge within one voice
    stream: (usize, usize, usize),
}

/// Build the four part timelines from a classification
pub fn merge_timelines(
    score: &ScoreModel,
    classification: &Classification,
) -> [PartTimeline; 4] {
    VoiceLabel::PARTS.map(|label| merge_label(score, classification, label))
}

fn merge_label(
    score: &ScoreModel,
    classification: &Classification,
    label: VoiceLabel,
) -> PartTimeline {
    let mut collected: Vec<Collected> = score
        .notes()
        .filter(|n| classification.label_of(n.id) == label)
        .map(|n| Collected {
            pitch: n.pitch,
            onset: score.absolute_onset(n),
            duration: n.duration,
            starts_tie: n.tie.starts,
            ends_tie: n.tie.ends,
            stream: (n.part, n.staff, n.voice),
        })
        .collect();
    collected.sort_by(|a, b| a.onset.cmp(&b.onset).then(b.pitch.cmp(&a.pitch)));

    let merged = merge_ties(collected);
    log::debug!("{}: {} events after tie merge", label, merged.len());

    let events = fill_rests(&score.measure_map, merged);
    PartTimeline { label, events }
}

/// Merge tie chains into single logical notes with exact summed durations
///
/// A fragment flagged starts-tie opens a pending note keyed by its source
/// stream and pitch; a same-pitch fragment flagged ends-tie whose onset abuts
/// the pending end exactly extends it (and keeps it pending when it also
/// starts a tie, i.e. a continuation). Dangling fragments stay plain notes.
fn merge_ties(collected: Vec<Collected>) -> Vec<(Beat, Beat, u8)> {
    let mut out: Vec<(Beat, Beat, u8)> = Vec::with_capacity(collected.len());
    let mut pending: HashMap<((usize, usize, usize), u8), (Beat, Beat)> = HashMap::new();

    for c in collected {
        let key = (c.stream, c.pitch);
        if c.ends_tie {
            if let Some(&(start, dur)) = pending.get(&key) {
                if start + dur == c.onset {
                    let extended = (start, dur + c.duration);
                    if c.starts_tie {
                        pending.insert(key, extended);
                    } else {
                        pending.remove(&key);
                        out.push((extended.0, extended.1, c.pitch));
                    }
                    continue;
                }
                // Non-abutting end: flush the stale pending note as-is
                pending.remove(&key);
                out.push((start, dur, c.pitch));
            }
        }
        if c.starts_tie {
            if let Some((start, dur)) = pending.insert(key, (c.onset, c.duration)) {
                out.push((start, dur, c.pitch));
            }
        } else {
            out.push((c.onset, c.duration, c.pitch));
        }
    }

    // Tie starts with no matching end (OMR artifacts) stay plain notes
    for (((_, _, _), pitch), (start, dur)) in pending {
        out.push((start, dur, pitch));
    }

    out.sort_by(|a, b| a.0.cmp(&b.0).then(b.2.cmp(&a.2)));
    out
}

/// Interleave explicit rests so the stream covers every beat of the score
fn fill_rests(map: &MeasureMap, notes: Vec<(Beat, Beat, u8)>) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(notes.len());
    let mut covered = beat_zero();

    for (onset, duration, pitch) in notes {
        if onset > covered {
            push_rests(map, covered, onset, &mut events);
        }
        events.push(TimelineEvent::Note {
            onset,
            duration,
            pitch,
        });
        let end = onset + duration;
        if end > covered {
            covered = end;
        }
    }

    let total = map.total_duration();
    if covered < total {
        push_rests(map, covered, total, &mut events);
    }
    events
}

/// Emit rests covering [from, to), split at measure boundaries
fn push_rests(map: &MeasureMap, from: Beat, to: Beat, out: &mut Vec<TimelineEvent>) {
    let mut at = from;
    while at < to {
        let measure = map.measure_at(at);
        let measure_end = map.start(measure) + map.measure_len(measure);
        let seg_end = if measure_end < to { measure_end } else { to };
        out.push(TimelineEvent::Rest {
            onset: at,
            duration: seg_end - at,
        });
        at = seg_end;
    }
}
