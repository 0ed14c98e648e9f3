//! Core types for the recognized-score model
//!
//! This is the read-only input contract of the separation engine: a score as
//! recognized by OMR, organized as parts → staves → voices → notes, with a
//! global measure map shared by all parts.
//!
//! All rhythmic values are exact rationals in quarter-note beats. The model
//! never uses floating point for time.

use num_rational::Rational32;
use serde::{Deserialize, Serialize};

/// Exact rational beat value (quarter note = 1)
pub type Beat = Rational32;

/// Zero beats, for fold/accumulate starting points
pub fn beat_zero() -> Beat {
    Rational32::from_integer(0)
}

/// Identity of a note within one `ScoreModel`
///
/// Dense and sequential in build order. Classification results are keyed by
/// `NoteId`, which is what makes the "every note lands somewhere" count
/// reconciliation exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(pub usize);

/// Staff clef
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clef {
    Treble,
    Bass,
    Alto,
    Tenor,
}

/// Notated stem direction, used as a classification tie-break
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StemDirection {
    Up,
    Down,
    #[default]
    Unknown,
}

/// Tie participation flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TieFlags {
    /// Note begins a tie into the following note
    pub starts: bool,
    /// Note ends a tie from the preceding note
    pub ends: bool,
}

/// Onset: measure index plus rational beat offset within that measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Onset {
    pub measure: usize,
    pub beat: Beat,
}

impl Onset {
    pub fn new(measure: usize, beat: Beat) -> Self {
        Onset { measure, beat }
    }
}

/// A single recognized note. Immutable once the model is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// MIDI note number (C4 = 60)
    pub pitch: u8,
    pub onset: Onset,
    /// Duration in quarter-note beats
    pub duration: Beat,
    /// Part index within the score
    pub part: usize,
    /// Staff index within the part
    pub staff: usize,
    /// Voice index within the staff
    pub voice: usize,
    pub stem: StemDirection,
    pub tie: TieFlags,
}

/// Ordered notes within one staff sharing a voice index
///
/// Monophonic by construction: the builder rejects overlapping notes within
/// one voice as malformed input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub index: usize,
    pub notes: Vec<Note>,
}

/// One staff: clef change list plus its voices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub index: usize,
    /// (measure, clef) pairs, sorted by measure, first entry at measure 0
    pub clefs: Vec<(usize, Clef)>,
    pub voices: Vec<Voice>,
}

impl Staff {
    /// Clef in force at the given measure
    pub fn clef_at(&self, measure: usize) -> Clef {
        let mut clef = self.clefs[0].1;
        for &(m, c) in &self.clefs {
            if m <= measure {
                clef = c;
            } else {
                break;
            }
        }
        clef
    }

    /// All notes of this staff across all voices, in voice order
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.voices.iter().flat_map(|v| v.notes.iter())
    }
}

/// A part in the OMR sense: one system/instrument group of staves.
/// A piano-style grand staff holding two vocal lines is one `Part` with two
/// staves, not an SATB part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub name: Option<String>,
    pub staves: Vec<Staff>,
}

/// Time signature of one measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSig {
    pub num: u8,
    pub den: u8,
}

impl TimeSig {
    pub fn new(num: u8, den: u8) -> Self {
        TimeSig { num, den }
    }

    /// Measure length in quarter-note beats (e.g. 6/8 → 3)
    pub fn beats(&self) -> Beat {
        Rational32::new(self.num as i32 * 4, self.den as i32)
    }
}

/// Global measure map: time signature and rational start time per measure,
/// shared by every part of the score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureMap {
    sigs: Vec<TimeSig>,
    starts: Vec<Beat>,
    total: Beat,
}

impl MeasureMap {
    pub fn new(sigs: Vec<TimeSig>) -> Self {
        let mut starts = Vec::with_capacity(sigs.len());
        let mut t = beat_zero();
        for sig in &sigs {
            starts.push(t);
            t += sig.beats();
        }
        MeasureMap {
            sigs,
            starts,
            total: t,
        }
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    pub fn sig(&self, measure: usize) -> TimeSig {
        self.sigs[measure]
    }

    /// Absolute start time of a measure, in beats from the score start
    pub fn start(&self, measure: usize) -> Beat {
        self.starts[measure]
    }

    pub fn measure_len(&self, measure: usize) -> Beat {
        self.sigs[measure].beats()
    }

    /// Total score duration in beats
    pub fn total_duration(&self) -> Beat {
        self.total
    }

    /// Measure containing the given absolute time (end-exclusive)
    pub fn measure_at(&self, time: Beat) -> usize {
        let idx = self.starts.partition_point(|s| *s <= time);
        idx.saturating_sub(1)
    }

    /// Split an absolute time into (measure, beat offset) for reporting
    pub fn locate(&self, time: Beat) -> (usize, Beat) {
        let measure = self.measure_at(time);
        (measure, time - self.starts[measure])
    }

    /// Time signature changes as (measure, sig), first measure always included
    pub fn sig_changes(&self) -> Vec<(usize, TimeSig)> {
        let mut changes = Vec::new();
        for (m, &sig) in self.sigs.iter().enumerate() {
            if m == 0 || sig != self.sigs[m - 1] {
                changes.push((m, sig));
            }
        }
        changes
    }
}

/// The recognized score: parts plus the global measure map.
/// Built once by `ScoreModel::build`, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreModel {
    pub measure_map: MeasureMap,
    pub parts: Vec<Part>,
    pub(crate) note_count: usize,
}

impl ScoreModel {
    /// Number of notes in the score (and the exclusive bound of `NoteId`s)
    pub fn note_count(&self) -> usize {
        self.note_count
    }

    /// All notes of the score in part/staff/voice order
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.parts
            .iter()
            .flat_map(|p| p.staves.iter())
            .flat_map(|s| s.voices.iter())
            .flat_map(|v| v.notes.iter())
    }

    /// Absolute onset of a note in beats from the score start
    pub fn absolute_onset(&self, note: &Note) -> Beat {
        self.measure_map.start(note.onset.measure) + note.onset.beat
    }

    pub fn total_duration(&self) -> Beat {
        self.measure_map.total_duration()
    }
}
