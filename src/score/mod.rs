//! Recognized-score model: ingestion, validation, and the read-only types
//! every downstream stage consumes

mod builder;
pub mod pitch;
mod types;

pub use builder::{NoteDraft, PartDraft, ScoreDraft, StaffDraft, VoiceDraft};
pub use types::{
    beat_zero, Beat, Clef, MeasureMap, Note, NoteId, Onset, Part, ScoreModel, Staff,
    StemDirection, TieFlags, TimeSig, Voice,
};

use thiserror::Error;

/// Ingestion-time structural violations. Fatal: the input must be fixed
/// upstream (typically by re-running OMR with adjusted settings).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedScore {
    #[error("score has no measures")]
    EmptyScore,

    #[error("part {part} staff {staff} covers {found} measures, score has {expected}")]
    MeasureRangeMismatch {
        part: usize,
        staff: usize,
        expected: usize,
        found: usize,
    },

    #[error("part {part} staff {staff} has no clef at measure 0")]
    MissingClef { part: usize, staff: usize },

    #[error("part {part} staff {staff}: clef change references undefined measure {measure}")]
    UndefinedClef {
        part: usize,
        staff: usize,
        measure: usize,
    },

    #[error("part {part} staff {staff} voice {voice}: overlapping notes in measure {measure}")]
    OverlappingNotes {
        part: usize,
        staff: usize,
        voice: usize,
        measure: usize,
    },

    #[error("part {part} staff {staff} voice {voice}: note outside measure {measure}")]
    NoteOutsideMeasure {
        part: usize,
        staff: usize,
        voice: usize,
        measure: usize,
    },
}
