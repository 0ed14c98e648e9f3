//! MusicXML (partwise) ingestion
//!
//! Reads the symbolic output of the OMR stage into a `ScoreDraft` ready for
//! `ScoreModel::build`. Only what the separation engine needs is extracted:
//! measures and time signatures, per-staff clefs, and notes with onset,
//! duration, voice, staff, stem direction and tie flags.

mod parse;

pub use parse::parse_musicxml;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MusicXmlError {
    #[error("xml parse error: {0}")]
    Xml(String),
    #[error("invalid musicxml: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, MusicXmlError>;
