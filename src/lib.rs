//! SATB voice separation engine for OMR-recognized choral scores
//!
//! Takes a recognized score (parts, staves, voices and notes of uncertain
//! polyphonic grouping) and deterministically assigns every note to one of
//! the four choir parts: Soprano, Alto, Tenor or Bass. Each part then gets
//! a continuous, measure-synchronized note stream ready for MIDI export.
//!
//! # Pipeline
//!
//! ```text
//! MusicXML bytes ──musicxml──▶ ScoreDraft ──score──▶ ScoreModel
//!                                                        │
//!                                  classify (rule chain) ▼
//!                                  timeline (ties, divisi, rests)
//!                                  emit (validation, full score)
//!                                                        │
//!                                                        ▼
//!                                         Separation ──emit::midi──▶ SMF
//! ```
//!
//! # Example
//!
//! ```
//! use satb_split::{separate, Overrides};
//! use satb_split::score::ScoreModel;
//!
//! let draft = satb_split::musicxml::parse_musicxml(br#"<?xml version="1.0"?>
//! <score-partwise>
//!   <part-list><score-part id="P1"><part-name>Choir</part-name></score-part></part-list>
//!   <part id="P1">
//!     <measure number="1">
//!       <attributes>
//!         <divisions>1</divisions>
//!         <time><beats>4</beats><beat-type>4</beat-type></time>
//!         <clef><sign>G</sign><line>2</line></clef>
//!       </attributes>
//!       <note><pitch><step>C</step><octave>5</octave></pitch><duration>4</duration></note>
//!     </measure>
//!   </part>
//! </score-partwise>"#).unwrap();
//!
//! let score = ScoreModel::build(draft).unwrap();
//! let separation = separate(&score, &Overrides::new()).unwrap();
//! assert!(separation.unclassified.is_empty());
//! ```

pub mod classify;
pub mod emit;
mod engine;
pub mod musicxml;
pub mod score;
pub mod timeline;

pub use classify::{classify, Classification, Overrides, UnclassifiedNote, VoiceLabel};
pub use emit::{IncompleteTimeline, ScoreEvent, Separation};
pub use engine::separate;
pub use score::{Beat, MalformedScore, ScoreModel};
pub use timeline::{PartTimeline, TimelineEvent};
