//! Ingestion: raw parsed-score structure → invariant-checked `ScoreModel`
//!
//! The draft types here are the contract with whatever produced the
//! recognition result (the bundled MusicXML reader, or a caller that parsed
//! some other symbolic format). `ScoreModel::build` is the only way to obtain
//! a `ScoreModel`, so every model downstream code sees has passed the checks:
//!
//! - every staff covers the same measure range as the global measure map
//! - every voice is monophonic (no overlapping notes within one voice)
//! - every staff has a clef at measure 0 and no clef change addresses a
//!   measure outside the score
//! - every note onset lies inside its measure and has positive duration
//!
//! Malformed input is fatal at this stage; there is no recovery or repair.

use super::types::*;
use super::MalformedScore;

/// Raw score as handed over by a parser, before validation
#[derive(Debug, Clone, Default)]
pub struct ScoreDraft {
    /// One time signature per measure, in score order
    pub measures: Vec<TimeSig>,
    pub parts: Vec<PartDraft>,
}

#[derive(Debug, Clone, Default)]
pub struct PartDraft {
    pub name: Option<String>,
    pub staves: Vec<StaffDraft>,
}

#[derive(Debug, Clone, Default)]
pub struct StaffDraft {
    /// (measure, clef) pairs; need not be sorted
    pub clefs: Vec<(usize, Clef)>,
    pub voices: Vec<VoiceDraft>,
    /// Number of measures this staff was recognized with
    pub measure_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceDraft {
    pub notes: Vec<NoteDraft>,
}

#[derive(Debug, Clone, Copy)]
pub struct NoteDraft {
    pub pitch: u8,
    pub measure: usize,
    pub beat: Beat,
    pub duration: Beat,
    pub stem: StemDirection,
    pub tie: TieFlags,
}

impl ScoreModel {
    /// Validate a draft and build the immutable model
    pub fn build(draft: ScoreDraft) -> Result<ScoreModel, MalformedScore> {
        if draft.measures.is_empty() {
            return Err(MalformedScore::EmptyScore);
        }
        let measure_map = MeasureMap::new(draft.measures);

        let mut parts = Vec::with_capacity(draft.parts.len());
        let mut next_id = 0usize;

        for (part_idx, part_draft) in draft.parts.into_iter().enumerate() {
            let mut staves = Vec::with_capacity(part_draft.staves.len());
            for (staff_idx, staff_draft) in part_draft.staves.into_iter().enumerate() {
                staves.push(build_staff(
                    &measure_map,
                    part_idx,
                    staff_idx,
                    staff_draft,
                    &mut next_id,
                )?);
            }
            parts.push(Part {
                name: part_draft.name,
                staves,
            });
        }

        let model = ScoreModel {
            measure_map,
            parts,
            note_count: next_id,
        };
        log::debug!(
            "score model built: {} parts, {} staves, {} measures, {} notes",
            model.parts.len(),
            model.parts.iter().map(|p| p.staves.len()).sum::<usize>(),
            model.measure_map.len(),
            model.note_count,
        );
        Ok(model)
    }
}

fn build_staff(
    measure_map: &MeasureMap,
    part: usize,
    staff: usize,
    draft: StaffDraft,
    next_id: &mut usize,
) -> Result<Staff, MalformedScore> {
    if draft.measure_count != measure_map.len() {
        return Err(MalformedScore::MeasureRangeMismatch {
            part,
            staff,
            expected: measure_map.len(),
            found: draft.measure_count,
        });
    }

    let mut clefs = draft.clefs;
    clefs.sort_by_key(|&(m, _)| m);
    match clefs.first() {
        None => return Err(MalformedScore::MissingClef { part, staff }),
        Some(&(m, _)) if m != 0 => {
            // Notes before the first clef change would have no clef in force
            return Err(MalformedScore::MissingClef { part, staff });
        }
        Some(_) => {}
    }
    if let Some(&(m, _)) = clefs.iter().find(|&&(m, _)| m >= measure_map.len()) {
        return Err(MalformedScore::UndefinedClef {
            part,
            staff,
            measure: m,
        });
    }

    let mut voices = Vec::with_capacity(draft.voices.len());
    for (voice_idx, voice_draft) in draft.voices.into_iter().enumerate() {
        voices.push(build_voice(
            measure_map,
            part,
            staff,
            voice_idx,
            voice_draft,
            next_id,
        )?);
    }

    Ok(Staff {
        index: staff,
        clefs,
        voices,
    })
}

fn build_voice(
    measure_map: &MeasureMap,
    part: usize,
    staff: usize,
    voice: usize,
    draft: VoiceDraft,
    next_id: &mut usize,
) -> Result<Voice, MalformedScore> {
    let mut notes = Vec::with_capacity(draft.notes.len());
    for n in draft.notes {
        if n.measure >= measure_map.len()
            || n.beat < beat_zero()
            || n.beat >= measure_map.measure_len(n.measure)
            || n.duration <= beat_zero()
        {
            return Err(MalformedScore::NoteOutsideMeasure {
                part,
                staff,
                voice,
                measure: n.measure,
            });
        }
        notes.push(Note {
            id: NoteId(0), // assigned after sorting
            pitch: n.pitch,
            onset: Onset::new(n.measure, n.beat),
            duration: n.duration,
            part,
            staff,
            voice,
            stem: n.stem,
            tie: n.tie,
        });
    }

    notes.sort_by_key(|n| n.onset);

    // Monophony check: within one voice, each note must end at or before
    // the next note's onset.
    for pair in notes.windows(2) {
        let end = measure_map.start(pair[0].onset.measure) + pair[0].onset.beat + pair[0].duration;
        let next_start = measure_map.start(pair[1].onset.measure) + pair[1].onset.beat;
        if end > next_start {
            return Err(MalformedScore::OverlappingNotes {
                part,
                staff,
                voice,
                measure: pair[1].onset.measure,
            });
        }
    }

    for note in &mut notes {
        note.id = NoteId(*next_id);
        *next_id += 1;
    }

    Ok(Voice {
        index: voice,
        notes,
    })
}
