//! The ordered, short-circuiting rule chain
//!
//! Each rule is a pure function from (staff context, note, overrides) to
//! `Option<VoiceLabel>`; the first rule that decides wins. Manual overrides
//! sit at the top of the chain.

use super::{Overrides, VoiceLabel};
use crate::score::{Clef, Note, Part, ScoreModel, Staff, StemDirection};

/// Per-staff facts every rule can consult, computed once per staff
pub(crate) struct StaffContext<'a> {
    pub part: usize,
    pub part_name: Option<&'a str>,
    /// True when the score is an open choral layout: four single-staff parts
    pub open_four_part: bool,
    pub staff: &'a Staff,
    /// How many staves the containing part has
    pub staves_in_part: usize,
    /// Position of this staff within the part (written order, top = 0)
    pub staff_position: usize,
    /// Median pitch of the staff's whole-score note population, if any
    pub median_pitch: Option<u8>,
}

impl<'a> StaffContext<'a> {
    pub fn new(score: &'a ScoreModel, part_idx: usize, part: &'a Part, staff: &'a Staff) -> Self {
        let median = median_pitch(staff);
        if let Some(m) = median {
            log::debug!(
                "part {} staff {}: median split pitch is MIDI {}",
                part_idx,
                staff.index,
                m
            );
        }
        let open_four_part =
            score.parts.len() == 4 && score.parts.iter().all(|p| p.staves.len() == 1);
        StaffContext {
            part: part_idx,
            part_name: part.name.as_deref(),
            open_four_part,
            staff,
            staves_in_part: part.staves.len(),
            staff_position: staff.index,
            median_pitch: median,
        }
    }
}

/// A two-label clef bucket, higher label first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bucket {
    hi: VoiceLabel,
    lo: VoiceLabel,
}

const SOPRANO_ALTO: Bucket = Bucket {
    hi: VoiceLabel::Soprano,
    lo: VoiceLabel::Alto,
};
const TENOR_BASS: Bucket = Bucket {
    hi: VoiceLabel::Tenor,
    lo: VoiceLabel::Bass,
};

type Rule = fn(&StaffContext, &Note, &Overrides) -> Option<VoiceLabel>;

const RULES: [Rule; 6] = [
    override_rule,
    four_staff_rule,
    two_staff_rule,
    part_name_rule,
    open_score_rule,
    clef_rule,
];

/// Run the chain; `None` means the note stays unclassified
pub(crate) fn apply(ctx: &StaffContext, note: &Note, overrides: &Overrides) -> Option<VoiceLabel> {
    RULES.iter().find_map(|rule| rule(ctx, note, overrides))
}

/// Rule 0: caller-supplied override for this (part, staff, voice)
fn override_rule(ctx: &StaffContext, note: &Note, overrides: &Overrides) -> Option<VoiceLabel> {
    overrides.get(&(ctx.part, note.staff, note.voice)).copied()
}

/// Rule 1: open four-staff choral layout, staves are S, A, T, B in
/// written order
fn four_staff_rule(ctx: &StaffContext, _note: &Note, _overrides: &Overrides) -> Option<VoiceLabel> {
    if ctx.staves_in_part != 4 {
        return None;
    }
    Some(VoiceLabel::PARTS[ctx.staff_position])
}

/// Rule 2: closed two-staff (piano reduction) layout, upper staff carries
/// Soprano+Alto, lower Tenor+Bass, regardless of recognized clefs
fn two_staff_rule(ctx: &StaffContext, note: &Note, _overrides: &Overrides) -> Option<VoiceLabel> {
    if ctx.staves_in_part != 2 {
        return None;
    }
    let bucket = if ctx.staff_position == 0 {
        SOPRANO_ALTO
    } else {
        TENOR_BASS
    };
    Some(split_bucket(ctx, note, bucket))
}

/// Rule 3: single-staff part whose recognized name spells out its label
/// ("Soprano", "Alto", "Tenor", "Bass", any casing, e.g. "Alto II")
fn part_name_rule(ctx: &StaffContext, _note: &Note, _overrides: &Overrides) -> Option<VoiceLabel> {
    if ctx.staves_in_part != 1 {
        return None;
    }
    let name = ctx.part_name?.to_ascii_lowercase();
    VoiceLabel::PARTS
        .iter()
        .copied()
        .find(|label| name.contains(&label.name().to_ascii_lowercase()))
}

/// Rule 4: open choral score, four single-staff parts are S, A, T, B in
/// written order
fn open_score_rule(ctx: &StaffContext, _note: &Note, _overrides: &Overrides) -> Option<VoiceLabel> {
    if !ctx.open_four_part {
        return None;
    }
    Some(VoiceLabel::PARTS[ctx.part])
}

/// Rule 5: single-staff part, bucket by the clef in force at the note's
/// measure. Other staff counts fall through to Unclassified.
fn clef_rule(ctx: &StaffContext, note: &Note, _overrides: &Overrides) -> Option<VoiceLabel> {
    if ctx.staves_in_part != 1 {
        return None;
    }
    match ctx.staff.clef_at(note.onset.measure) {
        Clef::Treble => Some(split_bucket(ctx, note, SOPRANO_ALTO)),
        Clef::Bass => Some(split_bucket(ctx, note, TENOR_BASS)),
        Clef::Alto => Some(VoiceLabel::Alto),
        Clef::Tenor => Some(VoiceLabel::Tenor),
    }
}

/// Resolve a note inside a two-label bucket: voice index when the staff has
/// two or more voices, then stem direction, then the staff median pitch
fn split_bucket(ctx: &StaffContext, note: &Note, bucket: Bucket) -> VoiceLabel {
    if ctx.staff.voices.len() >= 2 {
        match note.voice {
            0 => return bucket.hi,
            1 => return bucket.lo,
            _ => {} // extra voices stay ambiguous, fall through
        }
    }
    match note.stem {
        StemDirection::Up => return bucket.hi,
        StemDirection::Down => return bucket.lo,
        StemDirection::Unknown => {}
    }
    // Median of this staff's own note population, not a global constant:
    // written ranges differ too much from piece to piece.
    match ctx.median_pitch {
        Some(median) if note.pitch >= median => bucket.hi,
        Some(_) => bucket.lo,
        // Unreachable while classifying this staff's own notes
        None => bucket.hi,
    }
}

/// Median pitch of a staff's notes: sorted, upper-middle element
fn median_pitch(staff: &Staff) -> Option<u8> {
    let mut pitches: Vec<u8> = staff.notes().map(|n| n.pitch).collect();
    if pitches.is_empty() {
        return None;
    }
    pitches.sort_unstable();
    Some(pitches[pitches.len() / 2])
}
