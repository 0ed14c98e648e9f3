//! Classification of recognized notes into SATB labels
//!
//! Pure function of (ScoreModel, Overrides): the same input always produces
//! the same label table. Notes the rule chain cannot place are labeled
//! `Unclassified` and surfaced as diagnostics, never dropped.

mod rules;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::score::{pitch::midi_to_name, Beat, NoteId, ScoreModel};
use rules::StaffContext;

/// SATB label assigned to every note of the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VoiceLabel {
    Soprano,
    Alto,
    Tenor,
    Bass,
    Unclassified,
}

impl VoiceLabel {
    /// The four real parts in score order (excludes `Unclassified`)
    pub const PARTS: [VoiceLabel; 4] = [
        VoiceLabel::Soprano,
        VoiceLabel::Alto,
        VoiceLabel::Tenor,
        VoiceLabel::Bass,
    ];

    /// Index into the four part timelines; `None` for `Unclassified`
    pub fn part_index(&self) -> Option<usize> {
        match self {
            VoiceLabel::Soprano => Some(0),
            VoiceLabel::Alto => Some(1),
            VoiceLabel::Tenor => Some(2),
            VoiceLabel::Bass => Some(3),
            VoiceLabel::Unclassified => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VoiceLabel::Soprano => "Soprano",
            VoiceLabel::Alto => "Alto",
            VoiceLabel::Tenor => "Tenor",
            VoiceLabel::Bass => "Bass",
            VoiceLabel::Unclassified => "Unclassified",
        }
    }
}

impl std::fmt::Display for VoiceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Manual overrides: (part, staff, voice) → forced label.
/// Applied before any heuristic rule.
pub type Overrides = HashMap<(usize, usize, usize), VoiceLabel>;

/// Location of a note the rule chain could not place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclassifiedNote {
    pub part: usize,
    pub staff: usize,
    pub voice: usize,
    pub measure: usize,
    pub beat: Beat,
    pub pitch: u8,
}

impl std::fmt::Display for UnclassifiedNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at part {} staff {} voice {}, measure {} beat {}",
            midi_to_name(self.pitch),
            self.part,
            self.staff,
            self.voice,
            self.measure,
            self.beat,
        )
    }
}

/// Label table for one classification run, keyed by `NoteId`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    labels: Vec<VoiceLabel>,
    /// Notes no rule could place, in score order
    pub unclassified: Vec<UnclassifiedNote>,
}

impl Classification {
    pub fn label_of(&self, id: NoteId) -> VoiceLabel {
        self.labels[id.0]
    }

    /// Number of classified notes (equals the score's note count)
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn count_of(&self, label: VoiceLabel) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }
}

/// Assign a `VoiceLabel` to every note of the score
///
/// Rules apply per staff in order: manual override, four-staff layout,
/// two-staff (closed choral) layout, clef bucket for single-staff parts,
/// with voice-index / stem-direction / median-pitch resolution inside
/// two-label buckets. Anything left is `Unclassified`.
pub fn classify(score: &ScoreModel, overrides: &Overrides) -> Classification {
    let mut labels = vec![VoiceLabel::Unclassified; score.note_count()];
    let mut unclassified = Vec::new();

    for (part_idx, part) in score.parts.iter().enumerate() {
        for staff in &part.staves {
            let ctx = StaffContext::new(score, part_idx, part, staff);
            for voice in &staff.voices {
                for note in &voice.notes {
                    match rules::apply(&ctx, note, overrides) {
                        Some(label) => labels[note.id.0] = label,
                        None => unclassified.push(UnclassifiedNote {
                            part: part_idx,
                            staff: staff.index,
                            voice: voice.index,
                            measure: note.onset.measure,
                            beat: note.onset.beat,
                            pitch: note.pitch,
                        }),
                    }
                }
            }
        }
    }

    log::info!(
        "classified {} notes: S={} A={} T={} B={} unclassified={}",
        labels.len(),
        labels.iter().filter(|&&l| l == VoiceLabel::Soprano).count(),
        labels.iter().filter(|&&l| l == VoiceLabel::Alto).count(),
        labels.iter().filter(|&&l| l == VoiceLabel::Tenor).count(),
        labels.iter().filter(|&&l| l == VoiceLabel::Bass).count(),
        unclassified.len(),
    );

    Classification {
        labels,
        unclassified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{
        Clef, NoteDraft, PartDraft, ScoreDraft, StaffDraft, StemDirection, TieFlags, TimeSig,
        VoiceDraft,
    };
    use num_rational::Rational32;

    fn note(pitch: u8, measure: usize, beat: i32, stem: StemDirection) -> NoteDraft {
        NoteDraft {
            pitch,
            measure,
            beat: Rational32::from_integer(beat),
            duration: Rational32::from_integer(1),
            stem,
            tie: TieFlags::default(),
        }
    }

    fn staff(clef: Clef, voices: Vec<Vec<NoteDraft>>) -> StaffDraft {
        StaffDraft {
            clefs: vec![(0, clef)],
            voices: voices.into_iter().map(|notes| VoiceDraft { notes }).collect(),
            measure_count: 1,
        }
    }

    fn build(parts: Vec<PartDraft>) -> ScoreModel {
        ScoreModel::build(ScoreDraft {
            measures: vec![TimeSig::new(4, 4)],
            parts,
        })
        .expect("valid draft")
    }

    fn labels_of(score: &ScoreModel, c: &Classification) -> Vec<VoiceLabel> {
        score.notes().map(|n| c.label_of(n.id)).collect()
    }

    #[test]
    fn test_four_staff_part_maps_in_written_order() {
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![
                staff(Clef::Treble, vec![vec![note(72, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Treble, vec![vec![note(67, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Bass, vec![vec![note(55, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Bass, vec![vec![note(48, 0, 0, StemDirection::Unknown)]]),
            ],
        }]);
        let c = classify(&score, &Overrides::new());
        assert_eq!(
            labels_of(&score, &c),
            vec![
                VoiceLabel::Soprano,
                VoiceLabel::Alto,
                VoiceLabel::Tenor,
                VoiceLabel::Bass,
            ]
        );
        assert!(c.unclassified.is_empty());
    }

    #[test]
    fn test_two_staff_two_voice_hymn_layout() {
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![
                staff(
                    Clef::Treble,
                    vec![
                        vec![note(72, 0, 0, StemDirection::Up)],
                        vec![note(67, 0, 0, StemDirection::Down)],
                    ],
                ),
                staff(
                    Clef::Bass,
                    vec![
                        vec![note(55, 0, 0, StemDirection::Up)],
                        vec![note(48, 0, 0, StemDirection::Down)],
                    ],
                ),
            ],
        }]);
        let c = classify(&score, &Overrides::new());
        assert_eq!(
            labels_of(&score, &c),
            vec![
                VoiceLabel::Soprano,
                VoiceLabel::Alto,
                VoiceLabel::Tenor,
                VoiceLabel::Bass,
            ]
        );
    }

    #[test]
    fn test_single_staff_alto_clef_maps_to_alto() {
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![staff(Clef::Alto, vec![vec![note(60, 0, 0, StemDirection::Unknown)]])],
        }]);
        let c = classify(&score, &Overrides::new());
        assert_eq!(labels_of(&score, &c), vec![VoiceLabel::Alto]);
    }

    #[test]
    fn test_single_staff_tenor_clef_maps_to_tenor() {
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![staff(Clef::Tenor, vec![vec![note(55, 0, 0, StemDirection::Unknown)]])],
        }]);
        let c = classify(&score, &Overrides::new());
        assert_eq!(labels_of(&score, &c), vec![VoiceLabel::Tenor]);
    }

    #[test]
    fn test_single_voice_treble_staff_splits_at_median() {
        // Pitches 60..68: sorted median (index 4) is 64, so 64+ is Soprano
        let notes: Vec<NoteDraft> = (0..8)
            .map(|i| note(60 + i as u8, 0, 0, StemDirection::Unknown))
            .collect();
        // Spread over two measures to stay monophonic
        let notes: Vec<NoteDraft> = notes
            .into_iter()
            .enumerate()
            .map(|(i, mut n)| {
                n.measure = i / 4;
                n.beat = Rational32::from_integer((i % 4) as i32);
                n
            })
            .collect();
        let score = ScoreModel::build(ScoreDraft {
            measures: vec![TimeSig::new(4, 4), TimeSig::new(4, 4)],
            parts: vec![PartDraft {
                name: None,
                staves: vec![StaffDraft {
                    clefs: vec![(0, Clef::Treble)],
                    voices: vec![VoiceDraft { notes }],
                    measure_count: 2,
                }],
            }],
        })
        .expect("valid draft");

        let first = classify(&score, &Overrides::new());
        for n in score.notes() {
            let expected = if n.pitch >= 64 {
                VoiceLabel::Soprano
            } else {
                VoiceLabel::Alto
            };
            assert_eq!(first.label_of(n.id), expected, "pitch {}", n.pitch);
        }

        // Split point is a pure function of the staff's note population
        let second = classify(&score, &Overrides::new());
        assert_eq!(first, second);
    }

    #[test]
    fn test_named_single_staff_part_keeps_its_whole_range() {
        // Open score: a Soprano part must not get median-split into S/A
        let low_and_high = vec![
            note(65, 0, 0, StemDirection::Unknown),
            note(67, 0, 1, StemDirection::Unknown),
            note(72, 0, 2, StemDirection::Unknown),
            note(74, 0, 3, StemDirection::Unknown),
        ];
        let named = |name: &str, clef, notes| PartDraft {
            name: Some(name.to_string()),
            staves: vec![staff(clef, vec![notes])],
        };
        let score = build(vec![
            named("Soprano", Clef::Treble, low_and_high),
            named("Alto", Clef::Treble, vec![note(64, 0, 0, StemDirection::Unknown)]),
            named("Tenor", Clef::Treble, vec![note(57, 0, 0, StemDirection::Unknown)]),
            named("Bass", Clef::Bass, vec![note(48, 0, 0, StemDirection::Unknown)]),
        ]);
        let c = classify(&score, &Overrides::new());
        assert_eq!(
            labels_of(&score, &c),
            vec![
                VoiceLabel::Soprano,
                VoiceLabel::Soprano,
                VoiceLabel::Soprano,
                VoiceLabel::Soprano,
                VoiceLabel::Alto,
                VoiceLabel::Tenor,
                VoiceLabel::Bass,
            ]
        );
        assert!(c.unclassified.is_empty());
    }

    #[test]
    fn test_unnamed_open_score_maps_parts_in_written_order() {
        let single = |pitch, clef| PartDraft {
            name: None,
            staves: vec![staff(clef, vec![vec![note(pitch, 0, 0, StemDirection::Unknown)]])],
        };
        let score = build(vec![
            single(72, Clef::Treble),
            single(67, Clef::Treble),
            single(55, Clef::Bass),
            single(48, Clef::Bass),
        ]);
        let c = classify(&score, &Overrides::new());
        assert_eq!(
            labels_of(&score, &c),
            vec![
                VoiceLabel::Soprano,
                VoiceLabel::Alto,
                VoiceLabel::Tenor,
                VoiceLabel::Bass,
            ]
        );
    }

    #[test]
    fn test_three_staff_part_is_unclassified() {
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![
                staff(Clef::Treble, vec![vec![note(72, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Treble, vec![vec![note(67, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Bass, vec![vec![note(48, 0, 0, StemDirection::Unknown)]]),
            ],
        }]);
        let c = classify(&score, &Overrides::new());
        assert_eq!(
            labels_of(&score, &c),
            vec![VoiceLabel::Unclassified; 3]
        );
        assert_eq!(c.unclassified.len(), 3);
        assert_eq!(c.unclassified[0].part, 0);
        assert_eq!(c.unclassified[0].staff, 0);
    }

    #[test]
    fn test_override_wins_over_every_rule() {
        let mut overrides = Overrides::new();
        overrides.insert((0, 0, 0), VoiceLabel::Bass);
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![staff(Clef::Treble, vec![vec![note(72, 0, 0, StemDirection::Up)]])],
        }]);
        let c = classify(&score, &overrides);
        assert_eq!(labels_of(&score, &c), vec![VoiceLabel::Bass]);
    }

    #[test]
    fn test_override_can_resolve_unsupported_layout() {
        let mut overrides = Overrides::new();
        overrides.insert((0, 1, 0), VoiceLabel::Alto);
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![
                staff(Clef::Treble, vec![vec![note(72, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Treble, vec![vec![note(67, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Bass, vec![vec![note(48, 0, 0, StemDirection::Unknown)]]),
            ],
        }]);
        let c = classify(&score, &overrides);
        assert_eq!(
            labels_of(&score, &c),
            vec![
                VoiceLabel::Unclassified,
                VoiceLabel::Alto,
                VoiceLabel::Unclassified,
            ]
        );
        assert_eq!(c.unclassified.len(), 2);
    }

    #[test]
    fn test_counts_reconcile() {
        let score = build(vec![PartDraft {
            name: None,
            staves: vec![
                staff(Clef::Treble, vec![vec![note(72, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Treble, vec![vec![note(67, 0, 0, StemDirection::Unknown)]]),
                staff(Clef::Bass, vec![vec![note(48, 0, 0, StemDirection::Unknown)]]),
            ],
        }]);
        let c = classify(&score, &Overrides::new());
        let labeled: usize = VoiceLabel::PARTS.iter().map(|&l| c.count_of(l)).sum();
        assert_eq!(labeled + c.unclassified.len(), score.note_count());
    }
}
