//! Pitch spelling ↔ MIDI note number helpers

/// Convert a spelled pitch to a MIDI note number
///
/// # Arguments
/// * `step` - Note letter (C, D, E, F, G, A, B)
/// * `alter` - Semitone alteration (-2 = double flat .. +2 = double sharp)
/// * `octave` - Octave number (C4 = middle C)
///
/// # Returns
/// MIDI note number (0-127, where 60 = C4)
pub fn pitch_to_midi(step: &str, alter: i8, octave: i8) -> u8 {
    let base: i16 = match step {
        "C" => 0,
        "D" => 2,
        "E" => 4,
        "F" => 5,
        "G" => 7,
        "A" => 9,
        "B" => 11,
        _ => 0,
    };
    // MIDI note 0 = C-1, so C4 (middle C) = 60
    let semi = base + alter as i16 + (octave as i16 + 1) * 12;
    semi.clamp(0, 127) as u8
}

/// Scientific pitch name for a MIDI note number, sharps convention ("C#4")
pub fn midi_to_name(midi: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = midi as i16 / 12 - 1;
    format!("{}{}", NAMES[(midi % 12) as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_to_midi() {
        assert_eq!(pitch_to_midi("C", 0, 4), 60); // Middle C
        assert_eq!(pitch_to_midi("C", 1, 4), 61); // C#
        assert_eq!(pitch_to_midi("D", -1, 4), 61); // Db (enharmonic)
        assert_eq!(pitch_to_midi("A", 0, 4), 69); // A440
    }

    #[test]
    fn test_pitch_to_midi_octave_boundaries() {
        assert_eq!(pitch_to_midi("B", 0, 3), 59);
        assert_eq!(pitch_to_midi("C", 0, 4), 60);
        assert_eq!(pitch_to_midi("B", 0, 4), 71);
        assert_eq!(pitch_to_midi("C", 0, 5), 72);
    }

    #[test]
    fn test_pitch_to_midi_clamping() {
        assert_eq!(pitch_to_midi("C", 0, -2), 0);
        assert_eq!(pitch_to_midi("G", 0, 9), 127);
    }

    #[test]
    fn test_midi_to_name() {
        assert_eq!(midi_to_name(60), "C4");
        assert_eq!(midi_to_name(61), "C#4");
        assert_eq!(midi_to_name(69), "A4");
        assert_eq!(midi_to_name(59), "B3");
        assert_eq!(midi_to_name(0), "C-1");
    }
}
