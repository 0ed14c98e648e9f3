//! Standard MIDI File export of a finished separation
//!
//! Format 1 SMF: track 0 carries tempo and time signatures, tracks 1-4 carry
//! one SATB part each on its own channel. The default sound is General MIDI
//! program 52 "Choir Aahs" on every part. Rests never produce events;
//! simultaneous divisi notes become chords on the part's channel.

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use thiserror::Error;

use crate::classify::VoiceLabel;
use crate::score::{Beat, MeasureMap};
use crate::timeline::TimelineEvent;

use super::Separation;

/// General MIDI program 52, "Choir Aahs"
pub const CHOIR_AAHS: u8 = 52;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("midi write error: {0}")]
    Write(String),
}

/// Rendering knobs for SMF export
#[derive(Debug, Clone)]
pub struct MidiSettings {
    /// Ticks per quarter note
    pub tpq: u16,
    /// Fixed tempo for the whole file
    pub tempo_bpm: f64,
    /// Program for all four parts
    pub program: u8,
    /// Velocity for every note (1-127)
    pub velocity: u8,
}

impl Default for MidiSettings {
    fn default() -> Self {
        MidiSettings {
            tpq: 480,
            tempo_bpm: 120.0,
            program: CHOIR_AAHS,
            velocity: 80,
        }
    }
}

/// Write the separation as SMF bytes
pub fn write_smf(
    measure_map: &MeasureMap,
    separation: &Separation,
    settings: &MidiSettings,
) -> Result<Vec<u8>, MidiError> {
    let mut tracks: Vec<Track> = Vec::with_capacity(5);
    tracks.push(conductor_track(measure_map, settings));

    for (idx, timeline) in separation.timelines().iter().enumerate() {
        tracks.push(part_track(timeline.label, idx as u8, &timeline.events, settings));
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(settings.tpq.into()),
        },
        tracks,
    };

    let mut out = Vec::new();
    smf.write(&mut out)
        .map_err(|e| MidiError::Write(e.to_string()))?;
    Ok(out)
}

fn conductor_track<'a>(measure_map: &MeasureMap, settings: &MidiSettings) -> Track<'a> {
    let mut events = Vec::new();

    let microseconds_per_quarter = (60_000_000.0 / settings.tempo_bpm) as u32;
    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(microseconds_per_quarter.into())),
    });

    for (measure, sig) in measure_map.sig_changes() {
        // Denominator as a power of two (4 -> 2, 8 -> 3)
        let denominator_power = (sig.den as f32).log2() as u8;
        events.push(TrackEvent {
            delta: beat_to_tick(measure_map.start(measure), settings.tpq).into(),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                sig.num,
                denominator_power,
                24, // MIDI clocks per metronome click
                8,  // 32nd notes per quarter note
            )),
        });
    }

    events.sort_by_key(|e| e.delta.as_int());
    convert_to_delta_times(&mut events);
    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    events
}

fn part_track<'a>(
    label: VoiceLabel,
    channel: u8,
    events_in: &[TimelineEvent],
    settings: &MidiSettings,
) -> Track<'a> {
    let mut events = Vec::new();

    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(label.name().as_bytes())),
    });
    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Midi {
            channel: channel.into(),
            message: MidiMessage::ProgramChange {
                program: settings.program.into(),
            },
        },
    });

    for event in events_in {
        let (onset, duration, pitch) = match *event {
            TimelineEvent::Note {
                onset,
                duration,
                pitch,
            } => (onset, duration, pitch),
            TimelineEvent::Rest { .. } => continue,
        };
        events.push(TrackEvent {
            delta: beat_to_tick(onset, settings.tpq).into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOn {
                    key: pitch.into(),
                    vel: settings.velocity.into(),
                },
            },
        });
        events.push(TrackEvent {
            delta: beat_to_tick(onset + duration, settings.tpq).into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOff {
                    key: pitch.into(),
                    vel: 0.into(),
                },
            },
        });
    }

    // Stable sort keeps NoteOff before the next NoteOn at the same tick
    events.sort_by_key(|e| e.delta.as_int());
    convert_to_delta_times(&mut events);
    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    events
}

/// Rational beats to MIDI ticks, rounded to nearest
fn beat_to_tick(beat: Beat, tpq: u16) -> u32 {
    let num = *beat.numer() as i64 * tpq as i64;
    let den = *beat.denom() as i64;
    ((num + den / 2) / den) as u32
}

/// Convert absolute tick times to delta times (time since previous event)
fn convert_to_delta_times(events: &mut [TrackEvent]) {
    let mut prev_tick = 0u32;
    for event in events.iter_mut() {
        let current_tick = event.delta.as_int();
        let delta = current_tick.saturating_sub(prev_tick);
        event.delta = delta.into();
        prev_tick = current_tick;
    }
}
