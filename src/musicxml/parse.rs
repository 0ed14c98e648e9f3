use std::collections::{BTreeMap, HashMap};

use num_rational::Rational32;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::musicxml::{MusicXmlError, Result};
use crate::score::pitch::pitch_to_midi;
use crate::score::{
    Beat, Clef, NoteDraft, PartDraft, ScoreDraft, StaffDraft, StemDirection, TieFlags, TimeSig,
    VoiceDraft,
};

/// Parse partwise MusicXML bytes into a raw score draft
pub fn parse_musicxml(xml: &[u8]) -> Result<ScoreDraft> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut draft = ScoreDraft::default();
    let mut part_names: HashMap<String, String> = HashMap::new();
    let mut current_score_part: Option<String> = None;
    let mut part: Option<PartAcc> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"score-timewise" => {
                    return Err(MusicXmlError::Invalid(
                        "timewise documents are not supported".to_string(),
                    ));
                }
                b"score-part" => {
                    current_score_part = attribute(e, b"id");
                }
                b"part-name" => {
                    if let Some(id) = current_score_part.clone() {
                        let name = text_content(&mut reader, &mut buf)?;
                        if !name.is_empty() {
                            part_names.insert(id, name);
                        }
                    }
                }
                b"part" => {
                    let id = attribute(e, b"id")
                        .unwrap_or_else(|| format!("P{}", draft.parts.len() + 1));
                    let name = part_names.get(&id).cloned();
                    part = Some(PartAcc::new(name, draft.parts.is_empty()));
                }
                b"measure" => {
                    if let Some(ref mut p) = part {
                        p.begin_measure(&mut draft.measures);
                    }
                }
                b"attributes" => {
                    if let Some(ref mut p) = part {
                        p.read_attributes(&mut reader, &mut buf, &mut draft.measures)?;
                    }
                }
                b"note" => {
                    if let Some(ref mut p) = part {
                        let parsed = read_note(&mut reader, &mut buf)?;
                        p.push_note(parsed);
                    }
                }
                b"backup" => {
                    if let Some(ref mut p) = part {
                        p.position -= read_duration(&mut reader, &mut buf, b"backup")?;
                    }
                }
                b"forward" => {
                    if let Some(ref mut p) = part {
                        p.position += read_duration(&mut reader, &mut buf, b"forward")?;
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"part" => {
                    if let Some(p) = part.take() {
                        draft.parts.push(p.finish());
                    }
                }
                b"score-part" => {
                    current_score_part = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MusicXmlError::Xml(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if draft.parts.is_empty() {
        return Err(MusicXmlError::Invalid("no parts found".to_string()));
    }
    log::debug!(
        "parsed musicxml: {} parts, {} measures",
        draft.parts.len(),
        draft.measures.len()
    );
    Ok(draft)
}

/// Accumulator for one `<part>` element
struct PartAcc {
    name: Option<String>,
    /// Whether this part defines the global measure list
    leads_measures: bool,
    divisions: i32,
    current_sig: TimeSig,
    measure_index: Option<usize>,
    measure_count: usize,
    /// Position within the current measure, in divisions
    position: i64,
    /// Onset of the most recent non-chord note, for `<chord/>` members
    last_onset: i64,
    staves: BTreeMap<usize, StaffAcc>,
}

#[derive(Default)]
struct StaffAcc {
    clefs: Vec<(usize, Clef)>,
    voices: BTreeMap<usize, Vec<NoteDraft>>,
}

impl PartAcc {
    fn new(name: Option<String>, leads_measures: bool) -> Self {
        PartAcc {
            name,
            leads_measures,
            divisions: 1,
            current_sig: TimeSig::new(4, 4),
            measure_index: None,
            measure_count: 0,
            position: 0,
            last_onset: 0,
            staves: BTreeMap::new(),
        }
    }

    fn begin_measure(&mut self, measures: &mut Vec<TimeSig>) {
        self.measure_index = Some(self.measure_count);
        self.measure_count += 1;
        self.position = 0;
        self.last_onset = 0;
        if self.leads_measures {
            measures.push(self.current_sig);
        }
    }

    fn read_attributes(
        &mut self,
        reader: &mut Reader<&[u8]>,
        buf: &mut Vec<u8>,
        measures: &mut Vec<TimeSig>,
    ) -> Result<()> {
        loop {
            match reader.read_event_into(buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"divisions" => {
                        self.divisions = text_content(reader, buf)?.parse().unwrap_or(1).max(1);
                    }
                    b"time" => {
                        let sig = read_time_signature(reader, buf)?;
                        self.current_sig = sig;
                        if self.leads_measures {
                            if let Some(last) = measures.last_mut() {
                                *last = sig;
                            }
                        }
                    }
                    b"clef" => {
                        let staff = attribute(e, b"number")
                            .and_then(|s| s.parse::<usize>().ok())
                            .unwrap_or(1);
                        if let Some(clef) = read_clef(reader, buf)? {
                            let measure = self.measure_index.unwrap_or(0);
                            self.staves
                                .entry(staff)
                                .or_default()
                                .clefs
                                .push((measure, clef));
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(ref e)) if e.name().as_ref() == b"attributes" => break,
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(MusicXmlError::Xml(format!("error parsing attributes: {}", e)))
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn push_note(&mut self, parsed: ParsedNote) {
        if parsed.grace {
            return; // grace notes carry no duration, nothing to place
        }
        let onset = if parsed.chord {
            self.last_onset
        } else {
            self.last_onset = self.position;
            self.position += parsed.duration;
            self.last_onset
        };
        if parsed.rest {
            return; // silence is reconstructed by the timeline merger
        }
        let Some(pitch) = parsed.pitch else {
            return;
        };
        let measure = self.measure_index.unwrap_or(0);
        let beat = Rational32::new(onset as i32, self.divisions);
        let duration: Beat = Rational32::new(parsed.duration as i32, self.divisions);
        self.staves
            .entry(parsed.staff)
            .or_default()
            .voices
            .entry(parsed.voice)
            .or_default()
            .push(NoteDraft {
                pitch,
                measure,
                beat,
                duration,
                stem: parsed.stem,
                tie: parsed.tie,
            });
    }

    /// Flatten accumulated staves into the draft, renumbering MusicXML's
    /// sparse 1-based voice numbers into dense 0-based indices per staff
    fn finish(self) -> PartDraft {
        let measure_count = self.measure_count;
        let staves = self
            .staves
            .into_values()
            .map(|acc| StaffDraft {
                clefs: acc.clefs,
                voices: acc.voices.into_values().flat_map(split_chords).collect(),
                measure_count,
            })
            .collect();
        PartDraft {
            name: self.name,
            staves,
        }
    }
}

/// Split one notated voice into monophonic streams
///
/// Chord members share an onset within a single `<voice>`, which the model
/// forbids. Each onset group goes to distinct streams, highest pitch in the
/// first, so the resulting voice indices read top-down the way the split
/// rules expect.
fn split_chords(notes: Vec<NoteDraft>) -> Vec<VoiceDraft> {
    let mut streams: Vec<Vec<NoteDraft>> = Vec::new();
    let mut i = 0;
    while i < notes.len() {
        let mut j = i + 1;
        while j < notes.len()
            && notes[j].measure == notes[i].measure
            && notes[j].beat == notes[i].beat
        {
            j += 1;
        }
        let mut group: Vec<NoteDraft> = notes[i..j].to_vec();
        group.sort_by(|a, b| b.pitch.cmp(&a.pitch));
        for note in group {
            place(&mut streams, note);
        }
        i = j;
    }
    streams
        .into_iter()
        .map(|notes| VoiceDraft { notes })
        .collect()
}

/// Append to the first stream that is free at the note's onset, opening a
/// new stream when every existing one is still sounding
fn place(streams: &mut Vec<Vec<NoteDraft>>, note: NoteDraft) {
    for stream in streams.iter_mut() {
        let free = stream.last().map_or(true, |last| {
            last.measure < note.measure
                || (last.measure == note.measure && last.beat + last.duration <= note.beat)
        });
        if free {
            stream.push(note);
            return;
        }
    }
    streams.push(vec![note]);
}

struct ParsedNote {
    rest: bool,
    grace: bool,
    chord: bool,
    pitch: Option<u8>,
    duration: i64,
    voice: usize,
    staff: usize,
    stem: StemDirection,
    tie: TieFlags,
}

fn read_note(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<ParsedNote> {
    let mut note = ParsedNote {
        rest: false,
        grace: false,
        chord: false,
        pitch: None,
        duration: 0,
        voice: 1,
        staff: 1,
        stem: StemDirection::Unknown,
        tie: TieFlags::default(),
    };

    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"rest" => note.rest = true,
                b"grace" => note.grace = true,
                b"chord" => note.chord = true,
                b"pitch" => {
                    note.pitch = Some(read_pitch(reader, buf)?);
                }
                b"duration" => {
                    note.duration = text_content(reader, buf)?.parse().unwrap_or(0);
                }
                b"voice" => {
                    note.voice = text_content(reader, buf)?.parse().unwrap_or(1);
                }
                b"staff" => {
                    note.staff = text_content(reader, buf)?.parse().unwrap_or(1);
                }
                b"stem" => {
                    note.stem = match text_content(reader, buf)?.as_str() {
                        "up" => StemDirection::Up,
                        "down" => StemDirection::Down,
                        _ => StemDirection::Unknown,
                    };
                }
                b"tie" => match attribute(e, b"type").as_deref() {
                    Some("start") => note.tie.starts = true,
                    Some("stop") => note.tie.ends = true,
                    _ => {}
                },
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"note" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicXmlError::Xml(format!("error parsing note: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(note)
}

fn read_pitch(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<u8> {
    let mut step = String::new();
    let mut alter = 0i8;
    let mut octave = 4i8;
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"step" => step = text_content(reader, buf)?,
                b"alter" => alter = text_content(reader, buf)?.parse().unwrap_or(0),
                b"octave" => octave = text_content(reader, buf)?.parse().unwrap_or(4),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"pitch" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicXmlError::Xml(format!("error parsing pitch: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(pitch_to_midi(&step, alter, octave))
}

fn read_clef(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<Option<Clef>> {
    let mut sign = String::new();
    let mut line = 0u8;
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"sign" => sign = text_content(reader, buf)?,
                b"line" => line = text_content(reader, buf)?.parse().unwrap_or(0),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"clef" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicXmlError::Xml(format!("error parsing clef: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    let clef = match (sign.as_str(), line) {
        ("G", _) => Some(Clef::Treble),
        ("F", _) => Some(Clef::Bass),
        ("C", 4) => Some(Clef::Tenor),
        ("C", _) => Some(Clef::Alto),
        _ => {
            log::debug!("ignoring unsupported clef sign {:?}", sign);
            None
        }
    };
    Ok(clef)
}

fn read_time_signature(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<TimeSig> {
    let mut num = 4u8;
    let mut den = 4u8;
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"beats" => num = text_content(reader, buf)?.parse().unwrap_or(4),
                b"beat-type" => den = text_content(reader, buf)?.parse().unwrap_or(4),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"time" => break,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MusicXmlError::Xml(format!(
                    "error parsing time signature: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(TimeSig::new(num, den))
}

/// Read the `<duration>` child of a `<backup>`/`<forward>` element
fn read_duration(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, end_tag: &[u8]) -> Result<i64> {
    let mut duration = 0i64;
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"duration" => {
                duration = text_content(reader, buf)?.parse().unwrap_or(0);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == end_tag => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicXmlError::Xml(format!("error parsing duration: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(duration)
}

fn text_content(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<String> {
    match reader.read_event_into(buf) {
        Ok(Event::Text(e)) => String::from_utf8(e.to_vec())
            .map_err(|e| MusicXmlError::Xml(format!("invalid UTF-8: {}", e))),
        Ok(_) => Ok(String::new()),
        Err(e) => Err(MusicXmlError::Xml(format!("error reading text: {}", e))),
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| {
            a.as_ref()
                .map(|attr| attr.key.as_ref() == key)
                .unwrap_or(false)
        })
        .and_then(|a| a.ok())
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}
