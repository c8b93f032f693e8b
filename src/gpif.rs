use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::error::GpxError;
use crate::score::{Note, Score, Slide, Track};

struct GpifNote {
    string: i32,
    fret: i32,
    muted: bool,
    palm_muted: bool,
    harmonic: bool,
    pinch_harmonic: bool,
    accent: bool,
    hopo: bool,
    tapped: bool,
    vibrato: bool,
    slide: Option<&'static str>,
    bend_points: Vec<(i64, i64)>,
}

struct GpifRhythm {
    note_value: &'static str,
    dots: u8,
}

struct GpifBeat {
    rhythm: GpifRhythm,
    notes: Vec<GpifNote>,
    chord_id: Option<i32>,
}

struct GpifVoice {
    beat_ids: Vec<usize>,
}

struct GpifBar {
    voice_ids: Vec<usize>,
}

struct GpifMasterBar {
    numerator: u32,
    denominator: u32,
    bar_ids: Vec<usize>,
}

struct GpifTrackInfo {
    name: String,
    tuning_high_to_low: Vec<i32>,
    capo: i32,
}

/// The flattened, index-addressed arena a GPIF document is serialized from.
pub struct GpifDocument {
    title: String,
    artist: String,
    album: String,
    tempo: f64,
    tracks: Vec<GpifTrackInfo>,
    master_bars: Vec<GpifMasterBar>,
    bars: Vec<GpifBar>,
    voices: Vec<GpifVoice>,
    beats: Vec<GpifBeat>,
}

fn from_ticks(duration: i64) -> GpifRhythm {
    let (note_value, dots) = match duration {
        d if d >= 192 => ("Whole", 0),
        d if d >= 144 => ("Half", 1),
        d if d >= 96 => ("Half", 0),
        d if d >= 72 => ("Quarter", 1),
        d if d >= 48 => ("Quarter", 0),
        d if d >= 36 => ("Eighth", 1),
        d if d >= 24 => ("Eighth", 0),
        d if d >= 18 => ("Sixteenth", 1),
        d if d >= 12 => ("Sixteenth", 0),
        d if d >= 8 => ("ThirtySecond", 0),
        _ => ("SixtyFourth", 0),
    };
    GpifRhythm { note_value, dots }
}

fn slide_tag(slide: Slide) -> Option<&'static str> {
    match slide {
        Slide::None => None,
        Slide::ToNext => Some("SHIFT"),
        Slide::UnpitchUp => Some("SLIDE_OUT_UP"),
        Slide::UnpitchDown => Some("SLIDE_OUT_DOWN"),
    }
}

fn gpif_note(n: &Note, num_strings: u8) -> GpifNote {
    GpifNote {
        string: num_strings as i32 - n.string as i32,
        fret: n.fret,
        muted: n.muted,
        palm_muted: n.palm_muted,
        harmonic: n.harmonic,
        pinch_harmonic: n.pinch_harmonic,
        accent: n.accent,
        hopo: n.hopo,
        tapped: n.tapped,
        vibrato: n.vibrato,
        slide: slide_tag(n.slide),
        bend_points: n
            .bend_values
            .iter()
            .map(|(pos, step)| ((pos * 100.0).round() as i64, (step * 100.0).round() as i64))
            .collect(),
    }
}

fn track_info(track: &Track) -> GpifTrackInfo {
    let num_strings = track.num_strings;
    let tuning_high_to_low: Vec<i32> = track
        .tuning
        .iter()
        .take(num_strings as usize)
        .rev()
        .copied()
        .collect();
    GpifTrackInfo {
        name: track.name.clone(),
        tuning_high_to_low,
        capo: track.capo,
    }
}

/// Builds the flattened GPIF arena from a [`Score`]: one `Bar`/`Voice` per
/// track-bar, one `Beat` per chord (or a rest beat for an empty bar), and
/// `MasterBar`s that iterate the first track's bar count.
pub fn build_gpif(score: &Score) -> GpifDocument {
    let mut bars = Vec::new();
    let mut voices = Vec::new();
    let mut beats = Vec::new();

    let num_bars = score.tracks.first().map(|t| t.bars.len()).unwrap_or(0);

    for track in &score.tracks {
        for bar in &track.bars {
            let mut beat_ids = Vec::with_capacity(bar.chords.len().max(1));
            if bar.chords.is_empty() {
                beats.push(GpifBeat {
                    rhythm: from_ticks(bar.duration_ticks()),
                    notes: Vec::new(),
                    chord_id: None,
                });
                beat_ids.push(beats.len() - 1);
            } else {
                for chord in &bar.chords {
                    let notes = chord
                        .notes
                        .values()
                        .map(|n| gpif_note(n, track.num_strings))
                        .collect();
                    beats.push(GpifBeat {
                        rhythm: from_ticks(chord.duration_ticks),
                        notes,
                        chord_id: if chord.chord_id >= 0 {
                            Some(chord.chord_id)
                        } else {
                            None
                        },
                    });
                    beat_ids.push(beats.len() - 1);
                }
            }
            voices.push(GpifVoice { beat_ids });
            bars.push(GpifBar {
                voice_ids: vec![voices.len() - 1],
            });
        }
    }

    let mut master_bars = Vec::with_capacity(num_bars);
    for m in 0..num_bars {
        let first_bar = &score.tracks[0].bars[m];
        let mut bar_ids = Vec::with_capacity(score.tracks.len());
        for t in 0..score.tracks.len() {
            bar_ids.push(t * num_bars + m);
        }
        master_bars.push(GpifMasterBar {
            numerator: first_bar.time_numerator,
            denominator: first_bar.time_denominator,
            bar_ids,
        });
    }

    let tempo = score
        .tracks
        .first()
        .map(|t| t.average_bpm)
        .unwrap_or(120.0);

    GpifDocument {
        title: score.title.clone(),
        artist: score.artist.clone(),
        album: score.album.clone(),
        tempo,
        tracks: score.tracks.iter().map(track_info).collect(),
        master_bars,
        bars,
        voices,
        beats,
    }
}

fn text_elem(w: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<(), GpxError> {
    w.write_event(Event::Start(BytesStart::new(tag)))?;
    if !text.is_empty() {
        w.write_event(Event::Text(BytesText::new(text)))?;
    }
    w.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Serializes a [`GpifDocument`] to indented UTF-8 XML matching the GPIF
/// section layout (`GPVersion`, `Score`, `MasterTrack`, `Tracks`,
/// `MasterBars`, `Bars`, `Voices`, `Beats`, `Notes`, `Rhythms`).
pub fn write_gpif_xml(doc: &GpifDocument) -> Result<String, GpxError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Start(BytesStart::new("GPIF")))?;

    text_elem(&mut writer, "GPVersion", "7")?;

    writer.write_event(Event::Start(BytesStart::new("Score")))?;
    text_elem(&mut writer, "Title", &doc.title)?;
    text_elem(&mut writer, "Artist", &doc.artist)?;
    text_elem(&mut writer, "Album", &doc.album)?;
    writer.write_event(Event::End(BytesEnd::new("Score")))?;

    writer.write_event(Event::Start(BytesStart::new("MasterTrack")))?;
    writer.write_event(Event::Start(BytesStart::new("Automations")))?;
    writer.write_event(Event::Start(BytesStart::new("Automation")))?;
    text_elem(&mut writer, "Type", "Tempo")?;
    text_elem(&mut writer, "Value", &format!("{:.2}", doc.tempo))?;
    writer.write_event(Event::End(BytesEnd::new("Automation")))?;
    writer.write_event(Event::End(BytesEnd::new("Automations")))?;
    writer.write_event(Event::End(BytesEnd::new("MasterTrack")))?;

    writer.write_event(Event::Start(BytesStart::new("Tracks")))?;
    for (i, t) in doc.tracks.iter().enumerate() {
        let mut track_tag = BytesStart::new("Track");
        track_tag.push_attribute(("id", i.to_string().as_str()));
        writer.write_event(Event::Start(track_tag))?;
        text_elem(&mut writer, "Name", &t.name)?;
        text_elem(&mut writer, "ShortName", &t.name)?;
        writer.write_event(Event::Start(BytesStart::new("Color")))?;
        text_elem(&mut writer, "Red", "255")?;
        text_elem(&mut writer, "Green", "0")?;
        text_elem(&mut writer, "Blue", "0")?;
        writer.write_event(Event::End(BytesEnd::new("Color")))?;
        text_elem(&mut writer, "InstrumentRef", "")?;

        let mut tuning_tag = BytesStart::new("Tuning");
        let midi: Vec<String> = t.tuning_high_to_low.iter().map(|v| v.to_string()).collect();
        tuning_tag.push_attribute(("midi", midi.join(" ").as_str()));
        writer.write_event(Event::Empty(tuning_tag))?;

        text_elem(&mut writer, "Capo", &t.capo.to_string())?;
        writer.write_event(Event::End(BytesEnd::new("Track")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Tracks")))?;

    writer.write_event(Event::Start(BytesStart::new("MasterBars")))?;
    for mb in &doc.master_bars {
        writer.write_event(Event::Start(BytesStart::new("MasterBar")))?;
        text_elem(&mut writer, "Time", &format!("{}/{}", mb.numerator, mb.denominator))?;
        let ids: Vec<String> = mb.bar_ids.iter().map(|i| i.to_string()).collect();
        text_elem(&mut writer, "Bars", &ids.join(" "))?;
        writer.write_event(Event::End(BytesEnd::new("MasterBar")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("MasterBars")))?;

    writer.write_event(Event::Start(BytesStart::new("Bars")))?;
    for (i, b) in doc.bars.iter().enumerate() {
        let mut bar_tag = BytesStart::new("Bar");
        bar_tag.push_attribute(("id", i.to_string().as_str()));
        writer.write_event(Event::Start(bar_tag))?;
        let ids: Vec<String> = b.voice_ids.iter().map(|i| i.to_string()).collect();
        text_elem(&mut writer, "Voices", &ids.join(" "))?;
        writer.write_event(Event::End(BytesEnd::new("Bar")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Bars")))?;

    writer.write_event(Event::Start(BytesStart::new("Voices")))?;
    for (i, v) in doc.voices.iter().enumerate() {
        let mut voice_tag = BytesStart::new("Voice");
        voice_tag.push_attribute(("id", i.to_string().as_str()));
        writer.write_event(Event::Start(voice_tag))?;
        let ids: Vec<String> = v.beat_ids.iter().map(|i| i.to_string()).collect();
        text_elem(&mut writer, "Beats", &ids.join(" "))?;
        writer.write_event(Event::End(BytesEnd::new("Voice")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Voices")))?;

    writer.write_event(Event::Start(BytesStart::new("Beats")))?;
    let mut note_id = 0usize;
    let mut all_notes: Vec<&GpifNote> = Vec::new();
    let mut all_rhythms: Vec<&GpifRhythm> = Vec::new();
    for (i, beat) in doc.beats.iter().enumerate() {
        let mut beat_tag = BytesStart::new("Beat");
        beat_tag.push_attribute(("id", i.to_string().as_str()));
        writer.write_event(Event::Start(beat_tag))?;

        text_elem(&mut writer, "Rhythm", &i.to_string())?;
        all_rhythms.push(&beat.rhythm);

        if beat.notes.is_empty() {
            text_elem(&mut writer, "Rest", "true")?;
        } else {
            let mut ids = Vec::with_capacity(beat.notes.len());
            for n in &beat.notes {
                ids.push(note_id.to_string());
                all_notes.push(n);
                note_id += 1;
            }
            text_elem(&mut writer, "Notes", &ids.join(" "))?;
        }
        if let Some(chord_id) = beat.chord_id {
            text_elem(&mut writer, "Chord", &chord_id.to_string())?;
        }
        writer.write_event(Event::End(BytesEnd::new("Beat")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Beats")))?;

    writer.write_event(Event::Start(BytesStart::new("Notes")))?;
    for (i, n) in all_notes.iter().enumerate() {
        let mut note_tag = BytesStart::new("Note");
        note_tag.push_attribute(("id", i.to_string().as_str()));
        writer.write_event(Event::Start(note_tag))?;

        writer.write_event(Event::Start(BytesStart::new("Properties")))?;
        write_property(&mut writer, "String", &n.string.to_string())?;
        if n.fret >= 0 {
            write_property(&mut writer, "Fret", &n.fret.to_string())?;
        }
        if n.muted {
            write_property(&mut writer, "Muted", "true")?;
        }
        if n.palm_muted {
            write_property(&mut writer, "PalmMute", "true")?;
        }
        if n.harmonic {
            write_property(&mut writer, "HarmonicType", "Natural")?;
        }
        if n.pinch_harmonic {
            write_property(&mut writer, "HarmonicType", "Artificial")?;
        }
        writer.write_event(Event::End(BytesEnd::new("Properties")))?;

        if n.accent {
            text_elem(&mut writer, "Accent", "Heavy")?;
        }
        if n.hopo {
            text_elem(&mut writer, "HammerOn", "true")?;
        }
        if n.tapped {
            text_elem(&mut writer, "Tapping", "true")?;
        }
        if n.vibrato {
            text_elem(&mut writer, "Vibrato", "true")?;
        }
        if let Some(slide) = n.slide {
            text_elem(&mut writer, "Slide", slide)?;
        }
        if !n.bend_points.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("Bend")))?;
            writer.write_event(Event::Start(BytesStart::new("Points")))?;
            for (time, value) in &n.bend_points {
                let mut point = BytesStart::new("Point");
                point.push_attribute(("time", time.to_string().as_str()));
                point.push_attribute(("value", value.to_string().as_str()));
                writer.write_event(Event::Empty(point))?;
            }
            writer.write_event(Event::End(BytesEnd::new("Points")))?;
            writer.write_event(Event::End(BytesEnd::new("Bend")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("Note")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Notes")))?;

    writer.write_event(Event::Start(BytesStart::new("Rhythms")))?;
    for (i, r) in all_rhythms.iter().enumerate() {
        let mut rhythm_tag = BytesStart::new("Rhythm");
        rhythm_tag.push_attribute(("id", i.to_string().as_str()));
        writer.write_event(Event::Start(rhythm_tag))?;
        text_elem(&mut writer, "NoteValue", r.note_value)?;
        if r.dots > 0 {
            text_elem(&mut writer, "AugmentationDot", &r.dots.to_string())?;
        }
        writer.write_event(Event::End(BytesEnd::new("Rhythm")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Rhythms")))?;

    writer.write_event(Event::End(BytesEnd::new("GPIF")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

fn write_property(w: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &str) -> Result<(), GpxError> {
    let mut tag = BytesStart::new("Property");
    tag.push_attribute(("name", name));
    w.write_event(Event::Start(tag))?;
    text_elem(w, "Number", value)?;
    w.write_event(Event::End(BytesEnd::new("Property")))?;
    Ok(())
}
