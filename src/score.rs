use std::collections::BTreeMap;

use crate::error::ScoreError;
use crate::manifest::Attributes2014;
use crate::models::{Arrangement, Chord as SngChordTemplate, Note as SngNote};
use crate::sng::SngAsset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    Guitar,
    Bass,
    Vocals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackPath {
    Lead,
    Rhythm,
    Bass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slide {
    None,
    ToNext,
    UnpitchUp,
    UnpitchDown,
}

#[derive(Debug, Clone)]
pub struct ChordTemplate {
    pub name: String,
    pub frets: [i32; 6],
    pub fingers: [i32; 6],
}

#[derive(Debug, Clone)]
pub struct Note {
    pub string: u8,
    pub fret: i32,
    pub sustain_sec: f64,
    pub palm_muted: bool,
    pub muted: bool,
    pub hopo: bool,
    pub vibrato: bool,
    pub link_next: bool,
    pub accent: bool,
    pub harmonic: bool,
    pub pinch_harmonic: bool,
    pub tremolo: bool,
    pub tapped: bool,
    pub slapped: bool,
    pub popped: bool,
    pub left_fingering: Option<i32>,
    pub slide: Slide,
    pub slide_target: Option<i32>,
    pub bend_values: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct Chord {
    pub start_sec: f64,
    pub end_sec: f64,
    pub duration_ticks: i64,
    pub chord_id: i32,
    pub notes: BTreeMap<u8, Note>,
    pub brush: bool,
    pub slapped: bool,
    pub popped: bool,
    pub tremolo: bool,
    pub section: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Bar {
    pub start_sec: f64,
    pub end_sec: f64,
    pub beat_times_sec: Vec<f64>,
    pub time_numerator: u32,
    pub time_denominator: u32,
    pub beats_per_minute: f64,
    pub chords: Vec<Chord>,
}

impl Bar {
    pub fn duration_ticks(&self) -> i64 {
        (self.time_numerator as i64 * 192) / self.time_denominator as i64
    }

    /// Integrates the musical duration of `[t, t+delta)` against this bar's
    /// beat grid: for each consecutive beat pair overlapping the span,
    /// accumulates `(overlap / beat_len) * (4 / denominator)`.
    pub fn duration_for(&self, t: f64, delta: f64) -> f64 {
        let span_end = t + delta;
        let mut total = 0.0;
        for window in self.beat_times_sec.windows(2) {
            let (b0, b1) = (window[0], window[1]);
            let beat_len = b1 - b0;
            if beat_len <= 0.0 {
                continue;
            }
            let overlap = (b1.min(span_end) - b0.max(t)).max(0.0);
            if overlap > 0.0 {
                total += (overlap / beat_len) * (4.0 / self.time_denominator as f64);
            }
        }
        total
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub instrument: Instrument,
    pub path: TrackPath,
    pub bonus: bool,
    pub num_strings: u8,
    pub tuning: [i32; 6],
    pub capo: i32,
    pub chord_templates: BTreeMap<i32, ChordTemplate>,
    pub bars: Vec<Bar>,
    pub average_bpm: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Score {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: i64,
    pub tracks: Vec<Track>,
}

const MASK_CHORD: u32 = 0x0000_0002;
const MASK_SLIDE: u32 = 0x0000_0004;
const MASK_HARMONIC: u32 = 0x0000_0020;
const MASK_PALM_MUTE: u32 = 0x0000_0040;
const MASK_VIBRATO: u32 = 0x0000_0100;
const MASK_HAMMER_ON: u32 = 0x0000_0200;
const MASK_PULL_OFF: u32 = 0x0000_0400;
const MASK_SLIDE_UNPITCHED: u32 = 0x0000_0800;
const MASK_TREMOLO: u32 = 0x0000_2000;
const MASK_ACCENT: u32 = 0x0000_4000;
const MASK_LINK_NEXT: u32 = 0x0000_8000;
const MASK_MUTE: u32 = 0x0002_0000;
const MASK_PINCH_HARMONIC: u32 = 0x0004_0000;
const MASK_SLAP: u32 = 0x0008_0000;
const MASK_TAP: u32 = 0x0010_0000;

fn byte_field(b: u8) -> Option<i32> {
    match b {
        0 | 0xFF => None,
        v => Some(v as i32),
    }
}

fn decode_slide(mask: u32, fret: i32, slide_to: u8, slide_unpitch_to: u8) -> (Slide, Option<i32>) {
    if mask & MASK_SLIDE_UNPITCHED != 0 {
        let target = byte_field(slide_unpitch_to);
        let kind = match target {
            Some(t) if t > fret => Slide::UnpitchUp,
            Some(_) => Slide::UnpitchDown,
            None => Slide::UnpitchDown,
        };
        (kind, target)
    } else if mask & MASK_SLIDE != 0 {
        if let Some(target) = byte_field(slide_to) {
            (Slide::ToNext, Some(target & 0xFF))
        } else {
            (Slide::None, None)
        }
    } else {
        (Slide::None, None)
    }
}

fn bend_values(points: &[(f32, f32)], t_note: f64) -> Vec<(f64, f64)> {
    points
        .iter()
        .filter(|(time, _)| *time != 0.0)
        .map(|(time, step)| ((*time as f64 - t_note).max(0.0), *step as f64))
        .collect()
}

/// Decodes one SNG `Note` record using the single-note mask-bit table.
fn decode_single(n: &SngNote) -> Note {
    let mask = n.note_mask;
    let (slide, slide_target) = decode_slide(mask, n.fret_id as i32, n.slide_to, n.slide_unpitch_to);
    Note {
        string: n.string_index,
        fret: n.fret_id as i32,
        sustain_sec: n.sustain as f64,
        palm_muted: mask & MASK_PALM_MUTE != 0,
        muted: mask & MASK_MUTE != 0,
        hopo: mask & MASK_HAMMER_ON != 0 || mask & MASK_PULL_OFF != 0,
        vibrato: mask & MASK_VIBRATO != 0,
        link_next: mask & MASK_LINK_NEXT != 0,
        accent: mask & MASK_ACCENT != 0,
        harmonic: mask & MASK_HARMONIC != 0,
        pinch_harmonic: mask & MASK_PINCH_HARMONIC != 0,
        tremolo: mask & MASK_TREMOLO != 0,
        tapped: mask & MASK_TAP != 0,
        slapped: mask & MASK_SLAP != 0,
        popped: byte_field(n.pluck).is_some(),
        left_fingering: byte_field(n.left_hand),
        slide,
        slide_target,
        bend_values: bend_values(
            &n.bend_data.iter().map(|b| (b.time, b.step)).collect::<Vec<_>>(),
            n.time as f64,
        ),
    }
}

/// Per-string inputs pulled out of a `ChordNotes` record for one string index.
struct ChordStringInput<'a> {
    string: u8,
    fret: i32,
    mask: u32,
    sustain_sec: f64,
    slide_to: u8,
    slide_unpitch_to: u8,
    vibrato_raw: i16,
    bend_points: &'a [(f32, f32)],
    t_chord: f64,
}

/// Synthesizes one string's `Note` from a chord-notes entry's per-string
/// sub-arrays. Mask bit `0x0004_0000` is ignored here (see spec's open
/// question on the overloaded pinch-harmonic/pluck bit).
fn decode_chord_string(input: ChordStringInput) -> Note {
    let mask = input.mask;
    let (slide, slide_target) = decode_slide(mask, input.fret, input.slide_to, input.slide_unpitch_to);
    Note {
        string: input.string,
        fret: input.fret,
        sustain_sec: input.sustain_sec,
        palm_muted: mask & MASK_PALM_MUTE != 0,
        muted: mask & MASK_MUTE != 0,
        hopo: mask & MASK_HAMMER_ON != 0 || mask & MASK_PULL_OFF != 0,
        vibrato: mask & MASK_VIBRATO != 0 || input.vibrato_raw != 0,
        link_next: mask & MASK_LINK_NEXT != 0,
        accent: mask & MASK_ACCENT != 0,
        harmonic: mask & MASK_HARMONIC != 0,
        pinch_harmonic: false,
        tremolo: mask & MASK_TREMOLO != 0,
        tapped: mask & MASK_TAP != 0,
        slapped: mask & MASK_SLAP != 0,
        popped: false,
        left_fingering: None,
        slide,
        slide_target,
        bend_values: bend_values(input.bend_points, input.t_chord),
    }
}

fn build_chord_templates(chords: &[SngChordTemplate]) -> BTreeMap<i32, ChordTemplate> {
    let mut out = BTreeMap::new();
    for (i, c) in chords.iter().enumerate() {
        let map_byte = |b: u8| if b == 0xFF { -1 } else { b as i32 };
        out.insert(
            i as i32,
            ChordTemplate {
                name: c.name.clone(),
                frets: [
                    map_byte(c.frets[0]),
                    map_byte(c.frets[1]),
                    map_byte(c.frets[2]),
                    map_byte(c.frets[3]),
                    map_byte(c.frets[4]),
                    map_byte(c.frets[5]),
                ],
                fingers: [
                    map_byte(c.fingers[0]),
                    map_byte(c.fingers[1]),
                    map_byte(c.fingers[2]),
                    map_byte(c.fingers[3]),
                    map_byte(c.fingers[4]),
                    map_byte(c.fingers[5]),
                ],
            },
        );
    }
    out
}

fn average_bpm(bpms: &[crate::models::Bpm]) -> f64 {
    if bpms.len() < 2 {
        return 120.0;
    }
    let n = bpms.len();
    let t0 = bpms[0].time as f64;
    let tn = bpms[n - 1].time as f64;
    if (tn - t0).abs() < f64::EPSILON {
        return 120.0;
    }
    60.0 * (n as f64 - 1.0) / (tn - t0)
}

fn build_bars(bpms: &[crate::models::Bpm], song_length: f64, average_bpm: f64) -> Vec<Bar> {
    let bar_starts: Vec<usize> = bpms
        .iter()
        .enumerate()
        .filter(|(_, e)| e.measure != -1)
        .map(|(i, _)| i)
        .collect();

    let mut bars = Vec::with_capacity(bar_starts.len());
    for (idx, &first) in bar_starts.iter().enumerate() {
        let last = bar_starts.get(idx + 1).copied().unwrap_or(bpms.len());
        let start = bpms[first].time as f64;
        let end = if idx + 1 < bar_starts.len() {
            bpms[last].time as f64
        } else {
            song_length
        };

        let mut beat_times: Vec<f64> = bpms[first..last].iter().map(|e| e.time as f64).collect();
        if beat_times.last().copied() != Some(end) {
            beat_times.push(end);
        }

        let numerator = (last - first).max(1) as u32;
        let delta = ((end - start) / numerator as f64).max(1e-6);
        let denom_4_guess = (60.0 / delta - average_bpm).abs();
        let denom_8_guess = (30.0 / delta - average_bpm).abs();
        let time_denominator = if denom_4_guess < denom_8_guess { 4 } else { 8 };
        let beats_per_minute = ((4.0 / time_denominator as f64) * 60.0 / delta).round();

        bars.push(Bar {
            start_sec: start,
            end_sec: end,
            beat_times_sec: beat_times,
            time_numerator: numerator,
            time_denominator,
            beats_per_minute,
            chords: Vec::new(),
        });
    }
    bars
}

fn find_bar_index(bars: &[Bar], t: f64) -> Option<usize> {
    bars.iter()
        .position(|b| t >= b.start_sec && t < b.end_sec)
}

fn group_notes_by_time(notes: &[SngNote]) -> BTreeMap<u64, Vec<&SngNote>> {
    let mut groups: BTreeMap<u64, Vec<&SngNote>> = BTreeMap::new();
    for n in notes {
        groups.entry((n.time as f64).to_bits()).or_default().push(n);
    }
    groups
}

/// Builds one [`Track`] from an SNG asset and its manifest attributes,
/// choosing the highest-difficulty arrangement and snapping nothing yet —
/// durations are left as raw tick estimates for the rhythm snapper.
pub fn build_track(sng: &SngAsset, attrs: &Attributes2014) -> Result<Track, ScoreError> {
    let instrument = if attrs.arrangement_type == 3 {
        Instrument::Bass
    } else {
        Instrument::Guitar
    };
    let path = match attrs.arrangement_type {
        0 => TrackPath::Lead,
        1 | 2 => TrackPath::Rhythm,
        3 => TrackPath::Bass,
        _ => TrackPath::Lead,
    };

    let num_strings = (sng.metadata.string_count as u8).max(4);
    let mut tuning = [0i32; 6];
    for (i, t) in sng.metadata.tuning.iter().take(6).enumerate() {
        tuning[i] = *t as i32;
    }
    let capo = if sng.metadata.capo_fret_id == 0xFF {
        0
    } else {
        sng.metadata.capo_fret_id as i32
    };

    let chord_templates = build_chord_templates(&sng.chords);
    let avg_bpm = average_bpm(&sng.bpms);
    let mut bars = build_bars(&sng.bpms, sng.metadata.song_length as f64, avg_bpm);

    let arrangement: &Arrangement = sng
        .arrangements
        .iter()
        .max_by_key(|a| a.difficulty)
        .ok_or_else(|| ScoreError::Decode("no arrangements in SNG asset".to_string()))?;

    let groups = group_notes_by_time(&arrangement.notes);

    for group in groups.values() {
        let t = group[0].time as f64;
        let Some(bar_idx) = find_bar_index(&bars, t) else {
            continue;
        };

        let is_chord = group.iter().any(|n| n.note_mask & MASK_CHORD != 0)
            || group.len() >= 2
            || group.iter().any(|n| n.chord_id != -1);

        let (chord_id, notes_map) = if !is_chord {
            let n = group[0];
            let mut m = BTreeMap::new();
            m.insert(n.string_index, decode_single(n));
            (-1, m)
        } else {
            let rep = group.iter().find(|n| n.chord_id != -1).copied().unwrap_or(group[0]);
            let chord_id = rep.chord_id;
            let chord_notes_id = rep.chord_notes_id;
            let mut m = BTreeMap::new();

            if chord_notes_id >= 0 && (chord_notes_id as usize) < sng.chord_notes.len() {
                let cn = &sng.chord_notes[chord_notes_id as usize];
                let template = chord_templates.get(&chord_id);
                for s in 0..6usize {
                    let tmpl_fret = template.map(|t| t.frets[s]).unwrap_or(-1);
                    let mask_s = cn.note_mask[s] as u32;
                    if tmpl_fret == -1 && mask_s == 0 {
                        continue;
                    }
                    let bend_points: Vec<(f32, f32)> = cn.bend_data[s]
                        .bend_data
                        .iter()
                        .take(cn.bend_data[s].used_count.max(0) as usize)
                        .map(|b| (b.time, b.step))
                        .collect();
                    let note = decode_chord_string(ChordStringInput {
                        string: s as u8,
                        fret: tmpl_fret,
                        mask: mask_s,
                        sustain_sec: rep.sustain as f64,
                        slide_to: cn.slide_to[s],
                        slide_unpitch_to: cn.slide_unpitch_to[s],
                        vibrato_raw: cn.vibrato[s],
                        bend_points: &bend_points,
                        t_chord: t,
                    });
                    m.insert(s as u8, note);
                }
            } else {
                for n in group {
                    m.insert(n.string_index, decode_single(n));
                }
            }
            (chord_id, m)
        };

        let sustain_max = notes_map.values().map(|n| n.sustain_sec).fold(0.0, f64::max);
        let start = t;
        let end = start + sustain_max.max(0.01);
        let bar = &bars[bar_idx];
        let duration_ticks = (bar.duration_for(start, end - start) * 48.0).round() as i64;

        bars[bar_idx].chords.push(Chord {
            start_sec: start,
            end_sec: end,
            duration_ticks,
            chord_id,
            notes: notes_map,
            brush: false,
            slapped: group.iter().any(|n| n.note_mask & MASK_SLAP != 0),
            popped: group.iter().any(|n| byte_field(n.pluck).is_some()),
            tremolo: group.iter().any(|n| n.note_mask & MASK_TREMOLO != 0),
            section: None,
        });
    }

    for bar in &mut bars {
        bar.chords.sort_by(|a, b| a.start_sec.partial_cmp(&b.start_sec).unwrap());
    }

    Ok(Track {
        name: attrs.arrangement_name.clone(),
        instrument,
        path,
        bonus: attrs.bonus,
        num_strings,
        tuning,
        capo,
        chord_templates,
        bars,
        average_bpm: avg_bpm,
    })
}
