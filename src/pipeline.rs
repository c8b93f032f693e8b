use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::decryptor::SngPlatform;
use crate::error::{ConvertError, ConvertWarning};
use crate::gpif::{build_gpif, write_gpif_xml};
use crate::gpx::write_gpx;
use crate::manifest::{parse_manifest, sng_asset_suffixes, Attributes2014};
use crate::psarc::PsarcFile;
use crate::score::build_track;
use crate::sng::SngAsset;
use crate::snapper::snap_score;
use crate::score::Score;

/// Arrangement type codes that are excluded from conversion (vocals, show lights).
const EXCLUDED_ARRANGEMENT_TYPES: [i64; 2] = [4, 5];

#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub percent: u8,
}

#[derive(Debug, Clone)]
pub struct ConvertResult {
    pub output_path: PathBuf,
    pub track_count: usize,
    pub warnings: Vec<ConvertWarning>,
}

fn report(callback: &mut Option<&mut dyn FnMut(ProgressEvent)>, stage: &'static str, percent: u8) {
    if let Some(cb) = callback.as_deref_mut() {
        cb(ProgressEvent { stage, percent });
    }
}

/// Runs the full `.psarc` → `.gpx` pipeline: opens the archive, parses every
/// manifest, builds a [`Score`] per non-excluded arrangement, snaps rhythm,
/// serializes GPIF XML, and writes the sectorized GPX container.
///
/// Non-fatal per-arrangement issues (bad manifest JSON, a missing SNG asset,
/// a decode failure) are recorded as warnings and skipped; the pipeline is
/// fatal only per spec.md §7's table (`NoArrangements` when nothing survives).
pub fn convert(
    input_path: &Path,
    output_path: &Path,
    mut progress_callback: Option<&mut dyn FnMut(ProgressEvent)>,
) -> Result<ConvertResult, ConvertError> {
    let mut warnings = Vec::new();

    info!(path = %input_path.display(), "opening PSARC archive");
    let mut file = File::open(input_path)?;
    let psarc = PsarcFile::open(&mut file)?;
    report(&mut progress_callback, "Reading PSARC", 10);

    let mut attrs_list: Vec<Attributes2014> = Vec::new();
    for entry in psarc.entries() {
        let Some(path) = entry.path.as_deref() else {
            continue;
        };
        let lowered = path.to_lowercase().replace('\\', "/");
        if !lowered.contains("manifests/") || !lowered.ends_with(".json") {
            continue;
        }
        let bytes = match psarc.inflate_entry_data(entry) {
            Ok(b) => b,
            Err(e) => {
                warnings.push(ConvertWarning::new("manifest", format!("{path}: {e}")));
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        match parse_manifest(&text) {
            Ok(mut parsed) => attrs_list.append(&mut parsed),
            Err(e) => {
                warnings.push(ConvertWarning::new("manifest", format!("{path}: {e}")));
            }
        }
    }

    let mut tracks = Vec::new();
    for attrs in &attrs_list {
        if EXCLUDED_ARRANGEMENT_TYPES.contains(&attrs.arrangement_type) {
            continue;
        }
        let suffixes = sng_asset_suffixes(attrs);
        let Some(entry) = suffixes.iter().find_map(|s| psarc.entry_by_suffix(s)) else {
            warnings.push(ConvertWarning::new(
                "sng",
                format!("no SNG asset matching {}", suffixes.join(" or ")),
            ));
            continue;
        };
        let label = entry.path.as_deref().unwrap_or(suffixes[0].as_str());
        let raw = match psarc.inflate_entry_data(entry) {
            Ok(b) => b,
            Err(e) => {
                warnings.push(ConvertWarning::new("sng", format!("{label}: {e}")));
                continue;
            }
        };
        let asset = match SngAsset::parse(&raw, SngPlatform::Pc) {
            Ok(a) => a,
            Err(e) => {
                warnings.push(ConvertWarning::new("sng", format!("{label}: {e}")));
                continue;
            }
        };
        match build_track(&asset, attrs) {
            Ok(track) => tracks.push(track),
            Err(e) => {
                warnings.push(ConvertWarning::new("score", format!("{label}: {e}")));
            }
        }
    }

    tracks.sort_by(|a, b| {
        (a.path, a.bonus, a.name.clone()).cmp(&(b.path, b.bonus, b.name.clone()))
    });
    report(&mut progress_callback, "Detecting rhythm", 50);

    if tracks.is_empty() {
        return Err(ConvertError::NoArrangements);
    }

    let first = attrs_list.first();
    let mut score = Score {
        title: first.map(|a| a.song_name.clone()).unwrap_or_default(),
        artist: first.map(|a| a.artist_name.clone()).unwrap_or_default(),
        album: first.map(|a| a.album_name.clone()).unwrap_or_default(),
        year: first.map(|a| a.song_year).unwrap_or_default(),
        tracks,
    };
    snap_score(&mut score);

    let doc = build_gpif(&score);
    let xml = write_gpif_xml(&doc)?;
    report(&mut progress_callback, "Exporting GPX", 80);

    let gpx_bytes = write_gpx(&xml)?;
    let mut out = File::create(output_path)?;
    out.write_all(&gpx_bytes)?;

    report(&mut progress_callback, "Done", 100);
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "conversion completed with warnings");
    }

    Ok(ConvertResult {
        output_path: output_path.to_path_buf(),
        track_count: score.tracks.len(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decryptor::decrypt_sng_counter_cfb;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    /// Mirrors `sng::tests::build_minimal_sng`: one BPM, one phrase, zero
    /// everything else down the line, one arrangement with one note.
    fn build_minimal_sng_body() -> Vec<u8> {
        let mut body = Vec::new();

        // bpms: 1 entry
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&0.0f32.to_le_bytes()); // time
        body.extend_from_slice(&0i16.to_le_bytes()); // measure
        body.extend_from_slice(&0i16.to_le_bytes()); // beat
        body.extend_from_slice(&(-1i32).to_le_bytes()); // phrase_iteration
        body.extend_from_slice(&0i32.to_le_bytes()); // mask

        // phrases: 1 entry
        body.extend_from_slice(&1u32.to_le_bytes());
        body.push(0); // solo
        body.push(0); // disparity
        body.push(0); // ignore
        body.push(0); // padding
        body.extend_from_slice(&0i32.to_le_bytes()); // max_difficulty
        body.extend_from_slice(&0i32.to_le_bytes()); // phrase_iteration_links
        body.extend_from_slice(&[0u8; 32]); // name

        body.extend_from_slice(&0u32.to_le_bytes()); // chords: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // chord_notes: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // vocals: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // phrase_iterations: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // phrase_extra_info: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // nld: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // actions: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // events: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // tones: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // dnas: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // sections: 0

        // arrangements: 1 entry, with one note
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&0i32.to_le_bytes()); // difficulty
        body.extend_from_slice(&0u32.to_le_bytes()); // anchors: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // anchor_extensions: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // fingerprints1: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // fingerprints2: 0
        body.extend_from_slice(&1u32.to_le_bytes()); // notes: 1
        body.extend_from_slice(&0u32.to_le_bytes()); // note_mask
        body.extend_from_slice(&0u32.to_le_bytes()); // note_flags
        body.extend_from_slice(&0u32.to_le_bytes()); // hash
        body.extend_from_slice(&0.0f32.to_le_bytes()); // time
        body.push(0); // string_index
        body.push(3); // fret_id
        body.push(0); // anchor_fret_id
        body.push(0); // anchor_width
        body.extend_from_slice(&(-1i32).to_le_bytes()); // chord_id
        body.extend_from_slice(&(-1i32).to_le_bytes()); // chord_notes_id
        body.extend_from_slice(&(-1i32).to_le_bytes()); // phrase_id
        body.extend_from_slice(&(-1i32).to_le_bytes()); // phrase_iteration_id
        body.extend_from_slice(&0i16.to_le_bytes()); // finger_print_id[0]
        body.extend_from_slice(&0i16.to_le_bytes()); // finger_print_id[1]
        body.extend_from_slice(&(-1i16).to_le_bytes()); // next_iter_note
        body.extend_from_slice(&(-1i16).to_le_bytes()); // prev_iter_note
        body.extend_from_slice(&(-1i16).to_le_bytes()); // parent_prev_note
        body.push(0); // slide_to
        body.push(0); // slide_unpitch_to
        body.push(0); // left_hand
        body.push(0); // tap
        body.push(0); // pick_direction
        body.push(0); // slap
        body.push(0); // pluck
        body.extend_from_slice(&0i16.to_le_bytes()); // vibrato
        body.extend_from_slice(&1.0f32.to_le_bytes()); // sustain
        body.extend_from_slice(&0.0f32.to_le_bytes()); // max_bend
        body.extend_from_slice(&0i32.to_le_bytes()); // bend_data count
        body.extend_from_slice(&0i32.to_le_bytes()); // phrase_count
        body.extend_from_slice(&0i32.to_le_bytes()); // phrase_iteration_count1
        body.extend_from_slice(&0i32.to_le_bytes()); // phrase_iteration_count2

        // metadata
        body.extend_from_slice(&0.0f64.to_le_bytes()); // max_score
        body.extend_from_slice(&0.0f64.to_le_bytes()); // max_notes_and_chords
        body.extend_from_slice(&0.0f64.to_le_bytes()); // max_notes_and_chords_real
        body.extend_from_slice(&0.0f64.to_le_bytes()); // points_per_note
        body.extend_from_slice(&0.0f32.to_le_bytes()); // first_beat_length
        body.extend_from_slice(&0.0f32.to_le_bytes()); // start_time
        body.push(0xFF); // capo_fret_id (absent)
        body.extend_from_slice(&[0u8; 32]); // last_conversion_date_time
        body.extend_from_slice(&0i16.to_le_bytes()); // part
        body.extend_from_slice(&2.0f32.to_le_bytes()); // song_length
        body.extend_from_slice(&6i32.to_le_bytes()); // string_count
        for _ in 0..6 {
            body.extend_from_slice(&0i16.to_le_bytes()); // tuning
        }
        body.extend_from_slice(&0.0f32.to_le_bytes()); // unk11
        body.extend_from_slice(&0.0f32.to_le_bytes()); // unk12
        body.extend_from_slice(&0i32.to_le_bytes()); // max_difficulty

        body
    }

    fn wrap_sng_envelope(body: &[u8]) -> Vec<u8> {
        let mut zlib = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut zlib, Compression::default());
            enc.write_all(body).unwrap();
        }
        let mut payload = Vec::new();
        payload.extend_from_slice(&(body.len() as u32).to_le_bytes());
        payload.extend_from_slice(&(zlib.len() as u32).to_le_bytes());
        payload.extend_from_slice(&zlib);

        let iv = [0u8; 16];
        let mut encrypted = payload.clone();
        decrypt_sng_counter_cfb(&mut encrypted, iv, SngPlatform::Pc);

        let mut out = Vec::new();
        out.extend_from_slice(&0x0000_004Au32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&encrypted);
        out
    }

    fn build_test_psarc() -> Vec<u8> {
        let manifest_json = r#"{
            "Entries": {
                "o": {
                    "i": {
                        "SongName": "Test Song",
                        "ArtistName": "Test Artist",
                        "AlbumName": "Test Album",
                        "SongYear": 2020,
                        "SongLength": 2.0,
                        "ArrangementName": "Lead",
                        "ArrangementType": 0,
                        "SongAsset": "urn:application:musicgamesong:testsong_lead"
                    }
                }
            }
        }"#;
        let sng_body = build_minimal_sng_body();
        let sng_bytes = wrap_sng_envelope(&sng_body);

        let entries: Vec<(&str, &[u8])> = vec![
            ("manifests/song/testsong_lead.json", manifest_json.as_bytes()),
            ("audio/testsong_lead.sng", &sng_bytes),
        ];
        build_psarc_archive(&entries)
    }

    fn build_psarc_archive(entries_data: &[(&str, &[u8])]) -> Vec<u8> {
        let block_size: u32 = 65536;
        let names_blob = entries_data
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join("\n");

        let mut blocks: Vec<Vec<u8>> = Vec::new();
        let mut entry_meta = Vec::new();

        let names_bytes = names_blob.as_bytes().to_vec();
        entry_meta.push((blocks.len() as u32, names_bytes.len() as u64));
        blocks.push(names_bytes);

        for (_, data) in entries_data.iter() {
            let z_index = blocks.len() as u32;
            blocks.push(data.to_vec());
            entry_meta.push((z_index, data.len() as u64));
        }

        let mut zip_block_sizes = Vec::new();
        let mut data_section = Vec::new();
        let mut offsets = Vec::new();
        for b in blocks.iter() {
            offsets.push(data_section.len() as u64);
            data_section.extend_from_slice(b);
            zip_block_sizes.push(0u32);
        }

        let num_files = entries_data.len() as u32 + 1;
        let toc_entry_size = 30u32;
        let b_num = 2usize;
        let toc_entries_bytes = num_files as usize * toc_entry_size as usize;
        let toc_size = 32 + toc_entries_bytes + zip_block_sizes.len() * b_num;

        let mut out = Vec::new();
        out.extend_from_slice(b"PSAR");
        out.extend_from_slice(&0x0001_0004u32.to_be_bytes());
        out.extend_from_slice(b"zlib");
        out.extend_from_slice(&(toc_size as u32).to_be_bytes());
        out.extend_from_slice(&toc_entry_size.to_be_bytes());
        out.extend_from_slice(&num_files.to_be_bytes());
        out.extend_from_slice(&block_size.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());

        for (i, (z_index, length)) in entry_meta.iter().enumerate() {
            out.extend_from_slice(&[0u8; 16]);
            out.extend_from_slice(&z_index.to_be_bytes());
            let off = 32 + toc_entries_bytes + zip_block_sizes.len() * b_num + offsets[i] as usize;
            out.push(((length >> 32) & 0xFF) as u8);
            out.push(((length >> 24) & 0xFF) as u8);
            out.push(((length >> 16) & 0xFF) as u8);
            out.push(((length >> 8) & 0xFF) as u8);
            out.push((length & 0xFF) as u8);
            out.push(((off as u64 >> 32) & 0xFF) as u8);
            out.push(((off as u64 >> 24) & 0xFF) as u8);
            out.push(((off as u64 >> 16) & 0xFF) as u8);
            out.push(((off as u64 >> 8) & 0xFF) as u8);
            out.push((off as u64 & 0xFF) as u8);
        }
        for z in &zip_block_sizes {
            out.extend_from_slice(&(*z as u16).to_be_bytes());
        }
        out.extend_from_slice(&data_section);
        out
    }

    #[test]
    fn converts_minimal_archive_end_to_end() {
        let archive_bytes = build_test_psarc();
        let mut input = NamedTempFile::new().unwrap();
        input.write_all(&archive_bytes).unwrap();
        let output = NamedTempFile::new().unwrap();

        let result = convert(input.path(), output.path(), None).unwrap();
        assert_eq!(result.track_count, 1);
        assert!(result.warnings.is_empty());

        let written = std::fs::read(output.path()).unwrap();
        assert_eq!(&written[0..4], b"BCFS");
        let _ = Cursor::new(written);
    }

    #[test]
    fn no_arrangements_is_fatal() {
        let entries: Vec<(&str, &[u8])> = vec![];
        let archive_bytes = build_psarc_archive(&entries);
        let mut input = NamedTempFile::new().unwrap();
        input.write_all(&archive_bytes).unwrap();
        let output = NamedTempFile::new().unwrap();

        let err = convert(input.path(), output.path(), None).unwrap_err();
        assert!(matches!(err, ConvertError::NoArrangements));
    }
}
