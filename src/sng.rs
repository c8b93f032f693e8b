use flate2::read::ZlibDecoder;
use std::io::{Cursor, Read};

use crate::decryptor::{decrypt_sng_counter_cfb, SngPlatform};
use crate::error::SngError;
use crate::models::{
    read_vec, Action, Arrangement, BinarySerializable, Bpm, Chord, ChordNotes, Dna, Event,
    Metadata, NLinkedDifficulty, Phrase, PhraseExtraInfoByLevel, PhraseIteration, Section,
    SymbolDefinition, SymbolsHeader, SymbolsTexture, Tone, Vocal,
};

const SNG_MAGIC_LOW_BYTE: u8 = 0x4A;

/// The fully parsed structural contents of one `.sng` asset: the fixed
/// sequence of sections listed in the SNG document layout.
#[derive(Debug, Default)]
pub struct SngAsset {
    pub bpms: Vec<Bpm>,
    pub phrases: Vec<Phrase>,
    pub chords: Vec<Chord>,
    pub chord_notes: Vec<ChordNotes>,
    pub vocals: Vec<Vocal>,
    pub symbol_headers: Vec<SymbolsHeader>,
    pub symbol_textures: Vec<SymbolsTexture>,
    pub symbol_definitions: Vec<SymbolDefinition>,
    pub phrase_iterations: Vec<PhraseIteration>,
    pub phrase_extra_info: Vec<PhraseExtraInfoByLevel>,
    pub nld: Vec<NLinkedDifficulty>,
    pub actions: Vec<Action>,
    pub events: Vec<Event>,
    pub tones: Vec<Tone>,
    pub dnas: Vec<Dna>,
    pub sections: Vec<Section>,
    pub arrangements: Vec<Arrangement>,
    pub metadata: Metadata,
}

impl SngAsset {
    /// Decrypts (if the envelope magic matches), inflates, and structurally
    /// parses a raw `.sng` asset as extracted from the PSARC archive.
    pub fn parse(raw: &[u8], platform: SngPlatform) -> Result<Self, SngError> {
        let plaintext = decrypt_envelope(raw, platform)?;
        let inflated = decompress_payload(&plaintext)?;
        Self::read_sections(&inflated)
    }

    fn read_sections(data: &[u8]) -> Result<Self, SngError> {
        let mut r = Cursor::new(data);
        let bpms = read_vec(&mut r, Bpm::read_from)?;
        let phrases = read_vec(&mut r, Phrase::read_from)?;
        let chords = read_vec(&mut r, Chord::read_from)?;
        let chord_notes = read_vec(&mut r, ChordNotes::read_from)?;
        let vocals = read_vec(&mut r, Vocal::read_from)?;
        let (symbol_headers, symbol_textures, symbol_definitions) = if !vocals.is_empty() {
            (
                read_vec(&mut r, SymbolsHeader::read_from)?,
                read_vec(&mut r, SymbolsTexture::read_from)?,
                read_vec(&mut r, SymbolDefinition::read_from)?,
            )
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };
        let phrase_iterations = read_vec(&mut r, PhraseIteration::read_from)?;
        let phrase_extra_info = read_vec(&mut r, PhraseExtraInfoByLevel::read_from)?;
        let nld = read_vec(&mut r, NLinkedDifficulty::read_from)?;
        let actions = read_vec(&mut r, Action::read_from)?;
        let events = read_vec(&mut r, Event::read_from)?;
        let tones = read_vec(&mut r, Tone::read_from)?;
        let dnas = read_vec(&mut r, Dna::read_from)?;
        let sections = read_vec(&mut r, Section::read_from)?;
        let arrangements = read_vec(&mut r, Arrangement::read_from)?;
        let metadata = Metadata::read_from(&mut r)?;

        Ok(SngAsset {
            bpms,
            phrases,
            chords,
            chord_notes,
            vocals,
            symbol_headers,
            symbol_textures,
            symbol_definitions,
            phrase_iterations,
            phrase_extra_info,
            nld,
            actions,
            events,
            tones,
            dnas,
            sections,
            arrangements,
            metadata,
        })
    }
}

/// Strips and decrypts the 8-byte-header + 16-byte-IV envelope. If the magic
/// byte doesn't match, the buffer is returned unchanged (treated as already
/// plaintext).
fn decrypt_envelope(raw: &[u8], platform: SngPlatform) -> Result<Vec<u8>, SngError> {
    const ENVELOPE_LEN: usize = 24; // u32 magic + u32 platform_flags + u8[16] iv
    if raw.len() < ENVELOPE_LEN {
        return Ok(raw.to_vec());
    }
    let magic = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    if (magic & 0xFF) as u8 != SNG_MAGIC_LOW_BYTE {
        return Ok(raw.to_vec());
    }
    // raw[4..8] is platform_flags, read and discarded per spec open question (a).
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&raw[8..ENVELOPE_LEN]);
    let mut payload = raw[ENVELOPE_LEN..].to_vec();
    decrypt_sng_counter_cfb(&mut payload, iv, platform);
    Ok(payload)
}

/// Reads `uncompressed_size` (advisory, discarded) and `compressed_size`,
/// then zlib-inflates exactly `compressed_size` bytes (clamped to what's
/// available).
fn decompress_payload(plaintext: &[u8]) -> Result<Vec<u8>, SngError> {
    if plaintext.len() < 8 {
        return Err(SngError::UnexpectedEof(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "SNG payload shorter than its size header",
        )));
    }
    let compressed_size = u32::from_le_bytes([plaintext[4], plaintext[5], plaintext[6], plaintext[7]]) as usize;
    let available = plaintext.len() - 8;
    let take = compressed_size.min(available);
    let compressed = &plaintext[8..8 + take];

    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| SngError::Inflate)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_minimal_sng() -> Vec<u8> {
        // One BPM, zero everything else down the line, one arrangement with
        // one note, to match the minimal fixture described in the spec.
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

        // chords: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // chord_notes: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // vocals: 0 (so symbol sections are skipped)
        body.extend_from_slice(&0u32.to_le_bytes());
        // phrase_iterations: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // phrase_extra_info: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // nld: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // actions: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // events: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // tones: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // dnas: 0
        body.extend_from_slice(&0u32.to_le_bytes());
        // sections: 0
        body.extend_from_slice(&0u32.to_le_bytes());

        // arrangements: 1 entry, with one note
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&0i32.to_le_bytes()); // difficulty
        body.extend_from_slice(&0u32.to_le_bytes()); // anchors: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // anchor_extensions: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // fingerprints1: 0
        body.extend_from_slice(&0u32.to_le_bytes()); // fingerprints2: 0
        // notes: 1
        body.extend_from_slice(&1u32.to_le_bytes());
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

    fn wrap_envelope(plaintext_body: &[u8], platform: SngPlatform) -> Vec<u8> {
        let mut zlib = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut zlib, Compression::default());
            enc.write_all(plaintext_body).unwrap();
        }
        let mut payload = Vec::new();
        payload.extend_from_slice(&(plaintext_body.len() as u32).to_le_bytes());
        payload.extend_from_slice(&(zlib.len() as u32).to_le_bytes());
        payload.extend_from_slice(&zlib);

        let iv = [0u8; 16];
        let mut encrypted = payload.clone();
        decrypt_sng_counter_cfb(&mut encrypted, iv, platform);

        let mut out = Vec::new();
        out.extend_from_slice(&0x0000_004Au32.to_le_bytes()); // magic, low byte 0x4A
        out.extend_from_slice(&0u32.to_le_bytes()); // platform_flags
        out.extend_from_slice(&iv);
        out.extend_from_slice(&encrypted);
        out
    }

    #[test]
    fn parses_minimal_fixture() {
        let body = build_minimal_sng();
        let envelope = wrap_envelope(&body, SngPlatform::Pc);
        let asset = SngAsset::parse(&envelope, SngPlatform::Pc).unwrap();

        assert_eq!(asset.bpms.len(), 1);
        assert_eq!(asset.phrases.len(), 1);
        assert_eq!(asset.arrangements.len(), 1);
        assert_eq!(asset.arrangements[0].notes.len(), 1);
        assert_eq!(asset.arrangements[0].notes[0].fret_id, 3);
        assert_eq!(asset.metadata.song_length, 2.0);
    }

    #[test]
    fn unrecognized_magic_is_treated_as_plaintext() {
        let raw = vec![0u8; 24];
        let out = decrypt_envelope(&raw, SngPlatform::Pc).unwrap();
        assert_eq!(out, raw);
    }
}
