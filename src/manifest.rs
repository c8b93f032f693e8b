use serde::Deserialize;
use serde_json::Value;

use crate::error::ManifestError;

/// Per-arrangement attribute record, flattened out of the manifest's
/// `{"Entries": {outerKey: {innerKey: attrs}}}` shape.
#[derive(Debug, Clone, Default)]
pub struct Attributes2014 {
    pub song_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub song_year: i64,
    pub song_length: f64,
    pub arrangement_name: String,
    pub arrangement_type: i64,
    pub tuning: [i64; 6],
    pub capo_fret: i64,
    pub song_asset: String,
    pub song_xml: String,
    pub bonus: bool,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    #[serde(rename = "Entries")]
    entries: std::collections::BTreeMap<String, std::collections::BTreeMap<String, Value>>,
}

/// Parses a manifest JSON document and flattens every leaf attribute object
/// into an [`Attributes2014`]. Unknown fields are ignored; missing
/// string/int fields default to `""`/`0`.
pub fn parse_manifest(json: &str) -> Result<Vec<Attributes2014>, ManifestError> {
    let doc: ManifestDocument = serde_json::from_str(json)?;
    let mut out = Vec::new();
    for inner in doc.entries.values() {
        for attrs in inner.values() {
            out.push(attributes_from_value(attrs));
        }
    }
    Ok(out)
}

fn attributes_from_value(v: &Value) -> Attributes2014 {
    let s = |key: &str| v.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    let i = |key: &str| v.get(key).and_then(Value::as_i64).unwrap_or(0);
    let f = |key: &str| v.get(key).and_then(Value::as_f64).unwrap_or(0.0);

    let tuning = v
        .get("Tuning")
        .and_then(Value::as_object)
        .map(|t| {
            let string = |n: &str| t.get(n).and_then(Value::as_i64).unwrap_or(0);
            [
                string("String0"),
                string("String1"),
                string("String2"),
                string("String3"),
                string("String4"),
                string("String5"),
            ]
        })
        .unwrap_or([0; 6]);

    Attributes2014 {
        song_name: s("SongName"),
        artist_name: s("ArtistName"),
        album_name: s("AlbumName"),
        song_year: i("SongYear"),
        song_length: f("SongLength"),
        arrangement_name: s("ArrangementName"),
        arrangement_type: i("ArrangementType"),
        tuning,
        capo_fret: i("CapoFret"),
        song_asset: s("SongAsset"),
        song_xml: s("SongXml"),
        bonus: i("BonusArr") != 0,
    }
}

/// Locates the candidate `.sng` entry suffixes for an arrangement from its
/// `song_asset` URN, falling back to `song_xml` when `song_asset` is blank.
/// Returns both `/<base>` and `/<base>.sng`, since entries may be named
/// either way.
pub fn sng_asset_suffixes(attrs: &Attributes2014) -> Vec<String> {
    let base = if !attrs.song_asset.is_empty() {
        attrs
            .song_asset
            .rsplit(':')
            .next()
            .unwrap_or(&attrs.song_asset)
            .to_string()
    } else {
        attrs
            .song_xml
            .rsplit(':')
            .next()
            .unwrap_or(&attrs.song_xml)
            .trim_end_matches(".xml")
            .to_string()
    };
    vec![format!("/{}", base), format!("/{}.sng", base)]
}
