use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PsarcError {
    #[error("not a PSARC archive (bad magic)")]
    BadMagic,
    #[error("unsupported PSARC compression tag")]
    UnsupportedCompression,
    #[error("truncated or malformed PSARC archive: {0}")]
    UnexpectedEof(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SngError {
    #[error("truncated or malformed SNG asset: {0}")]
    UnexpectedEof(#[from] io::Error),
    #[error("SNG zlib payload failed to inflate")]
    Inflate,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("arrangement decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("I/O error writing GPX container: {0}")]
    Io(#[from] io::Error),
    #[error("XML serialization error: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Psarc(#[from] PsarcError),
    #[error(transparent)]
    Sng(#[from] SngError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Gpx(#[from] GpxError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("No manifest data found")]
    NoArrangements,
    #[error("conversion cancelled")]
    Cancelled,
}

/// A non-fatal issue recorded in [`crate::ConvertResult`] while the pipeline
/// continues with the remaining arrangements.
#[derive(Debug, Clone)]
pub struct ConvertWarning {
    pub stage: &'static str,
    pub message: String,
}

impl ConvertWarning {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        ConvertWarning {
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConvertWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
