use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::GpxError;

const SECTOR_SIZE: usize = 0x1000;
const DATA_SECTOR_PAYLOAD: usize = SECTOR_SIZE - 4;
const GPX_FILENAME: &str = "score.gpif";

/// Writes a GPX sectorized container holding `xml` as its sole compressed
/// entry: sector 0 is the `"BCFS"` header, sector 1 the `"BCFE"` directory,
/// sectors 2+ `"imrf"`-tagged zlib-compressed data blocks.
pub fn write_gpx(xml: &str) -> Result<Vec<u8>, GpxError> {
    let xml_bytes = xml.as_bytes();
    let compressed = {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(xml_bytes)?;
        enc.finish()?
    };

    let data_offset: u32 = (2 * SECTOR_SIZE) as u32;
    let uncompressed_size = xml_bytes.len() as u32;
    let compressed_size = compressed.len() as u32;

    let mut header = vec![0u8; SECTOR_SIZE];
    {
        let mut w = &mut header[..];
        w.write_all(b"BCFS")?;
        w.write_u32::<LittleEndian>(0x0000_0200)?;
        w.write_u32::<LittleEndian>(data_offset)?;
        w.write_u32::<LittleEndian>(uncompressed_size)?;
        w.write_u32::<LittleEndian>(compressed_size)?;
        w.write_u32::<LittleEndian>(0)?; // flags
    }

    let mut directory = vec![0u8; SECTOR_SIZE];
    {
        let mut w = &mut directory[..];
        w.write_all(b"BCFE")?;
        let mut name_buf = [0u8; 128];
        let name_bytes = GPX_FILENAME.as_bytes();
        let n = name_bytes.len().min(127);
        name_buf[..n].copy_from_slice(&name_bytes[..n]);
        w.write_all(&name_buf)?;
        w.write_u32::<LittleEndian>(0)?; // file_index
    }

    let mut data_sectors = Vec::new();
    for chunk in compressed.chunks(DATA_SECTOR_PAYLOAD) {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[..4].copy_from_slice(b"imrf");
        sector[4..4 + chunk.len()].copy_from_slice(chunk);
        data_sectors.push(sector);
    }
    if data_sectors.is_empty() {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[..4].copy_from_slice(b"imrf");
        data_sectors.push(sector);
    }

    let mut out = Vec::with_capacity(SECTOR_SIZE * (2 + data_sectors.len()));
    out.extend_from_slice(&header);
    out.extend_from_slice(&directory);
    for sector in data_sectors {
        out.extend_from_slice(&sector);
    }
    Ok(out)
}
