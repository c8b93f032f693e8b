use flate2::read::ZlibDecoder;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::decryptor::DecryptStream;
use crate::endian::BigEndianReader;
use crate::error::PsarcError;

bitflags::bitflags! {
    pub struct PsarcArchiveFlags: u32 {
        const NONE          = 0;
        const UNK1          = 1;
        const UNK2          = 2;
        const TOC_ENCRYPTED = 4;
        const UNK8          = 8;
        const UNK16         = 16;
        const UNK32         = 32;
        const UNK64         = 64;
        const UNK128        = 128;
    }
}

const PSARC_MAGIC: u32 = 0x5053_4152; // "PSAR"
const ZLIB_COMPRESSION: u32 = 0x7A6C_6962; // "zlib"

#[derive(Debug)]
pub struct PsarcFileHeader {
    pub version: u32,
    pub compression: u32,
    pub toc_size: u32,
    pub toc_entry_size: u32,
    pub entry_count: u32,
    pub block_size: u32,
    pub archive_flags: PsarcArchiveFlags,
}

impl PsarcFileHeader {
    /// Reads the fixed 32-byte big-endian header.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self, PsarcError> {
        let mut r = BigEndianReader::new(reader);
        r.seek(SeekFrom::Start(0))?;

        let magic = r.read_u32()?;
        if magic != PSARC_MAGIC {
            return Err(PsarcError::BadMagic);
        }
        let version = r.read_u32()?;
        let compression = r.read_u32()?;
        if compression != ZLIB_COMPRESSION {
            return Err(PsarcError::UnsupportedCompression);
        }
        let toc_size = r.read_u32()?;
        let toc_entry_size = r.read_u32()?;
        let entry_count = r.read_u32()?;
        let block_size = r.read_u32()?;
        let raw_flags = r.read_u32()?;
        let archive_flags = PsarcArchiveFlags::from_bits_truncate(raw_flags);

        Ok(PsarcFileHeader {
            version,
            compression,
            toc_size,
            toc_entry_size,
            entry_count,
            block_size,
            archive_flags,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PsarcTocEntry {
    pub index: u32,
    pub md5: [u8; 16],
    pub z_index: u32,
    pub length: u64,
    pub offset: u64,
    pub path: Option<String>,
}

#[derive(Debug)]
pub struct PsarcToc {
    pub entries: Vec<PsarcTocEntry>,
    pub zip_block_sizes: Vec<u32>,
}

impl PsarcToc {
    /// Reads the TOC from a reader positioned right after the 32-byte header.
    /// If the header flags say the TOC is encrypted, decrypts
    /// `header.toc_size - 32` bytes with the AES-256 CFB-8 PSARC key first.
    pub fn read_from<R: Read + Seek>(
        mut reader: R,
        header: &PsarcFileHeader,
    ) -> Result<Self, PsarcError> {
        let encrypted = header.archive_flags.contains(PsarcArchiveFlags::TOC_ENCRYPTED);
        let toc_body_size = header.toc_size as usize - 32;

        let mut toc_reader: Box<dyn ReadSeek> = if encrypted {
            let decrypt_stream = DecryptStream::new_psarc(&mut reader, toc_body_size)?;
            Box::new(decrypt_stream.reader)
        } else {
            let mut buf = vec![0u8; toc_body_size];
            reader.read_exact(&mut buf)?;
            Box::new(Cursor::new(buf))
        };

        let entry_count = header.entry_count;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for i in 0..entry_count {
            let mut r = BigEndianReader::new(&mut *toc_reader);
            let mut md5 = [0u8; 16];
            md5.copy_from_slice(&r.read_bytes(16)?);
            let z_index = r.read_u32()?;
            let length = r.read_u40()?;
            let offset = r.read_u40()?;
            // toc_entry_size may be larger than the 30 bytes above; skip any padding.
            let read_so_far = 16 + 4 + 5 + 5;
            if (header.toc_entry_size as usize) > read_so_far {
                r.skip((header.toc_entry_size as usize - read_so_far) as u64)?;
            }
            entries.push(PsarcTocEntry {
                index: i,
                md5,
                z_index,
                length,
                offset,
                path: None,
            });
        }

        let toc_entries_bytes = (entry_count as usize) * (header.toc_entry_size as usize);
        let remaining = toc_body_size
            .checked_sub(toc_entries_bytes)
            .ok_or_else(|| {
                PsarcError::UnexpectedEof(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "TOC size too small",
                ))
            })?;

        let b_num = block_length_width(header.block_size);
        let z_num = remaining / b_num;
        let mut zip_block_sizes = Vec::with_capacity(z_num);
        let mut r = BigEndianReader::new(&mut *toc_reader);
        for _ in 0..z_num {
            let size = match b_num {
                2 => r.read_u16()? as u32,
                3 => r.read_u24()?,
                4 => r.read_u32()?,
                _ => unreachable!(),
            };
            zip_block_sizes.push(size);
        }

        Ok(PsarcToc {
            entries,
            zip_block_sizes,
        })
    }
}

/// Smallest integer width `b in {2,3,4}` such that `256^b >= block_size`.
fn block_length_width(block_size: u32) -> usize {
    for b in [2usize, 3, 4] {
        if 256u64.pow(b as u32) >= block_size as u64 {
            return b;
        }
    }
    4
}

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

#[derive(Debug)]
pub struct PsarcFile {
    pub header: PsarcFileHeader,
    pub toc: PsarcToc,
    data: Vec<u8>,
}

impl PsarcFile {
    /// Opens a PSARC archive: reads the header, decrypts/parses the TOC,
    /// assigns entry names from the name blob, then buffers the whole file
    /// for lazy block-indexed decompression.
    pub fn open<R: Read + Seek>(reader: &mut R) -> Result<Self, PsarcError> {
        let header = PsarcFileHeader::read_from(reader)?;
        reader.seek(SeekFrom::Start(32))?;
        let toc = PsarcToc::read_from(&mut *reader, &header)?;
        reader.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let mut file = PsarcFile { header, toc, data };
        file.assign_names()?;
        Ok(file)
    }

    /// Entry 0 holds the `\n`-joined name blob; entry `i` (i>=1) gets
    /// `names[i-1]`. Entry 0 is then dropped from the externally visible list.
    fn assign_names(&mut self) -> Result<(), PsarcError> {
        if self.toc.entries.is_empty() {
            return Ok(());
        }
        let names_blob = self.inflate_entry_data(&self.toc.entries[0])?;
        let text = String::from_utf8_lossy(&names_blob);
        let names: Vec<String> = text
            .split('\n')
            .map(|s| s.trim_end_matches('\r').to_string())
            .collect();
        for (i, name) in names.iter().enumerate() {
            if let Some(entry) = self.toc.entries.get_mut(i + 1) {
                entry.path = Some(name.clone());
            }
        }
        self.toc.entries.remove(0);
        Ok(())
    }

    pub fn entries(&self) -> &[PsarcTocEntry] {
        &self.toc.entries
    }

    /// Matches an entry by a case-insensitive, slash-normalized suffix, as
    /// used to locate manifest JSON files and SNG assets.
    pub fn entry_by_suffix(&self, suffix: &str) -> Option<&PsarcTocEntry> {
        let suffix = normalize(suffix);
        self.toc.entries.iter().find(|e| {
            e.path
                .as_ref()
                .map(|p| normalize(p).ends_with(&suffix))
                .unwrap_or(false)
        })
    }

    /// Performs block-by-block decompression of `entry`, returning exactly
    /// `entry.length` bytes (or whatever was available if the block table ran
    /// out first — a truncation, not an error).
    pub fn inflate_entry_data(&self, entry: &PsarcTocEntry) -> Result<Vec<u8>, PsarcError> {
        let block_size = self.header.block_size as u64;
        let mut cursor = Cursor::new(&self.data);
        cursor.seek(SeekFrom::Start(entry.offset))?;

        let mut output = Vec::with_capacity(entry.length as usize);
        let mut block = entry.z_index as usize;

        while (output.len() as u64) < entry.length {
            let Some(&zlen) = self.toc.zip_block_sizes.get(block) else {
                break;
            };
            let remaining = entry.length - output.len() as u64;
            if zlen == 0 {
                let want = block_size.min(remaining) as usize;
                let mut buf = vec![0u8; want];
                let n = cursor.read(&mut buf)?;
                output.extend_from_slice(&buf[..n]);
                if n < want {
                    break;
                }
            } else {
                let mut buf = vec![0u8; zlen as usize];
                cursor.read_exact(&mut buf)?;
                if buf.first() == Some(&0x78) {
                    let mut decoder = ZlibDecoder::new(&buf[..]);
                    let mut decompressed = Vec::new();
                    decoder.read_to_end(&mut decompressed)?;
                    output.extend_from_slice(&decompressed);
                } else {
                    output.extend_from_slice(&buf);
                }
            }
            block += 1;
        }

        output.truncate(entry.length as usize);
        Ok(output)
    }
}

fn normalize(path: &str) -> String {
    path.to_lowercase().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_archive(entries_data: &[(&str, &[u8])]) -> Vec<u8> {
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

        for (i, (_, data)) in entries_data.iter().enumerate() {
            let z_index = blocks.len() as u32;
            if i == 0 {
                blocks.push(data.to_vec());
            } else {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
                enc.write_all(data).unwrap();
                blocks.push(enc.finish().unwrap());
            }
            entry_meta.push((z_index, data.len() as u64));
        }

        let mut zip_block_sizes = Vec::new();
        let mut data_section = Vec::new();
        let mut offsets = Vec::new();
        for (idx, b) in blocks.iter().enumerate() {
            offsets.push(data_section.len() as u64);
            data_section.extend_from_slice(b);
            if idx <= 1 {
                zip_block_sizes.push(0u32);
            } else {
                zip_block_sizes.push(b.len() as u32);
            }
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
    fn round_trips_uncompressed_and_compressed_entries() {
        let payload_a = b"hello world, this is entry A".to_vec();
        let payload_b = b"this is entry B, compressed with zlib best".to_vec();
        let archive = build_archive(&[("a.txt", &payload_a), ("b.txt", &payload_b)]);

        let mut cursor = Cursor::new(archive);
        let file = PsarcFile::open(&mut cursor).unwrap();

        assert_eq!(file.entries().len(), 2);
        assert_eq!(file.entries()[0].path.as_deref(), Some("a.txt"));
        assert_eq!(file.entries()[1].path.as_deref(), Some("b.txt"));

        let decoded_a = file.inflate_entry_data(&file.entries()[0]).unwrap();
        assert_eq!(decoded_a, payload_a);
        let decoded_b = file.inflate_entry_data(&file.entries()[1]).unwrap();
        assert_eq!(decoded_b, payload_b);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        let err = PsarcFile::open(&mut cursor).unwrap_err();
        assert!(matches!(err, PsarcError::BadMagic));
    }

    #[test]
    fn block_length_width_picks_smallest_fit() {
        assert_eq!(block_length_width(65536), 2);
        assert_eq!(block_length_width(1 << 20), 3);
    }
}
