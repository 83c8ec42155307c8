//! Minimal in-memory Zip32 reader for module archives.
//!
//! Supported: EOCD + central directory, stored (method 0) and deflate
//! (method 8) payloads. Zip64, multi-disk archives and encrypted entries are
//! rejected with a `ZipError`; callers turn that into a module warning.

use std::io::Read;
use std::path::Path;

use flate2::read::DeflateDecoder;
use thiserror::Error;

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_MIN_LEN: usize = 22;
const EOCD_SEARCH_MAX: usize = 66 * 1024;
const CDFH_LEN: usize = 46;
const LFH_LEN: usize = 30;

#[derive(Debug, Error)]
pub enum ZipError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed zip: {0}")]
    Malformed(&'static str),
    #[error("unsupported zip feature: {0}")]
    Unsupported(&'static str),
    #[error("entry {name} uses unsupported compression method {method}")]
    UnsupportedMethod { name: String, method: u16 },
    #[error("entry {0} is encrypted")]
    Encrypted(String),
    #[error("failed to inflate {name}: {source}")]
    Inflate {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Central-directory metadata for a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
}

impl ZipEntry {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn is_encrypted(&self) -> bool {
        (self.flags & 0x0001) != 0
    }
}

/// A fully loaded zip archive.
pub struct ZipArchive {
    data: Vec<u8>,
    entries: Vec<ZipEntry>,
}

impl ZipArchive {
    pub fn open(path: &Path) -> Result<Self, ZipError> {
        let data = std::fs::read(path)
            .map_err(|source| ZipError::Io { path: path.display().to_string(), source })?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ZipError> {
        let entries = read_central_directory(&data)?;
        Ok(Self { data, entries })
    }

    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Read and decompress an entry's payload.
    pub fn read(&self, entry: &ZipEntry) -> Result<Vec<u8>, ZipError> {
        if entry.is_encrypted() {
            return Err(ZipError::Encrypted(entry.name.clone()));
        }
        let lfh = entry.local_header_offset as usize;
        let header = self.data.get(lfh..lfh + LFH_LEN).ok_or(ZipError::Malformed("local header out of bounds"))?;
        if le_u32(&header[0..4]) != SIG_LFH {
            return Err(ZipError::Malformed("bad local header signature"));
        }
        let name_len = le_u16(&header[26..28]) as usize;
        let extra_len = le_u16(&header[28..30]) as usize;
        let start = lfh + LFH_LEN + name_len + extra_len;
        let end = start
            .checked_add(entry.compressed_size as usize)
            .ok_or(ZipError::Malformed("payload size overflow"))?;
        let payload = self.data.get(start..end).ok_or(ZipError::Malformed("payload out of bounds"))?;

        match entry.method {
            0 => Ok(payload.to_vec()),
            8 => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(payload)
                    .read_to_end(&mut out)
                    .map_err(|source| ZipError::Inflate { name: entry.name.clone(), source })?;
                Ok(out)
            }
            method => Err(ZipError::UnsupportedMethod { name: entry.name.clone(), method }),
        }
    }
}

fn read_central_directory(data: &[u8]) -> Result<Vec<ZipEntry>, ZipError> {
    if data.len() < EOCD_MIN_LEN {
        return Err(ZipError::Malformed("file too small"));
    }
    let eocd = find_eocd(data).ok_or(ZipError::Malformed("end of central directory not found"))?;
    let rec = &data[eocd..];

    let disk_no = le_u16(&rec[4..6]);
    let cd_disk = le_u16(&rec[6..8]);
    let entries_disk = le_u16(&rec[8..10]);
    let entries_total = le_u16(&rec[10..12]);
    let cd_size = le_u32(&rec[12..16]);
    let cd_off = le_u32(&rec[16..20]);

    if disk_no != 0 || cd_disk != 0 || entries_disk != entries_total {
        return Err(ZipError::Unsupported("multi-disk archive"));
    }
    if entries_total == 0xFFFF || cd_size == 0xFFFF_FFFF || cd_off == 0xFFFF_FFFF {
        return Err(ZipError::Unsupported("zip64"));
    }

    let cd_end = cd_off as usize + cd_size as usize;
    if cd_end > data.len() {
        return Err(ZipError::Malformed("central directory out of bounds"));
    }

    let mut entries = Vec::with_capacity(entries_total as usize);
    let mut pos = cd_off as usize;
    for _ in 0..entries_total {
        let hdr = data.get(pos..pos + CDFH_LEN).ok_or(ZipError::Malformed("truncated central directory"))?;
        if le_u32(&hdr[0..4]) != SIG_CDFH {
            return Err(ZipError::Malformed("bad central directory signature"));
        }
        let flags = le_u16(&hdr[8..10]);
        let method = le_u16(&hdr[10..12]);
        let compressed_size = le_u32(&hdr[20..24]) as u64;
        let uncompressed_size = le_u32(&hdr[24..28]) as u64;
        let name_len = le_u16(&hdr[28..30]) as usize;
        let extra_len = le_u16(&hdr[30..32]) as usize;
        let comment_len = le_u16(&hdr[32..34]) as usize;
        let local_header_offset = le_u32(&hdr[42..46]) as u64;

        let name_start = pos + CDFH_LEN;
        let name_bytes =
            data.get(name_start..name_start + name_len).ok_or(ZipError::Malformed("truncated entry name"))?;
        let name = String::from_utf8_lossy(name_bytes).replace('\\', "/");

        entries.push(ZipEntry {
            name,
            flags,
            method,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        });
        pos = name_start + name_len + extra_len + comment_len;
    }
    Ok(entries)
}

/// Scan backwards for an EOCD record whose comment fits in the file.
fn find_eocd(data: &[u8]) -> Option<usize> {
    let window_start = data.len().saturating_sub(EOCD_SEARCH_MAX);
    let mut cur = data.len() - EOCD_MIN_LEN;
    loop {
        if le_u32(&data[cur..cur + 4]) == SIG_EOCD {
            let comment_len = le_u16(&data[cur + 20..cur + 22]) as usize;
            if cur + EOCD_MIN_LEN + comment_len <= data.len() {
                return Some(cur);
            }
        }
        if cur == window_start {
            return None;
        }
        cur -= 1;
    }
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
