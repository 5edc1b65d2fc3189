//! WAD container codec.
//!
//! A WAD is a 12-byte header (magic, lump count, directory offset) followed
//! somewhere by a directory of 16-byte entries (data offset, size, 8-byte
//! name). Lump data can live anywhere in the file; [`load`] follows the
//! directory wherever it points, [`save`] always writes the canonical layout
//! of header, directory, then data in directory order.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::ops::{Index, IndexMut};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CorruptorError, Result};

pub const HEADER_SIZE: usize = 12;
pub const DIRECTORY_ENTRY_SIZE: usize = 16;
pub const MAX_NAME_LEN: usize = 8;

/// The two recognised archive flavours. Only the magic differs on disk.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum WadKind {
    Iwad,
    #[default]
    Pwad,
}

impl WadKind {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            WadKind::Iwad => b"IWAD",
            WadKind::Pwad => b"PWAD",
        }
    }

    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic {
            b"IWAD" => Some(WadKind::Iwad),
            b"PWAD" => Some(WadKind::Pwad),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lump {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
}

impl Lump {
    pub fn new(name: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Name for diagnostics. Lump names are not guaranteed to be ASCII.
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Ordered lump storage that tolerates repeated names.
///
/// Positional access behaves like a `Vec`. Keyed access (`get`, `set`,
/// `delete`) scans linearly and acts on the first lump with a matching name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LumpList {
    lumps: Vec<Lump>,
}

impl LumpList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }

    pub fn push(&mut self, lump: Lump) {
        self.lumps.push(lump);
    }

    pub fn insert(&mut self, index: usize, lump: Lump) {
        self.lumps.insert(index, lump);
    }

    pub fn remove(&mut self, index: usize) -> Lump {
        self.lumps.remove(index)
    }

    /// Replace the lump at `index` wholesale.
    pub fn replace(&mut self, index: usize, lump: Lump) -> Lump {
        std::mem::replace(&mut self.lumps[index], lump)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Lump> {
        self.lumps.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Lump> {
        self.lumps.iter_mut()
    }

    pub fn position(&self, name: &[u8]) -> Option<usize> {
        self.lumps.iter().position(|lump| lump.name == name)
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.position(name).is_some()
    }

    /// Data of the first lump called `name`.
    pub fn get(&self, name: &[u8]) -> Result<&[u8]> {
        self.position(name)
            .map(|i| self.lumps[i].data.as_slice())
            .ok_or_else(|| lump_not_found(name))
    }

    /// Replace the data of the first lump called `name`, or append a new lump
    /// if there is none. Later lumps with the same name are left alone.
    pub fn set(&mut self, name: &[u8], data: Vec<u8>) {
        match self.position(name) {
            Some(i) => self.lumps[i].data = data,
            None => self.lumps.push(Lump::new(name, data)),
        }
    }

    /// Remove the first lump called `name`.
    pub fn delete(&mut self, name: &[u8]) -> Result<Lump> {
        let i = self.position(name).ok_or_else(|| lump_not_found(name))?;
        Ok(self.lumps.remove(i))
    }
}

fn lump_not_found(name: &[u8]) -> CorruptorError {
    CorruptorError::LumpNotFound {
        name: String::from_utf8_lossy(name).into_owned(),
    }
}

impl Index<usize> for LumpList {
    type Output = Lump;

    fn index(&self, index: usize) -> &Lump {
        &self.lumps[index]
    }
}

impl IndexMut<usize> for LumpList {
    fn index_mut(&mut self, index: usize) -> &mut Lump {
        &mut self.lumps[index]
    }
}

impl FromIterator<Lump> for LumpList {
    fn from_iter<I: IntoIterator<Item = Lump>>(iter: I) -> Self {
        Self {
            lumps: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for LumpList {
    type Item = Lump;
    type IntoIter = std::vec::IntoIter<Lump>;

    fn into_iter(self) -> Self::IntoIter {
        self.lumps.into_iter()
    }
}

impl<'a> IntoIterator for &'a LumpList {
    type Item = &'a Lump;
    type IntoIter = std::slice::Iter<'a, Lump>;

    fn into_iter(self) -> Self::IntoIter {
        self.lumps.iter()
    }
}

/// Read and parse the archive at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<LumpList> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CorruptorError::NotFound {
            path: path.to_path_buf(),
        },
        _ => CorruptorError::Io(e),
    })?;
    parse_wad(&raw, &path.display().to_string())
}

/// Bytes `start..start + len` of `raw`, or `None` if that runs past the end.
fn read_bytes(raw: &[u8], start: usize, len: usize) -> Option<&[u8]> {
    let end = start.checked_add(len)?;
    raw.get(start..end)
}

fn read_u32(raw: &[u8], start: usize) -> Option<u32> {
    read_bytes(raw, start, 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Parse an in-memory archive. `filename` only feeds error messages.
pub fn parse_wad(raw: &[u8], filename: &str) -> Result<LumpList> {
    let error = |reason: String| CorruptorError::Format {
        filename: filename.to_string(),
        reason,
    };

    let magic = raw.get(..4).unwrap_or(raw);
    if WadKind::from_magic(magic).is_none() {
        return Err(error(format!(
            "invalid magic number {:?}",
            String::from_utf8_lossy(magic)
        )));
    }

    let lump_count =
        read_u32(raw, 4).ok_or_else(|| error("EOF while reading lump count".to_string()))?;
    let dir_offset = read_u32(raw, 8)
        .ok_or_else(|| error("EOF while reading directory location".to_string()))?
        as usize;

    // Directory first, then data: offsets may be unordered or overlap.
    let mut table = Vec::new();
    let mut offset = dir_offset;
    for i in 0..lump_count as usize {
        let data_offset = read_u32(raw, offset)
            .ok_or_else(|| error(format!("EOF while reading location of lump {i}")))?;
        let size = read_u32(raw, offset.saturating_add(4))
            .ok_or_else(|| error(format!("EOF while reading size of lump {i}")))?;
        let name_bytes = read_bytes(raw, offset.saturating_add(8), MAX_NAME_LEN)
            .ok_or_else(|| error(format!("EOF while reading name of lump {i}")))?;
        offset = offset.saturating_add(DIRECTORY_ENTRY_SIZE);

        let nul_pos = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_bytes.len());
        table.push((data_offset as usize, size as usize, name_bytes[..nul_pos].to_vec()));
    }

    let mut lumps = LumpList::new();
    for (data_offset, size, name) in table {
        let data = if size == 0 {
            &[][..]
        } else {
            read_bytes(raw, data_offset, size).ok_or_else(|| {
                error(format!(
                    "EOF while reading lump {:?}",
                    String::from_utf8_lossy(&name)
                ))
            })?
        };
        lumps.push(Lump::new(name, data));
    }

    debug!(filename, lumps = lumps.len(), "parsed WAD directory");
    Ok(lumps)
}

/// Offsets, sizes and counts are 32-bit on disk.
fn wad_u32(value: usize, what: impl FnOnce() -> String) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        CorruptorError::ArchiveWrite(format!("{} exceeds the 4 GiB limit of the WAD format", what()))
    })
}

/// Serialise `lumps` in canonical layout: header, directory, then data in
/// directory order.
pub fn build_wad(lumps: &LumpList, kind: WadKind) -> Result<Vec<u8>> {
    let dir_offset = HEADER_SIZE;
    let data_start = dir_offset + DIRECTORY_ENTRY_SIZE * lumps.len();

    let mut locations = Vec::with_capacity(lumps.len());
    let mut cursor = data_start;
    for lump in lumps {
        if lump.name.is_empty() || lump.name.len() > MAX_NAME_LEN {
            return Err(CorruptorError::InvalidLumpName {
                name: lump.name_str(),
            });
        }
        let location = wad_u32(cursor, || format!("offset of lump {:?}", lump.name_str()))?;
        let size = wad_u32(lump.data.len(), || format!("size of lump {:?}", lump.name_str()))?;
        locations.push((location, size));
        cursor += lump.data.len();
    }

    let count = wad_u32(lumps.len(), || "lump count".to_string())?;

    let mut out = Vec::with_capacity(cursor);
    out.extend_from_slice(kind.magic());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&(dir_offset as u32).to_le_bytes());

    for (lump, (location, size)) in lumps.iter().zip(&locations) {
        out.extend_from_slice(&location.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        let mut name = [0u8; MAX_NAME_LEN];
        name[..lump.name.len()].copy_from_slice(&lump.name);
        out.extend_from_slice(&name);
    }

    for lump in lumps {
        out.extend_from_slice(&lump.data);
    }

    Ok(out)
}

/// Run `write` against `<path>.tmp`, then rename it over `path`. The
/// temporary file is removed if any step fails.
fn write_replacing(
    path: &Path,
    write: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Write `lumps` to `path`. The whole image is built and validated before
/// anything touches the filesystem.
pub fn save(path: impl AsRef<Path>, lumps: &LumpList, kind: WadKind) -> Result<()> {
    let path = path.as_ref();
    let bytes = build_wad(lumps, kind)?;
    write_replacing(path, |file| file.write_all(&bytes))?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote WAD");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> LumpList {
        vec![
            Lump::new("MAP01", Vec::new()),
            Lump::new("THINGS", vec![1, 2, 3]),
            Lump::new("LINEDEFS", vec![4; 14]),
            Lump::new("SECTORS", vec![5; 26]),
        ]
        .into_iter()
        .collect()
    }

    /// Hand-built archive whose data precedes the directory and is stored in
    /// reverse order.
    fn scrambled_archive() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"IWAD");
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&17u32.to_le_bytes());
        raw.extend_from_slice(b"BB"); // 12..14, lump 1
        raw.extend_from_slice(b"AAA"); // 14..17, lump 0
        raw.extend_from_slice(&14u32.to_le_bytes());
        raw.extend_from_slice(&3u32.to_le_bytes());
        raw.extend_from_slice(b"FIRST\0\0\0");
        raw.extend_from_slice(&12u32.to_le_bytes());
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(b"SECONDXY");
        raw
    }

    #[test]
    fn canonical_roundtrip_is_byte_exact() {
        let raw = build_wad(&sample(), WadKind::Pwad).unwrap();
        let parsed = parse_wad(&raw, "test.wad").unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(build_wad(&parsed, WadKind::Pwad).unwrap(), raw);
    }

    #[test]
    fn canonical_layout() {
        let raw = build_wad(&sample(), WadKind::Pwad).unwrap();
        assert_eq!(&raw[..4], b"PWAD");
        assert_eq!(read_u32(&raw, 4), Some(4));
        assert_eq!(read_u32(&raw, 8), Some(12));
        // First lump's data starts right after the four directory entries.
        assert_eq!(read_u32(&raw, 12), Some(12 + 4 * 16));
        assert_eq!(&raw[20..28], b"MAP01\0\0\0");
        assert_eq!(&raw[52..60], b"LINEDEFS");
        assert_eq!(raw.len(), 12 + 4 * 16 + 3 + 14 + 26);
    }

    #[test]
    fn follows_non_canonical_offsets() {
        let lumps = parse_wad(&scrambled_archive(), "odd.wad").unwrap();
        assert_eq!(lumps.len(), 2);
        assert_eq!(lumps[0], Lump::new("FIRST", b"AAA".to_vec()));
        // Full-width name with no terminator is kept as is.
        assert_eq!(lumps[1], Lump::new("SECONDXY", b"BB".to_vec()));

        let rebuilt = parse_wad(&build_wad(&lumps, WadKind::Iwad).unwrap(), "x").unwrap();
        assert_eq!(rebuilt, lumps);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut raw = build_wad(&sample(), WadKind::Pwad).unwrap();
        raw[..4].copy_from_slice(b"ZWAD");
        let err = parse_wad(&raw, "bad.wad").unwrap_err();
        assert!(matches!(err, CorruptorError::Format { .. }));
        assert!(err.to_string().contains("bad.wad is not a WAD file"));

        assert!(matches!(
            parse_wad(b"PW", "short.wad"),
            Err(CorruptorError::Format { .. })
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let err = parse_wad(b"PWAD\x01\0\0\0\x0c\0", "t.wad").unwrap_err();
        assert!(err.to_string().contains("directory location"));
    }

    #[test]
    fn rejects_truncated_directory() {
        let raw = build_wad(&sample(), WadKind::Pwad).unwrap();
        // Cut inside the name of the third directory entry.
        let err = parse_wad(&raw[..12 + 2 * 16 + 10], "t.wad").unwrap_err();
        assert!(matches!(err, CorruptorError::Format { .. }));
        assert!(err.to_string().contains("name of lump 2"), "{err}");
    }

    #[test]
    fn rejects_truncated_lump_data() {
        let raw = build_wad(&sample(), WadKind::Pwad).unwrap();
        let err = parse_wad(&raw[..raw.len() - 1], "t.wad").unwrap_err();
        assert!(err.to_string().contains("SECTORS"), "{err}");
    }

    #[test]
    fn empty_lump_may_point_anywhere() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"PWAD");
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&12u32.to_le_bytes());
        raw.extend_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(b"MAP01\0\0\0");
        let lumps = parse_wad(&raw, "e.wad").unwrap();
        assert_eq!(lumps[0], Lump::new("MAP01", Vec::new()));
    }

    #[test]
    fn keyed_set_replaces_first_match_only() {
        let mut lumps: LumpList = vec![
            Lump::new("A", vec![1]),
            Lump::new("B", vec![2]),
            Lump::new("A", vec![3]),
        ]
        .into_iter()
        .collect();

        lumps.set(b"A", vec![9]);
        assert_eq!(lumps[0].data, vec![9]);
        assert_eq!(lumps[2].data, vec![3]);
        assert_eq!(lumps.len(), 3);

        lumps.set(b"C", vec![7]);
        assert_eq!(lumps.len(), 4);
        assert_eq!(lumps[3], Lump::new("C", vec![7]));
    }

    #[test]
    fn keyed_get_and_delete() {
        let mut lumps = sample();
        assert_eq!(lumps.get(b"THINGS").unwrap(), &[1, 2, 3]);
        assert!(matches!(
            lumps.get(b"NODES"),
            Err(CorruptorError::LumpNotFound { .. })
        ));

        let removed = lumps.delete(b"THINGS").unwrap();
        assert_eq!(removed.data, vec![1, 2, 3]);
        assert!(!lumps.contains(b"THINGS"));
        assert!(matches!(
            lumps.delete(b"THINGS"),
            Err(CorruptorError::LumpNotFound { .. })
        ));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load(dir.path().join("nope.wad")).unwrap_err();
        assert!(matches!(err, CorruptorError::NotFound { .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wad");
        save(&path, &sample(), WadKind::Pwad).unwrap();
        assert_eq!(load(&path).unwrap(), sample());
        assert!(!dir.path().join("out.wad.tmp").exists());
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wad");
        let err = write_replacing(&path, |file| {
            file.write_all(b"PWAD")?;
            Err(io::Error::new(ErrorKind::Other, "disk full"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
        assert!(!dir.path().join("out.wad.tmp").exists());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_values_are_write_errors() {
        let err = wad_u32(u32::MAX as usize + 1, || "size of lump \"BIG\"".to_string())
            .unwrap_err();
        assert!(matches!(err, CorruptorError::ArchiveWrite(_)));
        assert!(err.to_string().contains("BIG"), "{err}");
        assert_eq!(wad_u32(u32::MAX as usize, String::new).unwrap(), u32::MAX);
    }

    #[test]
    fn save_rejects_bad_names_without_writing() {
        let dir = tempdir().unwrap();
        for name in [&b""[..], &b"TOOLONGNAME"[..]] {
            let path = dir.path().join("bad.wad");
            let mut lumps = sample();
            lumps.push(Lump::new(name, vec![0]));
            let err = save(&path, &lumps, WadKind::Pwad).unwrap_err();
            assert!(matches!(err, CorruptorError::InvalidLumpName { .. }));
            assert!(!path.exists());
        }
    }
}
