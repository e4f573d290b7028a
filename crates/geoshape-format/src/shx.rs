use geoshape_core::error::{Error, FormatError};
use geoshape_core::{OpenMode, QueryFilter};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::bytes::{put_i32_be, read_i32_be};
use crate::fileio::{check_id, ensure_writable, not_open, open_file, read_at, write_at};
use crate::header::{ShpHeader, HEADER_SIZE};

const SLOT_SIZE: u64 = 8;
const SLOTS_PER_READ: u32 = 1024;

/// One `.shx` slot, resolved to byte units for the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShxRecord {
    pub id: u32,
    pub offset: u64,
    // words; zero marks a removed record
    pub length: u32,
}

impl ShxRecord {
    pub fn is_deleted(&self) -> bool {
        self.length == 0
    }

    pub fn content_len(&self) -> u64 {
        u64::from(self.length) * 2
    }

    pub fn end(&self) -> u64 {
        self.offset + 8 + self.content_len()
    }

    fn encode(&self) -> Result<[u8; SLOT_SIZE as usize], FormatError> {
        let offset_words = i32::try_from(self.offset / 2).map_err(|_| FormatError::InvalidRange {
            field: "ShxRecord.offset",
        })?;
        let length = i32::try_from(self.length).map_err(|_| FormatError::InvalidRange {
            field: "ShxRecord.length",
        })?;
        let mut buf = [0u8; SLOT_SIZE as usize];
        put_i32_be(&mut buf, 0, offset_words);
        put_i32_be(&mut buf, 4, length);
        Ok(buf)
    }

    fn parse(id: u32, bytes: &[u8], at: u64) -> Result<Self, FormatError> {
        let offset_words = read_i32_be(bytes, at)?;
        let length = read_i32_be(bytes, at + 4)?;
        let offset_words = u64::try_from(offset_words).map_err(|_| FormatError::InvalidValue {
            field: "ShxRecord.offset",
            reason: "must be non-negative",
        })?;
        let length = u32::try_from(length).map_err(|_| FormatError::InvalidValue {
            field: "ShxRecord.length",
            reason: "must be non-negative",
        })?;
        Ok(Self {
            id,
            offset: offset_words * 2,
            length,
        })
    }
}

#[derive(Debug)]
struct OpenShx {
    file: File,
    header: ShpHeader,
}

/// The `.shx` index: a 100-byte header followed by one 8-byte slot per record.
#[derive(Debug)]
pub struct ShxFile {
    path: PathBuf,
    mode: OpenMode,
    inner: Option<OpenShx>,
}

impl ShxFile {
    pub fn new(path: impl AsRef<Path>, mode: OpenMode) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode,
            inner: None,
        }
    }

    pub fn open_path(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let mut shx = Self::new(path, mode);
        shx.open()?;
        Ok(shx)
    }

    pub fn open(&mut self) -> Result<(), Error> {
        if self.inner.is_some() {
            return Ok(());
        }
        let file = open_file(&self.path, self.mode)?;
        let header = ShpHeader::read_from(&file)?;
        tracing::debug!(path = %self.path.display(), file_length = header.file_length, "opened shx");
        self.inner = Some(OpenShx { file, header });
        Ok(())
    }

    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed shx");
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn opened(&self) -> Result<&OpenShx, Error> {
        self.inner.as_ref().ok_or_else(|| not_open(&self.path))
    }

    fn opened_mut(&mut self) -> Result<&mut OpenShx, Error> {
        ensure_writable(&self.path, self.mode)?;
        match self.inner.as_mut() {
            Some(inner) => Ok(inner),
            None => Err(not_open(&self.path)),
        }
    }

    pub fn header(&self) -> Result<&ShpHeader, Error> {
        Ok(&self.opened()?.header)
    }

    pub fn count(&self) -> Result<u32, Error> {
        let header = &self.opened()?.header;
        slot_count(header)
    }

    pub fn get(&self, id: u32) -> Result<ShxRecord, Error> {
        let inner = self.opened()?;
        check_id(id, slot_count(&inner.header)?)?;
        let mut buf = [0u8; SLOT_SIZE as usize];
        read_at(&inner.file, slot_offset(id), &mut buf)?;
        Ok(ShxRecord::parse(id, &buf, 0)?)
    }

    /// Slots in the filter's `from`/`limit` range. `filter.envelope` is
    /// ignored; see `ShpFile::index_records`.
    pub fn records(&self, filter: &QueryFilter) -> Result<Vec<ShxRecord>, Error> {
        let inner = self.opened()?;
        let range = filter.range(u64::from(slot_count(&inner.header)?));
        let first = to_id(range.start)?;
        let n = to_id(range.end - range.start)?;
        read_slots(&inner.file, first, n)
    }

    pub fn iter(&self) -> Result<ShxIter<'_>, Error> {
        self.iter_from(1)
    }

    pub fn iter_from(&self, first_id: u32) -> Result<ShxIter<'_>, Error> {
        let inner = self.opened()?;
        let first_id = first_id.max(1);
        Ok(ShxIter {
            file: &inner.file,
            count: slot_count(&inner.header)?,
            next_id: first_id,
            buffer: Vec::new(),
            buffer_first: first_id,
        })
    }

    pub fn remove(&mut self, id: u32) -> Result<(), Error> {
        let count = self.count()?;
        let inner = self.opened_mut()?;
        check_id(id, count)?;
        write_at(&inner.file, slot_offset(id) + 4, &0i32.to_be_bytes())?;
        tracing::debug!(id, "removed shx slot");
        Ok(())
    }

    pub fn update(&mut self, record: ShxRecord) -> Result<(), Error> {
        let count = self.count()?;
        let inner = self.opened_mut()?;
        check_id(record.id, count)?;
        write_at(&inner.file, slot_offset(record.id), &record.encode()?)?;
        tracing::debug!(id = record.id, offset = record.offset, length = record.length, "updated shx slot");
        Ok(())
    }

    pub fn push(&mut self, offset: u64, length: u32) -> Result<ShxRecord, Error> {
        let count = self.count()?;
        let inner = self.opened_mut()?;
        let id = count.checked_add(1).ok_or(FormatError::InvalidRange {
            field: "ShxHeader.record_count",
        })?;
        let record = ShxRecord { id, offset, length };
        write_at(&inner.file, slot_offset(id), &record.encode()?)?;
        inner.header.file_length += SLOT_SIZE;
        inner.header.write_to(&inner.file)?;
        Ok(record)
    }

    /// Mirrors the geometry header's shape type and envelope into this index.
    /// The index keeps its own file length.
    pub fn sync_header(&mut self, header: &ShpHeader) -> Result<(), Error> {
        let inner = self.opened_mut()?;
        inner.header.shape_type = header.shape_type;
        inner.header.envelope = header.envelope;
        inner.header.write_to(&inner.file)
    }
}

pub struct ShxIter<'a> {
    file: &'a File,
    count: u32,
    next_id: u32,
    buffer: Vec<u8>,
    buffer_first: u32,
}

impl Iterator for ShxIter<'_> {
    type Item = Result<ShxRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_id == 0 || self.next_id > self.count {
            return None;
        }
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(0);

        // ids only grow, so the buffer never starts past `id`
        let mut at = u64::from(id - self.buffer_first) * SLOT_SIZE;
        if at + SLOT_SIZE > self.buffer.len() as u64 {
            let n = SLOTS_PER_READ.min(self.count - id + 1);
            let mut buf = vec![0u8; (u64::from(n) * SLOT_SIZE) as usize];
            if let Err(e) = read_at(self.file, slot_offset(id), &mut buf) {
                self.next_id = 0;
                return Some(Err(e.into()));
            }
            self.buffer = buf;
            self.buffer_first = id;
            at = 0;
        }
        Some(ShxRecord::parse(id, &self.buffer, at).map_err(Error::from))
    }
}

fn slot_count(header: &ShpHeader) -> Result<u32, Error> {
    let slots = header.file_length.saturating_sub(HEADER_SIZE) / SLOT_SIZE;
    Ok(u32::try_from(slots).map_err(|_| FormatError::InvalidRange {
        field: "ShxHeader.file_length",
    })?)
}

fn slot_offset(id: u32) -> u64 {
    HEADER_SIZE + u64::from(id - 1) * SLOT_SIZE
}

fn to_id(v: u64) -> Result<u32, Error> {
    Ok(u32::try_from(v).map_err(|_| FormatError::InvalidRange { field: "record id" })?)
}

fn read_slots(file: &File, first: u32, n: u32) -> Result<Vec<ShxRecord>, Error> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; (u64::from(n) * SLOT_SIZE) as usize];
    read_at(file, slot_offset(first + 1), &mut buf)?;
    (0..n)
        .map(|i| ShxRecord::parse(first + i + 1, &buf, u64::from(i) * SLOT_SIZE).map_err(Error::from))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geoshape_core::error::{AccessError, PermissionError};
    use geoshape_core::ShapeType;

    pub(crate) fn write_index(path: &Path, lengths: &[u32]) -> Vec<ShxRecord> {
        let mut header = ShpHeader::new(ShapeType::Polygon);
        header.file_length = HEADER_SIZE + lengths.len() as u64 * SLOT_SIZE;
        let mut bytes = header.encode().unwrap().to_vec();
        let mut records = Vec::new();
        let mut offset = HEADER_SIZE;
        for (i, len) in lengths.iter().enumerate() {
            let rec = ShxRecord {
                id: i as u32 + 1,
                offset,
                length: *len,
            };
            bytes.extend_from_slice(&rec.encode().unwrap());
            offset = rec.end();
            records.push(rec);
        }
        std::fs::write(path, bytes).unwrap();
        records
    }

    #[test]
    fn count_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.shx");
        let lengths: Vec<u32> = (1..=51).map(|i| 100 + i * 2).collect();
        write_index(&path, &lengths);

        let shx = ShxFile::open_path(&path, OpenMode::Read).unwrap();
        assert_eq!(shx.count().unwrap(), 51);

        let mut prev = shx.get(1).unwrap();
        assert_eq!(prev.offset, HEADER_SIZE);
        for i in 2..=51 {
            let cur = shx.get(i).unwrap();
            assert_eq!(cur.offset, prev.offset + u64::from(prev.length) * 2 + 8);
            prev = cur;
        }

        assert!(matches!(
            shx.get(0).unwrap_err(),
            Error::Access(AccessError::IndexOutOfRange { id: 0, count: 51 })
        ));
        assert!(shx.get(52).is_err());
    }

    #[test]
    fn not_open_errors() {
        let shx = ShxFile::new("missing.shx", OpenMode::Read);
        assert!(matches!(
            shx.count().unwrap_err(),
            Error::Access(AccessError::NotOpen { .. })
        ));
        assert!(shx.get(1).is_err());
    }

    #[test]
    fn open_and_close_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.shx");
        write_index(&path, &[10]);

        let mut shx = ShxFile::new(&path, OpenMode::Read);
        assert!(!shx.is_open());
        shx.open().unwrap();
        shx.open().unwrap();
        assert!(shx.is_open());
        shx.close();
        shx.close();
        assert!(!shx.is_open());
    }

    #[test]
    fn remove_zeroes_length_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.shx");
        let written = write_index(&path, &[10, 20, 30]);

        let mut shx = ShxFile::open_path(&path, OpenMode::ReadWrite).unwrap();
        shx.remove(2).unwrap();
        let rec = shx.get(2).unwrap();
        assert_eq!(rec.length, 0);
        assert!(rec.is_deleted());
        assert_eq!(rec.offset, written[1].offset);
    }

    #[test]
    fn update_overwrites_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.shx");
        write_index(&path, &[10, 20, 30]);

        let mut shx = ShxFile::open_path(&path, OpenMode::ReadWrite).unwrap();
        shx.update(ShxRecord {
            id: 3,
            offset: 356,
            length: 488,
        })
        .unwrap();
        let rec = shx.get(3).unwrap();
        assert_eq!(rec.offset, 356);
        assert_eq!(rec.length, 488);
        assert!(shx
            .update(ShxRecord {
                id: 4,
                offset: 0,
                length: 0
            })
            .is_err());
    }

    #[test]
    fn push_appends_and_persists_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.shx");
        let written = write_index(&path, &[10]);

        let mut shx = ShxFile::open_path(&path, OpenMode::ReadWrite).unwrap();
        let rec = shx.push(written[0].end(), 14).unwrap();
        assert_eq!(rec.id, 2);
        assert_eq!(shx.count().unwrap(), 2);
        shx.close();

        let shx = ShxFile::open_path(&path, OpenMode::Read).unwrap();
        assert_eq!(shx.count().unwrap(), 2);
        assert_eq!(shx.get(2).unwrap(), rec);
    }

    #[test]
    fn read_only_rejects_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.shx");
        write_index(&path, &[10]);

        let mut shx = ShxFile::open_path(&path, OpenMode::Read).unwrap();
        assert!(matches!(
            shx.remove(1).unwrap_err(),
            Error::Permission(PermissionError::ReadOnly { .. })
        ));
    }

    #[test]
    fn records_respect_from_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.shx");
        let lengths: Vec<u32> = vec![8; 51];
        write_index(&path, &lengths);

        let shx = ShxFile::open_path(&path, OpenMode::Read).unwrap();
        let all = shx.records(&QueryFilter::new()).unwrap();
        assert_eq!(all.len(), 51);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[50].id, 51);

        let some = shx
            .records(&QueryFilter::new().with_from(19).with_limit(10))
            .unwrap();
        assert_eq!(some.len(), 10);
        assert_eq!(some[0].id, 20);
        assert_eq!(some[9].id, 29);
        assert_ne!(some[9].length, 0);
    }

    #[test]
    fn iterator_yields_all_slots_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.shx");
        let lengths: Vec<u32> = vec![8; 2500];
        write_index(&path, &lengths);

        let mut shx = ShxFile::open_path(&path, OpenMode::ReadWrite).unwrap();
        shx.remove(7).unwrap();

        let records: Vec<_> = shx.iter().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2500);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.id as usize, i + 1);
        }
        assert!(records[6].is_deleted());
        assert_eq!(records.iter().filter(|r| !r.is_deleted()).count(), 2499);
    }
}
