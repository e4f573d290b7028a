//! The `.dbf` attribute table.

mod header;
mod value;

pub use header::{DbfField, DbfHeader, FieldType, DBF_HEADER_SIZE, DESCRIPTOR_SIZE, TERMINATOR};

use chrono::Local;
use geoshape_core::error::{AccessError, Error, FormatError};
use geoshape_core::{Attributes, OpenMode, QueryFilter};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::bytes::slice_range;
use crate::fileio::{check_id, eof_as_truncated, ensure_writable, not_open, open_file, read_at, write_at};
use crate::iter::DbfIterator;

const DELETED: u8 = b'*';
const ACTIVE: u8 = b' ';

/// One attribute row. Deleted rows are still readable.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfRecord {
    /// 1-based row id.
    pub id: u32,
    pub deleted: bool,
    pub values: Attributes,
}

impl DbfRecord {
    pub fn new(id: u32, values: Attributes) -> Self {
        Self {
            id,
            deleted: false,
            values,
        }
    }
}

#[derive(Debug)]
struct OpenDbf {
    file: File,
    header: DbfHeader,
}

#[derive(Debug)]
pub struct DbfFile {
    path: PathBuf,
    mode: OpenMode,
    inner: Option<OpenDbf>,
    /// Rows pushed but not yet flushed.
    staged: Vec<Attributes>,
}

impl DbfFile {
    pub fn new(path: impl AsRef<Path>, mode: OpenMode) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode,
            inner: None,
            staged: Vec::new(),
        }
    }

    pub fn open_path(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let mut dbf = Self::new(path, mode);
        dbf.open()?;
        Ok(dbf)
    }

    /// Writes a header-only table with `fields`. The returned store is not
    /// opened yet.
    pub fn create_empty(path: impl AsRef<Path>, fields: &[DbfField]) -> Result<Self, Error> {
        let path = path.as_ref();
        let header = DbfHeader::for_fields(fields)?;
        std::fs::write(path, header.encode())?;
        tracing::debug!(path = %path.display(), fields = fields.len(), "created empty dbf");
        Ok(Self::new(path, OpenMode::ReadWrite))
    }

    pub fn open(&mut self) -> Result<(), Error> {
        if self.inner.is_some() {
            return Ok(());
        }
        let file = open_file(&self.path, self.mode)?;
        let header = DbfHeader::read_from(&file)?;
        tracing::debug!(
            path = %self.path.display(),
            records = header.record_count(),
            fields = header.fields().len(),
            "opened dbf"
        );
        self.inner = Some(OpenDbf { file, header });
        Ok(())
    }

    /// Closes the table. Rows staged since the last [`DbfFile::flush`] are
    /// discarded.
    pub fn close(&mut self) {
        if !self.staged.is_empty() {
            tracing::warn!(
                path = %self.path.display(),
                rows = self.staged.len(),
                "discarding unflushed dbf rows"
            );
            self.staged.clear();
        }
        if self.inner.take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed dbf");
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

    fn opened(&self) -> Result<&OpenDbf, Error> {
        self.inner.as_ref().ok_or_else(|| not_open(&self.path))
    }

    fn opened_mut(&mut self) -> Result<&mut OpenDbf, Error> {
        ensure_writable(&self.path, self.mode)?;
        match self.inner.as_mut() {
            Some(inner) => Ok(inner),
            None => Err(not_open(&self.path)),
        }
    }

    pub fn header(&self) -> Result<&DbfHeader, Error> {
        Ok(&self.opened()?.header)
    }

    /// Number of flushed rows, deleted ones included.
    pub fn count(&self) -> Result<u32, Error> {
        Ok(self.opened()?.header.record_count())
    }

    pub fn field_names(&self) -> Result<Vec<&str>, Error> {
        Ok(self
            .opened()?
            .header
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect())
    }

    pub fn fields(&self) -> Result<&[DbfField], Error> {
        Ok(self.opened()?.header.fields())
    }

    /// Reads row `id`, decoding only `fields` when given.
    pub fn get(&self, id: u32, fields: Option<&[&str]>) -> Result<DbfRecord, Error> {
        let inner = self.opened()?;
        let header = &inner.header;
        check_id(id, header.record_count())?;
        let projection = header.projection(fields)?;

        let len = usize::from(header.record_length());
        let mut row = vec![0u8; len];
        let offset = header.row_offset(id);
        read_at(&inner.file, offset, &mut row).map_err(|e| eof_as_truncated(e, offset, len))?;
        Ok(decode_row(header, &projection, id, &row)?)
    }

    /// Streams rows in the filter's range through a separate file handle.
    pub fn iterator(&self, filter: &QueryFilter) -> Result<DbfIterator<'_>, Error> {
        let inner = self.opened()?;
        DbfIterator::new(&self.path, &inner.header, filter)
    }

    /// Eagerly reads the rows in the filter's range, deleted ones included.
    pub fn records(&self, filter: &QueryFilter) -> Result<Vec<DbfRecord>, Error> {
        let inner = self.opened()?;
        let header = &inner.header;
        let projection = header.projection(filter.fields.as_deref())?;
        let range = filter.range(u64::from(header.record_count()));
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(|e| Error::from_open(e, &self.path))?;
        let mmap = unsafe { Mmap::map(&file)? };
        let bytes: &[u8] = mmap.as_ref();
        let record_length = u64::from(header.record_length());

        let mut out = Vec::with_capacity(usize::try_from(range.end - range.start).unwrap_or(0));
        for pos in range {
            let id = u32::try_from(pos + 1).map_err(|_| FormatError::InvalidRange { field: "record id" })?;
            let start = header.row_offset(id);
            let row = slice_range(bytes, start, start + record_length)?;
            out.push(decode_row(header, &projection, id, row)?);
        }
        Ok(out)
    }

    /// Stages a row for the next [`DbfFile::flush`]. Missing fields are
    /// written as null.
    pub fn push_row(&mut self, row: Attributes) {
        self.staged.push(row);
    }

    pub fn push_rows(&mut self, rows: impl IntoIterator<Item = Attributes>) {
        self.staged.extend(rows);
    }

    /// Encodes `row` against this table's fields without writing it.
    pub fn check_row(&self, row: &Attributes) -> Result<(), Error> {
        let header = &self.opened()?.header;
        let mut scratch = vec![ACTIVE; usize::from(header.record_length())];
        encode_row(header, row, &mut scratch)?;
        Ok(())
    }

    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    /// Appends every staged row and rewrites the header. Returns the number
    /// of rows written.
    ///
    /// Rows are encoded before anything is written, so a row that does not
    /// fit leaves both the file and the staging buffer untouched.
    pub fn flush(&mut self) -> Result<usize, Error> {
        ensure_writable(&self.path, self.mode)?;
        let Some(inner) = self.inner.as_mut() else {
            return Err(not_open(&self.path));
        };
        if self.staged.is_empty() {
            return Ok(0);
        }

        let header = &inner.header;
        let record_length = usize::from(header.record_length());
        let mut buf = vec![ACTIVE; record_length * self.staged.len()];
        for (row, out) in self.staged.iter().zip(buf.chunks_mut(record_length)) {
            encode_row(header, row, out)?;
        }

        let added = u32::try_from(self.staged.len())
            .ok()
            .and_then(|n| header.record_count().checked_add(n))
            .ok_or(FormatError::InvalidRange {
                field: "DbfHeader.record_count",
            })?;
        let offset = header.row_offset(header.record_count() + 1);
        write_at(&inner.file, offset, &buf)?;

        inner.header.set_record_count(added);
        inner.header.touch(Local::now().date_naive());
        inner.header.write_to(&inner.file)?;

        let written = self.staged.len();
        self.staged.clear();
        tracing::debug!(path = %self.path.display(), rows = written, total = added, "flushed dbf rows");
        Ok(written)
    }

    /// Marks row `id` deleted by setting its flag byte.
    pub fn remove_at(&mut self, id: u32) -> Result<(), Error> {
        self.set_flag(id, DELETED)?;
        tracing::debug!(id, "removed dbf row");
        Ok(())
    }

    /// Clears the deletion flag of row `id`.
    pub fn recover_at(&mut self, id: u32) -> Result<(), Error> {
        self.set_flag(id, ACTIVE)?;
        tracing::debug!(id, "recovered dbf row");
        Ok(())
    }

    /// Overwrites the fields named in `record.values` on row `record.id`.
    /// Other fields keep their stored value.
    ///
    /// Deleted rows are rejected; recover them first.
    pub fn update(&mut self, record: &DbfRecord) -> Result<(), Error> {
        let inner = self.opened_mut()?;
        let header = &inner.header;
        check_id(record.id, header.record_count())?;

        let len = usize::from(header.record_length());
        let offset = header.row_offset(record.id);
        let mut row = vec![0u8; len];
        read_at(&inner.file, offset, &mut row).map_err(|e| eof_as_truncated(e, offset, len))?;
        if row[0] == DELETED {
            return Err(AccessError::RecordDeleted { id: record.id }.into());
        }

        for (name, value) in record.values.iter() {
            let index = header
                .position(name)
                .ok_or_else(|| FormatError::UnknownField(name.to_string()))?;
            let field = &header.fields()[index];
            value::encode(field, value, &mut row[header.slot(index)])?;
        }
        write_at(&inner.file, offset, &row)?;
        tracing::debug!(id = record.id, "updated dbf row");
        Ok(())
    }

    fn set_flag(&mut self, id: u32, flag: u8) -> Result<(), Error> {
        let inner = self.opened_mut()?;
        check_id(id, inner.header.record_count())?;
        write_at(&inner.file, inner.header.row_offset(id), &[flag])?;
        Ok(())
    }
}

pub(crate) fn decode_row(
    header: &DbfHeader,
    projection: &[usize],
    id: u32,
    row: &[u8],
) -> Result<DbfRecord, FormatError> {
    let mut values = Attributes::with_capacity(projection.len());
    for &index in projection {
        let field = &header.fields()[index];
        let raw = row.get(header.slot(index)).ok_or(FormatError::Truncated {
            at: header.row_offset(id),
            needed: usize::from(header.record_length()),
        })?;
        values.insert(field.name.clone(), value::decode(field, raw)?);
    }
    Ok(DbfRecord {
        id,
        deleted: row.first() == Some(&DELETED),
        values,
    })
}

fn encode_row(header: &DbfHeader, row: &Attributes, out: &mut [u8]) -> Result<(), FormatError> {
    for name in row.names() {
        if header.position(name).is_none() {
            return Err(FormatError::UnknownField(name.to_string()));
        }
    }
    out[0] = ACTIVE;
    for (index, field) in header.fields().iter().enumerate() {
        let value = row.get(&field.name).cloned().unwrap_or_default();
        value::encode(field, &value, &mut out[header.slot(index)])?;
    }
    Ok(())
}
