//! Lazy traversal over the geometry and attribute stores, and their join.
//!
//! Each iterator reads through its own file handle, so several can run over
//! the same store at once. Any error ends the iteration.

use geoshape_core::error::{Error, FormatError};
use geoshape_core::{Envelope, Feature, Geometry, QueryFilter};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::dbf::{decode_row, DbfHeader, DbfRecord};
use crate::fileio::eof_as_truncated;
use crate::geom::GeomCodec;
use crate::shp::{check_prefix, decode_content, RECORD_PREFIX};
use crate::shx::{ShxFile, ShxIter, ShxRecord};

#[derive(Debug)]
struct RecordStream {
    reader: BufReader<File>,
    pos: u64,
}

impl RecordStream {
    fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::from_open(e, path))?;
        Ok(Self {
            reader: BufReader::new(file),
            pos: 0,
        })
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        if offset != self.pos {
            self.reader.seek(SeekFrom::Start(offset))?;
        }
        self.reader
            .read_exact(buf)
            .map_err(|e| eof_as_truncated(e, offset, buf.len()))?;
        self.pos = offset + buf.len() as u64;
        Ok(())
    }
}

fn to_id(pos: u64) -> Result<u32, Error> {
    Ok(u32::try_from(pos).map_err(|_| FormatError::InvalidRange { field: "record id" })?)
}

/// As an [`Iterator`] this skips removed records, null shapes and shapes
/// outside the envelope; `next_slot` yields those as `Ok(None)` instead.
pub struct ShpIterator<'a> {
    slots: ShxIter<'a>,
    remaining: u64,
    stream: RecordStream,
    codec: Option<GeomCodec>,
    envelope: Option<Envelope>,
    buf: Vec<u8>,
    failed: bool,
}

impl<'a> ShpIterator<'a> {
    pub(crate) fn new(
        path: &Path,
        shx: &'a ShxFile,
        codec: Option<GeomCodec>,
        filter: &QueryFilter,
    ) -> Result<Self, Error> {
        let range = filter.range(u64::from(shx.count()?));
        Ok(Self {
            slots: shx.iter_from(to_id(range.start + 1)?)?,
            remaining: range.end - range.start,
            stream: RecordStream::open(path)?,
            codec,
            envelope: filter.envelope,
            buf: Vec::new(),
            failed: false,
        })
    }

    pub fn set_envelope(&mut self, envelope: Option<Envelope>) {
        self.envelope = envelope;
    }

    pub fn next_slot(&mut self) -> Option<Result<Option<Geometry>, Error>> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        let result = match self.slots.next()? {
            Ok(record) => self.read(&record),
            Err(e) => Err(e),
        };
        self.remaining -= 1;
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn read(&mut self, record: &ShxRecord) -> Result<Option<Geometry>, Error> {
        if record.is_deleted() {
            return Ok(None);
        }
        let len = usize::try_from(RECORD_PREFIX + record.content_len())
            .map_err(|_| FormatError::InvalidRange { field: "record length" })?;
        self.buf.resize(len, 0);
        self.stream.read_exact_at(record.offset, &mut self.buf)?;
        check_prefix(record, &self.buf)?;

        let content = &self.buf[RECORD_PREFIX as usize..];
        let shape = decode_content(self.codec, content, self.envelope.as_ref())?;
        Ok(shape.map(|shape| Geometry {
            id: record.id,
            shape,
        }))
    }
}

impl Iterator for ShpIterator<'_> {
    type Item = Result<Geometry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_slot()? {
                Ok(Some(geometry)) => return Some(Ok(geometry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

pub struct DbfIterator<'a> {
    header: &'a DbfHeader,
    stream: RecordStream,
    projection: Vec<usize>,
    next_id: u32,
    remaining: u64,
    row: Vec<u8>,
    failed: bool,
}

impl<'a> DbfIterator<'a> {
    pub(crate) fn new(path: &Path, header: &'a DbfHeader, filter: &QueryFilter) -> Result<Self, Error> {
        let range = filter.range(u64::from(header.record_count()));
        Ok(Self {
            header,
            stream: RecordStream::open(path)?,
            projection: header.projection(filter.fields.as_deref())?,
            next_id: to_id(range.start + 1)?,
            remaining: range.end - range.start,
            row: vec![0u8; usize::from(header.record_length())],
            failed: false,
        })
    }

    pub fn set_fields<S: AsRef<str>>(&mut self, fields: Option<&[S]>) -> Result<(), Error> {
        self.projection = self.header.projection(fields)?;
        Ok(())
    }

    fn read(&mut self, id: u32) -> Result<DbfRecord, Error> {
        self.stream.read_exact_at(self.header.row_offset(id), &mut self.row)?;
        Ok(decode_row(self.header, &self.projection, id, &self.row)?)
    }
}

impl Iterator for DbfIterator<'_> {
    type Item = Result<DbfRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.remaining -= 1;
        let result = self.read(id);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Joins geometries with their attribute rows, one pair per step.
///
/// Records without geometry are skipped. If one stream ends before the other
/// the iterator yields [`FormatError::RecordCountMismatch`] and stops.
pub struct FeatureIterator<'a> {
    shp: ShpIterator<'a>,
    dbf: DbfIterator<'a>,
    done: bool,
}

impl<'a> FeatureIterator<'a> {
    pub fn new(shp: ShpIterator<'a>, dbf: DbfIterator<'a>) -> Self {
        Self {
            shp,
            dbf,
            done: false,
        }
    }

    pub fn fields<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, Error> {
        self.dbf.set_fields(Some(names))?;
        Ok(self)
    }

    pub fn envelope(mut self, envelope: Envelope) -> Self {
        self.shp.set_envelope(Some(envelope));
        self
    }
}

impl Iterator for FeatureIterator<'_> {
    type Item = Result<Feature, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match (self.shp.next_slot(), self.dbf.next()) {
                (None, None) => self.done = true,
                (Some(Err(e)), _) | (_, Some(Err(e))) => {
                    self.done = true;
                    return Some(Err(e));
                }
                (Some(_), None) | (None, Some(_)) => {
                    self.done = true;
                    return Some(Err(FormatError::RecordCountMismatch.into()));
                }
                (Some(Ok(None)), Some(Ok(_))) => {}
                (Some(Ok(Some(geometry))), Some(Ok(row))) => {
                    return Some(Ok(Feature::new(geometry, row.values)));
                }
            }
        }
        None
    }
}
