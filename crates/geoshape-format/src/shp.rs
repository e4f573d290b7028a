use geoshape_core::error::{AccessError, Error, FormatError};
use geoshape_core::{Envelope, Geometry, OpenMode, QueryFilter, Shape, ShapeType};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::bytes::{put_i32_be, read_i32_be, slice_range};
use crate::fileio::{
    check_id, eof_as_truncated, ensure_writable, not_open, open_file, read_at, sibling_path, write_at,
};
use crate::geom::GeomCodec;
use crate::header::{ShpHeader, HEADER_SIZE};
use crate::iter::ShpIterator;
use crate::shx::{ShxFile, ShxRecord};

pub(crate) const RECORD_PREFIX: u64 = 8;

// tag + envelope
const ENVELOPE_PREFIX: u64 = 4 + 32;

#[derive(Debug)]
struct OpenShp {
    file: File,
    header: ShpHeader,
    codec: Option<GeomCodec>,
    shx: ShxFile,
}

/// The `.shp` geometry store together with its `.shx` index.
///
/// The store owns the running header. Every mutation rewrites it and then
/// mirrors shape type and envelope into the index header.
#[derive(Debug)]
pub struct ShpFile {
    path: PathBuf,
    mode: OpenMode,
    inner: Option<OpenShp>,
}

impl ShpFile {
    pub fn new(path: impl AsRef<Path>, mode: OpenMode) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode,
            inner: None,
        }
    }

    pub fn open_path(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let mut shp = Self::new(path, mode);
        shp.open()?;
        Ok(shp)
    }

    /// Writes a header-only `.shp` and an identical `.shx`. The returned
    /// store is not opened yet.
    pub fn create_empty(path: impl AsRef<Path>, shape_type: ShapeType) -> Result<Self, Error> {
        let path = path.as_ref();
        if GeomCodec::for_shape_type(shape_type).is_none() {
            return Err(FormatError::UnsupportedShapeType(shape_type.code()).into());
        }
        let header = ShpHeader::new(shape_type).encode()?;
        std::fs::write(path, header)?;
        std::fs::write(sibling_path(path, "shx"), header)?;
        tracing::debug!(path = %path.display(), %shape_type, "created empty shp");
        Ok(Self::new(path, OpenMode::ReadWrite))
    }

    pub fn open(&mut self) -> Result<(), Error> {
        if self.inner.is_some() {
            return Ok(());
        }
        let file = open_file(&self.path, self.mode)?;
        let shx_path = sibling_path(&self.path, "shx");
        if !shx_path.exists() {
            return Err(AccessError::MissingIndex { path: shx_path }.into());
        }
        let mut header = ShpHeader::read_from(&file)?;
        let codec = GeomCodec::for_shape_type(header.shape_type);
        if codec.is_none() {
            tracing::warn!(
                path = %self.path.display(),
                shape_type = header.shape_type.code(),
                "no codec for shape type; records read as empty"
            );
        }
        let shx = ShxFile::open_path(&shx_path, self.mode)?;
        // an empty envelope is stored as zeros; tell it apart from a real
        // box at the origin by looking for any live record with a box
        if header.envelope == Envelope::new(0.0, 0.0, 0.0, 0.0) {
            if let Some(codec) = codec {
                if !has_live_envelope(&file, &shx, codec)? {
                    header.envelope = Envelope::empty();
                }
            }
        }
        tracing::debug!(
            path = %self.path.display(),
            shape_type = %header.shape_type,
            file_length = header.file_length,
            "opened shp"
        );
        self.inner = Some(OpenShp {
            file,
            header,
            codec,
            shx,
        });
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.shx.close();
            tracing::debug!(path = %self.path.display(), "closed shp");
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

    fn opened(&self) -> Result<&OpenShp, Error> {
        self.inner.as_ref().ok_or_else(|| not_open(&self.path))
    }

    fn opened_mut(&mut self) -> Result<&mut OpenShp, Error> {
        ensure_writable(&self.path, self.mode)?;
        match self.inner.as_mut() {
            Some(inner) => Ok(inner),
            None => Err(not_open(&self.path)),
        }
    }

    pub fn header(&self) -> Result<&ShpHeader, Error> {
        Ok(&self.opened()?.header)
    }

    pub fn envelope(&self) -> Result<Envelope, Error> {
        Ok(self.opened()?.header.envelope)
    }

    pub fn shape_type(&self) -> Result<ShapeType, Error> {
        Ok(self.opened()?.header.shape_type)
    }

    pub fn count(&self) -> Result<u32, Error> {
        self.opened()?.shx.count()
    }

    pub fn index(&self) -> Result<&ShxFile, Error> {
        Ok(&self.opened()?.shx)
    }

    pub fn get(&self, id: u32) -> Result<Option<Geometry>, Error> {
        let inner = self.opened()?;
        let record = inner.shx.get(id)?;
        if record.is_deleted() {
            return Ok(None);
        }
        let mut buf = Vec::new();
        read_record(&inner.file, &record, &mut buf)?;
        let shape = decode_content(inner.codec, &buf[RECORD_PREFIX as usize..], None)?;
        Ok(shape.map(|shape| Geometry { id, shape }))
    }

    pub fn iterator(&self, filter: &QueryFilter) -> Result<ShpIterator<'_>, Error> {
        let inner = self.opened()?;
        ShpIterator::new(&self.path, &inner.shx, inner.codec, filter)
    }

    pub fn records(&self, filter: &QueryFilter) -> Result<Vec<Geometry>, Error> {
        self.records_with_progress(filter, |_, _| {})
    }

    /// Like [`ShpFile::records`], calling `on_progress(consumed, total)` after
    /// each index slot in the range is visited.
    pub fn records_with_progress<F>(
        &self,
        filter: &QueryFilter,
        mut on_progress: F,
    ) -> Result<Vec<Geometry>, Error>
    where
        F: FnMut(u64, u64),
    {
        let inner = self.opened()?;
        let slots = inner.shx.records(filter)?;
        let total = slots.len() as u64;
        if slots.is_empty() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(|e| Error::from_open(e, &self.path))?;
        let mmap = unsafe { Mmap::map(&file)? };
        let bytes: &[u8] = mmap.as_ref();

        let mut out = Vec::new();
        for (i, record) in slots.iter().enumerate() {
            if !record.is_deleted() {
                let raw = slice_range(bytes, record.offset, record.end())?;
                check_prefix(record, raw)?;
                let content = &raw[RECORD_PREFIX as usize..];
                if let Some(shape) = decode_content(inner.codec, content, filter.envelope.as_ref())? {
                    out.push(Geometry {
                        id: record.id,
                        shape,
                    });
                }
            }
            on_progress(i as u64 + 1, total);
        }
        Ok(out)
    }

    /// Index slots in range whose stored envelope touches `filter.envelope`,
    /// reading only each record's envelope prefix.
    pub fn index_records(&self, filter: &QueryFilter) -> Result<Vec<ShxRecord>, Error> {
        let inner = self.opened()?;
        let slots = inner.shx.records(filter)?;
        if filter.envelope.is_none() {
            return Ok(slots);
        }
        let Some(codec) = inner.codec else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for record in slots {
            if record.is_deleted() {
                continue;
            }
            let keep = read_envelope(&inner.file, codec, &record)?
                .is_some_and(|env| filter.matches_envelope(&env));
            if keep {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub fn push(&mut self, shape: &Shape) -> Result<u32, Error> {
        let content = self.writable_codec()?.encode(shape)?;
        self.append(&content, shape.envelope())
    }

    pub fn push_null(&mut self) -> Result<u32, Error> {
        self.writable_codec()?;
        let content = ShapeType::Null.code().to_le_bytes();
        self.append(&content, None)
    }

    /// Writes a replacement record at the end of the file and points the
    /// index slot at it. The old bytes stay in place, unreachable.
    pub fn update_at(&mut self, id: u32, shape: &Shape) -> Result<(), Error> {
        check_id(id, self.count()?)?;
        let content = self.writable_codec()?.encode(shape)?;
        let (offset, length) = self.write_record(id, &content, shape.envelope())?;
        let inner = self.opened_mut()?;
        inner.shx.update(ShxRecord { id, offset, length })?;
        tracing::debug!(id, offset, length, "updated shp record");
        Ok(())
    }

    pub fn remove_at(&mut self, id: u32) -> Result<(), Error> {
        check_id(id, self.count()?)?;
        let inner = self.opened_mut()?;
        let record = inner.shx.get(id)?;
        write_at(&inner.file, record.offset + 4, &0i32.to_be_bytes())?;
        inner.shx.remove(id)?;
        tracing::debug!(id, "removed shp record");
        Ok(())
    }

    fn writable_codec(&mut self) -> Result<GeomCodec, Error> {
        let inner = self.opened_mut()?;
        inner
            .codec
            .ok_or_else(|| FormatError::UnsupportedShapeType(inner.header.shape_type.code()).into())
    }

    fn append(&mut self, content: &[u8], envelope: Option<Envelope>) -> Result<u32, Error> {
        let id = self
            .count()?
            .checked_add(1)
            .ok_or(FormatError::InvalidRange { field: "record id" })?;
        let (offset, length) = self.write_record(id, content, envelope)?;
        let inner = self.opened_mut()?;
        let record = inner.shx.push(offset, length)?;
        tracing::debug!(id = record.id, offset, length, "pushed shp record");
        Ok(record.id)
    }

    fn write_record(
        &mut self,
        id: u32,
        content: &[u8],
        envelope: Option<Envelope>,
    ) -> Result<(u64, u32), Error> {
        let inner = self.opened_mut()?;
        let length = u32::try_from(content.len() / 2)
            .ok()
            .filter(|words| i32::try_from(*words).is_ok())
            .ok_or(FormatError::InvalidRange {
                field: "record length",
            })?;
        let raw_id = i32::try_from(id).map_err(|_| FormatError::InvalidRange { field: "record id" })?;

        let offset = inner.header.file_length;
        let mut header = inner.header;
        header.file_length = offset + RECORD_PREFIX + content.len() as u64;
        if let Some(env) = envelope {
            header.envelope = header.envelope.union(&env);
        }
        // validate the grown length before touching the file
        let header_bytes = header.encode()?;

        let mut record = vec![0u8; RECORD_PREFIX as usize + content.len()];
        put_i32_be(&mut record, 0, raw_id);
        put_i32_be(&mut record, 4, length as i32);
        record[RECORD_PREFIX as usize..].copy_from_slice(content);
        write_at(&inner.file, offset, &record)?;
        write_at(&inner.file, 0, &header_bytes)?;
        inner.header = header;
        inner.shx.sync_header(&inner.header)?;
        Ok((offset, length))
    }
}

pub(crate) fn read_record(file: &File, record: &ShxRecord, buf: &mut Vec<u8>) -> Result<(), Error> {
    let len = usize::try_from(RECORD_PREFIX + record.content_len())
        .map_err(|_| FormatError::InvalidRange { field: "record length" })?;
    buf.resize(len, 0);
    read_at(file, record.offset, buf).map_err(|e| eof_as_truncated(e, record.offset, len))?;
    check_prefix(record, buf)
}

fn read_envelope(file: &File, codec: GeomCodec, record: &ShxRecord) -> Result<Option<Envelope>, Error> {
    let mut buf = [0u8; (RECORD_PREFIX + ENVELOPE_PREFIX) as usize];
    let want = (RECORD_PREFIX + record.content_len().min(ENVELOPE_PREFIX)) as usize;
    read_at(file, record.offset, &mut buf[..want])
        .map_err(|e| eof_as_truncated(e, record.offset, want))?;
    check_prefix(record, &buf[..want])?;
    Ok(codec
        .read(&buf[RECORD_PREFIX as usize..want])?
        .map(|view| view.envelope())
        .filter(|env| !env.is_empty()))
}

// Empty multipoints and lines store a zero box too, so decode the vertices.
fn has_live_envelope(file: &File, shx: &ShxFile, codec: GeomCodec) -> Result<bool, Error> {
    let mut buf = Vec::new();
    for record in shx.iter()? {
        let record = record?;
        if record.is_deleted() {
            continue;
        }
        read_record(file, &record, &mut buf)?;
        let shape = decode_content(Some(codec), &buf[RECORD_PREFIX as usize..], None)?;
        if shape.and_then(|s| s.envelope()).is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn check_prefix(record: &ShxRecord, raw: &[u8]) -> Result<(), Error> {
    let declared = read_i32_be(raw, 4)?;
    if i64::from(declared) != i64::from(record.length) {
        return Err(FormatError::ContentLengthMismatch {
            id: record.id,
            declared: declared.max(0) as u32,
            actual: record.length,
        }
        .into());
    }
    Ok(())
}

/// Decodes one record content, returning `None` for null shapes, files
/// without a codec, and shapes outside `bounds`.
pub(crate) fn decode_content(
    codec: Option<GeomCodec>,
    content: &[u8],
    bounds: Option<&Envelope>,
) -> Result<Option<Shape>, FormatError> {
    let Some(codec) = codec else {
        return Ok(None);
    };
    let Some(view) = codec.read(content)? else {
        return Ok(None);
    };
    if Envelope::disjoined(bounds, Some(&view.envelope())) {
        return Ok(None);
    }
    view.decode().map(Some)
}
