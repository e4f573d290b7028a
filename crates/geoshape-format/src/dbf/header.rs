use chrono::{Datelike, Local, NaiveDate};
use geoshape_core::error::{Error, FormatError};
use std::collections::HashSet;
use std::fs::File;
use std::ops::Range;

use crate::bytes::{put_u16_le, put_u32_le, put_u8, read_u16_le, read_u32_le, read_u8};
use crate::fileio::{eof_as_truncated, read_at, write_at};

pub const DBF_HEADER_SIZE: usize = 32;
pub const DESCRIPTOR_SIZE: usize = 32;
pub const TERMINATOR: u8 = 0x0D;

/// dBASE III without memo.
const FILE_TYPE: u8 = 0x03;
const NAME_SIZE: usize = 11;
const MAX_NAME_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
    /// Any other type code; values are read and written as text.
    Other(u8),
}

impl FieldType {
    pub fn from_code(code: u8) -> Self {
        match code.to_ascii_uppercase() {
            b'C' => Self::Character,
            b'N' => Self::Numeric,
            b'F' => Self::Float,
            b'L' => Self::Logical,
            b'D' => Self::Date,
            _ => Self::Other(code),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Character => b'C',
            Self::Numeric => b'N',
            Self::Float => b'F',
            Self::Logical => b'L',
            Self::Date => b'D',
            Self::Other(code) => code,
        }
    }

    pub fn as_char(self) -> char {
        char::from(self.code())
    }
}

/// One 32-byte field descriptor.
///
/// Character fields store their width as a `u16` at byte 16; every other type
/// stores a `u8` width at 16 and the decimal count at 17.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfField {
    pub name: String,
    pub field_type: FieldType,
    pub length: u16,
    pub decimal: u8,
}

impl DbfField {
    pub fn new(name: impl Into<String>, field_type: FieldType, length: u16, decimal: u8) -> Self {
        Self {
            name: name.into(),
            field_type,
            length,
            decimal,
        }
    }

    pub fn character(name: impl Into<String>, length: u16) -> Self {
        Self::new(name, FieldType::Character, length, 0)
    }

    pub fn numeric(name: impl Into<String>, length: u8, decimal: u8) -> Self {
        Self::new(name, FieldType::Numeric, u16::from(length), decimal)
    }

    pub fn logical(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Logical, 1, 0)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date, 8, 0)
    }

    pub fn width(&self) -> usize {
        usize::from(self.length)
    }

    fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let raw_name = bytes.get(..NAME_SIZE).ok_or(FormatError::Truncated {
            at: 0,
            needed: DESCRIPTOR_SIZE,
        })?;
        let name_end = raw_name.iter().position(|b| *b == 0).unwrap_or(NAME_SIZE);
        let name = String::from_utf8_lossy(&raw_name[..name_end]).trim().to_string();

        let field_type = FieldType::from_code(read_u8(bytes, 11)?);
        let (length, decimal) = if field_type == FieldType::Character {
            (read_u16_le(bytes, 16)?, 0)
        } else {
            (u16::from(read_u8(bytes, 16)?), read_u8(bytes, 17)?)
        };
        Ok(Self {
            name,
            field_type,
            length,
            decimal,
        })
    }

    fn encode(&self, out: &mut [u8]) {
        let name = self.name.as_bytes();
        let n = name.len().min(NAME_SIZE);
        out[..n].copy_from_slice(&name[..n]);
        put_u8(out, 11, self.field_type.code());
        if self.field_type == FieldType::Character {
            put_u16_le(out, 16, self.length);
        } else {
            put_u8(out, 16, u8::try_from(self.length).unwrap_or(u8::MAX));
            put_u8(out, 17, self.decimal);
        }
    }

    fn validate(&self) -> Result<(), FormatError> {
        let invalid = |reason| FormatError::InvalidValue {
            field: "DbfField",
            reason,
        };
        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(invalid("name must be 1 to 10 bytes"));
        }
        if self.name.bytes().any(|b| b == 0 || b.is_ascii_whitespace()) {
            return Err(invalid("name must not contain spaces or NUL"));
        }
        if self.length == 0 {
            return Err(invalid("length must be positive"));
        }
        match self.field_type {
            FieldType::Character => {}
            FieldType::Logical if self.length != 1 => return Err(invalid("logical fields are 1 byte")),
            FieldType::Date if self.length != 8 => return Err(invalid("date fields are 8 bytes")),
            FieldType::Numeric | FieldType::Float
                if usize::from(self.decimal) >= self.width() =>
            {
                return Err(invalid("decimal count must be smaller than the length"));
            }
            FieldType::Numeric
            | FieldType::Float
            | FieldType::Logical
            | FieldType::Date
            | FieldType::Other(_) => {
                if self.length > u16::from(u8::MAX) {
                    return Err(invalid("non-character fields are at most 255 bytes"));
                }
            }
        }
        Ok(())
    }
}

/// The `.dbf` file header and its field descriptors.
///
/// | offset | field          | encoding   |
/// |--------|----------------|------------|
/// | 0      | file type      | u8         |
/// | 1..4   | last update    | u8 x 3, year since 1900 |
/// | 4      | record count   | u32 LE     |
/// | 8      | header length  | u16 LE     |
/// | 10     | record length  | u16 LE, includes the deletion flag |
///
/// Descriptors follow at byte 32, then a `0x0D` terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfHeader {
    file_type: u8,
    year: u8,
    month: u8,
    day: u8,
    record_count: u32,
    header_length: u16,
    record_length: u16,
    fields: Vec<DbfField>,
    /// Byte range of each field inside a row, after the flag byte.
    slots: Vec<Range<usize>>,
}

impl DbfHeader {
    /// Builds the header of an empty table, dated today.
    pub fn for_fields(fields: &[DbfField]) -> Result<Self, FormatError> {
        if fields.is_empty() {
            return Err(FormatError::InvalidValue {
                field: "DbfHeader.fields",
                reason: "a table needs at least one field",
            });
        }
        let mut seen = HashSet::new();
        for field in fields {
            field.validate()?;
            if !seen.insert(field.name.to_ascii_uppercase()) {
                return Err(FormatError::InvalidValue {
                    field: "DbfHeader.fields",
                    reason: "field names must be unique",
                });
            }
        }

        let record_length = fields
            .iter()
            .map(DbfField::width)
            .sum::<usize>()
            .checked_add(1)
            .and_then(|n| u16::try_from(n).ok())
            .ok_or(FormatError::InvalidRange {
                field: "DbfHeader.record_length",
            })?;
        let header_length = u16::try_from(DBF_HEADER_SIZE + DESCRIPTOR_SIZE * fields.len() + 1)
            .map_err(|_| FormatError::InvalidRange {
                field: "DbfHeader.header_length",
            })?;

        let mut header = Self {
            file_type: FILE_TYPE,
            year: 0,
            month: 0,
            day: 0,
            record_count: 0,
            header_length,
            record_length,
            fields: fields.to_vec(),
            slots: Vec::new(),
        };
        header.slots = slots_for(&header.fields, record_length)?;
        header.touch(Local::now().date_naive());
        Ok(header)
    }

    pub fn parse(fixed: &[u8], descriptors: &[u8]) -> Result<Self, FormatError> {
        let record_length = read_u16_le(fixed, 10)?;
        let mut fields = Vec::new();
        for chunk in descriptors.chunks(DESCRIPTOR_SIZE) {
            if chunk.first() == Some(&TERMINATOR) || chunk.len() < DESCRIPTOR_SIZE {
                break;
            }
            fields.push(DbfField::parse(chunk)?);
        }
        let slots = slots_for(&fields, record_length)?;
        Ok(Self {
            file_type: read_u8(fixed, 0)?,
            year: read_u8(fixed, 1)?,
            month: read_u8(fixed, 2)?,
            day: read_u8(fixed, 3)?,
            record_count: read_u32_le(fixed, 4)?,
            header_length: read_u16_le(fixed, 8)?,
            record_length,
            fields,
            slots,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; usize::from(self.header_length).max(self.min_header_len())];
        put_u8(&mut buf, 0, self.file_type);
        put_u8(&mut buf, 1, self.year);
        put_u8(&mut buf, 2, self.month);
        put_u8(&mut buf, 3, self.day);
        put_u32_le(&mut buf, 4, self.record_count);
        put_u16_le(&mut buf, 8, self.header_length);
        put_u16_le(&mut buf, 10, self.record_length);
        for (i, field) in self.fields.iter().enumerate() {
            let at = DBF_HEADER_SIZE + i * DESCRIPTOR_SIZE;
            field.encode(&mut buf[at..at + DESCRIPTOR_SIZE]);
        }
        put_u8(&mut buf, DBF_HEADER_SIZE + self.fields.len() * DESCRIPTOR_SIZE, TERMINATOR);
        buf
    }

    pub(crate) fn read_from(file: &File) -> Result<Self, Error> {
        let mut fixed = [0u8; DBF_HEADER_SIZE];
        read_at(file, 0, &mut fixed).map_err(|e| eof_as_truncated(e, 0, DBF_HEADER_SIZE))?;
        let header_length = usize::from(read_u16_le(&fixed, 8)?);
        let rest = header_length.saturating_sub(DBF_HEADER_SIZE);
        let mut descriptors = vec![0u8; rest];
        read_at(file, DBF_HEADER_SIZE as u64, &mut descriptors)
            .map_err(|e| eof_as_truncated(e, DBF_HEADER_SIZE as u64, rest))?;
        Ok(Self::parse(&fixed, &descriptors)?)
    }

    pub(crate) fn write_to(&self, file: &File) -> Result<(), Error> {
        write_at(file, 0, &self.encode())?;
        Ok(())
    }

    fn min_header_len(&self) -> usize {
        DBF_HEADER_SIZE + DESCRIPTOR_SIZE * self.fields.len() + 1
    }

    pub fn file_type(&self) -> u8 {
        self.file_type
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn header_length(&self) -> u16 {
        self.header_length
    }

    /// Row width in bytes, deletion flag included.
    pub fn record_length(&self) -> u16 {
        self.record_length
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.fields
    }

    /// Date of the last update, or `None` when the stored bytes are not a date.
    pub fn last_update(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            1900 + i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
    }

    pub(crate) fn touch(&mut self, date: NaiveDate) {
        self.year = u8::try_from(date.year() - 1900).unwrap_or(u8::MAX);
        self.month = u8::try_from(date.month()).unwrap_or(0);
        self.day = u8::try_from(date.day()).unwrap_or(0);
    }

    pub(crate) fn set_record_count(&mut self, count: u32) {
        self.record_count = count;
    }

    /// Absolute offset of row `id` (1-based).
    pub(crate) fn row_offset(&self, id: u32) -> u64 {
        u64::from(self.header_length) + u64::from(self.record_length) * u64::from(id.saturating_sub(1))
    }

    pub(crate) fn slot(&self, index: usize) -> Range<usize> {
        self.slots[index].clone()
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Field indices to decode: all of them, or the named subset in order.
    pub(crate) fn projection<S: AsRef<str>>(&self, names: Option<&[S]>) -> Result<Vec<usize>, FormatError> {
        match names {
            None => Ok((0..self.fields.len()).collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    let name = name.as_ref();
                    self.position(name)
                        .ok_or_else(|| FormatError::UnknownField(name.to_string()))
                })
                .collect(),
        }
    }
}

fn slots_for(fields: &[DbfField], record_length: u16) -> Result<Vec<Range<usize>>, FormatError> {
    let mut slots = Vec::with_capacity(fields.len());
    let mut start = 1;
    for field in fields {
        let end = start + field.width();
        slots.push(start..end);
        start = end;
    }
    if start > usize::from(record_length) {
        return Err(FormatError::InvalidValue {
            field: "DbfHeader.record_length",
            reason: "shorter than the sum of field widths",
        });
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<DbfField> {
        vec![
            DbfField::character("STATE_NAME", 25),
            DbfField::numeric("POP1990", 12, 0),
            DbfField::numeric("AREA", 10, 3),
            DbfField::logical("ACTIVE"),
            DbfField::date("FOUNDED"),
        ]
    }

    #[test]
    fn lengths_follow_fields() {
        let header = DbfHeader::for_fields(&fields()).unwrap();
        assert_eq!(header.header_length(), 32 + 5 * 32 + 1);
        assert_eq!(header.record_length(), 1 + 25 + 12 + 10 + 1 + 8);
        assert_eq!(header.record_count(), 0);
        assert_eq!(header.slot(0), 1..26);
        assert_eq!(header.slot(4), 49..57);
        assert_eq!(header.last_update(), Some(Local::now().date_naive()));
    }

    #[test]
    fn header_roundtrip() {
        let mut header = DbfHeader::for_fields(&fields()).unwrap();
        header.set_record_count(51);
        header.touch(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

        let bytes = header.encode();
        assert_eq!(bytes.len(), 193);
        assert_eq!(bytes[0], 0x03);
        assert_eq!(&bytes[1..4], &[124, 3, 9]);
        assert_eq!(*bytes.last().unwrap(), TERMINATOR);
        assert_eq!(bytes[32 + 11], b'C');
        assert_eq!(&bytes[32 + 16..32 + 18], &25u16.to_le_bytes());
        assert_eq!(bytes[64 + 16], 12);

        let parsed = DbfHeader::parse(&bytes[..32], &bytes[32..]).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.last_update(), NaiveDate::from_ymd_opt(2024, 3, 9));
    }

    #[test]
    fn wide_character_fields_use_two_bytes() {
        let header = DbfHeader::for_fields(&[DbfField::character("NOTES", 300)]).unwrap();
        let bytes = header.encode();
        let parsed = DbfHeader::parse(&bytes[..32], &bytes[32..]).unwrap();
        assert_eq!(parsed.fields()[0].length, 300);
        assert_eq!(parsed.record_length(), 301);
    }

    #[test]
    fn rejects_bad_fields() {
        assert!(DbfHeader::for_fields(&[]).is_err());
        assert!(DbfHeader::for_fields(&[DbfField::character("", 4)]).is_err());
        assert!(DbfHeader::for_fields(&[DbfField::character("MUCH_TOO_LONG", 4)]).is_err());
        assert!(DbfHeader::for_fields(&[DbfField::character("A", 0)]).is_err());
        assert!(DbfHeader::for_fields(&[DbfField::new("A", FieldType::Logical, 2, 0)]).is_err());
        assert!(DbfHeader::for_fields(&[DbfField::numeric("A", 4, 4)]).is_err());
        assert!(DbfHeader::for_fields(&[DbfField::character("A", 4), DbfField::character("a", 4)]).is_err());
    }

    #[test]
    fn projection_resolves_names() {
        let header = DbfHeader::for_fields(&fields()).unwrap();
        assert_eq!(header.projection::<&str>(None).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(header.projection(Some(&["AREA", "STATE_NAME"][..])).unwrap(), vec![2, 0]);
        let err = header.projection(Some(&["NOPE"][..])).unwrap_err();
        assert!(matches!(err, FormatError::UnknownField(name) if name == "NOPE"));
    }
}
