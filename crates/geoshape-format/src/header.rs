use geoshape_core::error::{Error, FormatError};
use geoshape_core::{Envelope, ShapeType};
use std::fs::File;

use crate::bytes::{put_f64_le, put_i32_be, put_i32_le, read_f64_le, read_i32_be, read_i32_le};
use crate::fileio::{eof_as_truncated, read_at, write_at};

pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;
pub const HEADER_SIZE: u64 = 100;

/// The 100-byte header shared by `.shp` and `.shx` files.
///
/// | offset | field        | encoding                  |
/// |--------|--------------|---------------------------|
/// | 0      | file code    | i32 BE (9994)             |
/// | 24     | file length  | i32 BE, 16-bit words      |
/// | 28     | version      | i32 LE (1000)             |
/// | 32     | shape type   | i32 LE                    |
/// | 36     | envelope     | 4 x f64 LE                |
/// | 68     | z/m ranges   | 4 x f64 LE, written as 0  |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShpHeader {
    pub file_code: i32,
    /// Total file size in bytes.
    pub file_length: u64,
    pub version: i32,
    pub shape_type: ShapeType,
    pub envelope: Envelope,
}

impl ShpHeader {
    pub fn new(shape_type: ShapeType) -> Self {
        Self {
            file_code: FILE_CODE,
            file_length: HEADER_SIZE,
            version: VERSION,
            shape_type,
            envelope: Envelope::empty(),
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let file_code = read_i32_be(bytes, 0)?;
        if file_code != FILE_CODE {
            return Err(FormatError::BadFileCode(file_code));
        }
        let words = read_i32_be(bytes, 24)?;
        let words = u64::try_from(words).map_err(|_| FormatError::InvalidValue {
            field: "ShpHeader.file_length",
            reason: "must be non-negative",
        })?;
        let file_length = words * 2;
        if file_length < HEADER_SIZE {
            return Err(FormatError::InvalidValue {
                field: "ShpHeader.file_length",
                reason: "shorter than the header",
            });
        }
        let envelope = if file_length == HEADER_SIZE {
            Envelope::empty()
        } else {
            Envelope::new(
                read_f64_le(bytes, 36)?,
                read_f64_le(bytes, 44)?,
                read_f64_le(bytes, 52)?,
                read_f64_le(bytes, 60)?,
            )
        };
        Ok(Self {
            file_code,
            file_length,
            version: read_i32_le(bytes, 28)?,
            shape_type: ShapeType::from_code(read_i32_le(bytes, 32)?),
            envelope,
        })
    }

    pub fn encode(&self) -> Result<[u8; HEADER_SIZE as usize], FormatError> {
        let words = i32::try_from(self.file_length / 2).map_err(|_| FormatError::InvalidRange {
            field: "ShpHeader.file_length",
        })?;
        let env = if self.envelope.is_empty() {
            Envelope::new(0.0, 0.0, 0.0, 0.0)
        } else {
            self.envelope
        };

        let mut buf = [0u8; HEADER_SIZE as usize];
        put_i32_be(&mut buf, 0, self.file_code);
        put_i32_be(&mut buf, 24, words);
        put_i32_le(&mut buf, 28, self.version);
        put_i32_le(&mut buf, 32, self.shape_type.code());
        put_f64_le(&mut buf, 36, env.minx);
        put_f64_le(&mut buf, 44, env.miny);
        put_f64_le(&mut buf, 52, env.maxx);
        put_f64_le(&mut buf, 60, env.maxy);
        Ok(buf)
    }

    pub(crate) fn read_from(file: &File) -> Result<Self, Error> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        read_at(file, 0, &mut buf).map_err(|e| eof_as_truncated(e, 0, HEADER_SIZE as usize))?;
        Ok(Self::parse(&buf)?)
    }

    pub(crate) fn write_to(&self, file: &File) -> Result<(), Error> {
        write_at(file, 0, &self.encode()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut header = ShpHeader::new(ShapeType::Point);
        header.file_length = 533_024;
        header.envelope = Envelope::new(-174.1964, 19.0972, 173.2376, 70.6355);

        let buf = header.encode().unwrap();
        assert_eq!(&buf[0..4], &9994i32.to_be_bytes());
        assert_eq!(&buf[24..28], &266_512i32.to_be_bytes());
        assert_eq!(&buf[28..32], &1000i32.to_le_bytes());
        assert!(buf[68..].iter().all(|b| *b == 0));

        let parsed = ShpHeader::parse(&buf).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.shape_type, ShapeType::Point);
    }

    #[test]
    fn empty_envelope_is_written_as_zeros() {
        let header = ShpHeader::new(ShapeType::Polygon);
        let buf = header.encode().unwrap();
        assert!(buf[36..68].iter().all(|b| *b == 0));

        let parsed = ShpHeader::parse(&buf).unwrap();
        assert!(parsed.envelope.is_empty());
        assert_eq!(parsed.file_length, HEADER_SIZE);
    }

    #[test]
    fn rejects_bad_file_code() {
        let mut buf = ShpHeader::new(ShapeType::Point).encode().unwrap();
        buf[0..4].copy_from_slice(&0i32.to_be_bytes());
        let err = ShpHeader::parse(&buf).unwrap_err();
        assert!(matches!(err, FormatError::BadFileCode(0)));
    }
}
