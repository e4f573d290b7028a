//! Fixed-width reads and writes at explicit offsets, in both byte orders.

use geoshape_core::error::FormatError;

pub(crate) fn read_exact<const N: usize>(bytes: &[u8], offset: u64) -> Result<[u8; N], FormatError> {
    let start = usize::try_from(offset).map_err(|_| FormatError::Truncated {
        at: offset,
        needed: N,
    })?;
    let end = start.checked_add(N).ok_or(FormatError::Truncated {
        at: offset,
        needed: N,
    })?;
    let slice = bytes.get(start..end).ok_or(FormatError::Truncated {
        at: offset,
        needed: N,
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

pub(crate) fn slice_range(bytes: &[u8], start: u64, end: u64) -> Result<&[u8], FormatError> {
    if end < start {
        return Err(FormatError::InvalidRange { field: "range" });
    }
    let start_usize =
        usize::try_from(start).map_err(|_| FormatError::InvalidRange { field: "range" })?;
    let end_usize =
        usize::try_from(end).map_err(|_| FormatError::InvalidRange { field: "range" })?;
    if end_usize > bytes.len() {
        return Err(FormatError::Truncated {
            at: start,
            needed: end_usize - start_usize,
        });
    }
    Ok(&bytes[start_usize..end_usize])
}

pub(crate) fn read_u8(bytes: &[u8], offset: u64) -> Result<u8, FormatError> {
    Ok(read_exact::<1>(bytes, offset)?[0])
}

pub(crate) fn read_u16_le(bytes: &[u8], offset: u64) -> Result<u16, FormatError> {
    Ok(u16::from_le_bytes(read_exact::<2>(bytes, offset)?))
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: u64) -> Result<u32, FormatError> {
    Ok(u32::from_le_bytes(read_exact::<4>(bytes, offset)?))
}

pub(crate) fn read_i32_le(bytes: &[u8], offset: u64) -> Result<i32, FormatError> {
    Ok(i32::from_le_bytes(read_exact::<4>(bytes, offset)?))
}

pub(crate) fn read_i32_be(bytes: &[u8], offset: u64) -> Result<i32, FormatError> {
    Ok(i32::from_be_bytes(read_exact::<4>(bytes, offset)?))
}

pub(crate) fn read_f64_le(bytes: &[u8], offset: u64) -> Result<f64, FormatError> {
    Ok(f64::from_le_bytes(read_exact::<8>(bytes, offset)?))
}

pub(crate) fn put_u8(buf: &mut [u8], off: usize, v: u8) {
    buf[off] = v;
}
pub(crate) fn put_u16_le(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}
pub(crate) fn put_u32_le(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
pub(crate) fn put_i32_le(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
pub(crate) fn put_i32_be(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
}
pub(crate) fn put_f64_le(buf: &mut [u8], off: usize, v: f64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

/// Sequential little-endian reader over a record payload.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: u64,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn position(&self) -> u64 {
        self.pos
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX);
        self.bytes.get(start..).unwrap_or(&[])
    }

    pub(crate) fn next_i32_le(&mut self) -> Result<i32, FormatError> {
        let v = read_i32_le(self.bytes, self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub(crate) fn next_f64_le(&mut self) -> Result<f64, FormatError> {
        let v = read_f64_le(self.bytes, self.pos)?;
        self.pos += 8;
        Ok(v)
    }

    /// Reads a non-negative `i32` count.
    pub(crate) fn next_count(&mut self, field: &'static str) -> Result<usize, FormatError> {
        let v = self.next_i32_le()?;
        usize::try_from(v).map_err(|_| FormatError::InvalidValue {
            field,
            reason: "must be non-negative",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_endianness() {
        let mut buf = vec![0u8; 16];
        put_i32_be(&mut buf, 0, 9994);
        put_i32_le(&mut buf, 4, 1000);
        put_f64_le(&mut buf, 8, -97.731192);
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x27, 0x0a]);
        assert_eq!(read_i32_be(&buf, 0).unwrap(), 9994);
        assert_eq!(read_i32_le(&buf, 4).unwrap(), 1000);
        assert_eq!(read_f64_le(&buf, 8).unwrap(), -97.731192);
    }

    #[test]
    fn reads_past_end_are_truncated_errors() {
        let buf = [0u8; 6];
        let err = read_i32_be(&buf, 4).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { at: 4, needed: 4 }));
        assert!(slice_range(&buf, 2, 10).is_err());
        assert!(slice_range(&buf, 4, 2).is_err());
    }

    #[test]
    fn reader_advances() {
        let mut buf = vec![0u8; 12];
        put_i32_le(&mut buf, 0, 3);
        put_f64_le(&mut buf, 4, 1.5);
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.next_count("n").unwrap(), 3);
        assert_eq!(r.next_f64_le().unwrap(), 1.5);
        assert_eq!(r.position(), 12);
        assert!(r.remaining().is_empty());
        assert!(r.next_i32_le().is_err());
    }

    #[test]
    fn negative_count_is_rejected() {
        let mut buf = vec![0u8; 4];
        put_i32_le(&mut buf, 0, -1);
        assert!(ByteReader::new(&buf).next_count("n").is_err());
    }
}
