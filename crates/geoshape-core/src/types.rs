#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::envelope::Envelope;

/// Shape type code stored in `.shp`/`.shx` headers and every record tag.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    Unknown(i32),
}

impl ShapeType {
    pub fn from_code(v: i32) -> Self {
        match v {
            0 => Self::Null,
            1 => Self::Point,
            3 => Self::PolyLine,
            5 => Self::Polygon,
            8 => Self::MultiPoint,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Point => 1,
            Self::PolyLine => 3,
            Self::Polygon => 5,
            Self::MultiPoint => 8,
            Self::Unknown(v) => v,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Point => "point",
            Self::PolyLine => "polyLine",
            Self::Polygon => "polygon",
            Self::MultiPoint => "multiPoint",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Access mode for a file handle. Read-only handles reject every mutation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    ReadWrite,
}

impl OpenMode {
    pub fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Range, spatial and field-projection filter shared by every store.
///
/// `from` is a 0-based number of records to skip and `limit` the maximum
/// number of records to visit. Geometry stores honour `envelope`; attribute
/// stores honour `fields`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub from: u64,
    pub limit: Option<u64>,
    pub envelope: Option<Envelope>,
    pub fields: Option<Vec<String>>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_from(mut self, from: u64) -> Self {
        self.from = from;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// 0-based positions visited for a store holding `count` records.
    pub fn range(&self, count: u64) -> Range<u64> {
        let start = self.from.min(count);
        let end = match self.limit {
            Some(limit) => start.saturating_add(limit).min(count),
            None => count,
        };
        start..end
    }

    pub fn matches_envelope(&self, envelope: &Envelope) -> bool {
        !Envelope::disjoined(self.envelope.as_ref(), Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_type_codes_roundtrip() {
        for code in [0, 1, 3, 5, 8, 31] {
            assert_eq!(ShapeType::from_code(code).code(), code);
        }
        assert_eq!(ShapeType::from_code(31), ShapeType::Unknown(31));
        assert_eq!(ShapeType::PolyLine.to_string(), "polyLine");
    }

    #[test]
    fn range_is_clipped_to_count() {
        let f = QueryFilter::new();
        assert_eq!(f.range(51), 0..51);

        let f = QueryFilter::new().with_from(19).with_limit(10);
        assert_eq!(f.range(51), 19..29);

        let f = QueryFilter::new().with_from(45).with_limit(10);
        assert_eq!(f.range(51), 45..51);

        let f = QueryFilter::new().with_from(80);
        assert_eq!(f.range(51), 51..51);

        let f = QueryFilter::new().with_limit(u64::MAX).with_from(3);
        assert_eq!(f.range(5), 3..5);
    }

    #[test]
    fn absent_envelope_never_excludes() {
        let env = Envelope::new(100.0, 100.0, 101.0, 101.0);
        assert!(QueryFilter::new().matches_envelope(&env));

        let f = QueryFilter::new().with_envelope(Envelope::new(0.0, 0.0, 1.0, 1.0));
        assert!(!f.matches_envelope(&env));
    }
}
