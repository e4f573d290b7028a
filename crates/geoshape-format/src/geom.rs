//! Binary codec for `.shp` record contents.
//!
//! A record content starts with a little-endian `i32` shape type tag. Tag 0
//! is the null shape and carries no payload. Every other supported tag is
//! followed by a type-specific payload:
//!
//! | type        | payload                                                    |
//! |-------------|------------------------------------------------------------|
//! | point       | `x: f64, y: f64`                                           |
//! | multiPoint  | `envelope: 4 x f64, count: i32, points: count x (f64, f64)` |
//! | polyLine    | `envelope, parts: i32, points: i32, starts: parts x i32, points` |
//! | polygon     | same as polyLine; each part is a ring                      |

use geoshape_core::error::FormatError;
use geoshape_core::{Envelope, Point, Shape, ShapeType};

use crate::bytes::{put_f64_le, put_i32_le, ByteReader};

const ENVELOPE_SIZE: usize = 32;
const POINT_SIZE: usize = 16;

/// One codec per supported shape type, resolved once per open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomCodec {
    Point,
    MultiPoint,
    PolyLine,
    Polygon,
}

impl GeomCodec {
    /// Returns `None` for the null shape and for types without a codec.
    pub fn for_shape_type(shape_type: ShapeType) -> Option<Self> {
        match shape_type {
            ShapeType::Point => Some(Self::Point),
            ShapeType::MultiPoint => Some(Self::MultiPoint),
            ShapeType::PolyLine => Some(Self::PolyLine),
            ShapeType::Polygon => Some(Self::Polygon),
            ShapeType::Null | ShapeType::Unknown(_) => None,
        }
    }

    pub fn expected_type(self) -> ShapeType {
        match self {
            Self::Point => ShapeType::Point,
            Self::MultiPoint => ShapeType::MultiPoint,
            Self::PolyLine => ShapeType::PolyLine,
            Self::Polygon => ShapeType::Polygon,
        }
    }

    /// Reads the type tag and envelope of `content`.
    ///
    /// Returns `Ok(None)` for a null shape. Coordinates are not decoded until
    /// [`RecordView::decode`] is called.
    pub fn read(self, content: &[u8]) -> Result<Option<RecordView<'_>>, FormatError> {
        let mut reader = ByteReader::new(content);
        let tag = reader.next_i32_le()?;
        if tag == ShapeType::Null.code() {
            return Ok(None);
        }
        let expected = self.expected_type();
        if tag != expected.code() {
            return Err(FormatError::ShapeTypeMismatch {
                expected,
                found: tag,
            });
        }

        let payload = reader.remaining();
        let envelope = match self {
            Self::Point => {
                let x = reader.next_f64_le()?;
                let y = reader.next_f64_le()?;
                Envelope::from_point(x, y)
            }
            Self::MultiPoint | Self::PolyLine | Self::Polygon => read_envelope(&mut reader)?,
        };

        Ok(Some(RecordView {
            codec: self,
            envelope,
            payload,
        }))
    }

    /// Encodes `shape` as a record content (tag + payload).
    pub fn encode(self, shape: &Shape) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        self.write(shape, &mut out)?;
        Ok(out)
    }

    pub fn write(self, shape: &Shape, out: &mut Vec<u8>) -> Result<(), FormatError> {
        let parts = shape.parts();
        let point_count: usize = parts.iter().map(|p| p.len()).sum();
        let start = out.len();

        match self {
            Self::Point => {
                let vertices = parts.concat();
                let [p] = vertices.as_slice() else {
                    return Err(FormatError::InvalidValue {
                        field: "point",
                        reason: "a point record holds exactly one vertex",
                    });
                };
                out.resize(start + 4 + POINT_SIZE, 0);
                put_i32_le(out, start, ShapeType::Point.code());
                put_point(out, start + 4, p);
            }
            Self::MultiPoint => {
                let len = 4 + ENVELOPE_SIZE + 4 + point_count * POINT_SIZE;
                out.resize(start + len, 0);
                put_i32_le(out, start, ShapeType::MultiPoint.code());
                put_envelope(out, start + 4, shape.envelope());
                put_i32_le(out, start + 36, to_i32(point_count, "point count")?);
                let mut at = start + 40;
                for p in parts.iter().copied().flatten() {
                    put_point(out, at, p);
                    at += POINT_SIZE;
                }
            }
            Self::PolyLine | Self::Polygon => {
                let len = 4 + ENVELOPE_SIZE + 8 + parts.len() * 4 + point_count * POINT_SIZE;
                out.resize(start + len, 0);
                put_i32_le(out, start, self.expected_type().code());
                put_envelope(out, start + 4, shape.envelope());
                put_i32_le(out, start + 36, to_i32(parts.len(), "part count")?);
                put_i32_le(out, start + 40, to_i32(point_count, "point count")?);
                let mut at = start + 44;
                let mut first = 0usize;
                for part in &parts {
                    put_i32_le(out, at, to_i32(first, "part start")?);
                    at += 4;
                    first += part.len();
                }
                for p in parts.iter().copied().flatten() {
                    put_point(out, at, p);
                    at += POINT_SIZE;
                }
            }
        }
        Ok(())
    }
}

/// A record whose envelope is known and whose coordinates are still encoded.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    codec: GeomCodec,
    envelope: Envelope,
    payload: &'a [u8],
}

impl RecordView<'_> {
    pub fn shape_type(&self) -> ShapeType {
        self.codec.expected_type()
    }

    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    pub fn decode(&self) -> Result<Shape, FormatError> {
        let mut reader = ByteReader::new(self.payload);
        match self.codec {
            GeomCodec::Point => {
                let x = reader.next_f64_le()?;
                let y = reader.next_f64_le()?;
                Ok(Shape::Point(Point::new(x, y)))
            }
            GeomCodec::MultiPoint => {
                read_envelope(&mut reader)?;
                let count = reader.next_count("multiPoint.count")?;
                ensure_available(&reader, count, POINT_SIZE)?;
                let points = read_points(&mut reader, count)?;
                Ok(Shape::MultiPoint(points))
            }
            GeomCodec::PolyLine => {
                let mut parts = read_parts(&mut reader)?;
                if parts.len() == 1 {
                    Ok(Shape::LineString(parts.remove(0)))
                } else {
                    Ok(Shape::MultiLineString(parts))
                }
            }
            GeomCodec::Polygon => Ok(Shape::Polygon(read_parts(&mut reader)?)),
        }
    }
}

fn read_envelope(reader: &mut ByteReader<'_>) -> Result<Envelope, FormatError> {
    let minx = reader.next_f64_le()?;
    let miny = reader.next_f64_le()?;
    let maxx = reader.next_f64_le()?;
    let maxy = reader.next_f64_le()?;
    Ok(Envelope::new(minx, miny, maxx, maxy))
}

fn read_points(reader: &mut ByteReader<'_>, count: usize) -> Result<Vec<Point>, FormatError> {
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let x = reader.next_f64_le()?;
        let y = reader.next_f64_le()?;
        points.push(Point::new(x, y));
    }
    Ok(points)
}

fn read_parts(reader: &mut ByteReader<'_>) -> Result<Vec<Vec<Point>>, FormatError> {
    read_envelope(reader)?;
    let part_count = reader.next_count("parts.count")?;
    let point_count = reader.next_count("points.count")?;
    ensure_available(reader, part_count, 4)?;

    let mut starts = Vec::with_capacity(part_count);
    for _ in 0..part_count {
        starts.push(reader.next_count("parts.start")?);
    }
    ensure_available(reader, point_count, POINT_SIZE)?;
    let points = read_points(reader, point_count)?;

    let mut parts = Vec::with_capacity(part_count);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(point_count);
        if start > end || end > point_count {
            return Err(FormatError::InvalidRange { field: "parts" });
        }
        parts.push(points[start..end].to_vec());
    }
    Ok(parts)
}

fn ensure_available(
    reader: &ByteReader<'_>,
    count: usize,
    item_size: usize,
) -> Result<(), FormatError> {
    let needed = count
        .checked_mul(item_size)
        .ok_or(FormatError::InvalidRange { field: "count" })?;
    if reader.remaining().len() < needed {
        return Err(FormatError::Truncated {
            at: reader.position(),
            needed,
        });
    }
    Ok(())
}

fn put_point(buf: &mut [u8], off: usize, p: &Point) {
    put_f64_le(buf, off, p.x);
    put_f64_le(buf, off + 8, p.y);
}

fn put_envelope(buf: &mut [u8], off: usize, envelope: Option<Envelope>) {
    // No vertices: the box is stored as zeros.
    let env = envelope.unwrap_or(Envelope::new(0.0, 0.0, 0.0, 0.0));
    put_f64_le(buf, off, env.minx);
    put_f64_le(buf, off + 8, env.miny);
    put_f64_le(buf, off + 16, env.maxx);
    put_f64_le(buf, off + 24, env.maxy);
}

fn to_i32(v: usize, field: &'static str) -> Result<i32, FormatError> {
    i32::try_from(v).map_err(|_| FormatError::InvalidRange { field })
}
