#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::value::Attributes;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// Decoded geometry value.
///
/// Nesting mirrors GeoJSON: a polygon is a list of rings, a multi-polygon a
/// list of polygons. The codec flattens any variant into parts, so the
/// nesting only matters for how parts are grouped.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point),
    MultiPoint(Vec<Point>),
    LineString(Vec<Point>),
    MultiLineString(Vec<Vec<Point>>),
    Polygon(Vec<Vec<Point>>),
    MultiPolygon(Vec<Vec<Vec<Point>>>),
}

impl Shape {
    /// GeoJSON type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::MultiPoint(_) => "MultiPoint",
            Self::LineString(_) => "LineString",
            Self::MultiLineString(_) => "MultiLineString",
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Vertex runs in storage order. A point or multi-point yields one part.
    pub fn parts(&self) -> Vec<&[Point]> {
        match self {
            Self::Point(p) => vec![std::slice::from_ref(p)],
            Self::MultiPoint(pts) | Self::LineString(pts) => vec![pts.as_slice()],
            Self::MultiLineString(parts) | Self::Polygon(parts) => {
                parts.iter().map(Vec::as_slice).collect()
            }
            Self::MultiPolygon(polys) => polys.iter().flatten().map(Vec::as_slice).collect(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.parts().iter().map(|p| p.len()).sum()
    }

    /// Bounding box, or `None` for a geometry without vertices.
    pub fn envelope(&self) -> Option<Envelope> {
        let env = Envelope::from_points(self.parts().into_iter().flatten());
        (!env.is_empty()).then_some(env)
    }

    #[cfg(feature = "serde")]
    pub fn to_geojson(&self) -> serde_json::Value {
        fn pos(p: &Point) -> serde_json::Value {
            serde_json::json!([p.x, p.y])
        }
        fn line(pts: &[Point]) -> serde_json::Value {
            serde_json::Value::Array(pts.iter().map(pos).collect())
        }
        fn rings(parts: &[Vec<Point>]) -> serde_json::Value {
            serde_json::Value::Array(parts.iter().map(|r| line(r)).collect())
        }

        let coordinates = match self {
            Self::Point(p) => pos(p),
            Self::MultiPoint(pts) | Self::LineString(pts) => line(pts),
            Self::MultiLineString(parts) | Self::Polygon(parts) => rings(parts),
            Self::MultiPolygon(polys) => {
                serde_json::Value::Array(polys.iter().map(|p| rings(p)).collect())
            }
        };
        serde_json::json!({ "type": self.kind(), "coordinates": coordinates })
    }
}

/// A shape read from a `.shp` record, tagged with its 1-based record id.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub id: u32,
    pub shape: Shape,
}

/// One record's geometry joined with its attribute row.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u32,
    pub geometry: Shape,
    pub properties: Attributes,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Attributes) -> Self {
        Self {
            id: geometry.id,
            geometry: geometry.shape,
            properties,
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "id": self.id,
            "geometry": self.geometry.to_geojson(),
            "properties": self.properties.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().copied().map(Point::from).collect()
    }

    #[test]
    fn parts_preserve_nesting_boundaries() {
        let poly = Shape::MultiPolygon(vec![
            vec![ring(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)])],
            vec![
                ring(&[(5.0, 5.0), (6.0, 5.0), (5.0, 5.0)]),
                ring(&[(5.2, 5.2), (5.4, 5.2), (5.2, 5.2)]),
            ],
        ]);
        let parts = poly.parts();
        assert_eq!(parts.len(), 3);
        assert_eq!(poly.point_count(), 9);
        assert_eq!(parts[2][1], Point::new(5.4, 5.2));
    }

    #[test]
    fn envelope_of_empty_shape_is_none() {
        assert_eq!(Shape::MultiPoint(vec![]).envelope(), None);
        assert_eq!(
            Shape::Point(Point::new(2.0, 3.0)).envelope(),
            Some(Envelope::from_point(2.0, 3.0))
        );
    }
}
