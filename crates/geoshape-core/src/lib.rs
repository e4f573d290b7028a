//! Core value types and errors for reading and writing shapefiles.
//!
//! This crate defines the envelope, geometry, attribute and filter types
//! shared by the `.shp`/`.shx`/`.dbf` stores in `geoshape-format`.

pub mod envelope;
pub mod error;
pub mod geometry;
pub mod types;
pub mod value;

pub use envelope::Envelope;
pub use geometry::{Feature, Geometry, Point, Shape};
pub use types::{OpenMode, QueryFilter, ShapeType};
pub use value::{Attributes, FieldValue};
